//! Wire contract shared by the producer (guard) and the consumer (resolver).

/// Sentinel content type signalling a reference envelope.
pub const LARGE_RESPONSE_MIME_TYPE: &str = "application/large-response.vnd+json";

/// Envelope key carrying the payload reference.
pub const PAYLOAD_REF_PROPERTY: &str = "$payload_ref";

/// Request header acknowledging that the client can handle a 413.
pub const HANDLE_LARGE_RESPONSE_HEADER: &str = "handle-large-response";

/// Environment toggle for resolver debug logging.
pub const DEBUG_ENV_VAR: &str = "LARGE_RESPONSE_DEBUG";

/// Lambda payload ceiling in MB.
pub const DEFAULT_SIZE_LIMIT_MB: f64 = 6.0;

/// Bytes per MB.
pub const TO_MB_FACTOR: f64 = 1_048_576.0;

/// Validity window of a handed-out payload reference.
pub const SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// Socket timeout for storage writes.
pub const STORAGE_TIMEOUT_SECS: u64 = 60;

/// Content type of offloaded objects.
pub const OFFLOAD_CONTENT_TYPE: &str = "application/json";

/// Default grouping key for offloaded objects.
pub const DEFAULT_GROUP: &str = "all";

/// Guidance returned to clients that sent no capability header.
pub fn large_response_user_info(mime_type: &str) -> String {
    format!(
        "Call the API with the HTTP header 'Accept: {mime_type}' to receive the payload through an S3 ref and avoid 413 errors or '{HANDLE_LARGE_RESPONSE_HEADER}: true' to acknowledge you can handle the 413."
    )
}

/// Message returned to clients that acknowledged handling the 413.
pub fn large_response_handled_info() -> String {
    format!(
        "'{HANDLE_LARGE_RESPONSE_HEADER}: true' received means client can handle this event. The response is too large and can't be returned to the client."
    )
}

/// Interpret a yes/no header value (`y`, `yes`, `true`, `1`, `on`).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        for yes in ["true", "TRUE", "1", "yes", "Y", " on "] {
            assert!(parse_flag(yes), "{yes}");
        }
        for no in ["false", "0", "no", "", "maybe"] {
            assert!(!parse_flag(no), "{no}");
        }
    }

    #[test]
    fn test_user_info_mentions_both_headers() {
        let info = large_response_user_info(LARGE_RESPONSE_MIME_TYPE);
        assert!(info.contains("'Accept: application/large-response.vnd+json'"));
        assert!(info.contains("'handle-large-response: true'"));
    }
}
