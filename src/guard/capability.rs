//! Client capabilities declared through request headers.

use crate::http::headers::Headers;
use crate::protocol::{parse_flag, HANDLE_LARGE_RESPONSE_HEADER};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientCapabilities {
    /// `Accept: <sentinel>`: the client wants a reference instead of a failure.
    pub accepts_reference: bool,
    /// `handle-large-response: true`: the client can handle the 413.
    pub handles_rejection: bool,
}

impl ClientCapabilities {
    pub fn from_headers(headers: &Headers, mime_type: &str) -> Self {
        Self {
            accepts_reference: headers
                .get("accept")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(mime_type)),
            handles_rejection: headers
                .get(HANDLE_LARGE_RESPONSE_HEADER)
                .is_some_and(parse_flag),
        }
    }
}
