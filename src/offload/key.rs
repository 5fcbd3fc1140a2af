//! Object key layout: `{group}/{YYYY-MM-DD}/{urlencoded(request_id)}`.

use chrono::{NaiveDate, Utc};

use crate::protocol::DEFAULT_GROUP;

/// Build the object key for a payload stored on `date`.
///
/// An empty group falls back to `"all"`; a missing request id is replaced
/// by a fresh UUID so concurrent anonymous writes never collide.
pub fn object_key(group_id: &str, request_id: Option<&str>, date: NaiveDate) -> String {
    let group = if group_id.is_empty() { DEFAULT_GROUP } else { group_id };
    let file_name = match request_id {
        Some(id) if !id.is_empty() => urlencoding::encode(id).into_owned(),
        _ => uuid::Uuid::new_v4().to_string(),
    };
    format!("{}/{}/{}", group, date.format("%Y-%m-%d"), file_name)
}

/// Object key for a payload stored now (UTC date).
pub fn object_key_now(group_id: &str, request_id: Option<&str>) -> String {
    object_key(group_id, request_id, Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 13).unwrap()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(
            object_key("red-redington", Some("la-caballa"), date()),
            "red-redington/2023-12-13/la-caballa"
        );
    }

    #[test]
    fn test_request_id_is_url_encoded() {
        assert_eq!(
            object_key("all", Some("a/b c"), date()),
            "all/2023-12-13/a%2Fb%20c"
        );
    }

    #[test]
    fn test_empty_group_falls_back_to_all() {
        assert!(object_key("", Some("x"), date()).starts_with("all/2023-12-13/"));
    }

    #[test]
    fn test_missing_request_id_gets_uuid() {
        let key = object_key("all", None, date());
        let name = key.rsplit('/').next().unwrap();
        assert!(uuid::Uuid::parse_str(name).is_ok(), "{key}");
    }
}
