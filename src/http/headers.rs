//! Case-normalizing header mapping.
//!
//! Keys are lower-cased on ingestion so every lookup is case-insensitive,
//! for request and response headers alike.

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy an `http` header map. Repeated headers are joined with `", "`,
    /// values that are not visible ASCII are read lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for name in map.keys() {
            let joined = map
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            headers.insert(name.as_str(), joined);
        }
        headers
    }

    /// Build an `http` header map, skipping entries that are not valid HTTP.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.0.len());
        for (name, value) in &self.0 {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => tracing::debug!(header = %name, "Dropping header that is not valid HTTP"),
            }
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.to_ascii_lowercase(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Headers rendered as `"k: v"` pairs joined by single spaces.
    pub fn serialized(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Byte length of [`Headers::serialized`] without allocating it.
    pub fn serialized_len(&self) -> usize {
        let pairs: usize = self.iter().map(|(k, v)| k.len() + 2 + v.len()).sum();
        pairs + self.len().saturating_sub(1)
    }
}

impl From<BTreeMap<String, String>> for Headers {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Headers> for BTreeMap<String, String> {
    fn from(headers: Headers) -> Self {
        headers.0
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k.as_ref(), v);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let headers: Headers = [("Content-Type", "text/plain"), ("ACCEPT", "x")]
            .into_iter()
            .collect();

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.contains("Accept"));
        assert_eq!(headers.iter().next(), Some(("accept", "x")));
    }

    #[test]
    fn test_serialized_len_matches_serialized() {
        let headers: Headers = [("random", "aaaa"), ("x-b", "1")].into_iter().collect();
        assert_eq!(headers.serialized(), "random: aaaa x-b: 1");
        assert_eq!(headers.serialized_len(), headers.serialized().len());

        assert_eq!(Headers::new().serialized_len(), 0);
    }

    #[test]
    fn test_header_map_round_trip_joins_repeated_values() {
        let mut map = HeaderMap::new();
        map.append("Vary", HeaderValue::from_static("accept"));
        map.append("Vary", HeaderValue::from_static("origin"));
        map.insert("Content-Type", HeaderValue::from_static("application/json"));

        let headers = Headers::from_header_map(&map);
        assert_eq!(headers.get("vary"), Some("accept, origin"));

        let back = headers.to_header_map();
        assert_eq!(back.get("content-type").unwrap(), "application/json");
        assert_eq!(back.get("vary").unwrap(), "accept, origin");
    }

    #[test]
    fn test_deserialize_lowercases_keys() {
        let headers: Headers = serde_json::from_str(r#"{"X-Request-Id":"abc"}"#).unwrap();
        assert_eq!(headers.get("x-request-id"), Some("abc"));
    }
}
