//! Seam to the embedding application's HTTP stack.
//!
//! Request construction, header marshaling, and the actual I/O live behind
//! the [`Transport`] trait; the rig only ever issues POSTs and inspects the
//! response headers and body it gets back.

use anyhow::Result;
use std::collections::HashMap;

/// A received response, reduced to what header inspection needs.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub body: String,
    pub headers: HashMap<String, Vec<String>>,
}

impl HttpResponse {
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// First value of a header, if the header is present and non-empty.
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Outbound request path to the orchestration server.
///
/// The rig issues `POST /init_session` with the client identifier as body
/// and `POST {base_path}/end_test` with no body. An `Err` is treated as a
/// transport failure: the current step is abandoned silently, no retry.
pub trait Transport: Send + Sync {
    fn post(&self, path: &str, body: Option<&str>) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_header_returns_first_value() {
        let mut headers = HashMap::new();
        headers.insert("Base-Path".to_string(), vec!["/v2".to_string(), "/v3".to_string()]);
        let response = HttpResponse {
            body: String::new(),
            headers,
        };
        assert!(response.has_header("Base-Path"));
        assert_eq!(response.first_header("Base-Path"), Some("/v2"));
        assert_eq!(response.first_header("Test-Script"), None);
    }
}
