//! Header and session parsing for API requests.

use axum::http::HeaderMap;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::models::SessionId;

/// Header carrying the browser tab's session ID
pub const SESSION_HEADER: &str = "Session-Id";

/// Longest accepted session ID
const MAX_SESSION_ID_LEN: usize = 64;

/// Session ID passed as a query parameter.
///
/// `EventSource` and download links cannot set headers, so they use this.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SessionQuery {
    /// Session ID (alternative to the Session-Id header)
    pub session: Option<String>,
}

/// Extension trait for convenient header parsing.
pub trait HeaderMapExt {
    /// Get a header value as a string, returning None if missing.
    fn get_str(&self, name: &str) -> Option<&str>;
}

impl HeaderMapExt for HeaderMap {
    fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Resolve the session from the header, falling back to `?session=`.
pub fn session_id(headers: &HeaderMap, query: &SessionQuery) -> Result<SessionId, ApiError> {
    let raw = match headers.get_str(SESSION_HEADER) {
        Some(value) => value,
        None => query
            .session
            .as_deref()
            .ok_or(ApiError::MissingHeader(SESSION_HEADER))?,
    };

    let raw = raw.trim();
    let valid = !raw.is_empty()
        && raw.len() <= MAX_SESSION_ID_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ApiError::InvalidHeader(SESSION_HEADER));
    }

    Ok(SessionId::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn make_headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            // HTTP header names are case-insensitive
            let header_name = HeaderName::try_from(*name).unwrap();
            headers.insert(header_name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    fn query(session: Option<&str>) -> SessionQuery {
        SessionQuery {
            session: session.map(str::to_string),
        }
    }

    #[test]
    fn test_session_header_is_case_insensitive() {
        let headers = make_headers(&[("session-id", "abc")]);
        assert_eq!(headers.get_str(SESSION_HEADER), Some("abc"));
        assert_eq!(session_id(&headers, &query(None)).unwrap().as_str(), "abc");
    }

    #[test]
    fn test_session_from_header() {
        let headers = make_headers(&[("Session-Id", "tab-123_x")]);
        let id = session_id(&headers, &query(None)).unwrap();
        assert_eq!(id.as_str(), "tab-123_x");
    }

    #[test]
    fn test_header_wins_over_query() {
        let headers = make_headers(&[("Session-Id", "from-header")]);
        let id = session_id(&headers, &query(Some("from-query"))).unwrap();
        assert_eq!(id.as_str(), "from-header");
    }

    #[test]
    fn test_session_from_query() {
        let id = session_id(&HeaderMap::new(), &query(Some("from-query"))).unwrap();
        assert_eq!(id.as_str(), "from-query");
    }

    #[test]
    fn test_session_missing() {
        let err = session_id(&HeaderMap::new(), &query(None)).unwrap_err();
        assert!(matches!(err, ApiError::MissingHeader(SESSION_HEADER)));
    }

    #[test]
    fn test_session_rejects_bad_characters_and_length() {
        let headers = make_headers(&[("Session-Id", "../etc/passwd")]);
        assert!(matches!(
            session_id(&headers, &query(None)),
            Err(ApiError::InvalidHeader(_))
        ));

        let long = "a".repeat(MAX_SESSION_ID_LEN + 1);
        assert!(session_id(&HeaderMap::new(), &query(Some(&long))).is_err());

        assert!(session_id(&HeaderMap::new(), &query(Some("   "))).is_err());
    }
}
