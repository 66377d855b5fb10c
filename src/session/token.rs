//! Descriptor type and token encode/decode.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Delimiter between descriptor fields inside the decoded token.
///
/// Backend cookies never contain `|`; endpoint and subdomain come from
/// trusted query parameters and must not contain it either.
const FIELD_DELIMITER: char = '|';

/// Number of `|`-separated fields in a well-formed token.
const FIELD_COUNT: usize = 4;

/// Errors produced while decoding a session token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token is not valid base64.
    #[error("session token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The decoded token is not valid UTF-8.
    #[error("session token is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The decoded token did not split into exactly four fields.
    #[error("session token has {0} fields, expected {FIELD_COUNT}")]
    Malformed(usize),
}

/// Affinity and routing state for one dialogue session.
///
/// Reconstructed per request from either a decoded token (continuation) or
/// explicit query parameters (new session), refreshed once after the backend
/// call, and discarded after the response is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Backend-issued sticky-session identifier (`JSESSIONID`).
    pub primary_cookie: String,
    /// Load-balancer affinity identifier (`ApplicationGatewayAffinity`).
    pub affinity_cookie: String,
    /// Backend deployment identifier.
    pub endpoint: String,
    /// Backend routing namespace.
    pub subdomain: String,
}

impl SessionDescriptor {
    /// Descriptor for the first call of a session: routing coordinates only,
    /// no cookies issued yet.
    #[must_use]
    pub fn new_session(endpoint: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            primary_cookie: String::new(),
            affinity_cookie: String::new(),
            endpoint: endpoint.into(),
            subdomain: subdomain.into(),
        }
    }

    /// Whether the backend has issued affinity cookies for this session.
    #[must_use]
    pub fn has_cookies(&self) -> bool {
        !self.primary_cookie.is_empty() || !self.affinity_cookie.is_empty()
    }

    /// Pack the descriptor into an opaque client-safe token.
    ///
    /// Fields are joined in fixed order with [`FIELD_DELIMITER`] and the raw
    /// bytes are base64-encoded. Cookie values are treated as opaque byte
    /// sequences; no UTF-8 normalization happens on the wire.
    #[must_use]
    pub fn encode(&self) -> String {
        let joined = [
            self.primary_cookie.as_str(),
            self.affinity_cookie.as_str(),
            self.endpoint.as_str(),
            self.subdomain.as_str(),
        ]
        .join(&FIELD_DELIMITER.to_string());

        BASE64.encode(joined.as_bytes())
    }

    /// Unpack a token back into a descriptor.
    ///
    /// Rejects tokens that do not decode to valid UTF-8 or to exactly four
    /// delimited fields; a short token is corrupt, not a partially-filled
    /// session.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let raw = BASE64.decode(token)?;
        let joined = String::from_utf8(raw)?;

        let parts: Vec<&str> = joined.split(FIELD_DELIMITER).collect();
        if parts.len() != FIELD_COUNT {
            return Err(TokenError::Malformed(parts.len()));
        }

        Ok(Self {
            primary_cookie: parts[0].to_string(),
            affinity_cookie: parts[1].to_string(),
            endpoint: parts[2].to_string(),
            subdomain: parts[3].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_populated_descriptor() {
        let d = SessionDescriptor {
            primary_cookie: "A1".to_string(),
            affinity_cookie: "B2".to_string(),
            endpoint: "east".to_string(),
            subdomain: "demo".to_string(),
        };
        assert_eq!(SessionDescriptor::decode(&d.encode()).unwrap(), d);
    }

    #[test]
    fn round_trips_empty_cookie_fields() {
        let d = SessionDescriptor::new_session("west", "acme.");
        let decoded = SessionDescriptor::decode(&d.encode()).unwrap();
        assert_eq!(decoded, d);
        assert!(!decoded.has_cookies());
    }

    #[test]
    fn encodes_known_example() {
        // base64("A1|B2|east|demo")
        let d = SessionDescriptor {
            primary_cookie: "A1".to_string(),
            affinity_cookie: "B2".to_string(),
            endpoint: "east".to_string(),
            subdomain: "demo".to_string(),
        };
        assert_eq!(d.encode(), "QTF8QjJ8ZWFzdHxkZW1v");
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = SessionDescriptor::decode("not base64!!").unwrap_err();
        assert!(matches!(err, TokenError::Encoding(_)));
    }

    #[test]
    fn rejects_non_utf8_token_bytes() {
        let token = BASE64.encode([0xff, 0xfe, b'|', b'a', b'|', b'b', b'|', b'c']);
        let err = SessionDescriptor::decode(&token).unwrap_err();
        assert!(matches!(err, TokenError::Utf8(_)));
    }

    #[test]
    fn rejects_too_few_fields() {
        let token = BASE64.encode(b"only|three|fields");
        let err = SessionDescriptor::decode(&token).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(3)));
    }

    #[test]
    fn rejects_too_many_fields() {
        let token = BASE64.encode(b"a|b|c|d|e");
        let err = SessionDescriptor::decode(&token).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(5)));
    }

    #[test]
    fn cookie_values_survive_non_alphanumeric_bytes() {
        let d = SessionDescriptor {
            primary_cookie: "0000AB12!x=~;".to_string(),
            affinity_cookie: "f3a9:[]{}".to_string(),
            endpoint: "east".to_string(),
            subdomain: "demo.".to_string(),
        };
        assert_eq!(SessionDescriptor::decode(&d.encode()).unwrap(), d);
    }
}
