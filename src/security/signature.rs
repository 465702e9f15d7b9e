//! Request signature verification.
//!
//! Wire contract:
//! - `X-Timestamp: <unix seconds, decimal>`
//! - `X-Signature: hex(HMAC-SHA256(secret, token|timestamp|method|path))`
//!
//! `path` is the percent-decoded request path without the query string, so
//! `/api/v1/items/%31` is signed as `/api/v1/items/1`. `timestamp` is signed
//! exactly as presented. The verifier is a pure predicate; the caller does the
//! failure bookkeeping.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use sha2::Sha256;
use thiserror::Error;

use crate::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

pub const X_SIGNATURE: &str = "x-signature";
pub const X_TIMESTAMP: &str = "x-timestamp";

/// Maximum distance between the declared timestamp and verifier time (5 minutes).
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 300;

const SEPARATOR: &str = "|";

/// Why a signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature or timestamp")]
    MissingHeaders,

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("timestamp out of range ({skew_secs}s from server time)")]
    TimestampOutOfRange { skew_secs: i64 },

    #[error("signature is not valid hex")]
    MalformedSignature,

    #[error("invalid signature")]
    Mismatch,
}

impl SignatureError {
    /// Malformed or stale input is 401; a wrong signature is 403.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeaders | Self::InvalidTimestamp | Self::TimestampOutOfRange { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::MalformedSignature | Self::Mismatch => StatusCode::FORBIDDEN,
        }
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingHeaders => "missing_signature",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::TimestampOutOfRange { .. } => "stale_timestamp",
            Self::MalformedSignature => "malformed_signature",
            Self::Mismatch => "invalid_signature",
        }
    }
}

/// Build the signed message: `token|timestamp|method|path`.
pub fn canonical_message(token: &str, timestamp: &str, method: &str, path: &str) -> String {
    [token, timestamp, method, path].join(SEPARATOR)
}

/// The form of a request path that gets signed: query dropped, percent
/// escapes decoded. Invalid UTF-8 after decoding becomes U+FFFD.
pub fn signed_path(raw: &str) -> String {
    let path = raw.split_once('?').map_or(raw, |(path, _)| path);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Hex HMAC-SHA256 of `message` under `secret`.
pub fn sign(secret: &[u8], message: &str) -> String {
    let mut mac = keyed(secret);
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn keyed(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size")
}

/// Verifies `X-Signature` / `X-Timestamp` against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    clock: Arc<dyn Clock>,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            clock,
        }
    }

    /// Verify using the signature headers of `headers`.
    ///
    /// Empty or non-UTF-8 header values count as absent.
    pub fn verify_headers(
        &self,
        token: &str,
        method: &str,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<(), SignatureError> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        self.verify(token, method, path, header(X_SIGNATURE), header(X_TIMESTAMP))
    }

    /// Verify a presented signature and timestamp.
    ///
    /// # Errors
    /// * `MissingHeaders` - either value absent or empty
    /// * `InvalidTimestamp` - not a base-10 `i64`
    /// * `TimestampOutOfRange` - more than 300s from the clock, either direction
    /// * `MalformedSignature` - signature is not hex
    /// * `Mismatch` - HMAC does not match
    pub fn verify(
        &self,
        token: &str,
        method: &str,
        path: &str,
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<(), SignatureError> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.filter(|s| !s.is_empty())
        }
        let (Some(signature), Some(timestamp)) = (present(signature), present(timestamp)) else {
            return Err(SignatureError::MissingHeaders);
        };

        let declared: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;

        let skew_secs = self.clock.now_utc().timestamp().saturating_sub(declared);
        if skew_secs.unsigned_abs() > MAX_TIMESTAMP_SKEW_SECS {
            return Err(SignatureError::TimestampOutOfRange { skew_secs });
        }

        let presented = hex::decode(signature).map_err(|_| SignatureError::MalformedSignature)?;

        let mut mac = keyed(&self.secret);
        mac.update(canonical_message(token, timestamp, method, path).as_bytes());
        mac.verify_slice(&presented)
            .map_err(|_| SignatureError::Mismatch)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use axum::http::HeaderValue;

    const NOW: i64 = 1_700_000_000;
    const VECTOR_SIGNATURE: &str =
        "d698b215c25996ecba25642cc898573d46ae3b5d34321c22052e2d786a2c562a";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new("S", Arc::new(MockClock::from_unix(NOW)))
    }

    fn signed(ts: i64, method: &str, path: &str) -> (String, String) {
        let ts = ts.to_string();
        let sig = sign(b"S", &canonical_message("T", &ts, method, path));
        (sig, ts)
    }

    #[test]
    fn canonical_message_is_pipe_joined_in_order() {
        assert_eq!(
            canonical_message("T", "1700000000", "GET", "/api/v1/items"),
            "T|1700000000|GET|/api/v1/items"
        );
    }

    #[test]
    fn signed_path_decodes_and_drops_query() {
        assert_eq!(signed_path("/api/v1/items/%31"), "/api/v1/items/1");
        assert_eq!(signed_path("/api/v1/items?page=2"), "/api/v1/items");
        assert_eq!(signed_path("/a%20b/%2Fc"), "/a b//c");
        assert_eq!(signed_path("/plain"), "/plain");
        // Malformed escapes pass through untouched.
        assert_eq!(signed_path("/bad%zz"), "/bad%zz");
    }

    #[test]
    fn known_vector_signs_and_verifies() {
        let message = canonical_message("T", "1700000000", "GET", "/api/v1/items");
        assert_eq!(sign(b"S", &message), VECTOR_SIGNATURE);

        let result = verifier().verify(
            "T",
            "GET",
            "/api/v1/items",
            Some(VECTOR_SIGNATURE),
            Some("1700000000"),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let upper = VECTOR_SIGNATURE.to_uppercase();
        let result = verifier().verify("T", "GET", "/api/v1/items", Some(&upper), Some("1700000000"));
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn missing_or_empty_headers() {
        let v = verifier();
        assert_eq!(
            v.verify("T", "GET", "/", None, Some("1700000000")),
            Err(SignatureError::MissingHeaders)
        );
        assert_eq!(
            v.verify("T", "GET", "/", Some(VECTOR_SIGNATURE), None),
            Err(SignatureError::MissingHeaders)
        );
        assert_eq!(
            v.verify("T", "GET", "/", Some(""), Some("1700000000")),
            Err(SignatureError::MissingHeaders)
        );
    }

    #[test]
    fn unparseable_timestamp() {
        let result = verifier().verify("T", "GET", "/", Some(VECTOR_SIGNATURE), Some("yesterday"));
        assert_eq!(result, Err(SignatureError::InvalidTimestamp));
    }

    #[test]
    fn freshness_boundaries() {
        let v = verifier();
        for (offset, fresh) in [(-299, true), (-300, true), (-301, false), (299, true), (301, false)] {
            let (sig, ts) = signed(NOW + offset, "GET", "/api/v1/items");
            let result = v.verify("T", "GET", "/api/v1/items", Some(&sig), Some(&ts));
            assert_eq!(result.is_ok(), fresh, "offset {offset}");
            if !fresh {
                assert!(matches!(result, Err(SignatureError::TimestampOutOfRange { .. })));
            }
        }
    }

    #[test]
    fn extreme_timestamp_does_not_overflow() {
        let result = verifier().verify(
            "T",
            "GET",
            "/",
            Some(VECTOR_SIGNATURE),
            Some(&i64::MIN.to_string()),
        );
        assert!(matches!(result, Err(SignatureError::TimestampOutOfRange { .. })));
    }

    #[test]
    fn bad_hex_and_mismatch_are_forbidden() {
        let v = verifier();
        let malformed = v.verify("T", "GET", "/api/v1/items", Some("zz"), Some("1700000000"));
        assert_eq!(malformed, Err(SignatureError::MalformedSignature));
        assert_eq!(SignatureError::MalformedSignature.status(), StatusCode::FORBIDDEN);

        // Signed for GET, presented for POST.
        let mismatch = v.verify("T", "POST", "/api/v1/items", Some(VECTOR_SIGNATURE), Some("1700000000"));
        assert_eq!(mismatch, Err(SignatureError::Mismatch));
        assert_eq!(SignatureError::Mismatch.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn timestamp_is_signed_as_presented() {
        // "+1700000000" parses to the same instant but is a different message.
        let result = verifier().verify(
            "T",
            "GET",
            "/api/v1/items",
            Some(VECTOR_SIGNATURE),
            Some("+1700000000"),
        );
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn verification_is_independent_across_requests() {
        let v = verifier();
        let (sig_a, ts_a) = signed(NOW, "GET", "/a");
        let (sig_b, ts_b) = signed(NOW - 10, "DELETE", "/b");

        let b_alone = v.verify("T", "DELETE", "/b", Some(&sig_b), Some(&ts_b));
        assert!(v.verify("T", "GET", "/a", Some("00"), Some(&ts_a)).is_err());
        assert!(v.verify("T", "GET", "/a", Some(&sig_a), Some(&ts_a)).is_ok());
        let b_after = v.verify("T", "DELETE", "/b", Some(&sig_b), Some(&ts_b));

        assert_eq!(b_alone, b_after);
        assert!(b_after.is_ok());
    }

    #[test]
    fn reads_from_header_map() {
        let mut headers = HeaderMap::new();
        headers.insert(X_SIGNATURE, HeaderValue::from_static(VECTOR_SIGNATURE));
        headers.insert(X_TIMESTAMP, HeaderValue::from_static("1700000000"));
        assert_eq!(verifier().verify_headers("T", "GET", "/api/v1/items", &headers), Ok(()));

        headers.remove(X_TIMESTAMP);
        assert_eq!(
            verifier().verify_headers("T", "GET", "/api/v1/items", &headers),
            Err(SignatureError::MissingHeaders)
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", SignatureVerifier::new("hunter2", Arc::new(MockClock::from_unix(0))));
        assert!(!rendered.contains("hunter2"));
    }
}
