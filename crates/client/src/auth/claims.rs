//! JWT expiry claim decoding
//!
//! The backend issues standard JWTs; the only claim the client cares about
//! is `exp`. Decoding happens locally (no signature verification, the
//! server remains the authority) purely to schedule proactive refreshes.
//!
//! Decoding is fail-safe: any malformed token reports [`ExpiryClaim::Invalid`],
//! which every caller treats as "expiring now" so a refresh is attempted
//! rather than a doomed request sent.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

/// Outcome of decoding the `exp` claim from a JWT access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryClaim {
    /// The token carried a numeric `exp` claim (seconds since UNIX epoch).
    Decoded {
        /// Expiry timestamp in epoch seconds
        exp: i64,
    },
    /// The token was not a well-formed JWT or carried no numeric `exp`.
    ///
    /// Callers treat this as already expired.
    Invalid,
}

impl ExpiryClaim {
    /// Expiry in epoch seconds, if one was decoded.
    #[must_use]
    pub const fn exp(&self) -> Option<i64> {
        match self {
            Self::Decoded { exp } => Some(*exp),
            Self::Invalid => None,
        }
    }
}

/// Decode the `exp` claim from a JWT without verifying its signature.
///
/// Requires exactly three dot-separated segments. The payload segment is
/// base64url-decoded (padding tolerated) and parsed as JSON; a missing or
/// non-numeric `exp` yields [`ExpiryClaim::Invalid`].
#[must_use]
pub fn decode_expiry(token: &str) -> ExpiryClaim {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return ExpiryClaim::Invalid;
    };

    // Some issuers pad the payload segment even though RFC 7515 forbids it.
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return ExpiryClaim::Invalid;
    };
    let Ok(claims) = serde_json::from_slice::<Value>(&bytes) else {
        return ExpiryClaim::Invalid;
    };

    match claims.get("exp").and_then(Value::as_i64) {
        Some(exp) => ExpiryClaim::Decoded { exp },
        None => ExpiryClaim::Invalid,
    }
}

/// Whether `token` expires within `buffer_secs` of `now_ms`.
///
/// An undecodable token counts as expiring so that callers refresh before
/// relying on it.
#[must_use]
pub fn expires_within(token: &str, buffer_secs: i64, now_ms: u64) -> bool {
    match decode_expiry(token) {
        ExpiryClaim::Decoded { exp } => {
            let remaining_ms = exp
                .saturating_mul(1000)
                .saturating_sub(i64::try_from(now_ms).unwrap_or(i64::MAX));
            remaining_ms <= buffer_secs.saturating_mul(1000)
        }
        ExpiryClaim::Invalid => true,
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for claims decoding.
    use super::*;

    fn make_token(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        format!("{header}.{body}.signature")
    }

    /// Validates `decode_expiry` behavior for the well-formed token
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the decoded claim equals `ExpiryClaim::Decoded` with `exp` 1700000000.
    #[test]
    fn test_decode_expiry_well_formed() {
        let token = make_token(r#"{"sub":"user-1","exp":1700000000}"#);
        assert_eq!(decode_expiry(&token), ExpiryClaim::Decoded { exp: 1_700_000_000 });
    }

    /// Validates `decode_expiry` behavior for tokens without three
    /// segments.
    ///
    /// Assertions:
    /// - Confirms `decode_expiry("not-a-jwt")` equals `ExpiryClaim::Invalid`.
    /// - Confirms a four-segment string decodes as `ExpiryClaim::Invalid`.
    #[test]
    fn test_decode_expiry_wrong_segment_count() {
        assert_eq!(decode_expiry("not-a-jwt"), ExpiryClaim::Invalid);
        assert_eq!(decode_expiry("a.b"), ExpiryClaim::Invalid);
        assert_eq!(decode_expiry("a.b.c.d"), ExpiryClaim::Invalid);
    }

    /// Validates `decode_expiry` behavior for a payload that is not valid
    /// base64url.
    ///
    /// Assertions:
    /// - Confirms the claim equals `ExpiryClaim::Invalid`.
    #[test]
    fn test_decode_expiry_bad_base64() {
        assert_eq!(decode_expiry("header.@@@@.signature"), ExpiryClaim::Invalid);
    }

    /// Validates `decode_expiry` behavior for a payload missing the `exp`
    /// claim.
    ///
    /// Assertions:
    /// - Confirms the claim equals `ExpiryClaim::Invalid`.
    #[test]
    fn test_decode_expiry_missing_exp() {
        let token = make_token(r#"{"sub":"user-1"}"#);
        assert_eq!(decode_expiry(&token), ExpiryClaim::Invalid);
    }

    /// Validates `decode_expiry` behavior for a non-numeric `exp` claim.
    ///
    /// Assertions:
    /// - Confirms the claim equals `ExpiryClaim::Invalid`.
    #[test]
    fn test_decode_expiry_non_numeric_exp() {
        let token = make_token(r#"{"exp":"soon"}"#);
        assert_eq!(decode_expiry(&token), ExpiryClaim::Invalid);
    }

    /// Validates `expires_within` behavior around the buffer boundary.
    ///
    /// Assertions:
    /// - Ensures a token expiring inside the buffer evaluates to true.
    /// - Ensures a token expiring outside the buffer evaluates to false.
    /// - Ensures a token exactly at the boundary evaluates to true.
    #[test]
    fn test_expires_within_boundary() {
        let now_ms: u64 = 1_700_000_000_000;
        let now_secs: i64 = 1_700_000_000;

        let inside = make_token(&format!(r#"{{"exp":{}}}"#, now_secs + 200));
        assert!(expires_within(&inside, 300, now_ms));

        let outside = make_token(&format!(r#"{{"exp":{}}}"#, now_secs + 400));
        assert!(!expires_within(&outside, 300, now_ms));

        let boundary = make_token(&format!(r#"{{"exp":{}}}"#, now_secs + 300));
        assert!(expires_within(&boundary, 300, now_ms));
    }

    /// Validates `expires_within` behavior for an already-expired token.
    ///
    /// Assertions:
    /// - Ensures the check evaluates to true even with a zero buffer.
    #[test]
    fn test_expires_within_past_expiry() {
        let token = make_token(r#"{"exp":1000}"#);
        assert!(expires_within(&token, 0, 1_700_000_000_000));
    }

    /// Validates `expires_within` behavior for `exp` claims at the
    /// extremes of the `i64` range.
    ///
    /// Assertions:
    /// - Ensures an `exp` of `i64::MIN` evaluates to expiring without
    ///   overflowing.
    /// - Ensures an `exp` of `i64::MAX` evaluates to not expiring.
    #[test]
    fn test_expires_within_extreme_exp_values() {
        let now_ms: u64 = 1_700_000_000_000;

        let far_past = make_token(&format!(r#"{{"exp":{}}}"#, i64::MIN));
        assert!(expires_within(&far_past, 300, now_ms));

        let far_future = make_token(&format!(r#"{{"exp":{}}}"#, i64::MAX));
        assert!(!expires_within(&far_future, 300, now_ms));
    }

    /// Validates `expires_within` behavior for an undecodable token.
    ///
    /// Assertions:
    /// - Ensures the fail-safe path evaluates to true.
    #[test]
    fn test_expires_within_invalid_token_counts_as_expiring() {
        assert!(expires_within("garbage", 300, 1_700_000_000_000));
    }

    /// Validates `decode_expiry` behavior for a padded payload segment.
    ///
    /// Assertions:
    /// - Confirms the claim equals `ExpiryClaim::Decoded` with `exp` 42.
    #[test]
    fn test_decode_expiry_tolerates_padding() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let body = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":42}"#);
        let token = format!("{header}.{body}.sig");
        assert_eq!(decode_expiry(&token), ExpiryClaim::Decoded { exp: 42 });
    }
}
