//! HMAC-SHA256 verification for Standard Webhooks.
//!
//! Transactional email providers report delivery events with the Standard Webhooks scheme:
//! - Signature is computed over: `{msg_id}.{timestamp}.{payload}`
//! - The signature is base64-encoded HMAC-SHA256, sent as `v1,{sig}`; several may be
//!   space-separated during secret rotation
//! - Headers: `webhook-id`, `webhook-timestamp`, `webhook-signature`
//!
//! See: <https://www.standardwebhooks.com/>

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix for webhook secrets
pub const SECRET_PREFIX: &str = "whsec_";

/// Accepted distance between the webhook timestamp and now, in seconds
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing or malformed {0} header")]
    MissingHeader(&'static str),
    #[error("webhook timestamp outside the tolerance window")]
    TimestampOutOfRange,
    #[error("no matching signature")]
    InvalidSignature,
}

/// Extract the raw secret bytes from a `whsec_` prefixed secret.
///
/// Returns `None` if the secret doesn't have the correct prefix or invalid base64.
pub fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let encoded = secret.strip_prefix(SECRET_PREFIX)?;
    BASE64_STANDARD.decode(encoded).ok()
}

/// Sign a payload, returning `v1,{base64-hmac-sha256}`
pub fn sign_payload(msg_id: &str, timestamp: i64, payload: &[u8], secret: &str) -> Option<String> {
    let secret_bytes = decode_secret(secret)?;

    let mut mac = HmacSha256::new_from_slice(&secret_bytes).ok()?;
    mac.update(format!("{msg_id}.{timestamp}.").as_bytes());
    mac.update(payload);
    let signature = mac.finalize().into_bytes();

    Some(format!("v1,{}", BASE64_STANDARD.encode(signature)))
}

/// Verify a delivery against its headers.
///
/// `signature_header` may hold several space-separated signatures; any `v1` match is accepted.
pub fn verify(
    msg_id: &str,
    timestamp_header: &str,
    signature_header: &str,
    payload: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), VerifyError> {
    if msg_id.is_empty() {
        return Err(VerifyError::MissingHeader("webhook-id"));
    }
    let timestamp: i64 = timestamp_header
        .trim()
        .parse()
        .map_err(|_| VerifyError::MissingHeader("webhook-timestamp"))?;

    // A skew too large to represent is out of range too
    let skew = now.checked_sub(timestamp).map(i64::unsigned_abs);
    if !skew.is_some_and(|skew| skew <= TIMESTAMP_TOLERANCE_SECS.unsigned_abs()) {
        return Err(VerifyError::TimestampOutOfRange);
    }

    let expected = sign_payload(msg_id, timestamp, payload, secret).ok_or(VerifyError::InvalidSignature)?;
    let Some(expected_value) = expected.strip_prefix("v1,") else {
        return Err(VerifyError::InvalidSignature);
    };

    let matched = signature_header
        .split_whitespace()
        .filter_map(|candidate| candidate.strip_prefix("v1,"))
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected_value.as_bytes()));

    if matched { Ok(()) } else { Err(VerifyError::InvalidSignature) }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
