//! Webhook signature verification.
//!
//! Briq signs every delivery with `X-Briq-Signature:
//! t=<unix-seconds>,s1=<base64 hmac>[,s1=...]`, where each digest is
//! HMAC-SHA256 over the string `"{timestamp}.{raw body}"`. Verification fails
//! closed: no configured secret means no webhook is ever accepted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("webhook secret is not configured, deliveries are disabled")]
    MissingSecret,
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),
    #[error("signature timestamp outside tolerance window ({skew_secs}s skew, {tolerance_secs}s allowed)")]
    StaleTimestamp {
        skew_secs: i64,
        tolerance_secs: i64,
    },
    #[error("no signature digest matched")]
    Mismatch,
}

/// Verify a raw webhook body against its signature header.
///
/// Pure check: no side effects, nothing cryptographic is logged. The caller
/// rejects the HTTP request on `Err`.
pub fn verify(
    raw_body: &[u8],
    signature_header: &str,
    secret: Option<&[u8]>,
    tolerance: Duration,
) -> Result<(), SignatureError> {
    let secret = secret.ok_or(SignatureError::MissingSecret)?;
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    let (timestamp, digests) = parse_header(signature_header)?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SignatureError::MalformedHeader(format!("system clock error: {}", e)))?
        .as_secs() as i64;
    let skew = (now - timestamp).abs();
    let tolerance_secs = tolerance.as_secs() as i64;
    if skew > tolerance_secs {
        return Err(SignatureError::StaleTimestamp {
            skew_secs: skew,
            tolerance_secs,
        });
    }

    let expected = compute_digest(secret, timestamp, raw_body);

    let any_match = digests.iter().any(|candidate| {
        BASE64
            .decode(candidate)
            .map(|decoded| secure_eq(&decoded, &expected))
            .unwrap_or(false)
    });

    if any_match {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Compute the raw HMAC digest for `"{timestamp}.{body}"`. Exposed so tests
/// and tooling can build valid headers.
pub fn compute_digest(secret: &[u8], timestamp: i64, raw_body: &[u8]) -> Vec<u8> {
    // new_from_slice only fails for zero-length keys, which verify rejects
    // beforehand.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any non-empty key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    mac.finalize().into_bytes().to_vec()
}

/// Build a `t=...,s1=...` header for the given body. Used by tests.
pub fn sign_header(secret: &[u8], timestamp: i64, raw_body: &[u8]) -> String {
    let digest = compute_digest(secret, timestamp, raw_body);
    format!("t={},s1={}", timestamp, BASE64.encode(digest))
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut digests: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(value)) => {
                timestamp = Some(value.parse().map_err(|_| {
                    SignatureError::MalformedHeader("timestamp is not an integer".to_string())
                })?);
            }
            (Some("s1"), Some(value)) => digests.push(value),
            // Unknown keys are ignored so the gateway can extend the scheme.
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| SignatureError::MalformedHeader("missing timestamp field".to_string()))?;
    if digests.is_empty() {
        return Err(SignatureError::MalformedHeader(
            "no s1 digest present".to_string(),
        ));
    }

    Ok((timestamp, digests))
}

/// Constant-time byte comparison.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
