//! Stripe webhook signature scheme.
//!
//! Header format: `t=<unix timestamp>,v1=<hex signature>[,v1=...]`. The signature is
//! HMAC-SHA256 keyed with the endpoint secret over `<t>.` followed by the exact raw body.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify `signature_header` against the raw `payload` at the current time.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    tolerance_secs: i64,
) -> AppResult<()> {
    verify_webhook_signature_at(
        payload,
        signature_header,
        webhook_secret,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    )
}

pub fn verify_webhook_signature_at(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::InvalidSignature("Missing timestamp".into()))?;

    if signatures.is_empty() {
        return Err(AppError::InvalidSignature("Missing v1 signature".into()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::InvalidSignature("Invalid timestamp".into()))?;

    let expected = compute_signature(webhook_secret, timestamp, payload)?;

    if !signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        return Err(AppError::InvalidSignature("Signature mismatch".into()));
    }

    // Only age is bounded; clock skew ahead of us is tolerated.
    if now - ts > tolerance_secs {
        return Err(AppError::InvalidSignature(
            "Timestamp outside tolerance".into(),
        ));
    }

    Ok(())
}

/// Produce a signature header for `payload`, in the format the processor sends.
pub fn sign_webhook_payload(secret: &str, timestamp: i64, payload: &[u8]) -> AppResult<String> {
    let signature = compute_signature(secret, &timestamp.to_string(), payload)?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

fn compute_signature(secret: &str, timestamp: &str, payload: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
