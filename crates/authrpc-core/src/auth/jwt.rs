//! Expiry inspection for JWT bearer tokens.
//!
//! Only the `exp` claim is read. Signatures are not verified; the node does
//! that. Opaque (non-JWT) tokens simply have no decodable expiry.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

/// The `exp` claim (UNIX seconds) of a JWT, if one can be decoded.
pub fn expiry(token: &str) -> Option<u64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    exp.as_u64().or_else(|| exp.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// `true` only when an expiry was decoded and `now_secs` has reached it.
pub fn is_expired_at(token: &str, now_secs: u64) -> bool {
    expiry(token).is_some_and(|exp| now_secs >= exp)
}

pub fn is_expired(token: &str) -> bool {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    is_expired_at(token, now)
}
