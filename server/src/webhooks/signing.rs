//! HMAC-SHA256 Webhook Signing
//!
//! Partners verify `X-Signature` by recomputing
//! `sha256=hex(hmac_sha256(secret, "{timestamp}.{body}"))` over the raw body.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Signature";

const SIGNATURE_PREFIX: &str = "sha256=";

fn mac_for(secret: &str, timestamp: i64, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

/// Sign a request body sent at `timestamp` (Unix seconds).
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let digest = mac_for(secret, timestamp, body).finalize().into_bytes();
    format!("{SIGNATURE_PREFIX}{}", hex::encode(digest))
}

/// Verify a `sha256=`-prefixed signature in constant time.
pub fn verify_signature(secret: &str, timestamp: i64, body: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(digest) = hex::decode(hex_digest) else {
        return false;
    };
    mac_for(secret, timestamp, body).verify_slice(&digest).is_ok()
}

/// `X-Timestamp` and `X-Signature` header pairs for a body signed now.
pub fn signature_headers(secret: &str, body: &[u8]) -> [(&'static str, String); 2] {
    let timestamp = chrono::Utc::now().timestamp();
    [
        (TIMESTAMP_HEADER, timestamp.to_string()),
        (SIGNATURE_HEADER, sign_payload(secret, timestamp, body)),
    ]
}
