//! Webhook Signatures
//!
//! HMAC-SHA256 over `timestamp + "\n" + nonce + "\n" + body`, hex encoded.
//! The body is the exact byte sequence received, never a re-serialized form.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Pre-shared HMAC key
#[derive(Clone)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wrap raw key material
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }

    /// True when no key material is present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size")
    }
}

impl From<&str> for SharedSecret {
    fn from(key: &str) -> Self {
        Self::new(key.as_bytes())
    }
}

impl From<String> for SharedSecret {
    fn from(key: String) -> Self {
        Self::new(key.into_bytes())
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Bytes covered by the signature
pub fn signing_message(timestamp: &str, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + nonce.len() + body.len() + 2);
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(nonce.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(body);
    message
}

/// Lowercase hex HMAC-SHA256 signature for a request
pub fn sign(secret: &SharedSecret, timestamp: &str, nonce: &str, body: &[u8]) -> String {
    let mut mac = secret.mac();
    mac.update(&signing_message(timestamp, nonce, body));
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison
///
/// Both operands are padded to the longer length with different fill bytes so
/// neither the position of the first mismatch nor a length difference
/// short-circuits the comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
