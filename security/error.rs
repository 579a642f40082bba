//! Authentication errors

use std::fmt;
use thiserror::Error;

/// Result type for authentication
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Header {
    /// Claimed Unix timestamp (seconds)
    Timestamp,
    /// One-time token
    Nonce,
    /// Hex HMAC-SHA256 signature
    Signature,
}

impl Header {
    /// HTTP header name
    pub fn name(&self) -> &'static str {
        match self {
            Header::Timestamp => "X-Timestamp",
            Header::Nonce => "X-Nonce",
            Header::Signature => "X-Signature",
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reasons a signed request is refused
///
/// Every variant means "unauthorized"; none is worth retrying without a new
/// signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required header is absent or empty
    #[error("missing {0} header")]
    MissingHeader(Header),

    /// A header value holds bytes outside visible ASCII
    #[error("malformed {0} header: value must be visible ASCII")]
    MalformedHeader(Header),

    /// The timestamp is not a base-10 integer
    #[error("invalid X-Timestamp format: {0:?}")]
    InvalidTimestampFormat(String),

    /// The timestamp is too far from the current time, in either direction
    #[error("timestamp out of tolerance: difference is {skew_secs}s, max allowed is {tolerance_secs}s")]
    TimestampOutOfTolerance {
        /// Absolute clock difference in whole seconds
        skew_secs: i64,
        /// Configured tolerance in whole seconds
        tolerance_secs: i64,
    },

    /// The nonce was already used inside the retention window
    #[error("duplicate nonce detected: possible replay attack")]
    DuplicateNonce,

    /// The signature does not match the request
    #[error("invalid signature")]
    InvalidSignature,
}

impl AuthError {
    /// Stable short label, suitable for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingHeader(Header::Timestamp) => "missing_timestamp",
            AuthError::MissingHeader(Header::Nonce) => "missing_nonce",
            AuthError::MissingHeader(Header::Signature) => "missing_signature",
            AuthError::MalformedHeader(_) => "malformed_header",
            AuthError::InvalidTimestampFormat(_) => "invalid_timestamp_format",
            AuthError::TimestampOutOfTolerance { .. } => "timestamp_out_of_tolerance",
            AuthError::DuplicateNonce => "duplicate_nonce",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }
}
