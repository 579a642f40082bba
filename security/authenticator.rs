//! Request Authenticator
//!
//! Decides whether an inbound webhook call is genuine. Checks run in a fixed
//! order and stop at the first failure:
//!
//! 1. Presence of timestamp, nonce and signature
//! 2. Timestamp parses as a base-10 integer
//! 3. `|now - timestamp|` within the tolerance (past and future alike)
//! 4. Nonce not seen inside the retention window (recorded on success)
//! 5. HMAC-SHA256 signature matches, compared in constant time
//!
//! The signature covers the exact timestamp and nonce presented, so a valid
//! signature cannot be paired with a different (timestamp, nonce).

use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, Header, Result};
use crate::nonce_store::{NonceStore, NonceStoreConfig};
use crate::signature::{constant_time_eq, sign, SharedSecret};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Authenticator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Maximum allowed clock difference between caller and server
    pub timestamp_tolerance: StdDuration,

    /// Replay guard settings
    pub nonce: NonceStoreConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance: StdDuration::from_secs(5 * 60),
            nonce: NonceStoreConfig::default(),
        }
    }
}

/// An inbound call as received: raw header values plus the untouched body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// `X-Timestamp` value
    pub timestamp: String,

    /// `X-Nonce` value
    pub nonce: String,

    /// `X-Signature` value
    pub signature: String,

    /// Body bytes exactly as received
    pub raw_body: Bytes,
}

impl SignedRequest {
    /// Assemble a request from its parts
    pub fn new(
        timestamp: impl Into<String>,
        nonce: impl Into<String>,
        signature: impl Into<String>,
        raw_body: impl Into<Bytes>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            nonce: nonce.into(),
            signature: signature.into(),
            raw_body: raw_body.into(),
        }
    }

    /// Build a correctly signed request, as a webhook sender would
    pub fn signed(
        secret: &SharedSecret,
        timestamp: impl Into<String>,
        nonce: impl Into<String>,
        raw_body: impl Into<Bytes>,
    ) -> Self {
        let (timestamp, nonce, raw_body) = (timestamp.into(), nonce.into(), raw_body.into());
        let signature = sign(secret, &timestamp, &nonce, &raw_body);
        Self {
            timestamp,
            nonce,
            signature,
            raw_body,
        }
    }
}

/// HMAC webhook authenticator with replay protection
#[derive(Debug)]
pub struct RequestAuthenticator {
    secret: SharedSecret,
    tolerance: Duration,
    nonces: NonceStore,
    clock: Arc<dyn Clock>,
}

impl RequestAuthenticator {
    /// Create an authenticator driven by the system clock
    pub fn new(secret: impl Into<SharedSecret>, config: AuthConfig) -> Self {
        Self::with_clock(secret, config, Arc::new(SystemClock))
    }

    /// Create an authenticator driven by `clock`
    ///
    /// The same clock drives nonce ageing. Nonce retention is raised to the
    /// timestamp tolerance when configured shorter, so every nonce stays
    /// recorded for as long as its request is fresh.
    pub fn with_clock(
        secret: impl Into<SharedSecret>,
        mut config: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if config.nonce.retention < config.timestamp_tolerance {
            tracing::warn!(
                retention_secs = config.nonce.retention.as_secs(),
                tolerance_secs = config.timestamp_tolerance.as_secs(),
                "Nonce retention shorter than timestamp tolerance, raising it"
            );
            config.nonce.retention = config.timestamp_tolerance;
        }

        Self {
            secret: secret.into(),
            tolerance: Duration::from_std(config.timestamp_tolerance).unwrap_or(Duration::MAX),
            nonces: NonceStore::with_clock(config.nonce, Arc::clone(&clock)),
            clock,
        }
    }

    /// Validate a received request
    pub fn validate_request(&self, request: &SignedRequest) -> Result<()> {
        self.validate(
            &request.timestamp,
            &request.nonce,
            &request.signature,
            &request.raw_body,
        )
    }

    /// Validate raw header values against the body
    pub fn validate(
        &self,
        timestamp: &str,
        nonce: &str,
        signature: &str,
        body: &[u8],
    ) -> Result<()> {
        if timestamp.is_empty() {
            return Err(AuthError::MissingHeader(Header::Timestamp));
        }
        if nonce.is_empty() {
            return Err(AuthError::MissingHeader(Header::Nonce));
        }
        if signature.is_empty() {
            return Err(AuthError::MissingHeader(Header::Signature));
        }

        let claimed_secs: i64 = timestamp
            .parse()
            .map_err(|_| AuthError::InvalidTimestampFormat(timestamp.to_string()))?;

        let claimed = self.check_freshness(claimed_secs)?;

        if !self.nonces.consume_if_unseen(nonce, claimed) {
            tracing::warn!(nonce, timestamp = claimed_secs, "Duplicate nonce detected (replay attack)");
            return Err(AuthError::DuplicateNonce);
        }

        let expected = sign(&self.secret, timestamp, nonce, body);
        if !constant_time_eq(&expected, signature) {
            tracing::warn!(nonce, timestamp = claimed_secs, "Invalid signature");
            return Err(AuthError::InvalidSignature);
        }

        Ok(())
    }

    /// Configured tolerance
    pub fn tolerance(&self) -> StdDuration {
        self.tolerance.to_std().unwrap_or(StdDuration::MAX)
    }

    /// Replay guard backing this authenticator
    pub fn nonce_store(&self) -> &NonceStore {
        &self.nonces
    }

    fn check_freshness(&self, claimed_secs: i64) -> Result<DateTime<Utc>> {
        let now = self.clock.now();
        let tolerance_secs = self.tolerance.num_seconds();

        let Some(claimed) = DateTime::from_timestamp(claimed_secs, 0) else {
            let skew_secs = i64::try_from((i128::from(now.timestamp()) - i128::from(claimed_secs)).abs())
                .unwrap_or(i64::MAX);
            tracing::warn!(timestamp = claimed_secs, "Request timestamp out of representable range");
            return Err(AuthError::TimestampOutOfTolerance {
                skew_secs,
                tolerance_secs,
            });
        };

        let mut skew = now.signed_duration_since(claimed);
        if skew < Duration::zero() {
            skew = -skew;
        }

        if skew > self.tolerance {
            tracing::warn!(
                timestamp = claimed_secs,
                current_time = now.timestamp(),
                difference_seconds = skew.num_seconds(),
                tolerance_seconds = tolerance_secs,
                "Request timestamp out of tolerance"
            );
            return Err(AuthError::TimestampOutOfTolerance {
                skew_secs: skew.num_seconds(),
                tolerance_secs,
            });
        }

        Ok(claimed)
    }
}
