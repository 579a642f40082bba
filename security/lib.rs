//! Webhook Security
//!
//! Authenticates inbound webhook calls signed with a pre-shared key:
//! - HMAC-SHA256 request signatures
//! - Timestamp freshness window
//! - Nonce-based replay rejection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               RequestAuthenticator                  │
//! ├─────────────────────────────────────────────────────┤
//! │  presence → timestamp → freshness → nonce → HMAC    │
//! └─────────────────────────────────────────────────────┘
//!          ↓                       ↓
//! ┌──────────────────┐   ┌──────────────────────────────┐
//! │   NonceStore     │   │  signature (HMAC, ct-compare) │
//! └──────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Signed Message
//!
//! ```text
//! X-Timestamp + "\n" + X-Nonce + "\n" + <raw request body bytes>
//! ```
//!
//! The signature is the lowercase hex HMAC-SHA256 of that message. Senders
//! must sign the body bytes they actually transmit.
//!
//! # Usage Example
//!
//! ```rust
//! use security::{AuthConfig, AuthError, RequestAuthenticator, SharedSecret, SignedRequest};
//!
//! let secret = SharedSecret::from("webhook-secret");
//! let authenticator = RequestAuthenticator::new(secret.clone(), AuthConfig::default());
//!
//! let now = chrono::Utc::now().timestamp().to_string();
//! let request = SignedRequest::signed(&secret, now, "nonce-1", &b"{}"[..]);
//!
//! assert_eq!(authenticator.validate_request(&request), Ok(()));
//! assert_eq!(
//!     authenticator.validate_request(&request),
//!     Err(AuthError::DuplicateNonce)
//! );
//! ```
//!
//! # Deployment Notes
//!
//! 1. **Tolerance vs. retention**
//!    - Retention is raised to at least the timestamp tolerance; a nonce that
//!      ages out is accepted again
//!    - Keep retention well above the tolerance to cover clock skew
//!
//! 2. **Secrets**
//!    - Never commit the shared secret to version control
//!    - Use different secrets per environment

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod authenticator;
pub mod clock;
pub mod error;
pub mod nonce_store;
pub mod signature;

// Re-exports for convenience
pub use authenticator::{AuthConfig, RequestAuthenticator, SignedRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, Header};
pub use nonce_store::{NonceStore, NonceStoreConfig};
pub use signature::{constant_time_eq, sign, signing_message, SharedSecret};
