//! Webhook Pipeline
//!
//! Authenticate → decode → validate → post to the ledger. Each pipeline owns
//! its authenticator and ledger handles; two pipelines never share nonce or
//! balance state unless they are built from the same handles.

use ledger_core::{Balance, BalanceSnapshot, Ledger, Transaction, UserId, ValidationError};
use security::{AuthError, RequestAuthenticator, SignedRequest};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Reasons a webhook call is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// Signature, freshness or replay check failed
    #[error("validation failed: {0}")]
    Unauthorized(#[from] AuthError),

    /// Body is not a JSON object of the expected shape
    #[error("invalid JSON body: {0}")]
    MalformedBody(String),

    /// A transaction field is missing
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The ledger refused the entry
    #[error("failed to process webhook: {0}")]
    Ledger(#[from] ledger_core::Error),
}

impl ProcessError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            ProcessError::Unauthorized(_) => 401,
            ProcessError::MalformedBody(_) | ProcessError::Validation(_) => 400,
            ProcessError::Ledger(_) => 500,
        }
    }

    /// Stable short label, suitable for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ProcessError::Unauthorized(e) => e.reason(),
            ProcessError::MalformedBody(_) => "malformed_body",
            ProcessError::Validation(ValidationError::MissingField(_)) => "missing_field",
            ProcessError::Ledger(ledger_core::Error::InvalidAmountFormat { .. }) => {
                "invalid_amount"
            }
            ProcessError::Ledger(ledger_core::Error::Overflow { .. }) => "balance_overflow",
            ProcessError::Ledger(ledger_core::Error::PrecisionLoss { .. }) => "precision_loss",
        }
    }
}

/// Webhook body. Absent or null fields decode as empty and are reported by
/// transaction validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WebhookPayload {
    user: Option<String>,
    asset: Option<String>,
    amount: Option<String>,
}

/// Authenticated path from a signed request to a ledger entry
#[derive(Debug, Clone)]
pub struct WebhookPipeline {
    authenticator: Arc<RequestAuthenticator>,
    ledger: Arc<Ledger>,
}

impl WebhookPipeline {
    /// Build a pipeline over the given authenticator and ledger
    pub fn new(authenticator: Arc<RequestAuthenticator>, ledger: Arc<Ledger>) -> Self {
        Self {
            authenticator,
            ledger,
        }
    }

    /// Authenticate `request` and apply its transaction
    ///
    /// Returns the resulting balance of the touched account. On any error
    /// the ledger is unchanged; a nonce consumed by authentication stays
    /// consumed.
    pub fn process(&self, request: &SignedRequest) -> Result<Balance, ProcessError> {
        self.authenticator.validate_request(request)?;

        let payload: WebhookPayload = serde_json::from_slice(&request.raw_body)
            .map_err(|e| ProcessError::MalformedBody(e.to_string()))?;

        let tx = Transaction::new(
            payload.user.unwrap_or_default(),
            payload.asset.unwrap_or_default(),
            payload.amount.unwrap_or_default(),
        )?;

        let balance = self.ledger.add_entry(&tx)?;

        tracing::info!(
            user = %tx.user,
            asset = %tx.asset,
            amount = %tx.amount,
            balance = %balance,
            "Webhook processed successfully"
        );

        Ok(balance)
    }

    /// Current balances of `user`; no authentication involved
    pub fn balance(&self, user: &UserId) -> BalanceSnapshot {
        self.ledger.get_balance(user)
    }

    /// Authenticator backing this pipeline
    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    /// Ledger backing this pipeline
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}
