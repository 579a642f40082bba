//! Error types for the ledger

use std::fmt;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Amount text is not a decimal number
    #[error("Invalid amount format {amount:?}: {reason}")]
    InvalidAmountFormat {
        /// The rejected literal
        amount: String,
        /// Why it was rejected
        reason: String,
    },

    /// Adding the amount would leave the representable decimal range
    #[error("Balance overflow for {user}/{asset}")]
    Overflow {
        /// Account owner
        user: String,
        /// Account asset
        asset: String,
    },

    /// The exact balance needs more significant digits than a decimal holds
    #[error("Balance precision exceeded for {user}/{asset}")]
    PrecisionLoss {
        /// Account owner
        user: String,
        /// Account asset
        asset: String,
    },
}

impl Error {
    pub(crate) fn invalid_amount(amount: &str, reason: impl Into<String>) -> Self {
        Error::InvalidAmountFormat {
            amount: amount.to_string(),
            reason: reason.into(),
        }
    }
}

/// Transaction field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `user`
    User,
    /// `asset`
    Asset,
    /// `amount`
    Amount,
}

impl Field {
    /// Field name as it appears in the request body
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::User => "user",
            Field::Asset => "asset",
            Field::Amount => "amount",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction validation errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or empty
    #[error("missing required field: {0}")]
    MissingField(Field),
}
