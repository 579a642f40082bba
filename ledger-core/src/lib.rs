//! Balance Ledger Core
//!
//! In-memory ledger of signed decimal balances keyed by (user, asset).
//!
//! # Architecture
//!
//! - **Exact arithmetic**: Balances are `Decimal`, never binary floating point
//! - **Single lock**: One reader/writer lock linearizes every mutation
//! - **Audit trail**: Every accepted transaction is appended in acceptance order
//! - **Snapshots**: Readers receive copies, never references into ledger state
//!
//! # Invariants
//!
//! - Balances are always held at exactly 8 fractional digits
//! - N concurrent additions of A to one account yield exactly N×A
//! - A failed entry changes neither balances nor the audit trail
//! - Accounts are created lazily and never deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod ledger;
pub mod types;

// Re-exports
pub use error::{Error, Field, Result, ValidationError};
pub use ledger::Ledger;
pub use types::{
    parse_amount, AddError, AssetId, AuditEntry, Balance, BalanceSnapshot, Transaction, UserId,
    BALANCE_SCALE,
};
