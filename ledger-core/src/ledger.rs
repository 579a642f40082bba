//! Balance ledger
//!
//! Holds every (user, asset) balance plus the append-only audit trail behind
//! one reader/writer lock. `add_entry` takes the write path so concurrent
//! read-modify-write cycles never interleave; queries take the read path and
//! hand back copies.
//!
//! # Example
//!
//! ```
//! use ledger_core::{Ledger, Transaction, UserId};
//!
//! let ledger = Ledger::new();
//! let tx = Transaction::new("user1", "BTC", "100.5").unwrap();
//! let balance = ledger.add_entry(&tx).unwrap();
//! assert_eq!(balance.to_string(), "100.50000000");
//!
//! let snapshot = ledger.get_balance(&UserId::new("user1"));
//! assert_eq!(snapshot.get("BTC").unwrap().to_string(), "100.50000000");
//! ```

use crate::{
    error::{Error, Result},
    types::{
        parse_amount, AddError, AssetId, AuditEntry, Balance, BalanceSnapshot, Transaction, UserId,
    },
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// State guarded by the ledger lock
#[derive(Debug, Default)]
struct LedgerState {
    /// user -> asset -> balance
    balances: HashMap<UserId, BTreeMap<AssetId, Balance>>,

    /// Accepted entries in acceptance order
    entries: Vec<AuditEntry>,
}

/// In-memory balance ledger
#[derive(Debug, Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transaction to its account and return the new balance
    ///
    /// The balance update and the audit append happen under the same write
    /// guard; on error neither is applied.
    pub fn add_entry(&self, tx: &Transaction) -> Result<Balance> {
        let amount = parse_amount(&tx.amount).map_err(|err| {
            tracing::warn!(
                user = %tx.user,
                asset = %tx.asset,
                amount = %tx.amount,
                error = %err,
                "Rejected ledger entry"
            );
            err
        })?;

        let mut state = self.state.write();

        let current = state
            .balances
            .get(&tx.user)
            .and_then(|assets| assets.get(&tx.asset))
            .copied()
            .unwrap_or(Balance::ZERO);

        let new_balance = current.checked_add(amount).map_err(|failure| {
            tracing::warn!(
                user = %tx.user,
                asset = %tx.asset,
                current = %current,
                amount = %tx.amount,
                ?failure,
                "Ledger entry cannot be applied exactly"
            );
            let (user, asset) = (tx.user.to_string(), tx.asset.to_string());
            match failure {
                AddError::Overflow => Error::Overflow { user, asset },
                AddError::Inexact => Error::PrecisionLoss { user, asset },
            }
        })?;

        state
            .balances
            .entry(tx.user.clone())
            .or_default()
            .insert(tx.asset.clone(), new_balance);

        let sequence = state.entries.len() as u64;
        state.entries.push(AuditEntry {
            sequence,
            entry_id: Uuid::now_v7(),
            user: tx.user.clone(),
            asset: tx.asset.clone(),
            amount,
            balance_after: new_balance,
            recorded_at: Utc::now(),
        });

        tracing::info!(
            user = %tx.user,
            asset = %tx.asset,
            amount = %tx.amount,
            new_balance = %new_balance,
            sequence,
            "Balance updated"
        );

        Ok(new_balance)
    }

    /// Copy of every balance held by `user`
    ///
    /// An unknown user yields an empty snapshot.
    pub fn get_balance(&self, user: &UserId) -> BalanceSnapshot {
        let state = self.state.read();

        match state.balances.get(user) {
            Some(assets) => BalanceSnapshot {
                user: user.clone(),
                balances: assets.clone(),
            },
            None => BalanceSnapshot::empty(user.clone()),
        }
    }

    /// Copy of the audit trail in acceptance order
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.state.read().entries.clone()
    }

    /// Number of accepted entries
    pub fn audit_len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Number of (user, asset) accounts
    pub fn account_count(&self) -> usize {
        self.state
            .read()
            .balances
            .values()
            .map(BTreeMap::len)
            .sum()
    }
}
