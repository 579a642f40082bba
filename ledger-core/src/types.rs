//! Core types for the ledger
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money)
//! - Stable JSON rendering (balances as fixed-scale strings)
//! - Cheap copying into caller-owned snapshots

use crate::error::{Error, Field, ValidationError};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fractional digits every stored and rendered balance carries
pub const BALANCE_SCALE: u32 = 8;

/// Largest exponent magnitude accepted in scientific notation
const MAX_EXPONENT: u32 = 56;

/// User identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Asset identifier (ticker, token symbol, etc.)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Create new asset ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A credit (positive amount) or debit (negative amount) against one account
///
/// The amount keeps the caller's literal text. It is parsed when the ledger
/// applies the transaction, so a malformed amount surfaces as a ledger error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account owner
    pub user: UserId,
    /// Account asset
    pub asset: AssetId,
    /// Signed decimal literal, e.g. `"100.5"` or `"-50.0"`
    pub amount: String,
}

impl Transaction {
    /// Build a transaction, rejecting the first empty field (user, asset, amount)
    pub fn new(
        user: impl Into<String>,
        asset: impl Into<String>,
        amount: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let (user, asset, amount) = (user.into(), asset.into(), amount.into());

        if user.is_empty() {
            return Err(ValidationError::MissingField(Field::User));
        }
        if asset.is_empty() {
            return Err(ValidationError::MissingField(Field::Asset));
        }
        if amount.is_empty() {
            return Err(ValidationError::MissingField(Field::Amount));
        }

        Ok(Self {
            user: UserId(user),
            asset: AssetId(asset),
            amount,
        })
    }
}

/// Parse a signed decimal literal
///
/// Accepts an optional sign, digits with at most one decimal point, and an
/// optional `e`/`E` exponent. Anything else, including surrounding
/// whitespace and digit separators, is rejected.
pub fn parse_amount(text: &str) -> Result<Decimal, Error> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
        None => (text, None),
    };

    check_mantissa(text, mantissa)?;

    let value = Decimal::from_str(mantissa)
        .map_err(|e| Error::invalid_amount(text, e.to_string()))?;

    match exponent {
        None => Ok(value),
        Some(exp) => apply_exponent(text, value, exp),
    }
}

fn check_mantissa(text: &str, mantissa: &str) -> Result<(), Error> {
    let unsigned = mantissa
        .strip_prefix(['+', '-'])
        .unwrap_or(mantissa);

    if unsigned.is_empty() {
        return Err(Error::invalid_amount(text, "no digits"));
    }

    let mut digits = 0usize;
    let mut points = 0usize;
    for c in unsigned.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => points += 1,
            _ => return Err(Error::invalid_amount(text, format!("unexpected character {c:?}"))),
        }
    }

    if digits == 0 {
        return Err(Error::invalid_amount(text, "no digits"));
    }
    if points > 1 {
        return Err(Error::invalid_amount(text, "more than one decimal point"));
    }
    Ok(())
}

fn apply_exponent(text: &str, mut value: Decimal, exp: &str) -> Result<Decimal, Error> {
    let unsigned = exp.strip_prefix(['+', '-']).unwrap_or(exp);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_amount(text, "malformed exponent"));
    }

    let power: i64 = exp
        .parse()
        .map_err(|_| Error::invalid_amount(text, "malformed exponent"))?;
    if power.unsigned_abs() > u64::from(MAX_EXPONENT) {
        return Err(Error::invalid_amount(text, "exponent out of range"));
    }

    let ten = Decimal::TEN;
    for _ in 0..power.unsigned_abs() {
        value = if power > 0 {
            value.checked_mul(ten)
        } else {
            value.checked_div(ten)
        }
        .ok_or_else(|| Error::invalid_amount(text, "value out of range"))?;
    }
    Ok(value)
}

/// Account balance held at exactly [`BALANCE_SCALE`] fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Balance(Decimal);

impl Balance {
    /// Zero balance
    pub const ZERO: Balance = Balance(Decimal::ZERO);

    /// Normalize a decimal to the ledger scale, rounding half away from zero
    pub fn from_decimal(value: Decimal) -> Self {
        let mut value =
            value.round_dp_with_strategy(BALANCE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        if value.is_zero() {
            value.set_sign_positive(true);
        }
        Self(value)
    }

    /// Underlying decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Add a signed amount
    ///
    /// Fails when the sum leaves the decimal range, or when it needs more
    /// significant digits than a decimal holds and would otherwise be
    /// rounded silently.
    pub fn checked_add(&self, amount: Decimal) -> Result<Balance, AddError> {
        let sum = self.0.checked_add(amount).ok_or(AddError::Overflow)?;

        // rust_decimal rounds sums that need more than 28 digits
        if sum.checked_sub(self.0) != Some(amount) {
            return Err(AddError::Inexact);
        }

        Ok(Balance::from_decimal(sum))
    }
}

/// Why a balance addition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddError {
    /// The sum is outside the decimal range
    Overflow,
    /// The sum cannot be held without dropping digits
    Inexact,
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.prec$}", self.0, prec = BALANCE_SCALE as usize)
    }
}

impl FromStr for Balance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s).map(Balance::from_decimal)
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable record of one accepted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in acceptance order, starting at 0
    pub sequence: u64,

    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Account owner
    pub user: UserId,

    /// Account asset
    pub asset: AssetId,

    /// Parsed signed amount as applied
    pub amount: Decimal,

    /// Account balance right after this entry
    pub balance_after: Balance,

    /// When the ledger accepted the entry
    pub recorded_at: DateTime<Utc>,
}

/// Point-in-time copy of every balance a user holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Account owner
    pub user: UserId,

    /// Asset -> balance
    pub balances: BTreeMap<AssetId, Balance>,
}

impl BalanceSnapshot {
    /// Snapshot for a user with no history
    pub fn empty(user: UserId) -> Self {
        Self {
            user,
            balances: BTreeMap::new(),
        }
    }

    /// Balance for one asset
    pub fn get(&self, asset: &str) -> Option<&Balance> {
        self.balances.get(asset)
    }

    /// Number of assets held
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// True when the user has no accounts
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_requires_fields_in_order() {
        assert_eq!(
            Transaction::new("", "", ""),
            Err(ValidationError::MissingField(Field::User))
        );
        assert_eq!(
            Transaction::new("user1", "", ""),
            Err(ValidationError::MissingField(Field::Asset))
        );
        assert_eq!(
            Transaction::new("user1", "BTC", ""),
            Err(ValidationError::MissingField(Field::Amount))
        );

        let tx = Transaction::new("user1", "BTC", "100.5").unwrap();
        assert_eq!(tx.user.as_str(), "user1");
        assert_eq!(tx.asset.as_str(), "BTC");
        assert_eq!(tx.amount, "100.5");
    }

    #[test]
    fn test_parse_amount_accepts_decimal_literals() {
        assert_eq!(parse_amount("100.5").unwrap(), Decimal::new(1005, 1));
        assert_eq!(parse_amount("-50.0").unwrap(), Decimal::new(-500, 1));
        assert_eq!(parse_amount("+7").unwrap(), Decimal::new(7, 0));
        assert_eq!(parse_amount("0.00000001").unwrap(), Decimal::new(1, 8));
    }

    #[test]
    fn test_parse_amount_scientific_notation() {
        assert_eq!(parse_amount("1e-8").unwrap(), Decimal::new(1, 8));
        assert_eq!(parse_amount("1.5E3").unwrap(), Decimal::new(1500, 0));
        assert_eq!(parse_amount("-2e+2").unwrap(), Decimal::new(-200, 0));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        for bad in [
            "", "abc", "-", ".", "1.2.3", " 1", "1 ", "1_000", "1e", "1e-", "0x10", "1e999", "NaN",
        ] {
            assert!(
                matches!(parse_amount(bad), Err(Error::InvalidAmountFormat { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_balance_renders_eight_digits() {
        assert_eq!(Balance::ZERO.to_string(), "0.00000000");
        assert_eq!("100.5".parse::<Balance>().unwrap().to_string(), "100.50000000");
        assert_eq!("-3".parse::<Balance>().unwrap().to_string(), "-3.00000000");
    }

    #[test]
    fn test_balance_rounds_half_away_from_zero() {
        assert_eq!(
            "0.000000005".parse::<Balance>().unwrap().to_string(),
            "0.00000001"
        );
        assert_eq!(
            "-0.000000005".parse::<Balance>().unwrap().to_string(),
            "-0.00000001"
        );
        assert_eq!(
            "0.000000004".parse::<Balance>().unwrap().to_string(),
            "0.00000000"
        );
    }

    #[test]
    fn test_balance_never_renders_negative_zero() {
        let balance = Balance::from_decimal(Decimal::new(-1, 10));
        assert_eq!(balance.to_string(), "0.00000000");

        let back_to_zero = Balance::from_decimal(Decimal::ONE)
            .checked_add(Decimal::NEGATIVE_ONE)
            .unwrap();
        assert_eq!(back_to_zero.to_string(), "0.00000000");
    }

    #[test]
    fn test_checked_add_refuses_rounded_sums() {
        let big: Balance = "1000000000000000000000".parse().unwrap();
        let tiny = parse_amount("0.00000001").unwrap();

        assert_eq!(big.checked_add(tiny), Err(AddError::Inexact));
        assert_eq!(
            Balance::from_decimal(Decimal::MAX).checked_add(Decimal::MAX),
            Err(AddError::Overflow)
        );

        // Same magnitude, but the sum still fits in 28 digits
        let fits: Balance = "10000000000000000000".parse().unwrap();
        assert_eq!(
            fits.checked_add(tiny).unwrap().to_string(),
            "10000000000000000000.00000001"
        );
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut snapshot = BalanceSnapshot::empty(UserId::new("user1"));
        snapshot
            .balances
            .insert(AssetId::new("BTC"), "100.5".parse().unwrap());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"user": "user1", "balances": {"BTC": "100.50000000"}})
        );

        let back: BalanceSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
