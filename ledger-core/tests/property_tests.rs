//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Exact accumulation: a then b yields a + b at 8 fractional digits
//! - Atomicity: rejected amounts change neither balances nor the audit trail
//! - Linearizability: concurrent additions never lose updates
//! - Isolation: accounts for other (user, asset) pairs are untouched

use ledger_core::{Balance, Error, Ledger, Transaction, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Strategy for signed amounts with up to 8 fractional digits
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000_000_000i64..1_000_000_000_000_000i64, 0u32..=8)
        .prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

/// Strategy for literals the amount parser must reject
fn garbage_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z]{1,8}",
        "[0-9]{1,4}\\.[0-9]{1,4}\\.[0-9]{1,4}",
        " [0-9]{1,6}",
        "[0-9]{1,6} ",
        "[0-9]{1,3}_[0-9]{3}",
        Just("-".to_string()),
        Just("+.".to_string()),
    ]
}

fn tx(user: &str, asset: &str, amount: impl ToString) -> Transaction {
    Transaction::new(user, asset, amount.to_string()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: a then b on one account yields exactly a + b
    #[test]
    fn prop_sequential_entries_sum_exactly(a in amount_strategy(), b in amount_strategy()) {
        let ledger = Ledger::new();

        ledger.add_entry(&tx("user1", "BTC", a)).unwrap();
        let balance = ledger.add_entry(&tx("user1", "BTC", b)).unwrap();

        prop_assert_eq!(balance, Balance::from_decimal(a + b));
        prop_assert_eq!(balance.as_decimal(), a + b);
    }

    /// Property: the rendered balance always carries exactly 8 fractional digits
    #[test]
    fn prop_rendered_balance_has_fixed_scale(a in amount_strategy()) {
        let ledger = Ledger::new();
        let rendered = ledger.add_entry(&tx("user1", "BTC", a)).unwrap().to_string();

        let (_, fraction) = rendered.split_once('.').unwrap();
        prop_assert_eq!(fraction.len(), 8);
        prop_assert_eq!(rendered.parse::<Decimal>().unwrap(), a);
    }

    /// Property: a rejected amount leaves balances and audit trail unchanged
    #[test]
    fn prop_invalid_amount_is_atomic(seed in amount_strategy(), garbage in garbage_strategy()) {
        let ledger = Ledger::new();
        ledger.add_entry(&tx("user1", "BTC", seed)).unwrap();
        let before = ledger.get_balance(&UserId::new("user1"));

        let result = ledger.add_entry(&tx("user1", "BTC", &garbage));
        let is_invalid_format = matches!(result, Err(Error::InvalidAmountFormat { .. }));
        prop_assert!(is_invalid_format);
        prop_assert_eq!(ledger.get_balance(&UserId::new("user1")), before);
        prop_assert_eq!(ledger.audit_len(), 1);
    }

    /// Property: entries for one account never move another account
    #[test]
    fn prop_accounts_are_isolated(amounts in prop::collection::vec(amount_strategy(), 1..20)) {
        let ledger = Ledger::new();
        ledger.add_entry(&tx("bystander", "BTC", "42")).unwrap();

        let mut expected = Decimal::ZERO;
        for amount in &amounts {
            ledger.add_entry(&tx("user1", "BTC", amount)).unwrap();
            expected += *amount;
        }

        let bystander = ledger.get_balance(&UserId::new("bystander"));
        prop_assert_eq!(bystander.get("BTC").unwrap().to_string(), "42.00000000");

        let user1 = ledger.get_balance(&UserId::new("user1"));
        prop_assert_eq!(*user1.get("BTC").unwrap(), Balance::from_decimal(expected));
        prop_assert_eq!(ledger.audit_len(), amounts.len() + 1);
    }

    /// Property: the last audit entry's balance matches the live balance
    #[test]
    fn prop_audit_trail_tracks_balance(amounts in prop::collection::vec(amount_strategy(), 1..20)) {
        let ledger = Ledger::new();
        for amount in &amounts {
            ledger.add_entry(&tx("user1", "ETH", amount)).unwrap();
        }

        let log = ledger.audit_log();
        let live = ledger.get_balance(&UserId::new("user1"));
        prop_assert_eq!(log.len(), amounts.len());
        prop_assert_eq!(&log.last().unwrap().balance_after, live.get("ETH").unwrap());
        for (entry, amount) in log.iter().zip(&amounts) {
            prop_assert_eq!(entry.amount, *amount);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: N concurrent additions of 1.0 yield exactly N
    #[test]
    fn prop_concurrent_additions_are_linearized(threads in 2usize..8, per_thread in 1usize..100) {
        let ledger = Arc::new(Ledger::new());

        std::thread::scope(|s| {
            for _ in 0..threads {
                let ledger = Arc::clone(&ledger);
                s.spawn(move || {
                    for _ in 0..per_thread {
                        ledger.add_entry(&tx("user1", "BTC", "1.0")).unwrap();
                    }
                });
            }
        });

        let total = threads * per_thread;
        let snapshot = ledger.get_balance(&UserId::new("user1"));
        prop_assert_eq!(
            snapshot.get("BTC").unwrap().to_string(),
            format!("{total}.00000000")
        );
        prop_assert_eq!(ledger.audit_len(), total);
    }
}

#[test]
fn test_readers_never_observe_partial_updates() {
    let ledger = Arc::new(Ledger::new());

    std::thread::scope(|s| {
        let writer = Arc::clone(&ledger);
        s.spawn(move || {
            for _ in 0..500 {
                writer.add_entry(&tx("user1", "BTC", "2")).unwrap();
            }
        });

        let reader = Arc::clone(&ledger);
        s.spawn(move || {
            for _ in 0..500 {
                let snapshot = reader.get_balance(&UserId::new("user1"));
                if let Some(balance) = snapshot.get("BTC") {
                    // Every committed balance is an even whole number
                    let value = balance.as_decimal();
                    assert_eq!(value % Decimal::TWO, Decimal::ZERO);
                }
            }
        });
    });

    let snapshot = ledger.get_balance(&UserId::new("user1"));
    assert_eq!(snapshot.get("BTC").unwrap().to_string(), "1000.00000000");
}
