//! Property-based tests for the snapshot codec and index construction.
//!
//! Generates random containers covering every supported field type, including
//! empty tables and boundary numeric values, and checks the round-trip and
//! index lookup invariants.

use proptest::prelude::*;
use std::collections::HashSet;
use tabula_core::codec::{decode, encode};
use tabula_core::index::{build_flat, build_nested};
use tabula_core::test_utils::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_i32() -> impl Strategy<Value = i32> {
    prop_oneof![Just(0), Just(-1), Just(i32::MIN), Just(i32::MAX), any::<i32>()]
}

fn arb_i64() -> impl Strategy<Value = i64> {
    prop_oneof![Just(0i64), Just(i64::MIN), Just(i64::MAX), any::<i64>()]
}

fn arb_f32() -> impl Strategy<Value = f32> {
    prop_oneof![
        Just(0.0f32),
        Just(f32::MIN),
        Just(f32::MAX),
        any::<f32>().prop_filter("finite", |v| v.is_finite()),
    ]
}

fn arb_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0f64),
        Just(-1.5f64),
        Just(f64::MIN_POSITIVE),
        any::<f64>().prop_filter("finite", |v| v.is_finite()),
    ]
}

fn arb_item() -> impl Strategy<Value = SampleItem> {
    (
        arb_i32(),
        ".{0,12}",
        arb_f32(),
        proptest::collection::vec(arb_i32(), 0..5),
    )
        .prop_map(|(id, name, price, tags)| SampleItem {
            id,
            name,
            price,
            tags,
        })
}

fn arb_reward() -> impl Strategy<Value = SampleReward> {
    (arb_i32(), arb_i32(), arb_i64(), arb_f64(), any::<bool>()).prop_map(
        |(monster, stage, item, rate, rare)| SampleReward {
            monster,
            stage,
            item,
            rate,
            rare,
        },
    )
}

fn arb_tables() -> impl Strategy<Value = SampleTables> {
    (
        proptest::collection::vec(arb_item(), 0..20),
        proptest::collection::vec(arb_reward(), 0..20),
    )
        .prop_map(|(item, reward)| SampleTables { item, reward })
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// decode(encode(c)) == c
    #[test]
    fn snapshot_round_trip(tables in arb_tables()) {
        let bytes = encode(&tables).unwrap();
        let decoded: SampleTables = decode(&bytes).unwrap();
        prop_assert_eq!(decoded, tables);
    }

    /// For every row r of a two-level index on (monster, stage):
    /// index[r.monster][r.stage] == r, provided the key tuples are unique.
    #[test]
    fn nested_index_finds_every_row(rewards in proptest::collection::vec(arb_reward(), 0..30)) {
        let mut seen = HashSet::new();
        let unique: Vec<SampleReward> = rewards
            .into_iter()
            .filter(|r| seen.insert((r.monster, r.stage)))
            .collect();

        let index = build_nested(&unique, "Reward", |r| r.monster, |r| r.stage).unwrap();
        for reward in &unique {
            prop_assert_eq!(&index[&reward.monster][&reward.stage], reward);
        }
        let total: usize = index.values().map(|inner| inner.len()).sum();
        prop_assert_eq!(total, unique.len());
    }

    /// A flat index fails exactly when two rows share a key.
    #[test]
    fn flat_index_rejects_any_duplicate(ids in proptest::collection::vec(0..8i32, 0..12)) {
        let items: Vec<SampleItem> = ids
            .iter()
            .map(|&id| SampleItem { id, ..SampleItem::default() })
            .collect();
        let distinct: HashSet<i32> = ids.iter().copied().collect();

        let result = build_flat(&items, "Item", |r| r.id);
        prop_assert_eq!(result.is_ok(), distinct.len() == ids.len());
    }
}
