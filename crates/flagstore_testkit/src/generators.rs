//! Property-based test generators using proptest.
//!
//! Strategies only produce values the store accepts: non-empty keys,
//! payloads other than the tombstone placeholder, and unique keys within a
//! collection.

use flagstore_core::{DataKind, FullDataSet, ItemDescriptor, KeyedItems, DELETED_ITEM_PLACEHOLDER};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for collection kinds.
pub fn data_kind_strategy() -> impl Strategy<Value = DataKind> {
    prop_oneof![Just(DataKind::Features), Just(DataKind::Segments)]
}

/// Strategy for item keys.
pub fn item_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_.-]{1,24}").expect("Invalid regex")
}

/// Strategy for namespace prefixes, including the empty prefix.
pub fn prefix_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("([a-z][a-z0-9-]{0,11})?").expect("Invalid regex")
}

/// Strategy for live payloads, including non-ASCII text.
pub fn payload_strategy() -> impl Strategy<Value = String> {
    any::<String>().prop_filter("payload must not be the tombstone placeholder", |s| {
        s != DELETED_ITEM_PLACEHOLDER
    })
}

/// Strategy for items; about one in five is a tombstone.
pub fn item_descriptor_strategy() -> impl Strategy<Value = ItemDescriptor> {
    (1..u64::from(u32::MAX), prop::option::weighted(0.8, payload_strategy())).prop_map(
        |(version, payload)| ItemDescriptor { version, payload },
    )
}

/// Strategy for one collection with unique keys.
pub fn keyed_items_strategy(max_items: usize) -> impl Strategy<Value = KeyedItems> {
    prop::collection::btree_map(item_key_strategy(), item_descriptor_strategy(), 0..=max_items)
        .prop_map(|items: BTreeMap<String, ItemDescriptor>| items.into_iter().collect())
}

/// Strategy for a data set holding both kinds.
pub fn full_data_set_strategy(max_items_per_kind: usize) -> impl Strategy<Value = FullDataSet> {
    (
        keyed_items_strategy(max_items_per_kind),
        keyed_items_strategy(max_items_per_kind),
    )
        .prop_map(|(features, segments)| {
            FullDataSet::new()
                .with_kind(DataKind::Features, features)
                .with_kind(DataKind::Segments, segments)
        })
}

/// Strategy for a sequence of versions to upsert against one key.
pub fn version_sequence_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1..1_000u64, 1..20)
}
