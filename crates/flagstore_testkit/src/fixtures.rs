//! Test fixtures and table helpers.
//!
//! Provides an in-memory table provisioned with the store's key schema,
//! store constructors over it, and the data sets the suites share.

use flagstore_core::{
    collect_keys, key_schema, write_all, BigSegmentStore, DataKind, DataStore, FullDataSet,
    ItemDescriptor, LegacyFeatureStore, Namespace, ScanPages, StoreConfig,
};
use flagstore_table::{
    AttributeValue, InMemoryTable, PutItemRequest, ScanRequest, TableClient, WriteRequest,
};
use std::sync::Arc;

/// Name of the table every fixture provisions.
pub const TEST_TABLE: &str = "flagstore_test_table";

/// Key of the oversized item produced by [`too_big_item`].
pub const BAD_ITEM_KEY: &str = "baditem";

/// An in-memory table provisioned with the store's key schema.
pub struct TestTable {
    /// The shared client.
    pub table: Arc<InMemoryTable>,
}

impl TestTable {
    /// Creates an empty table with the table's default paging.
    pub fn new() -> Self {
        Self::from_client(InMemoryTable::new())
    }

    /// Creates an empty table whose query and scan pages hold at most `size`
    /// items.
    pub fn with_page_size(size: usize) -> Self {
        Self::from_client(InMemoryTable::new().with_page_size(size))
    }

    fn from_client(client: InMemoryTable) -> Self {
        client.create_table(TEST_TABLE, key_schema());
        Self {
            table: Arc::new(client),
        }
    }

    /// Returns a store configuration for `prefix` (empty means none).
    ///
    /// The client is marked shared so closing one store leaves the table
    /// usable by the others.
    pub fn config(&self, prefix: &str) -> StoreConfig {
        StoreConfig::new(TEST_TABLE).prefix(prefix).shared_client(true)
    }

    /// Creates a data store over the table.
    pub fn store(&self, prefix: &str) -> DataStore<InMemoryTable> {
        DataStore::new(Arc::clone(&self.table), self.config(prefix))
    }

    /// Creates a legacy feature store over the table.
    pub fn legacy_store(&self, prefix: &str) -> LegacyFeatureStore<InMemoryTable> {
        LegacyFeatureStore::new(Arc::clone(&self.table), self.config(prefix))
    }

    /// Creates a Big Segment store over the table.
    pub fn big_segment_store(&self, prefix: &str) -> BigSegmentStore<InMemoryTable> {
        BigSegmentStore::new(Arc::clone(&self.table), self.config(prefix))
    }

    /// Deletes every row belonging to `prefix` (empty means the unprefixed
    /// namespace). Returns the number of rows deleted.
    pub fn clear_namespace(&self, prefix: &str) -> usize {
        let pages = ScanPages::new(self.table.as_ref(), ScanRequest::new(TEST_TABLE));
        let keys = collect_keys(pages, &key_schema()).expect("scan failed");
        let schema = key_schema();
        let deletes: Vec<WriteRequest> = keys
            .iter()
            .filter(|key| belongs_to(&key.partition, prefix))
            .map(|key| WriteRequest::Delete(schema.key_item(&key.partition, &key.sort)))
            .collect();
        let count = deletes.len();
        write_all(self.table.as_ref(), TEST_TABLE, deletes).expect("batch delete failed");
        count
    }

    /// Writes a Big Segment membership row. Empty lists are omitted, since
    /// the table rejects empty string sets.
    pub fn seed_membership(
        &self,
        prefix: &str,
        user_hash: &str,
        included: &[&str],
        excluded: &[&str],
    ) {
        let namespace = Namespace::new(Some(prefix));
        let address = namespace.membership_key(user_hash);
        let mut item = key_schema().key_item(&address.partition, &address.sort);
        for (name, refs) in [("included", included), ("excluded", excluded)] {
            if !refs.is_empty() {
                item.insert(
                    name.to_string(),
                    AttributeValue::Ss(refs.iter().map(|r| (*r).to_string()).collect()),
                );
            }
        }
        self.table
            .put_item(&PutItemRequest::new(TEST_TABLE, item))
            .expect("membership put failed");
    }

    /// Writes the Big Segment sync metadata row.
    pub fn seed_metadata(&self, prefix: &str, synchronized_on: i64) {
        let address = Namespace::new(Some(prefix)).metadata_key();
        let mut item = key_schema().key_item(&address.partition, &address.sort);
        item.insert(
            "synchronizedOn".to_string(),
            AttributeValue::number(synchronized_on),
        );
        self.table
            .put_item(&PutItemRequest::new(TEST_TABLE, item))
            .expect("metadata put failed");
    }
}

impl Default for TestTable {
    fn default() -> Self {
        Self::new()
    }
}

fn belongs_to(partition: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        !partition.contains(':')
    } else {
        partition
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(':'))
    }
}

/// Returns a prefix no other test uses.
pub fn unique_prefix() -> String {
    format!("test-{}", uuid::Uuid::new_v4().simple())
}

/// Creates a live item whose payload names its key and version.
pub fn item(key: &str, version: u64) -> ItemDescriptor {
    ItemDescriptor::new(
        version,
        format!(r#"{{"key": "{key}", "version": {version}}}"#),
    )
}

/// Two flags and two segments at version 1.
pub fn good_data() -> FullDataSet {
    FullDataSet::new()
        .with_kind(
            DataKind::Features,
            vec![
                ("flag1".to_string(), item("flag1", 1)),
                ("flag2".to_string(), item("flag2", 1)),
            ],
        )
        .with_kind(
            DataKind::Segments,
            vec![
                ("segment1".to_string(), item("segment1", 1)),
                ("segment2".to_string(), item("segment2", 1)),
            ],
        )
}

/// [`good_data`] with [`too_big_item`] inserted first in `kind`'s collection.
pub fn good_data_plus_too_big(kind: DataKind) -> FullDataSet {
    let mut data = good_data();
    for (collection_kind, items) in &mut data.collections {
        if *collection_kind == kind {
            items.insert(0, (BAD_ITEM_KEY.to_string(), too_big_item(kind)));
        }
    }
    data
}

/// An item whose encoded form exceeds the table's size ceiling.
pub fn too_big_item(kind: DataKind) -> ItemDescriptor {
    let keys: Vec<String> = (0..40_000).map(|i| format!("\"key{i}\"")).collect();
    let list = format!("[{}]", keys.join(","));
    let payload = match kind {
        DataKind::Segments => {
            format!(r#"{{"key":"{BAD_ITEM_KEY}", "version": 1, "included": {list}}}"#)
        }
        DataKind::Features => format!(
            r#"{{"key":"{BAD_ITEM_KEY}", "version": 1, "targets": [{{"variation": 0, "values": {list}}}]}}"#
        ),
    };
    ItemDescriptor::new(1, payload)
}

/// Reads every kind back from `store` as a data set.
pub fn all_data<C: TableClient + ?Sized>(store: &DataStore<C>) -> FullDataSet {
    DataKind::ALL
        .into_iter()
        .fold(FullDataSet::new(), |data, kind| {
            data.with_kind(kind, store.get_all(kind).expect("get_all failed"))
        })
}
