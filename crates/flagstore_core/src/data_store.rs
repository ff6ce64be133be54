//! The persistent data store: reads, full replacement, and versioned upserts.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::init::{InitPlan, InitSummary};
use crate::keys::{PARTITION_KEY, SORT_KEY};
use crate::marshal::{decode, encode, VERSION_ATTRIBUTE};
use crate::pager::QueryPages;
use crate::size::check_size_limit;
use crate::store::TableHandle;
use crate::types::{DataKind, FullDataSet, ItemDescriptor, KeyedItems};
use flagstore_table::{
    AttributeValue, Condition, PutItemRequest, QueryRequest, TableClient, TableError,
};
use std::sync::Arc;

/// Result of a versioned upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The item was written.
    Applied,
    /// A stored item with an equal or higher version was kept.
    Superseded,
    /// The encoded item exceeded the size ceiling and was not written.
    TooLarge,
}

impl UpsertOutcome {
    /// Returns true if the item was written.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, UpsertOutcome::Applied)
    }
}

/// A data store keeping flags and segments in a shared table.
///
/// Every operation is one or more blocking calls on the table client. The
/// store holds no lock of its own; the conditional write in [`Self::upsert`]
/// is the only point where concurrent writers are ordered.
///
/// # Example
///
/// ```rust
/// use flagstore_core::{DataKind, DataStore, FullDataSet, ItemDescriptor, StoreConfig, key_schema};
/// use flagstore_table::InMemoryTable;
/// use std::sync::Arc;
///
/// let table = Arc::new(InMemoryTable::new());
/// table.create_table("flags", key_schema());
/// let store = DataStore::new(table, StoreConfig::new("flags").prefix("env1"));
///
/// let data = FullDataSet::new().with_kind(
///     DataKind::Features,
///     vec![("flag1".into(), ItemDescriptor::new(1, r#"{"key":"flag1"}"#))],
/// );
/// store.init(&data).unwrap();
/// assert!(store.is_initialized().unwrap());
///
/// assert!(!store.upsert(DataKind::Features, "flag1", &ItemDescriptor::new(1, "{}")).unwrap());
/// assert!(store.upsert(DataKind::Features, "flag1", &ItemDescriptor::deleted(2)).unwrap());
/// assert!(store.get(DataKind::Features, "flag1").unwrap().unwrap().is_deleted());
/// ```
pub struct DataStore<C: TableClient + ?Sized> {
    handle: TableHandle<C>,
}

impl<C: TableClient + ?Sized> DataStore<C> {
    /// Creates a store over `client`. The table must already exist.
    pub fn new(client: Arc<C>, config: StoreConfig) -> Self {
        Self {
            handle: TableHandle::new(client, config),
        }
    }

    /// Returns the store's configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        self.handle.config()
    }

    /// Reads one item, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DataIntegrity`] for a malformed stored item, or
    /// the table error.
    pub fn get(&self, kind: DataKind, key: &str) -> StoreResult<Option<ItemDescriptor>> {
        let address = self.handle.namespace().address(kind, key);
        match self.handle.get_item(&address)? {
            Some(item) => decode(&item),
            None => Ok(None),
        }
    }

    /// Reads every item of `kind`, tombstones included, in table order.
    ///
    /// # Errors
    ///
    /// Returns the first page error or [`StoreError::DataIntegrity`].
    pub fn get_all(&self, kind: DataKind) -> StoreResult<KeyedItems> {
        self.handle.check_open()?;
        let request = QueryRequest::new(
            self.handle.table(),
            PARTITION_KEY,
            self.handle.namespace().for_kind(kind),
        )
        .consistent()
        .with_limit(self.handle.config().page_size);

        let mut items = KeyedItems::new();
        for page in QueryPages::new(self.handle.client(), request) {
            for attributes in page? {
                let Some(key) = attributes.get(SORT_KEY).and_then(AttributeValue::as_s) else {
                    continue;
                };
                if let Some(item) = decode(&attributes)? {
                    items.push((key.to_string(), item));
                }
            }
        }
        Ok(items)
    }

    /// Replaces the stored contents of every kind in `data` and marks the
    /// namespace initialized.
    ///
    /// Oversized items are logged and skipped without failing the call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReservedPayload`] before any write, or the first
    /// table error. A table error after the first batch leaves the table
    /// partly updated.
    pub fn init(&self, data: &FullDataSet) -> StoreResult<InitSummary> {
        self.init_plan(data)?.run()
    }

    /// Returns a plan for [`Self::init`] that can be driven phase by phase.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`Self::close`].
    pub fn init_plan<'a>(&'a self, data: &'a FullDataSet) -> StoreResult<InitPlan<'a, C>> {
        self.handle.check_open()?;
        Ok(InitPlan::new(
            self.handle.client(),
            self.handle.table(),
            self.handle.namespace(),
            data,
        )
        .page_size(self.handle.config().page_size))
    }

    /// Writes `item` unless a stored item has an equal or higher version.
    ///
    /// Returns true if the item was written. An oversized item is logged and
    /// not written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReservedPayload`] or any table error other than
    /// a failed version check.
    pub fn upsert(&self, kind: DataKind, key: &str, item: &ItemDescriptor) -> StoreResult<bool> {
        Ok(self.upsert_outcome(kind, key, item, None)?.is_applied())
    }

    /// Like [`Self::upsert`], calling `hook` on this thread just before the
    /// conditional write.
    ///
    /// # Errors
    ///
    /// Same as [`Self::upsert`].
    pub fn upsert_with_hook(
        &self,
        kind: DataKind,
        key: &str,
        item: &ItemDescriptor,
        hook: &dyn Fn(),
    ) -> StoreResult<bool> {
        Ok(self.upsert_outcome(kind, key, item, Some(hook))?.is_applied())
    }

    /// Runs the versioned upsert and reports exactly what happened.
    ///
    /// # Errors
    ///
    /// Same as [`Self::upsert`].
    pub fn upsert_outcome(
        &self,
        kind: DataKind,
        key: &str,
        item: &ItemDescriptor,
        hook: Option<&dyn Fn()>,
    ) -> StoreResult<UpsertOutcome> {
        self.handle.check_open()?;
        let address = self.handle.namespace().address(kind, key);
        let encoded = encode(&address, item).inspect_err(|_| {
            tracing::error!(
                namespace = %address.partition,
                key = %address.sort,
                "live item payload collides with the deleted-item placeholder"
            );
        })?;
        if !check_size_limit(&encoded) {
            return Ok(UpsertOutcome::TooLarge);
        }
        if let Some(hook) = hook {
            hook();
        }

        let condition = Condition::Any(vec![
            Condition::not_exists(PARTITION_KEY),
            Condition::not_exists(SORT_KEY),
            Condition::less_than(VERSION_ATTRIBUTE, item.version),
        ]);
        let request = PutItemRequest::new(self.handle.table(), encoded).with_condition(condition);
        match self.handle.client().put_item(&request) {
            Ok(()) => Ok(UpsertOutcome::Applied),
            Err(TableError::ConditionalCheckFailed) => {
                tracing::debug!(
                    namespace = %address.partition,
                    key = %address.sort,
                    version = item.version,
                    "upsert superseded by a stored item with an equal or higher version"
                );
                Ok(UpsertOutcome::Superseded)
            }
            Err(err) => Err(StoreError::Table(err)),
        }
    }

    /// Returns true once a successful [`Self::init`] has written the control
    /// record for this namespace.
    ///
    /// # Errors
    ///
    /// Returns the table error.
    pub fn is_initialized(&self) -> StoreResult<bool> {
        let inited = self.handle.namespace().inited_key();
        Ok(self.handle.get_item(&inited)?.is_some())
    }

    /// Returns true if the table answered a read. Never fails.
    #[must_use]
    pub fn is_store_available(&self) -> bool {
        match self.is_initialized() {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "store availability check failed");
                false
            }
        }
    }

    /// Closes the store. Every later call fails with [`StoreError::Closed`].
    ///
    /// The client is closed too unless it was configured as shared.
    ///
    /// # Errors
    ///
    /// Returns the client's close error.
    pub fn close(&self) -> StoreResult<()> {
        self.handle.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::key_schema;
    use flagstore_table::{InMemoryTable, Operation};
    use std::cell::Cell;

    const TABLE: &str = "store";

    fn store(prefix: &str) -> (Arc<InMemoryTable>, DataStore<InMemoryTable>) {
        let table = Arc::new(InMemoryTable::new());
        table.create_table(TABLE, key_schema());
        let store = DataStore::new(Arc::clone(&table), StoreConfig::new(TABLE).prefix(prefix));
        (table, store)
    }

    fn flag(version: u64) -> ItemDescriptor {
        ItemDescriptor::new(version, format!(r#"{{"key":"flag1","version":{version}}}"#))
    }

    #[test]
    fn get_missing_item_is_none() {
        let (_, store) = store("");
        assert_eq!(store.get(DataKind::Features, "nope").unwrap(), None);
    }

    #[test]
    fn upsert_applies_only_newer_versions() {
        let (_, store) = store("");
        assert_eq!(
            store.upsert_outcome(DataKind::Features, "flag1", &flag(2), None).unwrap(),
            UpsertOutcome::Applied
        );
        assert_eq!(
            store.upsert_outcome(DataKind::Features, "flag1", &flag(2), None).unwrap(),
            UpsertOutcome::Superseded
        );
        assert!(!store.upsert(DataKind::Features, "flag1", &flag(1)).unwrap());
        assert!(store.upsert(DataKind::Features, "flag1", &flag(3)).unwrap());
        assert_eq!(store.get(DataKind::Features, "flag1").unwrap(), Some(flag(3)));
    }

    #[test]
    fn tombstone_supersedes_and_is_returned() {
        let (_, store) = store("");
        store.upsert(DataKind::Segments, "s", &flag(1)).unwrap();
        assert!(store.upsert(DataKind::Segments, "s", &ItemDescriptor::deleted(2)).unwrap());
        assert_eq!(
            store.get(DataKind::Segments, "s").unwrap(),
            Some(ItemDescriptor::deleted(2))
        );
        let all = store.get_all(DataKind::Segments).unwrap();
        assert_eq!(all, vec![("s".to_string(), ItemDescriptor::deleted(2))]);
    }

    #[test]
    fn hook_runs_once_before_the_write() {
        let (table, store) = store("");
        let calls = Cell::new(0);
        let puts_seen = Cell::new(usize::MAX);
        let hook = || {
            calls.set(calls.get() + 1);
            puts_seen.set(table.stats().put_item);
        };
        store
            .upsert_with_hook(DataKind::Features, "flag1", &flag(1), &hook)
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(puts_seen.get(), 0);
        assert_eq!(table.stats().put_item, 1);
    }

    #[test]
    fn hook_is_skipped_for_oversized_items() {
        let (table, store) = store("");
        let calls = Cell::new(0);
        let big = ItemDescriptor::new(1, "x".repeat(400_000));
        let outcome = store
            .upsert_outcome(DataKind::Features, "big", &big, Some(&|| calls.set(calls.get() + 1)))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::TooLarge);
        assert_eq!(calls.get(), 0);
        assert_eq!(table.stats().put_item, 0);
    }

    #[test]
    fn reserved_payload_is_rejected_before_the_write() {
        let (table, store) = store("");
        let err = store
            .upsert(DataKind::Features, "flag1", &ItemDescriptor::new(1, "null"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReservedPayload { .. }));
        assert_eq!(table.stats().put_item, 0);
    }

    #[test]
    fn other_put_failures_propagate() {
        let (table, store) = store("");
        table.inject_fault(Operation::PutItem, 0, TableError::transport_fatal("denied"));
        let err = store.upsert(DataKind::Features, "flag1", &flag(1)).unwrap_err();
        assert!(matches!(err, StoreError::Table(TableError::Transport { .. })));
    }

    #[test]
    fn availability_reflects_table_errors() {
        let (table, store) = store("");
        assert!(store.is_store_available());
        table.inject_fault(Operation::GetItem, 0, TableError::transport_retryable("timeout"));
        assert!(!store.is_store_available());
    }

    #[test]
    fn init_then_upsert_race_deletes_snapshotted_key() {
        let (_, store) = store("p");
        store
            .init(&FullDataSet::new().with_kind(DataKind::Features, vec![("old".into(), flag(1))]))
            .unwrap();

        let data = FullDataSet::new().with_kind(DataKind::Features, vec![("new".into(), flag(1))]);
        let mut plan = store.init_plan(&data).unwrap();
        plan.snapshot().unwrap();

        // Concurrent writers after the snapshot: one updates a snapshotted
        // key, one inserts a key the snapshot never saw.
        assert!(store.upsert(DataKind::Features, "old", &flag(2)).unwrap());
        assert!(store.upsert(DataKind::Features, "fresh", &flag(1)).unwrap());

        plan.stage_upserts().unwrap();
        plan.stage_deletes().unwrap();
        plan.commit().unwrap();

        assert_eq!(store.get(DataKind::Features, "old").unwrap(), None);
        assert_eq!(store.get(DataKind::Features, "fresh").unwrap(), Some(flag(1)));
        assert_eq!(store.get(DataKind::Features, "new").unwrap(), Some(flag(1)));
    }

    #[test]
    fn closed_store_rejects_every_operation() {
        let (table, store) = store("");
        store.close().unwrap();
        assert!(table.is_closed());
        assert!(matches!(store.get(DataKind::Features, "a"), Err(StoreError::Closed)));
        assert!(matches!(store.get_all(DataKind::Features), Err(StoreError::Closed)));
        assert!(matches!(store.init(&FullDataSet::new()), Err(StoreError::Closed)));
        assert!(matches!(
            store.upsert(DataKind::Features, "a", &flag(1)),
            Err(StoreError::Closed)
        ));
        assert!(matches!(store.is_initialized(), Err(StoreError::Closed)));
        assert!(!store.is_store_available());
        assert!(store.close().is_ok());
    }

    #[test]
    fn shared_client_stays_open() {
        let table = Arc::new(InMemoryTable::new());
        table.create_table(TABLE, key_schema());
        let store = DataStore::new(
            Arc::clone(&table),
            StoreConfig::new(TABLE).shared_client(true),
        );
        store.close().unwrap();
        assert!(!table.is_closed());
        assert!(matches!(store.get(DataKind::Features, "a"), Err(StoreError::Closed)));
    }
}
