//! Adapter exposing the older feature-store contract.
//!
//! The older contract differs from [`DataStore`] in two ways: collections
//! come back as maps keyed by item key, and `upsert` returns the item that is
//! in effect afterwards instead of a flag, so a caching layer can cache it.

use crate::config::StoreConfig;
use crate::data_store::{DataStore, UpsertOutcome};
use crate::error::StoreResult;
use crate::init::InitSummary;
use crate::types::{DataKind, FullDataSet, ItemDescriptor};
use flagstore_table::TableClient;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Feature store with the older read-back upsert contract.
pub struct LegacyFeatureStore<C: TableClient + ?Sized> {
    inner: DataStore<C>,
}

impl<C: TableClient + ?Sized> LegacyFeatureStore<C> {
    /// Creates a store over `client`. The table must already exist.
    pub fn new(client: Arc<C>, config: StoreConfig) -> Self {
        Self {
            inner: DataStore::new(client, config),
        }
    }

    /// Reads one item.
    ///
    /// # Errors
    ///
    /// Same as [`DataStore::get`].
    pub fn get(&self, kind: DataKind, key: &str) -> StoreResult<Option<ItemDescriptor>> {
        self.inner.get(kind, key)
    }

    /// Reads every item of `kind`, keyed by item key.
    ///
    /// # Errors
    ///
    /// Same as [`DataStore::get_all`].
    pub fn all(&self, kind: DataKind) -> StoreResult<BTreeMap<String, ItemDescriptor>> {
        Ok(self.inner.get_all(kind)?.into_iter().collect())
    }

    /// Replaces the stored data set.
    ///
    /// # Errors
    ///
    /// Same as [`DataStore::init`].
    pub fn init(&self, data: &FullDataSet) -> StoreResult<InitSummary> {
        self.inner.init(data)
    }

    /// Writes `item` if it is newer than the stored one and returns the item
    /// in effect afterwards.
    ///
    /// When the write does not happen (an equal or newer version is stored,
    /// or the item is too large) the stored item is read back and returned.
    ///
    /// # Errors
    ///
    /// Same as [`DataStore::upsert`], plus errors from the read-back.
    pub fn upsert(
        &self,
        kind: DataKind,
        key: &str,
        item: &ItemDescriptor,
    ) -> StoreResult<Option<ItemDescriptor>> {
        self.upsert_with_hook(kind, key, item, &|| {})
    }

    /// Like [`Self::upsert`], calling `hook` just before the conditional write.
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
    ) -> StoreResult<Option<ItemDescriptor>> {
        match self.inner.upsert_outcome(kind, key, item, Some(hook))? {
            UpsertOutcome::Applied => Ok(Some(item.clone())),
            UpsertOutcome::Superseded | UpsertOutcome::TooLarge => self.inner.get(kind, key),
        }
    }

    /// Returns true once the namespace has been initialized.
    ///
    /// # Errors
    ///
    /// Same as [`DataStore::is_initialized`].
    pub fn initialized(&self) -> StoreResult<bool> {
        self.inner.is_initialized()
    }

    /// Closes the store.
    ///
    /// # Errors
    ///
    /// Same as [`DataStore::close`].
    pub fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}
