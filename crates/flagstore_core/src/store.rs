//! State shared by every store type: the client, its table and namespace,
//! and the closed flag.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::keys::{key_schema, Namespace};
use flagstore_table::{GetItemRequest, Item, TableClient, TableKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) struct TableHandle<C: TableClient + ?Sized> {
    client: Arc<C>,
    config: StoreConfig,
    namespace: Namespace,
    closed: AtomicBool,
}

impl<C: TableClient + ?Sized> TableHandle<C> {
    pub(crate) fn new(client: Arc<C>, config: StoreConfig) -> Self {
        let namespace = Namespace::new(config.prefix.as_deref());
        Self {
            client,
            config,
            namespace,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    pub(crate) fn table(&self) -> &str {
        &self.config.table_name
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub(crate) fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Strongly consistent point read. An empty attribute map reads as absent.
    pub(crate) fn get_item(&self, address: &TableKey) -> StoreResult<Option<Item>> {
        self.check_open()?;
        let key = key_schema().key_item(&address.partition, &address.sort);
        let item = self
            .client
            .get_item(&GetItemRequest::new(self.table(), key).consistent())?;
        Ok(item.filter(|item| !item.is_empty()))
    }

    /// Marks the handle closed and closes the client unless it is shared.
    ///
    /// Closing twice is a no-op.
    pub(crate) fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.config.shared_client {
            tracing::debug!(table = self.table(), "leaving shared table client open");
            return Ok(());
        }
        self.client.close()?;
        Ok(())
    }
}
