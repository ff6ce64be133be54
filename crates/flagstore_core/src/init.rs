//! Full data set replacement without transactions.
//!
//! The table has no multi-item transactions, so [`InitPlan`] replaces a
//! namespace's contents by diffing:
//!
//! 1. Snapshot the keys currently stored for every kind in the data set.
//! 2. Stage a put for every incoming item, skipping oversized ones.
//! 3. Stage a delete for every snapshot key that was not written.
//! 4. Stage the control record, then flush everything in staged order.
//!
//! Existing data is overwritten before leftovers are deleted, never cleared
//! up front. A key inserted by a concurrent upsert after the snapshot is not
//! in the snapshot, so it survives; a key upserted concurrently that was in
//! the snapshot but not in the data set is deleted by the flush. Processes
//! that run `init` also receive subsequent updates and upsert them again.
//!
//! A failed flush leaves the table partly updated. Running `init` again with
//! the same data converges.

use crate::batch::write_all;
use crate::error::{StoreError, StoreResult};
use crate::keys::{key_schema, Namespace, PARTITION_KEY, SORT_KEY};
use crate::marshal::encode;
use crate::pager::{collect_keys, QueryPages};
use crate::size::check_size_limit;
use crate::types::FullDataSet;
use flagstore_table::{QueryRequest, TableClient, TableKey, WriteRequest};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Phase of an [`InitPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    /// Nothing has been read or staged.
    NotStarted,
    /// Existing keys have been read.
    SnapshotComplete,
    /// Puts for the incoming items are staged.
    UpsertsStaged,
    /// Deletes for leftover keys are staged.
    DeletesStaged,
    /// Every staged write has been flushed.
    Committed,
}

impl InitPhase {
    /// Returns the phase that must precede `self`.
    const fn predecessor(self) -> Option<InitPhase> {
        match self {
            InitPhase::NotStarted => None,
            InitPhase::SnapshotComplete => Some(InitPhase::NotStarted),
            InitPhase::UpsertsStaged => Some(InitPhase::SnapshotComplete),
            InitPhase::DeletesStaged => Some(InitPhase::UpsertsStaged),
            InitPhase::Committed => Some(InitPhase::DeletesStaged),
        }
    }
}

/// Result of a successful `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSummary {
    /// Items written, tombstones included.
    pub items_written: usize,
    /// Addresses of items skipped because they were too large.
    pub skipped: Vec<TableKey>,
    /// Leftover keys deleted.
    pub keys_deleted: usize,
    /// Batch write calls made.
    pub batches: usize,
    /// Time from snapshot to commit.
    pub duration: Duration,
}

/// One run of the replacement algorithm, driven phase by phase.
///
/// [`crate::DataStore::init`] drives a plan straight through. Driving the
/// phases by hand allows other writes to be interleaved between them.
pub struct InitPlan<'a, C: TableClient + ?Sized> {
    client: &'a C,
    table: &'a str,
    namespace: &'a Namespace,
    data: &'a FullDataSet,
    page_size: Option<usize>,
    phase: InitPhase,
    leftover: BTreeSet<TableKey>,
    requests: Vec<WriteRequest>,
    items_written: usize,
    skipped: Vec<TableKey>,
    keys_deleted: usize,
    started: Instant,
}

impl<'a, C: TableClient + ?Sized> InitPlan<'a, C> {
    /// Creates a plan that replaces the contents of `namespace` in `table`
    /// with `data`.
    pub fn new(
        client: &'a C,
        table: &'a str,
        namespace: &'a Namespace,
        data: &'a FullDataSet,
    ) -> Self {
        Self {
            client,
            table,
            namespace,
            data,
            page_size: None,
            phase: InitPhase::NotStarted,
            leftover: BTreeSet::new(),
            requests: Vec::new(),
            items_written: 0,
            skipped: Vec::new(),
            keys_deleted: 0,
            started: Instant::now(),
        }
    }

    /// Caps the page size of the snapshot queries. `Some(0)` is ignored.
    #[must_use]
    pub fn page_size(mut self, size: Option<usize>) -> Self {
        self.page_size = size.filter(|size| *size > 0);
        self
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    /// Returns the writes staged so far, in flush order.
    #[must_use]
    pub fn staged(&self) -> &[WriteRequest] {
        &self.requests
    }

    fn enter(&self, to: InitPhase) -> StoreResult<()> {
        if to.predecessor() == Some(self.phase) {
            Ok(())
        } else {
            Err(StoreError::InvalidInitPhase {
                from: self.phase,
                to,
            })
        }
    }

    /// Reads the key of every item currently stored for each kind in the
    /// data set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInitPhase`] unless the plan is
    /// [`InitPhase::NotStarted`], or the first query error.
    pub fn snapshot(&mut self) -> StoreResult<()> {
        self.enter(InitPhase::SnapshotComplete)?;
        self.started = Instant::now();
        let schema = key_schema();
        for kind in self.data.kinds() {
            let request =
                QueryRequest::new(self.table, PARTITION_KEY, self.namespace.for_kind(kind))
                    .with_projection(vec![PARTITION_KEY.to_string(), SORT_KEY.to_string()])
                    .consistent()
                    .with_limit(self.page_size);
            let keys = collect_keys(QueryPages::new(self.client, request), &schema)?;
            self.leftover.extend(keys);
        }
        self.phase = InitPhase::SnapshotComplete;
        Ok(())
    }

    /// Stages a put for every item in the data set.
    ///
    /// Oversized items are logged and skipped. A skipped item's address stays
    /// in the leftover set, so an older stored copy is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInitPhase`] unless the snapshot is
    /// complete, or [`StoreError::ReservedPayload`] for an item that cannot
    /// be encoded. Nothing has been written in either case.
    pub fn stage_upserts(&mut self) -> StoreResult<()> {
        self.enter(InitPhase::UpsertsStaged)?;
        for (kind, items) in &self.data.collections {
            for (key, item) in items {
                let address = self.namespace.address(*kind, key);
                let encoded = encode(&address, item).inspect_err(|_| {
                    tracing::error!(
                        namespace = %address.partition,
                        key = %address.sort,
                        "live item payload collides with the deleted-item placeholder"
                    );
                })?;
                if !check_size_limit(&encoded) {
                    self.skipped.push(address);
                    continue;
                }
                self.requests.push(WriteRequest::Put(encoded));
                self.leftover.remove(&address);
                self.items_written += 1;
            }
        }
        self.phase = InitPhase::UpsertsStaged;
        Ok(())
    }

    /// Stages a delete for every snapshot key that was not written.
    ///
    /// The control record is never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInitPhase`] unless upserts are staged.
    pub fn stage_deletes(&mut self) -> StoreResult<()> {
        self.enter(InitPhase::DeletesStaged)?;
        let inited = self.namespace.inited_key();
        let schema = key_schema();
        for address in std::mem::take(&mut self.leftover) {
            if address == inited {
                continue;
            }
            self.requests
                .push(WriteRequest::Delete(schema.key_item(&address.partition, &address.sort)));
            self.keys_deleted += 1;
        }
        self.phase = InitPhase::DeletesStaged;
        Ok(())
    }

    /// Stages the control record and flushes every staged write in order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInitPhase`] unless deletes are staged,
    /// or the first batch error. Batches sent before the error stay written.
    pub fn commit(mut self) -> StoreResult<InitSummary> {
        self.enter(InitPhase::Committed)?;
        let inited = self.namespace.inited_key();
        self.requests
            .push(WriteRequest::Put(key_schema().key_item(&inited.partition, &inited.sort)));

        let batches = write_all(self.client, self.table, self.requests)?;
        let summary = InitSummary {
            items_written: self.items_written,
            skipped: self.skipped,
            keys_deleted: self.keys_deleted,
            batches,
            duration: self.started.elapsed(),
        };
        tracing::info!(
            table = self.table,
            prefix = self.namespace.prefix().unwrap_or(""),
            items = summary.items_written,
            skipped = summary.skipped.len(),
            deleted = summary.keys_deleted,
            batches,
            elapsed_ms = u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
            "initialized table"
        );
        Ok(summary)
    }

    /// Runs every remaining phase in order.
    ///
    /// # Errors
    ///
    /// Returns the first error of any phase.
    pub fn run(mut self) -> StoreResult<InitSummary> {
        if self.phase == InitPhase::NotStarted {
            self.snapshot()?;
        }
        if self.phase == InitPhase::SnapshotComplete {
            self.stage_upserts()?;
        }
        if self.phase == InitPhase::UpsertsStaged {
            self.stage_deletes()?;
        }
        self.commit()
    }
}
