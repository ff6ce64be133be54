//! Table client trait definition.

use crate::error::TableResult;
use crate::types::{
    BatchWriteRequest, GetItemRequest, Item, Page, PutItemRequest, QueryRequest, ScanRequest,
};

/// A client for a key/value table with a composite string primary key.
///
/// Clients are **opaque attribute stores**. They provide point reads,
/// conditional single-item writes, paged reads, and unconditional batch
/// writes. flagstore owns all item layout interpretation - clients do not
/// understand versions, tombstones, or namespaces.
///
/// # Invariants
///
/// - `put_item` evaluates its [`crate::Condition`] atomically with the write
/// - `query` and `scan` return at most one page; callers follow
///   `last_evaluated_key` until it is `None`
/// - `batch_write` accepts at most [`crate::MAX_BATCH_SIZE`] requests and
///   either applies all of them or returns an error
/// - Clients must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryTable`] - For testing and embedding
pub trait TableClient: Send + Sync {
    /// Reads one item by key.
    ///
    /// Returns `Ok(None)` when no item is stored at the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or the request fails.
    fn get_item(&self, request: &GetItemRequest) -> TableResult<Option<Item>>;

    /// Writes one full item, replacing any item with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TableError::ConditionalCheckFailed`] if the request's
    /// condition does not hold; any other error if the request fails.
    fn put_item(&self, request: &PutItemRequest) -> TableResult<()>;

    /// Reads one page of items from a single partition, ordered by sort key.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or the request fails.
    fn query(&self, request: &QueryRequest) -> TableResult<Page>;

    /// Reads one page of items from the whole table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or the request fails.
    fn scan(&self, request: &ScanRequest) -> TableResult<Page>;

    /// Applies a batch of unconditional puts and deletes.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is too large, the table is missing, or
    /// the request fails. Partially applied batches are reported as errors.
    fn batch_write(&self, request: &BatchWriteRequest) -> TableResult<()>;

    /// Releases the client's resources.
    ///
    /// # Errors
    ///
    /// Returns an error if shutdown fails.
    fn close(&self) -> TableResult<()>;
}
