//! In-memory table client for testing and embedding.

use crate::client::TableClient;
use crate::error::{TableError, TableResult};
use crate::types::{
    AttributeValue, BatchWriteRequest, GetItemRequest, Item, KeySchema, Page, PutItemRequest,
    QueryRequest, ScanRequest, TableKey, WriteRequest, MAX_BATCH_SIZE,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

/// A table operation, used to address call counters and injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`TableClient::get_item`].
    GetItem,
    /// [`TableClient::put_item`].
    PutItem,
    /// [`TableClient::query`].
    Query,
    /// [`TableClient::scan`].
    Scan,
    /// [`TableClient::batch_write`].
    BatchWrite,
}

/// Number of calls made against an [`InMemoryTable`], failed calls included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Point reads.
    pub get_item: usize,
    /// Single-item writes.
    pub put_item: usize,
    /// Query pages fetched.
    pub query: usize,
    /// Scan pages fetched.
    pub scan: usize,
    /// Batch write calls.
    pub batch_write: usize,
}

impl CallStats {
    fn bump(&mut self, op: Operation) -> usize {
        let counter = match op {
            Operation::GetItem => &mut self.get_item,
            Operation::PutItem => &mut self.put_item,
            Operation::Query => &mut self.query,
            Operation::Scan => &mut self.scan,
            Operation::BatchWrite => &mut self.batch_write,
        };
        *counter += 1;
        *counter
    }
}

#[derive(Debug)]
struct Fault {
    after: usize,
    error: TableError,
}

#[derive(Debug)]
struct TableData {
    schema: KeySchema,
    items: BTreeMap<TableKey, Item>,
}

/// An in-memory table client.
///
/// This client keeps every table in memory and is suitable for:
/// - Unit tests
/// - Integration tests (call counters, batch log, fault injection)
/// - Embedding where no shared table is needed
///
/// Query and scan pages follow the real store's paging rules: a page that
/// reaches its limit always carries a continuation token, even when no
/// items remain, so the final page may be empty.
///
/// # Thread Safety
///
/// Every request runs under a single lock, so conditional puts are atomic
/// with respect to all other requests.
///
/// # Example
///
/// ```rust
/// use flagstore_table::{InMemoryTable, KeySchema, QueryRequest, TableClient};
///
/// let table = InMemoryTable::new().with_page_size(10);
/// table.create_table("flags", KeySchema::new("namespace", "key"));
/// let page = table.query(&QueryRequest::new("flags", "namespace", "features")).unwrap();
/// assert!(page.items.is_empty());
/// assert!(page.last_evaluated_key.is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTable {
    tables: RwLock<HashMap<String, TableData>>,
    page_size: Option<usize>,
    closed: AtomicBool,
    stats: Mutex<CallStats>,
    faults: Mutex<HashMap<Operation, Fault>>,
    batch_log: Mutex<Vec<BatchWriteRequest>>,
}

impl InMemoryTable {
    /// Creates a client with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every query and scan page at `size` items.
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Creates an empty table. Replaces any existing table of that name.
    pub fn create_table(&self, name: impl Into<String>, schema: KeySchema) {
        self.tables.write().insert(
            name.into(),
            TableData {
                schema,
                items: BTreeMap::new(),
            },
        );
    }

    /// Returns a copy of every item in `table`, in key order.
    #[must_use]
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.tables
            .read()
            .get(table)
            .map(|data| data.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the keys of every item in `table`, in key order.
    #[must_use]
    pub fn keys(&self, table: &str) -> Vec<TableKey> {
        self.tables
            .read()
            .get(table)
            .map(|data| data.items.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the call counters.
    #[must_use]
    pub fn stats(&self) -> CallStats {
        self.stats.lock().clone()
    }

    /// Resets the call counters and the batch log.
    pub fn reset_stats(&self) {
        *self.stats.lock() = CallStats::default();
        self.batch_log.lock().clear();
    }

    /// Returns every batch write accepted so far, in call order.
    #[must_use]
    pub fn batch_log(&self) -> Vec<BatchWriteRequest> {
        self.batch_log.lock().clone()
    }

    /// Makes every call of `op` fail with `error` once `after` calls have
    /// been made (counted since the last [`Self::reset_stats`]).
    pub fn inject_fault(&self, op: Operation, after: usize, error: TableError) {
        self.faults.lock().insert(op, Fault { after, error });
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Returns true once [`TableClient::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn begin(&self, op: Operation) -> TableResult<()> {
        if self.is_closed() {
            return Err(TableError::Closed);
        }
        let count = self.stats.lock().bump(op);
        if let Some(fault) = self.faults.lock().get(&op) {
            if count > fault.after {
                tracing::debug!(?op, call = count, error = %fault.error, "injected table fault");
                return Err(fault.error.clone());
            }
        }
        Ok(())
    }

    fn effective_limit(&self, requested: Option<usize>) -> TableResult<Option<usize>> {
        if requested == Some(0) {
            return Err(TableError::Validation("limit must be at least 1".to_string()));
        }
        Ok(match (requested, self.page_size) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }
}

fn missing_table(table: &str) -> TableError {
    TableError::ResourceNotFound {
        table: table.to_string(),
    }
}

fn validate_key(schema: &KeySchema, item: &Item) -> TableResult<TableKey> {
    let key = schema.table_key(item).ok_or_else(|| {
        TableError::Validation(format!(
            "item must carry string key attributes {} and {}",
            schema.partition, schema.sort
        ))
    })?;
    if key.partition.is_empty() || key.sort.is_empty() {
        return Err(TableError::Validation(
            "key attributes must not be empty strings".into(),
        ));
    }
    Ok(key)
}

fn validate_item(schema: &KeySchema, item: &Item) -> TableResult<TableKey> {
    let key = validate_key(schema, item)?;
    for (name, value) in item {
        if let AttributeValue::Ss(members) = value {
            if members.is_empty() {
                return Err(TableError::Validation(format!(
                    "string set {name} must not be empty"
                )));
            }
        }
    }
    Ok(key)
}

fn project(item: &Item, projection: Option<&Vec<String>>) -> Item {
    match projection {
        Some(attributes) => item
            .iter()
            .filter(|(name, _)| attributes.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => item.clone(),
    }
}

fn collect_page<'a>(
    schema: &KeySchema,
    iter: impl Iterator<Item = (&'a TableKey, &'a Item)>,
    limit: Option<usize>,
    projection: Option<&Vec<String>>,
) -> Page {
    let mut page = Page::default();
    let mut last_key = None;
    for (key, item) in iter {
        if limit.is_some_and(|limit| page.items.len() >= limit) {
            break;
        }
        page.items.push(project(item, projection));
        last_key = Some(key);
    }
    if limit.is_some_and(|limit| page.items.len() >= limit) {
        page.last_evaluated_key = last_key.map(|key| schema.key_item(&key.partition, &key.sort));
    }
    page
}

impl TableClient for InMemoryTable {
    fn get_item(&self, request: &GetItemRequest) -> TableResult<Option<Item>> {
        self.begin(Operation::GetItem)?;
        let tables = self.tables.read();
        let data = tables
            .get(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;
        let key = validate_key(&data.schema, &request.key)?;
        Ok(data.items.get(&key).cloned())
    }

    fn put_item(&self, request: &PutItemRequest) -> TableResult<()> {
        self.begin(Operation::PutItem)?;
        let mut tables = self.tables.write();
        let data = tables
            .get_mut(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;
        let key = validate_item(&data.schema, &request.item)?;
        if let Some(condition) = &request.condition {
            if !condition.evaluate(data.items.get(&key)) {
                return Err(TableError::ConditionalCheckFailed);
            }
        }
        data.items.insert(key, request.item.clone());
        Ok(())
    }

    fn query(&self, request: &QueryRequest) -> TableResult<Page> {
        self.begin(Operation::Query)?;
        let tables = self.tables.read();
        let data = tables
            .get(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;
        if request.partition_attribute != data.schema.partition {
            return Err(TableError::Validation(format!(
                "query condition must use the partition attribute {}",
                data.schema.partition
            )));
        }
        let lower = match &request.exclusive_start_key {
            Some(start) => Bound::Excluded(validate_key(&data.schema, start)?),
            None => Bound::Included(TableKey::new(request.partition_value.clone(), "")),
        };
        let partition = request.partition_value.as_str();
        let iter = data
            .items
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.partition == partition);
        Ok(collect_page(
            &data.schema,
            iter,
            self.effective_limit(request.limit)?,
            request.projection.as_ref(),
        ))
    }

    fn scan(&self, request: &ScanRequest) -> TableResult<Page> {
        self.begin(Operation::Scan)?;
        let tables = self.tables.read();
        let data = tables
            .get(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;
        let lower = match &request.exclusive_start_key {
            Some(start) => Bound::Excluded(validate_key(&data.schema, start)?),
            None => Bound::Unbounded,
        };
        let iter = data.items.range((lower, Bound::Unbounded));
        Ok(collect_page(
            &data.schema,
            iter,
            self.effective_limit(request.limit)?,
            request.projection.as_ref(),
        ))
    }

    fn batch_write(&self, request: &BatchWriteRequest) -> TableResult<()> {
        self.begin(Operation::BatchWrite)?;
        if request.requests.is_empty() || request.requests.len() > MAX_BATCH_SIZE {
            return Err(TableError::Validation(format!(
                "batch must hold between 1 and {} requests, got {}",
                MAX_BATCH_SIZE,
                request.requests.len()
            )));
        }
        let mut tables = self.tables.write();
        let data = tables
            .get_mut(&request.table)
            .ok_or_else(|| missing_table(&request.table))?;

        // Validate everything first so a rejected batch changes nothing.
        let mut staged = Vec::with_capacity(request.requests.len());
        for write in &request.requests {
            match write {
                WriteRequest::Put(item) => {
                    staged.push((validate_item(&data.schema, item)?, Some(item)));
                }
                WriteRequest::Delete(key) => {
                    staged.push((validate_key(&data.schema, key)?, None));
                }
            }
        }
        for (key, item) in staged {
            match item {
                Some(item) => {
                    data.items.insert(key, item.clone());
                }
                None => {
                    data.items.remove(&key);
                }
            }
        }
        drop(tables);

        self.batch_log.lock().push(request.clone());
        Ok(())
    }

    fn close(&self) -> TableResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Condition;

    const TABLE: &str = "test-table";

    fn schema() -> KeySchema {
        KeySchema::new("namespace", "key")
    }

    fn table() -> InMemoryTable {
        let table = InMemoryTable::new();
        table.create_table(TABLE, schema());
        table
    }

    fn row(partition: &str, sort: &str, version: u64) -> Item {
        let mut item = schema().key_item(partition, sort);
        item.insert("version".into(), AttributeValue::number(version));
        item
    }

    fn put(table: &InMemoryTable, item: Item) {
        table.put_item(&PutItemRequest::new(TABLE, item)).unwrap();
    }

    #[test]
    fn memory_get_missing_returns_none() {
        let table = table();
        let key = schema().key_item("p", "s");
        assert_eq!(table.get_item(&GetItemRequest::new(TABLE, key)).unwrap(), None);
    }

    #[test]
    fn memory_put_then_get() {
        let table = table();
        put(&table, row("p", "s", 1));
        let key = schema().key_item("p", "s");
        let found = table.get_item(&GetItemRequest::new(TABLE, key).consistent()).unwrap();
        assert_eq!(found, Some(row("p", "s", 1)));
    }

    #[test]
    fn memory_unknown_table_fails() {
        let table = InMemoryTable::new();
        let key = schema().key_item("p", "s");
        let result = table.get_item(&GetItemRequest::new("nope", key));
        assert!(matches!(result, Err(TableError::ResourceNotFound { .. })));
    }

    #[test]
    fn memory_put_rejects_empty_key() {
        let table = table();
        let result = table.put_item(&PutItemRequest::new(TABLE, row("p", "", 1)));
        assert!(matches!(result, Err(TableError::Validation(_))));
    }

    #[test]
    fn memory_conditional_put_respects_condition() {
        let table = table();
        put(&table, row("p", "s", 5));

        let stale = PutItemRequest::new(TABLE, row("p", "s", 4))
            .with_condition(Condition::less_than("version", 4));
        assert_eq!(table.put_item(&stale), Err(TableError::ConditionalCheckFailed));

        let fresh = PutItemRequest::new(TABLE, row("p", "s", 6))
            .with_condition(Condition::less_than("version", 6));
        table.put_item(&fresh).unwrap();
        assert_eq!(table.items(TABLE), vec![row("p", "s", 6)]);
    }

    #[test]
    fn memory_query_stays_in_partition() {
        let table = table();
        put(&table, row("a", "1", 1));
        put(&table, row("b", "1", 1));
        put(&table, row("b", "2", 1));
        put(&table, row("c", "1", 1));

        let page = table.query(&QueryRequest::new(TABLE, "namespace", "b")).unwrap();
        assert_eq!(page.items, vec![row("b", "1", 1), row("b", "2", 1)]);
        assert!(page.last_evaluated_key.is_none());
    }

    #[test]
    fn memory_query_pages_with_continuation() {
        let table = InMemoryTable::new().with_page_size(2);
        table.create_table(TABLE, schema());
        for i in 0..5 {
            put(&table, row("p", &format!("k{i}"), 1));
        }

        let mut request = QueryRequest::new(TABLE, "namespace", "p");
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let page = table.query(&request).unwrap();
            pages += 1;
            seen.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => request.exclusive_start_key = Some(key),
                None => break,
            }
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(pages, 3);
    }

    #[test]
    fn memory_full_final_page_is_followed_by_empty_page() {
        let table = InMemoryTable::new().with_page_size(2);
        table.create_table(TABLE, schema());
        put(&table, row("p", "a", 1));
        put(&table, row("p", "b", 1));

        let page = table.query(&QueryRequest::new(TABLE, "namespace", "p")).unwrap();
        assert_eq!(page.items.len(), 2);
        let mut next = QueryRequest::new(TABLE, "namespace", "p");
        next.exclusive_start_key = page.last_evaluated_key;
        let page = table.query(&next).unwrap();
        assert!(page.items.is_empty());
        assert!(page.last_evaluated_key.is_none());
    }

    #[test]
    fn memory_query_projection() {
        let table = table();
        put(&table, row("p", "s", 1));
        let request = QueryRequest::new(TABLE, "namespace", "p")
            .with_projection(vec!["namespace".into(), "key".into()]);
        let page = table.query(&request).unwrap();
        assert_eq!(page.items, vec![schema().key_item("p", "s")]);
    }

    #[test]
    fn memory_scan_covers_all_partitions() {
        let table = table();
        put(&table, row("a", "1", 1));
        put(&table, row("b", "1", 1));
        let page = table.scan(&ScanRequest::new(TABLE).with_limit(Some(1))).unwrap();
        assert_eq!(page.items.len(), 1);
        let mut next = ScanRequest::new(TABLE);
        next.exclusive_start_key = page.last_evaluated_key;
        let page = table.scan(&next).unwrap();
        assert_eq!(page.items, vec![row("b", "1", 1)]);
    }

    #[test]
    fn memory_zero_limit_is_rejected() {
        let table = table();
        put(&table, row("p", "s", 1));
        let scan = table.scan(&ScanRequest::new(TABLE).with_limit(Some(0)));
        assert!(matches!(scan, Err(TableError::Validation(_))));
        let query = table.query(&QueryRequest::new(TABLE, "namespace", "p").with_limit(Some(0)));
        assert!(matches!(query, Err(TableError::Validation(_))));
    }

    #[test]
    fn memory_batch_write_applies_puts_and_deletes() {
        let table = table();
        put(&table, row("p", "old", 1));
        let batch = BatchWriteRequest::new(
            TABLE,
            vec![
                WriteRequest::Put(row("p", "new", 1)),
                WriteRequest::Delete(schema().key_item("p", "old")),
            ],
        );
        table.batch_write(&batch).unwrap();
        assert_eq!(table.keys(TABLE), vec![TableKey::new("p", "new")]);
        assert_eq!(table.batch_log().len(), 1);
    }

    #[test]
    fn memory_batch_write_rejects_oversized_batch() {
        let table = table();
        let requests = (0..=MAX_BATCH_SIZE)
            .map(|i| WriteRequest::Put(row("p", &i.to_string(), 1)))
            .collect();
        let result = table.batch_write(&BatchWriteRequest::new(TABLE, requests));
        assert!(matches!(result, Err(TableError::Validation(_))));
        assert!(table.items(TABLE).is_empty());
    }

    #[test]
    fn memory_batch_write_invalid_request_changes_nothing() {
        let table = table();
        let batch = BatchWriteRequest::new(
            TABLE,
            vec![
                WriteRequest::Put(row("p", "fine", 1)),
                WriteRequest::Put(row("p", "", 1)),
            ],
        );
        assert!(table.batch_write(&batch).is_err());
        assert!(table.items(TABLE).is_empty());
    }

    #[test]
    fn memory_injected_fault_fires_after_threshold() {
        let table = table();
        table.inject_fault(Operation::PutItem, 1, TableError::Throttled("busy".into()));
        put(&table, row("p", "a", 1));
        let result = table.put_item(&PutItemRequest::new(TABLE, row("p", "b", 1)));
        assert_eq!(result, Err(TableError::Throttled("busy".into())));

        table.clear_faults();
        put(&table, row("p", "b", 1));
        assert_eq!(table.stats().put_item, 3);
    }

    #[test]
    fn memory_closed_client_rejects_calls() {
        let table = table();
        table.close().unwrap();
        assert!(table.is_closed());
        let result = table.scan(&ScanRequest::new(TABLE));
        assert_eq!(result, Err(TableError::Closed));
    }
}
