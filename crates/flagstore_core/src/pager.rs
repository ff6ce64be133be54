//! Lazy paging over query and scan results.

use flagstore_table::{
    Item, KeySchema, Page, QueryRequest, ScanRequest, TableClient, TableKey, TableResult,
};
use std::iter::FusedIterator;

/// A request that returns one page at a time and can resume from a token.
pub trait PagedRequest {
    /// Fetches the page this request currently points at.
    ///
    /// # Errors
    ///
    /// Returns the table client's error unchanged.
    fn fetch<C: TableClient + ?Sized>(&self, client: &C) -> TableResult<Page>;

    /// Points the request at the page after `last_evaluated_key`.
    fn resume_from(&mut self, last_evaluated_key: Item);
}

impl PagedRequest for QueryRequest {
    fn fetch<C: TableClient + ?Sized>(&self, client: &C) -> TableResult<Page> {
        client.query(self)
    }

    fn resume_from(&mut self, last_evaluated_key: Item) {
        self.exclusive_start_key = Some(last_evaluated_key);
    }
}

impl PagedRequest for ScanRequest {
    fn fetch<C: TableClient + ?Sized>(&self, client: &C) -> TableResult<Page> {
        client.scan(self)
    }

    fn resume_from(&mut self, last_evaluated_key: Item) {
        self.exclusive_start_key = Some(last_evaluated_key);
    }
}

/// Iterator over the pages of a query or scan.
///
/// Each call to `next` is one blocking request. The iterator follows
/// continuation tokens until the table reports none, and ends after
/// yielding the first error.
pub struct Pages<'a, C: TableClient + ?Sized, R: PagedRequest> {
    client: &'a C,
    request: R,
    done: bool,
}

/// Pages of a single-partition query.
pub type QueryPages<'a, C> = Pages<'a, C, QueryRequest>;

/// Pages of a whole-table scan.
pub type ScanPages<'a, C> = Pages<'a, C, ScanRequest>;

impl<'a, C: TableClient + ?Sized, R: PagedRequest> Pages<'a, C, R> {
    /// Starts paging `request` against `client`.
    pub fn new(client: &'a C, request: R) -> Self {
        Self {
            client,
            request,
            done: false,
        }
    }
}

impl<C: TableClient + ?Sized, R: PagedRequest> Iterator for Pages<'_, C, R> {
    type Item = TableResult<Vec<Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.request.fetch(self.client) {
            Ok(page) => {
                tracing::debug!(
                    items = page.items.len(),
                    more = page.last_evaluated_key.is_some(),
                    "fetched page"
                );
                match page.last_evaluated_key {
                    Some(token) => self.request.resume_from(token),
                    None => self.done = true,
                }
                Some(Ok(page.items))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<C: TableClient + ?Sized, R: PagedRequest> FusedIterator for Pages<'_, C, R> {}

/// Drains `pages`, collecting the primary key of every item.
///
/// # Errors
///
/// Returns the first page error.
pub fn collect_keys<I>(pages: I, schema: &KeySchema) -> TableResult<Vec<TableKey>>
where
    I: IntoIterator<Item = TableResult<Vec<Item>>>,
{
    let mut keys = Vec::new();
    for page in pages {
        keys.extend(page?.iter().filter_map(|item| schema.table_key(item)));
    }
    Ok(keys)
}
