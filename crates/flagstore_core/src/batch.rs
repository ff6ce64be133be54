//! Batched write executor.

use flagstore_table::{BatchWriteRequest, TableClient, TableResult, WriteRequest, MAX_BATCH_SIZE};

/// Writes `requests` to `table` in consecutive chunks of at most
/// [`MAX_BATCH_SIZE`], one batch call per chunk, in order.
///
/// Requests are neither reordered nor deduplicated. Returns the number of
/// batch calls made.
///
/// # Errors
///
/// The first failing chunk aborts the remaining chunks; its error is
/// returned unchanged. Chunks already sent stay written.
pub fn write_all<C: TableClient + ?Sized>(
    client: &C,
    table: &str,
    requests: Vec<WriteRequest>,
) -> TableResult<usize> {
    let total = requests.len();
    let mut batches = 0;
    let mut pending = requests.into_iter().peekable();
    while pending.peek().is_some() {
        let chunk: Vec<WriteRequest> = pending.by_ref().take(MAX_BATCH_SIZE).collect();
        let size = chunk.len();
        client.batch_write(&BatchWriteRequest::new(table, chunk))?;
        batches += 1;
        tracing::debug!(table, batch = batches, size, total, "flushed write batch");
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::key_schema;
    use flagstore_table::{AttributeValue, InMemoryTable, Operation, TableError};

    const TABLE: &str = "batches";

    fn table() -> InMemoryTable {
        let table = InMemoryTable::new();
        table.create_table(TABLE, key_schema());
        table
    }

    fn puts(count: usize) -> Vec<WriteRequest> {
        (0..count)
            .map(|i| {
                let mut item = key_schema().key_item("p", &format!("k{i:03}"));
                item.insert("version".into(), AttributeValue::number(1));
                WriteRequest::Put(item)
            })
            .collect()
    }

    #[test]
    fn chunks_preserve_order() {
        let table = table();
        let requests = puts(60);
        let batches = write_all(&table, TABLE, requests.clone()).unwrap();
        assert_eq!(batches, 3);

        let log = table.batch_log();
        let sizes: Vec<usize> = log.iter().map(|b| b.requests.len()).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
        let flattened: Vec<WriteRequest> = log.into_iter().flat_map(|b| b.requests).collect();
        assert_eq!(flattened, requests);
    }

    #[test]
    fn exact_multiple_makes_no_empty_batch() {
        let table = table();
        assert_eq!(write_all(&table, TABLE, puts(50)).unwrap(), 2);
        assert_eq!(table.stats().batch_write, 2);
    }

    #[test]
    fn empty_input_makes_no_calls() {
        let table = table();
        assert_eq!(write_all(&table, TABLE, Vec::new()).unwrap(), 0);
        assert_eq!(table.stats().batch_write, 0);
    }

    #[test]
    fn failing_chunk_aborts_the_rest() {
        let table = table();
        table.inject_fault(
            Operation::BatchWrite,
            1,
            TableError::transport_retryable("connection reset"),
        );
        let err = write_all(&table, TABLE, puts(60)).unwrap_err();
        assert_eq!(err, TableError::transport_retryable("connection reset"));
        assert_eq!(table.stats().batch_write, 2);
        assert_eq!(table.keys(TABLE).len(), 25);
    }
}
