//! Concurrent upsert races.
//!
//! These helpers start several writers against one key at the same instant
//! and report how the conditional write resolved them.

use flagstore_core::{DataKind, DataStore, ItemDescriptor, UpsertOutcome};
use flagstore_table::TableClient;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// How a race between concurrent writers resolved.
#[derive(Debug, Clone, Default)]
pub struct RaceResult {
    /// Writers whose item was written.
    pub applied: usize,
    /// Writers rejected by the version check.
    pub superseded: usize,
    /// Writers whose item was too large.
    pub too_large: usize,
    /// Wall-clock time of the race.
    pub duration: Duration,
}

impl RaceResult {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Applied => self.applied += 1,
            UpsertOutcome::Superseded => self.superseded += 1,
            UpsertOutcome::TooLarge => self.too_large += 1,
        }
    }
}

/// Upserts each of `items` to the same key from its own thread, all
/// released by one barrier.
///
/// Panics if any writer fails with an error.
pub fn race_upserts<C>(
    store: &Arc<DataStore<C>>,
    kind: DataKind,
    key: &str,
    items: Vec<ItemDescriptor>,
) -> RaceResult
where
    C: TableClient + ?Sized + 'static,
{
    let start = Instant::now();
    let barrier = Arc::new(Barrier::new(items.len()));
    let handles: Vec<_> = items
        .into_iter()
        .map(|item| {
            let store = Arc::clone(store);
            let barrier = Arc::clone(&barrier);
            let key = key.to_string();
            thread::spawn(move || {
                barrier.wait();
                store
                    .upsert_outcome(kind, &key, &item, None)
                    .expect("upsert failed")
            })
        })
        .collect();

    let mut result = RaceResult::default();
    for handle in handles {
        result.record(handle.join().expect("writer thread panicked"));
    }
    result.duration = start.elapsed();
    result
}

/// Runs `rounds` races on one key. In round `n` every one of `writers`
/// threads offers version `n + 1` with its own payload.
///
/// Returns one result per round.
pub fn repeated_equal_version_races<C>(
    store: &Arc<DataStore<C>>,
    kind: DataKind,
    key: &str,
    writers: usize,
    rounds: u64,
) -> Vec<RaceResult>
where
    C: TableClient + ?Sized + 'static,
{
    (1..=rounds)
        .map(|version| {
            let items = (0..writers)
                .map(|w| {
                    let payload = format!(r#"{{"writer":{w},"version":{version}}}"#);
                    ItemDescriptor::new(version, payload)
                })
                .collect();
            race_upserts(store, kind, key, items)
        })
        .collect()
}
