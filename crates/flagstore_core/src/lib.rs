//! # flagstore Core
//!
//! Feature-flag data store and Big Segment store over a shared key/value
//! table.
//!
//! This crate provides:
//! - Key encoding and item marshaling for flags, segments and tombstones
//! - [`DataStore`]: full data set replacement and versioned upserts
//! - [`LegacyFeatureStore`]: the older read-back upsert contract
//! - [`BigSegmentStore`]: membership and sync metadata reads
//!
//! Stores are generic over [`flagstore_table::TableClient`]. Every call
//! blocks on the client; no threads or timers are started.
//!
//! ## Consistency
//!
//! The table has no multi-item transactions. [`DataStore::init`] replaces a
//! namespace by overwriting, then deleting leftovers, then writing a control
//! record. [`DataStore::upsert`] is a single conditional write that only
//! succeeds for a strictly higher version, so concurrent writers converge on
//! the newest item.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod big_segments;
mod config;
mod data_store;
mod error;
mod init;
mod keys;
mod legacy;
mod marshal;
mod pager;
mod size;
mod store;
mod types;

pub use batch::write_all;
pub use big_segments::{
    hash_user_key, BigSegmentStore, Membership, StoreMetadata, EXCLUDED_ATTRIBUTE,
    INCLUDED_ATTRIBUTE, SYNC_TIME_ATTRIBUTE,
};
pub use config::StoreConfig;
pub use data_store::{DataStore, UpsertOutcome};
pub use error::{StoreError, StoreResult};
pub use init::{InitPhase, InitPlan, InitSummary};
pub use keys::{address, key_schema, Namespace, PARTITION_KEY, SORT_KEY};
pub use legacy::LegacyFeatureStore;
pub use marshal::{decode, encode, DELETED_ITEM_PLACEHOLDER, ITEM_ATTRIBUTE, VERSION_ATTRIBUTE};
pub use pager::{collect_keys, PagedRequest, Pages, QueryPages, ScanPages};
pub use size::{fits, item_size, ITEM_OVERHEAD, MAX_ITEM_SIZE};
pub use types::{DataKind, FullDataSet, ItemDescriptor, KeyedItems};
