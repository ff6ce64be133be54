//! # flagstore Table
//!
//! Table client contract and implementations for flagstore.
//!
//! This crate provides the lowest-level abstraction: a single key/value
//! table addressed by a string partition attribute and a string sort
//! attribute. Tables are **opaque attribute stores** - they do not
//! interpret the items they hold.
//!
//! ## Design Principles
//!
//! - Requests are plain synchronous request/response calls
//! - Preconditions are typed ([`Condition`]), not expression strings
//! - Pagination is exposed as continuation tokens, never hidden
//! - Must be `Send + Sync` for concurrent access
//! - flagstore owns all item layout interpretation
//!
//! ## Available Clients
//!
//! - [`InMemoryTable`] - For testing and embedding
//! - `DynamoDbTable` - Adapter over the AWS SDK (requires the `aws` feature)
//!
//! ## Example
//!
//! ```rust
//! use flagstore_table::{AttributeValue, GetItemRequest, InMemoryTable, Item, KeySchema,
//!     PutItemRequest, TableClient};
//!
//! let table = InMemoryTable::new();
//! table.create_table("flags", KeySchema::new("namespace", "key"));
//!
//! let mut item = Item::new();
//! item.insert("namespace".into(), AttributeValue::S("features".into()));
//! item.insert("key".into(), AttributeValue::S("my-flag".into()));
//! table.put_item(&PutItemRequest::new("flags", item.clone())).unwrap();
//!
//! let key = KeySchema::new("namespace", "key").key_item("features", "my-flag");
//! let found = table.get_item(&GetItemRequest::new("flags", key)).unwrap();
//! assert_eq!(found, Some(item));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
#[cfg(feature = "aws")]
mod dynamodb;
mod error;
mod memory;
mod types;

pub use client::TableClient;
#[cfg(feature = "aws")]
pub use dynamodb::DynamoDbTable;
pub use error::{TableError, TableResult};
pub use memory::{CallStats, InMemoryTable, Operation};
pub use types::{
    AttributeValue, BatchWriteRequest, Condition, GetItemRequest, Item, KeySchema, Page,
    PutItemRequest, QueryRequest, ScanRequest, TableKey, WriteRequest, MAX_BATCH_SIZE,
};
