//! Big Segment membership and sync metadata reads.
//!
//! Rows are written by an external synchronizer. This side only reads them:
//!
//! | row | partition | sort | attributes |
//! |---|---|---|---|
//! | membership | `prefix:big_segments_user` | user hash | `included`, `excluded` (SS) |
//! | metadata | `prefix:big_segments_metadata` | same as partition | `synchronizedOn` (N, epoch millis) |

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::TableHandle;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flagstore_table::{AttributeValue, Item, TableClient, TableKey};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

/// String-set attribute listing segments that include the user.
pub const INCLUDED_ATTRIBUTE: &str = "included";

/// String-set attribute listing segments that exclude the user.
pub const EXCLUDED_ATTRIBUTE: &str = "excluded";

/// Numeric attribute holding the last synchronization time.
pub const SYNC_TIME_ATTRIBUTE: &str = "synchronizedOn";

/// Hashes a user key the way membership rows are keyed: base64 (standard
/// alphabet, padded) of the SHA-256 digest of the key's UTF-8 bytes.
#[must_use]
pub fn hash_user_key(user_key: &str) -> String {
    STANDARD.encode(Sha256::digest(user_key.as_bytes()))
}

/// A user's Big Segment membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Segment references that include the user.
    pub included: BTreeSet<String>,
    /// Segment references that exclude the user.
    pub excluded: BTreeSet<String>,
}

impl Membership {
    /// Returns whether `segment_ref` includes the user, or `None` if the
    /// segment does not mention the user. Inclusion wins over exclusion.
    #[must_use]
    pub fn check(&self, segment_ref: &str) -> Option<bool> {
        if self.included.contains(segment_ref) {
            Some(true)
        } else if self.excluded.contains(segment_ref) {
            Some(false)
        } else {
            None
        }
    }
}

/// Big Segment synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetadata {
    /// Epoch milliseconds of the last completed synchronization.
    pub last_up_to_date: i64,
}

/// Read-only view of Big Segment data in a shared table.
pub struct BigSegmentStore<C: TableClient + ?Sized> {
    handle: TableHandle<C>,
}

impl<C: TableClient + ?Sized> BigSegmentStore<C> {
    /// Creates a store over `client`. The table must already exist.
    pub fn new(client: Arc<C>, config: StoreConfig) -> Self {
        Self {
            handle: TableHandle::new(client, config),
        }
    }

    /// Reads the membership row of a hashed user key (see [`hash_user_key`]).
    ///
    /// Returns `None` if no row exists. A missing set attribute reads as an
    /// empty set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DataIntegrity`] if a set attribute has another
    /// type, or the table error.
    pub fn get_membership(&self, user_hash: &str) -> StoreResult<Option<Membership>> {
        let address = self.handle.namespace().membership_key(user_hash);
        let Some(item) = self.handle.get_item(&address)? else {
            return Ok(None);
        };
        Ok(Some(Membership {
            included: string_set(&item, &address, INCLUDED_ATTRIBUTE)?,
            excluded: string_set(&item, &address, EXCLUDED_ATTRIBUTE)?,
        }))
    }

    /// Reads the synchronization metadata.
    ///
    /// Returns `None` if the row or its timestamp attribute is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DataIntegrity`] if the timestamp is not an
    /// integer number, or the table error.
    pub fn get_metadata(&self) -> StoreResult<Option<StoreMetadata>> {
        let address = self.handle.namespace().metadata_key();
        let Some(item) = self.handle.get_item(&address)? else {
            return Ok(None);
        };
        let Some(value) = item.get(SYNC_TIME_ATTRIBUTE) else {
            return Ok(None);
        };
        let last_up_to_date = value
            .as_n()
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| {
                integrity(&address, format!("{SYNC_TIME_ATTRIBUTE} is not an integer number"))
            })?;
        Ok(Some(StoreMetadata { last_up_to_date }))
    }

    /// Closes the store.
    ///
    /// # Errors
    ///
    /// Returns the client's close error.
    pub fn close(&self) -> StoreResult<()> {
        self.handle.close()
    }
}

fn string_set(item: &Item, address: &TableKey, name: &str) -> StoreResult<BTreeSet<String>> {
    match item.get(name) {
        None => Ok(BTreeSet::new()),
        Some(AttributeValue::Ss(members)) => Ok(members.iter().cloned().collect()),
        Some(other) => Err(integrity(
            address,
            format!("{name} has type {}, expected SS", other.type_name()),
        )),
    }
}

fn integrity(address: &TableKey, reason: String) -> StoreError {
    StoreError::data_integrity(address.partition.clone(), address.sort.clone(), reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::key_schema;
    use flagstore_table::{InMemoryTable, PutItemRequest};

    const TABLE: &str = "big";

    fn store(prefix: &str) -> (Arc<InMemoryTable>, BigSegmentStore<InMemoryTable>) {
        let table = Arc::new(InMemoryTable::new());
        table.create_table(TABLE, key_schema());
        let config = StoreConfig::new(TABLE).prefix(prefix);
        let store = BigSegmentStore::new(Arc::clone(&table), config);
        (table, store)
    }

    fn put(table: &InMemoryTable, partition: &str, sort: &str, attrs: Vec<(&str, AttributeValue)>) {
        let mut item = key_schema().key_item(partition, sort);
        item.extend(attrs.into_iter().map(|(k, v)| (k.to_string(), v)));
        table.put_item(&PutItemRequest::new(TABLE, item)).unwrap();
    }

    fn ss(values: &[&str]) -> AttributeValue {
        AttributeValue::Ss(values.iter().map(|v| (*v).to_string()).collect())
    }

    #[test]
    fn hash_matches_known_digest() {
        assert_eq!(
            hash_user_key("userkey"),
            "72cBpXPyn4N6TqqlS8Tti37jEcoNhFzL9ZdG1jXkILE="
        );
        assert_eq!(
            hash_user_key(""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn membership_inclusion_wins() {
        let membership = Membership {
            included: ["a".to_string(), "b".to_string()].into(),
            excluded: ["b".to_string(), "c".to_string()].into(),
        };
        assert_eq!(membership.check("a"), Some(true));
        assert_eq!(membership.check("b"), Some(true));
        assert_eq!(membership.check("c"), Some(false));
        assert_eq!(membership.check("d"), None);
    }

    #[test]
    fn membership_reads() {
        let (table, store) = store("p");
        put(
            &table,
            "p:big_segments_user",
            "hash1",
            vec![("included", ss(&["seg1"])), ("excluded", ss(&["seg2"]))],
        );
        put(&table, "p:big_segments_user", "hash2", vec![("excluded", ss(&["seg3"]))]);

        let first = store.get_membership("hash1").unwrap().unwrap();
        assert_eq!(first.check("seg1"), Some(true));
        assert_eq!(first.check("seg2"), Some(false));

        let second = store.get_membership("hash2").unwrap().unwrap();
        assert!(second.included.is_empty());
        assert_eq!(second.check("seg3"), Some(false));

        assert_eq!(store.get_membership("missing").unwrap(), None);
    }

    #[test]
    fn membership_with_wrong_type_is_integrity_error() {
        let (table, store) = store("");
        put(
            &table,
            "big_segments_user",
            "hash1",
            vec![("included", AttributeValue::S("seg1".into()))],
        );
        assert!(matches!(
            store.get_membership("hash1"),
            Err(StoreError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn metadata_reads() {
        let (table, store) = store("p");
        assert_eq!(store.get_metadata().unwrap(), None);

        put(&table, "p:big_segments_metadata", "p:big_segments_metadata", vec![]);
        assert_eq!(store.get_metadata().unwrap(), None);

        put(
            &table,
            "p:big_segments_metadata",
            "p:big_segments_metadata",
            vec![("synchronizedOn", AttributeValue::number(1_234_567_890_123_i64))],
        );
        assert_eq!(
            store.get_metadata().unwrap(),
            Some(StoreMetadata {
                last_up_to_date: 1_234_567_890_123
            })
        );
    }

    #[test]
    fn unparseable_metadata_is_integrity_error() {
        let (table, store) = store("");
        put(
            &table,
            "big_segments_metadata",
            "big_segments_metadata",
            vec![("synchronizedOn", AttributeValue::S("yesterday".into()))],
        );
        assert!(matches!(
            store.get_metadata(),
            Err(StoreError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn closed_store_rejects_reads() {
        let (table, store) = store("");
        store.close().unwrap();
        assert!(table.is_closed());
        assert!(matches!(store.get_membership("h"), Err(StoreError::Closed)));
        assert!(matches!(store.get_metadata(), Err(StoreError::Closed)));
    }
}
