//! Item marshaling between [`ItemDescriptor`] and table attributes.
//!
//! Each item is stored as exactly four attributes: the two key attributes,
//! a numeric `version`, and the serialized payload in `item`. The table
//! forbids empty strings, so tombstones store a fixed placeholder payload.

use crate::error::{StoreError, StoreResult};
use crate::keys::{PARTITION_KEY, SORT_KEY};
use crate::types::ItemDescriptor;
use flagstore_table::{AttributeValue, Item, TableKey};

/// Name of the numeric version attribute.
pub const VERSION_ATTRIBUTE: &str = "version";

/// Name of the serialized payload attribute.
pub const ITEM_ATTRIBUTE: &str = "item";

/// Payload stored for tombstones.
///
/// Shared with every other client of the table, so it cannot change. A live
/// item whose payload is exactly this string is rejected by [`encode`].
pub const DELETED_ITEM_PLACEHOLDER: &str = "null";

/// Encodes `item` for storage at `address`.
///
/// # Errors
///
/// Returns [`StoreError::ReservedPayload`] if a live item's payload equals
/// [`DELETED_ITEM_PLACEHOLDER`].
pub fn encode(address: &TableKey, item: &ItemDescriptor) -> StoreResult<Item> {
    let payload = match &item.payload {
        Some(payload) if payload == DELETED_ITEM_PLACEHOLDER => {
            return Err(StoreError::ReservedPayload {
                namespace: address.partition.clone(),
                key: address.sort.clone(),
            })
        }
        Some(payload) => payload.clone(),
        None => DELETED_ITEM_PLACEHOLDER.to_string(),
    };

    let mut encoded = Item::with_capacity(4);
    encoded.insert(PARTITION_KEY.into(), AttributeValue::S(address.partition.clone()));
    encoded.insert(SORT_KEY.into(), AttributeValue::S(address.sort.clone()));
    encoded.insert(VERSION_ATTRIBUTE.into(), AttributeValue::number(item.version));
    encoded.insert(ITEM_ATTRIBUTE.into(), AttributeValue::S(payload));
    Ok(encoded)
}

/// Decodes a stored item.
///
/// Returns `Ok(None)` for an empty attribute map.
///
/// # Errors
///
/// Returns [`StoreError::DataIntegrity`] if the payload or version attribute
/// is missing, has the wrong type, or the version is not an integer.
pub fn decode(attributes: &Item) -> StoreResult<Option<ItemDescriptor>> {
    if attributes.is_empty() {
        return Ok(None);
    }
    let corrupt = |reason: &str| {
        let part = |name: &str| {
            attributes
                .get(name)
                .and_then(AttributeValue::as_s)
                .unwrap_or("?")
                .to_string()
        };
        StoreError::data_integrity(part(PARTITION_KEY), part(SORT_KEY), reason)
    };

    let payload = attributes
        .get(ITEM_ATTRIBUTE)
        .and_then(AttributeValue::as_s)
        .ok_or_else(|| corrupt("item did not contain expected payload string"))?;
    let version = attributes
        .get(VERSION_ATTRIBUTE)
        .and_then(AttributeValue::as_n)
        .ok_or_else(|| corrupt("item did not contain expected version attribute"))?
        .parse::<u64>()
        .map_err(|_| corrupt("version attribute had a non-integer value"))?;

    if payload == DELETED_ITEM_PLACEHOLDER {
        Ok(Some(ItemDescriptor::deleted(version)))
    } else {
        Ok(Some(ItemDescriptor::new(version, payload)))
    }
}
