//! Size guard for the table's per-item ceiling.
//!
//! The cost model follows the store's capacity accounting: a fixed overhead
//! plus the UTF-8 length of every attribute name and value.

use crate::keys::{PARTITION_KEY, SORT_KEY};
use flagstore_table::{AttributeValue, Item};

/// Largest encoded item the store accepts, in bytes.
///
/// The store documents "400KB"; this stays below any reading of that.
pub const MAX_ITEM_SIZE: usize = 400_000;

/// Fixed per-item overhead counted against [`MAX_ITEM_SIZE`].
pub const ITEM_OVERHEAD: usize = 100;

/// Estimates the encoded size of `item` in bytes.
#[must_use]
pub fn item_size(item: &Item) -> usize {
    item.iter().fold(ITEM_OVERHEAD, |size, (name, value)| {
        size + name.len() + value_size(value)
    })
}

fn value_size(value: &AttributeValue) -> usize {
    match value {
        AttributeValue::S(s) | AttributeValue::N(s) => s.len(),
        AttributeValue::Ss(members) => members.iter().map(String::len).sum(),
    }
}

/// Returns true if `item` is small enough to store.
#[must_use]
pub fn fits(item: &Item) -> bool {
    item_size(item) <= MAX_ITEM_SIZE
}

/// Like [`fits`], but logs an error naming the item when it does not fit.
pub(crate) fn check_size_limit(item: &Item) -> bool {
    let size = item_size(item);
    if size <= MAX_ITEM_SIZE {
        return true;
    }
    let attr = |name: &str| item.get(name).and_then(AttributeValue::as_s).unwrap_or("?");
    tracing::error!(
        namespace = attr(PARTITION_KEY),
        key = attr(SORT_KEY),
        size,
        limit = MAX_ITEM_SIZE,
        "item was too large to store and was dropped"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::encode;
    use crate::types::ItemDescriptor;
    use flagstore_table::TableKey;

    fn encoded(payload: &str) -> Item {
        encode(&TableKey::new("features", "flag"), &ItemDescriptor::new(1, payload)).unwrap()
    }

    #[test]
    fn size_counts_overhead_names_and_values() {
        let item = encoded("{}");
        // names: namespace(9) key(3) version(7) item(4); values: features(8) flag(4) 1(1) {}(2)
        assert_eq!(item_size(&item), ITEM_OVERHEAD + 9 + 3 + 7 + 4 + 8 + 4 + 1 + 2);
    }

    #[test]
    fn size_counts_utf8_bytes_not_chars() {
        let ascii = item_size(&encoded("aa"));
        let multibyte = item_size(&encoded("é€"));
        assert_eq!(multibyte - ascii, (2 + 3) - 2);

        let astral = item_size(&encoded("😀"));
        assert_eq!(astral - ascii, 4 - 2);
    }

    #[test]
    fn string_sets_count_every_member() {
        let mut item = Item::new();
        item.insert(
            "included".into(),
            AttributeValue::Ss(vec!["ab".into(), "cde".into()]),
        );
        assert_eq!(item_size(&item), ITEM_OVERHEAD + 8 + 5);
    }

    #[test]
    fn boundary_is_inclusive() {
        let base = item_size(&encoded(""));
        let at_limit = encoded(&"x".repeat(MAX_ITEM_SIZE - base));
        assert_eq!(item_size(&at_limit), MAX_ITEM_SIZE);
        assert!(fits(&at_limit));

        let over = encoded(&"x".repeat(MAX_ITEM_SIZE - base + 1));
        assert!(!fits(&over));
        assert!(!check_size_limit(&over));
    }
}
