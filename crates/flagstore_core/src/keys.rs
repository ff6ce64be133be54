//! Key encoding: where each record lives in the shared table.
//!
//! Every namespace sharing a table is isolated purely by prefixing the
//! partition value: `prefix + ":" + base`, or just `base` without a prefix.

use crate::types::DataKind;
use flagstore_table::{KeySchema, TableKey};

/// Name of the string partition attribute.
pub const PARTITION_KEY: &str = "namespace";

/// Name of the string sort attribute.
pub const SORT_KEY: &str = "key";

const INITED_BASE: &str = "$inited";
const MEMBERSHIP_BASE: &str = "big_segments_user";
const METADATA_BASE: &str = "big_segments_metadata";

/// Returns the key schema the table must be provisioned with.
#[must_use]
pub fn key_schema() -> KeySchema {
    KeySchema::new(PARTITION_KEY, SORT_KEY)
}

/// Returns the table address of `key` in `kind` under an optional prefix.
#[must_use]
pub fn address(kind: DataKind, key: &str, prefix: Option<&str>) -> TableKey {
    Namespace::new(prefix).address(kind, key)
}

/// A namespace prefix, normalized so that an empty prefix means none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    prefix: Option<String>,
}

impl Namespace {
    /// Creates a namespace from an optional prefix.
    #[must_use]
    pub fn new(prefix: Option<&str>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }

    /// Returns the prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Applies the prefix to a base name.
    #[must_use]
    pub fn prefixed(&self, base: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{base}"),
            None => base.to_string(),
        }
    }

    /// Returns the partition value of `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: DataKind) -> String {
        self.prefixed(kind.name())
    }

    /// Returns the address of `key` in `kind`.
    #[must_use]
    pub fn address(&self, kind: DataKind, key: &str) -> TableKey {
        TableKey::new(self.for_kind(kind), key)
    }

    /// Returns the address of the control record marking the namespace initialized.
    #[must_use]
    pub fn inited_key(&self) -> TableKey {
        let inited = self.prefixed(INITED_BASE);
        TableKey::new(inited.clone(), inited)
    }

    /// Returns the address of a user's Big Segment membership row.
    #[must_use]
    pub fn membership_key(&self, user_hash: &str) -> TableKey {
        TableKey::new(self.prefixed(MEMBERSHIP_BASE), user_hash)
    }

    /// Returns the address of the Big Segment sync metadata row.
    #[must_use]
    pub fn metadata_key(&self) -> TableKey {
        let metadata = self.prefixed(METADATA_BASE);
        TableKey::new(metadata.clone(), metadata)
    }
}
