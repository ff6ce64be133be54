//! Collection kinds, item descriptors, and full data sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A collection of items the evaluation client stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Feature flags.
    Features,
    /// User segments.
    Segments,
}

impl DataKind {
    /// Every kind, in the order a full data set lists them.
    pub const ALL: [DataKind; 2] = [DataKind::Features, DataKind::Segments];

    /// Returns the stable name used to build this kind's namespace.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DataKind::Features => "features",
            DataKind::Segments => "segments",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A versioned item with an opaque serialized payload.
///
/// A `payload` of `None` is a tombstone: the key is deleted as of `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Version; strictly increases across updates of the same key.
    pub version: u64,
    /// Serialized item, or `None` for a tombstone.
    pub payload: Option<String>,
}

impl ItemDescriptor {
    /// Creates a live item.
    pub fn new(version: u64, payload: impl Into<String>) -> Self {
        Self {
            version,
            payload: Some(payload.into()),
        }
    }

    /// Creates a tombstone.
    #[must_use]
    pub const fn deleted(version: u64) -> Self {
        Self {
            version,
            payload: None,
        }
    }

    /// Returns true for a tombstone.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.payload.is_none()
    }
}

/// Items of one kind, keyed by item key, in caller order.
pub type KeyedItems = Vec<(String, ItemDescriptor)>;

/// A complete, authoritative data set for every kind it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullDataSet {
    /// Collections, in the order they are written.
    pub collections: Vec<(DataKind, KeyedItems)>,
}

impl FullDataSet {
    /// Creates an empty data set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection.
    #[must_use]
    pub fn with_kind(mut self, kind: DataKind, items: KeyedItems) -> Self {
        self.collections.push((kind, items));
        self
    }

    /// Returns the kinds present, in order.
    pub fn kinds(&self) -> impl Iterator<Item = DataKind> + '_ {
        self.collections.iter().map(|(kind, _)| *kind)
    }

    /// Returns the number of items across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.iter().map(|(_, items)| items.len()).sum()
    }

    /// Returns true if no kind holds any item.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
