//! Store configuration.

/// Configuration shared by [`crate::DataStore`] and [`crate::BigSegmentStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name of the table holding every namespace. Must already exist.
    pub table_name: String,

    /// Namespace prefix; `None` (or empty) means no prefix.
    pub prefix: Option<String>,

    /// Whether the table client is shared with other owners. A shared
    /// client is left open when the store is closed.
    pub shared_client: bool,

    /// Page size requested from queries (`None` = the table's default).
    pub page_size: Option<usize>,
}

impl StoreConfig {
    /// Creates a configuration for `table_name` with default values.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            prefix: None,
            shared_client: false,
            page_size: None,
        }
    }

    /// Sets the namespace prefix. An empty prefix is the same as none.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Marks the client as shared, so closing the store leaves it open.
    #[must_use]
    pub const fn shared_client(mut self, value: bool) -> Self {
        self.shared_client = value;
        self
    }

    /// Sets the query page size. Zero leaves paging to the table.
    #[must_use]
    pub const fn page_size(mut self, size: usize) -> Self {
        self.page_size = if size == 0 { None } else { Some(size) };
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("")
    }
}
