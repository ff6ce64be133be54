//! Attribute, key, and request types shared by all table clients.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Maximum number of requests accepted by a single batch write.
pub const MAX_BATCH_SIZE: usize = 25;

/// A table item: attribute name to attribute value.
pub type Item = HashMap<String, AttributeValue>;

/// A single attribute value.
///
/// Serializes in the table's JSON wire form, e.g. `{"S": "flag1"}` or
/// `{"N": "3"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A non-empty string.
    #[serde(rename = "S")]
    S(String),
    /// A number, carried in its decimal string form.
    #[serde(rename = "N")]
    N(String),
    /// A set of strings.
    #[serde(rename = "SS")]
    Ss(Vec<String>),
}

impl AttributeValue {
    /// Creates a numeric attribute from any displayable number.
    pub fn number(value: impl fmt::Display) -> Self {
        Self::N(value.to_string())
    }

    /// Returns the string value, if this is a string attribute.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric string, if this is a numeric attribute.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the members, if this is a string-set attribute.
    #[must_use]
    pub fn as_ss(&self) -> Option<&[String]> {
        match self {
            Self::Ss(values) => Some(values),
            _ => None,
        }
    }

    /// Returns the wire type descriptor (`S`, `N` or `SS`).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Ss(_) => "SS",
        }
    }
}

/// Names of the two attributes that form a table's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Name of the string partition attribute.
    pub partition: String,
    /// Name of the string sort attribute.
    pub sort: String,
}

impl KeySchema {
    /// Creates a key schema.
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Builds the key-only item addressing `(partition, sort)`.
    #[must_use]
    pub fn key_item(&self, partition: &str, sort: &str) -> Item {
        let mut item = Item::with_capacity(2);
        item.insert(self.partition.clone(), AttributeValue::S(partition.to_string()));
        item.insert(self.sort.clone(), AttributeValue::S(sort.to_string()));
        item
    }

    /// Extracts the primary key of an item, if both key attributes are strings.
    #[must_use]
    pub fn table_key(&self, item: &Item) -> Option<TableKey> {
        let partition = item.get(&self.partition)?.as_s()?;
        let sort = item.get(&self.sort)?.as_s()?;
        Some(TableKey::new(partition, sort))
    }
}

/// A fully resolved primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    /// Partition attribute value.
    pub partition: String,
    /// Sort attribute value.
    pub sort: String,
}

impl TableKey {
    /// Creates a table key.
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

/// A typed write precondition, evaluated against the currently stored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The named attribute is absent (true when no item is stored).
    AttributeNotExists(String),
    /// The stored numeric attribute is strictly less than `value`.
    ///
    /// False when the attribute is absent or not numeric.
    NumberLessThan {
        /// Attribute to compare.
        attribute: String,
        /// Decimal number to compare against.
        value: String,
    },
    /// At least one of the conditions holds.
    Any(Vec<Condition>),
}

impl Condition {
    /// Creates an [`Condition::AttributeNotExists`] condition.
    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::AttributeNotExists(attribute.into())
    }

    /// Creates a [`Condition::NumberLessThan`] condition.
    pub fn less_than(attribute: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::NumberLessThan {
            attribute: attribute.into(),
            value: value.to_string(),
        }
    }

    /// Evaluates the condition against the stored item (`None` if absent).
    #[must_use]
    pub fn evaluate(&self, existing: Option<&Item>) -> bool {
        match self {
            Self::AttributeNotExists(name) => existing.map_or(true, |item| !item.contains_key(name)),
            Self::NumberLessThan { attribute, value } => existing
                .and_then(|item| item.get(attribute))
                .and_then(AttributeValue::as_n)
                .and_then(|stored| compare_numbers(stored, value))
                .map_or(false, |ordering| ordering == Ordering::Less),
            Self::Any(conditions) => conditions.iter().any(|c| c.evaluate(existing)),
        }
    }
}

/// Compares two decimal strings, exactly for integers.
fn compare_numbers(a: &str, b: &str) -> Option<Ordering> {
    if let (Ok(a), Ok(b)) = (a.trim().parse::<i128>(), b.trim().parse::<i128>()) {
        return Some(a.cmp(&b));
    }
    let a = a.trim().parse::<f64>().ok()?;
    let b = b.trim().parse::<f64>().ok()?;
    a.partial_cmp(&b)
}

/// Point read of a single item.
#[derive(Debug, Clone)]
pub struct GetItemRequest {
    /// Table name.
    pub table: String,
    /// Key-only item.
    pub key: Item,
    /// Whether the read must be strongly consistent.
    pub consistent_read: bool,
}

impl GetItemRequest {
    /// Creates an eventually consistent get.
    pub fn new(table: impl Into<String>, key: Item) -> Self {
        Self {
            table: table.into(),
            key,
            consistent_read: false,
        }
    }

    /// Requests a strongly consistent read.
    #[must_use]
    pub fn consistent(mut self) -> Self {
        self.consistent_read = true;
        self
    }
}

/// Write of a single full item, optionally guarded by a precondition.
#[derive(Debug, Clone)]
pub struct PutItemRequest {
    /// Table name.
    pub table: String,
    /// The item to store, key attributes included.
    pub item: Item,
    /// Precondition; `None` means unconditional.
    pub condition: Option<Condition>,
}

impl PutItemRequest {
    /// Creates an unconditional put.
    pub fn new(table: impl Into<String>, item: Item) -> Self {
        Self {
            table: table.into(),
            item,
            condition: None,
        }
    }

    /// Guards the put with a precondition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Equality query over one partition, returning a single page.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Table name.
    pub table: String,
    /// Name of the partition attribute.
    pub partition_attribute: String,
    /// Partition value to match.
    pub partition_value: String,
    /// Attributes to return; `None` returns whole items.
    pub projection: Option<Vec<String>>,
    /// Whether the read must be strongly consistent.
    pub consistent_read: bool,
    /// Maximum number of items in the page.
    pub limit: Option<usize>,
    /// Continuation token from the previous page.
    pub exclusive_start_key: Option<Item>,
}

impl QueryRequest {
    /// Creates a query matching `partition_attribute = partition_value`.
    pub fn new(
        table: impl Into<String>,
        partition_attribute: impl Into<String>,
        partition_value: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            partition_attribute: partition_attribute.into(),
            partition_value: partition_value.into(),
            projection: None,
            consistent_read: false,
            limit: None,
            exclusive_start_key: None,
        }
    }

    /// Restricts the returned attributes.
    #[must_use]
    pub fn with_projection(mut self, attributes: Vec<String>) -> Self {
        self.projection = Some(attributes);
        self
    }

    /// Requests a strongly consistent read.
    #[must_use]
    pub fn consistent(mut self) -> Self {
        self.consistent_read = true;
        self
    }

    /// Caps the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Scan of the whole table, returning a single page.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Table name.
    pub table: String,
    /// Attributes to return; `None` returns whole items.
    pub projection: Option<Vec<String>>,
    /// Whether the read must be strongly consistent.
    pub consistent_read: bool,
    /// Maximum number of items in the page.
    pub limit: Option<usize>,
    /// Continuation token from the previous page.
    pub exclusive_start_key: Option<Item>,
}

impl ScanRequest {
    /// Creates a scan over `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            projection: None,
            consistent_read: false,
            limit: None,
            exclusive_start_key: None,
        }
    }

    /// Restricts the returned attributes.
    #[must_use]
    pub fn with_projection(mut self, attributes: Vec<String>) -> Self {
        self.projection = Some(attributes);
        self
    }

    /// Requests a strongly consistent read.
    #[must_use]
    pub fn consistent(mut self) -> Self {
        self.consistent_read = true;
        self
    }

    /// Caps the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of query or scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items in this page.
    pub items: Vec<Item>,
    /// Continuation token; `None` once the results are exhausted.
    pub last_evaluated_key: Option<Item>,
}

/// A single operation inside a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Store a full item unconditionally.
    Put(Item),
    /// Delete the item with this key-only item.
    Delete(Item),
}

/// A batch of at most [`MAX_BATCH_SIZE`] writes against one table.
#[derive(Debug, Clone)]
pub struct BatchWriteRequest {
    /// Table name.
    pub table: String,
    /// Writes, applied in order.
    pub requests: Vec<WriteRequest>,
}

impl BatchWriteRequest {
    /// Creates a batch write.
    pub fn new(table: impl Into<String>, requests: Vec<WriteRequest>) -> Self {
        Self {
            table: table.into(),
            requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versioned(version: u64) -> Item {
        let mut item = KeySchema::new("namespace", "key").key_item("features", "flag");
        item.insert("version".into(), AttributeValue::number(version));
        item
    }

    #[test]
    fn attribute_value_json_wire_form() {
        let json = serde_json::to_string(&AttributeValue::S("flag1".into())).unwrap();
        assert_eq!(json, r#"{"S":"flag1"}"#);

        let json = serde_json::to_string(&AttributeValue::number(7)).unwrap();
        assert_eq!(json, r#"{"N":"7"}"#);

        let parsed: AttributeValue = serde_json::from_str(r#"{"SS":["a","b"]}"#).unwrap();
        assert_eq!(parsed, AttributeValue::Ss(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn accessors_match_variant() {
        let s = AttributeValue::S("x".into());
        assert_eq!(s.as_s(), Some("x"));
        assert_eq!(s.as_n(), None);
        assert_eq!(s.type_name(), "S");

        let n = AttributeValue::number(3);
        assert_eq!(n.as_n(), Some("3"));
        assert!(n.as_ss().is_none());
    }

    #[test]
    fn key_schema_round_trip() {
        let schema = KeySchema::new("namespace", "key");
        let item = schema.key_item("p", "s");
        assert_eq!(schema.table_key(&item), Some(TableKey::new("p", "s")));
    }

    #[test]
    fn key_schema_rejects_non_string_keys() {
        let schema = KeySchema::new("namespace", "key");
        let mut item = schema.key_item("p", "s");
        item.insert("key".into(), AttributeValue::number(1));
        assert_eq!(schema.table_key(&item), None);
    }

    #[test]
    fn not_exists_condition() {
        let condition = Condition::not_exists("namespace");
        assert!(condition.evaluate(None));
        assert!(!condition.evaluate(Some(&versioned(1))));
    }

    #[test]
    fn less_than_condition() {
        let condition = Condition::less_than("version", 5);
        assert!(condition.evaluate(Some(&versioned(4))));
        assert!(!condition.evaluate(Some(&versioned(5))));
        assert!(!condition.evaluate(Some(&versioned(6))));
        assert!(!condition.evaluate(None));
    }

    #[test]
    fn less_than_compares_numerically_not_lexically() {
        let condition = Condition::less_than("version", 10);
        assert!(condition.evaluate(Some(&versioned(9))));
    }

    #[test]
    fn any_condition() {
        let condition = Condition::Any(vec![
            Condition::not_exists("namespace"),
            Condition::less_than("version", 2),
        ]);
        assert!(condition.evaluate(None));
        assert!(condition.evaluate(Some(&versioned(1))));
        assert!(!condition.evaluate(Some(&versioned(2))));
    }

    #[test]
    fn table_key_display() {
        assert_eq!(TableKey::new("features", "flag1").to_string(), "features/flag1");
    }
}
