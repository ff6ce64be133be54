//! Golden rows in the table's JSON wire form.
//!
//! Other clients read and write the same table, so the stored layout is a
//! compatibility contract. Golden rows pin it down as the JSON the table's
//! own tooling prints, e.g. `{"namespace": {"S": "features"}, ...}`.

use flagstore_table::Item;
use serde_json::Value;

/// Renders an item in the table's JSON wire form.
pub fn to_wire_json(item: &Item) -> Value {
    serde_json::to_value(item).expect("attribute values always serialize")
}

/// Parses a golden row written in the table's JSON wire form.
pub fn parse_golden(row: &str) -> Item {
    serde_json::from_str(row).unwrap_or_else(|e| panic!("invalid golden row {row}: {e}"))
}

/// Asserts that `actual` is exactly the golden row `expected`.
///
/// Attribute order is irrelevant; names, types and values must all match.
pub fn assert_golden(actual: &Item, expected: &str) {
    let expected_item = parse_golden(expected);
    if *actual != expected_item {
        panic!(
            "Golden row mismatch:\n\
             Expected: {}\n\
             Actual:   {}",
            to_wire_json(&expected_item),
            to_wire_json(actual)
        );
    }
}

/// Asserts that the rows of a table match the golden rows, in any order.
pub fn assert_golden_rows(actual: &[Item], expected: &[&str]) {
    let mut remaining: Vec<Item> = expected.iter().map(|row| parse_golden(row)).collect();
    for item in actual {
        match remaining.iter().position(|candidate| candidate == item) {
            Some(index) => {
                remaining.swap_remove(index);
            }
            None => panic!("Unexpected row: {}", to_wire_json(item)),
        }
    }
    if !remaining.is_empty() {
        let missing: Vec<Value> = remaining.iter().map(to_wire_json).collect();
        panic!("Missing rows: {}", Value::Array(missing));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagstore_table::AttributeValue;

    #[test]
    fn golden_row_parses_wire_json() {
        let item = parse_golden(r#"{"namespace": {"S": "features"}, "version": {"N": "2"}}"#);
        assert_eq!(item["namespace"], AttributeValue::S("features".into()));
        assert_eq!(item["version"], AttributeValue::N("2".into()));
    }

    #[test]
    fn order_of_rows_is_irrelevant() {
        let a = parse_golden(r#"{"key": {"S": "a"}}"#);
        let b = parse_golden(r#"{"key": {"S": "b"}}"#);
        assert_golden_rows(&[b, a], &[r#"{"key": {"S": "a"}}"#, r#"{"key": {"S": "b"}}"#]);
    }

    #[test]
    #[should_panic(expected = "Missing rows")]
    fn missing_rows_fail() {
        assert_golden_rows(&[], &[r#"{"key": {"S": "a"}}"#]);
    }
}
