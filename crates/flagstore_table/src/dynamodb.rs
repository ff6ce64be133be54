//! Table client backed by the AWS DynamoDB SDK.
//!
//! The SDK is asynchronous; this adapter drives it to completion on a
//! caller-supplied tokio runtime so it can satisfy the blocking
//! [`TableClient`] contract. Calls must not be made from inside that
//! runtime's own worker threads.

use crate::client::TableClient;
use crate::error::{TableError, TableResult};
use crate::types::{
    AttributeValue, BatchWriteRequest, Condition, GetItemRequest, Item, Page, PutItemRequest,
    QueryRequest, ScanRequest, WriteRequest,
};
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeValue as SdkValue, DeleteRequest, PutRequest, WriteRequest as SdkWriteRequest,
};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::fmt;
use tokio::runtime::Handle;

/// A [`TableClient`] over an existing DynamoDB SDK client.
///
/// Table provisioning and credentials are the caller's concern; the table
/// must already exist with the key schema the store expects.
#[derive(Debug, Clone)]
pub struct DynamoDbTable {
    client: Client,
    runtime: Handle,
}

impl DynamoDbTable {
    /// Wraps an SDK client; requests are driven on `runtime`.
    pub fn new(client: Client, runtime: Handle) -> Self {
        Self { client, runtime }
    }

    /// Returns the wrapped SDK client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn to_sdk(value: &AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s.clone()),
        AttributeValue::N(n) => SdkValue::N(n.clone()),
        AttributeValue::Ss(members) => SdkValue::Ss(members.clone()),
    }
}

fn from_sdk(value: &SdkValue) -> Option<AttributeValue> {
    match value {
        SdkValue::S(s) => Some(AttributeValue::S(s.clone())),
        SdkValue::N(n) => Some(AttributeValue::N(n.clone())),
        SdkValue::Ss(members) => Some(AttributeValue::Ss(members.clone())),
        _ => None,
    }
}

fn item_to_sdk(item: &Item) -> HashMap<String, SdkValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_sdk(value)))
        .collect()
}

// Attribute types flagstore never writes are dropped.
fn item_from_sdk(item: &HashMap<String, SdkValue>) -> Item {
    item.iter()
        .filter_map(|(name, value)| from_sdk(value).map(|value| (name.clone(), value)))
        .collect()
}

fn map_sdk_error<E, R>(table: &str) -> impl FnOnce(SdkError<E, R>) -> TableError + '_
where
    E: ProvideErrorMetadata + fmt::Debug,
    R: fmt::Debug,
{
    move |err| {
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{err:?}"));
        match &err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
                TableError::transport_retryable(message)
            }
            SdkError::ConstructionFailure(_) => TableError::Validation(message),
            _ => error_for_code(err.code(), table, message),
        }
    }
}

fn error_for_code(code: Option<&str>, table: &str, message: String) -> TableError {
    match code {
        Some("ConditionalCheckFailedException") => TableError::ConditionalCheckFailed,
        Some("ResourceNotFoundException") => TableError::ResourceNotFound {
            table: table.to_string(),
        },
        Some("ValidationException") => TableError::Validation(message),
        Some("ProvisionedThroughputExceededException")
        | Some("ThrottlingException")
        | Some("RequestLimitExceeded") => TableError::Throttled(message),
        Some("InternalServerError") | Some("ServiceUnavailable") => {
            TableError::transport_retryable(message)
        }
        _ => TableError::transport_fatal(message),
    }
}

/// Placeholder maps for one DynamoDB expression.
#[derive(Default)]
struct Expression {
    names: HashMap<String, String>,
    values: HashMap<String, SdkValue>,
}

impl Expression {
    fn name(&mut self, attribute: &str) -> String {
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, value: SdkValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    fn render(&mut self, condition: &Condition) -> TableResult<String> {
        match condition {
            Condition::AttributeNotExists(attribute) => {
                let name = self.name(attribute);
                Ok(format!("attribute_not_exists({name})"))
            }
            Condition::NumberLessThan { attribute, value } => {
                let name = self.name(attribute);
                let value = self.value(SdkValue::N(value.clone()));
                Ok(format!("{name} < {value}"))
            }
            Condition::Any(conditions) => {
                if conditions.is_empty() {
                    return Err(TableError::Validation("empty OR condition".into()));
                }
                let parts = conditions
                    .iter()
                    .map(|c| self.render(c))
                    .collect::<TableResult<Vec<_>>>()?;
                Ok(format!("({})", parts.join(" OR ")))
            }
        }
    }

    fn projection(&mut self, attributes: &[String]) -> String {
        attributes
            .iter()
            .map(|attribute| self.name(attribute))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn names(&self) -> Option<HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    fn values(&self) -> Option<HashMap<String, SdkValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }
}

fn limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
}

fn to_sdk_write(write: &WriteRequest) -> TableResult<SdkWriteRequest> {
    let build_error = |e: aws_sdk_dynamodb::error::BuildError| TableError::Validation(e.to_string());
    Ok(match write {
        WriteRequest::Put(item) => {
            let put = PutRequest::builder()
                .set_item(Some(item_to_sdk(item)))
                .build()
                .map_err(build_error)?;
            SdkWriteRequest::builder().put_request(put).build()
        }
        WriteRequest::Delete(key) => {
            let delete = DeleteRequest::builder()
                .set_key(Some(item_to_sdk(key)))
                .build()
                .map_err(build_error)?;
            SdkWriteRequest::builder().delete_request(delete).build()
        }
    })
}

impl TableClient for DynamoDbTable {
    fn get_item(&self, request: &GetItemRequest) -> TableResult<Option<Item>> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .get_item()
                    .table_name(&request.table)
                    .set_key(Some(item_to_sdk(&request.key)))
                    .consistent_read(request.consistent_read)
                    .send(),
            )
            .map_err(map_sdk_error(&request.table))?;
        Ok(output
            .item()
            .map(item_from_sdk)
            .filter(|item| !item.is_empty()))
    }

    fn put_item(&self, request: &PutItemRequest) -> TableResult<()> {
        let mut expression = Expression::default();
        let condition = request
            .condition
            .as_ref()
            .map(|c| expression.render(c))
            .transpose()?;
        self.runtime
            .block_on(
                self.client
                    .put_item()
                    .table_name(&request.table)
                    .set_item(Some(item_to_sdk(&request.item)))
                    .set_condition_expression(condition)
                    .set_expression_attribute_names(expression.names())
                    .set_expression_attribute_values(expression.values())
                    .send(),
            )
            .map_err(map_sdk_error(&request.table))?;
        Ok(())
    }

    fn query(&self, request: &QueryRequest) -> TableResult<Page> {
        let mut expression = Expression::default();
        let partition = expression.name(&request.partition_attribute);
        let value = expression.value(SdkValue::S(request.partition_value.clone()));
        let projection = request
            .projection
            .as_deref()
            .map(|attributes| expression.projection(attributes));
        let output = self
            .runtime
            .block_on(
                self.client
                    .query()
                    .table_name(&request.table)
                    .key_condition_expression(format!("{partition} = {value}"))
                    .set_projection_expression(projection)
                    .set_expression_attribute_names(expression.names())
                    .set_expression_attribute_values(expression.values())
                    .consistent_read(request.consistent_read)
                    .set_limit(limit(request.limit))
                    .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(item_to_sdk))
                    .send(),
            )
            .map_err(map_sdk_error(&request.table))?;
        Ok(Page {
            items: output.items().iter().map(item_from_sdk).collect(),
            last_evaluated_key: output.last_evaluated_key().map(item_from_sdk),
        })
    }

    fn scan(&self, request: &ScanRequest) -> TableResult<Page> {
        let mut expression = Expression::default();
        let projection = request
            .projection
            .as_deref()
            .map(|attributes| expression.projection(attributes));
        let output = self
            .runtime
            .block_on(
                self.client
                    .scan()
                    .table_name(&request.table)
                    .set_projection_expression(projection)
                    .set_expression_attribute_names(expression.names())
                    .consistent_read(request.consistent_read)
                    .set_limit(limit(request.limit))
                    .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(item_to_sdk))
                    .send(),
            )
            .map_err(map_sdk_error(&request.table))?;
        Ok(Page {
            items: output.items().iter().map(item_from_sdk).collect(),
            last_evaluated_key: output.last_evaluated_key().map(item_from_sdk),
        })
    }

    fn batch_write(&self, request: &BatchWriteRequest) -> TableResult<()> {
        let writes = request
            .requests
            .iter()
            .map(to_sdk_write)
            .collect::<TableResult<Vec<_>>>()?;
        let output = self
            .runtime
            .block_on(
                self.client
                    .batch_write_item()
                    .request_items(request.table.clone(), writes)
                    .send(),
            )
            .map_err(map_sdk_error(&request.table))?;
        let unprocessed = output
            .unprocessed_items()
            .and_then(|pending| pending.get(&request.table))
            .map_or(0, Vec::len);
        if unprocessed > 0 {
            tracing::warn!(
                table = %request.table,
                unprocessed,
                "batch write left requests unprocessed"
            );
            return Err(TableError::UnprocessedItems { count: unprocessed });
        }
        Ok(())
    }

    fn close(&self) -> TableResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_condition_renders_with_placeholders() {
        let condition = Condition::Any(vec![
            Condition::not_exists("namespace"),
            Condition::not_exists("key"),
            Condition::less_than("version", 3),
        ]);
        let mut expression = Expression::default();
        let text = expression.render(&condition).unwrap();
        assert_eq!(
            text,
            "(attribute_not_exists(#n0) OR attribute_not_exists(#n1) OR #n2 < :v0)"
        );
        assert_eq!(expression.names.get("#n2").map(String::as_str), Some("version"));
        assert_eq!(expression.values.get(":v0"), Some(&SdkValue::N("3".into())));
    }

    #[test]
    fn missing_table_names_the_requested_table() {
        let err = error_for_code(
            Some("ResourceNotFoundException"),
            "flags",
            "Requested resource not found".into(),
        );
        assert!(matches!(err, TableError::ResourceNotFound { ref table } if table == "flags"));
        let err = error_for_code(Some("ThrottlingException"), "flags", "slow".into());
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_maps_are_omitted() {
        let expression = Expression::default();
        assert!(expression.names().is_none());
        assert!(expression.values().is_none());
    }

    #[test]
    fn attribute_conversion_round_trip() {
        let value = AttributeValue::Ss(vec!["a".into()]);
        assert_eq!(from_sdk(&to_sdk(&value)), Some(value));
        assert_eq!(from_sdk(&SdkValue::Bool(true)), None);
    }
}
