//! Batched operations: up to [`MAX_BATCH_ITEMS`] creates, updates, deletes
//! and queries in a single `POST /batch`.

use reqwest::Method;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::client::{Client, RequestOptions};
use crate::endpoints::Endpoint;
use crate::entities::crud::{ID, SYNC_TOKEN, id_and_sync_token, require};
use crate::entities::{Entity, Operation};
use crate::error::{Error, Result};
use crate::query::{FilterSet, compile};
use crate::transport::Transport;

pub const MAX_BATCH_ITEMS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
enum BatchOperation {
    Create(Entity, Value),
    Update(Entity, Value),
    Delete(Entity, Value),
    Query(String),
}

/// One entry of a batch request.
///
/// Each item is identified by a `bId`, echoed back on its response; a random
/// one is assigned unless [`BatchItem::with_id`] sets it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    id: Option<String>,
    operation: BatchOperation,
}

impl BatchItem {
    fn new(operation: BatchOperation) -> Self {
        Self {
            id: None,
            operation,
        }
    }

    #[must_use]
    pub fn create(entity: Entity, payload: Value) -> Self {
        Self::new(BatchOperation::Create(entity, payload))
    }

    /// A sparse update unless the payload sets `sparse`.
    #[must_use]
    pub fn update(entity: Entity, payload: Value) -> Self {
        Self::new(BatchOperation::Update(entity, payload))
    }

    /// `record` must carry `Id` and `SyncToken`.
    #[must_use]
    pub fn delete(entity: Entity, record: Value) -> Self {
        Self::new(BatchOperation::Delete(entity, record))
    }

    /// A query compiled from `filters`. Only the first page is returned in a
    /// batch; `fetchAll` has no effect here.
    pub fn query(entity: Entity, filters: &FilterSet) -> Result<Self> {
        let compiled = compile(entity, filters)?;
        Ok(Self::new(BatchOperation::Query(compiled.into_string())))
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_request(&self, index: usize) -> Result<Value> {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut item = Map::new();
        item.insert("bId".to_string(), Value::String(id));
        match &self.operation {
            BatchOperation::Create(entity, payload) => {
                entity.ensure(Operation::Create)?;
                let record = object(index, *entity, payload)?;
                item.insert("operation".to_string(), json!("create"));
                item.insert(entity.name().to_string(), Value::Object(record));
            }
            BatchOperation::Update(entity, payload) => {
                entity.ensure(Operation::Update)?;
                let mut record = object(index, *entity, payload)?;
                if entity.requires_sync_token() {
                    require(*entity, &record, ID)?;
                    require(*entity, &record, SYNC_TOKEN)?;
                }
                record
                    .entry("sparse")
                    .or_insert(Value::Bool(true));
                item.insert("operation".to_string(), json!("update"));
                item.insert(entity.name().to_string(), Value::Object(record));
            }
            BatchOperation::Delete(entity, payload) => {
                entity.ensure(Operation::Delete)?;
                let record = object(index, *entity, payload)?;
                require(*entity, &record, ID)?;
                require(*entity, &record, SYNC_TOKEN)?;
                item.insert("operation".to_string(), json!("delete"));
                item.insert(entity.name().to_string(), id_and_sync_token(&record));
            }
            BatchOperation::Query(query) => {
                item.insert("Query".to_string(), Value::String(query.clone()));
            }
        }
        Ok(Value::Object(item))
    }
}

fn object(index: usize, entity: Entity, payload: &Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(record) => Ok(record.clone()),
        _ => Err(Error::invalid_batch(format!(
            "item {index}: {entity} payload must be a JSON object"
        ))),
    }
}

/// Builds the `{"BatchItemRequest": [...]}` body, checking every item first.
pub fn request_body(items: &[BatchItem]) -> Result<Value> {
    if items.is_empty() {
        return Err(Error::invalid_batch("no items given"));
    }
    if items.len() > MAX_BATCH_ITEMS {
        return Err(Error::invalid_batch(format!(
            "{} items given, at most {MAX_BATCH_ITEMS} are allowed",
            items.len()
        )));
    }

    let mut ids: Vec<&str> = Vec::new();
    for id in items.iter().filter_map(BatchItem::id) {
        if ids.contains(&id) {
            return Err(Error::invalid_batch(format!("duplicate bId `{id}`")));
        }
        ids.push(id);
    }

    let requests = items
        .iter()
        .enumerate()
        .map(|(index, item)| item.to_request(index))
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({ "BatchItemRequest": requests }))
}

/// Sends `items` as one batch and returns the `BatchItemResponse` document.
#[instrument(skip(client, items), fields(items = items.len()))]
pub async fn execute<T: Transport>(client: &Client<T>, items: Vec<BatchItem>) -> Result<Value> {
    let body = request_body(&items)?;
    client
        .dispatch(
            Method::POST,
            &Endpoint::Batch,
            RequestOptions::default().with_body(body),
        )
        .await?
        .deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_each_operation() {
        let body = request_body(&[
            BatchItem::create(Entity::Customer, json!({"DisplayName": "Acme"})).with_id("1"),
            BatchItem::update(Entity::Invoice, json!({"Id": "5", "SyncToken": "2"})).with_id("2"),
            BatchItem::delete(Entity::Bill, json!({"Id": "7", "SyncToken": "0", "TotalAmt": 3}))
                .with_id("3"),
            BatchItem::query(Entity::Item, &FilterSet::new().with("Active", true))
                .unwrap()
                .with_id("4"),
        ])
        .unwrap();

        let items = body["BatchItemRequest"].as_array().unwrap();
        assert_eq!(
            items[0],
            json!({"bId": "1", "operation": "create", "Customer": {"DisplayName": "Acme"}})
        );
        assert_eq!(
            items[1],
            json!({"bId": "2", "operation": "update", "Invoice": {"Id": "5", "SyncToken": "2", "sparse": true}})
        );
        assert_eq!(
            items[2],
            json!({"bId": "3", "operation": "delete", "Bill": {"Id": "7", "SyncToken": "0"}})
        );
        assert_eq!(
            items[3],
            json!({"bId": "4", "Query": "select * from Item where Active = true startposition 1 maxresults 1000"})
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        let body = request_body(&[
            BatchItem::create(Entity::Customer, json!({})),
            BatchItem::create(Entity::Customer, json!({})),
        ])
        .unwrap();
        let items = body["BatchItemRequest"].as_array().unwrap();
        let first = items[0]["bId"].as_str().unwrap();
        let second = items[1]["bId"].as_str().unwrap();
        assert!(Uuid::parse_str(first).is_ok());
        assert_ne!(first, second);
    }

    #[test]
    fn size_limits_are_enforced() {
        assert!(matches!(request_body(&[]), Err(Error::InvalidBatch { .. })));

        let items: Vec<_> = (0..=MAX_BATCH_ITEMS)
            .map(|_| BatchItem::create(Entity::Customer, json!({})))
            .collect();
        assert!(matches!(request_body(&items), Err(Error::InvalidBatch { .. })));
        assert!(request_body(&items[..MAX_BATCH_ITEMS]).is_ok());
    }

    #[test]
    fn item_preconditions_are_checked() {
        let missing_token = BatchItem::update(Entity::Customer, json!({"Id": "1"}));
        assert!(matches!(
            request_body(&[missing_token]),
            Err(Error::MissingField { field: "SyncToken", .. })
        ));

        let unsupported = BatchItem::delete(Entity::Customer, json!({"Id": "1", "SyncToken": "0"}));
        assert!(matches!(
            request_body(&[unsupported]),
            Err(Error::UnsupportedOperation { .. })
        ));

        let duplicate = [
            BatchItem::create(Entity::Customer, json!({})).with_id("a"),
            BatchItem::create(Entity::Vendor, json!({})).with_id("a"),
        ];
        assert!(matches!(request_body(&duplicate), Err(Error::InvalidBatch { .. })));
    }

    #[test]
    fn blank_ids_and_tokens_count_as_missing() {
        let blank_id = BatchItem::delete(Entity::Bill, json!({"Id": "  ", "SyncToken": "0"}));
        assert!(matches!(
            request_body(&[blank_id]),
            Err(Error::MissingField { entity: Entity::Bill, field: "Id", .. })
        ));

        let null_token = BatchItem::update(Entity::Invoice, json!({"Id": "5", "SyncToken": null}));
        assert!(matches!(
            request_body(&[null_token]),
            Err(Error::MissingField { field: "SyncToken", .. })
        ));

        let rate = BatchItem::update(Entity::ExchangeRate, json!({"SourceCurrencyCode": "EUR"}));
        assert!(request_body(&[rate]).is_ok());
    }
}
