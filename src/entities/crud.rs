//! Create, read, update, void and delete for any [`Entity`], plus document
//! delivery for sales forms.
//!
//! Payloads are plain JSON records in the API's own shape. Single-record
//! responses arrive wrapped as `{"<Entity>": {...}, "time": ...}`; the wrapper
//! is stripped before the record is returned.

use reqwest::{
    Method,
    header::{CONTENT_TYPE, HeaderValue},
};
use serde_json::{Map, Value};

use crate::client::{Client, RequestOptions};
use crate::endpoints::Endpoint;
use crate::error::{Error, Result};
use crate::transport::Transport;

use super::{Entity, Operation};

pub(crate) const ID: &str = "Id";
pub(crate) const SYNC_TOKEN: &str = "SyncToken";
const SPARSE: &str = "sparse";

/// How [`update_with`] posts the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateMode {
    #[default]
    Update,
    /// Voids the transaction instead of changing its fields.
    Void,
}

/// What [`delete`] removes: a bare id, read first for its `SyncToken`, or a
/// record that already carries one.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    Id(String),
    Record(Value),
}

impl From<&str> for DeleteTarget {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for DeleteTarget {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Value> for DeleteTarget {
    fn from(record: Value) -> Self {
        Self::Record(record)
    }
}

impl From<&Value> for DeleteTarget {
    fn from(record: &Value) -> Self {
        Self::Record(record.clone())
    }
}

/// Strips the `{"<Entity>": ...}` wrapper, matching the key case-insensitively.
/// Payloads without the wrapper are returned as they are.
#[must_use]
pub fn unwrap_envelope(entity: Entity, payload: Value) -> Value {
    let Value::Object(mut map) = payload else {
        return payload;
    };
    let key = map
        .keys()
        .find(|key| key.eq_ignore_ascii_case(entity.name()))
        .cloned();
    match key.and_then(|key| map.remove(&key)) {
        Some(record) => record,
        None => Value::Object(map),
    }
}

fn has_value(record: &Map<String, Value>, field: &str) -> bool {
    match record.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Fails with [`Error::MissingField`] unless `field` is present, non-null and
/// not blank.
pub(crate) fn require(
    entity: Entity,
    record: &Map<String, Value>,
    field: &'static str,
) -> Result<()> {
    if has_value(record, field) {
        Ok(())
    } else {
        Err(Error::missing_field(entity, field))
    }
}

fn as_record(entity: Entity, payload: &Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(record) => Ok(record.clone()),
        other => Err(Error::invalid_payload(
            entity,
            format!("expected a JSON object, got {other}"),
        )),
    }
}

pub(crate) fn id_and_sync_token(record: &Map<String, Value>) -> Value {
    let mut body = Map::new();
    for field in [ID, SYNC_TOKEN] {
        if let Some(value) = record.get(field) {
            body.insert(field.to_string(), value.clone());
        }
    }
    Value::Object(body)
}

async fn post_entity<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    options: RequestOptions,
) -> Result<Value> {
    let payload = client
        .dispatch(Method::POST, &Endpoint::Entity(entity), options)
        .await?;
    Ok(unwrap_envelope(entity, payload.deserialize()?))
}

#[instrument(skip(client, payload))]
pub async fn create<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    payload: &Value,
) -> Result<Value> {
    entity.ensure(Operation::Create)?;
    post_entity(
        client,
        entity,
        RequestOptions::default().with_body(payload.clone()),
    )
    .await
}

#[instrument(skip(client))]
pub async fn get<T: Transport>(client: &Client<T>, entity: Entity, id: &str) -> Result<Value> {
    entity.ensure(Operation::Read)?;
    if id.trim().is_empty() {
        return Err(Error::missing_field(entity, ID));
    }
    let payload = client
        .dispatch(
            Method::GET,
            &Endpoint::Record(entity, id.trim().to_string()),
            RequestOptions::default(),
        )
        .await?;
    Ok(unwrap_envelope(entity, payload.deserialize()?))
}

/// Posts `payload` as an update, or as a void when `mode` is
/// [`UpdateMode::Void`].
///
/// The record must carry a non-empty `Id` and `SyncToken` (exchange rates
/// excepted); this is checked before anything is sent. Updates are sparse
/// unless the payload sets `sparse` itself. Invoices and sales receipts void
/// through `operation=void`; payments and bill payments through a sparse
/// `operation=update&include=void`.
#[instrument(skip(client, payload))]
pub async fn update_with<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    payload: &Value,
    mode: UpdateMode,
) -> Result<Value> {
    let operation = match mode {
        UpdateMode::Update => Operation::Update,
        UpdateMode::Void => Operation::Void,
    };
    entity.ensure(operation)?;

    let mut record = as_record(entity, payload)?;
    if entity.requires_sync_token() {
        require(entity, &record, ID)?;
        require(entity, &record, SYNC_TOKEN)?;
    }

    let options = match mode {
        UpdateMode::Update => {
            record
                .entry(SPARSE)
                .or_insert(Value::Bool(true));
            RequestOptions::default()
                .with_query("operation", "update")
                .with_body(Value::Object(record))
        }
        UpdateMode::Void => match entity {
            Entity::Payment | Entity::BillPayment => {
                let mut body = id_and_sync_token(&record);
                if let Value::Object(body) = &mut body {
                    body.insert(SPARSE.to_string(), Value::Bool(true));
                }
                RequestOptions::default()
                    .with_query("operation", "update")
                    .with_query("include", "void")
                    .with_body(body)
            }
            _ => RequestOptions::default()
                .with_query("operation", "void")
                .with_body(id_and_sync_token(&record)),
        },
    };

    post_entity(client, entity, options).await
}

/// Deletes a record. A bare id, or a record without a `SyncToken`, is read
/// first to obtain the current token.
#[instrument(skip(client, target))]
pub async fn delete<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    target: DeleteTarget,
) -> Result<Value> {
    entity.ensure(Operation::Delete)?;

    let record = match target {
        DeleteTarget::Id(id) => as_record(entity, &get(client, entity, &id).await?)?,
        DeleteTarget::Record(record) => {
            let record = as_record(entity, &record)?;
            require(entity, &record, ID)?;
            if has_value(&record, SYNC_TOKEN) {
                record
            } else {
                let id = match &record[ID] {
                    Value::String(id) => id.clone(),
                    other => other.to_string(),
                };
                debug!(%entity, %id, "reading record for its sync token");
                as_record(entity, &get(client, entity, &id).await?)?
            }
        }
    };
    require(entity, &record, ID)?;
    require(entity, &record, SYNC_TOKEN)?;

    post_entity(
        client,
        entity,
        RequestOptions::default()
            .with_query("operation", "delete")
            .with_body(id_and_sync_token(&record)),
    )
    .await
}

/// Downloads the printable form of a sales document.
#[instrument(skip(client))]
pub async fn pdf<T: Transport>(client: &Client<T>, entity: Entity, id: &str) -> Result<Vec<u8>> {
    entity.ensure(Operation::Pdf)?;
    if id.trim().is_empty() {
        return Err(Error::missing_field(entity, ID));
    }
    client
        .dispatch(
            Method::GET,
            &Endpoint::Pdf(entity, id.trim().to_string()),
            RequestOptions::default(),
        )
        .await?
        .into_bytes()
}

/// Emails a sales document, to `send_to` when given or else to the address
/// already on the record.
#[instrument(skip(client))]
pub async fn send<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    id: &str,
    send_to: Option<&str>,
) -> Result<Value> {
    entity.ensure(Operation::Send)?;
    if id.trim().is_empty() {
        return Err(Error::missing_field(entity, ID));
    }
    let mut options = RequestOptions::default().with_header(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Some(send_to) = send_to.map(str::trim).filter(|s| !s.is_empty()) {
        options = options.with_query("sendTo", send_to);
    }
    let payload = client
        .dispatch(
            Method::POST,
            &Endpoint::Send(entity, id.trim().to_string()),
            options,
        )
        .await?;
    Ok(unwrap_envelope(entity, payload.deserialize()?))
}

/// The company profile, read by the configured realm id.
#[instrument(skip(client))]
pub async fn company_info<T: Transport>(client: &Client<T>) -> Result<Value> {
    let realm_id = client.config().realm_id().trim().to_string();
    get(client, Entity::CompanyInfo, &realm_id).await
}

#[instrument(skip(client))]
pub async fn preferences<T: Transport>(client: &Client<T>) -> Result<Value> {
    let payload = client
        .dispatch(Method::GET, &Endpoint::Preferences, RequestOptions::default())
        .await?;
    Ok(unwrap_envelope(Entity::Preferences, payload.deserialize()?))
}
