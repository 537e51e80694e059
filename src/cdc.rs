//! Change data capture: every record of the given types changed since a
//! point in time, deletions included.

use reqwest::Method;
use serde_json::Value;
use time::OffsetDateTime;

use crate::client::{Client, RequestOptions};
use crate::endpoints::Endpoint;
use crate::entities::Entity;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::utils::date_format::format_datetime;

/// The `entities` parameter: canonical names, comma separated, duplicates
/// dropped.
fn entity_list(entities: &[Entity]) -> Result<String> {
    if entities.is_empty() {
        return Err(Error::invalid_query(
            "change data capture needs at least one entity",
        ));
    }
    let mut names: Vec<&str> = Vec::with_capacity(entities.len());
    for entity in entities {
        if !names.contains(&entity.name()) {
            names.push(entity.name());
        }
    }
    Ok(names.join(","))
}

#[instrument(skip(client))]
pub async fn changes<T: Transport>(
    client: &Client<T>,
    entities: &[Entity],
    changed_since: OffsetDateTime,
) -> Result<Value> {
    let entities = entity_list(entities)?;
    let changed_since = format_datetime(changed_since)
        .map_err(|e| Error::invalid_query(format!("cannot format changedSince: {e}")))?;

    client
        .dispatch(
            Method::GET,
            &Endpoint::ChangeDataCapture,
            RequestOptions::default()
                .with_query("entities", entities)
                .with_query("changedSince", changed_since),
        )
        .await?
        .deserialize()
}
