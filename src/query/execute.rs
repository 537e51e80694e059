use reqwest::Method;
use serde_json::Value;

use crate::client::{Client, RequestOptions};
use crate::endpoints::Endpoint;
use crate::entities::Entity;
use crate::error::{Error, Result};
use crate::transport::Transport;

use super::{CompiledQuery, FilterSet, QueryResult, compile, control, normalize};

/// Normalizes `input` and runs it; see [`find_filtered`].
#[instrument(skip(client, input))]
pub async fn find<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    input: &Value,
) -> Result<QueryResult> {
    let filters = normalize(input)?;
    find_filtered(client, entity, filters).await
}

/// Compiles and dispatches `filters` against `entity`.
///
/// With `fetchAll` set (and not counting), pages are requested one after
/// another for as long as the latest page came back full, i.e. held exactly
/// `limit` records, and folded into the first page's result. A failing page
/// fails the whole call. [`Config::max_query_pages`](crate::Config::max_query_pages)
/// bounds the walk when set.
#[instrument(skip(client, filters))]
pub async fn find_filtered<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    mut filters: FilterSet,
) -> Result<QueryResult> {
    let compiled = compile(entity, &filters)?;
    let mut result = run_query(client, &compiled).await?;
    if !compiled.fetch_all() || compiled.is_count() {
        return Ok(result);
    }

    let limit = compiled.limit();
    let mut offset = compiled.offset();
    let mut page_len = result.records(entity).len();
    let mut pages: u32 = 1;

    while page_len == limit as usize {
        if let Some(max_pages) = client.config().max_query_pages()
            && pages >= max_pages.get()
        {
            warn!(
                %entity,
                pages,
                records = result.records(entity).len(),
                "stopping paginated query at the configured page cap"
            );
            break;
        }

        offset = offset
            .checked_add(limit)
            .ok_or_else(|| Error::invalid_query("startposition overflowed while paging"))?;
        filters.set_control(control::OFFSET, offset);
        let compiled = compile(entity, &filters)?;

        let page = run_query(client, &compiled).await?;
        page_len = page.records(entity).len();
        pages += 1;
        debug!(%entity, offset, page_len, "fetched page");
        result.merge_page(entity, page);
    }

    Ok(result)
}

/// Runs `filters` in count mode and returns `totalCount`, zero when absent.
#[instrument(skip(client, filters))]
pub async fn count<T: Transport>(
    client: &Client<T>,
    entity: Entity,
    filters: FilterSet,
) -> Result<u64> {
    let compiled = compile(entity, &filters.count())?;
    let result = run_query(client, &compiled).await?;
    Ok(result.total_count().unwrap_or_default())
}

/// Sends an already compiled query and decodes the envelope.
pub async fn run_query<T: Transport>(
    client: &Client<T>,
    compiled: &CompiledQuery,
) -> Result<QueryResult> {
    trace!(query = compiled.as_str(), "running query");
    let payload = client
        .dispatch(
            Method::GET,
            &Endpoint::Query,
            RequestOptions::default().with_query("query", compiled.as_str()),
        )
        .await?;
    payload.deserialize()
}
