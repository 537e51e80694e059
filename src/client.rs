use reqwest::{
    Method,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use tracing_error::SpanTrace;

use crate::batch::{self, BatchItem};
use crate::cdc;
use crate::config::Config;
use crate::endpoints::{Endpoint, is_binary_path};
use crate::entities::{
    Entity,
    crud::{self, DeleteTarget, UpdateMode},
};
use crate::error::{Error, Fault, Result};
use crate::query::{FilterSet, QueryResult, execute};
use crate::reports::{self, Report, ReportParameters};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

const JSON: &str = "application/json";
const PDF: &str = "application/pdf";

/// Optional extras for a single request. Headers set here replace the
/// defaults the client would otherwise send.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Decoded JSON; an empty body decodes to `null`.
    Json(Value),
    /// Raw bytes from a document (`/pdf`) endpoint.
    Binary(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Binary(_) => None,
        }
    }

    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Json(value) => Ok(serde_json::to_vec(&value)?),
            Self::Binary(bytes) => Ok(bytes),
        }
    }

    pub fn deserialize<D: DeserializeOwned>(self) -> Result<D> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            Self::Binary(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::DeserializationError(e, Some(String::from_utf8_lossy(&bytes).into_owned()))
            }),
        }
    }
}

/// The entry point for talking to one company (realm).
///
/// Every request is scoped to `v3/company/<realm id>/`, authenticated with the
/// configured bearer token and pinned to the configured minor version. The
/// transport is pluggable; [`HttpTransport`] is used unless another is given.
#[derive(Debug, Clone)]
pub struct Client<T = HttpTransport> {
    config: Config,
    transport: T,
}

impl Client<HttpTransport> {
    /// Builds a client over the default `reqwest` transport.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new()?)
    }

    /// Builds a client from the `QBO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }
}

impl<T: Transport> Client<T> {
    /// Validates `config` and pairs it with `transport`.
    pub fn with_transport(config: Config, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Swaps in a refreshed bearer token.
    pub fn set_access_token(&mut self, access_token: impl Into<String>) {
        self.config.set_access_token(access_token);
    }

    /// Sends one request to `path`, relative to the company root.
    ///
    /// Paths ending in `/pdf` are fetched as bytes; everything else is decoded
    /// as JSON. Non-success statuses, and success responses carrying a
    /// `Fault`, come back as [`Error::Api`].
    #[instrument(skip(self, method, options), fields(%method))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Payload> {
        let company_url = self.config.company_url()?;
        let url = company_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| Error::InvalidEndpoint)?;
        if !url.as_str().starts_with(company_url.as_str()) {
            return Err(Error::InvalidEndpoint);
        }
        let binary = is_binary_path(url.path());

        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", self.config.access_token().secret());
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|_| Error::config("access token is not a valid header value"))?,
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(if binary { PDF } else { JSON }),
        );
        if method != Method::GET && method != Method::HEAD {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON));
        }
        headers.extend(options.headers);

        let mut query = Vec::with_capacity(options.query.len() + 1);
        if !options.query.iter().any(|(key, _)| key == "minorversion") {
            query.push((
                "minorversion".to_string(),
                self.config.minor_version().to_string(),
            ));
        }
        query.extend(options.query);

        let body = options.body.as_ref().map(serde_json::to_vec).transpose()?;

        trace!(%url, ?query, has_body = body.is_some(), "dispatching request");
        let response = self
            .transport
            .send(TransportRequest {
                method,
                url: url.clone(),
                headers,
                query,
                body,
            })
            .await?;

        handle_response(url.as_str(), binary, response)
    }

    #[instrument(level = "debug", skip_all, fields(%method, %endpoint))]
    pub(crate) async fn dispatch(
        &self,
        method: Method,
        endpoint: &Endpoint,
        options: RequestOptions,
    ) -> Result<Payload> {
        self.request(method, &endpoint.path(), options).await
    }

    /// Runs a query described by JSON; see [`crate::query`].
    pub async fn find(&self, entity: Entity, filters: &Value) -> Result<QueryResult> {
        execute::find(self, entity, filters).await
    }

    pub async fn find_filtered(&self, entity: Entity, filters: FilterSet) -> Result<QueryResult> {
        execute::find_filtered(self, entity, filters).await
    }

    /// Number of `entity` records matching `filters`.
    pub async fn count(&self, entity: Entity, filters: FilterSet) -> Result<u64> {
        execute::count(self, entity, filters).await
    }

    pub async fn create(&self, entity: Entity, payload: &Value) -> Result<Value> {
        crud::create(self, entity, payload).await
    }

    pub async fn get(&self, entity: Entity, id: &str) -> Result<Value> {
        crud::get(self, entity, id).await
    }

    /// Sparse update unless the payload sets `sparse` itself.
    pub async fn update(&self, entity: Entity, payload: &Value) -> Result<Value> {
        crud::update_with(self, entity, payload, UpdateMode::Update).await
    }

    pub async fn update_with(
        &self,
        entity: Entity,
        payload: &Value,
        mode: UpdateMode,
    ) -> Result<Value> {
        crud::update_with(self, entity, payload, mode).await
    }

    pub async fn void(&self, entity: Entity, payload: &Value) -> Result<Value> {
        crud::update_with(self, entity, payload, UpdateMode::Void).await
    }

    pub async fn delete(&self, entity: Entity, target: impl Into<DeleteTarget>) -> Result<Value> {
        crud::delete(self, entity, target.into()).await
    }

    pub async fn pdf(&self, entity: Entity, id: &str) -> Result<Vec<u8>> {
        crud::pdf(self, entity, id).await
    }

    pub async fn send(&self, entity: Entity, id: &str, send_to: Option<&str>) -> Result<Value> {
        crud::send(self, entity, id, send_to).await
    }

    pub async fn company_info(&self) -> Result<Value> {
        crud::company_info(self).await
    }

    pub async fn preferences(&self) -> Result<Value> {
        crud::preferences(self).await
    }

    pub async fn report(&self, report: Report, parameters: &ReportParameters) -> Result<Value> {
        reports::run(self, report, parameters).await
    }

    pub async fn change_data_capture(
        &self,
        entities: &[Entity],
        changed_since: OffsetDateTime,
    ) -> Result<Value> {
        cdc::changes(self, entities, changed_since).await
    }

    pub async fn batch(&self, items: Vec<BatchItem>) -> Result<Value> {
        batch::execute(self, items).await
    }

    /// Operations scoped to a single entity type.
    #[must_use]
    pub fn entity(&self, entity: Entity) -> EntityApi<'_, T> {
        EntityApi {
            client: self,
            entity,
        }
    }
}

fn handle_response(url: &str, binary: bool, response: TransportResponse) -> Result<Payload> {
    let TransportResponse { status, body, .. } = response;
    debug!(%status, bytes = body.len(), "received response");

    if !status.is_success() {
        let fault = Fault::from_body(&body);
        match &fault {
            Some(fault) => error!(%status, %url, %fault, "request failed"),
            None => error!(%status, %url, "request failed"),
        }
        return Err(Error::Api {
            status_code: status,
            url: url.to_string(),
            fault,
            response_body: String::from_utf8_lossy(&body).into_owned(),
            span_trace: SpanTrace::capture(),
        });
    }

    if binary {
        return Ok(Payload::Binary(body));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::Json(Value::Null));
    }

    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        let text = String::from_utf8_lossy(&body).into_owned();
        error!(
            "Deserialization error: {}, near position: {} - response text around that position: {}",
            e,
            e.column(),
            text.chars()
                .skip(e.column().saturating_sub(30))
                .take(100)
                .collect::<String>()
        );
        Error::DeserializationError(e, Some(text))
    })?;

    if let Some(fault) = Fault::from_payload(&value) {
        error!(%status, %url, %fault, "response carried a fault");
        return Err(Error::Api {
            status_code: status,
            url: url.to_string(),
            fault: Some(fault),
            response_body: String::from_utf8_lossy(&body).into_owned(),
            span_trace: SpanTrace::capture(),
        });
    }

    Ok(Payload::Json(value))
}

/// API handle for one entity type, from [`Client::entity`].
#[derive(Debug)]
pub struct EntityApi<'a, T = HttpTransport> {
    client: &'a Client<T>,
    entity: Entity,
}

impl<T: Transport> EntityApi<'_, T> {
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub async fn find(&self, filters: &Value) -> Result<QueryResult> {
        self.client.find(self.entity, filters).await
    }

    pub async fn find_filtered(&self, filters: FilterSet) -> Result<QueryResult> {
        self.client.find_filtered(self.entity, filters).await
    }

    /// Every record, fetched page by page.
    pub async fn list_all(&self) -> Result<Vec<Value>> {
        let result = self
            .client
            .find_filtered(self.entity, FilterSet::new().fetch_all())
            .await?;
        Ok(result.into_records(self.entity))
    }

    pub async fn count(&self, filters: FilterSet) -> Result<u64> {
        self.client.count(self.entity, filters).await
    }

    pub async fn create(&self, payload: &Value) -> Result<Value> {
        self.client.create(self.entity, payload).await
    }

    pub async fn get(&self, id: &str) -> Result<Value> {
        self.client.get(self.entity, id).await
    }

    pub async fn update(&self, payload: &Value) -> Result<Value> {
        self.client.update(self.entity, payload).await
    }

    pub async fn void(&self, payload: &Value) -> Result<Value> {
        self.client.void(self.entity, payload).await
    }

    pub async fn delete(&self, target: impl Into<DeleteTarget>) -> Result<Value> {
        self.client.delete(self.entity, target).await
    }

    pub async fn pdf(&self, id: &str) -> Result<Vec<u8>> {
        self.client.pdf(self.entity, id).await
    }

    pub async fn send(&self, id: &str, send_to: Option<&str>) -> Result<Value> {
        self.client.send(self.entity, id, send_to).await
    }
}
