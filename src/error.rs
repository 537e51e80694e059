use std::fmt;

use miette::Diagnostic;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing_error::SpanTrace;

use crate::entities::{Entity, Operation};

/// One entry of the `Fault.Error` array returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultError {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Detail", default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub element: Option<String>,
}

/// The error document the API sends back on failures, e.g.
/// `{"Fault": {"Error": [...], "type": "ValidationFault"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    #[serde(rename = "Error", default)]
    pub errors: Vec<FaultError>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
struct FaultEnvelope {
    #[serde(rename = "Fault")]
    fault: Fault,
}

impl Fault {
    pub(crate) fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<FaultEnvelope>(body)
            .ok()
            .map(|envelope| envelope.fault)
    }

    /// Extracts a top-level fault from a decoded payload, ignoring empty ones.
    pub(crate) fn from_payload(payload: &Value) -> Option<Self> {
        let fault: Self = serde_json::from_value(payload.get("Fault")?.clone()).ok()?;
        (!fault.errors.is_empty()).then_some(fault)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_deref().unwrap_or("Fault"))?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}", error.message)?;
            if let Some(code) = &error.code {
                write!(f, " [{code}]")?;
            }
            if let Some(detail) = error.detail.as_deref().filter(|d| !d.is_empty()) {
                write!(f, " ({detail})")?;
            }
        }
        Ok(())
    }
}

/// Errors that can occur when interacting with the QuickBooks Online API.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(qbo_rs::config),
        help("Check the realm id, access token, environment and minor version settings")
    )]
    Config { message: String },

    #[error("invalid query: {message}")]
    #[diagnostic(
        code(qbo_rs::invalid_query),
        help("Pass a mapping of field to value, or a list of records with field, value and an optional operator")
    )]
    InvalidQuery {
        message: String,
        span_trace: SpanTrace,
    },

    #[error("{entity} payload must contain a non-empty {field} field")]
    #[diagnostic(
        code(qbo_rs::missing_field),
        help("Read the {entity} first so the payload carries its current Id and SyncToken")
    )]
    MissingField {
        entity: Entity,
        field: &'static str,
        span_trace: SpanTrace,
    },

    #[error("invalid {entity} payload: {message}")]
    #[diagnostic(code(qbo_rs::invalid_payload))]
    InvalidPayload {
        entity: Entity,
        message: String,
        span_trace: SpanTrace,
    },

    #[error("{entity} does not support the {operation} operation")]
    #[diagnostic(code(qbo_rs::unsupported_operation))]
    UnsupportedOperation {
        entity: Entity,
        operation: Operation,
        span_trace: SpanTrace,
    },

    #[error("invalid batch request: {message}")]
    #[diagnostic(
        code(qbo_rs::invalid_batch),
        help("A batch request must contain between 1 and 30 items")
    )]
    InvalidBatch {
        message: String,
        span_trace: SpanTrace,
    },

    #[error("unknown entity type: {name}")]
    #[diagnostic(code(qbo_rs::unknown_entity))]
    UnknownEntity { name: String },

    #[error("error making request: {0:?}")]
    #[diagnostic(
        code(qbo_rs::request_error),
        help("Check your network connection and QuickBooks Online API availability")
    )]
    Request(#[source] reqwest::Error),

    #[error("error decoding response: {0:?}")]
    #[diagnostic(
        code(qbo_rs::deserialization_error),
        help("The API returned data in an unexpected format")
    )]
    DeserializationError(#[source] serde_json::Error, Option<String>),

    #[error("endpoint could not be parsed as a URL")]
    #[diagnostic(
        code(qbo_rs::invalid_endpoint),
        help("Check that the base URL and realm id form a valid URL")
    )]
    InvalidEndpoint,

    /// A non-success response, or a success response carrying a `Fault`.
    /// The body is passed through untouched for the caller to interpret.
    #[error("API error ({status_code}) from {url}")]
    #[diagnostic(code(qbo_rs::api_error))]
    Api {
        status_code: StatusCode,
        url: String,
        fault: Option<Fault>,
        response_body: String,
        span_trace: SpanTrace,
    },
}

impl Error {
    pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
            span_trace: SpanTrace::capture(),
        }
    }

    pub(crate) fn missing_field(entity: Entity, field: &'static str) -> Self {
        Self::MissingField {
            entity,
            field,
            span_trace: SpanTrace::capture(),
        }
    }

    pub(crate) fn invalid_payload(entity: Entity, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            entity,
            message: message.into(),
            span_trace: SpanTrace::capture(),
        }
    }

    pub(crate) fn unsupported(entity: Entity, operation: Operation) -> Self {
        Self::UnsupportedOperation {
            entity,
            operation,
            span_trace: SpanTrace::capture(),
        }
    }

    pub(crate) fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch {
            message: message.into(),
            span_trace: SpanTrace::capture(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The span trace captured where the error was raised, if any.
    #[must_use]
    pub fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            Self::InvalidQuery { span_trace, .. }
            | Self::MissingField { span_trace, .. }
            | Self::InvalidPayload { span_trace, .. }
            | Self::UnsupportedOperation { span_trace, .. }
            | Self::InvalidBatch { span_trace, .. }
            | Self::Api { span_trace, .. } => Some(span_trace),
            _ => None,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Api { url, .. } => Some(url),
            Self::Request(e) => e.url().map(url::Url::as_str),
            _ => None,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            Self::Request(e) => e.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Api { response_body, .. } => Some(response_body),
            Self::DeserializationError(_, body) => body.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Api { fault, .. } => fault.as_ref(),
            _ => None,
        }
    }

    /// True for errors raised before any request was sent because the input
    /// itself was unusable.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery { .. }
                | Self::MissingField { .. }
                | Self::InvalidPayload { .. }
                | Self::UnsupportedOperation { .. }
                | Self::InvalidBatch { .. }
                | Self::UnknownEntity { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::DeserializationError(e, None)
    }
}

/// Type alias for results from this crate.
///
/// This is already a Miette diagnostic result due to the implementation of
/// the Diagnostic trait for the Error type.
pub type Result<O> = std::result::Result<O, Error>;
