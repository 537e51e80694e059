//! Sentry integration for qbo-rs errors.
//!
//! Only available with the `sentry` feature enabled:
//!
//! ```toml
//! [dependencies]
//! qbo-rs = { version = "0.1", features = ["sentry"] }
//! ```
//!
//! Set up tracing with `ErrorLayer` so errors raised inside instrumented
//! operations carry a span trace:
//!
//! ```ignore
//! use tracing_subscriber::prelude::*;
//! use tracing_error::ErrorLayer;
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(ErrorLayer::default())
//!     .with(sentry::integrations::tracing::layer())
//!     .init();
//! ```

use std::collections::BTreeMap;

use sentry_core::{Breadcrumb, protocol::Value};

use crate::error::Error;

const BODY_PREVIEW_CHARS: usize = 500;

/// Captures the context of a failed call as a breadcrumb, so the API call
/// history leading up to an event is visible in Sentry.
impl<'a> From<&'a Error> for Breadcrumb {
    fn from(error: &'a Error) -> Self {
        let mut data = BTreeMap::new();
        let (category, message) = match error {
            Error::Request(source) => ("http.request", format!("HTTP request error: {source}")),

            Error::DeserializationError(source, _) => (
                "http.response",
                format!("Failed to decode response: {source}"),
            ),

            Error::Api {
                status_code,
                url,
                fault,
                ..
            } => {
                data.insert("url".to_string(), Value::from(url.clone()));
                data.insert("status_code".to_string(), Value::from(status_code.as_u16()));
                let kind = fault
                    .as_ref()
                    .and_then(|fault| fault.kind.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                if let Some(code) = fault
                    .as_ref()
                    .and_then(|fault| fault.errors.first())
                    .and_then(|error| error.code.clone())
                {
                    data.insert("error_code".to_string(), Value::from(code));
                }
                data.insert("fault_type".to_string(), Value::from(kind.clone()));
                ("qbo.api", format!("QuickBooks API error: {kind}"))
            }

            Error::InvalidQuery { message, .. } => {
                ("qbo.query", format!("Invalid query: {message}"))
            }

            Error::MissingField { entity, field, .. } => {
                data.insert("entity".to_string(), Value::from(entity.name()));
                data.insert("field".to_string(), Value::from(*field));
                ("qbo.validation", format!("{entity} payload is missing {field}"))
            }

            Error::InvalidPayload { entity, message, .. } => {
                data.insert("entity".to_string(), Value::from(entity.name()));
                ("qbo.validation", format!("Invalid {entity} payload: {message}"))
            }

            Error::UnsupportedOperation {
                entity, operation, ..
            } => {
                data.insert("entity".to_string(), Value::from(entity.name()));
                data.insert("operation".to_string(), Value::from(operation.to_string()));
                (
                    "qbo.validation",
                    format!("{entity} does not support {operation}"),
                )
            }

            Error::InvalidBatch { message, .. } => {
                ("qbo.validation", format!("Invalid batch: {message}"))
            }

            Error::UnknownEntity { name } => {
                ("qbo.validation", format!("Unknown entity type: {name}"))
            }

            Error::Config { message } => ("qbo.config", format!("Invalid configuration: {message}")),

            Error::InvalidEndpoint => ("qbo.config", "Invalid endpoint URL".to_string()),
        };

        Breadcrumb {
            ty: "error".to_string(),
            category: Some(category.to_string()),
            message: Some(message),
            data,
            level: sentry_core::Level::Error,
            ..Default::default()
        }
    }
}

/// Extracts the error's context for use as Sentry extras.
///
/// # Example
///
/// ```ignore
/// use sentry::configure_scope;
/// use qbo_rs::sentry_integration::error_to_sentry_context;
///
/// if let Err(e) = client.find(Entity::Customer, &filters).await {
///     configure_scope(|scope| {
///         for (key, value) in error_to_sentry_context(&e) {
///             scope.set_extra(&key, value);
///         }
///     });
/// }
/// ```
#[must_use]
pub fn error_to_sentry_context(error: &Error) -> BTreeMap<String, Value> {
    let mut context = BTreeMap::new();

    if let Some(span_trace) = error.span_trace() {
        context.insert(
            "qbo.span_trace".to_string(),
            Value::from(format!("{span_trace}")),
        );
    }

    if let Some(url) = error.url() {
        context.insert("qbo.url".to_string(), Value::from(url.to_string()));
    }

    if let Some(status) = error.status_code() {
        context.insert("qbo.status_code".to_string(), Value::from(status.as_u16()));
    }

    if let Some(body) = error.response_body() {
        let truncated = if body.chars().count() > BODY_PREVIEW_CHARS {
            format!("{}...", body.chars().take(BODY_PREVIEW_CHARS).collect::<String>())
        } else {
            body.to_string()
        };
        context.insert("qbo.response_body".to_string(), Value::from(truncated));
    }

    if let Some(fault) = error.fault() {
        context.insert("qbo.fault".to_string(), Value::from(fault.to_string()));
        if let Some(kind) = &fault.kind {
            context.insert("qbo.fault_type".to_string(), Value::from(kind.clone()));
        }
    }

    context
}
