//! # qbo-rs
//!
//! A Rust client library for the QuickBooks Online accounting API.
//!
//! The heart of the crate is the query layer: filters given as JSON or built
//! with [`FilterSet`] are compiled into the API's SQL-like query language,
//! with text literals escaped, and exhaustive queries are paged through
//! transparently. Around it sit generic create/read/update/void/delete
//! operations for every [`Entity`], reports, change data capture, batch
//! requests and sales document delivery.
//!
//! ```ignore
//! use qbo_rs::{Client, Config, Entity};
//! use serde_json::json;
//!
//! let client = Client::new(Config::new(realm_id, access_token))?;
//! let invoices = client
//!     .find(Entity::Invoice, &json!([
//!         {"field": "Balance", "value": 0, "operator": ">"},
//!         {"field": "fetchAll", "value": true},
//!     ]))
//!     .await?;
//! for invoice in invoices.records(Entity::Invoice) {
//!     println!("{}", invoice["DocNumber"]);
//! }
//! ```
//!
//! ## Sentry Integration
//!
//! Errors raised inside the library capture a [`SpanTrace`], which gives the
//! async call context when they are reported. Enable the `sentry` feature to
//! convert errors into Sentry breadcrumbs and context maps:
//!
//! ```toml
//! [dependencies]
//! qbo-rs = { version = "0.1", features = ["sentry"] }
//! ```
//!
//! Span traces are only captured when the subscriber carries
//! `tracing_error::ErrorLayer`:
//!
//! ```ignore
//! use tracing_subscriber::prelude::*;
//! use tracing_error::ErrorLayer;
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(ErrorLayer::default())
//!     .init();
//!
//! if let Err(e) = client.company_info().await {
//!     if let Some(trace) = e.span_trace() {
//!         eprintln!("Span trace:\n{}", trace);
//!     }
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate tracing;

pub mod batch;
pub mod cdc;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod entities;
pub mod error;
pub mod query;
pub mod reports;
pub mod transport;
pub mod utils;

#[cfg(feature = "sentry")]
pub mod sentry_integration;

pub use batch::BatchItem;
pub use client::{Client, EntityApi, Payload, RequestOptions};
pub use config::{Config, Environment};
pub use endpoints::Endpoint;
pub use entities::{DeleteTarget, Entity, Operation, UpdateMode};
pub use error::{Error, Fault, FaultError, Result};
pub use query::{
    CompiledQuery, FilterClause, FilterSet, FilterValue, Operator, QueryResult, Scalar,
};
pub use reports::{AccountingMethod, Report, ReportParameters};
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

/// Sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("qbo-rs/", env!("CARGO_PKG_VERSION"));

// Re-export SpanTrace for users who want to access it
pub use tracing_error::SpanTrace;
