//! EndPointMonitor Provider
//!
//! The core of a declarative provider for the EndPointMonitor monitoring
//! service: checks, hosts, journeys, dashboards and maintenance windows are
//! declared as data and reconciled against the service's REST API.
//!
//! # Overview
//!
//! - **Configuration**: resolve the URL and API key from declared values and
//!   `EPM_URL` / `EPM_API_KEY`, reporting every problem in one batch
//! - **API client**: a [`MonitorApi`] trait and its HTTP implementation
//!   [`ApiClient`]
//! - **Identity resolution**: free-text search to exactly one id, or to an
//!   ordered list of ids
//! - **Reconciliation**: create, read, update, delete, plan and import with
//!   drift, no-op and idempotent-delete handling
//! - **Diagnostics**: structured, attribute-scoped errors and warnings
//!
//! # Quick Start
//!
//! ```no_run
//! use endpointmonitor_provider::config::{ProcessEnv, ProviderConfig};
//! use endpointmonitor_provider::{init_logging, EndpointMonitorProvider};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_logging();
//!
//!     let provider = EndpointMonitorProvider::new();
//!     let session = match provider.configure(&ProviderConfig::default(), &ProcessEnv) {
//!         Ok(session) => session,
//!         Err(diagnostics) => {
//!             eprintln!("{diagnostics}");
//!             return;
//!         },
//!     };
//!
//!     let created = session
//!         .create("endpointmonitor_host_group", &json!({"name": "prod-east"}))
//!         .await;
//!     println!("{created:?}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod identity;
pub mod kind;
pub mod logging;
pub mod provider;
pub mod reconcile;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{ApiClient, MonitorApi};
pub use config::{resolve, ConnectionConfig, ProviderConfig};
pub use diagnostics::{Diagnostic, DiagnosticSeverity, Diagnostics};
pub use error::{ErrorCategory, ProviderError};
pub use identity::{resolve_many, resolve_one};
pub use kind::{DataSourceKind, ResourceKind, SearchKind};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{EndpointMonitorProvider, Session};
pub use reconcile::{InstanceState, Reconciled, ReconciliationEngine, ReconciliationRequest};
pub use schema::ProviderSchema;
pub use types::{
    AttributeChange, Attributes, ImportedResource, PlanResult, ProviderMetadata, RemoteResource,
    SearchHit,
};
pub use validation::{is_valid, validate};

// Re-export async_trait for implementing MonitorApi
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
