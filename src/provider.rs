//! The EndPointMonitor provider: metadata, schemas and configured sessions.
//!
//! [`EndpointMonitorProvider`] describes every resource and data source type
//! and turns declared configuration into a [`Session`]. A session is the only
//! way to reach the API; there is no provider-wide client.
//!
//! # Example
//!
//! ```no_run
//! use endpointmonitor_provider::config::{ProcessEnv, ProviderConfig};
//! use endpointmonitor_provider::EndpointMonitorProvider;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), endpointmonitor_provider::Diagnostics> {
//! let provider = EndpointMonitorProvider::new();
//! let session = provider.configure(&ProviderConfig::default(), &ProcessEnv)?;
//!
//! let state = session
//!     .read_data_source("endpointmonitor_host_group", &json!({"search": "prod-east"}))
//!     .await?;
//! println!("host group id: {}", state["id"]);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::{ApiClient, MonitorApi};
use crate::config::{self, ClientOptions, EnvSource, EnvVars, ProviderConfig};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ErrorCategory, ProviderError};
use crate::identity::{resolve_many, resolve_one};
use crate::kind::{Cardinality, DataSourceKind, ResourceKind};
use crate::reconcile::{resource_type_name, Reconciled, ReconciliationEngine, TYPE_NAME};
use crate::schema::{Attribute, AttributeFlags, AttributeType, ProviderSchema, Schema};
use crate::types::{Attributes, ImportedResource, PlanResult, ProviderMetadata, ID_ATTRIBUTE};
use crate::validation::validate;

/// Describes the provider and configures sessions.
#[derive(Debug, Clone)]
pub struct EndpointMonitorProvider {
    version: String,
    env_vars: EnvVars,
    options: ClientOptions,
    resource_schemas: HashMap<ResourceKind, Schema>,
}

impl Default for EndpointMonitorProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointMonitorProvider {
    /// A provider reading `EPM_URL` and `EPM_API_KEY` as fallbacks.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            env_vars: EnvVars::default(),
            options: ClientOptions::default(),
            resource_schemas: HashMap::new(),
        }
    }

    /// Use different fallback environment variable names.
    pub fn with_env_vars(mut self, env_vars: EnvVars) -> Self {
        self.env_vars = env_vars;
        self
    }

    /// Override HTTP transport settings.
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Register the attribute schema of a resource kind.
    ///
    /// Registered kinds are validated locally before create, update and plan.
    /// The computed `id` attribute is added when the schema lacks it.
    pub fn with_resource_schema(mut self, kind: ResourceKind, schema: Schema) -> Self {
        let schema = if schema.attribute(ID_ATTRIBUTE).is_some() {
            schema
        } else {
            schema.with_attribute(ID_ATTRIBUTE, Attribute::computed_int64())
        };
        self.resource_schemas.insert(kind, schema);
        self
    }

    /// Type name, version and every registered type.
    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            type_name: TYPE_NAME.to_string(),
            version: self.version.clone(),
            resources: ResourceKind::ALL
                .into_iter()
                .map(resource_type_name)
                .collect(),
            data_sources: DataSourceKind::all()
                .map(data_source_type_name)
                .collect(),
        }
    }

    /// Schemas for the provider configuration, every resource and every data
    /// source.
    ///
    /// Resource kinds without a registered schema expose only `id`.
    pub fn schema(&self) -> ProviderSchema {
        let mut schema = self.registered_schemas().with_provider_config(provider_config_schema());

        for kind in ResourceKind::ALL {
            schema
                .resources
                .entry(resource_type_name(kind))
                .or_insert_with(|| {
                    Schema::v0().with_attribute(ID_ATTRIBUTE, Attribute::computed_int64())
                });
        }

        DataSourceKind::all().fold(schema, |schema, kind| {
            schema.with_data_source(data_source_type_name(kind), data_source_schema(kind))
        })
    }

    fn registered_schemas(&self) -> ProviderSchema {
        self.resource_schemas
            .iter()
            .fold(ProviderSchema::new(), |schema, (kind, resource)| {
                schema.with_resource(resource_type_name(*kind), resource.clone())
            })
    }

    /// Validate a JSON provider configuration without resolving it.
    pub fn validate_provider_config(&self, config: &Value) -> Diagnostics {
        validate(&provider_config_schema(), config)
    }

    /// Resolve connection parameters and build a session.
    ///
    /// Every configuration problem is reported in one batch. No session is
    /// returned unless both the URL and the key resolved.
    #[instrument(skip_all)]
    pub fn configure(
        &self,
        config: &ProviderConfig,
        env: &impl EnvSource,
    ) -> Result<Session<ApiClient>, Diagnostics> {
        info!("Configuring EndPointMonitor client");

        let connection = config::resolve(config, env, &self.env_vars).inspect_err(|diags| {
            warn!(diagnostics = diags.len(), "Configure completed with errors");
        })?;

        let client = ApiClient::new(&connection, &self.options).map_err(|e| {
            warn!(error = %e, "Configure failed");
            Diagnostics::from(
                Diagnostic::error("Unable to Create EndPointMonitor Client").with_detail(format!(
                    "An unexpected error occurred when creating the EndPointMonitor API client. \
                     Check the url attribute or the {} environment variable.\n\n\
                     EndPointMonitor Client Error: {}",
                    self.env_vars.url, e
                )),
            )
        })?;

        info!(url = %client.base_url(), "Configured EndPointMonitor client");
        Ok(self.session(client))
    }

    /// [`configure`](Self::configure) from a JSON object.
    pub fn configure_json(
        &self,
        config: &Value,
        env: &impl EnvSource,
    ) -> Result<Session<ApiClient>, Diagnostics> {
        let diagnostics = self.validate_provider_config(config);
        if diagnostics.has_error() {
            return Err(diagnostics);
        }
        self.configure(&ProviderConfig::from_json(config)?, env)
    }

    /// Build a session over any [`MonitorApi`] implementation.
    pub fn session<A: MonitorApi>(&self, api: A) -> Session<A> {
        Session {
            api,
            schema: Arc::new(self.schema()),
            checked: Arc::new(self.registered_schemas()),
        }
    }
}

fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_description("Connection settings for the EndPointMonitor API")
        .with_attribute(
            "url",
            Attribute::optional_string()
                .with_description("Base URL of the EndPointMonitor server. Falls back to EPM_URL."),
        )
        .with_attribute(
            "key",
            Attribute::optional_string()
                .sensitive()
                .with_description("API key. Falls back to EPM_API_KEY."),
        )
}

fn data_source_schema(kind: DataSourceKind) -> Schema {
    let label = kind.search.label();
    let search = Attribute::required_string()
        .with_description(format!("Free-text search for {} objects", label));

    match kind.cardinality {
        Cardinality::Single => Schema::v0()
            .with_attribute("search", search)
            .with_attribute(
                ID_ATTRIBUTE,
                Attribute::computed_int64()
                    .with_description(format!("Id of the single matching {}", label)),
            ),
        Cardinality::Multiple => Schema::v0().with_attribute("search", search).with_attribute(
            "ids",
            Attribute::new(
                AttributeType::list(AttributeType::Int32),
                AttributeFlags::computed(),
            )
            .with_description(format!("Ids of every matching {}, in search order", label)),
        ),
    }
}

fn data_source_type_name(kind: DataSourceKind) -> String {
    format!("{}_{}", TYPE_NAME, kind.name())
}

/// The type name without the `endpointmonitor_` prefix. Names lacking the
/// prefix are not provider types.
fn strip_prefix(type_name: &str) -> Result<&str, ProviderError> {
    type_name
        .strip_prefix(TYPE_NAME)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(|| ProviderError::UnknownKind(type_name.to_string()))
}

fn unknown_type(err: ProviderError) -> Diagnostics {
    err.to_diagnostic("Unsupported type").into()
}

fn object(value: &Value, what: &str) -> Result<Attributes, Diagnostics> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(Diagnostic::error(format!("Invalid {}", what))
            .with_detail(format!("Expected {} to be an object", what))
            .into()),
    }
}

fn state_id(state: &Value) -> Result<i64, Diagnostics> {
    state
        .get(ID_ATTRIBUTE)
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            Diagnostic::error("Missing resource id")
                .with_detail("The prior state carries no integer id; import or recreate the resource.")
                .with_attribute(ID_ATTRIBUTE)
                .into()
        })
}

/// A configured provider: an API handle plus the schemas it validates with.
///
/// Cheap to clone when `A` is. Safe to share across concurrent operations.
#[derive(Debug, Clone)]
pub struct Session<A> {
    api: A,
    schema: Arc<ProviderSchema>,
    checked: Arc<ProviderSchema>,
}

impl Session<ApiClient> {
    /// A session whose remote calls abort once `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            api: self.api.with_cancellation(token),
            schema: Arc::clone(&self.schema),
            checked: Arc::clone(&self.checked),
        }
    }
}

impl<A: MonitorApi> Session<A> {
    /// The underlying API handle.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Every schema the provider exposes.
    pub fn schema(&self) -> &ProviderSchema {
        &self.schema
    }

    /// An engine validating against registered resource schemas.
    pub fn engine(&self) -> ReconciliationEngine<'_, A> {
        ReconciliationEngine::new(&self.api).with_schemas(&self.checked)
    }

    fn resource_kind(type_name: &str) -> Result<ResourceKind, Diagnostics> {
        strip_prefix(type_name)
            .and_then(str::parse)
            .map_err(unknown_type)
    }

    fn data_source_kind(type_name: &str) -> Result<DataSourceKind, Diagnostics> {
        strip_prefix(type_name)
            .and_then(str::parse)
            .map_err(unknown_type)
    }

    /// Validate a resource configuration against its registered schema.
    pub fn validate_resource_config(&self, type_name: &str, config: &Value) -> Diagnostics {
        let kind = match Self::resource_kind(type_name) {
            Ok(kind) => kind,
            Err(diags) => return diags,
        };
        match self.checked.resources.get(&resource_type_name(kind)) {
            Some(schema) => validate(schema, config),
            None => Diagnostics::new(),
        }
    }

    /// Validate a data source configuration.
    pub fn validate_data_source_config(&self, type_name: &str, config: &Value) -> Diagnostics {
        let kind = match Self::data_source_kind(type_name) {
            Ok(kind) => kind,
            Err(diags) => return diags,
        };
        match self.schema.data_sources.get(&data_source_type_name(kind)) {
            Some(schema) => validate(schema, config),
            None => unknown_type(ProviderError::UnknownKind(type_name.to_string())),
        }
    }

    /// Resolve a data source's search text to its identifier(s).
    ///
    /// Returns `{search, id}` for singleton data sources and `{search, ids}`
    /// for list data sources.
    #[instrument(skip(self, config))]
    pub async fn read_data_source(&self, type_name: &str, config: &Value) -> Result<Value, Diagnostics> {
        debug!("ReadDataSource called");

        let kind = Self::data_source_kind(type_name)?;
        let diagnostics = self.validate_data_source_config(type_name, config);
        if diagnostics.has_error() {
            return Err(diagnostics);
        }

        let Some(search) = config.get("search").and_then(Value::as_str) else {
            let mut diagnostics = Diagnostics::new();
            diagnostics.add_attribute_error(
                "search",
                "Missing search text",
                "The search attribute must be a string.",
            );
            return Err(diagnostics);
        };

        let label = kind.search.label();
        let searched = |e: ProviderError| -> Diagnostics {
            let summary = match e.category() {
                ErrorCategory::Ambiguity => format!("None or more than one matching {} found", label),
                _ => format!("Error searching {}", label),
            };
            warn!(error = %e, "ReadDataSource failed");
            e.to_diagnostic(summary).with_attribute("search").into()
        };

        let state = match kind.cardinality {
            Cardinality::Single => {
                let id = resolve_one(&self.api, kind.search, search)
                    .await
                    .map_err(searched)?;
                json!({ "search": search, "id": id })
            },
            Cardinality::Multiple => {
                let ids = resolve_many(&self.api, kind.search, search)
                    .await
                    .map_err(searched)?;
                json!({ "search": search, "ids": ids })
            },
        };

        debug!("ReadDataSource completed successfully");
        Ok(state)
    }

    /// Plan a resource. `prior` is `None` for a resource that does not exist yet.
    pub fn plan(
        &self,
        type_name: &str,
        prior: Option<&Value>,
        desired: &Value,
    ) -> Result<PlanResult, Diagnostics> {
        let kind = Self::resource_kind(type_name)?;
        let prior = prior.map(|p| object(p, "prior state")).transpose()?;
        let desired = object(desired, "configuration")?;
        self.engine().plan(kind, prior.as_ref(), &desired)
    }

    /// Create a resource from its desired attributes.
    pub async fn create(&self, type_name: &str, desired: &Value) -> Result<Reconciled, Diagnostics> {
        let kind = Self::resource_kind(type_name)?;
        let desired = object(desired, "configuration")?;
        self.engine().create(kind, &desired).await
    }

    /// Refresh a resource from its last-known state.
    pub async fn read(&self, type_name: &str, state: &Value) -> Result<Reconciled, Diagnostics> {
        let kind = Self::resource_kind(type_name)?;
        self.engine().read(kind, state_id(state)?).await
    }

    /// Move a resource from `prior` state to `desired` attributes.
    pub async fn update(
        &self,
        type_name: &str,
        prior: &Value,
        desired: &Value,
    ) -> Result<Reconciled, Diagnostics> {
        let kind = Self::resource_kind(type_name)?;
        let id = state_id(prior)?;
        let prior = object(prior, "prior state")?;
        let desired = object(desired, "configuration")?;
        self.engine().update(kind, id, &prior, &desired).await
    }

    /// Delete a resource identified by its last-known state.
    pub async fn delete(&self, type_name: &str, state: &Value) -> Result<Reconciled, Diagnostics> {
        let kind = Self::resource_kind(type_name)?;
        self.engine().delete(kind, state_id(state)?).await
    }

    /// Import an existing remote object by its id.
    pub async fn import_resource(
        &self,
        type_name: &str,
        id: &str,
    ) -> Result<ImportedResource, Diagnostics> {
        let kind = Self::resource_kind(type_name)?;
        let id: i64 = id.trim().parse().map_err(|_| {
            Diagnostics::from(
                Diagnostic::error("Invalid import id")
                    .with_detail(format!("Expected an integer id, got '{}'", id)),
            )
        })?;
        self.engine().import(kind, id).await
    }
}
