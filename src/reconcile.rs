//! Create, read, update and delete declared resources against EndPointMonitor.
//!
//! Each declared instance moves through
//! `Planned → Creating → Live → Updating → Live → Deleting → Gone`, with
//! `Reading` entered from `Live` to detect drift. Instances are reconciled
//! independently; ordering between dependent resources belongs to the caller.
//!
//! Outcomes that are not errors:
//!
//! - Reading an object that no longer exists yields [`InstanceState::Gone`]
//!   and a warning, so the caller recreates it on the next apply.
//! - Deleting an object that no longer exists succeeds with no diagnostics.
//! - Updating with no attribute changes makes no remote call.
//!
//! Updating an object that was deleted out of band is a drift error; it is
//! never turned into a create.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::MonitorApi;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::kind::ResourceKind;
use crate::schema::{ProviderSchema, Schema};
use crate::types::{
    AttributeChange, Attributes, Deletion, ImportedResource, PlanResult, RemoteResource,
    ID_ATTRIBUTE,
};
use crate::validation::validate;

/// The provider type name; every resource and data source is prefixed with it.
pub const TYPE_NAME: &str = "endpointmonitor";

/// Fully-qualified type name for a resource kind.
pub fn resource_type_name(kind: ResourceKind) -> String {
    format!("{}_{}", TYPE_NAME, kind.name())
}

/// Lifecycle state of one declared resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Declared but not yet created.
    Planned,
    /// Create in flight.
    Creating,
    /// Exists remotely with a durable id.
    Live,
    /// Drift detection in flight.
    Reading,
    /// Update in flight.
    Updating,
    /// Delete in flight.
    Deleting,
    /// Does not exist remotely.
    Gone,
}

impl InstanceState {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: InstanceState) -> bool {
        use InstanceState::*;
        matches!(
            (self, next),
            (Planned, Creating)
                | (Creating, Live)
                | (Creating, Planned)
                | (Live, Reading)
                | (Reading, Live)
                | (Reading, Gone)
                | (Live, Updating)
                | (Updating, Live)
                | (Live, Deleting)
                | (Deleting, Gone)
                | (Deleting, Live)
                | (Gone, Planned)
        )
    }
}

/// The operation a request drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create a new object.
    Create,
    /// Refresh an existing object.
    Read,
    /// Change an existing object.
    Update,
    /// Remove an existing object.
    Delete,
}

impl Operation {
    /// The state an instance must be in before the operation starts.
    pub fn entry_state(self) -> InstanceState {
        match self {
            Operation::Create => InstanceState::Planned,
            Operation::Read | Operation::Update | Operation::Delete => InstanceState::Live,
        }
    }

    /// The state an instance is in while the remote call runs.
    pub fn in_flight_state(self) -> InstanceState {
        match self {
            Operation::Create => InstanceState::Creating,
            Operation::Read => InstanceState::Reading,
            Operation::Update => InstanceState::Updating,
            Operation::Delete => InstanceState::Deleting,
        }
    }

    /// Whether finishing in `outcome` is a legal path through the state
    /// machine for this operation.
    pub fn allows_outcome(self, outcome: InstanceState) -> bool {
        let in_flight = self.in_flight_state();
        self.entry_state().can_transition_to(in_flight) && in_flight.can_transition_to(outcome)
    }
}

/// One unit of reconciliation work.
///
/// The constructors guarantee that an existing id is present exactly when the
/// operation is read, update or delete.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRequest {
    kind: ResourceKind,
    operation: Operation,
    existing_id: Option<i64>,
    prior: Attributes,
    desired: Attributes,
}

impl ReconciliationRequest {
    /// Create `kind` with `desired` attributes.
    pub fn create(kind: ResourceKind, desired: Attributes) -> Self {
        Self {
            kind,
            operation: Operation::Create,
            existing_id: None,
            prior: Attributes::new(),
            desired,
        }
    }

    /// Refresh object `id`.
    pub fn read(kind: ResourceKind, id: i64) -> Self {
        Self {
            kind,
            operation: Operation::Read,
            existing_id: Some(id),
            prior: Attributes::new(),
            desired: Attributes::new(),
        }
    }

    /// Move object `id` from last-known `prior` to `desired`.
    pub fn update(kind: ResourceKind, id: i64, prior: Attributes, desired: Attributes) -> Self {
        Self {
            kind,
            operation: Operation::Update,
            existing_id: Some(id),
            prior,
            desired,
        }
    }

    /// Remove object `id`.
    pub fn delete(kind: ResourceKind, id: i64) -> Self {
        Self {
            kind,
            operation: Operation::Delete,
            existing_id: Some(id),
            prior: Attributes::new(),
            desired: Attributes::new(),
        }
    }

    /// The resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The existing remote id, absent only for create.
    pub fn existing_id(&self) -> Option<i64> {
        self.existing_id
    }
}

/// A successful reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Where the instance ended up.
    pub state: InstanceState,
    /// The remote object, when it exists.
    pub resource: Option<RemoteResource>,
    /// Warnings raised along the way.
    pub diagnostics: Diagnostics,
}

impl Reconciled {
    fn live(resource: RemoteResource) -> Self {
        Self {
            state: InstanceState::Live,
            resource: Some(resource),
            diagnostics: Diagnostics::new(),
        }
    }

    fn gone(diagnostics: Diagnostics) -> Self {
        Self {
            state: InstanceState::Gone,
            resource: None,
            diagnostics,
        }
    }
}

/// Drives CRUD calls for declared resources through a [`MonitorApi`].
///
/// Holds no state between calls beyond borrowed, read-only references, so
/// one engine may serve many instances concurrently.
pub struct ReconciliationEngine<'a, A: MonitorApi + ?Sized> {
    api: &'a A,
    schemas: Option<&'a ProviderSchema>,
}

impl<'a, A: MonitorApi + ?Sized> ReconciliationEngine<'a, A> {
    /// Create an engine without local validation.
    pub fn new(api: &'a A) -> Self {
        Self { api, schemas: None }
    }

    /// Validate desired attributes against registered resource schemas.
    pub fn with_schemas(mut self, schemas: &'a ProviderSchema) -> Self {
        self.schemas = Some(schemas);
        self
    }

    fn schema(&self, kind: ResourceKind) -> Option<&'a Schema> {
        self.schemas
            .and_then(|s| s.resources.get(&resource_type_name(kind)))
    }

    fn validate(&self, kind: ResourceKind, desired: &Attributes) -> Diagnostics {
        match self.schema(kind) {
            Some(schema) => {
                let mut candidate = desired.clone();
                candidate.remove(ID_ATTRIBUTE);
                validate(schema, &Value::Object(candidate))
            },
            None => Diagnostics::new(),
        }
    }

    /// Run whichever operation `request` carries.
    pub async fn reconcile(&self, request: ReconciliationRequest) -> Result<Reconciled, Diagnostics> {
        let ReconciliationRequest {
            kind,
            operation,
            existing_id,
            prior,
            desired,
        } = request;

        let outcome = match (operation, existing_id) {
            (Operation::Create, None) => self.create(kind, &desired).await,
            (Operation::Read, Some(id)) => self.read(kind, id).await,
            (Operation::Update, Some(id)) => self.update(kind, id, &prior, &desired).await,
            (Operation::Delete, Some(id)) => self.delete(kind, id).await,
            (operation, id) => Err(Diagnostic::error("Invalid reconciliation request")
                .with_detail(format!(
                    "{:?} on {} cannot be combined with existing id {:?}.",
                    operation, kind, id
                ))
                .into()),
        }?;

        debug_assert!(
            operation.allows_outcome(outcome.state),
            "{:?} cannot end in {:?}",
            operation,
            outcome.state
        );
        Ok(outcome)
    }

    /// Create an object. On failure nothing is recorded and the instance
    /// stays planned.
    #[instrument(skip(self, desired), fields(kind = %kind))]
    pub async fn create(
        &self,
        kind: ResourceKind,
        desired: &Attributes,
    ) -> Result<Reconciled, Diagnostics> {
        let diagnostics = self.validate(kind, desired);
        if diagnostics.has_error() {
            return Err(diagnostics);
        }

        let mut payload = desired.clone();
        payload.remove(ID_ATTRIBUTE);

        let resource = self
            .api
            .create(kind, &payload)
            .await
            .map_err(|e| failure(&e, "creating", kind))?;

        info!(id = resource.id, "Created {}", kind);
        let mut reconciled = Reconciled::live(resource);
        reconciled.diagnostics = diagnostics;
        Ok(reconciled)
    }

    /// Refresh an object, detecting out-of-band deletion.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn read(&self, kind: ResourceKind, id: i64) -> Result<Reconciled, Diagnostics> {
        match self.api.get(kind, id).await {
            Ok(Some(resource)) => Ok(Reconciled::live(resource)),
            Ok(None) => {
                warn!(id, "{} no longer exists remotely", kind);
                let mut diagnostics = Diagnostics::new();
                diagnostics.add_warning(
                    format!("{} {} not found", kind, id),
                    "The object was removed outside of this provider and will be recreated on the next apply.",
                );
                Ok(Reconciled::gone(diagnostics))
            },
            Err(e) => Err(failure(&e, "reading", kind)),
        }
    }

    /// Send the changed attributes of an object.
    ///
    /// The payload is the last-known state with every changed attribute
    /// applied. An empty diff makes no remote call.
    #[instrument(skip(self, prior, desired), fields(kind = %kind))]
    pub async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        prior: &Attributes,
        desired: &Attributes,
    ) -> Result<Reconciled, Diagnostics> {
        let diagnostics = self.validate(kind, desired);
        if diagnostics.has_error() {
            return Err(diagnostics);
        }

        let changes = diff(prior, desired);
        if changes.is_empty() {
            debug!(id, "No changes, skipping update");
            return Ok(Reconciled::live(RemoteResource::new(kind, id, prior.clone())));
        }

        let mut payload = prior.clone();
        payload.remove(ID_ATTRIBUTE);
        for change in &changes {
            payload.insert(change.path.clone(), change.after.clone().unwrap_or(Value::Null));
        }

        match self.api.update(kind, id, &payload).await {
            Ok(resource) => {
                info!(id, changed = changes.len(), "Updated {}", kind);
                Ok(Reconciled::live(resource))
            },
            Err(ProviderError::NotFound { .. }) => {
                let drift = ProviderError::Drift {
                    kind: kind.to_string(),
                    id,
                };
                warn!(id, "{} disappeared during update", kind);
                Err(drift.to_diagnostic(format!("Error updating {}", label(kind))).into())
            },
            Err(e) => Err(failure(&e, "updating", kind)),
        }
    }

    /// Remove an object. An object that is already gone counts as removed.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn delete(&self, kind: ResourceKind, id: i64) -> Result<Reconciled, Diagnostics> {
        match self.api.delete(kind, id).await {
            Ok(Deletion::Deleted) => {
                info!(id, "Deleted {}", kind);
                Ok(Reconciled::gone(Diagnostics::new()))
            },
            Ok(Deletion::AlreadyAbsent) => {
                debug!(id, "{} already absent", kind);
                Ok(Reconciled::gone(Diagnostics::new()))
            },
            Err(e) => Err(failure(&e, "deleting", kind)),
        }
    }

    /// Compute the changes that applying `desired` over `prior` would make.
    ///
    /// With no prior state every non-null desired attribute is an addition.
    /// A changed attribute marked `force_new` in the schema requires
    /// replacement.
    pub fn plan(
        &self,
        kind: ResourceKind,
        prior: Option<&Attributes>,
        desired: &Attributes,
    ) -> Result<PlanResult, Diagnostics> {
        let diagnostics = self.validate(kind, desired);
        if diagnostics.has_error() {
            return Err(diagnostics);
        }

        let empty = Attributes::new();
        let changes = diff(prior.unwrap_or(&empty), desired);

        let mut planned = prior.cloned().unwrap_or_default();
        for change in &changes {
            planned.insert(change.path.clone(), change.after.clone().unwrap_or(Value::Null));
        }

        if changes.is_empty() {
            return Ok(PlanResult::no_change(Value::Object(planned)));
        }

        let requires_replace = prior.is_some()
            && self.schema(kind).is_some_and(|schema| {
                changes.iter().any(|c| {
                    schema
                        .attribute(&c.path)
                        .is_some_and(|attr| attr.force_new)
                })
            });

        Ok(PlanResult::with_changes(
            Value::Object(planned),
            changes,
            requires_replace,
        ))
    }

    /// Bring an existing object under management by id.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn import(&self, kind: ResourceKind, id: i64) -> Result<ImportedResource, Diagnostics> {
        match self.api.get(kind, id).await {
            Ok(Some(resource)) => Ok(ImportedResource::new(
                resource_type_name(kind),
                Value::Object(resource.state()),
            )),
            Ok(None) => {
                let err = ProviderError::NotFound {
                    kind: kind.to_string(),
                    id,
                };
                Err(err.to_diagnostic(format!("Cannot import {}", label(kind))).into())
            },
            Err(e) => Err(failure(&e, "importing", kind)),
        }
    }
}

/// Attribute changes from `prior` to `desired`, ignoring `id`.
///
/// Attributes absent from `desired` are not managed and never produce a
/// change; an explicit `null` over a prior value is a removal.
pub fn diff(prior: &Attributes, desired: &Attributes) -> Vec<AttributeChange> {
    let mut changes: Vec<AttributeChange> = desired
        .iter()
        .filter(|(name, _)| name.as_str() != ID_ATTRIBUTE)
        .filter_map(|(name, after)| {
            let before = prior.get(name).filter(|v| !v.is_null());
            match (before, after) {
                (None, Value::Null) => None,
                (None, after) => Some(AttributeChange::added(name.as_str(), after.clone())),
                (Some(before), Value::Null) => {
                    Some(AttributeChange::removed(name.as_str(), before.clone()))
                },
                (Some(before), after) if before != after => Some(AttributeChange::modified(
                    name.as_str(),
                    before.clone(),
                    after.clone(),
                )),
                _ => None,
            }
        })
        .collect();
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

fn label(kind: ResourceKind) -> String {
    kind.name().replace('_', " ")
}

fn failure(err: &ProviderError, verb: &str, kind: ResourceKind) -> Diagnostics {
    err.to_diagnostic(format!("Error {} {}", verb, label(kind)))
        .into()
}
