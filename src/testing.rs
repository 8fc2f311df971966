//! Testing utilities for code built on [`MonitorApi`].
//!
//! [`InMemoryMonitor`] stands in for a live EndPointMonitor service so the
//! engines can be exercised without HTTP. The assertion helpers give readable
//! panics for diagnostics and plans.
//!
//! # Example
//!
//! ```
//! use endpointmonitor_provider::kind::ResourceKind;
//! use endpointmonitor_provider::reconcile::ReconciliationEngine;
//! use endpointmonitor_provider::testing::InMemoryMonitor;
//!
//! # tokio_test::block_on(async {
//! let api = InMemoryMonitor::new();
//! let id = api.insert(ResourceKind::HostGroup, serde_json::json!({"name": "prod"}));
//! api.remove_out_of_band(ResourceKind::HostGroup, id);
//!
//! let engine = ReconciliationEngine::new(&api);
//! let outcome = engine.read(ResourceKind::HostGroup, id).await.unwrap();
//! assert!(outcome.resource.is_none());
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::MonitorApi;
use crate::diagnostics::Diagnostics;
use crate::error::ProviderError;
use crate::kind::{ResourceKind, SearchKind};
use crate::types::{Attributes, Deletion, PlanResult, RemoteResource, SearchHit};

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    objects: Vec<RemoteResource>,
    failures: VecDeque<ProviderError>,
    calls: Vec<String>,
}

impl Store {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn position(&self, kind: ResourceKind, id: i64) -> Option<usize> {
        self.objects
            .iter()
            .position(|o| o.kind == kind && o.id == id)
    }

    /// Record a remote call and pop any queued failure for it.
    fn begin(&mut self, call: String) -> Result<(), ProviderError> {
        self.calls.push(call);
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// An in-process EndPointMonitor.
///
/// Ids are assigned sequentially from 1 across all kinds. Search is a
/// case-insensitive substring match on `name`, returned in insertion order.
/// Every resource kind that belongs to a search kind is visible to that
/// search, so all seven check kinds answer a check search.
#[derive(Debug, Default)]
pub struct InMemoryMonitor {
    store: Mutex<Store>,
}

impl InMemoryMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without recording a call. Returns its id.
    ///
    /// # Panics
    ///
    /// Panics if `attributes` is not a JSON object.
    pub fn insert(&self, kind: ResourceKind, attributes: Value) -> i64 {
        let Value::Object(attributes) = attributes else {
            panic!("seeded {kind} must be a JSON object");
        };
        let mut store = self.store();
        let id = store.allocate_id();
        store.objects.push(RemoteResource::new(kind, id, attributes));
        id
    }

    /// Delete an object behind the provider's back. Returns whether it existed.
    pub fn remove_out_of_band(&self, kind: ResourceKind, id: i64) -> bool {
        let mut store = self.store();
        match store.position(kind, id) {
            Some(pos) => {
                store.objects.remove(pos);
                true
            },
            None => false,
        }
    }

    /// Current stored attributes of an object, including `id`.
    pub fn get_state(&self, kind: ResourceKind, id: i64) -> Option<Attributes> {
        let store = self.store();
        store.position(kind, id).map(|pos| store.objects[pos].state())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.store().objects.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next remote call fail with `err`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, err: ProviderError) {
        self.store().failures.push_back(err);
    }

    /// Every remote call made so far, e.g. `"search check db"` or
    /// `"update host_group 1"`.
    pub fn calls(&self) -> Vec<String> {
        self.store().calls.clone()
    }
}

#[async_trait]
impl MonitorApi for InMemoryMonitor {
    async fn search(&self, kind: SearchKind, text: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let mut store = self.store();
        store.begin(format!("search {} {}", kind, text))?;

        let needle = text.to_lowercase();
        Ok(store
            .objects
            .iter()
            .filter(|o| o.kind.search_kind() == kind)
            .filter_map(|o| {
                let name = o.attributes.get("name").and_then(Value::as_str)?;
                name.to_lowercase()
                    .contains(&needle)
                    .then(|| SearchHit::new(o.id, name))
            })
            .collect())
    }

    async fn create(
        &self,
        kind: ResourceKind,
        attributes: &Attributes,
    ) -> Result<RemoteResource, ProviderError> {
        let mut store = self.store();
        store.begin(format!("create {}", kind))?;

        let id = store.allocate_id();
        let resource = RemoteResource::new(kind, id, attributes.clone());
        store.objects.push(resource.clone());
        Ok(resource)
    }

    async fn get(
        &self,
        kind: ResourceKind,
        id: i64,
    ) -> Result<Option<RemoteResource>, ProviderError> {
        let mut store = self.store();
        store.begin(format!("get {} {}", kind, id))?;
        Ok(store.position(kind, id).map(|pos| store.objects[pos].clone()))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        attributes: &Attributes,
    ) -> Result<RemoteResource, ProviderError> {
        let mut store = self.store();
        store.begin(format!("update {} {}", kind, id))?;

        let pos = store.position(kind, id).ok_or_else(|| ProviderError::NotFound {
            kind: kind.to_string(),
            id,
        })?;
        let resource = RemoteResource::new(kind, id, attributes.clone());
        store.objects[pos] = resource.clone();
        Ok(resource)
    }

    async fn delete(&self, kind: ResourceKind, id: i64) -> Result<Deletion, ProviderError> {
        let mut store = self.store();
        store.begin(format!("delete {} {}", kind, id))?;

        match store.position(kind, id) {
            Some(pos) => {
                store.objects.remove(pos);
                Ok(Deletion::Deleted)
            },
            None => Ok(Deletion::AlreadyAbsent),
        }
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &Diagnostics) {
    let errors: Vec<_> = diagnostics.errors().collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &Diagnostics) {
    assert!(
        diagnostics.has_error(),
        "Expected at least one error, but got none"
    );
}

/// Assert that some error's summary or detail contains `text`.
///
/// # Panics
///
/// Panics if no error diagnostic mentions the text.
pub fn assert_error_contains(diagnostics: &Diagnostics, text: &str) {
    let found = diagnostics.errors().any(|d| {
        d.summary.contains(text) || d.detail.as_deref().is_some_and(|detail| detail.contains(text))
    });
    assert!(
        found,
        "Expected an error containing '{}', got: {}",
        text, diagnostics
    );
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan result indicates changes are needed.
///
/// # Panics
///
/// Panics if the plan has no changes.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::types::AttributeChange;
    use serde_json::json;

    #[tokio::test]
    async fn test_ids_are_sequential_across_kinds() {
        let api = InMemoryMonitor::new();
        assert_eq!(api.insert(ResourceKind::UrlCheck, json!({"name": "a"})), 1);
        assert_eq!(api.insert(ResourceKind::HostGroup, json!({"name": "b"})), 2);

        let created = api
            .create(ResourceKind::ProxyHost, &Attributes::new())
            .await
            .unwrap();
        assert_eq!(created.id, 3);
        assert_eq!(api.len(), 3);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_kind_scoped() {
        let api = InMemoryMonitor::new();
        api.insert(ResourceKind::DnsCheck, json!({"name": "Prod DNS"}));
        api.insert(ResourceKind::CheckGroup, json!({"name": "prod group"}));

        let hits = api.search(SearchKind::Check, "prod").await.unwrap();
        assert_eq!(hits, vec![SearchHit::new(1, "Prod DNS")]);

        let hits = api.search(SearchKind::CheckGroup, "PROD").await.unwrap();
        assert_eq!(hits, vec![SearchHit::new(2, "prod group")]);
    }

    #[tokio::test]
    async fn test_queued_failures_are_consumed_in_order() {
        let api = InMemoryMonitor::new();
        api.fail_next(ProviderError::Cancelled);

        let err = api.get(ResourceKind::PingCheck, 1).await.unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
        assert!(api.get(ResourceKind::PingCheck, 1).await.unwrap().is_none());
        assert_eq!(api.calls(), ["get ping_check 1", "get ping_check 1"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_objects() {
        let api = InMemoryMonitor::new();
        let err = api
            .update(ResourceKind::CheckHost, 5, &Attributes::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let outcome = api.delete(ResourceKind::CheckHost, 5).await.unwrap();
        assert_eq!(outcome, Deletion::AlreadyAbsent);
    }

    #[test]
    fn test_out_of_band_removal() {
        let api = InMemoryMonitor::new();
        let id = api.insert(ResourceKind::MaintenancePeriod, json!({"name": "weekly"}));
        assert_eq!(
            api.get_state(ResourceKind::MaintenancePeriod, id).unwrap()["id"],
            id
        );

        assert!(api.remove_out_of_band(ResourceKind::MaintenancePeriod, id));
        assert!(!api.remove_out_of_band(ResourceKind::MaintenancePeriod, id));
        assert!(api.is_empty());
    }

    #[test]
    fn test_diagnostic_assertions() {
        let mut diags = Diagnostics::new();
        assert_no_errors(&diags);

        diags.push(Diagnostic::warning("heads up"));
        assert_no_errors(&diags);

        diags.push(Diagnostic::error("Error reading check").with_detail("HTTP 500"));
        assert_has_errors(&diags);
        assert_error_contains(&diags, "HTTP 500");
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_panics() {
        let diags: Diagnostics = Diagnostic::error("boom").into();
        assert_no_errors(&diags);
    }

    #[test]
    fn test_plan_assertions() {
        let plan = PlanResult::with_changes(
            json!({"name": "b"}),
            vec![AttributeChange::modified("name", json!("a"), json!("b"))],
            true,
        );
        assert_plan_has_changes(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_replaces(&plan);

        let plan = PlanResult::no_change(json!({}));
        assert_plan_no_changes(&plan);
        assert_plan_updates_in_place(&plan);
    }
}
