//! Free-text search to stable identifiers.
//!
//! Two modes sit on top of [`MonitorApi::search`]:
//!
//! - [`resolve_one`] requires exactly one match and never guesses. Zero
//!   matches is [`ProviderError::NoMatch`], more than one is
//!   [`ProviderError::AmbiguousMatch`].
//! - [`resolve_many`] returns every match in the order the service returned
//!   them. No matches is an empty list.
//!
//! Each search is treated as a fresh snapshot; nothing is cached between calls.

use tracing::{debug, instrument};

use crate::client::MonitorApi;
use crate::error::ProviderError;
use crate::kind::SearchKind;
use crate::types::SearchHit;

/// Resolve `text` to the single matching identifier.
#[instrument(skip(api), fields(kind = %kind))]
pub async fn resolve_one<A>(api: &A, kind: SearchKind, text: &str) -> Result<i64, ProviderError>
where
    A: MonitorApi + ?Sized,
{
    let hits = api.search(kind, text).await?;
    debug!(matches = hits.len(), "Search completed");
    select_one(kind, text, &hits)
}

/// Resolve `text` to every matching identifier, in search order.
#[instrument(skip(api), fields(kind = %kind))]
pub async fn resolve_many<A>(
    api: &A,
    kind: SearchKind,
    text: &str,
) -> Result<Vec<i32>, ProviderError>
where
    A: MonitorApi + ?Sized,
{
    let hits = api.search(kind, text).await?;
    debug!(matches = hits.len(), "Search completed");
    collect_ids(&hits)
}

/// Reduce a result set to exactly one identifier.
pub fn select_one(kind: SearchKind, text: &str, hits: &[SearchHit]) -> Result<i64, ProviderError> {
    match hits {
        [] => Err(ProviderError::NoMatch {
            kind: kind.label(),
            search: text.to_string(),
        }),
        [hit] => Ok(hit.id),
        _ => Err(ProviderError::AmbiguousMatch {
            kind: kind.label(),
            search: text.to_string(),
            count: hits.len(),
        }),
    }
}

/// Narrow every identifier to the 32-bit list type, preserving order.
pub fn collect_ids(hits: &[SearchHit]) -> Result<Vec<i32>, ProviderError> {
    hits.iter()
        .map(|hit| i32::try_from(hit.id).map_err(|_| ProviderError::IdentifierOutOfRange(hit.id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryMonitor;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn hits(ids: &[i64]) -> Vec<SearchHit> {
        ids.iter()
            .map(|id| SearchHit::new(*id, format!("obj-{id}")))
            .collect()
    }

    #[test]
    fn test_select_one_cardinality() {
        let kind = SearchKind::Check;

        let err = select_one(kind, "x", &hits(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::NoMatch { .. }));

        assert_eq!(select_one(kind, "x", &hits(&[7])).unwrap(), 7);

        let err = select_one(kind, "prod-", &hits(&[1, 2])).unwrap_err();
        assert!(matches!(err, ProviderError::AmbiguousMatch { count: 2, .. }));
    }

    #[test]
    fn test_collect_ids_preserves_order_and_length() {
        assert_eq!(collect_ids(&hits(&[])).unwrap(), Vec::<i32>::new());
        assert_eq!(collect_ids(&hits(&[5, 1, 3])).unwrap(), vec![5, 1, 3]);
    }

    #[test]
    fn test_collect_ids_rejects_wide_identifiers() {
        let err = collect_ids(&hits(&[1, i64::from(i32::MAX) + 1])).unwrap_err();
        assert!(matches!(err, ProviderError::IdentifierOutOfRange(_)));
    }

    #[tokio::test]
    async fn test_resolve_one_against_remote() {
        let api = InMemoryMonitor::new();
        api.insert(crate::kind::ResourceKind::HostGroup, json!({"name": "prod-east"}));
        api.insert(crate::kind::ResourceKind::HostGroup, json!({"name": "prod-west"}));

        let id = assert_ok!(resolve_one(&api, SearchKind::HostGroup, "prod-east").await);
        assert_eq!(id, 1);

        let err = assert_err!(resolve_one(&api, SearchKind::HostGroup, "prod-").await);
        assert!(matches!(err, ProviderError::AmbiguousMatch { count: 2, .. }));

        let err = assert_err!(resolve_one(&api, SearchKind::HostGroup, "staging").await);
        assert!(matches!(err, ProviderError::NoMatch { .. }));
    }

    #[tokio::test]
    async fn test_resolve_many_against_remote() {
        let api = InMemoryMonitor::new();
        api.insert(crate::kind::ResourceKind::PingCheck, json!({"name": "db ping"}));
        api.insert(crate::kind::ResourceKind::UrlCheck, json!({"name": "db url"}));
        api.insert(crate::kind::ResourceKind::HostGroup, json!({"name": "db hosts"}));

        let ids = resolve_many(&api, SearchKind::Check, "db").await.unwrap();
        assert_eq!(ids, vec![1, 2]);

        let ids = resolve_many(&api, SearchKind::Check, "nothing").await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_propagates() {
        let api = InMemoryMonitor::new();
        api.fail_next(ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        });

        let err = resolve_many(&api, SearchKind::Check, "db").await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 500, .. }));
    }
}
