//! The object kinds managed by the provider.
//!
//! [`ResourceKind`] names the fifteen kinds that can be created, read, updated
//! and deleted. [`SearchKind`] names the nine kinds that can be looked up by
//! free text; each one backs two data sources, a singleton and a list
//! (see [`DataSourceKind`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

/// A managed resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ResourceKind {
    UrlCheck,
    DnsCheck,
    CertificateCheck,
    PingCheck,
    SocketCheck,
    AndroidJourneyCommonStep,
    AndroidJourneyCheck,
    WebJourneyCheck,
    WebJourneyCommonStep,
    CheckGroup,
    CheckHost,
    DashboardGroup,
    HostGroup,
    ProxyHost,
    MaintenancePeriod,
}

impl ResourceKind {
    /// Every resource kind, in registration order.
    pub const ALL: [ResourceKind; 15] = [
        ResourceKind::UrlCheck,
        ResourceKind::DnsCheck,
        ResourceKind::CertificateCheck,
        ResourceKind::PingCheck,
        ResourceKind::SocketCheck,
        ResourceKind::AndroidJourneyCommonStep,
        ResourceKind::AndroidJourneyCheck,
        ResourceKind::WebJourneyCheck,
        ResourceKind::WebJourneyCommonStep,
        ResourceKind::CheckGroup,
        ResourceKind::CheckHost,
        ResourceKind::DashboardGroup,
        ResourceKind::HostGroup,
        ResourceKind::ProxyHost,
        ResourceKind::MaintenancePeriod,
    ];

    /// The declarative type name without the provider prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::UrlCheck => "url_check",
            Self::DnsCheck => "dns_check",
            Self::CertificateCheck => "certificate_check",
            Self::PingCheck => "ping_check",
            Self::SocketCheck => "socket_check",
            Self::AndroidJourneyCommonStep => "android_journey_common_step",
            Self::AndroidJourneyCheck => "android_journey_check",
            Self::WebJourneyCheck => "web_journey_check",
            Self::WebJourneyCommonStep => "web_journey_common_step",
            Self::CheckGroup => "check_group",
            Self::CheckHost => "check_host",
            Self::DashboardGroup => "dashboard_group",
            Self::HostGroup => "host_group",
            Self::ProxyHost => "proxy_host",
            Self::MaintenancePeriod => "maintenance_period",
        }
    }

    /// REST collection segment for CRUD calls.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::UrlCheck => "url-check",
            Self::DnsCheck => "dns-check",
            Self::CertificateCheck => "certificate-check",
            Self::PingCheck => "ping-check",
            Self::SocketCheck => "socket-check",
            Self::AndroidJourneyCommonStep => "android-journey-common-step",
            Self::AndroidJourneyCheck => "android-journey-check",
            Self::WebJourneyCheck => "web-journey-check",
            Self::WebJourneyCommonStep => "web-journey-common-step",
            Self::CheckGroup => "check-group",
            Self::CheckHost => "check-host",
            Self::DashboardGroup => "dashboard-group",
            Self::HostGroup => "host-group",
            Self::ProxyHost => "proxy-host",
            Self::MaintenancePeriod => "maintenance-period",
        }
    }

    /// Whether this kind is one of the check types.
    pub fn is_check(self) -> bool {
        self.search_kind() == SearchKind::Check
    }

    /// The search kind whose results include objects of this kind.
    pub fn search_kind(self) -> SearchKind {
        match self {
            Self::UrlCheck
            | Self::DnsCheck
            | Self::CertificateCheck
            | Self::PingCheck
            | Self::SocketCheck
            | Self::AndroidJourneyCheck
            | Self::WebJourneyCheck => SearchKind::Check,
            Self::AndroidJourneyCommonStep => SearchKind::AndroidJourneyCommonStep,
            Self::WebJourneyCommonStep => SearchKind::WebJourneyCommonStep,
            Self::CheckGroup => SearchKind::CheckGroup,
            Self::CheckHost => SearchKind::CheckHost,
            Self::DashboardGroup => SearchKind::DashboardGroup,
            Self::HostGroup => SearchKind::HostGroup,
            Self::ProxyHost => SearchKind::ProxyHost,
            Self::MaintenancePeriod => SearchKind::MaintenancePeriod,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ProviderError::UnknownKind(s.to_string()))
    }
}

/// A kind that supports free-text search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum SearchKind {
    /// Any check type.
    Check,
    CheckGroup,
    CheckHost,
    DashboardGroup,
    HostGroup,
    MaintenancePeriod,
    ProxyHost,
    AndroidJourneyCommonStep,
    WebJourneyCommonStep,
}

impl SearchKind {
    /// Every search kind, in registration order.
    pub const ALL: [SearchKind; 9] = [
        SearchKind::CheckGroup,
        SearchKind::CheckHost,
        SearchKind::Check,
        SearchKind::DashboardGroup,
        SearchKind::HostGroup,
        SearchKind::MaintenancePeriod,
        SearchKind::ProxyHost,
        SearchKind::AndroidJourneyCommonStep,
        SearchKind::WebJourneyCommonStep,
    ];

    /// The singleton data source name; the list data source appends `s`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::CheckGroup => "check_group",
            Self::CheckHost => "check_host",
            Self::DashboardGroup => "dashboard_group",
            Self::HostGroup => "host_group",
            Self::MaintenancePeriod => "maintenance_period",
            Self::ProxyHost => "proxy_host",
            Self::AndroidJourneyCommonStep => "android_journey_common_step",
            Self::WebJourneyCommonStep => "web_journey_common_step",
        }
    }

    /// REST segment for the search endpoint.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::CheckGroup => "check-group",
            Self::CheckHost => "check-host",
            Self::DashboardGroup => "dashboard-group",
            Self::HostGroup => "host-group",
            Self::MaintenancePeriod => "maintenance-period",
            Self::ProxyHost => "proxy-host",
            Self::AndroidJourneyCommonStep => "android-journey-common-step",
            Self::WebJourneyCommonStep => "web-journey-common-step",
        }
    }

    /// Human-readable label used in diagnostics ("check group").
    pub fn label(self) -> String {
        self.name().replace('_', " ")
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many results a data source is allowed to yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Exactly one match, exposed as `id`.
    Single,
    /// Zero or more matches, exposed as `ids`.
    Multiple,
}

/// A data source: a search kind plus its cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataSourceKind {
    /// What is searched.
    pub search: SearchKind,
    /// Singleton or list.
    pub cardinality: Cardinality,
}

impl DataSourceKind {
    /// The singleton data source for `search`.
    pub fn single(search: SearchKind) -> Self {
        Self {
            search,
            cardinality: Cardinality::Single,
        }
    }

    /// The list data source for `search`.
    pub fn multiple(search: SearchKind) -> Self {
        Self {
            search,
            cardinality: Cardinality::Multiple,
        }
    }

    /// Every data source, singleton before list for each search kind.
    pub fn all() -> impl Iterator<Item = DataSourceKind> {
        SearchKind::ALL
            .into_iter()
            .flat_map(|s| [Self::single(s), Self::multiple(s)])
    }

    /// The declarative type name without the provider prefix.
    pub fn name(&self) -> String {
        match self.cardinality {
            Cardinality::Single => self.search.name().to_string(),
            Cardinality::Multiple => format!("{}s", self.search.name()),
        }
    }
}

impl FromStr for DataSourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|k| k.name() == s)
            .ok_or_else(|| ProviderError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_round_trips_through_name() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.name().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("http_check".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_checks_search_as_check() {
        assert_eq!(ResourceKind::PingCheck.search_kind(), SearchKind::Check);
        assert_eq!(ResourceKind::WebJourneyCheck.search_kind(), SearchKind::Check);
        assert!(ResourceKind::DnsCheck.is_check());
        assert!(!ResourceKind::HostGroup.is_check());
        assert_eq!(
            ResourceKind::WebJourneyCommonStep.search_kind(),
            SearchKind::WebJourneyCommonStep
        );
        assert_eq!(
            ResourceKind::MaintenancePeriod.search_kind(),
            SearchKind::MaintenancePeriod
        );
    }

    #[test]
    fn test_data_source_names() {
        let names: Vec<_> = DataSourceKind::all().map(|k| k.name()).collect();
        assert_eq!(names.len(), 18);
        assert!(names.contains(&"check".to_string()));
        assert!(names.contains(&"checks".to_string()));
        assert!(names.contains(&"android_journey_common_steps".to_string()));

        let parsed: DataSourceKind = "host_groups".parse().unwrap();
        assert_eq!(parsed, DataSourceKind::multiple(SearchKind::HostGroup));
    }

    #[test]
    fn test_data_source_kinds_are_distinct_keys() {
        let kinds: std::collections::HashSet<DataSourceKind> = DataSourceKind::all().collect();
        assert_eq!(kinds.len(), 18);
        assert!(kinds.contains(&DataSourceKind::single(SearchKind::Check)));
        assert!(kinds.contains(&DataSourceKind::multiple(SearchKind::Check)));
    }

    #[test]
    fn test_label() {
        assert_eq!(SearchKind::CheckGroup.label(), "check group");
    }
}
