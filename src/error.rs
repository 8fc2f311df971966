//! Error types for the EndPointMonitor provider.

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Errors that can occur while talking to EndPointMonitor or reconciling
/// declared resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection parameters are unknown, missing or empty.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local attribute validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A singleton search matched nothing.
    #[error("No {kind} matched search '{search}'")]
    NoMatch {
        /// Label of the searched kind.
        kind: String,
        /// The free-text query.
        search: String,
    },

    /// A singleton search matched more than one object.
    #[error("{count} {kind} objects matched search '{search}', expected exactly one")]
    AmbiguousMatch {
        /// Label of the searched kind.
        kind: String,
        /// The free-text query.
        search: String,
        /// How many objects matched.
        count: usize,
    },

    /// The remote object does not exist (HTTP 404).
    #[error("{kind} {id} not found")]
    NotFound {
        /// The resource kind name.
        kind: String,
        /// The remote identifier.
        id: i64,
    },

    /// The remote object disappeared while an update was in flight.
    #[error("{kind} {id} was deleted outside of this provider")]
    Drift {
        /// The resource kind name.
        kind: String,
        /// The remote identifier.
        id: i64,
    },

    /// The API key was rejected (HTTP 401 or 403).
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication {
        /// The HTTP status code.
        status: u16,
        /// Message returned by the service.
        message: String,
    },

    /// Any other non-success response.
    #[error("EndPointMonitor API error (HTTP {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// Message returned by the service.
        message: String,
    },

    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A response body could not be decoded.
    #[error("Deserialization error: {message}")]
    Deserialization {
        /// Decoder message with a body preview.
        message: String,
        /// The raw body.
        body: String,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A list search returned an identifier that does not fit in 32 bits.
    #[error("Identifier {0} is out of range for a list result")]
    IdentifierOutOfRange(i64),

    /// The caller cancelled the operation before the remote call completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The requested resource or data source type is unknown.
    #[error("Unknown type: {0}")]
    UnknownKind(String),
}

/// Coarse classification of a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unknown, missing or empty connection parameters.
    Configuration,
    /// A search returned other than the expected cardinality.
    Ambiguity,
    /// The remote object is missing.
    NotFoundDrift,
    /// Network, authentication or protocol failure.
    Transport,
    /// Local attribute validation failure.
    Validation,
}

impl ProviderError {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Validation(_) | Self::UnknownKind(_) => ErrorCategory::Validation,
            Self::NoMatch { .. } | Self::AmbiguousMatch { .. } => ErrorCategory::Ambiguity,
            Self::NotFound { .. } | Self::Drift { .. } => ErrorCategory::NotFoundDrift,
            Self::Authentication { .. }
            | Self::Api { .. }
            | Self::Transport(_)
            | Self::InvalidUrl(_)
            | Self::Deserialization { .. }
            | Self::Serialization(_)
            | Self::IdentifierOutOfRange(_)
            | Self::Cancelled => ErrorCategory::Transport,
        }
    }

    /// Returns `true` for a remote 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the caller may safely re-invoke the operation.
    ///
    /// This crate never retries on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::Cancelled => true,
            _ => false,
        }
    }

    /// Remediation text shown as the diagnostic detail.
    fn remediation(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the provider url and key attributes, or the EPM_URL and EPM_API_KEY environment variables."
            },
            ErrorCategory::Ambiguity => {
                "Refine the search text so that it matches exactly one object, or use the list data source."
            },
            ErrorCategory::NotFoundDrift => {
                "The object was removed outside of this provider. Refresh and plan again to recreate it."
            },
            ErrorCategory::Transport => match self {
                Self::Authentication { .. } => {
                    "Check that the API key is valid and has access to the EndPointMonitor API."
                },
                Self::Cancelled => "The operation was cancelled; no remote change should be assumed.",
                _ => "Check that the EndPointMonitor URL is reachable, then run the operation again.",
            },
            ErrorCategory::Validation => "Fix the highlighted attribute values in the configuration.",
        }
    }

    /// Convert into an error diagnostic with the given summary.
    ///
    /// The detail carries this error's message followed by a remediation hint.
    pub fn to_diagnostic(&self, summary: impl Into<String>) -> Diagnostic {
        Diagnostic::error(summary).with_detail(format!("{}. {}", self, self.remediation()))
    }
}
