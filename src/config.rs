//! Provider configuration and connection-parameter resolution.
//!
//! The provider needs two values, the EndPointMonitor URL and an API key.
//! Each is resolved independently, so one can come from configuration and the
//! other from the environment:
//!
//! 1. An unknown declared value (depends on something not yet computed) is an
//!    error. There is no fallback.
//! 2. A declared, non-empty value wins.
//! 3. Otherwise (null or empty) the environment variable is read (`EPM_URL`,
//!    `EPM_API_KEY`).
//! 4. An empty result is an error naming both remediation paths.
//!
//! All problems for both fields are collected before returning.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use endpointmonitor_provider::config::{resolve, ConfigValue, EnvVars, ProviderConfig};
//!
//! let env = HashMap::from([("EPM_URL".to_string(), "https://x".to_string())]);
//! let config = ProviderConfig {
//!     url: ConfigValue::Known(String::new()),
//!     key: ConfigValue::known_secret("abc"),
//! };
//!
//! let resolved = resolve(&config, &env, &EnvVars::default()).unwrap();
//! assert_eq!(resolved.url(), "https://x");
//!
//! // Nothing to fall back to for the key.
//! let config = ProviderConfig { key: ConfigValue::Null, ..config };
//! assert!(resolve(&config, &env, &EnvVars::default()).is_err());
//! ```

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::error::ProviderError;

/// Default environment variable for the endpoint URL.
pub const DEFAULT_URL_ENV: &str = "EPM_URL";

/// Default environment variable for the API key.
pub const DEFAULT_KEY_ENV: &str = "EPM_API_KEY";

/// A declared configuration value.
#[derive(Debug, Clone)]
pub enum ConfigValue<T> {
    /// The value depends on something not computed yet.
    Unknown,
    /// The attribute was not set.
    Null,
    /// The attribute was set. An empty string is treated like null.
    Known(T),
}

impl<T> Default for ConfigValue<T> {
    fn default() -> Self {
        Self::Null
    }
}

impl<T> ConfigValue<T> {
    /// Returns `true` for [`ConfigValue::Unknown`].
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns `true` for [`ConfigValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Transform a known value, keeping unknown and null as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ConfigValue<U> {
        match self {
            Self::Unknown => ConfigValue::Unknown,
            Self::Null => ConfigValue::Null,
            Self::Known(v) => ConfigValue::Known(f(v)),
        }
    }
}

impl ConfigValue<SecretString> {
    /// Wrap a plain string as a known secret.
    pub fn known_secret(value: impl Into<String>) -> Self {
        Self::Known(SecretString::from(value.into()))
    }
}

/// Declared provider configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// The `url` attribute.
    pub url: ConfigValue<String>,
    /// The `key` attribute (sensitive).
    pub key: ConfigValue<SecretString>,
}

impl ProviderConfig {
    /// Read declared configuration from a JSON object.
    ///
    /// Absent or `null` attributes become [`ConfigValue::Null`], strings become
    /// [`ConfigValue::Known`]. Any other shape is reported against the
    /// attribute. A JSON config cannot express unknown values; shells that
    /// track them build [`ProviderConfig`] directly.
    pub fn from_json(value: &Value) -> Result<Self, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let url = string_attribute(value, "url", &mut diagnostics);
        let key = string_attribute(value, "key", &mut diagnostics);

        diagnostics.into_result(Self {
            url,
            key: key.map(SecretString::from),
        })
    }
}

fn string_attribute(
    value: &Value,
    name: &str,
    diagnostics: &mut Diagnostics,
) -> ConfigValue<String> {
    match value.get(name) {
        None | Some(Value::Null) => ConfigValue::Null,
        Some(Value::String(s)) => ConfigValue::Known(s.clone()),
        Some(_) => {
            diagnostics.add_attribute_error(
                name,
                "Invalid provider attribute type",
                format!("The provider attribute '{}' must be a string.", name),
            );
            ConfigValue::Null
        },
    }
}

/// Names of the environment variables used as fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVars {
    /// Variable holding the endpoint URL.
    pub url: String,
    /// Variable holding the API key.
    pub key: String,
}

impl Default for EnvVars {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL_ENV.to_string(),
            key: DEFAULT_KEY_ENV.to_string(),
        }
    }
}

/// A key-value lookup for environment fallbacks.
pub trait EnvSource {
    /// Return the value of `name`, or `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Fully resolved connection parameters.
///
/// Both fields are non-empty. Built once per provider session and never
/// mutated.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    url: String,
    key: SecretString,
}

impl ConnectionConfig {
    /// Build connection parameters directly, bypassing declared configuration.
    ///
    /// Both values must be non-empty.
    pub fn new(url: impl Into<String>, key: SecretString) -> Result<Self, ProviderError> {
        let url = url.into();
        if url.is_empty() {
            return Err(ProviderError::Configuration("empty URL".to_string()));
        }
        if key.expose_secret().is_empty() {
            return Err(ProviderError::Configuration("empty API key".to_string()));
        }
        Ok(Self { url, key })
    }

    /// The endpoint base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The API key.
    pub fn key(&self) -> &SecretString {
        &self.key
    }
}

/// HTTP transport settings for the API client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("endpointmonitor-provider/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Resolve connection parameters from declared configuration and environment.
///
/// Returns the full batch of diagnostics if either field fails; no partial
/// [`ConnectionConfig`] is ever produced.
pub fn resolve(
    config: &ProviderConfig,
    env: &impl EnvSource,
    vars: &EnvVars,
) -> Result<ConnectionConfig, Diagnostics> {
    let mut diagnostics = Diagnostics::new();

    let url = resolve_field(
        &config.url,
        env,
        Field {
            attribute: "url",
            label: "URL",
            env_var: &vars.url,
        },
        &mut diagnostics,
    );

    let key = resolve_field(
        &config.key,
        env,
        Field {
            attribute: "key",
            label: "API key",
            env_var: &vars.key,
        },
        &mut diagnostics,
    );

    match (url, key) {
        (Some(url), Some(key)) if !diagnostics.has_error() => {
            debug!(url = %url, "Resolved EndPointMonitor connection");
            Ok(ConnectionConfig {
                url,
                key: SecretString::from(key),
            })
        },
        _ => Err(diagnostics),
    }
}

struct Field<'a> {
    attribute: &'static str,
    label: &'static str,
    env_var: &'a str,
}

trait ExposeValue {
    fn expose(&self) -> &str;
}

impl ExposeValue for String {
    fn expose(&self) -> &str {
        self
    }
}

impl ExposeValue for SecretString {
    fn expose(&self) -> &str {
        self.expose_secret()
    }
}

fn resolve_field<T: ExposeValue>(
    declared: &ConfigValue<T>,
    env: &impl EnvSource,
    field: Field<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let value = match declared {
        ConfigValue::Unknown => {
            diagnostics.add_attribute_error(
                field.attribute,
                format!("Unknown EndPointMonitor {}", field.label),
                format!(
                    "The provider cannot create the EndPointMonitor client as there is an unknown configuration value for the EndPointMonitor {}. \
                     Either apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
                    field.label, field.env_var
                ),
            );
            return None;
        },
        ConfigValue::Known(v) if !v.expose().is_empty() => v.expose().to_string(),
        ConfigValue::Known(_) | ConfigValue::Null => env.var(field.env_var).unwrap_or_default(),
    };

    if value.is_empty() {
        diagnostics.add_attribute_error(
            field.attribute,
            format!("Missing EndPointMonitor {}", field.label),
            format!(
                "The provider cannot create the EndPointMonitor client as there is a missing or empty value for the EndPointMonitor {}. \
                 Set the {} value in the configuration or use the {} environment variable. \
                 If either is already set, ensure the value is not empty.",
                field.label, field.attribute, field.env_var
            ),
        );
        return None;
    }

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config(url: ConfigValue<String>, key: ConfigValue<SecretString>) -> ProviderConfig {
        ProviderConfig { url, key }
    }

    #[test]
    fn test_declared_value_wins_over_environment() {
        let env = env(&[("EPM_URL", "https://env"), ("EPM_API_KEY", "env-key")]);
        let cfg = config(
            ConfigValue::Known("https://declared".to_string()),
            ConfigValue::known_secret("declared-key"),
        );

        let resolved = resolve(&cfg, &env, &EnvVars::default()).unwrap();
        assert_eq!(resolved.url(), "https://declared");
        assert_eq!(resolved.key().expose_secret(), "declared-key");
    }

    #[test]
    fn test_null_falls_back_to_environment_per_field() {
        let env = env(&[("EPM_URL", "https://x"), ("EPM_API_KEY", "ignored")]);
        let cfg = config(ConfigValue::Null, ConfigValue::known_secret("abc"));

        let resolved = resolve(&cfg, &env, &EnvVars::default()).unwrap();
        assert_eq!(resolved.url(), "https://x");
        assert_eq!(resolved.key().expose_secret(), "abc");
    }

    #[test]
    fn test_missing_everywhere_reports_both_fields() {
        let cfg = ProviderConfig::default();
        let diags = resolve(&cfg, &env(&[]), &EnvVars::default()).unwrap_err();

        assert_eq!(diags.len(), 2);
        let attrs: Vec<_> = diags.iter().map(|d| d.attribute.as_deref()).collect();
        assert_eq!(attrs, [Some("url"), Some("key")]);
        assert_eq!(diags.as_slice()[0].summary, "Missing EndPointMonitor URL");

        let detail = diags.as_slice()[1].detail.as_deref().unwrap();
        assert!(detail.contains("EPM_API_KEY"));
        assert!(detail.contains("key value in the configuration"));
    }

    #[test]
    fn test_empty_environment_value_is_missing() {
        let env = env(&[("EPM_URL", "")]);
        let cfg = config(ConfigValue::Null, ConfigValue::known_secret("abc"));

        let diags = resolve(&cfg, &env, &EnvVars::default()).unwrap_err();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.as_slice()[0].attribute.as_deref(), Some("url"));
    }

    #[test]
    fn test_empty_declared_value_falls_back_to_environment() {
        let env = env(&[("EPM_URL", "https://x")]);
        let cfg = config(
            ConfigValue::Known(String::new()),
            ConfigValue::known_secret("abc"),
        );

        let resolved = resolve(&cfg, &env, &EnvVars::default()).unwrap();
        assert_eq!(resolved.url(), "https://x");
        assert_eq!(resolved.key().expose_secret(), "abc");

        let empty = HashMap::<String, String>::new();
        let diags = resolve(&cfg, &empty, &EnvVars::default()).unwrap_err();
        assert_eq!(diags.as_slice()[0].summary, "Missing EndPointMonitor URL");
    }

    #[test]
    fn test_unknown_value_is_fatal_without_fallback() {
        let env = env(&[("EPM_URL", "https://x"), ("EPM_API_KEY", "k")]);
        let cfg = config(ConfigValue::Unknown, ConfigValue::Unknown);

        let diags = resolve(&cfg, &env, &EnvVars::default()).unwrap_err();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.as_slice()[0].summary, "Unknown EndPointMonitor URL");
        assert_eq!(diags.as_slice()[1].summary, "Unknown EndPointMonitor API key");
    }

    #[test]
    fn test_unknown_and_missing_are_collected_together() {
        let cfg = config(ConfigValue::Unknown, ConfigValue::Null);
        let diags = resolve(&cfg, &env(&[]), &EnvVars::default()).unwrap_err();

        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            ["Unknown EndPointMonitor URL", "Missing EndPointMonitor API key"]
        );
    }

    #[test]
    fn test_custom_env_var_names() {
        let vars = EnvVars {
            url: "MONITOR_URL".to_string(),
            key: "MONITOR_KEY".to_string(),
        };
        let env = env(&[("MONITOR_URL", "https://m"), ("MONITOR_KEY", "mk")]);

        let resolved = resolve(&ProviderConfig::default(), &env, &vars).unwrap();
        assert_eq!(resolved.url(), "https://m");
        assert_eq!(resolved.key().expose_secret(), "mk");
    }

    #[test]
    fn test_key_is_redacted_in_debug() {
        let env = env(&[]);
        let cfg = config(
            ConfigValue::Known("https://x".to_string()),
            ConfigValue::known_secret("super-secret"),
        );
        let resolved = resolve(&cfg, &env, &EnvVars::default()).unwrap();
        assert!(!format!("{:?}", resolved).contains("super-secret"));
    }

    #[test]
    fn test_connection_config_new_rejects_empty() {
        assert!(ConnectionConfig::new("", SecretString::from("k")).is_err());
        assert!(ConnectionConfig::new("https://x", SecretString::from("")).is_err());
        let cfg = ConnectionConfig::new("https://x", SecretString::from("k")).unwrap();
        assert_eq!(cfg.url(), "https://x");
    }

    #[test]
    fn test_from_json() {
        let cfg = ProviderConfig::from_json(&json!({"url": "https://x", "key": null})).unwrap();
        assert!(matches!(cfg.url, ConfigValue::Known(ref u) if u == "https://x"));
        assert!(cfg.key.is_null());

        let cfg = ProviderConfig::from_json(&json!({})).unwrap();
        assert!(cfg.url.is_null());

        let diags = ProviderConfig::from_json(&json!({"url": 5, "key": true})).unwrap_err();
        assert_eq!(diags.len(), 2);
    }
}
