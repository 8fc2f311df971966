//! Authenticated access to the EndPointMonitor REST API.
//!
//! [`MonitorApi`] is the seam every engine talks through. [`ApiClient`] is the
//! HTTP implementation; tests use [`crate::testing::InMemoryMonitor`].
//!
//! Endpoints, relative to the configured URL:
//!
//! | Operation | Request                                  |
//! |-----------|------------------------------------------|
//! | search    | `GET api/{kind}/search?search={text}`    |
//! | create    | `POST api/{kind}`                        |
//! | get       | `GET api/{kind}/{id}`                    |
//! | update    | `PUT api/{kind}/{id}`                    |
//! | delete    | `DELETE api/{kind}/{id}`                 |
//!
//! Every request carries the API key in the `X-API-KEY` header. Status codes
//! map as: 2xx success, 404 not found, 401/403 authentication error, anything
//! else an API error. Nothing is retried here.

use std::future::Future;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::{ClientOptions, ConnectionConfig};
use crate::error::ProviderError;
use crate::kind::{ResourceKind, SearchKind};
use crate::types::{Attributes, Deletion, RemoteResource, SearchHit};

/// Header carrying the API key (`X-API-KEY`; header names are
/// case-insensitive and stored lowercase).
pub const API_KEY_HEADER: &str = "x-api-key";

/// Operations the engines need from EndPointMonitor.
///
/// Implementations hold no per-call mutable state, so one value can serve
/// concurrent operations for many resource instances.
#[async_trait]
pub trait MonitorApi: Send + Sync {
    /// Search `kind` for `text`. No matches is an empty vector, not an error.
    async fn search(&self, kind: SearchKind, text: &str) -> Result<Vec<SearchHit>, ProviderError>;

    /// Create an object and return it with its remote-assigned id.
    async fn create(
        &self,
        kind: ResourceKind,
        attributes: &Attributes,
    ) -> Result<RemoteResource, ProviderError>;

    /// Fetch an object. `Ok(None)` means it does not exist.
    async fn get(&self, kind: ResourceKind, id: i64)
        -> Result<Option<RemoteResource>, ProviderError>;

    /// Replace an object's attributes. A missing object is
    /// [`ProviderError::NotFound`].
    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        attributes: &Attributes,
    ) -> Result<RemoteResource, ProviderError>;

    /// Delete an object.
    async fn delete(&self, kind: ResourceKind, id: i64) -> Result<Deletion, ProviderError>;
}

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the EndPointMonitor API.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    cancel: Option<CancellationToken>,
}

impl ApiClient {
    /// Build a client from resolved connection parameters.
    ///
    /// Injects `X-API-KEY` as a default header on every request.
    pub fn new(config: &ConnectionConfig, options: &ClientOptions) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(config.key().expose_secret()).map_err(|e| {
            ProviderError::Configuration(format!("invalid API key header value: {e}"))
        })?;
        key_value.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key_value);

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Self::from_reqwest(config.url(), http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, ProviderError> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
            cancel: None,
        })
    }

    /// A handle whose calls abort with [`ProviderError::Cancelled`] once
    /// `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            cancel: Some(token),
        }
    }

    /// The API root every path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `https://host/prefix` becomes `https://host/prefix/api/`.
    fn normalize_base_url(raw: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }

        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }

    fn item_path(kind: ResourceKind, id: i64) -> String {
        format!("{}/{}", kind.path_segment(), id)
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ProviderError::Cancelled),
                    result = fut => result,
                }
            },
            None => fut.await,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        Ok(request.send().await?)
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ProviderError> {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            ProviderError::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }

    async fn parse_error(status: StatusCode, resp: Response) -> ProviderError {
        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication {
                status: status.as_u16(),
                message,
            },
            _ => ProviderError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    async fn resource_response(
        kind: ResourceKind,
        resp: Response,
    ) -> Result<RemoteResource, ProviderError> {
        let value: Value = Self::decode(resp).await?;
        RemoteResource::from_json(kind, value)
    }
}

#[async_trait]
impl MonitorApi for ApiClient {
    async fn search(&self, kind: SearchKind, text: &str) -> Result<Vec<SearchHit>, ProviderError> {
        self.cancellable(async {
            let url = self.url(&format!("{}/search", kind.path_segment()))?;
            debug!("GET {url} search={text:?}");

            let resp = self.send(self.http.get(url).query(&[("search", text)])).await?;
            let status = resp.status();
            if status.is_success() {
                Self::decode(resp).await
            } else {
                Err(Self::parse_error(status, resp).await)
            }
        })
        .await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        attributes: &Attributes,
    ) -> Result<RemoteResource, ProviderError> {
        self.cancellable(async {
            let url = self.url(kind.path_segment())?;
            debug!("POST {url}");

            let resp = self.send(self.http.post(url).json(attributes)).await?;
            let status = resp.status();
            if status.is_success() {
                Self::resource_response(kind, resp).await
            } else {
                Err(Self::parse_error(status, resp).await)
            }
        })
        .await
    }

    async fn get(
        &self,
        kind: ResourceKind,
        id: i64,
    ) -> Result<Option<RemoteResource>, ProviderError> {
        self.cancellable(async {
            let url = self.url(&Self::item_path(kind, id))?;
            debug!("GET {url}");

            let resp = self.send(self.http.get(url)).await?;
            match resp.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => {
                    Self::resource_response(kind, resp).await.map(Some)
                },
                status => Err(Self::parse_error(status, resp).await),
            }
        })
        .await
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        attributes: &Attributes,
    ) -> Result<RemoteResource, ProviderError> {
        self.cancellable(async {
            let url = self.url(&Self::item_path(kind, id))?;
            debug!("PUT {url}");

            let resp = self.send(self.http.put(url).json(attributes)).await?;
            match resp.status() {
                StatusCode::NOT_FOUND => Err(ProviderError::NotFound {
                    kind: kind.to_string(),
                    id,
                }),
                status if status.is_success() => Self::resource_response(kind, resp).await,
                status => Err(Self::parse_error(status, resp).await),
            }
        })
        .await
    }

    async fn delete(&self, kind: ResourceKind, id: i64) -> Result<Deletion, ProviderError> {
        self.cancellable(async {
            let url = self.url(&Self::item_path(kind, id))?;
            debug!("DELETE {url}");

            let resp = self.send(self.http.delete(url)).await?;
            match resp.status() {
                StatusCode::NOT_FOUND => Ok(Deletion::AlreadyAbsent),
                status if status.is_success() => Ok(Deletion::Deleted),
                status => Err(Self::parse_error(status, resp).await),
            }
        })
        .await
    }
}
