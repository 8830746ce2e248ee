use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::GraphConfig;
use crate::graph::auth::{AccessToken, ClientCredentials, TokenProvider};
use crate::graph::errors::{GraphError, Result};
use crate::graph::types::DriveItem;

/// Authenticated client for the drive-item subset of the remote storage API.
///
/// Wraps three operations: fetch item by id, fetch item by path, and create a
/// child folder with conflict behavior "fail". All requests go through a
/// shared rate limiter and carry the configured timeout; the bearer token is
/// cached and re-acquired when it nears expiry.
pub struct GraphClient {
    http: reqwest::Client,
    api_base: String,
    auth: Arc<dyn TokenProvider>,
    token: RwLock<Option<AccessToken>>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

/// Error payload shape returned by the remote API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl GraphClient {
    /// Build a client from configuration, using the client-credentials flow
    /// against the configured tenant authority.
    pub fn new(cfg: &GraphConfig) -> Result<Self> {
        let http = Self::build_http(cfg.request_timeout_secs)?;
        let auth = ClientCredentials::new(
            http.clone(),
            cfg.authority_base.clone(),
            cfg.tenant_id.clone(),
            cfg.client_id.clone(),
            cfg.client_secret.clone(),
        );
        Ok(Self::assemble(http, &cfg.api_base, Arc::new(auth), cfg))
    }

    /// Build a client with an injected token provider. Used by tests to point
    /// the client at a mock server without the credentials flow.
    pub fn with_token_provider(cfg: &GraphConfig, auth: Arc<dyn TokenProvider>) -> Result<Self> {
        let http = Self::build_http(cfg.request_timeout_secs)?;
        Ok(Self::assemble(http, &cfg.api_base, auth, cfg))
    }

    fn build_http(timeout_secs: u64) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GraphError::Config(format!("failed to build HTTP client: {e}")))
    }

    fn assemble(
        http: reqwest::Client,
        api_base: &str,
        auth: Arc<dyn TokenProvider>,
        cfg: &GraphConfig,
    ) -> Self {
        let per_second = NonZeroU32::new(cfg.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(cfg.burst_capacity).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth,
            token: RwLock::new(None),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Fetch item metadata by drive id + item id.
    pub async fn get_item(&self, drive_id: &str, item_id: &str) -> Result<DriveItem> {
        let url = format!("{}/drives/{}/items/{}", self.api_base, drive_id, item_id);
        self.get_json(&url, drive_id, format!("item {item_id}")).await
    }

    /// Fetch the drive root item.
    pub async fn get_root(&self, drive_id: &str) -> Result<DriveItem> {
        let url = format!("{}/drives/{}/root", self.api_base, drive_id);
        self.get_json(&url, drive_id, "root".to_string()).await
    }

    /// Fetch item metadata by slash-delimited path; an empty path resolves
    /// the drive root.
    pub async fn get_item_by_path(&self, drive_id: &str, path: &str) -> Result<DriveItem> {
        let clean = path.trim_matches('/');
        if clean.is_empty() {
            return self.get_root(drive_id).await;
        }
        let url = format!("{}/drives/{}/root:/{}", self.api_base, drive_id, clean);
        self.get_json(&url, drive_id, format!("path '{clean}'")).await
    }

    /// Create a child folder under `parent_path` (drive root when empty),
    /// failing on a name conflict so a concurrent creator surfaces as
    /// `GraphError::Conflict` instead of silently succeeding twice.
    pub async fn create_folder(
        &self,
        drive_id: &str,
        parent_path: &str,
        name: &str,
    ) -> Result<DriveItem> {
        let parent = parent_path.trim_matches('/');
        let url = if parent.is_empty() {
            format!("{}/drives/{}/root/children", self.api_base, drive_id)
        } else {
            format!(
                "{}/drives/{}/root:/{}:/children",
                self.api_base, drive_id, parent
            )
        };
        let url = Self::parse_url(&url)?;

        let body = serde_json::json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });

        self.throttle().await;
        let token = self.bearer().await?;
        debug!(drive = drive_id, parent_path = parent, name, "creating remote folder");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Self::parse_item(response, status.as_u16()).await;
        }

        let body = response.text().await.unwrap_or_default();
        let detail = Self::error_detail(&body);
        let conflict = status.as_u16() == 409
            || detail
                .as_ref()
                .is_some_and(|d| d.code == "nameAlreadyExists");
        if conflict {
            return Err(GraphError::Conflict {
                drive_id: drive_id.to_string(),
                parent_path: parent.to_string(),
                name: name.to_string(),
            });
        }

        Err(Self::map_failure(
            status.as_u16(),
            detail,
            body,
            drive_id,
            format!("folder '{name}'"),
        ))
    }

    async fn get_json(&self, url: &str, drive_id: &str, target: String) -> Result<DriveItem> {
        let url = Self::parse_url(url)?;
        self.throttle().await;
        let token = self.bearer().await?;
        debug!(drive = drive_id, %target, "fetching drive item");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Self::parse_item(response, status.as_u16()).await;
        }

        let body = response.text().await.unwrap_or_default();
        let detail = Self::error_detail(&body);
        Err(Self::map_failure(
            status.as_u16(),
            detail,
            body,
            drive_id,
            target,
        ))
    }

    async fn parse_item(response: reqwest::Response, status: u16) -> Result<DriveItem> {
        response.json::<DriveItem>().await.map_err(|e| GraphError::Api {
            status,
            message: format!("malformed item payload: {e}"),
        })
    }

    fn error_detail(body: &str) -> Option<ApiErrorDetail> {
        serde_json::from_str::<ApiErrorBody>(body).ok().and_then(|b| b.error)
    }

    fn map_failure(
        status: u16,
        detail: Option<ApiErrorDetail>,
        raw_body: String,
        drive_id: &str,
        target: String,
    ) -> GraphError {
        let message = detail
            .map(|d| format!("{}: {}", d.code, d.message))
            .unwrap_or(raw_body);

        match status {
            404 => GraphError::NotFound {
                drive_id: drive_id.to_string(),
                target,
            },
            401 | 403 => GraphError::Auth(message),
            429 | 500..=504 => GraphError::Transient(message),
            code => GraphError::Api {
                status: code,
                message,
            },
        }
    }

    fn parse_url(raw: &str) -> Result<reqwest::Url> {
        // The WHATWG parser percent-encodes non-URL code points (spaces in
        // folder names etc.); the service forbids URL-reserved characters in
        // item names, so interpolated paths stay unambiguous.
        reqwest::Url::parse(raw).map_err(|e| GraphError::BadUrl(format!("{raw}: {e}")))
    }

    async fn throttle(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;
    }

    fn transport_error(err: reqwest::Error) -> GraphError {
        // Timeouts and connection failures are transient by contract.
        GraphError::Transient(err.to_string())
    }

    async fn bearer(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.secret().to_string());
                }
            }
        }

        let mut cached = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.secret().to_string());
            }
        }

        let fresh = self.auth.acquire().await?;
        let secret = fresh.secret().to_string();
        *cached = Some(fresh);
        Ok(secret)
    }
}
