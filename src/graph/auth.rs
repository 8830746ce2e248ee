use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::graph::errors::{GraphError, Result};

const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Renew this many seconds before the reported expiry so in-flight requests
/// never carry a token that lapses mid-call.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// A bearer token with its expiry instant.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: String, expires_at: DateTime<Utc>) -> Self {
        Self { secret, expires_at }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }
}

/// Token acquisition seam so tests can inject a static token.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire(&self) -> Result<AccessToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// OAuth2 client-credentials flow against a tenant authority.
///
/// Constructed explicitly and passed into `GraphClient`; nothing here is
/// global or ambient. The authority base is injectable so tests can point it
/// at a mock server.
pub struct ClientCredentials {
    http: reqwest::Client,
    authority_base: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    pub fn new(
        http: reqwest::Client,
        authority_base: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_base: authority_base.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_base.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    async fn acquire(&self) -> Result<AccessToken> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", DEFAULT_SCOPE),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(format!(
                "token endpoint returned HTTP {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("malformed token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(GraphError::Auth(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        debug!(expires_in = token.expires_in, "acquired application token");

        Ok(AccessToken::new(
            token.access_token,
            Utc::now() + Duration::seconds(token.expires_in),
        ))
    }
}

/// Fixed token for tests; never expires.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn acquire(&self) -> Result<AccessToken> {
        Ok(AccessToken::new(
            self.0.clone(),
            Utc::now() + Duration::hours(24),
        ))
    }
}
