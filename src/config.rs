use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for deal-desk
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DealDeskConfig {
    /// Remote storage (Microsoft Graph) settings
    pub graph: GraphConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Directory tenant the application authenticates against
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Client secret (can be set via env var)
    pub client_secret: String,
    /// OAuth authority base URL
    pub authority_base: String,
    /// API base URL
    pub api_base: String,
    /// Bounded timeout for every remote call, in seconds
    pub request_timeout_secs: u64,
    /// Rate limiting settings
    pub requests_per_second: u32,
    pub burst_capacity: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            authority_base: "https://login.microsoftonline.com".to_string(),
            api_base: "https://graph.microsoft.com/v1.0".to_string(),
            request_timeout_secs: 30,
            requests_per_second: 5,
            burst_capacity: 10,
        }
    }
}

impl GraphConfig {
    /// True when the credential triple is present.
    pub fn is_configured(&self) -> bool {
        !self.tenant_id.trim().is_empty()
            && !self.client_id.trim().is_empty()
            && !self.client_secret.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path or connection string
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://.deal-desk/deal-desk.db".to_string(),
        }
    }
}

impl DealDeskConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (deal-desk.toml)
    /// 3. Environment variables (prefixed with DEAL_DESK_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("deal-desk.toml").exists() {
            builder = builder.add_source(File::with_name("deal-desk"));
        }

        builder = builder.add_source(
            Environment::with_prefix("DEAL_DESK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut deal_desk_config: DealDeskConfig = config.try_deserialize()?;

        // The credential env vars the original deployment used still win when
        // the file leaves them blank.
        if deal_desk_config.graph.tenant_id.is_empty() {
            if let Ok(tenant) = std::env::var("GRAPH_TENANT_ID") {
                deal_desk_config.graph.tenant_id = tenant;
            }
        }
        if deal_desk_config.graph.client_id.is_empty() {
            if let Ok(client) = std::env::var("GRAPH_CLIENT_ID") {
                deal_desk_config.graph.client_id = client;
            }
        }
        if deal_desk_config.graph.client_secret.is_empty() {
            if let Ok(secret) = std::env::var("GRAPH_CLIENT_SECRET") {
                deal_desk_config.graph.client_secret = secret;
            }
        }

        Ok(deal_desk_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<DealDeskConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = DealDeskConfig::load_env_file();
        DealDeskConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static DealDeskConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_public_endpoints() {
        let cfg = DealDeskConfig::default();
        assert_eq!(cfg.graph.authority_base, "https://login.microsoftonline.com");
        assert_eq!(cfg.graph.api_base, "https://graph.microsoft.com/v1.0");
        assert_eq!(cfg.graph.request_timeout_secs, 30);
        assert!(!cfg.graph.is_configured());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut cfg = DealDeskConfig::default();
        cfg.graph.tenant_id = "tenant".to_string();
        let rendered = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DealDeskConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.graph.tenant_id, "tenant");
        assert_eq!(parsed.graph.burst_capacity, cfg.graph.burst_capacity);
    }
}
