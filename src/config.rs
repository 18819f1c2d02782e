use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 3000;
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
///
/// Values are layered from `config/default.toml`, `config/<environment>.toml`
/// and `APP__*` environment variables, last one wins.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (Postgres or SQLite)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Directory for the local-file storage fallback
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Publicly reachable base URL, used for payment-provider back URLs
    #[serde(default = "default_public_url")]
    #[validate(url)]
    pub public_url: String,

    /// Redirect target for the success view (path or absolute URL)
    #[serde(default = "default_success_view")]
    pub success_view: String,

    /// Redirect target for the failure view
    #[serde(default = "default_failure_view")]
    pub failure_view: String,

    /// Redirect target for the pending view
    #[serde(default = "default_pending_view")]
    pub pending_view: String,

    /// ISO currency code submitted to the payment provider
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    /// Decimal places prices are rounded to before submission to the
    /// provider. 0 for zero-decimal currencies such as CLP.
    #[serde(default)]
    #[validate(range(max = 4))]
    pub price_decimal_places: u32,

    /// Payment provider API base URL
    #[serde(default = "default_payment_provider_url")]
    #[validate(url)]
    pub payment_provider_url: String,

    /// Payment provider access token
    #[serde(default)]
    pub payment_access_token: String,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,
}

fn default_database_url() -> String {
    "sqlite://data/storefront.db?mode=rwc".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_true() -> bool {
    true
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_public_url() -> String {
    format!("http://localhost:{}", DEFAULT_PORT)
}
fn default_success_view() -> String {
    "/payments/payment-success.html".to_string()
}
fn default_failure_view() -> String {
    "/payments/payment-failed.html".to_string()
}
fn default_pending_view() -> String {
    "/payments/payment-pending.html".to_string()
}
fn default_currency() -> String {
    "CLP".to_string()
}
fn default_payment_provider_url() -> String {
    "https://api.mercadopago.com".to_string()
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("test")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }
}

/// Loads and validates the application configuration.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(
        environment = %cfg.environment,
        port = cfg.port,
        "Configuration loaded"
    );
    Ok(cfg)
}

/// Initialises the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: default_database_url(),
            host: default_host(),
            port: DEFAULT_PORT,
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 5,
            db_min_connections: 1,
            data_dir: default_data_dir(),
            public_url: default_public_url(),
            success_view: default_success_view(),
            failure_view: default_failure_view(),
            pending_view: default_pending_view(),
            currency: default_currency(),
            price_decimal_places: 0,
            payment_provider_url: default_payment_provider_url(),
            payment_access_token: String::new(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_invalid_currency_and_rounding() {
        let mut cfg = base_config();
        cfg.currency = "CLPX".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = base_config();
        cfg.price_decimal_places = 9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn permissive_cors_only_in_development_or_override() {
        let mut cfg = base_config();
        assert!(cfg.should_allow_permissive_cors());

        cfg.environment = "production".to_string();
        assert!(!cfg.should_allow_permissive_cors());

        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
    }
}
