use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_DOCUMENTS_DIR: &str = "media/documents";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_MAIL_FROM: &str = "no-reply@environovalab.com";
const DEFAULT_SESSION_TTL_SECS: u64 = 8 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECS: u64 = 60 * 60;

/// Outbound mail configuration. When `smtp_host` is unset, mail is logged instead of sent.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[validate(email)]
    #[serde(default = "default_mail_from")]
    pub from_address: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_username: None,
            smtp_password: None,
            from_address: default_mail_from(),
        }
    }
}

impl MailConfig {
    pub fn smtp_enabled(&self) -> bool {
        self.smtp_host
            .as_deref()
            .map(|h| !h.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port (1024-65535)
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Comma separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow any origin outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Directory where rendered PDFs are written
    #[serde(default = "default_documents_dir")]
    #[validate(length(min = 1))]
    pub documents_output_dir: String,

    /// Re-render the proforma PDF after every line item mutation
    #[serde(default = "default_true_bool")]
    pub generate_documents_on_write: bool,

    /// Lifetime of a login session
    #[serde(default = "default_session_ttl_secs")]
    #[validate(range(min = 60))]
    pub session_ttl_secs: u64,

    /// Mark the session cookie `Secure`
    #[serde(default)]
    pub session_cookie_secure: bool,

    /// Lifetime of a password reset token
    #[serde(default = "default_reset_token_ttl_secs")]
    #[validate(range(min = 60))]
    pub reset_token_ttl_secs: u64,

    /// Base URL of the frontend, used to build password reset links
    #[serde(default = "default_frontend_url")]
    #[validate(url)]
    pub frontend_url: String,

    #[serde(default)]
    #[validate]
    pub mail: MailConfig,
}

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

impl AppConfig {
    /// Creates a configuration with defaults for every optional setting
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            documents_output_dir: default_documents_dir(),
            generate_documents_on_write: true,
            session_ttl_secs: default_session_ttl_secs(),
            session_cookie_secure: false,
            reset_token_ttl_secs: default_reset_token_ttl_secs(),
            frontend_url: default_frontend_url(),
            mail: MailConfig::default(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn documents_dir(&self) -> PathBuf {
        PathBuf::from(&self.documents_output_dir)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn reset_token_ttl(&self) -> Duration {
        Duration::from_secs(self.reset_token_ttl_secs)
    }

    /// Parsed CORS origins, empty when none are configured
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && self.cors_origins().is_empty() {
            let mut err = ValidationError::new("cors_allowed_origins");
            err.message = Some(
                "cors_allowed_origins must be set outside development (or set cors_allow_any_origin)"
                    .into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_true_bool() -> bool {
    true
}

fn default_documents_dir() -> String {
    DEFAULT_DOCUMENTS_DIR.to_string()
}

fn default_frontend_url() -> String {
    DEFAULT_FRONTEND_URL.to_string()
}

fn default_mail_from() -> String {
    DEFAULT_MAIL_FROM.to_string()
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_reset_token_ttl_secs() -> u64 {
    DEFAULT_RESET_TOKEN_TTL_SECS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("environovalab_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration from the `config/` directory
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let default_file = config_dir.join("default");
    let env_file = config_dir.join(&run_env);

    let config = Config::builder()
        .set_default("database_url", "sqlite://environovalab.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
