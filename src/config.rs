use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_BRT_BASE_URL: &str = "https://api.brt.it";
const DEFAULT_BRT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFERENCE_RETRIES: u32 = 3;
const DEFAULT_UPLOADS_ROOT: &str = "storage/brt";
const DEFAULT_BACKUP_ROOT: &str = "storage/brt-backup";
const DEFAULT_RETENTION_DAYS: u32 = 120;

/// BRT web service account and shipment defaults
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BrtConfig {
    /// Base URL of the BRT REST services
    #[serde(default = "default_brt_base_url")]
    #[validate(url)]
    pub api_base_url: String,

    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub password: String,

    /// Customer code used as sender on every shipment
    #[serde(default)]
    pub sender_customer_code: String,

    #[serde(default)]
    pub departure_depot: Option<String>,

    /// Carrier call timeout in seconds
    #[serde(default = "default_brt_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,

    /// Confirm shipments right after creation
    #[serde(default)]
    pub auto_confirm: bool,

    /// "PDF" or "ZPL"
    #[serde(default = "default_label_output_type")]
    pub label_output_type: String,

    /// How many times a "reference already used" rejection is retried
    #[serde(default = "default_reference_retry_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub reference_retry_attempts: u32,

    #[serde(default)]
    pub default_service_type: Option<String>,

    #[serde(default)]
    pub pricing_condition_code: Option<String>,

    /// API token for the pickup-point search service
    #[serde(default)]
    pub pudo_token: Option<String>,
}

impl Default for BrtConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_brt_base_url(),
            user_id: String::new(),
            password: String::new(),
            sender_customer_code: String::new(),
            departure_depot: None,
            timeout_secs: default_brt_timeout_secs(),
            auto_confirm: false,
            label_output_type: default_label_output_type(),
            reference_retry_attempts: default_reference_retry_attempts(),
            default_service_type: None,
            pricing_condition_code: None,
            pudo_token: None,
        }
    }
}

/// Where labels and generated documents live
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_uploads_root")]
    pub uploads_root: PathBuf,

    /// Mirror of every written artifact; disabled when unset
    #[serde(default = "default_backup_root")]
    pub backup_root: Option<PathBuf>,

    #[serde(default = "default_retention_days")]
    #[validate(range(min = 1))]
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_root: default_uploads_root(),
            backup_root: default_backup_root(),
            retention_days: default_retention_days(),
        }
    }
}

/// Customs paperwork defaults
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CustomsConfig {
    /// ISO alpha-2 destinations that need an invoice and a declaration
    #[serde(default = "default_customs_countries")]
    pub required_countries: Vec<String>,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    #[serde(default = "default_origin_country")]
    #[validate(length(equal = 2))]
    pub default_origin_country: String,

    #[serde(default = "default_incoterm")]
    pub default_incoterm: String,

    #[serde(default)]
    pub sender_vat: Option<String>,

    #[serde(default)]
    pub sender_eori: Option<String>,
}

impl Default for CustomsConfig {
    fn default() -> Self {
        Self {
            required_countries: default_customs_countries(),
            default_currency: default_currency(),
            default_origin_country: default_origin_country(),
            default_incoterm: default_incoterm(),
            sender_vat: None,
            sender_eori: None,
        }
    }
}

impl CustomsConfig {
    pub fn is_required_for(&self, country: &str) -> bool {
        let country = country.trim();
        self.required_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ManifestConfig {
    /// Request the official carrier document alongside the local PDF
    #[serde(default)]
    pub official_enabled: bool,

    #[serde(default = "default_manifest_prefix")]
    #[validate(length(min = 1, max = 20))]
    pub reference_prefix: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            official_enabled: false,
            reference_prefix: default_manifest_prefix(),
        }
    }
}

/// One weight/volume bracket of the shipping price list
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PriceTierConfig {
    pub label: String,
    #[serde(default)]
    pub max_weight_kg: Option<f64>,
    #[serde(default)]
    pub max_volume_m3: Option<f64>,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Evaluated in order, first match wins
    #[serde(default)]
    pub tiers: Vec<PriceTierConfig>,

    #[serde(default = "default_ledger_category")]
    pub ledger_category: String,

    #[serde(default = "default_ledger_kind")]
    pub ledger_kind: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            ledger_category: default_ledger_category(),
            ledger_kind: default_ledger_kind(),
        }
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

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Default page size for listings
    #[serde(default = "default_api_page_size")]
    pub api_default_page_size: u64,

    #[serde(default = "default_api_max_page_size")]
    pub api_max_page_size: u64,

    #[serde(default)]
    #[validate]
    pub brt: BrtConfig,

    #[serde(default)]
    #[validate]
    pub storage: StorageConfig,

    #[serde(default)]
    #[validate]
    pub customs: CustomsConfig,

    #[serde(default)]
    #[validate]
    pub manifest: ManifestConfig,

    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,
}

impl AppConfig {
    /// Configuration with built-in defaults for everything but the connection.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
            brt: BrtConfig::default(),
            storage: StorageConfig::default(),
            customs: CustomsConfig::default(),
            manifest: ManifestConfig::default(),
            pricing: PricingConfig::default(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() {
            if self.brt.user_id.trim().is_empty() || self.brt.password.is_empty() {
                let mut err = ValidationError::new("brt_credentials_required");
                err.message =
                    Some("Set APP__BRT__USER_ID and APP__BRT__PASSWORD in production".into());
                errors.add("brt", err);
            }
            if self.brt.sender_customer_code.trim().is_empty() {
                let mut err = ValidationError::new("brt_sender_required");
                err.message = Some("Set APP__BRT__SENDER_CUSTOMER_CODE in production".into());
                errors.add("brt", err);
            }
        }

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS outside development or opt in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !matches!(self.brt.label_output_type.as_str(), "PDF" | "ZPL") {
            let mut err = ValidationError::new("label_output_type");
            err.message = Some("Must be one of: PDF, ZPL".into());
            errors.add("brt", err);
        }

        for tier in &self.pricing.tiers {
            if tier.amount.is_sign_negative() {
                let mut err = ValidationError::new("price_tier_amount");
                err.message = Some(format!("Tier {} has a negative amount", tier.label).into());
                errors.add("pricing", err);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
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

fn default_api_page_size() -> u64 {
    25
}

fn default_api_max_page_size() -> u64 {
    200
}

fn default_brt_base_url() -> String {
    DEFAULT_BRT_BASE_URL.to_string()
}

fn default_brt_timeout_secs() -> u64 {
    DEFAULT_BRT_TIMEOUT_SECS
}

fn default_label_output_type() -> String {
    "PDF".to_string()
}

fn default_reference_retry_attempts() -> u32 {
    DEFAULT_REFERENCE_RETRIES
}

fn default_uploads_root() -> PathBuf {
    PathBuf::from(DEFAULT_UPLOADS_ROOT)
}

fn default_backup_root() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_BACKUP_ROOT))
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_customs_countries() -> Vec<String> {
    vec!["CH".to_string()]
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_origin_country() -> String {
    "IT".to_string()
}

fn default_incoterm() -> String {
    "DAP".to_string()
}

fn default_manifest_prefix() -> String {
    "BRT".to_string()
}

fn default_ledger_category() -> String {
    "Shipping".to_string()
}

fn default_ledger_kind() -> String {
    "expense".to_string()
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

    let default_directive = format!("brt_backoffice={},tower_http=debug", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_directive));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*, nested with `__`, e.g. APP__BRT__USER_ID)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://brt-backoffice.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("customs.required_countries")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
