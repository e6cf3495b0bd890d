use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Extension accepted when `UPLOAD_ALLOWED_EXTENSIONS` is not set.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["pdf"];

/// Bytes in one megabyte, as the plan limits count them.
pub const MEGABYTE: u64 = 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Research Buddy server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the document service that indexes uploads and answers questions.
    pub docstore_url: String,
    /// Optional bearer token forwarded to the document service.
    pub docstore_api_key: Option<String>,
    /// Optional transport timeout for document service requests, in seconds.
    pub docstore_request_timeout_secs: Option<u64>,
    /// Billing plan whose upload ceiling applies to this deployment.
    pub upload_plan: UploadPlan,
    /// Optional explicit override of the plan's upload ceiling, in bytes.
    pub upload_max_bytes: Option<u64>,
    /// Lowercase file extensions accepted by the upload gateway.
    pub upload_allowed_extensions: Vec<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Billing plans and their upload ceilings.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadPlan {
    /// Free tier, 5 MB uploads.
    Starter,
    /// Entry paid tier, 10 MB uploads.
    #[default]
    Lite,
    /// Top tier, 20 MB uploads.
    Pro,
}

impl UploadPlan {
    /// Largest document the plan accepts, in bytes.
    pub const fn max_upload_bytes(self) -> u64 {
        match self {
            Self::Starter => 5 * MEGABYTE,
            Self::Lite => 10 * MEGABYTE,
            Self::Pro => 20 * MEGABYTE,
        }
    }

    /// Stable lowercase label used in logs and resource payloads.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Lite => "lite",
            Self::Pro => "pro",
        }
    }
}

impl std::str::FromStr for UploadPlan {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "starter" | "free" => Ok(Self::Starter),
            "lite" => Ok(Self::Lite),
            "pro" => Ok(Self::Pro),
            _ => Err(()),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent so `.env` templates with empty entries behave like
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required =
            |key: &str| optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()));

        Ok(Self {
            docstore_url: required("DOCSTORE_URL")?,
            docstore_api_key: optional("DOCSTORE_API_KEY"),
            docstore_request_timeout_secs: optional("DOCSTORE_REQUEST_TIMEOUT_SECS")
                .map(|value| parse_number(&value, "DOCSTORE_REQUEST_TIMEOUT_SECS"))
                .transpose()?,
            upload_plan: optional("UPLOAD_PLAN")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("UPLOAD_PLAN".to_string()))
                })
                .transpose()?
                .unwrap_or_default(),
            upload_max_bytes: optional("UPLOAD_MAX_BYTES")
                .map(|value| parse_number(&value, "UPLOAD_MAX_BYTES"))
                .transpose()?,
            upload_allowed_extensions: optional("UPLOAD_ALLOWED_EXTENSIONS")
                .map(|value| parse_extensions(&value))
                .unwrap_or_else(|| {
                    DEFAULT_ALLOWED_EXTENSIONS
                        .iter()
                        .map(|ext| (*ext).to_string())
                        .collect()
                }),
            server_port: optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Effective upload ceiling: the explicit override when present, else the plan's limit.
    pub fn effective_upload_limit(&self) -> u64 {
        self.upload_max_bytes
            .unwrap_or_else(|| self.upload_plan.max_upload_bytes())
    }
}

fn parse_number(value: &str, key: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        docstore_url = %config.docstore_url,
        plan = config.upload_plan.label(),
        upload_limit = config.effective_upload_limit(),
        extensions = ?config.upload_allowed_extensions,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
