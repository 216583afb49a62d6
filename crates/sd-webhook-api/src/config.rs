//! Configuration types for the HTTP service
//!
//! Every field carries a serde default so an empty file or an unconfigured
//! environment deserialises. [`ServiceConfig::validate`] then rejects the
//! combinations that cannot work.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::ConfigError;
use sd_webhook_core::dispatch::DispatchSettings;
use sd_webhook_core::request_type::DEFAULT_REQUEST_TYPE_FIELDS;
use servicedesk_sdk::{ClientConfig, CustomFieldApi};

/// System-wide configuration file, without extension.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/sd-webhook/service";

/// Deployment-local configuration file, without extension.
pub const LOCAL_CONFIG_FILE: &str = "config/service";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "SDW_CONFIG_FILE";

/// Prefix of configuration overrides, e.g. `SDW__SERVER__PORT=9090`.
pub const ENV_PREFIX: &str = "SDW";

/// Environment variable supplying the automation account password.
pub const BOT_PASSWORD_ENV: &str = "SDW_BOT_PASSWORD";

// ============================================================================
// Secret
// ============================================================================

/// Credential string that is wiped on drop and never printed.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<REDACTED>")
    }
}

// ============================================================================
// Service configuration
// ============================================================================

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Automation account and REST client settings
    pub service_desk: ServiceDeskConfig,

    /// Custom field lookup settings
    pub custom_fields: CustomFieldConfig,

    /// Request type ID to handler name
    pub handlers: HashMap<String, String>,

    /// Dispatcher behaviour
    pub dispatch: DispatchConfig,
}

impl ServiceConfig {
    /// Load configuration from the layered sources.
    ///
    /// Sources, later ones overriding earlier ones:
    ///  1. `/etc/sd-webhook/service.yaml`
    ///  2. `./config/service.yaml`
    ///  3. `explicit_path`, or the file named by `SDW_CONFIG_FILE`
    ///  4. `SDW__` prefixed environment variables
    ///
    /// The first two files are optional. An explicit file must exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name(SYSTEM_CONFIG_FILE)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name(LOCAL_CONFIG_FILE)
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        let explicit = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from))
            .filter(|path| !path.as_os_str().is_empty());

        if let Some(path) = explicit {
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder = builder.add_source(
                config::File::with_name(&path.to_string_lossy())
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the configuration can drive the service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.service_desk.validate()?;
        self.custom_fields.validate()?;
        self.dispatch.validate()?;

        for (request_type, handler) in &self.handlers {
            if request_type.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("handler '{}' is mapped from an empty request type", handler),
                });
            }
            if handler.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("request type '{}' is mapped to an empty handler name", request_type),
                });
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "sd_webhook_service=info,sd_webhook_api=info,sd_webhook_core=info,tower_http=debug"
                .to_string(),
            json_format: false,
        }
    }
}

// ============================================================================
// Service Desk account
// ============================================================================

/// Automation account and REST client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDeskConfig {
    /// Account the automation acts as; comments by it are never dispatched
    pub bot_name: String,

    /// Account password; `SDW_BOT_PASSWORD` is used when absent
    pub bot_password: Option<Secret>,

    /// REST request timeout in seconds
    pub timeout_seconds: u64,

    /// User agent override
    pub user_agent: Option<String>,
}

impl Default for ServiceDeskConfig {
    fn default() -> Self {
        Self {
            bot_name: String::new(),
            bot_password: None,
            timeout_seconds: 30,
            user_agent: None,
        }
    }
}

impl ServiceDeskConfig {
    /// Configured password, falling back to the environment.
    pub fn password(&self) -> Option<Secret> {
        self.bot_password
            .clone()
            .filter(|secret| !secret.is_empty())
            .or_else(|| {
                std::env::var(BOT_PASSWORD_ENV)
                    .ok()
                    .filter(|value| !value.is_empty())
                    .map(Secret::new)
            })
    }

    /// REST client settings derived from this section.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default()
            .with_timeout(std::time::Duration::from_secs(self.timeout_seconds));
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        config
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_name.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "service_desk.bot_name".to_string(),
            });
        }
        if self.password().is_none() {
            return Err(ConfigError::Missing {
                key: format!("service_desk.bot_password (or {})", BOT_PASSWORD_ENV),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "service_desk.timeout_seconds must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Custom fields
// ============================================================================

/// Custom field lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldConfig {
    /// Which API enumerates custom fields on the site
    pub api: CustomFieldApi,

    /// File persisting resolved custom field IDs; in-memory when absent
    pub cache_file: Option<PathBuf>,

    /// Names tried, in order, for the request type field
    pub request_type_fields: Vec<String>,
}

impl Default for CustomFieldConfig {
    fn default() -> Self {
        Self {
            api: CustomFieldApi::Server,
            cache_file: Some(PathBuf::from("custom_fields.json")),
            request_type_fields: DEFAULT_REQUEST_TYPE_FIELDS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl CustomFieldConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_type_fields.is_empty() {
            return Err(ConfigError::Missing {
                key: "custom_fields.request_type_fields".to_string(),
            });
        }
        if self.request_type_fields.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                message: "custom_fields.request_type_fields contains an empty name".to_string(),
            });
        }
        if let Some(path) = &self.cache_file {
            if path.as_os_str().is_empty() || path.is_dir() {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "custom_fields.cache_file '{}' must name a file",
                        path.display()
                    ),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Dispatcher behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Decline tickets whose reporter cannot be identified
    pub decline_anonymous: bool,

    /// Status anonymous tickets are moved to
    pub decline_status: String,

    /// Public comment posted when declining
    pub anonymous_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let settings = DispatchSettings::default();
        Self {
            decline_anonymous: settings.decline_anonymous,
            decline_status: settings.decline_status,
            anonymous_message: settings.anonymous_message,
        }
    }
}

impl DispatchConfig {
    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            decline_anonymous: self.decline_anonymous,
            decline_status: self.decline_status.clone(),
            anonymous_message: self.anonymous_message.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.decline_anonymous && self.decline_status.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "dispatch.decline_status".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
