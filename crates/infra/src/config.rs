//! Service configuration from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "forgepos-dev-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Allowed CORS origins. `*` means any origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address (`FORGEPOS_BIND_ADDR`)
    pub bind_addr: SocketAddr,

    /// HS256 secret (`JWT_SECRET`)
    pub jwt_secret: String,

    /// False when `JWT_SECRET` was unset and the development secret is in use
    pub jwt_secret_configured: bool,

    /// Postgres event store instead of in-memory (`USE_PERSISTENT_STORES`)
    pub use_persistent_stores: bool,

    /// Required when persistent (`DATABASE_URL`)
    pub database_url: Option<String>,

    /// `FORGEPOS_CORS_ORIGINS`, comma-separated
    pub cors_origins: CorsOrigins,

    /// ISO 4217 code shown to clients (`FORGEPOS_CURRENCY`)
    pub currency: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_secret_configured: false,
            use_persistent_stores: false,
            database_url: None,
            cors_origins: CorsOrigins::Any,
            currency: "USD".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment and validate.
    ///
    /// # Environment Variables
    ///
    /// - `FORGEPOS_BIND_ADDR`: listen address (default: 0.0.0.0:8080)
    /// - `JWT_SECRET`: token signing secret (default: development secret, with a warning)
    /// - `USE_PERSISTENT_STORES`: `true`/`1` for Postgres (default: false)
    /// - `DATABASE_URL`: Postgres URL, required when persistent
    /// - `FORGEPOS_CORS_ORIGINS`: comma-separated origins or `*` (default: *)
    /// - `FORGEPOS_CURRENCY`: display currency (default: USD)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("FORGEPOS_BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                key: "FORGEPOS_BIND_ADDR",
                message: format!("{raw}: {e}"),
            })?,
            None => defaults.bind_addr,
        };

        let (jwt_secret, jwt_secret_configured) = match get("JWT_SECRET") {
            Some(secret) => (secret, true),
            None => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                (defaults.jwt_secret, false)
            }
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "USE_PERSISTENT_STORES",
                message: format!("expected true/false, got '{raw}'"),
            })?,
            None => false,
        };

        let cors_origins = match get("FORGEPOS_CORS_ORIGINS") {
            Some(raw) if raw == "*" => CorsOrigins::Any,
            Some(raw) => CorsOrigins::List(
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
            ),
            None => CorsOrigins::Any,
        };

        let config = Self {
            bind_addr,
            jwt_secret,
            jwt_secret_configured,
            use_persistent_stores,
            database_url: get("DATABASE_URL"),
            cors_origins,
            currency: get("FORGEPOS_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or(defaults.currency),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_persistent_stores && self.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid {
                key: "FORGEPOS_CURRENCY",
                message: format!("'{}' is not a three-letter currency code", self.currency),
            });
        }
        if matches!(&self.cors_origins, CorsOrigins::List(list) if list.is_empty()) {
            return Err(ConfigError::Invalid {
                key: "FORGEPOS_CORS_ORIGINS",
                message: "no origins given".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
