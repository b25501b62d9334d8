use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;

pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DATA_STORE_USER: &str = "itinerary-service";
const DEFAULT_DATABASE: &str = "Itineraries";
const DEFAULT_GENERATION_LOCK_TTL_SECS: u64 = 600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not configured")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the service needs from its environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub llm: LlmConfig,
    pub data_store: DataStoreConfig,
    pub jwt_secret: String,
    pub generation_lock_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub gateway_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DataStoreConfig {
    pub url: String,
    pub user: String,
    pub key: String,
    pub database: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let llm_api_key = get("LLM_API_KEY").ok_or(ConfigError::Missing("LLM_API_KEY"))?;
        let data_store_url = get("DATA_STORE_URL").ok_or(ConfigError::Missing("DATA_STORE_URL"))?;
        let data_store_key = get("DATA_STORE_KEY").ok_or(ConfigError::Missing("DATA_STORE_KEY"))?;
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let gateway_url = get("LLM_GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string());
        Url::parse(&gateway_url).map_err(|e| ConfigError::Invalid {
            name: "LLM_GATEWAY_URL",
            reason: e.to_string(),
        })?;

        if !data_store_url.starts_with("mongodb://") && !data_store_url.starts_with("mongodb+srv://") {
            return Err(ConfigError::Invalid {
                name: "DATA_STORE_URL",
                reason: "expected a mongodb:// or mongodb+srv:// connection string".to_string(),
            });
        }

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                reason: format!("'{}' is not a port number", raw),
            })?,
            None => PORT,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| HOST.to_string()),
            port,
            llm: LlmConfig {
                api_key: llm_api_key,
                gateway_url,
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(parse_secs(
                    get("LLM_TIMEOUT_SECS"),
                    "LLM_TIMEOUT_SECS",
                    DEFAULT_LLM_TIMEOUT_SECS,
                )?),
            },
            data_store: DataStoreConfig {
                url: data_store_url,
                user: get("DATA_STORE_USER").unwrap_or_else(|| DEFAULT_DATA_STORE_USER.to_string()),
                key: data_store_key,
                database: get("DATA_STORE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            },
            jwt_secret,
            generation_lock_ttl: Duration::from_secs(parse_secs(
                get("GENERATION_LOCK_TTL_SECS"),
                "GENERATION_LOCK_TTL_SECS",
                DEFAULT_GENERATION_LOCK_TTL_SECS,
            )?),
        })
    }
}

fn parse_secs(raw: Option<String>, name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match raw {
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::Invalid {
                name,
                reason: format!("'{}' is not a positive number of seconds", raw),
            }),
        },
        None => Ok(default),
    }
}
