use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::core::rate_limiter::DEFAULT_RATE_LIMITS;
use crate::services::descriptions::DEFAULT_DESCRIPTION_FETCH_LIMIT;
use crate::services::inference::{
    DEFAULT_INFERENCE_BASE_URL, DEFAULT_MAX_NEW_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use crate::services::jobs_api::{DEFAULT_JOBS_API_BASE_URL, DEFAULT_JOBS_API_HOST};
use crate::services::jsearch::{DEFAULT_COUNTRY, DEFAULT_JSEARCH_BASE_URL, DEFAULT_JSEARCH_HOST};
use crate::services::linkedin::DEFAULT_LINKEDIN_BASE_URL;
use crate::services::search::{DEFAULT_PER_SOURCE_LIMIT, DEFAULT_RESULT_LIMIT, MAX_RESULT_LIMIT};

const ENV_PREFIX: &str = "JOBRADAR";

/// Provider key variables that override the matching settings
const PROVIDER_KEYS: [(&str, &str); 3] = [
    ("JSEARCH_API_KEY", "jsearch.api_key"),
    ("JOBS_API_KEY", "jobs_api.api_key"),
    ("HUGGINGFACE_API_KEY", "inference.api_key"),
];

/// Application configuration
///
/// Every section has defaults, so an empty configuration is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub jsearch: JSearchSettings,
    pub jobs_api: JobsApiSettings,
    pub linkedin: LinkedInSettings,
    pub inference: InferenceSettings,
    pub rate_limits: RateLimitSettings,
    pub scoring: ScoringSettings,
    pub search: SearchSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JSearchSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub host: String,
    pub country: String,
    /// Job boards searched as separate sources, e.g. "linkedin.com"
    pub sites: Vec<String>,
}

impl Default for JSearchSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_JSEARCH_BASE_URL.to_string(),
            host: DEFAULT_JSEARCH_HOST.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            sites: vec!["linkedin.com".to_string(), "indeed.com".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsApiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub host: String,
    pub enabled: bool,
}

impl Default for JobsApiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_JOBS_API_BASE_URL.to_string(),
            host: DEFAULT_JOBS_API_HOST.to_string(),
            enabled: true,
        }
    }
}

/// LinkedIn search-page scraping
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkedInSettings {
    pub base_url: String,
    /// Scrape the search page when every API source comes back empty
    pub fallback: bool,
}

impl Default for LinkedInSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LINKEDIN_BASE_URL.to_string(),
            fallback: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_new_tokens: u32,
    pub temperature: f64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_INFERENCE_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Requests per minute per upstream API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub jsearch: u32,
    pub jobs_api: u32,
    pub huggingface: u32,
    pub default: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let rate = |api: &str| {
            DEFAULT_RATE_LIMITS
                .iter()
                .find(|(name, _)| *name == api)
                .map(|(_, rpm)| *rpm)
                .unwrap_or(30)
        };

        Self {
            jsearch: rate("jsearch"),
            jobs_api: rate("jobs_api"),
            huggingface: rate("huggingface"),
            default: rate("default"),
        }
    }
}

impl RateLimitSettings {
    /// Rate table in the shape `RateLimiter::with_limits` takes
    pub fn table(&self) -> Vec<(String, u32)> {
        vec![
            ("jsearch".to_string(), self.jsearch),
            ("jobs_api".to_string(), self.jobs_api),
            ("huggingface".to_string(), self.huggingface),
            ("default".to_string(), self.default),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub hot_set_size: usize,
    pub description_fetch_limit: usize,
    /// Score cache size; unset keeps every score for the process lifetime
    pub cache_capacity: Option<u64>,
    /// Random pause bounds after each description page lookup, in milliseconds
    pub politeness_delay_ms: Option<(u64, u64)>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            hot_set_size: crate::core::relevance::DEFAULT_HOT_SET_SIZE,
            description_fetch_limit: DEFAULT_DESCRIPTION_FETCH_LIMIT,
            cache_capacity: None,
            politeness_delay_ms: Some((500, 1500)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub per_source_limit: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    pub request_timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            per_source_limit: DEFAULT_PER_SOURCE_LIMIT,
            default_limit: DEFAULT_RESULT_LIMIT,
            max_limit: MAX_RESULT_LIMIT,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. Defaults on the structs
    /// 2. `config/default.*`
    /// 3. `config/local.*` (development overrides)
    /// 4. `JOBRADAR__*` variables, e.g. `JOBRADAR__SERVER__PORT` -> server.port
    /// 5. Provider keys (`JSEARCH_API_KEY`, `JOBS_API_KEY`, `HUGGINGFACE_API_KEY`)
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment());

        with_provider_keys(builder, |name| std::env::var(name).ok())?
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment());

        with_provider_keys(builder, |name| std::env::var(name).ok())?
            .build()?
            .try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Override API keys from the well-known provider variables
fn with_provider_keys<F>(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
    lookup: F,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (variable, key) in PROVIDER_KEYS {
        if let Some(value) = lookup(variable).filter(|v| !v.trim().is_empty()) {
            builder = builder.set_override(key, value)?;
        }
    }
    Ok(builder)
}
