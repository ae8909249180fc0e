//! Client configuration, loaded from the environment.

use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const API_BASE_ENV: &str = "LINEAGE_API_BASE";
pub const EVENTS_ADDR_ENV: &str = "LINEAGE_EVENTS_ADDR";
pub const TIMEOUT_ENV: &str = "LINEAGE_TIMEOUT_SECS";
pub const DEPTH_ENV: &str = "LINEAGE_DEPTH";
pub const SOURCE_ENV: &str = "LINEAGE_SOURCE";

pub const DEFAULT_API_BASE: &str = "http://localhost:8083/api";
pub const DEFAULT_EVENTS_ADDR: &str = "127.0.0.1:61613";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where lineage fragments come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// The lineage endpoint of the backend.
    #[default]
    Http,
    /// Rebuilt from catalog dependencies when no lineage endpoint exists.
    Catalog,
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "api" => Ok(SourceKind::Http),
            "catalog" => Ok(SourceKind::Catalog),
            other => Err(ConfigError::Invalid(format!(
                "{SOURCE_ENV} must be `http` or `catalog`, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: Url,
    pub events_addr: String,
    pub timeout_secs: u64,
    pub depth: u32,
    pub source: SourceKind,
}

impl ClientConfig {
    /// Defaults for everything but the api base.
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base,
            events_addr: DEFAULT_EVENTS_ADDR.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            depth: lineage_graph::DEFAULT_DEPTH,
            source: SourceKind::Http,
        }
    }

    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = lookup(API_BASE_ENV).unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let mut config = Self::new(parse_api_base(&base)?);
        if let Some(addr) = lookup(EVENTS_ADDR_ENV) {
            if addr.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{EVENTS_ADDR_ENV} is empty")));
            }
            config.events_addr = addr.trim().to_string();
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            config.timeout_secs = parse_number(TIMEOUT_ENV, &secs)?;
        }
        if let Some(depth) = lookup(DEPTH_ENV) {
            config.depth = parse_number(DEPTH_ENV, &depth)?;
        }
        if let Some(kind) = lookup(SOURCE_ENV) {
            config.source = kind.parse()?;
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, base: &str) -> Result<Self, ConfigError> {
        self.api_base = parse_api_base(base)?;
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_api_base(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::Invalid(format!("{API_BASE_ENV} `{raw}`: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::Invalid(format!(
            "{API_BASE_ENV} `{raw}` cannot be used as a base url"
        )));
    }
    Ok(url)
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be a non-negative integer, got `{raw}`")))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
