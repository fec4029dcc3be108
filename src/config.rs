// Configuration for the fetch layer.
// Loaded once from the environment or a TOML file and then treated as immutable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::descriptor::ResourceKind;
use crate::error::{BlocksError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

const ENV_TOKEN: &str = "GITHUB_TOKEN";
const ENV_TTL_SECS: &str = "BLOCKS_FOR_GITHUB_TTL_SECS";
const ENV_API_URL: &str = "BLOCKS_FOR_GITHUB_API_URL";
const ENV_TIMEOUT_SECS: &str = "BLOCKS_FOR_GITHUB_TIMEOUT_SECS";
const ENV_CACHE_DIR: &str = "BLOCKS_FOR_GITHUB_CACHE_DIR";

#[derive(Clone, Deserialize)]
pub struct Config {
    /// Personal access token; requests are anonymous without one.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default)]
    pub ttl_overrides: TtlOverrides,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Per-kind TTL in seconds, overriding `ttl_seconds` where set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TtlOverrides {
    pub profile: Option<u64>,
    pub repository: Option<u64>,
    pub profile_repositories: Option<u64>,
}

impl TtlOverrides {
    pub fn get(&self, kind: ResourceKind) -> Option<u64> {
        match kind {
            ResourceKind::Profile => self.profile,
            ResourceKind::Repository => self.repository,
            ResourceKind::ProfileRepositoryList => self.profile_repositories,
        }
    }
}

fn default_ttl_seconds() -> u64 {
    86_400
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: None,
            ttl_seconds: default_ttl_seconds(),
            ttl_overrides: TtlOverrides::default(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_dir: None,
        }
    }
}

// Hand-written so the token never reaches logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("access_token", &self.token().map(|_| "<redacted>"))
            .field("ttl_seconds", &self.ttl_seconds)
            .field("ttl_overrides", &self.ttl_overrides)
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl Config {
    /// Build a config from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            access_token: lookup(ENV_TOKEN),
            ..Self::default()
        };

        if let Some(raw) = lookup(ENV_TTL_SECS) {
            config.ttl_seconds = parse_secs(ENV_TTL_SECS, &raw)?;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            config.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| BlocksError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| BlocksError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(BlocksError::InvalidConfig(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        let url = &self.api_base_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(BlocksError::InvalidConfig(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        Ok(())
    }

    /// The access token, treating an empty or blank value as absent.
    pub fn token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// API base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// TTL for a resource kind, honouring per-kind overrides.
    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        self.ttl_overrides
            .get(kind)
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.ttl())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|_| {
        BlocksError::InvalidConfig(format!(
            "{name} must be a whole number of seconds, got '{raw}'"
        ))
    })
}
