use crate::crawlers::frontier::FrontierItem;
use crate::utils::normalize_url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// File names read by [`HarvestInputs::load_dir`]
pub const CONFIG_FILE: &str = "config.json";
pub const ALLOWLIST_FILE: &str = "allowlist.json";
pub const SEEDS_FILE: &str = "seeds.json";

/// Configuration loading failures. All of them abort the run before crawling.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Crawl limits and behavior switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Cap on successful saves per host
    pub max_per_host: usize,

    /// Maximum link-follow depth from a seed
    pub max_depth: u32,

    /// User-Agent header, also used to select robots.txt groups
    pub user_agent: String,

    /// Delay before each fetch
    pub rate_limit_ms: u64,

    /// Per-request abort deadline
    pub timeout_ms: u64,

    /// Worker pool size
    pub concurrency: usize,

    /// Save PDF responses byte-for-byte
    pub save_pdf: bool,

    /// Save extracted HTML text with a provenance header
    pub save_html_as_txt: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_per_host: 50,
            max_depth: 2,
            user_agent: "provenance-harvest/0.1".to_string(),
            rate_limit_ms: 500,
            timeout_ms: 15_000,
            concurrency: 4,
            save_pdf: true,
            save_html_as_txt: true,
        }
    }
}

impl HarvestConfig {
    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = parse_json(json, Path::new("<inline>"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeoutMs must be at least 1".into()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("userAgent must not be blank".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

/// Hosts that may ever be fetched, optionally with path globs per host.
///
/// A host with no globs (or any host in the flat list form) has no path
/// restriction. A host that is absent is never fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowListConfig {
    Paths(BTreeMap<String, Vec<String>>),
    Hosts(Vec<String>),
}

impl AllowListConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }

    /// Host -> glob list view over both forms
    pub fn into_host_globs(self) -> BTreeMap<String, Vec<String>> {
        match self {
            AllowListConfig::Paths(map) => map,
            AllowListConfig::Hosts(hosts) => {
                hosts.into_iter().map(|host| (host, Vec::new())).collect()
            }
        }
    }
}

/// Crawl starting points, either grouped by host or as a flat list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedsConfig {
    ByHost(BTreeMap<String, Vec<String>>),
    List(Vec<String>),
}

impl SeedsConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let seeds: Self = read_json(path.as_ref())?;
        seeds.validate()?;
        Ok(seeds)
    }

    /// All seed URLs in configuration order
    pub fn urls(&self) -> Vec<&str> {
        match self {
            SeedsConfig::ByHost(map) => map.values().flatten().map(String::as_str).collect(),
            SeedsConfig::List(list) => list.iter().map(String::as_str).collect(),
        }
    }

    /// Every seed must be an absolute http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        for seed in self.urls() {
            match Url::parse(seed) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "seed is not an absolute http(s) URL: {}",
                        seed
                    )));
                }
            }
        }
        Ok(())
    }

    /// Normalized frontier items at depth 0
    pub fn frontier_items(&self) -> Vec<FrontierItem> {
        self.urls()
            .into_iter()
            .map(|seed| FrontierItem::new(normalize_url(seed), 0))
            .collect()
    }
}

/// Everything a run needs, loaded together
#[derive(Debug, Clone)]
pub struct HarvestInputs {
    pub config: HarvestConfig,
    pub allow_list: AllowListConfig,
    pub seeds: SeedsConfig,
}

impl HarvestInputs {
    /// Load `config.json`, `allowlist.json` and `seeds.json` from `dir`
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let inputs = Self {
            config: HarvestConfig::from_file(dir.join(CONFIG_FILE))?,
            allow_list: AllowListConfig::from_file(dir.join(ALLOWLIST_FILE))?,
            seeds: SeedsConfig::from_file(dir.join(SEEDS_FILE))?,
        };
        ::log::debug!("Loaded harvest inputs from {}", dir.display());
        Ok(inputs)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_json(&contents, path)
}

fn parse_json<T: DeserializeOwned>(contents: &str, path: &Path) -> Result<T, ConfigError> {
    serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
