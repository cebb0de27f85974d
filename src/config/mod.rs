use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration struct for both pipelines
///
/// Every component receives the section it needs at construction time;
/// nothing here is read from process-wide state after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Artifact download settings
    pub fetch: FetchConfig,
    /// Catalog crawl settings
    pub index: IndexConfig,
    /// Metadata database settings
    pub database: DatabaseConfig,
    /// HTTP client settings shared by catalog requests
    pub http: HttpConfig,
    /// Retry policy for per-item side effects
    pub retry: RetryConfig,
}

/// Settings for the artifact fetch pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Root output directory; artifacts go under `gems/`, the manifest at the root
    pub output_dir: PathBuf,
    /// Maximum number of concurrent tool invocations
    pub concurrency: usize,
    /// Executable used to fetch artifacts (`<tool> fetch <name> -v <version>`)
    pub tool: String,
    /// Seconds before a single tool invocation is abandoned
    pub tool_timeout_secs: u64,
}

/// Settings for the catalog indexing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Base URL of the HTML catalog
    pub catalog_url: String,
    /// Directory of the on-disk document store
    pub store_path: PathBuf,
    /// Number of gems crawled concurrently
    pub concurrency: usize,
    /// Executable used to list gem names (`<tool> search '^(.*)$' --all`)
    pub tool: String,
}

/// Settings for the relational metadata source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection URL
    pub url: String,
    /// Connection pool size
    pub max_connections: u32,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Retry policy; one attempt means no retry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per side effect, including the first
    pub attempts: u32,
    /// Base delay between attempts in milliseconds, multiplied by the attempt number
    pub delay_ms: u64,
}

/// Default fetch concurrency: twice the host's available parallelism
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(2)
}

impl Config {
    /// Creates a configuration with defaults and the given output directory
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            fetch: FetchConfig {
                output_dir,
                ..FetchConfig::default()
            },
            ..Self::default()
        }
    }

    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gem-harvester").join("config.toml"))
    }

    /// Loads configuration from `path`, or from the default location
    ///
    /// An explicit path must exist. A missing file at the default location
    /// yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(HarvestError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the pipelines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.concurrency == 0 || self.index.concurrency == 0 {
            return Err(HarvestError::Config("concurrency must be at least 1".into()));
        }
        if self.retry.attempts == 0 {
            return Err(HarvestError::Config("retry.attempts must be at least 1".into()));
        }
        if self.database.url.trim().is_empty() {
            return Err(HarvestError::Config("database.url is empty".into()));
        }
        url::Url::parse(&self.index.catalog_url)?;
        Ok(())
    }

    /// Directory the fetch tool runs in
    pub fn gems_dir(&self) -> PathBuf {
        self.fetch.output_dir.join("gems")
    }

    /// Path of the manifest written by the fetch pipeline
    pub fn manifest_path(&self) -> PathBuf {
        self.fetch.output_dir.join("manifest.json")
    }
}

impl FetchConfig {
    /// Deadline for one tool invocation
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl HttpConfig {
    /// Deadline for one HTTP request
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    /// Base delay between attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            concurrency: default_concurrency(),
            tool: "gem".to_string(),
            tool_timeout_secs: 600,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://rubygems.org".to_string(),
            store_path: PathBuf::from("gem_index"),
            concurrency: 15,
            tool: "gem".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        // Resolved once here; components only ever see the resulting string.
        let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
        Self {
            url: format!("postgres://{user}@localhost/rubygems"),
            max_connections: 3,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("gem-harvester/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay_ms: 500,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            index: IndexConfig::default(),
            database: DatabaseConfig::default(),
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}
