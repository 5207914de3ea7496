//! Configuration types for bulk-clone

use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Remote catalog settings (endpoint, paging, filtering)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// GraphQL endpoint (default: "https://api.github.com/graphql")
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Repositories requested per page, 1-100 (default: 20)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Also list archived repositories (default: false)
    #[serde(default)]
    pub include_archived: bool,

    /// API token (falls back to GH_TOKEN, GITHUB_TOKEN, then `gh auth token`)
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_size: default_page_size(),
            include_archived: false,
            token: None,
        }
    }
}

/// Clone behavior settings (destination, concurrency, gh invocation)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloneConfig {
    /// Root directory; repositories land in `<directory>/<owner>/<name>` (default: ".")
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Number of concurrent workers (default: 10)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the handoff queue between the catalog and the workers (default: 1)
    #[serde(default = "default_dispatch_capacity")]
    pub dispatch_capacity: usize,

    /// Extra flags passed to `git clone` after `--`
    #[serde(default)]
    pub git_args: Vec<String>,

    /// Remote name used for the parent when cloning a fork (default: "upstream")
    #[serde(default = "default_upstream_remote_name")]
    pub upstream_remote_name: String,

    /// Path to the gh executable (auto-detected if None)
    #[serde(default)]
    pub gh_path: Option<PathBuf>,

    /// Whether to search PATH for gh if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            workers: default_workers(),
            dispatch_capacity: default_dispatch_capacity(),
            git_args: Vec::new(),
            upstream_remote_name: default_upstream_remote_name(),
            gh_path: None,
            search_path: true,
        }
    }
}

/// Progress display settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Interval between redraws (default: 100ms)
    #[serde(default = "default_tick_interval", with = "duration_millis_serde")]
    pub tick_interval: Duration,

    /// Pause after the last item completes so the final frame is visible (default: 750ms)
    #[serde(default = "default_settle_delay", with = "duration_millis_serde")]
    pub settle_delay: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            settle_delay: default_settle_delay(),
        }
    }
}

/// Main configuration for a bulk clone run
///
/// Sub-configs are flattened, so the JSON form is a single flat object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Repository owner (user or organization) to clone
    #[serde(default)]
    pub owner: String,

    /// Wall-clock deadline for the whole run (default: 600 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// How long to wait for workers to unwind after cancellation (default: 5 seconds)
    #[serde(default = "default_grace_period", with = "duration_serde")]
    pub grace_period: Duration,

    /// Remote catalog settings
    #[serde(flatten)]
    pub catalog: CatalogConfig,

    /// Clone behavior settings
    #[serde(flatten)]
    pub clone: CloneConfig,

    /// Progress display settings
    #[serde(flatten)]
    pub progress: ProgressConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner: String::new(),
            timeout: default_timeout(),
            grace_period: default_grace_period(),
            catalog: CatalogConfig::default(),
            clone: CloneConfig::default(),
            progress: ProgressConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their defaults.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Check that the configuration can drive a run
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::config("owner", "repository owner is required"));
        }
        if self.clone.workers == 0 {
            return Err(Error::config("workers", "at least one worker is required"));
        }
        if self.clone.dispatch_capacity == 0 {
            return Err(Error::config(
                "dispatch_capacity",
                "dispatch capacity must be at least 1",
            ));
        }
        if !(1..=100).contains(&self.catalog.page_size) {
            return Err(Error::config(
                "page_size",
                format!("page size must be between 1 and 100, got {}", self.catalog.page_size),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("timeout", "timeout must be greater than zero"));
        }
        if let Err(e) = url::Url::parse(&self.catalog.api_url) {
            return Err(Error::config(
                "api_url",
                format!("invalid API URL {:?}: {}", self.catalog.api_url, e),
            ));
        }
        Ok(())
    }
}

fn default_api_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_workers() -> usize {
    10
}

fn default_dispatch_capacity() -> usize {
    1
}

fn default_upstream_remote_name() -> String {
    "upstream".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_settle_delay() -> Duration {
    Duration::from_millis(750)
}

fn default_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_grace_period() -> Duration {
    Duration::from_secs(5)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond Duration serialization helper
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
