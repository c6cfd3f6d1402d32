use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default lifetime of registry and advisory cache entries in minutes
pub const DEFAULT_CACHE_LIFETIME_MINUTES: u64 = 60;

/// Lifetime of the installed-packages listing, independent of `cacheLifetime`
pub const INSTALLED_CACHE_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Leading wait before a document analysis starts (0 = run on first trigger)
pub const ANALYSIS_WAIT_MS: u64 = 0;

/// Cooldown between two analyses of the same document
pub const ANALYSIS_COOLDOWN_MS: u64 = 100;

/// Default number of dependencies classified at the same time
pub const DEFAULT_PARALLEL_PROCESSES_LIMIT: usize = 20;

/// Minimum release bump a newer version must reach to be suggested
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    #[default]
    Patch,
    Minor,
    Major,
}

/// LSP configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub level: BumpLevel,
    pub major_update_protection: bool,
    pub identify_security_advisories: bool,
    /// Registry and advisory cache lifetime in minutes
    pub cache_lifetime: u64,
    /// Classification concurrency, 0 for unbounded
    pub parallel_processes_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: BumpLevel::Patch,
            major_update_protection: true,
            identify_security_advisories: true,
            cache_lifetime: DEFAULT_CACHE_LIFETIME_MINUTES,
            parallel_processes_limit: DEFAULT_PARALLEL_PROCESSES_LIMIT,
        }
    }
}

impl Settings {
    /// Reads settings from an LSP payload, accepting either a flat object or
    /// one nested under `depFreshness`. Unknown or malformed input yields defaults.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let section = value.get("depFreshness").unwrap_or(value);
        serde_json::from_value(section.clone()).unwrap_or_default()
    }

    pub fn cache_lifetime(&self) -> Duration {
        Duration::from_secs(self.cache_lifetime.saturating_mul(60))
    }
}

/// Shared settings, replaced wholesale on configuration change and read as
/// snapshots by every analysis pass.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle(Arc<RwLock<Settings>>);

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub fn snapshot(&self) -> Settings {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, settings: Settings) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

/// Returns the path to the data directory for dep-freshness-lsp.
/// Uses $XDG_DATA_HOME/dep-freshness-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/dep-freshness-lsp,
/// or ./dep-freshness-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("dep-freshness-lsp.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("dep-freshness-lsp")
}
