use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};
use tokio::time::Duration;

use crate::enforcer::{EnforcerConfig, DEFAULT_FALLBACK_URL};
use crate::scheduler::SessionPattern;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEBUG_ENV: &str = "BREAKWATCH_DEBUG";
pub const DATA_DIR_ENV: &str = "BREAKWATCH_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub session_pattern: SessionPattern,
    pub tick_interval_secs: u64,
    pub debounce_ms: u64,
    pub page_load_grace_secs: u64,
    pub fallback_url: String,
    /// Relative to the data directory unless absolute.
    pub database_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_pattern: SessionPattern::default(),
            tick_interval_secs: 30,
            debounce_ms: 1000,
            page_load_grace_secs: 2,
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            database_file: "breakwatch.sqlite3".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.session_pattern
            .validate()
            .context("invalid session pattern")?;
        anyhow::ensure!(self.tick_interval_secs > 0, "tickIntervalSecs must be positive");
        anyhow::ensure!(!self.fallback_url.is_empty(), "fallbackUrl must not be empty");
        anyhow::ensure!(!self.database_file.is_empty(), "databaseFile must not be empty");
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` outside tests.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup(DEBUG_ENV).is_some_and(|value| value == "1") {
            log_info!("{} set, ticking every second", DEBUG_ENV);
            self.tick_interval_secs = 1;
        }
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn enforcer_config(&self) -> EnforcerConfig {
        EnforcerConfig {
            page_load_grace: Duration::from_secs(self.page_load_grace_secs),
            fallback_url: self.fallback_url.clone(),
        }
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database_file)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("Ignoring malformed {}: {}", path.display(), err);
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Write the current settings out so there is a file to edit.
    pub fn persist_if_missing(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.persist(&self.settings())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
