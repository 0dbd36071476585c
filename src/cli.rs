use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::settings::{DATA_DIR_ENV, SETTINGS_FILE};

/// Launched by the browser as a native messaging host; talks over stdin/stdout.
#[derive(Debug, Parser)]
#[command(name = "breakwatch")]
#[command(about = "Break nudges for long YouTube sessions")]
#[command(version)]
pub struct Cli {
    /// Where the counter database and settings live
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Settings file, defaults to settings.json in the data directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep counters in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Origin of the calling extension, passed by the browser
    #[arg(value_name = "ORIGIN")]
    pub caller_origin: Option<String>,

    /// Window handle passed by Chrome on Windows
    #[arg(long, hide = true)]
    pub parent_window: Option<String>,
}

impl Cli {
    /// Flag, then environment, then the platform data directory.
    pub fn resolve_data_dir(&self, env_value: Option<String>) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        if let Some(dir) = env_value.filter(|value| !value.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        dirs::data_dir()
            .map(|dir| dir.join("breakwatch"))
            .with_context(|| format!("no data directory found; pass --data-dir or set {DATA_DIR_ENV}"))
    }

    pub fn settings_path(&self, data_dir: &Path) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| data_dir.join(SETTINGS_FILE))
    }
}
