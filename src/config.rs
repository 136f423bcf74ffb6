//! Runtime configuration: TOML file, then environment, then command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "SHEETCALC_CONFIG";
pub const DB_ENV: &str = "SHEETCALC_DB";
pub const LOG_ENV: &str = "SHEETCALC_LOG";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database: PathBuf,
    pub log_level: String,
    pub busy_timeout_ms: u64,
}

/// On-disk shape; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    database: Option<PathBuf>,
    log_level: Option<String>,
    busy_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: default_database_path(),
            log_level: "info".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load from `explicit`, else `$SHEETCALC_CONFIG`, else the user config
    /// dir when the file exists. Environment overrides are applied on top.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        {
            Some(path) => Self::from_file(&path)?,
            None => match user_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Config::default(),
            },
        };

        if let Some(db) = env::var_os(DB_ENV) {
            config.database = PathBuf::from(db);
        }
        if let Ok(level) = env::var(LOG_ENV) {
            config.log_level = level;
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        let defaults = Config::default();
        Ok(Config {
            database: file.database.unwrap_or(defaults.database),
            log_level: file.log_level.unwrap_or(defaults.log_level),
            busy_timeout_ms: file.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
        })
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "sheetcalc")
}

fn user_config_path() -> Option<PathBuf> {
    let proj = project_dirs()?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

fn default_database_path() -> PathBuf {
    match project_dirs() {
        Some(proj) => proj.data_dir().join("sheetcalc.db"),
        None => PathBuf::from("sheetcalc.db"),
    }
}
