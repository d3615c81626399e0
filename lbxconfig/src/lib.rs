//! # lbxconfig - Configuration for Lullabox
//!
//! Configuration is YAML, assembled in three layers:
//! 1. the embedded default file,
//! 2. an optional user file (`$LULLABOX_CONFIG/lullabox.yaml`, falling back
//!    to `~/.lullabox/lullabox.yaml`),
//! 3. `LULLABOX_CONFIG__SECTION__KEY` environment overrides.
//!
//! ## Usage
//!
//! ```no_run
//! use lbxconfig::get_config;
//!
//! let config = get_config();
//! let volume = config.player.default_volume;
//! let db = config.db_path();
//! ```

use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{info, warn};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("lullabox.yaml");

const ENV_CONFIG_DIR: &str = "LULLABOX_CONFIG";
const ENV_PREFIX: &str = "LULLABOX_CONFIG__";
const CONFIG_FILE_NAME: &str = "lullabox.yaml";

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Global configuration, loaded once.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load("").unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load configuration, using defaults");
            Config::defaults()
        })
    })
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub db_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db_path: "lullabox.db".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSection {
    pub default_volume: u16,
    pub retry_interval_ms: u64,
    pub handshake_interval_ms: u64,
    pub surface_addr: String,
}

impl Default for PlayerSection {
    fn default() -> Self {
        Self {
            default_volume: 50,
            retry_interval_ms: 800,
            handshake_interval_ms: 300,
            surface_addr: "127.0.0.1:7799".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub api_key: String,
    pub endpoint: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://www.googleapis.com/youtube/v3/search".to_string(),
            max_results: 10,
            timeout_secs: 5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub max_entries: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self { max_entries: 50 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Assembled configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    config_dir: PathBuf,
    pub storage: StorageSection,
    pub player: PlayerSection,
    pub search: SearchSection,
    pub history: HistorySection,
    pub log: LogSection,
}

impl Config {
    /// Configuration from the embedded defaults only.
    pub fn defaults() -> Self {
        let mut config: Config =
            serde_yaml::from_str(DEFAULT_CONFIG).unwrap_or_default();
        config.config_dir = Self::find_config_dir("");
        config
    }

    /// Load configuration, layering the user file and environment overrides
    /// over the embedded defaults. An empty `directory` triggers the usual
    /// resolution order (env var, then home directory).
    pub fn load(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        let mut data: Value =
            serde_yaml::from_str(DEFAULT_CONFIG).context("Embedded default config is invalid")?;

        let user_file = config_dir.join(CONFIG_FILE_NAME);
        if user_file.is_file() {
            info!(path = %user_file.display(), "Loading configuration");
            let text = fs::read_to_string(&user_file)
                .with_context(|| format!("Failed to read {}", user_file.display()))?;
            let overlay: Value = serde_yaml::from_str(&text)
                .with_context(|| format!("Invalid YAML in {}", user_file.display()))?;
            merge_value(&mut data, overlay);
        }

        apply_env_overrides(&mut data);

        let mut config: Config =
            serde_yaml::from_value(data).context("Configuration does not match the schema")?;
        config.config_dir = config_dir;
        Ok(config)
    }

    /// Directory resolution order: explicit argument, `$LULLABOX_CONFIG`,
    /// `~/.lullabox`, current directory as a last resort.
    fn find_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            return PathBuf::from(env_path);
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".lullabox");
        }
        PathBuf::from(".")
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Database path; relative values resolve against the config directory.
    pub fn db_path(&self) -> PathBuf {
        let path = Path::new(&self.storage.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

/// Deep-merge `overlay` into `base` (mappings merge, scalars replace).
fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `LULLABOX_CONFIG__SECTION__KEY=value` overrides. Values are parsed
/// as YAML scalars so numbers and booleans come through typed.
fn apply_env_overrides(data: &mut Value) {
    for (name, raw) in env::vars() {
        let Some(path) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = path.split("__").map(|s| s.to_lowercase()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            continue;
        }
        let parsed: Value =
            serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));
        set_path(data, &segments, parsed);
    }
}

fn set_path(data: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Value::Mapping(map) = data else {
        return;
    };
    let key = Value::String(head.clone());
    if rest.is_empty() {
        map.insert(key, value);
        return;
    }
    let slot = map
        .entry(key)
        .or_insert_with(|| Value::Mapping(Default::default()));
    set_path(slot, rest, value);
}
