//! Configuration types for the scanner.
//!
//! Loads settings from config.json at startup. Provides the search backend
//! location, OCR engine paths, session capabilities, and debounce timing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::session::{Capabilities, Finish};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<LensConfig> = OnceLock::new();

/// Complete scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LensConfig {
    /// Base URL of the card search backend (POST `{base}/api/cards/search`)
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
    /// Request timeout for the search backend (seconds)
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
    /// Explicit path to the tesseract executable; searched for when unset
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory; searched for when unset
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
    /// Keep every scanned card in the batch. When false, only the latest card is kept.
    #[serde(default = "default_batch_scan")]
    pub batch_scan: bool,
    /// Finish assigned to newly scanned cards
    #[serde(default)]
    pub default_finish: Finish,
    /// Save binarized crops to the previews directory
    #[serde(default)]
    pub save_previews: bool,
    /// Window in which a repeated remote card with the same name is dropped (milliseconds)
    #[serde(default = "default_remote_debounce_ms")]
    pub remote_debounce_ms: u64,
    /// Capacity of the session command channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_search_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_batch_scan() -> bool {
    true
}

fn default_remote_debounce_ms() -> u64 {
    2000
}

fn default_channel_capacity() -> usize {
    32
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            search_base_url: default_search_base_url(),
            search_timeout_secs: default_search_timeout_secs(),
            tesseract_path: None,
            tessdata_dir: None,
            batch_scan: default_batch_scan(),
            default_finish: Finish::default(),
            save_previews: false,
            remote_debounce_ms: default_remote_debounce_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl LensConfig {
    /// Session capabilities derived from this configuration.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            batch_scan: self.batch_scan,
        }
    }

    /// Directory for binarized previews, if previews are enabled.
    pub fn preview_dir(&self) -> Option<PathBuf> {
        self.save_previews.then(crate::paths::get_previews_dir)
    }
}

/// Reads configuration from `path`, falling back to defaults on any problem.
fn load_config_from(config_path: &Path) -> LensConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    LensConfig::default()
}

/// Loads configuration from config.json or returns defaults.
/// Looks for config.json in the same directory as the executable.
fn load_config() -> LensConfig {
    load_config_from(&crate::paths::get_exe_dir().join("config.json"))
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns a reference to the global configuration.
/// Panics if called before init_config().
pub fn get_config() -> &'static LensConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}
