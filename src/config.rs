use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR_PREFIX: &str = "tabcopy";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub google: GoogleConfig,
    #[serde(default)]
    pub convert: ConvertConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Tuning for the write pipeline. `target_cells_per_request` is the main
/// knob: lower it if the destination keeps rejecting requests for size.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConvertConfig {
    #[serde(default = "default_value_input_option")]
    pub value_input_option: String,
    #[serde(default = "default_target_cells_per_request")]
    pub target_cells_per_request: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            value_input_option: default_value_input_option(),
            target_cells_per_request: default_target_cells_per_request(),
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

// "RAW" is faster and more robust; "USER_ENTERED" interprets formulas.
fn default_value_input_option() -> String {
    "RAW".to_string()
}

fn default_target_cells_per_request() -> usize {
    80_000
}

fn default_max_retries() -> u32 {
    8
}

fn default_base_delay_secs() -> f64 {
    1.0
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {:?}. Please create one.",
                config_path
            )));
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if config.google.client_id.is_empty() || config.google.client_secret.is_empty() {
            return Err(AppError::Config(
                "Google client_id and client_secret must be set in config file".to_string(),
            ));
        }

        Ok(config)
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the cache directory path
    pub fn cache_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_cache_home()
            .ok_or_else(|| AppError::Config("Failed to determine cache directory".to_string()))
    }

    /// Get a cache file path
    pub fn cache_file(filename: &str) -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.place_cache_file(filename)
            .map_err(|e| AppError::Config(format!("Failed to create cache file path: {}", e)))
    }
}
