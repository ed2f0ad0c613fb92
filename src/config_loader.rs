// Configuration loader for Voice Notes API
//
// Seeds environment variables from a flat TOML file before the configuration is resolved.
// Variables already present in the environment always win over the file.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;
use toml::Value;

/// Default configuration file, relative to the working directory
pub const CONFIG_FILE_PATH: &str = "voice_notes_api.conf";

/// Environment variable that points at an alternative configuration file
pub const CONFIG_FILE_ENV: &str = "VOICE_API_CONFIG_FILE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads the configuration file named by `VOICE_API_CONFIG_FILE`, or the default one
///
/// Returns true if a file was found and applied.
pub fn load_config() -> bool {
    let path = env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| CONFIG_FILE_PATH.to_string());
    let config_path = Path::new(&path);

    if !config_path.exists() {
        debug!("Configuration file not found at: {}", path);
        return false;
    }

    match read_config_file(config_path) {
        Ok(values) => {
            for (key, value) in values {
                if env::var(&key).is_err() {
                    debug!("Setting env var from config file: {}", key);
                    env::set_var(key, value);
                } else {
                    debug!("Env var already exists, skipping: {}", key);
                }
            }
            info!("Configuration loaded from {}", path);
            true
        }
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

/// Reads a flat TOML file into key/value strings
pub fn read_config_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses flat TOML content. Nested tables and arrays are skipped.
pub fn parse_config(content: &str) -> Result<HashMap<String, String>, ConfigError> {
    let table: toml::Table = content.parse()?;
    let mut config_map = HashMap::new();

    for (key, value) in table {
        match value {
            Value::String(s) => {
                config_map.insert(key, s);
            }
            Value::Integer(i) => {
                config_map.insert(key, i.to_string());
            }
            Value::Float(f) => {
                config_map.insert(key, f.to_string());
            }
            Value::Boolean(b) => {
                config_map.insert(key, b.to_string());
            }
            _ => {
                warn!("Skipping unsupported TOML value type for key: {}", key);
            }
        }
    }

    Ok(config_map)
}
