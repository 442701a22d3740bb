//! Configuration for loading record tables and building cubes.
//!
//! TOML file support with environment variable overrides and defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// CSV loading
    #[serde(default)]
    pub csv: CsvConfig,

    /// Cube defaults
    #[serde(default)]
    pub cube: CubeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsvConfig {
    /// Field separator, a single ASCII character
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// `chrono` format used to recognize date columns
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Parallel parse chunks; 0 uses one per rayon thread
    #[serde(default)]
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CubeConfig {
    /// Measure reported when an aggregation yields nothing
    #[serde(default)]
    pub measure_on_empty: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_delimiter() -> char {
    ','
}
fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            date_format: default_date_format(),
            workers: 0,
        }
    }
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self { measure_on_empty: 0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CsvConfig {
    /// Delimiter as the byte the loader splits on
    pub fn delimiter_byte(&self) -> Result<u8, String> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| format!("Delimiter must be ASCII, got '{}'", self.delimiter))
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        Self::from_toml_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("CUBE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(delimiter) = std::env::var("CUBE_CSV_DELIMITER") {
            let mut chars = delimiter.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                self.csv.delimiter = c;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let delimiter = self.csv.delimiter_byte()?;
        if delimiter == b'\n' || delimiter == b'\r' {
            return Err("Delimiter cannot be a line break".to_string());
        }

        if self.csv.date_format.is_empty() {
            return Err("Date format cannot be empty".to_string());
        }

        if self.logging.level.trim().is_empty() {
            return Err("Log level cannot be empty".to_string());
        }

        Ok(())
    }
}
