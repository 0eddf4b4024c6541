//! # Configuration Management Module
//!
//! Loads and writes the TOML configuration for guild storage, guild policies,
//! and logging.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use guildhall::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Guild records: {}", config.guild_dir().display());
//!
//!     // Create default configuration
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//! max_record_bytes = 100000
//!
//! [guilds]
//! color_char = "&"
//! default_rank_fallback = "none"   # or "alphabetical"
//! invalid_records = "skip"         # or "abort"
//! seed_ranks = ["member", "officer"]
//!
//! [logging]
//! level = "info"
//! file = "guildhall.log"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub guilds: GuildsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Records larger than this are refused on load.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: u64,
}

fn default_max_record_bytes() -> u64 {
    100_000
}

/// What to do when no rank is flagged as the default join rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultRankFallback {
    /// Fail with `NoDefaultRank`.
    #[default]
    None,
    /// Use the alphabetically first rank.
    Alphabetical,
}

/// What a registry reload does with a record it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRecordPolicy {
    /// Skip the record, log it, and report it in the load report.
    #[default]
    Skip,
    /// Fail the whole reload and keep the previously loaded guilds.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildsConfig {
    /// Character players type in place of the section sign in prefixes.
    #[serde(default = "default_color_char")]
    pub color_char: char,
    #[serde(default)]
    pub default_rank_fallback: DefaultRankFallback,
    #[serde(default)]
    pub invalid_records: InvalidRecordPolicy,
    /// Ranks written into every new guild record. None is flagged default.
    #[serde(default = "default_seed_ranks")]
    pub seed_ranks: Vec<String>,
}

fn default_color_char() -> char {
    '&'
}

fn default_seed_ranks() -> Vec<String> {
    vec!["member".to_string(), "officer".to_string()]
}

impl Default for GuildsConfig {
    fn default() -> Self {
        Self {
            color_char: default_color_char(),
            default_rank_fallback: DefaultRankFallback::default(),
            invalid_records: InvalidRecordPolicy::default(),
            seed_ranks: default_seed_ranks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Directory holding one record file per guild.
    pub fn guild_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("guilds")
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                max_record_bytes: default_max_record_bytes(),
            },
            guilds: GuildsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("guildhall.log".to_string()),
            },
        }
    }
}
