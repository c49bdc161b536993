//! Configuration loading.
//!
//! Loads `config.toml` from `$SKYMATE_CONFIG_PATH` or `~/.skymate/`.
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::flights::{PassengerDefaults, RankingWeights};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkymateConfig {
    /// Database location and pool size.
    pub database: DatabaseConfig,
    /// Legacy fuzzy memory layer.
    pub memory: MemoryConfig,
    /// Ranking weights.
    pub ranking: RankingConfig,
    /// Search defaults.
    pub search: SearchConfig,
    /// Log level.
    pub logging: LoggingConfig,
}

/// Database settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path. Empty means `<config_dir>/skymate.db`.
    pub path: String,
    /// Maximum pool connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_connections: 4,
        }
    }
}

/// Legacy fuzzy memory settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Whether the fuzzy layer is read and written at all.
    pub enabled: bool,
    /// Maximum memories read per resolution.
    pub recall_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recall_limit: 50,
        }
    }
}

/// Weights of the `best` ranking score.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Weight of the normalised price.
    pub price_weight: f64,
    /// Weight of the normalised duration.
    pub duration_weight: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let weights = RankingWeights::default();
        Self {
            price_weight: weights.price,
            duration_weight: weights.duration,
        }
    }
}

impl RankingConfig {
    /// Weights for the ranker.
    pub fn weights(&self) -> RankingWeights {
        RankingWeights {
            price: self.price_weight,
            duration: self.duration_weight,
        }
    }
}

/// Passenger-count defaults for search compilation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Adults when nothing else says otherwise.
    pub default_adults: u32,
    /// Adults for a family preference.
    pub family_adults: u32,
    /// Adults for a partner preference.
    pub partner_adults: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let defaults = PassengerDefaults::default();
        Self {
            default_adults: defaults.default_adults,
            family_adults: defaults.family_adults,
            partner_adults: defaults.partner_adults,
        }
    }
}

impl SearchConfig {
    /// Passenger defaults for the compiler.
    pub fn passengers(&self) -> PassengerDefaults {
        PassengerDefaults {
            default_adults: self.default_adults,
            family_adults: self.family_adults,
            partner_adults: self.partner_adults,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

impl SkymateConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = config_path_with(env)?;
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("SKYMATE_DB_PATH") {
            self.database.path = v;
        }
        if let Some(v) = env("SKYMATE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("SKYMATE_MEMORY_ENABLED") {
            match v.parse() {
                Ok(enabled) => self.memory.enabled = enabled,
                Err(_) => tracing::warn!(
                    var = "SKYMATE_MEMORY_ENABLED",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Resolved database path.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the home directory
    /// cannot be determined.
    pub fn database_path(&self) -> Result<PathBuf> {
        if self.database.path.is_empty() {
            Ok(config_dir()?.join("skymate.db"))
        } else {
            Ok(expand_home(&self.database.path))
        }
    }
}

/// Resolve the config file path using a custom env resolver.
///
/// Checks `$SKYMATE_CONFIG_PATH` first, then `<config_dir>/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(p) = env("SKYMATE_CONFIG_PATH") {
        return Ok(PathBuf::from(p));
    }
    Ok(config_dir()?.join("config.toml"))
}

/// Resolve the default config directory (`~/.skymate/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".skymate"))
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => directories::BaseDirs::new()
            .map(|home| home.home_dir().join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
