//! Configuration management for intcode-vm.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (INTCODE_EXTRA_CELLS, etc.)
//! 2. Project-local config file (`./intcode.toml`)
//! 3. User config file (`~/.config/intcode-vm/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # intcode.toml
//!
//! # Zero cells appended after the program image
//! extra_cells = 0
//!
//! # Upper bound on memory growth, in cells
//! max_memory_cells = 16777216
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::interpreter::state::DEFAULT_MAX_CELLS;
use crate::port::Capacity;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Default orchestrator tick.
pub const DEFAULT_TICK_MS: u64 = 10;

/// Default number of quiet ticks before a stalled composition is a deadlock.
pub const DEFAULT_DEADLOCK_GRACE_TICKS: u32 = 3;

/// intcode-vm configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Zero cells appended after the program image.
    /// Memory grows on demand, so this only pre-reserves space.
    pub extra_cells: Option<usize>,

    /// Upper bound on memory growth, in cells.
    pub max_memory_cells: Option<usize>,

    /// Capacity of ports created by compositions.
    /// 0 is a rendezvous, unset is unbounded.
    pub port_capacity: Option<usize>,

    /// Orchestrator tick in milliseconds.
    pub tick_interval_ms: Option<u64>,

    /// Consecutive quiet ticks before the deadlock watchdog fires.
    pub deadlock_grace_ticks: Option<u32>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `intcode.toml`
    /// 3. User config `~/.config/intcode-vm/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load user config first (lowest priority of file configs)
        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        // Load project-local config (higher priority)
        if let Some(local_config) = Self::load_local_config() {
            config.merge(local_config);
        }

        // Environment variables override everything
        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Extra zero cells, defaulting to none.
    pub fn extra_cells(&self) -> usize {
        self.extra_cells.unwrap_or(0)
    }

    /// Memory ceiling, defaulting to [`DEFAULT_MAX_CELLS`].
    pub fn max_memory_cells(&self) -> usize {
        self.max_memory_cells.unwrap_or(DEFAULT_MAX_CELLS)
    }

    /// Port capacity for compositions.
    pub fn port_capacity(&self) -> Capacity {
        match self.port_capacity {
            Some(n) => Capacity::from(n),
            None => Capacity::Unbounded,
        }
    }

    /// Orchestrator tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.unwrap_or(DEFAULT_TICK_MS).max(1))
    }

    /// Quiet ticks before a deadlock is reported.
    pub fn deadlock_grace_ticks(&self) -> u32 {
        self.deadlock_grace_ticks
            .unwrap_or(DEFAULT_DEADLOCK_GRACE_TICKS)
            .max(1)
    }

    /// Load user configuration from ~/.config/intcode-vm/config.toml
    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./intcode.toml
    fn load_local_config() -> Option<Self> {
        Self::load_from_file(Path::new("intcode.toml"))
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    fn merge(&mut self, other: Self) {
        if other.extra_cells.is_some() {
            self.extra_cells = other.extra_cells;
        }
        if other.max_memory_cells.is_some() {
            self.max_memory_cells = other.max_memory_cells;
        }
        if other.port_capacity.is_some() {
            self.port_capacity = other.port_capacity;
        }
        if other.tick_interval_ms.is_some() {
            self.tick_interval_ms = other.tick_interval_ms;
        }
        if other.deadlock_grace_ticks.is_some() {
            self.deadlock_grace_ticks = other.deadlock_grace_ticks;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Some(n) = env_number("INTCODE_EXTRA_CELLS") {
            self.extra_cells = Some(n);
        }
        if let Some(n) = env_number("INTCODE_MAX_MEMORY_CELLS") {
            self.max_memory_cells = Some(n);
        }
        if let Some(n) = env_number("INTCODE_PORT_CAPACITY") {
            self.port_capacity = Some(n);
        }
        if let Some(n) = env_number("INTCODE_TICK_MS") {
            self.tick_interval_ms = Some(n);
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("intcode-vm").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# intcode-vm configuration
# Place this file at ~/.config/intcode-vm/config.toml or ./intcode.toml

# Zero cells appended after the program image (memory still grows on demand)
# extra_cells = 0

# Upper bound on memory growth, in cells
max_memory_cells = 16777216

# Capacity of ports between composed engines (0 = rendezvous, unset = unbounded)
# port_capacity = 0

# Orchestrator tick in milliseconds
tick_interval_ms = 10

# Quiet ticks before a stalled composition is reported as deadlocked
deadlock_grace_ticks = 3
"#
        .to_string()
    }
}

/// Parse a numeric environment variable, warning on garbage.
fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => {
            log::info!("Using {} from environment: {}", name, raw);
            Some(n)
        }
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.extra_cells(), 0);
        assert_eq!(config.max_memory_cells(), DEFAULT_MAX_CELLS);
        assert_eq!(config.port_capacity(), Capacity::Unbounded);
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.deadlock_grace_ticks(), 3);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config {
            extra_cells: Some(100),
            max_memory_cells: None,
            port_capacity: Some(4),
            ..Default::default()
        };

        let overlay = Config {
            extra_cells: None,
            max_memory_cells: Some(4096),
            port_capacity: Some(0),
            ..Default::default()
        };

        base.merge(overlay);

        // extra_cells unchanged (overlay was None)
        assert_eq!(base.extra_cells, Some(100));
        // max_memory_cells set from overlay
        assert_eq!(base.max_memory_cells, Some(4096));
        // port_capacity overridden by overlay
        assert_eq!(base.port_capacity(), Capacity::Rendezvous);
    }

    #[test]
    fn test_zero_tick_clamped() {
        let config = Config {
            tick_interval_ms: Some(0),
            deadlock_grace_ticks: Some(0),
            ..Default::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
        assert_eq!(config.deadlock_grace_ticks(), 1);
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = Config::sample_config();
        let config: Config = toml::from_str(&sample).expect("Sample config should parse");
        assert_eq!(config.max_memory_cells(), DEFAULT_MAX_CELLS);
        assert_eq!(config.extra_cells, None);
    }
}
