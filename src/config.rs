//! Configuration for minion.
//!
//! Settings are read from `~/.minion/config.toml`. Every field is optional;
//! missing fields take their defaults.
//!
//! ```toml
//! # Ctrl + this letter quits
//! exit_key = "q"
//!
//! # Per-byte read timeout in milliseconds
//! read_timeout_ms = 100
//!
//! # "transposed" (Up/Down move along x) or "conventional"
//! axis_mapping = "transposed"
//!
//! welcome = "Minion editor"
//! log_level = "info"
//!
//! [movement_keys]
//! enabled = true
//! up = "w"
//! down = "s"
//! left = "a"
//! right = "d"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::core::cursor::AxisMapping;
use crate::core::session::{MovementKeys, SessionOptions};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Letter whose Ctrl combination ends the session
    pub exit_key: char,
    /// Longest wait for a single input byte
    pub read_timeout_ms: u64,
    pub axis_mapping: AxisMapping,
    /// Welcome banner; empty disables it
    pub welcome: String,
    /// Log filter used when `MINION_LOG` is not set
    pub log_level: String,
    pub movement_keys: MovementKeys,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exit_key: 'q',
            read_timeout_ms: 100,
            axis_mapping: AxisMapping::default(),
            welcome: format!("Minion editor -- version {}", env!("CARGO_PKG_VERSION")),
            log_level: "info".to_string(),
            movement_keys: MovementKeys::default(),
        }
    }
}

impl Config {
    /// Load from the default location.
    ///
    /// A missing file gives the defaults. A malformed one also gives the
    /// defaults, together with the error so it can be logged once logging
    /// is up.
    pub fn load_or_default() -> (Self, Option<anyhow::Error>) {
        match Self::config_path() {
            Some(path) => Self::load_or_default_from(&path),
            None => (Self::default(), None),
        }
    }

    pub fn load_or_default_from(path: &Path) -> (Self, Option<anyhow::Error>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.exit_key.is_ascii_alphabetic() {
            bail!("exit_key must be an ASCII letter, got {:?}", self.exit_key);
        }
        if self.welcome.chars().any(char::is_control) {
            bail!("welcome must be a single line without control characters");
        }
        if self.read_timeout_ms == 0 {
            bail!("read_timeout_ms must be greater than zero");
        }
        let keys = &self.movement_keys;
        if keys.enabled {
            for key in [keys.up, keys.down, keys.left, keys.right] {
                if !key.is_ascii_graphic() {
                    bail!("movement key {:?} must be a printable ASCII character", key);
                }
            }
        }
        Ok(())
    }

    /// `~/.minion/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        minion_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            exit_letter: self.exit_key.to_ascii_lowercase() as u8,
            axis_mapping: self.axis_mapping,
            movement_keys: self.movement_keys,
            banner: self.welcome.clone(),
        }
    }
}

/// `~/.minion`, where the config and log live
pub fn minion_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".minion"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
