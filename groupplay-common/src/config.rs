//! Configuration loading for GroupPlay
//!
//! Bootstrap configuration comes from a TOML file. Every field has a built-in
//! default, so a missing file (or a file that only sets a few keys) still
//! yields a complete configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (applied by the binary via [`ConfigOverrides`])
//! 2. Environment variable naming the config file (`GROUPPLAY_CONFIG`)
//! 3. Platform config file (`<config dir>/groupplay/config.toml`)
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable that may point at a config file
pub const CONFIG_ENV_VAR: &str = "GROUPPLAY_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Address the HTTP command surface binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// EventBus buffer size
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// External resolver/decoder programs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Metadata extractor invoked with `-j` (yt-dlp compatible)
    #[serde(default = "default_resolver_program")]
    pub program: String,

    /// Decoder producing raw PCM on stdout (ffmpeg compatible)
    #[serde(default = "default_decoder_program")]
    pub decoder: String,

    /// Extra arguments passed to the extractor before the reference
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Output format and defaults for playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Volume multiplier applied to newly resolved streams
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5750
}

fn default_event_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_resolver_program() -> String {
    "yt-dlp".to_string()
}

fn default_decoder_program() -> String {
    "ffmpeg".to_string()
}

fn default_volume() -> f32 {
    0.5
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_channels() -> u16 {
    2
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            event_capacity: default_event_capacity(),
            logging: LoggingConfig::default(),
            resolver: ResolverConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: default_resolver_program(),
            decoder: default_decoder_program(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

impl PlaybackConfig {
    /// Bytes per second of interleaved signed 16-bit PCM
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * 2
    }
}

impl TomlConfig {
    /// Parse a config file; a missing or unreadable file is an error
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded TOML configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load the configuration, falling back to defaults
    ///
    /// An explicitly named file must exist and parse. A discovered platform
    /// file that is absent yields defaults with a warning.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = resolve_config_path(explicit) {
            return Self::load(&path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.playback.default_volume) {
            return Err(Error::Config(format!(
                "playback.default_volume {} outside 0.0..=2.0",
                self.playback.default_volume
            )));
        }
        if self.playback.sample_rate == 0 || self.playback.channels == 0 {
            return Err(Error::Config(
                "playback.sample_rate and playback.channels must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.bind_address = bind_address;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
}

/// Explicit config path: CLI argument first, then `GROUPPLAY_CONFIG`
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

/// Platform config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("groupplay").join("config.toml"))
}
