use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// How the mpv child process is launched and supervised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit mpv executable.  When unset, the binary is looked up beside
    /// the radion executable and then on `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Number of control-socket probes before giving up on startup.
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
    /// Delay after the first failed probe; doubles on every attempt.
    #[serde(default = "default_ready_backoff_ms")]
    pub ready_backoff_ms: u64,
    /// How long a gracefully quit engine may take to exit before it is killed.
    #[serde(default = "default_quit_timeout_ms")]
    pub quit_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    #[serde(default = "default_metadata_interval_ms")]
    pub metadata_interval_ms: u64,
    /// Upper bound for a single control-socket round trip.
    #[serde(default = "default_ipc_timeout_ms")]
    pub ipc_timeout_ms: u64,
    /// Size of the buffer a query response is read into.
    #[serde(default = "default_response_buffer")]
    pub response_buffer: usize,
}

/// Station list source — either an http(s) URL or a local CSV file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Remote default list, refreshed into the cache in the background.
    #[serde(default = "default_stations_url")]
    pub default_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: None,
            ready_attempts: default_ready_attempts(),
            ready_backoff_ms: default_ready_backoff_ms(),
            quit_timeout_ms: default_quit_timeout_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            metadata_interval_ms: default_metadata_interval_ms(),
            ipc_timeout_ms: default_ipc_timeout_ms(),
            response_buffer: default_response_buffer(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            source: None,
            default_url: default_stations_url(),
        }
    }
}

fn default_ready_attempts() -> u32 {
    10
}

fn default_ready_backoff_ms() -> u64 {
    16
}

fn default_quit_timeout_ms() -> u64 {
    2000
}

fn default_volume() -> u8 {
    80
}

fn default_metadata_interval_ms() -> u64 {
    1000
}

fn default_ipc_timeout_ms() -> u64 {
    2000
}

fn default_response_buffer() -> usize {
    1024
}

fn default_stations_url() -> String {
    "https://gist.githubusercontent.com/agejevasv/58afa748a7bc14dcccab1ca237d14a0b/raw/stations.csv"
        .to_string()
}

impl EngineConfig {
    pub fn ready_backoff(&self) -> Duration {
        Duration::from_millis(self.ready_backoff_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }
}

impl PlayerConfig {
    /// Starting volume, clamped into 0–100 and rounded to the nearest 5.
    pub fn initial_volume(&self) -> u8 {
        let volume = self.default_volume.min(100) as u16;
        (((volume + 2) / 5 * 5).min(100)) as u8
    }

    pub fn metadata_interval(&self) -> Duration {
        Duration::from_millis(self.metadata_interval_ms)
    }

    pub fn ipc_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_timeout_ms)
    }
}

impl Config {
    /// Load the default config file, writing a fresh one on first run.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load an explicitly named config file.  Nothing is written.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.ready_attempts, 10);
        assert_eq!(config.engine.ready_backoff(), Duration::from_millis(16));
        assert_eq!(config.player.default_volume, 80);
        assert_eq!(config.player.metadata_interval(), Duration::from_secs(1));
        assert_eq!(config.player.response_buffer, 1024);
        assert!(config.stations.source.is_none());
        assert!(config.stations.default_url.starts_with("https://"));
        assert!(!config.log.debug);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [engine]
            binary = "/opt/mpv/bin/mpv"

            [player]
            default_volume = 55
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.binary, Some(PathBuf::from("/opt/mpv/bin/mpv")));
        assert_eq!(config.engine.ready_attempts, 10);
        assert_eq!(config.player.default_volume, 55);
        assert_eq!(config.player.ipc_timeout_ms, 2000);
    }

    #[test]
    fn initial_volume_is_clamped() {
        let config = Config::parse("[player]\ndefault_volume = 140\n").unwrap();
        assert_eq!(config.player.initial_volume(), 100);
    }

    #[test]
    fn initial_volume_lands_on_a_step() {
        let config = Config::parse("[player]\ndefault_volume = 83\n").unwrap();
        assert_eq!(config.player.initial_volume(), 85);
        let config = Config::parse("[player]\ndefault_volume = 57\n").unwrap();
        assert_eq!(config.player.initial_volume(), 55);
    }

    #[test]
    fn load_from_reads_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radion.toml");
        std::fs::write(&path, "[log]\ndebug = true\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert!(config.log.debug);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
