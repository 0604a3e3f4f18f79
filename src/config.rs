//! Configuration for the motion link.

use crate::link::TcpTransportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Samples per analysis window (power of two)
    pub window_size: usize,

    /// Seconds per sensor-clock tick
    pub timestamp_unit_secs: f64,

    /// Interval between synthetic sensor ticks
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,

    /// Link transport settings
    pub link: LinkConfig,

    /// Path for exporting feature records
    pub export_path: PathBuf,

    /// Path for storing session statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-link");

        Self {
            window_size: 128,
            timestamp_unit_secs: 1e-9,
            sample_interval: Duration::from_millis(10),
            link: LinkConfig::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-link")
            .join("config.json")
    }

    /// Path of the persisted session statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("session_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Set the synthetic sample interval from a rate in Hz.
    pub fn set_sample_rate(&mut self, rate_hz: f64) -> Result<(), ConfigError> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample rate must be positive, got {rate_hz}"
            )));
        }

        let interval = Duration::try_from_secs_f64(1.0 / rate_hz)
            .map_err(|e| ConfigError::Invalid(format!("sample rate {rate_hz} Hz: {e}")))?;
        if interval.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "sample rate {rate_hz} Hz is too high"
            )));
        }

        self.sample_interval = interval;
        Ok(())
    }

    /// Check values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 2 || !self.window_size.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "window_size must be a power of two >= 2, got {}",
                self.window_size
            )));
        }
        if !(self.timestamp_unit_secs.is_finite() && self.timestamp_unit_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "timestamp_unit_secs must be positive, got {}",
                self.timestamp_unit_secs
            )));
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "sample_interval must be non-zero".to_string(),
            ));
        }
        if self.link.read_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "link.read_buffer_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Link transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Address to listen on for an inbound peer
    pub listen_addr: String,
    /// Peer to connect to instead of listening
    #[serde(default)]
    pub peer_addr: Option<String>,
    /// Size of the inbound read buffer
    pub read_buffer_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let tcp = TcpTransportConfig::default();
        Self {
            listen_addr: tcp.listen_addr,
            peer_addr: None,
            read_buffer_size: tcp.read_buffer_size,
        }
    }
}

impl LinkConfig {
    pub fn transport_config(&self) -> TcpTransportConfig {
        TcpTransportConfig {
            listen_addr: self.listen_addr.clone(),
            read_buffer_size: self.read_buffer_size,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, in milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_size, 128);
        assert_eq!(config.timestamp_unit_secs, 1e-9);
        assert_eq!(config.sample_interval, Duration::from_millis(10));
        assert!(config.link.peer_addr.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = Config::default();
        config.sample_interval = Duration::from_millis(4);
        config.link.peer_addr = Some("127.0.0.1:9000".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"sample_interval\":4"));

        let parsed = Config::from_json(&json).unwrap();
        assert_eq!(parsed.sample_interval, Duration::from_millis(4));
        assert_eq!(parsed.link.peer_addr.as_deref(), Some("127.0.0.1:9000"));
    }

    #[test]
    fn test_sample_rate_sets_interval() {
        let mut config = Config::default();
        config.set_sample_rate(100.0).unwrap();
        assert_eq!(config.sample_interval, Duration::from_millis(10));

        // Intervals that do not fit a Duration are rejected, not panicked on
        for rate in [1e-300, 0.0, -5.0, f64::NAN, f64::INFINITY, 1e300] {
            assert!(
                matches!(config.set_sample_rate(rate), Err(ConfigError::Invalid(_))),
                "rate {rate}"
            );
        }
        assert_eq!(config.sample_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_rejects_bad_window_size() {
        let config = Config {
            window_size: 100,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(Config::from_json(&json), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_tick_unit() {
        let config = Config {
            timestamp_unit_secs: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Config::from_json("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
