use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the hub.
    pub hub_url: String,
    /// Delay before the feed-now flag is written back to false, in ms.
    ///
    /// The firmware's original companion app computed a 900,000 ms delay
    /// next to a comment claiming 3 seconds; until the intended hardware
    /// timing is confirmed this stays configurable, defaulting to 3 s.
    pub feed_reset_delay_ms: u64,
    /// Interval between connectivity probes, in ms.
    pub probe_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_url: "http://127.0.0.1:8080".to_string(),
            feed_reset_delay_ms: 3_000,
            probe_interval_ms: 5_000,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        if let Ok(hub_url) = std::env::var("PETFEEDER_HUB_URL") {
            config.hub_url = hub_url;
        }
        if let Ok(delay) = std::env::var("PETFEEDER_FEED_RESET_DELAY_MS") {
            if let Ok(delay) = delay.parse() {
                config.feed_reset_delay_ms = delay;
            }
        }
        if let Ok(interval) = std::env::var("PETFEEDER_PROBE_INTERVAL_MS") {
            if let Ok(interval) = interval.parse() {
                config.probe_interval_ms = interval;
            }
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/petfeeder/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("petfeeder")
            .join("config.yaml")
    }

    pub fn feed_reset_delay(&self) -> Duration {
        Duration::from_millis(self.feed_reset_delay_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hub_url, "http://127.0.0.1:8080");
        assert_eq!(config.feed_reset_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_load_no_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.probe_interval_ms, 5_000);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "hub_url: http://feeder.local:9000").unwrap();
        writeln!(file, "feed_reset_delay_ms: 1500").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.hub_url, "http://feeder.local:9000");
        assert_eq!(config.feed_reset_delay(), Duration::from_millis(1500));
        // Unspecified fields keep their defaults.
        assert_eq!(config.probe_interval_ms, 5_000);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
