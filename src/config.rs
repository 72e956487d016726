use crate::error::{Result, SublogueError};
use crate::subtitle::{DetectionMode, FormatOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Silence kept before the first dialogue cue, in milliseconds.
    pub safety_gap_ms: u64,
    /// Files larger than this are rejected before locking.
    pub max_file_bytes: u64,
    /// Lines read by the fast "already processed" check.
    pub scan_lines: usize,
    pub lock_timeout_secs: u64,
    pub lock_stale_secs: u64,
    pub lock_poll_ms: u64,
    pub concurrency: usize,
    /// Also strip cues that merely show rating/timer/star icons.
    pub legacy_glyph_detection: bool,
    /// JSON catalog used as the metadata source.
    pub catalog: Option<PathBuf>,
    pub format: FormatOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            safety_gap_ms: 500,
            max_file_bytes: 5 * 1024 * 1024,
            scan_lines: 40,
            lock_timeout_secs: 30,
            lock_stale_secs: 60,
            lock_poll_ms: 100,
            concurrency: 4,
            legacy_glyph_detection: false,
            catalog: None,
            format: FormatOptions::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    SublogueError::Config(format!("{}: {}", config_path.display(), e))
                })?;
            }
        }

        // Override with environment variables
        if let Some(gap) = env_parse("SUBLOGUE_SAFETY_GAP_MS") {
            config.safety_gap_ms = gap;
        }
        if let Some(timeout) = env_parse("SUBLOGUE_LOCK_TIMEOUT_SECS") {
            config.lock_timeout_secs = timeout;
        }
        if let Some(concurrency) = env_parse("SUBLOGUE_CONCURRENCY") {
            config.concurrency = concurrency;
        }
        if let Some(legacy) = env_parse("SUBLOGUE_LEGACY_DETECTION") {
            config.legacy_glyph_detection = legacy;
        }
        if let Ok(catalog) = std::env::var("SUBLOGUE_CATALOG") {
            config.catalog = Some(PathBuf::from(catalog));
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SublogueError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }
        if self.lock_timeout_secs == 0 {
            return Err(SublogueError::Config(
                "Lock timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_file_bytes == 0 {
            return Err(SublogueError::Config(
                "Maximum file size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn lock_staleness(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_ms)
    }

    pub fn detection_mode(&self) -> DetectionMode {
        if self.legacy_glyph_detection {
            DetectionMode::LegacyGlyphs
        } else {
            DetectionMode::Standard
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sublogue").join("config.toml"))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.safety_gap_ms, 500);
        assert_eq!(config.max_file_bytes, 5 * 1024 * 1024);
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.lock_staleness(), Duration::from_secs(60));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.detection_mode(), DetectionMode::Standard);
        assert!(config.format.title_bold);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.lock_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_file_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            "safety_gap_ms = 750\nlegacy_glyph_detection = true\n[format]\nshow_genre = true\n",
        )
        .unwrap();

        assert_eq!(config.safety_gap_ms, 750);
        assert_eq!(config.scan_lines, 40);
        assert_eq!(config.detection_mode(), DetectionMode::LegacyGlyphs);
        assert!(config.format.show_genre);
        assert!(config.format.plot_italic);
    }
}
