//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory that bundled-resource locators resolve against.
    pub resources_dir: PathBuf,

    /// Playback defaults.
    pub playback: PlaybackDefaults,

    /// Export defaults.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default playback parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Rate applied while fast-forwarding.
    pub fast_forward_rate: f32,

    /// Rate applied while rewinding (negative).
    pub rewind_rate: f32,

    /// Interval between engine position reports.
    pub position_interval_ms: u64,

    /// Skip distance used by front ends when none is given.
    pub default_skip_secs: f64,

    /// Discard decoded video/audio instead of presenting it.
    pub headless: bool,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Directory where exported files are written.
    pub output_dir: PathBuf,

    /// Container extension for exported files.
    pub file_extension: String,

    /// Video encoder name (ffmpeg `-c:v`).
    pub video_codec: String,

    /// Encoder speed preset.
    pub preset: String,

    /// Constant rate factor.
    pub crf: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// How many encodes the engine runs at once.
    pub max_parallel_jobs: usize,

    /// Upper bound on progress reports per second.
    pub progress_hz: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelkit_player=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            resources_dir: default_resources_dir(),
            playback: PlaybackDefaults::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            fast_forward_rate: 2.0,
            rewind_rate: -2.0,
            position_interval_ms: 100,
            default_skip_secs: 15.0,
            headless: true,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("reelkit-exports"),
            file_extension: "mp4".to_string(),
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            audio_bitrate_kbps: 192,
            max_parallel_jobs: 2,
            progress_hz: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `config_path`, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config as pretty JSON at `config_path`.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelkit").join("config.json")
}

/// Default bundled-resources directory.
fn default_resources_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("reelkit").join("resources")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scan_rates() {
        let config = AppConfig::default();
        assert!(config.playback.fast_forward_rate > 1.0);
        assert!(config.playback.rewind_rate < 0.0);
        assert!(config.export.max_parallel_jobs >= 1);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let json = r#"{
            "resources_dir": "/opt/reelkit",
            "playback": { "fast_forward_rate": 4.0 },
            "export": { "crf": 28 },
            "logging": { "level": "debug", "json": true, "file": null }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.playback.fast_forward_rate, 4.0);
        assert_eq!(config.playback.position_interval_ms, 100);
        assert_eq!(config.export.crf, 28);
        assert_eq!(config.export.file_extension, "mp4");
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"export": {"max_parallel_jobs": 4}}"#).unwrap();
        assert_eq!(config.export.max_parallel_jobs, 4);
        assert_eq!(config.logging.level, "info");
        assert!(config.playback.headless);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join(format!("reelkit-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.playback.default_skip_secs = 5.0;
        config.export.crf = 30;

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.playback.default_skip_secs, 5.0);
        assert_eq!(loaded.export.crf, 30);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(AppConfig::load_from(&path).export.crf, ExportDefaults::default().crf);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
