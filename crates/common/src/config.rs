//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gaze-tracking session defaults.
    pub tracking: TrackingDefaults,

    /// Heatmap rendering defaults.
    pub heatmap: HeatmapDefaults,

    /// Storage service settings.
    pub server: ServerConfig,

    /// Gateway (client) settings.
    pub gateway: GatewayConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Defaults governing one tracking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingDefaults {
    /// Time budget before a session is stopped automatically (seconds).
    pub session_timeout_secs: u64,

    /// Capacity of the raw-sample delivery channel.
    pub channel_capacity: usize,
}

/// Defaults governing heatmap replay and rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapDefaults {
    /// Fixed replay cadence: one sample added per interval (milliseconds).
    pub replay_interval_ms: u64,

    /// Splat radius in pixels.
    pub point_radius: f64,

    /// Blur factor in `[0.0, 1.0]`.
    pub blur: f64,

    /// Maximum rendered opacity in `[0.0, 1.0]`.
    pub max_opacity: f64,
}

/// Storage service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to bind.
    pub port: u16,

    /// SQLite database file.
    pub database_path: PathBuf,
}

/// Gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the storage service.
    pub base_url: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "oculo=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingDefaults::default(),
            heatmap: HeatmapDefaults::default(),
            server: ServerConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TrackingDefaults {
    fn default() -> Self {
        Self {
            session_timeout_secs: 180,
            channel_capacity: 256,
        }
    }
}

impl Default for HeatmapDefaults {
    fn default() -> Self {
        Self {
            replay_interval_ms: 100,
            point_radius: 25.0,
            blur: 0.9,
            max_opacity: 0.7,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5050,
            database_path: default_data_dir().join("oculo.db"),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".to_string(),
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
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
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
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
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
    base.join("oculo").join("config.json")
}

/// Default data directory (database location).
fn default_data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("oculo")
}
