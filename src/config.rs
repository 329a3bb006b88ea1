//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`PLANAR_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use planar_physics::SpaceConfig;
use serde::{Serialize, Deserialize};
use std::path::Path;

use crate::level::LevelConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Simulation space configuration
    #[serde(default)]
    pub space: SpaceConfig,
    /// Static geometry and bodies to load
    #[serde(default)]
    pub level: LevelConfig,
    /// Headless demo run
    #[serde(default)]
    pub demo: DemoConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`PLANAR_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        // Load user config (optional)
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // PLANAR_SPACE__TIME_STEP=0.25 -> space.time_step = 0.25
        figment = figment.merge(Env::prefixed("PLANAR_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Headless demo run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of frames to simulate
    pub frames: u32,
    /// Log body positions every N frames (0 = only at the end)
    pub log_every: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames: 300,
            log_every: 60,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_physics::SubstepMode;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.space.precision, 5);
        assert_eq!(config.space.substep_mode, SubstepMode::Aggregate);
        assert_eq!(config.demo.frames, 300);
        assert_eq!(config.debug.log_level, "info");
        assert!(config.level.bodies.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("time_step"));
        assert!(toml.contains("bucket_size"));
        assert!(toml.contains("log_every"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [space]
            time_step = 0.25
            substep_mode = "integrate"
            gravity = { x = 0.0, y = 9.8 }

            [demo]
            frames = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.space.time_step, 0.25);
        assert_eq!(config.space.substep_mode, SubstepMode::Integrate);
        assert_eq!(config.space.gravity.y, 9.8);
        assert_eq!(config.space.slop, SpaceConfig::default().slop);
        assert_eq!(config.demo.frames, 10);
        assert_eq!(config.demo.log_every, 60);
    }

    #[test]
    fn test_config_error_display() {
        let err = Figment::new()
            .merge(Toml::string("[demo]\nframes = \"lots\""))
            .extract::<AppConfig>()
            .map_err(ConfigError::from)
            .unwrap_err();
        assert!(err.to_string().starts_with("Configuration error:"));
    }
}
