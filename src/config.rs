use crate::codec::AxisScaling;
use crate::device::DEFAULT_DEVICE_DIR;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "joystick-session";
const CONFIG_FILE: &str = "config.toml";

/// Settings shared by the library and `jsmon`
///
/// ```toml
/// device_dir = "/dev/input"
/// log_level = "info"
///
/// [axis]
/// divisor = 32.767
/// rounding = "nearest"   # or "toward_zero"
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory containing the `js<N>` device nodes
    pub device_dir: PathBuf,
    /// Default tracing level for `jsmon`
    pub log_level: String,
    pub axis: AxisScaling,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            log_level: "info".to_string(),
            axis: AxisScaling::default(),
        }
    }
}

impl Config {
    /// `~/.config/joystick-session/config.toml` on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads the file at [`Config::default_path`], or defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this system, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Loads `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                info!("Loading config from {}", path.display());
                Self::from_toml_str(&content)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let divisor = self.axis.divisor;
        if !divisor.is_finite() || divisor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "axis.divisor must be a positive number, got {}",
                divisor
            )));
        }
        Ok(())
    }
}
