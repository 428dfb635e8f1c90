// src/config/mod.rs
// Build configuration: parsing, validation and loading.

pub mod processed; // Validated configuration used by the build
pub mod raw; // Structs directly mapping to YAML/JSON structure

pub use processed::BuildConfig;
pub use raw::BuildConfigRaw;

use crate::error::{Error, Result};
use std::path::Path;

/// Environment variable naming a configuration file for [`BuildConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "PACKED_CONFIG";

impl BuildConfig {
  pub fn from_yaml_str(input: &str) -> Result<Self> {
    let raw: BuildConfigRaw = serde_yaml::from_str(input).map_err(|e| Error::ConfigParse(e.to_string()))?;
    raw.try_into()
  }

  pub fn from_json_str(input: &str) -> Result<Self> {
    let raw: BuildConfigRaw = serde_json::from_str(input).map_err(|e| Error::ConfigParse(e.to_string()))?;
    raw.try_into()
  }

  /// Loads a `.yaml`, `.yml` or `.json` file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.exists() {
      return Err(Error::ConfigNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
      Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
      Some("json") => Self::from_json_str(&contents),
      _ => Err(Error::ConfigParse(format!(
        "unsupported configuration file extension: {}",
        path.display()
      ))),
    }
  }

  /// Loads the file named by `PACKED_CONFIG`, or returns the defaults if it is unset.
  pub fn from_env() -> Result<Self> {
    match std::env::var_os(CONFIG_ENV_VAR) {
      Some(path) => Self::from_file(path),
      None => Ok(Self::default()),
    }
  }
}
