use super::raw::BuildConfigRaw;
use crate::error::Error;
use crate::naming::validate_name;

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Validated settings for building images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
  max_depth: usize,
  fail_on_unconsumed_wirelets: bool,
  root_name: Option<String>,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      max_depth: DEFAULT_MAX_DEPTH,
      fail_on_unconsumed_wirelets: true,
      root_name: None,
    }
  }
}

impl BuildConfig {
  pub fn max_depth(&self) -> usize {
    self.max_depth
  }

  pub fn fail_on_unconsumed_wirelets(&self) -> bool {
    self.fail_on_unconsumed_wirelets
  }

  pub fn root_name(&self) -> Option<&str> {
    self.root_name.as_deref()
  }

  pub fn with_max_depth(mut self, max_depth: usize) -> Result<Self, Error> {
    if max_depth == 0 {
      return Err(invalid("max_depth", "must be at least 1"));
    }
    self.max_depth = max_depth;
    Ok(self)
  }

  pub fn with_fail_on_unconsumed_wirelets(mut self, fail: bool) -> Self {
    self.fail_on_unconsumed_wirelets = fail;
    self
  }

  pub fn with_root_name(mut self, name: impl Into<String>) -> Result<Self, Error> {
    let name = name.into();
    validate_name(&name).map_err(|reason| invalid("root_name", reason))?;
    self.root_name = Some(name);
    Ok(self)
  }
}

fn invalid(field: &str, message: &str) -> Error {
  Error::InvalidConfigValue {
    field: field.to_owned(),
    message: message.to_owned(),
  }
}

impl TryFrom<BuildConfigRaw> for BuildConfig {
  type Error = Error;

  fn try_from(raw: BuildConfigRaw) -> Result<Self, Self::Error> {
    let mut config = BuildConfig::default();
    if let Some(max_depth) = raw.max_depth {
      config = config.with_max_depth(max_depth)?;
    }
    if let Some(fail) = raw.fail_on_unconsumed_wirelets {
      config = config.with_fail_on_unconsumed_wirelets(fail);
    }
    if let Some(name) = raw.root_name {
      config = config.with_root_name(name)?;
    }
    Ok(config)
  }
}
