use crate::runtime::LifecycleState;
use thiserror::Error;

/// A boxed error raised by user code (assembly builds, component factories, hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for the `packed` library.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Assembly '{assembly}' has already been used")]
  AlreadyUsed { assembly: &'static str },

  #[error("Assembly '{assembly}' is currently being built elsewhere")]
  InUseElsewhere { assembly: &'static str },

  #[error("Container '{path}' is no longer configurable, cannot {action}")]
  NotConfigurable { path: String, action: String },

  #[error("Extension '{requested}' is not available to '{requester}', it must be declared as a dependency")]
  ExtensionNotAvailable {
    requester: &'static str,
    requested: &'static str,
  },

  #[error("Extension dependency cycle detected: {}", .path.join(" -> "))]
  ExtensionCycle { path: Vec<&'static str> },

  #[error("Invalid name '{name}': {reason}")]
  InvalidName { name: String, reason: &'static str },

  #[error("Name '{name}' is already in use in container '{path}'")]
  DuplicateName { path: String, name: String },

  #[error("Component '{key}' is already installed in container '{path}'")]
  DuplicateComponent { path: String, key: String },

  #[error("No component registered for '{key}'")]
  ComponentNotFound { key: String },

  #[error("Circular dependency detected while resolving component: {key}")]
  CircularDependency { key: String },

  #[error("Wirelet {wirelet} was not consumed by container '{path}'")]
  UnconsumedWirelet { path: String, wirelet: String },

  #[error("Container '{path}' failed to close and cannot be closed again")]
  CloseFailed { path: String },

  #[error("Link depth {depth} exceeds the configured maximum of {max}")]
  LinkDepthExceeded { depth: usize, max: usize },

  #[error("Cannot {action} an app in state {state:?}")]
  InvalidLifecycle {
    action: &'static str,
    state: LifecycleState,
  },

  #[error("Configuration file not found: {0}")]
  ConfigNotFound(String),

  #[error("Failed to read configuration file: {0}")]
  ConfigRead(#[from] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },

  #[error("Internal extension error: {0}")]
  Internal(String),

  #[error("{0}")]
  Custom(#[source] BoxError),
}

impl Error {
  /// Wraps an arbitrary user error, typically raised from `Assembly::build`
  /// or a component factory.
  pub fn custom<E: Into<BoxError>>(err: E) -> Self {
    Error::Custom(err.into())
  }
}

/// A specialized `Result` type for `packed` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
