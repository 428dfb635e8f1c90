//! The runtime registry an app uses to hand out component instances.

use crate::component::{ComponentModel, Lifetime};
use crate::core::{InjectionKey, Provider, ResolutionGuard};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// Holds the providers of one container instance.
///
/// It is thread-safe: singletons are created lazily, exactly once, even when
/// several threads request them at the same time. Lookups that miss fall
/// back to the registry of the parent container.
#[derive(Default)]
pub struct ServiceRegistry {
  providers: DashMap<InjectionKey, Arc<Provider>>,
  parent: Option<Arc<ServiceRegistry>>,
}

impl ServiceRegistry {
  /// Creates a registry holding fresh providers for `components`.
  pub(crate) fn from_components(
    components: &[ComponentModel],
    parent: Option<Arc<ServiceRegistry>>,
  ) -> Self {
    let providers = DashMap::with_capacity(components.len());
    for component in components {
      let factory = Arc::clone(&component.factory);
      let provider = match component.lifetime {
        Lifetime::Singleton => Provider::Singleton {
          cell: once_cell::sync::OnceCell::new(),
          factory,
        },
        Lifetime::Prototype => Provider::Prototype { factory },
      };
      providers.insert(component.key.clone(), Arc::new(provider));
    }
    Self { providers, parent }
  }

  // --- PRIVATE HELPERS ---

  // Finds the provider for `key` together with the registry that owns it,
  // so factories resolve their own dependencies from the right scope.
  // The map guard is released before any factory runs.
  fn lookup(&self, key: &InjectionKey) -> Option<(&ServiceRegistry, Arc<Provider>)> {
    if let Some(provider) = self.providers.get(key).map(|p| Arc::clone(p.value())) {
      return Some((self, provider));
    }
    self.parent.as_deref()?.lookup(key)
  }

  fn not_found(key: &InjectionKey) -> Error {
    Error::ComponentNotFound {
      key: key.to_string(),
    }
  }

  fn type_mismatch(key: &InjectionKey) -> Error {
    Error::Internal(format!("stored instance for {} has an unexpected type", key))
  }

  // --- PUBLIC API ---

  /// Returns `true` if this registry or one of its ancestors can provide the component.
  pub fn contains<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> bool {
    self.lookup(&InjectionKey::new::<T>(name)).is_some()
  }

  /// Resolves a component.
  ///
  /// Fails if nothing provides it, if its factory fails, or if resolving it
  /// requires resolving itself.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> Result<Arc<T>> {
    let key = InjectionKey::new::<T>(name);
    let (owner, provider) = self.lookup(&key).ok_or_else(|| Self::not_found(&key))?;

    // Its destructor will clean up the stack automatically when `get` returns.
    let _guard = ResolutionGuard::enter(&key)?;

    if let Some(instance) = provider.singleton(owner) {
      return instance?
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| Self::type_mismatch(&key));
    }
    match provider.prototype(owner) {
      Some(instance) => instance?
        .downcast::<Arc<T>>()
        .map(|arc_in_a_box| *arc_in_a_box)
        .map_err(|_| Self::type_mismatch(&key)),
      None => Err(Self::type_mismatch(&key)),
    }
  }

  /// Creates the singleton registered locally under `key` (if needed) and
  /// hands the erased instance to `f`.
  pub(crate) fn with_singleton<R>(
    &self,
    key: &InjectionKey,
    f: impl FnOnce(&(dyn Any + Send + Sync)) -> Result<R>,
  ) -> Result<R> {
    let provider = self
      .providers
      .get(key)
      .map(|p| Arc::clone(p.value()))
      .ok_or_else(|| Self::not_found(key))?;
    let instance = {
      let _guard = ResolutionGuard::enter(key)?;
      match provider.singleton(self) {
        Some(instance) => instance?,
        None => return Err(Error::Internal(format!("{} is not a singleton", key))),
      }
    };
    trace!(component = %key, "Singleton available");
    f(&**instance)
  }
}
