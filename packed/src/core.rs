//! Core, non-public data structures shared by the build and runtime halves.

use crate::error::{Error, Result};
use crate::registry::ServiceRegistry;
use crate::naming::simple_type_name;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

thread_local! {
  // Components currently being resolved on this thread. A key that shows up
  // twice means a factory (transitively) asked for itself.
  static RESOLVING_COMPONENTS: RefCell<HashSet<InjectionKey>> = RefCell::new(HashSet::new());

  // Extension types whose descriptors are being computed on this thread, in
  // the order they were entered, so a cycle can be reported as a path.
  static RESOLVING_EXTENSIONS: RefCell<Vec<(TypeId, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// An RAII guard to detect circular dependencies between components.
///
/// When created, it adds a key to the thread-local resolution set and fails
/// if the key is already present. Dropping the guard removes the key.
pub(crate) struct ResolutionGuard {
  key: InjectionKey,
}

impl ResolutionGuard {
  pub(crate) fn enter(key: &InjectionKey) -> Result<Self> {
    RESOLVING_COMPONENTS.with(|stack| {
      // `insert` returns `false` if the value was already present.
      if !stack.borrow_mut().insert(key.clone()) {
        return Err(Error::CircularDependency {
          key: key.to_string(),
        });
      }
      Ok(Self { key: key.clone() })
    })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLVING_COMPONENTS.with(|stack| {
      stack.borrow_mut().remove(&self.key);
    });
  }
}

/// The extension counterpart of [`ResolutionGuard`], used while descriptors
/// are computed. Keeps entry order so the cycle can be named.
pub(crate) struct DescriptorGuard {
  type_id: TypeId,
}

impl DescriptorGuard {
  pub(crate) fn enter(type_id: TypeId, type_name: &'static str) -> Result<Self> {
    RESOLVING_EXTENSIONS.with(|stack| {
      let mut stack = stack.borrow_mut();
      if let Some(start) = stack.iter().position(|(id, _)| *id == type_id) {
        let mut path: Vec<&'static str> = stack[start..]
          .iter()
          .map(|(_, name)| simple_type_name(name))
          .collect();
        path.push(simple_type_name(type_name));
        return Err(Error::ExtensionCycle { path });
      }
      stack.push((type_id, type_name));
      Ok(Self { type_id })
    })
  }
}

impl Drop for DescriptorGuard {
  fn drop(&mut self) {
    RESOLVING_EXTENSIONS.with(|stack| {
      let mut stack = stack.borrow_mut();
      if let Some(index) = stack.iter().rposition(|(id, _)| *id == self.type_id) {
        stack.remove(index);
      }
    });
  }
}

/// Identifies a component: its (possibly unsized) type plus an optional name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InjectionKey {
  pub(crate) type_id: TypeId,
  pub(crate) type_name: &'static str,
  pub(crate) name: Option<String>,
}

impl InjectionKey {
  pub(crate) fn new<T: ?Sized + Any>(name: Option<&str>) -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: std::any::type_name::<T>(),
      name: name.map(str::to_owned),
    }
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }
}

impl fmt::Display for InjectionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "{} (named '{}')", self.type_name, name),
      None => f.write_str(self.type_name),
    }
  }
}

impl fmt::Debug for InjectionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "Key({}, Name({}))", self.type_name, name),
      None => write!(f, "Key({})", self.type_name),
    }
  }
}

/// A type-erased component. Always holds an `Arc<T>` for the component type `T`.
pub(crate) type Instance = Box<dyn Any + Send + Sync>;

pub(crate) type Factory = Arc<dyn Fn(&ServiceRegistry) -> Result<Instance> + Send + Sync>;

pub(crate) enum Provider {
  Singleton {
    cell: once_cell::sync::OnceCell<Instance>,
    factory: Factory,
  },
  Prototype {
    factory: Factory,
  },
}

impl Provider {
  /// Returns the shared instance, creating it on first use. `None` for prototypes.
  pub(crate) fn singleton(&self, owner: &ServiceRegistry) -> Option<Result<&Instance>> {
    match self {
      Provider::Singleton { cell, factory } => Some(cell.get_or_try_init(|| factory(owner))),
      Provider::Prototype { .. } => None,
    }
  }

  pub(crate) fn prototype(&self, owner: &ServiceRegistry) -> Option<Result<Instance>> {
    match self {
      Provider::Prototype { factory } => Some(factory(owner)),
      Provider::Singleton { .. } => None,
    }
  }
}
