//! Build-time component configurations and their frozen models.

use crate::core::{Factory, InjectionKey};
use crate::error::{Error, Result};
use crate::naming::{simple_type_name, unique_name, validate_name, ContainerPath};
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

pub(crate) type Hook = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<()> + Send + Sync>;

/// How a component's instances are shared at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
  /// One instance per app, created on first request or when the app starts.
  Singleton,
  /// A new instance on every request.
  Prototype,
}

/// A frozen component: everything an app needs to provide it.
#[derive(Clone)]
pub struct ComponentModel {
  pub(crate) key: InjectionKey,
  pub(crate) name: String,
  pub(crate) lifetime: Lifetime,
  pub(crate) factory: Factory,
  pub(crate) on_start: Vec<Hook>,
  pub(crate) on_stop: Vec<Hook>,
  generated: bool,
}

impl ComponentModel {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn key(&self) -> &InjectionKey {
    &self.key
  }

  pub fn lifetime(&self) -> Lifetime {
    self.lifetime
  }
}

impl fmt::Debug for ComponentModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ComponentModel")
      .field("name", &self.name)
      .field("key", &self.key)
      .field("lifetime", &self.lifetime)
      .field("on_start", &self.on_start.len())
      .field("on_stop", &self.on_stop.len())
      .finish()
  }
}

/// Returned by the `install_*` methods of a container configuration.
///
/// Attaches lifecycle callbacks to the component just installed. Callbacks
/// run against the app's shared instance, so only singletons carry them.
pub struct ComponentConfiguration<'c, T: ?Sized> {
  model: &'c mut ComponentModel,
  _marker: PhantomData<fn(Arc<T>)>,
}

impl<'c, T: ?Sized + Any + Send + Sync> ComponentConfiguration<'c, T> {
  pub(crate) fn new(model: &'c mut ComponentModel) -> Self {
    Self {
      model,
      _marker: PhantomData,
    }
  }

  /// The name the component ended up with, generated if none was given.
  ///
  /// Generated names yield to explicit ones: installing a component under
  /// an explicit name held by a generated one renames the earlier
  /// component to the next free suffix.
  pub fn name(&self) -> &str {
    &self.model.name
  }

  /// Runs `hook` when the app starts, after every component has been created.
  pub fn on_start(self, hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
    self.model.on_start.push(erase_hook::<T>(&self.model.key, hook));
    self
  }

  /// Runs `hook` when the app stops. Stop hooks run in reverse install order.
  pub fn on_stop(self, hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
    self.model.on_stop.push(erase_hook::<T>(&self.model.key, hook));
    self
  }
}

fn erase_hook<T: ?Sized + Any + Send + Sync>(
  key: &InjectionKey,
  hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
) -> Hook {
  let key = key.clone();
  Arc::new(move |instance: &(dyn Any + Send + Sync)| match instance.downcast_ref::<Arc<T>>() {
    Some(component) => hook(&**component),
    None => Err(Error::Internal(format!(
      "lifecycle hook for {} received an instance of another type",
      key
    ))),
  })
}

/// The insertion-ordered components of one container under construction.
#[derive(Default)]
pub(crate) struct ComponentList {
  entries: IndexMap<InjectionKey, ComponentModel>,
}

impl ComponentList {
  pub(crate) fn insert(
    &mut self,
    path: &ContainerPath,
    key: InjectionKey,
    lifetime: Lifetime,
    factory: Factory,
  ) -> Result<&mut ComponentModel> {
    if self.entries.contains_key(&key) {
      return Err(Error::DuplicateComponent {
        path: path.to_string(),
        key: key.to_string(),
      });
    }
    let (name, generated) = match key.name() {
      Some(explicit) => {
        validate_name(explicit).map_err(|reason| Error::InvalidName {
          name: explicit.to_owned(),
          reason,
        })?;
        self.displace_generated(path, explicit)?;
        (explicit.to_owned(), false)
      }
      None => (unique_name(simple_type_name(key.type_name()), |n| self.is_taken(n)), true),
    };
    let model = ComponentModel {
      key: key.clone(),
      name,
      lifetime,
      factory,
      on_start: Vec::new(),
      on_stop: Vec::new(),
      generated,
    };
    Ok(self.entries.entry(key).or_insert(model))
  }

  /// Frees `explicit` for a new component. Fails if it was chosen explicitly.
  fn displace_generated(&mut self, path: &ContainerPath, explicit: &str) -> Result<()> {
    let Some(index) = self.entries.values().position(|c| c.name == explicit) else {
      return Ok(());
    };
    let holder = &self.entries[index];
    if !holder.generated {
      return Err(Error::DuplicateName {
        path: path.to_string(),
        name: explicit.to_owned(),
      });
    }
    let renamed = unique_name(simple_type_name(holder.key.type_name()), |n| {
      n == explicit || self.is_taken(n)
    });
    trace!(component = %holder.key, from = explicit, to = %renamed, path = %path, "Generated name displaced");
    self.entries[index].name = renamed;
    Ok(())
  }

  pub(crate) fn is_taken(&self, name: &str) -> bool {
    self.entries.values().any(|c| c.name == name)
  }

  pub(crate) fn into_vec(self) -> Vec<ComponentModel> {
    self.entries.into_values().collect()
  }
}
