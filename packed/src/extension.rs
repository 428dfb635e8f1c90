//! Extensions: per-container singletons that add cross-cutting behaviour to
//! the build, and the machinery that orders them by their dependencies.

use crate::component::{ComponentConfiguration, ComponentList, Lifetime};
use crate::container::ContainerConfiguration;
use crate::core::{DescriptorGuard, Factory, Instance, InjectionKey};
use crate::error::{Error, Result};
use crate::global::descriptors;
use crate::naming::{simple_type_name, ContainerPath};
use crate::wirelet::Wirelets;
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A capability installed into a container configuration.
///
/// At most one instance of a given extension type exists per container. It
/// is created the first time someone asks for it, after every extension it
/// declares in [`Extension::dependencies`] has been created.
pub trait Extension: Any + Send + Sync + Sized {
  /// Declares the extensions this one depends on.
  fn dependencies(_deps: &mut Dependencies) {}

  /// Creates the extension for the container described by `setup`.
  fn new(setup: &ExtensionSetup<'_>) -> Result<Self>;

  /// Called once, when the container closes. Dependencies are closed first.
  fn on_close(&mut self, _close: &mut ExtensionClose<'_>) -> Result<()> {
    Ok(())
  }
}

/// Type-erased handle on an extension type: enough to describe it and to
/// install it into a container without knowing the type statically.
#[derive(Clone, Copy)]
pub(crate) struct ExtensionRef {
  pub(crate) type_id: TypeId,
  pub(crate) type_name: &'static str,
  pub(crate) descriptor: fn() -> Result<Arc<ExtensionDescriptor>>,
  pub(crate) install: fn(&mut ContainerConfiguration) -> Result<()>,
}

impl ExtensionRef {
  pub(crate) fn of<E: Extension>() -> Self {
    Self {
      type_id: TypeId::of::<E>(),
      type_name: std::any::type_name::<E>(),
      descriptor: ExtensionDescriptor::of::<E>,
      install: install_extension::<E>,
    }
  }
}

fn install_extension<E: Extension>(container: &mut ContainerConfiguration) -> Result<()> {
  container.use_extension::<E>().map(|_| ())
}

/// The dependency declarations of an extension type.
#[derive(Default)]
pub struct Dependencies {
  entries: Vec<ExtensionRef>,
}

impl Dependencies {
  /// Declares a dependency on extension `D`. Declaring it twice has no effect.
  pub fn extension<D: Extension>(&mut self) -> &mut Self {
    let dependency = ExtensionRef::of::<D>();
    if !self.entries.iter().any(|e| e.type_id == dependency.type_id) {
      self.entries.push(dependency);
    }
    self
  }
}

/// Immutable facts about an extension type, computed once per type.
pub struct ExtensionDescriptor {
  type_id: TypeId,
  type_name: &'static str,
  simple_name: &'static str,
  dependencies: Vec<ExtensionRef>,
  depth: usize,
}

impl ExtensionDescriptor {
  /// Returns the (cached) descriptor of extension type `E`.
  ///
  /// Fails with [`Error::ExtensionCycle`] if `E` depends on itself, directly
  /// or through other extensions.
  pub fn of<E: Extension>() -> Result<Arc<ExtensionDescriptor>> {
    descriptors().get_or_compute(TypeId::of::<E>(), Self::compute::<E>)
  }

  fn compute<E: Extension>() -> Result<ExtensionDescriptor> {
    let type_id = TypeId::of::<E>();
    let type_name = std::any::type_name::<E>();
    let _guard = DescriptorGuard::enter(type_id, type_name)?;

    let mut deps = Dependencies::default();
    E::dependencies(&mut deps);

    let mut depth = 0;
    for dependency in &deps.entries {
      let descriptor = (dependency.descriptor)()?;
      depth = depth.max(descriptor.depth + 1);
    }
    Ok(ExtensionDescriptor {
      type_id,
      type_name,
      simple_name: simple_type_name(type_name),
      dependencies: deps.entries,
      depth,
    })
  }

  pub fn type_id(&self) -> TypeId {
    self.type_id
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn simple_name(&self) -> &'static str {
    self.simple_name
  }

  /// 0 for extensions without dependencies, otherwise one more than the
  /// deepest dependency.
  pub fn depth(&self) -> usize {
    self.depth
  }

  /// The full type names of the direct dependencies, in declaration order.
  pub fn dependencies(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.dependencies.iter().map(|d| d.type_name)
  }

  pub fn depends_on(&self, type_id: TypeId) -> bool {
    self.dependencies.iter().any(|d| d.type_id == type_id)
  }

  pub(crate) fn dependency_refs(&self) -> &[ExtensionRef] {
    &self.dependencies
  }
}

impl fmt::Debug for ExtensionDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExtensionDescriptor")
      .field("type", &self.type_name)
      .field("depth", &self.depth)
      .field("dependencies", &self.dependencies().collect::<Vec<_>>())
      .finish()
  }
}

/// The total order extensions are processed in.
///
/// Shallower extensions come first, ties are broken by simple name and then
/// by full type name. Since a dependency is always shallower than its
/// dependents, dependencies always come first.
pub struct ExtensionOrdering;

impl ExtensionOrdering {
  pub fn compare(a: &ExtensionDescriptor, b: &ExtensionDescriptor) -> Ordering {
    a.depth
      .cmp(&b.depth)
      .then_with(|| a.simple_name.cmp(b.simple_name))
      .then_with(|| a.type_name.cmp(b.type_name))
  }

  pub fn sort(descriptors: &mut [Arc<ExtensionDescriptor>]) {
    descriptors.sort_by(|a, b| Self::compare(a, b));
  }
}

/// A set of extension types, always iterated in [`ExtensionOrdering`] order.
#[derive(Clone, Default)]
pub struct ExtensionSet {
  descriptors: Vec<Arc<ExtensionDescriptor>>,
}

impl ExtensionSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds `E`. Returns `false` if it was already present.
  pub fn insert<E: Extension>(&mut self) -> Result<bool> {
    Ok(self.insert_descriptor(ExtensionDescriptor::of::<E>()?))
  }

  pub fn insert_descriptor(&mut self, descriptor: Arc<ExtensionDescriptor>) -> bool {
    if self.contains_type(descriptor.type_id) {
      return false;
    }
    let at = self
      .descriptors
      .partition_point(|d| ExtensionOrdering::compare(d, &descriptor) == Ordering::Less);
    self.descriptors.insert(at, descriptor);
    true
  }

  pub fn contains<E: Extension>(&self) -> bool {
    self.contains_type(TypeId::of::<E>())
  }

  fn contains_type(&self, type_id: TypeId) -> bool {
    self.descriptors.iter().any(|d| d.type_id == type_id)
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<ExtensionDescriptor>> {
    self.descriptors.iter()
  }

  pub fn simple_names(&self) -> Vec<&'static str> {
    self.descriptors.iter().map(|d| d.simple_name).collect()
  }
}

pub(crate) type CloseFn = fn(&mut (dyn Any + Send + Sync), &mut ExtensionClose<'_>) -> Result<()>;

/// An installed extension inside a container configuration.
pub(crate) struct ExtensionEntry {
  pub(crate) descriptor: Arc<ExtensionDescriptor>,
  pub(crate) instance: Instance,
  pub(crate) close: CloseFn,
}

pub(crate) fn close_extension<E: Extension>(
  instance: &mut (dyn Any + Send + Sync),
  close: &mut ExtensionClose<'_>,
) -> Result<()> {
  match instance.downcast_mut::<E>() {
    Some(extension) => extension.on_close(close),
    None => Err(Error::Internal(format!(
      "installed instance is not a {}",
      std::any::type_name::<E>()
    ))),
  }
}

/// What an extension sees while it is being created.
pub struct ExtensionSetup<'a> {
  pub(crate) descriptor: &'a ExtensionDescriptor,
  pub(crate) name: &'a str,
  pub(crate) path: &'a ContainerPath,
  pub(crate) extensions: &'a IndexMap<TypeId, ExtensionEntry>,
  pub(crate) wirelets: &'a Wirelets,
}

impl<'a> ExtensionSetup<'a> {
  pub fn container_name(&self) -> &'a str {
    self.name
  }

  pub fn path(&self) -> &'a ContainerPath {
    self.path
  }

  pub fn descriptor(&self) -> &'a ExtensionDescriptor {
    self.descriptor
  }

  /// The wirelets the container was linked with.
  pub fn wirelets(&self) -> &'a Wirelets {
    self.wirelets
  }

  /// Returns a declared dependency. It is guaranteed to exist already.
  pub fn dependency<D: Extension>(&self) -> Result<&'a D> {
    if !self.descriptor.depends_on(TypeId::of::<D>()) {
      return Err(Error::ExtensionNotAvailable {
        requester: self.descriptor.type_name,
        requested: std::any::type_name::<D>(),
      });
    }
    self
      .extensions
      .get(&TypeId::of::<D>())
      .and_then(|entry| entry.instance.downcast_ref::<D>())
      .ok_or_else(|| {
        Error::Internal(format!(
          "dependency {} of {} was not installed before it",
          std::any::type_name::<D>(),
          self.descriptor.type_name
        ))
      })
  }
}

/// What an extension sees when its container closes.
///
/// The container no longer accepts user configuration at this point, but
/// extensions may still contribute components.
pub struct ExtensionClose<'a> {
  pub(crate) name: &'a str,
  pub(crate) path: &'a ContainerPath,
  pub(crate) wirelets: &'a Wirelets,
  pub(crate) components: &'a mut ComponentList,
}

impl<'a> ExtensionClose<'a> {
  pub fn container_name(&self) -> &str {
    self.name
  }

  pub fn path(&self) -> &ContainerPath {
    self.path
  }

  pub fn wirelets(&self) -> &Wirelets {
    self.wirelets
  }

  pub fn install_instance<T: Any + Send + Sync>(
    &mut self,
    instance: T,
  ) -> Result<ComponentConfiguration<'_, T>> {
    self.install_instance_internal(None, instance)
  }

  pub fn install_instance_with_name<T: Any + Send + Sync>(
    &mut self,
    name: &str,
    instance: T,
  ) -> Result<ComponentConfiguration<'_, T>> {
    self.install_instance_internal(Some(name), instance)
  }

  fn install_instance_internal<T: Any + Send + Sync>(
    &mut self,
    name: Option<&str>,
    instance: T,
  ) -> Result<ComponentConfiguration<'_, T>> {
    let key = InjectionKey::new::<T>(name);
    let model = self
      .components
      .insert(self.path, key, Lifetime::Singleton, instance_factory(instance))?;
    Ok(ComponentConfiguration::new(model))
  }
}

/// A factory that hands out clones of one shared instance.
pub(crate) fn instance_factory<T: Any + Send + Sync>(instance: T) -> Factory {
  let shared = Arc::new(instance);
  Arc::new(move |_: &crate::registry::ServiceRegistry| Ok(Box::new(Arc::clone(&shared)) as Instance))
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Leaf;
  struct Middle;
  struct Top;

  impl Extension for Leaf {
    fn new(_: &ExtensionSetup<'_>) -> Result<Self> {
      Ok(Leaf)
    }
  }
  impl Extension for Middle {
    fn dependencies(deps: &mut Dependencies) {
      deps.extension::<Leaf>();
    }
    fn new(_: &ExtensionSetup<'_>) -> Result<Self> {
      Ok(Middle)
    }
  }
  impl Extension for Top {
    fn dependencies(deps: &mut Dependencies) {
      deps.extension::<Middle>().extension::<Leaf>();
    }
    fn new(_: &ExtensionSetup<'_>) -> Result<Self> {
      Ok(Top)
    }
  }

  #[test]
  fn depth_follows_the_longest_dependency_chain() {
    assert_eq!(ExtensionDescriptor::of::<Leaf>().unwrap().depth(), 0);
    assert_eq!(ExtensionDescriptor::of::<Middle>().unwrap().depth(), 1);
    assert_eq!(ExtensionDescriptor::of::<Top>().unwrap().depth(), 2);
  }

  #[test]
  fn set_orders_dependencies_first_regardless_of_insertion_order() {
    let mut set = ExtensionSet::new();
    assert!(set.insert::<Top>().unwrap());
    assert!(set.insert::<Leaf>().unwrap());
    assert!(set.insert::<Middle>().unwrap());
    assert!(!set.insert::<Leaf>().unwrap());
    assert_eq!(set.simple_names(), vec!["Leaf", "Middle", "Top"]);
  }

  #[test]
  fn descriptors_are_cached() {
    let a = ExtensionDescriptor::of::<Middle>().unwrap();
    let b = ExtensionDescriptor::of::<Middle>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
  }
}
