//! The mutable, build-time representation of a container.

use crate::assembly::{build_assembly, Assembly, AssemblyHook};
use crate::component::{ComponentConfiguration, ComponentList, Lifetime};
use crate::config::BuildConfig;
use crate::core::{Factory, Instance, InjectionKey};
use crate::error::{Error, Result};
use crate::extension::{
  close_extension, instance_factory, Extension, ExtensionClose, ExtensionDescriptor, ExtensionEntry,
  ExtensionOrdering, ExtensionRef, ExtensionSet, ExtensionSetup,
};
use crate::image::{ContainerModel, FrozenExtension};
use crate::naming::{default_container_name, unique_name, validate_name, ContainerPath};
use crate::registry::ServiceRegistry;
use crate::wirelet::{Named, WireletList, Wirelets};
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Creates container configurations for an assembly.
///
/// A driver is immutable once built and cheap to clone. It carries the
/// extensions every container it creates starts with, and the
/// [`AssemblyHook`]s run around each build.
#[derive(Clone, Default)]
pub struct ContainerDriver {
  extensions: Vec<ExtensionRef>,
  hooks: Vec<Arc<dyn AssemblyHook>>,
}

impl ContainerDriver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Installs `E` (and its dependencies) into every container up front.
  pub fn with_extension<E: Extension>(mut self) -> Self {
    let extension = ExtensionRef::of::<E>();
    if !self.extensions.iter().any(|e| e.type_id == extension.type_id) {
      self.extensions.push(extension);
    }
    self
  }

  pub fn with_hook<H: AssemblyHook + 'static>(mut self, hook: H) -> Self {
    self.hooks.push(Arc::new(hook));
    self
  }

  pub(crate) fn hooks(&self) -> &[Arc<dyn AssemblyHook>] {
    &self.hooks
  }
}

/// Where a new container configuration is attached.
pub(crate) struct LinkSite {
  parent: Option<ContainerPath>,
  depth: usize,
  siblings: HashSet<String>,
}

impl LinkSite {
  pub(crate) fn root() -> Self {
    Self {
      parent: None,
      depth: 0,
      siblings: HashSet::new(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseState {
  Open,
  Closed,
  Failed,
}

/// A container node while its assembly is being built.
///
/// Everything here is single-threaded: a configuration is owned by the
/// thread running the build. Once closed it accepts no more user
/// configuration and is frozen into a [`ContainerModel`].
pub struct ContainerConfiguration {
  name: String,
  path: ContainerPath,
  depth: usize,
  siblings: HashSet<String>,
  configurable: bool,
  close_state: CloseState,
  config: Arc<BuildConfig>,
  wirelets: Wirelets,
  extensions: IndexMap<TypeId, ExtensionEntry>,
  components: ComponentList,
  children: Vec<ContainerModel>,
}

impl ContainerConfiguration {
  /// Creates a standalone root configuration, not tied to any assembly.
  pub fn root(driver: &ContainerDriver, wirelets: WireletList, config: BuildConfig) -> Result<Self> {
    Self::new(driver, LinkSite::root(), "Container", wirelets, Arc::new(config))
  }

  pub(crate) fn new(
    driver: &ContainerDriver,
    site: LinkSite,
    assembly_type: &'static str,
    wirelets: WireletList,
    config: Arc<BuildConfig>,
  ) -> Result<Self> {
    let wirelets = Wirelets::new(wirelets);
    let explicit = wirelets.consume_last::<Named>().map(|n| n.name().to_owned());
    let explicit = match (&site.parent, explicit) {
      (None, None) => config.root_name().map(str::to_owned),
      (_, explicit) => explicit,
    };

    let name = match explicit {
      Some(name) => {
        validate_name(&name).map_err(|reason| Error::InvalidName {
          name: name.clone(),
          reason,
        })?;
        if site.siblings.contains(&name) {
          return Err(Error::DuplicateName {
            path: site.parent.as_ref().map(|p| p.to_string()).unwrap_or_default(),
            name,
          });
        }
        name
      }
      None => unique_name(&default_container_name(assembly_type), |n| site.siblings.contains(n)),
    };
    let path = match &site.parent {
      Some(parent) => parent.child(&name),
      None => ContainerPath::root(),
    };

    let mut container = Self {
      name,
      path,
      depth: site.depth,
      siblings: site.siblings,
      configurable: true,
      close_state: CloseState::Open,
      config,
      wirelets,
      extensions: IndexMap::new(),
      components: ComponentList::default(),
      children: Vec::new(),
    };
    for extension in &driver.extensions {
      (extension.install)(&mut container)?;
    }
    Ok(container)
  }

  // --- PRIVATE HELPERS ---

  fn check_configurable(&self, action: &str) -> Result<()> {
    if self.configurable {
      return Ok(());
    }
    Err(Error::NotConfigurable {
      path: self.path.to_string(),
      action: action.to_owned(),
    })
  }

  fn install_extension<E: Extension>(&mut self) -> Result<()> {
    let descriptor = ExtensionDescriptor::of::<E>()?;
    for dependency in descriptor.dependency_refs() {
      if !self.extensions.contains_key(&dependency.type_id) {
        (dependency.install)(self)?;
      }
    }

    let setup = ExtensionSetup {
      descriptor: &descriptor,
      name: &self.name,
      path: &self.path,
      extensions: &self.extensions,
      wirelets: &self.wirelets,
    };
    let instance = E::new(&setup)?;
    trace!(extension = descriptor.simple_name(), path = %self.path, "Extension installed");

    self.extensions.insert(
      TypeId::of::<E>(),
      ExtensionEntry {
        descriptor,
        instance: Box::new(instance),
        close: close_extension::<E>,
      },
    );
    Ok(())
  }

  fn add_component<T: ?Sized + Any + Send + Sync>(
    &mut self,
    name: Option<&str>,
    lifetime: Lifetime,
    factory: Factory,
    action: &str,
  ) -> Result<ComponentConfiguration<'_, T>> {
    self.check_configurable(action)?;
    let key = InjectionKey::new::<T>(name);
    let model = self.components.insert(&self.path, key, lifetime, factory)?;
    trace!(component = %model.key(), name = model.name(), path = %self.path, "Component installed");
    Ok(ComponentConfiguration::new(model))
  }

  fn singleton_factory<T: Any + Send + Sync>(
    factory: impl Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
  ) -> Factory {
    Arc::new(move |registry: &ServiceRegistry| {
      factory(registry).map(|component| Box::new(Arc::new(component)) as Instance)
    })
  }

  // --- PUBLIC API ---

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn path(&self) -> &ContainerPath {
    &self.path
  }

  pub fn is_configurable(&self) -> bool {
    self.configurable
  }

  /// The wirelets this container was linked with.
  pub fn wirelets(&self) -> &Wirelets {
    &self.wirelets
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  /// Renames the container. Must happen before any child is linked.
  pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
    self.check_configurable("set the container name")?;
    let name = name.into();
    validate_name(&name).map_err(|reason| Error::InvalidName {
      name: name.clone(),
      reason,
    })?;
    if !self.children.is_empty() {
      return Err(Error::InvalidName {
        name,
        reason: "containers cannot be renamed after children have been linked",
      });
    }
    if self.siblings.contains(&name) {
      return Err(Error::DuplicateName {
        path: self.path.parent().to_string(),
        name,
      });
    }
    self.path.rename(&name);
    self.name = name;
    Ok(())
  }

  // --- Extensions ---

  /// Returns this container's instance of extension `E`, creating it (and
  /// its dependencies) on first use.
  ///
  /// Once the container is closed only extensions that are already
  /// installed are returned; anything else fails with
  /// [`Error::NotConfigurable`].
  pub fn use_extension<E: Extension>(&mut self) -> Result<&mut E> {
    let type_id = TypeId::of::<E>();
    if !self.extensions.contains_key(&type_id) {
      self.check_configurable(&format!("use extension {}", std::any::type_name::<E>()))?;
      self.install_extension::<E>()?;
    }
    self
      .extensions
      .get_mut(&type_id)
      .and_then(|entry| entry.instance.downcast_mut::<E>())
      .ok_or_else(|| {
        Error::Internal(format!(
          "extension {} missing right after installation",
          std::any::type_name::<E>()
        ))
      })
  }

  /// Returns extension `E` if it is installed. Never installs anything.
  pub fn extension<E: Extension>(&self) -> Option<&E> {
    self
      .extensions
      .get(&TypeId::of::<E>())
      .and_then(|entry| entry.instance.downcast_ref::<E>())
  }

  /// Simple names of the installed extensions, in installation order.
  pub fn extension_names(&self) -> Vec<&'static str> {
    self.extensions.values().map(|e| e.descriptor.simple_name()).collect()
  }

  // --- Component Installation ---

  pub fn install_instance<T: Any + Send + Sync>(&mut self, instance: T) -> Result<ComponentConfiguration<'_, T>> {
    self.add_component(None, Lifetime::Singleton, instance_factory(instance), "install an instance")
  }

  /// Installs `instance` under an explicit name. The name must be non-empty
  /// and free of `/`, and it takes precedence over generated names (see
  /// [`ComponentConfiguration::name`]).
  pub fn install_instance_with_name<T: Any + Send + Sync>(
    &mut self,
    name: &str,
    instance: T,
  ) -> Result<ComponentConfiguration<'_, T>> {
    self.add_component(Some(name), Lifetime::Singleton, instance_factory(instance), "install an instance")
  }

  /// Installs a component created once per app, on first request or when the app starts.
  pub fn install_singleton<T: Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
  ) -> Result<ComponentConfiguration<'_, T>> {
    self.add_component(None, Lifetime::Singleton, Self::singleton_factory(factory), "install a singleton")
  }

  pub fn install_singleton_with_name<T: Any + Send + Sync>(
    &mut self,
    name: &str,
    factory: impl Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
  ) -> Result<ComponentConfiguration<'_, T>> {
    self.add_component(Some(name), Lifetime::Singleton, Self::singleton_factory(factory), "install a singleton")
  }

  /// Installs a component resolved as the trait object `I`.
  pub fn install_singleton_trait<I: ?Sized + Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&ServiceRegistry) -> Result<Arc<I>> + Send + Sync + 'static,
  ) -> Result<ComponentConfiguration<'_, I>> {
    self.install_singleton_trait_internal(None, factory)
  }

  pub fn install_singleton_trait_with_name<I: ?Sized + Any + Send + Sync>(
    &mut self,
    name: &str,
    factory: impl Fn(&ServiceRegistry) -> Result<Arc<I>> + Send + Sync + 'static,
  ) -> Result<ComponentConfiguration<'_, I>> {
    self.install_singleton_trait_internal(Some(name), factory)
  }

  fn install_singleton_trait_internal<I: ?Sized + Any + Send + Sync>(
    &mut self,
    name: Option<&str>,
    factory: impl Fn(&ServiceRegistry) -> Result<Arc<I>> + Send + Sync + 'static,
  ) -> Result<ComponentConfiguration<'_, I>> {
    let factory: Factory = Arc::new(move |registry: &ServiceRegistry| {
      factory(registry).map(|component| Box::new(component) as Instance)
    });
    self.add_component(name, Lifetime::Singleton, factory, "install a singleton")
  }

  /// Installs a component created anew on every request.
  pub fn install_prototype<T: Any + Send + Sync>(
    &mut self,
    factory: impl Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
  ) -> Result<()> {
    self
      .add_component::<T>(None, Lifetime::Prototype, Self::singleton_factory(factory), "install a prototype")
      .map(|_| ())
  }

  pub fn install_prototype_with_name<T: Any + Send + Sync>(
    &mut self,
    name: &str,
    factory: impl Fn(&ServiceRegistry) -> Result<T> + Send + Sync + 'static,
  ) -> Result<()> {
    self
      .add_component::<T>(Some(name), Lifetime::Prototype, Self::singleton_factory(factory), "install a prototype")
      .map(|_| ())
  }

  // --- Linking ---

  /// Builds `assembly` into a new child container of this one.
  ///
  /// The child's `build` runs to completion, and the child is closed,
  /// before `link` returns.
  pub fn link<A: Assembly + ?Sized>(&mut self, assembly: &A, wirelets: WireletList) -> Result<&ContainerModel> {
    self.check_configurable("link an assembly")?;
    let depth = self.depth + 1;
    let max = self.config.max_depth();
    if depth > max {
      return Err(Error::LinkDepthExceeded { depth, max });
    }
    let site = LinkSite {
      parent: Some(self.path.clone()),
      depth,
      siblings: self.children.iter().map(|c| c.name().to_owned()).collect(),
    };
    let child = build_assembly(assembly, site, wirelets, Arc::clone(&self.config))?;
    self.children.push(child);
    self
      .children
      .last()
      .ok_or_else(|| Error::Internal(format!("linked child of {} missing right after linking", self.path)))
  }

  pub fn children(&self) -> &[ContainerModel] {
    &self.children
  }

  // --- Closing ---

  /// Closes the configuration: extensions get their `on_close` callback in
  /// [`ExtensionOrdering`] order, then unconsumed wirelets are checked.
  /// Closing an already closed container is a no-op.
  ///
  /// A failed close is final: every later `close` or
  /// [`into_model`](Self::into_model) returns [`Error::CloseFailed`].
  pub fn close(&mut self) -> Result<()> {
    match self.close_state {
      CloseState::Closed => return Ok(()),
      CloseState::Failed => {
        return Err(Error::CloseFailed {
          path: self.path.to_string(),
        })
      }
      CloseState::Open => {}
    }
    self.configurable = false;
    // Pessimistic until every step below has succeeded.
    self.close_state = CloseState::Failed;

    let mut order = ExtensionSet::new();
    for entry in self.extensions.values() {
      order.insert_descriptor(Arc::clone(&entry.descriptor));
    }
    for descriptor in order.iter() {
      let entry = self
        .extensions
        .get_mut(&ExtensionDescriptor::type_id(descriptor))
        .ok_or_else(|| Error::Internal(format!("extension {} vanished before close", descriptor.type_name())))?;
      let mut close = ExtensionClose {
        name: &self.name,
        path: &self.path,
        wirelets: &self.wirelets,
        components: &mut self.components,
      };
      (entry.close)(entry.instance.as_mut(), &mut close)?;
    }

    self
      .wirelets
      .check_consumed(&self.path, self.config.fail_on_unconsumed_wirelets())?;
    self.close_state = CloseState::Closed;
    debug!(path = %self.path, extensions = ?order.simple_names(), "Container closed");
    Ok(())
  }

  /// Closes the configuration if needed and freezes it.
  pub fn into_model(mut self) -> Result<ContainerModel> {
    self.close()?;
    let mut extensions: Vec<ExtensionEntry> = self.extensions.into_values().collect();
    extensions.sort_by(|a, b| ExtensionOrdering::compare(&a.descriptor, &b.descriptor));
    let extensions = extensions
      .into_iter()
      .map(|entry| FrozenExtension {
        descriptor: entry.descriptor,
        instance: entry.instance,
      })
      .collect();
    Ok(ContainerModel {
      name: self.name,
      path: self.path,
      components: self.components.into_vec(),
      extensions,
      children: self.children,
    })
  }
}
