//! Apps instantiated from images, and their lifecycle.

use crate::assembly::Assembly;
use crate::component::{ComponentModel, Lifetime};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::image::{ArtifactImage, ContainerModel};
use crate::naming::ContainerPath;
use crate::registry::ServiceRegistry;
use crate::wirelet::{Named, WireletList, Wirelets};
use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an [`App`] is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
  Initialized = 0,
  Starting = 1,
  Running = 2,
  Stopping = 3,
  Stopped = 4,
  /// Starting failed. Terminal.
  Failed = 5,
}

impl LifecycleState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => LifecycleState::Initialized,
      1 => LifecycleState::Starting,
      2 => LifecycleState::Running,
      3 => LifecycleState::Stopping,
      4 => LifecycleState::Stopped,
      _ => LifecycleState::Failed,
    }
  }
}

/// The runtime counterpart of a [`ContainerModel`].
pub struct ContainerInstance {
  name: String,
  path: ContainerPath,
  registry: Arc<ServiceRegistry>,
  components: Vec<ComponentModel>,
  children: Vec<ContainerInstance>,
}

impl ContainerInstance {
  fn new(model: &ContainerModel, parent: Option<Arc<ServiceRegistry>>) -> Self {
    let registry = Arc::new(ServiceRegistry::from_components(model.components(), parent));
    let children = model
      .children()
      .iter()
      .map(|child| ContainerInstance::new(child, Some(Arc::clone(&registry))))
      .collect();
    Self {
      name: model.name().to_owned(),
      path: model.path().clone(),
      registry,
      components: model.components().to_vec(),
      children,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn path(&self) -> &ContainerPath {
    &self.path
  }

  pub fn registry(&self) -> &ServiceRegistry {
    &self.registry
  }

  pub fn children(&self) -> &[ContainerInstance] {
    &self.children
  }

  /// Resolves a component from this container, falling back to its ancestors.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> Result<Arc<T>> {
    self.registry.get::<T>(name)
  }

  fn find(&self, path: &str) -> Option<&ContainerInstance> {
    path
      .split('/')
      .filter(|segment| !segment.is_empty())
      .try_fold(self, |container, segment| {
        container.children.iter().find(|c| c.name == segment)
      })
  }

  // Every singleton in the tree, parents before children, in install order.
  fn singletons(&self) -> Vec<(&ServiceRegistry, &ComponentModel)> {
    let mut out = Vec::new();
    self.collect_singletons(&mut out);
    out
  }

  fn collect_singletons<'a>(&'a self, out: &mut Vec<(&'a ServiceRegistry, &'a ComponentModel)>) {
    for component in &self.components {
      if component.lifetime() == Lifetime::Singleton {
        out.push((self.registry.as_ref(), component));
      }
    }
    for child in &self.children {
      child.collect_singletons(out);
    }
  }
}

/// A running (or runnable) application.
///
/// Every app owns fresh providers: singletons are not shared between two
/// apps instantiated from the same image, except for installed instances.
pub struct App {
  name: String,
  root: ContainerInstance,
  state: AtomicU8,
}

impl App {
  /// Builds `assembly` into an image, instantiates it and starts it.
  pub fn run<A: Assembly + ?Sized>(assembly: &A, wirelets: WireletList) -> Result<App> {
    let app = ArtifactImage::of(assembly, wirelets)?.instantiate(WireletList::new())?;
    app.start()?;
    Ok(app)
  }

  pub(crate) fn from_image(root: &ContainerModel, config: &BuildConfig, wirelets: WireletList) -> Result<App> {
    let wirelets = Wirelets::new(wirelets);
    let name = wirelets
      .consume_last::<Named>()
      .map(|n| n.name().to_owned())
      .unwrap_or_else(|| root.name().to_owned());
    wirelets.check_consumed(root.path(), config.fail_on_unconsumed_wirelets())?;

    let app = App {
      name,
      root: ContainerInstance::new(root, None),
      state: AtomicU8::new(LifecycleState::Initialized as u8),
    };
    info!(app = %app.name, "App instantiated");
    Ok(app)
  }

  // --- PRIVATE HELPERS ---

  fn transition(&self, from: LifecycleState, to: LifecycleState, action: &'static str) -> Result<()> {
    self
      .state
      .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .map(|_| ())
      .map_err(|actual| Error::InvalidLifecycle {
        action,
        state: LifecycleState::from_u8(actual),
      })
  }

  fn set_state(&self, state: LifecycleState) {
    self.state.store(state as u8, Ordering::Release);
  }

  fn start_components(&self) -> Result<()> {
    let singletons = self.root.singletons();
    for (registry, component) in &singletons {
      registry.with_singleton(component.key(), |_| Ok(()))?;
    }
    for (registry, component) in &singletons {
      for hook in &component.on_start {
        registry.with_singleton(component.key(), |instance| hook(instance))?;
      }
    }
    Ok(())
  }

  // --- PUBLIC API ---

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn state(&self) -> LifecycleState {
    LifecycleState::from_u8(self.state.load(Ordering::Acquire))
  }

  pub fn root(&self) -> &ContainerInstance {
    &self.root
  }

  /// Looks up a container instance by path, `"/"` being the root.
  pub fn container(&self, path: &str) -> Option<&ContainerInstance> {
    self.root.find(path)
  }

  /// Resolves a component from the root container.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> Result<Arc<T>> {
    self.root.get::<T>(name)
  }

  /// Creates every singleton, then runs the `on_start` hooks, both parents
  /// first and in install order. On failure the app ends up
  /// [`LifecycleState::Failed`].
  pub fn start(&self) -> Result<()> {
    self.transition(LifecycleState::Initialized, LifecycleState::Starting, "start")?;
    debug!(app = %self.name, "Starting app");
    match self.start_components() {
      Ok(()) => {
        self.set_state(LifecycleState::Running);
        info!(app = %self.name, "App running");
        Ok(())
      }
      Err(err) => {
        self.set_state(LifecycleState::Failed);
        warn!(app = %self.name, error = %err, "App failed to start");
        Err(err)
      }
    }
  }

  /// Runs every `on_stop` hook in reverse start order. All hooks run even if
  /// some fail; the first failure is returned.
  pub fn stop(&self) -> Result<()> {
    self.transition(LifecycleState::Running, LifecycleState::Stopping, "stop")?;
    debug!(app = %self.name, "Stopping app");
    let mut first_error = None;
    for (registry, component) in self.root.singletons().iter().rev() {
      for hook in component.on_stop.iter().rev() {
        if let Err(err) = registry.with_singleton(component.key(), |instance| hook(instance)) {
          warn!(app = %self.name, component = component.name(), error = %err, "Stop hook failed");
          first_error.get_or_insert(err);
        }
      }
    }
    self.set_state(LifecycleState::Stopped);
    info!(app = %self.name, "App stopped");
    match first_error {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}
