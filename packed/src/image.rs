//! Frozen container trees and the images built from them.

use crate::assembly::{build_assembly, Assembly};
use crate::component::ComponentModel;
use crate::config::BuildConfig;
use crate::container::LinkSite;
use crate::core::Instance;
use crate::error::Result;
use crate::extension::{Extension, ExtensionDescriptor};
use crate::naming::ContainerPath;
use crate::runtime::App;
use crate::wirelet::WireletList;
use std::fmt;
use std::sync::Arc;

pub(crate) struct FrozenExtension {
  pub(crate) descriptor: Arc<ExtensionDescriptor>,
  pub(crate) instance: Instance,
}

/// An immutable, fully built container and its descendants.
pub struct ContainerModel {
  pub(crate) name: String,
  pub(crate) path: ContainerPath,
  pub(crate) components: Vec<ComponentModel>,
  pub(crate) extensions: Vec<FrozenExtension>,
  pub(crate) children: Vec<ContainerModel>,
}

impl ContainerModel {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn path(&self) -> &ContainerPath {
    &self.path
  }

  pub fn components(&self) -> &[ComponentModel] {
    &self.components
  }

  pub fn children(&self) -> &[ContainerModel] {
    &self.children
  }

  pub fn child(&self, name: &str) -> Option<&ContainerModel> {
    self.children.iter().find(|c| c.name == name)
  }

  /// Looks up a descendant by path relative to this container, `"/"` being itself.
  pub fn find(&self, path: &str) -> Option<&ContainerModel> {
    path
      .split('/')
      .filter(|segment| !segment.is_empty())
      .try_fold(self, |container, segment| container.child(segment))
  }

  /// The state extension `E` reached when the container closed.
  pub fn extension<E: Extension>(&self) -> Option<&E> {
    self
      .extensions
      .iter()
      .find_map(|frozen| frozen.instance.downcast_ref::<E>())
  }

  /// Simple names of the installed extensions, in the order they were closed.
  pub fn extension_names(&self) -> Vec<&'static str> {
    self.extensions.iter().map(|e| e.descriptor.simple_name()).collect()
  }
}

impl fmt::Debug for ContainerModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerModel")
      .field("name", &self.name)
      .field("path", &self.path)
      .field("components", &self.components)
      .field("extensions", &self.extension_names())
      .field("children", &self.children)
      .finish()
  }
}

/// A reusable snapshot of a built application.
///
/// Building runs every assembly's `build` exactly once. The image can then
/// be instantiated into any number of independent [`App`]s.
#[derive(Clone)]
pub struct ArtifactImage {
  root: Arc<ContainerModel>,
  config: Arc<BuildConfig>,
}

impl ArtifactImage {
  /// Builds an image with the default [`BuildConfig`].
  pub fn of<A: Assembly + ?Sized>(assembly: &A, wirelets: WireletList) -> Result<Self> {
    ImageBuilder::new().build(assembly, wirelets)
  }

  pub fn builder() -> ImageBuilder {
    ImageBuilder::new()
  }

  pub fn name(&self) -> &str {
    self.root.name()
  }

  pub fn root(&self) -> &ContainerModel {
    &self.root
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  /// Creates a new app from this image. Never reruns any `build`.
  pub fn instantiate(&self, wirelets: WireletList) -> Result<App> {
    App::from_image(&self.root, &self.config, wirelets)
  }
}

impl fmt::Debug for ArtifactImage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ArtifactImage").field("root", &self.root).finish()
  }
}

/// Builds [`ArtifactImage`]s with a non-default [`BuildConfig`].
#[derive(Default)]
pub struct ImageBuilder {
  config: BuildConfig,
}

impl ImageBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn config(mut self, config: BuildConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build<A: Assembly + ?Sized>(self, assembly: &A, wirelets: WireletList) -> Result<ArtifactImage> {
    let config = Arc::new(self.config);
    let root = build_assembly(assembly, LinkSite::root(), wirelets, Arc::clone(&config))?;
    Ok(ArtifactImage {
      root: Arc::new(root),
      config,
    })
  }
}
