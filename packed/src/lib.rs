//! # Packed
//!
//! Compose an application out of assemblies, let extensions hook into the
//! build, and freeze the result into an image you can instantiate as many
//! times as you like.
//!
//! ## Core Concepts
//!
//! - **Assembly**: user code describing one container. Its `build` runs exactly once.
//! - **ContainerConfiguration**: the container being built. Components are
//!   installed into it, child assemblies are linked into it.
//! - **Extension**: a per-container singleton with declared dependencies,
//!   created lazily in dependency order and closed with its container.
//! - **Wirelet**: an ordered directive passed when linking or instantiating,
//!   later wirelets overriding earlier ones.
//! - **ArtifactImage**: the frozen container tree, instantiated into [`App`]s.
//!
//! ## Quick Start
//!
//! ```
//! use packed::{
//!   resolve, ArtifactImage, Assembly, AssemblyState, ContainerConfiguration, ContainerWirelets,
//!   LifecycleState, Result, WireletList,
//! };
//! use std::sync::Arc;
//!
//! struct Database {
//!   url: String,
//! }
//!
//! struct UserService {
//!   db: Arc<Database>,
//! }
//!
//! struct ShopAssembly {
//!   state: AssemblyState,
//! }
//!
//! impl Assembly for ShopAssembly {
//!   fn state(&self) -> &AssemblyState {
//!     &self.state
//!   }
//!
//!   fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
//!     container.install_instance(Database { url: "postgres://localhost/shop".into() })?;
//!     container.install_singleton(|registry| Ok(UserService { db: resolve!(registry, Database)? }))?;
//!     Ok(())
//!   }
//! }
//!
//! fn main() -> Result<()> {
//!   let assembly = ShopAssembly { state: AssemblyState::new() };
//!   let image = ArtifactImage::of(&assembly, WireletList::new())?;
//!
//!   // The image can be instantiated many times without building again.
//!   let app = image.instantiate(WireletList::from(ContainerWirelets::named("shop-1")))?;
//!   app.start()?;
//!   assert_eq!(app.name(), "shop-1");
//!   assert_eq!(app.state(), LifecycleState::Running);
//!
//!   let users = app.get::<UserService>(None)?;
//!   assert_eq!(users.db.url, "postgres://localhost/shop");
//!   app.stop()
//! }
//! ```

mod assembly;
mod component;
mod config;
mod container;
mod core;
mod error;
mod extension;
mod global;
mod image;
mod macros;
mod naming;
mod registry;
mod runtime;
mod wirelet;

pub use assembly::{Assembly, AssemblyHook, AssemblyPhase, AssemblyState};
pub use component::{ComponentConfiguration, ComponentModel, Lifetime};
pub use config::{BuildConfig, BuildConfigRaw, CONFIG_ENV_VAR};
pub use container::{ContainerConfiguration, ContainerDriver};
pub use crate::core::InjectionKey;
pub use error::{BoxError, Error, Result};
pub use extension::{
  Dependencies, Extension, ExtensionClose, ExtensionDescriptor, ExtensionOrdering, ExtensionSet, ExtensionSetup,
};
pub use image::{ArtifactImage, ContainerModel, ImageBuilder};
pub use naming::ContainerPath;
pub use registry::ServiceRegistry;
pub use runtime::{App, ContainerInstance, LifecycleState};
pub use wirelet::{ContainerWirelets, Named, Wirelet, WireletList, Wirelets};
