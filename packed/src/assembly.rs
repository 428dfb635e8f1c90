//! Assemblies and the protocol that lets each one be built exactly once.

use crate::config::BuildConfig;
use crate::container::{ContainerConfiguration, ContainerDriver, LinkSite};
use crate::error::{Error, Result};
use crate::image::ContainerModel;
use crate::wirelet::WireletList;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

const UNUSED: u8 = 0;
const BUILDING: u8 = 1;
const USED: u8 = 2;

/// The observable phase of an [`AssemblyState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyPhase {
  Unused,
  Building,
  /// Terminal. Reached after a successful build and after a failed one alike.
  Used,
}

/// The single-use slot every assembly carries.
///
/// Moves forward only: `Unused → Building → Used`. The first transition is a
/// single compare-exchange, so of several concurrent builders exactly one wins.
#[derive(Debug, Default)]
pub struct AssemblyState {
  slot: AtomicU8,
}

impl AssemblyState {
  pub const fn new() -> Self {
    Self {
      slot: AtomicU8::new(UNUSED),
    }
  }

  pub fn phase(&self) -> AssemblyPhase {
    match self.slot.load(Ordering::Acquire) {
      UNUSED => AssemblyPhase::Unused,
      BUILDING => AssemblyPhase::Building,
      _ => AssemblyPhase::Used,
    }
  }

  pub fn is_used(&self) -> bool {
    self.phase() == AssemblyPhase::Used
  }

  pub(crate) fn enter(&self, assembly: &'static str) -> Result<BuildGuard<'_>> {
    match self
      .slot
      .compare_exchange(UNUSED, BUILDING, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => Ok(BuildGuard { slot: &self.slot }),
      Err(USED) => Err(Error::AlreadyUsed { assembly }),
      Err(_) => Err(Error::InUseElsewhere { assembly }),
    }
  }
}

/// Advances the slot to `Used` when dropped, however the build ended.
pub(crate) struct BuildGuard<'a> {
  slot: &'a AtomicU8,
}

impl Drop for BuildGuard<'_> {
  fn drop(&mut self) {
    self.slot.store(USED, Ordering::Release);
  }
}

/// A user-authored unit of configuration.
///
/// An assembly describes one container: which components it installs,
/// which extensions it uses and which child assemblies it links. The
/// `build` callback is invoked at most once per assembly value; building
/// the same value again fails with [`Error::AlreadyUsed`].
///
/// ```
/// use packed::{ArtifactImage, Assembly, AssemblyState, ContainerConfiguration, Result, WireletList};
///
/// struct GreetingAssembly {
///   state: AssemblyState,
/// }
///
/// impl Assembly for GreetingAssembly {
///   fn state(&self) -> &AssemblyState {
///     &self.state
///   }
///
///   fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
///     container.install_instance(String::from("hello"))?;
///     Ok(())
///   }
/// }
///
/// let assembly = GreetingAssembly { state: AssemblyState::new() };
/// let image = ArtifactImage::of(&assembly, WireletList::new()).unwrap();
/// assert_eq!(image.name(), "Greeting");
/// assert!(ArtifactImage::of(&assembly, WireletList::new()).is_err());
/// ```
pub trait Assembly: Send + Sync {
  /// The slot guarding single use. Usually a plain field.
  fn state(&self) -> &AssemblyState;

  /// Configures the container. Called exactly once.
  fn build(&self, container: &mut ContainerConfiguration) -> Result<()>;

  /// The driver that creates this assembly's container configuration.
  fn driver(&self) -> ContainerDriver {
    ContainerDriver::new()
  }

  fn before_build(&self, _container: &mut ContainerConfiguration) -> Result<()> {
    Ok(())
  }

  fn after_build(&self, _container: &mut ContainerConfiguration) -> Result<()> {
    Ok(())
  }

  /// Used in error messages and for the default container name.
  fn type_name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }
}

/// Callbacks a [`ContainerDriver`] runs around every build it drives.
///
/// `before_build` hooks run in registration order, `after_build` hooks in
/// reverse registration order.
pub trait AssemblyHook: Send + Sync {
  fn before_build(&self, _container: &mut ContainerConfiguration) -> Result<()> {
    Ok(())
  }

  fn after_build(&self, _container: &mut ContainerConfiguration) -> Result<()> {
    Ok(())
  }
}

/// Runs the one-shot build of `assembly` and freezes the resulting container.
pub(crate) fn build_assembly<A: Assembly + ?Sized>(
  assembly: &A,
  site: LinkSite,
  wirelets: WireletList,
  config: Arc<BuildConfig>,
) -> Result<ContainerModel> {
  let type_name = assembly.type_name();
  let _guard = assembly.state().enter(type_name)?;

  let driver = assembly.driver();
  let mut container = ContainerConfiguration::new(&driver, site, type_name, wirelets, config)?;
  debug!(assembly = type_name, path = %container.path(), "Building assembly");

  for hook in driver.hooks() {
    hook.before_build(&mut container)?;
  }
  assembly.before_build(&mut container)?;
  assembly.build(&mut container)?;
  assembly.after_build(&mut container)?;
  for hook in driver.hooks().iter().rev() {
    hook.after_build(&mut container)?;
  }

  let model = container.into_model()?;
  debug!(
    assembly = type_name,
    path = %model.path(),
    components = model.components().len(),
    children = model.children().len(),
    "Assembly built"
  );
  Ok(model)
}
