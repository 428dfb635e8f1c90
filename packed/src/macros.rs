//! Public macros for ergonomic component resolution inside factories.

/// Resolves a component from a [`ServiceRegistry`](crate::ServiceRegistry),
/// returning `packed::Result<Arc<T>>`.
///
/// This is the usual way for a factory to get its dependencies; combine it
/// with `?` so a missing dependency fails the factory.
///
/// # Examples
///
/// ```
/// use packed::{resolve, ArtifactImage, Assembly, AssemblyState, ContainerConfiguration, Result, WireletList};
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct English { punctuation: std::sync::Arc<String> }
/// impl Greeter for English {
///   fn greet(&self) -> String { format!("Hello{}", self.punctuation) }
/// }
///
/// struct GreeterAssembly { state: AssemblyState }
/// impl Assembly for GreeterAssembly {
///   fn state(&self) -> &AssemblyState { &self.state }
///   fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
///     container.install_instance_with_name("punctuation", String::from("!"))?;
///     container.install_singleton_trait::<dyn Greeter>(|registry| {
///       Ok(std::sync::Arc::new(English { punctuation: resolve!(registry, String, "punctuation")? }))
///     })?;
///     Ok(())
///   }
/// }
///
/// let app = ArtifactImage::of(&GreeterAssembly { state: AssemblyState::new() }, WireletList::new())
///   .unwrap()
///   .instantiate(WireletList::new())
///   .unwrap();
/// let greeter = resolve!(app.root().registry(), trait Greeter).unwrap();
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // Arm for resolving a trait object: resolve!(registry, trait MyTrait)
    // We use `:ident` to capture the trait's name, not `:ty`.
    ($registry:expr, trait $trait_ident:ident) => {
        $registry.get::<dyn $trait_ident>(None)
    };

    // Arm for resolving a named trait object: resolve!(registry, trait MyTrait, "name")
    ($registry:expr, trait $trait_ident:ident, $name:expr) => {
        $registry.get::<dyn $trait_ident>(Some($name))
    };

    // Arm for resolving a concrete type: resolve!(registry, MyService)
    ($registry:expr, $type:ty) => {
        $registry.get::<$type>(None)
    };

    // Arm for resolving a named concrete type: resolve!(registry, MyService, "name")
    ($registry:expr, $type:ty, $name:expr) => {
        $registry.get::<$type>(Some($name))
    };
}
