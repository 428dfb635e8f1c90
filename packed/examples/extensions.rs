use packed::{
  ArtifactImage, Assembly, AssemblyState, ContainerConfiguration, Dependencies, Extension, ExtensionClose,
  ExtensionSetup, Result, Wirelet, WireletList,
};
use tracing_subscriber::EnvFilter;

// A wirelet: chooses the listening port when the image is built.
#[derive(Debug)]
struct Port(u16);
impl Wirelet for Port {}

// An extension with no dependencies, reading its settings from wirelets.
struct Settings {
  port: u16,
}

impl Extension for Settings {
  fn new(setup: &ExtensionSetup<'_>) -> Result<Self> {
    let port = setup.wirelets().consume_last::<Port>().map(|p| p.0).unwrap_or(8080);
    Ok(Settings { port })
  }
}

// The router every container with routes ends up with.
#[derive(Debug)]
struct Router {
  port: u16,
  routes: Vec<String>,
}

// An extension that depends on `Settings` and turns the collected routes
// into a component when the container closes.
struct Http {
  port: u16,
  routes: Vec<String>,
}

impl Http {
  fn route(&mut self, path: &str) -> &mut Self {
    self.routes.push(path.to_owned());
    self
  }
}

impl Extension for Http {
  fn dependencies(deps: &mut Dependencies) {
    deps.extension::<Settings>();
  }

  fn new(setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Http {
      port: setup.dependency::<Settings>()?.port,
      routes: Vec::new(),
    })
  }

  fn on_close(&mut self, close: &mut ExtensionClose<'_>) -> Result<()> {
    println!("closing {} with {} routes", close.path(), self.routes.len());
    close.install_instance(Router {
      port: self.port,
      routes: std::mem::take(&mut self.routes),
    })?;
    Ok(())
  }
}

struct ApiAssembly {
  state: AssemblyState,
}

impl Assembly for ApiAssembly {
  fn state(&self) -> &AssemblyState {
    &self.state
  }

  fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
    container.use_extension::<Http>()?.route("/health").route("/orders");
    println!("extensions in use: {:?}", container.extension_names());
    Ok(())
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("packed=trace")))
    .init();

  let image = ArtifactImage::of(&ApiAssembly { state: AssemblyState::new() }, Port(3000).into())?;
  println!("closed extensions: {:?}", image.root().extension_names());

  let app = image.instantiate(WireletList::new())?;
  let router = app.get::<Router>(None)?;
  println!("serving {:?} on port {}", router.routes, router.port);
  Ok(())
}
