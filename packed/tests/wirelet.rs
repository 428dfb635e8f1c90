use packed::{
  ArtifactImage, Assembly, AssemblyState, BuildConfig, ContainerConfiguration, ContainerWirelets, Error, Extension,
  ExtensionSetup, ImageBuilder, Result, Wirelet, WireletList,
};
use pretty_assertions::assert_eq;

// --- Test Fixtures ---

struct ServerAssembly {
  state: AssemblyState,
}

impl ServerAssembly {
  fn new() -> Self {
    Self {
      state: AssemblyState::new(),
    }
  }
}

impl Assembly for ServerAssembly {
  fn state(&self) -> &AssemblyState {
    &self.state
  }

  fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
    container.use_extension::<Http>()?;
    Ok(())
  }
}

#[derive(Debug)]
struct Port(u16);
impl Wirelet for Port {}

#[derive(Debug)]
struct Header(&'static str);
impl Wirelet for Header {}

#[derive(Debug)]
struct Unknown;
impl Wirelet for Unknown {}

// Takes the last port and every header it was linked with.
struct Http {
  port: u16,
  headers: Vec<&'static str>,
}

impl Extension for Http {
  fn new(setup: &ExtensionSetup<'_>) -> Result<Self> {
    let wirelets = setup.wirelets();
    Ok(Http {
      port: wirelets.consume_last::<Port>().map(|p| p.0).unwrap_or(80),
      headers: wirelets.consume_all::<Header>().iter().map(|h| h.0).collect(),
    })
  }
}

// --- Tests ---

#[test]
fn test_last_named_wirelet_wins() {
  let wirelets = WireletList::new()
    .and(ContainerWirelets::named("a"))
    .and(ContainerWirelets::named("b"));

  let image = ArtifactImage::of(&ServerAssembly::new(), wirelets).unwrap();

  assert_eq!(image.name(), "b");
}

#[test]
fn test_linked_child_is_named_by_its_wirelets() {
  struct ParentAssembly {
    state: AssemblyState,
  }

  impl Assembly for ParentAssembly {
    fn state(&self) -> &AssemblyState {
      &self.state
    }

    fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
      container.link(&ServerAssembly::new(), ContainerWirelets::named("api").into())?;
      container.link(&ServerAssembly::new(), WireletList::new())?;
      Ok(())
    }
  }

  let image = ArtifactImage::of(
    &ParentAssembly {
      state: AssemblyState::new(),
    },
    WireletList::new(),
  )
  .unwrap();

  let names: Vec<_> = image.root().children().iter().map(|c| c.path().to_string()).collect();
  assert_eq!(names, vec!["/api", "/Server"]);
}

#[test]
fn test_extensions_consume_their_own_wirelets() {
  let wirelets = WireletList::new()
    .and(Port(8080))
    .and(Header("x-trace"))
    .and(Port(9090))
    .and(Header("x-tenant"));

  let image = ArtifactImage::of(&ServerAssembly::new(), wirelets).unwrap();

  let http = image.root().extension::<Http>().unwrap();
  assert_eq!(http.port, 9090);
  assert_eq!(http.headers, vec!["x-trace", "x-tenant"]);
}

#[test]
fn test_unconsumed_wirelet_fails_the_build() {
  let wirelets = WireletList::new().and(Port(1)).and(Unknown);

  let err = ArtifactImage::of(&ServerAssembly::new(), wirelets).unwrap_err();

  match err {
    Error::UnconsumedWirelet { path, wirelet } => {
      assert_eq!(path, "/");
      assert_eq!(wirelet, "Unknown");
    }
    other => panic!("expected UnconsumedWirelet, got {:?}", other),
  }
}

#[test]
fn test_lenient_config_only_logs_unconsumed_wirelets() {
  let config = BuildConfig::default().with_fail_on_unconsumed_wirelets(false);

  let image = ImageBuilder::new()
    .config(config)
    .build(&ServerAssembly::new(), Unknown.into())
    .unwrap();

  assert_eq!(image.name(), "Server");
}

#[test]
fn test_instantiation_wirelets_name_the_app_but_not_the_image() {
  let image = ArtifactImage::of(&ServerAssembly::new(), WireletList::new()).unwrap();

  let first = image.instantiate(ContainerWirelets::named("first").into()).unwrap();
  let plain = image.instantiate(WireletList::new()).unwrap();

  assert_eq!(first.name(), "first");
  assert_eq!(plain.name(), "Server");
  assert_eq!(image.name(), "Server");

  let err = image.instantiate(Unknown.into()).err().unwrap();
  assert!(matches!(err, Error::UnconsumedWirelet { .. }));
}

#[test]
fn test_concat_keeps_both_lists_in_order() {
  let defaults = WireletList::new().and(Port(80)).and(Header("a"));
  let overrides = WireletList::from(Port(443));

  let merged = WireletList::concat(&defaults, &overrides);

  assert_eq!(merged.len(), 3);
  assert_eq!(merged.last::<Port>().map(|p| p.0), Some(443));
  assert_eq!(merged.all::<Port>().iter().map(|p| p.0).collect::<Vec<_>>(), vec![80, 443]);
  assert_eq!(defaults.len(), 2);
}
