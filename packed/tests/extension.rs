use packed::{
  ArtifactImage, Assembly, AssemblyState, BuildConfig, ContainerConfiguration, ContainerDriver, Dependencies, Error,
  Extension, ExtensionClose, ExtensionDescriptor, ExtensionOrdering, ExtensionSetup, Result, Wirelet, WireletList,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- Test Fixtures ---

fn root() -> ContainerConfiguration {
  ContainerConfiguration::root(&ContainerDriver::new(), WireletList::new(), BuildConfig::default()).unwrap()
}

static COUNTER_CREATED: AtomicUsize = AtomicUsize::new(0);

struct Counter {
  hits: usize,
}

impl Extension for Counter {
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    COUNTER_CREATED.fetch_add(1, Ordering::SeqCst);
    Ok(Counter { hits: 0 })
  }
}

struct Settings {
  value: u32,
}

impl Extension for Settings {
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Settings { value: 7 })
  }
}

struct Services {
  seen_setting: u32,
}

impl Extension for Services {
  fn dependencies(deps: &mut Dependencies) {
    deps.extension::<Settings>();
  }

  fn new(setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Services {
      seen_setting: setup.dependency::<Settings>()?.value,
    })
  }
}

struct Sneaky;

impl Extension for Sneaky {
  fn new(setup: &ExtensionSetup<'_>) -> Result<Self> {
    setup.dependency::<Settings>()?;
    Ok(Sneaky)
  }
}

struct CycleA;
struct CycleB;

impl Extension for CycleA {
  fn dependencies(deps: &mut Dependencies) {
    deps.extension::<CycleB>();
  }
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(CycleA)
  }
}

impl Extension for CycleB {
  fn dependencies(deps: &mut Dependencies) {
    deps.extension::<CycleA>();
  }
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(CycleB)
  }
}

struct SelfLoop;

impl Extension for SelfLoop {
  fn dependencies(deps: &mut Dependencies) {
    deps.extension::<SelfLoop>();
  }
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(SelfLoop)
  }
}

// Close callbacks append their name to the log passed in as a wirelet.
#[derive(Debug, Clone)]
struct CloseLog(Arc<Mutex<Vec<&'static str>>>);
impl Wirelet for CloseLog {}

fn record_close(close: &ExtensionClose<'_>, name: &'static str) {
  if let Some(log) = close.wirelets().consume_last::<CloseLog>() {
    log.0.lock().unwrap().push(name);
  }
}

struct Zeta;
struct Alpha;
struct Beta;

impl Extension for Zeta {
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Zeta)
  }
  fn on_close(&mut self, close: &mut ExtensionClose<'_>) -> Result<()> {
    record_close(close, "Zeta");
    Ok(())
  }
}

impl Extension for Alpha {
  fn dependencies(deps: &mut Dependencies) {
    deps.extension::<Zeta>();
  }
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Alpha)
  }
  fn on_close(&mut self, close: &mut ExtensionClose<'_>) -> Result<()> {
    record_close(close, "Alpha");
    Ok(())
  }
}

impl Extension for Beta {
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Beta)
  }
  fn on_close(&mut self, close: &mut ExtensionClose<'_>) -> Result<()> {
    record_close(close, "Beta");
    Ok(())
  }
}

#[derive(Debug, PartialEq)]
struct Exported(u32);

struct Exporter {
  value: u32,
}

impl Extension for Exporter {
  fn new(setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Exporter {
      value: setup.container_name().len() as u32,
    })
  }
  fn on_close(&mut self, close: &mut ExtensionClose<'_>) -> Result<()> {
    close.install_instance(Exported(self.value))?;
    Ok(())
  }
}

#[derive(Debug)]
struct Stray;
impl Wirelet for Stray {}

// Sorts before `Late`: both are dependency-free.
struct Broken;

impl Extension for Broken {
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Broken)
  }
  fn on_close(&mut self, _close: &mut ExtensionClose<'_>) -> Result<()> {
    Err(Error::custom("close failed"))
  }
}

static LATE_CLOSED: AtomicUsize = AtomicUsize::new(0);

struct Late;

impl Extension for Late {
  fn new(_setup: &ExtensionSetup<'_>) -> Result<Self> {
    Ok(Late)
  }
  fn on_close(&mut self, _close: &mut ExtensionClose<'_>) -> Result<()> {
    LATE_CLOSED.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

// --- Tests ---

#[test]
fn test_use_extension_returns_the_same_instance() {
  // Arrange
  let mut container = root();
  let before = COUNTER_CREATED.load(Ordering::SeqCst);

  // Act
  let first: *const Counter = container.use_extension::<Counter>().unwrap();
  container.use_extension::<Counter>().unwrap().hits += 1;
  let second: *const Counter = container.use_extension::<Counter>().unwrap();

  // Assert
  assert_eq!(first, second);
  assert_eq!(container.extension::<Counter>().map(|c| c.hits), Some(1));
  assert_eq!(COUNTER_CREATED.load(Ordering::SeqCst) - before, 1);
}

#[test]
fn test_dependencies_are_installed_before_their_dependents() {
  let mut container = root();

  let services = container.use_extension::<Services>().unwrap();
  assert_eq!(services.seen_setting, 7);

  assert_eq!(container.extension_names(), vec!["Settings", "Services"]);
  assert!(container.extension::<Settings>().is_some());
}

#[test]
fn test_undeclared_dependency_is_not_available() {
  let mut container = root();
  // Even when it is installed.
  container.use_extension::<Settings>().unwrap();

  match container.use_extension::<Sneaky>() {
    Err(Error::ExtensionNotAvailable { requester, requested }) => {
      assert!(requester.ends_with("Sneaky"));
      assert!(requested.ends_with("Settings"));
    }
    Err(other) => panic!("expected ExtensionNotAvailable, got {:?}", other),
    Ok(_) => panic!("expected ExtensionNotAvailable, got an extension"),
  }
  assert!(container.extension::<Sneaky>().is_none());
}

#[test]
fn test_dependency_cycles_are_reported_with_their_path() {
  match ExtensionDescriptor::of::<CycleA>() {
    Err(Error::ExtensionCycle { path }) => assert_eq!(path, vec!["CycleA", "CycleB", "CycleA"]),
    other => panic!("expected ExtensionCycle, got {:?}", other),
  }

  let mut container = root();
  let err = container.use_extension::<SelfLoop>().err().unwrap();
  assert_eq!(
    err.to_string(),
    "Extension dependency cycle detected: SelfLoop -> SelfLoop"
  );
}

#[test]
fn test_closed_container_only_returns_installed_extensions() {
  let mut container = root();
  container.use_extension::<Counter>().unwrap();
  container.close().unwrap();

  assert!(!container.is_configurable());
  assert!(container.use_extension::<Counter>().is_ok());
  let err = container.use_extension::<Beta>().err().unwrap();
  assert!(matches!(err, Error::NotConfigurable { .. }), "{:?}", err);
}

#[test]
fn test_extensions_close_in_dependency_order() {
  // Arrange: insertion order is Zeta, Alpha, Beta.
  let log = Arc::new(Mutex::new(Vec::new()));
  let mut container = ContainerConfiguration::root(
    &ContainerDriver::new(),
    WireletList::from(CloseLog(Arc::clone(&log))),
    BuildConfig::default(),
  )
  .unwrap();
  container.use_extension::<Alpha>().unwrap();
  container.use_extension::<Beta>().unwrap();
  assert_eq!(container.extension_names(), vec!["Zeta", "Alpha", "Beta"]);

  // Act
  let model = container.into_model().unwrap();

  // Assert: shallow extensions first, ties broken by name.
  assert_eq!(*log.lock().unwrap(), vec!["Beta", "Zeta", "Alpha"]);
  assert_eq!(model.extension_names(), vec!["Beta", "Zeta", "Alpha"]);
}

#[test]
fn test_extensions_contribute_components_when_closing() {
  struct ExportingAssembly {
    state: AssemblyState,
  }

  impl Assembly for ExportingAssembly {
    fn state(&self) -> &AssemblyState {
      &self.state
    }

    fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
      container.use_extension::<Exporter>()?;
      Ok(())
    }
  }

  let image = ArtifactImage::of(
    &ExportingAssembly {
      state: AssemblyState::new(),
    },
    WireletList::new(),
  )
  .unwrap();
  let app = image.instantiate(WireletList::new()).unwrap();

  // "Exporting" has nine characters.
  assert_eq!(*app.get::<Exported>(None).unwrap(), Exported(9));
  assert_eq!(image.root().extension::<Exporter>().map(|e| e.value), Some(9));
}

#[test]
fn test_driver_extensions_are_installed_up_front() {
  struct DrivenAssembly {
    state: AssemblyState,
    observed: Mutex<Vec<&'static str>>,
  }

  impl Assembly for DrivenAssembly {
    fn state(&self) -> &AssemblyState {
      &self.state
    }

    fn driver(&self) -> ContainerDriver {
      ContainerDriver::new().with_extension::<Services>()
    }

    fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
      *self.observed.lock().unwrap() = container.extension_names();
      Ok(())
    }
  }

  let assembly = DrivenAssembly {
    state: AssemblyState::new(),
    observed: Mutex::new(Vec::new()),
  };
  let image = ArtifactImage::of(&assembly, WireletList::new()).unwrap();

  assert_eq!(*assembly.observed.lock().unwrap(), vec!["Settings", "Services"]);
  assert_eq!(image.root().extension::<Services>().map(|s| s.seen_setting), Some(7));
}

#[test]
fn test_ordering_puts_every_dependency_before_its_dependents() {
  let mut descriptors = vec![
    ExtensionDescriptor::of::<Alpha>().unwrap(),
    ExtensionDescriptor::of::<Services>().unwrap(),
    ExtensionDescriptor::of::<Beta>().unwrap(),
    ExtensionDescriptor::of::<Settings>().unwrap(),
    ExtensionDescriptor::of::<Zeta>().unwrap(),
  ];

  ExtensionOrdering::sort(&mut descriptors);

  for (i, earlier) in descriptors.iter().enumerate() {
    for later in &descriptors[i + 1..] {
      assert!(
        !earlier.depends_on(ExtensionDescriptor::type_id(later)),
        "{} sorted before its dependency {}",
        earlier.simple_name(),
        later.simple_name()
      );
    }
  }
  let names: Vec<_> = descriptors.iter().map(|d| d.simple_name()).collect();
  assert_eq!(names, vec!["Beta", "Settings", "Zeta", "Alpha", "Services"]);
}

#[test]
fn test_container_with_extensions_closes_into_a_model() {
  let mut container = root();
  container.use_extension::<Services>().unwrap();

  container.close().unwrap();
  container.close().unwrap();
  let model = container.into_model().unwrap();

  assert_eq!(model.extension_names(), vec!["Settings", "Services"]);
  assert_eq!(model.extension::<Services>().map(|s| s.seen_setting), Some(7));
}

#[test]
fn test_failed_wirelet_check_is_not_forgotten() {
  // Arrange
  let mut container =
    ContainerConfiguration::root(&ContainerDriver::new(), WireletList::from(Stray), BuildConfig::default()).unwrap();

  // Act
  let first = container.close();
  let second = container.close();
  let model = container.into_model();

  // Assert
  match first {
    Err(Error::UnconsumedWirelet { path, wirelet }) => {
      assert_eq!(path, "/");
      assert_eq!(wirelet, "Stray");
    }
    other => panic!("expected UnconsumedWirelet, got {:?}", other),
  }
  assert!(matches!(second, Err(Error::CloseFailed { .. })), "{:?}", second);
  match model {
    Err(Error::CloseFailed { path }) => assert_eq!(path, "/"),
    Err(other) => panic!("expected CloseFailed, got {:?}", other),
    Ok(_) => panic!("a container that failed to close was frozen"),
  }
}

#[test]
fn test_failed_on_close_stops_the_close_for_good() {
  // Arrange
  let mut container = root();
  container.use_extension::<Late>().unwrap();
  container.use_extension::<Broken>().unwrap();
  let closed_before = LATE_CLOSED.load(Ordering::SeqCst);

  // Act
  let first = container.close().unwrap_err();
  let configurable = container.is_configurable();
  let model = container.into_model();

  // Assert
  assert_eq!(first.to_string(), "close failed");
  assert!(!configurable);
  assert!(matches!(model, Err(Error::CloseFailed { .. })));
  assert_eq!(LATE_CLOSED.load(Ordering::SeqCst), closed_before);
}
