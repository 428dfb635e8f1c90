use packed::{resolve, ArtifactImage, Assembly, AssemblyState, ContainerConfiguration, ContainerWirelets, Result, WireletList};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// 1. The abstraction the rest of the shop depends on
trait PaymentGateway: Send + Sync {
  fn charge(&self, cents: u64) -> String;
}

struct FakeGateway;
impl PaymentGateway for FakeGateway {
  fn charge(&self, cents: u64) -> String {
    format!("charged {} cents", cents)
  }
}

struct Checkout {
  gateway: Arc<dyn PaymentGateway>,
  currency: Arc<String>,
}

impl Checkout {
  fn pay(&self, cents: u64) -> String {
    format!("{} ({})", self.gateway.charge(cents), self.currency)
  }
}

// 2. A child assembly: payments live in their own container
struct PaymentsAssembly {
  state: AssemblyState,
}

impl Assembly for PaymentsAssembly {
  fn state(&self) -> &AssemblyState {
    &self.state
  }

  fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
    container
      .install_singleton_trait::<dyn PaymentGateway>(|_| Ok(Arc::new(FakeGateway)))?
      .on_start(|_| {
        println!("payment gateway connected");
        Ok(())
      })
      .on_stop(|_| {
        println!("payment gateway disconnected");
        Ok(())
      });
    // The currency comes from the parent container.
    container.install_singleton(|registry| {
      Ok(Checkout {
        gateway: resolve!(registry, trait PaymentGateway)?,
        currency: resolve!(registry, String, "currency")?,
      })
    })?;
    Ok(())
  }
}

// 3. The root assembly links the child
struct ShopAssembly {
  state: AssemblyState,
}

impl Assembly for ShopAssembly {
  fn state(&self) -> &AssemblyState {
    &self.state
  }

  fn build(&self, container: &mut ContainerConfiguration) -> Result<()> {
    container.install_instance_with_name("currency", String::from("EUR"))?;
    container.link(
      &PaymentsAssembly {
        state: AssemblyState::new(),
      },
      WireletList::new(),
    )?;
    Ok(())
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("packed=debug")))
    .init();

  // --- Build once ---
  let image = ArtifactImage::of(&ShopAssembly { state: AssemblyState::new() }, WireletList::new())?;
  println!("built image '{}'", image.name());

  // --- Instantiate twice ---
  for tenant in ["berlin", "paris"] {
    let app = image.instantiate(ContainerWirelets::named(tenant).into())?;
    app.start()?;

    let checkout = app
      .container("/Payments")
      .map(|payments| payments.get::<Checkout>(None))
      .transpose()?;
    if let Some(checkout) = checkout {
      println!("[{}] {}", app.name(), checkout.pay(1299));
    }

    app.stop()?;
  }
  Ok(())
}
