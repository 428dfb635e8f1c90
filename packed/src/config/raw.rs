use serde::Deserialize;

// --- Top Level Config ---
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfigRaw {
  /// How deep assemblies may be linked below the root. Defaults to 32.
  #[serde(default)]
  pub max_depth: Option<usize>,
  /// Fail the build on wirelets nobody consumed, instead of logging them.
  #[serde(default)]
  pub fail_on_unconsumed_wirelets: Option<bool>,
  /// Overrides the root container's name unless a `named` wirelet is given.
  #[serde(default)]
  pub root_name: Option<String>,
}
