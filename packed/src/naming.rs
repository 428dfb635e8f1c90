//! Container paths and the rules for naming containers and components.

use std::fmt;

/// The location of a container inside an application tree.
///
/// The root container is `/`, its children are `/child`, and so on.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ContainerPath {
  segments: Vec<String>,
}

impl ContainerPath {
  pub fn root() -> Self {
    Self::default()
  }

  pub fn is_root(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn depth(&self) -> usize {
    self.segments.len()
  }

  pub fn segments(&self) -> impl Iterator<Item = &str> {
    self.segments.iter().map(String::as_str)
  }

  pub(crate) fn child(&self, name: &str) -> Self {
    let mut segments = self.segments.clone();
    segments.push(name.to_owned());
    Self { segments }
  }

  pub(crate) fn parent(&self) -> Self {
    let mut segments = self.segments.clone();
    segments.pop();
    Self { segments }
  }

  // Replaces the last segment. A no-op on the root, whose name is not part of its path.
  pub(crate) fn rename(&mut self, name: &str) {
    if let Some(last) = self.segments.last_mut() {
      *last = name.to_owned();
    }
  }
}

impl fmt::Display for ContainerPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.segments.is_empty() {
      return f.write_str("/");
    }
    for segment in &self.segments {
      write!(f, "/{}", segment)?;
    }
    Ok(())
  }
}

impl fmt::Debug for ContainerPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ContainerPath({})", self)
  }
}

/// Strips module paths and generic arguments: `app::db::Pool<u8>` becomes `Pool`.
pub(crate) fn simple_type_name(full: &'static str) -> &'static str {
  let base = full.split('<').next().unwrap_or(full);
  base.rsplit("::").next().unwrap_or(base)
}

/// The name a container gets from its assembly type when nothing else names it.
pub(crate) fn default_container_name(assembly_type: &'static str) -> String {
  let simple = simple_type_name(assembly_type);
  match simple.strip_suffix("Assembly") {
    Some("") => "Container".to_owned(),
    Some(stripped) => stripped.to_owned(),
    None => simple.to_owned(),
  }
}

pub(crate) fn validate_name(name: &str) -> Result<(), &'static str> {
  if name.trim().is_empty() {
    return Err("names must not be empty");
  }
  if name.contains('/') {
    return Err("names must not contain '/'");
  }
  Ok(())
}

/// Returns `base` if free, otherwise the first of `base1`, `base2`, ... that is.
pub(crate) fn unique_name(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
  if !is_taken(base) {
    return base.to_owned();
  }
  (1usize..)
    .map(|n| format!("{}{}", base, n))
    .find(|candidate| !is_taken(candidate))
    .unwrap_or_else(|| base.to_owned())
}
