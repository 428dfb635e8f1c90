//! Wirelets: ordered directives that parameterize how a container is wired
//! or an image is instantiated.

use crate::error::{Error, Result};
use crate::naming::ContainerPath;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A single wiring directive.
///
/// Any `Debug + Send + Sync` type can be a wirelet. The container or an
/// extension decides how repeated wirelets of one type combine: by taking
/// the last one ([`Wirelets::consume_last`]) or all of them
/// ([`Wirelets::consume_all`]).
pub trait Wirelet: Any + fmt::Debug + Send + Sync {}

/// An immutable, ordered sequence of wirelets. Cheap to clone.
#[derive(Clone, Default)]
pub struct WireletList {
  items: Arc<[Arc<dyn Wirelet>]>,
}

impl WireletList {
  /// An empty list.
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns a new list with `wirelet` appended. `self` is not modified.
  pub fn and<W: Wirelet>(&self, wirelet: W) -> Self {
    let mut items: Vec<Arc<dyn Wirelet>> = self.items.iter().cloned().collect();
    items.push(Arc::new(wirelet));
    Self {
      items: items.into(),
    }
  }

  /// Returns `first` followed by `second`.
  pub fn concat(first: &WireletList, second: &WireletList) -> Self {
    let items: Vec<Arc<dyn Wirelet>> = first.items.iter().chain(second.items.iter()).cloned().collect();
    Self {
      items: items.into(),
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &dyn Wirelet> {
    self.items.iter().map(|w| w.as_ref())
  }

  /// The most recent wirelet of type `T`.
  pub fn last<T: Wirelet>(&self) -> Option<&T> {
    self.iter().rev().find_map(downcast::<T>)
  }

  /// Every wirelet of type `T`, in order.
  pub fn all<T: Wirelet>(&self) -> Vec<&T> {
    self.iter().filter_map(downcast::<T>).collect()
  }
}

impl<W: Wirelet> From<W> for WireletList {
  fn from(wirelet: W) -> Self {
    WireletList::new().and(wirelet)
  }
}

impl fmt::Debug for WireletList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.items.iter()).finish()
  }
}

fn downcast<T: Wirelet>(wirelet: &dyn Wirelet) -> Option<&T> {
  let any: &dyn Any = wirelet;
  any.downcast_ref::<T>()
}

/// Tracks which wirelets of a list have been consumed while a container is
/// being built or an image instantiated.
///
/// Wirelets left unconsumed when the container closes are reported.
pub struct Wirelets {
  list: WireletList,
  consumed: Vec<Cell<bool>>,
}

impl Wirelets {
  pub(crate) fn new(list: WireletList) -> Self {
    let consumed = (0..list.len()).map(|_| Cell::new(false)).collect();
    Self { list, consumed }
  }

  pub fn list(&self) -> &WireletList {
    &self.list
  }

  /// The most recent wirelet of type `T`, without consuming anything.
  pub fn last<T: Wirelet>(&self) -> Option<&T> {
    self.list.last::<T>()
  }

  /// Consumes every wirelet of type `T` and returns the last one, so later
  /// wirelets override earlier ones.
  pub fn consume_last<T: Wirelet>(&self) -> Option<&T> {
    self.consume_all::<T>().pop()
  }

  /// Consumes and returns every wirelet of type `T`, in order.
  pub fn consume_all<T: Wirelet>(&self) -> Vec<&T> {
    self
      .list
      .iter()
      .zip(&self.consumed)
      .filter_map(|(wirelet, consumed)| {
        let found = downcast::<T>(wirelet)?;
        consumed.set(true);
        Some(found)
      })
      .collect()
  }

  pub fn unconsumed(&self) -> impl Iterator<Item = &dyn Wirelet> {
    self
      .list
      .iter()
      .zip(&self.consumed)
      .filter(|(_, consumed)| !consumed.get())
      .map(|(wirelet, _)| wirelet)
  }

  // In strict mode the first unconsumed wirelet is an error, otherwise each one is logged.
  pub(crate) fn check_consumed(&self, path: &ContainerPath, strict: bool) -> Result<()> {
    for wirelet in self.unconsumed() {
      if strict {
        return Err(Error::UnconsumedWirelet {
          path: path.to_string(),
          wirelet: format!("{:?}", wirelet),
        });
      }
      warn!(path = %path, wirelet = ?wirelet, "Wirelet was not consumed");
    }
    Ok(())
  }
}

/// Sets the name of the container being linked or of the app being instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named(String);

impl Named {
  pub fn name(&self) -> &str {
    &self.0
  }
}

impl Wirelet for Named {}

/// Constructors for the wirelets the container itself understands.
pub struct ContainerWirelets;

impl ContainerWirelets {
  /// Names the container (or app). The last `named` wirelet in a list wins.
  pub fn named(name: impl Into<String>) -> Named {
    Named(name.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug)]
  struct Tag(u32);
  impl Wirelet for Tag {}

  #[test]
  fn consume_last_marks_every_wirelet_of_the_type() {
    let list = WireletList::new()
      .and(Tag(1))
      .and(ContainerWirelets::named("a"))
      .and(Tag(2));
    let wirelets = Wirelets::new(list);

    assert_eq!(wirelets.consume_last::<Tag>().map(|t| t.0), Some(2));
    let left: Vec<String> = wirelets.unconsumed().map(|w| format!("{:?}", w)).collect();
    assert_eq!(left, vec![r#"Named("a")"#.to_string()]);
  }

  #[test]
  fn and_leaves_the_original_list_untouched() {
    let base = WireletList::from(Tag(1));
    let extended = base.and(Tag(2));
    assert_eq!(base.len(), 1);
    assert_eq!(extended.len(), 2);
    assert_eq!(extended.all::<Tag>().iter().map(|t| t.0).collect::<Vec<_>>(), vec![1, 2]);
  }
}
