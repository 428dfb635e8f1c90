//! The process-wide cache of extension descriptors.

use crate::error::Result;
use crate::extension::ExtensionDescriptor;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::sync::Arc;

// The one and only descriptor cache.
// It will be created on its first access in a thread-safe manner.
static DESCRIPTORS: Lazy<DescriptorCache> = Lazy::new(DescriptorCache::default);

#[derive(Default)]
pub(crate) struct DescriptorCache {
  entries: DashMap<TypeId, Arc<ExtensionDescriptor>>,
}

impl DescriptorCache {
  /// Returns the cached descriptor, computing it if needed.
  ///
  /// `compute` recurses into dependency descriptors, so no map guard is held
  /// while it runs. Two threads may race to compute the same descriptor; the
  /// first one stored is the one everybody gets.
  pub(crate) fn get_or_compute(
    &self,
    type_id: TypeId,
    compute: impl FnOnce() -> Result<ExtensionDescriptor>,
  ) -> Result<Arc<ExtensionDescriptor>> {
    if let Some(found) = self.entries.get(&type_id).map(|d| Arc::clone(d.value())) {
      return Ok(found);
    }
    let computed = Arc::new(compute()?);
    Ok(Arc::clone(self.entries.entry(type_id).or_insert(computed).value()))
  }
}

/// Provides a reference to the descriptor cache.
pub(crate) fn descriptors() -> &'static DescriptorCache {
  &DESCRIPTORS
}
