//! Per-bundle resource index
//!
//! Materializes named entries of a container on first request and caches
//! the resulting handles per payload type.

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

use super::handle::AssetHandle;
use super::payload::Resource;
use crate::bundle::BundleContainer;

/// Type-erased view of one payload type's cached handles
trait HandleTable {
    /// Drop every cached handle, returning how many are still held elsewhere.
    /// With `invalidate`, handles held elsewhere stop yielding their value.
    fn reset(&mut self, invalidate: bool) -> usize;

    fn len(&self) -> usize;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_any(&self) -> &dyn Any;
}

/// Cached handles for a single payload type
struct Handles<T: Resource> {
    by_name: FxHashMap<String, AssetHandle<T>>,
}

impl<T: Resource> HandleTable for Handles<T> {
    fn reset(&mut self, invalidate: bool) -> usize {
        let weak: Vec<_> = self
            .by_name
            .drain()
            .map(|(_, handle)| {
                if invalidate {
                    handle.invalidate();
                }
                handle.downgrade()
            })
            .collect();
        weak.iter().filter(|handle| handle.is_alive()).count()
    }

    fn len(&self) -> usize {
        self.by_name.len()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Lazy lookup table for the resources of one loaded bundle.
///
/// The index never owns the container; callers pass it in on each lookup
/// so the cache stays the container's only owner.
pub struct ResourceIndex {
    bundle: String,
    tables: FxHashMap<TypeId, Box<dyn HandleTable>>,
}

impl ResourceIndex {
    /// Create an empty index for the named bundle
    #[must_use]
    pub fn new(bundle: impl Into<String>) -> Self {
        Self {
            bundle: bundle.into(),
            tables: FxHashMap::default(),
        }
    }

    /// Bundle this index belongs to
    #[must_use]
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    fn handles_mut<T: Resource>(&mut self) -> Option<&mut Handles<T>> {
        self.tables
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(Handles::<T> {
                    by_name: FxHashMap::default(),
                })
            })
            .as_any_mut()
            .downcast_mut::<Handles<T>>()
    }

    /// Look up a resource, materializing it from `container` on first use.
    ///
    /// Returns `None` if the entry is missing, is of another kind, or fails
    /// to materialize. Failures are not cached.
    pub fn get<T: Resource>(
        &mut self,
        container: &dyn BundleContainer,
        name: &str,
    ) -> Option<AssetHandle<T>> {
        let bundle = self.bundle.clone();
        let handles = self.handles_mut::<T>()?;

        if let Some(handle) = handles.by_name.get(name) {
            log::trace!("Resource cache hit: {bundle}/{name}");
            return Some(handle.clone());
        }

        let Some(raw) = container.load_object(name, T::KIND) else {
            log::debug!("No {} resource {name:?} in bundle {bundle}", T::KIND.name());
            return None;
        };
        let value = match raw.downcast::<T>() {
            Ok(value) => *value,
            Err(_) => {
                log::warn!(
                    "Bundle {bundle} materialized {name:?} with an unexpected type for kind {}",
                    T::KIND.name()
                );
                return None;
            }
        };

        let handle = AssetHandle::new(name, value);
        handles.by_name.insert(name.to_string(), handle.clone());
        Some(handle)
    }

    /// Whether a resource of type `T` is already materialized
    #[must_use]
    pub fn is_cached<T: Resource>(&self, name: &str) -> bool {
        self.tables
            .get(&TypeId::of::<T>())
            .and_then(|table| table.as_any().downcast_ref::<Handles<T>>())
            .is_some_and(|handles| handles.by_name.contains_key(name))
    }

    /// Number of cached handles across all payload types
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.values().map(|table| table.len()).sum()
    }

    /// Check if nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all cached entries.
    ///
    /// With `invalidate`, handles that callers still hold are invalidated as
    /// well. Returns the number of cleared resources that callers still hold.
    pub fn reset(&mut self, invalidate: bool) -> usize {
        let retained = self
            .tables
            .values_mut()
            .map(|table| table.reset(invalidate))
            .sum();
        self.tables.clear();
        retained
    }
}

impl std::fmt::Debug for ResourceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceIndex")
            .field("bundle", &self.bundle)
            .field("cached", &self.len())
            .finish()
    }
}
