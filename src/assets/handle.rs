//! Resource handle implementation
//!
//! Handles are what the resource index hands out: a shared pointer to a
//! materialized payload plus the resource name it was looked up under.
//! All clones of a handle share one validity flag, so unloading a bundle
//! can invalidate handles that callers still hold.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
struct Slot<T> {
    value: T,
    valid: AtomicBool,
}

/// A strong handle to a materialized resource of type `T`.
///
/// Cloning is cheap. Two handles compare equal when they come from the same
/// materialization, so repeated index lookups of a cached resource yield
/// equal handles.
#[derive(Debug)]
pub struct AssetHandle<T> {
    id: u64,
    name: Arc<str>,
    inner: Arc<Slot<T>>,
}

impl<T> AssetHandle<T> {
    /// Wrap a freshly materialized resource
    #[must_use]
    pub fn new(name: &str, value: T) -> Self {
        Self {
            id: next_id(),
            name: Arc::from(name),
            inner: Arc::new(Slot {
                value,
                valid: AtomicBool::new(true),
            }),
        }
    }

    /// Unique ID of this materialization
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Resource name inside its bundle
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a reference to the underlying resource, or `None` once the
    /// bundle it came from was unloaded with `destroy_loaded_objects`
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.is_valid().then_some(&self.inner.value)
    }

    /// Whether the resource is still usable
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.valid.load(Ordering::Acquire)
    }

    /// Invalidate this handle and every clone of it
    pub(crate) fn invalidate(&self) {
        self.inner.valid.store(false, Ordering::Release);
    }

    /// Create a weak handle that doesn't keep the resource alive
    #[must_use]
    pub fn downgrade(&self) -> WeakAssetHandle<T> {
        WeakAssetHandle {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Get the strong reference count
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for AssetHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for AssetHandle<T> {}

impl<T> Hash for AssetHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A weak handle used by the index to see which resources outlive an unload.
#[derive(Debug)]
pub struct WeakAssetHandle<T> {
    id: u64,
    inner: Weak<Slot<T>>,
}

impl<T> WeakAssetHandle<T> {
    /// Get the unique ID of the resource
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Check if some strong handle still keeps the resource alive
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakAssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Weak::clone(&self.inner),
        }
    }
}
