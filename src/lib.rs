//! Runtime loader for packaged asset bundles
//!
//! This crate provides:
//! - Tiered bundle resolution (writable cache, read-only package, streamed)
//! - Per-tick, cooperatively scheduled fetches with progress reporting
//! - A cache holding at most one container per bundle
//! - Lazy, typed resource lookup by name or `bundle###resource` key

pub mod assets;
pub mod bundle;
pub mod core;
pub mod loader;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use glam;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{
        AssetHandle, AudioClip, Material, Prefab, Resource, ResourceKey, ResourceKind, Shader,
        TextAsset, Texture,
    };
    pub use crate::bundle::{ArchiveDecoder, BundleArchive, BundleContainer, BundleDecoder};
    pub use crate::core::{KeyError, LoadError, LoaderConfig};
    pub use crate::loader::{AssetLoader, LoadBundle};
    pub use crate::storage::{LoadPriority, StorageTier, StorageTiers};
    pub use glam::Vec3;
}
