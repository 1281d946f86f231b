//! Resource lookup for loaded bundles
//!
//! Provides:
//! - Typed payloads for every supported resource kind
//! - Shared handles to materialized resources
//! - A lazy per-bundle resource index
//! - Composite `bundle###resource` keys

mod handle;
mod key;
mod payload;
mod storage;

pub use handle::{AssetHandle, WeakAssetHandle};
pub use key::{KEY_SEPARATOR, ResourceKey};
pub use payload::{
    AudioClip, Material, Prefab, PrefabNode, Resource, ResourceKind, Shader, TextAsset, Texture,
};
pub use storage::ResourceIndex;
