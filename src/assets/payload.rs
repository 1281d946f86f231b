//! Resource payload types
//!
//! These are the plain-data results of materializing a named entry of a
//! bundle. Rendering and audio runtimes build their own objects from them.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// The kind of payload a bundle entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Raw text or binary data
    Text,
    /// Decoded RGBA8 image
    Texture,
    /// PCM audio clip
    Audio,
    /// Material description
    Material,
    /// Shading program source
    Shader,
    /// Composite object (node hierarchy)
    Prefab,
}

impl ResourceKind {
    /// Human-readable name for logging
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Texture => "texture",
            Self::Audio => "audio",
            Self::Material => "material",
            Self::Shader => "shader",
            Self::Prefab => "prefab",
        }
    }
}

/// A payload type that can be looked up through a resource index.
pub trait Resource: Send + Sync + 'static {
    /// Entry kind this payload is materialized from
    const KIND: ResourceKind;
}

/// Text or arbitrary binary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAsset {
    /// Raw bytes as stored in the bundle
    pub bytes: Vec<u8>,
}

impl TextAsset {
    /// The bytes as UTF-8, if they are valid UTF-8
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

impl Resource for TextAsset {
    const KIND: ResourceKind = ResourceKind::Text;
}

/// A decoded image in RGBA8 layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major RGBA8 pixels
    pub pixels: Vec<u8>,
}

impl Resource for Texture {
    const KIND: ResourceKind = ResourceKind::Texture;
}

/// Interleaved f32 PCM samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Number of interleaved channels
    pub channels: u16,
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Interleaved samples
    pub samples: Vec<f32>,
}

impl AudioClip {
    /// Clip length in seconds
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / f32::from(self.channels) / self.sample_rate as f32
    }
}

impl Resource for AudioClip {
    const KIND: ResourceKind = ResourceKind::Audio;
}

/// Material description, authored as RON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Shader resource this material is drawn with
    pub shader: String,
    /// Base color
    #[serde(default = "Material::default_color")]
    pub color: Vec3,
    /// Texture slots mapped to composite resource keys
    #[serde(default)]
    pub textures: HashMap<String, String>,
    /// Scalar parameters
    #[serde(default)]
    pub params: HashMap<String, f32>,
}

impl Material {
    fn default_color() -> Vec3 {
        Vec3::ONE
    }
}

impl Resource for Material {
    const KIND: ResourceKind = ResourceKind::Material;
}

/// Shading program source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    /// Program source text
    pub source: String,
}

impl Resource for Shader {
    const KIND: ResourceKind = ResourceKind::Shader;
}

/// A node of a composite object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabNode {
    /// Node name
    pub name: String,
    /// Local translation
    #[serde(default)]
    pub translation: Vec3,
    /// Free-form component data
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Child nodes
    #[serde(default)]
    pub children: Vec<PrefabNode>,
}

/// Composite object, authored as RON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefab {
    /// Root node
    pub root: PrefabNode,
}

impl Prefab {
    /// Total number of nodes in the hierarchy
    #[must_use]
    pub fn node_count(&self) -> usize {
        fn count(node: &PrefabNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

impl Resource for Prefab {
    const KIND: ResourceKind = ResourceKind::Prefab;
}
