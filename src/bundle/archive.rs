//! Default bundle container format
//!
//! An archive is a versioned list of named entries, each tagged with its
//! resource kind, encoded with bincode:
//!
//! ```text
//! magic "BNDL" | version | [ { name, kind, data } ... ]
//! ```
//!
//! Entry data per kind:
//! - text: raw bytes
//! - texture: PNG or JPEG, decoded to RGBA8
//! - audio: bincode-encoded [`AudioClip`]
//! - material, prefab: RON documents
//! - shader: UTF-8 source

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::container::{BundleContainer, BundleDecoder, DecodeRequest, RawObject};
use crate::assets::{AudioClip, Material, Prefab, ResourceKind, Shader, TextAsset, Texture};
use crate::storage::{AsyncRequest, Blob, LoadPriority, RequestPoll};

/// Leading bytes of every archive
pub const ARCHIVE_MAGIC: [u8; 4] = *b"BNDL";

/// Archive format version written by this crate
pub const ARCHIVE_VERSION: u32 = 1;

/// Errors raised while reading or writing archives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The data does not start with [`ARCHIVE_MAGIC`]
    BadMagic,
    /// The archive was written by an incompatible version
    UnsupportedVersion(u32),
    /// An entry payload could not be encoded
    EncodeError(String),
    /// The archive structure could not be decoded
    DecodeError(String),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "not a bundle archive"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported archive version {v}"),
            Self::EncodeError(e) => write!(f, "Encode error: {e}"),
            Self::DecodeError(e) => write!(f, "Decode error: {e}"),
        }
    }
}

impl std::error::Error for ArchiveError {}

/// One named entry of an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Resource name
    pub name: String,
    /// What the data decodes to
    pub kind: ResourceKind,
    /// Encoded payload
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct ArchiveFile {
    magic: [u8; 4],
    version: u32,
    entries: Vec<ArchiveEntry>,
}

/// An archive in memory. Doubles as the loaded container.
#[derive(Debug, Clone, Default)]
pub struct BundleArchive {
    name: String,
    entries: FxHashMap<String, ArchiveEntry>,
}

impl BundleArchive {
    /// Create an empty archive
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, kind: ResourceKind, data: Vec<u8>) {
        let name = name.into();
        self.entries.insert(name.clone(), ArchiveEntry { name, kind, data });
    }

    /// Add a raw entry
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>, kind: ResourceKind, data: Vec<u8>) -> Self {
        self.insert(name, kind, data);
        self
    }

    /// Add a text entry
    #[must_use]
    pub fn with_text(self, name: impl Into<String>, text: &str) -> Self {
        self.with_entry(name, ResourceKind::Text, text.as_bytes().to_vec())
    }

    /// Add an encoded image (PNG or JPEG)
    #[must_use]
    pub fn with_image(self, name: impl Into<String>, encoded: Vec<u8>) -> Self {
        self.with_entry(name, ResourceKind::Texture, encoded)
    }

    /// Add shader source
    #[must_use]
    pub fn with_shader(self, name: impl Into<String>, source: &str) -> Self {
        self.with_entry(name, ResourceKind::Shader, source.as_bytes().to_vec())
    }

    /// Add an audio clip
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be encoded
    pub fn with_audio(self, name: impl Into<String>, clip: &AudioClip) -> Result<Self, ArchiveError> {
        let data = bincode::serde::encode_to_vec(clip, bincode::config::standard())
            .map_err(|e| ArchiveError::EncodeError(e.to_string()))?;
        Ok(self.with_entry(name, ResourceKind::Audio, data))
    }

    /// Add a material
    ///
    /// # Errors
    ///
    /// Returns an error if the material cannot be serialized
    pub fn with_material(self, name: impl Into<String>, material: &Material) -> Result<Self, ArchiveError> {
        let ron_string = ron::ser::to_string(material).map_err(|e| ArchiveError::EncodeError(e.to_string()))?;
        Ok(self.with_entry(name, ResourceKind::Material, ron_string.into_bytes()))
    }

    /// Add a prefab
    ///
    /// # Errors
    ///
    /// Returns an error if the prefab cannot be serialized
    pub fn with_prefab(self, name: impl Into<String>, prefab: &Prefab) -> Result<Self, ArchiveError> {
        let ron_string = ron::ser::to_string(prefab).map_err(|e| ArchiveError::EncodeError(e.to_string()))?;
        Ok(self.with_entry(name, ResourceKind::Prefab, ron_string.into_bytes()))
    }

    /// Look up an entry
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.get(name)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the archive has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the archive
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let file = ArchiveFile {
            magic: ARCHIVE_MAGIC,
            version: ARCHIVE_VERSION,
            entries,
        };
        bincode::serde::encode_to_vec(&file, bincode::config::standard())
            .map_err(|e| ArchiveError::EncodeError(e.to_string()))
    }

    /// Decode an archive
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a supported archive
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        if !bytes.starts_with(&ARCHIVE_MAGIC) {
            return Err(ArchiveError::BadMagic);
        }
        let (file, _): (ArchiveFile, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| ArchiveError::DecodeError(e.to_string()))?;
        if file.version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(file.version));
        }

        let entries = file
            .entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        Ok(Self {
            name: String::new(),
            entries,
        })
    }

    fn materialize(entry: &ArchiveEntry) -> Result<RawObject, String> {
        let object: RawObject = match entry.kind {
            ResourceKind::Text => Box::new(TextAsset {
                bytes: entry.data.clone(),
            }),
            ResourceKind::Texture => {
                let image = image::load_from_memory(&entry.data).map_err(|e| e.to_string())?;
                let rgba = image.to_rgba8();
                Box::new(Texture {
                    width: rgba.width(),
                    height: rgba.height(),
                    pixels: rgba.into_raw(),
                })
            }
            ResourceKind::Audio => {
                let (clip, _): (AudioClip, _) =
                    bincode::serde::decode_from_slice(&entry.data, bincode::config::standard())
                        .map_err(|e| e.to_string())?;
                Box::new(clip)
            }
            ResourceKind::Material => {
                let text = std::str::from_utf8(&entry.data).map_err(|e| e.to_string())?;
                Box::new(ron::from_str::<Material>(text).map_err(|e| e.to_string())?)
            }
            ResourceKind::Shader => {
                let source = String::from_utf8(entry.data.clone()).map_err(|e| e.to_string())?;
                Box::new(Shader { source })
            }
            ResourceKind::Prefab => {
                let text = std::str::from_utf8(&entry.data).map_err(|e| e.to_string())?;
                Box::new(ron::from_str::<Prefab>(text).map_err(|e| e.to_string())?)
            }
        };
        Ok(object)
    }
}

impl BundleContainer for BundleArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn contains(&self, resource: &str) -> bool {
        self.entries.contains_key(resource)
    }

    fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    fn load_object(&self, resource: &str, kind: ResourceKind) -> Option<RawObject> {
        let entry = self.entries.get(resource)?;
        if entry.kind != kind {
            log::debug!(
                "{}/{resource} is a {}, not a {}",
                self.name,
                entry.kind.name(),
                kind.name()
            );
            return None;
        }
        match Self::materialize(entry) {
            Ok(object) => Some(object),
            Err(e) => {
                log::warn!("Failed to decode {} {}/{resource}: {e}", kind.name(), self.name);
                None
            }
        }
    }

    fn unload(&mut self, destroy_loaded_objects: bool) {
        // Materialized objects own copies of their data, so the flag only
        // changes what gets logged.
        log::debug!(
            "Unloading archive {} ({} entries, destroy_loaded_objects={destroy_loaded_objects})",
            self.name,
            self.entries.len()
        );
        self.entries.clear();
    }
}

/// Blob decode that completes on its first tick
struct ArchiveDecode {
    blob: Option<Blob>,
    result: Option<Result<BundleArchive, ArchiveError>>,
}

impl AsyncRequest for ArchiveDecode {
    type Output = Box<dyn BundleContainer>;

    fn poll(&mut self) -> RequestPoll {
        if let Some(blob) = self.blob.take() {
            self.result = Some(BundleArchive::from_bytes(&blob));
        }
        RequestPoll::Done
    }

    fn finish(&mut self) -> Result<Box<dyn BundleContainer>, String> {
        match self.result.take() {
            Some(Ok(archive)) => Ok(Box::new(archive)),
            Some(Err(e)) => Err(e.to_string()),
            None => Err("archive decode was not polled".to_string()),
        }
    }
}

/// [`BundleDecoder`] for [`BundleArchive`] data
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveDecoder;

impl BundleDecoder for ArchiveDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn BundleContainer>, String> {
        BundleArchive::from_bytes(bytes)
            .map(|archive| Box::new(archive) as Box<dyn BundleContainer>)
            .map_err(|e| e.to_string())
    }

    fn decode_blob(&self, blob: Blob, _priority: LoadPriority) -> DecodeRequest {
        Box::new(ArchiveDecode {
            blob: Some(blob),
            result: None,
        })
    }
}
