//! Loader configuration
//!
//! Supports reading the configuration from RON or JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::storage::LoadPriority;

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Folder inside every tier that holds the bundles
    pub bundle_folder: String,
    /// Root of the writable local cache tier
    pub writable_root: PathBuf,
    /// Root of the read-only installed package tier
    pub readonly_root: PathBuf,
    /// Root of the streamed package tier
    pub streamed_root: PathBuf,
    /// Bytes read per scheduler tick by the filesystem tiers
    pub chunk_size: usize,
    /// Priority of loads started without an explicit priority
    /// (`AssetLoader::preload`)
    pub default_priority: LoadPriority,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            bundle_folder: String::from("bundles"),
            writable_root: PathBuf::from("cache"),
            readonly_root: PathBuf::from("package"),
            streamed_root: PathBuf::from("streaming"),
            chunk_size: 64 * 1024,
            default_priority: LoadPriority::High,
        }
    }
}

impl LoaderConfig {
    /// Set the bundle folder name
    pub fn with_bundle_folder(mut self, folder: impl Into<String>) -> Self {
        self.bundle_folder = folder.into();
        self
    }

    /// Set the three tier roots at once
    pub fn with_roots(
        mut self,
        writable: impl Into<PathBuf>,
        readonly: impl Into<PathBuf>,
        streamed: impl Into<PathBuf>,
    ) -> Self {
        self.writable_root = writable.into();
        self.readonly_root = readonly.into();
        self.streamed_root = streamed.into();
        self
    }

    /// Set the per-tick read size (clamped to at least one byte)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the default load priority
    pub fn with_default_priority(mut self, priority: LoadPriority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Load a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        ron::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
