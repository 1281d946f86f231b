//! Storage tiers and the collaborators that back them
//!
//! A bundle may live in one of three tiers. The loader only talks to tiers
//! through the narrow traits defined here:
//! - [`TierStore`] answers whether a logical path exists
//! - [`StreamStore`] translates a path into a transport address and opens a
//!   polled byte stream on it
//! - [`PackageStore`] loads opaque blobs from the read-only package
//!
//! Every transfer is an [`AsyncRequest`] that the scheduler polls once per
//! tick until it reports completion.

mod fetch;
mod fs;
mod resolver;

pub use fetch::{FetchJob, FetchPoll};
pub use fs::{FsPackageStore, FsStreamStore};
pub use resolver::{PathResolver, ResolvedBundle};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where a bundle was found, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTier {
    /// Writable local cache (downloaded or patched bundles)
    WritableCache,
    /// Read-only package installed with the application
    BundledReadonly,
    /// Streamed or remote package
    StreamedRemote,
}

impl StorageTier {
    /// All tiers in the order they are checked
    pub const RESOLUTION_ORDER: [StorageTier; 3] = [
        StorageTier::WritableCache,
        StorageTier::BundledReadonly,
        StorageTier::StreamedRemote,
    ];
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WritableCache => "writable-cache",
            Self::BundledReadonly => "bundled-readonly",
            Self::StreamedRemote => "streamed-remote",
        };
        f.write_str(name)
    }
}

/// Scheduling hint forwarded to the transports. Never affects results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LoadPriority {
    /// Background work
    Low,
    /// Below normal
    BelowNormal,
    /// Normal
    Normal,
    /// Needed as soon as possible
    #[default]
    High,
}

/// Transport-level locator produced by a tier for a logical path,
/// e.g. `file:///data/cache/bundles/ui`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportAddress(pub String);

impl TransportAddress {
    /// The address as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque byte blob loaded from the read-only package
pub type Blob = Arc<[u8]>;

/// Result of polling a transfer for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestPoll {
    /// Still running, with progress in `[0, 1]`
    Pending(f32),
    /// Finished; call [`AsyncRequest::finish`] for the result
    Done,
}

/// A transfer advanced cooperatively, one poll per scheduler tick.
///
/// Dropping the request releases whatever transport handle it holds.
pub trait AsyncRequest {
    /// What the transfer produces
    type Output;

    /// Advance the transfer by one tick
    fn poll(&mut self) -> RequestPoll;

    /// Take the result once [`RequestPoll::Done`] was returned.
    ///
    /// # Errors
    ///
    /// Returns the transport's error message if the transfer failed.
    fn finish(&mut self) -> Result<Self::Output, String>;
}

/// Byte stream opened on a transport address
pub type ByteStream = Box<dyn AsyncRequest<Output = Vec<u8>>>;

/// Blob load from the read-only package
pub type BlobRequest = Box<dyn AsyncRequest<Output = Blob>>;

/// Existence check shared by all tiers
pub trait TierStore {
    /// Whether the logical path exists in this tier
    fn exists(&self, path: &str) -> bool;
}

/// A tier read through byte streams (writable cache, streamed remote)
pub trait StreamStore: TierStore {
    /// Translate a logical path into a transport address
    fn locate(&self, path: &str) -> TransportAddress;

    /// Open a byte stream on an address
    fn open(&self, address: &TransportAddress, priority: LoadPriority) -> ByteStream;
}

/// The read-only installed package
pub trait PackageStore: TierStore {
    /// Start loading the blob stored at a logical path
    fn load_blob(&self, path: &str, priority: LoadPriority) -> BlobRequest;

    /// Hand a blob back once it is no longer needed
    fn release_blob(&self, blob: Blob);
}

/// The three tier collaborators the loader consults
pub struct StorageTiers {
    /// Writable local cache
    pub writable: Box<dyn StreamStore>,
    /// Read-only installed package
    pub readonly: Box<dyn PackageStore>,
    /// Streamed or remote package
    pub streamed: Box<dyn StreamStore>,
}

impl StorageTiers {
    /// Bundle the three tier collaborators
    pub fn new(
        writable: impl StreamStore + 'static,
        readonly: impl PackageStore + 'static,
        streamed: impl StreamStore + 'static,
    ) -> Self {
        Self {
            writable: Box::new(writable),
            readonly: Box::new(readonly),
            streamed: Box::new(streamed),
        }
    }

    /// Existence check for a given tier
    #[must_use]
    pub fn exists(&self, tier: StorageTier, path: &str) -> bool {
        match tier {
            StorageTier::WritableCache => self.writable.exists(path),
            StorageTier::BundledReadonly => self.readonly.exists(path),
            StorageTier::StreamedRemote => self.streamed.exists(path),
        }
    }

    /// The stream store for a stream-backed tier
    #[must_use]
    pub fn stream_store(&self, tier: StorageTier) -> Option<&dyn StreamStore> {
        match tier {
            StorageTier::WritableCache => Some(self.writable.as_ref()),
            StorageTier::StreamedRemote => Some(self.streamed.as_ref()),
            StorageTier::BundledReadonly => None,
        }
    }
}

impl fmt::Debug for StorageTiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageTiers").finish_non_exhaustive()
    }
}
