//! Decoded bundle containers

use std::any::Any;

use crate::assets::ResourceKind;
use crate::storage::{AsyncRequest, Blob, LoadPriority};

/// A type-erased materialized resource, downcast by the resource index.
pub type RawObject = Box<dyn Any + Send + Sync>;

/// A decoded bundle as produced by a [`BundleDecoder`](crate::bundle::BundleDecoder).
///
/// Containers know how to turn a named entry into a payload of a given
/// kind. They do not cache: caching is the resource index's job.
pub trait BundleContainer {
    /// Bundle name this container was loaded under
    fn name(&self) -> &str;

    /// Tag the container with its bundle name
    fn set_name(&mut self, name: &str);

    /// Whether an entry with this name exists
    fn contains(&self, resource: &str) -> bool;

    /// Names of all entries
    fn resource_names(&self) -> Vec<String>;

    /// Materialize an entry as the given kind.
    ///
    /// Returns `None` when the entry is missing, holds another kind, or
    /// cannot be decoded. The returned object must downcast to the payload
    /// type registered for `kind`.
    fn load_object(&self, resource: &str, kind: ResourceKind) -> Option<RawObject>;

    /// Release the container's data. With `destroy_loaded_objects` the
    /// container also drops anything it shares with materialized objects.
    fn unload(&mut self, destroy_loaded_objects: bool);
}

impl std::fmt::Debug for dyn BundleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleContainer")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Asynchronous decode of a blob into a container
pub type DecodeRequest = Box<dyn AsyncRequest<Output = Box<dyn BundleContainer>>>;

/// Turns fetched bytes into containers.
pub trait BundleDecoder {
    /// Decode bytes delivered by a byte stream.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the bytes are not a valid bundle.
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn BundleContainer>, String>;

    /// Start decoding a blob from the read-only package. The request owns
    /// its own reference to the blob.
    fn decode_blob(&self, blob: Blob, priority: LoadPriority) -> DecodeRequest;
}
