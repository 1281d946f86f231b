//! Bundle containers, the default archive format and the container cache

mod archive;
mod cache;
mod container;

pub use archive::{ARCHIVE_MAGIC, ARCHIVE_VERSION, ArchiveDecoder, ArchiveEntry, ArchiveError, BundleArchive};
pub use cache::{BundleCache, CompletionCallback, ProgressCallback};
pub use container::{BundleContainer, BundleDecoder, DecodeRequest, RawObject};
