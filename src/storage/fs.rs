//! Filesystem-backed tiers
//!
//! Each tier is a directory. Transfers read a fixed number of bytes per
//! tick so a large bundle spreads over several frames.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{
    AsyncRequest, Blob, BlobRequest, ByteStream, LoadPriority, PackageStore, RequestPoll,
    StreamStore, TierStore, TransportAddress,
};

const FILE_SCHEME: &str = "file://";

/// Chunked read of one file. The file handle is closed as soon as the read
/// completes or fails, and at the latest when the request is dropped.
struct ChunkedRead {
    path: PathBuf,
    chunk_size: usize,
    file: Option<File>,
    total: u64,
    buffer: Vec<u8>,
    error: Option<String>,
    done: bool,
}

impl ChunkedRead {
    fn new(path: PathBuf, chunk_size: usize) -> Self {
        Self {
            path,
            chunk_size: chunk_size.max(1),
            file: None,
            total: 0,
            buffer: Vec::new(),
            error: None,
            done: false,
        }
    }

    fn fail(&mut self, error: impl std::fmt::Display) -> RequestPoll {
        self.error = Some(format!("{}: {error}", self.path.display()));
        self.file = None;
        self.done = true;
        RequestPoll::Done
    }

    fn progress(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.buffer.len() as f64 / self.total as f64) as f32
        }
    }
}

impl AsyncRequest for ChunkedRead {
    type Output = Vec<u8>;

    fn poll(&mut self) -> RequestPoll {
        if self.done {
            return RequestPoll::Done;
        }

        if self.file.is_none() {
            let opened = File::open(&self.path).and_then(|file| Ok((file.metadata()?.len(), file)));
            match opened {
                Ok((total, file)) => {
                    self.total = total;
                    self.file = Some(file);
                }
                Err(e) => return self.fail(e),
            }
        }

        let Some(file) = self.file.as_mut() else {
            return self.fail("file handle lost");
        };
        let read = file
            .by_ref()
            .take(self.chunk_size as u64)
            .read_to_end(&mut self.buffer);
        match read {
            Ok(0) => {
                self.file = None;
                self.done = true;
                RequestPoll::Done
            }
            Ok(_) if self.buffer.len() as u64 >= self.total => {
                self.file = None;
                self.done = true;
                RequestPoll::Done
            }
            Ok(_) => RequestPoll::Pending(self.progress()),
            Err(e) => self.fail(e),
        }
    }

    fn finish(&mut self) -> Result<Vec<u8>, String> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if !self.done {
            return Err(format!("{}: read not finished", self.path.display()));
        }
        Ok(std::mem::take(&mut self.buffer))
    }
}

/// Blob-producing wrapper around [`ChunkedRead`]
struct BlobRead(ChunkedRead);

impl AsyncRequest for BlobRead {
    type Output = Blob;

    fn poll(&mut self) -> RequestPoll {
        self.0.poll()
    }

    fn finish(&mut self) -> Result<Blob, String> {
        self.0.finish().map(Blob::from)
    }
}

/// A stream tier rooted at a directory, addressed with `file://` locators
#[derive(Debug, Clone)]
pub struct FsStreamStore {
    root: PathBuf,
    chunk_size: usize,
}

impl FsStreamStore {
    /// Create a store reading `chunk_size` bytes per tick below `root`
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            root: root.into(),
            chunk_size,
        }
    }

    /// Directory this tier reads from
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TierStore for FsStreamStore {
    fn exists(&self, path: &str) -> bool {
        self.root.join(path).is_file()
    }
}

impl StreamStore for FsStreamStore {
    fn locate(&self, path: &str) -> TransportAddress {
        TransportAddress(format!("{FILE_SCHEME}{}", self.root.join(path).display()))
    }

    fn open(&self, address: &TransportAddress, priority: LoadPriority) -> ByteStream {
        let path = address
            .as_str()
            .strip_prefix(FILE_SCHEME)
            .unwrap_or(address.as_str());
        log::trace!("Streaming {path} at {priority:?} priority");
        Box::new(ChunkedRead::new(PathBuf::from(path), self.chunk_size))
    }
}

/// The read-only package tier rooted at a directory
#[derive(Debug, Clone)]
pub struct FsPackageStore {
    root: PathBuf,
    chunk_size: usize,
}

impl FsPackageStore {
    /// Create a package store reading `chunk_size` bytes per tick below `root`
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            root: root.into(),
            chunk_size,
        }
    }
}

impl TierStore for FsPackageStore {
    fn exists(&self, path: &str) -> bool {
        self.root.join(path).is_file()
    }
}

impl PackageStore for FsPackageStore {
    fn load_blob(&self, path: &str, priority: LoadPriority) -> BlobRequest {
        log::trace!("Loading package blob {path} at {priority:?} priority");
        Box::new(BlobRead(ChunkedRead::new(self.root.join(path), self.chunk_size)))
    }

    fn release_blob(&self, blob: Blob) {
        log::trace!("Releasing package blob ({} bytes)", blob.len());
        drop(blob);
    }
}
