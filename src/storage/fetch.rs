//! Tier fetch state machines
//!
//! A fetch is advanced once per scheduler tick. While it is pending it
//! reports progress; the tick that completes it reports nothing and yields
//! either a decoded container or a [`LoadError`].
//!
//! Two shapes exist:
//! - **Stream** (writable cache, streamed remote): one byte stream, decoded
//!   synchronously once complete.
//! - **Package** (bundled read-only): load a blob, then decode it
//!   asynchronously, then hand the blob back to the package store.

use std::sync::Arc;

use super::{
    Blob, BlobRequest, ByteStream, LoadPriority, RequestPoll, ResolvedBundle, StorageTier,
    StorageTiers, TransportAddress,
};
use crate::bundle::{BundleContainer, BundleDecoder, DecodeRequest};
use crate::core::LoadError;

/// Outcome of advancing a fetch by one tick
pub enum FetchPoll {
    /// Still running
    Pending,
    /// Finished, successfully or not
    Ready(Result<Box<dyn BundleContainer>, LoadError>),
}

/// Byte-stream fetch used by the writable-cache and streamed tiers
struct StreamFetch {
    address: TransportAddress,
    stream: Option<ByteStream>,
}

impl StreamFetch {
    fn poll(&mut self, decoder: &dyn BundleDecoder, on_progress: &mut dyn FnMut(f32)) -> FetchPoll {
        let Some(stream) = self.stream.as_mut() else {
            return FetchPoll::Ready(Err(LoadError::Transport(format!(
                "stream for {} already consumed",
                self.address
            ))));
        };

        if let RequestPoll::Pending(progress) = stream.poll() {
            on_progress(progress.clamp(0.0, 1.0));
            return FetchPoll::Pending;
        }

        // The stream handle is released here on every path
        let result = self.stream.take().map(|mut stream| stream.finish());
        match result {
            Some(Ok(bytes)) => FetchPoll::Ready(decoder.decode(&bytes).map_err(LoadError::Decode)),
            Some(Err(error)) => {
                FetchPoll::Ready(Err(LoadError::Transport(format!("{}: {error}", self.address))))
            }
            None => FetchPoll::Ready(Err(LoadError::Transport(format!(
                "stream for {} already consumed",
                self.address
            )))),
        }
    }
}

enum PackageStage {
    LoadingBlob(BlobRequest),
    Decoding { blob: Blob, request: DecodeRequest },
    Finished,
}

/// Two-stage fetch used by the bundled read-only tier
struct PackageFetch {
    path: String,
    priority: LoadPriority,
    stage: PackageStage,
}

impl PackageFetch {
    fn poll(
        &mut self,
        tiers: &StorageTiers,
        decoder: &dyn BundleDecoder,
        on_progress: &mut dyn FnMut(f32),
    ) -> FetchPoll {
        loop {
            match std::mem::replace(&mut self.stage, PackageStage::Finished) {
                PackageStage::LoadingBlob(mut request) => match request.poll() {
                    RequestPoll::Pending(progress) => {
                        on_progress(progress.clamp(0.0, 1.0));
                        self.stage = PackageStage::LoadingBlob(request);
                        return FetchPoll::Pending;
                    }
                    RequestPoll::Done => match request.finish() {
                        Ok(blob) => {
                            log::trace!("Blob {} loaded ({} bytes), decoding", self.path, blob.len());
                            let request = decoder.decode_blob(Arc::clone(&blob), self.priority);
                            self.stage = PackageStage::Decoding { blob, request };
                            // Decoding starts within the same tick
                        }
                        Err(error) => {
                            return FetchPoll::Ready(Err(LoadError::Transport(format!(
                                "{}: {error}",
                                self.path
                            ))));
                        }
                    },
                },
                PackageStage::Decoding { blob, mut request } => match request.poll() {
                    RequestPoll::Pending(progress) => {
                        on_progress(progress.clamp(0.0, 1.0));
                        self.stage = PackageStage::Decoding { blob, request };
                        return FetchPoll::Pending;
                    }
                    RequestPoll::Done => {
                        let result = request.finish().map_err(LoadError::Decode);
                        drop(request);
                        tiers.readonly.release_blob(blob);
                        return FetchPoll::Ready(result);
                    }
                },
                PackageStage::Finished => {
                    return FetchPoll::Ready(Err(LoadError::Transport(format!(
                        "package fetch for {} already finished",
                        self.path
                    ))));
                }
            }
        }
    }
}

enum FetchKind {
    Stream(StreamFetch),
    Package(PackageFetch),
}

/// A running fetch of one bundle from one tier
pub struct FetchJob {
    tier: StorageTier,
    kind: FetchKind,
}

impl FetchJob {
    /// Start fetching a resolved bundle. Opens the tier's transport at once.
    pub fn start(resolved: &ResolvedBundle, tiers: &StorageTiers, priority: LoadPriority) -> Self {
        let kind = match tiers.stream_store(resolved.tier) {
            Some(store) => {
                let address = store.locate(&resolved.path);
                log::debug!("Opening {} stream {address}", resolved.tier);
                let stream = store.open(&address, priority);
                FetchKind::Stream(StreamFetch {
                    address,
                    stream: Some(stream),
                })
            }
            None => {
                log::debug!("Loading {} blob {}", resolved.tier, resolved.path);
                let request = tiers.readonly.load_blob(&resolved.path, priority);
                FetchKind::Package(PackageFetch {
                    path: resolved.path.clone(),
                    priority,
                    stage: PackageStage::LoadingBlob(request),
                })
            }
        };

        Self {
            tier: resolved.tier,
            kind,
        }
    }

    /// Tier this fetch reads from
    #[must_use]
    pub const fn tier(&self) -> StorageTier {
        self.tier
    }

    /// Advance the fetch by one tick
    pub fn poll(
        &mut self,
        tiers: &StorageTiers,
        decoder: &dyn BundleDecoder,
        on_progress: &mut dyn FnMut(f32),
    ) -> FetchPoll {
        match &mut self.kind {
            FetchKind::Stream(fetch) => fetch.poll(decoder, on_progress),
            FetchKind::Package(fetch) => fetch.poll(tiers, decoder, on_progress),
        }
    }
}
