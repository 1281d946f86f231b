//! Loader facade
//!
//! [`AssetLoader`] ties the configuration, the storage tiers, the bundle
//! decoder and the container cache together. Loads are advanced by calling
//! [`AssetLoader::update`] once per frame, or by awaiting the future
//! returned from [`AssetLoader::load_bundle_async`].

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::assets::{AssetHandle, Resource, ResourceKey};
use crate::bundle::{ArchiveDecoder, BundleCache, BundleContainer, BundleDecoder};
use crate::core::{KeyError, LoadError, LoaderConfig};
use crate::storage::{FsPackageStore, FsStreamStore, LoadPriority, PathResolver, StorageTiers};

/// Loads bundles from the storage tiers and hands out their resources
pub struct AssetLoader {
    config: LoaderConfig,
    resolver: PathResolver,
    tiers: StorageTiers,
    decoder: Box<dyn BundleDecoder>,
    cache: BundleCache,
}

impl AssetLoader {
    /// Create a loader over explicit tiers and decoder
    pub fn new(config: LoaderConfig, tiers: StorageTiers, decoder: impl BundleDecoder + 'static) -> Self {
        Self {
            resolver: PathResolver::new(config.bundle_folder.clone()),
            config,
            tiers,
            decoder: Box::new(decoder),
            cache: BundleCache::new(),
        }
    }

    /// Create a loader reading archives from the directories in `config`
    pub fn from_config(config: LoaderConfig) -> Self {
        log::info!(
            "Bundle tiers: writable={}, readonly={}, streamed={}",
            config.writable_root.display(),
            config.readonly_root.display(),
            config.streamed_root.display()
        );
        let tiers = StorageTiers::new(
            FsStreamStore::new(&config.writable_root, config.chunk_size),
            FsPackageStore::new(&config.readonly_root, config.chunk_size),
            FsStreamStore::new(&config.streamed_root, config.chunk_size),
        );
        Self::new(config, tiers, ArchiveDecoder)
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Start loading a bundle. `on_complete` receives whether it succeeded.
    pub fn load(
        &mut self,
        name: &str,
        priority: LoadPriority,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce(bool) + 'static,
    ) {
        self.cache.load(
            name,
            priority,
            &self.resolver,
            &self.tiers,
            on_progress,
            move |result| on_complete(result.is_ok()),
        );
    }

    /// Start loading a bundle; `callback` runs only if the load succeeds
    pub fn load_and_callback(
        &mut self,
        name: &str,
        priority: LoadPriority,
        on_progress: impl FnMut(f32) + 'static,
        callback: impl FnOnce() + 'static,
    ) {
        let bundle = name.to_string();
        self.cache.load(
            name,
            priority,
            &self.resolver,
            &self.tiers,
            on_progress,
            move |result| match result {
                Ok(()) => callback(),
                Err(e) => log::error!("Bundle {bundle} could not be loaded: {e}"),
            },
        );
    }

    /// Load a bundle as a future. Every poll runs one [`Self::update`].
    pub fn load_bundle_async(
        &mut self,
        name: &str,
        priority: LoadPriority,
        on_progress: impl FnMut(f32) + 'static,
    ) -> LoadBundle<'_> {
        let outcome = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&outcome);
        self.cache.load(
            name,
            priority,
            &self.resolver,
            &self.tiers,
            on_progress,
            move |result| *sink.borrow_mut() = Some(result),
        );
        LoadBundle { loader: self, outcome }
    }

    /// Load a bundle at the configured default priority, without progress
    /// reporting
    pub fn preload(&mut self, name: &str) -> LoadBundle<'_> {
        let priority = self.config.default_priority;
        self.load_bundle_async(name, priority, |_| {})
    }

    /// Advance every pending load by one step. Call once per frame.
    pub fn update(&mut self) {
        if self.cache.pending_loads() > 0 {
            log::trace!("Ticking {} pending bundle loads", self.cache.pending_loads());
        }
        self.cache.tick(&self.tiers, self.decoder.as_ref());
    }

    /// Whether a bundle is loaded
    #[must_use]
    pub fn has_loaded(&self, name: &str) -> bool {
        self.cache.has_loaded(name)
    }

    /// Whether a bundle is still being fetched
    #[must_use]
    pub fn is_loading(&self, name: &str) -> bool {
        self.cache.in_flight(name)
    }

    /// Number of loads in flight
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.cache.pending_loads()
    }

    /// Names of all loaded bundles
    #[must_use]
    pub fn loaded_bundles(&self) -> Vec<String> {
        self.cache.loaded_names()
    }

    /// The container of a loaded bundle
    #[must_use]
    pub fn get_bundle(&self, name: &str) -> Option<&dyn BundleContainer> {
        self.cache.get(name)
    }

    /// Unload a bundle. Unknown names are logged and ignored.
    pub fn unload_bundle(&mut self, name: &str, destroy_loaded_objects: bool) -> bool {
        self.cache.unload(name, destroy_loaded_objects)
    }

    /// Unload every bundle
    pub fn unload_all(&mut self, destroy_loaded_objects: bool) {
        self.cache.unload_all(destroy_loaded_objects);
    }

    /// Get a resource of a loaded bundle
    pub fn get<T: Resource>(&mut self, bundle: &str, resource: &str) -> Option<AssetHandle<T>> {
        self.cache.get_resource(bundle, resource)
    }

    /// Get a resource by composite `bundle###resource` key
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Malformed`] if the key does not have exactly two
    /// non-empty parts.
    pub fn get_by_key<T: Resource>(&mut self, key: &str) -> Result<Option<AssetHandle<T>>, KeyError> {
        let key = ResourceKey::parse(key)?;
        Ok(self.get(key.bundle, key.resource))
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("config", &self.config)
            .field("tiers", &self.tiers)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Future returned by [`AssetLoader::load_bundle_async`]
#[must_use = "futures do nothing unless polled"]
pub struct LoadBundle<'a> {
    loader: &'a mut AssetLoader,
    outcome: Rc<RefCell<Option<Result<(), LoadError>>>>,
}

impl Future for LoadBundle<'_> {
    type Output = Result<(), LoadError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(result) = this.outcome.borrow_mut().take() {
            return Poll::Ready(result);
        }

        this.loader.update();

        match this.outcome.borrow_mut().take() {
            Some(result) => Poll::Ready(result),
            None => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}
