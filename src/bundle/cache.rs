//! Bundle container cache
//!
//! Owns every loaded container together with its resource index, and every
//! fetch still in flight. At most one container exists per bundle name, and
//! concurrent requests for a bundle that is still loading join the running
//! fetch instead of starting another one.

use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};

use super::container::{BundleContainer, BundleDecoder};
use crate::assets::{AssetHandle, Resource, ResourceIndex};
use crate::core::LoadError;
use crate::storage::{FetchJob, FetchPoll, LoadPriority, PathResolver, StorageTiers};

/// Receives fractional progress while a load is pending
pub type ProgressCallback = Box<dyn FnMut(f32)>;

/// Receives the outcome of a load, exactly once
pub type CompletionCallback = Box<dyn FnOnce(Result<(), LoadError>)>;

struct Waiter {
    on_progress: ProgressCallback,
    on_complete: CompletionCallback,
}

/// A fetch in flight and everyone waiting for it
struct LoadTask {
    job: FetchJob,
    waiters: SmallVec<[Waiter; 1]>,
}

/// A loaded container and its lazily filled index
struct LoadedBundle {
    container: Box<dyn BundleContainer>,
    index: ResourceIndex,
}

/// Loaded containers keyed by bundle name, plus the loads in flight
#[derive(Default)]
pub struct BundleCache {
    loaded: FxHashMap<String, LoadedBundle>,
    in_flight: FxHashMap<String, LoadTask>,
}

impl BundleCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a container is loaded under this name
    #[must_use]
    pub fn has_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// The loaded container, if any
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BundleContainer> {
        self.loaded.get(name).map(|bundle| bundle.container.as_ref())
    }

    /// Whether a fetch for this name is running
    #[must_use]
    pub fn in_flight(&self, name: &str) -> bool {
        self.in_flight.contains_key(name)
    }

    /// Number of fetches running
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.in_flight.len()
    }

    /// Names of all loaded bundles, sorted
    #[must_use]
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.loaded.keys().cloned().collect();
        names.sort();
        names
    }

    /// Request a bundle.
    ///
    /// - Already loaded: `on_complete(Ok(()))` runs immediately.
    /// - Already loading: the callbacks join the running fetch.
    /// - Not in any tier: `on_complete` runs immediately with
    ///   [`LoadError::TierNotFound`].
    ///
    /// Otherwise a fetch starts and is advanced by [`Self::tick`].
    pub fn load(
        &mut self,
        name: &str,
        priority: LoadPriority,
        resolver: &PathResolver,
        tiers: &StorageTiers,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce(Result<(), LoadError>) + 'static,
    ) {
        if self.loaded.contains_key(name) {
            log::debug!("Bundle {name} already loaded");
            on_complete(Ok(()));
            return;
        }

        let waiter = Waiter {
            on_progress: Box::new(on_progress),
            on_complete: Box::new(on_complete),
        };

        if let Some(task) = self.in_flight.get_mut(name) {
            log::debug!("Joining in-flight load of bundle {name}");
            task.waiters.push(waiter);
            return;
        }

        let Some(resolved) = resolver.resolve(tiers, name) else {
            let error = LoadError::TierNotFound(name.to_string());
            log::error!("Failed to load bundle {name}: {error}");
            (waiter.on_complete)(Err(error));
            return;
        };

        log::info!("Loading bundle {name} from {} ({})", resolved.tier, resolved.path);
        let job = FetchJob::start(&resolved, tiers, priority);
        self.in_flight.insert(
            name.to_string(),
            LoadTask {
                job,
                waiters: smallvec![waiter],
            },
        );
    }

    /// Advance every in-flight fetch by one step
    pub fn tick(&mut self, tiers: &StorageTiers, decoder: &dyn BundleDecoder) {
        let mut finished = Vec::new();

        for (name, task) in &mut self.in_flight {
            let LoadTask { job, waiters } = task;
            let mut report = |progress: f32| {
                for waiter in waiters.iter_mut() {
                    (waiter.on_progress)(progress);
                }
            };
            if let FetchPoll::Ready(result) = job.poll(tiers, decoder, &mut report) {
                finished.push((name.clone(), result));
            }
        }

        for (name, result) in finished {
            if let Some(task) = self.in_flight.remove(&name) {
                self.complete(name, task, result);
            }
        }
    }

    fn complete(
        &mut self,
        name: String,
        task: LoadTask,
        result: Result<Box<dyn BundleContainer>, LoadError>,
    ) {
        match result {
            Ok(mut container) => {
                container.set_name(&name);
                log::info!(
                    "Loaded bundle {name} from {} ({} resources)",
                    task.job.tier(),
                    container.resource_names().len()
                );
                let index = ResourceIndex::new(name.clone());
                self.loaded.insert(name, LoadedBundle { container, index });
                for waiter in task.waiters {
                    (waiter.on_complete)(Ok(()));
                }
            }
            Err(error) => {
                log::error!("Failed to load bundle {name}: {error}");
                for waiter in task.waiters {
                    (waiter.on_complete)(Err(error.clone()));
                }
            }
        }
    }

    /// Look up a resource of a loaded bundle, materializing it on first use
    pub fn get_resource<T: Resource>(&mut self, bundle: &str, resource: &str) -> Option<AssetHandle<T>> {
        let Some(loaded) = self.loaded.get_mut(bundle) else {
            log::debug!("Bundle {bundle} is not loaded");
            return None;
        };
        loaded.index.get::<T>(loaded.container.as_ref(), resource)
    }

    /// Unload a bundle: reset its index, then release the container.
    ///
    /// With `destroy_loaded_objects`, handles to its resources that callers
    /// still hold are invalidated too. Without it they keep their data.
    ///
    /// Returns `false` (and logs a warning) if nothing is loaded under
    /// `name`. A load still in flight is not cancelled.
    pub fn unload(&mut self, name: &str, destroy_loaded_objects: bool) -> bool {
        let Some(LoadedBundle { mut container, mut index }) = self.loaded.remove(name) else {
            if self.in_flight.contains_key(name) {
                log::warn!("Bundle {name} is still loading, unload ignored");
            } else {
                log::warn!("Unload of unknown bundle {name}");
            }
            return false;
        };

        let retained = index.reset(destroy_loaded_objects);
        if retained > 0 && destroy_loaded_objects {
            log::debug!("Invalidated {retained} resources of bundle {name} still held by callers");
        } else if retained > 0 {
            log::warn!("{retained} resources of bundle {name} are still referenced after unload");
        }
        drop(index);

        container.unload(destroy_loaded_objects);
        log::info!("Unloaded bundle {name}");
        true
    }

    /// Unload every loaded bundle
    pub fn unload_all(&mut self, destroy_loaded_objects: bool) {
        for name in self.loaded_names() {
            self.unload(&name, destroy_loaded_objects);
        }
    }
}

impl std::fmt::Debug for BundleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleCache")
            .field("loaded", &self.loaded_names())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Shader, TextAsset, Texture};
    use crate::testing::{Counters, MemoryDecoder, MemoryPackageStore, MemoryStreamStore, progress_log};
    use std::cell::RefCell;
    use std::rc::Rc;

    const UI: &str = "text title=Main Menu\ntexture icon=4x2\nshader unlit=fn main() {}\n";

    struct Fixture {
        cache: BundleCache,
        resolver: PathResolver,
        tiers: StorageTiers,
        decoder: MemoryDecoder,
        writable: Counters,
        readonly: Counters,
    }

    impl Fixture {
        fn new(writable: MemoryStreamStore, readonly: MemoryPackageStore) -> Self {
            let writable_counters = writable.counters();
            let readonly_counters = readonly.counters();
            Self {
                cache: BundleCache::new(),
                resolver: PathResolver::new("bundles"),
                tiers: StorageTiers::new(writable, readonly, MemoryStreamStore::new("remote")),
                decoder: MemoryDecoder::new(),
                writable: writable_counters,
                readonly: readonly_counters,
            }
        }

        fn load(&mut self, name: &str, on_progress: impl FnMut(f32) + 'static) -> Outcome {
            let (outcome, on_complete) = outcome();
            self.cache.load(
                name,
                LoadPriority::High,
                &self.resolver,
                &self.tiers,
                on_progress,
                on_complete,
            );
            outcome
        }

        fn run(&mut self) {
            for _ in 0..100 {
                if self.cache.pending_loads() == 0 {
                    return;
                }
                self.cache.tick(&self.tiers, &self.decoder);
            }
            panic!("loads never finished");
        }
    }

    type Outcome = Rc<RefCell<Option<Result<(), LoadError>>>>;

    fn outcome() -> (Outcome, impl FnOnce(Result<(), LoadError>) + 'static) {
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        (slot, move |result| *sink.borrow_mut() = Some(result))
    }

    fn writable_ui(ticks: u32) -> MemoryStreamStore {
        MemoryStreamStore::new("cache")
            .with_file("bundles/ui", UI)
            .with_ticks(ticks)
    }

    #[test]
    fn test_load_inserts_tagged_container() {
        let mut fx = Fixture::new(writable_ui(2), MemoryPackageStore::new());
        let (progress, on_progress) = progress_log();

        let outcome = fx.load("ui", on_progress);
        assert!(fx.cache.in_flight("ui"));
        assert!(!fx.cache.has_loaded("ui"));
        assert!(fx.cache.get("ui").is_none());

        fx.run();

        assert_eq!(*outcome.borrow(), Some(Ok(())));
        assert!(fx.cache.has_loaded("ui"));
        assert!(!fx.cache.in_flight("ui"));
        assert_eq!(fx.cache.get("ui").unwrap().name(), "ui");
        assert_eq!(progress.borrow().len(), 2);
        assert_eq!(fx.cache.loaded_names(), vec!["ui".to_string()]);
    }

    #[test]
    fn test_second_load_completes_without_fetch() {
        let mut fx = Fixture::new(writable_ui(0), MemoryPackageStore::new());
        fx.load("ui", |_| {});
        fx.run();
        assert_eq!(fx.writable.opened(), 1);

        let outcome = fx.load("ui", |_| {});
        assert_eq!(*outcome.borrow(), Some(Ok(())));
        assert_eq!(fx.cache.pending_loads(), 0);
        assert_eq!(fx.writable.opened(), 1);
    }

    #[test]
    fn test_concurrent_loads_join_one_fetch() {
        let mut fx = Fixture::new(writable_ui(2), MemoryPackageStore::new());
        let (first_progress, on_first) = progress_log();
        let (second_progress, on_second) = progress_log();

        let first = fx.load("ui", on_first);
        fx.cache.tick(&fx.tiers, &fx.decoder);
        let second = fx.load("ui", on_second);
        fx.run();

        assert_eq!(fx.writable.opened(), 1);
        assert_eq!(*first.borrow(), Some(Ok(())));
        assert_eq!(*second.borrow(), Some(Ok(())));
        assert_eq!(first_progress.borrow().len(), 2);
        // Joined after the first tick, so only sees the remaining report
        assert_eq!(second_progress.borrow().len(), 1);
    }

    #[test]
    fn test_missing_bundle_fails_immediately() {
        let mut fx = Fixture::new(writable_ui(0), MemoryPackageStore::new());

        let outcome = fx.load("enemies", |_| {});

        assert_eq!(
            *outcome.borrow(),
            Some(Err(LoadError::TierNotFound("enemies".to_string())))
        );
        assert!(!fx.cache.in_flight("enemies"));
        assert!(!fx.cache.has_loaded("enemies"));
    }

    #[test]
    fn test_failed_fetch_notifies_every_waiter() {
        let writable = MemoryStreamStore::new("cache").with_file("bundles/ui", "");
        let mut fx = Fixture::new(writable, MemoryPackageStore::new());

        let first = fx.load("ui", |_| {});
        let second = fx.load("ui", |_| {});
        fx.run();

        assert!(matches!(*first.borrow(), Some(Err(LoadError::Decode(_)))));
        assert!(matches!(*second.borrow(), Some(Err(LoadError::Decode(_)))));
        assert!(!fx.cache.has_loaded("ui"));
        assert_eq!(fx.writable.released(), 1);
    }

    #[test]
    fn test_readonly_two_stage_load() {
        let readonly = MemoryPackageStore::new().with_blob("bundles/ui", UI).with_ticks(1);
        let mut fx = Fixture::new(MemoryStreamStore::new("cache"), readonly);

        let outcome = fx.load("ui", |_| {});
        fx.run();

        assert_eq!(*outcome.borrow(), Some(Ok(())));
        assert_eq!(fx.readonly.opened(), 1);
        assert_eq!(fx.readonly.released(), 1);
        let icon = fx.cache.get_resource::<Texture>("ui", "icon").unwrap();
        let icon = icon.get().unwrap();
        assert_eq!((icon.width, icon.height), (4, 2));
    }

    #[test]
    fn test_resources_materialize_once() {
        let mut fx = Fixture::new(writable_ui(0), MemoryPackageStore::new());
        fx.load("ui", |_| {});
        fx.run();
        let loads = fx.decoder.loads();

        let first = fx.cache.get_resource::<TextAsset>("ui", "title").unwrap();
        let second = fx.cache.get_resource::<TextAsset>("ui", "title").unwrap();

        assert_eq!(first, second);
        assert_eq!(loads.get(), 1);
        assert!(fx.cache.get_resource::<Shader>("ui", "missing").is_none());
        assert!(fx.cache.get_resource::<Shader>("other", "unlit").is_none());
    }

    #[test]
    fn test_unload_invalidates_resources() {
        let mut fx = Fixture::new(writable_ui(0), MemoryPackageStore::new());
        fx.load("ui", |_| {});
        fx.run();
        let held = fx.cache.get_resource::<TextAsset>("ui", "title").unwrap();

        assert!(fx.cache.unload("ui", true));

        assert!(!fx.cache.has_loaded("ui"));
        assert!(fx.cache.get("ui").is_none());
        assert!(fx.cache.get_resource::<TextAsset>("ui", "title").is_none());
        assert_eq!(*fx.decoder.unloaded().borrow(), vec![("ui".to_string(), true)]);
        assert!(!held.is_valid());
        assert!(held.get().is_none());
    }

    #[test]
    fn test_unload_without_destroy_keeps_held_resources() {
        let mut fx = Fixture::new(writable_ui(0), MemoryPackageStore::new());
        fx.load("ui", |_| {});
        fx.run();
        let held = fx.cache.get_resource::<TextAsset>("ui", "title").unwrap();

        assert!(fx.cache.unload("ui", false));

        assert!(fx.cache.get_resource::<TextAsset>("ui", "title").is_none());
        assert_eq!(*fx.decoder.unloaded().borrow(), vec![("ui".to_string(), false)]);
        assert_eq!(held.get().unwrap().text(), Some("Main Menu"));
    }

    #[test]
    fn test_unload_unknown_is_noop() {
        let mut fx = Fixture::new(writable_ui(1), MemoryPackageStore::new());

        assert!(!fx.cache.unload("missing", false));

        // Unloading a bundle that is only in flight leaves the load running
        let outcome = fx.load("ui", |_| {});
        assert!(!fx.cache.unload("ui", false));
        fx.run();
        assert_eq!(*outcome.borrow(), Some(Ok(())));
        assert!(fx.cache.has_loaded("ui"));
    }

    #[test]
    fn test_reload_after_unload_fetches_again() {
        let mut fx = Fixture::new(writable_ui(0), MemoryPackageStore::new());
        fx.load("ui", |_| {});
        fx.run();
        fx.cache.unload("ui", false);

        fx.load("ui", |_| {});
        fx.run();

        assert_eq!(fx.writable.opened(), 2);
        assert!(fx.cache.get_resource::<TextAsset>("ui", "title").is_some());
    }

    #[test]
    fn test_unload_all() {
        let writable = writable_ui(0).with_file("bundles/hud", "text label=hp\n");
        let mut fx = Fixture::new(writable, MemoryPackageStore::new());
        fx.load("ui", |_| {});
        fx.load("hud", |_| {});
        fx.run();
        assert_eq!(fx.cache.loaded_names(), vec!["hud".to_string(), "ui".to_string()]);

        fx.cache.unload_all(false);

        assert!(fx.cache.loaded_names().is_empty());
        assert_eq!(fx.decoder.unloaded().borrow().len(), 2);
    }
}
