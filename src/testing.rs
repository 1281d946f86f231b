//! In-memory collaborators for tests
//!
//! Stores serve byte payloads after a configurable number of pending ticks
//! and count how often transports are opened and released. The memory
//! decoder understands a tiny line format, one entry per line:
//!
//! ```text
//! text title=Main Menu
//! shader unlit=fn main() {}
//! texture icon=4x2
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::assets::{ResourceKind, Shader, TextAsset, Texture};
use crate::bundle::{BundleContainer, BundleDecoder, DecodeRequest, RawObject};
use crate::storage::{
    AsyncRequest, Blob, BlobRequest, ByteStream, LoadPriority, PackageStore, RequestPoll,
    StreamStore, TierStore, TransportAddress,
};

/// Progress reported on pending tick `tick` (1-based) of a `ticks`-long transfer
fn tick_progress(tick: u32, ticks: u32) -> f32 {
    tick as f32 / (ticks + 1) as f32
}

/// Shared open/release counters
#[derive(Debug, Clone, Default)]
pub struct Counters {
    opened: Rc<Cell<u32>>,
    released: Rc<Cell<u32>>,
}

impl Counters {
    pub fn opened(&self) -> u32 {
        self.opened.get()
    }

    pub fn released(&self) -> u32 {
        self.released.get()
    }
}

/// A transfer that stays pending for a fixed number of ticks
struct MemoryRequest<T> {
    ticks: u32,
    polled: u32,
    result: Option<Result<T, String>>,
    released: Option<Rc<Cell<u32>>>,
}

impl<T> AsyncRequest for MemoryRequest<T> {
    type Output = T;

    fn poll(&mut self) -> RequestPoll {
        self.polled += 1;
        if self.polled <= self.ticks {
            RequestPoll::Pending(tick_progress(self.polled, self.ticks))
        } else {
            RequestPoll::Done
        }
    }

    fn finish(&mut self) -> Result<T, String> {
        self.result
            .take()
            .unwrap_or_else(|| Err("result already taken".to_string()))
    }
}

impl<T> Drop for MemoryRequest<T> {
    fn drop(&mut self) {
        if let Some(released) = &self.released {
            released.set(released.get() + 1);
        }
    }
}

/// Stream-backed tier holding files in memory
pub struct MemoryStreamStore {
    scheme: String,
    files: HashMap<String, Vec<u8>>,
    errors: HashMap<String, String>,
    ticks: u32,
    counters: Counters,
    priorities: Rc<RefCell<Vec<LoadPriority>>>,
}

impl MemoryStreamStore {
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            files: HashMap::new(),
            errors: HashMap::new(),
            ticks: 0,
            counters: Counters::default(),
            priorities: Rc::default(),
        }
    }

    pub fn with_file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), bytes.into());
        self
    }

    /// The file exists but every transfer of it fails
    pub fn with_error(mut self, path: &str, error: &str) -> Self {
        self.files.insert(path.to_string(), Vec::new());
        self.errors.insert(path.to_string(), error.to_string());
        self
    }

    pub fn with_ticks(mut self, ticks: u32) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn counters(&self) -> Counters {
        self.counters.clone()
    }

    pub fn priorities(&self) -> Rc<RefCell<Vec<LoadPriority>>> {
        Rc::clone(&self.priorities)
    }

    fn path_of<'a>(&self, address: &'a TransportAddress) -> &'a str {
        address
            .as_str()
            .strip_prefix(&format!("{}://", self.scheme))
            .unwrap_or(address.as_str())
    }
}

impl TierStore for MemoryStreamStore {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

impl StreamStore for MemoryStreamStore {
    fn locate(&self, path: &str) -> TransportAddress {
        TransportAddress(format!("{}://{path}", self.scheme))
    }

    fn open(&self, address: &TransportAddress, priority: LoadPriority) -> ByteStream {
        self.counters.opened.set(self.counters.opened.get() + 1);
        self.priorities.borrow_mut().push(priority);

        let path = self.path_of(address);
        let result = match (self.errors.get(path), self.files.get(path)) {
            (Some(error), _) => Err(error.clone()),
            (None, Some(bytes)) => Ok(bytes.clone()),
            (None, None) => Err(format!("404: {address}")),
        };
        Box::new(MemoryRequest {
            ticks: self.ticks,
            polled: 0,
            result: Some(result),
            released: Some(Rc::clone(&self.counters.released)),
        })
    }
}

/// Read-only package holding blobs in memory
pub struct MemoryPackageStore {
    blobs: HashMap<String, Vec<u8>>,
    ticks: u32,
    counters: Counters,
}

impl MemoryPackageStore {
    pub fn new() -> Self {
        Self {
            blobs: HashMap::new(),
            ticks: 0,
            counters: Counters::default(),
        }
    }

    pub fn with_blob(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(path.to_string(), bytes.into());
        self
    }

    pub fn with_ticks(mut self, ticks: u32) -> Self {
        self.ticks = ticks;
        self
    }

    /// `opened` counts blob loads, `released` counts returned blobs
    pub fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

impl TierStore for MemoryPackageStore {
    fn exists(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }
}

impl PackageStore for MemoryPackageStore {
    fn load_blob(&self, path: &str, _priority: LoadPriority) -> BlobRequest {
        self.counters.opened.set(self.counters.opened.get() + 1);
        let result = self
            .blobs
            .get(path)
            .map(|bytes| Blob::from(bytes.as_slice()))
            .ok_or_else(|| format!("no blob at {path}"));
        Box::new(MemoryRequest {
            ticks: self.ticks,
            polled: 0,
            result: Some(result),
            released: None,
        })
    }

    fn release_blob(&self, _blob: Blob) {
        self.counters.released.set(self.counters.released.get() + 1);
    }
}

/// Container built from the line format, counting materializations
pub struct MemoryContainer {
    name: String,
    entries: HashMap<String, (ResourceKind, String)>,
    loads: Rc<Cell<usize>>,
    unloaded: Rc<RefCell<Vec<(String, bool)>>>,
}

impl MemoryContainer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
            loads: Rc::default(),
            unloaded: Rc::default(),
        }
    }

    pub fn with_text(mut self, name: &str, text: &str) -> Self {
        self.entries
            .insert(name.to_string(), (ResourceKind::Text, text.to_string()));
        self
    }

    pub fn with_shader(mut self, name: &str, source: &str) -> Self {
        self.entries
            .insert(name.to_string(), (ResourceKind::Shader, source.to_string()));
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.get()
    }

    fn parse(bytes: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        let mut container = Self::new("");
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let (kind, rest) = line
                .split_once(' ')
                .ok_or_else(|| format!("bad line {line:?}"))?;
            let (name, value) = rest
                .split_once('=')
                .ok_or_else(|| format!("bad entry {rest:?}"))?;
            let kind = match kind {
                "text" => ResourceKind::Text,
                "shader" => ResourceKind::Shader,
                "texture" => ResourceKind::Texture,
                other => return Err(format!("unknown kind {other}")),
            };
            container
                .entries
                .insert(name.to_string(), (kind, value.to_string()));
        }
        Ok(container)
    }
}

impl BundleContainer for MemoryContainer {
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
        let (entry_kind, value) = self.entries.get(resource)?;
        if *entry_kind != kind {
            return None;
        }
        self.loads.set(self.loads.get() + 1);
        let object: RawObject = match kind {
            ResourceKind::Text => Box::new(TextAsset {
                bytes: value.as_bytes().to_vec(),
            }),
            ResourceKind::Shader => Box::new(Shader {
                source: value.clone(),
            }),
            ResourceKind::Texture => {
                let (w, h) = value.split_once('x')?;
                let (width, height) = (w.parse().ok()?, h.parse().ok()?);
                Box::new(Texture {
                    width,
                    height,
                    pixels: vec![0; (width * height * 4) as usize],
                })
            }
            _ => return None,
        };
        Some(object)
    }

    fn unload(&mut self, destroy_loaded_objects: bool) {
        self.unloaded
            .borrow_mut()
            .push((self.name.clone(), destroy_loaded_objects));
        self.entries.clear();
    }
}

/// Decoder for the line format. Empty input is rejected.
#[derive(Default)]
pub struct MemoryDecoder {
    decode_ticks: u32,
    loads: Rc<Cell<usize>>,
    unloaded: Rc<RefCell<Vec<(String, bool)>>>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending ticks of every blob decode
    pub fn with_decode_ticks(mut self, ticks: u32) -> Self {
        self.decode_ticks = ticks;
        self
    }

    /// Materializations across every container this decoder produced
    pub fn loads(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.loads)
    }

    /// `(bundle, destroy_loaded_objects)` for every container unloaded
    pub fn unloaded(&self) -> Rc<RefCell<Vec<(String, bool)>>> {
        Rc::clone(&self.unloaded)
    }

    fn build(&self, bytes: &[u8]) -> Result<Box<dyn BundleContainer>, String> {
        if bytes.is_empty() {
            return Err("empty bundle".to_string());
        }
        let mut container = MemoryContainer::parse(bytes)?;
        container.loads = Rc::clone(&self.loads);
        container.unloaded = Rc::clone(&self.unloaded);
        Ok(Box::new(container))
    }
}

impl BundleDecoder for MemoryDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn BundleContainer>, String> {
        self.build(bytes)
    }

    fn decode_blob(&self, blob: Blob, _priority: LoadPriority) -> DecodeRequest {
        Box::new(MemoryRequest {
            ticks: self.decode_ticks,
            polled: 0,
            result: Some(self.build(&blob)),
            released: None,
        })
    }
}

/// Collect progress reports into a shared vector
pub fn progress_log() -> (Rc<RefCell<Vec<f32>>>, impl FnMut(f32) + 'static) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    (log, move |p| sink.borrow_mut().push(p))
}
