//! Named, memoized texture catalogs (papers, environment maps, noise).
//!
//! A [`TextureLibrary`] maps a name to where its texture comes from. Nothing is read until the
//! first [`ensure_loaded`](TextureLibrary::ensure_loaded) for that name; the load then runs on
//! a [`TextureLoader`] and every later request shares it:
//!
//! - while in flight, callers get [`LoadHandle::Pending`] holding the same shared future
//! - once finished, the result is cached and callers get [`LoadHandle::Ready`] with the same `Arc`
//! - a failed load is reported once and forgotten, so the next request tries again

use crate::gpu::GpuContext;
use crate::texture::{self, Texture, TextureError, TextureOptions};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// A texture that could not be produced. Clonable so every waiter on a shared load gets it.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("failed to load '{resource}': {message}")]
pub struct LoadError {
    pub resource: String,
    pub message: String,
}

impl LoadError {
    pub fn new(resource: impl Into<String>, message: impl ToString) -> Self {
        Self {
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("no {kind} named '{name}'")]
    Unknown { kind: &'static str, name: String },
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Where an entry's pixels come from.
#[derive(Clone, Debug, PartialEq)]
pub enum TextureSource {
    Image { path: PathBuf, options: TextureOptions },
    /// Faces ordered +X, -X, +Y, -Y, +Z, -Z.
    Cube([PathBuf; 6]),
}

impl TextureSource {
    /// The six faces of a cube map named `{prefix}{posx,negx,posy,negy,posz,negz}.{ext}`.
    pub fn cube(dir: &Path, prefix: &str, ext: &str) -> Self {
        let faces = ["posx", "negx", "posy", "negy", "posz", "negz"]
            .map(|face| dir.join(format!("{prefix}{face}.{ext}")));
        Self::Cube(faces)
    }
}

/// Produces textures from sources. Implementations decide where the work happens.
pub trait TextureLoader<T>: Send + Sync {
    fn load(&self, name: &str, source: &TextureSource) -> BoxFuture<'static, Result<T, LoadError>>;
}

/// Paper names and their image files, in catalog order.
pub const PAPERS: [(&str, &str); 4] = [
    ("Craft light", "Craft_Light.jpg"),
    ("Craft rough", "Craft_Rough.jpg"),
    ("Watercolor cold press", "Watercolor_ColdPress.jpg"),
    ("Parchment", "Parchment.jpg"),
];

/// Environment names with their face file prefix and extension.
pub const ENVIRONMENTS: [(&str, &str, &str); 3] = [
    ("bridge", "", "jpg"),
    ("park", "park_", "jpg"),
    ("pisa", "pisa_", "png"),
];

type PendingLoad<T> = Shared<BoxFuture<'static, Result<Arc<T>, LoadError>>>;

/// Result of [`TextureLibrary::ensure_loaded`].
pub enum LoadHandle<T> {
    Ready(Arc<T>),
    Pending(PendingLoad<T>),
}

impl<T> LoadHandle<T> {
    pub fn ready(&self) -> Option<&Arc<T>> {
        match self {
            LoadHandle::Ready(value) => Some(value),
            LoadHandle::Pending(_) => None,
        }
    }

    /// Wait for the texture.
    pub async fn wait(self) -> Result<Arc<T>, LoadError> {
        match self {
            LoadHandle::Ready(value) => Ok(value),
            LoadHandle::Pending(pending) => pending.await,
        }
    }
}

struct Entry<T> {
    source: TextureSource,
    cached: Option<Arc<T>>,
    pending: Option<PendingLoad<T>>,
}

/// A catalog of named textures, each loaded at most once.
pub struct TextureLibrary<T> {
    kind: &'static str,
    names: Vec<String>,
    entries: HashMap<String, Entry<T>>,
    loader: Arc<dyn TextureLoader<T>>,
}

impl<T: Send + Sync + 'static> TextureLibrary<T> {
    /// An empty library. `kind` names the catalog in errors and logs ("paper").
    pub fn new(kind: &'static str, loader: Arc<dyn TextureLoader<T>>) -> Self {
        Self {
            kind,
            names: Vec::new(),
            entries: HashMap::new(),
            loader,
        }
    }

    /// Register an entry. Re-registering a name replaces its source and drops any cached value.
    pub fn insert(&mut self, name: impl Into<String>, source: TextureSource) {
        let name = name.into();
        if !self.entries.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.entries.insert(
            name,
            Entry {
                source,
                cached: None,
                pending: None,
            },
        );
    }

    pub fn with(mut self, name: impl Into<String>, source: TextureSource) -> Self {
        self.insert(name, source);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Entry names in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn source(&self, name: &str) -> Option<&TextureSource> {
        self.entries.get(name).map(|e| &e.source)
    }

    /// The loaded texture, if its load already finished.
    pub fn cached(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(name).and_then(|e| e.cached.clone())
    }

    /// The name registered after `name`, wrapping around.
    pub fn next_name(&self, name: &str) -> Option<&str> {
        let index = self.names.iter().position(|n| n == name).map_or(0, |i| i + 1);
        self.names
            .get(index % self.names.len().max(1))
            .map(String::as_str)
    }

    /// Start loading `name` unless it is cached or already in flight.
    ///
    /// Polls the in-flight load once without blocking, so calling this every frame is enough
    /// to observe completion. A finished failure is returned as [`LibraryError::Load`] and
    /// cleared; the following call starts a fresh load.
    pub fn ensure_loaded(&mut self, name: &str) -> Result<LoadHandle<T>, LibraryError> {
        let kind = self.kind;
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| LibraryError::Unknown {
                kind,
                name: name.to_string(),
            })?;

        if let Some(cached) = &entry.cached {
            return Ok(LoadHandle::Ready(cached.clone()));
        }

        if let Some(pending) = &entry.pending {
            return match pending.clone().now_or_never() {
                None => Ok(LoadHandle::Pending(pending.clone())),
                Some(Ok(value)) => {
                    entry.pending = None;
                    entry.cached = Some(value.clone());
                    log::debug!("{kind} '{name}' loaded");
                    Ok(LoadHandle::Ready(value))
                }
                Some(Err(err)) => {
                    entry.pending = None;
                    Err(err.into())
                }
            };
        }

        log::debug!("loading {kind} '{name}'");
        let pending = self
            .loader
            .load(name, &entry.source)
            .map(|result| result.map(Arc::new))
            .boxed()
            .shared();
        entry.pending = Some(pending.clone());
        Ok(LoadHandle::Pending(pending))
    }

    /// Load `name` and wait for it, caching the result.
    pub async fn resolve(&mut self, name: &str) -> Result<Arc<T>, LibraryError> {
        let value = self.ensure_loaded(name)?.wait().await;
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| LibraryError::Unknown {
                kind: self.kind,
                name: name.to_string(),
            })?;
        entry.pending = None;
        match value {
            Ok(value) => {
                entry.cached = Some(value.clone());
                Ok(value)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl TextureLibrary<Texture> {
    /// The paper catalog, resolved against `root`. Papers tile across the screen.
    pub fn papers(root: &Path, loader: Arc<dyn TextureLoader<Texture>>) -> Self {
        PAPERS
            .iter()
            .fold(Self::new("paper", loader), |lib, (name, file)| {
                lib.with(
                    *name,
                    TextureSource::Image {
                        path: root.join(file),
                        options: TextureOptions::TILED,
                    },
                )
            })
    }

    /// The environment cube map catalog, resolved against `root`.
    pub fn environments(root: &Path, loader: Arc<dyn TextureLoader<Texture>>) -> Self {
        ENVIRONMENTS
            .iter()
            .fold(Self::new("environment", loader), |lib, (name, prefix, ext)| {
                lib.with(*name, TextureSource::cube(root, prefix, ext))
            })
    }
}

/// Decodes and uploads textures on a background thread.
///
/// Holds its own handles to the device and queue; wgpu allows resource creation from any
/// thread.
pub struct GpuTextureLoader {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuTextureLoader {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
        }
    }

    fn load_blocking(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        source: &TextureSource,
    ) -> Result<Texture, TextureError> {
        match source {
            TextureSource::Image { path, options } => {
                let img = image::open(path)?.to_rgba8();
                Ok(Texture::image_on(device, queue, &img, name, *options))
            }
            TextureSource::Cube(paths) => {
                let faces = texture::decode_faces(paths)?;
                Texture::cube_on(device, queue, &faces, name)
            }
        }
    }
}

impl TextureLoader<Texture> for GpuTextureLoader {
    fn load(
        &self,
        name: &str,
        source: &TextureSource,
    ) -> BoxFuture<'static, Result<Texture, LoadError>> {
        let (tx, rx) = futures::channel::oneshot::channel();
        let device = self.device.clone();
        let queue = self.queue.clone();
        let name = name.to_string();
        let source = source.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("load {name}"))
            .spawn({
                let name = name.clone();
                move || {
                    let result = Self::load_blocking(&device, &queue, &name, &source)
                        .map_err(|err| LoadError::new(&name, err));
                    let _ = tx.send(result);
                }
            });

        async move {
            spawned.map_err(|err| LoadError::new(&name, err))?;
            rx.await
                .unwrap_or_else(|_| Err(LoadError::new(&name, "loader thread exited")))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Fake(usize);

    /// Completes each load when the test sends through the stored channel.
    #[derive(Default)]
    struct GatedLoader {
        calls: AtomicUsize,
        gates: Mutex<Vec<oneshot::Sender<Result<Fake, LoadError>>>>,
    }

    impl TextureLoader<Fake> for GatedLoader {
        fn load(&self, name: &str, _: &TextureSource) -> BoxFuture<'static, Result<Fake, LoadError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push(tx);
            let name = name.to_string();
            async move { rx.await.unwrap_or_else(|_| Err(LoadError::new(name, "dropped"))) }.boxed()
        }
    }

    impl GatedLoader {
        fn complete(&self, result: Result<Fake, LoadError>) {
            let tx = self.gates.lock().unwrap().remove(0);
            tx.send(result).ok();
        }
    }

    fn source() -> TextureSource {
        TextureSource::Image {
            path: PathBuf::from("paper.jpg"),
            options: TextureOptions::TILED,
        }
    }

    fn library(loader: &Arc<GatedLoader>) -> TextureLibrary<Fake> {
        TextureLibrary::new("paper", loader.clone() as Arc<dyn TextureLoader<Fake>>)
            .with("a", source())
            .with("b", source())
    }

    #[test]
    fn concurrent_requests_share_one_load() {
        let loader = Arc::new(GatedLoader::default());
        let mut lib = library(&loader);

        let first = lib.ensure_loaded("a").unwrap();
        let second = lib.ensure_loaded("a").unwrap();
        assert!(first.ready().is_none() && second.ready().is_none());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        loader.complete(Ok(Fake(7)));
        let (first, second) =
            futures::executor::block_on(futures::future::join(first.wait(), second.wait()));
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, Fake(7));

        let third = lib.ensure_loaded("a").unwrap();
        assert!(Arc::ptr_eq(third.ready().unwrap(), &first));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finished_load_is_cached() {
        let loader = Arc::new(GatedLoader::default());
        let mut lib = library(&loader);

        lib.ensure_loaded("b").unwrap();
        assert!(lib.cached("b").is_none());
        loader.complete(Ok(Fake(1)));

        let handle = lib.ensure_loaded("b").unwrap();
        assert_eq!(**handle.ready().unwrap(), Fake(1));
        assert!(lib.cached("b").is_some());
        assert!(lib.cached("a").is_none());
    }

    #[test]
    fn failed_load_is_retried() {
        let loader = Arc::new(GatedLoader::default());
        let mut lib = library(&loader);

        lib.ensure_loaded("a").unwrap();
        loader.complete(Err(LoadError::new("a", "missing file")));
        match lib.ensure_loaded("a") {
            Err(LibraryError::Load(err)) => assert_eq!(err.message, "missing file"),
            _ => panic!("expected the load failure"),
        }

        lib.ensure_loaded("a").unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        loader.complete(Ok(Fake(2)));
        let value = futures::executor::block_on(lib.resolve("a")).unwrap();
        assert_eq!(*value, Fake(2));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let loader = Arc::new(GatedLoader::default());
        let mut lib = library(&loader);
        assert!(matches!(
            lib.ensure_loaded("nope"),
            Err(LibraryError::Unknown { kind: "paper", .. })
        ));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn catalogs_list_entries_in_order() {
        let loader: Arc<dyn TextureLoader<Texture>> = Arc::new(NeverLoader);
        let papers = TextureLibrary::papers(Path::new("assets"), loader.clone());
        assert_eq!(
            papers.names(),
            ["Craft light", "Craft rough", "Watercolor cold press", "Parchment"]
        );
        assert_eq!(papers.next_name("Parchment"), Some("Craft light"));

        let envs = TextureLibrary::environments(Path::new("assets"), loader);
        match envs.source("pisa") {
            Some(TextureSource::Cube(faces)) => {
                assert_eq!(faces[0], Path::new("assets/pisa_posx.png"));
                assert_eq!(faces[5], Path::new("assets/pisa_negz.png"));
            }
            other => panic!("unexpected source {other:?}"),
        }
        match envs.source("bridge") {
            Some(TextureSource::Cube(faces)) => assert_eq!(faces[1], Path::new("assets/negx.jpg")),
            other => panic!("unexpected source {other:?}"),
        }
    }

    struct NeverLoader;

    impl TextureLoader<Texture> for NeverLoader {
        fn load(&self, name: &str, _: &TextureSource) -> BoxFuture<'static, Result<Texture, LoadError>> {
            futures::future::ready(Err(LoadError::new(name, "not available in tests"))).boxed()
        }
    }
}
