//! # AssetStream - Layered Asset Manifest Reader
//!
//! `assetstream-rs` resolves asset handles to payload bytes stored in binary
//! manifest databases:
//!
//! - **Manifests** describe assets and where their bytes live in shared
//!   `.bin`/`.relo`/`.imp` companion files
//! - **Patch manifests** override older manifests; overridden entries alias
//!   the base patch's assets
//! - **Referenced manifests** are searched after a manifest's own assets
//! - **RefPack** compressed files are decoded transparently, with seeking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use assetstream_rs::{AssetLibrary, Result};
//!
//! # fn main() -> Result<()> {
//! let mut library = AssetLibrary::open("/games/cnc3");
//!
//! // Referenced manifests must be loaded first
//! library.load("global_common.manifest")?;
//! let map = library.load("maps/static.manifest")?;
//!
//! let chunk = library.chunk_by_name(map, "Texture:Grass")?;
//! println!("{} instance bytes", chunk.instance.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use assetstream_rs::{AssetLibraryBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let library = AssetLibraryBuilder::new()
//!     .root("/games/cnc3")
//!     .config_file("assetstream.toml")?
//!     .use_version_file(false)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    asset::Asset,
    chunk::Chunk,
    config::{RefPackConfig, StreamConfig},
    error::{AssetStreamError, ErrorKind, LoadStage, Result},
    handle::AssetHandle,
    manifest::{AssetLocation, AssetSlot, Manifest, ManifestRef},
    provider::{ByteStream, FileProvider, FileSystemProvider, MemoryProvider},
    refpack::RefPackStream,
    registry::{ManifestId, ManifestRegistry},
};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A file provider and the manifests loaded from it
///
/// # Examples
///
/// ```rust
/// use assetstream_rs::{AssetLibrary, MemoryProvider, StreamConfig};
/// use std::sync::Arc;
///
/// let provider = Arc::new(MemoryProvider::new());
/// let library = AssetLibrary::with_provider(provider, StreamConfig::default()).unwrap();
/// assert!(library.registry().is_empty());
/// ```
#[derive(Debug)]
pub struct AssetLibrary {
    provider: Arc<dyn FileProvider>,
    registry: ManifestRegistry,
}

impl AssetLibrary {
    /// Serve a game directory with the default configuration
    pub fn open<P: AsRef<Path>>(root: P) -> Self {
        info!("Opening asset library at {:?}", root.as_ref());
        AssetLibrary {
            provider: Arc::new(FileSystemProvider::new(root.as_ref())),
            registry: ManifestRegistry::new(),
        }
    }

    /// Serve a game directory with an explicit configuration
    pub fn open_with_config<P: AsRef<Path>>(root: P, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        info!("Opening asset library at {:?}", root.as_ref());
        let provider = Arc::new(FileSystemProvider::with_config(root.as_ref(), &config));
        Ok(AssetLibrary {
            provider,
            registry: ManifestRegistry::with_config(config),
        })
    }

    /// Use any provider
    pub fn with_provider(provider: Arc<dyn FileProvider>, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        info!("Opening asset library over {:?}", provider);
        Ok(AssetLibrary {
            provider,
            registry: ManifestRegistry::with_config(config),
        })
    }

    /// Load a manifest (see [`ManifestRegistry::load`])
    pub fn load(&mut self, url: &str) -> Result<ManifestId> {
        self.registry.load(&self.provider, url)
    }

    /// Load a manifest with explicit `.version` indirection
    pub fn load_with(&mut self, url: &str, use_version_file: bool) -> Result<ManifestId> {
        self.registry.load_with(&self.provider, url, use_version_file)
    }

    pub fn manifest(&self, id: ManifestId) -> Result<ManifestRef<'_>> {
        self.registry.manifest(id)
    }

    pub fn manifest_by_name(&self, name: &str) -> Option<ManifestRef<'_>> {
        self.registry.by_name(name)
    }

    /// Manifest files below the data root
    pub fn list_manifests(&self) -> Result<Vec<String>> {
        self.provider
            .list_files(&self.registry.config().data_root, "*.manifest", true)
    }

    pub fn find(&self, id: ManifestId, handle: &AssetHandle) -> Result<&Asset> {
        self.registry.find(id, handle)
    }

    /// Resolve `"Type:Instance"` as seen from manifest `id`
    pub fn find_by_name(&self, id: ManifestId, name: &str) -> Result<&Asset> {
        self.registry.find(id, &AssetHandle::from_name(name)?)
    }

    pub fn chunk(&self, id: ManifestId, handle: &AssetHandle) -> Result<Chunk> {
        self.registry.get_chunk(id, handle)
    }

    /// Read the payload of `"Type:Instance"` as seen from manifest `id`
    pub fn chunk_by_name(&self, id: ManifestId, name: &str) -> Result<Chunk> {
        let handle = AssetHandle::from_name(name)?;
        debug!("Resolved {} to {}", name, handle);
        self.registry.get_chunk(id, &handle)
    }

    pub fn custom_data(&self, id: ManifestId, handle: &AssetHandle) -> Result<Vec<u8>> {
        self.registry.get_custom_data(id, handle)
    }

    pub fn provider(&self) -> &Arc<dyn FileProvider> {
        &self.provider
    }

    pub fn registry(&self) -> &ManifestRegistry {
        &self.registry
    }

    pub fn config(&self) -> &StreamConfig {
        self.registry.config()
    }
}

/// Builder for an [`AssetLibrary`]
///
/// Either a root directory or a provider must be set; a provider wins when
/// both are.
#[derive(Default)]
pub struct AssetLibraryBuilder {
    root: Option<PathBuf>,
    provider: Option<Arc<dyn FileProvider>>,
    config: StreamConfig,
}

impl AssetLibraryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve files below a host directory
    pub fn root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Serve files from a custom provider
    pub fn provider(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the configuration with a TOML file
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.config = StreamConfig::from_file(path)?;
        Ok(self)
    }

    pub fn data_root<S: Into<String>>(mut self, data_root: S) -> Self {
        self.config.data_root = data_root.into();
        self
    }

    pub fn use_version_file(mut self, enabled: bool) -> Self {
        self.config.use_version_file = enabled;
        self
    }

    /// Only applies to the filesystem provider built from `root`
    pub fn detect_compression(mut self, enabled: bool) -> Self {
        self.config.detect_compression = enabled;
        self
    }

    pub fn build(self) -> Result<AssetLibrary> {
        match (self.provider, self.root) {
            (Some(provider), _) => AssetLibrary::with_provider(provider, self.config),
            (None, Some(root)) => AssetLibrary::open_with_config(root, self.config),
            (None, None) => Err(AssetStreamError::InvalidConfig(
                "either a root directory or a provider must be set".to_string(),
            )),
        }
    }
}
