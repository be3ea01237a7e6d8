//! Arena of loaded manifests
//!
//! Manifests reference each other in two ways: a manifest may own a base
//! patch manifest, and it may depend on named manifests that were loaded
//! earlier. Both are expressed as [`ManifestId`] indices into the registry's
//! arena, so no manifest ever holds a pointer to another.
//!
//! **Invariants**:
//! - The arena only grows; ids stay valid for the registry's lifetime
//! - A manifest only references ids smaller than its own
//! - A failed load leaves the arena and the name index exactly as they were

use crate::core::asset::Asset;
use crate::core::chunk::Chunk;
use crate::core::config::StreamConfig;
use crate::core::error::{AssetStreamError, Result};
use crate::core::handle::AssetHandle;
use crate::core::manifest::{AssetLocation, AssetSlot, Manifest, ManifestLoader, ManifestRef};
use crate::core::provider::FileProvider;
use crate::core::vpath;
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Index of a manifest in its [`ManifestRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestId(pub(crate) usize);

impl ManifestId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owner of every loaded manifest
///
/// Loads take `&mut self`; lookups and payload reads take `&self`, so a
/// fully loaded registry can be shared across threads behind a lock or an
/// `Arc`.
///
/// # Examples
///
/// ```no_run
/// use assetstream_rs::{AssetHandle, FileProvider, FileSystemProvider, ManifestRegistry};
/// use std::sync::Arc;
///
/// # fn main() -> assetstream_rs::Result<()> {
/// let provider: Arc<dyn FileProvider> = Arc::new(FileSystemProvider::new("/games/cnc3"));
/// let mut registry = ManifestRegistry::new();
///
/// registry.load(&provider, "global_common.manifest")?;
/// let id = registry.load(&provider, "maps/static.manifest")?;
///
/// let handle = AssetHandle::from_name("Texture:Grass")?;
/// let chunk = registry.get_chunk(id, &handle)?;
/// println!("{} instance bytes", chunk.instance.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ManifestRegistry {
    pub(crate) manifests: Vec<Manifest>,
    by_name: AHashMap<String, ManifestId>,
    /// Keys of the manifests whose load is in progress, outermost first
    loading: Vec<String>,
    config: StreamConfig,
}

/// Lookup key for a manifest name: normalized, lowercase, no `.manifest`
fn name_key(name: &str) -> String {
    let key = vpath::normalize(name)
        .trim_start_matches(vpath::SEPARATOR)
        .to_ascii_lowercase();
    match key.strip_suffix(".manifest") {
        Some(stem) => stem.to_string(),
        None => key,
    }
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StreamConfig) -> Self {
        ManifestRegistry {
            manifests: Vec::new(),
            by_name: AHashMap::new(),
            loading: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Load a manifest and register it under `url`
    ///
    /// Uses the configured `.version` indirection setting. Referenced
    /// manifests must already be loaded into this registry.
    pub fn load(&mut self, provider: &Arc<dyn FileProvider>, url: &str) -> Result<ManifestId> {
        let use_version_file = self.config.use_version_file;
        self.load_with(provider, url, use_version_file)
    }

    /// Load a manifest with explicit `.version` indirection
    ///
    /// Loading a name that is already registered returns the existing id.
    pub fn load_with(
        &mut self,
        provider: &Arc<dyn FileProvider>,
        url: &str,
        use_version_file: bool,
    ) -> Result<ManifestId> {
        let key = name_key(url);
        if let Some(&id) = self.by_name.get(&key) {
            warn!("Manifest {} already loaded as {}, reusing it", url, id);
            return Ok(id);
        }

        info!("Loading manifest: {}", url);
        let checkpoint = self.manifests.len();
        match self.load_unregistered(provider, url, use_version_file) {
            Ok(id) => {
                self.by_name.insert(key, id);
                info!("Loaded manifest {}: {}", id, self.manifests[id.0]);
                Ok(id)
            }
            Err(err) => {
                let discarded = self.manifests.len() - checkpoint;
                self.manifests.truncate(checkpoint);
                debug!(
                    "Rolled back {} manifest(s) after failed load of {}",
                    discarded, url
                );
                Err(err)
            }
        }
    }

    /// Load into the arena without a name (base patch manifests)
    pub(crate) fn load_unregistered(
        &mut self,
        provider: &Arc<dyn FileProvider>,
        url: &str,
        use_version_file: bool,
    ) -> Result<ManifestId> {
        let key = name_key(url);
        if self.loading.contains(&key) {
            return Err(AssetStreamError::CyclicBasePatch(url.to_string()));
        }

        self.loading.push(key);
        let result = ManifestLoader::new(self, Arc::clone(provider), url).run(use_version_file);
        self.loading.pop();
        result
    }

    /// Append a fully loaded manifest
    pub(crate) fn push(&mut self, manifest: Manifest) -> ManifestId {
        let id = self.next_id();
        self.manifests.push(manifest);
        id
    }

    /// Id the next pushed manifest will receive
    pub(crate) fn next_id(&self) -> ManifestId {
        ManifestId(self.manifests.len())
    }

    /// Find a registered manifest by name (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<ManifestId> {
        self.by_name.get(&name_key(name)).copied()
    }

    pub fn get(&self, id: ManifestId) -> Result<&Manifest> {
        self.manifests
            .get(id.0)
            .ok_or(AssetStreamError::UnknownManifest(id.0))
    }

    /// Resolving view of a manifest
    pub fn manifest(&self, id: ManifestId) -> Result<ManifestRef<'_>> {
        Ok(ManifestRef::new(self, id, self.get(id)?))
    }

    /// Resolving view of a registered manifest
    pub fn by_name(&self, name: &str) -> Option<ManifestRef<'_>> {
        self.lookup(name).and_then(|id| self.manifest(id).ok())
    }

    /// Every manifest in load order, base patches included
    pub fn iter(&self) -> impl Iterator<Item = ManifestRef<'_>> {
        self.manifests
            .iter()
            .enumerate()
            .map(move |(idx, manifest)| ManifestRef::new(self, ManifestId(idx), manifest))
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Asset stored at `location`, following patched slots
    pub fn asset_at(&self, location: AssetLocation) -> Result<&Asset> {
        let manifest = self.get(location.manifest)?;
        match manifest.slots().get(location.slot) {
            Some(AssetSlot::Owned(asset)) => Ok(asset),
            Some(AssetSlot::Patched { target, .. }) => self.asset_at(*target),
            None => Err(AssetStreamError::Malformed(format!(
                "slot {} out of range for manifest {} ({} slots)",
                location.slot,
                location.manifest,
                manifest.slots().len()
            ))),
        }
    }

    /// Owning location of `handle` as seen from manifest `id`
    pub fn locate(&self, id: ManifestId, handle: &AssetHandle) -> Result<Option<AssetLocation>> {
        self.manifest(id)?.locate(handle)
    }

    pub fn find(&self, id: ManifestId, handle: &AssetHandle) -> Result<&Asset> {
        self.manifest(id)?.find(handle)
    }

    pub fn try_find(&self, id: ManifestId, handle: &AssetHandle) -> Result<Option<&Asset>> {
        self.manifest(id)?.try_find(handle)
    }

    pub fn get_chunk(&self, id: ManifestId, handle: &AssetHandle) -> Result<Chunk> {
        self.manifest(id)?.get_chunk(handle)
    }

    pub fn get_custom_data(&self, id: ManifestId, handle: &AssetHandle) -> Result<Vec<u8>> {
        self.manifest(id)?.get_custom_data(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_key() {
        assert_eq!(name_key("Global_Common.manifest"), "global_common");
        assert_eq!(name_key("global_common"), "global_common");
        assert_eq!(name_key("\\maps\\Static.MANIFEST"), "maps/static");
    }

    #[test]
    fn test_empty_registry() {
        let registry = ManifestRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup("anything"), None);
        assert!(matches!(
            registry.get(ManifestId(3)),
            Err(AssetStreamError::UnknownManifest(3))
        ));
        assert_eq!(registry.next_id(), ManifestId(0));
        assert_eq!(registry.config().data_root, "data");
    }

    #[test]
    fn test_manifest_id_display() {
        assert_eq!(ManifestId(7).to_string(), "#7");
        assert_eq!(ManifestId(7).index(), 7);
    }
}
