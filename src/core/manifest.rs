//! Manifest decoding and asset resolution
//!
//! A manifest file is a header, a table of [`AssetEntry`] records, and four
//! shared buffers (asset reference handles, referenced manifest names, asset
//! names, source file names). Payload bytes live in companion files next to
//! it: `<base>.bin`, `<base>.relo` and `<base>.imp`, each a 4-byte prefix
//! followed by per-asset segments in entry order.
//!
//! **Loading** runs as a small state machine:
//!
//! ```text
//! Unopened -> HeaderRead -> TablesRead -> AssetsResolved -> Ready
//! ```
//!
//! Any failure is terminal and reported as [`AssetStreamError::Load`] with
//! the stage in which it happened. The manifest is only added to the
//! registry once it reaches `Ready`.
//!
//! **Patching**: an entry with no instance data is patched out. Its slot
//! aliases the asset found through the base patch manifest, and it does not
//! advance the linked offsets.

use crate::core::asset::{Asset, LinkedOffsets};
use crate::core::chunk::Chunk;
use crate::core::codec::{c_string_at, read_exact_or, Record};
use crate::core::entry::AssetEntry;
use crate::core::error::{AssetStreamError, LoadStage, Result};
use crate::core::handle::AssetHandle;
use crate::core::header::{ManifestHeader, CUSTOM_DATA_PREFIX, LINKED_DATA_PREFIX};
use crate::core::provider::{ByteStream, FileProvider};
use crate::core::registry::{ManifestId, ManifestRegistry};
use crate::core::vpath;
use ahash::AHashMap;
use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// Reference name tag marking the base patch manifest
pub const BASE_PATCH_TAG: u8 = 2;

/// Where an asset is owned: a manifest and a slot index within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetLocation {
    pub manifest: ManifestId,
    pub slot: usize,
}

/// One entry-table position of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSlot {
    /// Asset described and stored by this manifest
    Owned(Asset),
    /// Patched out; the asset is owned by an ancestor at `target`
    Patched {
        handle: AssetHandle,
        target: AssetLocation,
    },
}

impl AssetSlot {
    pub fn handle(&self) -> AssetHandle {
        match self {
            AssetSlot::Owned(asset) => asset.handle(),
            AssetSlot::Patched { handle, .. } => *handle,
        }
    }

    pub fn is_patched(&self) -> bool {
        matches!(self, AssetSlot::Patched { .. })
    }
}

/// A decoded manifest
#[derive(Debug)]
pub struct Manifest {
    header: ManifestHeader,
    file_name: String,
    base_path: String,
    data_root: String,
    provider: Arc<dyn FileProvider>,
    slots: Vec<AssetSlot>,
    index: AHashMap<AssetHandle, usize>,
    base_patch: Option<ManifestId>,
    referenced: Vec<ManifestId>,
}

impl Manifest {
    pub fn header(&self) -> &ManifestHeader {
        &self.header
    }

    /// Manifest URL, after `.version` splicing
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without extension; prefix of every companion file
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn provider(&self) -> &Arc<dyn FileProvider> {
        &self.provider
    }

    pub fn is_big_endian(&self) -> bool {
        self.header.is_big_endian
    }

    pub fn is_linked(&self) -> bool {
        self.header.is_linked
    }

    pub fn version(&self) -> u16 {
        self.header.version
    }

    pub fn stream_checksum(&self) -> u32 {
        self.header.stream_checksum
    }

    pub fn all_types_hash(&self) -> u32 {
        self.header.all_types_hash
    }

    pub fn asset_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[AssetSlot] {
        &self.slots
    }

    pub fn base_patch_id(&self) -> Option<ManifestId> {
        self.base_patch
    }

    pub fn referenced_ids(&self) -> &[ManifestId] {
        &self.referenced
    }

    fn ensure_linked(&self) -> Result<()> {
        if self.header.is_linked {
            Ok(())
        } else {
            Err(AssetStreamError::UnlinkedManifest(self.file_name.clone()))
        }
    }

    fn open(&self, url: &str) -> Result<Box<dyn ByteStream>> {
        self.provider.open_stream(url)
    }

    fn read_segment(&self, extension: &str, offset: u64, size: u32, what: &str) -> Result<Vec<u8>> {
        let url = vpath::combine(&self.data_root, &format!("{}{}", self.base_path, extension));
        let mut stream = self.open(&url)?;
        stream.seek(SeekFrom::Start(offset))?;
        read_exact_or(&mut stream, size as usize, what)
    }

    /// Read an asset's payload from this manifest's companion files
    fn read_chunk(&self, asset: &Asset) -> Result<Chunk> {
        self.ensure_linked()?;
        debug!(
            "Reading chunk {} from {} (instance @{}, relocation @{}, imports @{})",
            asset,
            self.base_path,
            asset.linked_instance_data_offset,
            asset.linked_relocation_data_offset,
            asset.linked_imports_data_offset
        );

        let chunk = Chunk {
            instance: self.read_segment(
                ".bin",
                asset.linked_instance_data_offset,
                asset.instance_data_size,
                "asset instance data",
            )?,
            relocation: self.read_segment(
                ".relo",
                asset.linked_relocation_data_offset,
                asset.relocation_data_size,
                "asset relocation data",
            )?,
            imports: self.read_segment(
                ".imp",
                asset.linked_imports_data_offset,
                asset.imports_data_size,
                "asset imports data",
            )?,
        };
        debug!("Read {} payload bytes for {}", chunk.total_len(), asset);
        Ok(chunk)
    }

    /// Read an asset's `.cdata` file, minus its prefix
    fn read_custom_data(&self, asset: &Asset) -> Result<Vec<u8>> {
        let file = format!("{}.cdata", asset.custom_data_stem());
        let url = vpath::combine_all(&[&self.data_root, &self.base_path, "cdata", &file]);
        debug!("Reading custom data {} from {}", asset, url);

        let mut stream = self.open(&url)?;
        let length = stream.seek(SeekFrom::End(0))?;
        if length < CUSTOM_DATA_PREFIX {
            return Err(AssetStreamError::UnexpectedEof(format!(
                "asset custom data prefix ({} of {} bytes)",
                length, CUSTOM_DATA_PREFIX
            )));
        }
        stream.seek(SeekFrom::Start(CUSTOM_DATA_PREFIX))?;
        read_exact_or(
            &mut stream,
            (length - CUSTOM_DATA_PREFIX) as usize,
            "asset custom data",
        )
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [0x{:08X}, {} assets]",
            self.file_name,
            self.header.stream_checksum,
            self.slots.len()
        )
    }
}

/// A manifest together with the registry it lives in
///
/// Resolution crosses manifest boundaries (base patches, referenced
/// manifests), so every lookup goes through this view.
#[derive(Clone, Copy)]
pub struct ManifestRef<'a> {
    registry: &'a ManifestRegistry,
    id: ManifestId,
    manifest: &'a Manifest,
}

impl<'a> ManifestRef<'a> {
    pub(crate) fn new(registry: &'a ManifestRegistry, id: ManifestId, manifest: &'a Manifest) -> Self {
        ManifestRef {
            registry,
            id,
            manifest,
        }
    }

    pub fn id(&self) -> ManifestId {
        self.id
    }

    pub fn manifest(&self) -> &'a Manifest {
        self.manifest
    }

    pub fn base_patch(&self) -> Option<ManifestRef<'a>> {
        self.manifest
            .base_patch
            .and_then(|id| self.registry.manifest(id).ok())
    }

    /// Referenced manifests in declaration order
    pub fn referenced(&self) -> impl Iterator<Item = ManifestRef<'a>> + 'a {
        let registry = self.registry;
        let manifest = self.manifest;
        manifest
            .referenced
            .iter()
            .filter_map(move |&id| registry.manifest(id).ok())
    }

    /// Asset at an entry-table position, following patched slots
    pub fn asset(&self, slot: usize) -> Result<&'a Asset> {
        self.registry.asset_at(AssetLocation {
            manifest: self.id,
            slot,
        })
    }

    /// Assets in entry-table order, patched slots resolved
    pub fn assets(&self) -> impl Iterator<Item = &'a Asset> + 'a {
        let this = *self;
        (0..self.manifest.slots.len()).filter_map(move |slot| this.asset(slot).ok())
    }

    /// Owning location of `handle`
    ///
    /// Searches this manifest's own slots first, then each referenced
    /// manifest depth-first in declaration order.
    pub fn locate(&self, handle: &AssetHandle) -> Result<Option<AssetLocation>> {
        self.manifest.ensure_linked()?;

        if let Some(&slot) = self.manifest.index.get(handle) {
            let location = match &self.manifest.slots[slot] {
                AssetSlot::Owned(_) => AssetLocation {
                    manifest: self.id,
                    slot,
                },
                AssetSlot::Patched { target, .. } => *target,
            };
            return Ok(Some(location));
        }

        for &id in &self.manifest.referenced {
            if let Some(location) = self.registry.manifest(id)?.locate(handle)? {
                return Ok(Some(location));
            }
        }
        Ok(None)
    }

    /// Like [`find`](Self::find), but a missing asset is `Ok(None)`
    pub fn try_find(&self, handle: &AssetHandle) -> Result<Option<&'a Asset>> {
        match self.locate(handle)? {
            Some(location) => self.registry.asset_at(location).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve a handle to its asset
    pub fn find(&self, handle: &AssetHandle) -> Result<&'a Asset> {
        self.try_find(handle)?
            .ok_or(AssetStreamError::AssetNotFound(*handle))
    }

    /// Read the payload of `handle` from the manifest that owns it
    pub fn get_chunk(&self, handle: &AssetHandle) -> Result<Chunk> {
        let asset = self.find(handle)?;
        self.registry.get(asset.manifest)?.read_chunk(asset)
    }

    /// Read the custom data of `handle` from the manifest that owns it
    pub fn get_custom_data(&self, handle: &AssetHandle) -> Result<Vec<u8>> {
        let asset = self.find(handle)?;
        self.registry.get(asset.manifest)?.read_custom_data(asset)
    }
}

impl<'a> Deref for ManifestRef<'a> {
    type Target = Manifest;

    fn deref(&self) -> &Manifest {
        self.manifest
    }
}

impl fmt::Debug for ManifestRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestRef")
            .field("id", &self.id)
            .field("file_name", &self.manifest.file_name)
            .finish()
    }
}

impl fmt::Display for ManifestRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.manifest, f)
    }
}

/// Raw entry table and buffers of a manifest file
struct Tables {
    entries: Vec<AssetEntry>,
    asset_references: Vec<u8>,
    reference_names: Vec<u8>,
    asset_names: Vec<u8>,
    source_file_names: Vec<u8>,
}

impl Tables {
    fn read<R: Read + ?Sized>(stream: &mut R, header: &ManifestHeader) -> Result<Self> {
        let count = header.asset_count as usize;
        let mut entries = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let entry = AssetEntry::decode(stream, header.is_big_endian)?;
            entry.validate()?;
            entries.push(entry);
        }

        Ok(Tables {
            entries,
            asset_references: read_exact_or(
                stream,
                header.asset_reference_buffer_size as usize,
                "asset reference buffer",
            )?,
            reference_names: read_exact_or(
                stream,
                header.reference_manifest_name_buffer_size as usize,
                "reference manifest name buffer",
            )?,
            asset_names: read_exact_or(
                stream,
                header.asset_name_buffer_size as usize,
                "asset name buffer",
            )?,
            source_file_names: read_exact_or(
                stream,
                header.source_file_name_buffer_size as usize,
                "source file name buffer",
            )?,
        })
    }
}

/// Split the reference name buffer into `(tag, name)` records
pub fn parse_reference_names(buffer: &[u8]) -> Result<Vec<(u8, String)>> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < buffer.len() {
        let tag = buffer[pos];
        let tail = &buffer[pos + 1..];
        let len = tail.iter().position(|&b| b == 0).ok_or_else(|| {
            AssetStreamError::Malformed(format!(
                "unterminated reference manifest name at offset {}",
                pos + 1
            ))
        })?;
        records.push((tag, String::from_utf8_lossy(&tail[..len]).into_owned()));
        pos += len + 2;
    }
    Ok(records)
}

/// Base patch and referenced manifests of a manifest being loaded
#[derive(Default)]
struct Links {
    base_patch: Option<ManifestId>,
    referenced: Vec<ManifestId>,
}

/// Drives one manifest through the load stages
pub(crate) struct ManifestLoader<'r> {
    registry: &'r mut ManifestRegistry,
    provider: Arc<dyn FileProvider>,
    url: String,
    stage: LoadStage,
}

impl<'r> ManifestLoader<'r> {
    pub(crate) fn new(registry: &'r mut ManifestRegistry, provider: Arc<dyn FileProvider>, url: &str) -> Self {
        ManifestLoader {
            registry,
            provider,
            url: url.to_string(),
            stage: LoadStage::Unopened,
        }
    }

    /// Load to `Ready` and push into the registry
    pub(crate) fn run(mut self, use_version_file: bool) -> Result<ManifestId> {
        match self.load(use_version_file) {
            Ok(id) => Ok(id),
            Err(err) => Err(err.at_stage(&self.url, self.stage)),
        }
    }

    fn enter(&mut self, stage: LoadStage) {
        debug!("Manifest {}: {} -> {}", self.url, self.stage, stage);
        self.stage = stage;
    }

    fn load(&mut self, use_version_file: bool) -> Result<ManifestId> {
        let data_root = self.registry.config().data_root.clone();
        if use_version_file {
            self.url = self.resolve_version(&data_root)?;
        }

        let mut stream = self
            .provider
            .open_stream(&vpath::combine(&data_root, &self.url))?;
        let header = ManifestHeader::read(&mut stream)?;
        header.validate()?;
        self.enter(LoadStage::HeaderRead);

        let tables = Tables::read(&mut stream, &header)?;
        drop(stream);
        self.enter(LoadStage::TablesRead);

        let links = self.link(&tables.reference_names)?;
        let slots = self.resolve_assets(&header, &tables, &links)?;
        self.enter(LoadStage::AssetsResolved);

        let mut index = AHashMap::with_capacity(slots.len());
        for (slot, asset) in slots.iter().enumerate() {
            index.entry(asset.handle()).or_insert(slot);
        }

        let manifest = Manifest {
            base_path: vpath::without_extension(&self.url),
            file_name: self.url.clone(),
            data_root,
            provider: Arc::clone(&self.provider),
            header,
            slots,
            index,
            base_patch: links.base_patch,
            referenced: links.referenced,
        };
        let id = self.registry.push(manifest);
        self.enter(LoadStage::Ready);
        Ok(id)
    }

    /// Splice the contents of `<base>.version` into the manifest file name
    fn resolve_version(&self, data_root: &str) -> Result<String> {
        let base = vpath::without_extension(&self.url);
        let version_url = vpath::combine(data_root, &format!("{}.version", base));

        let mut version = String::new();
        if self.provider.file_exists(&version_url) {
            let mut bytes = Vec::new();
            self.provider
                .open_stream(&version_url)?
                .read_to_end(&mut bytes)?;
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            version = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
            debug!("Version file {} selects '{}'", version_url, version);
        }

        Ok(format!("{}{}.manifest", base, version))
    }

    /// Load the base patch manifest and resolve referenced manifests
    fn link(&mut self, reference_names: &[u8]) -> Result<Links> {
        let records = parse_reference_names(reference_names)?;
        let base_patches = records
            .iter()
            .filter(|(tag, _)| *tag == BASE_PATCH_TAG)
            .count();
        if base_patches > 1 {
            return Err(AssetStreamError::MultipleBasePatches);
        }

        let mut links = Links::default();
        for (tag, name) in records {
            if tag == BASE_PATCH_TAG {
                debug!("Loading base patch manifest {} for {}", name, self.url);
                let provider = Arc::clone(&self.provider);
                links.base_patch = Some(self.registry.load_unregistered(&provider, &name, false)?);
            } else {
                let id = self
                    .registry
                    .lookup(&name)
                    .ok_or_else(|| AssetStreamError::ManifestNotLoaded(name.clone()))?;
                debug!("Resolved referenced manifest {} as {}", name, id);
                links.referenced.push(id);
            }
        }
        Ok(links)
    }

    /// Build one slot per entry, accumulating linked offsets
    fn resolve_assets(
        &self,
        header: &ManifestHeader,
        tables: &Tables,
        links: &Links,
    ) -> Result<Vec<AssetSlot>> {
        let own_id = self.registry.next_id();
        let mut references = Cursor::new(tables.asset_references.as_slice());
        let mut offsets = LinkedOffsets::starting_at(LINKED_DATA_PREFIX);
        let mut slots = Vec::with_capacity(tables.entries.len());

        for entry in &tables.entries {
            let handle = entry.handle();
            let reference_count = entry.asset_reference_count as usize;

            if entry.is_patched_out() {
                let base_patch = links
                    .base_patch
                    .ok_or(AssetStreamError::MissingBasePatch(handle))?;
                let target = self
                    .registry
                    .locate(base_patch, &handle)?
                    .ok_or(AssetStreamError::PatchedAssetMissing(handle))?;
                // Patched entries keep their span in the reference buffer
                references.seek(SeekFrom::Current(
                    (reference_count * AssetHandle::SIZE) as i64,
                ))?;
                slots.push(AssetSlot::Patched { handle, target });
                continue;
            }

            let asset_references = (0..reference_count)
                .map(|_| AssetHandle::decode(&mut references, header.is_big_endian))
                .collect::<Result<Vec<_>>>()?;
            let name = c_string_at(&tables.asset_names, entry.name_offset as usize)?;
            let source_file =
                c_string_at(&tables.source_file_names, entry.source_file_name_offset as usize)?;

            let asset = Asset::from_entry(entry, name, source_file, asset_references, offsets, own_id);
            offsets.advance(&asset);
            slots.push(AssetSlot::Owned(asset));
        }

        debug!(
            "Manifest {}: {} slots, linked totals {}/{}/{}",
            self.url,
            slots.len(),
            offsets.instance - LINKED_DATA_PREFIX,
            offsets.relocation - LINKED_DATA_PREFIX,
            offsets.imports - LINKED_DATA_PREFIX
        );
        Ok(slots)
    }
}
