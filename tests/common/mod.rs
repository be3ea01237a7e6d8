//! Shared fixtures: manifest builder and a reference RefPack encoder

#![allow(dead_code)]

use assetstream_rs::core::codec::Record;
use assetstream_rs::core::entry::AssetEntry;
use assetstream_rs::core::header::ManifestHeader;
use assetstream_rs::core::vpath;
use assetstream_rs::{AssetHandle, FileProvider, MemoryProvider};
use std::sync::Arc;

/// Prefix written at the start of every companion file
pub const COMPANION_PREFIX: &[u8; 4] = b"HDR\0";

#[derive(Debug, Clone, Default)]
pub struct AssetSpec {
    pub name: String,
    pub source_file: String,
    pub instance: Vec<u8>,
    pub relocation: Vec<u8>,
    pub imports: Vec<u8>,
    pub references: Vec<AssetHandle>,
}

impl AssetSpec {
    pub fn new(name: &str, instance: &[u8]) -> Self {
        AssetSpec {
            name: name.to_string(),
            source_file: format!("art/{}.xml", name.replace(':', "_")),
            instance: instance.to_vec(),
            ..Default::default()
        }
    }

    /// A patched-out entry (no instance data)
    pub fn patched(name: &str) -> Self {
        Self::new(name, &[])
    }

    pub fn relocation(mut self, bytes: &[u8]) -> Self {
        self.relocation = bytes.to_vec();
        self
    }

    pub fn imports(mut self, bytes: &[u8]) -> Self {
        self.imports = bytes.to_vec();
        self
    }

    pub fn references(mut self, names: &[&str]) -> Self {
        self.references = names
            .iter()
            .map(|name| AssetHandle::from_name(name).unwrap())
            .collect();
        self
    }

    pub fn handle(&self) -> AssetHandle {
        AssetHandle::from_name(&self.name).unwrap()
    }
}

#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    pub big_endian: bool,
    pub linked: bool,
    pub version: u16,
    pub checksum: u32,
    pub reference_names: Vec<(u8, String)>,
    pub assets: Vec<AssetSpec>,
    pub compress_companions: bool,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        ManifestBuilder {
            big_endian: false,
            linked: true,
            version: 5,
            checksum: 0xDEAD_BEEF,
            reference_names: Vec::new(),
            assets: Vec::new(),
            compress_companions: false,
        }
    }
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn unlinked(mut self) -> Self {
        self.linked = false;
        self
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compress_companions = true;
        self
    }

    pub fn base_patch(mut self, name: &str) -> Self {
        self.reference_names.push((2, name.to_string()));
        self
    }

    pub fn reference(mut self, name: &str) -> Self {
        self.reference_names.push((1, name.to_string()));
        self
    }

    pub fn tagged_reference(mut self, tag: u8, name: &str) -> Self {
        self.reference_names.push((tag, name.to_string()));
        self
    }

    pub fn asset(mut self, name: &str, instance: &[u8]) -> Self {
        self.assets.push(AssetSpec::new(name, instance));
        self
    }

    pub fn patched(mut self, name: &str) -> Self {
        self.assets.push(AssetSpec::patched(name));
        self
    }

    pub fn spec(mut self, spec: AssetSpec) -> Self {
        self.assets.push(spec);
        self
    }

    /// Encode the manifest file
    pub fn manifest_bytes(&self) -> Vec<u8> {
        let mut entries = Vec::new();
        let mut reference_buffer = Vec::new();
        let mut name_buffer = Vec::new();
        let mut source_buffer = Vec::new();
        let mut reference_count = 0;

        for asset in &self.assets {
            let handle = asset.handle();
            entries.push(AssetEntry {
                type_id: handle.type_id,
                instance_id: handle.instance_id,
                type_hash: handle.type_id.rotate_left(8),
                instance_hash: handle.instance_id.rotate_left(8),
                asset_reference_offset: reference_count,
                asset_reference_count: asset.references.len() as i32,
                name_offset: name_buffer.len() as i32,
                source_file_name_offset: source_buffer.len() as i32,
                instance_data_size: asset.instance.len() as i32,
                relocation_data_size: asset.relocation.len() as i32,
                imports_data_size: asset.imports.len() as i32,
            });

            for reference in &asset.references {
                reference.encode(&mut reference_buffer, self.big_endian).unwrap();
            }
            reference_count += asset.references.len() as i32;
            name_buffer.extend_from_slice(asset.name.as_bytes());
            name_buffer.push(0);
            source_buffer.extend_from_slice(asset.source_file.as_bytes());
            source_buffer.push(0);
        }

        let mut manifest_names = Vec::new();
        for (tag, name) in &self.reference_names {
            manifest_names.push(*tag);
            manifest_names.extend_from_slice(name.as_bytes());
            manifest_names.push(0);
        }

        let header = ManifestHeader {
            is_big_endian: self.big_endian,
            is_linked: self.linked,
            version: self.version,
            stream_checksum: self.checksum,
            all_types_hash: 0x1234_5678,
            asset_count: self.assets.len() as i32,
            total_instance_data_size: self.assets.iter().map(|a| a.instance.len() as i32).sum(),
            max_instance_chunk_size: 0,
            max_relocation_chunk_size: 0,
            max_imports_chunk_size: 0,
            asset_reference_buffer_size: reference_buffer.len() as i32,
            reference_manifest_name_buffer_size: manifest_names.len() as i32,
            asset_name_buffer_size: name_buffer.len() as i32,
            source_file_name_buffer_size: source_buffer.len() as i32,
        };

        let mut bytes = Vec::new();
        header.encode(&mut bytes, self.big_endian).unwrap();
        for entry in &entries {
            entry.encode(&mut bytes, self.big_endian).unwrap();
        }
        bytes.extend_from_slice(&reference_buffer);
        bytes.extend_from_slice(&manifest_names);
        bytes.extend_from_slice(&name_buffer);
        bytes.extend_from_slice(&source_buffer);
        bytes
    }

    /// Encode a companion file: prefix, then each owned asset's segment
    pub fn companion(&self, segment: fn(&AssetSpec) -> &[u8]) -> Vec<u8> {
        let mut bytes = COMPANION_PREFIX.to_vec();
        for asset in self.assets.iter().filter(|a| !a.instance.is_empty()) {
            bytes.extend_from_slice(segment(asset));
        }
        if self.compress_companions {
            refpack_encode(&bytes, 1024)
        } else {
            bytes
        }
    }

    /// Write the manifest and its companion files under `data/`
    pub fn install(&self, provider: &MemoryProvider, url: &str) {
        let base = vpath::without_extension(url);
        provider.insert(&vpath::combine("data", url), self.manifest_bytes());
        provider.insert(
            &format!("data/{}.bin", base),
            self.companion(instance_segment),
        );
        provider.insert(
            &format!("data/{}.relo", base),
            self.companion(relocation_segment),
        );
        provider.insert(
            &format!("data/{}.imp", base),
            self.companion(imports_segment),
        );
    }
}

pub fn instance_segment(asset: &AssetSpec) -> &[u8] {
    &asset.instance
}

pub fn relocation_segment(asset: &AssetSpec) -> &[u8] {
    &asset.relocation
}

pub fn imports_segment(asset: &AssetSpec) -> &[u8] {
    &asset.imports
}

/// A memory provider plus the same provider as a trait object
pub fn memory_provider() -> (Arc<MemoryProvider>, Arc<dyn FileProvider>) {
    let memory = Arc::new(MemoryProvider::new());
    let provider: Arc<dyn FileProvider> = memory.clone();
    (memory, provider)
}

fn flush_literal_blocks(out: &mut Vec<u8>, pending: &mut Vec<u8>) {
    while pending.len() >= 4 {
        let block = (pending.len() / 4 * 4).min(112);
        out.push(0xE0 | ((block / 4 - 1) as u8));
        out.extend(pending.drain(..block));
    }
}

/// Greedy RefPack encoder using literal blocks and short copy ops
///
/// Back-references search at most `max_distance` (≤ 1024) bytes behind.
pub fn refpack_encode(data: &[u8], max_distance: usize) -> Vec<u8> {
    assert!(data.len() < 1 << 24);
    let mut out = vec![0x10, 0xFB];
    out.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);

    let max_distance = max_distance.min(1024);
    let mut pending = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let mut best = (0usize, 0usize);
        for distance in 1..=max_distance.min(pos) {
            let mut len = 0;
            while len < 10 && pos + len < data.len() && data[pos + len] == data[pos - distance + len] {
                len += 1;
            }
            if len > best.0 {
                best = (len, distance);
                if len == 10 {
                    break;
                }
            }
        }

        let (len, distance) = best;
        if len >= 3 {
            flush_literal_blocks(&mut out, &mut pending);
            let field = distance - 1;
            out.push((((field >> 3) & 0x60) as u8) | (((len - 3) as u8) << 2) | pending.len() as u8);
            out.push((field & 0xFF) as u8);
            out.append(&mut pending);
            pos += len;
        } else {
            pending.push(data[pos]);
            pos += 1;
        }
    }

    flush_literal_blocks(&mut out, &mut pending);
    out.push(0xFC | pending.len() as u8);
    out.append(&mut pending);
    out
}
