use crate::core::entry::AssetEntry;
use crate::core::handle::AssetHandle;
use crate::core::registry::ManifestId;
use std::fmt;

/// Resolved asset description
///
/// Built from an [`AssetEntry`] plus the manifest's name buffers. The three
/// linked offsets locate this asset's segments inside the owning manifest's
/// `.bin`, `.relo` and `.imp` companion files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub type_id: u32,
    pub instance_id: u32,
    pub type_hash: u32,
    pub instance_hash: u32,

    /// "Type:Instance"
    pub name: String,

    /// Source file the asset was built from
    pub source_file: String,

    /// Assets this one depends on, in declaration order
    pub references: Vec<AssetHandle>,

    pub instance_data_size: u32,
    pub relocation_data_size: u32,
    pub imports_data_size: u32,

    pub linked_instance_data_offset: u64,
    pub linked_relocation_data_offset: u64,
    pub linked_imports_data_offset: u64,

    /// Manifest that owns this asset's payload
    pub manifest: ManifestId,
}

/// Running `(instance, relocation, imports)` offsets into companion files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkedOffsets {
    pub instance: u64,
    pub relocation: u64,
    pub imports: u64,
}

impl LinkedOffsets {
    pub fn starting_at(prefix: u64) -> Self {
        LinkedOffsets {
            instance: prefix,
            relocation: prefix,
            imports: prefix,
        }
    }

    /// Advance past an asset's three segments
    pub fn advance(&mut self, asset: &Asset) {
        self.instance += asset.instance_data_size as u64;
        self.relocation += asset.relocation_data_size as u64;
        self.imports += asset.imports_data_size as u64;
    }
}

impl Asset {
    /// Build from a validated entry (sizes must be non-negative)
    pub(crate) fn from_entry(
        entry: &AssetEntry,
        name: String,
        source_file: String,
        references: Vec<AssetHandle>,
        offsets: LinkedOffsets,
        manifest: ManifestId,
    ) -> Self {
        Asset {
            type_id: entry.type_id,
            instance_id: entry.instance_id,
            type_hash: entry.type_hash,
            instance_hash: entry.instance_hash,
            name,
            source_file,
            references,
            instance_data_size: entry.instance_data_size as u32,
            relocation_data_size: entry.relocation_data_size as u32,
            imports_data_size: entry.imports_data_size as u32,
            linked_instance_data_offset: offsets.instance,
            linked_relocation_data_offset: offsets.relocation,
            linked_imports_data_offset: offsets.imports,
            manifest,
        }
    }

    pub fn handle(&self) -> AssetHandle {
        AssetHandle::new(self.type_id, self.instance_id)
    }

    /// Type part of the name
    pub fn type_name(&self) -> &str {
        self.name.split(':').next().unwrap_or("")
    }

    /// Instance part of the name (empty when the name has no separator)
    pub fn instance_name(&self) -> &str {
        self.name.split(':').nth(1).unwrap_or("")
    }

    /// File stem of the asset's custom data file
    pub fn custom_data_stem(&self) -> String {
        format!(
            "{:08x}.{:08x}.{:08x}.{:08x}",
            self.type_id, self.type_hash, self.instance_id, self.instance_hash
        )
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
