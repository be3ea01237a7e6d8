use crate::core::codec::{Field, FieldReader, FieldWriter, Record};
use crate::core::error::{AssetStreamError, Result};
use crate::core::handle::AssetHandle;

/// On-disk asset table entry (44 bytes)
///
/// Offsets point into the manifest's shared name buffers. An entry with
/// `instance_data_size == 0` is patched out: its asset lives in the base
/// patch manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetEntry {
    pub type_id: u32,
    pub instance_id: u32,
    pub type_hash: u32,
    pub instance_hash: u32,
    pub asset_reference_offset: i32,
    pub asset_reference_count: i32,
    pub name_offset: i32,
    pub source_file_name_offset: i32,
    pub instance_data_size: i32,
    pub relocation_data_size: i32,
    pub imports_data_size: i32,
}

impl AssetEntry {
    pub fn handle(&self) -> AssetHandle {
        AssetHandle::new(self.type_id, self.instance_id)
    }

    pub fn is_patched_out(&self) -> bool {
        self.instance_data_size == 0
    }

    /// Reject negative counts, offsets and sizes
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("asset reference count", self.asset_reference_count),
            ("name offset", self.name_offset),
            ("source file name offset", self.source_file_name_offset),
            ("instance data size", self.instance_data_size),
            ("relocation data size", self.relocation_data_size),
            ("imports data size", self.imports_data_size),
        ];
        for (what, value) in fields {
            if value < 0 {
                return Err(AssetStreamError::Malformed(format!(
                    "asset {}: negative {} ({})",
                    self.handle(),
                    what,
                    value
                )));
            }
        }
        Ok(())
    }
}

impl Record for AssetEntry {
    const NAME: &'static str = "AssetEntry";
    const LAYOUT: &'static [Field] = &[Field::U32; 11];

    fn read_fields(reader: &mut FieldReader<'_>) -> Self {
        AssetEntry {
            type_id: reader.read_u32(),
            instance_id: reader.read_u32(),
            type_hash: reader.read_u32(),
            instance_hash: reader.read_u32(),
            asset_reference_offset: reader.read_i32(),
            asset_reference_count: reader.read_i32(),
            name_offset: reader.read_i32(),
            source_file_name_offset: reader.read_i32(),
            instance_data_size: reader.read_i32(),
            relocation_data_size: reader.read_i32(),
            imports_data_size: reader.read_i32(),
        }
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.write_u32(self.type_id);
        writer.write_u32(self.instance_id);
        writer.write_u32(self.type_hash);
        writer.write_u32(self.instance_hash);
        writer.write_i32(self.asset_reference_offset);
        writer.write_i32(self.asset_reference_count);
        writer.write_i32(self.name_offset);
        writer.write_i32(self.source_file_name_offset);
        writer.write_i32(self.instance_data_size);
        writer.write_i32(self.relocation_data_size);
        writer.write_i32(self.imports_data_size);
    }
}
