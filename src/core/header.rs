use crate::core::codec::{Field, FieldReader, FieldWriter, Record};
use crate::core::error::{AssetStreamError, Result};

/// The only manifest format version this reader understands
pub const MANIFEST_VERSION: u16 = 5;

/// Size of the prefix at the start of `.bin`/`.relo`/`.imp` companion files
pub const LINKED_DATA_PREFIX: u64 = 4;

/// Size of the prefix at the start of `.cdata` files
pub const CUSTOM_DATA_PREFIX: u64 = 16;

/// Manifest file header
///
/// Occupies the first 52 bytes of a manifest. The two flag bytes are never
/// swapped; every other field is stored big-endian when `is_big_endian` is
/// set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManifestHeader {
    /// Multi-byte fields are big-endian
    pub is_big_endian: bool,

    /// Asset payloads are concatenated into shared companion files
    pub is_linked: bool,

    /// Format version (must be 5)
    pub version: u16,

    pub stream_checksum: u32,
    pub all_types_hash: u32,

    /// Number of entry records following the header
    pub asset_count: i32,

    pub total_instance_data_size: i32,
    pub max_instance_chunk_size: i32,
    pub max_relocation_chunk_size: i32,
    pub max_imports_chunk_size: i32,

    /// Sizes of the four variable-length buffers, in file order
    pub asset_reference_buffer_size: i32,
    pub reference_manifest_name_buffer_size: i32,
    pub asset_name_buffer_size: i32,
    pub source_file_name_buffer_size: i32,
}

impl ManifestHeader {
    /// Create a header for the current format version
    pub fn new() -> Self {
        ManifestHeader {
            version: MANIFEST_VERSION,
            ..Default::default()
        }
    }

    /// Decode from a stream, honoring the endianness flag stored in the
    /// header itself
    pub fn read<R: std::io::Read + ?Sized>(stream: &mut R) -> Result<Self> {
        // The flag bytes are endian-neutral, so decode once as little-endian
        // and swap afterwards if the flag asks for it
        let mut bytes = vec![0u8; Self::SIZE];
        let read = crate::core::codec::read_full(stream, &mut bytes)?;
        if read != Self::SIZE {
            return Err(AssetStreamError::TruncatedRecord {
                record: Self::NAME,
                expected: Self::SIZE,
                actual: read,
            });
        }
        let is_big_endian = bytes[0] != 0;
        Self::from_bytes(&bytes, is_big_endian)
    }

    /// Validate version and buffer sizes
    pub fn validate(&self) -> Result<()> {
        if self.version != MANIFEST_VERSION {
            return Err(AssetStreamError::UnsupportedVersion(self.version));
        }

        let sizes = [
            ("asset count", self.asset_count),
            ("asset reference buffer", self.asset_reference_buffer_size),
            (
                "reference manifest name buffer",
                self.reference_manifest_name_buffer_size,
            ),
            ("asset name buffer", self.asset_name_buffer_size),
            ("source file name buffer", self.source_file_name_buffer_size),
        ];
        for (what, value) in sizes {
            if value < 0 {
                return Err(AssetStreamError::Malformed(format!(
                    "negative {} size: {}",
                    what, value
                )));
            }
        }

        Ok(())
    }
}

impl Record for ManifestHeader {
    const NAME: &'static str = "ManifestHeader";
    const LAYOUT: &'static [Field] = &[
        Field::U8,
        Field::U8,
        Field::U16,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
        Field::U32,
    ];

    fn read_fields(reader: &mut FieldReader<'_>) -> Self {
        ManifestHeader {
            is_big_endian: reader.read_bool(),
            is_linked: reader.read_bool(),
            version: reader.read_u16(),
            stream_checksum: reader.read_u32(),
            all_types_hash: reader.read_u32(),
            asset_count: reader.read_i32(),
            total_instance_data_size: reader.read_i32(),
            max_instance_chunk_size: reader.read_i32(),
            max_relocation_chunk_size: reader.read_i32(),
            max_imports_chunk_size: reader.read_i32(),
            asset_reference_buffer_size: reader.read_i32(),
            reference_manifest_name_buffer_size: reader.read_i32(),
            asset_name_buffer_size: reader.read_i32(),
            source_file_name_buffer_size: reader.read_i32(),
        }
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.write_bool(self.is_big_endian);
        writer.write_bool(self.is_linked);
        writer.write_u16(self.version);
        writer.write_u32(self.stream_checksum);
        writer.write_u32(self.all_types_hash);
        writer.write_i32(self.asset_count);
        writer.write_i32(self.total_instance_data_size);
        writer.write_i32(self.max_instance_chunk_size);
        writer.write_i32(self.max_relocation_chunk_size);
        writer.write_i32(self.max_imports_chunk_size);
        writer.write_i32(self.asset_reference_buffer_size);
        writer.write_i32(self.reference_manifest_name_buffer_size);
        writer.write_i32(self.asset_name_buffer_size);
        writer.write_i32(self.source_file_name_buffer_size);
    }
}
