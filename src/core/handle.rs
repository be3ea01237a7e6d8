use crate::core::codec::{Field, FieldReader, FieldWriter, Record};
use crate::core::error::{AssetStreamError, Result};
use crate::core::hash::{case_insensitive_symbol_hash, case_sensitive_symbol_hash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key identifying an asset across manifests
///
/// Ordered by `(type_id, instance_id)`. Also the on-disk shape of a
/// cross-asset reference (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetHandle {
    pub type_id: u32,
    pub instance_id: u32,
}

impl AssetHandle {
    pub const fn new(type_id: u32, instance_id: u32) -> Self {
        AssetHandle {
            type_id,
            instance_id,
        }
    }

    /// Build a handle from type and instance names
    ///
    /// The type name is hashed case-sensitively, the instance name
    /// case-insensitively.
    pub fn from_parts(type_name: &str, instance_name: &str) -> Self {
        AssetHandle {
            type_id: case_sensitive_symbol_hash(type_name),
            instance_id: case_insensitive_symbol_hash(instance_name),
        }
    }

    /// Parse `"Type:Instance"`
    ///
    /// # Examples
    ///
    /// ```
    /// use assetstream_rs::AssetHandle;
    ///
    /// let a = AssetHandle::from_name("Texture:Grass").unwrap();
    /// let b = AssetHandle::from_name("Texture:GRASS").unwrap();
    /// assert_eq!(a, b);
    /// assert!(AssetHandle::from_name("NoSeparator").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Self> {
        let mut parts = name.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(type_name), Some(instance_name), None) => {
                Ok(Self::from_parts(type_name, instance_name))
            }
            _ => Err(AssetStreamError::InvalidAssetName(name.to_string())),
        }
    }
}

impl Record for AssetHandle {
    const NAME: &'static str = "AssetHandle";
    const LAYOUT: &'static [Field] = &[Field::U32, Field::U32];

    fn read_fields(reader: &mut FieldReader<'_>) -> Self {
        AssetHandle {
            type_id: reader.read_u32(),
            instance_id: reader.read_u32(),
        }
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.write_u32(self.type_id);
        writer.write_u32(self.instance_id);
    }
}

impl FromStr for AssetHandle {
    type Err = AssetStreamError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}:{:08X}", self.type_id, self.instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = AssetHandle::new(1, 900);
        let b = AssetHandle::new(2, 0);
        let c = AssetHandle::new(2, 5);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
        assert_eq!(b.cmp(&b), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_from_name_instance_case_insensitive() {
        let upper = AssetHandle::from_name("Foo:Bar").unwrap();
        let lower = AssetHandle::from_name("Foo:bar").unwrap();
        assert_eq!(upper, lower);

        let other_type = AssetHandle::from_name("foo:Bar").unwrap();
        assert_ne!(upper.type_id, other_type.type_id);
        assert_eq!(upper.instance_id, other_type.instance_id);
    }

    #[test]
    fn test_from_name_rejects_malformed() {
        assert!(AssetHandle::from_name("Foo").is_err());
        assert!(AssetHandle::from_name("Foo:Bar:Baz").is_err());
        assert!("Foo:Bar".parse::<AssetHandle>().is_ok());
    }

    #[test]
    fn test_record_endianness() {
        let handle = AssetHandle::new(0x0102_0304, 0x0A0B_0C0D);
        assert_eq!(
            handle.to_bytes(false),
            vec![0x04, 0x03, 0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A]
        );
        assert_eq!(
            handle.to_bytes(true),
            vec![0x01, 0x02, 0x03, 0x04, 0x0A, 0x0B, 0x0C, 0x0D]
        );
        assert_eq!(
            AssetHandle::from_bytes(&handle.to_bytes(true), true).unwrap(),
            handle
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(AssetHandle::new(0xAB, 0x1).to_string(), "000000AB:00000001");
    }
}
