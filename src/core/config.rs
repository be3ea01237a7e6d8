//! Reader configuration
//!
//! Loaded from TOML or built in code. Every field has a default, so an empty
//! document is a valid configuration:
//!
//! ```toml
//! data_root = "data"
//! use_version_file = true
//! detect_compression = true
//!
//! [refpack]
//! window_size = 262144
//! input_buffer_size = 65536
//! ```

use crate::core::error::{AssetStreamError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest back-reference distance plus one
pub const MAX_BACK_REFERENCE: usize = 0x0002_0000;

/// Most bytes a single op-code can produce (3 literals + 1028 copied)
pub const MAX_OP_OUTPUT: usize = 3 + 1028;

/// Decompression stream settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefPackConfig {
    /// Circular output window size in bytes (power of two)
    pub window_size: usize,

    /// Compressed input buffer size in bytes
    pub input_buffer_size: usize,
}

impl Default for RefPackConfig {
    fn default() -> Self {
        RefPackConfig {
            window_size: 0x0004_0000,
            input_buffer_size: 0x0001_0000,
        }
    }
}

impl RefPackConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.window_size.is_power_of_two() {
            return Err(AssetStreamError::InvalidConfig(format!(
                "refpack.window_size must be a power of two, got {}",
                self.window_size
            )));
        }
        if self.window_size < MAX_BACK_REFERENCE + MAX_OP_OUTPUT {
            return Err(AssetStreamError::InvalidConfig(format!(
                "refpack.window_size must be at least {} bytes, got {}",
                MAX_BACK_REFERENCE + MAX_OP_OUTPUT,
                self.window_size
            )));
        }
        if self.input_buffer_size < 256 {
            return Err(AssetStreamError::InvalidConfig(format!(
                "refpack.input_buffer_size must be at least 256 bytes, got {}",
                self.input_buffer_size
            )));
        }
        Ok(())
    }
}

/// Manifest loading settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Folder (provider URL) holding manifests and companion files
    pub data_root: String,

    /// Consult `<base>.version` files when opening top-level manifests
    pub use_version_file: bool,

    /// Transparently decode RefPack-compressed files
    pub detect_compression: bool,

    pub refpack: RefPackConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            data_root: "data".to_string(),
            use_version_file: true,
            detect_compression: true,
            refpack: RefPackConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StreamConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        self.refpack.validate()
    }

    /// Set the data root
    pub fn with_data_root(mut self, data_root: impl Into<String>) -> Self {
        self.data_root = data_root.into();
        self
    }

    /// Enable or disable `.version` indirection
    pub fn with_version_file(mut self, enabled: bool) -> Self {
        self.use_version_file = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.data_root, "data");
        assert!(config.use_version_file);
        assert!(config.detect_compression);
        assert_eq!(config.refpack.window_size, 0x40000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = StreamConfig::from_toml_str("").unwrap();
        assert_eq!(config, StreamConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = StreamConfig::from_toml_str(
            r#"
            data_root = "game/data"
            use_version_file = false

            [refpack]
            window_size = 524288
            "#,
        )
        .unwrap();
        assert_eq!(config.data_root, "game/data");
        assert!(!config.use_version_file);
        assert_eq!(config.refpack.window_size, 524288);
        assert_eq!(config.refpack.input_buffer_size, 0x10000);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let result = StreamConfig::from_toml_str("[refpack]\nwindow_size = 100000\n");
        assert!(matches!(result, Err(AssetStreamError::InvalidConfig(_))));

        let result = StreamConfig::from_toml_str("[refpack]\nwindow_size = 65536\n");
        assert!(matches!(result, Err(AssetStreamError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = StreamConfig::from_toml_str("data_root = ");
        assert!(matches!(result, Err(AssetStreamError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assetstream.toml");
        std::fs::write(&path, "detect_compression = false\n").unwrap();
        let config = StreamConfig::from_file(&path).unwrap();
        assert!(!config.detect_compression);
    }
}
