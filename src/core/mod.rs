//! Manifest decoding, asset resolution and RefPack streams

pub mod asset;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod handle;
pub mod hash;
pub mod header;
pub mod manifest;
pub mod provider;
pub mod refpack;
pub mod registry;
pub mod vpath;

pub use asset::{Asset, LinkedOffsets};
pub use chunk::Chunk;
pub use config::{RefPackConfig, StreamConfig};
pub use entry::AssetEntry;
pub use error::{AssetStreamError, ErrorKind, LoadStage, Result};
pub use handle::AssetHandle;
pub use header::ManifestHeader;
pub use manifest::{AssetLocation, AssetSlot, Manifest, ManifestRef};
pub use provider::{ByteStream, FileProvider, FileSystemProvider, MemoryProvider};
pub use refpack::RefPackStream;
pub use registry::{ManifestId, ManifestRegistry};
