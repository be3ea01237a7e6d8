use crate::core::handle::AssetHandle;
use std::fmt;
use std::io;
use thiserror::Error;

/// Stage of the manifest loader at which a load failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    /// Resolving the URL and reading the header
    Unopened,
    /// Header validated, reading entries and buffers
    HeaderRead,
    /// Tables read, linking base patch and referenced manifests
    TablesRead,
    /// Links resolved, building asset slots
    AssetsResolved,
    /// Fully loaded
    Ready,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStage::Unopened => "unopened",
            LoadStage::HeaderRead => "header-read",
            LoadStage::TablesRead => "tables-read",
            LoadStage::AssetsResolved => "assets-resolved",
            LoadStage::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Broad failure category of an [`AssetStreamError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or truncated data
    Format,
    /// Missing file, asset or manifest
    NotFound,
    /// Structural rule of the format was broken
    InvariantViolation,
    /// Operation the reader does not implement
    Unsupported,
    /// Underlying I/O failure
    Io,
    /// Bad configuration
    Config,
}

#[derive(Error, Debug)]
pub enum AssetStreamError {
    #[error("Unsupported manifest version: {0} (expected 5)")]
    UnsupportedVersion(u16),

    #[error("Truncated {record} record: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unexpected end of stream while reading {0}")]
    UnexpectedEof(String),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Invalid compression header: flags 0x{flags:02X}, sentinel 0x{sentinel:02X}")]
    InvalidCompressionHeader { flags: u8, sentinel: u8 },

    #[error("Invalid asset name '{0}' (expected \"Type:Instance\")")]
    InvalidAssetName(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetHandle),

    #[error("Referenced manifest '{0}' is not loaded")]
    ManifestNotLoaded(String),

    #[error("Asset {0} is patched out but the manifest has no base patch manifest")]
    MissingBasePatch(AssetHandle),

    #[error("Patched asset {0} not found in the base patch manifest")]
    PatchedAssetMissing(AssetHandle),

    #[error("A manifest can't have multiple base patch manifests")]
    MultipleBasePatches,

    #[error("Base patch cycle through manifest: {0}")]
    CyclicBasePatch(String),

    #[error("Unknown manifest id: {0}")]
    UnknownManifest(usize),

    #[error("Unlinked manifests are not supported: {0}")]
    UnlinkedManifest(String),

    #[error("Compressed streams are read-only")]
    ReadOnlyStream,

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to load manifest '{url}' ({stage}): {source}")]
    Load {
        url: String,
        stage: LoadStage,
        #[source]
        source: Box<AssetStreamError>,
    },
}

impl AssetStreamError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssetStreamError::UnsupportedVersion(_)
            | AssetStreamError::TruncatedRecord { .. }
            | AssetStreamError::UnexpectedEof(_)
            | AssetStreamError::Malformed(_)
            | AssetStreamError::InvalidCompressionHeader { .. }
            | AssetStreamError::InvalidAssetName(_) => ErrorKind::Format,

            AssetStreamError::FileNotFound(_)
            | AssetStreamError::AssetNotFound(_)
            | AssetStreamError::ManifestNotLoaded(_)
            | AssetStreamError::MissingBasePatch(_)
            | AssetStreamError::PatchedAssetMissing(_) => ErrorKind::NotFound,

            AssetStreamError::MultipleBasePatches
            | AssetStreamError::CyclicBasePatch(_)
            | AssetStreamError::UnknownManifest(_) => {
                ErrorKind::InvariantViolation
            }

            AssetStreamError::UnlinkedManifest(_) | AssetStreamError::ReadOnlyStream => {
                ErrorKind::Unsupported
            }

            AssetStreamError::Config(_) | AssetStreamError::InvalidConfig(_) => ErrorKind::Config,

            AssetStreamError::Io(err) => classify_io(err),

            AssetStreamError::Load { source, .. } => source.kind(),
        }
    }

    /// True when the error means "not there" rather than "broken"
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Stage at which a manifest load failed, if this is a load error
    pub fn load_stage(&self) -> Option<LoadStage> {
        match self {
            AssetStreamError::Load { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Wrap into a load error unless it already is one
    ///
    /// Nested loads (base patch manifests) keep their own URL and stage.
    pub(crate) fn at_stage(self, url: &str, stage: LoadStage) -> Self {
        match self {
            err @ AssetStreamError::Load { .. } => err,
            other => AssetStreamError::Load {
                url: url.to_string(),
                stage,
                source: Box::new(other),
            },
        }
    }
}

fn classify_io(err: &io::Error) -> ErrorKind {
    if let Some(inner) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<AssetStreamError>())
    {
        return inner.kind();
    }

    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => ErrorKind::Format,
        io::ErrorKind::Unsupported => ErrorKind::Unsupported,
        _ => ErrorKind::Io,
    }
}

impl From<AssetStreamError> for io::Error {
    fn from(err: AssetStreamError) -> Self {
        match err {
            AssetStreamError::Io(inner) => inner,
            other => {
                let kind = match other.kind() {
                    ErrorKind::Format => io::ErrorKind::InvalidData,
                    ErrorKind::NotFound => io::ErrorKind::NotFound,
                    ErrorKind::Unsupported => io::ErrorKind::Unsupported,
                    _ => io::ErrorKind::Other,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AssetStreamError>;
