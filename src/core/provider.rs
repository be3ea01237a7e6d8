//! File provider capability
//!
//! The manifest loader never touches the host filesystem directly. Every
//! stream comes from a [`FileProvider`], addressed by a `/`-separated URL.
//! Providers substitute a [`RefPackStream`] when a stream starts with a
//! RefPack header, so callers always see decompressed bytes.

use crate::core::config::{RefPackConfig, StreamConfig};
use crate::core::error::{AssetStreamError, Result};
use crate::core::refpack::{is_compressed, RefPackStream};
use crate::core::vpath;
use ahash::AHashMap;
use parking_lot::RwLock;
use regex::Regex;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A readable, seekable stream handed out by a provider
pub trait ByteStream: Read + Seek + Send {}

impl<T: Read + Seek + Send + ?Sized> ByteStream for T {}

/// Source of named byte streams
pub trait FileProvider: Send + Sync + fmt::Debug {
    /// Open a stream, failing with [`AssetStreamError::FileNotFound`] when absent
    fn open_stream(&self, url: &str) -> Result<Box<dyn ByteStream>>;

    fn file_exists(&self, url: &str) -> bool;

    /// Files under the folder `url` whose name matches `pattern`
    ///
    /// Returned URLs include the folder prefix and are sorted.
    fn list_files(&self, url: &str, pattern: &str, recursive: bool) -> Result<Vec<String>>;

    /// Stored size of a file in bytes (before decompression)
    fn file_size(&self, url: &str) -> Result<u64>;
}

/// Wrap `stream` in a decompressor when it carries a RefPack header
///
/// Passing `None` disables detection.
pub fn open_transparent(
    mut stream: Box<dyn ByteStream>,
    compression: Option<&RefPackConfig>,
) -> Result<Box<dyn ByteStream>> {
    if let Some(config) = compression {
        if is_compressed(&mut stream)? {
            let decoder = RefPackStream::with_config(stream, config)?;
            debug!("Detected RefPack stream ({} bytes decompressed)", decoder.len());
            return Ok(Box::new(decoder));
        }
    }
    Ok(stream)
}

/// File name pattern with `*` (any run) and `?` (any single character)
///
/// Matching is case-insensitive. An empty pattern matches everything.
///
/// # Examples
///
/// ```
/// use assetstream_rs::core::provider::WildcardPattern;
///
/// let pattern = WildcardPattern::new("*.manifest").unwrap();
/// assert!(pattern.matches("Global.MANIFEST"));
/// assert!(!pattern.matches("global.bin"));
/// ```
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut source = String::from("(?is)^");
        if pattern.is_empty() {
            source.push_str(".*");
        }
        for c in pattern.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| {
            AssetStreamError::Malformed(format!("file pattern '{}': {}", pattern, e))
        })?;
        Ok(WildcardPattern { regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Provider backed by a host directory
#[derive(Debug, Clone)]
pub struct FileSystemProvider {
    root: PathBuf,
    compression: Option<RefPackConfig>,
}

impl FileSystemProvider {
    /// Serve files below `root` with compression detection enabled
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSystemProvider {
            root: root.into(),
            compression: Some(RefPackConfig::default()),
        }
    }

    pub fn with_config(root: impl Into<PathBuf>, config: &StreamConfig) -> Self {
        FileSystemProvider {
            root: root.into(),
            compression: config
                .detect_compression
                .then(|| config.refpack.clone()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for `url`; parent components never escape `root`
    fn resolve(&self, url: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in url.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => return Err(AssetStreamError::FileNotFound(url.to_string())),
                part => path.push(part),
            }
        }
        Ok(path)
    }
}

fn not_found_as(url: &str, err: io::Error) -> AssetStreamError {
    if err.kind() == io::ErrorKind::NotFound {
        AssetStreamError::FileNotFound(url.to_string())
    } else {
        AssetStreamError::Io(err)
    }
}

fn walk_directory(
    dir: &Path,
    url: &str,
    pattern: &WildcardPattern,
    recursive: bool,
    found: &mut Vec<String>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let child = vpath::combine(url, &name);

        if entry.file_type()?.is_dir() {
            if recursive {
                walk_directory(&entry.path(), &child, pattern, recursive, found)?;
            }
        } else if pattern.matches(&name) {
            found.push(child);
        }
    }
    Ok(())
}

impl FileProvider for FileSystemProvider {
    fn open_stream(&self, url: &str) -> Result<Box<dyn ByteStream>> {
        let path = self.resolve(url)?;
        if !path.is_file() {
            return Err(AssetStreamError::FileNotFound(url.to_string()));
        }

        let file = File::open(&path).map_err(|e| not_found_as(url, e))?;
        open_transparent(Box::new(BufReader::new(file)), self.compression.as_ref())
    }

    fn file_exists(&self, url: &str) -> bool {
        self.resolve(url).is_ok_and(|path| path.is_file())
    }

    fn list_files(&self, url: &str, pattern: &str, recursive: bool) -> Result<Vec<String>> {
        let dir = self.resolve(url)?;
        if !dir.is_dir() {
            return Err(AssetStreamError::FileNotFound(url.to_string()));
        }

        let pattern = WildcardPattern::new(pattern)?;
        let mut found = Vec::new();
        walk_directory(&dir, &vpath::normalize(url), &pattern, recursive, &mut found)?;
        found.sort();
        Ok(found)
    }

    fn file_size(&self, url: &str) -> Result<u64> {
        let metadata = fs::metadata(self.resolve(url)?).map_err(|e| not_found_as(url, e))?;
        if !metadata.is_file() {
            return Err(AssetStreamError::FileNotFound(url.to_string()));
        }
        Ok(metadata.len())
    }
}

/// Provider holding files in memory
///
/// URLs are normalized (`\` to `/`, no leading separator) and compared
/// case-sensitively.
pub struct MemoryProvider {
    files: RwLock<AHashMap<String, Arc<[u8]>>>,
    compression: Option<RefPackConfig>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        MemoryProvider {
            files: RwLock::new(AHashMap::new()),
            compression: Some(RefPackConfig::default()),
        }
    }

    pub fn with_config(config: &StreamConfig) -> Self {
        MemoryProvider {
            files: RwLock::new(AHashMap::new()),
            compression: config
                .detect_compression
                .then(|| config.refpack.clone()),
        }
    }

    fn key(url: &str) -> String {
        vpath::normalize(url).trim_start_matches('/').to_string()
    }

    /// Add or replace a file
    pub fn insert(&self, url: &str, data: impl Into<Vec<u8>>) {
        let data: Arc<[u8]> = Arc::from(data.into());
        self.files.write().insert(Self::key(url), data);
    }

    pub fn remove(&self, url: &str) -> bool {
        self.files.write().remove(&Self::key(url)).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("files", &self.len())
            .field("compression", &self.compression)
            .finish()
    }
}

impl FileProvider for MemoryProvider {
    fn open_stream(&self, url: &str) -> Result<Box<dyn ByteStream>> {
        let data = self
            .files
            .read()
            .get(&Self::key(url))
            .cloned()
            .ok_or_else(|| AssetStreamError::FileNotFound(url.to_string()))?;
        open_transparent(Box::new(Cursor::new(data)), self.compression.as_ref())
    }

    fn file_exists(&self, url: &str) -> bool {
        self.files.read().contains_key(&Self::key(url))
    }

    fn list_files(&self, url: &str, pattern: &str, recursive: bool) -> Result<Vec<String>> {
        let pattern = WildcardPattern::new(pattern)?;
        let folder = Self::key(url);
        let prefix = match folder.trim_end_matches('/') {
            "" => String::new(),
            trimmed => format!("{}/", trimmed),
        };

        let mut found: Vec<String> = self
            .files
            .read()
            .keys()
            .filter(|key| {
                key.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                    (recursive || !rest.contains('/')) && pattern.matches(vpath::file_name(rest))
                })
            })
            .cloned()
            .collect();
        found.sort();
        Ok(found)
    }

    fn file_size(&self, url: &str) -> Result<u64> {
        self.files
            .read()
            .get(&Self::key(url))
            .map(|data| data.len() as u64)
            .ok_or_else(|| AssetStreamError::FileNotFound(url.to_string()))
    }
}
