//! Fixed-layout binary record codec
//!
//! Manifest records are plain sequences of little-endian integers. Files
//! written for big-endian platforms store the same layout with every
//! multi-byte field reversed, so each record type describes its layout as a
//! table of field widths and the codec swaps field-by-field before parsing.
//!
//! **Format**: records are decoded by copying `SIZE` bytes into a scratch
//! buffer, optionally swapping each field in place, then reading the fields
//! in order through a [`FieldReader`]. Encoding is the mirror image.

use crate::core::error::{AssetStreamError, Result};
use std::io::{self, Read, Write};

/// Width class of a single record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// 1 byte, never swapped (bytes and bool flags)
    U8,
    /// 2 bytes
    U16,
    /// 4 bytes
    U32,
}

impl Field {
    pub const fn width(self) -> usize {
        match self {
            Field::U8 => 1,
            Field::U16 => 2,
            Field::U32 => 4,
        }
    }
}

/// Total byte size of a record layout
pub const fn layout_size(layout: &[Field]) -> usize {
    let mut size = 0;
    let mut idx = 0;
    while idx < layout.len() {
        size += layout[idx].width();
        idx += 1;
    }
    size
}

/// Reverse every multi-byte field of `bytes` in place according to `layout`
///
/// Applying it twice restores the original bytes.
pub fn swap_fields(bytes: &mut [u8], layout: &[Field]) {
    let mut offset = 0;
    for field in layout {
        let width = field.width();
        bytes[offset..offset + width].reverse();
        offset += width;
    }
}

/// Sequential little-endian field reader over a record buffer
pub struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        FieldReader { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    pub fn read_u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn read_bool(&mut self) -> bool {
        self.read_u8() != 0
    }

    pub fn read_u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn read_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }
}

/// Sequential little-endian field writer
#[derive(Default)]
pub struct FieldWriter {
    bytes: Vec<u8>,
}

impl FieldWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        FieldWriter {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A fixed-layout on-disk record
///
/// `read_fields`/`write_fields` must visit fields in exactly the order and
/// widths declared by `LAYOUT`.
pub trait Record: Sized {
    /// Record name used in error messages
    const NAME: &'static str;

    /// Field widths in declaration order
    const LAYOUT: &'static [Field];

    /// Encoded size in bytes
    const SIZE: usize = layout_size(Self::LAYOUT);

    fn read_fields(reader: &mut FieldReader<'_>) -> Self;

    fn write_fields(&self, writer: &mut FieldWriter);

    /// Decode from the front of `bytes`
    fn from_bytes(bytes: &[u8], is_big_endian: bool) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(AssetStreamError::TruncatedRecord {
                record: Self::NAME,
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }

        let mut buffer = bytes[..Self::SIZE].to_vec();
        if is_big_endian {
            swap_fields(&mut buffer, Self::LAYOUT);
        }
        Ok(Self::read_fields(&mut FieldReader::new(&buffer)))
    }

    /// Encode to exactly `SIZE` bytes
    fn to_bytes(&self, is_big_endian: bool) -> Vec<u8> {
        let mut writer = FieldWriter::with_capacity(Self::SIZE);
        self.write_fields(&mut writer);
        let mut bytes = writer.into_bytes();
        debug_assert_eq!(bytes.len(), Self::SIZE, "{} layout mismatch", Self::NAME);
        if is_big_endian {
            swap_fields(&mut bytes, Self::LAYOUT);
        }
        bytes
    }

    /// Decode the next record from a stream
    ///
    /// A short read is a [`AssetStreamError::TruncatedRecord`].
    fn decode<R: Read + ?Sized>(stream: &mut R, is_big_endian: bool) -> Result<Self> {
        let mut buffer = vec![0u8; Self::SIZE];
        let read = read_full(stream, &mut buffer)?;
        if read != Self::SIZE {
            return Err(AssetStreamError::TruncatedRecord {
                record: Self::NAME,
                expected: Self::SIZE,
                actual: read,
            });
        }
        Self::from_bytes(&buffer, is_big_endian)
    }

    /// Write the record to a stream
    fn encode<W: Write + ?Sized>(&self, stream: &mut W, is_big_endian: bool) -> Result<()> {
        stream.write_all(&self.to_bytes(is_big_endian))?;
        Ok(())
    }
}

/// Read until `buf` is full or the stream ends, returning the byte count
pub fn read_full<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read exactly `len` bytes, reporting a short read as `UnexpectedEof(what)`
pub fn read_exact_or<R: Read + ?Sized>(stream: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    // Grow as data arrives; `len` comes from untrusted headers
    let mut buffer = Vec::with_capacity(len.min(0x10000));
    let read = Read::take(&mut *stream, len as u64).read_to_end(&mut buffer)?;
    if read != len {
        return Err(AssetStreamError::UnexpectedEof(format!(
            "{} ({} of {} bytes)",
            what, read, len
        )));
    }
    Ok(buffer)
}

/// Decode a NUL-terminated ANSI string starting at `offset`
pub fn c_string_at(buffer: &[u8], offset: usize) -> Result<String> {
    let tail = buffer.get(offset..).ok_or_else(|| {
        AssetStreamError::Malformed(format!(
            "string offset {} outside buffer of {} bytes",
            offset,
            buffer.len()
        ))
    })?;
    let end = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        AssetStreamError::Malformed(format!("unterminated string at offset {}", offset))
    })?;
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}
