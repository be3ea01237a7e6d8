//! Seekable RefPack decompression stream
//!
//! RefPack is a byte-oriented LZ77 format. Each op-code emits up to three
//! literal bytes from the input followed by a back-reference copied from
//! earlier output, or a block of literals, or ends the stream.
//!
//! **Design**:
//! - Output goes through a circular window (power-of-two size) that doubles
//!   as the read buffer; nothing is decoded until a read asks for it
//! - Back-references copy one byte at a time since source and destination
//!   may overlap
//! - Seeking backward restarts decoding at the data offset; seeking forward
//!   decodes and discards
//! - Format: `[flags][0xFB][length: 3 or 4 bytes BE][op-codes...]`

use crate::core::codec::read_full;
use crate::core::config::RefPackConfig;
use crate::core::error::{AssetStreamError, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::debug;

/// The only supported "highest non-stop" op-code value
pub const SENTINEL: u8 = 0xFB;

/// Flag bit selecting a 4-byte length field
const FLAG_WIDE_LENGTH: u8 = 0x80;

/// Longest single op-code in input bytes (literal block of 128)
const MAX_OP_INPUT: usize = 1 + 128;

/// Check whether the next two bytes look like a RefPack header
///
/// The stream position is left unchanged.
pub fn is_compressed<R: Read + Seek + ?Sized>(stream: &mut R) -> io::Result<bool> {
    let mut peek = [0u8; 2];
    let read = read_full(stream, &mut peek)?;
    if read > 0 {
        stream.seek(SeekFrom::Current(-(read as i64)))?;
    }
    Ok(read == 2 && peek[0] & 0x3E == 0x10 && peek[1] == SENTINEL)
}

/// Compressed stream header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefPackHeader {
    pub flags: u8,
    pub sentinel: u8,
    /// Decompressed length
    pub length: u64,
    /// Offset of the first op-code from the start of the header
    pub data_offset: u64,
}

impl RefPackHeader {
    pub fn read<R: Read + ?Sized>(stream: &mut R) -> Result<Self> {
        let mut prefix = [0u8; 2];
        if read_full(stream, &mut prefix)? != prefix.len() {
            return Err(AssetStreamError::UnexpectedEof(
                "compression header".to_string(),
            ));
        }

        let (flags, sentinel) = (prefix[0], prefix[1]);
        if flags & 0x3E != 0x10 || sentinel != SENTINEL {
            return Err(AssetStreamError::InvalidCompressionHeader { flags, sentinel });
        }

        let width = if flags & FLAG_WIDE_LENGTH != 0 { 4 } else { 3 };
        let mut length_bytes = [0u8; 4];
        if read_full(stream, &mut length_bytes[..width])? != width {
            return Err(AssetStreamError::UnexpectedEof(
                "compression header length".to_string(),
            ));
        }
        let length = length_bytes[..width]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64);

        Ok(RefPackHeader {
            flags,
            sentinel,
            length,
            data_offset: 2 + width as u64,
        })
    }
}

/// Read-only, seekable view of a RefPack-compressed stream
pub struct RefPackStream<R> {
    inner: R,
    header: RefPackHeader,

    /// Position of the header within `inner`
    base: u64,

    /// Compressed input buffer, valid range `input_start..input_end`
    input: Box<[u8]>,
    input_start: usize,
    input_end: usize,
    input_exhausted: bool,

    /// Op-code bytes consumed since the data offset
    compressed_position: u64,

    /// Circular output window
    window: Box<[u8]>,
    window_mask: u64,

    /// Total bytes written to the window (window write cursor)
    produced: u64,

    /// Uncompressed read position
    position: u64,

    /// Terminal op-code seen
    finished: bool,

    /// Decode error replayed by every later decode attempt
    failed: Option<(io::ErrorKind, String)>,
}

impl<R: Read + Seek> RefPackStream<R> {
    /// Open with the default window and input buffer sizes
    pub fn new(inner: R) -> Result<Self> {
        Self::with_config(inner, &RefPackConfig::default())
    }

    /// Open at the current position of `inner`
    pub fn with_config(mut inner: R, config: &RefPackConfig) -> Result<Self> {
        config.validate()?;

        let base = inner.stream_position()?;
        let header = RefPackHeader::read(&mut inner)?;

        Ok(RefPackStream {
            inner,
            header,
            base,
            input: vec![0u8; config.input_buffer_size].into_boxed_slice(),
            input_start: 0,
            input_end: 0,
            input_exhausted: false,
            compressed_position: 0,
            window: vec![0u8; config.window_size].into_boxed_slice(),
            window_mask: config.window_size as u64 - 1,
            produced: 0,
            position: 0,
            finished: false,
            failed: None,
        })
    }

    pub fn header(&self) -> &RefPackHeader {
        &self.header
    }

    /// Declared decompressed length
    pub fn len(&self) -> u64 {
        self.header.length
    }

    pub fn is_empty(&self) -> bool {
        self.header.length == 0
    }

    /// Uncompressed read position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Op-code bytes consumed since the data offset
    pub fn compressed_position(&self) -> u64 {
        self.compressed_position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Rewind decoding to the first op-code
    fn restart(&mut self) -> io::Result<()> {
        debug!(
            "Restarting RefPack decode from offset {} (was at {})",
            self.header.data_offset, self.position
        );
        self.rewind_decoder()?;
        self.position = 0;
        Ok(())
    }

    /// Reset the window and input to the first op-code, keeping `position`
    fn rewind_decoder(&mut self) -> io::Result<()> {
        self.inner
            .seek(SeekFrom::Start(self.base + self.header.data_offset))?;
        self.input_start = 0;
        self.input_end = 0;
        self.input_exhausted = false;
        self.compressed_position = 0;
        self.produced = 0;
        self.finished = false;
        self.failed = None;
        Ok(())
    }

    /// Keep at least one maximal op-code buffered unless the input is done
    fn fill_input(&mut self) -> io::Result<()> {
        if self.input_exhausted || self.input_end - self.input_start >= MAX_OP_INPUT {
            return Ok(());
        }

        self.input.copy_within(self.input_start..self.input_end, 0);
        self.input_end -= self.input_start;
        self.input_start = 0;

        while self.input_end < self.input.len() {
            match self.inner.read(&mut self.input[self.input_end..]) {
                Ok(0) => {
                    self.input_exhausted = true;
                    break;
                }
                Ok(n) => self.input_end += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn next_input(&mut self) -> io::Result<u8> {
        if self.input_start == self.input_end {
            return Err(AssetStreamError::UnexpectedEof(format!(
                "compressed op-code at input offset {}",
                self.compressed_position
            ))
            .into());
        }
        let byte = self.input[self.input_start];
        self.input_start += 1;
        self.compressed_position += 1;
        Ok(byte)
    }

    fn push(&mut self, byte: u8) {
        self.window[(self.produced & self.window_mask) as usize] = byte;
        self.produced += 1;
    }

    fn copy_literals(&mut self, count: usize) -> io::Result<()> {
        for _ in 0..count {
            let byte = self.next_input()?;
            self.push(byte);
        }
        Ok(())
    }

    /// Copy `run` bytes starting `distance + 1` bytes behind the write cursor
    fn copy_back(&mut self, distance: u64, run: usize) -> io::Result<()> {
        if distance >= self.produced {
            return Err(AssetStreamError::Malformed(format!(
                "back-reference distance {} exceeds {} decoded bytes",
                distance + 1,
                self.produced
            ))
            .into());
        }

        let mut source = self.produced - 1 - distance;
        for _ in 0..run {
            let byte = self.window[(source & self.window_mask) as usize];
            self.push(byte);
            source += 1;
        }
        Ok(())
    }

    /// Decode one op-code into the window
    fn unpack(&mut self) -> io::Result<()> {
        self.fill_input()?;
        let first = self.next_input()?;

        if first & 0x80 == 0 {
            // 0ddrrrll dddddddd
            let second = self.next_input()?;
            self.copy_literals((first & 0x03) as usize)?;
            let distance = (((first & 0x60) as u64) << 3) | second as u64;
            let run = ((first & 0x1C) >> 2) as usize + 3;
            self.copy_back(distance, run)
        } else if first & 0x40 == 0 {
            // 10rrrrrr lldddddd dddddddd
            let second = self.next_input()?;
            let third = self.next_input()?;
            self.copy_literals((second >> 6) as usize)?;
            let distance = (((second & 0x3F) as u64) << 8) | third as u64;
            let run = (first & 0x3F) as usize + 4;
            self.copy_back(distance, run)
        } else if first & 0x20 == 0 {
            // 110drrll dddddddd dddddddd rrrrrrrr
            let second = self.next_input()?;
            let third = self.next_input()?;
            let fourth = self.next_input()?;
            self.copy_literals((first & 0x03) as usize)?;
            let distance =
                (((first & 0x10) as u64) << 12) | ((second as u64) << 8) | third as u64;
            let run = (((first & 0x0C) as usize) << 6) + fourth as usize + 5;
            self.copy_back(distance, run)
        } else if first <= self.header.sentinel {
            // 111lllll: literal block, multiple of 4
            self.copy_literals((((first & 0x1F) as usize) + 1) << 2)
        } else {
            // 111111ll: trailing literals, end of stream
            self.copy_literals((first & 0x03) as usize)?;
            self.finished = true;
            Ok(())
        }
    }

    /// Decode another op-code if more output is possible
    fn decode_more(&mut self) -> io::Result<bool> {
        if let Some((kind, message)) = &self.failed {
            return Err(io::Error::new(*kind, message.clone()));
        }
        if self.finished || self.produced >= self.header.length {
            return Ok(false);
        }
        if let Err(err) = self.unpack() {
            self.failed = Some((err.kind(), err.to_string()));
            return Err(err);
        }
        Ok(true)
    }
}

impl<R: Read + Seek> Read for RefPackStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.header.length.saturating_sub(self.position);
        let wanted = (buf.len() as u64).min(remaining) as usize;

        let mut written = 0;
        while written < wanted {
            if self.position < self.produced {
                let start = (self.position & self.window_mask) as usize;
                let available = (self.produced - self.position) as usize;
                let count = available
                    .min(self.window.len() - start)
                    .min(wanted - written);
                buf[written..written + count].copy_from_slice(&self.window[start..start + count]);
                written += count;
                self.position += count as u64;
            } else {
                match self.decode_more() {
                    Ok(true) => {}
                    Ok(false) => break,
                    // Hand out what was decoded; the next call reports the error
                    Err(_) if written > 0 => break,
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(written)
    }
}

impl<R: Read + Seek> Seek for RefPackStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.header.length.checked_add_signed(delta),
        }
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;

        if target < self.position {
            self.restart()?;
        }
        while self.produced < target {
            match self.decode_more() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    // The window may have moved past `position`
                    self.rewind_decoder()?;
                    return Err(err);
                }
            }
        }
        self.position = target;
        Ok(target)
    }
}

impl<R> Write for RefPackStream<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(AssetStreamError::ReadOnlyStream.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(length: u32, ops: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x10, SENTINEL];
        bytes.extend_from_slice(&length.to_be_bytes()[1..]);
        bytes.extend_from_slice(ops);
        bytes
    }

    fn decode_all(bytes: Vec<u8>) -> Vec<u8> {
        let mut decoder = RefPackStream::new(Cursor::new(bytes)).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_detection() {
        let mut compressed = Cursor::new(stream(3, &[0xFF, b'a', b'b', b'c']));
        assert!(is_compressed(&mut compressed).unwrap());
        assert_eq!(compressed.position(), 0);

        let mut wide = Cursor::new(vec![0x90, SENTINEL, 0, 0, 0, 0]);
        assert!(is_compressed(&mut wide).unwrap());

        let mut plain = Cursor::new(b"plain text".to_vec());
        assert!(!is_compressed(&mut plain).unwrap());

        let mut other_sentinel = Cursor::new(vec![0x10, 0xFA, 0, 0, 0]);
        assert!(!is_compressed(&mut other_sentinel).unwrap());

        let mut tiny = Cursor::new(vec![0x10]);
        assert!(!is_compressed(&mut tiny).unwrap());
        assert_eq!(tiny.position(), 0);
    }

    #[test]
    fn test_header_widths() {
        let narrow = RefPackHeader::read(&mut Cursor::new(vec![0x10, SENTINEL, 0x01, 0x02, 0x03])).unwrap();
        assert_eq!(narrow.length, 0x010203);
        assert_eq!(narrow.data_offset, 5);

        let wide =
            RefPackHeader::read(&mut Cursor::new(vec![0x90, SENTINEL, 0x01, 0x02, 0x03, 0x04]))
                .unwrap();
        assert_eq!(wide.length, 0x01020304);
        assert_eq!(wide.data_offset, 6);
    }

    #[test]
    fn test_bad_header_rejected() {
        let result = RefPackHeader::read(&mut Cursor::new(vec![0x00, SENTINEL, 0, 0, 1]));
        assert!(matches!(
            result,
            Err(AssetStreamError::InvalidCompressionHeader { flags: 0x00, .. })
        ));
        let result = RefPackHeader::read(&mut Cursor::new(vec![0x10, SENTINEL, 0]));
        assert!(matches!(result, Err(AssetStreamError::UnexpectedEof(_))));
    }

    #[test]
    fn test_terminal_with_three_literals() {
        assert_eq!(decode_all(stream(3, &[0xFF, b'a', b'b', b'c'])), b"abc");
    }

    #[test]
    fn test_short_op_overlapping_copy() {
        // 2 literals "ab", then copy 3 from distance 1 => "ababa"
        let out = decode_all(stream(5, &[0x02, 0x01, b'a', b'b', 0xFC]));
        assert_eq!(out, b"ababa");
    }

    #[test]
    fn test_medium_op() {
        // 3 literals "xyz", copy 6 from distance 2
        let out = decode_all(stream(9, &[0x82, 0xC0, 0x02, b'x', b'y', b'z', 0xFC]));
        assert_eq!(out, b"xyzxyzxyz");
    }

    #[test]
    fn test_long_op() {
        // 1 literal "q", copy 5 from distance 0
        let out = decode_all(stream(6, &[0xC1, 0x00, 0x00, 0x00, b'q', 0xFC]));
        assert_eq!(out, b"qqqqqq");

        // Maximal run: 5 + 0x3FF
        let out = decode_all(stream(1 + 1028, &[0xCD, 0x00, 0x00, 0xFF, b'z', 0xFC]));
        assert_eq!(out.len(), 1029);
        assert!(out.iter().all(|&b| b == b'z'));
    }

    #[test]
    fn test_literal_block() {
        let mut ops = vec![0xE1];
        ops.extend_from_slice(b"12345678");
        ops.push(0xFD);
        ops.push(b'9');
        assert_eq!(decode_all(stream(9, &ops)), b"123456789");
    }

    #[test]
    fn test_sentinel_is_literal_block() {
        let mut ops = vec![SENTINEL];
        let literals: Vec<u8> = (0..112u8).collect();
        ops.extend_from_slice(&literals);
        ops.push(0xFC);
        assert_eq!(decode_all(stream(112, &ops)), literals);
    }

    #[test]
    fn test_read_truncates_at_declared_length() {
        // Declares 2 bytes, encodes 3
        let out = decode_all(stream(2, &[0xFF, b'a', b'b', b'c']));
        assert_eq!(out, b"ab");
    }

    #[test]
    fn test_stops_without_terminal_once_length_reached() {
        let mut ops = vec![0xE0];
        ops.extend_from_slice(b"abcd");
        assert_eq!(decode_all(stream(4, &ops)), b"abcd");
    }

    #[test]
    fn test_truncated_op_code() {
        let mut decoder = RefPackStream::new(Cursor::new(stream(8, &[0xE1, b'a']))).unwrap();
        let mut out = Vec::new();
        let err = decoder.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_back_reference_before_start() {
        let mut decoder = RefPackStream::new(Cursor::new(stream(3, &[0x00, 0x05, 0xFC]))).unwrap();
        let mut buf = [0u8; 3];
        let err = decoder.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_returns_bytes_decoded_before_error() {
        // "abcd" literal block, then a back-reference 256 bytes behind 4 bytes of output
        let bytes = stream(20, &[0xE0, b'a', b'b', b'c', b'd', 0x00, 0xFF]);
        let mut decoder = RefPackStream::new(Cursor::new(bytes)).unwrap();

        let mut buf = [0u8; 20];
        assert_eq!(decoder.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(decoder.position(), 4);

        let err = decoder.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(decoder.position(), 4);
        assert!(decoder.read(&mut buf).is_err());
    }

    #[test]
    fn test_failed_seek_keeps_earlier_bytes_readable() {
        // 8 literals, then enough 1028-byte runs to wrap the 256 KiB window,
        // then a literal block cut short
        let runs = 300;
        let mut ops = vec![0xE1];
        ops.extend_from_slice(b"ABCDEFGH");
        for _ in 0..runs {
            ops.extend_from_slice(&[0xCC, 0x00, 0x00, 0xFF]);
        }
        ops.extend_from_slice(&[0xE1, b'a']);
        let length = 8 + runs * 1028 + 100;
        let mut decoder =
            RefPackStream::new(Cursor::new(stream(length as u32, &ops))).unwrap();

        let err = decoder.seek(SeekFrom::Start(length as u64 - 10)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(decoder.position(), 0);

        let mut buf = [0u8; 9];
        decoder.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ABCDEFGHH");
    }

    #[test]
    fn test_seek_forward_and_back() {
        let bytes = stream(9, &[0x82, 0xC0, 0x02, b'x', b'y', b'z', 0xFC]);
        let mut decoder = RefPackStream::new(Cursor::new(bytes)).unwrap();

        decoder.seek(SeekFrom::Start(4)).unwrap();
        let mut buf = [0u8; 2];
        decoder.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"yz");
        assert_eq!(decoder.position(), 6);

        decoder.seek(SeekFrom::Current(-5)).unwrap();
        decoder.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"yz");

        assert_eq!(decoder.seek(SeekFrom::End(-1)).unwrap(), 8);
        decoder.read_exact(&mut buf[..1]).unwrap();
        assert_eq!(buf[0], b'z');

        assert!(decoder.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_seek_past_end_reads_nothing() {
        let mut decoder =
            RefPackStream::new(Cursor::new(stream(3, &[0xFF, b'a', b'b', b'c']))).unwrap();
        assert_eq!(decoder.seek(SeekFrom::Start(10)).unwrap(), 10);
        let mut buf = [0u8; 4];
        assert_eq!(decoder.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_header_at_nonzero_base() {
        let mut bytes = b"PAD!".to_vec();
        bytes.extend(stream(3, &[0xFF, b'a', b'b', b'c']));
        let mut cursor = Cursor::new(bytes);
        cursor.set_position(4);

        let mut decoder = RefPackStream::new(cursor).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");

        decoder.seek(SeekFrom::Start(0)).unwrap();
        out.clear();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_write_is_unsupported() {
        let mut decoder =
            RefPackStream::new(Cursor::new(stream(3, &[0xFF, b'a', b'b', b'c']))).unwrap();
        let err = decoder.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
