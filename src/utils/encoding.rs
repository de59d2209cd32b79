use crate::error::{Result, SearchError};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;

/// Version written into the header of every segment file
pub const FILE_FORMAT_VERSION: u32 = 1;

/// Header: 4 magic bytes + u32 version. Footer: crc32 of the payload.
const HEADER_LEN: usize = 8;
const FOOTER_LEN: usize = 4;

/// Encode a u32 as a variable-length integer
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 32 {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Delta-encode a sorted list of u32s
pub fn delta_encode(values: &[u32], buf: &mut Vec<u8>) {
    let mut prev = 0u32;
    for &value in values {
        let delta = value - prev;
        encode_varint(delta, buf);
        prev = value;
    }
}

/// Delta-decode a list of u32s
pub fn delta_decode(buf: &[u8]) -> Vec<u32> {
    let mut result = Vec::new();
    let mut prev = 0u32;
    let mut pos = 0;

    while pos < buf.len() {
        if let Some((delta, consumed)) = decode_varint(&buf[pos..]) {
            prev = prev.saturating_add(delta);
            result.push(prev);
            pos += consumed;
        } else {
            break;
        }
    }

    result
}

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u32 in little-endian format
pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Write a u64 in little-endian format
pub fn write_u64_le<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u64 in little-endian format
pub fn read_u64_le<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Write a single byte
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Read a single byte
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Write a varint-length-prefixed UTF-8 string
pub fn write_str<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let mut len = Vec::with_capacity(5);
    encode_varint(value.len() as u32, &mut len);
    writer.write_all(&len)?;
    writer.write_all(value.as_bytes())
}

/// Read a varint-length-prefixed UTF-8 string
pub fn read_str<R: Read>(reader: &mut R) -> io::Result<String> {
    let len = read_varint(reader)? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read a varint one byte at a time from a reader
pub fn read_varint<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;
    loop {
        if shift >= 32 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflow"));
        }
        let byte = read_u8(reader)?;
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Read `count` delta-encoded values written by [`delta_encode`]
pub fn read_delta_list<R: Read>(reader: &mut R, count: usize) -> io::Result<Vec<u32>> {
    let mut values = Vec::with_capacity(count.min(1 << 16));
    let mut prev = 0u32;
    for _ in 0..count {
        prev = prev
            .checked_add(read_varint(reader)?)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "delta overflow"))?;
        values.push(prev);
    }
    Ok(values)
}

/// Write a varint to a writer
pub fn write_varint<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    let mut buf = Vec::with_capacity(5);
    encode_varint(value, &mut buf);
    writer.write_all(&buf)
}

/// Write `payload` framed as `magic | version | payload | crc32` and fsync it.
pub fn write_checked_file(path: &Path, magic: &[u8; 4], payload: &[u8]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(magic)?;
    write_u32_le(&mut file, FILE_FORMAT_VERSION)?;
    file.write_all(payload)?;
    write_u32_le(&mut file, crc32fast::hash(payload))?;
    file.flush()?;
    file.get_ref().sync_all()?;
    Ok(())
}

/// Validate the framing of a checked file and return the payload range.
pub fn verify_frame(bytes: &[u8], magic: &[u8; 4], path: &Path) -> Result<Range<usize>> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN || &bytes[..4] != magic {
        return Err(SearchError::Corrupt(format!(
            "{}: bad header",
            path.display()
        )));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FILE_FORMAT_VERSION {
        return Err(SearchError::VersionMismatch {
            found: version,
            expected: FILE_FORMAT_VERSION,
        });
    }

    let payload = HEADER_LEN..bytes.len() - FOOTER_LEN;
    let footer = &bytes[payload.end..];
    let stored_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    if crc32fast::hash(&bytes[payload.clone()]) != stored_crc {
        return Err(SearchError::Corrupt(format!(
            "{}: checksum mismatch",
            path.display()
        )));
    }

    Ok(payload)
}

/// Read a checked file fully into memory, returning only the payload.
pub fn read_checked_file(path: &Path, magic: &[u8; 4]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)
        .map_err(|e| missing_file_as_corrupt(e, path))?
        .read_to_end(&mut bytes)?;
    let range = verify_frame(&bytes, magic, path)?;
    bytes.truncate(range.end);
    bytes.drain(..range.start);
    Ok(bytes)
}

/// Memory-map a checked file. The payload lives at the returned range.
pub fn map_checked_file(path: &Path, magic: &[u8; 4]) -> Result<(Mmap, Range<usize>)> {
    let file = File::open(path).map_err(|e| missing_file_as_corrupt(e, path))?;
    // SAFETY: segment files are immutable once renamed into place.
    let mmap = unsafe { Mmap::map(&file)? };
    let range = verify_frame(&mmap, magic, path)?;
    Ok((mmap, range))
}

/// A segment file that should exist but doesn't is corruption, not a lookup miss.
fn missing_file_as_corrupt(err: io::Error, path: &Path) -> SearchError {
    if err.kind() == io::ErrorKind::NotFound {
        SearchError::Corrupt(format!("{}: missing", path.display()))
    } else {
        SearchError::Io(err)
    }
}

/// Convert a decoding failure inside a payload into a `Corrupt` error.
pub fn corrupt_payload(path: &Path) -> impl Fn(io::Error) -> SearchError + '_ {
    move |err| SearchError::Corrupt(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_varint_roundtrip() {
        let values = [0, 1, 127, 128, 16383, 16384, u32::MAX];
        for value in values {
            let mut buf = Vec::new();
            encode_varint(value, &mut buf);
            let (decoded, _) = decode_varint(&buf).unwrap();
            assert_eq!(value, decoded);
            assert_eq!(read_varint(&mut Cursor::new(&buf)).unwrap(), value);
        }
    }

    #[test]
    fn test_delta_encoding() {
        let values = vec![1, 5, 10, 15, 100, 1000];
        let mut buf = Vec::new();
        delta_encode(&values, &mut buf);
        let decoded = delta_decode(&buf);
        assert_eq!(values, decoded);

        buf.push(0x7F);
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_delta_list(&mut cursor, 6).unwrap(), values);
        assert_eq!(read_varint(&mut cursor).unwrap(), 0x7F);
    }

    #[test]
    fn test_string_helpers() {
        let mut buf = Vec::new();
        write_str(&mut buf, "grüße").unwrap();
        write_str(&mut buf, "").unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(read_str(&mut cursor).unwrap(), "grüße");
        assert_eq!(read_str(&mut cursor).unwrap(), "");
        assert!(read_str(&mut cursor).is_err());
    }

    #[test]
    fn test_checked_file_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_checked_file(&path, b"TEST", b"payload bytes").unwrap();

        assert_eq!(read_checked_file(&path, b"TEST").unwrap(), b"payload bytes");
        assert!(matches!(
            read_checked_file(&path, b"NOPE"),
            Err(SearchError::Corrupt(_))
        ));

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[10] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            read_checked_file(&path, b"TEST"),
            Err(SearchError::Corrupt(_))
        ));
    }

    #[test]
    fn test_missing_checked_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_checked_file(&dir.path().join("absent.bin"), b"TEST");
        assert!(matches!(result, Err(SearchError::Corrupt(_))));
    }
}
