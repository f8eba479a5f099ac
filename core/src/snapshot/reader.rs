//! Snapshot reader
//!
//! Loading is a pure decode: no tracker state is involved.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use lz4_flex::decompress_size_prepended;
use xxhash_rust::xxh3::xxh3_64;

use super::{MAGIC, ReplayBuffers, SnapshotFlags, VERSION};
use crate::error::SnapshotError;

/// LZ4 cannot expand data by more than this factor
const MAX_LZ4_RATIO: usize = 255;

/// Reader for persisted replay buffers
pub struct BinaryReader<R: Read> {
    reader: R,
}

struct Header {
    flags: SnapshotFlags,
    handle_count: usize,
    call_count: usize,
    checksum: u64,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read and validate a complete snapshot
    pub fn read_buffers(&mut self) -> Result<ReplayBuffers, SnapshotError> {
        let header = self.read_header()?;

        let mut body = Vec::new();
        self.reader.read_to_end(&mut body)?;

        if header.flags.contains(SnapshotFlags::CHECKSUM) {
            let actual = xxh3_64(&body);
            if actual != header.checksum {
                return Err(SnapshotError::ChecksumMismatch {
                    expected: header.checksum,
                    actual,
                });
            }
        }

        let mut cursor = Cursor::new(&body);
        let compressed = header.flags.contains(SnapshotFlags::COMPRESSED);

        let handle_bytes = header.handle_count.saturating_mul(8);
        let handle_section = if compressed {
            cursor.read_block(Some(handle_bytes))?
        } else {
            cursor.take(handle_bytes, "handle section")?.to_vec()
        };
        let handles = decode_handles(&handle_section);

        let call_section = if compressed {
            cursor.read_block(None)?
        } else {
            cursor.rest().to_vec()
        };
        if compressed && !cursor.rest().is_empty() {
            return Err(SnapshotError::Corrupt(format!(
                "{} trailing bytes after call section",
                cursor.rest().len()
            )));
        }
        let calls = decode_calls(&call_section, header.call_count)?;

        tracing::debug!(handles = handles.len(), calls = calls.len(), "loaded snapshot");
        Ok(ReplayBuffers { handles, calls })
    }

    fn read_header(&mut self) -> Result<Header, SnapshotError> {
        let mut magic = [0u8; 4];
        self.reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(SnapshotError::BadMagic(magic));
        }
        let version = self.reader.read_u8()?;
        if version != VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let flags = SnapshotFlags::from_bits_truncate(self.reader.read_u8()?);
        let mut reserved = [0u8; 2];
        self.reader.read_exact(&mut reserved)?;

        let handle_count = self.reader.read_u32::<LittleEndian>()? as usize;
        let call_count = self.reader.read_u32::<LittleEndian>()? as usize;
        let checksum = self.reader.read_u64::<LittleEndian>()?;

        Ok(Header {
            flags,
            handle_count,
            call_count,
            checksum,
        })
    }
}

/// Bounds-checked slice walker
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| SnapshotError::Corrupt(format!("{what} truncated")))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self, what: &str) -> Result<usize, SnapshotError> {
        let mut bytes = self.take(4, what)?;
        Ok(bytes.read_u32::<LittleEndian>()? as usize)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Length-prefixed LZ4 block, optionally of a known decompressed size
    fn read_block(&mut self, expected: Option<usize>) -> Result<Vec<u8>, SnapshotError> {
        let len = self.read_u32("compressed block length")?;
        let block = self.take(len, "compressed block")?;

        let mut prefix = block;
        let declared = prefix
            .read_u32::<LittleEndian>()
            .map_err(|_| SnapshotError::Corrupt("compressed block too short".to_string()))?
            as usize;
        let plausible = match expected {
            Some(expected) => declared == expected,
            None => declared <= block.len().saturating_mul(MAX_LZ4_RATIO),
        };
        if !plausible {
            return Err(SnapshotError::Corrupt(format!(
                "implausible decompressed size {declared}"
            )));
        }

        decompress_size_prepended(block).map_err(|e| SnapshotError::Decompress(e.to_string()))
    }
}

fn decode_handles(section: &[u8]) -> Vec<u64> {
    section
        .chunks_exact(8)
        .map(LittleEndian::read_u64)
        .collect()
}

fn decode_calls(section: &[u8], count: usize) -> Result<Vec<Vec<u8>>, SnapshotError> {
    let mut cursor = Cursor::new(section);
    let mut calls = Vec::with_capacity(count.min(section.len() / 4));
    for i in 0..count {
        let len = cursor.read_u32("call length")?;
        let call = cursor.take(len, &format!("call {i}"))?;
        calls.push(call.to_vec());
    }
    if !cursor.rest().is_empty() {
        return Err(SnapshotError::Corrupt(format!(
            "{} trailing bytes after {count} calls",
            cursor.rest().len()
        )));
    }
    Ok(calls)
}
