//! Snapshot writer

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use lz4_flex::compress_prepend_size;
use xxhash_rust::xxh3::xxh3_64;

use super::{MAGIC, ReplayBuffers, SnapshotFlags, VERSION};
use crate::error::SnapshotError;

/// Writer for persisted replay buffers
pub struct BinaryWriter<W: Write> {
    writer: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a complete snapshot
    pub fn write_buffers(&mut self, buffers: &ReplayBuffers, flags: SnapshotFlags) -> Result<(), SnapshotError> {
        let handle_count = section_count(buffers.handles.len(), "handles")?;
        let call_count = section_count(buffers.calls.len(), "calls")?;

        let mut body = Vec::with_capacity(buffers.handles.len() * 8 + buffers.call_bytes() + buffers.calls.len() * 4);
        let compressed = flags.contains(SnapshotFlags::COMPRESSED);
        write_section(&mut body, &encode_handles(&buffers.handles)?, compressed)?;
        write_section(&mut body, &encode_calls(&buffers.calls)?, compressed)?;

        let checksum = if flags.contains(SnapshotFlags::CHECKSUM) {
            xxh3_64(&body)
        } else {
            0
        };

        self.writer.write_all(&MAGIC)?;
        self.writer.write_u8(VERSION)?;
        self.writer.write_u8(flags.bits())?;
        self.writer.write_all(&[0u8; 2])?;
        self.writer.write_u32::<LittleEndian>(handle_count)?;
        self.writer.write_u32::<LittleEndian>(call_count)?;
        self.writer.write_u64::<LittleEndian>(checksum)?;
        self.writer.write_all(&body)?;
        self.writer.flush()?;

        tracing::debug!(
            handles = handle_count,
            calls = call_count,
            bytes = body.len(),
            ?flags,
            "wrote snapshot"
        );
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn section_count(len: usize, what: &str) -> Result<u32, SnapshotError> {
    u32::try_from(len).map_err(|_| SnapshotError::Corrupt(format!("too many {what}: {len}")))
}

fn encode_handles(handles: &[u64]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::with_capacity(handles.len() * 8);
    for &handle in handles {
        out.write_u64::<LittleEndian>(handle)?;
    }
    Ok(out)
}

fn encode_calls(calls: &[Vec<u8>]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::new();
    for call in calls {
        out.write_u32::<LittleEndian>(section_count(call.len(), "call bytes")?)?;
        out.write_all(call)?;
    }
    Ok(out)
}

/// Raw section bytes, or a length-prefixed LZ4 block
fn write_section(out: &mut Vec<u8>, raw: &[u8], compressed: bool) -> Result<(), SnapshotError> {
    if compressed {
        let block = compress_prepend_size(raw);
        out.write_u32::<LittleEndian>(section_count(block.len(), "compressed bytes")?)?;
        out.write_all(&block)?;
    } else {
        out.write_all(raw)?;
    }
    Ok(())
}
