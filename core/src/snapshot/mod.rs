//! Persisted replay buffers (.grcn)
//!
//! A snapshot is the materialized replay buffer: the handles replay recreates
//! and the raw bytes of every call to replay, in order.
//!
//! # File Structure
//!
//! ```text
//! Header (24 bytes)
//!   magic: "GRCN"
//!   version: u8
//!   flags: u8
//!   reserved: [u8; 2]
//!   handle_count: u32
//!   call_count: u32
//!   checksum: u64        (xxh3 of both sections, 0 if unflagged)
//! Handle section         count x u64, or one LZ4 block if compressed
//! Call section           (u32 len + bytes) per call, or one LZ4 block
//! ```

mod reader;
mod writer;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;

pub const MAGIC: [u8; 4] = *b"GRCN";
pub const VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 24;

bitflags::bitflags! {
    /// Snapshot encoding flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SnapshotFlags: u8 {
        /// Sections are LZ4 compressed
        const COMPRESSED = 0b0000_0001;
        /// Header carries an xxh3 checksum of the sections
        const CHECKSUM = 0b0000_0010;
    }
}

impl SnapshotFlags {
    pub fn from_config(config: &crate::SnapshotConfig) -> Self {
        let mut flags = SnapshotFlags::empty();
        flags.set(SnapshotFlags::COMPRESSED, config.compress);
        flags.set(SnapshotFlags::CHECKSUM, config.checksum);
        flags
    }
}

/// Replay buffer contents, detached from any live graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayBuffers {
    /// Handles to pre-create, in replay order
    pub handles: Vec<u64>,
    /// Serialized calls, in replay order
    pub calls: Vec<Vec<u8>>,
}

impl ReplayBuffers {
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty() && self.calls.is_empty()
    }

    /// Total payload bytes across all calls
    pub fn call_bytes(&self) -> usize {
        self.calls.iter().map(Vec::len).sum()
    }

    /// All calls back to back, as a decoder consumes them
    pub fn decoder_buffer(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.call_bytes());
        for call in &self.calls {
            buffer.extend_from_slice(call);
        }
        buffer
    }
}
