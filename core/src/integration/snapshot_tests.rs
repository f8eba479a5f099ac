//! Snapshot persistence scenarios

use std::fs::File;

use crate::config::{SnapshotConfig, TrackerConfig};
use crate::error::SnapshotError;
use crate::handle::ObjectType;
use crate::tracker::SnapshotTracker;

use super::test_utils::Session;

fn populated(config: TrackerConfig) -> Session {
    let mut session = Session::with_config(config);
    let (_, _, device) = session.device_chain();
    let (memory, _) = session.allocate_memory(device);
    let (image, _) = session.create(device, ObjectType::Image);
    session.bind_image_memory(device, image, memory);
    session.image_view(device, image);
    session.map_memory(device, memory);
    session
}

#[test]
fn test_snapshot_file_round_trip() {
    for (compress, checksum) in [(true, true), (false, false), (true, false), (false, true)] {
        let config = TrackerConfig {
            snapshot: SnapshotConfig { compress, checksum },
            ..TrackerConfig::lenient()
        };
        let session = populated(config);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.grcn");
        let saved = session
            .tracker
            .save_replay_buffers(File::create(&path).unwrap())
            .unwrap();
        let loaded = SnapshotTracker::load_replay_buffers(File::open(&path).unwrap()).unwrap();

        assert_eq!(loaded, saved);
        let replay = session.tracker.compute_replay_buffer();
        assert_eq!(loaded.calls.len(), replay.len());
        let handles: Vec<u64> = replay.handles.iter().map(|h| h.raw()).collect();
        assert_eq!(loaded.handles, handles);
        assert!(loaded.calls[0].starts_with(b"vkCreateInstance"));
    }
}

#[test]
fn test_snapshot_bytes_are_reproducible() {
    let session = populated(TrackerConfig::lenient());
    let mut first = Vec::new();
    let mut second = Vec::new();
    session.tracker.save_replay_buffers(&mut first).unwrap();
    session.tracker.save_replay_buffers(&mut second).unwrap();
    assert_eq!(first, second);

    // save -> load -> save gives the same bytes
    let loaded = SnapshotTracker::load_replay_buffers(first.as_slice()).unwrap();
    let mut third = Vec::new();
    crate::snapshot::BinaryWriter::new(&mut third)
        .write_buffers(
            &loaded,
            crate::snapshot::SnapshotFlags::from_config(&session.tracker.config().snapshot),
        )
        .unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_corrupt_snapshot_file_is_rejected() {
    let session = populated(TrackerConfig::lenient());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("device.grcn");
    session
        .tracker
        .save_replay_buffers(File::create(&path).unwrap())
        .unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let middle = bytes.len() / 2 + 12;
    bytes[middle] ^= 0x55;
    std::fs::write(&path, &bytes).unwrap();

    let err = SnapshotTracker::load_replay_buffers(File::open(&path).unwrap()).unwrap_err();
    assert!(matches!(err, SnapshotError::ChecksumMismatch { .. }));
}

#[test]
fn test_empty_tracker_snapshot() {
    let tracker = SnapshotTracker::new(TrackerConfig::lenient());
    let mut bytes = Vec::new();
    let saved = tracker.save_replay_buffers(&mut bytes).unwrap();
    assert!(saved.is_empty());
    let loaded = SnapshotTracker::load_replay_buffers(bytes.as_slice()).unwrap();
    assert!(loaded.is_empty());
    assert!(loaded.decoder_buffer().is_empty());
}
