// crates/scrollback-core/src/video_ring/disk_tier.rs
//
// Memory-mapped disk tier: a single pre-sized file of `capacity_frames`
// fixed-stride slots. Slot `i` lives at byte offset `i * stride`:
//
//   [0, METADATA_BYTES)              packed { timestamp: i64, original_index: i32, valid: u8, _pad }
//   [METADATA_BYTES, stride)         compressed blob, JPEG EOI marker, then indeterminate padding
//
// Only the disk-writer thread (see mod.rs) ever calls `write_slot`; reads
// during extraction happen under the same ring mutex, so there is no
// additional synchronization inside this type.

use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// `timestamp: i64 (8) + original_index: i32 (4) + valid: u8 (1) + padding (3)`,
/// rounded up to an 8-byte-aligned 16 so slot math never has to think
/// about sub-word offsets.
pub const METADATA_BYTES: usize = 16;

pub struct DiskTier {
    mmap: MmapMut,
    path: PathBuf,
    pub capacity_frames: usize,
    pub stride: usize,
}

impl DiskTier {
    pub fn create(path: &Path, capacity_frames: usize, max_compressed_size: usize) -> std::io::Result<Self> {
        let stride = METADATA_BYTES + max_compressed_size;
        let total_size = (capacity_frames * stride) as u64;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total_size)?;

        // SAFETY: `file` outlives the mapping's use here (the mapping does
        // not retain the `File` handle, but the backing file itself is
        // only ever resized by this constructor, never shrunk or moved
        // while mapped, and no other process shares this path).
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            capacity_frames,
            stride,
        })
    }

    fn slot_offset(&self, slot_idx: usize) -> usize {
        slot_idx * self.stride
    }

    /// Writes metadata + blob into `slot_idx`, zero-padding the rest of
    /// the slot's blob region. `blob.len()` must be `<= stride -
    /// METADATA_BYTES` (the caller, `CodecCtx`, already enforces this
    /// via `max_compressed_size`).
    pub fn write_slot(&mut self, slot_idx: usize, timestamp: i64, original_index: u32, blob: &[u8]) {
        let off = self.slot_offset(slot_idx);
        let meta = &mut self.mmap[off..off + METADATA_BYTES];
        meta[0..8].copy_from_slice(&timestamp.to_le_bytes());
        meta[8..12].copy_from_slice(&original_index.to_le_bytes());
        meta[12] = 1; // valid
        meta[13..16].fill(0);

        let blob_region = &mut self.mmap[off + METADATA_BYTES..off + self.stride];
        blob_region[..blob.len()].copy_from_slice(blob);
        blob_region[blob.len()..].fill(0xAA); // indeterminate padding, never scanned past by CodecCtx
    }

    /// Marks `slot_idx` invalid without releasing its capacity (lazy
    /// retirement per the disk slot state machine in spec.md §4.8).
    pub fn retire_slot(&mut self, slot_idx: usize) {
        let off = self.slot_offset(slot_idx);
        self.mmap[off + 12] = 0;
    }

    pub fn read_meta(&self, slot_idx: usize) -> (i64, u32, bool) {
        let off = self.slot_offset(slot_idx);
        let meta = &self.mmap[off..off + METADATA_BYTES];
        let ts = i64::from_le_bytes(meta[0..8].try_into().unwrap());
        let idx = u32::from_le_bytes(meta[8..12].try_into().unwrap());
        let valid = meta[12] != 0;
        (ts, idx, valid)
    }

    pub fn blob_region(&self, slot_idx: usize) -> &[u8] {
        let off = self.slot_offset(slot_idx);
        &self.mmap[off + METADATA_BYTES..off + self.stride]
    }

    /// Total mapped file size in bytes — always `capacity_frames * stride`
    /// for the life of the tier (invariant P6).
    pub fn file_size(&self) -> usize {
        self.capacity_frames * self.stride
    }

    /// Invalidates every slot without truncating the mapped file.
    pub fn clear(&mut self) {
        for i in 0..self.capacity_frames {
            self.retire_slot(i);
        }
    }
}

impl Drop for DiskTier {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("DiskTier: failed to remove backing file {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_size_matches_capacity_times_stride() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.bin");
        let tier = DiskTier::create(&path, 10, 100).unwrap();
        assert_eq!(tier.file_size(), 10 * (METADATA_BYTES + 100));
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, tier.file_size());
    }

    #[test]
    fn write_then_read_round_trips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.bin");
        let mut tier = DiskTier::create(&path, 4, 50).unwrap();
        tier.write_slot(2, 12345, 7, &[1, 2, 3, 4]);
        let (ts, idx, valid) = tier.read_meta(2);
        assert_eq!(ts, 12345);
        assert_eq!(idx, 7);
        assert!(valid);
        assert_eq!(&tier.blob_region(2)[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn retire_marks_invalid_without_shrinking_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.bin");
        let mut tier = DiskTier::create(&path, 4, 50).unwrap();
        tier.write_slot(0, 1, 0, &[9]);
        tier.retire_slot(0);
        let (_, _, valid) = tier.read_meta(0);
        assert!(!valid);
        assert_eq!(tier.file_size(), 4 * (METADATA_BYTES + 50));
    }

    #[test]
    fn file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.bin");
        {
            let _tier = DiskTier::create(&path, 2, 20).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
