// crates/scrollback-core/src/video_ring/mod.rs
//
// Two-tier circular store of compressed, timestamped frames: a bounded
// in-memory tier for the most recent `ram_seconds` and an optional
// memory-mapped disk tier for the remainder up to `total_seconds`.
//
// Concurrency: one coarse `Mutex<RingState>` guards both tiers' index
// bookkeeping (see spec.md §5 — "a simple mutex is acceptable if
// extraction bounded-time is measured and documented"). The producer
// thread (`add`) only ever holds it long enough to install a blob and
// hand the evicted occupant, if any, to the disk-writer thread over a
// bounded channel — it never performs I/O itself. The disk-writer
// thread takes the same mutex to perform its mmap write, which is fine:
// it isn't the producer thread `add_video_frame` cadence depends on.

mod disk_tier;

use crate::clock::Timestamp;
use crate::codec::CodecCtx;
use crate::error::{CoreError, CoreResult};
use disk_tier::DiskTier;

use crossbeam_channel::{Sender, TrySendError};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Fixed-at-construction configuration for one `VideoRing`.
pub struct VideoRingConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub ram_seconds: f64,
    pub total_seconds: f64,
    pub codec_quality: u8,
    /// Backing file for the disk tier. Ignored (and the disk tier
    /// omitted entirely) when `total_seconds == ram_seconds`.
    pub temp_path: PathBuf,
}

#[derive(Clone)]
struct MemSlot {
    ts: Timestamp,
    blob: Vec<u8>,
    original_index: u32,
    valid: bool,
}

impl MemSlot {
    fn empty() -> Self {
        Self { ts: 0, blob: Vec::new(), original_index: 0, valid: false }
    }
}

struct EvictedFrame {
    timestamp: Timestamp,
    original_index: u32,
    blob: Vec<u8>,
}

enum EvictMsg {
    Frame(EvictedFrame),
    Flush(Sender<()>),
}

struct RingState {
    mem: Vec<MemSlot>,
    mem_write_idx: usize,
    mem_count: usize,
    next_original_index: u32,
    disk: Option<DiskTier>,
    disk_write_cursor: usize,
    disk_frame_count: usize,
}

/// Result of a window walk: how many frames were emitted and the
/// timestamp span they cover. `frame_count == 0` means no frame in
/// `[window_start_ts, now]` existed at extraction time — the caller
/// must discard whatever (empty) output file resulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowResult {
    pub frame_count: usize,
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
}

pub struct VideoRing {
    codec: CodecCtx,
    ram_capacity_frames: usize,
    disk_capacity_frames: usize,
    state: Arc<Mutex<RingState>>,
    evict_tx: Sender<EvictMsg>,
    writer_handle: Option<JoinHandle<()>>,
}

impl VideoRing {
    pub fn new(cfg: VideoRingConfig) -> CoreResult<Self> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(CoreError::ConfigInvalid("width/height must be positive".into()));
        }
        if cfg.fps == 0 {
            return Err(CoreError::ConfigInvalid("fps must be positive".into()));
        }
        if cfg.ram_seconds < 0.0 {
            return Err(CoreError::ConfigInvalid("ram_seconds must be non-negative".into()));
        }
        if cfg.total_seconds < cfg.ram_seconds {
            return Err(CoreError::ConfigInvalid("total_seconds must be >= ram_seconds".into()));
        }

        let codec = CodecCtx::new(cfg.width, cfg.height, cfg.codec_quality)?;
        let ram_capacity_frames = (cfg.fps as f64 * cfg.ram_seconds).round() as usize;
        let disk_capacity_frames =
            (cfg.fps as f64 * (cfg.total_seconds - cfg.ram_seconds)).round() as usize;

        let disk = if disk_capacity_frames > 0 {
            match DiskTier::create(&cfg.temp_path, disk_capacity_frames, codec.max_compressed_size()) {
                Ok(d) => Some(d),
                Err(e) => {
                    log::warn!(
                        "VideoRing: disk tier allocation failed ({e}); falling back to memory-only"
                    );
                    None
                }
            }
        } else {
            None
        };
        let effective_disk_capacity = if disk.is_some() { disk_capacity_frames } else { 0 };

        let state = Arc::new(Mutex::new(RingState {
            mem: (0..ram_capacity_frames).map(|_| MemSlot::empty()).collect(),
            mem_write_idx: 0,
            mem_count: 0,
            next_original_index: 0,
            disk,
            disk_write_cursor: 0,
            disk_frame_count: 0,
        }));

        // Disk-writer worker: the sole owner of the disk tier write
        // cursor. Bounded, drop-newest: a full queue means the disk
        // tier is momentarily behind, never that `add` blocks on it.
        let (evict_tx, evict_rx) = crossbeam_channel::bounded::<EvictMsg>(1024);
        let state_for_writer = Arc::clone(&state);
        let writer_handle = std::thread::spawn(move || {
            for msg in evict_rx {
                match msg {
                    EvictMsg::Frame(ev) => {
                        let mut guard = state_for_writer.lock().unwrap();
                        if let Some(disk) = guard.disk.as_mut() {
                            let cursor = guard.disk_write_cursor;
                            let cap = disk.capacity_frames;
                            disk.write_slot(cursor, ev.timestamp, ev.original_index, &ev.blob);
                            guard.disk_write_cursor = (cursor + 1) % cap;
                            guard.disk_frame_count = (guard.disk_frame_count + 1).min(cap);
                        }
                        // else: disk_capacity_frames == 0, eviction simply drops.
                    }
                    EvictMsg::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(Self {
            codec,
            ram_capacity_frames,
            disk_capacity_frames: effective_disk_capacity,
            state,
            evict_tx,
            writer_handle: Some(writer_handle),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.codec.frame_size()
    }

    /// Blocks until every eviction enqueued before this call has been
    /// written to the disk tier. Not on any producer hot path — used by
    /// callers (and tests) that need a deterministic view of the disk
    /// tier immediately after a burst of `add` calls.
    pub fn flush_disk_writer(&self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        if self.evict_tx.send(EvictMsg::Flush(tx)).is_ok() {
            let _ = rx.recv();
        }
    }

    /// Copies `raw` (exactly `frame_size` BGRA bytes), compresses it,
    /// and installs it as the newest frame at `ts`. Never blocks on
    /// disk I/O — eviction, if any, is handed off to the disk-writer
    /// thread.
    pub fn add(&self, raw: &[u8], ts: Timestamp) -> CoreResult<()> {
        let mut blob = Vec::new();
        self.codec.compress(raw, &mut blob)?;

        let evicted = {
            let mut state = self.state.lock().unwrap();
            let original_index = state.next_original_index;
            state.next_original_index = state.next_original_index.wrapping_add(1);

            if self.ram_capacity_frames == 0 {
                Some(EvictedFrame { timestamp: ts, original_index, blob })
            } else {
                let idx = state.mem_write_idx;
                let was_full = state.mem_count >= self.ram_capacity_frames;
                let new_slot = MemSlot { ts, blob, original_index, valid: true };
                let old_slot = std::mem::replace(&mut state.mem[idx], new_slot);
                state.mem_write_idx = (idx + 1) % self.ram_capacity_frames;
                if !was_full {
                    state.mem_count += 1;
                }
                if was_full && old_slot.valid {
                    Some(EvictedFrame {
                        timestamp: old_slot.ts,
                        original_index: old_slot.original_index,
                        blob: old_slot.blob,
                    })
                } else {
                    None
                }
            }
        };

        if let Some(ev) = evicted {
            if self.disk_capacity_frames > 0 {
                if let Err(TrySendError::Full(_)) = self.evict_tx.try_send(EvictMsg::Frame(ev)) {
                    log::warn!("VideoRing: disk eviction queue full, dropping one frame");
                }
            }
            // else: no disk tier — evicted blob is simply dropped (spec §4.4.1).
        }
        Ok(())
    }

    /// Walks the disk tier (oldest-to-newest) then the memory tier
    /// (chronological), decompressing every frame whose timestamp is
    /// `>= window_start_ts` into `out_path` as concatenated raw BGRA.
    /// Corrupted blobs are skipped and logged, not fatal.
    pub fn write_window_to_raw_file(
        &self,
        out_path: &std::path::Path,
        window_start_ts: Timestamp,
    ) -> CoreResult<WindowResult> {
        let state = self.state.lock().unwrap();

        let file = std::fs::File::create(out_path)?;
        let mut out = BufWriter::new(file);
        let mut scratch = vec![0u8; self.codec.frame_size()];

        let mut frame_count = 0usize;
        let mut start_ts: Option<Timestamp> = None;
        let mut end_ts: Timestamp = 0;

        if let Some(disk) = state.disk.as_ref() {
            let cap = disk.capacity_frames;
            let start = (state.disk_write_cursor + cap - state.disk_frame_count) % cap;
            for step in 0..state.disk_frame_count {
                let idx = (start + step) % cap;
                let (ts, _original_index, valid) = disk.read_meta(idx);
                if !valid || ts < window_start_ts {
                    continue;
                }
                let region = disk.blob_region(idx);
                let Some(len) = self.codec.scan_blob_len(region) else {
                    log::warn!("VideoRing: disk slot {idx} missing end marker, skipping");
                    continue;
                };
                if self.codec.decompress_into(&region[..len], &mut scratch).is_err() {
                    log::warn!("VideoRing: disk slot {idx} failed to decode, skipping");
                    continue;
                }
                out.write_all(&scratch)?;
                frame_count += 1;
                start_ts.get_or_insert(ts);
                end_ts = ts;
            }
        }

        if self.ram_capacity_frames > 0 {
            let start = (state.mem_write_idx + self.ram_capacity_frames - state.mem_count)
                % self.ram_capacity_frames;
            for step in 0..state.mem_count {
                let idx = (start + step) % self.ram_capacity_frames;
                let slot = &state.mem[idx];
                if !slot.valid || slot.ts < window_start_ts {
                    continue;
                }
                if self.codec.decompress_into(&slot.blob, &mut scratch).is_err() {
                    log::warn!("VideoRing: memory slot {idx} failed to decode, skipping");
                    continue;
                }
                out.write_all(&scratch)?;
                frame_count += 1;
                start_ts.get_or_insert(slot.ts);
                end_ts = slot.ts;
            }
        }

        out.flush()?;

        Ok(WindowResult {
            frame_count,
            start_ts: start_ts.unwrap_or(0),
            end_ts,
        })
    }

    /// Marks every slot invalid and resets indices/counts. Does not
    /// truncate the mapped disk file (spec.md §4.4 / §4.8).
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        for slot in state.mem.iter_mut() {
            slot.valid = false;
        }
        state.mem_write_idx = 0;
        state.mem_count = 0;
        state.disk_write_cursor = 0;
        state.disk_frame_count = 0;
        if let Some(disk) = state.disk.as_mut() {
            disk.clear();
        }
    }
}

impl Drop for VideoRing {
    fn drop(&mut self) {
        // Dropping the sender closes the channel, ending the writer
        // thread's `for msg in evict_rx` loop. The writer holds its own
        // `Arc` clone of `state`, so joining here isn't load-bearing for
        // memory safety, only for a clean shutdown (no frame silently
        // lost between the last `add` and process exit).
        if let Some(handle) = self.writer_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(width: u32, height: u32, fps: u32, ram_seconds: f64, total_seconds: f64, dir: &std::path::Path) -> VideoRingConfig {
        VideoRingConfig {
            width,
            height,
            fps,
            ram_seconds,
            total_seconds,
            codec_quality: 90,
            temp_path: dir.join("video_ring_disk.bin"),
        }
    }

    fn frame(width: u32, height: u32, seed: u8) -> Vec<u8> {
        vec![seed; (width * height * 4) as usize]
    }

    #[test]
    fn rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = cfg(16, 16, 10, 3.0, 2.0, dir.path());
        bad.total_seconds = 2.0;
        bad.ram_seconds = 3.0;
        assert!(VideoRing::new(bad).is_err());
    }

    #[test]
    fn tight_window_single_tier() {
        let dir = tempfile::tempdir().unwrap();
        let ring = VideoRing::new(cfg(16, 16, 10, 2.0, 2.0, dir.path())).unwrap();

        for i in 0..25i64 {
            let ts = i * 100_000; // 0.1s steps in microsecond-ish ticks
            ring.add(&frame(16, 16, i as u8), ts).unwrap();
        }
        ring.flush_disk_writer();

        let now = 24 * 100_000 + 10_000;
        let window_start = now - 1_000_000; // trailing 1 second
        let out_path = dir.path().join("window.bin");
        let result = ring.write_window_to_raw_file(&out_path, window_start).unwrap();

        assert_eq!(result.frame_count, 10);
        assert_eq!(result.start_ts, 15 * 100_000);
        assert_eq!(result.end_ts, 24 * 100_000);
        let meta = std::fs::metadata(&out_path).unwrap();
        assert_eq!(meta.len() as usize, 10 * 16 * 16 * 4);
    }

    #[test]
    fn two_tier_eviction_and_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let ring = VideoRing::new(cfg(32, 32, 30, 1.0, 3.0, dir.path())).unwrap();

        for i in 0..120i64 {
            let ts = i * 1_000_000 / 30;
            ring.add(&frame(32, 32, (i % 256) as u8), ts).unwrap();
        }
        ring.flush_disk_writer();

        let out_path = dir.path().join("window.bin");
        let result = ring.write_window_to_raw_file(&out_path, 0).unwrap();
        assert_eq!(result.frame_count, 90);
        assert_eq!(result.start_ts, 30 * 1_000_000 / 30);
        assert_eq!(result.end_ts, 119 * 1_000_000 / 30);
    }

    #[test]
    fn empty_ring_yields_zero_frames() {
        let dir = tempfile::tempdir().unwrap();
        let ring = VideoRing::new(cfg(8, 8, 5, 1.0, 1.0, dir.path())).unwrap();
        let out_path = dir.path().join("window.bin");
        let result = ring.write_window_to_raw_file(&out_path, 0).unwrap();
        assert_eq!(result.frame_count, 0);
    }

    #[test]
    fn clear_then_extract_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ring = VideoRing::new(cfg(8, 8, 5, 1.0, 1.0, dir.path())).unwrap();
        for i in 0..5i64 {
            ring.add(&frame(8, 8, i as u8), i * 200_000).unwrap();
        }
        ring.clear();
        let out_path = dir.path().join("window.bin");
        let result = ring.write_window_to_raw_file(&out_path, 0).unwrap();
        assert_eq!(result.frame_count, 0);
    }

    #[test]
    fn corrupted_blob_is_skipped_and_neighbours_stay_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let ring = VideoRing::new(cfg(8, 8, 5, 2.0, 2.0, dir.path())).unwrap();

        for i in 0..5i64 {
            ring.add(&frame(8, 8, i as u8), i * 100_000).unwrap();
        }

        // Corrupt the third stored frame (seed 2) in place so it fails to
        // decode; the other four must still be emitted, in order.
        {
            let mut state = ring.state.lock().unwrap();
            let blob = &mut state.mem[2].blob;
            for b in blob.iter_mut() {
                *b = 0;
            }
        }

        let out_path = dir.path().join("window.bin");
        let result = ring.write_window_to_raw_file(&out_path, 0).unwrap();
        assert_eq!(result.frame_count, 4);

        let bytes = std::fs::read(&out_path).unwrap();
        let frame_size = 8 * 8 * 4;
        assert_eq!(bytes.len(), 4 * frame_size);
        let seeds: Vec<u8> = bytes.chunks_exact(frame_size).map(|c| c[0]).collect();
        assert_eq!(seeds, vec![0, 1, 3, 4]);
    }

    #[test]
    fn tie_at_window_start_is_included() {
        let dir = tempfile::tempdir().unwrap();
        let ring = VideoRing::new(cfg(4, 4, 5, 1.0, 1.0, dir.path())).unwrap();
        for i in 0..3i64 {
            ring.add(&frame(4, 4, i as u8), i * 1_000_000).unwrap();
        }
        let out_path = dir.path().join("window.bin");
        let result = ring.write_window_to_raw_file(&out_path, 1_000_000).unwrap();
        assert_eq!(result.frame_count, 2); // ts=1_000_000 and ts=2_000_000
        assert_eq!(result.start_ts, 1_000_000);
    }
}
