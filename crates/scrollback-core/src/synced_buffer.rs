// crates/scrollback-core/src/synced_buffer.rs
//
// Owns one VideoRing and two AudioRings (system, microphone) behind a
// shared Clock, and implements the one operation that reads across all
// three: extract_last_seconds. Everything else here is a thin forward
// to the underlying ring, stamped with the shared clock.

use crate::audio_ring::{AudioChunk, AudioRing, AudioRingConfig};
use crate::clock::{Clock, Timestamp};
use crate::error::{CoreError, CoreResult};
use crate::video_ring::{VideoRing, VideoRingConfig};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Self-contained handoff to an external encoder: one raw BGRA file on
/// disk plus two timestamp-bounded in-memory audio chunk lists. The
/// caller owns `video_raw_path` (if present) from the moment this is
/// returned and is responsible for deleting it.
#[derive(Debug, Clone)]
pub struct ExtractResult {
    pub video_raw_path: Option<PathBuf>,
    pub frame_count: usize,
    pub window_start_ts: Timestamp,
    pub window_end_ts: Timestamp,
    pub system_audio: Vec<AudioChunk>,
    pub mic_audio: Vec<AudioChunk>,
}

impl ExtractResult {
    fn empty() -> Self {
        Self {
            video_raw_path: None,
            frame_count: 0,
            window_start_ts: 0,
            window_end_ts: 0,
            system_audio: Vec::new(),
            mic_audio: Vec::new(),
        }
    }
}

pub struct SyncedAVBufferConfig {
    pub video: VideoRingConfig,
    pub system_audio: AudioRingConfig,
    pub mic_audio: AudioRingConfig,
    pub clock: Clock,
}

/// Ticks of audio kept past the video window's end, to avoid dropping
/// an audio chunk that likely straddles the boundary (spec invariant I6).
const END_MARGIN_SECONDS: f64 = 0.1;

pub struct SyncedAVBuffer {
    video: VideoRing,
    system_audio: AudioRing,
    mic_audio: AudioRing,
    clock: Clock,
    /// Reentrant-extraction guard: `extract_last_seconds` holds this for
    /// its whole duration so a second concurrent call observes `true`
    /// and returns `Busy` immediately rather than queueing.
    extracting: Mutex<bool>,
}

impl SyncedAVBuffer {
    pub fn new(cfg: SyncedAVBufferConfig) -> CoreResult<Self> {
        Ok(Self {
            video: VideoRing::new(cfg.video)?,
            system_audio: AudioRing::new(cfg.system_audio),
            mic_audio: AudioRing::new(cfg.mic_audio),
            clock: cfg.clock,
            extracting: Mutex::new(false),
        })
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn add_video_frame(&self, raw: &[u8], ts: Timestamp) -> CoreResult<()> {
        self.video.add(raw, ts)
    }

    pub fn add_system_audio(&self, bytes: &[u8], ts: Timestamp, sample_count: usize) {
        self.system_audio.add(bytes, ts, sample_count);
    }

    pub fn add_microphone_audio(&self, bytes: &[u8], ts: Timestamp, sample_count: usize) {
        self.mic_audio.add(bytes, ts, sample_count);
    }

    pub fn clear(&self) {
        self.video.clear();
        self.system_audio.clear();
        self.mic_audio.clear();
    }

    /// Materializes the trailing `n` seconds of video (as a raw BGRA
    /// file under `out_dir`) plus the system/microphone audio chunks
    /// that fall within the emitted video window (+ `END_MARGIN_SECONDS`).
    ///
    /// `cancel`, if set at any point before the video walk completes, is
    /// observed after the walk and causes the temp file to be deleted
    /// and `Cancelled` to be returned instead of a result. Reentrant
    /// calls while an extraction is already running return `Busy`
    /// immediately, without touching any ring.
    pub fn extract_last_seconds(
        &self,
        n: f64,
        out_dir: &Path,
        cancel: &Arc<AtomicBool>,
    ) -> CoreResult<ExtractResult> {
        {
            let mut guard = self.extracting.lock().unwrap();
            if *guard {
                return Err(CoreError::Busy);
            }
            *guard = true;
        }
        let result = self.extract_last_seconds_inner(n, out_dir, cancel);
        *self.extracting.lock().unwrap() = false;
        result
    }

    fn extract_last_seconds_inner(
        &self,
        n: f64,
        out_dir: &Path,
        cancel: &Arc<AtomicBool>,
    ) -> CoreResult<ExtractResult> {
        let now = self.clock.now();
        let target_start_ts = now - self.clock.seconds_to_ticks(n);

        let temp_path = out_dir.join(format!("video_raw_{}.bin", uuid::Uuid::new_v4()));

        let win = match self.video.write_window_to_raw_file(&temp_path, target_start_ts) {
            Ok(win) => win,
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        if cancel.load(Ordering::SeqCst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(CoreError::Cancelled);
        }

        if win.frame_count == 0 {
            let _ = std::fs::remove_file(&temp_path);
            return Ok(ExtractResult::empty());
        }

        let end_margin = self.clock.seconds_to_ticks(END_MARGIN_SECONDS);
        let audio_end = win.end_ts + end_margin;

        let system_audio = filter_audio(self.system_audio.snapshot(), win.start_ts, audio_end);
        let mic_audio = filter_audio(self.mic_audio.snapshot(), win.start_ts, audio_end);

        if cancel.load(Ordering::SeqCst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(CoreError::Cancelled);
        }

        Ok(ExtractResult {
            video_raw_path: Some(temp_path),
            frame_count: win.frame_count,
            window_start_ts: win.start_ts,
            window_end_ts: win.end_ts,
            system_audio,
            mic_audio,
        })
    }
}

fn filter_audio(chunks: Vec<AudioChunk>, start_ts: Timestamp, end_ts: Timestamp) -> Vec<AudioChunk> {
    chunks
        .into_iter()
        .filter(|c| c.timestamp >= start_ts && c.timestamp <= end_ts)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(dir: &Path, fps: u32, ram_seconds: f64, total_seconds: f64) -> SyncedAVBuffer {
        SyncedAVBuffer::new(SyncedAVBufferConfig {
            video: VideoRingConfig {
                width: 8,
                height: 8,
                fps,
                ram_seconds,
                total_seconds,
                codec_quality: 90,
                temp_path: dir.join("disk.bin"),
            },
            system_audio: AudioRingConfig { sample_rate: 48_000, channels: 2, duration_seconds: 5.0 },
            mic_audio: AudioRingConfig { sample_rate: 48_000, channels: 2, duration_seconds: 5.0 },
            clock: Clock::new(1_000_000).unwrap(),
        })
        .unwrap()
    }

    fn frame() -> Vec<u8> {
        vec![0u8; 8 * 8 * 4]
    }

    #[test]
    fn empty_buffer_yields_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let buf = buffer(dir.path(), 10, 1.0, 1.0);
        let cancel = Arc::new(AtomicBool::new(false));
        let result = buf.extract_last_seconds(5.0, dir.path(), &cancel).unwrap();
        assert_eq!(result.frame_count, 0);
        assert!(result.video_raw_path.is_none());
        // No stray temp file left in out_dir besides the ring's own disk backing file.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("video_raw_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn audio_window_filtering_matches_video_bounds_with_margin() {
        let dir = tempfile::tempdir().unwrap();
        let buf = buffer(dir.path(), 10, 5.0, 5.0);

        let t: i64 = 10_000_000; // arbitrary base tick
        for i in 0..11i64 {
            buf.add_video_frame(&frame(), t + i * 100_000).unwrap();
        }
        // system-audio chunks at T-0.5, T-0.1, T+0.2, T+0.9, T+1.05, T+1.2
        for offset_ms in [-500, -100, 200, 900, 1050, 1200] {
            buf.add_system_audio(&[0u8; 4], t + offset_ms * 1000, 1);
        }

        // Force the extraction window by pinning start/end directly via
        // the ring's own window result instead of depending on wall-
        // clock `now`: call the inner windowing logic through the public
        // API by choosing `n` and a clock offset that reproduces it.
        //
        // Simpler: drive window bounds straight off video ts range,
        // mirroring what extract_last_seconds would compute for
        // window_start_ts = t, window_end_ts = t + 1_000_000.
        let snapshot = buf.system_audio.snapshot();
        let filtered = filter_audio(snapshot, t, t + 1_000_000 + buf.clock.seconds_to_ticks(0.1));
        let timestamps: Vec<i64> = filtered.iter().map(|c| c.timestamp).collect();
        assert_eq!(timestamps, vec![t + 200_000, t + 900_000, t + 1_050_000]);
    }

    #[test]
    fn concurrent_extraction_is_rejected_as_busy() {
        let dir = tempfile::tempdir().unwrap();
        let buf = Arc::new(buffer(dir.path(), 10, 2.0, 2.0));
        for i in 0..5i64 {
            buf.add_video_frame(&frame(), i * 100_000).unwrap();
        }

        // Hold the reentrancy guard manually to simulate "extraction A
        // in flight" without needing real concurrency/timing.
        *buf.extracting.lock().unwrap() = true;
        let cancel = Arc::new(AtomicBool::new(false));
        let result = buf.extract_last_seconds(1.0, dir.path(), &cancel);
        assert!(matches!(result, Err(CoreError::Busy)));
        *buf.extracting.lock().unwrap() = false;

        // With the guard released, extraction proceeds normally.
        let result = buf.extract_last_seconds(1.0, dir.path(), &cancel).unwrap();
        assert!(result.frame_count > 0);
    }

    #[test]
    fn cancellation_after_walk_deletes_temp_file_and_returns_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let buf = buffer(dir.path(), 10, 2.0, 2.0);
        for i in 0..5i64 {
            buf.add_video_frame(&frame(), i * 100_000).unwrap();
        }
        let cancel = Arc::new(AtomicBool::new(true));
        let result = buf.extract_last_seconds(1.0, dir.path(), &cancel);
        assert!(matches!(result, Err(CoreError::Cancelled)));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("video_raw_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn clear_empties_all_three_stores() {
        let dir = tempfile::tempdir().unwrap();
        let buf = buffer(dir.path(), 10, 2.0, 2.0);
        buf.add_video_frame(&frame(), 0).unwrap();
        buf.add_system_audio(&[0u8; 4], 0, 1);
        buf.add_microphone_audio(&[0u8; 4], 0, 1);
        buf.clear();
        assert!(buf.system_audio.is_empty());
        assert!(buf.mic_audio.is_empty());
        let cancel = Arc::new(AtomicBool::new(false));
        let result = buf.extract_last_seconds(5.0, dir.path(), &cancel).unwrap();
        assert_eq!(result.frame_count, 0);
    }
}
