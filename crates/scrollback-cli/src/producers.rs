// crates/scrollback-cli/src/producers.rs
//
// Synthetic video/audio producer threads standing in for a real capture
// library and audio device. Each writes a fresh sample at roughly its
// configured cadence, stamped from the buffer's shared Clock, and exits
// when `shutdown` is set — mirroring the teacher's own
// `Arc<AtomicBool>` worker-shutdown convention.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scrollback_core::{FramePool, SyncedAVBuffer};

/// A real capture callback would rent a buffer, have the OS/driver
/// write into it, then return it once `add_video_frame` has copied its
/// contents into the ring's own blob. The pool exists precisely so this
/// cadence never allocates on the hot path once warmed up.
const FRAME_POOL_CAP: usize = 4;

pub fn spawn_video_producer(
    buf: Arc<SyncedAVBuffer>,
    width: u32,
    height: u32,
    fps: u32,
    shutdown: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let frame_size = (width * height * 4) as usize;
        let pool = FramePool::new(frame_size, FRAME_POOL_CAP);
        pool.prewarm(FRAME_POOL_CAP);
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        let mut seed: u8 = 0;
        while !shutdown.load(Ordering::Relaxed) {
            let ts = buf.clock().now();
            let mut frame = pool.rent();
            frame.iter_mut().for_each(|b| *b = seed);
            if let Err(e) = buf.add_video_frame(&frame, ts) {
                log::warn!("video producer: add_video_frame failed: {e}");
            }
            pool.return_buf(frame);
            seed = seed.wrapping_add(1);
            std::thread::sleep(period);
        }
        log::info!("video producer: shut down");
    })
}

pub fn spawn_audio_producer(
    buf: Arc<SyncedAVBuffer>,
    label: &'static str,
    is_system: bool,
    shutdown: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        // 20ms chunks at 48kHz stereo f32 ~= 960 samples * 2 channels * 4 bytes.
        const SAMPLE_COUNT: usize = 960;
        const CHANNELS: usize = 2;
        let chunk_bytes = SAMPLE_COUNT * CHANNELS * 4;
        let period = Duration::from_millis(20);
        while !shutdown.load(Ordering::Relaxed) {
            let ts = buf.clock().now();
            let bytes = vec![0u8; chunk_bytes];
            if is_system {
                buf.add_system_audio(&bytes, ts, SAMPLE_COUNT);
            } else {
                buf.add_microphone_audio(&bytes, ts, SAMPLE_COUNT);
            }
            std::thread::sleep(period);
        }
        log::info!("{label} audio producer: shut down");
    })
}
