// crates/scrollback-core/src/audio_ring.rs
//
// Per-stream bounded ordered sequence of timestamped PCM chunks. Unlike
// VideoRing there is no disk tier — audio chunks are small and the
// retained duration is short, so the whole ring lives in memory, sized
// conservatively per spec.md §4.5 (`sample_rate * channels *
// duration_seconds` worst case, one chunk per sample).

use crate::clock::Timestamp;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One producer-sized run of interleaved PCM samples with a single
/// timestamp. `samples_bytes` is 32-bit float, by convention 48 kHz
/// stereo, but AudioRing itself is agnostic to the format — it only
/// ever copies and timestamps bytes.
#[derive(Clone)]
pub struct AudioChunk {
    pub samples_bytes: Vec<u8>,
    pub timestamp: Timestamp,
    pub sample_count: usize,
}

pub struct AudioRingConfig {
    pub sample_rate: u32,
    pub channels: u32,
    pub duration_seconds: f64,
}

struct RingState {
    chunks: VecDeque<AudioChunk>,
    capacity: usize,
}

pub struct AudioRing {
    state: Mutex<RingState>,
}

impl AudioRing {
    pub fn new(cfg: AudioRingConfig) -> Self {
        // Conservative upper bound: one chunk per sample. Real producers
        // deliver far larger chunks, so this is rarely approached, but
        // it's the bound spec.md §4.5 calls out explicitly.
        let capacity = ((cfg.sample_rate as f64) * (cfg.channels as f64) * cfg.duration_seconds)
            .max(1.0) as usize;
        Self {
            state: Mutex::new(RingState {
                chunks: VecDeque::with_capacity(capacity.min(4096)),
                capacity,
            }),
        }
    }

    /// Copies `bytes` into a new owned chunk, overwriting the oldest
    /// slot on overflow.
    pub fn add(&self, bytes: &[u8], ts: Timestamp, sample_count: usize) {
        let mut state = self.state.lock().unwrap();
        let capacity = state.capacity;
        if state.chunks.len() >= capacity {
            state.chunks.pop_front();
        }
        state.chunks.push_back(AudioChunk {
            samples_bytes: bytes.to_vec(),
            timestamp: ts,
            sample_count,
        });
    }

    /// All chunks currently held, oldest first. Chunks are immutable
    /// after insertion, so cloning them out is a consistent point-in-
    /// time snapshot even while `add` continues concurrently on others.
    pub fn snapshot(&self) -> Vec<AudioChunk> {
        let state = self.state.lock().unwrap();
        state.chunks.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.chunks.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> AudioRing {
        AudioRing::new(AudioRingConfig { sample_rate: 48_000, channels: 2, duration_seconds: 2.0 })
    }

    #[test]
    fn add_and_snapshot_preserve_order() {
        let r = ring();
        r.add(&[1, 2, 3, 4], 100, 1);
        r.add(&[5, 6, 7, 8], 200, 1);
        let snap = r.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].timestamp, 100);
        assert_eq!(snap[1].timestamp, 200);
    }

    #[test]
    fn overflow_overwrites_oldest() {
        // Tiny duration forces a tiny capacity so the test can overflow
        // it without adding thousands of chunks.
        let r = AudioRing::new(AudioRingConfig { sample_rate: 4, channels: 1, duration_seconds: 0.5 });
        // capacity = 4*1*0.5 = 2
        r.add(&[0], 1, 1);
        r.add(&[0], 2, 1);
        r.add(&[0], 3, 1);
        let snap = r.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].timestamp, 2);
        assert_eq!(snap[1].timestamp, 3);
    }

    #[test]
    fn clear_empties_ring() {
        let r = ring();
        r.add(&[1], 1, 1);
        r.clear();
        assert!(r.is_empty());
    }
}
