// crates/scrollback-core/src/lib.rs

pub mod audio_ring;
pub mod clock;
pub mod codec;
pub mod error;
pub mod frame_pool;
pub mod synced_buffer;
pub mod video_ring;

pub use audio_ring::{AudioChunk, AudioRing, AudioRingConfig};
pub use clock::{Clock, Timestamp};
pub use codec::CodecCtx;
pub use error::{CodecError, CoreError, CoreResult};
pub use frame_pool::FramePool;
pub use synced_buffer::{ExtractResult, SyncedAVBuffer, SyncedAVBufferConfig};
pub use video_ring::{VideoRing, VideoRingConfig, WindowResult};
