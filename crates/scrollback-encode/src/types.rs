// crates/scrollback-encode/src/types.rs
//
// Plain data crossing the channel between EncodeDriver's thread and
// whatever called it. No ffmpeg, no scrollback-core ring internals —
// an EncodeRequest carries only what write_window_to_raw_file already
// produced.

use std::path::PathBuf;

use scrollback_core::ExtractResult;
use uuid::Uuid;

/// Everything `drive` needs to turn one extracted window into a
/// finished container file.
pub struct EncodeRequest {
    pub job_id: Uuid,
    pub extract: ExtractResult,
    pub width: u32,
    pub height: u32,
    /// Average observed frame rate over the extracted window
    /// (`frame_count / (window duration in seconds)`), forwarded to
    /// ffmpeg's rawvideo input `-r` since captured cadence rarely
    /// matches the nominal configured fps exactly.
    pub observed_fps: f64,
    pub output: PathBuf,
}

/// Progress/result messages streamed back from `drive` while it runs
/// on its own thread, mirroring the teacher's own encode-result channel.
pub enum EncodeEvent {
    /// `frame` is the number of output frames ffmpeg has reported
    /// written so far; `total_frames` is `extract.frame_count`.
    Progress { job_id: Uuid, frame: u64, total_frames: u64 },
    Done { job_id: Uuid, path: PathBuf },
    Error { job_id: Uuid, msg: String },
}
