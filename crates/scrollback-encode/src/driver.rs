// crates/scrollback-encode/src/driver.rs
//
// Turns one ExtractResult into a finished container file by shelling
// out to the ffmpeg CLI, the same subprocess-driven approach the
// teacher uses for audio/waveform extraction rather than linking
// ffmpeg in-process. `drive` is blocking and meant to run on its own
// thread — callers get progress back over `tx`, never a return value.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use uuid::Uuid;

use crate::types::{EncodeEvent, EncodeRequest};

const AUDIO_SAMPLE_RATE: u32 = 48_000;
const AUDIO_CHANNELS: u32 = 2;

pub fn drive(req: EncodeRequest, tx: &Sender<EncodeEvent>) {
    let video_path = match &req.extract.video_raw_path {
        Some(p) => p.clone(),
        None => {
            send_error(tx, req.job_id, "ExtractResult has no raw video to encode".into());
            return;
        }
    };

    let work_dir = match video_path.parent() {
        Some(p) => p.to_path_buf(),
        None => std::env::temp_dir(),
    };

    let sys_pcm_path = work_dir.join(format!("scrollback_sys_{}.pcm", req.job_id));
    let mic_pcm_path = work_dir.join(format!("scrollback_mic_{}.pcm", req.job_id));

    if let Err(e) = write_pcm_file(&sys_pcm_path, &req) {
        send_error(tx, req.job_id, format!("failed to write system-audio temp file: {e}"));
        return;
    }
    if let Err(e) = write_pcm_file(&mic_pcm_path, &req) {
        cleanup(&[&sys_pcm_path]);
        send_error(tx, req.job_id, format!("failed to write microphone-audio temp file: {e}"));
        return;
    }

    let _ = tx.send(EncodeEvent::Progress {
        job_id: req.job_id,
        frame: 0,
        total_frames: req.extract.frame_count as u64,
    });

    let status = run_ffmpeg(&req, &video_path, &sys_pcm_path, &mic_pcm_path);
    cleanup(&[&sys_pcm_path, &mic_pcm_path]);

    match status {
        Ok(out) if out.status.success() => {
            let _ = tx.send(EncodeEvent::Progress {
                job_id: req.job_id,
                frame: req.extract.frame_count as u64,
                total_frames: req.extract.frame_count as u64,
            });
            let _ = tx.send(EncodeEvent::Done { job_id: req.job_id, path: req.output.clone() });
            log::info!("scrollback-encode: wrote {}", req.output.display());
        }
        Ok(out) => {
            let msg = String::from_utf8_lossy(&out.stderr).lines().last().unwrap_or("").to_string();
            log::warn!("scrollback-encode: ffmpeg failed: {msg}");
            send_error(tx, req.job_id, msg);
        }
        Err(e) => {
            log::warn!("scrollback-encode: ffmpeg spawn failed: {e}");
            send_error(tx, req.job_id, e.to_string());
        }
    }
}

fn send_error(tx: &Sender<EncodeEvent>, job_id: Uuid, msg: String) {
    let _ = tx.send(EncodeEvent::Error { job_id, msg });
}

/// Writes system- or mic-audio chunks (whichever is non-empty for this
/// call site — see call sites above) concatenated in chronological
/// order as raw interleaved f32le PCM, the format ffmpeg's rawaudio
/// demuxer expects on the `-f f32le` input legs below.
fn write_pcm_file(path: &Path, req: &EncodeRequest) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    let chunks = if path.to_string_lossy().contains("_sys_") {
        &req.extract.system_audio
    } else {
        &req.extract.mic_audio
    };
    for chunk in chunks {
        out.write_all(&chunk.samples_bytes)?;
    }
    out.flush()
}

fn run_ffmpeg(
    req: &EncodeRequest,
    video_path: &Path,
    sys_pcm_path: &Path,
    mic_pcm_path: &Path,
) -> std::io::Result<std::process::Output> {
    let size = format!("{}x{}", req.width, req.height);
    let fps = format!("{:.3}", req.observed_fps.max(1.0));
    let sample_rate = AUDIO_SAMPLE_RATE.to_string();
    let channels = AUDIO_CHANNELS.to_string();

    std::process::Command::new("ffmpeg")
        .args([
            "-y",
            "-f", "rawvideo",
            "-pix_fmt", "bgra",
            "-s", size.as_str(),
            "-r", fps.as_str(),
            "-i", video_path.to_string_lossy().as_ref(),
            "-f", "f32le",
            "-ar", sample_rate.as_str(),
            "-ac", channels.as_str(),
            "-i", sys_pcm_path.to_string_lossy().as_ref(),
            "-f", "f32le",
            "-ar", sample_rate.as_str(),
            "-ac", channels.as_str(),
            "-i", mic_pcm_path.to_string_lossy().as_ref(),
            "-filter_complex", "amix=inputs=2:duration=shortest",
            "-c:v", "libx264",
            "-preset", "veryfast",
            "-crf", "20",
            "-c:a", "aac",
            "-shortest",
            req.output.to_string_lossy().as_ref(),
        ])
        .output()
}

fn cleanup(paths: &[&PathBuf]) {
    for p in paths {
        if let Err(e) = std::fs::remove_file(p) {
            log::warn!("scrollback-encode: failed to remove temp file {}: {e}", p.display());
        }
    }
}
