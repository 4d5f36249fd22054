// crates/scrollback-cli/src/main.rs
//
// Demo binary: synthetic video/system-audio/microphone-audio producers
// feed a SyncedAVBuffer continuously; typing `save <seconds>` at stdin
// stands in for a real hotkey and triggers extract_last_seconds +
// EncodeDriver, writing an mp4 into the configured output directory.
// Hotkey binding itself is out of scope — stdin is just some trigger.

mod config;
mod producers;

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::unbounded;
use uuid::Uuid;

use scrollback_core::{
    AudioRingConfig, Clock, SyncedAVBuffer, SyncedAVBufferConfig, VideoRingConfig,
};
use scrollback_encode::{drive, EncodeEvent, EncodeRequest};

use config::RecorderConfig;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("./scrollback.json"));
    let cfg = RecorderConfig::load(&config_path)?;

    std::fs::create_dir_all(&cfg.temp_dir)?;
    std::fs::create_dir_all(&cfg.output_dir)?;

    let clock = Clock::with_default_rate()?;
    let buf = Arc::new(SyncedAVBuffer::new(SyncedAVBufferConfig {
        video: VideoRingConfig {
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps,
            ram_seconds: cfg.ram_seconds,
            total_seconds: cfg.total_seconds,
            codec_quality: cfg.codec_quality,
            temp_path: cfg.temp_dir.join("video_ring_disk.bin"),
        },
        system_audio: AudioRingConfig {
            sample_rate: 48_000,
            channels: 2,
            duration_seconds: cfg.total_seconds,
        },
        mic_audio: AudioRingConfig {
            sample_rate: 48_000,
            channels: 2,
            duration_seconds: cfg.total_seconds,
        },
        clock,
    })?);

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::new();
    handles.push(producers::spawn_video_producer(
        Arc::clone(&buf),
        cfg.width,
        cfg.height,
        cfg.fps,
        Arc::clone(&shutdown),
    ));
    handles.push(producers::spawn_audio_producer(
        Arc::clone(&buf),
        "system",
        true,
        Arc::clone(&shutdown),
    ));
    handles.push(producers::spawn_audio_producer(
        Arc::clone(&buf),
        "microphone",
        false,
        Arc::clone(&shutdown),
    ));

    log::info!(
        "scrollback recording: {}x{} @ {}fps, {}s ram / {}s total window",
        cfg.width, cfg.height, cfg.fps, cfg.ram_seconds, cfg.total_seconds
    );
    println!("type `save <seconds>` to extract a clip, or `quit` to exit");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line == "quit" {
            break;
        }
        if let Some(secs_str) = line.strip_prefix("save ") {
            let Ok(secs) = secs_str.trim().parse::<f64>() else {
                eprintln!("usage: save <seconds>");
                continue;
            };
            handle_save(&buf, secs, &cfg);
        } else if !line.is_empty() {
            eprintln!("unrecognized command: {line}");
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    for h in handles {
        let _ = h.join();
    }
    Ok(())
}

fn handle_save(buf: &Arc<SyncedAVBuffer>, secs: f64, cfg: &RecorderConfig) {
    let cancel = Arc::new(AtomicBool::new(false));
    let extract = match buf.extract_last_seconds(secs, &cfg.temp_dir, &cancel) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("extract failed: {e}");
            return;
        }
    };
    if extract.frame_count == 0 {
        eprintln!("nothing buffered yet");
        return;
    }

    let job_id = Uuid::new_v4();
    let observed_fps = if extract.window_end_ts > extract.window_start_ts {
        let window_secs = buf
            .clock()
            .ticks_to_seconds(extract.window_end_ts - extract.window_start_ts);
        extract.frame_count as f64 / window_secs.max(1e-6)
    } else {
        cfg.fps as f64
    };
    let output = cfg.output_dir.join(format!("clip_{job_id}.mp4"));

    let req = EncodeRequest {
        job_id,
        extract,
        width: cfg.width,
        height: cfg.height,
        observed_fps,
        output,
    };

    let (tx, rx) = unbounded();
    std::thread::spawn(move || drive(req, &tx));

    for event in rx {
        match event {
            EncodeEvent::Progress { frame, total_frames, .. } => {
                println!("encoding: {frame}/{total_frames}");
            }
            EncodeEvent::Done { path, .. } => {
                println!("saved clip: {}", path.display());
            }
            EncodeEvent::Error { msg, .. } => {
                eprintln!("encode failed: {msg}");
            }
        }
    }
}
