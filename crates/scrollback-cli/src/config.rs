// crates/scrollback-cli/src/config.rs
//
// Flat, serializable recorder configuration — the same serde/serde_json
// pairing the core project state uses, scaled down to the handful of
// knobs a headless recorder binary actually needs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_ram_seconds")]
    pub ram_seconds: f64,
    #[serde(default = "default_total_seconds")]
    pub total_seconds: f64,
    #[serde(default = "default_codec_quality")]
    pub codec_quality: u8,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_fps() -> u32 { 30 }
fn default_ram_seconds() -> f64 { 10.0 }
fn default_total_seconds() -> f64 { 120.0 }
fn default_codec_quality() -> u8 { 85 }
fn default_temp_dir() -> PathBuf { std::env::temp_dir().join("scrollback") }
fn default_output_dir() -> PathBuf { PathBuf::from(".") }

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            ram_seconds: default_ram_seconds(),
            total_seconds: default_total_seconds(),
            codec_quality: default_codec_quality(),
            temp_dir: default_temp_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl RecorderConfig {
    /// Loads from `path` if it exists; falls back to `Default` when the
    /// file is simply absent. A file that exists but fails to parse is
    /// a fatal startup error, not silently ignored.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("malformed config at {}: {e}", path.display()))?;
        Ok(cfg)
    }
}
