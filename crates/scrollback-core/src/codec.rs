// crates/scrollback-core/src/codec.rs
//
// Per-frame BGRA <-> bounded-size blob codec. Each raw frame is
// compressed independently (no inter-frame prediction) so any stored
// frame can be decoded on its own during extraction, in any order the
// ring happens to read slots back in.
//
// Blob format: baseline JPEG via the `image` crate, restricted to the
// `jpeg` feature only. JPEG's own end-of-image marker (0xFFD9) is the
// "self-delimiting end marker" the disk tier scans for — no length
// prefix is stored alongside the blob (see video_ring::disk_tier).
//
// JPEG carries no alpha channel, so compress drops the BGRA frame's
// alpha byte and decompress re-synthesizes it as opaque (0xFF). Screen
// capture frames are always opaque in practice; this is lossless for
// the channel that matters.

use crate::error::CodecError;
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{ExtendedColorType, ImageDecoder, ImageEncoder};
use std::io::Cursor;

/// JPEG's end-of-image marker. Used to recover a variable-length blob
/// from a fixed-stride disk slot without a length field.
pub const END_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Stateless, cheaply-cloneable per-frame BGRA codec.
#[derive(Clone, Copy, Debug)]
pub struct CodecCtx {
    width: u32,
    height: u32,
    quality: u8,
}

impl CodecCtx {
    /// `quality` is opaque to the core: 0..=100, forwarded to the JPEG
    /// encoder as-is.
    pub fn new(width: u32, height: u32, quality: u8) -> Result<Self, crate::error::CoreError> {
        if width == 0 || height == 0 {
            return Err(crate::error::CoreError::ConfigInvalid(
                "CodecCtx width/height must be positive".into(),
            ));
        }
        Ok(Self {
            width,
            height,
            quality: quality.min(100),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Hard upper bound on a compressed blob's length: `1.5 * w * h`.
    pub fn max_compressed_size(&self) -> usize {
        self.width as usize * self.height as usize * 3 / 2
    }

    /// Compresses `raw` (exactly `frame_size` BGRA bytes) into `dst`,
    /// which is cleared first. Fails with `SizeMismatch` if `raw` isn't
    /// `frame_size` bytes, or if the encoder somehow produced a blob
    /// larger than `max_compressed_size` (invariant I1).
    pub fn compress(&self, raw: &[u8], dst: &mut Vec<u8>) -> Result<(), CodecError> {
        dst.clear();
        if raw.len() != self.frame_size() {
            return Err(CodecError::SizeMismatch);
        }

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in raw.chunks_exact(4) {
            // BGRA -> RGB, dropping alpha.
            rgb.push(px[2]);
            rgb.push(px[1]);
            rgb.push(px[0]);
        }

        let encoder = JpegEncoder::new_with_quality(&mut *dst, self.quality);
        encoder
            .write_image(&rgb, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|_| CodecError::CorruptedBlob)?;

        if dst.len() > self.max_compressed_size() {
            return Err(CodecError::SizeMismatch);
        }
        Ok(())
    }

    /// Decompresses `src` into `dst`, which must be exactly `frame_size`
    /// bytes long. Fails with `CorruptedBlob` if the JPEG stream is
    /// malformed, or `SizeMismatch` if its dimensions don't match this
    /// codec's configured width/height (and therefore `dst`'s length).
    pub fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<(), CodecError> {
        if dst.len() != self.frame_size() {
            return Err(CodecError::SizeMismatch);
        }

        let decoder = JpegDecoder::new(Cursor::new(src)).map_err(|_| CodecError::CorruptedBlob)?;
        let (w, h) = decoder.dimensions();
        if w != self.width || h != self.height {
            return Err(CodecError::SizeMismatch);
        }

        let mut rgb = vec![0u8; decoder.total_bytes() as usize];
        decoder
            .read_image(&mut rgb)
            .map_err(|_| CodecError::CorruptedBlob)?;

        for (px, rgb_px) in dst.chunks_exact_mut(4).zip(rgb.chunks_exact(3)) {
            px[0] = rgb_px[2]; // B
            px[1] = rgb_px[1]; // G
            px[2] = rgb_px[0]; // R
            px[3] = 0xFF; // A
        }
        Ok(())
    }

    /// Scans `blob` (as laid out in a disk slot, possibly followed by
    /// indeterminate padding) for the JPEG end marker, returning the
    /// length of the blob including the marker itself. Scans at most
    /// `max_compressed_size` bytes, per spec.
    pub fn scan_blob_len(&self, blob: &[u8]) -> Option<usize> {
        let limit = blob.len().min(self.max_compressed_size());
        blob[..limit]
            .windows(END_MARKER.len())
            .position(|w| w == END_MARKER)
            .map(|pos| pos + END_MARKER.len())
    }
}
