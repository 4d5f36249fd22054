// crates/scrollback-core/src/error.rs
//
// Typed error taxonomy for the rolling A/V buffer. Producer-path errors
// (DiskIoError, CodecError during eviction) are absorbed and logged by
// their owning component — only extraction and construction errors ever
// reach a caller as a `Result`.

use thiserror::Error;

/// Failures from `CodecCtx::compress` / `decompress_into`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("compressed blob is corrupted or missing its end marker")]
    CorruptedBlob,
    #[error("decompressed frame size does not match the expected frame_size")]
    SizeMismatch,
}

/// Top-level error type for `scrollback-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Constructor-time failure: non-positive dimensions, `ram_seconds >
    /// total_seconds`, an unavailable tick source, etc. Fatal to the
    /// owning service.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Memory-tier or disk-tier allocation could not be satisfied.
    /// VideoRing falls back to memory-only operation and logs once.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    /// Disk-tier write/read failure. The memory tier remains
    /// authoritative for recent content; the writer logs and drops the
    /// frame rather than propagating.
    #[error("disk I/O error: {0}")]
    DiskIoError(#[from] std::io::Error),

    /// Codec failure, surfaced only when it affects a caller-visible
    /// operation (e.g. every frame in a requested window is corrupted).
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Extraction found no frames in the requested window. Not an
    /// exceptional condition — signalled via `frame_count == 0` in
    /// `ExtractResult` as well as this variant where a `Result` is
    /// more natural.
    #[error("no frames in the requested window")]
    WindowEmpty,

    /// A second concurrent extraction was attempted while one was
    /// already in flight.
    #[error("an extraction is already in progress")]
    Busy,

    /// Extraction observed a cancellation signal before completing.
    #[error("extraction cancelled")]
    Cancelled,
}

pub type CoreResult<T> = Result<T, CoreError>;
