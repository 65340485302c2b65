//! Custom error types for the acquisition pipeline.
//!
//! Using the `thiserror` crate, this module gives each layer of the pipeline
//! its own error enum and folds the fatal ones into [`AcquisitionError`].
//!
//! ## Error Hierarchy
//!
//! - **`AcquisitionError`**: the only error that escapes the acquisition loop.
//!   It is raised while *starting* acquisition (unknown source type, hardware
//!   unavailable, unreadable file, invalid configuration, thread spawn failure).
//!   Once the loop runs, every recoverable condition is absorbed inside it.
//! - **`SourceError`**: failures reported by a frame source. Open failures are
//!   fatal; read and `set` failures are logged as warnings by the loop.
//! - **`RingBufferError`**: `EmptyHistory`, a transient no-op during replay.
//! - **`ControlError`**: a control value was rejected (wrong type, out of range).
//! - **`QueueError`**: the output queue refused a frame (full or disconnected).
//! - **`FileFormatError`**: a raw frame stack file is malformed.
//! - **`FrameError`**: a pixel buffer does not match its declared shape.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while starting acquisition.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("{0} is not a valid camera type")]
    UnknownSource(String),

    #[error("Failed to open frame source: {0}")]
    SourceOpen(#[source] SourceError),

    #[error("Unsupported video file: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Failed to spawn acquisition thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Acquisition worker exited before reporting its start-up status")]
    WorkerLost,

    #[error("Acquisition worker panicked")]
    WorkerPanicked,
}

/// Errors reported by a frame source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Source is not open (state: {0})")]
    NotOpen(&'static str),

    #[error("Source already opened (state: {0})")]
    AlreadyOpened(&'static str),

    #[error("Parameter '{name}' rejected: {reason}")]
    Rejected { name: String, reason: String },

    #[error("Parameter '{0}' is not supported by this source")]
    UnsupportedParameter(String),

    #[error("Frame index {index} out of range (0..{count})")]
    FrameIndex { index: usize, count: usize },

    #[error("Video contains no frames")]
    EmptyVideo,

    #[error("Video file error: {0}")]
    Format(#[from] FileFormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from ring buffer lookups.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    #[error("No frame has been written to the ring buffer")]
    EmptyHistory,
}

/// Rejected control parameter values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Parameter '{name}' expects {expected}, got {value}")]
    WrongType {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("Parameter '{name}' value {value} outside limits [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Control channel disconnected")]
    Disconnected,
}

/// Output queue refusals.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Output queue is full")]
    Full,

    #[error("Output queue has no consumers")]
    Disconnected,
}

/// Malformed raw frame stack files.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileFormatError {
    #[error("File too short for header ({0} bytes)")]
    TruncatedHeader(usize),

    #[error("Invalid frame stack magic number: expected 0x{expected:016X}, got 0x{found:016X}")]
    BadMagic { expected: u64, found: u64 },

    #[error("Unsupported frame stack version {0}")]
    UnsupportedVersion(u32),

    #[error("Unknown sample format code {0}")]
    UnknownSampleFormat(u32),

    #[error("Frame stack declares {expected} data bytes but file holds {actual}")]
    TruncatedData { expected: u64, actual: u64 },

    #[error("Frame stack dimensions overflow: {width}x{height}x{channels}, {frame_count} frames")]
    SizeOverflow {
        width: usize,
        height: usize,
        channels: usize,
        frame_count: usize,
    },

    #[error("Frames in a stack must share shape and sample format")]
    InconsistentFrames,
}

/// Pixel buffer does not match the declared image shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Pixel buffer holds {samples} samples, expected {width}x{height}x{channels}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        channels: usize,
        samples: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AcquisitionError::UnknownSource("ximea2".to_string());
        assert_eq!(err.to_string(), "ximea2 is not a valid camera type");
    }

    #[test]
    fn test_source_open_wraps_cause() {
        let err = AcquisitionError::SourceOpen(SourceError::Hardware("no camera".into()));
        assert!(err.to_string().contains("Failed to open frame source"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Hardware error: no camera"));
    }

    #[test]
    fn test_format_error_converts_into_source_error() {
        let err: SourceError = FileFormatError::UnsupportedVersion(9).into();
        assert!(err.to_string().contains("version 9"));
    }
}
