//! Frame sources: cameras and video files behind one trait.
//!
//! A [`FrameSource`] yields one image per [`read`](FrameSource::read) call and
//! knows nothing about pacing, buffering or consumers; the acquisition loop
//! owns all of that.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --open()--> Open --read()--> Reading --release()--> Closed
//!       |                                                  ^
//!       +--open() fails--> Failed --release()--------------+
//! ```
//!
//! `open` failures are fatal and abort acquisition before it starts. Read
//! and `set` failures are transient. `release` is idempotent and is always
//! called when the loop exits, including on error paths.
//!
//! ## Variants
//!
//! - [`camera::CameraSource`] wraps a [`camera::CameraDriver`] (hardware
//!   collaborator) picked by name from a [`registry::CameraRegistry`].
//! - [`file::VideoFileSource`] plays a decoded video through a
//!   [`file::VideoReader`], e.g. a memory-mapped [`raw_stack::RawStackReader`].

pub mod camera;
pub mod file;
pub mod raw_stack;
pub mod registry;
pub mod simulated;

pub use camera::{CameraDriver, CameraOptions, CameraSource};
pub use file::{FilePlayback, InMemoryVideo, VideoFileSource, VideoReader};
pub use raw_stack::{encode_raw_stack, RawStackReader};
pub use registry::CameraRegistry;
pub use simulated::SimulatedCamera;

use crate::core::{ImageData, ParameterValue};
use crate::error::SourceError;
use std::fmt;

/// Lifecycle state of a frame source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    /// Created, not yet opened
    Uninitialized,
    /// Opened, no frame read yet
    Open,
    /// At least one read attempted
    Reading,
    /// Released
    Closed,
    /// Open failed
    Failed,
}

impl SourceState {
    /// Short lowercase name used in errors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceState::Uninitialized => "uninitialized",
            SourceState::Open => "open",
            SourceState::Reading => "reading",
            SourceState::Closed => "closed",
            SourceState::Failed => "failed",
        }
    }

    /// True in the states where `read` is allowed.
    pub fn is_readable(self) -> bool {
        matches!(self, SourceState::Open | SourceState::Reading)
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one [`FrameSource::read`].
#[derive(Debug)]
pub enum ReadOutcome {
    /// A new image
    Frame(ImageData),
    /// No image this time (timeout, dropped transfer); try again
    Missed,
    /// A non-looping file reached its end
    EndOfStream,
}

/// Producer of images for the acquisition loop.
pub trait FrameSource: Send {
    /// Acquire the underlying device or file. Returns a human-readable
    /// status line reported as the `I:` start-up diagnostic.
    fn open(&mut self) -> Result<String, SourceError>;

    /// Produce the next image.
    fn read(&mut self) -> Result<ReadOutcome, SourceError>;

    /// Apply a parameter between reads.
    fn set(&mut self, name: &str, value: &ParameterValue) -> Result<(), SourceError>;

    /// Reposition playback at frame `index`. Live sources ignore it.
    fn seek(&mut self, _index: usize) -> Result<(), SourceError> {
        Ok(())
    }

    /// Release the device or file. Idempotent.
    fn release(&mut self);

    /// Rate the source naturally produces at, used when no rate is configured.
    fn nominal_framerate(&self) -> Option<f64> {
        None
    }

    /// Current lifecycle state.
    fn state(&self) -> SourceState;

    /// Short description for logs.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_states() {
        assert!(SourceState::Open.is_readable());
        assert!(SourceState::Reading.is_readable());
        assert!(!SourceState::Uninitialized.is_readable());
        assert!(!SourceState::Failed.is_readable());
        assert_eq!(SourceState::Closed.to_string(), "closed");
    }
}
