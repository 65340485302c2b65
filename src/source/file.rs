//! Video file frame source.
//!
//! Plays a fixed sequence of frames, either looping back to the configured
//! offset or ending the stream. Decoding lives behind [`VideoReader`]; this
//! module only deals with the play position.

use super::raw_stack::{RawStackReader, RAW_STACK_EXTENSION};
use super::{FrameSource, ReadOutcome, SourceState};
use crate::core::{ImageData, ParameterValue};
use crate::error::{AcquisitionError, SourceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Playback rate used when neither configuration nor file provides one.
pub const FALLBACK_FILE_FRAMERATE: f64 = 30.0;

/// Random access to decoded video frames.
pub trait VideoReader: Send {
    /// Make frames available (map or read the file).
    fn open(&mut self) -> Result<(), SourceError>;

    /// Number of frames; zero before `open`.
    fn frame_count(&self) -> usize;

    /// Rate stored in the file, if any.
    fn framerate(&self) -> Option<f64>;

    /// Decode frame `index`. Pure: the same index always yields the same image.
    fn read_frame(&self, index: usize) -> Result<ImageData, SourceError>;

    /// Where the frames come from, for logs.
    fn describe(&self) -> String;

    /// Drop any file handle or mapping.
    fn close(&mut self) {}
}

/// Frames held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryVideo {
    frames: Vec<ImageData>,
    framerate: Option<f64>,
}

impl InMemoryVideo {
    /// Video made of `frames`, optionally tagged with its native rate.
    pub fn new(frames: Vec<ImageData>, framerate: Option<f64>) -> Self {
        Self { frames, framerate }
    }
}

impl VideoReader for InMemoryVideo {
    fn open(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn framerate(&self) -> Option<f64> {
        self.framerate
    }

    fn read_frame(&self, index: usize) -> Result<ImageData, SourceError> {
        self.frames.get(index).cloned().ok_or(SourceError::FrameIndex {
            index,
            count: self.frames.len(),
        })
    }

    fn describe(&self) -> String {
        format!("in-memory video ({} frames)", self.frames.len())
    }
}

/// Playback options of a file source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePlayback {
    /// Restart at `offset` after the last frame instead of ending
    pub loop_playback: bool,
    /// First frame played, and the restart point when looping
    pub offset: usize,
}

impl Default for FilePlayback {
    fn default() -> Self {
        Self {
            loop_playback: true,
            offset: 0,
        }
    }
}

/// [`FrameSource`] playing a video through a [`VideoReader`].
pub struct VideoFileSource {
    reader: Box<dyn VideoReader>,
    playback: FilePlayback,
    index: usize,
    state: SourceState,
}

impl VideoFileSource {
    /// Play `reader` with the given options.
    pub fn new(reader: Box<dyn VideoReader>, playback: FilePlayback) -> Self {
        Self {
            reader,
            playback,
            index: playback.offset,
            state: SourceState::Uninitialized,
        }
    }

    /// Source for the video file at `path`, chosen by extension.
    ///
    /// The file itself is only opened by [`FrameSource::open`].
    pub fn open_path(path: &Path, playback: FilePlayback) -> Result<Self, AcquisitionError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case(RAW_STACK_EXTENSION) => Ok(Self::new(
                Box::new(RawStackReader::new(path)),
                playback,
            )),
            _ => Err(AcquisitionError::UnsupportedFile(path.to_path_buf())),
        }
    }

    /// Index of the next frame to be read.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Current playback options.
    pub fn playback(&self) -> FilePlayback {
        self.playback
    }
}

impl FrameSource for VideoFileSource {
    fn open(&mut self) -> Result<String, SourceError> {
        if self.state != SourceState::Uninitialized {
            return Err(SourceError::AlreadyOpened(self.state.as_str()));
        }
        let opened = self.reader.open().and_then(|()| {
            if self.reader.frame_count() == 0 {
                Err(SourceError::EmptyVideo)
            } else {
                Ok(())
            }
        });
        if let Err(err) = opened {
            self.state = SourceState::Failed;
            return Err(err);
        }

        let count = self.reader.frame_count();
        self.playback.offset = self.playback.offset.min(count - 1);
        self.index = self.playback.offset;
        self.state = SourceState::Open;
        let status = format!(
            "Video opened: {}, {} frames at {:.1} Hz, starting at frame {}",
            self.reader.describe(),
            count,
            self.nominal_framerate().unwrap_or(FALLBACK_FILE_FRAMERATE),
            self.index
        );
        info!("{}", status);
        Ok(status)
    }

    fn read(&mut self) -> Result<ReadOutcome, SourceError> {
        if !self.state.is_readable() {
            return Err(SourceError::NotOpen(self.state.as_str()));
        }
        self.state = SourceState::Reading;

        let count = self.reader.frame_count();
        if self.index >= count {
            if !self.playback.loop_playback {
                debug!("End of video after {} frames", count);
                return Ok(ReadOutcome::EndOfStream);
            }
            self.index = self.playback.offset;
        }
        let image = self.reader.read_frame(self.index)?;
        self.index += 1;
        Ok(ReadOutcome::Frame(image))
    }

    fn set(&mut self, name: &str, _value: &ParameterValue) -> Result<(), SourceError> {
        match name {
            // Pacing and buffering belong to the acquisition loop.
            "framerate" | "ring_buffer_length" => Ok(()),
            _ => Err(SourceError::UnsupportedParameter(name.to_string())),
        }
    }

    fn seek(&mut self, index: usize) -> Result<(), SourceError> {
        let count = self.reader.frame_count();
        let index = if count > 0 { index.min(count - 1) } else { index };
        debug!("Video seek to frame {}", index);
        self.playback.offset = index;
        self.index = index;
        Ok(())
    }

    fn release(&mut self) {
        if self.state != SourceState::Closed {
            self.reader.close();
            self.state = SourceState::Closed;
        }
    }

    fn nominal_framerate(&self) -> Option<f64> {
        Some(
            self.reader
                .framerate()
                .filter(|r| r.is_finite() && *r > 0.0)
                .unwrap_or(FALLBACK_FILE_FRAMERATE),
        )
    }

    fn state(&self) -> SourceState {
        self.state
    }

    fn describe(&self) -> String {
        self.reader.describe()
    }
}
