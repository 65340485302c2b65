//! Memory-mapped raw frame stack files (`.rawstack`).
//!
//! A raw stack is the simplest container that can hold an acquisition run:
//! a fixed header followed by tightly packed, row-major frames of identical
//! shape and sample type. Reading maps the file once and decodes individual
//! frames on demand, so random access is O(1) and nothing but the requested
//! frame is copied.
//!
//! # Layout (little-endian)
//!
//! ```text
//! offset  size  field
//!      0     8  magic            0xDA_DA_F1_1E_00_00_00_01
//!      8     4  version          1
//!     12     4  width
//!     16     4  height
//!     20     4  channels
//!     24     4  sample format    1 = u8, 2 = u16, 3 = f64
//!     28     4  reserved
//!     32     8  frame count
//!     40     8  framerate (f64, 0 = unknown)
//!     48    16  padding
//!     64        frame data
//! ```

use super::file::VideoReader;
use crate::core::{ImageData, PixelBuffer};
use crate::error::{FileFormatError, SourceError};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File extension recognised by `VideoFileSource::open_path`.
pub const RAW_STACK_EXTENSION: &str = "rawstack";

/// Magic number at the start of every raw stack
const MAGIC: u64 = 0xDA_DA_F1_1E_00_00_00_01;

/// Current format version
const VERSION: u32 = 1;

/// Size of the header in bytes
const HEADER_SIZE: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SampleFormat {
    U8 = 1,
    U16 = 2,
    F64 = 3,
}

impl SampleFormat {
    fn from_code(code: u32) -> Result<Self, FileFormatError> {
        match code {
            1 => Ok(SampleFormat::U8),
            2 => Ok(SampleFormat::U16),
            3 => Ok(SampleFormat::F64),
            other => Err(FileFormatError::UnknownSampleFormat(other)),
        }
    }

    fn of(pixels: &PixelBuffer) -> Self {
        match pixels {
            PixelBuffer::U8(_) => SampleFormat::U8,
            PixelBuffer::U16(_) => SampleFormat::U16,
            PixelBuffer::F64(_) => SampleFormat::F64,
        }
    }

    fn bytes(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::U16 => 2,
            SampleFormat::F64 => 8,
        }
    }
}

/// Decoded raw stack header.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Header {
    width: usize,
    height: usize,
    channels: usize,
    format: SampleFormat,
    frame_count: usize,
    framerate: f64,
}

impl Header {
    /// Bytes per frame, `None` if the declared shape overflows `usize`.
    fn frame_bytes(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.channels)?
            .checked_mul(self.format.bytes())
    }

    fn overflow(&self) -> FileFormatError {
        FileFormatError::SizeOverflow {
            width: self.width,
            height: self.height,
            channels: self.channels,
            frame_count: self.frame_count,
        }
    }

    fn parse(bytes: &[u8]) -> Result<Self, FileFormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FileFormatError::TruncatedHeader(bytes.len()));
        }
        let u32_at = |at: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[at..at + 4]);
            u32::from_le_bytes(raw)
        };
        let u64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        let magic = u64_at(0);
        if magic != MAGIC {
            return Err(FileFormatError::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }
        let version = u32_at(8);
        if version != VERSION {
            return Err(FileFormatError::UnsupportedVersion(version));
        }

        let header = Header {
            width: u32_at(12) as usize,
            height: u32_at(16) as usize,
            channels: u32_at(20) as usize,
            format: SampleFormat::from_code(u32_at(24))?,
            frame_count: u64_at(32) as usize,
            framerate: f64::from_bits(u64_at(40)),
        };

        let expected = header
            .frame_bytes()
            .and_then(|size| size.checked_mul(header.frame_count))
            .ok_or_else(|| header.overflow())?;
        let actual = bytes.len() - HEADER_SIZE;
        if actual < expected {
            return Err(FileFormatError::TruncatedData {
                expected: expected as u64,
                actual: actual as u64,
            });
        }
        Ok(header)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.width as u32).to_le_bytes());
        out.extend_from_slice(&(self.height as u32).to_le_bytes());
        out.extend_from_slice(&(self.channels as u32).to_le_bytes());
        out.extend_from_slice(&(self.format as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(self.frame_count as u64).to_le_bytes());
        out.extend_from_slice(&self.framerate.to_bits().to_le_bytes());
        out.resize(HEADER_SIZE, 0);
    }
}

/// Build a raw stack from `frames`.
///
/// All frames must share shape and sample type. A `framerate` of `None` is
/// stored as 0 (unknown).
pub fn encode_raw_stack(frames: &[ImageData], framerate: Option<f64>) -> Result<Vec<u8>, FileFormatError> {
    let first = frames.first();
    let header = Header {
        width: first.map_or(0, ImageData::width),
        height: first.map_or(0, ImageData::height),
        channels: first.map_or(1, ImageData::channels),
        format: first.map_or(SampleFormat::U8, |f| SampleFormat::of(f.pixels())),
        frame_count: frames.len(),
        framerate: framerate.unwrap_or(0.0),
    };

    let data_bytes = header
        .frame_bytes()
        .and_then(|size| size.checked_mul(frames.len()))
        .ok_or_else(|| header.overflow())?;
    let mut out = Vec::with_capacity(HEADER_SIZE.saturating_add(data_bytes));
    header.write(&mut out);
    for frame in frames {
        if frame.width() != header.width
            || frame.height() != header.height
            || frame.channels() != header.channels
            || SampleFormat::of(frame.pixels()) != header.format
        {
            return Err(FileFormatError::InconsistentFrames);
        }
        match frame.pixels() {
            PixelBuffer::U8(data) => out.extend_from_slice(data),
            PixelBuffer::U16(data) => data.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            PixelBuffer::F64(data) => data.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        }
    }
    Ok(out)
}

/// [`VideoReader`] over a memory-mapped raw stack file.
#[derive(Debug)]
pub struct RawStackReader {
    path: PathBuf,
    mmap: Option<Mmap>,
    header: Option<Header>,
}

impl RawStackReader {
    /// Reader for `path`; the file is mapped by [`VideoReader::open`].
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            mmap: None,
            header: None,
        }
    }
}

impl VideoReader for RawStackReader {
    fn open(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path)?;
        // SAFETY: the mapping is read-only and lives as long as `self`. Frames
        // are copied out before being handed to callers, so a concurrent
        // truncation can at worst fault this process, never alias its memory.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        let header = Header::parse(&mmap)?;
        self.header = Some(header);
        self.mmap = Some(mmap);
        Ok(())
    }

    fn frame_count(&self) -> usize {
        self.header.map_or(0, |h| h.frame_count)
    }

    fn framerate(&self) -> Option<f64> {
        self.header
            .map(|h| h.framerate)
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    fn read_frame(&self, index: usize) -> Result<ImageData, SourceError> {
        let (Some(mmap), Some(header)) = (&self.mmap, self.header) else {
            return Err(SourceError::NotOpen("uninitialized"));
        };
        if index >= header.frame_count {
            return Err(SourceError::FrameIndex {
                index,
                count: header.frame_count,
            });
        }
        let range = header.frame_bytes().and_then(|size| {
            let start = index.checked_mul(size)?.checked_add(HEADER_SIZE)?;
            Some(start..start.checked_add(size)?)
        });
        let Some(raw) = range.and_then(|r| mmap.get(r)) else {
            return Err(SourceError::Format(header.overflow()));
        };
        let pixels = match header.format {
            SampleFormat::U8 => PixelBuffer::U8(raw.to_vec()),
            SampleFormat::U16 => PixelBuffer::U16(
                raw.chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            SampleFormat::F64 => PixelBuffer::F64(
                raw.chunks_exact(8)
                    .map(|c| {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(c);
                        f64::from_le_bytes(b)
                    })
                    .collect(),
            ),
        };
        ImageData::with_channels(header.width, header.height, header.channels, pixels)
            .map_err(|_| SourceError::Format(FileFormatError::InconsistentFrames))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn close(&mut self) {
        self.mmap = None;
    }
}
