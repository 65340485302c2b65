//! Core data types for frame acquisition.
//!
//! This module defines the value types that flow through the acquisition
//! pipeline:
//!
//! - [`PixelBuffer`]: sample storage in the sensor's native bit depth
//! - [`ImageData`]: a 2-D (height × width) or 3-D (height × width × channels) sample grid
//! - [`Frame`]: an immutable, cheaply clonable image plus its production sequence index
//! - [`Roi`]: camera region of interest
//! - [`ParameterValue`]: dynamically typed value carried by control messages
//!
//! # Sharing
//!
//! A [`Frame`] wraps its image in an `Arc`, so the same frame can sit in the
//! ring buffer and on the output queue without copying pixels. No API hands
//! out mutable access to a frame's samples once it has been produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::FrameError;

// =============================================================================
// Pixel storage
// =============================================================================

/// Memory-efficient pixel buffer supporting multiple bit depths.
///
/// `PixelBuffer` stores image data in its native format to avoid unnecessary
/// type conversions. Camera sensors typically output 8-bit or 16-bit unsigned
/// integers; `F64` is kept for computed or decoded images.
///
/// # Variants
///
/// * `U8` - 8-bit unsigned integer pixels (0-255)
/// * `U16` - 16-bit unsigned integer pixels (0-65535)
/// * `F64` - 64-bit floating point pixels
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PixelBuffer {
    /// 8-bit unsigned integer pixels (1 byte/pixel)
    U8(Vec<u8>),
    /// 16-bit unsigned integer pixels (2 bytes/pixel)
    U16(Vec<u16>),
    /// 64-bit floating point pixels (8 bytes/pixel)
    F64(Vec<f64>),
}

impl PixelBuffer {
    /// Returns the number of samples in the buffer.
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::U8(data) => data.len(),
            PixelBuffer::U16(data) => data.len(),
            PixelBuffer::F64(data) => data.len(),
        }
    }

    /// Returns true if the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the memory size in bytes.
    pub fn memory_bytes(&self) -> usize {
        match self {
            PixelBuffer::U8(data) => data.len(),
            PixelBuffer::U16(data) => data.len() * 2,
            PixelBuffer::F64(data) => data.len() * 8,
        }
    }

    /// Bytes used by one sample of this buffer's type.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PixelBuffer::U8(_) => 1,
            PixelBuffer::U16(_) => 2,
            PixelBuffer::F64(_) => 8,
        }
    }

    /// Sample at `index` widened to f64, if in bounds.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            PixelBuffer::U8(data) => data.get(index).map(|&v| v as f64),
            PixelBuffer::U16(data) => data.get(index).map(|&v| v as f64),
            PixelBuffer::F64(data) => data.get(index).copied(),
        }
    }

    fn remap(&self, map: impl Fn(usize) -> usize, len: usize) -> PixelBuffer {
        match self {
            PixelBuffer::U8(data) => PixelBuffer::U8((0..len).map(|i| data[map(i)]).collect()),
            PixelBuffer::U16(data) => PixelBuffer::U16((0..len).map(|i| data[map(i)]).collect()),
            PixelBuffer::F64(data) => PixelBuffer::F64((0..len).map(|i| data[map(i)]).collect()),
        }
    }
}

// =============================================================================
// Image data
// =============================================================================

/// A row-major sample grid of `height × width × channels` samples.
///
/// Single-channel images are the 2-D case; colour or multi-plane images keep
/// their channels interleaved per pixel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    width: usize,
    height: usize,
    channels: usize,
    pixels: PixelBuffer,
}

impl ImageData {
    /// Builds a single-channel image, checking that the buffer matches the shape.
    pub fn new(width: usize, height: usize, pixels: PixelBuffer) -> Result<Self, FrameError> {
        Self::with_channels(width, height, 1, pixels)
    }

    /// Builds a multi-channel image, checking that the buffer matches the shape.
    pub fn with_channels(
        width: usize,
        height: usize,
        channels: usize,
        pixels: PixelBuffer,
    ) -> Result<Self, FrameError> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels));
        if channels == 0 || expected != Some(pixels.len()) {
            return Err(FrameError::ShapeMismatch {
                width,
                height,
                channels,
                samples: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Samples per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Read-only access to the samples.
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Sample at row `y`, column `x`, channel `c`.
    pub fn sample(&self, y: usize, x: usize, c: usize) -> Option<f64> {
        if y >= self.height || x >= self.width || c >= self.channels {
            return None;
        }
        self.pixels
            .get_f64((y * self.width + x) * self.channels + c)
    }

    /// Rotates the image counter-clockwise by `quarter_turns` × 90°.
    ///
    /// Rotation happens in the plane of the first two axes; channels stay
    /// interleaved. Odd turn counts swap width and height.
    pub fn rotated(&self, quarter_turns: u8) -> ImageData {
        let turns = quarter_turns % 4;
        if turns == 0 {
            return self.clone();
        }
        let (h, w, c) = (self.height, self.width, self.channels);
        let (out_h, out_w) = if turns % 2 == 1 { (w, h) } else { (h, w) };

        // Maps an output (row, col) to the source (row, col).
        let source_of = move |i: usize, j: usize| -> (usize, usize) {
            match turns {
                1 => (j, w - 1 - i),
                2 => (h - 1 - i, w - 1 - j),
                _ => (h - 1 - j, i),
            }
        };

        let pixels = self.pixels.remap(
            |idx| {
                let ch = idx % c;
                let px = idx / c;
                let (si, sj) = source_of(px / out_w, px % out_w);
                (si * w + sj) * c + ch
            },
            self.pixels.len(),
        );

        ImageData {
            width: out_w,
            height: out_h,
            channels: c,
            pixels,
        }
    }
}

// =============================================================================
// Frame
// =============================================================================

/// One acquired image with its production sequence index.
///
/// Cloning a `Frame` is an `Arc` bump; the samples are shared and immutable.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Monotonic index assigned when the frame was produced.
    pub sequence_index: u64,
    /// Wall-clock time at production.
    pub captured_at: DateTime<Utc>,
    /// Shared, read-only image.
    pub data: Arc<ImageData>,
}

impl Frame {
    /// Wraps `image` as frame number `sequence_index`, stamped with the current time.
    pub fn new(sequence_index: u64, image: ImageData) -> Self {
        Self {
            sequence_index,
            captured_at: Utc::now(),
            data: Arc::new(image),
        }
    }

    /// True if both frames share the same underlying image allocation.
    pub fn shares_data_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

// =============================================================================
// Region of interest
// =============================================================================

/// Region of Interest for camera acquisition
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roi {
    /// Left edge in sensor pixels
    pub x: u32,
    /// Top edge in sensor pixels
    pub y: u32,
    /// Width in sensor pixels
    pub width: u32,
    /// Height in sensor pixels
    pub height: u32,
}

impl Roi {
    /// Parses `[x, y, width, height]`.
    ///
    /// Any negative entry (the `(-1, -1, -1, -1)` convention) means "full sensor"
    /// and yields `Ok(None)`.
    pub fn from_values(values: &[i64]) -> Option<Option<Roi>> {
        if values.len() != 4 {
            return None;
        }
        if values.iter().any(|&v| v < 0) {
            return Some(None);
        }
        let clamp = |v: i64| u32::try_from(v).ok();
        Some(Some(Roi {
            x: clamp(values[0])?,
            y: clamp(values[1])?,
            width: clamp(values[2])?,
            height: clamp(values[3])?,
        }))
    }

    /// True if this region lies within a `width × height` sensor and is non-empty.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.saturating_add(self.width) <= width
            && self.y.saturating_add(self.height) <= height
    }
}

// =============================================================================
// Parameter values
// =============================================================================

/// Dynamically typed value of a control parameter.
///
/// Deserializes untagged, so JSON control messages such as
/// `{"name": "roi", "value": [0, 0, 320, 240]}` map directly onto variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Free text
    String(String),
    /// Integer list (e.g. ROI)
    IntArray(Vec<i64>),
    /// Float list
    FloatArray(Vec<f64>),
    /// Explicit null
    Null,
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{}", b),
            ParameterValue::Int(i) => write!(f, "{}", i),
            ParameterValue::Float(fl) => write!(f, "{}", fl),
            ParameterValue::String(s) => write!(f, "{}", s),
            ParameterValue::IntArray(arr) => write!(f, "{:?}", arr),
            ParameterValue::FloatArray(arr) => write!(f, "{:?}", arr),
            ParameterValue::Null => write!(f, "null"),
        }
    }
}

impl ParameterValue {
    /// Extract value as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(f) => Some(*f),
            ParameterValue::Int(i) => Some(*i as f64),
            ParameterValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Extract value as i64. Floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(i) => Some(*i),
            ParameterValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            ParameterValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Extract value as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            ParameterValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Extract value as an integer list
    pub fn as_int_array(&self) -> Option<Vec<i64>> {
        match self {
            ParameterValue::IntArray(arr) => Some(arr.clone()),
            ParameterValue::FloatArray(arr) => {
                arr.iter().map(|f| (f.fract() == 0.0).then_some(*f as i64)).collect()
            }
            _ => None,
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Int(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Int(value as i64)
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        ParameterValue::Int(value as i64)
    }
}

impl From<usize> for ParameterValue {
    fn from(value: usize) -> Self {
        ParameterValue::Int(value as i64)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<Vec<i64>> for ParameterValue {
    fn from(value: Vec<i64>) -> Self {
        ParameterValue::IntArray(value)
    }
}
