//! Fixed-capacity rolling history of recent frames.
//!
//! The acquisition loop writes every live frame here and reads it back for
//! pause and replay. The buffer is private to the loop, so it needs no
//! internal synchronization.
//!
//! # Architecture
//!
//! `capacity` slots are allocated up front. Writers store at the `write` slot
//! and advance it circularly, evicting the oldest frame once the buffer is
//! full. A separate logical read cursor serves replay: it visits the retained
//! frames oldest to newest and wraps back to the oldest after the newest one
//! has been delivered. The cursor never lands on a slot that has not been
//! written, so `get` only fails when the history is empty.
//!
//! Frames are stored as [`Frame`] values, which share their pixels through an
//! `Arc`; handing a frame out never copies image data and never lets the
//! caller mutate what the buffer holds.

use crate::core::Frame;
use crate::error::RingBufferError;

/// Circular store of the most recent `capacity` frames.
pub struct RingBuffer {
    /// Frame slots; `None` until first written
    slots: Vec<Option<Frame>>,

    /// Next slot to be written
    write: usize,

    /// Number of filled slots (saturates at capacity)
    len: usize,

    /// Slot the next `get` will return
    read: usize,

    /// Set once `get` has delivered the newest frame and wrapped
    exhausted: bool,

    /// Total frames ever written (monotonic)
    total_written: u64,
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("write", &self.write)
            .field("read", &self.read)
            .field("exhausted", &self.exhausted)
            .field("total_written", &self.total_written)
            .finish()
    }
}

impl RingBuffer {
    /// Create a ring buffer with `capacity` frame slots.
    ///
    /// A capacity of zero is raised to one; configuration validation rejects
    /// it before it gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            write: 0,
            len: 0,
            read: 0,
            exhausted: false,
            total_written: 0,
        }
    }

    /// Number of frame slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of frames currently retained.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written since creation or the last resize.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total frames written since creation or the last resize.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Store `frame` at the write cursor, evicting the oldest frame when full.
    pub fn put(&mut self, frame: Frame) {
        self.slots[self.write] = Some(frame);
        self.write = (self.write + 1) % self.capacity();
        self.len = (self.len + 1).min(self.capacity());
        self.total_written += 1;
    }

    /// The most recently written frame.
    pub fn most_recent(&self) -> Result<Frame, RingBufferError> {
        if self.len == 0 {
            return Err(RingBufferError::EmptyHistory);
        }
        self.slots[self.newest_slot()]
            .clone()
            .ok_or(RingBufferError::EmptyHistory)
    }

    /// Frame at the logical read cursor; advances the cursor.
    ///
    /// After the newest retained frame is returned the cursor wraps to the
    /// oldest one and [`history_exhausted`](Self::history_exhausted) turns true.
    pub fn get(&mut self) -> Result<Frame, RingBufferError> {
        if self.len == 0 {
            return Err(RingBufferError::EmptyHistory);
        }
        let frame = self.slots[self.read]
            .clone()
            .ok_or(RingBufferError::EmptyHistory)?;

        if self.read == self.newest_slot() {
            self.read = self.oldest_slot();
            self.exhausted = true;
        } else {
            self.read = (self.read + 1) % self.capacity();
        }
        Ok(frame)
    }

    /// Place the read cursor `offset` frames after the oldest retained frame.
    ///
    /// Offsets past the newest frame are clamped to it. Clears the
    /// exhausted flag.
    pub fn seek(&mut self, offset: usize) {
        let offset = offset.min(self.len.saturating_sub(1));
        self.read = (self.oldest_slot() + offset) % self.capacity();
        self.exhausted = false;
    }

    /// Position of the read cursor relative to the oldest retained frame.
    pub fn cursor(&self) -> usize {
        (self.read + self.capacity() - self.oldest_slot()) % self.capacity()
    }

    /// True once replay has delivered the newest frame since the last seek.
    pub fn history_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Discard all history and reallocate with `capacity` slots.
    pub fn resize(&mut self, capacity: usize) {
        *self = Self::new(capacity);
    }

    /// Retained frames, oldest first. Does not move the read cursor.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> + '_ {
        let start = self.oldest_slot();
        (0..self.len).filter_map(move |i| self.slots[(start + i) % self.capacity()].as_ref())
    }

    fn oldest_slot(&self) -> usize {
        if self.len < self.capacity() {
            0
        } else {
            self.write
        }
    }

    fn newest_slot(&self) -> usize {
        (self.write + self.capacity() - 1) % self.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ImageData, PixelBuffer};

    fn frame(seq: u64) -> Frame {
        let image = ImageData::new(2, 1, PixelBuffer::U16(vec![seq as u16, 0])).unwrap();
        Frame::new(seq, image)
    }

    fn seqs(rb: &RingBuffer) -> Vec<u64> {
        rb.iter().map(|f| f.sequence_index).collect()
    }

    #[test]
    fn test_empty_history() {
        let mut rb = RingBuffer::new(4);
        assert_eq!(rb.most_recent().unwrap_err(), RingBufferError::EmptyHistory);
        assert_eq!(rb.get().unwrap_err(), RingBufferError::EmptyHistory);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_most_recent_tracks_last_put() {
        let mut rb = RingBuffer::new(3);
        for i in 0..5 {
            rb.put(frame(i));
            assert_eq!(rb.most_recent().unwrap().sequence_index, i);
        }
    }

    #[test]
    fn test_capacity_invariant() {
        for capacity in 1..6 {
            let mut rb = RingBuffer::new(capacity);
            for i in 0..20u64 {
                rb.put(frame(i));
                assert!(rb.len() <= capacity);
            }
            // Only the `capacity` most recent puts are ever returned.
            let oldest_allowed = 20 - capacity as u64;
            for _ in 0..(3 * capacity) {
                let f = rb.get().unwrap();
                assert!(f.sequence_index >= oldest_allowed);
            }
            assert_eq!(seqs(&rb), (oldest_allowed..20).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_get_visits_oldest_to_newest_then_wraps() {
        let mut rb = RingBuffer::new(4);
        for i in 0..6 {
            rb.put(frame(i));
        }
        let visited: Vec<u64> = (0..6).map(|_| rb.get().unwrap().sequence_index).collect();
        // Cursor started at slot 0 which now holds frame 4.
        assert_eq!(visited, vec![4, 5, 2, 3, 4, 5]);

        rb.seek(0);
        let visited: Vec<u64> = (0..4).map(|_| rb.get().unwrap().sequence_index).collect();
        assert_eq!(visited, vec![2, 3, 4, 5]);
        assert!(rb.history_exhausted());
    }

    #[test]
    fn test_partial_buffer_wraps_at_written_frames() {
        let mut rb = RingBuffer::new(600);
        for i in 0..3 {
            rb.put(frame(i));
        }
        let visited: Vec<u64> = (0..7).map(|_| rb.get().unwrap().sequence_index).collect();
        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_seek_clamps_and_resets_exhaustion() {
        let mut rb = RingBuffer::new(5);
        for i in 0..3 {
            rb.put(frame(i));
        }
        rb.seek(10);
        assert_eq!(rb.cursor(), 2);
        assert_eq!(rb.get().unwrap().sequence_index, 2);
        assert!(rb.history_exhausted());
        rb.seek(1);
        assert!(!rb.history_exhausted());
        assert_eq!(rb.get().unwrap().sequence_index, 1);
    }

    #[test]
    fn test_resize_discards_history() {
        let mut rb = RingBuffer::new(3);
        for i in 0..3 {
            rb.put(frame(i));
        }
        rb.get().unwrap();
        rb.resize(8);
        assert_eq!(rb.capacity(), 8);
        assert!(rb.is_empty());
        assert_eq!(rb.total_written(), 0);
        assert_eq!(rb.cursor(), 0);
        assert_eq!(rb.most_recent().unwrap_err(), RingBufferError::EmptyHistory);
    }

    #[test]
    fn test_returned_frames_share_storage() {
        let mut rb = RingBuffer::new(2);
        let f = frame(1);
        rb.put(f.clone());
        assert!(rb.most_recent().unwrap().shares_data_with(&f));
    }
}
