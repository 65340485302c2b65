//! Output side of the acquisition loop.
//!
//! The loop talks to its consumers only through [`OutputQueue`], so the
//! transport can be swapped (in-process channel, shared memory, socket)
//! without touching the loop. The in-process implementation is a bounded
//! `tokio::sync::mpsc` channel.
//!
//! Admission is decided by the loop (see `AcquisitionLoop`): it checks
//! [`OutputQueue::pending`] against `n_consumers + 2` and only then calls
//! [`OutputQueue::try_enqueue`], which never blocks.

use crate::core::Frame;
use crate::error::QueueError;
use tokio::sync::mpsc;

/// Producer-side contract for delivering frames to consumers.
pub trait OutputQueue: Send {
    /// Frames enqueued but not yet taken by a consumer.
    fn pending(&self) -> usize;

    /// Hard capacity of the transport.
    fn capacity(&self) -> usize;

    /// Enqueue without blocking.
    fn try_enqueue(&self, frame: Frame) -> Result<(), QueueError>;
}

/// Bounded in-process frame channel.
pub struct FrameQueue;

impl FrameQueue {
    /// Create a channel holding at most `capacity` frames.
    pub fn bounded(capacity: usize) -> (FrameSender, FrameReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (FrameSender { tx }, FrameReceiver { rx })
    }
}

/// Producer half of [`FrameQueue`].
#[derive(Clone, Debug)]
pub struct FrameSender {
    tx: mpsc::Sender<Frame>,
}

impl OutputQueue for FrameSender {
    fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    fn try_enqueue(&self, frame: Frame) -> Result<(), QueueError> {
        self.tx.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Disconnected,
        })
    }
}

/// Consumer half of [`FrameQueue`].
///
/// Several consumers can share one receiver through
/// `Arc<tokio::sync::Mutex<FrameReceiver>>`.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<Frame>,
}

impl FrameReceiver {
    /// Take a frame if one is waiting.
    pub fn try_dequeue(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next frame; `None` once the producer is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for use outside a runtime.
    pub fn blocking_recv(&mut self) -> Option<Frame> {
        self.rx.blocking_recv()
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.try_dequeue()).collect()
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ImageData, PixelBuffer};

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, ImageData::new(1, 1, PixelBuffer::U8(vec![0])).unwrap())
    }

    #[test]
    fn test_pending_tracks_queue_depth() {
        let (tx, mut rx) = FrameQueue::bounded(4);
        assert_eq!(tx.capacity(), 4);
        assert_eq!(tx.pending(), 0);
        tx.try_enqueue(frame(0)).unwrap();
        tx.try_enqueue(frame(1)).unwrap();
        assert_eq!(tx.pending(), 2);
        assert_eq!(rx.try_dequeue().unwrap().sequence_index, 0);
        assert_eq!(tx.pending(), 1);
    }

    #[test]
    fn test_full_and_disconnected() {
        let (tx, rx) = FrameQueue::bounded(1);
        tx.try_enqueue(frame(0)).unwrap();
        assert_eq!(tx.try_enqueue(frame(1)), Err(QueueError::Full));
        drop(rx);
        assert_eq!(tx.try_enqueue(frame(2)), Err(QueueError::Disconnected));
    }

    #[tokio::test]
    async fn test_async_consumer_receives_in_order() {
        let (tx, mut rx) = FrameQueue::bounded(8);
        for i in 0..3 {
            tx.try_enqueue(frame(i)).unwrap();
        }
        drop(tx);
        let mut seen = Vec::new();
        while let Some(f) = rx.recv().await {
            seen.push(f.sequence_index);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_consumers_share_one_receiver() {
        let (tx, rx) = FrameQueue::bounded(8);
        let shared = std::sync::Arc::new(tokio::sync::Mutex::new(rx));
        for i in 0..6 {
            tx.try_enqueue(frame(i)).unwrap();
        }
        drop(tx);

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let rx = shared.clone();
                tokio::spawn(async move {
                    let mut got = Vec::new();
                    while let Some(f) = rx.lock().await.recv().await {
                        got.push(f.sequence_index);
                    }
                    got
                })
            })
            .collect();

        let mut all = Vec::new();
        for worker in workers {
            all.extend(worker.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..6).collect::<Vec<u64>>());
    }

    #[test]
    fn test_recv_outside_runtime() {
        let (tx, mut rx) = FrameQueue::bounded(2);
        tx.try_enqueue(frame(7)).unwrap();
        drop(tx);
        let received = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(received.sequence_index, 7);
        assert!(tokio_test::block_on(rx.recv()).is_none());
    }
}
