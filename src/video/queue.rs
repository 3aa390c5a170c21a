//! Capture-to-compression frame hand-off
//!
//! Single producer (the timing loop), single consumer (the encode worker).
//! Capacity is deliberately tiny: when compression falls behind, new frames
//! are rejected at the door and the frames already queued go out, so the
//! capture clock never blocks on the encoder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::media::types::VideoFrame;

/// Bounded drop-newest frame queue.
pub struct FrameQueue {
    tx: Sender<VideoFrame>,
    rx: Receiver<VideoFrame>,
    capacity: usize,
    dropped: AtomicU64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Non-blocking insert. A full queue rejects the new frame, counts the
    /// drop and returns false.
    pub fn offer(&self, frame: VideoFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Blocking take.
    pub fn take(&self) -> Option<VideoFrame> {
        self.rx.recv().ok()
    }

    /// Take with a timeout so the consumer can poll its running flag.
    pub fn take_timeout(&self, timeout: Duration) -> Option<VideoFrame> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Shared handle used by both pipeline threads.
pub type SharedFrameQueue = Arc<FrameQueue>;

/// Create a frame queue wrapped in an Arc for sharing.
pub fn create_shared_queue(capacity: usize) -> SharedFrameQueue {
    Arc::new(FrameQueue::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(width: u32) -> VideoFrame {
        VideoFrame::black(width, 2)
    }

    #[test]
    fn test_full_queue_rejects_newest() {
        let queue = FrameQueue::new(3);
        assert!(queue.offer(frame(1)));
        assert!(queue.offer(frame(2)));
        assert!(queue.offer(frame(3)));
        assert!(queue.is_full());

        assert!(!queue.offer(frame(4)));
        assert_eq!(queue.dropped(), 1);

        // the queued frames survive in order; the rejected one is gone
        assert_eq!(queue.take().unwrap().width(), 1);
        assert_eq!(queue.take().unwrap().width(), 2);
        assert_eq!(queue.take().unwrap().width(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_timeout_expires_when_empty() {
        let queue = FrameQueue::new(3);
        assert!(queue
            .take_timeout(Duration::from_millis(10))
            .is_none());
    }

    #[test]
    fn test_take_wakes_on_offer() {
        let queue = create_shared_queue(3);
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.offer(frame(7));
            })
        };
        let taken = queue.take_timeout(Duration::from_secs(2));
        producer.join().unwrap();
        assert_eq!(taken.unwrap().width(), 7);
    }
}
