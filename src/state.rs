//! Shared run-state flags
//!
//! Every loop in the engine is gated on one or more of these flags:
//! the session-wide running flag, the audio enabled and muted flags,
//! and the video pause flag. Clones share the underlying atomic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable boolean flag shared across threads.
#[derive(Debug, Clone)]
pub struct Toggle {
    flag: Arc<AtomicBool>,
}

impl Toggle {
    pub fn new(initial: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn get(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: bool) {
        self.flag.store(value, Ordering::SeqCst);
    }

    /// Flip the flag in one atomic step and return the new value.
    /// Concurrent toggles never lose an update.
    pub fn toggle(&self) -> bool {
        !self.flag.fetch_xor(true, Ordering::SeqCst)
    }

    /// Store `value` and return what the flag held before. First caller
    /// wins, which makes shutdown paths idempotent.
    pub fn swap(&self, value: bool) -> bool {
        self.flag.swap(value, Ordering::SeqCst)
    }
}

impl Default for Toggle {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_and_reports_new_value() {
        let flag = Toggle::new(false);
        assert!(flag.toggle());
        assert!(flag.get());
        assert!(!flag.toggle());
        assert!(!flag.get());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = Toggle::new(true);
        let other = flag.clone();
        flag.set(false);
        assert!(!other.get());
    }

    #[test]
    fn test_swap_returns_previous() {
        let flag = Toggle::new(false);
        assert!(!flag.swap(true));
        assert!(flag.swap(true));
        assert!(flag.get());
    }

    #[test]
    fn test_concurrent_toggles_preserve_parity() {
        let flag = Toggle::new(false);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let flag = flag.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1001 {
                    flag.toggle();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        // 4 * 1001 flips from false lands on false
        assert!(!flag.get());
    }
}
