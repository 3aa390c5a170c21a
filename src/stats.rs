//! Call statistics
//!
//! Plain atomic counters bumped from the pipeline threads plus a reporter
//! thread that logs a one-line summary every 10 seconds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::constants::STATS_INTERVAL;
use crate::state::Toggle;

/// Counters shared by every pipeline in the session.
#[derive(Debug, Default)]
pub struct CallStats {
    video_frames_sent: AtomicU64,
    video_frames_dropped: AtomicU64,
    video_frames_received: AtomicU64,
    video_bytes_sent: AtomicU64,
    audio_packets_sent: AtomicU64,
    audio_packets_received: AtomicU64,
    audio_windows_gated: AtomicU64,
}

impl CallStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_video_frame_sent(&self, bytes: usize) {
        self.video_frames_sent.fetch_add(1, Ordering::Relaxed);
        self.video_bytes_sent
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_video_frame_dropped(&self) {
        self.video_frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_video_frame_received(&self) {
        self.video_frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_packet_sent(&self) {
        self.audio_packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_packet_received(&self) {
        self.audio_packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_window_gated(&self) {
        self.audio_windows_gated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            video_frames_sent: self.video_frames_sent.load(Ordering::Relaxed),
            video_frames_dropped: self.video_frames_dropped.load(Ordering::Relaxed),
            video_frames_received: self.video_frames_received.load(Ordering::Relaxed),
            video_bytes_sent: self.video_bytes_sent.load(Ordering::Relaxed),
            audio_packets_sent: self.audio_packets_sent.load(Ordering::Relaxed),
            audio_packets_received: self.audio_packets_received.load(Ordering::Relaxed),
            audio_windows_gated: self.audio_windows_gated.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub video_frames_sent: u64,
    pub video_frames_dropped: u64,
    pub video_frames_received: u64,
    pub video_bytes_sent: u64,
    pub audio_packets_sent: u64,
    pub audio_packets_received: u64,
    pub audio_windows_gated: u64,
}

/// Background thread that logs the counters at a fixed interval.
pub struct StatsReporter {
    running: Toggle,
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    pub fn start(stats: Arc<CallStats>) -> Self {
        let running = Toggle::new(true);
        let flag = running.clone();
        let handle = match thread::Builder::new()
            .name("stats-reporter".to_string())
            .spawn(move || report_loop(stats, flag))
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to start stats reporter: {}", e);
                None
            }
        };
        Self { running, handle }
    }

    pub fn stop(&mut self) {
        self.running.set(false);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn report_loop(stats: Arc<CallStats>, running: Toggle) {
    let started = Instant::now();
    let mut last_report = Instant::now();
    while running.get() {
        // short sleeps keep shutdown snappy
        thread::sleep(Duration::from_millis(500));
        if last_report.elapsed() < STATS_INTERVAL {
            continue;
        }
        last_report = Instant::now();
        let s = stats.snapshot();
        tracing::info!(
            "Call stats after {}s: video {} sent / {} dropped / {} received ({:.1} KiB out), audio {} sent / {} received / {} gated",
            started.elapsed().as_secs(),
            s.video_frames_sent,
            s.video_frames_dropped,
            s.video_frames_received,
            s.video_bytes_sent as f64 / 1024.0,
            s.audio_packets_sent,
            s.audio_packets_received,
            s.audio_windows_gated,
        );
    }
}
