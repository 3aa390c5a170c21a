//! Outgoing video pipeline
//!
//! Two threads cooperate through the frame queue. The timing loop runs a
//! free-running 30 fps clock: it grabs, stamps and offers frames without
//! ever blocking on the encoder. The worker drains the queue, JPEG-encodes
//! and ships each frame as one datagram. Frames whose encoded size exceeds
//! the datagram limit are dropped, not fragmented.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::VideoConfig;
use crate::constants::{PAUSE_POLL_INTERVAL, VIDEO_TAG};
use crate::error::VideoError;
use crate::media::traits::{VideoCodec, VideoSource};
use crate::state::Toggle;
use crate::stats::CallStats;
use crate::video::overlay;
use crate::video::queue::{create_shared_queue, SharedFrameQueue};

/// How often the worker rechecks its running flag while the queue is idle.
const WORKER_POLL: Duration = Duration::from_millis(250);

/// Fixed-rate send pipeline.
pub struct VideoSendPipeline {
    running: Toggle,
    paused: Toggle,
    queue: SharedFrameQueue,
    timing_handle: Option<JoinHandle<()>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl VideoSendPipeline {
    /// Spawn the timing loop and the encode worker. The pipeline owns the
    /// source, codec and socket from here on.
    pub fn start(
        config: &VideoConfig,
        source: Box<dyn VideoSource>,
        codec: Box<dyn VideoCodec>,
        socket: UdpSocket,
        peer: SocketAddr,
        stats: Arc<CallStats>,
    ) -> Result<Self, VideoError> {
        let running = Toggle::new(true);
        let paused = Toggle::new(false);
        let queue = create_shared_queue(config.queue_capacity);

        let timing_handle = {
            let running = running.clone();
            let paused = paused.clone();
            let queue = queue.clone();
            let stats = stats.clone();
            let interval = config.frame_interval();
            thread::Builder::new()
                .name("video-send-timing".to_string())
                .spawn(move || timing_loop(source, queue, running, paused, interval, stats))
                .map_err(|e| VideoError::ThreadFailed(e.to_string()))?
        };

        let worker_handle = {
            let flag = running.clone();
            let queue = queue.clone();
            let max_packet = config.max_packet;
            let spawned = thread::Builder::new()
                .name("video-encode".to_string())
                .spawn(move || worker_loop(codec, queue, socket, peer, flag, max_packet, stats));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    running.set(false);
                    let _ = timing_handle.join();
                    return Err(VideoError::ThreadFailed(e.to_string()));
                }
            }
        };

        Ok(Self {
            running,
            paused,
            queue,
            timing_handle: Some(timing_handle),
            worker_handle: Some(worker_handle),
        })
    }

    /// Handle the command router flips on `/pause`.
    pub fn pause_flag(&self) -> Toggle {
        self.paused.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Frames rejected at the queue so far.
    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped()
    }

    /// Stop both threads and wait for them to finish.
    pub fn stop(&mut self) {
        self.running.set(false);
        if let Some(handle) = self.timing_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for VideoSendPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn timing_loop(
    mut source: Box<dyn VideoSource>,
    queue: SharedFrameQueue,
    running: Toggle,
    paused: Toggle,
    interval: Duration,
    stats: Arc<CallStats>,
) {
    tracing::info!(
        "Video send loop started ({:.1} fps)",
        1.0 / interval.as_secs_f64()
    );
    let mut next_frame = Instant::now();
    while running.get() {
        if paused.get() {
            thread::sleep(PAUSE_POLL_INTERVAL);
            // restart the clock so resume does not burst
            next_frame = Instant::now();
            continue;
        }
        let now = Instant::now();
        if next_frame > now {
            thread::sleep(next_frame - now);
        }
        // free-running clock: late frames shorten the next sleep instead
        // of shifting the schedule
        next_frame += interval;

        let mut frame = match source.grab() {
            Ok(frame) => frame,
            Err(e) => {
                if running.get() {
                    tracing::error!("Frame capture failed, video send stopped: {}", e);
                }
                break;
            }
        };
        overlay::stamp_tag(&mut frame, VIDEO_TAG);
        if !queue.offer(frame) {
            stats.record_video_frame_dropped();
            tracing::debug!("Frame queue full, dropped frame ({} total)", queue.dropped());
        }
    }
    tracing::debug!("Video send timing loop exited");
}

fn worker_loop(
    mut codec: Box<dyn VideoCodec>,
    queue: SharedFrameQueue,
    socket: UdpSocket,
    peer: SocketAddr,
    running: Toggle,
    max_packet: usize,
    stats: Arc<CallStats>,
) {
    while running.get() {
        let frame = match queue.take_timeout(WORKER_POLL) {
            Some(frame) => frame,
            None => continue,
        };
        let payload = match codec.encode(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Frame encoding failed: {}", e);
                continue;
            }
        };
        if payload.len() > max_packet {
            stats.record_video_frame_dropped();
            tracing::warn!(
                "Encoded frame too large ({} > {} bytes), dropped",
                payload.len(),
                max_packet
            );
            continue;
        }
        match socket.send_to(&payload, peer) {
            Ok(_) => stats.record_video_frame_sent(payload.len()),
            Err(e) => {
                if running.get() {
                    tracing::warn!("Video send failed: {}", e);
                }
            }
        }
    }
    tracing::debug!("Video encode worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::types::VideoFrame;
    use bytes::Bytes;

    struct SolidSource;

    impl VideoSource for SolidSource {
        fn grab(&mut self) -> Result<VideoFrame, VideoError> {
            Ok(VideoFrame::black(32, 32))
        }
    }

    struct RawCodec;

    impl VideoCodec for RawCodec {
        fn encode(&mut self, frame: &VideoFrame) -> Result<Bytes, VideoError> {
            Ok(Bytes::copy_from_slice(&frame.data()[..16]))
        }

        fn decode(&mut self, payload: &[u8]) -> Result<VideoFrame, VideoError> {
            let _ = payload;
            Ok(VideoFrame::black(32, 32))
        }
    }

    fn test_config() -> VideoConfig {
        VideoConfig {
            width: 32,
            height: 32,
            frame_rate: 100,
            ..VideoConfig::default()
        }
    }

    #[test]
    fn test_pipeline_ships_frames_to_peer() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let peer = receiver.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let stats = CallStats::new();

        let mut pipeline = VideoSendPipeline::start(
            &test_config(),
            Box::new(SolidSource),
            Box::new(RawCodec),
            socket,
            peer,
            stats.clone(),
        )
        .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(len, 16);

        pipeline.stop();
        assert!(stats.snapshot().video_frames_sent >= 1);
    }

    #[test]
    fn test_stop_joins_both_threads() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let peer = receiver.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();

        let mut pipeline = VideoSendPipeline::start(
            &test_config(),
            Box::new(SolidSource),
            Box::new(RawCodec),
            socket,
            peer,
            CallStats::new(),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        pipeline.stop();
        assert!(pipeline.timing_handle.is_none());
        assert!(pipeline.worker_handle.is_none());
    }

    #[test]
    fn test_pause_flag_round_trips() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let peer = receiver.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();

        let pipeline = VideoSendPipeline::start(
            &test_config(),
            Box::new(SolidSource),
            Box::new(RawCodec),
            socket,
            peer,
            CallStats::new(),
        )
        .unwrap();
        let pause = pipeline.pause_flag();
        assert!(!pipeline.is_paused());
        assert!(pause.toggle());
        assert!(pipeline.is_paused());
        assert!(!pause.toggle());
        assert!(!pipeline.is_paused());
    }
}
