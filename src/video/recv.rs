//! Incoming video pipeline
//!
//! One thread blocks on the video socket with no timeout, decodes each
//! datagram as a complete JPEG frame and renders it on arrival. Datagrams
//! that fail to decode (truncated or corrupt) cost one frame and nothing
//! else. `stop` unblocks the read with a wake datagram to its own port.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::VideoError;
use crate::media::traits::{VideoCodec, VideoRenderer};
use crate::state::Toggle;
use crate::stats::CallStats;

pub struct VideoReceivePipeline {
    running: Toggle,
    socket: Arc<UdpSocket>,
    handle: Option<JoinHandle<()>>,
}

impl VideoReceivePipeline {
    /// Spawn the receive loop on an already bound socket.
    pub fn start(
        socket: UdpSocket,
        codec: Box<dyn VideoCodec>,
        renderer: Box<dyn VideoRenderer>,
        max_packet: usize,
        stats: Arc<CallStats>,
    ) -> Result<Self, VideoError> {
        let socket = Arc::new(socket);
        let running = Toggle::new(true);
        let handle = {
            let socket = socket.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("video-recv".to_string())
                .spawn(move || receive_loop(socket, codec, renderer, running, max_packet, stats))
                .map_err(|e| VideoError::ThreadFailed(e.to_string()))?
        };
        Ok(Self {
            running,
            socket,
            handle: Some(handle),
        })
    }

    /// Stop the loop and wait for it. Sends a one-byte wake datagram to
    /// the listen port to unblock the pending read.
    pub fn stop(&mut self) {
        self.running.set(false);
        if let Ok(mut local) = self.socket.local_addr() {
            if local.ip().is_unspecified() {
                local.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
            }
            if let Ok(waker) = UdpSocket::bind("127.0.0.1:0") {
                let _ = waker.send_to(&[0], local);
            }
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for VideoReceivePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(
    socket: Arc<UdpSocket>,
    mut codec: Box<dyn VideoCodec>,
    mut renderer: Box<dyn VideoRenderer>,
    running: Toggle,
    max_packet: usize,
    stats: Arc<CallStats>,
) {
    match socket.local_addr() {
        Ok(addr) => tracing::info!("Video receive loop listening on {}", addr),
        Err(_) => tracing::info!("Video receive loop started"),
    }
    let mut buf = vec![0u8; max_packet];
    while running.get() {
        let (len, _from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) => {
                if running.get() {
                    tracing::warn!("Video receive failed: {}", e);
                    thread::sleep(Duration::from_millis(50));
                }
                continue;
            }
        };
        if !running.get() {
            break;
        }
        if len == 0 {
            continue;
        }
        match codec.decode(&buf[..len]) {
            Ok(frame) => {
                stats.record_video_frame_received();
                if let Err(e) = renderer.render(&frame) {
                    tracing::warn!("Frame rendering failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("Frame decoding failed ({} bytes): {}", len, e),
        }
    }
    tracing::debug!("Video receive loop exited");
}
