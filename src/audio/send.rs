//! Outgoing audio loop
//!
//! Pulls 10 ms windows from the capture source, runs the capture-direction
//! signal chain and ships voice windows as single datagrams. While muted
//! the loop sends all-zero windows at a fixed cadence instead, which keeps
//! the peer's receive timing alive without leaking microphone data.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;

use crate::audio::dsp::AudioDsp;
use crate::constants::MUTED_SEND_INTERVAL;
use crate::media::traits::AudioSource;
use crate::state::Toggle;
use crate::stats::CallStats;

pub(crate) fn send_loop(
    mut source: Box<dyn AudioSource>,
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    session_running: Toggle,
    enabled: Toggle,
    muted: Toggle,
    stats: Arc<CallStats>,
    window_bytes: usize,
) {
    let mut window = vec![0u8; window_bytes];
    let silence = vec![0u8; window_bytes];
    let mut dsp = AudioDsp::new();
    tracing::info!("Audio send loop started");

    while session_running.get() && enabled.get() {
        if muted.get() {
            match socket.send_to(&silence, peer) {
                Ok(_) => stats.record_audio_packet_sent(),
                Err(e) => {
                    if session_running.get() {
                        tracing::warn!("Silence send failed: {}", e);
                    }
                }
            }
            thread::sleep(MUTED_SEND_INTERVAL);
            continue;
        }

        let len = match source.read_window(&mut window) {
            // capture produced nothing this period
            Ok(0) => continue,
            Ok(len) => len,
            Err(e) => {
                if session_running.get() && enabled.get() {
                    tracing::error!("Audio capture failed, audio send stopped: {}", e);
                }
                break;
            }
        };

        let voice = dsp.process(&mut window[..len]);
        if !voice {
            stats.record_audio_window_gated();
            continue;
        }
        match socket.send_to(&window[..len], peer) {
            Ok(_) => stats.record_audio_packet_sent(),
            Err(e) => {
                if session_running.get() {
                    tracing::warn!("Audio send failed: {}", e);
                }
            }
        }
    }
    tracing::debug!("Audio send loop exited");
}
