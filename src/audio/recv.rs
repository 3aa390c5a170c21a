//! Incoming audio loop
//!
//! Classifies each datagram by scanning for non-zero bytes before any
//! filtering: all-zero windows are the peer's mute cadence and count as
//! presence traffic only. The first real-audio window opens the playback
//! device; it stays open for the rest of the call. Real audio then runs
//! the playback-direction signal chain, and only voice windows reach the
//! device.

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::dsp::AudioDsp;
use crate::constants::PEER_IDLE_TIMEOUT;
use crate::media::traits::{AudioBackend, AudioSink};
use crate::net;
use crate::state::Toggle;
use crate::stats::CallStats;

/// Peer-presence transition derived from incoming traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// First real audio after idle.
    PeerActive,
    /// No real audio for the staleness horizon.
    PeerIdle,
}

/// Presence tracker behind the lazy playback activation.
///
/// Idle until the first real-audio window, back to idle when real audio
/// stops for the configured horizon. Pure state plus a caller-supplied
/// clock, so transitions are testable without sockets.
#[derive(Debug)]
pub struct PlaybackGate {
    last_real_audio: Option<Instant>,
    horizon: Duration,
}

impl PlaybackGate {
    pub fn new(horizon: Duration) -> Self {
        Self {
            last_real_audio: None,
            horizon,
        }
    }

    pub fn is_active(&self) -> bool {
        self.last_real_audio.is_some()
    }

    /// Record one datagram; `real_audio` is the non-zero scan result.
    /// Silence refreshes nothing and never activates.
    pub fn on_window(&mut self, real_audio: bool, now: Instant) -> Option<PresenceEvent> {
        if !real_audio {
            return None;
        }
        let event = if self.last_real_audio.is_none() {
            Some(PresenceEvent::PeerActive)
        } else {
            None
        };
        self.last_real_audio = Some(now);
        event
    }

    /// Staleness check, driven by the receive timeout.
    pub fn poll(&mut self, now: Instant) -> Option<PresenceEvent> {
        match self.last_real_audio {
            Some(last) if now.duration_since(last) >= self.horizon => {
                self.last_real_audio = None;
                Some(PresenceEvent::PeerIdle)
            }
            _ => None,
        }
    }
}

pub(crate) fn receive_loop(
    socket: Arc<UdpSocket>,
    backend: Arc<dyn AudioBackend>,
    session_running: Toggle,
    enabled: Toggle,
    stats: Arc<CallStats>,
    window_bytes: usize,
) {
    let mut buf = vec![0u8; window_bytes * 2];
    let mut dsp = AudioDsp::new();
    let mut gate = PlaybackGate::new(PEER_IDLE_TIMEOUT);
    let mut sink: Option<Box<dyn AudioSink>> = None;
    tracing::info!("Audio receive loop started");

    while session_running.get() && enabled.get() {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) if len > 0 => {
                stats.record_audio_packet_received();
                let window = &mut buf[..len];
                let real_audio = window.iter().any(|&b| b != 0);

                if let Some(PresenceEvent::PeerActive) = gate.on_window(real_audio, Instant::now())
                {
                    tracing::info!("Peer audio active");
                    if sink.is_none() {
                        match backend.open_playback() {
                            Ok(opened) => {
                                tracing::info!("Playback device opened");
                                sink = Some(opened);
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Failed to open playback device, audio receive stopped: {}",
                                    e
                                );
                                break;
                            }
                        }
                    }
                }

                if real_audio {
                    if let Some(sink) = sink.as_mut() {
                        let voice = dsp.process(window);
                        if voice {
                            if let Err(e) = sink.write(window) {
                                tracing::warn!("Playback write failed: {}", e);
                            }
                        }
                    }
                }
            }
            // zero-length datagram
            Ok(_) => {}
            Err(e) if net::is_timeout(&e) => {}
            Err(e) => {
                if session_running.get() && enabled.get() {
                    tracing::warn!("Audio receive failed: {}", e);
                }
            }
        }

        if let Some(PresenceEvent::PeerIdle) = gate.poll(Instant::now()) {
            tracing::info!(
                "No audio from peer for {}s",
                PEER_IDLE_TIMEOUT.as_secs()
            );
        }
    }
    tracing::debug!("Audio receive loop exited");
}
