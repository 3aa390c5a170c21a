//! # lancall
//!
//! Two-party audio/video calling over a LAN. Each endpoint runs the same
//! symmetric set of loops; only the port assignment distinguishes the
//! `server` role from the `client` role.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────── endpoint ─────────────────────────────┐
//! │                                                                     │
//! │  camera ──▶ timing loop ──▶ frame queue ──▶ encode ──▶ UDP video ───┼──▶ peer
//! │                (30 fps)      (bounded,3)    (JPEG)                  │
//! │                                                                     │
//! │  mic ──▶ DC filter ──▶ voice gate ──▶ limiter ──▶ UDP audio ────────┼──▶ peer
//! │          (1-pole)      (decayed RMS)  (soft)                        │
//! │                                                                     │
//! │  stdin ──▶ command router ──▶ TCP control ──────────────────────────┼──▶ peer
//! │                                                                     │
//! │  peer ──▶ UDP video ──▶ decode ──▶ render                           │
//! │  peer ──▶ UDP audio ──▶ presence gate ──▶ DC filter ──▶ playback    │
//! │  peer ──▶ TCP control ──▶ command router (apply, never re-relay)    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every loop is a named OS thread gated on shared atomic flags; media
//! travels as raw datagrams with no framing beyond the datagram itself.

pub mod audio;
pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod media;
pub mod net;
pub mod session;
pub mod state;
pub mod stats;
pub mod video;

pub use error::{Error, Result};

/// Core constants shared across the call engine
pub mod constants {
    use std::time::Duration;

    /// Video frame width in pixels
    pub const FRAME_WIDTH: u32 = 640;
    /// Video frame height in pixels
    pub const FRAME_HEIGHT: u32 = 480;
    /// Video capture rate in frames per second
    pub const FRAME_RATE: u32 = 30;
    /// JPEG encode quality (1-100)
    pub const JPEG_QUALITY: u8 = 75;
    /// Largest encoded frame accepted on the wire, in bytes
    pub const MAX_VIDEO_PACKET: usize = 120 * 1024;
    /// Capture-to-compression hand-off queue depth
    pub const FRAME_QUEUE_CAPACITY: usize = 3;
    /// Text tag stamped onto every outgoing frame
    pub const VIDEO_TAG: &str = "LAN CALL";

    /// Audio sample rate in Hz (mono, 16-bit little-endian)
    pub const AUDIO_SAMPLE_RATE: u32 = 16_000;
    /// Samples per audio window (10 ms at 16 kHz)
    pub const AUDIO_WINDOW_SAMPLES: usize = 160;
    /// Bytes per audio window
    pub const AUDIO_WINDOW_BYTES: usize = AUDIO_WINDOW_SAMPLES * 2;

    /// Pole of the DC-blocking high-pass filter
    pub const DC_BLOCK_POLE: f64 = 0.995;
    /// Voice decision threshold on the decayed RMS average
    pub const VAD_THRESHOLD: f64 = 300.0;
    /// Per-window decay of the RMS average
    pub const VAD_DECAY: f64 = 0.9;
    /// Loudness target of the soft limiter
    pub const LIMITER_TARGET_RMS: f64 = 2000.0;

    /// Base UDP port for video; server listens on base, client on base+1
    pub const VIDEO_PORT: u16 = 6000;
    /// Base UDP port for audio
    pub const AUDIO_PORT: u16 = 6002;
    /// Base TCP port for the control channel
    pub const CONTROL_PORT: u16 = 6004;

    /// Kernel buffer size for the video sockets
    pub const VIDEO_SOCKET_BUFFER: usize = MAX_VIDEO_PACKET * 4;
    /// Kernel buffer size for the audio sockets
    pub const AUDIO_SOCKET_BUFFER: usize = 64 * 1024;

    /// Pause between control connect attempts
    pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
    /// Audio receive timeout driving the peer staleness poll
    pub const AUDIO_RECV_TIMEOUT: Duration = Duration::from_secs(1);
    /// Horizon after which a silent peer is considered idle
    pub const PEER_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Cadence of silence windows while muted
    pub const MUTED_SEND_INTERVAL: Duration = Duration::from_millis(20);
    /// Poll interval of the timing loop while video is paused
    pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);
    /// Interval between call statistics reports
    pub const STATS_INTERVAL: Duration = Duration::from_secs(10);
}
