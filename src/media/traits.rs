//! Capability traits at the device edges
//!
//! The pipelines pull and push media through these traits instead of
//! touching platform APIs, so the transport and DSP layers run unchanged
//! against real devices, the built-in test pattern, or test fakes.

use bytes::Bytes;

use crate::error::{AudioError, VideoError};
use crate::media::types::VideoFrame;

/// Produces uncompressed frames on demand.
///
/// Blocking inside `grab` is fine; pacing belongs to the send pipeline's
/// timing loop.
pub trait VideoSource: Send {
    fn grab(&mut self) -> Result<VideoFrame, VideoError>;
}

/// Consumes decoded frames as they arrive.
pub trait VideoRenderer: Send {
    fn render(&mut self, frame: &VideoFrame) -> Result<(), VideoError>;
}

/// Encodes raw frames into wire payloads and back.
pub trait VideoCodec: Send {
    fn encode(&mut self, frame: &VideoFrame) -> Result<Bytes, VideoError>;
    fn decode(&mut self, payload: &[u8]) -> Result<VideoFrame, VideoError>;
}

/// Pulls PCM windows from a capture device.
pub trait AudioSource: Send {
    /// Fill `window` with captured bytes. Returns the byte count, or 0
    /// when nothing arrived within the source's internal timeout.
    fn read_window(&mut self, window: &mut [u8]) -> Result<usize, AudioError>;
}

/// Pushes PCM windows to a playback device.
pub trait AudioSink: Send {
    fn write(&mut self, window: &[u8]) -> Result<(), AudioError>;
}

/// Opens capture and playback endpoints. Playback opening is deferred to
/// the receive loop, which waits for the first real audio from the peer.
pub trait AudioBackend: Send + Sync {
    fn open_capture(&self) -> Result<Box<dyn AudioSource>, AudioError>;
    fn open_playback(&self) -> Result<Box<dyn AudioSink>, AudioError>;
}
