//! Audio subsystem module

pub mod dsp;
pub mod engine;
pub mod recv;
pub mod send;

#[cfg(feature = "audio-device")]
pub mod device;

pub use dsp::AudioDsp;
pub use engine::AudioEngine;
pub use recv::{PlaybackGate, PresenceEvent};
