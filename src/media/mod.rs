//! Media types and the capability traits at the device edges

pub mod testpattern;
pub mod traits;
pub mod types;

pub use traits::{AudioBackend, AudioSink, AudioSource, VideoCodec, VideoRenderer, VideoSource};
pub use types::VideoFrame;
