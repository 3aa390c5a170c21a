//! Video subsystem
//!
//! Fixed-rate capture, bounded hand-off to the encoder, per-frame JPEG
//! datagrams out; blocking receive, decode and render in.

pub mod overlay;
pub mod queue;
pub mod recv;
pub mod send;

pub use recv::VideoReceivePipeline;
pub use send::VideoSendPipeline;
