//! Frame codec
//!
//! Per-frame JPEG compression; each datagram decodes independently.

pub mod jpeg;

pub use jpeg::JpegCodec;
