//! JPEG frame codec
//!
//! Every frame travels as one self-contained JPEG image, so any datagram
//! can be decoded without reference to its neighbours and a lost packet
//! costs exactly one frame.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};

use crate::error::VideoError;
use crate::media::traits::VideoCodec;
use crate::media::types::VideoFrame;

/// JPEG codec with a reused encode buffer
pub struct JpegCodec {
    quality: u8,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    /// Frame counter for statistics
    frames_encoded: u64,
    frames_decoded: u64,
}

impl JpegCodec {
    /// Create a codec with the given encode quality (clamped to 1-100).
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            encode_buffer: Vec::with_capacity(64 * 1024),
            frames_encoded: 0,
            frames_decoded: 0,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl VideoCodec for JpegCodec {
    fn encode(&mut self, frame: &VideoFrame) -> Result<Bytes, VideoError> {
        self.encode_buffer.clear();
        let mut encoder = JpegEncoder::new_with_quality(&mut self.encode_buffer, self.quality);
        encoder
            .encode(
                frame.data(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| VideoError::EncodingFailed(e.to_string()))?;

        self.frames_encoded += 1;
        Ok(Bytes::copy_from_slice(&self.encode_buffer))
    }

    fn decode(&mut self, payload: &[u8]) -> Result<VideoFrame, VideoError> {
        let decoded = image::load_from_memory_with_format(payload, ImageFormat::Jpeg)
            .map_err(|e| VideoError::DecodingFailed(e.to_string()))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        self.frames_decoded += 1;
        VideoFrame::from_rgb(rgb.into_raw(), width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_jpeg() {
        let mut codec = JpegCodec::new(75);
        let frame = VideoFrame::black(64, 48);

        let payload = codec.encode(&frame).unwrap();
        assert!(!payload.is_empty());
        // JPEG start-of-image marker
        assert_eq!(&payload[..2], &[0xff, 0xd8]);
        assert_eq!(codec.frames_encoded(), 1);
    }

    #[test]
    fn test_roundtrip_preserves_dimensions() {
        let mut codec = JpegCodec::new(75);
        let frame = VideoFrame::black(64, 48);

        let payload = codec.encode(&frame).unwrap();
        let decoded = codec.decode(&payload).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
        assert_eq!(codec.frames_decoded(), 1);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut codec = JpegCodec::new(75);
        let result = codec.decode(&[0x00, 0x01, 0x02, 0x03]);
        assert!(result.is_err());
        assert_eq!(codec.frames_decoded(), 0);
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(JpegCodec::new(0).quality(), 1);
        assert_eq!(JpegCodec::new(200).quality(), 100);
        assert_eq!(JpegCodec::new(75).quality(), 75);
    }
}
