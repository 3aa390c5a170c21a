//! Media frame types

use std::fmt;

use crate::error::VideoError;

/// One uncompressed video frame, tightly packed 8-bit RGB.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl VideoFrame {
    /// Wrap an RGB24 buffer; the length must match the dimensions.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self, VideoError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(VideoError::InvalidDimensions(width, height));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// All-black frame of the given size.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 3],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Set one pixel; out-of-bounds coordinates are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_checks_length() {
        assert!(VideoFrame::from_rgb(vec![0; 12], 2, 2).is_ok());
        assert!(VideoFrame::from_rgb(vec![0; 11], 2, 2).is_err());
        assert!(VideoFrame::from_rgb(vec![], 0, 0).is_err());
    }

    #[test]
    fn test_put_pixel_ignores_out_of_bounds() {
        let mut frame = VideoFrame::black(2, 2);
        frame.put_pixel(5, 5, [1, 2, 3]);
        assert!(frame.data().iter().all(|&b| b == 0));
        frame.put_pixel(1, 1, [9, 8, 7]);
        assert_eq!(frame.pixel(1, 1), Some([9, 8, 7]));
        assert_eq!(frame.pixel(2, 0), None);
    }
}
