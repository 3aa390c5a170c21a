//! Frame tag overlay
//!
//! Stamps a fixed text tag into the bottom-left corner of every outgoing
//! frame using an embedded 5x7 pixel font, drawn before encoding so the
//! peer sees it. Uppercase letters, digits, dash and space only; anything
//! else leaves a blank cell.

use crate::media::types::VideoFrame;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Pixel scale of one glyph cell; 2x keeps the tag readable at 640x480.
const GLYPH_SCALE: u32 = 2;
/// Left margin and bottom offset of the tag inside the frame.
const TAG_MARGIN_X: u32 = 10;
const TAG_MARGIN_Y: u32 = 20;
const TAG_COLOR: [u8; 3] = [0, 255, 0];

/// Stamp `text` into the frame. Frames too small for a single glyph row
/// are left untouched.
pub fn stamp_tag(frame: &mut VideoFrame, text: &str) {
    let tag_height = GLYPH_HEIGHT * GLYPH_SCALE;
    if frame.height() < tag_height + TAG_MARGIN_Y {
        return;
    }
    let top = frame.height() - TAG_MARGIN_Y - tag_height;
    let mut left = TAG_MARGIN_X;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            draw_glyph(frame, left, top, &rows);
        }
        left += (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    }
}

fn draw_glyph(frame: &mut VideoFrame, left: u32, top: u32, rows: &[u8; 7]) {
    for (gy, row) in rows.iter().enumerate() {
        for gx in 0..GLYPH_WIDTH {
            if row & (0x10 >> gx) == 0 {
                continue;
            }
            for dy in 0..GLYPH_SCALE {
                for dx in 0..GLYPH_SCALE {
                    frame.put_pixel(
                        left + gx * GLYPH_SCALE + dx,
                        top + gy as u32 * GLYPH_SCALE + dy,
                        TAG_COLOR,
                    );
                }
            }
        }
    }
}

/// Row bitmap of one glyph, bit 4 is the leftmost column.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch.to_ascii_uppercase() {
        'A' => [0x0e, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'B' => [0x1e, 0x11, 0x11, 0x1e, 0x11, 0x11, 0x1e],
        'C' => [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e],
        'D' => [0x1e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1e],
        'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
        'F' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10],
        'G' => [0x0e, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0e],
        'H' => [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'I' => [0x0e, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0c],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f],
        'M' => [0x11, 0x1b, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'P' => [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10],
        'Q' => [0x0e, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0d],
        'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
        'S' => [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e],
        'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0a, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0a],
        'X' => [0x11, 0x11, 0x0a, 0x04, 0x0a, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0a, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1f],
        '0' => [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e],
        '1' => [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e],
        '2' => [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f],
        '3' => [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e],
        '4' => [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02],
        '5' => [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e],
        '6' => [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e],
        '7' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e],
        '9' => [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c],
        '-' => [0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_draws_green_pixels() {
        let mut frame = VideoFrame::black(640, 480);
        stamp_tag(&mut frame, "LAN CALL");
        let top = 480 - TAG_MARGIN_Y - GLYPH_HEIGHT * GLYPH_SCALE;
        let mut green = 0;
        for y in top..480 - TAG_MARGIN_Y {
            for x in TAG_MARGIN_X..200 {
                match frame.pixel(x, y) {
                    Some(p) if p == TAG_COLOR => green += 1,
                    Some(p) => assert_eq!(p, [0, 0, 0]),
                    None => {}
                }
            }
        }
        assert!(green > 0);
        // nothing outside the tag band changes
        assert_eq!(frame.pixel(320, 100), Some([0, 0, 0]));
    }

    #[test]
    fn test_unknown_chars_leave_blank_cells() {
        let mut frame = VideoFrame::black(640, 480);
        stamp_tag(&mut frame, "???");
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tiny_frame_is_left_untouched() {
        let mut frame = VideoFrame::black(16, 16);
        stamp_tag(&mut frame, "LAN CALL");
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_long_tag_clips_at_frame_edge() {
        let mut frame = VideoFrame::black(64, 64);
        stamp_tag(&mut frame, "WWWWWWWWWWWWWWWW");
        // no panic; some pixels inside, overflow ignored
        assert!(frame.data().iter().any(|&b| b != 0));
    }
}
