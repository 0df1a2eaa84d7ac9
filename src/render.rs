//! Frame annotation primitives.
//!
//! The pipeline draws through the `Renderer` trait so the inference and
//! output stages never depend on a particular drawing backend. The built-in
//! `SoftwareRenderer` writes directly into the RGB8 frame buffer: scanline
//! polygon fill with alpha blending, Bresenham lines, and a 5x7 bitmap font
//! for labels.

use crate::Frame;

/// Drawing primitives over a frame.
pub trait Renderer: Send + Sync {
    /// Fill a polygon with `alpha`-blended color (0.0 transparent, 1.0 solid).
    fn fill_polygon(&self, frame: &mut Frame, points: &[(f64, f64)], color: [u8; 3], alpha: f32);

    /// Solid polygon outline.
    fn draw_outline(&self, frame: &mut Frame, points: &[(f64, f64)], color: [u8; 3]);

    /// Text centered-ish at a point; used for zone names.
    fn draw_label(&self, frame: &mut Frame, text: &str, x: i32, y: i32, color: [u8; 3]);

    /// Rectangle outline for detection boxes.
    fn draw_box(&self, frame: &mut Frame, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 3]);

    /// Text anchored at a top-left point; used for box captions.
    fn draw_text(&self, frame: &mut Frame, text: &str, x: i32, y: i32, color: [u8; 3]);

    /// Small filled disc; used for the feet anchor marker.
    fn draw_marker(&self, frame: &mut Frame, x: i32, y: i32, radius: i32, color: [u8; 3]);
}

/// CPU renderer over the raw RGB8 buffer.
pub struct SoftwareRenderer;

impl SoftwareRenderer {
    pub fn new() -> Self {
        Self
    }

    fn blend_pixel(frame: &mut Frame, x: i32, y: i32, color: [u8; 3], alpha: f32) {
        if x < 0 || y < 0 || x >= frame.width as i32 || y >= frame.height as i32 {
            return;
        }
        let idx = ((y as u32 * frame.width + x as u32) * 3) as usize;
        for c in 0..3 {
            let old = f32::from(frame.data[idx + c]);
            let new = f32::from(color[c]);
            frame.data[idx + c] = (old * (1.0 - alpha) + new * alpha) as u8;
        }
    }

    fn set_pixel(frame: &mut Frame, x: i32, y: i32, color: [u8; 3]) {
        Self::blend_pixel(frame, x, y, color, 1.0);
    }

    fn draw_line(frame: &mut Frame, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 3]) {
        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x1, y1);
        loop {
            // 2px stroke so outlines stay visible at camera resolutions
            Self::set_pixel(frame, x, y, color);
            Self::set_pixel(frame, x + 1, y, color);
            Self::set_pixel(frame, x, y + 1, color);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn draw_glyph(frame: &mut Frame, ch: char, x: i32, y: i32, color: [u8; 3]) {
        let glyph = glyph_columns(ch);
        for (col, bits) in glyph.iter().enumerate() {
            for row in 0..7 {
                if bits & (1 << row) != 0 {
                    let px = x + col as i32;
                    let py = y + row;
                    Self::set_pixel(frame, px, py, color);
                }
            }
        }
    }
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for SoftwareRenderer {
    fn fill_polygon(&self, frame: &mut Frame, points: &[(f64, f64)], color: [u8; 3], alpha: f32) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min) as i32;
        let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max) as i32;
        let min_y = min_y.max(0);
        let max_y = max_y.min(frame.height as i32 - 1);

        // Even-odd scanline fill: collect edge crossings per row, sort, fill
        // between pairs.
        for y in min_y..=max_y {
            let scan = f64::from(y) + 0.5;
            let mut crossings: Vec<f64> = Vec::new();
            let n = points.len();
            for i in 0..n {
                let (x0, y0) = points[i];
                let (x1, y1) = points[(i + 1) % n];
                if (y0 > scan) != (y1 > scan) {
                    crossings.push(x0 + (scan - y0) / (y1 - y0) * (x1 - x0));
                }
            }
            crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            for pair in crossings.chunks_exact(2) {
                let start = pair[0].floor() as i32;
                let end = pair[1].ceil() as i32;
                for x in start..end {
                    Self::blend_pixel(frame, x, y, color, alpha);
                }
            }
        }
    }

    fn draw_outline(&self, frame: &mut Frame, points: &[(f64, f64)], color: [u8; 3]) {
        let n = points.len();
        for i in 0..n {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            Self::draw_line(frame, x0 as i32, y0 as i32, x1 as i32, y1 as i32, color);
        }
    }

    fn draw_label(&self, frame: &mut Frame, text: &str, x: i32, y: i32, color: [u8; 3]) {
        let width = (text.chars().count() as i32) * 6;
        self.draw_text(frame, text, x - width / 2, y - 3, color);
    }

    fn draw_box(&self, frame: &mut Frame, x1: i32, y1: i32, x2: i32, y2: i32, color: [u8; 3]) {
        Self::draw_line(frame, x1, y1, x2, y1, color);
        Self::draw_line(frame, x2, y1, x2, y2, color);
        Self::draw_line(frame, x2, y2, x1, y2, color);
        Self::draw_line(frame, x1, y2, x1, y1, color);
    }

    fn draw_text(&self, frame: &mut Frame, text: &str, x: i32, y: i32, color: [u8; 3]) {
        let mut cursor = x;
        for ch in text.chars() {
            Self::draw_glyph(frame, ch, cursor, y, color);
            cursor += 6;
        }
    }

    fn draw_marker(&self, frame: &mut Frame, x: i32, y: i32, radius: i32, color: [u8; 3]) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    Self::set_pixel(frame, x + dx, y + dy, color);
                }
            }
        }
    }
}

/// 5x7 column-major glyphs (bit 0 = top row). Lowercase maps to uppercase;
/// anything else renders as a filled block.
fn glyph_columns(ch: char) -> [u8; 5] {
    let ch = ch.to_ascii_uppercase();
    match ch {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x60, 0x60, 0x00, 0x00],
        ',' => [0x00, 0x50, 0x30, 0x00, 0x00],
        ':' => [0x00, 0x36, 0x36, 0x00, 0x00],
        '-' => [0x08, 0x08, 0x08, 0x08, 0x08],
        '_' => [0x40, 0x40, 0x40, 0x40, 0x40],
        '%' => [0x23, 0x13, 0x08, 0x64, 0x62],
        '/' => [0x20, 0x10, 0x08, 0x04, 0x02],
        '0' => [0x3E, 0x51, 0x49, 0x45, 0x3E],
        '1' => [0x00, 0x42, 0x7F, 0x40, 0x00],
        '2' => [0x42, 0x61, 0x51, 0x49, 0x46],
        '3' => [0x21, 0x41, 0x45, 0x4B, 0x31],
        '4' => [0x18, 0x14, 0x12, 0x7F, 0x10],
        '5' => [0x27, 0x45, 0x45, 0x45, 0x39],
        '6' => [0x3C, 0x4A, 0x49, 0x49, 0x30],
        '7' => [0x01, 0x71, 0x09, 0x05, 0x03],
        '8' => [0x36, 0x49, 0x49, 0x49, 0x36],
        '9' => [0x06, 0x49, 0x49, 0x29, 0x1E],
        'A' => [0x7E, 0x11, 0x11, 0x11, 0x7E],
        'B' => [0x7F, 0x49, 0x49, 0x49, 0x36],
        'C' => [0x3E, 0x41, 0x41, 0x41, 0x22],
        'D' => [0x7F, 0x41, 0x41, 0x22, 0x1C],
        'E' => [0x7F, 0x49, 0x49, 0x49, 0x41],
        'F' => [0x7F, 0x09, 0x09, 0x09, 0x01],
        'G' => [0x3E, 0x41, 0x49, 0x49, 0x7A],
        'H' => [0x7F, 0x08, 0x08, 0x08, 0x7F],
        'I' => [0x00, 0x41, 0x7F, 0x41, 0x00],
        'J' => [0x20, 0x40, 0x41, 0x3F, 0x01],
        'K' => [0x7F, 0x08, 0x14, 0x22, 0x41],
        'L' => [0x7F, 0x40, 0x40, 0x40, 0x40],
        'M' => [0x7F, 0x02, 0x0C, 0x02, 0x7F],
        'N' => [0x7F, 0x04, 0x08, 0x10, 0x7F],
        'O' => [0x3E, 0x41, 0x41, 0x41, 0x3E],
        'P' => [0x7F, 0x09, 0x09, 0x09, 0x06],
        'Q' => [0x3E, 0x41, 0x51, 0x21, 0x5E],
        'R' => [0x7F, 0x09, 0x19, 0x29, 0x46],
        'S' => [0x46, 0x49, 0x49, 0x49, 0x31],
        'T' => [0x01, 0x01, 0x7F, 0x01, 0x01],
        'U' => [0x3F, 0x40, 0x40, 0x40, 0x3F],
        'V' => [0x1F, 0x20, 0x40, 0x20, 0x1F],
        'W' => [0x3F, 0x40, 0x38, 0x40, 0x3F],
        'X' => [0x63, 0x14, 0x08, 0x14, 0x63],
        'Y' => [0x07, 0x08, 0x70, 0x08, 0x07],
        'Z' => [0x61, 0x51, 0x49, 0x45, 0x43],
        _ => [0x7F, 0x7F, 0x7F, 0x7F, 0x7F],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![0; (width * height * 3) as usize], width, height, 0, 0)
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * frame.width + x) * 3) as usize;
        [frame.data[idx], frame.data[idx + 1], frame.data[idx + 2]]
    }

    #[test]
    fn fill_blends_interior_pixels_only() {
        let renderer = SoftwareRenderer::new();
        let mut frame = blank_frame(40, 40);
        let square = [(5.0, 5.0), (5.0, 20.0), (20.0, 20.0), (20.0, 5.0)];
        renderer.fill_polygon(&mut frame, &square, [200, 0, 0], 0.5);

        assert_eq!(pixel(&frame, 10, 10), [100, 0, 0]);
        assert_eq!(pixel(&frame, 30, 30), [0, 0, 0]);
    }

    #[test]
    fn box_outline_touches_corners() {
        let renderer = SoftwareRenderer::new();
        let mut frame = blank_frame(40, 40);
        renderer.draw_box(&mut frame, 2, 2, 30, 30, [0, 255, 0]);
        assert_eq!(pixel(&frame, 2, 2), [0, 255, 0]);
        assert_eq!(pixel(&frame, 30, 30), [0, 255, 0]);
        assert_eq!(pixel(&frame, 15, 15), [0, 0, 0]);
    }

    #[test]
    fn marker_fills_disc() {
        let renderer = SoftwareRenderer::new();
        let mut frame = blank_frame(20, 20);
        renderer.draw_marker(&mut frame, 10, 10, 3, [0, 255, 255]);
        assert_eq!(pixel(&frame, 10, 10), [0, 255, 255]);
        assert_eq!(pixel(&frame, 10, 13), [0, 255, 255]);
        assert_eq!(pixel(&frame, 16, 16), [0, 0, 0]);
    }

    #[test]
    fn text_renders_some_ink() {
        let renderer = SoftwareRenderer::new();
        let mut frame = blank_frame(80, 20);
        renderer.draw_text(&mut frame, "FPS: 12.5", 2, 2, [255, 255, 255]);
        assert!(frame.data.iter().any(|&b| b != 0));
    }
}
