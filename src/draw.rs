use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};

use crate::color::Bgr;

// rendering constants
const BOX_THICKNESS: u32 = 2;
const LABEL_FONT_SCALE: f32 = 0.5;
const LABEL_THICKNESS: u32 = 2;
const LABEL_OFFSET_Y: i32 = 10; // baseline distance above the box

/// Glyph cell height in font units, measured from the cap line to the baseline.
const GLYPH_HEIGHT: f32 = 21.0;
/// Horizontal advance per glyph in font units.
const GLYPH_ADVANCE: f32 = 20.0;

type Stroke = &'static [(u8, u8)];

/// Single-stroke Hershey simplex digits, the face OpenCV's
/// `FONT_HERSHEY_SIMPLEX` draws, so labels keep that stroke look.
/// `x` to the right, `y` down from the cap line, baseline at `y = 21`.
const DIGIT_GLYPHS: [&[Stroke]; 10] = [
    &[&[
        (9, 0), (6, 1), (4, 4), (3, 9), (3, 12), (4, 17), (6, 20), (9, 21), (11, 21),
        (14, 20), (16, 17), (17, 12), (17, 9), (16, 4), (14, 1), (11, 0), (9, 0),
    ]],
    &[&[(6, 4), (8, 3), (11, 0), (11, 21)]],
    &[&[
        (4, 5), (4, 4), (5, 2), (6, 1), (8, 0), (12, 0), (14, 1), (15, 2), (16, 4), (16, 6),
        (15, 8), (13, 11), (3, 21), (17, 21),
    ]],
    &[&[
        (5, 0), (16, 0), (10, 8), (13, 8), (15, 9), (16, 10), (17, 13), (17, 15), (16, 18),
        (14, 20), (11, 21), (8, 21), (5, 20), (4, 19), (3, 17),
    ]],
    &[&[(13, 0), (3, 14), (18, 14)], &[(13, 0), (13, 21)]],
    &[&[
        (15, 0), (5, 0), (4, 9), (5, 8), (8, 7), (11, 7), (14, 8), (16, 10), (17, 13),
        (17, 15), (16, 18), (14, 20), (11, 21), (8, 21), (5, 20), (4, 19), (3, 17),
    ]],
    &[&[
        (16, 3), (15, 1), (12, 0), (10, 0), (7, 1), (5, 4), (4, 9), (4, 14), (5, 18), (7, 20),
        (10, 21), (11, 21), (14, 20), (16, 18), (17, 15), (17, 14), (16, 11), (14, 9),
        (11, 8), (10, 8), (7, 9), (5, 11), (4, 14),
    ]],
    &[&[(17, 0), (7, 21)], &[(3, 0), (17, 0)]],
    &[&[
        (8, 0), (5, 1), (4, 3), (4, 5), (5, 7), (7, 8), (11, 9), (14, 10), (16, 12), (17, 14),
        (17, 17), (16, 19), (15, 20), (12, 21), (8, 21), (5, 20), (4, 19), (3, 17), (3, 14),
        (4, 12), (6, 10), (9, 9), (13, 8), (15, 7), (16, 5), (16, 3), (15, 1), (12, 0), (8, 0),
    ]],
    &[&[
        (16, 7), (15, 10), (13, 12), (10, 13), (9, 13), (6, 12), (4, 10), (3, 7), (3, 6),
        (4, 3), (6, 1), (9, 0), (10, 0), (13, 1), (15, 3), (16, 7), (16, 12), (15, 17),
        (13, 20), (10, 21), (8, 21), (5, 20), (4, 18),
    ]],
];

/// Box and label rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw {
    pub box_thickness: u32,
    pub font_scale: f32,
    pub label_thickness: u32,
    pub label_offset_y: i32,
}

impl Default for Draw {
    fn default() -> Self {
        Self {
            box_thickness: BOX_THICKNESS,
            font_scale: LABEL_FONT_SCALE,
            label_thickness: LABEL_THICKNESS,
            label_offset_y: LABEL_OFFSET_Y,
        }
    }
}

impl Draw {
    /// Outline between two inclusive corners, thickened inward.
    ///
    /// Parts outside the image are clipped. Corners are first pulled in to
    /// `box_thickness` pixels beyond the canvas, which leaves the visible
    /// result unchanged.
    pub fn rectangle(&self, image: &mut RgbImage, (x1, y1): (i32, i32), (x2, y2): (i32, i32), color: Bgr) {
        let margin = i64::from(self.box_thickness);
        let (max_x, max_y) = (
            i64::from(image.width()) - 1 + margin,
            i64::from(image.height()) - 1 + margin,
        );
        let clamp = |v: i32, max: i64| i64::from(v).clamp(-margin, max);

        let (left, right) = (clamp(x1.min(x2), max_x), clamp(x1.max(x2), max_x));
        let (top, bottom) = (clamp(y1.min(y2), max_y), clamp(y1.max(y2), max_y));

        for t in 0..margin {
            let width = right - left + 1 - 2 * t;
            let height = bottom - top + 1 - 2 * t;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at((left + t) as i32, (top + t) as i32).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, Rgb(color));
        }
    }

    /// Label text with its baseline `label_offset_y` pixels above `(x, y)`.
    pub fn label(&self, image: &mut RgbImage, (x, y): (i32, i32), text: &str, color: Bgr) {
        self.text(image, (x, y.saturating_sub(self.label_offset_y)), text, color);
    }

    /// Renders digits with the stroke font; `origin` is the bottom-left of the
    /// text baseline. Characters without a glyph only advance the pen, and
    /// glyphs whose cell misses the canvas are skipped.
    pub fn text(&self, image: &mut RgbImage, origin: (i32, i32), text: &str, color: Bgr) {
        let scale = self.font_scale;
        let baseline = origin.1 as f32;
        let mut pen_x = origin.0 as f32;

        let stroke = self.label_thickness.max(1) as f32;
        let (canvas_w, canvas_h) = (image.width() as f32, image.height() as f32);
        let cell_top = baseline - GLYPH_HEIGHT * scale;
        let rows_visible = baseline + stroke >= 0.0 && cell_top < canvas_h;

        for ch in text.chars() {
            let cell_visible =
                rows_visible && pen_x + GLYPH_ADVANCE * scale + stroke >= 0.0 && pen_x < canvas_w;
            if let Some(digit) = ch.to_digit(10).filter(|_| cell_visible) {
                for stroke in DIGIT_GLYPHS[digit as usize] {
                    for segment in stroke.windows(2) {
                        let to_pixel = |(gx, gy): (u8, u8)| {
                            (
                                pen_x + f32::from(gx) * scale,
                                baseline - (GLYPH_HEIGHT - f32::from(gy)) * scale,
                            )
                        };
                        self.thick_segment(image, to_pixel(segment[0]), to_pixel(segment[1]), color);
                    }
                }
            }
            pen_x += GLYPH_ADVANCE * scale;
        }
    }

    fn thick_segment(&self, image: &mut RgbImage, start: (f32, f32), end: (f32, f32), color: Bgr) {
        for dy in 0..self.label_thickness.max(1) {
            for dx in 0..self.label_thickness.max(1) {
                let (dx, dy) = (dx as f32, dy as f32);
                draw_line_segment_mut(
                    image,
                    (start.0 + dx, start.1 + dy),
                    (end.0 + dx, end.1 + dy),
                    Rgb(color),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Bgr = [0, 0, 255];

    #[test]
    fn test_rectangle_is_two_pixels_wide() {
        let mut image = RgbImage::new(64, 64);
        Draw::default().rectangle(&mut image, (10, 10), (50, 50), RED);

        for (x, y) in [(10, 10), (11, 11), (50, 50), (49, 49), (30, 10), (30, 11), (10, 30), (50, 30)] {
            assert_eq!(image.get_pixel(x, y).0, RED, "border pixel ({x}, {y})");
        }
        for (x, y) in [(12, 12), (30, 30), (9, 9), (51, 51), (30, 12)] {
            assert_eq!(image.get_pixel(x, y).0, [0, 0, 0], "non-border pixel ({x}, {y})");
        }
    }

    #[test]
    fn test_degenerate_and_out_of_bounds_rectangles_do_not_panic() {
        let mut image = RgbImage::new(32, 32);
        let draw = Draw::default();
        draw.rectangle(&mut image, (5, 5), (5, 5), RED);
        assert_eq!(image.get_pixel(5, 5).0, RED);

        draw.rectangle(&mut image, (-20, -20), (100, 100), RED);
        draw.rectangle(&mut image, (40, 40), (90, 90), RED);
        draw.rectangle(&mut image, (20, 20), (10, 10), RED);
        assert_eq!(image.get_pixel(10, 15).0, RED);
    }

    #[test]
    fn test_rectangle_spanning_the_whole_coordinate_range() {
        let mut image = RgbImage::new(32, 32);
        let draw = Draw::default();
        draw.rectangle(&mut image, (i32::MIN, i32::MIN), (i32::MAX, i32::MAX), RED);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));

        draw.rectangle(&mut image, (i32::MIN, 10), (20, i32::MAX), RED);
        assert_eq!(image.get_pixel(0, 10).0, RED);
        assert_eq!(image.get_pixel(20, 31).0, RED);
        assert_eq!(image.get_pixel(19, 20).0, RED);
        assert_eq!(image.get_pixel(10, 20).0, [0, 0, 0]);
    }

    #[test]
    fn test_label_at_extreme_anchor() {
        let mut image = RgbImage::new(32, 32);
        let draw = Draw::default();
        draw.label(&mut image, (i32::MIN, i32::MIN), "12", RED);
        draw.label(&mut image, (i32::MAX, i32::MAX), "34", RED);
        draw.label(&mut image, (i32::MIN, 20), "4294967295", RED);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_label_is_drawn_above_the_anchor() {
        let mut image = RgbImage::new(100, 100);
        Draw::default().label(&mut image, (20, 60), "1", RED);

        let painted: Vec<(u32, u32)> = image
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 == RED)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!painted.is_empty());
        // baseline sits at y = 50, glyph is roughly 10.5 px tall, 2 px stroke
        assert!(painted.iter().all(|&(_, y)| (39..=51).contains(&y)));
        assert!(painted.iter().all(|&(x, _)| (20..=30).contains(&x)));
    }

    #[test]
    fn test_text_near_the_edge_is_clipped() {
        let mut image = RgbImage::new(16, 16);
        Draw::default().label(&mut image, (10, 0), "42", RED);
        Draw::default().text(&mut image, (-50, 200), "0123456789", RED);
    }

    #[test]
    fn test_every_digit_renders() {
        for digit in 0..10 {
            let mut image = RgbImage::new(20, 20);
            Draw::default().text(&mut image, (2, 15), &digit.to_string(), RED);
            assert!(image.pixels().any(|p| p.0 == RED), "digit {digit}");
        }
    }
}
