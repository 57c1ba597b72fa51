//! Polygon outline stroke drawn over the whole frame.
//!
//! The closed ring through the request's vertices is stroked two pixels
//! wide in solid green. Segments are clipped to a small band around the
//! frame before line drawing, so distant vertices cost nothing extra.

use image::Rgb;
use imageproc::drawing::draw_line_segment_mut;

use crate::types::{Point, Polygon, RgbImage};

/// Stroke colour.
pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Stroke width in pixels.
pub const OUTLINE_THICKNESS: u8 = 2;

/// Clip window for strokes, as `(x_min, y_min, x_max, y_max)`.
type Window = (f64, f64, f64, f64);

/// Liang-Barsky clip of segment `a -> b` to `window`. `None` when the
/// segment misses it.
fn clip_segment(a: Point, b: Point, window: Window) -> Option<((f64, f64), (f64, f64))> {
    let (x0, y0) = (f64::from(a.x), f64::from(a.y));
    let (dx, dy) = (f64::from(b.x) - x0, f64::from(b.y) - y0);
    let (x_min, y_min, x_max, y_max) = window;

    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-dx, x0 - x_min),
        (dx, x_max - x0),
        (-dy, y0 - y_min),
        (dy, y_max - y0),
    ] {
        if p.abs() < f64::EPSILON {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }
    Some((
        (t0.mul_add(dx, x0), t0.mul_add(dy, y0)),
        (t1.mul_add(dx, x0), t1.mul_add(dy, y0)),
    ))
}

/// Draw the closed outline of `polygon` onto a copy of `image`.
///
/// A single vertex marks a dot of the stroke width. An empty polygon
/// leaves the frame as it is.
#[must_use = "returns the outlined image"]
#[allow(clippy::cast_possible_truncation)]
pub fn draw_outline(image: &RgbImage, polygon: &Polygon) -> RgbImage {
    let mut out = image.clone();
    let points = polygon.points();
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return out;
    };

    let margin = f64::from(OUTLINE_THICKNESS);
    let window = (
        -margin,
        -margin,
        f64::from(image.width()) + margin,
        f64::from(image.height()) + margin,
    );

    let closing = std::iter::once((last, first));
    let segments = points.windows(2).map(|w| (w[0], w[1])).chain(closing);
    for (a, b) in segments {
        let Some((start, end)) = clip_segment(a, b, window) else {
            continue;
        };
        for oy in 0..OUTLINE_THICKNESS {
            for ox in 0..OUTLINE_THICKNESS {
                let (ox, oy) = (f64::from(ox), f64::from(oy));
                draw_line_segment_mut(
                    &mut out,
                    ((start.0 + ox).round() as f32, (start.1 + oy).round() as f32),
                    ((end.0 + ox).round() as f32, (end.1 + oy).round() as f32),
                    OUTLINE_COLOR,
                );
            }
        }
    }
    out
}
