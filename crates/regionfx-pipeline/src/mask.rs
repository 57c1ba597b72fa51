//! Region-of-interest masks rasterized from user polygons.
//!
//! A [`Mask`] is a single-channel image the size of the frame in which
//! every cell is either [`INSIDE`] (255) or [`OUTSIDE`] (0). Masks are
//! built fresh for each request and dropped after compositing.
//!
//! Vertices name pixel centres on the integer lattice and boundary pixels
//! count as inside, so the polygon `(0,0) (w-1,0) (w-1,h-1) (0,h-1)` covers
//! the whole frame.

use image::Luma;
use imageproc::drawing::draw_polygon_mut;

use crate::types::{Dimensions, GrayImage, PipelineError, Polygon};

/// Mask value for pixels inside the region.
pub const INSIDE: u8 = 255;

/// Mask value for pixels outside the region.
pub const OUTSIDE: u8 = 0;

/// Binary per-pixel region indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    /// A mask with every pixel outside.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([OUTSIDE])))
    }

    /// A mask with every pixel inside.
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([INSIDE])))
    }

    /// Build a mask from a per-pixel predicate.
    pub fn from_fn(width: u32, height: u32, mut inside: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if inside(x, y) { INSIDE } else { OUTSIDE }])
        }))
    }

    /// Whether pixel `(x, y)` is inside the region.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn is_inside(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[0] == INSIDE
    }

    /// The complementary mask: inside becomes outside and vice versa.
    #[must_use = "returns the inverted mask"]
    pub fn inverted(&self) -> Self {
        let mut out = self.0.clone();
        for p in out.pixels_mut() {
            p.0[0] = if p.0[0] == INSIDE { OUTSIDE } else { INSIDE };
        }
        Self(out)
    }

    /// Returns `true` if no pixel is inside.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.as_raw().iter().all(|&v| v == OUTSIDE)
    }

    /// Number of pixels inside the region.
    #[must_use]
    pub fn count_inside(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v == INSIDE).count()
    }

    /// Mask dimensions in pixels.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }

    /// Row-major mask values, one byte per pixel.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    /// The mask as a grayscale image (0 / 255).
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }
}

/// One side of the clip window, with its coordinate.
#[derive(Debug, Clone, Copy)]
enum ClipEdge {
    Left(f64),
    Right(f64),
    Top(f64),
    Bottom(f64),
}

impl ClipEdge {
    fn contains(self, (x, y): (f64, f64)) -> bool {
        match self {
            Self::Left(v) => x >= v,
            Self::Right(v) => x <= v,
            Self::Top(v) => y >= v,
            Self::Bottom(v) => y <= v,
        }
    }

    /// Where segment `a -> b` crosses this edge. Only called when exactly
    /// one endpoint is contained.
    fn crossing(self, a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
        match self {
            Self::Left(v) | Self::Right(v) => {
                let t = (v - a.0) / (b.0 - a.0);
                (v, t.mul_add(b.1 - a.1, a.1))
            }
            Self::Top(v) | Self::Bottom(v) => {
                let t = (v - a.1) / (b.1 - a.1);
                (t.mul_add(b.0 - a.0, a.0), v)
            }
        }
    }
}

/// One Sutherland-Hodgman pass: keep the part of `ring` on the inner side
/// of `edge`.
fn clip_ring(ring: &[(f64, f64)], edge: ClipEdge) -> Vec<(f64, f64)> {
    let Some(&last) = ring.last() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(ring.len() + 2);
    let mut prev = last;
    for &cur in ring {
        match (edge.contains(prev), edge.contains(cur)) {
            (true, true) => out.push(cur),
            (true, false) => out.push(edge.crossing(prev, cur)),
            (false, true) => {
                out.push(edge.crossing(prev, cur));
                out.push(cur);
            }
            (false, false) => {}
        }
        prev = cur;
    }
    out
}

/// Rasterize `polygon` into a mask of `width` x `height` pixels.
///
/// An empty polygon produces an all-outside mask. Vertices beyond the
/// frame are accepted: after rounding, the ring is clipped to a one-pixel
/// band around the frame, so the fill only ever walks on-frame rows and
/// columns however far away a vertex lies.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameters`] if the polygon has one
/// or two vertices, which cannot enclose an area.
#[allow(clippy::cast_possible_truncation)]
pub fn rasterize(width: u32, height: u32, polygon: &Polygon) -> Result<Mask, PipelineError> {
    if polygon.is_empty() {
        return Ok(Mask::empty(width, height));
    }
    if polygon.len() < Polygon::MIN_VERTICES {
        return Err(PipelineError::InvalidParameters(format!(
            "polygon needs at least {} vertices, got {}",
            Polygon::MIN_VERTICES,
            polygon.len()
        )));
    }

    let mut mask = Mask::empty(width, height);
    if width == 0 || height == 0 {
        return Ok(mask);
    }

    let mut ring: Vec<(f64, f64)> = polygon
        .points()
        .iter()
        .map(|p| (f64::from(p.x.round()), f64::from(p.y.round())))
        .collect();
    for edge in [
        ClipEdge::Left(-1.0),
        ClipEdge::Right(f64::from(width)),
        ClipEdge::Top(-1.0),
        ClipEdge::Bottom(f64::from(height)),
    ] {
        ring = clip_ring(&ring, edge);
    }

    let mut vertices: Vec<imageproc::point::Point<i32>> = ring
        .iter()
        .map(|&(x, y)| imageproc::point::Point::new(x.round() as i32, y.round() as i32))
        .collect();
    vertices.dedup();

    // The fill closes the ring itself and rejects an explicit closing vertex.
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    match vertices.as_slice() {
        [] => {}
        [only] => {
            if let (Ok(x), Ok(y)) = (u32::try_from(only.x), u32::try_from(only.y))
                && x < width
                && y < height
            {
                mask.0.put_pixel(x, y, Luma([INSIDE]));
            }
        }
        _ => draw_polygon_mut(&mut mask.0, &vertices, Luma([INSIDE])),
    }
    Ok(mask)
}
