//! Shared types for the regionfx pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can reference decoded
/// frames without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `GrayImage` for single-channel intermediates.
pub use image::GrayImage;

/// A polygon vertex in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f32,
    /// Vertical position (pixels from top edge).
    pub y: f32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An implicitly closed polygon: the last vertex connects back to the
/// first, and insertion order defines the edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Minimum vertex count for a polygon that encloses an area.
    pub const MIN_VERTICES: usize = 3;

    /// Create a polygon from a vector of vertices.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Parse the wire format: a flat `[x0, y0, x1, y1, ...]` list.
    ///
    /// An empty slice yields an empty polygon.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameters`] if the list has odd
    /// length or contains a non-finite coordinate.
    pub fn from_flat(coords: &[f32]) -> Result<Self, PipelineError> {
        if coords.len() % 2 != 0 {
            return Err(PipelineError::InvalidParameters(format!(
                "coordinate list has odd length {}",
                coords.len()
            )));
        }
        if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
            return Err(PipelineError::InvalidParameters(format!(
                "non-finite coordinate {bad}"
            )));
        }
        Ok(Self(
            coords
                .chunks_exact(2)
                .map(|pair| Point::new(pair[0], pair[1]))
                .collect(),
        ))
    }

    /// Returns `true` if the polygon has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// An odd filter aperture, always `2k + 1` for some radius `k`.
///
/// The only constructor is [`KernelSize::from_radius`], so every value
/// in circulation is odd and at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct KernelSize(u32);

impl KernelSize {
    /// The minimal aperture, produced by radius 0. Filters treat it as
    /// the identity.
    pub const MIN: Self = Self(1);

    /// Normalize a non-negative radius `k` into the aperture `2k + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameters`] if `2k + 1` does not
    /// fit in a `u32`.
    pub fn from_radius(radius: u32) -> Result<Self, PipelineError> {
        radius
            .checked_mul(2)
            .and_then(|d| d.checked_add(1))
            .map(Self)
            .ok_or_else(|| {
                PipelineError::InvalidParameters(format!("kernel radius {radius} is too large"))
            })
    }

    /// The aperture width in pixels.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The radius `k` this aperture was built from.
    #[must_use]
    pub const fn radius(self) -> u32 {
        self.0 / 2
    }

    /// Gaussian sigma matching the aperture, using the conventional
    /// `0.3 * ((ksize - 1) / 2 - 1) + 0.8` rule.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sigma(self) -> f32 {
        let half = (self.0 - 1) as f32 * 0.5;
        0.3f32.mul_add(half - 1.0, 0.8)
    }
}

impl TryFrom<u32> for KernelSize {
    type Error = PipelineError;

    fn try_from(size: u32) -> Result<Self, Self::Error> {
        if size % 2 == 1 {
            Ok(Self(size))
        } else {
            Err(PipelineError::InvalidParameters(format!(
                "kernel size {size} is not odd"
            )))
        }
    }
}

impl From<KernelSize> for u32 {
    fn from(size: KernelSize) -> Self {
        size.0
    }
}

/// Numeric options supplied alongside an effect identifier.
///
/// Which options are required depends on the effect; options an effect
/// does not use are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectParams {
    /// Convergence depth for iterative segmentation.
    pub iterations: Option<u32>,
    /// Radius `k` of the filter aperture; the aperture is `2k + 1`.
    pub kernel_radius: Option<u32>,
}

impl EffectParams {
    /// Parameters carrying only an iteration budget.
    #[must_use]
    pub const fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: Some(iterations),
            kernel_radius: None,
        }
    }

    /// Parameters carrying only a kernel radius.
    #[must_use]
    pub const fn with_kernel_radius(radius: u32) -> Self {
        Self {
            iterations: None,
            kernel_radius: Some(radius),
        }
    }
}

/// Errors that can occur while processing a request.
///
/// Every variant is terminal for the invocation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The source could not be opened or decoded.
    #[error("could not open or find the image: {0}")]
    ImageNotFound(String),

    /// Numeric or geometric input was missing or malformed.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The effect identifier is not registered.
    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    /// A vision primitive rejected its input.
    #[error("transform failed: {0}")]
    TransformFailed(String),

    /// The result could not be encoded or written.
    #[error("failed to store image: {0}")]
    StorageFailed(String),

    /// An internal consistency check failed, e.g. a mask whose size
    /// differs from the image it is composited against.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}

impl PipelineError {
    /// Status code reported across the foreign-function boundary.
    ///
    /// `0` is reserved for success. `1` keeps its legacy meaning of
    /// "image not found".
    #[must_use]
    pub const fn status_code(&self) -> i32 {
        match self {
            Self::ImageNotFound(_) => 1,
            Self::InvalidParameters(_) => 2,
            Self::UnknownEffect(_) => 3,
            Self::TransformFailed(_) => 4,
            Self::StorageFailed(_) => 5,
            Self::InternalInvariantViolation(_) => 6,
        }
    }
}
