//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use regionfx_pipeline::{Effect, Pipeline, PipelineError, Request};
//! # fn run(png: Vec<u8>) -> Result<Vec<u8>, PipelineError> {
//! let request = Request::whole(Effect::SepiaWhole);
//! let composited = Pipeline::new(png, request)
//!     .decode()?
//!     .build_mask()?
//!     .transform()?
//!     .composite()?;
//! let format = composited.format();
//! composited.encode(format)
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying the source bytes and the decoded original along. Storing the
//! encoded bytes is left to the caller (see `regionfx-io`), which is what
//! the [`Stage::Stored`] and [`Stage::Done`] states describe.

use std::fmt;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::composite::{CompositeMode, composite};
use crate::effect::{Rendered, Scope, invoke};
use crate::mask::{Mask, rasterize};
use crate::request::Request;
use crate::types::{PipelineError, RgbImage};

/// Named states of a request, from receipt to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    Loaded,
    MaskBuilt,
    Transformed,
    Composited,
    Stored,
    Done,
}

impl Stage {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Loaded => "loaded",
            Self::MaskBuilt => "mask-built",
            Self::Transformed => "transformed",
            Self::Composited => "composited",
            Self::Stored => "stored",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Implemented by every typed stage so callers can report progress
/// without matching on the concrete type.
pub trait PipelineStage {
    /// The state this stage represents.
    const STAGE: Stage;
}

// ───────────────────────── Building blocks ───────────────────────────

/// Rasterize the request's region, or `None` for whole-frame and outline
/// effects.
pub(crate) fn region_mask(
    request: &Request,
    width: u32,
    height: u32,
) -> Result<Option<Mask>, PipelineError> {
    match request.effect.scope() {
        Scope::Whole | Scope::Outline => Ok(None),
        Scope::Masked | Scope::Segment => rasterize(width, height, &request.polygon).map(Some),
    }
}

/// Run the effect, or `None` when the request is a no-op: a region effect
/// with an empty region, or an outline with no vertices.
pub(crate) fn render(
    request: &Request,
    image: &RgbImage,
    mask: Option<&Mask>,
) -> Result<Option<Rendered>, PipelineError> {
    let polygon = &request.polygon;
    match mask {
        Some(mask) if mask.is_empty() => Ok(None),
        Some(mask) => invoke(&request.effect, image, mask, polygon).map(Some),
        None if request.effect.scope() == Scope::Outline && polygon.is_empty() => Ok(None),
        None => {
            let full = Mask::full(image.width(), image.height());
            invoke(&request.effect, image, &full, polygon).map(Some)
        }
    }
}

/// Merge a rendered effect into the original.
pub(crate) fn merge(
    original: &RgbImage,
    rendered: Option<&Rendered>,
    mask: Option<&Mask>,
    mode: CompositeMode,
) -> Result<RgbImage, PipelineError> {
    match (rendered, mask) {
        (None, _) => Ok(original.clone()),
        (Some(Rendered::Frame(frame)), None) => {
            if frame.dimensions() == original.dimensions() {
                Ok(frame.clone())
            } else {
                Err(PipelineError::InternalInvariantViolation(format!(
                    "effect produced {:?} from {:?}",
                    frame.dimensions(),
                    original.dimensions()
                )))
            }
        }
        (Some(Rendered::Frame(frame)), Some(mask)) => composite(original, frame, mask, mode),
        (Some(Rendered::Segmented { fill, foreground }), _) => {
            composite(original, fill, foreground, mode)
        }
    }
}

/// Encode `image` as `format`.
///
/// # Errors
///
/// Returns [`PipelineError::StorageFailed`] if the encoder rejects the
/// image or the format cannot be written.
pub fn encode(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| PipelineError::StorageFailed(format!("failed to encode {format:?}: {e}")))?;
    Ok(buf)
}

/// Pick the output encoding: the decoded format if it can be written,
/// else `hint` (usually derived from the file extension) if that can be
/// written, else PNG.
#[must_use]
pub fn output_format(detected: ImageFormat, hint: Option<ImageFormat>) -> ImageFormat {
    if detected.writing_enabled() {
        return detected;
    }
    match hint {
        Some(hint) if hint.writing_enabled() => hint,
        _ => ImageFormat::Png,
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    request: Request,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageNotFound`] if the bytes are empty,
    /// unrecognized or corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let (image, format) = crate::grayscale::decode(&self.source)?;
        Ok(Decoded {
            request: self.request,
            source: self.source,
            original: crate::grayscale::to_rgb(&image),
            format,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding: the original RGB frame and the format
/// it was stored in.
#[must_use = "pipeline stages are consumed by advancing; call .build_mask() to continue"]
pub struct Decoded {
    request: Request,
    source: Vec<u8>,
    original: RgbImage,
    format: ImageFormat,
}

impl Decoded {
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    #[must_use]
    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    /// Rasterize the request's polygon. Whole-frame effects skip this
    /// step and carry no mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameters`] if the polygon has one
    /// or two vertices.
    pub fn build_mask(self) -> Result<MaskBuilt, PipelineError> {
        let mask = region_mask(&self.request, self.original.width(), self.original.height())?;
        Ok(MaskBuilt {
            request: self.request,
            source: self.source,
            original: self.original,
            format: self.format,
            mask,
        })
    }
}

// ───────────────────────── Stage 2: MaskBuilt ────────────────────────

/// Pipeline state after rasterizing the region.
#[must_use = "pipeline stages are consumed by advancing; call .transform() to continue"]
pub struct MaskBuilt {
    request: Request,
    source: Vec<u8>,
    original: RgbImage,
    format: ImageFormat,
    mask: Option<Mask>,
}

impl MaskBuilt {
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// The rasterized region, `None` for whole-frame effects.
    #[must_use]
    pub const fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    /// Run the effect over the whole frame.
    ///
    /// A region effect whose region is empty does nothing here, and the
    /// request as a whole becomes a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TransformFailed`] if a primitive rejects
    /// its parameters.
    pub fn transform(self) -> Result<Transformed, PipelineError> {
        let rendered = render(&self.request, &self.original, self.mask.as_ref())?;
        Ok(Transformed {
            request: self.request,
            source: self.source,
            original: self.original,
            format: self.format,
            mask: self.mask,
            rendered,
        })
    }
}

// ───────────────────────── Stage 3: Transformed ──────────────────────

/// Pipeline state after the effect has run.
#[must_use = "pipeline stages are consumed by advancing; call .composite() to continue"]
pub struct Transformed {
    request: Request,
    source: Vec<u8>,
    original: RgbImage,
    format: ImageFormat,
    mask: Option<Mask>,
    rendered: Option<Rendered>,
}

impl Transformed {
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// The effect's full-frame output; `None` when the request is a
    /// no-op.
    #[must_use]
    pub const fn rendered(&self) -> Option<&Rendered> {
        self.rendered.as_ref()
    }

    /// Merge the effect output into the original.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InternalInvariantViolation`] if the mask
    /// or effect output does not match the original's size.
    pub fn composite(self) -> Result<Composited, PipelineError> {
        let output = merge(
            &self.original,
            self.rendered.as_ref(),
            self.mask.as_ref(),
            self.request.effect.composite_mode(),
        )?;
        Ok(Composited {
            source: self.source,
            format: self.format,
            changed: self.rendered.is_some(),
            output,
        })
    }
}

// ───────────────────────── Stage 4: Composited ───────────────────────

/// Pipeline state holding the final frame, ready to be encoded.
#[must_use = "call .encode() to obtain the output bytes"]
pub struct Composited {
    source: Vec<u8>,
    format: ImageFormat,
    changed: bool,
    output: RgbImage,
}

impl Composited {
    #[must_use]
    pub const fn output(&self) -> &RgbImage {
        &self.output
    }

    /// The format the source was decoded from.
    #[must_use]
    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    /// Whether any pixel work was done. `false` for no-op requests.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.changed
    }

    /// Encode the output as `format`.
    ///
    /// A no-op request encoded in its source format returns the source
    /// bytes unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StorageFailed`] if encoding fails.
    pub fn encode(self, format: ImageFormat) -> Result<Vec<u8>, PipelineError> {
        if !self.changed && format == self.format {
            return Ok(self.source);
        }
        encode(&self.output, format)
    }
}

impl PipelineStage for Pending {
    const STAGE: Stage = Stage::Start;
}

impl PipelineStage for Decoded {
    const STAGE: Stage = Stage::Loaded;
}

impl PipelineStage for MaskBuilt {
    const STAGE: Stage = Stage::MaskBuilt;
}

impl PipelineStage for Transformed {
    const STAGE: Stage = Stage::Transformed;
}

impl PipelineStage for Composited {
    const STAGE: Stage = Stage::Composited;
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental region-effect pipeline.
///
/// Created via [`Pipeline::new`], which stores the source bytes and the
/// request without doing any processing. Each stage method consumes the
/// current state and returns the next, so stages cannot be skipped or
/// reordered.
pub struct Pipeline;

impl Pipeline {
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, request: Request) -> Pending {
        Pending {
            request,
            source: image_bytes,
        }
    }

    /// Run every stage and return the encoded output in the source
    /// format (or its fallback).
    ///
    /// # Errors
    ///
    /// Returns the first stage error.
    pub fn run(
        image_bytes: Vec<u8>,
        request: Request,
        format_hint: Option<ImageFormat>,
    ) -> Result<Vec<u8>, PipelineError> {
        let composited = Self::new(image_bytes, request)
            .decode()?
            .build_mask()?
            .transform()?
            .composite()?;
        let format = output_format(composited.format(), format_hint);
        composited.encode(format)
    }
}
