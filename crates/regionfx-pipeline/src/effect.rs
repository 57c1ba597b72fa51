//! Effect registry: identifiers, validated parameters and dispatch.
//!
//! Every effect is described by one row of [`REGISTRY`]: its stable
//! identifier, whether it is applied to the whole frame or through a
//! region, which numeric option it requires, and how its output is
//! merged back into the original. [`Effect::new`] validates a request's
//! options against that row; [`invoke`] runs the full-frame primitive.

use std::fmt;
use std::str::FromStr;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::composite::{CompositeMode, SegmentationFill};
use crate::mask::Mask;
use crate::types::{EffectParams, KernelSize, PipelineError, Polygon, RgbImage};

/// Largest accepted aperture radius. Wider apertures are rejected by the
/// primitives rather than allocating kernels larger than any image.
pub const MAX_KERNEL_RADIUS: u32 = 255;

/// Solid fill used by the segmentation effects.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Stable effect identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    GrayscaleWhole,
    MaskedGrayscale,
    MaskedGaussianBlur,
    MaskedEdgeDetect,
    MaskedEnhancedEdge,
    MaskedGradientMagnitude,
    SepiaWhole,
    VignetteWhole,
    SharpenWhole,
    EmbossWhole,
    CartoonWhole,
    SegmentWhiteBackground,
    SegmentWhiteForeground,
    PolygonOutline,
}

/// Where an effect's output lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Replaces the whole frame; no region is rasterized.
    Whole,
    /// Visible only inside the region.
    Masked,
    /// The region seeds a foreground/background segmentation.
    Segment,
    /// Drawn along the polygon's edges over the whole frame; no region
    /// is rasterized.
    Outline,
}

/// The numeric option an effect requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    None,
    KernelRadius,
    Iterations,
}

/// One registry row.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub kind: EffectKind,
    pub id: &'static str,
    pub scope: Scope,
    pub param: Param,
    pub composite: CompositeMode,
}

const fn entry(
    kind: EffectKind,
    id: &'static str,
    scope: Scope,
    param: Param,
    composite: CompositeMode,
) -> Entry {
    Entry {
        kind,
        id,
        scope,
        param,
        composite,
    }
}

/// All registered effects, in identifier order of the call surface.
pub static REGISTRY: [Entry; 14] = {
    use CompositeMode::{InvertedDual, MaskOnly, Segmentation};
    use EffectKind as K;
    use Param::{Iterations, KernelRadius};
    use Scope::{Masked, Outline, Segment, Whole};
    [
        entry(K::GrayscaleWhole, "grayscale-whole", Whole, Param::None, MaskOnly),
        entry(K::MaskedGrayscale, "masked-grayscale", Masked, Param::None, MaskOnly),
        entry(K::MaskedGaussianBlur, "masked-gaussian-blur", Masked, KernelRadius, MaskOnly),
        entry(K::MaskedEdgeDetect, "masked-edge-detect", Masked, KernelRadius, InvertedDual),
        entry(K::MaskedEnhancedEdge, "masked-enhanced-edge", Masked, KernelRadius, MaskOnly),
        entry(
            K::MaskedGradientMagnitude,
            "masked-gradient-magnitude",
            Masked,
            KernelRadius,
            MaskOnly,
        ),
        entry(K::SepiaWhole, "sepia-whole", Whole, Param::None, MaskOnly),
        entry(K::VignetteWhole, "vignette-whole", Whole, Param::None, MaskOnly),
        entry(K::SharpenWhole, "sharpen-whole", Whole, Param::None, MaskOnly),
        entry(K::EmbossWhole, "emboss-whole", Whole, Param::None, MaskOnly),
        entry(K::CartoonWhole, "cartoon-whole", Whole, Param::None, MaskOnly),
        entry(
            K::SegmentWhiteBackground,
            "segment-white-background",
            Segment,
            Iterations,
            Segmentation(SegmentationFill::WhiteBackground),
        ),
        entry(
            K::SegmentWhiteForeground,
            "segment-white-foreground",
            Segment,
            Iterations,
            Segmentation(SegmentationFill::WhiteForeground),
        ),
        entry(K::PolygonOutline, "polygon-outline", Outline, Param::None, MaskOnly),
    ]
};

impl EffectKind {
    /// Every effect kind, in registry order.
    #[must_use]
    pub fn all() -> impl Iterator<Item = Self> {
        REGISTRY.iter().map(|e| e.kind)
    }

    /// The registry row describing this kind.
    #[must_use]
    pub fn entry(self) -> &'static Entry {
        // The registry lists every kind exactly once, in declaration order.
        &REGISTRY[self as usize]
    }

    /// Stable kebab-case identifier.
    #[must_use]
    pub fn id(self) -> &'static str {
        self.entry().id
    }

    #[must_use]
    pub fn scope(self) -> Scope {
        self.entry().scope
    }

    /// The option [`Effect::new`] requires for this kind.
    #[must_use]
    pub fn param(self) -> Param {
        self.entry().param
    }

    #[must_use]
    pub fn composite_mode(self) -> CompositeMode {
        self.entry().composite
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EffectKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .find(|e| e.id == s)
            .map(|e| e.kind)
            .ok_or_else(|| PipelineError::UnknownEffect(s.to_string()))
    }
}

/// An effect together with its validated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    GrayscaleWhole,
    MaskedGrayscale,
    MaskedGaussianBlur { kernel: KernelSize },
    MaskedEdgeDetect { kernel: KernelSize },
    MaskedEnhancedEdge { kernel: KernelSize },
    MaskedGradientMagnitude { kernel: KernelSize },
    SepiaWhole,
    VignetteWhole,
    SharpenWhole,
    EmbossWhole,
    CartoonWhole,
    SegmentWhiteBackground { iterations: u32 },
    SegmentWhiteForeground { iterations: u32 },
    PolygonOutline,
}

impl Effect {
    /// Validate `params` against the option `kind` requires.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameters`] if the required option
    /// is missing or the kernel radius overflows the aperture.
    pub fn new(kind: EffectKind, params: &EffectParams) -> Result<Self, PipelineError> {
        let kernel = || {
            let radius = params.kernel_radius.ok_or_else(|| {
                PipelineError::InvalidParameters(format!("{kind} requires a kernel radius"))
            })?;
            KernelSize::from_radius(radius)
        };
        let iterations = || {
            params.iterations.ok_or_else(|| {
                PipelineError::InvalidParameters(format!("{kind} requires an iteration count"))
            })
        };

        Ok(match kind {
            EffectKind::GrayscaleWhole => Self::GrayscaleWhole,
            EffectKind::MaskedGrayscale => Self::MaskedGrayscale,
            EffectKind::MaskedGaussianBlur => Self::MaskedGaussianBlur { kernel: kernel()? },
            EffectKind::MaskedEdgeDetect => Self::MaskedEdgeDetect { kernel: kernel()? },
            EffectKind::MaskedEnhancedEdge => Self::MaskedEnhancedEdge { kernel: kernel()? },
            EffectKind::MaskedGradientMagnitude => {
                Self::MaskedGradientMagnitude { kernel: kernel()? }
            }
            EffectKind::SepiaWhole => Self::SepiaWhole,
            EffectKind::VignetteWhole => Self::VignetteWhole,
            EffectKind::SharpenWhole => Self::SharpenWhole,
            EffectKind::EmbossWhole => Self::EmbossWhole,
            EffectKind::CartoonWhole => Self::CartoonWhole,
            EffectKind::SegmentWhiteBackground => Self::SegmentWhiteBackground {
                iterations: iterations()?,
            },
            EffectKind::SegmentWhiteForeground => Self::SegmentWhiteForeground {
                iterations: iterations()?,
            },
            EffectKind::PolygonOutline => Self::PolygonOutline,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::GrayscaleWhole => EffectKind::GrayscaleWhole,
            Self::MaskedGrayscale => EffectKind::MaskedGrayscale,
            Self::MaskedGaussianBlur { .. } => EffectKind::MaskedGaussianBlur,
            Self::MaskedEdgeDetect { .. } => EffectKind::MaskedEdgeDetect,
            Self::MaskedEnhancedEdge { .. } => EffectKind::MaskedEnhancedEdge,
            Self::MaskedGradientMagnitude { .. } => EffectKind::MaskedGradientMagnitude,
            Self::SepiaWhole => EffectKind::SepiaWhole,
            Self::VignetteWhole => EffectKind::VignetteWhole,
            Self::SharpenWhole => EffectKind::SharpenWhole,
            Self::EmbossWhole => EffectKind::EmbossWhole,
            Self::CartoonWhole => EffectKind::CartoonWhole,
            Self::SegmentWhiteBackground { .. } => EffectKind::SegmentWhiteBackground,
            Self::SegmentWhiteForeground { .. } => EffectKind::SegmentWhiteForeground,
            Self::PolygonOutline => EffectKind::PolygonOutline,
        }
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.kind().scope()
    }

    #[must_use]
    pub fn composite_mode(&self) -> CompositeMode {
        self.kind().composite_mode()
    }

    /// The options that reproduce this effect through [`Effect::new`].
    #[must_use]
    pub const fn params(&self) -> EffectParams {
        match *self {
            Self::MaskedGaussianBlur { kernel }
            | Self::MaskedEdgeDetect { kernel }
            | Self::MaskedEnhancedEdge { kernel }
            | Self::MaskedGradientMagnitude { kernel } => {
                EffectParams::with_kernel_radius(kernel.radius())
            }
            Self::SegmentWhiteBackground { iterations }
            | Self::SegmentWhiteForeground { iterations } => {
                EffectParams::with_iterations(iterations)
            }
            _ => EffectParams {
                iterations: None,
                kernel_radius: None,
            },
        }
    }
}

/// Full-frame output of an effect, before compositing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// A transformed frame the same size as the input.
    Frame(RgbImage),
    /// A solid fill plus the collapsed foreground of a segmentation.
    Segmented { fill: RgbImage, foreground: Mask },
}

fn check_aperture(kernel: KernelSize) -> Result<KernelSize, PipelineError> {
    if kernel.radius() > MAX_KERNEL_RADIUS {
        return Err(PipelineError::TransformFailed(format!(
            "aperture {} exceeds the largest supported ({})",
            kernel.get(),
            2 * MAX_KERNEL_RADIUS + 1
        )));
    }
    Ok(kernel)
}

/// Run `effect` over the whole of `image`.
///
/// `region` is only read by segmentation effects, which use it as the
/// initial foreground hypothesis. `polygon` is only read by the outline
/// effect.
///
/// # Errors
///
/// Returns [`PipelineError::TransformFailed`] if a primitive rejects its
/// parameters, or [`PipelineError::InternalInvariantViolation`] if
/// `region` does not match the image size.
pub fn invoke(
    effect: &Effect,
    image: &RgbImage,
    region: &Mask,
    polygon: &Polygon,
) -> Result<Rendered, PipelineError> {
    let frame = match *effect {
        Effect::GrayscaleWhole | Effect::MaskedGrayscale => crate::grayscale::grayscale(image),
        Effect::MaskedGaussianBlur { kernel } => {
            crate::blur::gaussian_blur(image, check_aperture(kernel)?)
        }
        Effect::MaskedEdgeDetect { kernel } => {
            crate::edge::sobel_edges(image, check_aperture(kernel)?)
        }
        Effect::MaskedEnhancedEdge { kernel } => {
            crate::edge::enhance_edges(image, check_aperture(kernel)?)
        }
        Effect::MaskedGradientMagnitude { kernel } => {
            crate::edge::gradient_magnitude(image, check_aperture(kernel)?)
        }
        Effect::SepiaWhole => crate::stylize::sepia(image),
        Effect::VignetteWhole => crate::stylize::vignette(image),
        Effect::SharpenWhole => crate::stylize::sharpen(image),
        Effect::EmbossWhole => crate::stylize::emboss(image),
        Effect::CartoonWhole => crate::stylize::cartoon(image),
        Effect::PolygonOutline => crate::outline::draw_outline(image, polygon),
        Effect::SegmentWhiteBackground { iterations }
        | Effect::SegmentWhiteForeground { iterations } => {
            let labeling = crate::segment::segment(image, region, iterations)?;
            return Ok(Rendered::Segmented {
                fill: RgbImage::from_pixel(image.width(), image.height(), WHITE),
                foreground: labeling.foreground_mask(),
            });
        }
    };
    Ok(Rendered::Frame(frame))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_indexed_by_kind() {
        for (i, e) in REGISTRY.iter().enumerate() {
            assert_eq!(e.kind as usize, i, "{} is out of place", e.id);
        }
    }

    #[test]
    fn ids_round_trip_through_from_str() {
        for kind in EffectKind::all() {
            assert_eq!(kind.id().parse::<EffectKind>().unwrap(), kind);
        }
        assert_eq!(EffectKind::all().count(), 14);
    }

    #[test]
    fn serde_ids_match_registry() {
        for kind in EffectKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
        }
    }

    #[test]
    fn unknown_id_is_rejected() {
        let err = "posterize".parse::<EffectKind>().unwrap_err();
        assert_eq!(err, PipelineError::UnknownEffect("posterize".to_string()));
    }

    #[test]
    fn scopes() {
        assert_eq!(EffectKind::GrayscaleWhole.scope(), Scope::Whole);
        assert_eq!(EffectKind::MaskedGrayscale.scope(), Scope::Masked);
        assert_eq!(EffectKind::CartoonWhole.scope(), Scope::Whole);
        assert_eq!(EffectKind::SegmentWhiteForeground.scope(), Scope::Segment);
        assert_eq!(EffectKind::PolygonOutline.scope(), Scope::Outline);
    }

    #[test]
    fn edge_detect_uses_inverted_dual() {
        assert_eq!(
            EffectKind::MaskedEdgeDetect.composite_mode(),
            CompositeMode::InvertedDual
        );
        assert_eq!(
            EffectKind::MaskedGradientMagnitude.composite_mode(),
            CompositeMode::MaskOnly
        );
    }

    #[test]
    fn missing_kernel_is_invalid() {
        let result = Effect::new(EffectKind::MaskedGaussianBlur, &EffectParams::default());
        assert!(matches!(result, Err(PipelineError::InvalidParameters(_))));
    }

    #[test]
    fn missing_iterations_is_invalid() {
        let result = Effect::new(
            EffectKind::SegmentWhiteBackground,
            &EffectParams::with_kernel_radius(2),
        );
        assert!(matches!(result, Err(PipelineError::InvalidParameters(_))));
    }

    #[test]
    fn required_option_matches_registry() {
        for kind in EffectKind::all() {
            let bare = Effect::new(kind, &EffectParams::default());
            assert_eq!(bare.is_ok(), kind.param() == Param::None, "{kind}");
        }
    }

    #[test]
    fn unused_options_are_ignored() {
        let params = EffectParams {
            iterations: Some(3),
            kernel_radius: Some(4),
        };
        assert_eq!(
            Effect::new(EffectKind::SepiaWhole, &params).unwrap(),
            Effect::SepiaWhole
        );
    }

    #[test]
    fn kernel_radius_becomes_odd_aperture() {
        let effect = Effect::new(
            EffectKind::MaskedEdgeDetect,
            &EffectParams::with_kernel_radius(3),
        )
        .unwrap();
        let Effect::MaskedEdgeDetect { kernel } = effect else {
            panic!("wrong variant: {effect:?}");
        };
        assert_eq!(kernel.get(), 7);
    }

    #[test]
    fn zero_radius_is_minimal_aperture() {
        let effect = Effect::new(
            EffectKind::MaskedGaussianBlur,
            &EffectParams::with_kernel_radius(0),
        )
        .unwrap();
        assert_eq!(
            effect,
            Effect::MaskedGaussianBlur {
                kernel: KernelSize::MIN
            }
        );
    }

    #[test]
    fn params_rebuild_the_same_effect() {
        let effects = [
            Effect::SharpenWhole,
            Effect::MaskedEnhancedEdge {
                kernel: KernelSize::from_radius(2).unwrap(),
            },
            Effect::SegmentWhiteForeground { iterations: 4 },
        ];
        for effect in effects {
            assert_eq!(Effect::new(effect.kind(), &effect.params()).unwrap(), effect);
        }
    }

    #[test]
    fn oversized_aperture_fails_transform() {
        let effect = Effect::MaskedGaussianBlur {
            kernel: KernelSize::from_radius(MAX_KERNEL_RADIUS + 1).unwrap(),
        };
        let img = RgbImage::new(4, 4);
        let result = invoke(&effect, &img, &Mask::full(4, 4), &Polygon::default());
        assert!(matches!(result, Err(PipelineError::TransformFailed(_))));
    }

    #[test]
    fn frames_keep_dimensions() {
        let img = RgbImage::from_fn(13, 7, |x, y| {
            Rgb([u8::try_from(x * 19).unwrap(), u8::try_from(y * 31).unwrap(), 90])
        });
        let region = Mask::full(13, 7);
        for kind in EffectKind::all() {
            let effect = Effect::new(
                kind,
                &EffectParams {
                    iterations: Some(1),
                    kernel_radius: Some(1),
                },
            )
            .unwrap();
            let rendered = invoke(&effect, &img, &region, &Polygon::default()).unwrap();
            let dims = match &rendered {
                Rendered::Frame(frame) => frame.dimensions(),
                Rendered::Segmented { fill, foreground } => {
                    let d = foreground.dimensions();
                    assert_eq!((d.width, d.height), fill.dimensions());
                    fill.dimensions()
                }
            };
            assert_eq!(dims, (13, 7), "{kind}");
        }
    }

    #[test]
    fn segmentation_renders_white_fill() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        let effect = Effect::SegmentWhiteBackground { iterations: 0 };
        let region = Mask::from_fn(10, 10, |x, y| (3..7).contains(&x) && (3..7).contains(&y));
        let Rendered::Segmented { fill, foreground } =
            invoke(&effect, &img, &region, &Polygon::default()).unwrap()
        else {
            panic!("segmentation should render a fill");
        };
        assert!(fill.pixels().all(|p| *p == WHITE));
        assert_eq!(foreground, region);
    }

    #[test]
    fn outline_draws_polygon_edges() {
        let img = RgbImage::from_pixel(12, 12, Rgb([10, 10, 10]));
        let polygon = Polygon::from_flat(&[2.0, 2.0, 9.0, 2.0, 9.0, 9.0]).unwrap();
        let Rendered::Frame(frame) =
            invoke(&Effect::PolygonOutline, &img, &Mask::full(12, 12), &polygon).unwrap()
        else {
            panic!("outline should render a frame");
        };
        assert_eq!(*frame.get_pixel(5, 2), crate::outline::OUTLINE_COLOR);
        assert_eq!(frame.get_pixel(0, 11).0, [10, 10, 10]);
    }
}
