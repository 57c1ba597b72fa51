//! regionfx-pipeline: polygon-masked image effects (sans-IO).
//!
//! A request names one effect and, for region effects, a polygon. It is
//! carried out as:
//! decode -> rasterize the polygon into a mask -> run the effect over the
//! whole frame -> composite transformed and original pixels by the mask ->
//! encode.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and frames. Filesystem access and logging live in
//! `regionfx-io`.

pub mod blur;
pub mod composite;
pub mod edge;
pub mod effect;
pub mod grayscale;
pub mod mask;
pub mod outline;
pub mod pipeline;
pub mod request;
pub mod segment;
pub mod stylize;
pub mod types;

pub use composite::{CompositeMode, SegmentationFill};
pub use effect::{Effect, EffectKind, Rendered, Scope};
pub use mask::Mask;
pub use pipeline::{Pipeline, Stage};
pub use request::{Request, WireRequest};
pub use segment::{Label, Labeling};
pub use types::{
    Dimensions, EffectParams, GrayImage, KernelSize, PipelineError, Point, Polygon, RgbImage,
};

/// Apply a request to an already-decoded frame.
///
/// Same steps as [`Pipeline`] minus decoding and encoding. Region effects
/// with an empty region return the frame unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameters`] for a degenerate polygon,
/// [`PipelineError::TransformFailed`] if a primitive rejects its
/// parameters.
pub fn process(image: &RgbImage, request: &Request) -> Result<RgbImage, PipelineError> {
    // 1. Region mask (skipped for whole-frame effects).
    let mask = pipeline::region_mask(request, image.width(), image.height())?;

    // 2. Full-frame effect.
    let rendered = pipeline::render(request, image, mask.as_ref())?;

    // 3. Composite by mask.
    pipeline::merge(
        image,
        rendered.as_ref(),
        mask.as_ref(),
        request.effect.composite_mode(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    fn checker(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([250, 240, 10])
            } else {
                Rgb([10, 20, 200])
            }
        })
    }

    #[test]
    fn grayscale_whole_is_idempotent() {
        let request = Request::whole(Effect::GrayscaleWhole);
        let once = process(&checker(16), &request).unwrap();
        let twice = process(&once, &request).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_polygon_is_noop_for_masked_effects() {
        let img = checker(16);
        let request = Request::whole(Effect::MaskedEnhancedEdge {
            kernel: KernelSize::MIN,
        });
        assert_eq!(process(&img, &request).unwrap(), img);
    }

    #[test]
    fn masked_blur_only_touches_region() {
        let img = checker(24);
        let request = Request::from_wire(
            "masked-gaussian-blur",
            &[4.0, 4.0, 12.0, 4.0, 12.0, 12.0, 4.0, 12.0],
            &EffectParams::with_kernel_radius(2),
        )
        .unwrap();
        let out = process(&img, &request).unwrap();
        assert_eq!(out.get_pixel(20, 20), img.get_pixel(20, 20));
        assert_ne!(out.get_pixel(8, 8), img.get_pixel(8, 8));
    }

    #[test]
    fn out_of_frame_polygon_is_clipped() {
        let img = checker(10);
        let request = Request::from_wire(
            "masked-grayscale",
            &[-50.0, -50.0, 200.0, -50.0, 200.0, 200.0, -50.0, 200.0],
            &EffectParams::default(),
        )
        .unwrap();
        let out = process(&img, &request).unwrap();
        assert_eq!(out, grayscale::grayscale(&img));
    }

    #[test]
    fn far_out_of_frame_polygon_covers_frame() {
        let img = checker(10);
        let request = Request::from_wire(
            "masked-grayscale",
            &[-3e9, -3e9, 3e9, -3e9, 3e9, 3e9, -3e9, 3e9],
            &EffectParams::default(),
        )
        .unwrap();
        assert_eq!(process(&img, &request).unwrap(), grayscale::grayscale(&img));
    }

    #[test]
    fn edge_detect_region_is_gray_inside() {
        let img = checker(32);
        let request = Request::from_wire(
            "masked-edge-detect",
            &[8.0, 8.0, 23.0, 8.0, 23.0, 23.0, 8.0, 23.0],
            &EffectParams::with_kernel_radius(0),
        )
        .unwrap();
        let out = process(&img, &request).unwrap();
        let p = out.get_pixel(15, 15).0;
        assert_eq!(p[0], p[1]);
        assert_eq!(out.get_pixel(1, 1), img.get_pixel(1, 1));
    }
}
