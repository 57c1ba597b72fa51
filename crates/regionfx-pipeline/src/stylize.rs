//! Whole-frame stylization effects: sepia, vignette, sharpen, emboss
//! and cartoon.

use image::Rgb;
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::bilateral::GaussianEuclideanColorDistance;
use imageproc::filter::{bilateral_filter, filter_clamped, median_filter};
use imageproc::kernel::Kernel;

use crate::grayscale::luma;
use crate::types::RgbImage;

/// Sepia colour-mixing matrix; row `i` produces output channel `i` from
/// input `(R, G, B)`.
const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

const SHARPEN_3X3: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

const EMBOSS_3X3: [f32; 9] = [-2.0, -1.0, 0.0, -1.0, 1.0, 1.0, 0.0, 1.0, 2.0];

/// Cartoon smoothing: bilateral window radius and sigmas.
const CARTOON_BILATERAL_RADIUS: u8 = 4;
const CARTOON_SIGMA_COLOR: f32 = 75.0;
const CARTOON_SIGMA_SPACE: f32 = 75.0;

/// Cartoon edge detection: median radius, threshold block radius and
/// the offset subtracted from the local mean. Pixels at least as bright
/// as `mean - offset` are not edges.
const CARTOON_MEDIAN_RADIUS: u32 = 2;
const CARTOON_BLOCK_RADIUS: u32 = 4;
const CARTOON_THRESHOLD_OFFSET: i32 = 2;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Apply the fixed sepia matrix to every pixel.
#[must_use = "returns the sepia-toned image"]
pub fn sepia(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        let [r, g, b] = p.0.map(f32::from);
        p.0 = SEPIA.map(|row| to_u8(row[0].mul_add(r, row[1].mul_add(g, row[2] * b))));
    }
    out
}

/// Radial darkening: each pixel is scaled by `1 - d / d_max`, where `d`
/// is its distance from the image centre and `d_max` the centre-to-corner
/// distance.
#[must_use = "returns the vignetted image"]
#[allow(clippy::cast_precision_loss)]
pub fn vignette(image: &RgbImage) -> RgbImage {
    let cx = image.width() as f32 / 2.0;
    let cy = image.height() as f32 / 2.0;
    let max_dist = cx.hypot(cy);
    if max_dist <= 0.0 {
        return image.clone();
    }

    let mut out = image.clone();
    for (x, y, p) in out.enumerate_pixels_mut() {
        let dist = (x as f32 - cx).hypot(y as f32 - cy);
        let factor = (1.0 - dist / max_dist).clamp(0.0, 1.0);
        p.0 = p.0.map(|c| to_u8(f32::from(c) * factor));
    }
    out
}

/// Fixed 3x3 sharpening convolution.
#[must_use = "returns the sharpened image"]
pub fn sharpen(image: &RgbImage) -> RgbImage {
    filter_clamped(image, Kernel::new(&SHARPEN_3X3, 3, 3))
}

/// Fixed 3x3 emboss convolution.
#[must_use = "returns the embossed image"]
pub fn emboss(image: &RgbImage) -> RgbImage {
    filter_clamped(image, Kernel::new(&EMBOSS_3X3, 3, 3))
}

/// Cartoon effect: edge-preserving colour smoothing, with dark outlines
/// wherever an adaptive threshold of the median-filtered luma marks an
/// edge.
#[must_use = "returns the cartoon image"]
pub fn cartoon(image: &RgbImage) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let gray = median_filter(&luma(image), CARTOON_MEDIAN_RADIUS, CARTOON_MEDIAN_RADIUS);
    let outline = adaptive_threshold(&gray, CARTOON_BLOCK_RADIUS, CARTOON_THRESHOLD_OFFSET);
    let mut color: RgbImage = bilateral_filter(
        image,
        CARTOON_BILATERAL_RADIUS,
        CARTOON_SIGMA_SPACE,
        GaussianEuclideanColorDistance::new(CARTOON_SIGMA_COLOR),
    );

    for (x, y, p) in color.enumerate_pixels_mut() {
        if outline.get_pixel(x, y).0[0] == 0 {
            *p = Rgb([0, 0, 0]);
        }
    }
    color
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> RgbImage {
        RgbImage::from_fn(24, 16, |x, y| {
            Rgb([
                u8::try_from(x * 10).unwrap_or(255),
                u8::try_from(y * 15).unwrap_or(255),
                90,
            ])
        })
    }

    #[test]
    fn sepia_known_values() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let toned = sepia(&img);
        assert_eq!(toned.get_pixel(0, 0).0, [0, 0, 0]);
        // Blue row sums to 0.937; red and green rows saturate.
        assert_eq!(toned.get_pixel(1, 0).0, [255, 255, 239]);
    }

    #[test]
    fn vignette_darkens_corner_keeps_centre() {
        let img = RgbImage::from_pixel(20, 10, Rgb([200, 100, 50]));
        let out = vignette(&img);
        assert_eq!(out.get_pixel(10, 5).0, [200, 100, 50]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        let mid = out.get_pixel(5, 5).0[0];
        assert!(mid > 0 && mid < 200, "expected partial darkening, got {mid}");
    }

    #[test]
    fn vignette_is_radially_monotonic() {
        let img = RgbImage::from_pixel(31, 31, Rgb([255, 255, 255]));
        let out = vignette(&img);
        let row: Vec<u8> = (15..31).map(|x| out.get_pixel(x, 15).0[0]).collect();
        assert!(row.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn sharpen_and_emboss_preserve_uniform_images() {
        let img = RgbImage::from_pixel(9, 9, Rgb([120, 60, 30]));
        assert_eq!(sharpen(&img), img);
        assert_eq!(emboss(&img), img);
    }

    #[test]
    fn sharpen_increases_local_contrast() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([50, 50, 50]));
        img.put_pixel(2, 2, Rgb([100, 100, 100]));
        let out = sharpen(&img);
        // 5 * 100 - 4 * 50 = 300, clamped.
        assert_eq!(out.get_pixel(2, 2).0, [255, 255, 255]);
        // Direct neighbour: 5 * 50 - 100 - 3 * 50 = 0.
        assert_eq!(out.get_pixel(2, 1).0, [0, 0, 0]);
    }

    #[test]
    fn emboss_responds_to_diagonal_gradient() {
        let img = gradient_image();
        assert_ne!(emboss(&img), img);
    }

    fn assert_near(actual: [u8; 3], expected: [u8; 3]) {
        for (a, e) in actual.into_iter().zip(expected) {
            assert!(a.abs_diff(e) <= 1, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn cartoon_of_uniform_image_has_no_outline() {
        let img = RgbImage::from_pixel(20, 20, Rgb([90, 140, 210]));
        let out = cartoon(&img);
        for p in out.pixels() {
            assert_near(p.0, [90, 140, 210]);
        }
    }

    #[test]
    fn cartoon_draws_dark_outline() {
        // Dark band five pixels wide survives the 5x5 median.
        let img = RgbImage::from_fn(30, 30, |x, _| {
            if (12..17).contains(&x) {
                Rgb([0, 0, 0])
            } else {
                Rgb([220, 220, 220])
            }
        });
        let out = cartoon(&img);
        assert_eq!(out.get_pixel(14, 15).0, [0, 0, 0]);
        assert_near(out.get_pixel(3, 15).0, [220, 220, 220]);
    }

    #[test]
    fn cartoon_keeps_colour_edges_sharp() {
        let img = RgbImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                Rgb([200, 40, 40])
            } else {
                Rgb([40, 40, 200])
            }
        });
        let out = cartoon(&img);
        assert!(out.get_pixel(2, 4).0[0] > 190);
        assert!(out.get_pixel(13, 4).0[2] > 190);
    }

    #[test]
    fn cartoon_of_empty_image_is_empty() {
        let img = RgbImage::new(0, 0);
        assert_eq!(cartoon(&img).dimensions(), (0, 0));
    }

    #[test]
    fn effects_preserve_dimensions() {
        let img = gradient_image();
        for out in [
            sepia(&img),
            vignette(&img),
            sharpen(&img),
            emboss(&img),
            cartoon(&img),
        ] {
            assert_eq!(out.dimensions(), img.dimensions());
        }
    }
}
