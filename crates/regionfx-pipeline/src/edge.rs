//! Gradient-based edge maps.
//!
//! All three variants smooth the luma with a Gaussian of the requested
//! aperture first, then apply a 3x3 derivative operator through
//! [`imageproc::filter::filter_clamped`]:
//!
//! - [`sobel_edges`]: Euclidean Sobel magnitude, saturated at 255.
//! - [`gradient_magnitude`]: L1 Sobel magnitude stretched to 0..=255.
//! - [`enhance_edges`]: absolute Laplacian response added onto the
//!   original colours.

use image::{GrayImage, Luma, Rgb};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel::{self, Kernel};

use crate::blur::gaussian_blur_gray;
use crate::grayscale::{luma, replicate};
use crate::types::{KernelSize, RgbImage};

/// 4-neighbour Laplacian.
const LAPLACIAN_3X3: [i32; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

/// Horizontal and vertical Sobel responses of the smoothed luma.
fn sobel(image: &RgbImage, aperture: KernelSize) -> (Image<Luma<i16>>, Image<Luma<i16>>) {
    let smoothed = gaussian_blur_gray(&luma(image), aperture);
    let gx: Image<Luma<i16>> = filter_clamped(&smoothed, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(&smoothed, kernel::SOBEL_VERTICAL_3X3);
    (gx, gy)
}

/// Sobel edge map: `hypot(gx, gy)` saturated to 255, replicated to RGB.
#[must_use = "returns the edge map"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sobel_edges(image: &RgbImage, aperture: KernelSize) -> RgbImage {
    let (gx, gy) = sobel(image, aperture);
    let magnitude = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let h = f32::from(gx.get_pixel(x, y).0[0]);
        let v = f32::from(gy.get_pixel(x, y).0[0]);
        Luma([h.hypot(v).round().min(255.0) as u8])
    });
    replicate(&magnitude)
}

/// L1 gradient magnitude `|gx| + |gy|`, min-max normalized to the full
/// 8-bit range. A flat image produces an all-black map.
#[must_use = "returns the gradient magnitude map"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn gradient_magnitude(image: &RgbImage, aperture: KernelSize) -> RgbImage {
    let (gx, gy) = sobel(image, aperture);
    let l1: Vec<u32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(h, v)| u32::from(h.unsigned_abs()) + u32::from(v.unsigned_abs()))
        .collect();

    let (min, max) = l1
        .iter()
        .fold((u32::MAX, 0), |(lo, hi), &m| (lo.min(m), hi.max(m)));
    let range = max.saturating_sub(min);

    let normalized = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if range == 0 {
            return Luma([0]);
        }
        let idx = (y as usize) * (image.width() as usize) + x as usize;
        let scaled = (l1[idx] - min) as f32 * 255.0 / range as f32;
        Luma([scaled.round() as u8])
    });
    replicate(&normalized)
}

/// Laplacian edge enhancement: the absolute Laplacian of the smoothed
/// luma is added (saturating) to every channel of the original.
#[must_use = "returns the enhanced image"]
#[allow(clippy::cast_possible_truncation)]
pub fn enhance_edges(image: &RgbImage, aperture: KernelSize) -> RgbImage {
    let smoothed = gaussian_blur_gray(&luma(image), aperture);
    let laplacian: Image<Luma<i16>> =
        filter_clamped(&smoothed, Kernel::new(&LAPLACIAN_3X3, 3, 3));

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let boost = laplacian.get_pixel(x, y).0[0].unsigned_abs().min(255) as u8;
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgb([
            r.saturating_add(boost),
            g.saturating_add(boost),
            b.saturating_add(boost),
        ])
    })
}
