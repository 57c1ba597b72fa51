//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! three-channel RGB frame, the working representation of every effect.
//! Alpha is discarded on decode.

use image::{DynamicImage, ImageFormat, Rgb};

use crate::types::{GrayImage, PipelineError, RgbImage};

/// Decode raw image bytes, returning the decoded image and the format
/// it was stored in.
///
/// # Errors
///
/// Returns [`PipelineError::ImageNotFound`] if `bytes` is empty, the
/// format is unrecognized, or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::ImageNotFound(
            "input image data is empty".to_string(),
        ));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| PipelineError::ImageNotFound(format!("unrecognized image format: {e}")))?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PipelineError::ImageNotFound(format!("failed to decode image: {e}")))?;
    Ok((image, format))
}

/// Convert a decoded image to the 8-bit RGB working frame.
#[must_use = "returns the converted RGB image"]
pub fn to_rgb(image: &DynamicImage) -> RgbImage {
    image.to_rgb8()
}

/// Single-channel luma of an RGB frame.
#[must_use = "returns the luma image"]
pub fn luma(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}

/// Replicate a single channel across R, G and B.
#[must_use = "returns the replicated RGB image"]
pub fn replicate(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// Convert an RGB frame to grayscale, keeping three identical channels.
///
/// Idempotent: a frame whose channels are already equal maps to itself.
#[must_use = "returns the grayscale image"]
pub fn grayscale(image: &RgbImage) -> RgbImage {
    replicate(&luma(image))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode a single 1x1 RGBA pixel as a PNG byte buffer.
    fn encode_rgba_pixel(r: u8, g: u8, b: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(1, 1, |_, _| image::Rgba([r, g, b, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::ImageNotFound(_))));
    }

    #[test]
    fn corrupt_bytes_returns_image_not_found() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageNotFound(_))));
    }

    #[test]
    fn png_decodes_and_reports_format() {
        let (image, format) = decode(&encode_rgba_pixel(10, 20, 30)).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(to_rgb(&image).get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn grayscale_channels_are_equal() {
        let img = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 20) as u8, 77]));
        let gray = grayscale(&img);
        for p in gray.pixels() {
            assert_eq!(p.0[0], p.0[1]);
            assert_eq!(p.0[1], p.0[2]);
        }
    }

    #[test]
    fn grayscale_is_idempotent() {
        let img = RgbImage::from_fn(16, 9, |x, y| {
            Rgb([(x * 15) as u8, (y * 27) as u8, ((x + y) * 9) as u8])
        });
        let once = grayscale(&img);
        let twice = grayscale(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn weighted_luma_orders_primaries() {
        let px = |c: [u8; 3]| grayscale(&RgbImage::from_pixel(1, 1, Rgb(c))).get_pixel(0, 0).0[0];
        let r = px([255, 0, 0]);
        let g = px([0, 255, 0]);
        let b = px([0, 0, 255]);
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }
}
