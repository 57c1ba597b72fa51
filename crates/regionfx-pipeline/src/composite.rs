//! Region compositing: merge a transformed frame into the original under
//! a mask.
//!
//! Compositing is pixel-local, so rows are processed in parallel with
//! rayon. Pixels taken from the original are copied byte-for-byte.

use rayon::prelude::*;

use crate::mask::{INSIDE, Mask};
use crate::types::{PipelineError, RgbImage};

/// How a transformed frame is merged with the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    /// Transformed inside the mask, original elsewhere.
    MaskOnly,
    /// Transformed copied where the mask is inside, then the original
    /// copied where the inverted mask is inside. Equivalent output to
    /// [`MaskOnly`](Self::MaskOnly).
    InvertedDual,
    /// The mask is a segmentation foreground and the transformed frame a
    /// solid fill.
    Segmentation(SegmentationFill),
}

/// Which class of a segmentation receives the fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationFill {
    /// Keep the foreground, fill the background.
    WhiteBackground,
    /// Fill the foreground, keep the background.
    WhiteForeground,
}

/// Copy pixels of `src` into `dst` wherever `mask` is inside.
fn copy_where(dst: &mut RgbImage, src: &RgbImage, mask: &Mask) {
    let width = dst.width() as usize;
    if width == 0 {
        return;
    }
    let row_bytes = width * 3;
    let dst_raw: &mut [u8] = dst;
    dst_raw
        .par_chunks_mut(row_bytes)
        .zip(src.as_raw().par_chunks(row_bytes))
        .zip(mask.as_raw().par_chunks(width))
        .for_each(|((dst_row, src_row), mask_row)| {
            for (x, &m) in mask_row.iter().enumerate() {
                if m == INSIDE {
                    let i = x * 3;
                    dst_row[i..i + 3].copy_from_slice(&src_row[i..i + 3]);
                }
            }
        });
}

/// Combine `original` and `transformed` according to `mask` and `mode`.
///
/// Never changes dimensions or channel count.
///
/// # Errors
///
/// Returns [`PipelineError::InternalInvariantViolation`] if the three
/// inputs are not all the same size.
pub fn composite(
    original: &RgbImage,
    transformed: &RgbImage,
    mask: &Mask,
    mode: CompositeMode,
) -> Result<RgbImage, PipelineError> {
    let dims = mask.dimensions();
    let mask_dims = (dims.width, dims.height);
    if original.dimensions() != transformed.dimensions() || original.dimensions() != mask_dims {
        return Err(PipelineError::InternalInvariantViolation(format!(
            "cannot composite: original {:?}, transformed {:?}, mask {:?}",
            original.dimensions(),
            transformed.dimensions(),
            mask_dims
        )));
    }

    let out = match mode {
        CompositeMode::MaskOnly
        | CompositeMode::Segmentation(SegmentationFill::WhiteForeground) => {
            let mut out = original.clone();
            copy_where(&mut out, transformed, mask);
            out
        }
        CompositeMode::InvertedDual => {
            let mut out = RgbImage::new(original.width(), original.height());
            copy_where(&mut out, transformed, mask);
            copy_where(&mut out, original, &mask.inverted());
            out
        }
        CompositeMode::Segmentation(SegmentationFill::WhiteBackground) => {
            let mut out = original.clone();
            copy_where(&mut out, transformed, &mask.inverted());
            out
        }
    };
    Ok(out)
}
