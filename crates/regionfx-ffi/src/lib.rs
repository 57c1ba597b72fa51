//! C ABI for regionfx.
//!
//! Every entry point loads the image at `path`, applies one effect and
//! overwrites the file in place, returning an integer status:
//!
//! | code | meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | image not found or not decodable |
//! | 2 | invalid parameters |
//! | 3 | unknown effect |
//! | 4 | transform failed |
//! | 5 | storage failed |
//! | 6 | internal invariant violation (including a caught panic) |
//!
//! Calls block for the whole decode, transform and encode, so callers
//! should dispatch them onto a worker thread rather than a UI thread.
//! Polygons are passed as `num_points` vertices laid out as a flat array
//! of `2 * num_points` floats (`x0, y0, x1, y1, ...`).
//!
//! After a failure, [`regionfx_last_error`] returns the error of the
//! calling thread's most recent call as JSON.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::ffi::{CStr, c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use regionfx_io::Driver;
use regionfx_pipeline::{EffectParams, PipelineError, Request, WireRequest};

/// Status codes returned by every entry point.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionfxStatus {
    Ok = 0,
    ImageNotFound = 1,
    InvalidParameters = 2,
    UnknownEffect = 3,
    TransformFailed = 4,
    StorageFailed = 5,
    InternalInvariantViolation = 6,
}

impl From<&PipelineError> for RegionfxStatus {
    fn from(e: &PipelineError) -> Self {
        match e {
            PipelineError::ImageNotFound(_) => Self::ImageNotFound,
            PipelineError::InvalidParameters(_) => Self::InvalidParameters,
            PipelineError::UnknownEffect(_) => Self::UnknownEffect,
            PipelineError::TransformFailed(_) => Self::TransformFailed,
            PipelineError::StorageFailed(_) => Self::StorageFailed,
            PipelineError::InternalInvariantViolation(_) => Self::InternalInvariantViolation,
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<PipelineError>> = const { RefCell::new(None) };
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::InvalidParameters(message.into())
}

/// Borrow a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives
/// `'a`.
unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, PipelineError> {
    if ptr.is_null() {
        return Err(invalid(format!("{what} is null")));
    }
    // SAFETY: non-null, NUL-terminated per the caller's contract.
    let cstr = unsafe { CStr::from_ptr(ptr) };
    cstr.to_str()
        .map_err(|e| invalid(format!("{what} is not UTF-8: {e}")))
}

/// Borrow `2 * num_points` coordinates.
///
/// # Safety
///
/// When `num_points > 0`, `points` must point to at least
/// `2 * num_points` initialized floats that outlive `'a`.
unsafe fn points_arg<'a>(points: *const f32, num_points: c_int) -> Result<&'a [f32], PipelineError> {
    let count = usize::try_from(num_points)
        .map_err(|_| invalid(format!("negative vertex count {num_points}")))?;
    if count == 0 {
        return Ok(&[]);
    }
    if points.is_null() {
        return Err(invalid(format!("null point buffer with {count} vertices")));
    }
    let len = count
        .checked_mul(2)
        .ok_or_else(|| invalid("vertex count overflows"))?;
    // SAFETY: non-null and at least `len` floats per the caller's contract.
    Ok(unsafe { std::slice::from_raw_parts(points, len) })
}

fn count_arg(value: c_int, what: &str) -> Result<u32, PipelineError> {
    u32::try_from(value).map_err(|_| invalid(format!("{what} must not be negative, got {value}")))
}

/// Run `call`, converting its outcome (or a panic) into a status code and
/// recording any error for [`regionfx_last_error`].
fn guarded(call: impl FnOnce() -> Result<(), PipelineError>) -> c_int {
    let outcome = catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("panic caught at the C boundary: {message}");
        Err(PipelineError::InternalInvariantViolation(format!(
            "panic: {message}"
        )))
    });

    let status = outcome
        .as_ref()
        .map_or_else(RegionfxStatus::from, |_| RegionfxStatus::Ok);
    LAST_ERROR.with(|slot| *slot.borrow_mut() = outcome.err());
    status as c_int
}

/// # Safety
///
/// See [`str_arg`] and [`points_arg`].
unsafe fn apply(
    path: *const c_char,
    effect_id: &str,
    points: *const f32,
    num_points: c_int,
    params: EffectParams,
) -> c_int {
    guarded(|| {
        // SAFETY: forwarded from the exported function's contract.
        let path = unsafe { str_arg(path, "path") }?;
        // SAFETY: as above.
        let points = unsafe { points_arg(points, num_points) }?;
        Driver::new()
            .apply(Path::new(path), effect_id, points, &params)
            .map(|_| ())
    })
}

/// Install `env_logger` as the process-wide logger, honouring `RUST_LOG`.
///
/// Safe to call more than once; later calls do nothing.
#[unsafe(no_mangle)]
pub extern "C" fn regionfx_init_logging() {
    // Err means a logger is already installed.
    let _ = env_logger::try_init();
}

/// Convert the whole image to grayscale.
///
/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_grayscale(path: *const c_char) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "grayscale-whole", std::ptr::null(), 0, EffectParams::default()) }
}

/// Convert the region inside the polygon to grayscale.
///
/// # Safety
///
/// `path` must be null or a valid NUL-terminated string. `points` must
/// hold `2 * num_points` floats when `num_points > 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_masked_grayscale(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "masked-grayscale", points, num_points, EffectParams::default()) }
}

/// Shared body of the kernel-parameterised masked effects.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
unsafe fn masked_with_kernel(
    path: *const c_char,
    effect_id: &str,
    points: *const f32,
    num_points: c_int,
    kernel_param: c_int,
) -> c_int {
    guarded(|| {
        let radius = count_arg(kernel_param, "kernel parameter")?;
        // SAFETY: forwarded from the exported function's contract.
        let path = unsafe { str_arg(path, "path") }?;
        // SAFETY: as above.
        let points = unsafe { points_arg(points, num_points) }?;
        Driver::new()
            .apply(
                Path::new(path),
                effect_id,
                points,
                &EffectParams::with_kernel_radius(radius),
            )
            .map(|_| ())
    })
}

/// Gaussian blur inside the polygon with aperture `2 * kernel_param + 1`.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_masked_gaussian_blur(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
    kernel_param: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe {
        masked_with_kernel(path, "masked-gaussian-blur", points, num_points, kernel_param)
    }
}

/// Sobel edge map inside the polygon.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_masked_edge_detect(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
    kernel_param: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { masked_with_kernel(path, "masked-edge-detect", points, num_points, kernel_param) }
}

/// Laplacian edge enhancement inside the polygon.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_masked_enhanced_edge(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
    kernel_param: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { masked_with_kernel(path, "masked-enhanced-edge", points, num_points, kernel_param) }
}

/// Normalized gradient magnitude inside the polygon.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_masked_gradient_magnitude(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
    kernel_param: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe {
        masked_with_kernel(
            path,
            "masked-gradient-magnitude",
            points,
            num_points,
            kernel_param,
        )
    }
}

/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_sepia(path: *const c_char) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "sepia-whole", std::ptr::null(), 0, EffectParams::default()) }
}

/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_vignette(path: *const c_char) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "vignette-whole", std::ptr::null(), 0, EffectParams::default()) }
}

/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_sharpen(path: *const c_char) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "sharpen-whole", std::ptr::null(), 0, EffectParams::default()) }
}

/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_emboss(path: *const c_char) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "emboss-whole", std::ptr::null(), 0, EffectParams::default()) }
}

/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_cartoon(path: *const c_char) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "cartoon-whole", std::ptr::null(), 0, EffectParams::default()) }
}

/// Draw the closed polygon outline, two pixels wide in green, over the
/// image. No vertices leaves the file untouched.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_polygon_outline(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { apply(path, "polygon-outline", points, num_points, EffectParams::default()) }
}

/// Shared body of the segmentation entry points.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
unsafe fn segment(
    path: *const c_char,
    effect_id: &str,
    points: *const f32,
    num_points: c_int,
    iterations: c_int,
) -> c_int {
    guarded(|| {
        let iterations = count_arg(iterations, "iteration count")?;
        // SAFETY: forwarded from the exported function's contract.
        let path = unsafe { str_arg(path, "path") }?;
        // SAFETY: as above.
        let points = unsafe { points_arg(points, num_points) }?;
        Driver::new()
            .apply(
                Path::new(path),
                effect_id,
                points,
                &EffectParams::with_iterations(iterations),
            )
            .map(|_| ())
    })
}

/// Keep the foreground seeded by the polygon; paint the rest white.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_segment_white_background(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
    iterations: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { segment(path, "segment-white-background", points, num_points, iterations) }
}

/// Paint the foreground seeded by the polygon white; keep the rest.
///
/// # Safety
///
/// As for [`regionfx_masked_grayscale`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_segment_white_foreground(
    path: *const c_char,
    points: *const f32,
    num_points: c_int,
    iterations: c_int,
) -> c_int {
    // SAFETY: caller upholds the contract above.
    unsafe { segment(path, "segment-white-foreground", points, num_points, iterations) }
}

/// Apply any effect by identifier (for example `"masked-gaussian-blur"`).
///
/// `iterations` and `kernel_param` are passed to every effect; effects
/// that do not use them ignore them, but they must not be negative.
///
/// # Safety
///
/// `path` and `effect_id` must be null or valid NUL-terminated strings.
/// `points` must hold `2 * num_points` floats when `num_points > 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_apply(
    path: *const c_char,
    effect_id: *const c_char,
    points: *const f32,
    num_points: c_int,
    iterations: c_int,
    kernel_param: c_int,
) -> c_int {
    guarded(|| {
        let params = EffectParams {
            iterations: Some(count_arg(iterations, "iteration count")?),
            kernel_radius: Some(count_arg(kernel_param, "kernel parameter")?),
        };
        // SAFETY: caller upholds the contract above.
        let effect_id = unsafe { str_arg(effect_id, "effect id") }?;
        // SAFETY: as above.
        let path = unsafe { str_arg(path, "path") }?;
        // SAFETY: as above.
        let points = unsafe { points_arg(points, num_points) }?;
        Driver::new()
            .apply(Path::new(path), effect_id, points, &params)
            .map(|_| ())
    })
}

/// Apply a JSON-encoded request, e.g.
/// `{"effect":"segment-white-background","points":[...],"iterations":5}`.
///
/// # Safety
///
/// `path` and `request_json` must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_apply_json(
    path: *const c_char,
    request_json: *const c_char,
) -> c_int {
    guarded(|| {
        // SAFETY: caller upholds the contract above.
        let json = unsafe { str_arg(request_json, "request") }?;
        // SAFETY: as above.
        let path = unsafe { str_arg(path, "path") }?;
        let wire: WireRequest =
            serde_json::from_str(json).map_err(|e| invalid(format!("malformed request: {e}")))?;
        let request: Request = wire.into_request()?;
        Driver::new().run(Path::new(path), &request).map(|_| ())
    })
}

/// Copy the calling thread's last error, JSON-encoded and NUL-terminated,
/// into `buf`.
///
/// Returns the number of bytes the message needs including the NUL, `0`
/// if the last call succeeded, or a negative value if `buf` is null or
/// too small (nothing is written in that case).
///
/// # Safety
///
/// `buf` must be null or valid for `len` bytes of writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn regionfx_last_error(buf: *mut c_char, len: usize) -> c_int {
    let Some(json) = LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|e| serde_json::to_string(e).ok())
    }) else {
        return 0;
    };

    let needed = json.len() + 1;
    let needed_c = c_int::try_from(needed).unwrap_or(c_int::MAX);
    if buf.is_null() || len < needed {
        return -needed_c;
    }
    // SAFETY: `buf` is valid for `len >= needed` bytes per the contract
    // and cannot overlap the freshly allocated `json`.
    unsafe {
        std::ptr::copy_nonoverlapping(json.as_ptr().cast::<c_char>(), buf, json.len());
        *buf.add(json.len()) = 0;
    }
    needed_c
}

/// Static, NUL-terminated description of a status code.
#[unsafe(no_mangle)]
pub extern "C" fn regionfx_status_message(status: c_int) -> *const c_char {
    let message: &'static CStr = match status {
        0 => c"success",
        1 => c"could not open or find the image",
        2 => c"invalid parameters",
        3 => c"unknown effect",
        4 => c"transform failed",
        5 => c"failed to store image",
        6 => c"internal invariant violated",
        _ => c"unrecognized status code",
    };
    message.as_ptr()
}
