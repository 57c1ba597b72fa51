#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{ImageFormat, Rgb, RgbImage};
use log::{Level, Log, Metadata, Record};
use regionfx_io::Driver;
use regionfx_pipeline::{Effect, EffectParams, KernelSize, PipelineError, Polygon, Request, Stage};

/// Captures formatted records for assertions.
#[derive(Default)]
struct Capture(Mutex<Vec<(Level, String)>>);

impl Log for Capture {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.0
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

impl Capture {
    fn lines(&self) -> Vec<(Level, String)> {
        self.0.lock().unwrap().clone()
    }
}

fn write_image(dir: &Path, name: &str, img: &RgbImage, format: ImageFormat) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, format).unwrap();
    path
}

fn red(size: u32) -> RgbImage {
    RgbImage::from_pixel(size, size, Rgb([255, 0, 0]))
}

fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> Polygon {
    Polygon::from_flat(&[x0, y0, x1, y0, x1, y1, x0, y1]).unwrap()
}

#[test]
fn full_frame_masked_grayscale_overwrites_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "red.png", &red(100), ImageFormat::Png);

    let request = Request::new(Effect::MaskedGrayscale, square(0.0, 0.0, 99.0, 99.0));
    let report = Driver::new().run(&path, &request).unwrap();
    assert_eq!(report.stage, Stage::Done);
    assert!(report.changed);
    assert_eq!(report.format, Some(ImageFormat::Png));

    let out = image::open(&path).unwrap().to_rgb8();
    let luma = out.get_pixel(0, 0).0;
    assert_eq!(luma[0], luma[1]);
    assert_eq!(luma[1], luma[2]);
    assert!(out.pixels().all(|p| p.0 == luma));
    assert_ne!(luma, [255, 0, 0]);
}

#[test]
fn segmentation_whitens_far_background() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "red.png", &red(100), ImageFormat::Png);

    let request = Request::new(
        Effect::SegmentWhiteBackground { iterations: 5 },
        square(40.0, 40.0, 59.0, 59.0),
    );
    Driver::new().run(&path, &request).unwrap();

    let out = image::open(&path).unwrap().to_rgb8();
    assert_eq!(out.get_pixel(2, 2).0, [255, 255, 255]);
    assert_eq!(out.get_pixel(97, 3).0, [255, 255, 255]);
    assert_eq!(out.get_pixel(50, 50).0, [255, 0, 0]);
}

#[test]
fn missing_file_is_image_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let result = Driver::new().run(
        &dir.path().join("absent.png"),
        &Request::whole(Effect::SepiaWhole),
    );
    assert!(matches!(result, Err(PipelineError::ImageNotFound(_))));
}

#[test]
fn undecodable_file_is_image_not_found_and_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.png");
    std::fs::write(&path, b"not an image at all").unwrap();

    let result = Driver::new().run(&path, &Request::whole(Effect::SepiaWhole));
    assert!(matches!(result, Err(PipelineError::ImageNotFound(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"not an image at all");
}

#[test]
fn failed_request_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "red.png", &red(10), ImageFormat::Png);
    let before = std::fs::read(&path).unwrap();

    // Two vertices do not enclose a region.
    let polygon = Polygon::from_flat(&[1.0, 1.0, 5.0, 5.0]).unwrap();
    let request = Request::new(Effect::MaskedGrayscale, polygon);
    let result = Driver::new().run(&path, &request);
    assert!(matches!(result, Err(PipelineError::InvalidParameters(_))));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn empty_region_leaves_bytes_identical() {
    let dir = tempfile::tempdir().unwrap();
    let img = RgbImage::from_fn(16, 16, |x, y| {
        Rgb([u8::try_from(x * 16).unwrap(), u8::try_from(y * 16).unwrap(), 3])
    });
    let path = write_image(dir.path(), "g.png", &img, ImageFormat::Png);
    let before = std::fs::read(&path).unwrap();

    let request = Request::whole(Effect::MaskedGaussianBlur {
        kernel: KernelSize::from_radius(3).unwrap(),
    });
    let report = Driver::new().run(&path, &request).unwrap();
    assert!(!report.changed);
    assert_eq!(report.format, None);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn whole_effect_keeps_bmp_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let img = RgbImage::from_pixel(8, 8, Rgb([200, 150, 100]));
    let path = write_image(dir.path(), "p.bmp", &img, ImageFormat::Bmp);

    let report = Driver::new()
        .run(&path, &Request::whole(Effect::SepiaWhole))
        .unwrap();
    assert_eq!(report.format, Some(ImageFormat::Bmp));

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Bmp);
    let out = image::load_from_memory(&bytes).unwrap().to_rgb8();
    assert_ne!(out.get_pixel(4, 4).0, [200, 150, 100]);
}

#[test]
fn apply_rejects_unknown_effect() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "red.png", &red(4), ImageFormat::Png);
    let result = Driver::new().apply(&path, "solarize", &[], &EffectParams::default());
    assert!(matches!(result, Err(PipelineError::UnknownEffect(_))));
}

#[test]
fn apply_runs_wire_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "red.png", &red(20), ImageFormat::Png);
    let report = Driver::new()
        .apply(
            &path,
            "masked-gradient-magnitude",
            &[2.0, 2.0, 10.0, 2.0, 10.0, 10.0],
            &EffectParams::with_kernel_radius(1),
        )
        .unwrap();
    assert!(report.changed);
    let out = image::open(&path).unwrap().to_rgb8();
    // Flat input has no gradient: the region turns black.
    assert_eq!(out.get_pixel(8, 4).0, [0, 0, 0]);
    assert_eq!(out.get_pixel(15, 15).0, [255, 0, 0]);
}

#[test]
fn injected_logger_sees_stages() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "red.png", &red(10), ImageFormat::Png);
    let capture = Arc::new(Capture::default());
    let driver = Driver::with_logger(capture.clone());

    driver
        .run(&path, &Request::whole(Effect::VignetteWhole))
        .unwrap();

    let lines = capture.lines();
    assert!(lines.iter().any(|(l, m)| *l == Level::Info && m.contains("vignette-whole")));
    for stage in ["loaded", "mask-built", "transformed", "composited", "stored"] {
        assert!(
            lines.iter().any(|(_, m)| m.contains(&format!("stage {stage}"))),
            "missing stage {stage} in {lines:?}"
        );
    }
}

#[test]
fn injected_logger_sees_failures() {
    let dir = tempfile::tempdir().unwrap();
    let capture = Arc::new(Capture::default());
    let driver = Driver::with_logger(capture.clone());

    let _ = driver.run(
        &dir.path().join("gone.png"),
        &Request::whole(Effect::EmbossWhole),
    );

    let lines = capture.lines();
    assert!(
        lines
            .iter()
            .any(|(l, m)| *l == Level::Warn && m.contains("after stage start"))
    );
}
