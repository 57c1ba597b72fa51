//! The pipeline driver: load a file, run one request, store the result.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::ImageFormat;
use log::{Level, Log, Metadata, Record};
use regionfx_pipeline::pipeline::{PipelineStage, output_format};
use regionfx_pipeline::{EffectParams, Pipeline, PipelineError, Request, Stage};

use crate::store;

const TARGET: &str = "regionfx";

/// Forwards every record to the process-wide `log` logger.
///
/// This is the handle a [`Driver`] uses unless another is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            log::logger().log(record);
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Last state reached; always [`Stage::Done`].
    pub stage: Stage,
    /// `false` when the request was a no-op and the file was not touched.
    pub changed: bool,
    /// Encoding of the stored file, `None` if nothing was written.
    pub format: Option<ImageFormat>,
    pub bytes_written: usize,
    pub elapsed: Duration,
}

/// Runs requests against image files.
///
/// Each call to [`run`](Self::run) is synchronous, self-contained and
/// stateless; the driver itself only holds the logging handle. Calls on
/// different files may run concurrently. Calls on the same file are not
/// serialized (last writer wins).
#[derive(Clone)]
pub struct Driver {
    logger: Arc<dyn Log>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver").finish_non_exhaustive()
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    /// A driver logging through the global `log` logger.
    #[must_use]
    pub fn new() -> Self {
        Self::with_logger(Arc::new(GlobalLogger))
    }

    #[must_use]
    pub fn with_logger(logger: Arc<dyn Log>) -> Self {
        Self { logger }
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let record = Record::builder()
            .level(level)
            .target(TARGET)
            .module_path_static(Some(module_path!()))
            .file_static(Some(file!()))
            .args(args)
            .build();
        if self.logger.enabled(record.metadata()) {
            self.logger.log(&record);
        }
    }

    fn entered<S: PipelineStage>(&self, reached: &mut Stage, _stage: &S) {
        *reached = S::STAGE;
        self.emit(Level::Debug, format_args!("stage {}", S::STAGE));
    }

    /// Apply `request` to the image at `path`, overwriting it in place.
    ///
    /// The file is replaced atomically, and only after every stage has
    /// succeeded. A no-op request (region effect with an empty region)
    /// leaves the file untouched.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::ImageNotFound`] if the file cannot be read or
    ///   decoded.
    /// - [`PipelineError::InvalidParameters`] for a degenerate polygon.
    /// - [`PipelineError::TransformFailed`] if an effect rejects its
    ///   parameters.
    /// - [`PipelineError::InternalInvariantViolation`] on a size mismatch
    ///   while compositing.
    /// - [`PipelineError::StorageFailed`] if encoding or writing fails.
    pub fn run(&self, path: &Path, request: &Request) -> Result<Report, PipelineError> {
        let started = Instant::now();
        let effect = request.effect.kind();
        self.emit(
            Level::Info,
            format_args!("applying {effect} to {}", path.display()),
        );

        let mut reached = Stage::Start;
        match self.execute(path, request, &mut reached) {
            Ok((changed, format, bytes_written)) => {
                let elapsed = started.elapsed();
                self.emit(
                    Level::Info,
                    format_args!(
                        "{effect} on {} done in {elapsed:?} ({})",
                        path.display(),
                        if changed { "written" } else { "unchanged" }
                    ),
                );
                Ok(Report {
                    stage: Stage::Done,
                    changed,
                    format,
                    bytes_written,
                    elapsed,
                })
            }
            Err(e) => {
                let level = match e {
                    PipelineError::InternalInvariantViolation(_) => Level::Error,
                    _ => Level::Warn,
                };
                self.emit(
                    level,
                    format_args!(
                        "{effect} on {} failed after stage {reached}: {e}",
                        path.display()
                    ),
                );
                Err(e)
            }
        }
    }

    /// Build a request from its call-surface form and [`run`](Self::run)
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownEffect`] or
    /// [`PipelineError::InvalidParameters`] if the request does not
    /// validate, otherwise as [`run`](Self::run).
    pub fn apply(
        &self,
        path: &Path,
        effect_id: &str,
        flat_points: &[f32],
        params: &EffectParams,
    ) -> Result<Report, PipelineError> {
        let request = Request::from_wire(effect_id, flat_points, params).inspect_err(|e| {
            self.emit(Level::Warn, format_args!("rejected request: {e}"));
        })?;
        self.run(path, &request)
    }

    fn execute(
        &self,
        path: &Path,
        request: &Request,
        reached: &mut Stage,
    ) -> Result<(bool, Option<ImageFormat>, usize), PipelineError> {
        let source = store::load(path)?;

        let decoded = Pipeline::new(source, request.clone()).decode()?;
        self.entered(reached, &decoded);
        let built = decoded.build_mask()?;
        self.entered(reached, &built);
        let transformed = built.transform()?;
        self.entered(reached, &transformed);
        let composited = transformed.composite()?;
        self.entered(reached, &composited);

        if !composited.changed() {
            self.emit(
                Level::Debug,
                format_args!("empty region, leaving {} untouched", path.display()),
            );
            return Ok((false, None, 0));
        }

        let format = output_format(composited.format(), store::format_hint(path));
        let bytes = composited.encode(format)?;
        store::store_atomic(path, &bytes)?;
        *reached = Stage::Stored;
        self.emit(
            Level::Debug,
            format_args!("stage {} ({} bytes as {format:?})", Stage::Stored, bytes.len()),
        );
        Ok((true, Some(format), bytes.len()))
    }
}
