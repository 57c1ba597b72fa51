//! regionfx: apply one effect to an image file, in place.
//!
//! # Usage
//!
//! ```text
//! regionfx photo.png --effect masked-gaussian-blur --points 10,10,90,10,90,90 --kernel 3
//! regionfx photo.png --effect segment-white-background --points 40,40,60,40,60,60,40,60 --iterations 5
//! regionfx photo.png --request-json '{"effect":"sepia-whole"}'
//! regionfx --list-effects
//! ```
//!
//! Logging follows `RUST_LOG`; `-v` raises the default level to `debug`.
//! The exit status is the same code the C entry points return.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use regionfx_io::Driver;
use regionfx_pipeline::effect::Param;
use regionfx_pipeline::{
    Effect, EffectKind, EffectParams, PipelineError, Polygon, Request, WireRequest,
};

/// Apply a polygon-masked effect to an image file, overwriting it.
#[derive(Parser)]
#[command(name = "regionfx", version)]
struct Cli {
    /// Path to the image (PNG, JPEG, BMP, WebP). Overwritten on success.
    #[arg(required_unless_present = "list_effects")]
    image_path: Option<PathBuf>,

    /// Effect identifier, e.g. `masked-grayscale`.
    #[arg(long, required_unless_present_any = ["request_json", "list_effects"])]
    effect: Option<EffectKind>,

    /// Polygon as a flat comma-separated list `x0,y0,x1,y1,...`.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    points: Vec<f32>,

    /// Kernel radius `k`; the aperture is `2k + 1`.
    #[arg(long)]
    kernel: Option<u32>,

    /// Segmentation iteration budget.
    #[arg(long)]
    iterations: Option<u32>,

    /// Full request as JSON. Overrides the other request flags.
    #[arg(long, conflicts_with_all = ["effect", "points", "kernel", "iterations"])]
    request_json: Option<String>,

    /// Print the registered effects and their options, then exit.
    #[arg(long)]
    list_effects: bool,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn request_from_cli(cli: &Cli) -> Result<Request, PipelineError> {
    if let Some(json) = &cli.request_json {
        let wire: WireRequest = serde_json::from_str(json).map_err(|e| {
            PipelineError::InvalidParameters(format!("malformed --request-json: {e}"))
        })?;
        return wire.into_request();
    }

    let kind = cli
        .effect
        .ok_or_else(|| PipelineError::InvalidParameters("no --effect given".to_string()))?;
    let params = EffectParams {
        iterations: cli.iterations,
        kernel_radius: cli.kernel,
    };
    Ok(Request::new(
        Effect::new(kind, &params)?,
        Polygon::from_flat(&cli.points)?,
    ))
}

fn print_effects() {
    for kind in EffectKind::all() {
        let option = match kind.param() {
            Param::None => "",
            Param::KernelRadius => "--kernel",
            Param::Iterations => "--iterations",
        };
        let scope = format!("{:?}", kind.scope()).to_lowercase();
        println!("{:<28}{scope:<10}{option}", kind.id());
    }
}

fn exit_code(e: &PipelineError) -> ExitCode {
    u8::try_from(e.status_code()).map_or(ExitCode::FAILURE, ExitCode::from)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if cli.list_effects {
        print_effects();
        return ExitCode::SUCCESS;
    }

    let Some(path) = cli.image_path.as_deref() else {
        eprintln!("no image path given");
        return ExitCode::FAILURE;
    };

    let request = match request_from_cli(&cli) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            return exit_code(&e);
        }
    };
    log::debug!("request: {request:?}");

    match Driver::new().run(path, &request) {
        Ok(report) => {
            if report.changed {
                eprintln!(
                    "{} written to {} ({} bytes) in {:.2?}",
                    request.effect.kind(),
                    path.display(),
                    report.bytes_written,
                    report.elapsed,
                );
            } else {
                eprintln!("empty region, {} left unchanged", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code(&e)
        }
    }
}
