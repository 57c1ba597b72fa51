//! regionfx-io: filesystem driver for regionfx.
//!
//! Loads an image file, runs one [`Request`](regionfx_pipeline::Request)
//! through the sans-IO pipeline in `regionfx-pipeline`, and overwrites the
//! file atomically. Logging goes through an injected [`log::Log`] handle.

pub mod driver;
pub mod store;

pub use driver::{Driver, GlobalLogger, Report};
