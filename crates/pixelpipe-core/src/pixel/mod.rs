//! Parallel per-pixel execution.
//!
//! - **processor**: row-band fan-out over a fixed worker pool
//! - **filters**: single-image transforms built on the processor

pub mod filters;
pub mod processor;

pub use processor::{row_bands, PixelProcessor};
