//! Row-band parallel execution of per-pixel functions.
//!
//! The output buffer is split into contiguous horizontal bands of
//! `ceil(height / workers)` rows. Each band is handed to one task of a fixed
//! rayon pool and written only by that task, so pure per-pixel functions need
//! no locking and the result does not depend on the worker count.

use rayon::prelude::*;
use std::ops::Range;

use crate::config::ProcessingConfig;
use crate::error::PixelpipeError;
use crate::types::{pixel_or_transparent, Image, Pixel};
use image::Rgba;

/// Fixed worker pool running per-pixel functions over row bands.
pub struct PixelProcessor {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl PixelProcessor {
    /// Create a processor with exactly `workers` threads.
    pub fn new(workers: usize) -> Result<Self, PixelpipeError> {
        if workers == 0 {
            return Err(PixelpipeError::WorkerPool(
                "worker count must be >= 1".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pixelpipe-worker-{i}"))
            .build()
            .map_err(|e| PixelpipeError::WorkerPool(e.to_string()))?;
        tracing::debug!("Pixel processor started with {workers} workers");
        Ok(Self { pool, workers })
    }

    /// Create a processor sized from configuration (0 = twice the CPU count).
    pub fn from_config(config: &ProcessingConfig) -> Result<Self, PixelpipeError> {
        Self::new(config.resolved_workers())
    }

    /// Number of worker threads (and the maximum number of bands).
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `transform` to every pixel, returning a new image.
    pub fn process<F>(&self, image: &Image, transform: F) -> Image
    where
        F: Fn(Pixel) -> Pixel + Sync,
    {
        let (width, height) = image.dimensions();
        let mut output = Image::new(width, height);
        self.for_each_band(&mut output, |x, y, _| transform(*image.get_pixel(x, y)));
        output
    }

    /// Blend `top` over `bottom`, returning a new image with `bottom`'s size.
    ///
    /// Pixels of `top` outside its bounds read as fully transparent.
    pub fn combine<F>(&self, bottom: &Image, top: &Image, blend: F) -> Image
    where
        F: Fn(Pixel, Pixel) -> Pixel + Sync,
    {
        let mut output = bottom.clone();
        self.apply_into(&mut output, top, blend);
        output
    }

    /// Blend `src` into `dst` in place.
    ///
    /// The caller owns `dst` exclusively; clone first to keep the original.
    pub fn apply_into<F>(&self, dst: &mut Image, src: &Image, blend: F)
    where
        F: Fn(Pixel, Pixel) -> Pixel + Sync,
    {
        self.for_each_band(dst, |x, y, current| {
            blend(current, pixel_or_transparent(src, x, y))
        });
    }

    /// Map every pixel to a scalar, returning a row-major buffer.
    pub fn buffer<F>(&self, image: &Image, f: F) -> Vec<f64>
    where
        F: Fn(Pixel) -> f64 + Sync,
    {
        let (width, height) = image.dimensions();
        let mut buf = vec![0.0; width as usize * height as usize];
        if buf.is_empty() {
            return buf;
        }

        let rows = band_rows(height, self.workers);
        let band_len = rows as usize * width as usize;
        self.pool.install(|| {
            buf.par_chunks_mut(band_len)
                .enumerate()
                .for_each(|(band, chunk)| {
                    let start_y = band as u32 * rows;
                    for (i, value) in chunk.iter_mut().enumerate() {
                        let x = (i % width as usize) as u32;
                        let y = start_y + (i / width as usize) as u32;
                        *value = f(*image.get_pixel(x, y));
                    }
                });
        });
        buf
    }

    /// Rewrite every pixel of `output` from `(x, y, current) -> new`.
    fn for_each_band<F>(&self, output: &mut Image, pixel_at: F)
    where
        F: Fn(u32, u32, Pixel) -> Pixel + Sync,
    {
        let (width, height) = output.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        let rows = band_rows(height, self.workers);
        let band_len = rows as usize * width as usize * 4;
        let samples: &mut [u16] = output;
        self.pool.install(|| {
            samples
                .par_chunks_mut(band_len)
                .enumerate()
                .for_each(|(band, chunk)| {
                    let start_y = band as u32 * rows;
                    for (i, px) in chunk.chunks_exact_mut(4).enumerate() {
                        let x = (i % width as usize) as u32;
                        let y = start_y + (i / width as usize) as u32;
                        let current = Rgba([px[0], px[1], px[2], px[3]]);
                        let Rgba(next) = pixel_at(x, y, current);
                        px.copy_from_slice(&next);
                    }
                });
        });
    }
}

/// Rows per band for a given height and worker count.
fn band_rows(height: u32, workers: usize) -> u32 {
    let workers = workers.clamp(1, height.max(1) as usize) as u32;
    height.div_ceil(workers)
}

/// The row bands a processor with `workers` threads splits `height` into.
///
/// Bands are contiguous, non-empty and cover `0..height` exactly once.
pub fn row_bands(height: u32, workers: usize) -> Vec<Range<u32>> {
    if height == 0 {
        return Vec::new();
    }
    let rows = band_rows(height, workers);
    (0..height)
        .step_by(rows as usize)
        .map(|start| start..(start + rows).min(height))
        .collect()
}
