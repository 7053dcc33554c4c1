//! Per-pixel frame combination on the CPU.

use common::Buffer2;

use crate::common::parallel_map_with;
use crate::error::Result;
use crate::math::{
    nan_mean, nan_median_with_scratch, weighted_mean, weighted_quantile_with_scratch,
    weighted_stddev,
};
use crate::stacking::config::{CombineConfig, CombineMethod, ErrorCalc};
use crate::stacking::frame::FrameStack;
use crate::stacking::rejection::{ClipScratch, clip_in_place};
use crate::stacking::stats::ClipStats;

/// Combined data, error and DQ planes.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinationResult {
    pub data: Buffer2<f64>,
    pub err: Buffer2<f64>,
    pub dq: Buffer2<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PixelOutput {
    data: f64,
    err: f64,
    dq: u32,
}

/// Buffers for one pixel column, reused across pixels by each worker.
#[derive(Debug, Default)]
struct PixelScratch {
    values: Vec<f64>,
    errors: Vec<f64>,
    weights: Vec<f64>,
    dq: Vec<u32>,
    excluded: Vec<bool>,
    sort: Vec<f64>,
    pairs: Vec<(f64, f64)>,
    clip: ClipScratch,
}

impl PixelScratch {
    /// Gather the frame-axis samples at `pixel` and build the initial mask.
    ///
    /// Samples with DQ != 0 or non-finite data are excluded. Excluded samples
    /// are blanked to NaN with zero weight so every estimator skips them.
    fn load(&mut self, stack: &FrameStack, pixel: usize) {
        self.values.clear();
        self.errors.clear();
        self.weights.clear();
        self.dq.clear();
        self.excluded.clear();

        for frame in stack.frames() {
            let value = frame.data()[pixel];
            let error = frame.err()[pixel];
            let dq = frame.dq()[pixel];
            let excluded = dq != 0 || !value.is_finite();

            self.values.push(if excluded { f64::NAN } else { value });
            self.errors.push(error);
            self.weights
                .push(if excluded { 0.0 } else { 1.0 / (error * error) });
            self.dq.push(dq);
            self.excluded.push(excluded);
        }
    }

    /// Blank samples that clipping excluded.
    fn apply_mask(&mut self) {
        for ((value, weight), &excluded) in self
            .values
            .iter_mut()
            .zip(self.weights.iter_mut())
            .zip(&self.excluded)
        {
            if excluded {
                *value = f64::NAN;
                *weight = 0.0;
            }
        }
    }

    fn survivors(&self) -> usize {
        self.excluded.iter().filter(|&&e| !e).count()
    }
}

/// Combine a frame stack pixel by pixel.
///
/// Configuration is validated before any pixel is processed. Pixels with no
/// surviving samples come out as NaN in data and error; that is never an
/// error.
pub fn combine(stack: &FrameStack, config: &CombineConfig) -> Result<CombinationResult> {
    config.validate()?;

    let (width, height) = stack.dims();
    tracing::debug!(
        frames = stack.len(),
        width,
        height,
        method = %config.method,
        error_calc = %config.error_calc,
        dq_reduce = %config.dq_reduce,
        sigma_clip = config.sigma_clip.is_some(),
        "Combining frame stack"
    );

    let stats = ClipStats::default();
    let pixels = parallel_map_with(stack.pixel_count(), PixelScratch::default, |scratch, idx| {
        scratch.load(stack, idx);
        combine_pixel(scratch, config, &stats)
    });

    if config.sigma_clip.is_some() {
        stats.log_summary(stack.len());
    }

    Ok(split_planes(width, height, &pixels))
}

fn split_planes(width: usize, height: usize, pixels: &[PixelOutput]) -> CombinationResult {
    let data = Buffer2::from_fn(width, height, |row, col| pixels[row * width + col].data);
    let err = Buffer2::from_fn(width, height, |row, col| pixels[row * width + col].err);
    let dq = Buffer2::from_fn(width, height, |row, col| pixels[row * width + col].dq);
    CombinationResult { data, err, dq }
}

fn combine_pixel(s: &mut PixelScratch, config: &CombineConfig, stats: &ClipStats) -> PixelOutput {
    if let Some(clip) = &config.sigma_clip {
        let candidates = s.survivors();
        if candidates > 0 {
            let report = clip_in_place(&s.values, &mut s.excluded, clip, &mut s.clip);
            stats.record(candidates, &report);
            s.apply_mask();
        }
    }

    let data = match config.method {
        CombineMethod::Mean => nan_mean(&s.values),
        CombineMethod::Median => nan_median_with_scratch(&s.values, &mut s.sort),
        CombineMethod::WeightedMean => weighted_mean(&s.values, &s.weights),
        CombineMethod::WeightedMedian => {
            weighted_quantile_with_scratch(&s.values, &s.weights, 0.5, &mut s.pairs)
        }
    };

    let err = match config.error_calc {
        ErrorCalc::Measure => measure_error(s),
        ErrorCalc::Propagate => propagate_error(s, data),
    };

    PixelOutput {
        data,
        err,
        dq: config.dq_reduce.reduce(s.dq.iter().copied()),
    }
}

/// Standard error of the weighted mean estimated from the sample scatter.
fn measure_error(s: &PixelScratch) -> f64 {
    match s.survivors() {
        0 => f64::NAN,
        1 => s
            .excluded
            .iter()
            .position(|&e| !e)
            .map_or(f64::NAN, |i| s.errors[i]),
        n => weighted_stddev(&s.values, &s.weights, None) / ((n - 1) as f64).sqrt(),
    }
}

/// Inverse-variance quadrature sum of the surviving input errors.
fn propagate_error(s: &PixelScratch, data: f64) -> f64 {
    if !data.is_finite() {
        return f64::NAN;
    }
    let inverse_variance: f64 = s
        .errors
        .iter()
        .zip(&s.excluded)
        .filter(|&(_, &excluded)| !excluded)
        .map(|(&e, _)| 1.0 / (e * e))
        .sum();
    if inverse_variance == 0.0 {
        return f64::NAN;
    }
    inverse_variance.powf(-0.5)
}
