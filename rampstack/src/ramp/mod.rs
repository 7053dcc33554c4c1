//! Up-the-ramp slope fitting.
//!
//! A ramp cube holds `reads[H, W, G, R]`: for every pixel, `G` groups
//! (reset-to-reset integrations) of `R` non-destructive reads, sampled at
//! `times[G, R]` seconds. Each group is fitted independently (OLS or MCDS)
//! and the per-group slopes are merged with inverse-variance weights.
//!
//! Raw counts of any primitive numeric type are cast to `f64` before any
//! arithmetic, so integer detector counts cannot overflow.

pub mod config;
mod mcds;
mod ols;


use common::Buffer2;
use num_traits::AsPrimitive;

use crate::common::parallel_map_with;
use crate::error::{Error, Result};

pub use config::{
    DEFAULT_NUM_COADD, Intercept, RampFitConfig, RampFitMethod, RampFitMethodKind, RampFitOptions,
};

/// Dimensions of a ramp cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampShape {
    pub height: usize,
    pub width: usize,
    pub groups: usize,
    pub reads: usize,
}

impl RampShape {
    pub fn pixel_count(&self) -> usize {
        self.height * self.width
    }

    /// Reads per pixel across all groups.
    pub fn samples_per_pixel(&self) -> usize {
        self.groups * self.reads
    }

    pub fn len(&self) -> usize {
        self.pixel_count() * self.samples_per_pixel()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated view of a ramp cube.
///
/// `reads` and the optional `dq` are flat `[H, W, G, R]` arrays in
/// row-major order, so each pixel's `G × R` samples are contiguous.
#[derive(Debug, Clone)]
pub struct RampCube<'a, T> {
    reads: &'a [T],
    dq: Option<&'a [u32]>,
    /// `times[g][r]` stored as a `G × R` buffer.
    times: Buffer2<f64>,
    shape: RampShape,
}

impl<'a, T> RampCube<'a, T>
where
    T: AsPrimitive<f64> + Sync,
{
    /// Validate `reads` against `shape` and `times` (one row per group).
    pub fn new(reads: &'a [T], shape: RampShape, times: &[Vec<f64>]) -> Result<Self> {
        if shape.groups == 0 {
            return Err(Error::InvalidParameter {
                parameter: "groups",
                reason: "a ramp needs at least one group".to_string(),
            });
        }
        if shape.reads < 2 {
            return Err(Error::InvalidParameter {
                parameter: "reads",
                reason: format!("a ramp needs at least two reads per group, got {}", shape.reads),
            });
        }
        if reads.len() != shape.len() {
            return Err(Error::ArrayLength {
                array: "reads",
                expected: shape.len(),
                actual: reads.len(),
            });
        }

        let expected = (shape.groups, shape.reads);
        if times.len() != shape.groups {
            return Err(Error::TimesShapeMismatch {
                expected,
                actual: (times.len(), times.first().map_or(0, Vec::len)),
            });
        }
        if let Some(row) = times.iter().find(|row| row.len() != shape.reads) {
            return Err(Error::TimesShapeMismatch {
                expected,
                actual: (times.len(), row.len()),
            });
        }
        for (group, row) in times.iter().enumerate() {
            if row.windows(2).any(|w| !(w[1] > w[0])) {
                return Err(Error::NonMonotonicTimes { group });
            }
        }

        let flat: Vec<f64> = times.iter().flatten().copied().collect();
        let times = Buffer2::from_vec(shape.reads, shape.groups, flat).ok_or(Error::ArrayLength {
            array: "times",
            expected: shape.samples_per_pixel(),
            actual: times.iter().map(Vec::len).sum(),
        })?;

        Ok(Self {
            reads,
            dq: None,
            times,
            shape,
        })
    }

    /// Attach per-read DQ flags (`[H, W, G, R]`, 0 = good).
    pub fn with_dq(mut self, dq: &'a [u32]) -> Result<Self> {
        if dq.len() != self.shape.len() {
            return Err(Error::ArrayLength {
                array: "dq",
                expected: self.shape.len(),
                actual: dq.len(),
            });
        }
        self.dq = Some(dq);
        Ok(self)
    }

    pub fn shape(&self) -> RampShape {
        self.shape
    }

    /// Read times of group `g`.
    pub fn group_times(&self, g: usize) -> &[f64] {
        let start = self.times.offset(g, 0);
        &self.times.pixels()[start..start + self.shape.reads]
    }

    fn pixel_reads(&self, pixel: usize) -> &[T] {
        let n = self.shape.samples_per_pixel();
        &self.reads[pixel * n..(pixel + 1) * n]
    }

    /// 1 when every read of the pixel is flagged, otherwise 0.
    fn pixel_dq(&self, pixel: usize) -> u32 {
        let Some(dq) = self.dq else {
            return 0;
        };
        let n = self.shape.samples_per_pixel();
        u32::from(dq[pixel * n..(pixel + 1) * n].iter().all(|&q| q != 0))
    }
}

/// Slope (and optionally intercept) fitted to one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GroupFit {
    pub slope: f64,
    pub slope_error: f64,
    pub intercept: f64,
    pub intercept_error: f64,
}

/// Per-pixel fit result planes, each `[H, W]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RampFitResult {
    pub slope: Buffer2<f64>,
    pub slope_error: Buffer2<f64>,
    pub dq: Buffer2<u32>,
    /// Present only for OLS with a free intercept.
    pub intercept: Option<Buffer2<f64>>,
    pub intercept_error: Option<Buffer2<f64>>,
}

/// Inverse-variance weighted mean of per-group `(value, error)` estimates.
///
/// If the first group's error is exactly zero its estimate is returned
/// unchanged, whatever the other groups hold. Any other group whose weight
/// is infinite (zero error) dominates the sum: the result is the plain mean
/// of those groups with zero error.
pub fn combine_groups(estimates: &[(f64, f64)]) -> (f64, f64) {
    let Some(&first) = estimates.first() else {
        return (f64::NAN, f64::NAN);
    };
    if first.1 == 0.0 {
        return first;
    }

    let weight = |error: f64| 1.0 / (error * error);

    let mut exact_sum = 0.0;
    let mut exact_count = 0usize;
    for &(value, error) in estimates {
        if weight(error).is_infinite() {
            exact_sum += value;
            exact_count += 1;
        }
    }
    if exact_count > 0 {
        return (exact_sum / exact_count as f64, 0.0);
    }

    let mut sum_w = 0.0;
    let mut sum_vw = 0.0;
    for &(value, error) in estimates {
        let w = weight(error);
        sum_vw += value * w;
        sum_w += w;
    }
    (sum_vw / sum_w, (1.0 / sum_w).sqrt())
}

#[derive(Debug, Clone, Copy, Default)]
struct PixelFit {
    slope: f64,
    slope_error: f64,
    intercept: f64,
    intercept_error: f64,
    dq: u32,
}

#[derive(Debug, Default)]
struct RampScratch {
    y: Vec<f64>,
    slopes: Vec<(f64, f64)>,
    intercepts: Vec<(f64, f64)>,
}

/// Fit every pixel of `cube`.
///
/// The configuration is checked against the cube before any pixel is
/// fitted. Degenerate pixels (e.g. two-read groups under a free OLS fit)
/// come out as NaN.
pub fn fit_ramp<T>(cube: &RampCube<'_, T>, config: &RampFitConfig) -> Result<RampFitResult>
where
    T: AsPrimitive<f64> + Sync,
{
    let shape = cube.shape();
    config.validate(&shape)?;

    tracing::debug!(
        height = shape.height,
        width = shape.width,
        groups = shape.groups,
        reads = shape.reads,
        method = %config.kind(),
        "Fitting ramps"
    );

    let fits = parallel_map_with(shape.pixel_count(), RampScratch::default, |scratch, pixel| {
        fit_pixel(cube, config, scratch, pixel)
    });

    let plane = |f: fn(&PixelFit) -> f64| {
        Buffer2::from_fn(shape.width, shape.height, |row, col| {
            f(&fits[row * shape.width + col])
        })
    };

    let with_intercept = matches!(
        config.method,
        RampFitMethod::Ols {
            intercept: Intercept::Free
        }
    );

    let result = RampFitResult {
        slope: plane(|p| p.slope),
        slope_error: plane(|p| p.slope_error),
        dq: Buffer2::from_fn(shape.width, shape.height, |row, col| {
            fits[row * shape.width + col].dq
        }),
        intercept: with_intercept.then(|| plane(|p| p.intercept)),
        intercept_error: with_intercept.then(|| plane(|p| p.intercept_error)),
    };

    let nan_pixels = result.slope.pixels().iter().filter(|v| v.is_nan()).count();
    if nan_pixels > 0 {
        tracing::debug!(nan_pixels, "Some pixels have no usable slope");
    }

    Ok(result)
}

fn fit_pixel<T>(
    cube: &RampCube<'_, T>,
    config: &RampFitConfig,
    scratch: &mut RampScratch,
    pixel: usize,
) -> PixelFit
where
    T: AsPrimitive<f64> + Sync,
{
    let shape = cube.shape();
    let reads = cube.pixel_reads(pixel);

    scratch.slopes.clear();
    scratch.intercepts.clear();

    for (g, group) in reads.chunks_exact(shape.reads).enumerate() {
        scratch.y.clear();
        scratch.y.extend(group.iter().map(|&v| v.as_()));
        let t = cube.group_times(g);

        let fit = match &config.method {
            RampFitMethod::Ols {
                intercept: Intercept::Free,
            } => ols::fit_free(t, &scratch.y),
            RampFitMethod::Ols {
                intercept: Intercept::Fixed(b),
            } => ols::fit_fixed(t, &scratch.y, b[pixel]),
            RampFitMethod::Mcds { num_coadd } => mcds::fit(t, &scratch.y, *num_coadd),
        };

        scratch.slopes.push((fit.slope, fit.slope_error));
        scratch.intercepts.push((fit.intercept, fit.intercept_error));
    }

    let (slope, slope_error) = combine_groups(&scratch.slopes);
    let (intercept, intercept_error) = combine_groups(&scratch.intercepts);

    PixelFit {
        slope,
        slope_error,
        intercept,
        intercept_error,
        dq: cube.pixel_dq(pixel),
    }
}
