//! Iterative sigma clipping over one pixel's sample vector.
//!
//! Each call runs a small state machine: center and scale are estimated over
//! the currently included samples, every included sample whose residual
//! violates a configured threshold is excluded (subject to per-side caps),
//! and the loop repeats until nothing changes, too few samples remain, or
//! the iteration limit is hit.
//!
//! Samples are scanned in index order. With `num_mask_low`/`num_mask_high`
//! set, the first violators up to the cap are excluded and later ones are
//! kept, so the result depends on the order of the frames.

use crate::error::{Error, Result};
use crate::math::{
    BIWEIGHT_LOCATION_C, BIWEIGHT_MIDVARIANCE_C, biweight_location_with_scratch,
    biweight_midvariance_with_scratch, mad_to_sigma, mad_with_scratch, nan_median_with_scratch,
};
use crate::stacking::config::{ClipEstimator, SigmaClipConfig};

/// Terminal (or initial) state of a clipping run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipState {
    Iterating,
    /// No exclusions in the last iteration, or too few samples remain.
    Converged,
    /// Stopped by `max_iters` while still excluding samples.
    MaxItersReached,
}

/// Result of [`sigma_clip`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClipOutcome {
    /// Final exclusion mask, `true` = excluded.
    pub excluded: Vec<bool>,
    /// Center from the last iteration (NaN if nothing was included).
    pub center: f64,
    /// Scale from the last iteration (NaN if nothing was included).
    pub scale: f64,
    pub iterations: u32,
    pub state: ClipState,
}

/// Per-thread buffers reused across pixels.
#[derive(Debug, Default)]
pub(crate) struct ClipScratch {
    included: Vec<f64>,
    work: Vec<f64>,
}

/// Summary of an in-place clipping run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClipReport {
    pub center: f64,
    pub scale: f64,
    pub iterations: u32,
    pub state: ClipState,
    /// Samples excluded by this run (not counting the input mask).
    pub newly_excluded: usize,
}

/// Sigma clip `values`, starting from the exclusion mask `excluded`.
///
/// The input mask is left untouched; the returned outcome carries a new one.
/// Non-finite samples take no part in the statistics and are never clipped.
/// When every sample is already excluded the call is a no-op: the mask is
/// returned as is with NaN center/scale and zero iterations.
///
/// Fails if the mask length differs from `values` or `config` is invalid.
pub fn sigma_clip(
    values: &[f64],
    excluded: &[bool],
    config: &SigmaClipConfig,
) -> Result<ClipOutcome> {
    if excluded.len() != values.len() {
        return Err(Error::ArrayLength {
            array: "excluded",
            expected: values.len(),
            actual: excluded.len(),
        });
    }
    config.validate()?;

    let mut mask = excluded.to_vec();
    let mut scratch = ClipScratch::default();
    let report = clip_in_place(values, &mut mask, config, &mut scratch);

    Ok(ClipOutcome {
        excluded: mask,
        center: report.center,
        scale: report.scale,
        iterations: report.iterations,
        state: report.state,
    })
}

#[inline]
fn is_included(value: f64, excluded: bool) -> bool {
    !excluded && value.is_finite()
}

/// Center and scale of `included` using `estimator`.
fn estimate(estimator: ClipEstimator, included: &[f64], work: &mut Vec<f64>) -> (f64, f64) {
    match estimator {
        ClipEstimator::Biweight => {
            let center = biweight_location_with_scratch(included, BIWEIGHT_LOCATION_C, None, work);
            let variance =
                biweight_midvariance_with_scratch(included, BIWEIGHT_MIDVARIANCE_C, None, work);
            (center, variance.sqrt())
        }
        ClipEstimator::MedianMad => {
            let center = nan_median_with_scratch(included, work);
            let mad = mad_with_scratch(included, Some(center), work);
            (center, mad_to_sigma(mad))
        }
    }
}

/// Clip `values` by updating `excluded` in place.
pub(crate) fn clip_in_place(
    values: &[f64],
    excluded: &mut [bool],
    config: &SigmaClipConfig,
    scratch: &mut ClipScratch,
) -> ClipReport {
    debug_assert_eq!(values.len(), excluded.len());

    let mut included_count = values
        .iter()
        .zip(excluded.iter())
        .filter(|&(&v, &ex)| is_included(v, ex))
        .count();

    let mut report = ClipReport {
        center: f64::NAN,
        scale: f64::NAN,
        iterations: 0,
        state: ClipState::Iterating,
        newly_excluded: 0,
    };

    if included_count == 0 {
        report.state = ClipState::Converged;
        return report;
    }

    // Caps apply to the whole call, not to each iteration.
    let mut low_budget = config.num_mask_low.unwrap_or(usize::MAX);
    let mut high_budget = config.num_mask_high.unwrap_or(usize::MAX);

    while report.state == ClipState::Iterating {
        scratch.included.clear();
        scratch.included.extend(
            values
                .iter()
                .zip(excluded.iter())
                .filter(|&(&v, &ex)| is_included(v, ex))
                .map(|(&v, _)| v),
        );

        let (center, scale) = estimate(config.estimator, &scratch.included, &mut scratch.work);
        report.center = center;
        report.scale = scale;
        report.iterations += 1;

        let mut changed = 0;
        for (&value, ex) in values.iter().zip(excluded.iter_mut()) {
            if !is_included(value, *ex) {
                continue;
            }
            let residual = value - center;

            let low = config.thresh_low.is_some_and(|t| residual < -t)
                || config
                    .sigma_thresh_low
                    .is_some_and(|s| residual < -s * scale);
            let high = config.thresh_high.is_some_and(|t| residual > t)
                || config
                    .sigma_thresh_high
                    .is_some_and(|s| residual > s * scale);

            if low && low_budget > 0 {
                low_budget -= 1;
                *ex = true;
                changed += 1;
            } else if high && high_budget > 0 {
                high_budget -= 1;
                *ex = true;
                changed += 1;
            }
        }

        included_count -= changed;
        report.newly_excluded += changed;

        if changed == 0 || included_count <= config.min_batch_size {
            report.state = ClipState::Converged;
        } else if report.iterations >= config.max_iters {
            report.state = ClipState::MaxItersReached;
        }
    }

    report
}
