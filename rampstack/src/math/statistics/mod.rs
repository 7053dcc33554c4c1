//! Robust and weighted statistics over a single pixel's sample vector.
//!
//! Every function here is pure. Non-finite samples (and, for weighted
//! functions, samples whose weight is zero or non-finite) are skipped but
//! may stay in the input so indices line up with the frame axis. Empty or
//! fully excluded input yields NaN instead of an error; callers treat NaN
//! as "no usable data at this pixel".

use super::{MAD_TO_SIGMA, median_f64_mut};

/// Tuning constant for [`biweight_location`].
pub const BIWEIGHT_LOCATION_C: f64 = 6.0;

/// Tuning constant for [`biweight_midvariance`].
pub const BIWEIGHT_MIDVARIANCE_C: f64 = 9.0;

#[inline]
fn is_usable_weight(w: f64) -> bool {
    w.is_finite() && w > 0.0
}

/// Copy the finite entries of `x` into `out`.
#[inline]
fn collect_finite(x: &[f64], out: &mut Vec<f64>) {
    out.clear();
    out.extend(x.iter().copied().filter(|v| v.is_finite()));
}

/// Mean of the finite entries of `x`, NaN if there are none.
pub fn nan_mean(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in x.iter().filter(|v| v.is_finite()) {
        sum += v;
        count += 1;
    }
    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}

/// Median of the finite entries of `x`, NaN if there are none.
pub fn nan_median(x: &[f64]) -> f64 {
    let mut scratch = Vec::with_capacity(x.len());
    nan_median_with_scratch(x, &mut scratch)
}

/// [`nan_median`] reusing `scratch` for the partial sort.
pub fn nan_median_with_scratch(x: &[f64], scratch: &mut Vec<f64>) -> f64 {
    collect_finite(x, scratch);
    if scratch.is_empty() {
        return f64::NAN;
    }
    median_f64_mut(scratch)
}

/// Weighted mean `Σ(x·w) / Σw` over entries where both `x` and `w` are finite.
///
/// NaN when the weight sum is zero.
pub fn weighted_mean(x: &[f64], w: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), w.len());

    let mut sum_xw = 0.0;
    let mut sum_w = 0.0;
    for (&xi, &wi) in x.iter().zip(w) {
        if xi.is_finite() && wi.is_finite() {
            sum_xw += xi * wi;
            sum_w += wi;
        }
    }
    if sum_w == 0.0 {
        return f64::NAN;
    }
    sum_xw / sum_w
}

/// Bias-corrected weighted standard deviation.
///
/// Weights are treated as reliability weights: they are normalized to sum
/// to one and the weighted variance is divided by `1 − Σwᵢ²`. `center`
/// defaults to the weighted mean. NaN when fewer than two samples carry
/// weight.
pub fn weighted_stddev(x: &[f64], w: &[f64], center: Option<f64>) -> f64 {
    debug_assert_eq!(x.len(), w.len());

    let mut sum_w = 0.0;
    let mut count = 0usize;
    for (&xi, &wi) in x.iter().zip(w) {
        if xi.is_finite() && is_usable_weight(wi) {
            sum_w += wi;
            count += 1;
        }
    }
    if count < 2 {
        return f64::NAN;
    }

    let usable = move || {
        x.iter()
            .zip(w)
            .filter(|&(&xi, &wi)| xi.is_finite() && is_usable_weight(wi))
            .map(move |(&xi, &wi)| (xi, wi / sum_w))
    };

    let mu = center.unwrap_or_else(|| usable().map(|(xi, wn)| xi * wn).sum());

    let mut sum_w2 = 0.0;
    let mut weighted_sq = 0.0;
    for (xi, wn) in usable() {
        let dev = xi - mu;
        sum_w2 += wn * wn;
        weighted_sq += dev * dev * wn;
    }

    let bias_correction = 1.0 - sum_w2;
    (weighted_sq / bias_correction).sqrt()
}

/// Median absolute deviation `median(|x − center|)` over finite entries.
///
/// `center` defaults to the median of `x`.
pub fn median_absolute_deviation(x: &[f64], center: Option<f64>) -> f64 {
    let mut scratch = Vec::with_capacity(x.len());
    mad_with_scratch(x, center, &mut scratch)
}

/// [`median_absolute_deviation`] reusing `scratch`.
pub fn mad_with_scratch(x: &[f64], center: Option<f64>, scratch: &mut Vec<f64>) -> f64 {
    collect_finite(x, scratch);
    if scratch.is_empty() {
        return f64::NAN;
    }
    let center = match center {
        Some(c) => c,
        None => median_f64_mut(scratch),
    };
    for v in scratch.iter_mut() {
        *v = (*v - center).abs();
    }
    median_f64_mut(scratch)
}

/// Gaussian-equivalent standard deviation from the MAD about the median.
pub fn mad_std(x: &[f64]) -> f64 {
    median_absolute_deviation(x, None) * MAD_TO_SIGMA
}

/// Tukey biweight location with tuning constant `c`.
///
/// `center` (the initial guess `M`) defaults to the median. When the MAD is
/// zero or non-finite every finite sample equals `M` (or there are too few
/// to tell), so `M` is returned unchanged.
pub fn biweight_location(x: &[f64], c: f64, center: Option<f64>) -> f64 {
    let mut scratch = Vec::with_capacity(x.len());
    biweight_location_with_scratch(x, c, center, &mut scratch)
}

/// [`biweight_location`] reusing `scratch`.
pub fn biweight_location_with_scratch(
    x: &[f64],
    c: f64,
    center: Option<f64>,
    scratch: &mut Vec<f64>,
) -> f64 {
    let median = nan_median_with_scratch(x, scratch);
    if median.is_nan() {
        return f64::NAN;
    }
    let m = center.unwrap_or(median);

    let mad = mad_with_scratch(x, Some(median), scratch);
    if mad == 0.0 || !mad.is_finite() {
        return m;
    }

    let scale = c * mad;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for &v in x.iter().filter(|v| v.is_finite()) {
        let d = v - m;
        let u = d / scale;
        let u2 = u * u;
        if u2 < 1.0 {
            let weight = (1.0 - u2) * (1.0 - u2);
            numerator += d * weight;
            denominator += weight;
        }
    }

    if denominator == 0.0 {
        return m;
    }
    m + numerator / denominator
}

/// Tukey biweight midvariance with tuning constant `c`.
///
/// Only samples with `|u| < 1` contribute, and their count is used as the
/// sample size. Returns the squared MAD (zero or NaN) when the MAD is zero
/// or non-finite.
pub fn biweight_midvariance(x: &[f64], c: f64, center: Option<f64>) -> f64 {
    let mut scratch = Vec::with_capacity(x.len());
    biweight_midvariance_with_scratch(x, c, center, &mut scratch)
}

/// [`biweight_midvariance`] reusing `scratch`.
pub fn biweight_midvariance_with_scratch(
    x: &[f64],
    c: f64,
    center: Option<f64>,
    scratch: &mut Vec<f64>,
) -> f64 {
    let median = nan_median_with_scratch(x, scratch);
    if median.is_nan() {
        return f64::NAN;
    }
    let m = center.unwrap_or(median);

    let mad = mad_with_scratch(x, Some(median), scratch);
    if mad == 0.0 || !mad.is_finite() {
        return mad * mad;
    }

    let scale = c * mad;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut n_good = 0usize;
    for &v in x.iter().filter(|v| v.is_finite()) {
        let d = v - m;
        let u = d / scale;
        let u2 = u * u;
        if u2 < 1.0 {
            let one_minus = 1.0 - u2;
            numerator += d * d * one_minus.powi(4);
            denominator += one_minus * (1.0 - 5.0 * u2);
            n_good += 1;
        }
    }

    if denominator == 0.0 {
        return f64::NAN;
    }
    n_good as f64 * numerator / (denominator * denominator)
}

/// Weighted quantile by cumulative weight.
///
/// Samples are sorted by value (stable, so equal values keep index order)
/// and weights accumulated until the running sum reaches `q · Σw`. When the
/// running sum lands exactly on the target and another sample follows, the
/// two boundary values are averaged; otherwise the last accumulated value
/// is returned. `q <= 0` gives the minimum and `q >= 1` the maximum.
pub fn weighted_quantile(x: &[f64], w: &[f64], q: f64) -> f64 {
    let mut pairs = Vec::with_capacity(x.len());
    weighted_quantile_with_scratch(x, w, q, &mut pairs)
}

/// [`weighted_quantile`] reusing `pairs` as the sort buffer.
pub fn weighted_quantile_with_scratch(
    x: &[f64],
    w: &[f64],
    q: f64,
    pairs: &mut Vec<(f64, f64)>,
) -> f64 {
    debug_assert_eq!(x.len(), w.len());

    pairs.clear();
    pairs.extend(
        x.iter()
            .zip(w)
            .filter(|&(&xi, &wi)| xi.is_finite() && is_usable_weight(wi))
            .map(|(&xi, &wi)| (xi, wi)),
    );
    if pairs.is_empty() {
        return f64::NAN;
    }

    if q <= 0.0 {
        return pairs.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    }
    if q >= 1.0 {
        return pairs.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    }

    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total_weight: f64 = pairs.iter().map(|p| p.1).sum();
    let target_weight = q * total_weight;

    let mut weight_sum = 0.0;
    let mut i = 0;
    while i < pairs.len() && weight_sum < target_weight {
        weight_sum += pairs[i].1;
        i += 1;
    }

    if weight_sum == target_weight && i < pairs.len() {
        (pairs[i - 1].0 + pairs[i].0) / 2.0
    } else if i > 0 {
        pairs[i - 1].0
    } else {
        pairs[0].0
    }
}

/// Samples kept by the weighted-median/MAD screen used by [`robust_mean`]
/// and [`robust_stddev`].
fn robust_subset(x: &[f64], w: Option<&[f64]>, n_sigma: f64) -> (Vec<f64>, Vec<f64>) {
    let ones;
    let w = match w {
        Some(w) => w,
        None => {
            ones = vec![1.0; x.len()];
            &ones[..]
        }
    };

    let median = weighted_quantile(x, w, 0.5);
    let abs_devs: Vec<f64> = x.iter().map(|&v| (median - v).abs()).collect();
    let mad = weighted_quantile(&abs_devs, w, 0.5);
    let cutoff = MAD_TO_SIGMA * mad * n_sigma;

    let mut kept_x = Vec::with_capacity(x.len());
    let mut kept_w = Vec::with_capacity(x.len());
    for ((&xi, &wi), &dev) in x.iter().zip(w).zip(&abs_devs) {
        if dev < cutoff {
            kept_x.push(xi);
            kept_w.push(wi);
        }
    }
    (kept_x, kept_w)
}

/// Weighted mean after discarding samples beyond `n_sigma` MAD-sigmas of
/// the weighted median. NaN when fewer than two samples survive.
pub fn robust_mean(x: &[f64], w: Option<&[f64]>, n_sigma: f64) -> f64 {
    let (kept_x, kept_w) = robust_subset(x, w, n_sigma);
    if kept_x.len() < 2 {
        return f64::NAN;
    }
    let sum_w: f64 = kept_w.iter().sum();
    kept_x.iter().zip(&kept_w).map(|(&xi, &wi)| xi * wi).sum::<f64>() / sum_w
}

/// [`weighted_stddev`] of the samples kept by the same screen as
/// [`robust_mean`]. NaN when fewer than two samples survive.
pub fn robust_stddev(x: &[f64], w: Option<&[f64]>, n_sigma: f64) -> f64 {
    let (kept_x, kept_w) = robust_subset(x, w, n_sigma);
    if kept_x.len() < 2 {
        return f64::NAN;
    }
    weighted_stddev(&kept_x, &kept_w, None)
}
