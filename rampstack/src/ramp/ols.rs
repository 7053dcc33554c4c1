//! Ordinary least-squares fits of one group of reads.

use crate::ramp::GroupFit;

/// Fit `y = slope·t + b` with a free intercept.
///
/// Sums are accumulated in read order. With only two reads the residual
/// variance has no degrees of freedom and the errors are NaN.
pub(crate) fn fit_free(t: &[f64], y: &[f64]) -> GroupFit {
    debug_assert_eq!(t.len(), y.len());

    let n = t.len() as f64;
    let mut sum_t = 0.0;
    let mut sum_y = 0.0;
    let mut sum_tt = 0.0;
    let mut sum_ty = 0.0;
    for (&ti, &yi) in t.iter().zip(y) {
        sum_t += ti;
        sum_y += yi;
        sum_tt += ti * ti;
        sum_ty += ti * yi;
    }

    let denominator = n * sum_tt - sum_t * sum_t;
    let slope = (n * sum_ty - sum_t * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_t) / n;

    let residual_var = sum_squared_residuals(t, y, slope, intercept) / (n - 2.0);
    let slope_error = (residual_var / (sum_tt - sum_t * sum_t / n)).sqrt();
    let intercept_error = (residual_var * sum_tt / denominator).sqrt();

    GroupFit {
        slope,
        slope_error,
        intercept,
        intercept_error,
    }
}

/// Fit `y = slope·t + b` through a known intercept `b`.
pub(crate) fn fit_fixed(t: &[f64], y: &[f64], intercept: f64) -> GroupFit {
    debug_assert_eq!(t.len(), y.len());

    let n = t.len() as f64;
    let mut sum_tt = 0.0;
    let mut sum_ty = 0.0;
    for (&ti, &yi) in t.iter().zip(y) {
        sum_tt += ti * ti;
        sum_ty += ti * (yi - intercept);
    }

    let slope = sum_ty / sum_tt;
    let residual_var = sum_squared_residuals(t, y, slope, intercept) / (n - 1.0);

    GroupFit {
        slope,
        slope_error: (residual_var / sum_tt).sqrt(),
        intercept,
        intercept_error: 0.0,
    }
}

#[inline]
pub(crate) fn sum_squared_residuals(t: &[f64], y: &[f64], slope: f64, intercept: f64) -> f64 {
    t.iter()
        .zip(y)
        .map(|(&ti, &yi)| {
            let r = yi - slope * ti - intercept;
            r * r
        })
        .sum()
}
