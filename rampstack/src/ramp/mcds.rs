//! Multiple correlated double sampling of one group of reads.

use crate::ramp::GroupFit;
use crate::ramp::ols::sum_squared_residuals;

/// Slope between the mean of the first and the mean of the last
/// `num_coadd` reads.
///
/// The error comes from the residuals about the line through the first
/// coadd point with that slope. `num_coadd = 1` is classic CDS.
pub(crate) fn fit(t: &[f64], y: &[f64], num_coadd: usize) -> GroupFit {
    debug_assert_eq!(t.len(), y.len());
    debug_assert!(num_coadd >= 1 && 2 * num_coadd <= t.len());

    let n = t.len();
    let k = num_coadd as f64;
    let mean = |v: &[f64]| v.iter().sum::<f64>() / k;

    let y_first = mean(&y[..num_coadd]);
    let y_last = mean(&y[n - num_coadd..]);
    let t_first = mean(&t[..num_coadd]);
    let t_last = mean(&t[n - num_coadd..]);

    let slope = (y_last - y_first) / (t_last - t_first);
    let intercept = y_first - slope * t_first;

    let sum_tt: f64 = t.iter().map(|&ti| ti * ti).sum();
    let rss = sum_squared_residuals(t, y, slope, intercept);
    let slope_error = (rss / ((n as f64 - 1.0) * sum_tt)).sqrt();

    GroupFit {
        slope,
        slope_error,
        intercept,
        intercept_error: f64::NAN,
    }
}
