//! Math utilities shared by the combination and ramp-fitting kernels.

pub mod statistics;

pub use statistics::*;

/// MAD (Median Absolute Deviation) to standard deviation conversion factor.
///
/// For a normal distribution, σ ≈ 1.4826 × MAD.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Convert MAD to standard deviation (assuming normal distribution).
#[inline]
pub fn mad_to_sigma(mad: f64) -> f64 {
    mad * MAD_TO_SIGMA
}

/// Calculate the median of f64 values in-place using quickselect (O(n) average).
///
/// Mutates the input buffer (partial sort). Values must be finite; callers
/// strip NaN before calling.
#[inline]
pub fn median_f64_mut(data: &mut [f64]) -> f64 {
    debug_assert!(!data.is_empty());

    let len = data.len();
    let mid = len / 2;

    if len.is_multiple_of(2) {
        // For even length, need both middle elements
        let (_, right_median, _) = data.select_nth_unstable_by(mid, f64::total_cmp);
        let right = *right_median;
        // Left median is max of left partition
        let left = data[..mid]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        (left + right) / 2.0
    } else {
        let (_, median, _) = data.select_nth_unstable_by(mid, f64::total_cmp);
        *median
    }
}
