//! Frame combination configuration.
//!
//! Every option that callers historically passed as a string (`"wmean"`,
//! `"propagate"`, `"or"`) is a closed enum here. Strings are accepted only
//! at the edge, through [`CombineOptions`] or [`ConfigOption::parse_option`],
//! and are rejected before any pixel is touched.

use std::str::FromStr;

use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};

/// A closed set of values that can be parsed from a configuration string.
pub trait ConfigOption: FromStr + Sized {
    /// Parameter name used in error messages.
    const PARAMETER: &'static str;
    /// Accepted spellings, for error messages.
    const EXPECTED: &'static str;

    /// Parse `value` (case-insensitive) or fail with [`Error::UnknownOption`].
    fn parse_option(value: &str) -> Result<Self> {
        value.trim().parse().map_err(|_| Error::UnknownOption {
            parameter: Self::PARAMETER,
            value: value.to_string(),
            expected: Self::EXPECTED,
        })
    }
}

/// Central-tendency estimator used for the combined pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum CombineMethod {
    /// NaN-ignoring arithmetic mean.
    #[default]
    #[strum(serialize = "mean")]
    Mean,
    /// NaN-ignoring median.
    #[strum(serialize = "median")]
    Median,
    /// Inverse-variance weighted mean.
    #[strum(serialize = "wmean")]
    WeightedMean,
    /// Inverse-variance weighted median.
    #[strum(serialize = "wmedian")]
    WeightedMedian,
}

impl ConfigOption for CombineMethod {
    const PARAMETER: &'static str = "method";
    const EXPECTED: &'static str = "mean, median, wmean, wmedian";
}

/// How the combined error is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ErrorCalc {
    /// Scatter of the surviving samples about their weighted mean.
    #[default]
    Measure,
    /// Inverse-variance quadrature sum of the surviving input errors.
    Propagate,
}

impl ConfigOption for ErrorCalc {
    const PARAMETER: &'static str = "error_calc";
    const EXPECTED: &'static str = "measure, propagate";
}

/// Bitwise reduction of the DQ words across the frame axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DqReduce {
    /// A bit survives only if every frame sets it.
    #[default]
    And,
    /// A bit survives if any frame sets it.
    Or,
}

impl ConfigOption for DqReduce {
    const PARAMETER: &'static str = "dq_reduce";
    const EXPECTED: &'static str = "and, or";
}

impl DqReduce {
    #[inline]
    pub(crate) fn reduce(self, dq: impl IntoIterator<Item = u32>) -> u32 {
        match self {
            DqReduce::And => dq.into_iter().fold(u32::MAX, |acc, q| acc & q),
            DqReduce::Or => dq.into_iter().fold(0, |acc, q| acc | q),
        }
    }
}

/// Center/scale estimators used while sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ClipEstimator {
    /// Biweight location and square root of biweight midvariance.
    #[default]
    #[strum(serialize = "biweight")]
    Biweight,
    /// Median and 1.4826 × MAD.
    #[strum(to_string = "median_mad", serialize = "mad_std")]
    MedianMad,
}

impl ConfigOption for ClipEstimator {
    const PARAMETER: &'static str = "clip_estimator";
    const EXPECTED: &'static str = "biweight, median_mad";
}

/// Iterative outlier rejection parameters.
///
/// All thresholds are magnitudes: a sample is low-violating when its
/// residual from the center is below `-thresh_low` or below
/// `-sigma_thresh_low × scale`, and high-violating when it exceeds
/// `thresh_high` or `sigma_thresh_high × scale`. Unset thresholds are not
/// checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClipConfig {
    /// Sigma-relative threshold below the center.
    pub sigma_thresh_low: Option<f64>,
    /// Sigma-relative threshold above the center.
    pub sigma_thresh_high: Option<f64>,
    /// Absolute residual threshold below the center.
    pub thresh_low: Option<f64>,
    /// Absolute residual threshold above the center.
    pub thresh_high: Option<f64>,
    /// Cap on low-side exclusions per call.
    pub num_mask_low: Option<usize>,
    /// Cap on high-side exclusions per call.
    pub num_mask_high: Option<usize>,
    /// Stop once this many or fewer samples remain included.
    pub min_batch_size: usize,
    /// Maximum number of clipping iterations.
    pub max_iters: u32,
    /// Center/scale estimators.
    pub estimator: ClipEstimator,
}

impl Default for SigmaClipConfig {
    fn default() -> Self {
        Self {
            sigma_thresh_low: None,
            sigma_thresh_high: None,
            thresh_low: None,
            thresh_high: None,
            num_mask_low: None,
            num_mask_high: None,
            min_batch_size: 3,
            max_iters: 50,
            estimator: ClipEstimator::Biweight,
        }
    }
}

impl SigmaClipConfig {
    /// Symmetric sigma-relative clipping.
    pub fn symmetric(sigma: f64) -> Self {
        Self::asymmetric(sigma, sigma)
    }

    /// Sigma-relative clipping with separate low/high thresholds.
    pub fn asymmetric(sigma_low: f64, sigma_high: f64) -> Self {
        Self {
            sigma_thresh_low: Some(sigma_low),
            sigma_thresh_high: Some(sigma_high),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("sigma_thresh_low", self.sigma_thresh_low),
            ("sigma_thresh_high", self.sigma_thresh_high),
            ("thresh_low", self.thresh_low),
            ("thresh_high", self.thresh_high),
        ];
        for (parameter, value) in thresholds {
            if let Some(v) = value
                && !(v.is_finite() && v >= 0.0)
            {
                return Err(Error::InvalidParameter {
                    parameter,
                    reason: format!("must be a finite non-negative number, got {v}"),
                });
            }
        }
        if self.max_iters == 0 {
            return Err(Error::InvalidParameter {
                parameter: "max_iters",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for [`combine`](crate::stacking::combine).
///
/// `sigma_clip: Some(..)` enables outlier rejection before combining.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CombineConfig {
    pub method: CombineMethod,
    pub sigma_clip: Option<SigmaClipConfig>,
    pub error_calc: ErrorCalc,
    pub dq_reduce: DqReduce,
}

impl CombineConfig {
    // ========== Presets ==========

    /// Preset: plain NaN-ignoring mean.
    pub fn mean() -> Self {
        Self::default()
    }

    /// Preset: plain NaN-ignoring median.
    pub fn median() -> Self {
        Self {
            method: CombineMethod::Median,
            ..Default::default()
        }
    }

    /// Preset: inverse-variance weighted mean.
    pub fn weighted_mean() -> Self {
        Self {
            method: CombineMethod::WeightedMean,
            ..Default::default()
        }
    }

    /// Preset: inverse-variance weighted median.
    pub fn weighted_median() -> Self {
        Self {
            method: CombineMethod::WeightedMedian,
            ..Default::default()
        }
    }

    /// Preset: `method` after asymmetric sigma clipping.
    pub fn sigma_clipped(method: CombineMethod, sigma_low: f64, sigma_high: f64) -> Self {
        Self {
            method,
            sigma_clip: Some(SigmaClipConfig::asymmetric(sigma_low, sigma_high)),
            ..Default::default()
        }
    }

    /// Preset used for sky frames: mean after 4σ low / 3σ high clipping,
    /// with DQ bits merged from every frame.
    pub fn sky() -> Self {
        Self {
            dq_reduce: DqReduce::Or,
            ..Self::sigma_clipped(CombineMethod::Mean, 4.0, 3.0)
        }
    }

    // ========== Validation ==========

    pub fn validate(&self) -> Result<()> {
        if let Some(clip) = &self.sigma_clip {
            clip.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a YAML document of [`CombineOptions`].
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: CombineOptions = serde_yml::from_str(yaml)?;
        options.into_config()
    }
}

/// Flat, string-typed combination options as they appear in pipeline
/// configuration files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombineOptions {
    pub method: String,
    pub do_sigma_clip: bool,
    pub sigma_thresh_low: Option<f64>,
    pub sigma_thresh_high: Option<f64>,
    pub thresh_low: Option<f64>,
    pub thresh_high: Option<f64>,
    pub num_mask_low: Option<usize>,
    pub num_mask_high: Option<usize>,
    pub min_batch_size: usize,
    pub max_iters: u32,
    pub clip_estimator: String,
    pub error_calc: String,
    pub dq_reduce: String,
}

impl Default for CombineOptions {
    fn default() -> Self {
        let clip = SigmaClipConfig::default();
        Self {
            method: CombineMethod::default().to_string(),
            do_sigma_clip: false,
            sigma_thresh_low: None,
            sigma_thresh_high: None,
            thresh_low: None,
            thresh_high: None,
            num_mask_low: None,
            num_mask_high: None,
            min_batch_size: clip.min_batch_size,
            max_iters: clip.max_iters,
            clip_estimator: clip.estimator.to_string(),
            error_calc: ErrorCalc::default().to_string(),
            dq_reduce: DqReduce::default().to_string(),
        }
    }
}

impl CombineOptions {
    /// Resolve every string option and validate the result.
    pub fn into_config(self) -> Result<CombineConfig> {
        let method = CombineMethod::parse_option(&self.method)?;
        let error_calc = ErrorCalc::parse_option(&self.error_calc)?;
        let dq_reduce = DqReduce::parse_option(&self.dq_reduce)?;
        let estimator = ClipEstimator::parse_option(&self.clip_estimator)?;

        let sigma_clip = self.do_sigma_clip.then_some(SigmaClipConfig {
            sigma_thresh_low: self.sigma_thresh_low,
            sigma_thresh_high: self.sigma_thresh_high,
            thresh_low: self.thresh_low,
            thresh_high: self.thresh_high,
            num_mask_low: self.num_mask_low,
            num_mask_high: self.num_mask_high,
            min_batch_size: self.min_batch_size,
            max_iters: self.max_iters,
            estimator,
        });

        let config = CombineConfig {
            method,
            sigma_clip,
            error_calc,
            dq_reduce,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CombineConfig::default();
        assert_eq!(config.method, CombineMethod::Mean);
        assert_eq!(config.error_calc, ErrorCalc::Measure);
        assert_eq!(config.dq_reduce, DqReduce::And);
        assert!(config.sigma_clip.is_none());
    }

    #[test]
    fn test_sigma_clip_defaults() {
        let clip = SigmaClipConfig::default();
        assert_eq!(clip.min_batch_size, 3);
        assert_eq!(clip.max_iters, 50);
        assert_eq!(clip.estimator, ClipEstimator::Biweight);
        assert!(clip.sigma_thresh_low.is_none());
    }

    #[test]
    fn test_parse_method_names() {
        assert_eq!(
            CombineMethod::parse_option("wmean").unwrap(),
            CombineMethod::WeightedMean
        );
        assert_eq!(
            CombineMethod::parse_option("WMedian").unwrap(),
            CombineMethod::WeightedMedian
        );
        assert_eq!(
            CombineMethod::parse_option("Median").unwrap(),
            CombineMethod::Median
        );
        assert_eq!(CombineMethod::WeightedMean.to_string(), "wmean");
    }

    #[test]
    fn test_parse_unknown_method() {
        let err = CombineMethod::parse_option("sigma_clip").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownOption { parameter: "method", ref value, .. } if value == "sigma_clip"
        ));
    }

    #[test]
    fn test_parse_error_calc_and_dq_reduce() {
        assert_eq!(
            ErrorCalc::parse_option("propagate").unwrap(),
            ErrorCalc::Propagate
        );
        assert_eq!(DqReduce::parse_option("OR").unwrap(), DqReduce::Or);
        assert!(ErrorCalc::parse_option("guess").is_err());
        assert!(DqReduce::parse_option("xor").is_err());
    }

    #[test]
    fn test_parse_clip_estimator_aliases() {
        assert_eq!(
            ClipEstimator::parse_option("mad_std").unwrap(),
            ClipEstimator::MedianMad
        );
        assert_eq!(ClipEstimator::MedianMad.to_string(), "median_mad");
    }

    #[test]
    fn test_dq_reduce() {
        assert_eq!(DqReduce::And.reduce([0, 0, 4]), 0);
        assert_eq!(DqReduce::Or.reduce([0, 0, 4]), 4);
        assert_eq!(DqReduce::And.reduce([6, 4, 12]), 4);
        assert_eq!(DqReduce::Or.reduce([1, 2, 8]), 11);
    }

    #[test]
    fn test_sky_preset() {
        let config = CombineConfig::sky();
        assert_eq!(config.method, CombineMethod::Mean);
        assert_eq!(config.dq_reduce, DqReduce::Or);
        let clip = config.sigma_clip.unwrap();
        assert_eq!(clip.sigma_thresh_low, Some(4.0));
        assert_eq!(clip.sigma_thresh_high, Some(3.0));
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let config = CombineConfig {
            sigma_clip: Some(SigmaClipConfig {
                thresh_high: Some(-1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                parameter: "thresh_high",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let clip = SigmaClipConfig {
            max_iters: 0,
            ..SigmaClipConfig::symmetric(3.0)
        };
        assert!(clip.validate().is_err());
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = "
method: wmedian
do_sigma_clip: true
sigma_thresh_low: 4.0
sigma_thresh_high: 3.0
num_mask_high: 1
max_iters: 10
error_calc: propagate
dq_reduce: or
";
        let config = CombineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.method, CombineMethod::WeightedMedian);
        assert_eq!(config.error_calc, ErrorCalc::Propagate);
        assert_eq!(config.dq_reduce, DqReduce::Or);
        let clip = config.sigma_clip.unwrap();
        assert_eq!(clip.sigma_thresh_low, Some(4.0));
        assert_eq!(clip.num_mask_high, Some(1));
        assert_eq!(clip.num_mask_low, None);
        assert_eq!(clip.max_iters, 10);
        assert_eq!(clip.min_batch_size, 3);
    }

    #[test]
    fn test_from_yaml_defaults() {
        let config = CombineConfig::from_yaml("method: median").unwrap();
        assert_eq!(config, CombineConfig::median());
    }

    #[test]
    fn test_from_yaml_unknown_method() {
        let err = CombineConfig::from_yaml("method: mode").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownOption {
                parameter: "method",
                ..
            }
        ));
    }

    #[test]
    fn test_from_yaml_unknown_field() {
        let err = CombineConfig::from_yaml("sigma: 4").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
