//! Ramp fitting configuration.

use common::Buffer2;
use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::ramp::RampShape;
use crate::stacking::config::ConfigOption;

/// Number of reads averaged at each end of a group for MCDS by default.
pub const DEFAULT_NUM_COADD: usize = 3;

/// Ramp fitting estimator, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RampFitMethodKind {
    /// Least-squares line through every read of a group.
    #[default]
    Ols,
    /// Multiple correlated double sampling: mean of the last reads minus
    /// mean of the first reads.
    Mcds,
}

impl ConfigOption for RampFitMethodKind {
    const PARAMETER: &'static str = "ramp method";
    const EXPECTED: &'static str = "ols, mcds";
}

/// Intercept handling for OLS fits.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Intercept {
    /// Fit slope and intercept together.
    #[default]
    Free,
    /// Use a known per-pixel intercept (e.g. the bias level), `[H, W]`.
    Fixed(Buffer2<f64>),
}

/// Ramp fitting estimator with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum RampFitMethod {
    Ols { intercept: Intercept },
    Mcds { num_coadd: usize },
}

impl Default for RampFitMethod {
    fn default() -> Self {
        RampFitMethod::Ols {
            intercept: Intercept::Free,
        }
    }
}

/// Configuration for [`fit_ramp`](crate::ramp::fit_ramp).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RampFitConfig {
    pub method: RampFitMethod,
}

impl RampFitConfig {
    /// OLS with a free intercept.
    pub fn ols() -> Self {
        Self::default()
    }

    /// OLS through a known per-pixel intercept.
    pub fn ols_fixed(intercept: Buffer2<f64>) -> Self {
        Self {
            method: RampFitMethod::Ols {
                intercept: Intercept::Fixed(intercept),
            },
        }
    }

    /// MCDS averaging `num_coadd` reads at each end of a group.
    pub fn mcds(num_coadd: usize) -> Self {
        Self {
            method: RampFitMethod::Mcds { num_coadd },
        }
    }

    /// Classic correlated double sampling (first read vs last read).
    pub fn cds() -> Self {
        Self::mcds(1)
    }

    /// Build from the string options used by pipeline configuration files.
    ///
    /// `num_coadd` is ignored for `"ols"`.
    pub fn from_options(method: &str, num_coadd: usize) -> Result<Self> {
        let config = match RampFitMethodKind::parse_option(method)? {
            RampFitMethodKind::Ols => Self::ols(),
            RampFitMethodKind::Mcds => Self::mcds(num_coadd),
        };
        if let RampFitMethod::Mcds { num_coadd: 0 } = config.method {
            return Err(Error::InvalidParameter {
                parameter: "num_coadd",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    /// Parse a YAML document of [`RampFitOptions`].
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: RampFitOptions = serde_yml::from_str(yaml)?;
        Self::from_options(&options.method, options.num_coadd)
    }

    pub fn kind(&self) -> RampFitMethodKind {
        match self.method {
            RampFitMethod::Ols { .. } => RampFitMethodKind::Ols,
            RampFitMethod::Mcds { .. } => RampFitMethodKind::Mcds,
        }
    }

    /// Check the configuration against the cube it will be applied to.
    pub fn validate(&self, shape: &RampShape) -> Result<()> {
        match &self.method {
            RampFitMethod::Ols {
                intercept: Intercept::Fixed(intercept),
            } => {
                let expected = (shape.width, shape.height);
                if intercept.dims() != expected {
                    return Err(Error::PlaneShapeMismatch {
                        plane: "intercept",
                        expected,
                        actual: intercept.dims(),
                    });
                }
            }
            RampFitMethod::Ols { .. } => {}
            RampFitMethod::Mcds { num_coadd } => {
                if *num_coadd == 0 {
                    return Err(Error::InvalidParameter {
                        parameter: "num_coadd",
                        reason: "must be at least 1".to_string(),
                    });
                }
                if 2 * num_coadd > shape.reads {
                    return Err(Error::InvalidParameter {
                        parameter: "num_coadd",
                        reason: format!(
                            "{num_coadd} coadds at each end need at least {} reads per group, got {}",
                            2 * num_coadd,
                            shape.reads
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// String-typed ramp options as they appear in configuration files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RampFitOptions {
    pub method: String,
    pub num_coadd: usize,
}

impl Default for RampFitOptions {
    fn default() -> Self {
        Self {
            method: RampFitMethodKind::default().to_string(),
            num_coadd: DEFAULT_NUM_COADD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(reads: usize) -> RampShape {
        RampShape {
            height: 2,
            width: 3,
            groups: 1,
            reads,
        }
    }

    #[test]
    fn test_from_options() {
        assert_eq!(RampFitConfig::from_options("ols", 3).unwrap(), RampFitConfig::ols());
        assert_eq!(
            RampFitConfig::from_options("MCDS", 2).unwrap(),
            RampFitConfig::mcds(2)
        );
        assert_eq!(RampFitConfig::cds().kind(), RampFitMethodKind::Mcds);
    }

    #[test]
    fn test_from_options_unknown_method() {
        let err = RampFitConfig::from_options("utr", 3).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownOption {
                parameter: "ramp method",
                ..
            }
        ));
    }

    #[test]
    fn test_from_options_zero_coadd() {
        assert!(RampFitConfig::from_options("mcds", 0).is_err());
        // Ignored for OLS.
        assert!(RampFitConfig::from_options("ols", 0).is_ok());
    }

    #[test]
    fn test_from_yaml_defaults() {
        let config = RampFitConfig::from_yaml("method: mcds").unwrap();
        assert_eq!(config, RampFitConfig::mcds(DEFAULT_NUM_COADD));
    }

    #[test]
    fn test_validate_coadd_against_reads() {
        assert!(RampFitConfig::mcds(3).validate(&shape(6)).is_ok());
        let err = RampFitConfig::mcds(3).validate(&shape(5)).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                parameter: "num_coadd",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_fixed_intercept_shape() {
        let good = RampFitConfig::ols_fixed(Buffer2::new_filled(3, 2, 0.0));
        assert!(good.validate(&shape(4)).is_ok());

        let bad = RampFitConfig::ols_fixed(Buffer2::new_filled(2, 3, 0.0));
        let err = bad.validate(&shape(4)).unwrap_err();
        assert!(matches!(
            err,
            Error::PlaneShapeMismatch {
                plane: "intercept",
                expected: (3, 2),
                actual: (2, 3),
            }
        ));
    }
}
