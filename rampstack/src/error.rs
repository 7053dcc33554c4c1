//! Error types for combination and ramp fitting.
//!
//! Only configuration and shape problems are errors. Numerical degeneracy at
//! a single pixel (no surviving samples, zero weight sum, zero variance) is
//! reported in-band as NaN and never surfaces here.

use thiserror::Error;

/// Errors raised at call entry, before any pixel is processed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown {parameter} '{value}', expected one of: {expected}")]
    UnknownOption {
        parameter: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    #[error("Frame stack is empty")]
    EmptyStack,

    #[error("{array} has {actual} elements, expected {expected}")]
    ArrayLength {
        array: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Frame {index} has dimensions {actual:?}, expected {expected:?} (width, height)")]
    FrameShapeMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Frame {plane} plane has dimensions {actual:?}, expected {expected:?} (width, height)")]
    PlaneShapeMismatch {
        plane: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error(
        "Read times have shape {actual:?} but the ramp cube expects {expected:?} (groups, reads)"
    )]
    TimesShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Read times in group {group} are not strictly increasing")]
    NonMonotonicTimes { group: usize },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_option_message() {
        let err = Error::UnknownOption {
            parameter: "method",
            value: "sigma_clip".to_string(),
            expected: "mean, median, wmean, wmedian",
        };
        let msg = err.to_string();
        assert!(msg.contains("method"));
        assert!(msg.contains("sigma_clip"));
        assert!(msg.contains("wmedian"));
    }

    #[test]
    fn test_frame_shape_mismatch_message() {
        let err = Error::FrameShapeMismatch {
            index: 2,
            expected: (100, 80),
            actual: (100, 81),
        };
        let msg = err.to_string();
        assert!(msg.contains("Frame 2"));
        assert!(msg.contains("80"));
        assert!(msg.contains("81"));
    }

    #[test]
    fn test_array_length_message() {
        let err = Error::ArrayLength {
            array: "dq",
            expected: 12,
            actual: 11,
        };
        assert_eq!(err.to_string(), "dq has 11 elements, expected 12");
    }

    #[test]
    fn test_times_shape_mismatch_message() {
        let err = Error::TimesShapeMismatch {
            expected: (5, 10),
            actual: (5, 9),
        };
        let msg = err.to_string();
        assert!(msg.contains("(5, 9)"));
        assert!(msg.contains("(5, 10)"));
    }

    #[test]
    fn test_config_parse_has_source() {
        use std::error::Error as StdError;

        let yaml_err = serde_yml::from_str::<u32>("[not, a, number]").unwrap_err();
        let err = Error::from(yaml_err);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Failed to parse configuration"));
    }
}
