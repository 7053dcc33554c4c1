//! Rampstack - detector calibration core.
//!
//! This library provides the numeric kernels of a near-infrared imaging
//! calibration pipeline:
//! - Robust statistics (biweight, MAD, weighted quantiles and stddev)
//! - Iterative sigma clipping with asymmetric and capped thresholds
//! - Frame combination (mean, median, weighted mean/median) with two error
//!   models and DQ bitmask reduction
//! - Up-the-ramp slope fitting (OLS and MCDS/CDS)
//!
//! All entry points are pure: inputs are read-only, outputs are new owned
//! buffers, and numerical degeneracy at a pixel shows up as NaN rather than
//! as an error.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rampstack::{CombineConfig, CombineMethod, FrameStack, combine};
//!
//! let stack = FrameStack::new(frames)?;
//! let config = CombineConfig::sigma_clipped(CombineMethod::Median, 4.0, 4.0);
//! let result = combine(&stack, &config)?;
//!
//! println!("Combined {}x{} pixels", result.data.width(), result.data.height());
//! ```

pub(crate) mod common;
mod error;
pub mod math;
pub mod ramp;
pub mod stacking;

#[cfg(test)]
pub mod testing;

pub use error::{Error, Result};

// ============================================================================
// Frame combination
// ============================================================================

pub use stacking::{
    ClipEstimator, ClipOutcome, ClipState, CombinationResult, CombineConfig, CombineMethod,
    CombineOptions, ConfigOption, DqReduce, ErrorCalc, Frame, FrameStack, SigmaClipConfig,
    combine, combine_scaled, sigma_clip,
};

// ============================================================================
// Ramp fitting
// ============================================================================

pub use ramp::{
    Intercept, RampCube, RampFitConfig, RampFitMethod, RampFitMethodKind, RampFitOptions,
    RampFitResult, RampShape, fit_ramp,
};

// ============================================================================
// Shared types
// ============================================================================

pub use ::common::Buffer2;
