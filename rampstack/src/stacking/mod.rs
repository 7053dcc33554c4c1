//! Frame combination.
//!
//! Combines a stack of `(data, err, dq)` frames into one frame, pixel by
//! pixel: DQ-flagged samples are masked, optional sigma clipping rejects
//! outliers, and the survivors are reduced with the configured estimator
//! and error model.

pub mod config;
mod cpu;
mod frame;
pub mod rejection;
pub mod scaling;
mod stats;


pub use config::{
    ClipEstimator, CombineConfig, CombineMethod, CombineOptions, ConfigOption, DqReduce,
    ErrorCalc, SigmaClipConfig,
};
pub use cpu::{CombinationResult, combine};
pub use frame::{Frame, FrameStack};
pub use rejection::{ClipOutcome, ClipState, sigma_clip};
pub use scaling::{combine_scaled, frame_levels, normalize_to_common_level};
