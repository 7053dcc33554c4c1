//! Level-matched combination for frames with different backgrounds.
//!
//! Sky frames taken minutes apart differ mostly by an overall level. Each
//! frame is divided by its level relative to the stack average before the
//! usual combination, so outlier rejection compares like with like.

use common::Buffer2;

use crate::error::{Error, Result};
use crate::math::{BIWEIGHT_LOCATION_C, biweight_location};
use crate::stacking::config::CombineConfig;
use crate::stacking::cpu::{CombinationResult, combine};
use crate::stacking::frame::{Frame, FrameStack};

/// Biweight location of the finite, DQ-good pixels of each frame.
pub fn frame_levels(stack: &FrameStack) -> Vec<f64> {
    let mut good = Vec::with_capacity(stack.pixel_count());
    stack
        .frames()
        .iter()
        .map(|frame| {
            good.clear();
            good.extend(
                frame
                    .data()
                    .pixels()
                    .iter()
                    .zip(frame.dq().pixels())
                    .filter(|&(&v, &dq)| dq == 0 && v.is_finite())
                    .map(|(&v, _)| v),
            );
            biweight_location(&good, BIWEIGHT_LOCATION_C, None)
        })
        .collect()
}

/// Divide every frame (data and error) by `level / mean(levels)`.
///
/// Returns the rescaled stack and the per-frame scale factors.
pub fn normalize_to_common_level(stack: &FrameStack) -> Result<(FrameStack, Vec<f64>)> {
    let levels = frame_levels(stack);
    if let Some((index, level)) = levels
        .iter()
        .enumerate()
        .find(|&(_, &l)| !l.is_finite() || l == 0.0)
    {
        return Err(Error::InvalidParameter {
            parameter: "frame level",
            reason: format!("frame {index} has level {level}, cannot normalize"),
        });
    }

    let mean_level = levels.iter().sum::<f64>() / levels.len() as f64;
    let scales: Vec<f64> = levels.iter().map(|l| l / mean_level).collect();
    tracing::debug!(?levels, ?scales, "Normalizing frames to a common level");

    let frames = stack
        .frames()
        .iter()
        .zip(&scales)
        .map(|(frame, &scale)| scale_frame(frame, scale))
        .collect::<Result<Vec<_>>>()?;

    Ok((FrameStack::new(frames)?, scales))
}

fn scale_frame(frame: &Frame, scale: f64) -> Result<Frame> {
    let data: Buffer2<f64> = frame.data().map(|&v| v / scale);
    let err: Buffer2<f64> = frame.err().map(|&e| e / scale);
    Frame::new(data, err, frame.dq().clone())
}

/// Normalize the stack to a common level, then [`combine`] it.
pub fn combine_scaled(
    stack: &FrameStack,
    config: &CombineConfig,
) -> Result<(CombinationResult, Vec<f64>)> {
    config.validate()?;
    let (scaled, scales) = normalize_to_common_level(stack)?;
    let result = combine(&scaled, config)?;
    Ok((result, scales))
}
