//! Testing utilities for rampstack.

#![allow(dead_code)]

use common::Buffer2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ramp::RampShape;
use crate::stacking::{Frame, FrameStack};

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Seeded random source for reproducible synthetic data.
pub struct TestRng {
    rng: StdRng,
}

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform sample in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Standard normal sample (Box-Muller).
    pub fn next_gaussian(&mut self) -> f64 {
        // Shift away from zero so ln() stays finite.
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// A stack of `frames` identical frames of `value` with uniform `err`.
pub fn constant_stack(width: usize, height: usize, frames: usize, value: f64, err: f64) -> FrameStack {
    let frames = (0..frames)
        .map(|_| Frame::with_uniform_error(Buffer2::new_filled(width, height, value), err))
        .collect();
    FrameStack::new(frames).expect("synthetic frames share one shape")
}

/// A stack of frames at `level` with Gaussian noise of `sigma`, reported as
/// the per-pixel error.
pub fn noisy_stack(
    width: usize,
    height: usize,
    frames: usize,
    level: f64,
    sigma: f64,
    seed: u64,
) -> FrameStack {
    let mut rng = TestRng::new(seed);
    let frames = (0..frames)
        .map(|_| {
            let data = Buffer2::from_fn(width, height, |_, _| level + sigma * rng.next_gaussian());
            Frame::with_uniform_error(data, sigma)
        })
        .collect();
    FrameStack::new(frames).expect("synthetic frames share one shape")
}

/// Replace one pixel of one frame, keeping its error and DQ.
pub fn with_pixel(stack: &FrameStack, frame: usize, row: usize, col: usize, value: f64) -> FrameStack {
    let frames = stack
        .frames()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if i != frame {
                return f.clone();
            }
            let (mut data, err, dq) = f.clone().into_planes();
            data[(row, col)] = value;
            Frame::new(data, err, dq).expect("planes keep their shape")
        })
        .collect();
    FrameStack::new(frames).expect("synthetic frames share one shape")
}

/// Set the DQ word of one pixel of one frame.
pub fn with_dq(stack: &FrameStack, frame: usize, row: usize, col: usize, flag: u32) -> FrameStack {
    let frames = stack
        .frames()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if i != frame {
                return f.clone();
            }
            let (data, err, mut dq) = f.clone().into_planes();
            dq[(row, col)] = flag;
            Frame::new(data, err, dq).expect("planes keep their shape")
        })
        .collect();
    FrameStack::new(frames).expect("synthetic frames share one shape")
}

/// Read times `t[g][r] = (g·R + r + 1) · read_time`: back-to-back groups.
pub fn ramp_times(groups: usize, reads: usize, read_time: f64) -> Vec<Vec<f64>> {
    (0..groups)
        .map(|g| {
            (0..reads)
                .map(|r| (g * reads + r + 1) as f64 * read_time)
                .collect()
        })
        .collect()
}

/// Flat `[H, W, G, R]` reads with `f(pixel, group, read, time)` per sample.
pub fn ramp_from_fn<T, F>(shape: RampShape, times: &[Vec<f64>], mut f: F) -> Vec<T>
where
    F: FnMut(usize, usize, usize, f64) -> T,
{
    let mut reads = Vec::with_capacity(shape.len());
    for pixel in 0..shape.pixel_count() {
        for (g, row) in times.iter().enumerate() {
            for (r, &t) in row.iter().enumerate() {
                reads.push(f(pixel, g, r, t));
            }
        }
    }
    reads
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_is_deterministic() {
        let mut a = TestRng::new(7);
        let mut b = TestRng::new(7);
        for _ in 0..10 {
            assert_eq!(a.next_gaussian(), b.next_gaussian());
        }
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = TestRng::new(42);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.next_gaussian()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn test_ramp_times() {
        let times = ramp_times(2, 3, 1.5);
        assert_eq!(times, vec![vec![1.5, 3.0, 4.5], vec![6.0, 7.5, 9.0]]);
    }

    #[test]
    fn test_ramp_from_fn_layout() {
        let shape = RampShape {
            height: 1,
            width: 2,
            groups: 2,
            reads: 2,
        };
        let times = ramp_times(2, 2, 1.0);
        let reads: Vec<u32> =
            ramp_from_fn(shape, &times, |p, g, r, _| (p * 100 + g * 10 + r) as u32);
        assert_eq!(reads, vec![0, 1, 10, 11, 100, 101, 110, 111]);
    }
}
