//! Example: ramp fitting and frame combination on synthetic exposures
//!
//! 1. Simulate several up-the-ramp exposures of a flat source with read
//!    noise, a few cosmic-ray hits and some dead pixels
//! 2. Fit each exposure's ramps to slope images (OLS and MCDS)
//! 3. Combine the slope images with sigma clipping
//! 4. Combine sky exposures with different background levels after
//!    normalizing them to a common level
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example synthetic_pipeline
//! RAMPSTACK_LOG_DIR=/tmp/rampstack-logs RUST_LOG=debug cargo run --example synthetic_pipeline
//! ```

use std::path::PathBuf;
use std::time::Instant;

use common::log_setup::setup_logging;
use rampstack::stacking::combine_scaled;
use rampstack::{
    Buffer2, CombineConfig, CombineMethod, ErrorCalc, Frame, FrameStack, RampCube, RampFitConfig,
    RampShape, combine, fit_ramp,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WIDTH: usize = 64;
const HEIGHT: usize = 64;
const GROUPS: usize = 3;
const READS: usize = 8;
const READ_TIME: f64 = 1.47;
const EXPOSURES: usize = 7;
const SOURCE_RATE: f64 = 250.0;
const READ_NOISE: f64 = 5.0;
const BIAS: f64 = 1000.0;

fn main() {
    let log_dir = std::env::var("RAMPSTACK_LOG_DIR").ok().map(PathBuf::from);
    setup_logging("info", log_dir.as_deref());

    let shape = RampShape {
        height: HEIGHT,
        width: WIDTH,
        groups: GROUPS,
        reads: READS,
    };
    let times: Vec<Vec<f64>> = (0..GROUPS)
        .map(|g| {
            (0..READS)
                .map(|r| (g * READS + r + 1) as f64 * READ_TIME)
                .collect()
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(2024);

    // =========================================================================
    // STEP 1-2: Simulate exposures and fit ramps
    // =========================================================================
    println!("\n{}", "=".repeat(60));
    println!("Fitting {EXPOSURES} exposures of {WIDTH}x{HEIGHT} pixels");
    println!("{}\n", "=".repeat(60));

    let mut ols_frames = Vec::with_capacity(EXPOSURES);
    for exposure in 0..EXPOSURES {
        let (reads, dq) = simulate_exposure(&shape, &mut rng);
        let cube = RampCube::new(&reads, shape, &times)
            .and_then(|cube| cube.with_dq(&dq))
            .expect("simulated cube matches its shape");

        let start = Instant::now();
        let ols = fit_ramp(&cube, &RampFitConfig::ols()).expect("valid OLS configuration");
        let mcds = fit_ramp(&cube, &RampFitConfig::mcds(2)).expect("valid MCDS configuration");
        let elapsed = start.elapsed();

        println!(
            "exposure {exposure}: OLS median slope {:.2}, MCDS median slope {:.2} ({:.1?})",
            median(ols.slope.pixels()),
            median(mcds.slope.pixels()),
            elapsed
        );

        let frame = Frame::new(ols.slope, ols.slope_error, ols.dq)
            .expect("fit planes share the cube shape");
        ols_frames.push(add_cosmic_ray(frame, &mut rng));
    }

    // =========================================================================
    // STEP 3: Combine slope images
    // =========================================================================
    let stack = FrameStack::new(ols_frames).expect("slope images share one shape");

    for (name, config) in [
        ("mean", CombineConfig::mean()),
        (
            "clipped median",
            CombineConfig::sigma_clipped(CombineMethod::Median, 4.0, 4.0),
        ),
        (
            "clipped wmean",
            CombineConfig {
                error_calc: ErrorCalc::Propagate,
                ..CombineConfig::sigma_clipped(CombineMethod::WeightedMean, 4.0, 3.0)
            },
        ),
    ] {
        let result = combine(&stack, &config).expect("valid combine configuration");
        let (lo, hi) = min_max(result.data.pixels());
        println!(
            "{name:>15}: median {:.3}, range [{lo:.3}, {hi:.3}], median error {:.4}",
            median(result.data.pixels()),
            median(result.err.pixels())
        );
    }

    // =========================================================================
    // STEP 4: Level-matched sky combination
    // =========================================================================
    let sky_frames = (0..5)
        .map(|i| {
            let level = 200.0 + 15.0 * i as f64;
            let data = Buffer2::from_fn(WIDTH, HEIGHT, |_, _| {
                level + READ_NOISE * (rng.random::<f64>() - 0.5)
            });
            Frame::with_uniform_error(data, READ_NOISE)
        })
        .collect();
    let sky = FrameStack::new(sky_frames).expect("sky frames share one shape");
    let (result, scales) =
        combine_scaled(&sky, &CombineConfig::sky()).expect("valid sky configuration");
    println!(
        "\nsky scales {:?} -> combined median {:.2}",
        scales
            .iter()
            .map(|s| format!("{s:.3}"))
            .collect::<Vec<_>>(),
        median(result.data.pixels())
    );
}

/// Reads `[H, W, G, R]` as u16 counts, plus DQ flagging a dead column.
fn simulate_exposure(shape: &RampShape, rng: &mut StdRng) -> (Vec<u16>, Vec<u32>) {
    let mut reads = Vec::with_capacity(shape.len());
    let mut dq = Vec::with_capacity(shape.len());
    for pixel in 0..shape.pixel_count() {
        let dead = pixel % shape.width == 7;
        for _ in 0..shape.groups {
            for r in 0..shape.reads {
                let signal = BIAS + SOURCE_RATE * READ_TIME * (r + 1) as f64;
                let noise = READ_NOISE * (rng.random::<f64>() - 0.5) * 2.0;
                reads.push(if dead { 0 } else { (signal + noise) as u16 });
                dq.push(u32::from(dead));
            }
        }
    }
    (reads, dq)
}

fn add_cosmic_ray(frame: Frame, rng: &mut StdRng) -> Frame {
    let (mut data, err, dq) = frame.into_planes();
    for _ in 0..10 {
        let row = rng.random_range(0..HEIGHT);
        let col = rng.random_range(0..WIDTH);
        data[(row, col)] += 5000.0;
    }
    Frame::new(data, err, dq).expect("planes keep their shape")
}

fn median(values: &[f64]) -> f64 {
    rampstack::math::nan_median(values)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}
