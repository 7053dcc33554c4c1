//! Clipping diagnostics accumulated across the parallel pixel loop.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::stacking::rejection::{ClipReport, ClipState};

/// Statistics for sigma clipping operations.
#[derive(Debug, Default)]
pub(crate) struct ClipStats {
    /// Samples that entered clipping (not already excluded by DQ).
    total_values: AtomicU64,
    /// Samples excluded by clipping.
    clipped_values: AtomicU64,
    pixels: AtomicU64,
    /// Pixels where clipping excluded at least one sample.
    pixels_with_clipping: AtomicU64,
    /// Pixels where more than half of the samples were clipped.
    pixels_excessive_clipping: AtomicU64,
    /// Pixels that stopped at `max_iters`.
    pixels_max_iters: AtomicU64,
}

/// Plain snapshot of [`ClipStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ClipSummary {
    pub total_values: u64,
    pub clipped_values: u64,
    pub pixels: u64,
    pub pixels_with_clipping: u64,
    pub pixels_excessive_clipping: u64,
    pub pixels_max_iters: u64,
}

impl ClipStats {
    pub fn record(&self, candidates: usize, report: &ClipReport) {
        let clipped = report.newly_excluded;
        self.total_values
            .fetch_add(candidates as u64, Ordering::Relaxed);
        self.clipped_values
            .fetch_add(clipped as u64, Ordering::Relaxed);
        self.pixels.fetch_add(1, Ordering::Relaxed);
        if clipped > 0 {
            self.pixels_with_clipping.fetch_add(1, Ordering::Relaxed);
        }
        if clipped > candidates / 2 {
            self.pixels_excessive_clipping
                .fetch_add(1, Ordering::Relaxed);
        }
        if report.state == ClipState::MaxItersReached {
            self.pixels_max_iters.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn summary(&self) -> ClipSummary {
        ClipSummary {
            total_values: self.total_values.load(Ordering::Relaxed),
            clipped_values: self.clipped_values.load(Ordering::Relaxed),
            pixels: self.pixels.load(Ordering::Relaxed),
            pixels_with_clipping: self.pixels_with_clipping.load(Ordering::Relaxed),
            pixels_excessive_clipping: self.pixels_excessive_clipping.load(Ordering::Relaxed),
            pixels_max_iters: self.pixels_max_iters.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self, frame_count: usize) {
        let s = self.summary();
        if s.total_values == 0 {
            return;
        }

        let clip_percent = 100.0 * s.clipped_values as f64 / s.total_values as f64;
        let pixels_clipped_percent = 100.0 * s.pixels_with_clipping as f64 / s.pixels as f64;

        tracing::info!(
            "Sigma clipping stats: {:.2}% of values clipped ({} of {})",
            clip_percent,
            s.clipped_values,
            s.total_values
        );
        tracing::info!(
            "  Pixels with any clipping: {:.2}% ({} of {})",
            pixels_clipped_percent,
            s.pixels_with_clipping,
            s.pixels
        );

        if s.pixels_excessive_clipping > 0 {
            tracing::warn!(
                "  Pixels with excessive clipping (>50%): {:.2}% ({} pixels) - consider raising the thresholds",
                100.0 * s.pixels_excessive_clipping as f64 / s.pixels as f64,
                s.pixels_excessive_clipping
            );
        }
        if s.pixels_max_iters > 0 {
            tracing::debug!(
                "  {} pixels stopped at the iteration limit",
                s.pixels_max_iters
            );
        }

        if clip_percent > 20.0 {
            tracing::warn!(
                "High clipping rate ({:.1}%) - sigma threshold may be too aggressive",
                clip_percent
            );
        } else if clip_percent < 0.1 && frame_count > 10 {
            tracing::debug!(
                "Very low clipping rate ({:.2}%) - data may be very clean or threshold too lenient",
                clip_percent
            );
        }
    }
}
