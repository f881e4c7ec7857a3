//! Moving-triangle smoothing.

use serde::{Deserialize, Serialize};

use super::processing::{process_command, ProcessingOp};
use crate::data::pattern::XyPattern;
use crate::error::{Result, XrdError};
use crate::log::reproducibility::ReproLog;

/// Available smoothing filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SmoothingKind {
    /// Triangular weights 1, 2, .., d+1, .., 2, 1 over 2d+1 samples
    #[default]
    MovingTriangle,
}

impl SmoothingKind {
    pub fn label(&self) -> &str {
        match self {
            SmoothingKind::MovingTriangle => "Moving Triangle",
        }
    }

    pub fn from_i32(v: i32) -> Result<Self> {
        match v {
            0 => Ok(SmoothingKind::MovingTriangle),
            other => Err(XrdError::invalid_option("smoothing type", other)),
        }
    }
}

/// Smooth `y` with a triangular window of half-width `degree`.
///
/// The output has the same length as the input. Near the ends the window is
/// truncated and the result divided by the weights that were actually used.
pub fn triangle_smooth(y: &[f64], degree: usize) -> Vec<f64> {
    let n = y.len();
    if degree == 0 || n == 0 {
        return y.to_vec();
    }

    // weight of sample j for output i is degree + 1 - |i - j|
    let top = degree as f64 + 1.0;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(degree);
            let hi = i.saturating_add(degree).min(n - 1);
            let mut sum = 0.0;
            let mut wsum = 0.0;
            for j in lo..=hi {
                let w = top - i.abs_diff(j) as f64;
                sum += w * y[j];
                wsum += w;
            }
            sum / wsum
        })
        .collect()
}

/// Smooth a pattern in place; degree 0 does nothing.
/// Returns whether the data was changed.
pub fn smooth_pattern(
    pattern: &mut XyPattern,
    kind: SmoothingKind,
    degree: usize,
    log: &mut ReproLog,
) -> bool {
    if degree == 0 || pattern.is_empty() {
        return false;
    }

    let smoothed = match kind {
        SmoothingKind::MovingTriangle => triangle_smooth(pattern.y(), degree),
    };
    pattern.y_mut().copy_from_slice(&smoothed);

    log.record(
        &pattern.name,
        ProcessingOp::Smooth { degree },
        format!("{} over {} points", kind.label(), pattern.len()),
        Some(process_command(&format!("--smooth {}", degree))),
    );
    true
}
