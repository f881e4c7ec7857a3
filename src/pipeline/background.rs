//! Background descriptors, background stripping and automatic background estimation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::processing::{process_command, ProcessingOp};
use crate::data::pattern::XyPattern;
use crate::error::{Result, XrdError};
use crate::log::reproducibility::ReproLog;

/// Which kind of background the auto-finder should estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackgroundKind {
    /// Constant offset
    #[default]
    Linear,
    /// Scaled reference pattern plus offset
    Pattern,
}

impl BackgroundKind {
    pub fn label(&self) -> &str {
        match self {
            BackgroundKind::Linear => "Linear",
            BackgroundKind::Pattern => "Pattern",
        }
    }

    pub fn from_i32(v: i32) -> Result<Self> {
        match v {
            0 => Ok(BackgroundKind::Linear),
            1 => Ok(BackgroundKind::Pattern),
            other => Err(XrdError::invalid_option("background type", other)),
        }
    }
}

/// Background to subtract from a pattern's intensities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Background {
    #[default]
    None,
    Constant {
        offset: f64,
    },
    Pattern {
        /// Reference intensities on the pattern's x grid
        values: Vec<f64>,
        scale: f64,
        offset: f64,
        /// Where the reference came from (file name), for logging
        source: String,
    },
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::None => write!(f, "None"),
            Background::Constant { offset } => write!(f, "Constant ({:.3})", offset),
            Background::Pattern {
                scale,
                offset,
                source,
                ..
            } => write!(f, "Pattern '{}' × {:.4} + {:.3}", source, scale, offset),
        }
    }
}

impl Background {
    /// Build a pattern background by interpolating `reference` onto `target`'s grid
    pub fn from_reference(
        target: &XyPattern,
        reference: &XyPattern,
        scale: f64,
        offset: f64,
    ) -> Self {
        Background::Pattern {
            values: reference.resample(target.x()),
            scale,
            offset,
            source: reference.name.clone(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Background::None)
    }

    /// Background intensity per point for a pattern of `n` points.
    /// `Ok(None)` means nothing is subtracted.
    pub fn evaluate(&self, n: usize) -> Result<Option<Vec<f64>>> {
        match self {
            Background::None => Ok(None),
            Background::Constant { offset } => Ok(Some(vec![*offset; n])),
            Background::Pattern {
                values,
                scale,
                offset,
                ..
            } => {
                if values.len() != n {
                    return Err(XrdError::LengthMismatch {
                        what: "background pattern",
                        expected: n,
                        got: values.len(),
                    });
                }
                if *scale == 0.0 && *offset == 0.0 {
                    return Ok(None);
                }
                Ok(Some(values.iter().map(|v| v * scale + offset).collect()))
            }
        }
    }

    fn command_args(&self) -> String {
        match self {
            Background::None => "--bg-offset 0".to_string(),
            Background::Constant { offset } => format!("--bg-offset {}", offset),
            Background::Pattern {
                scale,
                offset,
                source,
                ..
            } => format!(
                "--bg-pattern \"{}\" --bg-scale {} --bg-offset {}",
                source, scale, offset
            ),
        }
    }
}

/// Subtract the background, re-baseline so the minimum is zero, and clear
/// the descriptor. Empty patterns are left untouched.
pub fn remove_background(
    pattern: &mut XyPattern,
    background: &mut Background,
    log: &mut ReproLog,
) -> Result<()> {
    let n = pattern.len();
    if n == 0 {
        return Ok(());
    }

    let bg = background.evaluate(n)?;
    let y = pattern.y_mut();
    if let Some(bg) = &bg {
        for (v, b) in y.iter_mut().zip(bg.iter()) {
            *v -= b;
        }
    }
    let min = y.iter().cloned().fold(f64::INFINITY, f64::min);
    for v in y.iter_mut() {
        *v -= min;
    }

    log.record(
        &pattern.name,
        ProcessingOp::RemoveBackground,
        format!(
            "Subtracted {} from {} points, re-baselined by {:.3}",
            background, n, min
        ),
        Some(process_command(&background.command_args())),
    );

    *background = Background::None;
    Ok(())
}

/// Estimate a background for `pattern`.
///
/// Linear: a constant at the global minimum. Pattern: least-squares scale of
/// `reference` against the data, with the offset lowered until the scaled
/// reference lies at or below every data point.
pub fn find_background(
    pattern: &XyPattern,
    kind: BackgroundKind,
    reference: Option<&Background>,
) -> Result<Background> {
    let y = pattern.y();
    let min = match pattern.min_intensity() {
        Some(m) => m,
        None => return Ok(Background::None),
    };

    match kind {
        BackgroundKind::Linear => Ok(Background::Constant { offset: min }),
        BackgroundKind::Pattern => {
            let (values, source) = match reference {
                Some(Background::Pattern { values, source, .. }) => (values, source),
                _ => {
                    return Err(XrdError::invalid_option(
                        "background pattern",
                        "no reference pattern set",
                    ))
                }
            };
            if values.len() != y.len() {
                return Err(XrdError::LengthMismatch {
                    what: "background pattern",
                    expected: y.len(),
                    got: values.len(),
                });
            }
            let scale = least_squares_scale(values, y);
            let offset = y
                .iter()
                .zip(values.iter())
                .map(|(yv, p)| yv - scale * p)
                .fold(f64::INFINITY, f64::min);
            Ok(Background::Pattern {
                values: values.clone(),
                scale,
                offset,
                source: source.clone(),
            })
        }
    }
}

/// Slope of the ordinary least-squares line y = a·p + c; 0 for a flat reference
fn least_squares_scale(p: &[f64], y: &[f64]) -> f64 {
    let n = p.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_p = p.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var = 0.0;
    for (pv, yv) in p.iter().zip(y.iter()) {
        cov += (pv - mean_p) * (yv - mean_y);
        var += (pv - mean_p) * (pv - mean_p);
    }
    if var < 1e-12 {
        0.0
    } else {
        cov / var
    }
}
