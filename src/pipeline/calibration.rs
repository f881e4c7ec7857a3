//! 2θ calibration against reference standards.
//!
//! The expected position of a standard's reflection is computed from its
//! d-spacing; the strongest sample within ±0.5°2θ of that position is taken
//! as the observed peak and the difference becomes the shift.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::processing::{process_command, ProcessingOp};
use crate::data::goniometer::Goniometer;
use crate::data::markers::Marker;
use crate::data::pattern::XyPattern;
use crate::error::{Result, XrdError};
use crate::log::reproducibility::ReproLog;

/// Half-width of the peak search window in °2θ
pub const SEARCH_HALF_WIDTH: f64 = 0.5;
/// Expected positions at or below this angle are not searched
pub const MIN_REFERENCE_POSITION: f64 = 0.1;

/// Reference minerals with a well-known reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReferenceStandard {
    #[default]
    Quartz,
    Silicon,
    Zincite,
    Corundum,
}

impl ReferenceStandard {
    /// d-spacing of the reference reflection in nm
    pub fn d_spacing_nm(&self) -> f64 {
        match self {
            ReferenceStandard::Quartz => 0.42574,
            ReferenceStandard::Silicon => 0.3134,
            ReferenceStandard::Zincite => 0.2476,
            ReferenceStandard::Corundum => 0.2085,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ReferenceStandard::Quartz => "Quartz",
            ReferenceStandard::Silicon => "Silicon",
            ReferenceStandard::Zincite => "Zincite",
            ReferenceStandard::Corundum => "Corundum",
        }
    }

    pub fn formula(&self) -> &str {
        match self {
            ReferenceStandard::Quartz => "SiO2",
            ReferenceStandard::Silicon => "Si",
            ReferenceStandard::Zincite => "ZnO",
            ReferenceStandard::Corundum => "Al2O3",
        }
    }

    pub fn all() -> &'static [ReferenceStandard] {
        &[
            ReferenceStandard::Quartz,
            ReferenceStandard::Silicon,
            ReferenceStandard::Zincite,
            ReferenceStandard::Corundum,
        ]
    }

    /// Expected reflection position for this goniometer
    pub fn position(&self, goniometer: &Goniometer) -> Result<f64> {
        goniometer.two_theta_from_nm(self.d_spacing_nm())
    }
}

impl fmt::Display for ReferenceStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.formula())
    }
}

impl FromStr for ReferenceStandard {
    type Err = XrdError;

    /// Accepts the mineral name or the formula, ignoring case
    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(s) || r.formula().eq_ignore_ascii_case(s))
            .ok_or_else(|| XrdError::invalid_option("reference standard", s))
    }
}

/// x of the most intense sample within `position ± half_width`
pub fn peak_in_window(pattern: &XyPattern, position: f64, half_width: f64) -> Result<f64> {
    let lo = position - half_width;
    let hi = position + half_width;
    pattern
        .points()
        .filter(|(x, _)| *x >= lo && *x <= hi)
        // first maximum wins on ties
        .fold(None, |best: Option<(f64, f64)>, (x, y)| match best {
            Some((_, by)) if by >= y => best,
            _ => Some((x, y)),
        })
        .map(|(x, _)| x)
        .ok_or(XrdError::EmptyWindow {
            position,
            half_width,
        })
}

/// Shift needed to bring the observed reference peak onto its expected
/// position. Returns 0 when the expected position is too low to search.
pub fn find_shift(
    pattern: &XyPattern,
    goniometer: &Goniometer,
    standard: ReferenceStandard,
) -> Result<f64> {
    let position = standard.position(goniometer)?;
    if position <= MIN_REFERENCE_POSITION {
        return Ok(0.0);
    }
    let observed = peak_in_window(pattern, position, SEARCH_HALF_WIDTH)?;
    let shift = observed - position;
    log::debug!(
        "{}: expected {:.4}°, observed {:.4}°, shift {:+.4}°",
        standard,
        position,
        observed,
        shift
    );
    Ok(shift)
}

/// Subtract `shift` from the pattern's x values and from marker positions.
/// A zero shift does nothing.
pub fn apply_shift(
    pattern: &mut XyPattern,
    markers: &mut [Marker],
    shift: f64,
    log: &mut ReproLog,
) -> bool {
    if shift == 0.0 {
        return false;
    }
    pattern.shift_x(shift);
    for marker in markers.iter_mut() {
        marker.position -= shift;
    }
    log.record(
        &pattern.name,
        ProcessingOp::ApplyShift,
        format!(
            "Shifted {} points and {} markers by {:+.5}°2θ",
            pattern.len(),
            markers.len(),
            -shift
        ),
        Some(process_command(&format!("--shift {}", shift))),
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gaussian peak at `center` on a flat background
    fn peak_pattern(center: f64) -> XyPattern {
        let x: Vec<f64> = (0..1000).map(|i| 15.0 + i as f64 * 0.01).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| 100.0 + 1000.0 * (-(v - center).powi(2) / 0.005).exp())
            .collect();
        XyPattern::from_xy("cal", x, y).unwrap()
    }

    #[test]
    fn test_find_shift_quartz() {
        let g = Goniometer::default();
        let expected = ReferenceStandard::Quartz.position(&g).unwrap();
        let p = peak_pattern(expected + 0.12);
        let shift = find_shift(&p, &g, ReferenceStandard::Quartz).unwrap();
        // sampled on a 0.01° grid
        assert!((shift - 0.12).abs() <= 0.011, "shift = {}", shift);
    }

    #[test]
    fn test_empty_window_is_error() {
        let g = Goniometer::default();
        let p = XyPattern::from_xy("far", vec![40.0, 41.0], vec![1.0, 2.0]).unwrap();
        let err = find_shift(&p, &g, ReferenceStandard::Quartz).unwrap_err();
        assert!(matches!(err, XrdError::EmptyWindow { .. }));
    }

    #[test]
    fn test_apply_then_negate_restores() {
        let g = Goniometer::default();
        let expected = ReferenceStandard::Quartz.position(&g).unwrap();
        let mut p = peak_pattern(expected - 0.2);
        let original = p.x().to_vec();
        let mut markers = vec![Marker::new("q", 20.6)];
        let mut log = ReproLog::new();

        let shift = find_shift(&p, &g, ReferenceStandard::Quartz).unwrap();
        assert!(apply_shift(&mut p, &mut markers, shift, &mut log));
        assert!((markers[0].position - (20.6 - shift)).abs() < 1e-12);
        apply_shift(&mut p, &mut markers, -shift, &mut log);

        for (a, b) in p.x().iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((markers[0].position - 20.6).abs() < 1e-9);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_zero_shift_noop() {
        let mut p = peak_pattern(20.0);
        let mut log = ReproLog::new();
        assert!(!apply_shift(&mut p, &mut [], 0.0, &mut log));
        assert!(log.is_empty());
    }

    #[test]
    fn test_standard_parsing() {
        assert_eq!("Silicon".parse::<ReferenceStandard>().unwrap(), ReferenceStandard::Silicon);
        assert_eq!("al2o3".parse::<ReferenceStandard>().unwrap(), ReferenceStandard::Corundum);
        assert!("gold".parse::<ReferenceStandard>().is_err());
        for r in ReferenceStandard::all() {
            assert_eq!(r.name().to_uppercase().parse::<ReferenceStandard>().unwrap(), *r);
            assert_eq!(r.formula().parse::<ReferenceStandard>().unwrap(), *r);
        }
    }
}
