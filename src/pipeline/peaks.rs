//! Peak detection on measured patterns.

use serde::{Deserialize, Serialize};

use crate::data::goniometer::Goniometer;
use crate::data::markers::Marker;
use crate::data::pattern::XyPattern;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Position in °2θ
    pub position: f64,
    pub intensity: f64,
}

/// Local maxima above `threshold_fraction` of the maximum intensity.
///
/// Stronger peaks win: a maximum closer than `min_separation` (°2θ) to an
/// already accepted one is dropped, so the result does not depend on the
/// sampling step. Returns peaks sorted by position.
pub fn detect_peaks(
    pattern: &XyPattern,
    threshold_fraction: f64,
    min_separation: f64,
) -> Vec<Peak> {
    let y = pattern.y();
    let n = y.len();
    if n < 3 {
        return vec![];
    }

    let max_val = y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val <= 0.0 {
        return vec![];
    }
    let threshold = max_val * threshold_fraction;

    // Collect local-maxima candidates above threshold
    let mut candidates: Vec<(usize, f64)> = Vec::new();
    for i in 1..n - 1 {
        let val = y[i];
        if val > threshold && val >= y[i - 1] && val >= y[i + 1] && val > 0.0 {
            candidates.push((i, val));
        }
    }

    let x = pattern.x();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut selected: Vec<usize> = Vec::new();
    for &(idx, _) in &candidates {
        let too_close = selected
            .iter()
            .any(|&s| (x[idx] - x[s]).abs() < min_separation);
        if !too_close {
            selected.push(idx);
        }
    }
    selected.sort_unstable();

    selected
        .into_iter()
        .map(|i| Peak {
            position: x[i],
            intensity: y[i],
        })
        .collect()
}

/// Number of detected peaks for `steps` evenly spaced thresholds in (0, 1).
/// Used to pick a threshold where the count levels off.
pub fn threshold_sweep(
    pattern: &XyPattern,
    steps: usize,
    min_separation: f64,
) -> Vec<(f64, usize)> {
    (1..=steps)
        .map(|i| {
            let t = i as f64 / (steps + 1) as f64;
            (t, detect_peaks(pattern, t, min_separation).len())
        })
        .collect()
}

/// Turn peaks into markers labelled with their d-spacing (nm)
pub fn peaks_to_markers(peaks: &[Peak], goniometer: &Goniometer) -> Vec<Marker> {
    peaks
        .iter()
        .map(|p| {
            let label = match goniometer.nm_from_two_theta(p.position) {
                Some(d) => format!("{:.4}", d),
                None => format!("{:.3}°", p.position),
            };
            Marker::new(&label, p.position)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_peaks() -> XyPattern {
        let x: Vec<f64> = (0..400).map(|i| 5.0 + i as f64 * 0.05).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| {
                10.0 + 1000.0 * (-(v - 8.8_f64).powi(2) / 0.02).exp()
                    + 400.0 * (-(v - 17.7_f64).powi(2) / 0.02).exp()
            })
            .collect();
        XyPattern::from_xy("peaks", x, y).unwrap()
    }

    #[test]
    fn test_detects_both_peaks_in_order() {
        let peaks = detect_peaks(&two_peaks(), 0.1, 0.25);
        assert_eq!(peaks.len(), 2);
        assert!((peaks[0].position - 8.8).abs() < 0.051);
        assert!((peaks[1].position - 17.7).abs() < 0.051);
    }

    #[test]
    fn test_threshold_filters_weak_peak() {
        let peaks = detect_peaks(&two_peaks(), 0.5, 0.25);
        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn test_sweep_is_non_increasing() {
        let sweep = threshold_sweep(&two_peaks(), 9, 0.25);
        assert_eq!(sweep.len(), 9);
        for w in sweep.windows(2) {
            assert!(w[1].1 <= w[0].1);
        }
    }

    /// Doublet at 10.0° and 10.3° sampled every `step` degrees
    fn doublet(step: f64) -> XyPattern {
        let n = (4.0 / step) as usize;
        let x: Vec<f64> = (0..n).map(|i| 8.0 + i as f64 * step).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| {
                1000.0 * (-(v - 10.0_f64).powi(2) / 0.002).exp()
                    + 600.0 * (-(v - 10.3_f64).powi(2) / 0.002).exp()
            })
            .collect();
        XyPattern::from_xy("doublet", x, y).unwrap()
    }

    #[test]
    fn test_separation_is_in_degrees_not_samples() {
        for step in [0.01, 0.05] {
            let p = doublet(step);
            assert_eq!(detect_peaks(&p, 0.1, 0.2).len(), 2, "step {}", step);
            let merged = detect_peaks(&p, 0.1, 0.5);
            assert_eq!(merged.len(), 1, "step {}", step);
            assert!((merged[0].position - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_markers_labelled_by_d_spacing() {
        let g = Goniometer::default();
        let tt = g.two_theta_from_nm(1.0).unwrap();
        let markers = peaks_to_markers(&[Peak { position: tt, intensity: 5.0 }], &g);
        assert_eq!(markers[0].label, "1.0000");
    }
}
