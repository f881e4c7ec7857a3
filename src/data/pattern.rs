//! 1-D diffraction pattern container.
//!
//! An `XyPattern` is an ordered list of (2θ, intensity) samples with x
//! strictly increasing. The stored arrays only change through explicit
//! processing operations; display scaling lives in `project::display`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XrdError};

/// Default label template; `{name}` is replaced by the pattern name
pub const DEFAULT_LABEL: &str = "{name}";

/// A measured or derived diffraction trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XyPattern {
    pub name: String,
    /// Label template, see [`DEFAULT_LABEL`]
    pub label: String,
    /// Hex colour used when plotting, e.g. `#0000FF`
    pub color: String,
    pub line_width: f64,
    /// Vertical display offset (never applied to stored data)
    pub display_offset: f64,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Default for XyPattern {
    fn default() -> Self {
        Self {
            name: "Pattern".to_string(),
            label: DEFAULT_LABEL.to_string(),
            color: "#0000FF".to_string(),
            line_width: 2.0,
            display_offset: 0.0,
            x: Vec::new(),
            y: Vec::new(),
        }
    }
}

impl XyPattern {
    /// Create an empty pattern
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Build a pattern from x/y columns, checking lengths and x ordering
    pub fn from_xy(name: &str, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        let mut pattern = Self::new(name);
        pattern.set_data(x, y)?;
        Ok(pattern)
    }

    /// Replace both columns at once
    pub fn set_data(&mut self, x: Vec<f64>, y: Vec<f64>) -> Result<()> {
        if x.len() != y.len() {
            return Err(XrdError::LengthMismatch {
                what: "y column",
                expected: x.len(),
                got: y.len(),
            });
        }
        check_increasing(&x)?;
        self.x = x;
        self.y = y;
        Ok(())
    }

    /// Check the x-ordering invariant (used after deserialization)
    pub fn validate(&self) -> Result<()> {
        if self.x.len() != self.y.len() {
            return Err(XrdError::LengthMismatch {
                what: "y column",
                expected: self.x.len(),
                got: self.y.len(),
            });
        }
        check_increasing(&self.x)
    }

    /// Append one sample; x must exceed the current last x
    pub fn push(&mut self, x: f64, y: f64) -> Result<()> {
        if let Some(&last) = self.x.last() {
            if !(x > last) {
                return Err(XrdError::NotIncreasing {
                    index: self.x.len(),
                    previous: last,
                    current: x,
                });
            }
        }
        self.x.push(x);
        self.y.push(y);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Mutable intensities; x ordering cannot be broken through this
    pub fn y_mut(&mut self) -> &mut [f64] {
        &mut self.y
    }

    /// Replace the intensities, keeping the x grid
    pub fn set_y(&mut self, y: Vec<f64>) -> Result<()> {
        if y.len() != self.x.len() {
            return Err(XrdError::LengthMismatch {
                what: "y column",
                expected: self.x.len(),
                got: y.len(),
            });
        }
        self.y = y;
        Ok(())
    }

    /// Subtract `delta` from every x value
    pub fn shift_x(&mut self, delta: f64) {
        for v in self.x.iter_mut() {
            *v -= delta;
        }
    }

    /// Iterate over (x, y) pairs
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// Maximum intensity, or 0 for patterns with fewer than two points
    pub fn max_intensity(&self) -> f64 {
        if self.x.len() > 1 {
            self.y.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        } else {
            0.0
        }
    }

    /// Minimum intensity, `None` when empty
    pub fn min_intensity(&self) -> Option<f64> {
        if self.y.is_empty() {
            None
        } else {
            Some(self.y.iter().cloned().fold(f64::INFINITY, f64::min))
        }
    }

    /// First and last x value
    pub fn x_range(&self) -> Option<(f64, f64)> {
        match (self.x.first(), self.x.last()) {
            (Some(&a), Some(&b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Label with the template expanded
    pub fn label_text(&self) -> String {
        self.label.replace("{name}", &self.name)
    }

    /// Linearly interpolate this pattern's intensities onto another x grid.
    /// Values outside the pattern's range are clamped to the end values.
    pub fn resample(&self, grid: &[f64]) -> Vec<f64> {
        if self.is_empty() {
            return vec![0.0; grid.len()];
        }
        let n = self.x.len();
        grid.iter()
            .map(|&g| {
                if g <= self.x[0] {
                    return self.y[0];
                }
                if g >= self.x[n - 1] {
                    return self.y[n - 1];
                }
                // x[j] <= g < x[j + 1]
                let j = self.x.partition_point(|&v| v <= g) - 1;
                let (x0, y0) = (self.x[j], self.y[j]);
                let (x1, y1) = (self.x[j + 1], self.y[j + 1]);
                if (x1 - x0).abs() > 1e-12 {
                    y0 + (g - x0) * (y1 - y0) / (x1 - x0)
                } else {
                    y0
                }
            })
            .collect()
    }
}

fn check_increasing(x: &[f64]) -> Result<()> {
    for i in 1..x.len() {
        if !(x[i] > x[i - 1]) {
            return Err(XrdError::NotIncreasing {
                index: i,
                previous: x[i - 1],
                current: x[i],
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_xy_rejects_unsorted() {
        let err = XyPattern::from_xy("p", vec![1.0, 3.0, 2.0], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, XrdError::NotIncreasing { index: 2, .. }));
    }

    #[test]
    fn test_from_xy_rejects_length_mismatch() {
        let err = XyPattern::from_xy("p", vec![1.0, 2.0], vec![0.0]).unwrap_err();
        assert!(matches!(err, XrdError::LengthMismatch { .. }));
    }

    #[test]
    fn test_max_intensity_needs_two_points() {
        let single = XyPattern::from_xy("p", vec![1.0], vec![50.0]).unwrap();
        assert_eq!(single.max_intensity(), 0.0);

        let p = XyPattern::from_xy("p", vec![1.0, 2.0, 3.0], vec![5.0, 50.0, 7.0]).unwrap();
        assert_eq!(p.max_intensity(), 50.0);
        assert_eq!(p.min_intensity(), Some(5.0));
    }

    #[test]
    fn test_push_enforces_order() {
        let mut p = XyPattern::new("p");
        p.push(1.0, 1.0).unwrap();
        p.push(2.0, 1.0).unwrap();
        assert!(p.push(2.0, 1.0).is_err());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_label_template() {
        let mut p = XyPattern::new("Sample A");
        p.label = "{name} (air dried)".to_string();
        assert_eq!(p.label_text(), "Sample A (air dried)");
    }

    #[test]
    fn test_resample_linear_and_clamped() {
        let p = XyPattern::from_xy("bg", vec![0.0, 10.0], vec![0.0, 100.0]).unwrap();
        let r = p.resample(&[-1.0, 0.0, 2.5, 10.0, 12.0]);
        assert_eq!(r, vec![0.0, 0.0, 25.0, 100.0, 100.0]);
    }

    #[test]
    fn test_shift_x_keeps_order() {
        let mut p = XyPattern::from_xy("p", vec![1.0, 2.0, 3.0], vec![0.0; 3]).unwrap();
        p.shift_x(0.25);
        assert_eq!(p.x(), &[0.75, 1.75, 2.75]);
        assert!(p.validate().is_ok());
    }
}
