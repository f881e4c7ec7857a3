//! Goniometer model: converts between d-spacings and 2θ positions.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XrdError};

/// Cu Kα1 wavelength in nm
pub const CU_KA1_NM: f64 = 0.154056;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goniometer {
    /// Radiation wavelength in nm
    pub wavelength_nm: f64,
    /// Lower bound of the scanned range (°2θ)
    pub min_2theta: f64,
    /// Upper bound of the scanned range (°2θ)
    pub max_2theta: f64,
}

impl Default for Goniometer {
    fn default() -> Self {
        Self {
            wavelength_nm: CU_KA1_NM,
            min_2theta: 3.0,
            max_2theta: 45.0,
        }
    }
}

impl Goniometer {
    /// Bragg angle (°2θ) for a d-spacing given in nm
    pub fn two_theta_from_nm(&self, d_nm: f64) -> Result<f64> {
        let ratio = self.wavelength_nm / (2.0 * d_nm);
        if !(d_nm > 0.0) || !(0.0..=1.0).contains(&ratio) {
            return Err(XrdError::UnreachableSpacing {
                d_nm,
                wavelength_nm: self.wavelength_nm,
            });
        }
        Ok(2.0 * ratio.asin().to_degrees())
    }

    /// d-spacing (nm) for a position in °2θ; `None` at 0°
    pub fn nm_from_two_theta(&self, two_theta: f64) -> Option<f64> {
        let s = (two_theta / 2.0).to_radians().sin();
        if s.abs() < 1e-12 {
            None
        } else {
            Some(self.wavelength_nm / (2.0 * s))
        }
    }
}
