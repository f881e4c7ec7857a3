//! User settings: goniometer and display defaults for new projects, and
//! default processing parameters for the command line.
//!
//! Settings are read from a JSON file; any field left out takes its default:
//!
//! ```json
//! { "wavelength_nm": 0.15406, "plot_offset": 1.0 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::goniometer::{Goniometer, CU_KA1_NM};
use crate::error::Result;
use crate::project::project::YScale;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Radiation wavelength in nm
    pub wavelength_nm: f64,
    pub min_2theta: f64,
    pub max_2theta: f64,

    pub yscale: YScale,
    /// Vertical distance between stacked specimens (normalised units)
    pub plot_offset: f64,
    /// Number of specimens sharing one offset step
    pub group_by: usize,
    /// Label height as a fraction of the offset step
    pub label_pos: f64,
    pub calc_color: String,
    pub exp_color: String,
    pub calc_lw: f64,
    pub exp_lw: f64,

    pub smoothing_degree: usize,
    /// Fraction of the maximum intensity a peak must exceed
    pub peak_threshold: f64,
    /// Minimum separation between peaks, in °2θ
    pub peak_min_separation: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wavelength_nm: CU_KA1_NM,
            min_2theta: 3.0,
            max_2theta: 45.0,
            yscale: YScale::MultiNormalised,
            plot_offset: 0.75,
            group_by: 1,
            label_pos: 0.35,
            calc_color: "#FF0000".to_string(),
            exp_color: "#000000".to_string(),
            calc_lw: 2.0,
            exp_lw: 2.0,
            smoothing_degree: 0,
            peak_threshold: 0.1,
            peak_min_separation: 0.1,
        }
    }
}

impl Settings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&json)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Settings from `path` if given, built-in defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn goniometer(&self) -> Goniometer {
        Goniometer {
            wavelength_nm: self.wavelength_nm,
            min_2theta: self.min_2theta,
            max_2theta: self.max_2theta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = r#"{ "plot_offset": 1.5, "yscale": "Raw" }"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.plot_offset, 1.5);
        assert_eq!(s.yscale, YScale::Raw);
        assert_eq!(s.wavelength_nm, CU_KA1_NM);
        assert_eq!(s.group_by, 1);
        assert_eq!(s.calc_color, "#FF0000");
    }

    #[test]
    fn test_file_roundtrip() {
        let name = format!("xrd-settings-{}.json", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(name);
        let mut s = Settings::default();
        s.wavelength_nm = 0.17890;
        s.peak_min_separation = 0.25;
        s.save_json(&path).unwrap();
        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.goniometer().wavelength_nm, 0.17890);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_no_path_gives_defaults() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
