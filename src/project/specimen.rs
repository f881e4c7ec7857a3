//! A specimen: one measured pattern, its calculated counterpart, markers and
//! the corrections waiting to be applied to the measurement.

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::data::goniometer::Goniometer;
use crate::data::loader;
use crate::data::markers::Marker;
use crate::data::pattern::XyPattern;
use crate::error::Result;
use crate::log::reproducibility::ReproLog;
use crate::pipeline::background::{self, Background, BackgroundKind};
use crate::pipeline::calibration::{self, ReferenceStandard};
use crate::pipeline::peaks;
use crate::pipeline::processing::ProcessingOp;
use crate::pipeline::smoothing::{self, SmoothingKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specimen {
    /// Stable identity; survives renames and reordering within a project
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub sample_name: String,

    pub experimental: XyPattern,
    pub calculated: XyPattern,
    pub markers: Vec<Marker>,

    /// Pending background, cleared once removed
    pub background: Background,
    pub background_kind: BackgroundKind,
    pub smoothing_kind: SmoothingKind,
    /// Pending smoothing degree, reset to 0 once applied
    pub smoothing_degree: usize,
    pub shift_reference: ReferenceStandard,
    /// Pending 2θ shift, reset to 0 once applied
    pub shift_value: f64,

    pub display_experimental: bool,
    pub display_calculated: bool,

    // Take colour / line width from the project settings
    pub inherit_exp_color: bool,
    pub inherit_calc_color: bool,
    pub inherit_exp_lw: bool,
    pub inherit_calc_lw: bool,
}

impl Specimen {
    pub fn new(name: &str, sample_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            sample_name: sample_name.to_string(),
            experimental: XyPattern::new(name),
            calculated: XyPattern::new("Calculated"),
            markers: Vec::new(),
            background: Background::None,
            background_kind: BackgroundKind::Linear,
            smoothing_kind: SmoothingKind::MovingTriangle,
            smoothing_degree: 0,
            shift_reference: ReferenceStandard::Quartz,
            shift_value: 0.0,
            display_experimental: true,
            display_calculated: true,
            inherit_exp_color: true,
            inherit_calc_color: true,
            inherit_exp_lw: true,
            inherit_calc_lw: true,
        }
    }

    /// The pattern takes the specimen's name, which labels it in plots and logs
    pub fn from_pattern(name: &str, sample_name: &str, mut pattern: XyPattern) -> Self {
        let mut specimen = Self::new(name, sample_name);
        pattern.name = name.to_string();
        specimen.experimental = pattern;
        specimen
    }

    /// Load the experimental pattern from a file; the text header (if any)
    /// becomes the sample name.
    pub fn from_file(path: &Path, log: &mut ReproLog) -> Result<Self> {
        let loaded = loader::load_pattern(path, log)?;
        let name = loaded.pattern.name.clone();
        let sample = loaded.header.unwrap_or_default();
        Ok(Self::from_pattern(&name, &sample, loaded.pattern))
    }

    /// Header line written on export
    pub fn header(&self) -> String {
        format!("{} {}", self.name, self.sample_name)
    }

    /// Highest intensity over the experimental and calculated patterns
    pub fn max_intensity(&self) -> f64 {
        self.experimental
            .max_intensity()
            .max(self.calculated.max_intensity())
    }

    /// Use `reference` (resampled onto the experimental grid) as a pattern background
    pub fn set_background_pattern(&mut self, reference: &XyPattern, scale: f64, offset: f64) {
        self.background = Background::from_reference(&self.experimental, reference, scale, offset);
        self.background_kind = BackgroundKind::Pattern;
    }

    /// Estimate the pending background using the current background kind
    pub fn find_background(&mut self, log: &mut ReproLog) -> Result<()> {
        let found = background::find_background(
            &self.experimental,
            self.background_kind,
            Some(&self.background),
        )?;
        log.record(
            &self.name,
            ProcessingOp::FindBackground(self.background_kind),
            found.to_string(),
            None,
        );
        self.background = found;
        Ok(())
    }

    pub fn remove_background(&mut self, log: &mut ReproLog) -> Result<()> {
        background::remove_background(&mut self.experimental, &mut self.background, log)
    }

    /// Smoothed intensities for the pending degree, without touching the data
    pub fn smoothing_preview(&self) -> Option<Vec<f64>> {
        if self.smoothing_degree == 0 || self.experimental.is_empty() {
            return None;
        }
        match self.smoothing_kind {
            SmoothingKind::MovingTriangle => Some(smoothing::triangle_smooth(
                self.experimental.y(),
                self.smoothing_degree,
            )),
        }
    }

    /// Apply the pending smoothing and reset the degree
    pub fn smooth(&mut self, log: &mut ReproLog) -> bool {
        let changed = smoothing::smooth_pattern(
            &mut self.experimental,
            self.smoothing_kind,
            self.smoothing_degree,
            log,
        );
        self.smoothing_degree = 0;
        changed
    }

    /// Change the reference standard and search for the shift again
    pub fn set_shift_reference(
        &mut self,
        standard: ReferenceStandard,
        goniometer: &Goniometer,
        log: &mut ReproLog,
    ) -> Result<f64> {
        self.shift_reference = standard;
        self.find_shift(goniometer, log)
    }

    pub fn find_shift(&mut self, goniometer: &Goniometer, log: &mut ReproLog) -> Result<f64> {
        let shift = calibration::find_shift(&self.experimental, goniometer, self.shift_reference)?;
        self.shift_value = shift;
        log.record(
            &self.name,
            ProcessingOp::FindShift(self.shift_reference),
            format!("shift {:+.5}°2θ", shift),
            None,
        );
        Ok(shift)
    }

    /// Apply the pending shift to the pattern and markers, then reset it
    pub fn apply_shift(&mut self, log: &mut ReproLog) -> bool {
        let changed = calibration::apply_shift(
            &mut self.experimental,
            &mut self.markers,
            self.shift_value,
            log,
        );
        self.shift_value = 0.0;
        changed
    }

    /// Detect peaks at least `min_separation` °2θ apart and add them as
    /// markers. Returns the number added.
    pub fn detect_peaks(
        &mut self,
        threshold: f64,
        min_separation: f64,
        goniometer: &Goniometer,
        log: &mut ReproLog,
    ) -> usize {
        let found = peaks::detect_peaks(&self.experimental, threshold, min_separation);
        let markers = peaks::peaks_to_markers(&found, goniometer);
        let added = markers.len();
        self.markers.extend(markers);
        log.record(
            &self.name,
            ProcessingOp::DetectPeaks {
                threshold,
                min_separation,
            },
            format!("{} markers added", added),
            Some(format!(
                "xrd peaks \"$PATTERN\" --threshold {} --min-separation {}",
                threshold, min_separation
            )),
        );
        added
    }

    /// Export the experimental pattern; the format follows the extension
    pub fn save_data(&self, path: &Path) -> Result<()> {
        loader::save_pattern(path, &self.header(), &self.experimental)
    }
}
