//! The project: an ordered list of specimens plus the goniometer, display
//! and axes settings shared by all of them.
//!
//! Every setter marks the project as needing a save and emits
//! `ProjectEvent::NeedsUpdate`. Colour and line width settings are pushed
//! down to specimens that inherit them.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use super::events::{EventBus, ListenerId, ProjectEvent};
use super::specimen::Specimen;
use crate::config::Settings;
use crate::data::goniometer::Goniometer;
use crate::error::{Result, XrdError};

/// Intensity normalisation used when plotting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum YScale {
    /// Divide by the highest intensity over all specimens
    #[default]
    MultiNormalised,
    /// Divide by each specimen's own highest intensity
    SingleNormalised,
    /// Raw counts
    Raw,
}

impl YScale {
    pub fn label(&self) -> &str {
        match self {
            YScale::MultiNormalised => "Multi normalised",
            YScale::SingleNormalised => "Single normalised",
            YScale::Raw => "Unchanged raw counts",
        }
    }
}

impl TryFrom<i32> for YScale {
    type Error = XrdError;

    fn try_from(v: i32) -> Result<Self> {
        match v {
            0 => Ok(YScale::MultiNormalised),
            1 => Ok(YScale::SingleNormalised),
            2 => Ok(YScale::Raw),
            other => Err(XrdError::invalid_option("axes_yscale", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum XScale {
    #[default]
    Auto,
    Manual,
}

impl TryFrom<i32> for XScale {
    type Error = XrdError;

    fn try_from(v: i32) -> Result<Self> {
        match v {
            0 => Ok(XScale::Auto),
            1 => Ok(XScale::Manual),
            other => Err(XrdError::invalid_option("axes_xscale", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub marker_angle: f64,
    pub calc_color: String,
    pub exp_color: String,
    pub calc_lw: f64,
    pub exp_lw: f64,
    pub plot_offset: f64,
    pub group_by: usize,
    pub label_pos: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxesSettings {
    pub xscale: XScale,
    pub xmin: f64,
    pub xmax: f64,
    pub xstretch: bool,
    pub yscale: YScale,
    pub yvisible: bool,
}

impl Default for AxesSettings {
    fn default() -> Self {
        Self {
            xscale: XScale::Auto,
            xmin: 0.0,
            xmax: 70.0,
            xstretch: false,
            yscale: YScale::MultiNormalised,
            yvisible: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Project {
    name: String,
    date: String,
    description: String,
    author: String,
    goniometer: Goniometer,
    specimens: Vec<Specimen>,
    display: DisplaySettings,
    axes: AxesSettings,
    #[serde(skip)]
    needs_saving: bool,
    #[serde(skip)]
    events: EventBus,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self::from_settings(name, &Settings::default())
    }

    pub fn from_settings(name: &str, settings: &Settings) -> Self {
        Self {
            name: name.to_string(),
            date: Local::now().format("%d/%m/%Y").to_string(),
            description: String::new(),
            author: String::new(),
            goniometer: settings.goniometer(),
            specimens: Vec::new(),
            display: DisplaySettings {
                marker_angle: 0.0,
                calc_color: settings.calc_color.clone(),
                exp_color: settings.exp_color.clone(),
                calc_lw: settings.calc_lw,
                exp_lw: settings.exp_lw,
                plot_offset: settings.plot_offset,
                group_by: settings.group_by.max(1),
                label_pos: settings.label_pos,
            },
            axes: AxesSettings {
                yscale: settings.yscale,
                ..Default::default()
            },
            needs_saving: true,
            events: EventBus::default(),
        }
    }

    // ---- metadata ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn goniometer(&self) -> &Goniometer {
        &self.goniometer
    }

    pub fn display(&self) -> &DisplaySettings {
        &self.display
    }

    pub fn axes(&self) -> &AxesSettings {
        &self.axes
    }

    pub fn needs_saving(&self) -> bool {
        self.needs_saving
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.changed();
    }

    pub fn set_date(&mut self, date: &str) {
        self.date = date.to_string();
        self.changed();
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
        self.changed();
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = author.to_string();
        self.changed();
    }

    pub fn set_goniometer(&mut self, goniometer: Goniometer) {
        self.goniometer = goniometer;
        self.changed();
    }

    // ---- change notification ----

    pub fn subscribe(&mut self, listener: impl FnMut(&ProjectEvent) + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Hold back notifications until `thaw_updates`
    pub fn freeze_updates(&mut self) {
        self.events.freeze();
    }

    pub fn thaw_updates(&mut self) {
        self.events.thaw();
    }

    fn changed(&mut self) {
        self.needs_saving = true;
        self.events.emit(ProjectEvent::NeedsUpdate);
    }

    // ---- specimens ----

    pub fn specimens(&self) -> &[Specimen] {
        &self.specimens
    }

    pub fn specimen(&self, index: usize) -> Result<&Specimen> {
        self.specimens
            .get(index)
            .ok_or_else(|| XrdError::UnknownSpecimen(format!("#{}", index)))
    }

    /// Current index of the specimen with this id
    pub fn position_of(&self, id: Uuid) -> Option<usize> {
        self.specimens.iter().position(|s| s.id == id)
    }

    /// Append a specimen, applying inherited colours and line widths.
    /// Returns its index.
    pub fn add_specimen(&mut self, mut specimen: Specimen) -> usize {
        self.apply_inherited(&mut specimen);
        self.specimens.push(specimen);
        let index = self.specimens.len() - 1;
        log::debug!("Added specimen #{} to project '{}'", index, self.name);
        self.events.emit(ProjectEvent::SpecimenAdded(index));
        self.changed();
        index
    }

    pub fn remove_specimen(&mut self, index: usize) -> Result<Specimen> {
        if index >= self.specimens.len() {
            return Err(XrdError::UnknownSpecimen(format!("#{}", index)));
        }
        let removed = self.specimens.remove(index);
        self.events.emit(ProjectEvent::SpecimenRemoved(index));
        self.changed();
        Ok(removed)
    }

    /// Run `f` on one specimen; a successful call counts as a change
    pub fn modify_specimen<T>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut Specimen, &Goniometer) -> Result<T>,
    ) -> Result<T> {
        let goniometer = self.goniometer;
        let specimen = self
            .specimens
            .get_mut(index)
            .ok_or_else(|| XrdError::UnknownSpecimen(format!("#{}", index)))?;
        let out = f(specimen, &goniometer)?;
        self.changed();
        Ok(out)
    }

    /// Put a specimen snapshot back in place (undo/redo)
    pub fn replace_specimen(&mut self, index: usize, specimen: Specimen) -> Result<Specimen> {
        let slot = self
            .specimens
            .get_mut(index)
            .ok_or_else(|| XrdError::UnknownSpecimen(format!("#{}", index)))?;
        let previous = std::mem::replace(slot, specimen);
        self.changed();
        Ok(previous)
    }

    fn apply_inherited(&self, specimen: &mut Specimen) {
        if specimen.inherit_exp_color {
            specimen.experimental.color = self.display.exp_color.clone();
        }
        if specimen.inherit_calc_color {
            specimen.calculated.color = self.display.calc_color.clone();
        }
        if specimen.inherit_exp_lw {
            specimen.experimental.line_width = self.display.exp_lw;
        }
        if specimen.inherit_calc_lw {
            specimen.calculated.line_width = self.display.calc_lw;
        }
    }

    // ---- display settings ----

    pub fn set_calc_color(&mut self, color: &str) {
        if self.display.calc_color == color {
            return;
        }
        self.display.calc_color = color.to_string();
        for s in self.specimens.iter_mut().filter(|s| s.inherit_calc_color) {
            s.calculated.color = color.to_string();
        }
        self.changed();
    }

    pub fn set_exp_color(&mut self, color: &str) {
        if self.display.exp_color == color {
            return;
        }
        self.display.exp_color = color.to_string();
        for s in self.specimens.iter_mut().filter(|s| s.inherit_exp_color) {
            s.experimental.color = color.to_string();
        }
        self.changed();
    }

    pub fn set_calc_lw(&mut self, lw: f64) {
        if self.display.calc_lw == lw {
            return;
        }
        self.display.calc_lw = lw;
        for s in self.specimens.iter_mut().filter(|s| s.inherit_calc_lw) {
            s.calculated.line_width = lw;
        }
        self.changed();
    }

    pub fn set_exp_lw(&mut self, lw: f64) {
        if self.display.exp_lw == lw {
            return;
        }
        self.display.exp_lw = lw;
        for s in self.specimens.iter_mut().filter(|s| s.inherit_exp_lw) {
            s.experimental.line_width = lw;
        }
        self.changed();
    }

    pub fn set_plot_offset(&mut self, offset: f64) {
        self.display.plot_offset = offset;
        self.changed();
    }

    /// Clamped to at least 1
    pub fn set_group_by(&mut self, group_by: usize) {
        self.display.group_by = group_by.max(1);
        self.changed();
    }

    pub fn set_label_pos(&mut self, pos: f64) {
        self.display.label_pos = pos;
        self.changed();
    }

    pub fn set_marker_angle(&mut self, angle: f64) {
        self.display.marker_angle = angle;
        self.changed();
    }

    // ---- axes settings ----

    pub fn set_xscale(&mut self, xscale: XScale) {
        self.axes.xscale = xscale;
        self.changed();
    }

    /// Clamped to at least 0
    pub fn set_xmin(&mut self, xmin: f64) {
        self.axes.xmin = xmin.max(0.0);
        self.changed();
    }

    pub fn set_xmax(&mut self, xmax: f64) {
        self.axes.xmax = xmax;
        self.changed();
    }

    pub fn set_xstretch(&mut self, stretch: bool) {
        self.axes.xstretch = stretch;
        self.changed();
    }

    pub fn set_yscale(&mut self, yscale: YScale) {
        self.axes.yscale = yscale;
        self.changed();
    }

    /// Set the y-scale from its numeric code (0, 1 or 2)
    pub fn set_yscale_code(&mut self, code: i32) -> Result<()> {
        self.set_yscale(YScale::try_from(code)?);
        Ok(())
    }

    pub fn set_yvisible(&mut self, visible: bool) {
        self.axes.yvisible = visible;
        self.changed();
    }

    // ---- normalisation ----

    /// Highest intensity over all specimens (0 without specimens)
    pub fn get_max_intensity(&self) -> f64 {
        self.specimens
            .iter()
            .map(|s| s.max_intensity())
            .fold(0.0, f64::max)
    }

    /// Vertical offset of the specimen at `index`
    pub fn display_offset(&self, index: usize) -> f64 {
        (index / self.display.group_by.max(1)) as f64 * self.display.plot_offset
    }

    /// Factor to scale stored intensities by, and the (scaled) offset,
    /// for plotting the specimen at `index`
    pub fn get_scale_factor(&self, index: usize) -> Result<(f64, f64)> {
        let specimen = self.specimen(index)?;
        let offset = self.display_offset(index);
        let or_one = |v: f64| if v == 0.0 { 1.0 } else { v };
        Ok(match self.axes.yscale {
            YScale::MultiNormalised => (1.0 / or_one(self.get_max_intensity()), offset),
            YScale::SingleNormalised => (1.0 / or_one(specimen.max_intensity()), offset),
            YScale::Raw => (1.0, offset * self.get_max_intensity()),
        })
    }

    // ---- persistence ----

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&mut self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        self.needs_saving = false;
        log::info!("Saved project '{}' to {}", self.name, path.display());
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut project: Project = serde_json::from_str(json)?;
        for specimen in &project.specimens {
            specimen.experimental.validate()?;
            specimen.calculated.validate()?;
        }
        project.display.group_by = project.display.group_by.max(1);
        project.axes.xmin = project.axes.xmin.max(0.0);
        project.needs_saving = false;
        Ok(project)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let project = Self::from_json(&json)?;
        log::info!(
            "Loaded project '{}' ({} specimens) from {}",
            project.name,
            project.specimens.len(),
            path.display()
        );
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::pattern::XyPattern;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn specimen(name: &str, peak: f64) -> Specimen {
        let pattern =
            XyPattern::from_xy(name, vec![1.0, 2.0, 3.0], vec![10.0, peak, 20.0]).unwrap();
        Specimen::from_pattern(name, "sample", pattern)
    }

    fn project() -> Project {
        let mut p = Project::new("Test");
        p.add_specimen(specimen("a", 100.0));
        p.add_specimen(specimen("b", 400.0));
        p
    }

    #[test]
    fn test_scale_factor_modes() {
        let mut p = project();
        p.set_plot_offset(0.5);

        let (scale, offset) = p.get_scale_factor(1).unwrap();
        assert_eq!(scale, 1.0 / 400.0);
        assert_eq!(offset, 0.5);

        p.set_yscale(YScale::SingleNormalised);
        let (scale, _) = p.get_scale_factor(0).unwrap();
        assert_eq!(scale, 1.0 / 100.0);

        p.set_yscale(YScale::Raw);
        assert_eq!(p.get_scale_factor(1).unwrap(), (1.0, 0.5 * 400.0));
    }

    #[test]
    fn test_zero_max_treated_as_one() {
        let mut p = Project::new("empty");
        p.add_specimen(Specimen::new("blank", ""));
        assert_eq!(p.get_scale_factor(0).unwrap(), (1.0, 0.0));
        assert!(p.get_scale_factor(3).is_err());
    }

    #[test]
    fn test_yscale_code() {
        let mut p = project();
        p.set_yscale_code(2).unwrap();
        assert_eq!(p.axes().yscale, YScale::Raw);
        assert!(matches!(
            p.set_yscale_code(3),
            Err(XrdError::InvalidOption { .. })
        ));
        assert_eq!(p.axes().yscale, YScale::Raw);
    }

    #[test]
    fn test_clamping() {
        let mut p = project();
        p.set_xmin(-4.0);
        assert_eq!(p.axes().xmin, 0.0);
        p.set_group_by(0);
        assert_eq!(p.display().group_by, 1);
    }

    #[test]
    fn test_group_by_offsets() {
        let mut p = project();
        p.add_specimen(specimen("c", 50.0));
        p.set_plot_offset(0.75);
        p.set_group_by(2);
        assert_eq!(p.display_offset(0), 0.0);
        assert_eq!(p.display_offset(1), 0.0);
        assert_eq!(p.display_offset(2), 0.75);
    }

    #[test]
    fn test_colour_propagates_to_inheriting_specimens() {
        let mut p = project();
        p.modify_specimen(1, |s, _| {
            s.inherit_exp_color = false;
            s.experimental.color = "#00FF00".to_string();
            Ok(())
        })
        .unwrap();
        p.set_exp_color("#123456");
        assert_eq!(p.specimens()[0].experimental.color, "#123456");
        assert_eq!(p.specimens()[1].experimental.color, "#00FF00");

        p.set_calc_lw(3.5);
        assert!(p.specimens().iter().all(|s| s.calculated.line_width == 3.5));
    }

    #[test]
    fn test_events_and_freeze() {
        let mut p = project();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        p.subscribe(move |e| sink.borrow_mut().push(*e));

        p.set_label_pos(0.5);
        assert_eq!(*seen.borrow(), vec![ProjectEvent::NeedsUpdate]);

        p.freeze_updates();
        p.set_xmax(50.0);
        p.add_specimen(specimen("c", 5.0));
        p.remove_specimen(0).unwrap();
        assert_eq!(seen.borrow().len(), 1);
        p.thaw_updates();
        assert_eq!(
            *seen.borrow(),
            vec![ProjectEvent::NeedsUpdate, ProjectEvent::NeedsUpdate]
        );
    }

    #[test]
    fn test_unchanged_colour_does_not_notify() {
        let mut p = project();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        p.subscribe(move |_| *sink.borrow_mut() += 1);
        let current = p.display().exp_color.clone();
        p.set_exp_color(&current);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("xrd-project-{}.json", uuid::Uuid::new_v4()));
        let mut p = project();
        p.set_author("Analyst");
        p.set_yscale(YScale::SingleNormalised);
        p.modify_specimen(0, |s, _| {
            s.shift_value = 0.2;
            Ok(())
        })
        .unwrap();
        assert!(p.needs_saving());

        p.save_json(&path).unwrap();
        assert!(!p.needs_saving());

        let loaded = Project::load_json(&path).unwrap();
        assert!(!loaded.needs_saving());
        assert_eq!(loaded.author(), "Analyst");
        assert_eq!(loaded.axes(), p.axes());
        assert_eq!(loaded.display(), p.display());
        assert_eq!(loaded.specimens(), p.specimens());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_rejects_unsorted_pattern() {
        let p = project();
        let mut value: serde_json::Value = serde_json::from_str(&p.to_json().unwrap()).unwrap();
        value["specimens"][0]["experimental"]["x"][0] = serde_json::json!(9.0);
        assert!(matches!(
            Project::from_json(&value.to_string()),
            Err(XrdError::NotIncreasing { .. })
        ));
    }

    #[test]
    fn test_position_follows_removal() {
        let mut p = project();
        let b = p.specimens()[1].id;
        assert_eq!(p.position_of(b), Some(1));
        let a = p.remove_specimen(0).unwrap();
        assert_eq!(p.position_of(b), Some(0));
        assert_eq!(p.position_of(a.id), None);
    }
}
