//! Workbench session: the open project, its undo/redo history and the
//! reproducibility log.
//!
//! Every processing operation goes through `Workbench::apply`, which
//! snapshots the specimen first so the operation can be undone.

use std::path::Path;
use uuid::Uuid;

use crate::config::Settings;
use crate::data::loader;
use crate::data::markers;
use crate::error::{Result, XrdError};
use crate::log::reproducibility::{LogEntry, ReproLog};
use crate::pipeline::background::{Background, BackgroundKind};
use crate::pipeline::processing::ProcessingOp;
use crate::project::project::Project;
use crate::project::specimen::Specimen;

/// One undoable step: the specimen as it was before `op`
#[derive(Debug, Clone)]
struct HistoryItem {
    op: ProcessingOp,
    specimen_id: Uuid,
    snapshot: Specimen,
    /// Entries written by the op, moved between log and history on undo/redo
    log_entries: Vec<LogEntry>,
}

#[derive(Debug)]
pub struct Workbench {
    pub project: Project,
    settings: Settings,
    undo_stack: Vec<HistoryItem>,
    redo_stack: Vec<HistoryItem>,
    repro_log: ReproLog,
    status_message: String,
}

impl Workbench {
    pub fn new(settings: Settings) -> Self {
        Self {
            project: Project::from_settings("New project", &settings),
            settings,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            repro_log: ReproLog::new(),
            status_message: "Ready".to_string(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn repro_log(&self) -> &ReproLog {
        &self.repro_log
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Load a pattern file as a new specimen. Returns its index.
    pub fn load_specimen(&mut self, path: &Path) -> Result<usize> {
        if self.project.specimens().is_empty() {
            self.repro_log.set_source(&path.to_string_lossy());
        }
        let specimen = Specimen::from_file(path, &mut self.repro_log)?;
        let index = self.project.add_specimen(specimen);
        self.status_message = format!("Loaded {}", path.display());
        Ok(index)
    }

    /// Remove a specimen together with its undo/redo history
    pub fn remove_specimen(&mut self, index: usize) -> Result<Specimen> {
        let removed = self.project.remove_specimen(index)?;
        self.undo_stack.retain(|item| item.specimen_id != removed.id);
        self.redo_stack.retain(|item| item.specimen_id != removed.id);
        self.status_message = format!("Removed {}", removed.name);
        Ok(removed)
    }

    /// Replace the session with a saved project
    pub fn open_project(&mut self, path: &Path) -> Result<()> {
        self.project = Project::load_json(path)?;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.repro_log = ReproLog::new();
        self.repro_log.set_source(&path.to_string_lossy());
        self.status_message = format!("Opened {}", path.display());
        Ok(())
    }

    pub fn save_project(&mut self, path: &Path) -> Result<()> {
        self.project.save_json(path)?;
        self.status_message = format!("Saved {}", path.display());
        Ok(())
    }

    /// Append the markers in a CSV file to a specimen's markers
    pub fn import_markers(&mut self, index: usize, path: &Path) -> Result<usize> {
        let imported = markers::load_markers_csv(path)?;
        let count = imported.len();
        self.project.modify_specimen(index, |s, _| {
            s.markers.extend(imported);
            Ok(())
        })?;
        self.status_message = format!("Imported {} markers from {}", count, path.display());
        Ok(count)
    }

    pub fn export_markers(&self, index: usize, path: &Path) -> Result<()> {
        markers::save_markers_csv(&self.project.specimen(index)?.markers, path)
    }

    /// Set a constant pending background
    pub fn set_background_offset(&mut self, index: usize, offset: f64) -> Result<()> {
        self.project.modify_specimen(index, |s, _| {
            s.background = Background::Constant { offset };
            s.background_kind = BackgroundKind::Linear;
            Ok(())
        })
    }

    /// Load `path` and use it as the pending pattern background
    pub fn set_background_pattern(
        &mut self,
        index: usize,
        path: &Path,
        scale: f64,
        offset: f64,
    ) -> Result<()> {
        let reference = loader::load_pattern(path, &mut self.repro_log)?.pattern;
        self.project.modify_specimen(index, |s, _| {
            s.set_background_pattern(&reference, scale, offset);
            // logged commands need the file, not the pattern name
            if let Background::Pattern { source, .. } = &mut s.background {
                *source = path.to_string_lossy().to_string();
            }
            Ok(())
        })
    }

    /// Set the pending 2θ shift by hand
    pub fn set_shift(&mut self, index: usize, shift: f64) -> Result<()> {
        self.project.modify_specimen(index, |s, _| {
            s.shift_value = shift;
            Ok(())
        })
    }

    /// Run `op` on the specimen at `index`.
    ///
    /// On failure the specimen and the log are left as they were and nothing
    /// is pushed onto the undo stack.
    pub fn apply(&mut self, index: usize, op: ProcessingOp) -> Result<()> {
        let snapshot = self.project.specimen(index)?.clone();
        let mark = self.repro_log.last_sequence();
        let log = &mut self.repro_log;

        let result = match &op {
            ProcessingOp::FindBackground(kind) => {
                let kind = *kind;
                self.project.modify_specimen(index, |s, _| {
                    s.background_kind = kind;
                    s.find_background(log)
                })
            }
            ProcessingOp::RemoveBackground => {
                self.project.modify_specimen(index, |s, _| s.remove_background(log))
            }
            ProcessingOp::Smooth { degree } => {
                let degree = *degree;
                self.project.modify_specimen(index, |s, _| {
                    s.smoothing_degree = degree;
                    s.smooth(log);
                    Ok(())
                })
            }
            ProcessingOp::FindShift(standard) => {
                let standard = *standard;
                self.project.modify_specimen(index, |s, g| {
                    s.set_shift_reference(standard, g, log).map(|_| ())
                })
            }
            ProcessingOp::ApplyShift => self.project.modify_specimen(index, |s, _| {
                s.apply_shift(log);
                Ok(())
            }),
            ProcessingOp::DetectPeaks {
                threshold,
                min_separation,
            } => {
                let (threshold, min_separation) = (*threshold, *min_separation);
                self.project.modify_specimen(index, |s, g| {
                    s.detect_peaks(threshold, min_separation, g, log);
                    Ok(())
                })
            }
        };

        let log_entries = self.repro_log.entries_after(mark);
        if let Err(e) = result {
            // a failed op may have touched pending fields before erroring
            self.project.replace_specimen(index, snapshot)?;
            for entry in &log_entries {
                self.repro_log.remove_entry(entry.sequence);
            }
            self.status_message = format!("{} failed: {}", op, e);
            ::log::warn!("{}", self.status_message);
            return Err(e);
        }

        self.status_message = format!("Applied: {}", op);
        self.undo_stack.push(HistoryItem {
            op,
            specimen_id: snapshot.id,
            snapshot,
            log_entries,
        });
        self.redo_stack.clear();
        Ok(())
    }

    /// Undo the last operation.
    ///
    /// Fails without losing the step if its specimen is no longer in the
    /// project.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(item) = self.undo_stack.pop() else {
            return Ok(false);
        };
        let Some(index) = self.project.position_of(item.specimen_id) else {
            let err = XrdError::UnknownSpecimen(item.snapshot.name.clone());
            self.undo_stack.push(item);
            return Err(err);
        };
        let current = self.project.replace_specimen(index, item.snapshot)?;
        for entry in &item.log_entries {
            self.repro_log.remove_entry(entry.sequence);
        }
        self.status_message = format!("Undone: {}", item.op);
        self.redo_stack.push(HistoryItem {
            snapshot: current,
            ..item
        });
        Ok(true)
    }

    /// Redo the last undone operation
    pub fn redo(&mut self) -> Result<bool> {
        let Some(item) = self.redo_stack.pop() else {
            return Ok(false);
        };
        let Some(index) = self.project.position_of(item.specimen_id) else {
            let err = XrdError::UnknownSpecimen(item.snapshot.name.clone());
            self.redo_stack.push(item);
            return Err(err);
        };
        let previous = self.project.replace_specimen(index, item.snapshot)?;
        for entry in &item.log_entries {
            self.repro_log.restore_entry(entry.clone());
        }
        self.status_message = format!("Redone: {}", item.op);
        self.undo_stack.push(HistoryItem {
            snapshot: previous,
            ..item
        });
        Ok(true)
    }

    pub fn export_log_text(&self, path: &Path) -> Result<()> {
        self.repro_log.save_text(path)
    }

    pub fn export_log_json(&self, path: &Path) -> Result<()> {
        self.repro_log.save_json(path)
    }

    pub fn export_log_script(&self, path: &Path) -> Result<()> {
        self.repro_log.save_script(path)
    }
}
