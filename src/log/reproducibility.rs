//! Reproducibility log.
//!
//! Every change to a specimen's data is recorded as the typed operation that
//! caused it, the specimen it touched and, where one exists, the `xrd`
//! invocation that repeats it. Sequence numbers are never reused, so undo and
//! redo can take out or put back one exact entry while loads and other
//! specimens keep logging in between.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::data::loader::PatternFormat;
use crate::error::Result;
use crate::pipeline::processing::ProcessingOp;

/// What a log entry records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogAction {
    /// A pattern file was read
    Load(PatternFormat),
    Process(ProcessingOp),
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogAction::Load(format) => write!(f, "Load {}", format),
            LogAction::Process(op) => write!(f, "{}", op),
        }
    }
}

impl From<ProcessingOp> for LogAction {
    fn from(op: ProcessingOp) -> Self {
        LogAction::Process(op)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique within a log, increasing in recording order
    pub sequence: u64,
    pub timestamp: DateTime<Local>,
    pub specimen: String,
    pub action: LogAction,
    pub description: String,
    /// Shell line replaying the step; `$PATTERN` stands for the data file
    pub command: Option<String>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}] {}: {}",
            self.sequence,
            self.timestamp.format("%H:%M:%S"),
            self.specimen,
            self.action,
            self.description
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproLog {
    pub session_id: uuid::Uuid,
    pub session_start: DateTime<Local>,
    pub source_file: String,
    pub software_version: String,
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    last_sequence: u64,
}

impl ReproLog {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4(),
            session_start: Local::now(),
            source_file: String::new(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            entries: Vec::new(),
            last_sequence: 0,
        }
    }

    pub fn set_source(&mut self, source: &str) {
        self.source_file = source.to_string();
    }

    /// Record an action on `specimen` and return its sequence number
    pub fn record(
        &mut self,
        specimen: &str,
        action: impl Into<LogAction>,
        description: impl Into<String>,
        command: Option<String>,
    ) -> u64 {
        self.last_sequence += 1;
        let entry = LogEntry {
            sequence: self.last_sequence,
            timestamp: Local::now(),
            specimen: specimen.to_string(),
            action: action.into(),
            description: description.into(),
            command,
        };
        log::info!("{}", entry);
        self.entries.push(entry);
        self.last_sequence
    }

    /// Sequence number of the most recent recording, 0 before the first
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Entries recorded after `sequence`
    pub fn entries_after(&self, sequence: u64) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.sequence > sequence)
            .cloned()
            .collect()
    }

    /// Take out the entry with this sequence number
    pub fn remove_entry(&mut self, sequence: u64) -> Option<LogEntry> {
        let pos = self.entries.iter().position(|e| e.sequence == sequence)?;
        Some(self.entries.remove(pos))
    }

    /// Put an entry back at its place in recording order
    pub fn restore_entry(&mut self, entry: LogEntry) {
        let pos = self
            .entries
            .partition_point(|e| e.sequence < entry.sequence);
        if self.entries.get(pos).map(|e| e.sequence) == Some(entry.sequence) {
            return;
        }
        self.last_sequence = self.last_sequence.max(entry.sequence);
        self.entries.insert(pos, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![
            format!("xrd {} processing log", self.software_version),
            format!("session {}", self.session_id),
            format!("started {}", self.session_start.format("%Y-%m-%d %H:%M:%S")),
        ];
        if !self.source_file.is_empty() {
            lines.push(format!("source  {}", self.source_file));
        }
        lines.push(String::new());
        for entry in &self.entries {
            lines.push(entry.to_string());
            if let Some(command) = &entry.command {
                lines.push(format!("    $ {}", command));
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Bash script replaying every entry that has a command. The data file
    /// is the first argument and defaults to the session source.
    pub fn to_shell_script(&self) -> String {
        let mut lines = vec![
            "#!/bin/bash".to_string(),
            format!(
                "# xrd {} session {} ({})",
                self.software_version,
                self.session_id,
                self.session_start.format("%Y-%m-%d %H:%M:%S")
            ),
            "set -euo pipefail".to_string(),
            String::new(),
            format!("PATTERN=\"${{1:-{}}}\"", self.source_file.replace('"', "\\\"")),
        ];
        for entry in &self.entries {
            lines.push(String::new());
            lines.push(format!("# {}: {}", entry.action, entry.description));
            if let Some(command) = &entry.command {
                lines.push(command.clone());
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }

    pub fn save_text(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Write the replay script and mark it executable
    pub fn save_script(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_shell_script())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }
}

impl Default for ReproLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::process_command;

    fn smooth(degree: usize) -> ProcessingOp {
        ProcessingOp::Smooth { degree }
    }

    #[test]
    fn test_record_returns_increasing_sequence() {
        let mut log = ReproLog::new();
        assert!(log.is_empty());
        assert_eq!(log.last_sequence(), 0);

        let a = log.record("AD", smooth(3), "degree 3", Some(process_command("--smooth 3")));
        let b = log.record("AD", LogAction::Load(PatternFormat::Dat), "12 points", None);
        assert_eq!((a, b), (1, 2));
        assert_eq!(log.entries[0].action, LogAction::Process(smooth(3)));
        assert_eq!(log.entries[1].specimen, "AD");
        assert_eq!(log.entries_after(1).len(), 1);
    }

    #[test]
    fn test_remove_and_restore_exact_entry() {
        let mut log = ReproLog::new();
        log.record("A", smooth(1), "first", None);
        let middle = log.record("A", smooth(2), "second", None);
        log.record("B", LogAction::Load(PatternFormat::Bin), "third", None);

        let taken = log.remove_entry(middle).unwrap();
        assert_eq!(taken.description, "second");
        assert_eq!(log.len(), 2);
        assert!(log.remove_entry(middle).is_none());

        log.restore_entry(taken.clone());
        let order: Vec<u64> = log.entries.iter().map(|e| e.sequence).collect();
        assert_eq!(order, vec![1, 2, 3]);

        // restoring twice keeps one copy
        log.restore_entry(taken);
        assert_eq!(log.len(), 3);
        assert_eq!(log.record("A", smooth(4), "fourth", None), 4);
    }

    #[test]
    fn test_text_export() {
        let mut log = ReproLog::new();
        log.set_source("sample.raw");
        log.record(
            "AD",
            ProcessingOp::RemoveBackground,
            "constant 120",
            Some(process_command("--bg-offset 120")),
        );
        let text = log.to_text();
        assert!(text.contains("source  sample.raw"));
        assert!(text.contains("[AD] Remove Background: constant 120"));
        assert!(text.contains("    $ xrd process \"$PATTERN\" --bg-offset 120"));
    }

    #[test]
    fn test_json_roundtrip_keeps_typed_actions() {
        let mut log = ReproLog::new();
        log.record("AD", smooth(2), "degree 2", None);
        let parsed: ReproLog = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(parsed.entries, log.entries);
        assert_eq!(parsed.session_id, log.session_id);
        assert_eq!(parsed.last_sequence(), 1);
    }

    #[test]
    fn test_shell_script_export() {
        let mut log = ReproLog::new();
        log.set_source("a.dat");
        log.record("a", smooth(2), "degree 2", Some(process_command("--smooth 2")));
        log.record("a", LogAction::Load(PatternFormat::Dat), "3 points", None);
        let script = log.to_shell_script();
        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("PATTERN=\"${1:-a.dat}\""));
        assert!(script.contains("--smooth 2 -o \"$PATTERN\""));
        assert!(script.contains("# Load Text (x y): 3 points"));
    }
}
