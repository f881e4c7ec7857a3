//! Format detection and pattern loading
//!
//! Picks the text or binary reader from the file extension and records the
//! load in the reproducibility log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::bin_format;
use super::dat_format::{self, DatFile};
use super::pattern::XyPattern;
use crate::error::Result;
use crate::log::reproducibility::{LogAction, ReproLog};

/// Supported on-disk pattern formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternFormat {
    /// Headered two-column text
    Dat,
    /// Fixed-offset binary with u16 samples
    Bin,
}

impl fmt::Display for PatternFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternFormat::Dat => write!(f, "Text (x y)"),
            PatternFormat::Bin => write!(f, "Binary (BIN/RAW)"),
        }
    }
}

/// Detect the format from the file extension; anything unknown is text
pub fn detect_format(path: &Path) -> PatternFormat {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "raw" | "bin" => PatternFormat::Bin,
        _ => PatternFormat::Dat,
    }
}

/// Load a pattern from any supported format.
///
/// Text files get their header line auto-detected: a first non-blank line
/// that is not an `x y` pair is taken as the header.
pub fn load_pattern(path: &Path, log: &mut ReproLog) -> Result<DatFile> {
    let format = detect_format(path);
    ::log::info!("Detected format: {} for {}", format, path.display());

    let loaded = match format {
        PatternFormat::Bin => DatFile {
            header: None,
            pattern: bin_format::read_bin_file(path)?,
        },
        PatternFormat::Dat => {
            let content = std::fs::read_to_string(path)?;
            let has_header = first_line_is_header(&content);
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Pattern".to_string());
            dat_format::read_dat(Cursor::new(content), &name, has_header)?
        }
    };

    log.record(
        &loaded.pattern.name,
        LogAction::Load(format),
        format!("{} points from {}", loaded.pattern.len(), path.display()),
        None,
    );
    Ok(loaded)
}

/// Save a pattern in the format implied by `path`
pub fn save_pattern(path: &Path, header: &str, pattern: &XyPattern) -> Result<()> {
    match detect_format(path) {
        PatternFormat::Bin => bin_format::write_bin_file(path, pattern)?,
        PatternFormat::Dat => dat_format::write_dat_file(path, header, pattern)?,
    }
    ::log::info!("Wrote {} points to {}", pattern.len(), path.display());
    Ok(())
}

/// Pattern files directly inside `dir`, sorted by path
pub fn list_pattern_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let p = entry?.path();
        let ext = p
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if p.is_file() && matches!(ext.as_str(), "dat" | "xy" | "txt" | "raw" | "bin") {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

fn first_line_is_header(content: &str) -> bool {
    match content.lines().find(|l| !l.trim().is_empty()) {
        Some(line) => {
            let fields: Vec<&str> = line.split_whitespace().collect();
            !(fields.len() == 2 && fields.iter().all(|f| f.parse::<f64>().is_ok()))
        }
        None => false,
    }
}
