//! Processing operation descriptors
//!
//! Each operation on a specimen is described by a `ProcessingOp` so the
//! workbench can snapshot before it runs (undo/redo) and so the
//! reproducibility log can name it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::background::BackgroundKind;
use super::calibration::ReferenceStandard;

/// Processing operation descriptor (for undo/redo)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessingOp {
    FindBackground(BackgroundKind),
    RemoveBackground,
    Smooth { degree: usize },
    FindShift(ReferenceStandard),
    ApplyShift,
    /// `min_separation` in °2θ
    DetectPeaks { threshold: f64, min_separation: f64 },
}

impl fmt::Display for ProcessingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingOp::FindBackground(kind) => {
                write!(f, "Find Background ({})", kind.label())
            }
            ProcessingOp::RemoveBackground => write!(f, "Remove Background"),
            ProcessingOp::Smooth { degree } => write!(f, "Smooth (degree {})", degree),
            ProcessingOp::FindShift(standard) => write!(f, "Find Shift ({})", standard),
            ProcessingOp::ApplyShift => write!(f, "Apply Shift"),
            ProcessingOp::DetectPeaks {
                threshold,
                min_separation,
            } => write!(
                f,
                "Detect Peaks (threshold {:.2}, min separation {}°)",
                threshold, min_separation
            ),
        }
    }
}

/// Equivalent `xrd process` invocation operating on `$PATTERN` in place
pub fn process_command(args: &str) -> String {
    format!("xrd process \"$PATTERN\" {} -o \"$PATTERN\"", args)
}
