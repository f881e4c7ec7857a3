//! Error type shared by the readers, the processing pipeline and the project model.

use std::io;
use thiserror::Error;

/// Result alias for workbench operations
pub type Result<T> = std::result::Result<T, XrdError>;

#[derive(Error, Debug)]
pub enum XrdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed data on line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("Invalid binary header: {0}")]
    InvalidHeader(String),

    #[error("Data truncated: expected {expected} samples, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Length mismatch: {what} has {got} values, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("x values must be strictly increasing (index {index}: {previous} -> {current})")]
    NotIncreasing {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Not a regular grid: x[{index}] is {got}, expected {expected}")]
    IrregularGrid {
        index: usize,
        expected: f64,
        got: f64,
    },

    #[error("Invalid value for '{option}': {value}")]
    InvalidOption { option: &'static str, value: String },

    #[error("No data points within ±{half_width} of {position:.4}°2θ")]
    EmptyWindow { position: f64, half_width: f64 },

    #[error("d-spacing {d_nm} nm is not reachable with wavelength {wavelength_nm} nm")]
    UnreachableSpacing { d_nm: f64, wavelength_nm: f64 },

    #[error("No specimen named '{0}'")]
    UnknownSpecimen(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl XrdError {
    pub fn invalid_option(option: &'static str, value: impl ToString) -> Self {
        XrdError::InvalidOption {
            option,
            value: value.to_string(),
        }
    }
}
