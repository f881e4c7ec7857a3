//! Processing engine for X-ray diffraction patterns of clay specimens:
//! pattern I/O, background removal, smoothing, 2θ calibration, display
//! normalisation and the specimen/project model, with a reproducibility log
//! of every change.

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod project;

pub use app::Workbench;
pub use error::{Result, XrdError};
