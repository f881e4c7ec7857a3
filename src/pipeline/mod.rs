pub mod background;
pub mod calibration;
pub mod peaks;
pub mod processing;
pub mod smoothing;
