pub mod bin_format;
pub mod dat_format;
pub mod goniometer;
pub mod loader;
pub mod markers;
pub mod pattern;
