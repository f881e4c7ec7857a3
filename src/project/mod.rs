pub mod display;
pub mod events;
pub mod project;
pub mod specimen;
