//! guide-cam library crate.
//!
//! Captures camera frames, posts them to an object-detection service once a
//! second and speaks the guidance it answers with. The binary wires these
//! modules to the console; integration tests drive them directly.

pub mod actions;
pub mod camera;
pub mod cli;
pub mod config;
pub mod detection;
pub mod detection_loop;
pub mod encoder;
pub mod notify;
pub mod status;
