//! Egui front end of the Parkview map viewer.
//!
//! The map is drawn by the Galileo egui widget. Park markers, the popup and the inspector panel are
//! drawn on top of it from the state of a [`parkview::ViewerShell`].

mod app;
mod engine;
mod init;

pub use app::ParkviewApp;
pub use engine::TileEngine;
pub use init::{run, RunError};
