//! Parkview is the core of a small map viewer that plots a fixed set of parks on a hosted map
//! style.
//!
//! The crate does not draw anything. It keeps the state of the viewer and decides what the UI
//! should show:
//!
//! * [`ParkDataset`] holds the parks read from a GeoJSON-like feature collection.
//! * [`StyleResolver`] turns style references into URLs of the style hosting API.
//! * [`StyleHealthTracker`] follows the health of the active style and decides when to fall back
//!   to the baseline style.
//! * [`MapSurface`] is the boundary to the map engine. The engine reports lifecycle events and
//!   outgoing requests through a [`SurfaceHandle`].
//! * [`ViewerShell`] owns the UI state and ties everything together. A UI loop calls
//!   [`ViewerShell::pump`] once per frame and renders [`ViewerShell::markers`] and
//!   [`ViewerShell::popup`].
//!
//! The egui front end lives in the `parkview-egui` crate.

mod color;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod keyboard;
mod messenger;
mod shell;
pub mod style;
pub mod surface;
pub mod viewport;

pub use color::Color;
pub use config::ViewerConfig;
pub use dataset::{ParkDataset, ParkFeature, ParkId};
pub use diagnostics::{DiagnosticRunner, HttpStyleFetcher, StyleFetcher};
pub use error::ParkviewError;
pub use health::{Fallback, FetchRecord, StyleHealth, StyleHealthTracker};
pub use keyboard::{KeyDispatcher, KeySignal, KeySubscription};
pub use messenger::{DummyMessenger, Messenger};
pub use shell::{Marker, ShellUpdate, ViewerShell};
pub use style::{AccessToken, StylePreset, StyleRef, StyleResolver};
pub use surface::{MapEvent, MapSurface, SurfaceHandle};
pub use viewport::ViewportState;
