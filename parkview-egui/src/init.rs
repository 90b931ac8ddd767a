use std::sync::Arc;
use std::time::Duration;

use galileo::MapBuilder;
use parkview::{DiagnosticRunner, HttpStyleFetcher, ParkviewError, ViewerConfig, ViewerShell};
use thiserror::Error;
use tokio::runtime::{Handle, Runtime};

use crate::app::{EguiMessenger, ParkviewApp};
use crate::engine::TileEngine;

/// Error that prevented the viewer from starting.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration or dataset could not be loaded.
    #[error(transparent)]
    Setup(#[from] ParkviewError),
    /// Background runtime could not be created.
    #[error("failed to start background runtime: {0}")]
    Runtime(#[from] std::io::Error),
    /// The window could not be opened.
    #[error("failed to run the UI: {0}")]
    Ui(#[from] eframe::Error),
}

/// Reads the configuration from the environment and opens the viewer window. Blocks until the
/// window is closed.
pub fn run() -> Result<(), RunError> {
    let config = ViewerConfig::from_env()?;
    let dataset = config.load_dataset()?;

    let runtime = background_runtime()?;
    let engine = TileEngine::new(runtime.clone())?;
    let fetcher = HttpStyleFetcher::new()?;

    let viewport = config.initial_viewport;
    let map = MapBuilder::default()
        .with_latlon(viewport.latitude, viewport.longitude)
        .with_resolution(viewport.resolution())
        .build();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Parkview")
            .with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    galileo_egui::InitBuilder::new(map)
        .with_native_options(native_options)
        .with_app_builder(move |map_state, cc| {
            let messenger = EguiMessenger::new(cc.egui_ctx.clone());
            let diagnostics =
                DiagnosticRunner::new(Arc::new(fetcher), runtime).with_messenger(messenger);
            let shell = ViewerShell::new(config, dataset).with_diagnostics(diagnostics);

            Box::new(ParkviewApp::new(map_state, shell, engine, &cc.egui_ctx))
        })
        .init()?;

    Ok(())
}

/// Runtime for diagnostic fetches and tile probes, driven by a background thread for the whole
/// lifetime of the process.
fn background_runtime() -> std::io::Result<Handle> {
    let runtime = Runtime::new()?;
    let handle = runtime.handle().clone();

    std::thread::Builder::new()
        .name("parkview-runtime".into())
        .spawn(move || {
            runtime.block_on(async {
                loop {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
            })
        })?;

    Ok(handle)
}
