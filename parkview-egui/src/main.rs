//! Parkview map viewer.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    // The logger is initialized by the window setup and reads its filter from `RUST_LOG`.
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    if let Err(err) = parkview_egui::run() {
        eprintln!("parkview: {err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
