//! Map engine side of the viewer.
//!
//! Styles are shown as raster tiles rendered by the style hosting service. Every tile request goes
//! through the request observers of the surface, and a probe of the tile under the map center
//! reports lifecycle events for the style.

use galileo::layer::raster_tile_layer::RasterTileLayerBuilder;
use galileo::layer::RasterTileLayer;
use galileo::tile_schema::TileIndex;
use galileo::Messenger;
use parkview::style::TileEndpoint;
use parkview::surface::{EngineError, MapEvent, ResourceKind, ResourceRequest, SurfaceHandle};
use parkview::{ParkviewError, ViewerShell};
use tokio::runtime::Handle;

/// Builds tile layers for styles and checks that their tiles load.
pub struct TileEngine {
    client: reqwest::Client,
    runtime: Handle,
}

impl TileEngine {
    /// Creates an engine running its probes on the given runtime.
    pub fn new(runtime: Handle) -> Result<Self, ParkviewError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parkview/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, runtime })
    }

    /// Creates the layer for the active style of the shell.
    ///
    /// Problems are reported as error events of the style. If the style cannot be shown at all,
    /// `None` is returned and the map stays empty.
    pub fn load_style(
        &self,
        shell: &ViewerShell,
        messenger: Option<impl Messenger + 'static>,
    ) -> Option<RasterTileLayer> {
        let handle = shell.surface().handle();
        handle.emit(MapEvent::StyleData { loaded: false });

        let Some(endpoint) = shell
            .resolver()
            .tile_endpoint(shell.active_style(), shell.surface().credential())
        else {
            let message = if shell.token_present() {
                format!("style {} is not served by the tile service", handle.style())
            } else {
                "no access token configured".to_string()
            };
            handle.emit(MapEvent::Error(EngineError::new(message)));
            return None;
        };

        let tiles = endpoint.clone();
        let observer = handle.clone();
        let mut builder = RasterTileLayerBuilder::new_rest(move |index: &TileIndex| {
            let [z, x, y] = wrap_tile(index.z, index.x, index.y);
            let url = tiles.tile_url(z, x, y);
            observer.observe_request(&ResourceRequest {
                kind: ResourceKind::Tile,
                url: url.clone(),
            });
            url
        });

        if let Some(messenger) = messenger {
            builder = builder.with_messenger(messenger);
        }

        match builder.build() {
            Ok(layer) => {
                self.probe(endpoint, shell.viewport().center_tile(), handle);
                Some(layer)
            }
            Err(err) => {
                handle.emit(MapEvent::Error(EngineError::new(format!(
                    "failed to create tile layer: {err}"
                ))));
                None
            }
        }
    }

    fn probe(&self, endpoint: TileEndpoint, [z, x, y]: [u32; 3], handle: SurfaceHandle) {
        let client = self.client.clone();
        let url = endpoint.tile_url(z, x, y);
        handle.observe_request(&ResourceRequest {
            kind: ResourceKind::Style,
            url: url.clone(),
        });

        self.runtime.spawn(async move {
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    handle.emit(MapEvent::SourceData {
                        source_id: endpoint.source_id().to_string(),
                        loaded: true,
                    });
                    handle.emit(MapEvent::StyleData { loaded: true });
                    handle.emit(MapEvent::StyleLoaded);
                }
                Ok(response) => {
                    let status = response.status();
                    handle.emit(MapEvent::Error(EngineError::with_status(
                        format!(
                            "tile request failed: {}",
                            status.canonical_reason().unwrap_or("unknown status")
                        ),
                        status.as_u16(),
                    )));
                }
                Err(err) => {
                    handle.emit(MapEvent::Error(EngineError::new(format!(
                        "tile request failed: {err}"
                    ))));
                }
            }
        });
    }
}

/// Brings a tile index into the range of the web tile grid: `x` wraps around the antimeridian,
/// `y` is clamped.
fn wrap_tile(z: u32, x: i32, y: i32) -> [u32; 3] {
    let size = 1i64 << z.min(30);
    let x = i64::from(x).rem_euclid(size);
    let y = i64::from(y).clamp(0, size - 1);

    [z, x as u32, y as u32]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_wrap_around() {
        assert_eq!(wrap_tile(2, 1, 3), [2, 1, 3]);
        assert_eq!(wrap_tile(2, -1, 0), [2, 3, 0]);
        assert_eq!(wrap_tile(2, 5, 7), [2, 1, 3]);
        assert_eq!(wrap_tile(0, 3, -2), [0, 0, 0]);
    }
}
