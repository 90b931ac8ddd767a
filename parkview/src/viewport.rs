//! Map viewport and Web Mercator helpers used to place markers and popups on screen.

use std::f64::consts::{FRAC_PI_4, PI};

/// Semimajor axis of the WGS84 ellipsoid, in meters.
const SEMIMAJOR: f64 = 6_378_137.0;
/// Size of a web tile in pixels.
const TILE_SIZE: f64 = 256.0;
/// Latitude beyond which Web Mercator is not defined.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Resolution (meters per pixel) of the zoom level 0.
pub fn top_resolution() -> f64 {
    2.0 * PI * SEMIMAJOR / TILE_SIZE
}

/// Center and zoom of the map as reported by the map widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Latitude of the map center, degrees.
    pub latitude: f64,
    /// Longitude of the map center, degrees.
    pub longitude: f64,
    /// Web zoom level, fractional.
    pub zoom: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            latitude: 45.4211,
            longitude: -75.6903,
            zoom: 10.0,
        }
    }
}

impl ViewportState {
    /// Creates a new viewport.
    pub fn new(latitude: f64, longitude: f64, zoom: f64) -> Self {
        Self {
            latitude,
            longitude,
            zoom,
        }
    }

    /// Creates a viewport from a map resolution in meters per pixel, as galileo reports it.
    pub fn from_resolution(latitude: f64, longitude: f64, resolution: f64) -> Self {
        Self {
            latitude,
            longitude,
            zoom: (top_resolution() / resolution).log2(),
        }
    }

    /// Meters per pixel at this zoom level.
    pub fn resolution(&self) -> f64 {
        top_resolution() / 2f64.powf(self.zoom)
    }

    /// Closest integer zoom level, clamped to the range web tiles exist for.
    pub fn tile_zoom(&self) -> u32 {
        self.zoom.round().clamp(0.0, 22.0) as u32
    }

    /// Index `[z, x, y]` of the web tile containing the viewport center at [`Self::tile_zoom`].
    pub fn center_tile(&self) -> [u32; 3] {
        let z = self.tile_zoom();
        let n = f64::from(1u32 << z);
        let lat = self.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

        let x = ((self.longitude + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - lat.tan().asinh() / PI) / 2.0 * n).floor();

        [z, x.clamp(0.0, n - 1.0) as u32, y.clamp(0.0, n - 1.0) as u32]
    }

    /// Returns a projector for a map widget of the given size whose center is at `screen_center`.
    pub fn projector(&self, screen_center: [f32; 2]) -> Option<ScreenProjector> {
        let center = project(self.latitude, self.longitude)?;
        Some(ScreenProjector {
            center,
            resolution: self.resolution(),
            screen_center,
        })
    }
}

/// Projects geographic coordinates (degrees) into Web Mercator meters.
pub fn project(latitude: f64, longitude: f64) -> Option<[f64; 2]> {
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = SEMIMAJOR * longitude.to_radians();
    let y = SEMIMAJOR * (FRAC_PI_4 + lat / 2.0).tan().ln();

    if x.is_finite() && y.is_finite() {
        Some([x, y])
    } else {
        None
    }
}

/// Converts geographic coordinates into screen positions for a fixed viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenProjector {
    center: [f64; 2],
    resolution: f64,
    screen_center: [f32; 2],
}

impl ScreenProjector {
    /// Screen position of the given point. Screen `y` grows downwards.
    pub fn to_screen(&self, latitude: f64, longitude: f64) -> Option<[f32; 2]> {
        let [x, y] = project(latitude, longitude)?;
        let dx = (x - self.center[0]) / self.resolution;
        let dy = (y - self.center[1]) / self.resolution;

        Some([
            self.screen_center[0] + dx as f32,
            self.screen_center[1] - dy as f32,
        ])
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn zoom_and_resolution_agree() {
        let viewport = ViewportState::default();
        assert_relative_eq!(viewport.resolution(), 152.874_056_570_35, epsilon = 1e-6);

        let restored = ViewportState::from_resolution(
            viewport.latitude,
            viewport.longitude,
            viewport.resolution(),
        );
        assert_relative_eq!(restored.zoom, 10.0, epsilon = 1e-9);
        assert_eq!(restored.tile_zoom(), 10);
    }

    #[test]
    fn center_tile() {
        assert_eq!(ViewportState::default().center_tile(), [10, 296, 366]);
        assert_eq!(ViewportState::new(0.0, 0.0, 0.3).center_tile(), [0, 0, 0]);
        assert_eq!(ViewportState::new(-90.0, 180.0, 1.0).center_tile(), [1, 1, 1]);
    }

    #[test]
    fn projection_extent() {
        let half_world = PI * SEMIMAJOR;
        let [x, y] = project(0.0, 180.0).expect("finite");
        assert_relative_eq!(x, half_world, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);

        let [_, top] = project(MAX_LATITUDE, 0.0).expect("finite");
        assert_relative_eq!(top, half_world, epsilon = 1e-3);
    }

    #[test]
    fn poles_are_clamped() {
        let pole = project(90.0, 0.0).expect("clamped to a finite value");
        let edge = project(MAX_LATITUDE, 0.0).expect("finite");
        assert_eq!(pole, edge);
    }

    #[test]
    fn center_maps_to_screen_center() {
        let viewport = ViewportState::default();
        let projector = viewport.projector([400.0, 300.0]).expect("projector");
        let screen = projector
            .to_screen(viewport.latitude, viewport.longitude)
            .expect("on screen");
        assert_relative_eq!(screen[0], 400.0, epsilon = 1e-3);
        assert_relative_eq!(screen[1], 300.0, epsilon = 1e-3);
    }

    #[test]
    fn north_east_is_up_right() {
        let viewport = ViewportState::default();
        let projector = viewport.projector([400.0, 300.0]).expect("projector");
        let [sx, sy] = projector
            .to_screen(viewport.latitude + 0.01, viewport.longitude + 0.01)
            .expect("on screen");
        assert!(sx > 400.0);
        assert!(sy < 300.0);
    }
}
