//! Viewer configuration read from the environment.

use std::path::PathBuf;

use crate::dataset::ParkDataset;
use crate::error::ParkviewError;
use crate::style::{default_presets, AccessToken, StyleHost, StylePreset, StyleRef};
use crate::viewport::{ViewportState, MAX_LATITUDE};

/// Variables holding the access token, in order of precedence.
pub const TOKEN_VARIABLES: [&str; 3] = [
    "PARKVIEW_ACCESS_TOKEN",
    "MAPBOX_ACCESS_TOKEN",
    "MAPBOX_TOKEN",
];
/// Variables holding the custom style reference, in order of precedence.
pub const STYLE_VARIABLES: [&str; 2] = ["PARKVIEW_STYLE_URL", "MAPBOX_STYLE_URL"];
/// Variable holding the path of the dataset file.
pub const DATASET_VARIABLE: &str = "PARKVIEW_DATASET";
/// Variable holding the initial map center as `lat,lon`.
pub const CENTER_VARIABLE: &str = "PARKVIEW_CENTER";
/// Variable holding the initial zoom level.
pub const ZOOM_VARIABLE: &str = "PARKVIEW_ZOOM";

/// Everything the viewer needs to start.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Access token of the style service. The viewer works without it, showing no map tiles.
    pub credential: Option<AccessToken>,
    /// Style to start with instead of the baseline one.
    pub custom_style: Option<StyleRef>,
    /// Style to fall back to.
    pub baseline_style: StyleRef,
    /// Styles offered in the inspector.
    pub presets: Vec<StylePreset>,
    /// Map position at startup.
    pub initial_viewport: ViewportState,
    /// Dataset file. The bundled dataset is used if not set.
    pub dataset_path: Option<PathBuf>,
    /// Style hosting service.
    pub style_host: StyleHost,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            credential: None,
            custom_style: None,
            baseline_style: StyleRef::baseline(),
            presets: default_presets(),
            initial_viewport: ViewportState::default(),
            dataset_path: None,
            style_host: StyleHost::default(),
        }
    }
}

impl ViewerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ParkviewError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration using the given variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ParkviewError> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let first = |names: &[&str]| names.iter().find_map(|name| lookup(name));

        let mut config = Self {
            credential: first(&TOKEN_VARIABLES).and_then(AccessToken::new),
            custom_style: first(&STYLE_VARIABLES).map(|style| StyleRef::new(style.trim())),
            dataset_path: lookup(DATASET_VARIABLE).map(PathBuf::from),
            ..Default::default()
        };

        if let Some(center) = lookup(CENTER_VARIABLE) {
            let (latitude, longitude) = parse_center(&center)?;
            config.initial_viewport.latitude = latitude;
            config.initial_viewport.longitude = longitude;
        }

        if let Some(zoom) = lookup(ZOOM_VARIABLE) {
            config.initial_viewport.zoom = zoom
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|zoom| (0.0..=22.0).contains(zoom))
                .ok_or_else(|| {
                    ParkviewError::Configuration(format!(
                        "{ZOOM_VARIABLE} must be a number between 0 and 22, got '{zoom}'"
                    ))
                })?;
        }

        Ok(config)
    }

    /// Style shown at startup.
    pub fn initial_style(&self) -> StyleRef {
        self.custom_style
            .clone()
            .unwrap_or_else(|| self.baseline_style.clone())
    }

    /// Loads the configured dataset, or the bundled one.
    pub fn load_dataset(&self) -> Result<ParkDataset, ParkviewError> {
        match &self.dataset_path {
            Some(path) => ParkDataset::load(path),
            None => ParkDataset::bundled(),
        }
    }
}

fn parse_center(value: &str) -> Result<(f64, f64), ParkviewError> {
    let invalid = || {
        ParkviewError::Configuration(format!(
            "{CENTER_VARIABLE} must be 'latitude,longitude', got '{value}'"
        ))
    };

    let (latitude, longitude) = value.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = latitude.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = longitude.trim().parse().map_err(|_| invalid())?;

    if latitude.abs() > MAX_LATITUDE || longitude.abs() > 180.0 {
        return Err(invalid());
    }

    Ok((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ViewerConfig, ParkviewError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ViewerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment() {
        let config = config(&[]).expect("valid");
        assert!(config.credential.is_none());
        assert_eq!(config.initial_style(), StyleRef::baseline());
        assert_eq!(config.initial_viewport, ViewportState::default());
        assert!(config.dataset_path.is_none());
    }

    #[test]
    fn token_precedence() {
        let config = config(&[
            ("MAPBOX_TOKEN", "pk.legacy"),
            ("PARKVIEW_ACCESS_TOKEN", "  "),
            ("MAPBOX_ACCESS_TOKEN", "pk.mapbox"),
        ])
        .expect("valid");
        assert_eq!(
            config.credential.as_ref().map(AccessToken::expose),
            Some("pk.mapbox")
        );
    }

    #[test]
    fn custom_style_is_initial() {
        let config = config(&[("MAPBOX_STYLE_URL", "mapbox://styles/me/custom")]).expect("valid");
        assert_eq!(config.initial_style().as_str(), "mapbox://styles/me/custom");
        assert_eq!(config.baseline_style, StyleRef::baseline());
    }

    #[test]
    fn viewport_overrides() {
        let config = config(&[(CENTER_VARIABLE, "48.85, 2.35"), (ZOOM_VARIABLE, "12.5")])
            .expect("valid");
        assert_eq!(config.initial_viewport, ViewportState::new(48.85, 2.35, 12.5));
    }

    #[test]
    fn invalid_values() {
        assert_matches!(
            config(&[(CENTER_VARIABLE, "48.85")]),
            Err(ParkviewError::Configuration(_))
        );
        assert_matches!(
            config(&[(CENTER_VARIABLE, "95,2")]),
            Err(ParkviewError::Configuration(_))
        );
        assert_matches!(
            config(&[(ZOOM_VARIABLE, "far")]),
            Err(ParkviewError::Configuration(_))
        );
        assert_matches!(
            config(&[(ZOOM_VARIABLE, "30")]),
            Err(ParkviewError::Configuration(_))
        );
    }

    #[test]
    fn missing_dataset_file() {
        let config = config(&[(DATASET_VARIABLE, "/definitely/not/here.json")]).expect("valid");
        assert_matches!(config.load_dataset(), Err(ParkviewError::FsIo(_)));
    }
}
