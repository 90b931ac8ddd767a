//! Static park dataset.
//!
//! The dataset is a GeoJSON-like feature collection. Field names of the feature properties
//! (`PARK_ID`, `NAME`, `DESCRIPTIO`) come from the source schema and are kept as is.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::Deserialize;

use crate::error::ParkviewError;
use crate::viewport::ScreenProjector;

/// Dataset shipped with the viewer.
pub const BUNDLED_DATASET: &str = include_str!("../data/skateboard-parks.json");

/// Identifier of a park, taken from the `PARK_ID` property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParkId(String);

impl ParkId {
    /// Creates a new id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// String representation of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ParkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParkId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single park point.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkFeature {
    /// Park id.
    pub id: ParkId,
    /// Display name.
    pub name: String,
    /// Free text description shown in the popup.
    pub description: String,
    /// Longitude, degrees.
    pub longitude: f64,
    /// Latitude, degrees.
    pub latitude: f64,
}

#[derive(Deserialize)]
struct RawCollection {
    features: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawFeature {
    geometry: RawGeometry,
    properties: RawProperties,
}

#[derive(Deserialize)]
struct RawGeometry {
    coordinates: Vec<f64>,
}

#[derive(Deserialize)]
struct RawProperties {
    #[serde(rename = "PARK_ID")]
    id: RawId,
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "DESCRIPTIO", default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(serde_json::Number),
    Text(String),
}

impl From<RawId> for ParkId {
    fn from(value: RawId) -> Self {
        match value {
            RawId::Number(number) => ParkId(number.to_string()),
            RawId::Text(text) => ParkId(text),
        }
    }
}

impl TryFrom<RawFeature> for ParkFeature {
    type Error = ParkviewError;

    fn try_from(raw: RawFeature) -> Result<Self, Self::Error> {
        // Positions may carry an altitude after the two horizontal coordinates.
        let [longitude, latitude, ..] = raw.geometry.coordinates[..] else {
            return Err(ParkviewError::Dataset(format!(
                "expected [longitude, latitude, ..], got {} coordinates",
                raw.geometry.coordinates.len()
            )));
        };

        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(ParkviewError::Dataset("non-finite coordinates".into()));
        }

        Ok(Self {
            id: raw.properties.id.into(),
            name: raw.properties.name,
            description: raw.properties.description.unwrap_or_default(),
            longitude,
            latitude,
        })
    }
}

/// Read-only collection of parks, in dataset order.
#[derive(Debug, Clone, Default)]
pub struct ParkDataset {
    parks: Vec<ParkFeature>,
    index: HashMap<ParkId, usize>,
}

impl ParkDataset {
    /// Parses a dataset from a JSON string.
    ///
    /// Features that cannot be read are skipped with a warning. Only a document that is not a
    /// feature collection at all is an error.
    pub fn from_json(json: &str) -> Result<Self, ParkviewError> {
        let collection: RawCollection = serde_json::from_str(json)?;
        Ok(collection
            .features
            .into_iter()
            .enumerate()
            .filter_map(|(position, value)| {
                match serde_json::from_value::<RawFeature>(value)
                    .map_err(ParkviewError::from)
                    .and_then(ParkFeature::try_from)
                {
                    Ok(park) => Some(park),
                    Err(err) => {
                        log::warn!("Skipping dataset feature #{position}: {err}");
                        None
                    }
                }
            })
            .collect())
    }

    /// Reads and parses a dataset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParkviewError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&json)?;
        log::info!("Loaded {} parks from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    /// The dataset shipped with the viewer.
    pub fn bundled() -> Result<Self, ParkviewError> {
        Self::from_json(BUNDLED_DATASET)
    }

    /// Park with the given id.
    pub fn get(&self, id: &ParkId) -> Option<&ParkFeature> {
        self.index.get(id).map(|&i| &self.parks[i])
    }

    /// Iterates over the parks in dataset order.
    pub fn iter(&self) -> impl Iterator<Item = &ParkFeature> + '_ {
        self.parks.iter()
    }

    /// Number of parks.
    pub fn len(&self) -> usize {
        self.parks.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.parks.is_empty()
    }

    /// Park whose marker is closest to the screen point, if it is within `radius` pixels.
    pub fn hit_test(
        &self,
        projector: &ScreenProjector,
        point: [f32; 2],
        radius: f32,
    ) -> Option<&ParkFeature> {
        self.parks
            .iter()
            .filter_map(|park| {
                let [x, y] = projector.to_screen(park.latitude, park.longitude)?;
                let distance = (x - point[0]).hypot(y - point[1]);
                (distance <= radius).then_some((distance, park))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, park)| park)
    }
}

impl FromIterator<ParkFeature> for ParkDataset {
    fn from_iter<T: IntoIterator<Item = ParkFeature>>(iter: T) -> Self {
        let mut dataset = Self::default();
        for park in iter {
            if dataset.index.contains_key(&park.id) {
                log::warn!("Duplicate park id {}, keeping the first one", park.id);
                continue;
            }

            dataset.index.insert(park.id.clone(), dataset.parks.len());
            dataset.parks.push(park);
        }

        dataset
    }
}
