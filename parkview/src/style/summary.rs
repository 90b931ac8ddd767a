use serde_json::Value;

use crate::error::ParkviewError;

/// The parts of a published style definition that matter when a style fails to load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleSummary {
    /// Top level keys of the style document.
    pub keys: Vec<String>,
    /// `terrain` key is present.
    pub has_terrain: bool,
    /// `terrain` key is present but set to `null`, which the engine rejects.
    pub invalid_terrain: bool,
    /// Ids of all sources.
    pub source_ids: Vec<String>,
    /// Ids of `raster-dem` sources.
    pub raster_dem_sources: Vec<String>,
    /// Error message returned by the API instead of a style.
    pub message: Option<String>,
}

impl StyleSummary {
    /// Summarizes a style JSON document.
    pub fn from_json(body: &str) -> Result<Self, ParkviewError> {
        let value: Value = serde_json::from_str(body)?;
        let Value::Object(document) = value else {
            return Err(ParkviewError::InvalidStyle(
                "style definition is not a JSON object".into(),
            ));
        };

        let terrain = document.get("terrain");
        let sources = document.get("sources").and_then(Value::as_object);

        let source_ids = sources
            .map(|sources| sorted(sources.keys().cloned()))
            .unwrap_or_default();
        let raster_dem_sources = sources
            .map(|sources| {
                sorted(
                    sources
                        .iter()
                        .filter(|(_, source)| {
                            source.get("type").and_then(Value::as_str) == Some("raster-dem")
                        })
                        .map(|(id, _)| id.clone()),
                )
            })
            .unwrap_or_default();

        Ok(Self {
            keys: sorted(document.keys().cloned()),
            has_terrain: terrain.is_some(),
            invalid_terrain: terrain.is_some_and(Value::is_null),
            source_ids,
            raster_dem_sources,
            message: document
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Writes the summary to the log.
    pub fn log(&self, style: &str) {
        log::debug!("Style {style} keys: {:?}", self.keys);
        log::debug!(
            "Style {style} terrain: present={}, invalid={}, raster-dem sources: {:?}",
            self.has_terrain,
            self.invalid_terrain,
            self.raster_dem_sources
        );
        log::debug!("Style {style} sources: {:?}", self.source_ids);
        if let Some(message) = &self.message {
            log::warn!("Style API message for {style}: {message}");
        }
    }
}

fn sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut items: Vec<String> = items.collect();
    items.sort();
    items
}

#[cfg(test)]
mod tests {
    use insta::assert_compact_debug_snapshot;

    use super::*;

    #[test]
    fn summarizes_sources_and_terrain() {
        let summary = StyleSummary::from_json(
            r#"{
                "version": 8,
                "name": "Velvet",
                "terrain": null,
                "sources": {
                    "mapbox-dem": { "type": "raster-dem", "url": "mapbox://mapbox.mapbox-terrain-dem-v1" },
                    "composite": { "type": "vector", "url": "mapbox://mapbox.mapbox-streets-v8" }
                },
                "layers": []
            }"#,
        )
        .expect("valid style");

        assert_compact_debug_snapshot!(summary.source_ids, @r#"["composite", "mapbox-dem"]"#);
        assert_eq!(summary.raster_dem_sources, vec!["mapbox-dem".to_string()]);
        assert!(summary.has_terrain);
        assert!(summary.invalid_terrain);
        assert_eq!(summary.message, None);
    }

    #[test]
    fn api_error_message() {
        let summary = StyleSummary::from_json(r#"{ "message": "Not Authorized - Invalid Token" }"#)
            .expect("valid json");
        assert_eq!(summary.keys, vec!["message".to_string()]);
        assert_eq!(summary.message.as_deref(), Some("Not Authorized - Invalid Token"));
        assert!(!summary.has_terrain);
        assert!(summary.source_ids.is_empty());
    }

    #[test]
    fn not_an_object() {
        assert!(StyleSummary::from_json("[1, 2]").is_err());
        assert!(StyleSummary::from_json("<html>").is_err());
    }
}
