use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attractions::AttractionSearchError;
use crate::config::AttractionsConfig;
use crate::geo::Coordinates;

const SAMPLE_ATTRACTIONS: &str = include_str!("sample_attractions.json");

/// GeoJSON point; coordinates are `[lon, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attraction {
    pub name: String,
    pub description: String,
    pub location: GeoPoint,
    pub city: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Attraction {
    pub fn coordinates(&self) -> Coordinates {
        let [lon, lat] = self.location.coordinates;
        Coordinates { lat, lon }
    }

    /// Text that gets embedded for this attraction.
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.tags.join(" "))
    }
}

#[derive(Debug, Clone)]
pub struct AttractionCatalog {
    attractions: Vec<Attraction>,
}

impl AttractionCatalog {
    pub fn new(attractions: Vec<Attraction>) -> Self {
        Self { attractions }
    }

    /// Bundled sights in Agra, Delhi and Mumbai.
    pub fn sample() -> Result<Self, AttractionSearchError> {
        Self::from_json(SAMPLE_ATTRACTIONS)
    }

    pub fn from_json(json: &str) -> Result<Self, AttractionSearchError> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|e| AttractionSearchError::Catalog(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, AttractionSearchError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AttractionSearchError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn from_config(config: &AttractionsConfig) -> Result<Self, AttractionSearchError> {
        match &config.catalog_path {
            Some(path) => Self::from_file(path),
            None => Self::sample(),
        }
    }

    /// Entries within `radius_m` of `center`, nearest first.
    pub fn within(&self, center: &Coordinates, radius_m: f64) -> Vec<(&Attraction, f64)> {
        let mut nearby: Vec<_> = self
            .attractions
            .iter()
            .map(|a| (a, center.distance_m(&a.coordinates())))
            .filter(|(_, distance)| *distance <= radius_m)
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby
    }

    pub fn len(&self) -> usize {
        self.attractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attractions.is_empty()
    }
}
