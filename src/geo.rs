//! Geocoding
//!
//! Optional place-name lookup used by the map endpoint. When the capability
//! is absent or a place is not found the caller shows a default location.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeocodingConfig;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoding request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse geocoding response: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// New Delhi, shown when nothing better is known.
    pub const DEFAULT: Coordinates = Coordinates {
        lat: 28.6139,
        lon: 77.2090,
    };

    /// Great-circle distance in meters (haversine).
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| GeocodeError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        Self::new(&config.base_url, &config.user_agent)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let place = place.trim();
        if place.is_empty() {
            return Ok(None);
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GeocodeError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), place, "Geocoder returned error status");
            return Err(GeocodeError::RequestFailed(format!(
                "status code {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| GeocodeError::ParseError(e.to_string()))?;

        let Some(first) = places.into_iter().next() else {
            debug!(place, "Place not found");
            return Ok(None);
        };

        let lat = first
            .lat
            .parse::<f64>()
            .map_err(|e| GeocodeError::ParseError(e.to_string()))?;
        let lon = first
            .lon
            .parse::<f64>()
            .map_err(|e| GeocodeError::ParseError(e.to_string()))?;

        Ok(Some(Coordinates { lat, lon }))
    }
}
