// Travel Agents - LLM agent pipeline for personalized travel itineraries

pub mod agents;
pub mod aggregator;
pub mod attractions;
pub mod config;
pub mod geo;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod session;
pub mod types;
pub mod utils;

use std::sync::Arc;

use tracing::{info, warn};

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

use crate::agents::LlmGeneratorFactory;
use crate::aggregator::{Aggregator, ExternalAggregatorClient};
use crate::attractions::{AttractionCatalog, AttractionSearch, OpenAIEmbedder, VectorAttractionSearch};
use crate::geo::{Geocoder, NominatimGeocoder};
use crate::session::SessionStore;

pub fn create_router(state: AppState) -> axum::Router {
    let server = state.config.server.clone();
    middleware::apply_cors(routes::create_router(state), &server)
}

/// Wire up the optional capabilities from configuration. A capability that
/// cannot be constructed is left out rather than failing startup.
pub fn build_state(config: Config) -> AppState {
    let aggregator: Option<Arc<dyn Aggregator>> =
        match ExternalAggregatorClient::from_config(&config.aggregator) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "External aggregator client unavailable");
                None
            }
        };

    let geocoder: Option<Arc<dyn Geocoder>> = if config.geocoding.enabled {
        match NominatimGeocoder::from_config(&config.geocoding) {
            Ok(geocoder) => Some(Arc::new(geocoder)),
            Err(e) => {
                warn!(error = %e, "Geocoder unavailable");
                None
            }
        }
    } else {
        None
    };

    let attractions: Option<Arc<dyn AttractionSearch>> = if config.attractions.enabled {
        match AttractionCatalog::from_config(&config.attractions) {
            Ok(catalog) => Some(Arc::new(VectorAttractionSearch::new(
                catalog,
                Arc::new(OpenAIEmbedder::from_config(&config.attractions)),
            ))),
            Err(e) => {
                warn!(error = %e, "Attraction search unavailable");
                None
            }
        }
    } else {
        None
    };

    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        aggregator = aggregator.is_some(),
        geocoder = geocoder.is_some(),
        attractions = attractions.is_some(),
        "Application state ready"
    );

    AppState {
        generators: Arc::new(LlmGeneratorFactory::new(config.llm.clone())),
        sessions: SessionStore::new(),
        aggregator,
        geocoder,
        attractions,
        config,
    }
}
