use axum::{
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::attractions::{AttractionMatch, AttractionQuery};
use crate::geo::Coordinates;
use crate::models::AppState;
use crate::types::{AppError, AppResult};

const DEFAULT_PLACE: &str = "Delhi";
const DEFAULT_RADIUS_M: u32 = 5_000;
const MIN_RADIUS_M: u32 = 1_000;
const MAX_RADIUS_M: u32 = 20_000;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/map", get(locate))
        .route("/api/map/attractions", get(nearby_attractions))
        .with_state(state)
}

fn place_or_default(place: Option<String>, fallback: Option<&str>) -> String {
    place
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .or_else(|| fallback.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_PLACE.to_string())
}

async fn geocode(state: &AppState, place: &str) -> Option<Coordinates> {
    let geocoder = state.geocoder.as_ref()?;
    match geocoder.geocode(place).await {
        Ok(coords) => coords,
        Err(e) => {
            warn!(place = %place, error = %e, "Geocoding failed");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MapQuery {
    pub place: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub place: String,
    pub lat: f64,
    pub lon: f64,
    /// False when the default location is shown instead.
    pub found: bool,
}

/// GET /api/map?place=... - Coordinates for a place
async fn locate(State(state): State<AppState>, Query(query): Query<MapQuery>) -> ResponseJson<MapResponse> {
    let place = place_or_default(query.place, None);
    let found = geocode(&state, &place).await;
    let coords = found.unwrap_or(Coordinates::DEFAULT);
    Json(MapResponse {
        place,
        lat: coords.lat,
        lon: coords.lon,
        found: found.is_some(),
    })
}

#[derive(Debug, Deserialize)]
pub struct AttractionsQuery {
    pub session: Option<Uuid>,
    pub place: Option<String>,
    pub q: String,
    pub radius: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AttractionsResponse {
    pub place: String,
    pub query: String,
    pub radius_m: u32,
    /// False when no search could run (capability, credential or location missing).
    pub available: bool,
    pub count: usize,
    pub attractions: Vec<AttractionMatch>,
}

/// GET /api/map/attractions?session=&place=&q=&radius= - Attractions near a place
async fn nearby_attractions(
    State(state): State<AppState>,
    Query(query): Query<AttractionsQuery>,
) -> AppResult<ResponseJson<AttractionsResponse>> {
    let text = query.q.trim().to_string();
    if text.is_empty() {
        return Err(AppError::InvalidRequest("search text must not be empty".to_string()));
    }

    let session = match query.session {
        Some(id) => Some(state.sessions.get(id).await?),
        None => None,
    };
    let place = place_or_default(
        query.place,
        session.as_ref().and_then(|s| s.last_destination()),
    );
    let radius_m = query
        .radius
        .unwrap_or(DEFAULT_RADIUS_M)
        .clamp(MIN_RADIUS_M, MAX_RADIUS_M);

    let mut response = AttractionsResponse {
        place,
        query: text,
        radius_m,
        available: false,
        count: 0,
        attractions: Vec::new(),
    };

    let Some(search) = state.attractions.clone() else {
        return Ok(Json(response));
    };
    let credential = session
        .as_ref()
        .and_then(|s| s.embedding_api_key.clone())
        .or_else(|| {
            let key = state.config.attractions.api_key.trim();
            (!key.is_empty()).then(|| key.to_string())
        });
    let Some(credential) = credential else {
        return Ok(Json(response));
    };
    let Some(center) = geocode(&state, &response.place).await else {
        warn!(place = %response.place, "No coordinates for attraction search");
        return Ok(Json(response));
    };

    response.available = true;
    let search_query = AttractionQuery::new(center, f64::from(radius_m), response.query.as_str());
    match search.search(&search_query, &credential).await {
        Ok(matches) => {
            info!(place = %response.place, found = matches.len(), "Attraction search finished");
            response.count = matches.len();
            response.attractions = matches;
        }
        Err(e) => warn!(place = %response.place, error = %e, "Attraction search failed"),
    }
    Ok(Json(response))
}
