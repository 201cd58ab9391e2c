use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::attractions::{AttractionCatalog, AttractionSearchError, Embedder};
use crate::geo::Coordinates;

/// Candidates kept after the distance filter
const NUM_CANDIDATES: usize = 10;
const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct AttractionQuery {
    pub center: Coordinates,
    pub radius_m: f64,
    pub text: String,
    pub limit: usize,
}

impl AttractionQuery {
    pub fn new(center: Coordinates, radius_m: f64, text: impl Into<String>) -> Self {
        Self {
            center,
            radius_m,
            text: text.into(),
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttractionMatch {
    pub name: String,
    pub description: String,
    pub city: String,
    pub kind: String,
    pub tags: Vec<String>,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
    /// Cosine similarity to the query text
    pub score: f32,
}

/// Finds attractions near a point that match a free-text query.
#[async_trait]
pub trait AttractionSearch: Send + Sync {
    async fn search(
        &self,
        query: &AttractionQuery,
        credential: &str,
    ) -> Result<Vec<AttractionMatch>, AttractionSearchError>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Distance pre-filter over the catalog, then ranking by embedding similarity.
/// Attraction embeddings are computed on first use and cached by name.
pub struct VectorAttractionSearch {
    catalog: AttractionCatalog,
    embedder: Arc<dyn Embedder>,
    embeddings: RwLock<HashMap<String, Vec<f32>>>,
}

impl VectorAttractionSearch {
    pub fn new(catalog: AttractionCatalog, embedder: Arc<dyn Embedder>) -> Self {
        info!(attractions = catalog.len(), "Attraction search ready");
        Self {
            catalog,
            embedder,
            embeddings: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AttractionSearch for VectorAttractionSearch {
    async fn search(
        &self,
        query: &AttractionQuery,
        credential: &str,
    ) -> Result<Vec<AttractionMatch>, AttractionSearchError> {
        let candidates: Vec<_> = self
            .catalog
            .within(&query.center, query.radius_m)
            .into_iter()
            .take(NUM_CANDIDATES)
            .collect();
        if candidates.is_empty() {
            debug!(radius_m = query.radius_m, "No attractions within radius");
            return Ok(Vec::new());
        }

        let missing: Vec<_> = {
            let cache = self.embeddings.read().await;
            candidates
                .iter()
                .filter(|(a, _)| !cache.contains_key(&a.name))
                .map(|(a, _)| *a)
                .collect()
        };

        let mut inputs = Vec::with_capacity(missing.len() + 1);
        inputs.push(query.text.clone());
        inputs.extend(missing.iter().map(|a| a.embedding_text()));

        let mut vectors = self.embedder.embed(credential, &inputs).await?;
        if vectors.len() != inputs.len() {
            return Err(AttractionSearchError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        let query_vector = vectors.remove(0);

        let mut cache = self.embeddings.write().await;
        for (attraction, vector) in missing.iter().zip(vectors) {
            cache.insert(attraction.name.clone(), vector);
        }

        let mut matches: Vec<AttractionMatch> = candidates
            .iter()
            .filter_map(|(attraction, distance)| {
                let vector = cache.get(&attraction.name)?;
                let coords = attraction.coordinates();
                Some(AttractionMatch {
                    name: attraction.name.clone(),
                    description: attraction.description.clone(),
                    city: attraction.city.clone(),
                    kind: attraction.kind.clone(),
                    tags: attraction.tags.clone(),
                    lat: coords.lat,
                    lon: coords.lon,
                    distance_km: distance / 1000.0,
                    score: cosine_similarity(&query_vector, vector),
                })
            })
            .collect();
        drop(cache);

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(query.limit);
        Ok(matches)
    }
}
