//! Nearby attraction search
//!
//! A catalog of points of interest, narrowed to a radius around the trip
//! destination and ranked against a free-text query by embedding similarity.

pub mod catalog;
pub mod embedder;
pub mod vector_search;

use thiserror::Error;

pub use catalog::*;
pub use embedder::*;
pub use vector_search::*;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttractionSearchError {
    #[error("attraction catalog unavailable: {0}")]
    Catalog(String),
    #[error("embedding request failed: {0}")]
    Embedding(String),
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}
