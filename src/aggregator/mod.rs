//! Aggregator Module
//!
//! Optional third-party itinerary service. When configured, one request can
//! replace the full stage chain; any failure falls back to running the
//! agents locally.

pub mod client;

pub use client::{
    AggregateBundle, Aggregator, AggregatorEndpoint, ExternalAggregatorClient, FallbackError,
};
