//! External Aggregator Client
//!
//! Calls a third-party itinerary service that can stand in for the whole
//! stage chain in a single request. One attempt per call, bounded by a
//! request timeout. Every failure is classified so the caller can explain
//! why it fell back to the stage chain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AggregatorConfig;

/// Errors that make an aggregator response unusable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FallbackError {
    #[error("aggregator rejected the credential")]
    Auth,

    #[error("aggregator rate limit exceeded")]
    RateLimited,

    #[error("aggregator request timed out")]
    Timeout,

    #[error("could not connect to aggregator: {0}")]
    ConnectionError(String),

    #[error("aggregator response is missing expected fields: {0}")]
    SchemaMismatch(String),

    #[error("aggregator call failed: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorEndpoint {
    Travel,
    Chat,
}

impl AggregatorEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            AggregatorEndpoint::Travel => "travel",
            AggregatorEndpoint::Chat => "chat",
        }
    }

    /// Fields a response must carry to be accepted at all.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            AggregatorEndpoint::Travel => &["destination_info", "accommodations", "transportation"],
            AggregatorEndpoint::Chat => &["response"],
        }
    }
}

/// Structured sections returned by the aggregator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateBundle {
    pub destination_info: Option<String>,
    pub accommodations: Option<String>,
    pub transportation: Option<String>,
    pub activities: Option<String>,
    pub dining: Option<String>,
    pub itinerary: Option<String>,
    /// Chat endpoint answer
    pub response: Option<String>,
}

impl AggregateBundle {
    /// Build a bundle from a decoded body, validating the endpoint's
    /// required fields before anything is accepted.
    pub fn from_value(value: &Value, endpoint: AggregatorEndpoint) -> Result<Self, FallbackError> {
        let object = value.as_object().ok_or_else(|| {
            FallbackError::SchemaMismatch("response is not a JSON object".to_string())
        })?;

        let missing: Vec<&str> = endpoint
            .required_fields()
            .iter()
            .copied()
            .filter(|field| section_text(object.get(*field)).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(FallbackError::SchemaMismatch(missing.join(", ")));
        }

        Ok(Self {
            destination_info: section_text(object.get("destination_info")),
            accommodations: section_text(object.get("accommodations")),
            transportation: section_text(object.get("transportation")),
            activities: section_text(object.get("activities")),
            dining: section_text(object.get("dining")),
            itinerary: section_text(object.get("itinerary")),
            response: section_text(object.get("response")),
        })
    }
}

/// Strings pass through; structured values are rendered as pretty JSON.
/// Null, empty strings and empty containers count as absent.
fn section_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => serde_json::to_string_pretty(other).ok(),
    }
}

/// The optional substitute for the stage chain.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn fetch(
        &self,
        query: &str,
        credential: &str,
        endpoint: AggregatorEndpoint,
    ) -> Result<AggregateBundle, FallbackError>;
}

#[derive(Serialize)]
struct AggregatorRequest<'a> {
    query: &'a str,
    format: &'static str,
}

/// HTTP client for the aggregator API
pub struct ExternalAggregatorClient {
    client: Client,
    base_url: String,
}

impl ExternalAggregatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FallbackError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FallbackError::Unknown(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Configure client from config
    pub fn from_config(config: &AggregatorConfig) -> Result<Self, FallbackError> {
        Self::new(&config.base_url, config.timeout())
    }

    fn classify_transport_error(err: reqwest::Error) -> FallbackError {
        if err.is_timeout() {
            FallbackError::Timeout
        } else if err.is_connect() {
            FallbackError::ConnectionError(err.to_string())
        } else {
            FallbackError::Unknown(err.to_string())
        }
    }
}

#[async_trait]
impl Aggregator for ExternalAggregatorClient {
    async fn fetch(
        &self,
        query: &str,
        credential: &str,
        endpoint: AggregatorEndpoint,
    ) -> Result<AggregateBundle, FallbackError> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        info!(endpoint = endpoint.path(), query_len = query.len(), "Calling aggregator");

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .json(&AggregatorRequest {
                query,
                format: "json",
            })
            .send()
            .await
            .map_err(Self::classify_transport_error)?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                warn!("Aggregator rejected credential");
                return Err(FallbackError::Auth);
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Aggregator rate limit exceeded");
                return Err(FallbackError::RateLimited);
            }
            other => {
                warn!(status = %other, "Aggregator returned unexpected status");
                return Err(FallbackError::Unknown(format!("status code {}", other)));
            }
        }

        let body = response
            .text()
            .await
            .map_err(Self::classify_transport_error)?;
        debug!(body_len = body.len(), "Raw aggregator response received");

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| FallbackError::SchemaMismatch(format!("invalid JSON: {}", e)))?;

        let bundle = AggregateBundle::from_value(&value, endpoint)?;
        info!(endpoint = endpoint.path(), "Aggregator response accepted");
        Ok(bundle)
    }
}
