//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/health` - Health checks
//! - `/api/sessions` - Session keys and output language
//! - `/api/sessions/{id}/itinerary` - Pipeline runs, live progress and download
//! - `/api/sessions/{id}/chat` - Questions about the current trip
//! - `/api/map` - Place coordinates and nearby attractions

pub mod chat;
pub mod health;
pub mod itinerary;
pub mod map;
pub mod sessions;

use axum::Router;
use tracing::info;

use crate::agents::{ActivityLog, AgentRunner};
use crate::models::AppState;
use crate::session::SessionContext;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    Router::new()
        .merge(health::router(state.clone()))
        .merge(sessions::router(state.clone()))
        .merge(itinerary::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(map::router(state))
}

/// Runner bound to the session's credential (or the process default).
pub(crate) fn session_runner(
    state: &AppState,
    session: &SessionContext,
    log: ActivityLog,
) -> AgentRunner {
    let generator = state.generators.generator(session.llm_api_key.as_deref());
    AgentRunner::new(generator, state.config.llm.stage_timeout(), log)
}

/// Session aggregator key, falling back to the process-wide key.
pub(crate) fn aggregator_credential(state: &AppState, session: &SessionContext) -> Option<String> {
    session.aggregator_api_key.clone().or_else(|| {
        let key = state.config.aggregator.api_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, Response};

    use crate::agents::{AgentError, GeneratorFactory, StageId, TextGenerator};
    use crate::config::Config;
    use crate::models::AppState;
    use crate::session::SessionStore;

    /// Research stages answer "<key> OK"; the itinerary and chat echo the prompt.
    pub struct StubGenerator {
        pub credential: bool,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
            let stage = StageId::RESEARCH
                .into_iter()
                .find(|s| prompt.starts_with(&format!("You are the {}.", s.role())));
            Ok(match stage {
                Some(stage) => format!("{} OK", stage.key()),
                None => prompt.to_string(),
            })
        }

        fn has_credential(&self) -> bool {
            self.credential
        }
    }

    /// Only sessions with a key get a working generator.
    pub struct StubFactory;

    impl GeneratorFactory for StubFactory {
        fn generator(&self, api_key: Option<&str>) -> Arc<dyn TextGenerator> {
            Arc::new(StubGenerator {
                credential: api_key.is_some(),
            })
        }
    }

    pub fn test_state() -> AppState {
        AppState {
            config: Config::from_lookup(|_| None).unwrap(),
            sessions: SessionStore::new(),
            generators: Arc::new(StubFactory),
            aggregator: None,
            geocoder: None,
            attractions: None,
        }
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
