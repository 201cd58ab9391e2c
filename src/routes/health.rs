use axum::{extract::State, response::Json as ResponseJson, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> ResponseJson<HealthResponse> {
    let aggregator = match &state.aggregator {
        Some(_) if !state.config.aggregator.api_key.trim().is_empty() => "configured",
        Some(_) => "per-session",
        None => "disabled",
    };
    let enabled = |on: bool| if on { "enabled" } else { "disabled" };

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        aggregator: aggregator.to_string(),
        geocoder: enabled(state.geocoder.is_some()).to_string(),
        attractions: enabled(state.attractions.is_some()).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{body_json, empty_request, test_state};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let response = router(test_state())
            .oneshot(empty_request("GET", "/api/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["aggregator"], "disabled");
        assert_eq!(json["geocoder"], "disabled");
        assert_eq!(json["attractions"], "disabled");
    }
}
