use axum::{
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::post,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::agents::{ActivityLog, ChatSession};
use crate::models::{AppState, ChatRequest, ChatTurn};
use crate::routes::{aggregator_credential, session_runner};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{id}/chat", post(post_chat).get(get_chat))
        .with_state(state)
}

/// GET /api/sessions/{id}/chat - Conversation history
async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<ResponseJson<Vec<ChatTurn>>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.chat_history))
}

/// POST /api/sessions/{id}/chat - Ask about the current trip
pub async fn post_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> AppResult<ResponseJson<ChatTurn>> {
    let session = state.sessions.get(id).await?;
    info!(session_id = %id, message_len = request.message.len(), "Received chat request");

    let chat = ChatSession::new(
        session_runner(&state, &session, ActivityLog::new()),
        state.aggregator.clone(),
    );
    let credential = aggregator_credential(&state, &session);
    let turn = chat
        .ask(&request.message, session.last_run.as_ref(), credential.as_deref())
        .await?;

    let stored = turn.clone();
    let max_turns = state.config.sessions.max_chat_turns;
    state
        .sessions
        .update(id, move |session| {
            session.push_chat_turn(stored, max_turns);
            Ok(())
        })
        .await?;

    info!(session_id = %id, source = ?turn.source, "Chat response sent");
    Ok(Json(turn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OutputLanguage;
    use crate::routes::test_support::{body_json, empty_request, json_request, test_state};
    use crate::session::SessionContext;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_chat_roundtrip_records_history() {
        let state = test_state();
        let id = state
            .sessions
            .insert(SessionContext::new(OutputLanguage::English).with_llm_api_key("AIzaTest"))
            .await;
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/sessions/{}/chat", id),
                json!({"message": "Do I need a visa?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let turn = body_json(response).await;
        assert_eq!(turn["source"], "agent");
        assert!(turn["answer"]
            .as_str()
            .unwrap()
            .ends_with("Question: Do I need a visa?"));

        let response = app
            .oneshot(empty_request("GET", &format!("/api/sessions/{}/chat", id)))
            .await
            .unwrap();
        let history = body_json(response).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["question"], "Do I need a visa?");
    }

    #[tokio::test]
    async fn test_blank_message_is_bad_request() {
        let state = test_state();
        let id = state
            .sessions
            .insert(SessionContext::new(OutputLanguage::English).with_llm_api_key("AIzaTest"))
            .await;

        let response = router(state.clone())
            .oneshot(json_request(
                "POST",
                &format!("/api/sessions/{}/chat", id),
                json!({"message": "  "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.sessions.get(id).await.unwrap().chat_history.is_empty());
    }

    #[tokio::test]
    async fn test_history_keeps_newest_turns() {
        let mut state = test_state();
        state.config.sessions.max_chat_turns = 2;
        let id = state
            .sessions
            .insert(SessionContext::new(OutputLanguage::English).with_llm_api_key("AIzaTest"))
            .await;
        let app = router(state.clone());

        for question in ["first?", "second?", "third?"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    &format!("/api/sessions/{}/chat", id),
                    json!({"message": question}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let history = state.sessions.get(id).await.unwrap().chat_history;
        let questions: Vec<_> = history.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["second?", "third?"]);
    }
}
