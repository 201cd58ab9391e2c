//! In-memory sessions
//!
//! A session holds the per-user overrides (credentials, output language),
//! the last pipeline run and the chat history. Nothing is persisted.
//! Handlers snapshot a session, do their slow work without holding the
//! lock, then write results back. Idle sessions are evicted by a sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agents::{ActivityEntry, OutputLanguage};
use crate::models::{ChatTurn, PipelineRun, SessionResponse, SessionSettingsRequest};
use crate::types::{AppError, AppResult, LLMProvider};

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    pub llm_api_key: Option<String>,
    pub aggregator_api_key: Option<String>,
    /// Key for attraction search embeddings
    pub embedding_api_key: Option<String>,
    pub language: OutputLanguage,
    pub last_run: Option<PipelineRun>,
    pub chat_history: Vec<ChatTurn>,
    /// Activity lines of the last run
    pub activity: Vec<ActivityEntry>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(language: OutputLanguage) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            llm_api_key: None,
            aggregator_api_key: None,
            embedding_api_key: None,
            language,
            last_run: None,
            chat_history: Vec::new(),
            activity: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn with_llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm_api_key = non_blank(key.into());
        self
    }

    pub fn with_aggregator_api_key(mut self, key: impl Into<String>) -> Self {
        self.aggregator_api_key = non_blank(key.into());
        self
    }

    pub fn with_embedding_api_key(mut self, key: impl Into<String>) -> Self {
        self.embedding_api_key = non_blank(key.into());
        self
    }

    /// Append a chat turn, dropping the oldest beyond `max_turns`.
    pub fn push_chat_turn(&mut self, turn: ChatTurn, max_turns: usize) {
        self.chat_history.push(turn);
        let excess = self.chat_history.len().saturating_sub(max_turns);
        if excess > 0 {
            self.chat_history.drain(..excess);
        }
    }

    /// Destination of the last trip, if any.
    pub fn last_destination(&self) -> Option<&str> {
        self.last_run
            .as_ref()
            .map(|run| run.request.destination.as_str())
    }

    /// Apply a settings update. An empty string clears a key.
    pub fn apply(&mut self, update: SessionSettingsRequest, provider: LLMProvider) -> AppResult<()> {
        if let Some(key) = update.llm_api_key {
            let key = non_blank(key);
            if let Some(k) = &key {
                validate_llm_key(provider, k)?;
            }
            self.llm_api_key = key;
        }
        if let Some(key) = update.aggregator_api_key {
            self.aggregator_api_key = non_blank(key);
        }
        if let Some(key) = update.embedding_api_key {
            self.embedding_api_key = non_blank(key);
        }
        if let Some(code) = update.language {
            self.language = OutputLanguage::from_code(&code);
        }
        Ok(())
    }

    pub fn to_response(&self) -> SessionResponse {
        SessionResponse {
            session_id: self.id,
            llm_api_key: self.llm_api_key.as_deref().map(mask_api_key),
            aggregator_api_key: self.aggregator_api_key.as_deref().map(mask_api_key),
            aggregator_active: self.aggregator_api_key.is_some(),
            embedding_api_key: self.embedding_api_key.as_deref().map(mask_api_key),
            language: self.language,
            has_itinerary: self
                .last_run
                .as_ref()
                .is_some_and(|run| run.itinerary().is_some()),
            chat_turns: self.chat_history.len(),
            created_at: self.created_at,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Show only the last four characters of a key.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("••••{}", tail)
    } else {
        "••••".to_string()
    }
}

/// Gemini keys always start with "AI".
pub fn validate_llm_key(provider: LLMProvider, key: &str) -> AppResult<()> {
    if provider == LLMProvider::Google && !key.starts_with("AI") {
        return Err(AppError::InvalidRequest(
            "invalid Gemini API key format: keys start with 'AI'".to_string(),
        ));
    }
    Ok(())
}

const MAX_IDLE_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, SessionContext>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: SessionContext) -> Uuid {
        let id = session.id;
        self.inner.write().await.insert(id, session);
        id
    }

    /// Cloned snapshot of a session. Counts as activity.
    pub async fn get(&self, id: Uuid) -> AppResult<SessionContext> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))?;
        session.last_active = Utc::now();
        Ok(session.clone())
    }

    /// Mutate a session in place under the write lock.
    pub async fn update<F, T>(&self, id: Uuid, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut SessionContext) -> AppResult<T>,
    {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))?;
        session.last_active = Utc::now();
        f(session)
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many went.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let ttl = chrono::Duration::seconds(ttl.as_secs().min(MAX_IDLE_TTL_SECS) as i64);
        let cutoff = Utc::now() - ttl;

        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_active >= cutoff);
        before - sessions.len()
    }

    /// Run `evict_idle` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(&self, every: Duration, ttl: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = store.evict_idle(ttl).await;
                if evicted > 0 {
                    info!(evicted, "Evicted idle sessions");
                } else {
                    debug!("No idle sessions to evict");
                }
            }
        })
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.inner
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("AIzaSyExample1234"), "••••1234");
        assert_eq!(mask_api_key("abc"), "••••");
    }

    #[test]
    fn test_validate_gemini_key() {
        assert!(validate_llm_key(LLMProvider::Google, "AIzaSy123").is_ok());
        assert!(validate_llm_key(LLMProvider::Google, "sk-123").is_err());
        assert!(validate_llm_key(LLMProvider::OpenAI, "sk-123").is_ok());
    }

    #[test]
    fn test_apply_settings() {
        let mut session = SessionContext::new(OutputLanguage::English).with_aggregator_api_key("tv-1");
        session
            .apply(
                SessionSettingsRequest {
                    llm_api_key: Some(" AIzaKey ".to_string()),
                    aggregator_api_key: Some(String::new()),
                    embedding_api_key: Some("sk-embed-42".to_string()),
                    language: Some("ja".to_string()),
                },
                LLMProvider::Google,
            )
            .unwrap();

        assert_eq!(session.llm_api_key.as_deref(), Some("AIzaKey"));
        assert!(session.aggregator_api_key.is_none());
        assert_eq!(session.embedding_api_key.as_deref(), Some("sk-embed-42"));
        assert_eq!(session.language, OutputLanguage::Japanese);

        let rejected = session.apply(
            SessionSettingsRequest {
                llm_api_key: Some("bogus".to_string()),
                ..Default::default()
            },
            LLMProvider::Google,
        );
        assert!(matches!(rejected, Err(AppError::InvalidRequest(_))));
        assert_eq!(session.llm_api_key.as_deref(), Some("AIzaKey"));
    }

    #[test]
    fn test_response_masks_keys() {
        let session = SessionContext::new(OutputLanguage::Hindi)
            .with_llm_api_key("AIzaSecretKey9876")
            .with_aggregator_api_key("tailvy-abcd");
        let response = session.to_response();
        assert_eq!(response.llm_api_key.as_deref(), Some("••••9876"));
        assert_eq!(response.aggregator_api_key.as_deref(), Some("••••abcd"));
        assert!(response.aggregator_active);
        assert!(!response.has_itinerary);
    }

    #[tokio::test]
    async fn test_store_lifecycle() {
        let store = SessionStore::new();
        let id = store.insert(SessionContext::new(OutputLanguage::English)).await;
        assert_eq!(store.len().await, 1);

        store
            .update(id, |s| {
                s.language = OutputLanguage::German;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(store.get(id).await.unwrap().language, OutputLanguage::German);

        store.remove(id).await.unwrap();
        assert!(matches!(store.get(id).await, Err(AppError::NotFound(_))));
        assert!(store.remove(id).await.is_err());
    }

    fn turn(question: &str) -> ChatTurn {
        ChatTurn {
            question: question.to_string(),
            answer: "ok".to_string(),
            source: crate::models::AnswerSource::Agent,
            run_id: None,
            asked_at: Utc::now(),
        }
    }

    #[test]
    fn test_chat_history_is_capped() {
        let mut session = SessionContext::new(OutputLanguage::English);
        for i in 0..5 {
            session.push_chat_turn(turn(&format!("q{}", i)), 3);
        }
        let questions: Vec<_> = session.chat_history.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3", "q4"]);
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_recent_sessions() {
        let store = SessionStore::new();
        let mut stale = SessionContext::new(OutputLanguage::English);
        stale.last_active = Utc::now() - chrono::Duration::hours(2);
        let stale_id = store.insert(stale).await;
        let fresh_id = store.insert(SessionContext::new(OutputLanguage::English)).await;

        assert_eq!(store.evict_idle(Duration::from_secs(3600)).await, 1);
        assert!(store.get(stale_id).await.is_err());
        assert!(store.get(fresh_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_refreshes_last_active() {
        let store = SessionStore::new();
        let mut session = SessionContext::new(OutputLanguage::English);
        session.last_active = Utc::now() - chrono::Duration::hours(2);
        let id = store.insert(session).await;

        store.get(id).await.unwrap();
        assert_eq!(store.evict_idle(Duration::from_secs(3600)).await, 0);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let store = SessionStore::new();
        let mut stale = SessionContext::new(OutputLanguage::English);
        stale.last_active = Utc::now() - chrono::Duration::hours(2);
        store.insert(stale).await;

        let sweeper = store.spawn_sweeper(Duration::from_millis(10), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        assert_eq!(store.len().await, 0);
    }
}
