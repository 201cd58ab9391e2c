//! Agent Runner
//!
//! Executes a single `TaskSpec` against a materialized context through the
//! opaque text-generation capability. Every call is bounded by an explicit
//! timeout and reported to the caller's `ActivityLog`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::agents::task::TaskSpec;
use crate::config::LLMConfig;
use crate::llm::provider::{LLMProviderConfig, LLM};
use crate::types::{AppError, LLMMessage, LLMRequest};

/// Failures of a single agent call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("credential missing or rejected: {0}")]
    Auth(String),

    #[error("generation backend failed: {0}")]
    Upstream(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("context must not be empty")]
    InvalidContext,
}

impl AgentError {
    /// A credential problem means no further stage can succeed either.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::Auth(_))
    }
}

impl From<AppError> for AgentError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Auth(msg) => AgentError::Auth(msg),
            other => AgentError::Upstream(other.to_string()),
        }
    }
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Auth(msg) => AppError::Auth(msg),
            AgentError::InvalidContext => {
                AppError::InvalidRequest("question or context must not be empty".to_string())
            }
            other => AppError::LLMApi(other.to_string()),
        }
    }
}

/// The `generate(prompt) -> text` capability behind every agent.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError>;

    /// Whether a credential is available at all.
    fn has_credential(&self) -> bool {
        true
    }
}

/// Builds a generator for a session's credential.
pub trait GeneratorFactory: Send + Sync {
    fn generator(&self, api_key: Option<&str>) -> Arc<dyn TextGenerator>;
}

/// `TextGenerator` backed by one of the LLM provider adapters.
pub struct LlmGenerator {
    llm: Option<LLM>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    setup_error: Option<String>,
}

impl LlmGenerator {
    pub fn new(config: &LLMConfig, api_key: &str) -> Self {
        let (llm, setup_error) = match LLM::new(LLMProviderConfig {
            provider: config.provider,
            api_key: api_key.to_string(),
        }) {
            Ok(llm) => (Some(llm), None),
            Err(e) => (None, Some(e.to_string())),
        };

        Self {
            llm,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            setup_error,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        let llm = self.llm.as_ref().ok_or_else(|| {
            AgentError::Auth(
                self.setup_error
                    .clone()
                    .unwrap_or_else(|| "no API key configured".to_string()),
            )
        })?;

        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            system_instruction: Some(
                "You are part of a team of expert travel agents. Give accurate, practical and \
                 specific travel advice."
                    .to_string(),
            ),
        };

        let response = llm.create_chat_completion(&request).await?;
        if response.content.trim().is_empty() {
            return Err(AgentError::Upstream(format!(
                "empty response (finish reason: {})",
                response.finish_reason
            )));
        }
        Ok(response.content)
    }

    fn has_credential(&self) -> bool {
        self.llm.is_some()
    }
}

/// Produces `LlmGenerator`s from the process configuration.
pub struct LlmGeneratorFactory {
    config: LLMConfig,
}

impl LlmGeneratorFactory {
    pub fn new(config: LLMConfig) -> Self {
        Self { config }
    }
}

impl GeneratorFactory for LlmGeneratorFactory {
    fn generator(&self, api_key: Option<&str>) -> Arc<dyn TextGenerator> {
        let key = api_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(&self.config.api_key);
        Arc::new(LlmGenerator::new(&self.config, key))
    }
}

/// One human-readable line of agent activity.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub role: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Caller-owned sink of activity lines, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, role: &str, message: impl Into<String>) {
        let entry = ActivityEntry {
            role: role.to_string(),
            message: message.into(),
            at: Utc::now(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}

pub struct AgentRunner {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    log: ActivityLog,
}

impl AgentRunner {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration, log: ActivityLog) -> Self {
        Self {
            generator,
            timeout,
            log,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.generator.has_credential()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    /// Run one task; the model's text is returned verbatim.
    pub async fn run(&self, task: &TaskSpec, context: &str) -> Result<String, AgentError> {
        if context.trim().is_empty() {
            return Err(AgentError::InvalidContext);
        }

        let prompt = task.render_prompt(context);
        info!(task = task.name, prompt_len = prompt.len(), "Agent starting");
        self.log.push(task.role, format!("{} starting", task.role));

        let outcome = match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.timeout)),
        };

        match &outcome {
            Ok(text) => {
                info!(task = task.name, response_len = text.len(), "Agent completed");
                self.log.push(task.role, format!("{} completed", task.role));
            }
            Err(e) => {
                warn!(task = task.name, error = %e, "Agent failed");
                self.log.push(task.role, format!("{} failed: {}", task.role, e));
            }
        }

        outcome
    }
}
