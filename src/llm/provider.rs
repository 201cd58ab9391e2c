use async_trait::async_trait;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Provider selection plus the credential to use with it
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub api_key: String,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider: LLMProvider,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> AppResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::Auth(format!(
                "No API key configured for {}",
                config.provider
            )));
        }

        let adapter: Box<dyn LLMAdapter> = match config.provider {
            LLMProvider::Google => Box::new(crate::llm::google::GoogleAdapter::new(&config.api_key)),
            LLMProvider::OpenAI => Box::new(crate::llm::openai::OpenAIAdapter::new(&config.api_key)),
            LLMProvider::Groq => Box::new(crate::llm::groq::GroqAdapter::new(&config.api_key)),
            LLMProvider::OpenRouter => {
                Box::new(crate::llm::openrouter::OpenRouterAdapter::new(&config.api_key))
            }
        };

        Ok(Self {
            adapter,
            provider: config.provider,
        })
    }

    /// Wrap an already-built adapter.
    pub fn with_adapter(provider: LLMProvider, adapter: Box<dyn LLMAdapter>) -> Self {
        Self { adapter, provider }
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_auth_error() {
        let result = LLM::new(LLMProviderConfig {
            provider: LLMProvider::Google,
            api_key: "  ".to_string(),
        });
        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[test]
    fn test_builds_every_provider() {
        for provider in [
            LLMProvider::Google,
            LLMProvider::OpenAI,
            LLMProvider::Groq,
            LLMProvider::OpenRouter,
        ] {
            let llm = LLM::new(LLMProviderConfig {
                provider,
                api_key: "test-key".to_string(),
            })
            .unwrap();
            assert_eq!(llm.provider(), provider);
        }
    }
}
