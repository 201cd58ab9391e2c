// OpenAI-compatible chat completions adapter
// Also backs Groq and OpenRouter, which expose the same wire format.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse, TokenUsage};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: Client<OpenAIConfig>,
}

impl OpenAIAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, OPENAI_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));
        Self {
            client: Client::with_config(config),
        }
    }
}

fn to_request_message(message: &LLMMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.clone();
    Ok(match message.role.as_str() {
        "system" => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        "assistant" => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        _ => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

/// Rejected credentials come back as API errors mentioning the key.
fn is_auth_failure(error_type: Option<&str>, message: &str) -> bool {
    let message = message.to_lowercase();
    error_type == Some("authentication_error")
        || message.contains("api key")
        || message.contains("unauthorized")
        || message.contains("no auth credentials")
}

fn map_openai_error(err: OpenAIError) -> AppError {
    match err {
        OpenAIError::ApiError(api) if is_auth_failure(api.r#type.as_deref(), &api.message) => {
            AppError::Auth(api.message)
        }
        OpenAIError::ApiError(api) => AppError::LLMApi(format!("Chat completion error: {}", api.message)),
        other => AppError::LLMApi(format!("Chat completion request failed: {}", other)),
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system_instruction.as_deref() {
            messages.push(
                to_request_message(&LLMMessage::system(system)).map_err(map_openai_error)?,
            );
        }
        for message in &request.messages {
            messages.push(to_request_message(message).map_err(map_openai_error)?);
        }

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model.as_str()).messages(messages);
        if let Some(max_tokens) = request.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }
        let body = args.build().map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(body)
            .await
            .map_err(map_openai_error)?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("Chat completion returned no choices".to_string()))?;

        let finish_reason = choice
            .finish_reason
            .and_then(|reason| serde_json::to_value(reason).ok())
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| "stop".to_string());

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> LLMRequest {
        LLMRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![LLMMessage::user("Best time to visit Jaipur?")],
            max_tokens: Some(128),
            temperature: None,
            system_instruction: Some("Be brief.".to_string()),
        }
    }

    #[tokio::test]
    async fn test_chat_completion_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Best time to visit Jaipur?"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"chatcmpl-1","object":"chat.completion","created":1700000000,"model":"gpt-4o-mini",
                    "choices":[{"index":0,"message":{"role":"assistant","content":"October to March."},"finish_reason":"length","logprobs":null}],
                    "usage":{"prompt_tokens":12,"completion_tokens":4,"total_tokens":16}}"#,
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new_with_api_base("sk-test", &server.url());
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "October to March.");
        assert_eq!(response.finish_reason, "length");
        assert_eq!(response.usage.completion_tokens, 4);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#,
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new_with_api_base("sk-bad", &server.url());
        let result = adapter.create_chat_completion(&request()).await;
        assert!(matches!(result, Err(AppError::Auth(msg)) if msg.contains("Incorrect API key")));
    }

    #[test]
    fn test_auth_failure_detection() {
        assert!(is_auth_failure(None, "Invalid API Key"));
        assert!(is_auth_failure(Some("authentication_error"), "denied"));
        assert!(!is_auth_failure(Some("invalid_request_error"), "max_tokens is too large"));
    }
}
