use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::embeddings::CreateEmbeddingRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use tracing::debug;

use crate::attractions::AttractionSearchError;
use crate::config::AttractionsConfig;

/// Turns text into vectors. One call may embed several inputs.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(
        &self,
        credential: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, AttractionSearchError>;
}

/// OpenAI embeddings endpoint, keyed per call
pub struct OpenAIEmbedder {
    api_base: String,
    model: String,
    dimensions: u32,
}

impl OpenAIEmbedder {
    pub fn new(api_base: &str, model: &str, dimensions: u32) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
        }
    }

    pub fn from_config(config: &AttractionsConfig) -> Self {
        Self::new(&config.api_base, &config.model, config.dimensions)
    }

    fn client(&self, credential: &str) -> Client<OpenAIConfig> {
        Client::with_config(
            OpenAIConfig::new()
                .with_api_key(credential)
                .with_api_base(&self.api_base),
        )
    }
}

fn embedding_error(err: OpenAIError) -> AttractionSearchError {
    match err {
        OpenAIError::ApiError(api) => AttractionSearchError::Embedding(api.message),
        other => AttractionSearchError::Embedding(other.to_string()),
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(
        &self,
        credential: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, AttractionSearchError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.as_str())
            .input(inputs.to_vec())
            .dimensions(self.dimensions)
            .build()
            .map_err(embedding_error)?;

        debug!(model = %self.model, inputs = inputs.len(), "Requesting embeddings");
        let response = self
            .client(credential)
            .embeddings()
            .create(request)
            .await
            .map_err(embedding_error)?;

        let mut data = response.data;
        if data.len() != inputs.len() {
            return Err(AttractionSearchError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                data.len()
            )));
        }
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_embed_orders_by_index() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer sk-embed")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["forts", "Agra Fort"],
                "dimensions": 3
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"object":"list","model":"text-embedding-3-small",
                    "data":[{"object":"embedding","index":1,"embedding":[0.0,1.0,0.0]},
                            {"object":"embedding","index":0,"embedding":[1.0,0.0,0.0]}],
                    "usage":{"prompt_tokens":4,"total_tokens":4}}"#,
            )
            .create_async()
            .await;

        let embedder = OpenAIEmbedder::new(&server.url(), "text-embedding-3-small", 3);
        let vectors = embedder
            .embed("sk-embed", &["forts".to_string(), "Agra Fort".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_rejected_key_is_an_embedding_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#,
            )
            .create_async()
            .await;

        let embedder = OpenAIEmbedder::new(&server.url(), "text-embedding-3-small", 3);
        let result = embedder.embed("sk-bad", &["forts".to_string()]).await;
        assert!(matches!(result, Err(AttractionSearchError::Embedding(msg)) if msg.contains("Incorrect API key")));
    }

    #[tokio::test]
    async fn test_no_inputs_skips_request() {
        let embedder = OpenAIEmbedder::new("http://127.0.0.1:9", "text-embedding-3-small", 3);
        assert!(embedder.embed("sk", &[]).await.unwrap().is_empty());
    }
}
