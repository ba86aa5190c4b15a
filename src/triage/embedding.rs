use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::error::TriageError;
use crate::core::config::AiConfig;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, TriageError>;
}

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    embedding_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &AiConfig) -> Result<Self, TriageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            embedding_url: config.embedding_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, TriageError> {
        let mut request = self
            .client
            .post(format!("{}/v1/embeddings", self.embedding_url))
            .json(&serde_json::json!({
                "input": text,
                "model": self.model,
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::Upstream(format!("{status}: {body}")));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| TriageError::Upstream("empty embedding response".to_string()))?;

        if embedding.len() != self.dimensions {
            return Err(TriageError::Upstream(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                embedding.len()
            )));
        }
        Ok(embedding)
    }
}

/// Renders a vector as a pgvector literal, e.g. `[0.1,0.2]`.
pub fn to_pgvector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: String, dimensions: usize) -> AiConfig {
        AiConfig {
            embedding_url: url,
            api_key: Some("sk-test".to_string()),
            dimensions,
            ..AiConfig::default()
        }
    }

    #[tokio::test]
    async fn test_embed_parses_openai_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}],"model":"m"}"#)
            .create_async()
            .await;

        let provider = HttpEmbeddingProvider::new(&config(server.url(), 3)).unwrap();
        let embedding = provider.embed("printer on fire").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[0.1,0.2]}]}"#)
            .create_async()
            .await;

        let provider = HttpEmbeddingProvider::new(&config(server.url(), 1536)).unwrap();
        assert!(matches!(provider.embed("x").await, Err(TriageError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let provider = HttpEmbeddingProvider::new(&config(server.url(), 3)).unwrap();
        match provider.embed("x").await {
            Err(TriageError::Upstream(msg)) => assert!(msg.contains("rate limited")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pgvector_literal() {
        assert_eq!(to_pgvector_literal(&[0.5, -1.0]), "[0.5,-1]");
    }
}
