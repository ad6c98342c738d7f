//! Embedding gateway: turns text into fixed-dimension vectors.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingProvider};

const TRACING_TARGET: &str = "ragqa::embedding";

/// Instruction type for embedding generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionType {
    /// For indexing passages
    Document,
    /// For questions
    Query,
}

/// Anything that can embed text.
///
/// Implementations must reject empty input with [`EmbeddingError::EmptyInput`]
/// and return vectors of one fixed dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(
        &self,
        text: &str,
        instruction: InstructionType,
    ) -> Result<Vec<f32>, EmbeddingError>;

    /// Model identifier, for logs and status output.
    fn model(&self) -> &str;
}

/// Build the configured embedding provider.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::Gemini => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(config)?)),
    }
}

fn http_client(config: &EmbeddingConfig) -> Result<Client, EmbeddingError> {
    Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))
}

fn map_send_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout
    } else if e.is_connect() {
        EmbeddingError::ConnectionError(e.to_string())
    } else {
        EmbeddingError::RequestError(e)
    }
}

async fn server_error(response: reqwest::Response) -> EmbeddingError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    EmbeddingError::ServerError(format!("status {}: {}", status, body))
}

fn require_text(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(())
}

/// Google Generative Language `embedContent` client.
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EmbeddingError::MissingApiKey(config.api_key_env.clone()))?;

        Ok(Self {
            client: http_client(config)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: normalize_model(&config.model),
            api_key,
        })
    }

    fn task_type(instruction: InstructionType) -> &'static str {
        match instruction {
            InstructionType::Document => "RETRIEVAL_DOCUMENT",
            InstructionType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Gemini expects `models/<name>`; accept bare names too.
fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(
        &self,
        text: &str,
        instruction: InstructionType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        require_text(text)?;

        let url = format!("{}/{}:embedContent", self.base_url, self.model);
        let request = EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type: Self::task_type(instruction),
        };

        tracing::debug!(
            target: TRACING_TARGET,
            model = %self.model,
            chars = text.len(),
            ?instruction,
            "Requesting embedding"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let body: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let values = body
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| EmbeddingError::InvalidResponse("missing embedding".to_string()))?;

        if values.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }
        Ok(values)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for a text-embeddings-inference style `/embed` endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
    instruction_type: InstructionType,
}

/// Response from the `/embed` endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

/// Client for a self-hosted embedding server.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
        })
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(
        &self,
        text: &str,
        instruction: InstructionType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        require_text(text)?;

        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest {
            inputs: [text],
            truncate: Some(true),
            instruction_type: instruction,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_send_error)?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::InvalidResponse(format!(
                "input rejected: {body}"
            )));
        }
        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        embed_response
            .0
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_config(url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: EmbeddingProvider::Http,
            url: url.to_string(),
            api_key_env: "RAGQA_TEST_UNSET_EMBEDDING_KEY".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_base_url_trimming() {
        let client = HttpEmbedder::new(&http_config("http://localhost:11411/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11411");
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let config = EmbeddingConfig {
            api_key_env: "RAGQA_TEST_UNSET_EMBEDDING_KEY".to_string(),
            ..Default::default()
        };
        let err = GeminiEmbedder::new(&config).unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingApiKey(ref name) if name == "RAGQA_TEST_UNSET_EMBEDDING_KEY"));
    }

    #[test]
    fn test_normalize_model() {
        assert_eq!(normalize_model("embedding-001"), "models/embedding-001");
        assert_eq!(
            normalize_model("models/text-embedding-004"),
            "models/text-embedding-004"
        );
    }

    #[test]
    fn test_embed_request_shape() {
        let request = EmbedContentRequest {
            model: "models/embedding-001",
            content: Content {
                parts: [Part { text: "hello" }],
            },
            task_type: GeminiEmbedder::task_type(InstructionType::Query),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_request() {
        // nothing listens on port 9; the request must never be sent
        let client = HttpEmbedder::new(&http_config("http://127.0.0.1:9")).unwrap();
        let err = client.embed("   ", InstructionType::Document).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));
    }
}
