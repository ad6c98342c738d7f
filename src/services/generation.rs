//! Answer generation gateway.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::models::GenerationConfig;

const TRACING_TARGET: &str = "ragqa::generation";

/// Finish reasons that mean the provider withheld the answer.
const FILTERED_FINISH_REASONS: &[&str] = &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Produces an answer from an assembled prompt.
///
/// The system instruction is fixed per generator; the prompt text varies per
/// question.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    fn model(&self) -> &str;
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>, GenerationError> {
    Ok(Arc::new(GeminiGenerator::new(config)?))
}

/// Google Generative Language `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    system_prompt: String,
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationSettings>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationSettings {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenerationError::ServerError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config
                .model
                .strip_prefix("models/")
                .unwrap_or(&config.model)
                .to_string(),
            api_key,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> GenerateContentRequest<'a> {
        let system_instruction = (!self.system_prompt.is_empty()).then(|| Content {
            role: None,
            parts: [RequestPart {
                text: &self.system_prompt,
            }],
        });

        GenerateContentRequest {
            system_instruction,
            contents: [Content {
                role: Some("user"),
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: self
                .temperature
                .map(|temperature| GenerationSettings { temperature }),
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        tracing::debug!(
            target: TRACING_TARGET,
            model = %self.model,
            prompt_chars = prompt.len(),
            "Requesting generation"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::RequestError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        extract_text(body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn classify_status(status: StatusCode, body: String) -> GenerationError {
    let lower = body.to_lowercase();
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited(body),
        StatusCode::BAD_REQUEST
            if lower.contains("token") || lower.contains("context length") =>
        {
            GenerationError::ContextLengthExceeded(body)
        }
        _ => GenerationError::ServerError(format!("status {}: {}", status, body)),
    }
}

fn extract_text(body: GenerateContentResponse) -> Result<String, GenerationError> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::ContentFiltered(reason));
    }

    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::InvalidResponse("no candidates returned".to_string()))?;

    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|r| FILTERED_FINISH_REASONS.contains(r))
    {
        return Err(GenerationError::ContentFiltered(reason.to_string()));
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::InvalidResponse(
            "candidate has no text".to_string(),
        ));
    }
    Ok(text)
}
