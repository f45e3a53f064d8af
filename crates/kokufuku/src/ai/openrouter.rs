//! OpenRouter AI provider implementation.
//!
//! This module provides the [`OpenRouterProvider`] which implements the [`AIProvider`]
//! trait for the OpenRouter API (<https://openrouter.ai/>).
//!
//! OpenRouter speaks the OpenAI chat-completions format. Images are sent as
//! `image_url` content parts holding base64 data URLs.

use super::provider::{ImageInput, ProviderError};
use super::AIProvider;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default OpenRouter API endpoint.
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model; must accept image input for grading.
const DEFAULT_MODEL: &str = "google/gemini-flash-1.5";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default temperature for model responses.
const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Default max tokens for responses.
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<RequestMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Configuration for the OpenRouter provider.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// The model to use (e.g., "google/gemini-flash-1.5", "openai/gpt-4o").
    pub model: String,
    /// Temperature for response generation (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Base URL for the API (useful for proxies or custom endpoints).
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl OpenRouterConfig {
    /// Create a new configuration builder.
    pub fn builder() -> OpenRouterConfigBuilder {
        OpenRouterConfigBuilder::default()
    }
}

/// Builder for [`OpenRouterConfig`].
#[derive(Default)]
pub struct OpenRouterConfigBuilder {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl OpenRouterConfigBuilder {
    /// Set the model to use.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature (0.0 - 2.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the request timeout in seconds.
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Set a custom base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OpenRouterConfig {
        OpenRouterConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

/// OpenRouter provider, giving access to many hosted models through one API.
///
/// # Example
///
/// ```rust,ignore
/// use kokufuku::ai::{OpenRouterProvider, OpenRouterConfig};
///
/// let config = OpenRouterConfig::builder()
///     .model("openai/gpt-4o-mini")
///     .build();
/// let provider = OpenRouterProvider::with_config("your-api-key", config)?;
/// ```
pub struct OpenRouterProvider {
    api_key: String,
    config: OpenRouterConfig,
    client: Client,
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, OpenRouterConfig::default())
    }

    /// Create a new OpenRouter provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: OpenRouterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            api_key: api_key.into(),
            config,
            client,
        })
    }

    fn build_request(&self, prompt: &str, images: &[ImageInput]) -> OpenRouterRequest {
        let content = if images.is_empty() {
            MessageContent::Text(prompt.to_string())
        } else {
            let mut parts = vec![ContentPart::Text {
                text: prompt.to_string(),
            }];
            parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!(
                        "data:{};base64,{}",
                        image.mime_type,
                        STANDARD.encode(&image.bytes)
                    ),
                },
            }));
            MessageContent::Parts(parts)
        };

        OpenRouterRequest {
            model: self.config.model.clone(),
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    fn call_api(&self, request: &OpenRouterRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "kokufuku")
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text()?;
            return Err(ProviderError::from_status(self.name(), status.as_u16(), body).into());
        }

        let result: OpenRouterResponse = response.json()?;
        extract_text(result)
            .ok_or_else(|| ProviderError::EmptyResponse(self.name().to_string()).into())
    }
}

fn extract_text(response: OpenRouterResponse) -> Option<String> {
    response
        .choices?
        .into_iter()
        .next()?
        .message?
        .content
        .filter(|text| !text.trim().is_empty())
}

impl AIProvider for OpenRouterProvider {
    fn generate_text(&self, prompt: &str) -> Result<String> {
        debug!("OpenRouter text request ({} chars)", prompt.chars().count());
        self.call_api(&self.build_request(prompt, &[]))
    }

    fn generate_with_images(&self, prompt: &str, images: &[ImageInput]) -> Result<String> {
        debug!("OpenRouter multimodal request with {} images", images.len());
        self.call_api(&self.build_request(prompt, images))
    }

    fn name(&self) -> &str {
        "OpenRouter"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> OpenRouterResponse {
        serde_json::from_str(json).unwrap()
    }

    // -------------------------------------------------------------------------
    // Request building tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_text_request_uses_plain_content() {
        let provider = OpenRouterProvider::new("test-key").unwrap();
        let json = serde_json::to_value(provider.build_request("計画を立てて", &[])).unwrap();

        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "計画を立てて");
    }

    #[test]
    fn test_image_request_uses_data_urls() {
        let provider = OpenRouterProvider::new("test-key").unwrap();
        let images = vec![
            ImageInput::new("image/png", vec![1u8, 2, 3]),
            ImageInput::new("image/jpeg", vec![0xFFu8]),
        ];
        let json = serde_json::to_value(provider.build_request("採点して", &images)).unwrap();
        let parts = json["messages"][0]["content"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "採点して");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AQID");
    }

    // -------------------------------------------------------------------------
    // Response extraction tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_text() {
        let response = parse(r#"{"choices": [{"message": {"role": "assistant", "content": "回答"}}]}"#);
        assert_eq!(extract_text(response).as_deref(), Some("回答"));
    }

    #[test]
    fn test_extract_text_empty() {
        assert!(extract_text(parse(r#"{"choices": []}"#)).is_none());
        assert!(extract_text(parse(r#"{"choices": null}"#)).is_none());
        assert!(extract_text(parse(r#"{"choices": [{"message": null}]}"#)).is_none());
        assert!(extract_text(parse(r#"{"choices": [{"message": {"content": "  "}}]}"#)).is_none());
    }

    #[test]
    fn test_parse_malformed_json() {
        let result: std::result::Result<OpenRouterResponse, _> =
            serde_json::from_str(r#"{"choices": "invalid"}"#);
        assert!(result.is_err());
    }

    // -------------------------------------------------------------------------
    // Config builder tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_config_builder_defaults() {
        let config = OpenRouterConfig::builder().build();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_config_builder_custom_values() {
        let config = OpenRouterConfig::builder()
            .model("openai/gpt-4o-mini")
            .temperature(0.7)
            .max_tokens(512)
            .timeout_secs(15)
            .base_url("http://localhost:8080/v1/chat/completions")
            .build();

        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.base_url, "http://localhost:8080/v1/chat/completions");
    }

    // -------------------------------------------------------------------------
    // Provider trait implementation tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_provider_name_and_model() {
        let provider = OpenRouterProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "OpenRouter");
        assert_eq!(provider.model(), Some(DEFAULT_MODEL));
    }
}
