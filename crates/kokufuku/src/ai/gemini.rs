//! Google Gemini AI provider implementation.
//!
//! This module provides the [`GeminiProvider`] which implements the [`AIProvider`]
//! trait for Google's Gemini API (<https://ai.google.dev/>).
//!
//! Images are sent inline as base64 `inlineData` parts of the same
//! `generateContent` request as the prompt.

use std::time::Duration;

use super::provider::{ImageInput, ProviderError};
use super::AIProvider;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default Gemini API endpoint.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/";

/// Default model for guidance and grading.
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default temperature for model responses.
const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Default max tokens for responses.
const DEFAULT_MAX_TOKENS: u32 = 4096;

// Gemini API request structures
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

// Gemini API response structures
#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// The model to use (e.g., "gemini-1.5-flash", "gemini-2.0-flash").
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

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

impl GeminiConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GeminiConfigBuilder {
        GeminiConfigBuilder::default()
    }
}

/// Builder for [`GeminiConfig`].
#[derive(Default)]
pub struct GeminiConfigBuilder {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl GeminiConfigBuilder {
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
    pub fn build(self) -> GeminiConfig {
        GeminiConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
        }
    }
}

/// Google Gemini provider for study guidance, classification and grading.
///
/// # Example
///
/// ```rust,ignore
/// use kokufuku::ai::{GeminiProvider, GeminiConfig};
///
/// // Simple usage with defaults
/// let provider = GeminiProvider::new("your-api-key")?;
///
/// // With custom configuration
/// let config = GeminiConfig::builder()
///     .model("gemini-2.0-flash")
///     .temperature(0.2)
///     .build();
/// let provider = GeminiProvider::with_config("your-api-key", config)?;
/// ```
pub struct GeminiProvider {
    api_key: String,
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, GeminiConfig::default())
    }

    /// Create a new Gemini provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: GeminiConfig) -> Result<Self> {
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

    fn build_request(&self, prompt: &str, images: &[ImageInput]) -> GeminiRequest {
        let mut parts = vec![RequestPart::Text {
            text: prompt.to_owned(),
        }];
        parts.extend(images.iter().map(|image| RequestPart::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.bytes),
            },
        }));

        GeminiRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        }
    }

    fn call_api(&self, request: &GeminiRequest) -> Result<String> {
        // Build URL: {base_url}{model}:generateContent?key={api_key}
        let url = format!(
            "{}{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text()?;
            return Err(ProviderError::from_status(self.name(), status.as_u16(), body).into());
        }

        let result: GeminiResponse = response.json()?;
        extract_text(result).ok_or_else(|| ProviderError::EmptyResponse(self.name().to_owned()).into())
    }
}

/// Concatenate the text parts of the first candidate.
///
/// Blocked or empty candidates yield `None`.
fn extract_text(response: GeminiResponse) -> Option<String> {
    let candidate = response.candidates?.into_iter().next()?;
    if let Some(reason) = &candidate.finish_reason
        && (reason == "SAFETY" || reason == "BLOCKED")
    {
        return None;
    }

    let text: String = candidate
        .content?
        .parts?
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

impl AIProvider for GeminiProvider {
    fn generate_text(&self, prompt: &str) -> Result<String> {
        debug!("Gemini text request ({} chars)", prompt.chars().count());
        self.call_api(&self.build_request(prompt, &[]))
    }

    fn generate_with_images(&self, prompt: &str, images: &[ImageInput]) -> Result<String> {
        debug!("Gemini multimodal request with {} images", images.len());
        self.call_api(&self.build_request(prompt, images))
    }

    fn name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    // -------------------------------------------------------------------------
    // Request building tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_text_request_shape() {
        let provider = GeminiProvider::new("test-key").unwrap();
        let request = provider.build_request("復習ポイントを教えて", &[]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "復習ポイントを教えて");
        assert_eq!(json["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(
            json["generationConfig"]["maxOutputTokens"],
            DEFAULT_MAX_TOKENS
        );
    }

    #[test]
    fn test_image_parts_are_inline_base64() {
        let provider = GeminiProvider::new("test-key").unwrap();
        let images = vec![
            ImageInput::new("image/png", vec![1u8, 2, 3]),
            ImageInput::new("image/jpeg", vec![4u8]),
        ];
        let request = provider.build_request("採点して", &images);
        let json = serde_json::to_value(&request).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert!(parts[1].get("text").is_none());
    }

    // -------------------------------------------------------------------------
    // Response extraction tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_text_joins_parts() {
        let response = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "前半"}, {"text": "後半"}]}, "finishReason": "STOP"}]}"#,
        );
        assert_eq!(extract_text(response).as_deref(), Some("前半後半"));
    }

    #[test]
    fn test_extract_text_empty_candidates() {
        assert!(extract_text(parse(r#"{"candidates": []}"#)).is_none());
        assert!(extract_text(parse(r#"{"candidates": null}"#)).is_none());
    }

    #[test]
    fn test_extract_text_missing_content() {
        let response = parse(r#"{"candidates": [{"content": null, "finishReason": "STOP"}]}"#);
        assert!(extract_text(response).is_none());

        let response = parse(r#"{"candidates": [{"content": {"parts": null}}]}"#);
        assert!(extract_text(response).is_none());
    }

    #[test]
    fn test_extract_text_safety_blocked() {
        let response = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "x"}]}, "finishReason": "SAFETY"}]}"#,
        );
        assert!(extract_text(response).is_none());
    }

    #[test]
    fn test_parse_malformed_json() {
        let result: std::result::Result<GeminiResponse, _> =
            serde_json::from_str(r#"{"candidates": "not an array"}"#);
        assert!(result.is_err());
    }

    // -------------------------------------------------------------------------
    // Config builder tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_config_builder_defaults() {
        let config = GeminiConfig::builder().build();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_config_builder_custom_values() {
        let config = GeminiConfig::builder()
            .model("gemini-2.0-flash")
            .temperature(0.5)
            .max_tokens(2000)
            .timeout_secs(90)
            .base_url("https://custom.api.com/")
            .build();

        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.timeout_secs, 90);
        assert_eq!(config.base_url, "https://custom.api.com/");
    }

    // -------------------------------------------------------------------------
    // Provider trait implementation tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_provider_name_and_model() {
        let provider = GeminiProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "Gemini");
        assert_eq!(provider.model(), Some(DEFAULT_MODEL));

        let config = GeminiConfig::builder().model("custom-model").build();
        let provider = GeminiProvider::with_config("test-key", config).unwrap();
        assert_eq!(provider.model(), Some("custom-model"));
    }
}
