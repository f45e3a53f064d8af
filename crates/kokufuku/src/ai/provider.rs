//! AI provider trait for abstracting LLM interactions.
//!
//! This module defines the [`AIProvider`] trait that lets the canonicalizer and
//! the study advisor talk to any completion backend (Gemini, OpenRouter, or a
//! scripted provider in tests) without knowing which one it is.
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/` (e.g., `openai.rs`)
//! 2. Implement the [`AIProvider`] trait for your provider struct
//! 3. Return [`ProviderError::RateLimited`] for quota responses so the retry
//!    policy can back off
//! 4. Export the provider in `src/ai/mod.rs`

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;

/// Typed provider failures that callers need to tell apart.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The service rejected the call for quota or rate reasons (HTTP 429).
    #[error("rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    /// Any other non-success HTTP status.
    #[error("{provider} API error {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// The response carried no usable text (empty or blocked).
    #[error("no response content from {0}")]
    EmptyResponse(String),
}

impl ProviderError {
    /// Map an HTTP status and body to the matching variant.
    pub fn from_status(provider: &str, status: u16, message: String) -> Self {
        if status == 429 {
            Self::RateLimited {
                provider: provider.to_string(),
                message,
            }
        } else {
            Self::Api {
                provider: provider.to_string(),
                status,
                message,
            }
        }
    }
}

static STATUS_429: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b429\b").expect("Invalid regex: HTTP 429"));

const QUOTA_KEYWORDS: &[&str] = &[
    "quota",
    "resource_exhausted",
    "rate limit",
    "too many requests",
];

/// Whether an error returned by a provider means "try again later".
///
/// Recognizes the typed [`ProviderError::RateLimited`] as well as untyped
/// errors whose message contains a standalone `429` or a quota keyword.
pub fn is_rate_limited(error: &anyhow::Error) -> bool {
    if matches!(
        error.downcast_ref::<ProviderError>(),
        Some(ProviderError::RateLimited { .. })
    ) {
        return true;
    }

    let message = format!("{:#}", error).to_lowercase();
    STATUS_429.is_match(&message) || QUOTA_KEYWORDS.iter().any(|k| message.contains(k))
}

/// One image forwarded to a multimodal model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an image file; the MIME type comes from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = mime_type_for(path);
        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }
}

/// MIME type for an image path, `image/jpeg` when the extension is unknown.
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

/// Trait for text and multimodal completion backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a provider can be shared by the
/// sessions of a [`crate::session::SessionRegistry`].
///
/// # Error Handling
///
/// Implementations return errors via `anyhow::Result`. Rate limiting should
/// be reported as [`ProviderError::RateLimited`]; callers never see these
/// errors directly, they are folded into a
/// [`GenerationOutcome`](super::GenerationOutcome).
pub trait AIProvider: Send + Sync {
    /// Complete a text prompt.
    fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt accompanied by images.
    fn generate_with_images(&self, prompt: &str, images: &[ImageInput]) -> Result<String>;

    /// Get the provider name for logging and debugging.
    fn name(&self) -> &str;

    /// Get the model being used by this provider.
    ///
    /// Returns `None` if the provider doesn't expose model information.
    fn model(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_typed_rate_limit() {
        let err: anyhow::Error = ProviderError::from_status("Gemini", 429, "slow down".into()).into();
        assert!(is_rate_limited(&err));

        let err: anyhow::Error = ProviderError::from_status("Gemini", 500, "boom".into()).into();
        assert!(!is_rate_limited(&err));
    }

    #[test]
    fn test_message_rate_limit() {
        assert!(is_rate_limited(&anyhow!("HTTP 429 from upstream")));
        assert!(is_rate_limited(&anyhow!("RESOURCE_EXHAUSTED: Quota exceeded")));
        assert!(is_rate_limited(&anyhow!("Too Many Requests")));
        assert!(!is_rate_limited(&anyhow!("request id 14290 failed")));
        assert!(!is_rate_limited(&anyhow!("invalid API key")));
    }

    #[test]
    fn test_context_is_searched() {
        let err = anyhow!("quota exceeded").context("generate_text");
        assert!(is_rate_limited(&err));
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("answer.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("answer.jpg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("scan")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.webp")), "image/webp");
    }
}
