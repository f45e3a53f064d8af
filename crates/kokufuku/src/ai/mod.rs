//! AI module: completion providers and the retry policy around them.
//!
//! The [`AIProvider`] trait is the single seam between the library and any
//! LLM backend. It is used for two things:
//!
//! - one batched topic classification call per analysis
//!   ([`crate::canonicalize`])
//! - study guidance, practice tests, schedules and image grading
//!   ([`crate::advisor`])
//!
//! # Feature Flag
//!
//! Concrete HTTP providers require the `ai` feature (on by default). The
//! trait, [`RetryPolicy`] and [`GenerationOutcome`] are always available.
//!
//! ```toml
//! # Disable the HTTP providers for a smaller binary
//! kokufuku = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kokufuku::ai::{generate_with_retry, GeminiProvider, RetryPolicy};
//!
//! let provider = GeminiProvider::new("your-api-key")?;
//! let outcome = generate_with_retry(&RetryPolicy::default(), || {
//!     provider.generate_text("新潟高校の入試傾向を教えて")
//! });
//! println!("{}", outcome);
//! ```

// Provider trait and retry policy are always available (for custom implementations)
mod provider;
mod retry;

pub use provider::{AIProvider, ImageInput, ProviderError, is_rate_limited, mime_type_for};
pub use retry::{
    ERROR_PREFIX, GenerationOutcome, RetryPolicy, SERVICE_UNAVAILABLE_MESSAGE,
    generate_with_retry,
};

// Concrete providers require the "ai" feature
#[cfg(feature = "ai")]
mod gemini;
#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use gemini::{GeminiConfig, GeminiConfigBuilder, GeminiProvider};

#[cfg(feature = "ai")]
pub use openrouter::{OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
