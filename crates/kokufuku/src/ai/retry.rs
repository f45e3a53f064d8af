//! Retry policy for completion calls.

use super::provider::is_rate_limited;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Shown when every attempt was rate limited.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "AIサービスが混み合っています。しばらく時間をおいてから再度お試しください。";

/// Prefix of inline error answers.
pub const ERROR_PREFIX: &str = "エラー: ";

/// Linear backoff on rate-limit errors.
///
/// After the n-th rate-limited attempt the caller waits `n × backoff_unit_ms`
/// milliseconds, except after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given 1-based attempt.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_unit_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Result of a generation request. Never an error: failures become text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// The model answered.
    Text(String),
    /// Non-retryable failure; the message already carries [`ERROR_PREFIX`].
    Failed(String),
    /// Every attempt was rate limited.
    Unavailable,
}

impl GenerationOutcome {
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(format!("{}{}", ERROR_PREFIX, reason))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Text to show the user for any outcome.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Failed(text) => text,
            Self::Unavailable => SERVICE_UNAVAILABLE_MESSAGE,
        }
    }
}

impl fmt::Display for GenerationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

/// Run `call` under `policy`.
///
/// Rate-limit errors are retried with linear backoff; any other error fails
/// immediately.
pub fn generate_with_retry<F>(policy: &RetryPolicy, mut call: F) -> GenerationOutcome
where
    F: FnMut() -> anyhow::Result<String>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match call() {
            Ok(text) => return GenerationOutcome::Text(text),
            Err(e) if is_rate_limited(&e) => {
                warn!("Rate limited (attempt {}/{}): {}", attempt, attempts, e);
                if attempt < attempts {
                    let delay = policy.backoff_after(attempt);
                    info!("Retrying in {:?}", delay);
                    thread::sleep(delay);
                }
            }
            Err(e) => {
                warn!("Generation failed: {:#}", e);
                return GenerationOutcome::failed(format!("{:#}", e));
            }
        }
    }
    GenerationOutcome::Unavailable
}
