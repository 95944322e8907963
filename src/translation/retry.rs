/*!
 * Retrying translation with credential rotation.
 *
 * `RetryingTranslator` never fails: after the configured number of attempts
 * it degrades to the untranslated input and reports the event. Every attempt
 * draws a fresh credential from the pool.
 */

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use super::core::TranslationClient;
use super::credentials::CredentialPool;
use crate::app_config::{BackoffStrategy, TranslationConfig};
use crate::errors::ProviderError;
use crate::events::EventLog;

/// Largest exponent applied by exponential backoff
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Result of translating one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// The service produced a translation
    Translated(String),
    /// All attempts failed; the original text is passed through
    Fallback(String),
}

impl TranslationOutcome {
    /// Text to put in the output, whichever way it was obtained
    pub fn text(&self) -> &str {
        match self {
            Self::Translated(text) | Self::Fallback(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Translated(text) | Self::Fallback(text) => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Attempt budget and waits between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per text
    pub max_retries: u32,
    /// Wait after an explicit rate-limit signal
    pub rate_limit_backoff: Duration,
    /// Wait after any other failure
    pub failure_backoff: Duration,
    /// Growth of the waits across attempts
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    /// Build the policy from translation settings
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
            failure_backoff: Duration::from_millis(config.failure_backoff_ms),
            strategy: config.backoff,
        }
    }

    /// Policy without waits
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            rate_limit_backoff: Duration::ZERO,
            failure_backoff: Duration::ZERO,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Wait before the attempt following `attempt` (0-based) failed with `error`
    pub fn delay(&self, error: &ProviderError, attempt: u32) -> Duration {
        let base = if error.is_rate_limited() {
            self.rate_limit_backoff
        } else {
            self.failure_backoff
        };

        match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Exponential => {
                let scaled = base.saturating_mul(1 << attempt.min(MAX_BACKOFF_EXPONENT));
                let max_jitter = scaled.as_millis() as u64 / 2;
                let jitter = if max_jitter > 0 {
                    rand::rng().random_range(0..=max_jitter)
                } else {
                    0
                };
                scaled + Duration::from_millis(jitter)
            }
        }
    }
}

/// Translator that retries with rotated credentials and falls back to the input
#[derive(Debug, Clone)]
pub struct RetryingTranslator {
    /// Single-call client
    client: TranslationClient,
    /// Shared credential pool
    credentials: Arc<CredentialPool>,
    /// Attempts and waits
    policy: RetryPolicy,
    /// Run event sink
    events: EventLog,
}

impl RetryingTranslator {
    /// Create a new retrying translator
    pub fn new(client: TranslationClient, credentials: Arc<CredentialPool>, policy: RetryPolicy, events: EventLog) -> Self {
        Self {
            client,
            credentials,
            policy,
            events,
        }
    }

    /// Translate `text` with `model_id`; never fails
    pub async fn translate(&self, text: &str, model_id: &str) -> TranslationOutcome {
        let attempts = self.policy.max_retries;

        for attempt in 0..attempts {
            let credential = self.credentials.next();

            let error = match self.client.call(text, model_id, credential).await {
                Ok(translated) => return TranslationOutcome::Translated(translated),
                Err(error) => error,
            };

            if error.is_rate_limited() {
                self.events.warning(format!(
                    "Rate limited by {} (attempt {}/{}), switching API key",
                    self.client.provider_name(),
                    attempt + 1,
                    attempts
                ));
            } else {
                self.events.warning(format!(
                    "Translation request failed (attempt {}/{}): {}",
                    attempt + 1,
                    attempts,
                    error
                ));
            }

            if attempt + 1 < attempts {
                let delay = self.policy.delay(&error, attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.events.error(format!(
            "Translation failed after {} attempts, keeping original text ({} chars)",
            attempts,
            text.chars().count()
        ));
        TranslationOutcome::Fallback(text.to_string())
    }
}
