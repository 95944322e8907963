/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for the remote text-generation
 * services a book can be translated with:
 * - Gemini: Google Generative Language API (default)
 * - Anthropic: Anthropic Messages API
 * - Mock: scripted in-process provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// A provider performs exactly one outbound call per `complete`, authenticated
/// with the credential it is handed. Retry and credential rotation live above
/// this seam.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Send a fully rendered prompt and return the raw generated text
    ///
    /// # Arguments
    /// * `prompt` - The prompt, instructions included
    /// * `model` - Model identifier
    /// * `api_key` - Credential for this single call
    async fn complete(&self, prompt: &str, model: &str, api_key: &str) -> Result<String, ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Build the configured provider behind a shared handle
pub fn from_config(config: &TranslationConfig) -> Arc<dyn Provider> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider {
        TranslationProvider::Gemini => Arc::new(gemini::Gemini::new(config.get_endpoint(), timeout, config.temperature)),
        TranslationProvider::Anthropic => {
            Arc::new(anthropic::Anthropic::new(config.get_endpoint(), timeout, config.temperature))
        }
    }
}

/// Map a non-success HTTP status to the provider error taxonomy
pub(crate) fn error_for_status(status_code: u16, message: String) -> ProviderError {
    if status_code == 429 {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::ApiError { status_code, message }
    }
}

/// Map a reqwest transport failure to the provider error taxonomy.
/// The URL is stripped so query-string credentials never reach the logs.
pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    let error = error.without_url();
    if error.is_timeout() {
        ProviderError::Timeout(timeout.as_secs())
    } else {
        ProviderError::ConnectionError(error.to_string())
    }
}

pub mod anthropic;
pub mod gemini;
pub mod mock;
