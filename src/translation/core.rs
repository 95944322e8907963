/*!
 * Core translation call.
 *
 * `TranslationClient` performs exactly one logical call to the configured
 * provider: it renders the prompt, bounds the call with a timeout, classifies
 * failures into `ProviderError` kinds and sanitizes the generated text.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::prompts::PromptTemplate;
use crate::errors::ProviderError;
use crate::providers::Provider;

/// Opening code fence, optionally tagged html/xhtml/xml
static LEADING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*```(?:html|xhtml|xml)?[ \t]*\r?\n?").expect("Invalid leading fence regex")
});

/// Closing code fence at the end of the answer
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n?```\s*$").expect("Invalid trailing fence regex"));

/// Remove code-fence wrappers a model may put around its answer, then trim
pub fn sanitize_response(raw: &str) -> String {
    let without_leading = LEADING_FENCE.replace(raw, "");
    let without_trailing = TRAILING_FENCE.replace(&without_leading, "");
    without_trailing.trim().to_string()
}

/// Single-call translation client
#[derive(Debug, Clone)]
pub struct TranslationClient {
    /// Provider performing the outbound call
    provider: Arc<dyn Provider>,
    /// Instruction template with language names filled in
    template: PromptTemplate,
    /// Upper bound for one call
    timeout: Duration,
}

impl TranslationClient {
    /// Create a new client
    pub fn new(provider: Arc<dyn Provider>, template: PromptTemplate, timeout: Duration) -> Self {
        Self {
            provider,
            template,
            timeout,
        }
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Translate `text` with `model_id`, authenticated by `credential`
    pub async fn call(&self, text: &str, model_id: &str, credential: &str) -> Result<String, ProviderError> {
        let prompt = self.template.render(text);
        let started = Instant::now();

        let raw = tokio::time::timeout(self.timeout, self.provider.complete(&prompt, model_id, credential))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        debug!(
            "{} answered {} chars in {:.2}s",
            self.provider.name(),
            raw.len(),
            started.elapsed().as_secs_f64()
        );

        let cleaned = sanitize_response(&raw);
        if cleaned.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(cleaned)
    }
}
