/*!
 * Mock provider implementations for testing.
 *
 * This module provides a scripted in-process provider that simulates the
 * failure modes of a remote text-generation service:
 * - `MockProvider::working()` - Always succeeds with a tagged translation
 * - `MockProvider::rate_limited()` - Always answers with a rate-limit signal
 * - `MockProvider::failing()` - Always fails with a service error
 *
 * Every call is recorded (credential used, source text, peak concurrency) so
 * tests can assert on rotation, ordering and in-flight bounds.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::translation::prompts::extract_source_text;

/// Prefix the working mock puts in front of every translated text
pub const TRANSLATED_TAG: &str = "[TRANSLATED] ";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a tagged translation
    Working,
    /// Succeeds but wraps the answer in an ```html code fence
    Fenced,
    /// Always answers with an explicit rate-limit signal
    RateLimited,
    /// Rate-limits the first `failures` requests, then works
    RateLimitedThenWorking { failures: usize },
    /// Fails every Nth request with a service error
    Intermittent { fail_every: usize },
    /// Always fails with a service error
    Failing,
    /// Returns an empty response
    Empty,
}

/// Artificial latency applied before answering
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MockLatency {
    /// Answer immediately
    #[default]
    None,
    /// Same delay for every request
    Fixed { delay_ms: u64 },
    /// Each request waits `step_ms` less than the previous one, so later
    /// requests complete before earlier ones
    Decreasing { start_ms: u64, step_ms: u64 },
}

/// One recorded outbound call
#[derive(Debug, Clone)]
pub struct MockCall {
    /// Credential the call was made with
    pub api_key: String,
    /// Chunk text extracted from the prompt
    pub text: String,
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Latency profile
    latency: MockLatency,
    /// Request counter, shared with clones handed to tests
    request_count: Arc<AtomicUsize>,
    /// Currently running requests
    in_flight: AtomicUsize,
    /// Highest observed number of simultaneously running requests
    max_in_flight: AtomicUsize,
    /// Recorded calls in arrival order
    calls: Mutex<Vec<MockCall>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            latency: MockLatency::None,
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that always signals rate limiting
    pub fn rate_limited() -> Self {
        Self::new(MockBehavior::RateLimited)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that wraps answers in a code fence
    pub fn fenced() -> Self {
        Self::new(MockBehavior::Fenced)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Set the latency profile
    pub fn with_latency(mut self, latency: MockLatency) -> Self {
        self.latency = latency;
        self
    }

    /// Shared handle to the request counter
    pub fn request_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of the recorded calls
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Credentials used, in call order
    pub fn keys_used(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.api_key.clone()).collect()
    }

    /// What the working mock returns for a given source text
    pub fn expected_translation(text: &str) -> String {
        format!("{}{}", TRANSLATED_TAG, text)
    }

    fn delay_for(&self, request_index: usize) -> Option<Duration> {
        match self.latency {
            MockLatency::None => None,
            MockLatency::Fixed { delay_ms } => Some(Duration::from_millis(delay_ms)),
            MockLatency::Decreasing { start_ms, step_ms } => Some(Duration::from_millis(
                start_ms.saturating_sub(step_ms.saturating_mul(request_index as u64)),
            )),
        }
    }

    fn answer(&self, request_index: usize, text: &str) -> Result<String, ProviderError> {
        match self.behavior {
            MockBehavior::Working => Ok(Self::expected_translation(text)),
            MockBehavior::Fenced => Ok(format!("```html\n{}\n```", Self::expected_translation(text))),
            MockBehavior::RateLimited => Err(ProviderError::RateLimited("quota exceeded".to_string())),
            MockBehavior::RateLimitedThenWorking { failures } => {
                if request_index < failures {
                    Err(ProviderError::RateLimited("quota exceeded".to_string()))
                } else {
                    Ok(Self::expected_translation(text))
                }
            }
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && (request_index + 1) % fail_every == 0 {
                    Err(ProviderError::ApiError {
                        status_code: 500,
                        message: format!("Simulated failure on request {}", request_index + 1),
                    })
                } else {
                    Ok(Self::expected_translation(text))
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 503,
                message: "Simulated service outage".to_string(),
            }),
            MockBehavior::Empty => Ok(String::new()),
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, prompt: &str, _model: &str, api_key: &str) -> Result<String, ProviderError> {
        let request_index = self.request_count.fetch_add(1, Ordering::SeqCst);
        let text = extract_source_text(prompt).to_string();

        self.calls.lock().push(MockCall {
            api_key: api_key.to_string(),
            text: text.clone(),
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay_for(request_index) {
            tokio::time::sleep(delay).await;
        }

        let answer = self.answer(request_index, &text)?;
        if answer.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(answer)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
