use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{Provider, error_for_status, transport_error};
use crate::errors::ProviderError;

/// Harm categories relaxed for literary content
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini client for the Generative Language `generateContent` API
#[derive(Debug)]
pub struct Gemini {
    /// HTTP client for API requests
    client: Client,
    /// Models base URL, e.g. `https://generativelanguage.googleapis.com/v1beta/models`
    endpoint: String,
    /// Per-request timeout
    timeout: Duration,
    /// Sampling temperature
    temperature: f32,
}

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation turns; a single user turn here
    contents: Vec<GeminiContent>,
    /// Safety thresholds per harm category
    safety_settings: Vec<SafetySetting>,
    /// Sampling parameters
    generation_config: GenerationConfig,
}

/// One content turn
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    /// Text parts of the turn
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// One text part
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    /// Part text
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

/// One generated candidate
#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    /// Candidate content; absent when the candidate was blocked
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
}

impl GeminiRequest {
    /// Create a single-turn request for the given prompt
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: Some(prompt.into()) }],
            }],
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting { category, threshold: "BLOCK_NONE" })
                .collect(),
            generation_config: GenerationConfig { temperature },
        }
    }
}

impl Gemini {
    /// Create a new Gemini client
    pub fn new(endpoint: impl Into<String>, timeout: Duration, temperature: f32) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            endpoint: endpoint.into(),
            timeout,
            temperature,
        }
    }

    /// Full request URL for a model, with the credential as `key` query parameter
    pub fn request_url(&self, model: &str, api_key: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/{}:generateContent", self.endpoint.trim_end_matches('/'), model))
            .map_err(|e| ProviderError::ConnectionError(format!("Invalid Gemini endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    /// Extract the first candidate's text
    pub fn extract_text(response: &GeminiResponse) -> Option<String> {
        response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.first())
            .and_then(|part| part.text.clone())
            .filter(|text| !text.trim().is_empty())
    }
}

#[async_trait]
impl Provider for Gemini {
    async fn complete(&self, prompt: &str, model: &str, api_key: &str) -> Result<String, ProviderError> {
        let url = self.request_url(model, api_key)?;
        let request = GeminiRequest::new(prompt, self.temperature);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(e, self.timeout))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorBody>(&body)
                .map(|b| b.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
            debug!("Gemini API error ({}): {}", status, message);
            return Err(error_for_status(status.as_u16(), message));
        }

        let parsed: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Self::extract_text(&parsed).ok_or(ProviderError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
