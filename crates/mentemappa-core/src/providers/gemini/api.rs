//! Gemini API key provider (Generative Language API).

use anyhow::Result;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};

use super::shared::{GenerationParams, build_gemini_request, classify_reqwest_error};
use super::sse::GeminiSseParser;
use crate::providers::shared::{USER_AGENT, resolve_api_key, resolve_base_url};
use crate::providers::{ChatMessage, ProviderError, ProviderStream};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

/// Gemini API configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub params: GenerationParams,
}

impl GeminiConfig {
    /// Creates a new config from environment.
    ///
    /// Authentication resolution order:
    /// 1. `config_api_key` parameter (from config file)
    /// 2. `GEMINI_API_KEY` environment variable
    ///
    /// # Errors
    /// Returns an error if no API key is available or the base URL is invalid.
    pub fn from_env(
        model: String,
        params: GenerationParams,
        config_base_url: Option<&str>,
        config_api_key: Option<&str>,
    ) -> Result<Self> {
        let api_key = resolve_api_key(config_api_key, API_KEY_ENV, "gemini")?;
        let base_url =
            resolve_base_url(config_base_url, BASE_URL_ENV, DEFAULT_BASE_URL, "Gemini")?;

        Ok(Self {
            api_key,
            base_url,
            model,
            params,
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

/// Gemini client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Opens a streaming request for the given conversation.
    ///
    /// # Errors
    /// Returns a `ProviderError` if the request cannot be sent or the service
    /// answers with a non-success status.
    pub async fn send_messages_stream(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
    ) -> Result<ProviderStream> {
        let request = build_gemini_request(messages, system, self.config.params);
        let url = self.config.stream_url();

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "opening gemini stream"
        );

        let response = self
            .http
            .post(&url)
            .headers(build_headers(&self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http_status(status.as_u16(), &error_body).into());
        }

        Ok(GeminiSseParser::new(Box::pin(response.bytes_stream())).boxed())
    }
}

fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-goog-api-key",
        HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static("text/event-stream"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_targets_sse_endpoint() {
        let config = GeminiConfig {
            api_key: "k".to_string(),
            base_url: "http://localhost:9999".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            params: GenerationParams {
                temperature: 0.7,
                max_output_tokens: None,
            },
        };
        assert_eq!(
            config.stream_url(),
            "http://localhost:9999/models/gemini-3-flash-preview:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn headers_carry_api_key() {
        let headers = build_headers("secret");
        assert_eq!(headers["x-goog-api-key"], "secret");
        assert_eq!(headers["accept"], "text/event-stream");
    }
}
