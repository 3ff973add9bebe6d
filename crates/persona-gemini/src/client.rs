// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini `generateContent` endpoint.
//!
//! Provides [`GeminiClient`] which handles URL construction, key passing and
//! status classification. Requests are sent exactly once; callers decide what
//! a failure means for the user.

use std::time::Duration;

use persona_core::PersonaError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};

/// Failure of a single `generateContent` call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Transport(String),

    /// Non-2xx status. `message` is the provider's error text, or the
    /// canonical status reason when the body is not a Gemini error.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// 2xx status with a body that is not a `generateContent` response.
    #[error("{0}")]
    Decode(String),
}

/// HTTP client for Gemini API communication.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new client against `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PersonaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersonaError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    fn request_url(&self, model: &str, api_key: &str) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.endpoint(model))
            .map_err(|e| ClientError::Transport(format!("invalid endpoint URL: {e}")))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    /// Sends one `generateContent` request.
    pub async fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ClientError> {
        let response = self
            .client
            .post(self.request_url(model, api_key)?)
            .json(request)
            .send()
            .await
            // The URL carries the API key; keep it out of messages and logs.
            .map_err(|e| ClientError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        debug!(status = %status, model, "generateContent response received");

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .map(|e| e.error.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
                });
            warn!(status = %status, error = %message, "generateContent request rejected");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
