// SPDX-FileCopyrightText: 2026 Persona Chat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gemini provider adapter for Persona Chat.
//!
//! Implements [`GenerationProvider`] on top of the Gemini `generateContent`
//! endpoint. Every failure (transport, provider rejection, blocked or empty
//! output, malformed JSON) is mapped to a displayable message inside a
//! [`GenerationOutcome::Error`] or [`ProfileOutcome::Error`]; nothing here
//! returns `Err` to the caller of a generation.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use persona_config::model::GeminiConfig;
use persona_config::settings::API_KEY_ENV;
use persona_core::{
    AdapterType, GeneratedProfile, GenerationOutcome, GenerationProvider, GenerationRequest,
    HealthStatus, PendingResponse, PersonaError, PluginAdapter, ProfileOutcome, ProfileRequest,
    ResponseMessage, Turn, TurnPart, TurnRole,
};
use tracing::{debug, info, warn};

use crate::client::{ClientError, GeminiClient};
use crate::types::{
    Blob, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
    RawProfile, RawReply, SafetySetting,
};

/// Sampling temperature for chat replies.
pub const CHAT_TEMPERATURE: f32 = 1.25;
/// Sampling temperature for profile generation.
pub const PROFILE_TEMPERATURE: f32 = 1.2;
const TOP_K: u32 = 40;
const TOP_P: f32 = 0.95;

/// Substring Gemini uses when the caller's region is not served.
const UNSUPPORTED_LOCATION: &str = "location is not supported";

/// User-facing error texts.
pub mod messages {
    pub const UNSUPPORTED_REGION: &str =
        "The Gemini API is not available in your region (location is not supported). Try a different network or VPN.";
    pub const EMPTY_RESPONSE: &str = "The model returned an empty response. Please try again.";
    pub const EMPTY_PROFILE: &str = "The model returned an incomplete character profile.";
}

/// Gemini-backed implementation of [`GenerationProvider`].
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: GeminiClient,
    key_configured: bool,
}

impl GeminiProvider {
    /// Creates a provider from the `[gemini]` config section.
    ///
    /// The API key itself travels with each request; the config key only
    /// informs the health check.
    pub fn new(config: &GeminiConfig) -> Result<Self, PersonaError> {
        let client = GeminiClient::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;
        let key_configured = config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
            || std::env::var(API_KEY_ENV).is_ok_and(|k| !k.trim().is_empty());

        info!(
            base_url = client.base_url(),
            model = config.model,
            "Gemini provider initialized"
        );

        Ok(Self {
            client,
            key_configured,
        })
    }

    /// Creates a provider with an existing client.
    pub fn with_client(client: GeminiClient, key_configured: bool) -> Self {
        Self {
            client,
            key_configured,
        }
    }
}

#[async_trait]
impl PluginAdapter for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, PersonaError> {
        // No probe request: a call would need a key and spend quota.
        if self.key_configured {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(
                "no Gemini API key configured; set one in settings or GEMINI_API_KEY".into(),
            ))
        }
    }

    async fn shutdown(&self) -> Result<(), PersonaError> {
        debug!("Gemini provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate_content(&self, request: &GenerationRequest) -> GenerationOutcome {
        let body = GenerateContentRequest {
            contents: request.contents.iter().map(to_content).collect(),
            system_instruction: Some(Content::system(request.system_prompt.clone())),
            generation_config: generation_config(CHAT_TEMPERATURE, reply_schema()),
            safety_settings: SafetySetting::block_none(),
        };

        let text = match self.call(&request.api_key, &request.model, &body).await {
            Ok(text) => text,
            Err(message) => return GenerationOutcome::Error(message),
        };

        match parse_reply(&text) {
            Ok(reply) => {
                debug!(
                    messages = reply.messages.len(),
                    reaction_delay_ms = reply.reaction_delay,
                    has_memory = reply.new_memory.is_some(),
                    "reply parsed"
                );
                GenerationOutcome::Reply(reply)
            }
            Err(message) => {
                warn!(error = %message, "unparseable reply payload");
                GenerationOutcome::Error(message)
            }
        }
    }

    async fn generate_profile(&self, request: &ProfileRequest) -> ProfileOutcome {
        let body = GenerateContentRequest {
            contents: vec![to_content(&Turn::text(TurnRole::User, request.prompt.clone()))],
            system_instruction: None,
            generation_config: generation_config(PROFILE_TEMPERATURE, profile_schema()),
            safety_settings: SafetySetting::block_none(),
        };

        let text = match self.call(&request.api_key, &request.model, &body).await {
            Ok(text) => text,
            Err(message) => return ProfileOutcome::Error(message),
        };

        match serde_json::from_str::<RawProfile>(&text) {
            Ok(raw) if !raw.name.trim().is_empty() && !raw.prompt.trim().is_empty() => {
                ProfileOutcome::Profile(GeneratedProfile {
                    name: raw.name.trim().to_string(),
                    prompt: raw.prompt.trim().to_string(),
                })
            }
            Ok(_) => ProfileOutcome::Error(messages::EMPTY_PROFILE.to_string()),
            Err(e) => {
                warn!(error = %e, "unparseable profile payload");
                ProfileOutcome::Error(format!("Could not read the generated profile: {e}"))
            }
        }
    }
}

impl GeminiProvider {
    /// Sends the request and returns the first candidate's text, or a
    /// displayable error message.
    async fn call(
        &self,
        api_key: &str,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, String> {
        let response = self
            .client
            .generate_content(api_key, model, body)
            .await
            .map_err(|e| client_error_message(&e))?;
        candidate_text(&response)
    }
}

fn generation_config(temperature: f32, schema: serde_json::Value) -> GenerationConfig {
    GenerationConfig {
        temperature,
        top_k: TOP_K,
        top_p: TOP_P,
        response_mime_type: "application/json".to_string(),
        response_schema: schema,
    }
}

fn to_content(turn: &Turn) -> Content {
    Content {
        role: Some(turn.role.to_string()),
        parts: turn
            .parts
            .iter()
            .map(|part| match part {
                TurnPart::Text(text) => Part::Text { text: text.clone() },
                TurnPart::InlineData { mime_type, data } => Part::InlineData {
                    inline_data: Blob {
                        mime_type: mime_type.clone(),
                        data: data.clone(),
                    },
                },
            })
            .collect(),
    }
}

/// Maps a failed call to the text shown in the chat.
fn client_error_message(err: &ClientError) -> String {
    match err {
        ClientError::Transport(msg) | ClientError::Api { message: msg, .. }
            if msg.contains(UNSUPPORTED_LOCATION) =>
        {
            messages::UNSUPPORTED_REGION.to_string()
        }
        ClientError::Transport(msg) => format!("API request failed: {msg}"),
        ClientError::Api { message, .. } => message.clone(),
        ClientError::Decode(msg) => format!("Could not read the API response: {msg}"),
    }
}

/// Extracts the reply text, or explains why there is none.
fn candidate_text(response: &GenerateContentResponse) -> Result<String, String> {
    if let Some(text) = response.first_text() {
        return Ok(text);
    }

    if let Some(err) = &response.error
        && !err.message.trim().is_empty()
    {
        return Err(err.message.clone());
    }

    let block_reason = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref());
    if let Some(reason) = block_reason {
        warn!(reason, "prompt blocked");
        return Err(format!(
            "The request was blocked by the safety filter (reason: {reason})."
        ));
    }

    let finish_reason = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
        .filter(|r| *r != "STOP");
    match finish_reason {
        Some("SAFETY") => Err("The reply was blocked by the safety filter (reason: SAFETY).".into()),
        Some("MAX_TOKENS") => Err("The reply was cut off before it was complete (reason: MAX_TOKENS).".into()),
        Some(reason) => {
            warn!(reason, "candidate finished without content");
            Err(format!("The model stopped without replying (reason: {reason})."))
        }
        None => Err(messages::EMPTY_RESPONSE.to_string()),
    }
}

/// Parses the structured reply and normalizes delays to whole, non-negative milliseconds.
fn parse_reply(text: &str) -> Result<PendingResponse, String> {
    let raw: RawReply = serde_json::from_str(text.trim())
        .map_err(|e| format!("Could not read the model's reply: {e}"))?;

    Ok(PendingResponse {
        reaction_delay: clamp_delay(raw.reaction_delay),
        messages: raw
            .messages
            .into_iter()
            .map(|m| ResponseMessage {
                delay: clamp_delay(m.delay),
                content: m.content,
                sticker: m.sticker.filter(|s| !s.trim().is_empty()),
            })
            .collect(),
        new_memory: raw.new_memory,
    })
}

fn clamp_delay(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.round() as u64,
        _ => 0,
    }
}

/// JSON schema of a chat reply.
pub fn reply_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "reactionDelay": {"type": "INTEGER"},
            "messages": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "delay": {"type": "INTEGER"},
                        "content": {"type": "STRING"},
                        "sticker": {"type": "STRING"}
                    },
                    "required": ["delay", "content"]
                }
            },
            "newMemory": {"type": "STRING"}
        },
        "required": ["reactionDelay", "messages"]
    })
}

/// JSON schema of a generated character profile.
pub fn profile_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "name": {"type": "STRING"},
            "prompt": {"type": "STRING"}
        },
        "required": ["name", "prompt"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, PromptFeedback, ResponseContent, ResponsePart};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        let client = GeminiClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        GeminiProvider::with_client(client, true)
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            api_key: "k".into(),
            model: "gemini-test".into(),
            contents: vec![Turn::text(TurnRole::User, "hi")],
            system_prompt: "You are Mina.".into(),
        }
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}]
        })
    }

    fn response_with(finish: Option<&str>, block: Option<&str>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(ResponseContent {
                    parts: vec![ResponsePart { text: None }],
                }),
                finish_reason: finish.map(str::to_string),
            }],
            prompt_feedback: block.map(|r| PromptFeedback {
                block_reason: Some(r.to_string()),
            }),
            error: None,
        }
    }

    #[tokio::test]
    async fn successful_reply_is_parsed_and_clamped() {
        let server = MockServer::start().await;
        let payload = r#"{"reactionDelay": -300, "messages": [{"delay": -1, "content": "hey"}, {"delay": 850.4, "content": "what's up", "sticker": "wave"}], "newMemory": "Alex said hi"}"#;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"temperature": 1.25, "responseMimeType": "application/json"},
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(payload)))
            .mount(&server)
            .await;

        let outcome = provider(&server).generate_content(&request()).await;
        let GenerationOutcome::Reply(reply) = outcome else {
            panic!("expected reply, got {outcome:?}");
        };
        assert_eq!(reply.reaction_delay, 0);
        assert_eq!(reply.messages.len(), 2);
        assert_eq!(reply.messages[0].delay, 0);
        assert_eq!(reply.messages[1].delay, 850);
        assert_eq!(reply.messages[1].sticker.as_deref(), Some("wave"));
        assert_eq!(reply.new_memory.as_deref(), Some("Alex said hi"));
    }

    #[tokio::test]
    async fn rate_limit_becomes_error_outcome_after_one_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"error": {"message": "rate limited"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = provider(&server).generate_content(&request()).await;
        assert_eq!(outcome, GenerationOutcome::Error("rate limited".into()));
    }

    #[tokio::test]
    async fn unsupported_location_gets_dedicated_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "User location is not supported for the API use."}
            })))
            .mount(&server)
            .await;

        let outcome = provider(&server).generate_content(&request()).await;
        assert_eq!(
            outcome,
            GenerationOutcome::Error(messages::UNSUPPORTED_REGION.into())
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_error_outcome() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("not json")))
            .mount(&server)
            .await;

        let outcome = provider(&server).generate_content(&request()).await;
        assert!(matches!(outcome, GenerationOutcome::Error(m) if m.starts_with("Could not read the model's reply")));
    }

    #[tokio::test]
    async fn transport_failure_is_prefixed() {
        let client = GeminiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let provider = GeminiProvider::with_client(client, true);
        let outcome = provider.generate_content(&request()).await;
        assert!(matches!(outcome, GenerationOutcome::Error(m) if m.starts_with("API request failed: ")));
    }

    #[tokio::test]
    async fn profile_uses_profile_schema_and_temperature() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"temperature": 1.2, "responseSchema": {"required": ["name", "prompt"]}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(
                r#"{"name": " Noa ", "prompt": "a marine biologist"}"#,
            )))
            .mount(&server)
            .await;

        let outcome = provider(&server)
            .generate_profile(&ProfileRequest {
                api_key: "k".into(),
                model: "gemini-test".into(),
                prompt: "invent someone".into(),
            })
            .await;
        assert_eq!(
            outcome,
            ProfileOutcome::Profile(GeneratedProfile {
                name: "Noa".into(),
                prompt: "a marine biologist".into()
            })
        );
    }

    #[tokio::test]
    async fn blank_profile_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(
                r#"{"name": "", "prompt": "x"}"#,
            )))
            .mount(&server)
            .await;

        let outcome = provider(&server)
            .generate_profile(&ProfileRequest {
                api_key: "k".into(),
                model: "m".into(),
                prompt: "p".into(),
            })
            .await;
        assert_eq!(outcome, ProfileOutcome::Error(messages::EMPTY_PROFILE.into()));
    }

    #[test]
    fn block_reason_is_reported() {
        let err = candidate_text(&response_with(None, Some("PROHIBITED_CONTENT"))).unwrap_err();
        assert!(err.contains("PROHIBITED_CONTENT"));
    }

    #[test]
    fn finish_reason_is_reported() {
        let err = candidate_text(&response_with(Some("RECITATION"), None)).unwrap_err();
        assert!(err.contains("RECITATION"));
        let err = candidate_text(&response_with(Some("STOP"), None)).unwrap_err();
        assert_eq!(err, messages::EMPTY_RESPONSE);
    }

    #[test]
    fn inline_data_turns_map_to_blobs() {
        let turn = Turn {
            role: TurnRole::User,
            parts: vec![TurnPart::InlineData {
                mime_type: "image/png".into(),
                data: "AA==".into(),
            }],
        };
        let json = serde_json::to_value(to_content(&turn)).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["parts"][0]["inlineData"]["data"], "AA==");
    }

    #[tokio::test]
    async fn health_check_degrades_without_key() {
        let client = GeminiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let provider = GeminiProvider::with_client(client, false);
        assert!(matches!(
            provider.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
