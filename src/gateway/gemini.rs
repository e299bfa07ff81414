use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::{
    parse_quiz_reply, quiz_prompt, quiz_schema, summary_prompt, ChatMessage, ChatRole, ChatSession,
    Difficulty, GatewayError, ModelGateway,
};
use crate::config::{Config, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::quiz::QuizQuestion;

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for GeminiConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            api_base: config.gemini_api_base.clone(),
            timeout: config.request_timeout,
        }
    }
}

pub struct GeminiGateway {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiGateway {
    /// Fails when the API key is blank so a misconfigured process never starts serving.
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        if config.api_key.trim().is_empty() {
            return Err(GatewayError::Service("Gemini API key is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Service(e.to_string()))?;

        Ok(Self { config, http })
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.config.api_base, self.config.model)
    }

    async fn generate(&self, body: serde_json::Value) -> Result<String, GatewayError> {
        debug!("Gemini request to model {}", self.config.model);

        let response = self
            .http
            .post(self.api_url())
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Service(format!("network: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::Service("rate limited".to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Service(format!("HTTP {status}: {text}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Service(format!("unreadable response: {e}")))?;

        extract_text(&json)
    }
}

/// Builds a `generateContent` body. `schema` switches the reply to JSON mode.
pub(crate) fn build_request_body(
    system_instruction: Option<&str>,
    messages: &[ChatMessage],
    schema: Option<serde_json::Value>,
) -> serde_json::Value {
    let contents: Vec<_> = messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            serde_json::json!({
                "role": role,
                "parts": [{ "text": msg.content }]
            })
        })
        .collect();

    let mut body = serde_json::json!({ "contents": contents });

    if let Some(instruction) = system_instruction {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{ "text": instruction }]
        });
    }

    if let Some(schema) = schema {
        body["generationConfig"] = serde_json::json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        });
    }

    body
}

/// Concatenates the text parts of the first candidate.
pub(crate) fn extract_text(json: &serde_json::Value) -> Result<String, GatewayError> {
    let first = json["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| GatewayError::Service("no candidates in response".to_string()))?;

    let text: String = first["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = first["finishReason"].as_str().unwrap_or("unknown");
        return Err(GatewayError::Service(format!("empty reply (finish reason: {reason})")));
    }

    Ok(text)
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn send_turn(&self, session: &mut ChatSession, text: &str) -> Result<String, GatewayError> {
        let mut messages = session.history.clone();
        messages.push(ChatMessage::user(text));

        let body = build_request_body(Some(&session.system_instruction), &messages, None);
        let reply = self.generate(body).await?;

        messages.push(ChatMessage::model(reply.clone()));
        session.history = messages;
        Ok(reply)
    }

    async fn summarize(&self, source: &str, difficulty: Difficulty) -> Result<String, GatewayError> {
        let prompt = summary_prompt(source, difficulty);
        let body = build_request_body(None, &[ChatMessage::user(prompt)], None);
        self.generate(body).await
    }

    async fn generate_quiz(&self, source: &str, count: u8) -> Result<Vec<QuizQuestion>, GatewayError> {
        let prompt = quiz_prompt(source, count);
        let body = build_request_body(None, &[ChatMessage::user(prompt)], Some(quiz_schema()));
        let reply = self.generate(body).await?;

        parse_quiz_reply(&reply).map_err(|e| {
            log::error!("Error parsing quiz JSON: {e}");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected_at_construction() {
        assert!(matches!(
            GeminiGateway::new(GeminiConfig::new("  ")),
            Err(GatewayError::Service(_))
        ));
        assert!(GeminiGateway::new(GeminiConfig::new("key")).is_ok());
    }

    #[test]
    fn url_targets_configured_model() {
        let mut config = GeminiConfig::new("key");
        config.api_base = "http://localhost:9000/v1beta".to_string();
        config.model = "gemini-test".to_string();
        let gateway = GeminiGateway::new(config).unwrap();
        assert_eq!(
            gateway.api_url(),
            "http://localhost:9000/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn chat_body_maps_roles_and_persona() {
        let history = vec![
            ChatMessage::user("What is inertia?"),
            ChatMessage::model("Resistance to change in motion."),
            ChatMessage::user("Example?"),
        ];
        let body = build_request_body(Some("be kind"), &history, None);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be kind");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "Example?");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn quiz_body_requests_json() {
        let body = build_request_body(None, &[ChatMessage::user("quiz me")], Some(quiz_schema()));
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
    }

    #[test]
    fn text_parts_are_concatenated() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello, " }, { "text": "student." }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(extract_text(&json).unwrap(), "Hello, student.");
    }

    #[test]
    fn missing_candidates_is_a_service_error() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(extract_text(&json), Err(GatewayError::Service(_))));

        let blocked = serde_json::json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        match extract_text(&blocked) {
            Err(GatewayError::Service(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
