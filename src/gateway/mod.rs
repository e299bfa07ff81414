pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::quiz::QuizQuestion;

pub use gemini::{GeminiConfig, GeminiGateway};

pub const TUTOR_PERSONA: &str = "You are a helpful and friendly academic tutor for students. Explain concepts clearly and concisely. Format your answers using markdown.";

pub const MAX_QUIZ_QUESTIONS: u8 = 10;
pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Network, auth, quota or any other upstream failure.
    #[error("service error: {0}")]
    Service(String),
    /// The structured reply did not match the quiz schema.
    #[error("format error: {0}")]
    Format(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// Conversational context handed back to the gateway on every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub system_instruction: String,
    pub history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Basic,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Basic, Difficulty::Intermediate, Difficulty::Advanced];

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Basic => "Basic",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(label.trim()))
    }
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Opens a tutoring conversation. No request is made until the first turn.
    fn start_chat_session(&self) -> ChatSession {
        ChatSession::new(TUTOR_PERSONA)
    }

    /// Sends `text` as the next user turn. The user and model turns are
    /// committed to `session` only when the call succeeds.
    async fn send_turn(&self, session: &mut ChatSession, text: &str) -> Result<String, GatewayError>;

    async fn summarize(&self, source: &str, difficulty: Difficulty) -> Result<String, GatewayError>;

    async fn generate_quiz(&self, source: &str, count: u8) -> Result<Vec<QuizQuestion>, GatewayError>;
}

pub fn summary_prompt(source: &str, difficulty: Difficulty) -> String {
    format!(
        "Summarize the following text at a {} level. Focus on the key concepts and present them clearly.\n\nText to summarize:\n---\n{}\n---\n",
        difficulty.label(),
        source
    )
}

pub fn quiz_prompt(source: &str, count: u8) -> String {
    format!(
        "Based on the following text, generate a multiple-choice quiz with {} questions. Each question should have {} options.\n\nText:\n---\n{}\n---\n",
        count, OPTIONS_PER_QUESTION, source
    )
}

/// JSON schema the quiz reply is constrained to.
pub fn quiz_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": {
                    "type": "STRING",
                    "description": "The quiz question."
                },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "An array of 4 possible answers."
                },
                "correctAnswerIndex": {
                    "type": "INTEGER",
                    "description": "The 0-based index of the correct answer in the options array."
                }
            },
            "required": ["question", "options", "correctAnswerIndex"]
        }
    })
}

/// Parses and validates the model's quiz reply. An empty array is valid.
pub fn parse_quiz_reply(reply: &str) -> Result<Vec<QuizQuestion>, GatewayError> {
    let json = strip_code_fence(reply.trim());

    let questions: Vec<QuizQuestion> =
        serde_json::from_str(json).map_err(|e| GatewayError::Format(e.to_string()))?;

    for (i, q) in questions.iter().enumerate() {
        if q.options.len() != OPTIONS_PER_QUESTION {
            return Err(GatewayError::Format(format!(
                "question {} has {} options",
                i + 1,
                q.options.len()
            )));
        }
        if q.correct_answer_index >= q.options.len() {
            return Err(GatewayError::Format(format!(
                "question {} points at option {}",
                i + 1,
                q.correct_answer_index
            )));
        }
    }

    Ok(questions)
}

// Models occasionally wrap JSON in a markdown fence even when asked for JSON.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
