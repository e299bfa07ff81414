pub mod chat;
pub mod quiz;
pub mod summarize;

use serde::{Deserialize, Serialize};

pub use chat::ChatPanel;
pub use quiz::QuizPanel;
pub use summarize::SummarizePanel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    #[error("still working on the previous request")]
    Busy,
    #[error("choose an answer first")]
    NotAnswered,
    #[error("there is no such option")]
    OptionOutOfRange,
    #[error("that action is not available right now")]
    WrongPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Chat,
    Summarize,
    Quiz,
}

impl PanelKind {
    pub const ALL: [PanelKind; 3] = [PanelKind::Chat, PanelKind::Summarize, PanelKind::Quiz];

    pub fn label(&self) -> &'static str {
        match self {
            PanelKind::Chat => "Chat Tutor",
            PanelKind::Summarize => "Note Summarizer",
            PanelKind::Quiz => "Quiz Generator",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label() == label.trim())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::gateway::{ChatSession, Difficulty, GatewayError, ModelGateway};
    use crate::quiz::QuizQuestion;

    /// Gateway that replays canned replies in order.
    #[derive(Default)]
    pub struct ScriptedGateway {
        pub turns: Mutex<VecDeque<Result<String, GatewayError>>>,
        pub summaries: Mutex<VecDeque<Result<String, GatewayError>>>,
        pub quizzes: Mutex<VecDeque<Result<Vec<QuizQuestion>, GatewayError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        pub fn with_turns(turns: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                ..Default::default()
            }
        }

        pub fn with_summaries(summaries: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                summaries: Mutex::new(summaries.into()),
                ..Default::default()
            }
        }

        pub fn with_quizzes(quizzes: Vec<Result<Vec<QuizQuestion>, GatewayError>>) -> Self {
            Self {
                quizzes: Mutex::new(quizzes.into()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn send_turn(&self, session: &mut ChatSession, text: &str) -> Result<String, GatewayError> {
            self.calls.lock().unwrap().push(format!("turn:{text}"));
            let reply = self
                .turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Service("script exhausted".into())))?;
            session.history.push(crate::gateway::ChatMessage::user(text));
            session.history.push(crate::gateway::ChatMessage::model(reply.clone()));
            Ok(reply)
        }

        async fn summarize(&self, source: &str, difficulty: Difficulty) -> Result<String, GatewayError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("summarize:{}:{source}", difficulty.label()));
            self.summaries
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Service("script exhausted".into())))
        }

        async fn generate_quiz(&self, source: &str, count: u8) -> Result<Vec<QuizQuestion>, GatewayError> {
            self.calls.lock().unwrap().push(format!("quiz:{count}:{source}"));
            self.quizzes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Service("script exhausted".into())))
        }
    }

    pub fn question(correct: usize) -> QuizQuestion {
        QuizQuestion::new(
            format!("Question with answer {correct}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
        )
    }
}
