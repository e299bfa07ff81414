use serde::{Deserialize, Serialize};

use super::{Epoch, PanelError};
use crate::gateway::{GatewayError, ModelGateway, MAX_QUIZ_QUESTIONS};
use crate::quiz::{Quiz, QuizQuestion};

pub const DEFAULT_QUESTION_COUNT: u8 = 5;
pub const EMPTY_QUIZ_ERROR: &str =
    "The AI could not generate a quiz from the provided text. Please try again with different content.";
pub const QUIZ_ERROR: &str =
    "An error occurred while generating the quiz. Please check your text or try again later.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizPhase {
    Config,
    Loading { epoch: Epoch },
    Active(Quiz),
    Results { quiz: Quiz, score: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPanel {
    source: String,
    question_count: u8,
    phase: QuizPhase,
    error: Option<String>,
    epoch: Epoch,
}

#[derive(Debug)]
pub enum QuizEvent {
    SetSource(String),
    SetQuestionCount(i64),
    Generate,
    Generated {
        epoch: Epoch,
        outcome: Result<Vec<QuizQuestion>, GatewayError>,
    },
    Select(usize),
    Next,
    Restart,
}

#[derive(Debug, PartialEq, Eq)]
pub enum QuizOutcome {
    Unchanged,
    Configured,
    Request(QuizRequest),
    /// Questions arrived and the first one is current.
    Started,
    /// Generation failed or came back empty; the panel is back in config.
    Failed,
    Selected,
    Advanced,
    Finished,
    Restarted,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub epoch: Epoch,
    pub source: String,
    pub question_count: u8,
}

impl QuizRequest {
    pub async fn run(self, gateway: &dyn ModelGateway) -> QuizEvent {
        let outcome = gateway.generate_quiz(&self.source, self.question_count).await;
        QuizEvent::Generated {
            epoch: self.epoch,
            outcome,
        }
    }
}

impl QuizPanel {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            source: String::new(),
            question_count: DEFAULT_QUESTION_COUNT,
            phase: QuizPhase::Config,
            error: None,
            epoch,
        }
    }

    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn question_count(&self) -> u8 {
        self.question_count
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn quiz(&self) -> Option<&Quiz> {
        match &self.phase {
            QuizPhase::Active(quiz) | QuizPhase::Results { quiz, .. } => Some(quiz),
            QuizPhase::Config | QuizPhase::Loading { .. } => None,
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        self.quiz().map(Quiz::questions).unwrap_or(&[])
    }

    pub fn answers(&self) -> &[Option<usize>] {
        self.quiz().map(Quiz::answers).unwrap_or(&[])
    }

    pub fn pointer(&self) -> usize {
        self.quiz().map(Quiz::current_index).unwrap_or(0)
    }

    pub fn score(&self) -> usize {
        match &self.phase {
            QuizPhase::Results { score, .. } => *score,
            _ => 0,
        }
    }

    pub fn apply(&mut self, event: QuizEvent) -> Result<QuizOutcome, PanelError> {
        match event {
            QuizEvent::SetSource(source) => {
                self.require_config()?;
                self.source = source;
                Ok(QuizOutcome::Configured)
            }
            QuizEvent::SetQuestionCount(count) => {
                self.require_config()?;
                self.question_count = count.clamp(1, MAX_QUIZ_QUESTIONS as i64) as u8;
                Ok(QuizOutcome::Configured)
            }
            QuizEvent::Generate => {
                self.require_config()?;
                if self.source.trim().is_empty() {
                    return Ok(QuizOutcome::Unchanged);
                }

                self.epoch = self.epoch.next();
                self.phase = QuizPhase::Loading { epoch: self.epoch };
                self.error = None;

                Ok(QuizOutcome::Request(QuizRequest {
                    epoch: self.epoch,
                    source: self.source.clone(),
                    question_count: self.question_count,
                }))
            }
            QuizEvent::Generated { epoch, outcome } => {
                if self.phase != (QuizPhase::Loading { epoch }) {
                    return Ok(QuizOutcome::Stale);
                }

                match outcome {
                    Ok(questions) if !questions.is_empty() => {
                        self.phase = QuizPhase::Active(Quiz::new(questions));
                        Ok(QuizOutcome::Started)
                    }
                    Ok(_) => {
                        self.fail(EMPTY_QUIZ_ERROR);
                        Ok(QuizOutcome::Failed)
                    }
                    Err(e) => {
                        log::warn!("Quiz generation {} failed: {}", epoch, e);
                        self.fail(QUIZ_ERROR);
                        Ok(QuizOutcome::Failed)
                    }
                }
            }
            QuizEvent::Select(option) => {
                let QuizPhase::Active(quiz) = &mut self.phase else {
                    return Err(PanelError::WrongPhase);
                };
                if !quiz.answer(option) {
                    return Err(PanelError::OptionOutOfRange);
                }
                Ok(QuizOutcome::Selected)
            }
            QuizEvent::Next => {
                let QuizPhase::Active(quiz) = &mut self.phase else {
                    return Err(PanelError::WrongPhase);
                };
                if quiz.current_answer().is_none() {
                    return Err(PanelError::NotAnswered);
                }
                if quiz.advance() {
                    return Ok(QuizOutcome::Advanced);
                }

                let quiz = std::mem::take(quiz);
                let score = quiz.score();
                self.phase = QuizPhase::Results { quiz, score };
                Ok(QuizOutcome::Finished)
            }
            QuizEvent::Restart => {
                self.restart();
                Ok(QuizOutcome::Restarted)
            }
        }
    }

    /// Drops any quiz or pending generation. Notes and question count stay.
    pub fn restart(&mut self) {
        self.epoch = self.epoch.next();
        self.phase = QuizPhase::Config;
        self.error = None;
    }

    fn require_config(&self) -> Result<(), PanelError> {
        match self.phase {
            QuizPhase::Config => Ok(()),
            QuizPhase::Loading { .. } => Err(PanelError::Busy),
            QuizPhase::Active(_) | QuizPhase::Results { .. } => Err(PanelError::WrongPhase),
        }
    }

    fn fail(&mut self, message: &str) {
        self.phase = QuizPhase::Config;
        self.error = Some(message.to_string());
    }
}
