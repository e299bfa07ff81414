use serde::{Deserialize, Serialize};

use super::{Epoch, PanelError};
use crate::gateway::{Difficulty, GatewayError, ModelGateway};

pub const SUMMARY_ERROR: &str = "Failed to generate summary. Please check your network connection or try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummarizeStatus {
    Idle,
    Loading { epoch: Epoch },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizePanel {
    difficulty: Difficulty,
    status: SummarizeStatus,
    summary: Option<String>,
    error: Option<String>,
    epoch: Epoch,
}

#[derive(Debug)]
pub enum SummarizeEvent {
    SetDifficulty(Difficulty),
    Submit(String),
    Reply {
        epoch: Epoch,
        outcome: Result<String, GatewayError>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum SummarizeOutcome {
    Unchanged,
    DifficultyChanged,
    Request(SummaryRequest),
    /// A summary or the error message is ready to show.
    Finished,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub epoch: Epoch,
    pub source: String,
    pub difficulty: Difficulty,
}

impl SummaryRequest {
    pub async fn run(self, gateway: &dyn ModelGateway) -> SummarizeEvent {
        let outcome = gateway.summarize(&self.source, self.difficulty).await;
        SummarizeEvent::Reply {
            epoch: self.epoch,
            outcome,
        }
    }
}

impl SummarizePanel {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            difficulty: Difficulty::default(),
            status: SummarizeStatus::Idle,
            summary: None,
            error: None,
            epoch,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn status(&self) -> SummarizeStatus {
        self.status
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn is_loading(&self) -> bool {
        matches!(self.status, SummarizeStatus::Loading { .. })
    }

    pub fn apply(&mut self, event: SummarizeEvent) -> Result<SummarizeOutcome, PanelError> {
        match event {
            SummarizeEvent::SetDifficulty(difficulty) => {
                if self.is_loading() {
                    return Err(PanelError::Busy);
                }
                self.difficulty = difficulty;
                Ok(SummarizeOutcome::DifficultyChanged)
            }
            SummarizeEvent::Submit(source) => {
                if source.trim().is_empty() {
                    return Ok(SummarizeOutcome::Unchanged);
                }
                if self.is_loading() {
                    return Err(PanelError::Busy);
                }

                self.epoch = self.epoch.next();
                self.status = SummarizeStatus::Loading { epoch: self.epoch };
                self.summary = None;
                self.error = None;

                Ok(SummarizeOutcome::Request(SummaryRequest {
                    epoch: self.epoch,
                    source,
                    difficulty: self.difficulty,
                }))
            }
            SummarizeEvent::Reply { epoch, outcome } => {
                if self.status != (SummarizeStatus::Loading { epoch }) {
                    return Ok(SummarizeOutcome::Stale);
                }

                match outcome {
                    Ok(summary) => self.summary = Some(summary),
                    Err(e) => {
                        log::warn!("Summary {} failed: {}", epoch, e);
                        self.error = Some(SUMMARY_ERROR.to_string());
                    }
                }
                self.status = SummarizeStatus::Idle;
                Ok(SummarizeOutcome::Finished)
            }
        }
    }
}
