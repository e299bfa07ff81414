use serde::{Deserialize, Serialize};

use crate::gateway::ModelGateway;
use crate::panels::quiz::{QuizEvent, QuizPhase};
use crate::panels::{ChatPanel, Epoch, PanelKind, QuizPanel, SummarizePanel};
use crate::render::{self, Screen};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum State {
    #[default]
    Start,
    Dashboard {
        epoch: Epoch,
    },
    Chat(ChatPanel),
    Summarize(SummarizePanel),
    Quiz(QuizPanel),
}

impl State {
    /// Latest epoch handed out in this dialogue. New panels start above it so
    /// replies addressed to a closed panel can never match the next one.
    pub fn epoch(&self) -> Epoch {
        match self {
            State::Start => Epoch::default(),
            State::Dashboard { epoch } => *epoch,
            State::Chat(panel) => panel.epoch(),
            State::Summarize(panel) => panel.epoch(),
            State::Quiz(panel) => panel.epoch(),
        }
    }

    pub fn open(&self, kind: PanelKind, gateway: &dyn ModelGateway) -> State {
        let epoch = self.epoch().next();
        match kind {
            PanelKind::Chat => State::Chat(ChatPanel::open(gateway, epoch)),
            PanelKind::Summarize => State::Summarize(SummarizePanel::new(epoch)),
            PanelKind::Quiz => State::Quiz(QuizPanel::new(epoch)),
        }
    }

    pub fn dashboard(&self) -> State {
        State::Dashboard {
            epoch: self.epoch().next(),
        }
    }

    /// Starts the open panel over. The quiz keeps its notes; other panels are
    /// reopened fresh. Either way a pending request becomes stale.
    pub fn restart(&self, gateway: &dyn ModelGateway) -> State {
        match self {
            State::Quiz(panel) => {
                let mut panel = panel.clone();
                panel.restart();
                State::Quiz(panel)
            }
            _ => match self.kind() {
                Some(kind) => self.open(kind, gateway),
                None => self.dashboard(),
            },
        }
    }

    pub fn kind(&self) -> Option<PanelKind> {
        match self {
            State::Chat(_) => Some(PanelKind::Chat),
            State::Summarize(_) => Some(PanelKind::Summarize),
            State::Quiz(_) => Some(PanelKind::Quiz),
            State::Start | State::Dashboard { .. } => None,
        }
    }

    pub fn screen(&self) -> Screen {
        match self {
            State::Start | State::Dashboard { .. } => render::dashboard(),
            State::Chat(panel) => render::chat_opened(panel),
            State::Summarize(panel) => render::summarize_opened(panel),
            State::Quiz(panel) => render::quiz(panel),
        }
    }
}

/// Maps a key press or typed text to the quiz event it stands for.
pub fn quiz_event(panel: &QuizPanel, text: &str) -> QuizEvent {
    let text = text.trim();
    match panel.phase() {
        QuizPhase::Config if text == render::GENERATE_BUTTON => QuizEvent::Generate,
        QuizPhase::Config => match render::parse_question_count_button(text) {
            Some(count) => QuizEvent::SetQuestionCount(count),
            None => QuizEvent::SetSource(text.to_string()),
        },
        QuizPhase::Loading { .. } => QuizEvent::Generate,
        QuizPhase::Active(_) if text == render::NEXT_BUTTON || text == render::FINISH_BUTTON => QuizEvent::Next,
        // Anything that is not a letter is out of range.
        QuizPhase::Active(_) => QuizEvent::Select(render::parse_option_letter(text).unwrap_or(usize::MAX)),
        QuizPhase::Results { .. } if text == render::RESTART_BUTTON => QuizEvent::Restart,
        QuizPhase::Results { .. } => QuizEvent::Next,
    }
}
