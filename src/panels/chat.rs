use serde::{Deserialize, Serialize};

use super::{Epoch, PanelError};
use crate::gateway::{ChatMessage, ChatSession, GatewayError, ModelGateway};

pub const GREETING: &str = "Hello! I am your AI Study Buddy. How can I help you with Physics, Chemistry, Math, or Literature today?";
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. This could be due to a misconfigured API key or a network issue. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatStatus {
    Idle,
    AwaitingResponse { epoch: Epoch },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPanel {
    session: ChatSession,
    messages: Vec<ChatMessage>,
    status: ChatStatus,
    epoch: Epoch,
}

#[derive(Debug)]
pub enum ChatEvent {
    Submit(String),
    Reply {
        epoch: Epoch,
        session: ChatSession,
        outcome: Result<String, GatewayError>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Nothing to do, e.g. blank input.
    Unchanged,
    /// The caller must run this turn and feed the reply back.
    Request(TurnRequest),
    /// A model message (reply or fallback) was appended.
    Answered,
    /// A reply for an older epoch was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub epoch: Epoch,
    pub session: ChatSession,
    pub text: String,
}

impl TurnRequest {
    pub async fn run(mut self, gateway: &dyn ModelGateway) -> ChatEvent {
        let outcome = gateway.send_turn(&mut self.session, &self.text).await;
        ChatEvent::Reply {
            epoch: self.epoch,
            session: self.session,
            outcome,
        }
    }
}

impl ChatPanel {
    /// Opens a fresh conversation seeded with the greeting.
    pub fn open(gateway: &dyn ModelGateway, epoch: Epoch) -> Self {
        Self {
            session: gateway.start_chat_session(),
            messages: vec![ChatMessage::model(GREETING)],
            status: ChatStatus::Idle,
            epoch,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn apply(&mut self, event: ChatEvent) -> Result<ChatOutcome, PanelError> {
        match event {
            ChatEvent::Submit(text) => {
                if text.trim().is_empty() {
                    return Ok(ChatOutcome::Unchanged);
                }
                if let ChatStatus::AwaitingResponse { .. } = self.status {
                    return Err(PanelError::Busy);
                }

                self.messages.push(ChatMessage::user(text.clone()));
                self.epoch = self.epoch.next();
                self.status = ChatStatus::AwaitingResponse { epoch: self.epoch };

                Ok(ChatOutcome::Request(TurnRequest {
                    epoch: self.epoch,
                    session: self.session.clone(),
                    text,
                }))
            }
            ChatEvent::Reply {
                epoch,
                session,
                outcome,
            } => {
                if self.status != (ChatStatus::AwaitingResponse { epoch }) {
                    return Ok(ChatOutcome::Stale);
                }

                let content = match outcome {
                    Ok(reply) => reply,
                    Err(e) => {
                        log::warn!("Chat turn {} failed: {}", epoch, e);
                        FALLBACK_REPLY.to_string()
                    }
                };
                self.session = session;
                self.messages.push(ChatMessage::model(content));
                self.status = ChatStatus::Idle;
                Ok(ChatOutcome::Answered)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChatRole;
    use crate::panels::testing::ScriptedGateway;

    async fn turn(panel: &mut ChatPanel, gateway: &ScriptedGateway, text: &str) {
        let request = match panel.apply(ChatEvent::Submit(text.to_string())).unwrap() {
            ChatOutcome::Request(r) => r,
            other => panic!("expected a request, got {other:?}"),
        };
        let reply = request.run(gateway).await;
        assert_eq!(panel.apply(reply).unwrap(), ChatOutcome::Answered);
    }

    #[tokio::test]
    async fn turns_append_in_order() {
        let gateway = ScriptedGateway::with_turns(vec![Ok("m1".into()), Ok("m2".into())]);
        let mut panel = ChatPanel::open(&gateway, Epoch::default());

        turn(&mut panel, &gateway, "u1").await;
        turn(&mut panel, &gateway, "u2").await;

        let contents: Vec<_> = panel.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![GREETING, "u1", "m1", "u2", "m2"]);
        let roles: Vec<_> = panel.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::Model, ChatRole::User, ChatRole::Model, ChatRole::User, ChatRole::Model]
        );
        assert_eq!(panel.status(), ChatStatus::Idle);
        // The greeting is display-only and never sent to the model.
        assert_eq!(panel.session.history.len(), 4);
    }

    #[tokio::test]
    async fn failure_appends_fallback_and_recovers() {
        let gateway = ScriptedGateway::with_turns(vec![
            Err(GatewayError::Service("HTTP 403: key invalid".into())),
            Ok("fine now".into()),
        ]);
        let mut panel = ChatPanel::open(&gateway, Epoch::default());

        turn(&mut panel, &gateway, "hello").await;
        assert_eq!(panel.last_message().unwrap().content, FALLBACK_REPLY);
        assert!(panel.session.history.is_empty());

        turn(&mut panel, &gateway, "again").await;
        assert_eq!(panel.last_message().unwrap().content, "fine now");
    }

    #[test]
    fn second_submission_is_rejected_while_waiting() {
        let gateway = ScriptedGateway::default();
        let mut panel = ChatPanel::open(&gateway, Epoch::default());

        assert!(matches!(
            panel.apply(ChatEvent::Submit("first".into())),
            Ok(ChatOutcome::Request(_))
        ));
        assert_eq!(panel.apply(ChatEvent::Submit("second".into())), Err(PanelError::Busy));
        assert_eq!(panel.messages().len(), 2);
    }

    #[test]
    fn blank_input_is_ignored() {
        let gateway = ScriptedGateway::default();
        let mut panel = ChatPanel::open(&gateway, Epoch::default());
        let before = panel.clone();

        assert_eq!(panel.apply(ChatEvent::Submit("   ".into())), Ok(ChatOutcome::Unchanged));
        assert_eq!(panel, before);
    }

    #[test]
    fn stale_reply_is_dropped() {
        let gateway = ScriptedGateway::default();
        let mut panel = ChatPanel::open(&gateway, Epoch::default());
        let old_epoch = panel.epoch();

        panel.apply(ChatEvent::Submit("question".into())).unwrap();
        let before = panel.clone();

        let outcome = panel
            .apply(ChatEvent::Reply {
                epoch: old_epoch,
                session: ChatSession::new("other"),
                outcome: Ok("late".into()),
            })
            .unwrap();
        assert_eq!(outcome, ChatOutcome::Stale);
        assert_eq!(panel, before);
    }
}
