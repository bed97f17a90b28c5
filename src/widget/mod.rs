//! State machines behind the chat and voice widgets.
//!
//! Each widget instance owns its state outright; nothing is shared between instances
//! and nothing survives a remount (a fresh panel always starts closed with the welcome
//! message).

pub mod voice;

use std::fmt;

use crate::models::chat::ChatMessage;

pub const DEFAULT_WELCOME: &str = "Hi! How can we help your business today?";
pub const REPLY_FAILED: &str =
    "Sorry, I couldn't reach our assistant just now. Please try again in a moment.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    EmptyInput,
    NotOpen,
    AwaitingReply,
    InvalidTransition {
        from: String,
        event: String,
    },
}

impl fmt::Display for WidgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetError::EmptyInput => write!(f, "message is empty"),
            WidgetError::NotOpen => write!(f, "panel is not open"),
            WidgetError::AwaitingReply => write!(f, "still waiting for the previous reply"),
            WidgetError::InvalidTransition { from, event } =>
                write!(f, "cannot handle {} while {}", event, from),
        }
    }
}

impl std::error::Error for WidgetError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Closed,
    Open,
    WaitingForReply,
}

/// What happened to a reply that arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Appended,
    /// The panel was closed (or never asked) before the reply arrived.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct ChatPanel {
    state: PanelState,
    messages: Vec<ChatMessage>,
    input: String,
    /// Set while a request is in flight; cleared when its reply lands or is discarded.
    pending: bool,
}

impl ChatPanel {
    pub fn new(welcome: impl Into<String>) -> Self {
        Self {
            state: PanelState::Closed,
            messages: vec![ChatMessage::assistant(welcome)],
            input: String::new(),
            pending: false,
        }
    }

    /// Rebuilds an open panel around an existing transcript.
    pub fn resume(messages: Vec<ChatMessage>, welcome: impl Into<String>) -> Self {
        let mut panel = Self::new(welcome);
        if !messages.is_empty() {
            panel.messages = messages;
        }
        panel.state = PanelState::Open;
        panel
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn open(&mut self) {
        if self.state == PanelState::Closed {
            self.state = if self.pending { PanelState::WaitingForReply } else { PanelState::Open };
        }
    }

    /// Closing does not cancel an in-flight request; its reply is dropped on arrival.
    pub fn close(&mut self) {
        self.state = PanelState::Closed;
    }

    pub fn toggle(&mut self) {
        match self.state {
            PanelState::Closed => self.open(),
            _ => self.close(),
        }
    }

    /// Appends the user's turn and moves to `WaitingForReply`.
    pub fn send(&mut self, text: &str) -> Result<&[ChatMessage], WidgetError> {
        match self.state {
            PanelState::Closed => {
                return Err(WidgetError::NotOpen);
            }
            PanelState::WaitingForReply => {
                return Err(WidgetError::AwaitingReply);
            }
            PanelState::Open => {}
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(WidgetError::EmptyInput);
        }
        self.messages.push(ChatMessage::user(text));
        self.input.clear();
        self.pending = true;
        self.state = PanelState::WaitingForReply;
        Ok(&self.messages)
    }

    /// Sends whatever is in the input box.
    pub fn submit(&mut self) -> Result<&[ChatMessage], WidgetError> {
        let text = std::mem::take(&mut self.input);
        self.send(&text)
    }

    pub fn receive_reply(&mut self, text: impl Into<String>) -> ReplyOutcome {
        if !self.pending || self.state == PanelState::Closed {
            self.pending = false;
            return ReplyOutcome::Discarded;
        }
        self.pending = false;
        self.messages.push(ChatMessage::assistant(text));
        self.state = PanelState::Open;
        ReplyOutcome::Appended
    }

    /// Replaces the missing reply with an apology and reopens the input.
    pub fn fail(&mut self, apology: impl Into<String>) -> ReplyOutcome {
        self.receive_reply(apology)
    }
}

impl Default for ChatPanel {
    fn default() -> Self {
        Self::new(DEFAULT_WELCOME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;

    #[test]
    fn mounts_closed_with_welcome() {
        let panel = ChatPanel::default();
        assert_eq!(panel.state(), PanelState::Closed);
        assert_eq!(panel.messages().len(), 1);
        assert_eq!(panel.messages()[0].role, Role::Assistant);
    }

    #[test]
    fn send_and_reply_round_trip() {
        let mut panel = ChatPanel::default();
        panel.open();
        panel.send("Hi").unwrap();
        assert_eq!(panel.state(), PanelState::WaitingForReply);
        assert_eq!(panel.receive_reply("Hello!"), ReplyOutcome::Appended);
        assert_eq!(panel.state(), PanelState::Open);
        assert_eq!(panel.messages().len(), 3);
    }

    #[test]
    fn cannot_send_while_closed_waiting_or_blank() {
        let mut panel = ChatPanel::default();
        assert_eq!(panel.send("Hi").unwrap_err(), WidgetError::NotOpen);
        panel.open();
        assert_eq!(panel.send("   ").unwrap_err(), WidgetError::EmptyInput);
        panel.send("Hi").unwrap();
        assert_eq!(panel.send("Again").unwrap_err(), WidgetError::AwaitingReply);
    }

    #[test]
    fn reply_after_close_is_discarded() {
        let mut panel = ChatPanel::default();
        panel.open();
        panel.send("Hi").unwrap();
        panel.close();
        assert_eq!(panel.receive_reply("late"), ReplyOutcome::Discarded);
        assert_eq!(panel.messages().len(), 2);
        panel.open();
        assert_eq!(panel.state(), PanelState::Open);
    }

    #[test]
    fn reopening_while_pending_keeps_waiting() {
        let mut panel = ChatPanel::default();
        panel.open();
        panel.send("Hi").unwrap();
        panel.toggle();
        panel.toggle();
        assert_eq!(panel.state(), PanelState::WaitingForReply);
    }

    #[test]
    fn failure_appends_apology() {
        let mut panel = ChatPanel::default();
        panel.open();
        panel.set_input("Hi");
        panel.submit().unwrap();
        assert!(panel.input().is_empty());
        panel.fail(REPLY_FAILED);
        assert_eq!(panel.messages().last().unwrap().content, REPLY_FAILED);
        assert_eq!(panel.state(), PanelState::Open);
    }

    #[test]
    fn resume_opens_with_history() {
        let panel = ChatPanel::resume(vec![ChatMessage::user("Hi")], DEFAULT_WELCOME);
        assert_eq!(panel.state(), PanelState::Open);
        assert_eq!(panel.messages().len(), 1);
    }
}
