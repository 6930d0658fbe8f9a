//! # Chat state machine
//! Pure conversation logic: negative-streak tracking, escalation and the turn log.
//! No I/O; classification and reply generation happen in `chat_service`.
//!
//! States: Listening (`escalated == false`) and Escalated (terminal until reset).
//! A Negative turn extends the streak, anything else zeroes it; reaching
//! `ESCALATION_THRESHOLD` consecutive Negatives escalates on that same turn.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sentiment::Sentiment;

/// Consecutive Negative turns that hand the conversation to a human.
pub const ESCALATION_THRESHOLD: u32 = 2;

pub const WELCOME_MESSAGE: &str = "Hi, I'm Sam from customer support! Ask me about shipping, returns, warranty, payment or order tracking. Type \"reset\" at any time to start over.";

pub const ESCALATION_MESSAGE: &str = "I'm really sorry this has been so frustrating. I'm handing you over to a human agent now. As an apology, here is 20% off your next order with code SORRY20. You can also reach our support team directly at 1-800-555-0199.";

pub const ESCALATED_STATUS: &str = "Escalated to human agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub sender: Sender,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            message: message.into(),
            status: None,
            at: Utc::now(),
        }
    }

    pub fn bot(message: impl Into<String>, status: Option<String>) -> Self {
        Self {
            sender: Sender::Bot,
            message: message.into(),
            status,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    pub negative_streak: u32,
    pub escalated: bool,
}

/// What the caller must do after a classified turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Still listening: generate a normal reply.
    Respond,
    /// Threshold reached on this turn: send the escalation message, no reply generation.
    Escalate,
}

impl ConversationState {
    /// Fold one classification into the streak.
    ///
    /// Callers must not feed turns once escalated; doing so is a no-op that
    /// reports `Escalate` again without touching the state.
    pub fn observe(&mut self, sentiment: Sentiment) -> Transition {
        if self.escalated {
            return Transition::Escalate;
        }
        if sentiment == Sentiment::Negative {
            self.negative_streak = self.negative_streak.saturating_add(1);
        } else {
            self.negative_streak = 0;
        }
        if self.negative_streak >= ESCALATION_THRESHOLD {
            self.escalated = true;
            Transition::Escalate
        } else {
            Transition::Respond
        }
    }
}

/// `clear` / `reset`, any case, surrounding whitespace ignored.
pub fn is_reset_command(text: &str) -> bool {
    let t = text.trim();
    t.eq_ignore_ascii_case("clear") || t.eq_ignore_ascii_case("reset")
}

pub fn sentiment_status(sentiment: Sentiment) -> String {
    format!("Detected sentiment: {sentiment}")
}

/// One conversation: state plus the ordered turn log, seeded with the welcome turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    state: ConversationState,
    turns: Vec<ChatTurn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            state: ConversationState::default(),
            turns: vec![ChatTurn::bot(WELCOME_MESSAGE, None)],
        }
    }

    /// Back to Listening, streak 0, log replaced by the welcome turn.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn is_escalated(&self) -> bool {
        self.state.escalated
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Record the user's classified message and advance the state machine.
    /// On escalation the escalation bot turn is appended here; on `Respond`
    /// the caller appends the generated reply via [`Conversation::push_reply`].
    pub fn accept(&mut self, text: &str, sentiment: Sentiment) -> Transition {
        self.turns.push(ChatTurn::user(text));
        let t = self.state.observe(sentiment);
        if t == Transition::Escalate {
            self.turns
                .push(ChatTurn::bot(ESCALATION_MESSAGE, Some(ESCALATED_STATUS.to_string())));
        }
        t
    }

    pub fn push_reply(&mut self, reply: impl Into<String>, sentiment: Sentiment) {
        self.turns
            .push(ChatTurn::bot(reply, Some(sentiment_status(sentiment))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Sentiment::*;

    fn streaks(seq: &[Sentiment]) -> (Vec<u32>, ConversationState) {
        let mut st = ConversationState::default();
        let mut out = Vec::new();
        for s in seq {
            st.observe(*s);
            out.push(st.negative_streak);
        }
        (out, st)
    }

    #[test]
    fn second_consecutive_negative_escalates() {
        let mut st = ConversationState::default();
        assert_eq!(st.observe(Negative), Transition::Respond);
        assert!(!st.escalated);
        assert_eq!(st.observe(Negative), Transition::Escalate);
        assert!(st.escalated);
        assert_eq!(st.negative_streak, 2);
    }

    #[test]
    fn interrupted_negatives_do_not_escalate() {
        let (s, st) = streaks(&[Negative, Neutral, Negative]);
        assert_eq!(s, [1, 0, 1]);
        assert!(!st.escalated);

        let (s, st) = streaks(&[Negative, Positive, Negative, Positive]);
        assert_eq!(s, [1, 0, 1, 0]);
        assert!(!st.escalated);
    }

    #[test]
    fn escalated_state_is_frozen() {
        let mut st = ConversationState {
            negative_streak: 2,
            escalated: true,
        };
        assert_eq!(st.observe(Positive), Transition::Escalate);
        assert_eq!(st.negative_streak, 2);
        assert!(st.escalated);
    }

    #[test]
    fn reset_command_matching() {
        for yes in ["clear", "RESET", "  Clear\n", "\treset "] {
            assert!(is_reset_command(yes), "{yes:?}");
        }
        for no in ["reset please", "cleared", "", "re set"] {
            assert!(!is_reset_command(no), "{no:?}");
        }
    }

    #[test]
    fn accept_logs_user_then_escalation() {
        let mut c = Conversation::new();
        assert_eq!(c.accept("broken again", Negative), Transition::Respond);
        c.push_reply("sorry", Negative);
        assert_eq!(c.accept("still broken", Negative), Transition::Escalate);

        let senders: Vec<_> = c.turns().iter().map(|t| t.sender).collect();
        assert_eq!(
            senders,
            [Sender::Bot, Sender::User, Sender::Bot, Sender::User, Sender::Bot]
        );
        let last = c.turns().last().unwrap();
        assert_eq!(last.message, ESCALATION_MESSAGE);
        assert_eq!(last.status.as_deref(), Some(ESCALATED_STATUS));
        assert_eq!(c.turns()[2].status.as_deref(), Some("Detected sentiment: Negative"));
    }

    #[test]
    fn reset_reseeds_welcome() {
        let mut c = Conversation::new();
        c.accept("awful", Negative);
        c.accept("awful", Negative);
        assert!(c.is_escalated());
        c.reset();
        assert_eq!(c.state(), ConversationState::default());
        assert_eq!(c.turns().len(), 1);
        assert_eq!(c.turns()[0].message, WELCOME_MESSAGE);
    }
}
