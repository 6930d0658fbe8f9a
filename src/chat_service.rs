//! Chat orchestration: session lookup, classification, state transition, reply.
//!
//! Each session is an `Arc<tokio::sync::Mutex<Conversation>>` held for the whole
//! turn, so one session's turns are applied strictly in order even while the
//! responder call is in flight. Different sessions never block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::chat::{is_reset_command, ChatTurn, Conversation, ConversationState, Transition};
use crate::knowledge::KnowledgeBase;
use crate::logging::anon_hash;
use crate::metrics::{CHAT_ESCALATIONS_TOTAL, CHAT_RESETS_TOTAL, CHAT_TURNS_TOTAL};
use crate::responder::SafeResponder;
use crate::sentiment::{Classifier, ClassifierError, Prediction};

pub const DEFAULT_SESSION: &str = "default";
/// Upper bound on live sessions. Beyond it the least recently used idle,
/// non-escalated session is dropped; if none qualifies the new session is refused.
pub const MAX_SESSIONS: usize = 1024;
const MAX_SESSION_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("session id must be 1-64 characters of letters, digits, '-' or '_'")]
    InvalidSession,
    #[error("too many active chat sessions")]
    SessionLimit,
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Reset command: state and log were re-seeded.
    Reset,
    /// Conversation already escalated; input dropped without classification.
    Ignored,
    /// This turn reached the streak threshold.
    Escalated { prediction: Prediction },
    /// Normal turn answered by the responder (or its fallback).
    Replied { prediction: Prediction, reply: String },
}

impl TurnOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Reset => "reset",
            TurnOutcome::Ignored => "ignored",
            TurnOutcome::Escalated { .. } => "escalated",
            TurnOutcome::Replied { .. } => "replied",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub state: ConversationState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSnapshot {
    pub session: String,
    pub state: ConversationState,
    pub turns: Vec<ChatTurn>,
}

impl ChatSnapshot {
    fn of(session: String, conv: &Conversation) -> Self {
        Self {
            session,
            state: conv.state(),
            turns: conv.turns().to_vec(),
        }
    }
}

struct SessionSlot {
    conv: Arc<AsyncMutex<Conversation>>,
    touched: Instant,
}

impl SessionSlot {
    fn fresh() -> Self {
        Self {
            conv: Arc::new(AsyncMutex::new(Conversation::new())),
            touched: Instant::now(),
        }
    }

    /// Nobody else holds a handle (no turn or read in flight) and the
    /// conversation is not escalated.
    fn is_evictable(&self) -> bool {
        Arc::strong_count(&self.conv) == 1
            && self
                .conv
                .try_lock()
                .map(|c| !c.is_escalated())
                .unwrap_or(false)
    }
}

pub struct ChatService {
    classifier: Arc<dyn Classifier>,
    responder: SafeResponder,
    kb: Arc<KnowledgeBase>,
    sessions: Mutex<HashMap<String, SessionSlot>>,
}

impl ChatService {
    /// Starts with the default session already seeded.
    pub fn new(classifier: Arc<dyn Classifier>, responder: SafeResponder, kb: Arc<KnowledgeBase>) -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(DEFAULT_SESSION.to_string(), SessionSlot::fresh());
        Self {
            classifier,
            responder,
            kb,
            sessions: Mutex::new(sessions),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session map poisoned").len()
    }

    /// Read-only lookup; never creates or touches a session.
    fn existing(&self, id: &str) -> Option<Arc<AsyncMutex<Conversation>>> {
        let map = self.sessions.lock().expect("session map poisoned");
        map.get(id).map(|slot| slot.conv.clone())
    }

    /// Get or create the session a turn is applied to.
    fn open(&self, id: &str) -> Result<Arc<AsyncMutex<Conversation>>, ChatError> {
        let mut map = self.sessions.lock().expect("session map poisoned");
        if let Some(slot) = map.get_mut(id) {
            slot.touched = Instant::now();
            return Ok(slot.conv.clone());
        }

        if map.len() >= MAX_SESSIONS {
            let victim = map
                .iter()
                .filter(|(k, slot)| k.as_str() != DEFAULT_SESSION && slot.is_evictable())
                .min_by_key(|(_, slot)| slot.touched)
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => {
                    debug!(session = %k, "evicting least recently used chat session");
                    map.remove(&k);
                }
                None => {
                    warn!(sessions = map.len(), "chat session limit reached, nothing evictable");
                    return Err(ChatError::SessionLimit);
                }
            }
        }

        let slot = SessionSlot::fresh();
        let conv = slot.conv.clone();
        map.insert(id.to_string(), slot);
        Ok(conv)
    }

    /// Advance one conversation by a user message.
    ///
    /// A classifier error leaves the conversation exactly as it was.
    pub async fn submit(&self, session: Option<&str>, text: &str) -> Result<TurnReport, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let sid = session_key(session)?;
        let slot = self.open(&sid)?;
        let mut conv = slot.lock().await;

        if is_reset_command(text) {
            conv.reset();
            counter!(CHAT_RESETS_TOTAL).increment(1);
            info!(session = %sid, "conversation reset");
            return Ok(TurnReport {
                outcome: TurnOutcome::Reset,
                state: conv.state(),
            });
        }

        if conv.is_escalated() {
            debug!(session = %sid, id = %anon_hash(text), "escalated conversation, input ignored");
            return Ok(TurnReport {
                outcome: TurnOutcome::Ignored,
                state: conv.state(),
            });
        }

        let prediction = self.classifier.classify(text).await?;
        counter!(CHAT_TURNS_TOTAL).increment(1);

        let outcome = match conv.accept(text, prediction.sentiment) {
            Transition::Escalate => {
                counter!(CHAT_ESCALATIONS_TOTAL).increment(1);
                info!(
                    session = %sid,
                    streak = conv.state().negative_streak,
                    "negative streak reached threshold, escalated to human agent"
                );
                TurnOutcome::Escalated { prediction }
            }
            Transition::Respond => {
                let reply = self
                    .responder
                    .reply(text, prediction.sentiment, &self.kb)
                    .await;
                conv.push_reply(reply.clone(), prediction.sentiment);
                TurnOutcome::Replied { prediction, reply }
            }
        };

        debug!(
            session = %sid,
            id = %anon_hash(text),
            sentiment = %prediction.sentiment,
            streak = conv.state().negative_streak,
            "chat turn processed"
        );
        Ok(TurnReport {
            outcome,
            state: conv.state(),
        })
    }

    /// Current view of a session. An unknown id reads as a fresh conversation
    /// without being stored.
    pub async fn snapshot(&self, session: Option<&str>) -> Result<ChatSnapshot, ChatError> {
        let sid = session_key(session)?;
        Ok(match self.existing(&sid) {
            Some(slot) => {
                let conv = slot.lock().await;
                ChatSnapshot::of(sid, &conv)
            }
            None => ChatSnapshot::of(sid, &Conversation::new()),
        })
    }

    pub async fn state(&self, session: Option<&str>) -> Result<ConversationState, ChatError> {
        let sid = session_key(session)?;
        Ok(match self.existing(&sid) {
            Some(slot) => slot.lock().await.state(),
            None => ConversationState::default(),
        })
    }
}

/// Absent or blank ids select the shared default session; anything outside
/// `[A-Za-z0-9_-]{1,64}` is rejected.
pub fn session_key(raw: Option<&str>) -> Result<String, ChatError> {
    let id = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_SESSION.to_string()),
        Some(id) => id,
    };
    let valid = id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id.to_string())
    } else {
        Err(ChatError::InvalidSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{CannedResponder, SafeResponder};
    use crate::sentiment::ScriptedClassifier;

    #[test]
    fn session_ids_are_validated() {
        assert_eq!(session_key(None).unwrap(), DEFAULT_SESSION);
        assert_eq!(session_key(Some("  ")).unwrap(), DEFAULT_SESSION);
        assert_eq!(session_key(Some(" abc-123_x ")).unwrap(), "abc-123_x");
        assert!(matches!(session_key(Some("../etc")), Err(ChatError::InvalidSession)));
        assert!(matches!(session_key(Some("a@b")), Err(ChatError::InvalidSession)));
        assert!(matches!(session_key(Some(&"a".repeat(65))), Err(ChatError::InvalidSession)));
        assert_eq!(session_key(Some(&"a".repeat(64))).unwrap().len(), 64);
    }

    #[tokio::test]
    async fn held_handle_is_not_evicted() {
        let svc = ChatService::new(
            Arc::new(ScriptedClassifier::new(std::iter::empty())),
            SafeResponder::new(Arc::new(CannedResponder)),
            Arc::new(KnowledgeBase::default()),
        );
        let held = svc.open("busy").unwrap();
        {
            let map = svc.sessions.lock().unwrap();
            assert!(!map["busy"].is_evictable());
        }
        drop(held);
        let map = svc.sessions.lock().unwrap();
        assert!(map["busy"].is_evictable());
    }
}
