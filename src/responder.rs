//! Responder: provider abstraction for sentiment-aware support replies.
//!
//! Providers return `Result`; callers in the chat flow go through
//! [`SafeResponder`], which turns every failure into [`FALLBACK_REPLY`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::knowledge::KnowledgeBase;
use crate::logging::anon_hash;
use crate::metrics::{RESPONDER_DURATION_MS, RESPONDER_FAILURES_TOTAL};
use crate::sentiment::Sentiment;

/// Shown to the user whenever the provider call fails for any reason.
pub const FALLBACK_REPLY: &str =
    "I'm having a little trouble connecting right now. Please try again in a moment.";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("undecodable provider response: {0}")]
    Malformed(String),
    #[error("provider returned no text")]
    Empty,
    #[error("{0}")]
    Unavailable(String),
}

/// Produces one natural-language reply for a user message.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(
        &self,
        text: &str,
        sentiment: Sentiment,
        kb: &KnowledgeBase,
    ) -> Result<String, ResponderError>;

    /// Provider name for diagnostics and metric labels.
    fn provider_name(&self) -> &'static str;
}

pub type DynResponder = Arc<dyn Responder>;

/// Support-persona prompt: user message, detected sentiment and the knowledge context.
pub fn build_prompt(text: &str, sentiment: Sentiment, kb: &KnowledgeBase) -> String {
    format!(
        r#"You are "Sam", an empathetic customer support assistant for an online store. Give helpful answers while looking after the customer's mood.

Customer message: "{text}"
Detected sentiment: {sentiment}

Knowledge base:
{context}

Instructions:
- Negative sentiment: be extra apologetic and reassuring before answering.
- Positive sentiment: be cheerful and encouraging.
- Neutral sentiment: be straightforward and helpful.
- Answer from the knowledge base. If the question is not covered, say politely which topics you can help with.
- Keep it concise. Do not mention that you are an AI and do not talk about sentiment analysis."#,
        context = kb.context(),
    )
}

// ------------------------------------------------------------
// Gemini
// ------------------------------------------------------------

/// Gemini `generateContent` REST provider.
pub struct GeminiResponder {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateReq {
    contents: Vec<GenContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenConfig,
}

#[derive(Serialize, Deserialize)]
struct GenContent {
    #[serde(default)]
    parts: Vec<GenPart>,
}

#[derive(Serialize, Deserialize)]
struct GenPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<GenContent>,
}

impl GeminiResponder {
    pub fn new(api_key: String, model: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("review-sentiment-desk/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or(DEFAULT_GEMINI_MODEL).to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point at a gateway or proxy instead of the public endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl Responder for GeminiResponder {
    async fn respond(
        &self,
        text: &str,
        sentiment: Sentiment,
        kb: &KnowledgeBase,
    ) -> Result<String, ResponderError> {
        if self.api_key.is_empty() {
            return Err(ResponderError::Unavailable("missing Gemini API key".into()));
        }

        let req = GenerateReq {
            contents: vec![GenContent {
                parts: vec![GenPart {
                    text: build_prompt(text, sentiment, kb),
                }],
            }],
            generation_config: GenConfig {
                temperature: 0.4,
                max_output_tokens: 256,
            },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ResponderError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ResponderError::Status(status.as_u16()));
        }

        let raw = resp
            .bytes()
            .await
            .map_err(|e| ResponderError::Transport(e.to_string()))?;
        let body: GenerateResp =
            serde_json::from_slice(&raw).map_err(|e| ResponderError::Malformed(e.to_string()))?;

        let reply = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ResponderError::Empty);
        }
        Ok(reply.to_string())
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// ------------------------------------------------------------
// Offline providers
// ------------------------------------------------------------

/// Deterministic offline replies: tone line by sentiment plus the closest
/// knowledge-base entry.
#[derive(Debug, Clone, Default)]
pub struct CannedResponder;

const TOPIC_MIN_SIMILARITY: f64 = 0.88;

#[async_trait]
impl Responder for CannedResponder {
    async fn respond(
        &self,
        text: &str,
        sentiment: Sentiment,
        kb: &KnowledgeBase,
    ) -> Result<String, ResponderError> {
        let opener = match sentiment {
            Sentiment::Negative => "I'm really sorry about the trouble, let's get this sorted.",
            Sentiment::Neutral => "Happy to help.",
            Sentiment::Positive => "That's great to hear!",
        };

        let body = match kb.closest_topic(text, TOPIC_MIN_SIMILARITY) {
            Some((_, answer)) => answer.to_string(),
            None => {
                let topics = kb
                    .topics
                    .keys()
                    .map(|k| KnowledgeBase::display_key(k))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("I can help with questions about {topics}.")
            }
        };
        Ok(format!("{opener} {body}"))
    }

    fn provider_name(&self) -> &'static str {
        "canned"
    }
}

/// Always fails. Exercises the fallback path (`AI_TEST_MODE=error`).
#[derive(Debug, Clone)]
pub struct FailingResponder {
    pub reason: String,
}

impl Default for FailingResponder {
    fn default() -> Self {
        Self {
            reason: "forced provider error".to_string(),
        }
    }
}

#[async_trait]
impl Responder for FailingResponder {
    async fn respond(
        &self,
        _text: &str,
        _sentiment: Sentiment,
        _kb: &KnowledgeBase,
    ) -> Result<String, ResponderError> {
        Err(ResponderError::Unavailable(self.reason.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }
}

// ------------------------------------------------------------
// Fallback wrapper
// ------------------------------------------------------------

/// Infallible front for any provider: failures are logged, counted and
/// replaced by [`FALLBACK_REPLY`].
#[derive(Clone)]
pub struct SafeResponder {
    inner: DynResponder,
}

impl SafeResponder {
    pub fn new(inner: DynResponder) -> Self {
        Self { inner }
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    pub async fn reply(&self, text: &str, sentiment: Sentiment, kb: &KnowledgeBase) -> String {
        let provider = self.inner.provider_name();
        let start = Instant::now();
        let result = self.inner.respond(text, sentiment, kb).await;
        histogram!(RESPONDER_DURATION_MS, "provider" => provider)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(reply) => {
                debug!(provider, id = %anon_hash(text), %sentiment, "responder replied");
                reply
            }
            Err(e) => {
                counter!(RESPONDER_FAILURES_TOTAL, "provider" => provider).increment(1);
                warn!(provider, id = %anon_hash(text), error = %e, "responder failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_message_sentiment_and_context() {
        let kb = KnowledgeBase::default();
        let p = build_prompt("Where is my parcel?", Sentiment::Negative, &kb);
        assert!(p.contains("Customer message: \"Where is my parcel?\""));
        assert!(p.contains("Detected sentiment: Negative"));
        assert!(p.contains("- order tracking: A tracking link"));
    }

    #[tokio::test]
    async fn canned_reply_uses_matching_topic() {
        let kb = KnowledgeBase::default();
        let r = CannedResponder
            .respond("what is your warranty", Sentiment::Neutral, &kb)
            .await
            .unwrap();
        assert!(r.starts_with("Happy to help."));
        assert!(r.contains("1-year limited warranty"));
    }

    #[tokio::test]
    async fn canned_reply_redirects_off_topic() {
        let kb = KnowledgeBase::default();
        let r = CannedResponder
            .respond("do you like jazz", Sentiment::Positive, &kb)
            .await
            .unwrap();
        assert!(r.contains("I can help with questions about"));
        assert!(r.contains("return policy"));
    }

    #[tokio::test]
    async fn safe_responder_swallows_errors() {
        let safe = SafeResponder::new(Arc::new(FailingResponder::default()));
        let kb = KnowledgeBase::default();
        assert_eq!(safe.reply("hi", Sentiment::Neutral, &kb).await, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn gemini_without_key_is_unavailable() {
        let g = GeminiResponder::new(String::new(), None, Duration::from_secs(1)).unwrap();
        let kb = KnowledgeBase::default();
        let err = g.respond("hi", Sentiment::Neutral, &kb).await.unwrap_err();
        assert!(matches!(err, ResponderError::Unavailable(_)));
    }
}
