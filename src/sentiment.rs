//! # Sentiment
//! Labels, the `Classifier` seam, and the local lexicon classifier.
//!
//! The lexicon classifier is a stand-in for a hosted model: it produces the
//! same shape of output (label + confidence + full probability vector) so the
//! chat flow, the review log and the explainer never care which one is wired in.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)[\w']+").expect("token regex"));

/// Logit scale applied to the summed lexicon score.
const SCORE_GAIN: f32 = 1.2;
/// Prior logit for Neutral; a lone mild word (|score| = 1) must still beat it.
const NEUTRAL_PRIOR: f32 = 0.8;

/// Categorical classifier output. Index order matches the model's label ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];

    pub fn index(self) -> usize {
        match self {
            Sentiment::Negative => 0,
            Sentiment::Neutral => 1,
            Sentiment::Positive => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
            Sentiment::Positive => "Positive",
        }
    }

    /// Accepts model-style ids (`LABEL_0`) as well as names, case-insensitive.
    pub fn from_label(raw: &str) -> Option<Self> {
        let l = raw.trim().to_ascii_lowercase();
        match l.as_str() {
            "label_0" | "negative" | "neg" => Some(Sentiment::Negative),
            "label_1" | "neutral" | "neu" => Some(Sentiment::Neutral),
            "label_2" | "positive" | "pos" => Some(Sentiment::Positive),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classification: winning label, its probability and the full vector
/// `[negative, neutral, positive]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub probabilities: [f32; 3],
}

impl Prediction {
    /// Argmax over the vector; ties go to the lower label index.
    pub fn from_probabilities(probabilities: [f32; 3]) -> Self {
        let mut best = 0usize;
        for i in 1..3 {
            if probabilities[i] > probabilities[best] {
                best = i;
            }
        }
        Self {
            sentiment: Sentiment::ALL[best],
            confidence: probabilities[best].clamp(0.0, 1.0),
            probabilities,
        }
    }

    pub fn probability_of(&self, s: Sentiment) -> f32 {
        self.probabilities[s.index()]
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier returned HTTP {0}")]
    Status(u16),
    #[error("classifier response malformed: {0}")]
    Malformed(String),
}

/// Maps text to a sentiment prediction.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Prediction, ClassifierError>;
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// Negation: a negator among the previous 1..=3 tokens flips the word's sign.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens = tokenize(text);
        let mut score: i32 = 0;

        for (i, w) in tokens.iter().enumerate() {
            let base = self.word_score(w);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    /// Softmax over three logits derived from the lexicon score.
    pub fn probabilities(&self, text: &str) -> [f32; 3] {
        let (score, _) = self.score_text(text);
        let s = score as f32;
        softmax([
            -SCORE_GAIN * s,
            NEUTRAL_PRIOR - 0.5 * SCORE_GAIN * s.abs(),
            SCORE_GAIN * s,
        ])
    }

    pub fn predict(&self, text: &str) -> Prediction {
        Prediction::from_probabilities(self.probabilities(text))
    }
}

#[async_trait]
impl Classifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<Prediction, ClassifierError> {
        Ok(self.predict(text))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Replays a fixed sequence of labels; yields Neutral once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    queue: Mutex<VecDeque<Sentiment>>,
}

impl ScriptedClassifier {
    pub fn new(script: impl IntoIterator<Item = Sentiment>) -> Self {
        Self {
            queue: Mutex::new(script.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> Result<Prediction, ClassifierError> {
        let next = self
            .queue
            .lock()
            .map_err(|_| ClassifierError::Transport("script mutex poisoned".into()))?
            .pop_front()
            .unwrap_or(Sentiment::Neutral);
        let mut probabilities = [0.05f32; 3];
        probabilities[next.index()] = 0.9;
        Ok(Prediction::from_probabilities(probabilities))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Lower-cased word tokens; apostrophes stay inside words so "isn't" survives.
pub fn tokenize(s: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(s)
        .map(|m| m.as_str().trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "hardly"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
    )
}

pub fn softmax(logits: [f32; 3]) -> [f32; 3] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.map(|l| (l - max).exp());
    let sum: f32 = exps.iter().sum();
    exps.map(|e| e / sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_praise_is_positive() {
        let p = LexiconClassifier::new().predict("Excellent blender, great value, love it");
        assert_eq!(p.sentiment, Sentiment::Positive);
        assert!(p.confidence > 0.9);
    }

    #[test]
    fn complaint_is_negative() {
        let p = LexiconClassifier::new().predict("Terrible. It arrived broken and support was rude.");
        assert_eq!(p.sentiment, Sentiment::Negative);
    }

    #[test]
    fn no_opinion_words_is_neutral() {
        let p = LexiconClassifier::new().predict("How long does shipping to Canada take?");
        assert_eq!(p.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn negation_flips_sign() {
        let c = LexiconClassifier::new();
        assert_eq!(c.score_text("good").0, 2);
        assert_eq!(c.score_text("this isn't good").0, -2);
        assert_eq!(c.predict("not good at all").sentiment, Sentiment::Negative);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let c = LexiconClassifier::new();
        for text in ["", "awful awful awful", "fine", "great but slow"] {
            let p = c.probabilities(text);
            let sum: f32 = p.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "sum={sum} for {text:?}");
        }
    }

    #[test]
    fn labels_parse_from_model_ids() {
        assert_eq!(Sentiment::from_label("LABEL_0"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_label(" positive "), Some(Sentiment::Positive));
        assert_eq!(Sentiment::from_label("mixed"), None);
    }

    #[tokio::test]
    async fn scripted_classifier_replays_then_defaults() {
        let c = ScriptedClassifier::new([Sentiment::Negative]);
        assert_eq!(c.classify("x").await.unwrap().sentiment, Sentiment::Negative);
        assert_eq!(c.classify("x").await.unwrap().sentiment, Sentiment::Neutral);
        assert_eq!(c.remaining(), 0);
    }
}
