//! Support knowledge base: an ordered topic → description map that is inlined
//! into the responder prompt. Not a search index.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_KNOWLEDGE_BASE_PATH: &str = "config/knowledge_base.toml";
pub const ENV_KNOWLEDGE_BASE_PATH: &str = "KNOWLEDGE_BASE_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub topics: BTreeMap<String, String>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        let topics = [
            (
                "shipping_policy",
                "Standard shipping takes 3-5 business days and is free on orders over $50. Express shipping (1-2 days) costs $12.",
            ),
            (
                "return_policy",
                "Unused items can be returned within 30 days of delivery for a full refund. Return labels are free for defective products.",
            ),
            (
                "warranty",
                "All electronics carry a 1-year limited warranty covering manufacturing defects.",
            ),
            (
                "payment_methods",
                "We accept Visa, Mastercard, American Express, PayPal and store gift cards.",
            ),
            (
                "order_tracking",
                "A tracking link is emailed as soon as the order ships; it is also listed under Orders in your account.",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { topics }
    }
}

impl KnowledgeBase {
    /// Missing file → built-in defaults. A file that exists but does not parse is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "knowledge base file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let kb: KnowledgeBase =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        if kb.topics.is_empty() {
            anyhow::bail!("knowledge base {} has no topics", path.display());
        }
        info!(path = %path.display(), topics = kb.topics.len(), "knowledge base loaded");
        Ok(kb)
    }

    /// Human-readable topic name: `return_policy` → `return policy`.
    pub fn display_key(key: &str) -> String {
        key.replace('_', " ")
    }

    /// Prompt context, one `- topic: text` line per entry.
    pub fn context(&self) -> String {
        self.topics
            .iter()
            .map(|(k, v)| format!("- {}: {}", Self::display_key(k), v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Topic whose key words best match any word of `query` (Jaro-Winkler).
    /// Returns `None` when nothing clears `min_similarity`.
    pub fn closest_topic(&self, query: &str, min_similarity: f64) -> Option<(&str, &str)> {
        let words: Vec<String> = crate::sentiment::tokenize(query)
            .into_iter()
            .filter(|w| w.len() > 2)
            .collect();
        let words = &words;

        let mut best: Option<(&str, &str, f64)> = None;
        for (key, text) in &self.topics {
            let score = key
                .split('_')
                .flat_map(move |kw| words.iter().map(move |w| strsim::jaro_winkler(kw, w)))
                .fold(0.0f64, f64::max);
            if score >= min_similarity && best.map_or(true, |(_, _, b)| score > b) {
                best = Some((key.as_str(), text.as_str(), score));
            }
        }
        best.map(|(k, t, _)| (k, t))
    }
}
