// src/config/ai.rs
use std::time::Duration;

use serde::Serialize;

pub const ENV_AI_PROVIDER: &str = "AI_PROVIDER";
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_RESPONDER_TIMEOUT_SECS: &str = "RESPONDER_TIMEOUT_SECS";

pub const DEFAULT_RESPONDER_TIMEOUT_SECS: u64 = 15;

/// Offline responder selection; bypasses the provider and its credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AiTestMode {
    /// Deterministic canned replies.
    Mock,
    /// Every call fails, so the fallback reply is used.
    Error,
}

impl AiTestMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AiConfig {
    /// Only "gemini" is supported (case-insensitive).
    pub provider: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: Option<String>,
    pub timeout: Duration,
    pub test_mode: Option<AiTestMode>,
}

impl AiConfig {
    /// Resolve from any key → value lookup. Missing API key is an error unless
    /// a test mode is selected.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let test_mode = match non_empty(ENV_AI_TEST_MODE) {
            Some(raw) => Some(
                AiTestMode::parse(&raw)
                    .ok_or_else(|| anyhow::anyhow!("Unsupported {ENV_AI_TEST_MODE}: {raw}"))?,
            ),
            None => None,
        };

        let provider = non_empty(ENV_AI_PROVIDER)
            .unwrap_or_else(|| "gemini".to_string())
            .to_lowercase();
        if provider != "gemini" {
            anyhow::bail!("Unsupported provider in config: {provider}");
        }

        let api_key = match (non_empty(ENV_GEMINI_API_KEY), test_mode) {
            (Some(k), _) => k,
            (None, Some(_)) => String::new(),
            (None, None) => anyhow::bail!(
                "Missing {ENV_GEMINI_API_KEY} env var (set it in .env or the environment)"
            ),
        };

        let timeout_secs = match non_empty(ENV_RESPONDER_TIMEOUT_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| anyhow::anyhow!("{ENV_RESPONDER_TIMEOUT_SECS} must be a positive integer, got {raw}"))?,
            None => DEFAULT_RESPONDER_TIMEOUT_SECS,
        };

        Ok(Self {
            provider,
            api_key,
            model: non_empty(ENV_GEMINI_MODEL),
            timeout: Duration::from_secs(timeout_secs),
            test_mode,
        })
    }
}
