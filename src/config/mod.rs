// src/config/mod.rs
//! Process configuration, resolved once at startup from the environment
//! (after `.env` has been loaded by the entrypoint).

pub mod ai;

use std::path::PathBuf;
use std::time::Duration;

pub use ai::{AiConfig, AiTestMode};

use crate::knowledge::{DEFAULT_KNOWLEDGE_BASE_PATH, ENV_KNOWLEDGE_BASE_PATH};

pub const ENV_CLASSIFIER_URL: &str = "CLASSIFIER_URL";
pub const ENV_CLASSIFIER_TOKEN: &str = "CLASSIFIER_TOKEN";
pub const ENV_STATIC_DIR: &str = "STATIC_DIR";
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Hosted classifier endpoint; absent → local lexicon classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub classifier: Option<ClassifierConfig>,
    pub knowledge_base_path: PathBuf,
    pub static_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ai = AiConfig::from_lookup(&get)?;
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let classifier = non_empty(ENV_CLASSIFIER_URL).map(|url| ClassifierConfig {
            url,
            token: non_empty(ENV_CLASSIFIER_TOKEN),
            timeout: Duration::from_secs(10),
        });

        Ok(Self {
            ai,
            classifier,
            knowledge_base_path: non_empty(ENV_KNOWLEDGE_BASE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWLEDGE_BASE_PATH)),
            static_dir: non_empty(ENV_STATIC_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_url_selects_hosted_model() {
        let cfg = AppConfig::from_lookup(|k| match k {
            "AI_TEST_MODE" => Some("mock".into()),
            "CLASSIFIER_URL" => Some("http://localhost:9000/classify".into()),
            _ => None,
        })
        .unwrap();
        let c = cfg.classifier.expect("classifier config");
        assert_eq!(c.url, "http://localhost:9000/classify");
        assert!(c.token.is_none());
        assert_eq!(cfg.static_dir, PathBuf::from("static"));
        assert_eq!(cfg.knowledge_base_path, PathBuf::from("config/knowledge_base.toml"));
    }
}
