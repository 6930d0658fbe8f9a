// src/ai_bootstrap.rs
//! Builds the external collaborators (classifier, responder) from config.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AiConfig, AiTestMode, ClassifierConfig};
use crate::inference::HttpClassifier;
use crate::knowledge::KnowledgeBase;
use crate::responder::{
    CannedResponder, DynResponder, FailingResponder, GeminiResponder, SafeResponder,
};
use crate::sentiment::{Classifier, LexiconClassifier, Sentiment};

pub struct AiRuntime {
    pub cfg: AiConfig,
    pub responder: SafeResponder,
}

impl AiRuntime {
    pub fn from_config(cfg: AiConfig) -> anyhow::Result<Self> {
        // Safe diagnostics: only provider + mode + key length
        info!(
            "AI cfg loaded: provider={}, test_mode={:?}, key_len={}, timeout_s={}",
            cfg.provider,
            cfg.test_mode,
            cfg.api_key.len(),
            cfg.timeout.as_secs()
        );
        let inner: DynResponder = match cfg.test_mode {
            Some(AiTestMode::Mock) => Arc::new(CannedResponder),
            Some(AiTestMode::Error) => Arc::new(FailingResponder::default()),
            None => Arc::new(GeminiResponder::new(
                cfg.api_key.clone(),
                cfg.model.as_deref(),
                cfg.timeout,
            )?),
        };
        Ok(Self {
            cfg,
            responder: SafeResponder::new(inner),
        })
    }

    /// One-off startup check of the responder. Never fails; logs the outcome.
    pub async fn quick_probe(&self, kb: &KnowledgeBase) {
        let sample = "Hi, how long does standard shipping take?";
        let out = self.responder.reply(sample, Sentiment::Neutral, kb).await;
        if out == crate::responder::FALLBACK_REPLY {
            warn!(provider = self.responder.provider_name(), "AI quick_probe got fallback reply");
        } else {
            info!(provider = self.responder.provider_name(), len = out.len(), "AI quick_probe ok");
        }
    }
}

/// Hosted endpoint when configured, local lexicon otherwise.
pub fn build_classifier(cfg: Option<&ClassifierConfig>) -> anyhow::Result<Arc<dyn Classifier>> {
    match cfg {
        Some(c) => {
            info!(url = %c.url, "using hosted classifier");
            Ok(Arc::new(HttpClassifier::new(
                c.url.clone(),
                c.token.clone(),
                c.timeout,
            )?))
        }
        None => {
            info!("using local lexicon classifier");
            Ok(Arc::new(LexiconClassifier::new()))
        }
    }
}
