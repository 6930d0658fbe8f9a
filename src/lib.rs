// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod ai_bootstrap;
pub mod api;
pub mod chat;
pub mod chat_service;
pub mod config;
pub mod explain;
pub mod history;
pub mod inference;
pub mod knowledge;
pub mod logging;
pub mod metrics;
pub mod responder;
pub mod sentiment;
pub mod views;

use std::sync::Arc;

use axum::Router;
use tracing::info;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::chat::{ConversationState, ESCALATION_MESSAGE, WELCOME_MESSAGE};
pub use crate::chat_service::{ChatService, TurnOutcome};
pub use crate::responder::FALLBACK_REPLY;
pub use crate::sentiment::{Classifier, Prediction, Sentiment};

use crate::ai_bootstrap::{build_classifier, AiRuntime};
use crate::config::AppConfig;
use crate::knowledge::KnowledgeBase;
use crate::metrics::Metrics;

/// Full application from the process environment. Fails when required
/// configuration (e.g. `GEMINI_API_KEY`) is missing.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::from_env()?;
    app_from_config(cfg).await
}

/// Wire config → collaborators → state → router (+ `/metrics`).
pub async fn app_from_config(cfg: AppConfig) -> anyhow::Result<Router> {
    let metrics = Metrics::init()?;
    let kb = Arc::new(KnowledgeBase::load_or_default(&cfg.knowledge_base_path)?);
    let classifier = build_classifier(cfg.classifier.as_ref())?;
    let ai = AiRuntime::from_config(cfg.ai.clone())?;

    if std::env::var("AI_QUICK_PROBE").ok().as_deref() == Some("1") {
        ai.quick_probe(&kb).await;
    }

    let state = AppState::new(classifier, ai.responder, kb).with_static_dir(cfg.static_dir.clone());
    info!(
        static_dir = %cfg.static_dir.display(),
        knowledge_base = %cfg.knowledge_base_path.display(),
        "application state initialised"
    );
    Ok(router(state).merge(metrics.router()))
}
