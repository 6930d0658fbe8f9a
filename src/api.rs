use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use metrics::{counter, gauge};
use serde::Deserialize;
use thiserror::Error;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{info, warn};

use crate::chat_service::{ChatError, ChatService, ChatSnapshot};
use crate::explain::OcclusionExplainer;
use crate::history::{Review, ReviewLog};
use crate::knowledge::KnowledgeBase;
use crate::logging::anon_hash;
use crate::metrics::{PREDICTIONS_TOTAL, REVIEW_LOG_LEN};
use crate::responder::SafeResponder;
use crate::sentiment::{Classifier, ClassifierError};
use crate::views;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
pub struct AppState {
    classifier: Arc<dyn Classifier>,
    reviews: Arc<ReviewLog>,
    chat: Arc<ChatService>,
    explainer: OcclusionExplainer,
    static_dir: PathBuf,
}

impl AppState {
    /// Fresh in-memory state: empty review log, default chat session seeded.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        responder: SafeResponder,
        kb: Arc<KnowledgeBase>,
    ) -> Self {
        let chat = ChatService::new(classifier.clone(), responder, kb);
        Self {
            classifier,
            reviews: Arc::new(ReviewLog::default()),
            chat: Arc::new(chat),
            explainer: OcclusionExplainer::default(),
            static_dir: PathBuf::from(crate::config::DEFAULT_STATIC_DIR),
        }
    }

    pub fn with_static_dir(mut self, dir: PathBuf) -> Self {
        self.static_dir = dir;
        self
    }
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.static_dir.clone();
    Router::new()
        .route("/", get(home))
        .route("/predict", get(home).post(predict))
        .route("/chatbot", get(chatbot_page).post(chatbot_submit))
        .route("/lime-analysis", get(lime_page).post(lime_submit))
        .route("/health", get(|| async { "OK" }))
        .route("/api/reviews", get(api_reviews))
        .route("/api/chat", get(api_chat))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Please enter some text first.")]
    EmptyText,
    #[error("Session ids may only use letters, digits, '-' or '_' (at most 64 characters).")]
    InvalidSession,
    #[error("The support chat is at capacity right now. Please try again shortly.")]
    ChatFull,
    #[error("The sentiment model is unavailable right now. Please try again shortly.")]
    Classifier(#[from] ClassifierError),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::EmptyMessage => AppError::EmptyText,
            ChatError::InvalidSession => AppError::InvalidSession,
            ChatError::SessionLimit => AppError::ChatFull,
            ChatError::Classifier(c) => AppError::Classifier(c),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::EmptyText | AppError::InvalidSession => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ChatFull => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Classifier(e) => {
                warn!(error = %e, "classification failed");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (
            status,
            Html(views::error_page(status.as_u16(), &self.to_string())),
        )
            .into_response()
    }
}

// ------------------------------------------------------------
// Review analyzer
// ------------------------------------------------------------

#[derive(Deserialize)]
struct TextForm {
    text: String,
}

async fn home(State(state): State<AppState>) -> Html<String> {
    Html(views::home(&state.reviews.snapshot(), None))
}

async fn predict(
    State(state): State<AppState>,
    Form(form): Form<TextForm>,
) -> Result<Html<String>, AppError> {
    if form.text.trim().is_empty() {
        return Err(AppError::EmptyText);
    }
    let text = form.text.as_str();

    let prediction = state.classifier.classify(text).await?;
    let review = Review::new(text, &prediction);
    let len = state.reviews.record(review.clone());

    counter!(PREDICTIONS_TOTAL, "sentiment" => prediction.sentiment.label()).increment(1);
    gauge!(REVIEW_LOG_LEN).set(len as f64);
    info!(
        id = %anon_hash(text),
        sentiment = %prediction.sentiment,
        confidence = prediction.confidence,
        classifier = state.classifier.name(),
        "review classified"
    );

    Ok(Html(views::home(&state.reviews.snapshot(), Some(&review))))
}

async fn api_reviews(State(state): State<AppState>) -> Json<Vec<Review>> {
    Json(state.reviews.snapshot())
}

// ------------------------------------------------------------
// Support chat
// ------------------------------------------------------------

#[derive(Deserialize)]
struct ChatForm {
    text: String,
    #[serde(default)]
    session: Option<String>,
}

#[derive(Deserialize)]
struct SessionQuery {
    #[serde(default)]
    session: Option<String>,
}

/// Header wins over the form/query field.
fn session_id(headers: &HeaderMap, fallback: Option<String>) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(fallback)
}

async fn chatbot_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SessionQuery>,
) -> Result<Html<String>, AppError> {
    let sid = session_id(&headers, q.session);
    Ok(Html(views::chatbot(&state.chat.snapshot(sid.as_deref()).await?)))
}

async fn chatbot_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Result<Html<String>, AppError> {
    let sid = session_id(&headers, form.session);
    state.chat.submit(sid.as_deref(), &form.text).await?;
    Ok(Html(views::chatbot(&state.chat.snapshot(sid.as_deref()).await?)))
}

async fn api_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SessionQuery>,
) -> Result<Json<ChatSnapshot>, AppError> {
    let sid = session_id(&headers, q.session);
    Ok(Json(state.chat.snapshot(sid.as_deref()).await?))
}

// ------------------------------------------------------------
// Explanations
// ------------------------------------------------------------

async fn lime_page() -> Html<String> {
    Html(views::lime("", None))
}

async fn lime_submit(
    State(state): State<AppState>,
    Form(form): Form<TextForm>,
) -> Result<Html<String>, AppError> {
    let text = form.text.trim();
    if text.is_empty() {
        return Err(AppError::EmptyText);
    }
    let explanation = state.explainer.explain(state.classifier.as_ref(), text).await?;
    info!(
        id = %anon_hash(text),
        sentiment = %explanation.prediction.sentiment,
        words = explanation.words.len(),
        "explanation rendered"
    );
    Ok(Html(views::lime(text, Some(&explanation))))
}
