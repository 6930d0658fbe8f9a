// tests/common/mod.rs
// Shared helpers for the HTTP-level tests (no sockets; tower::ServiceExt::oneshot).
#![allow(dead_code)]

use std::sync::Arc;

use axum::{body::Body, Router};
use http::Request;

use review_sentiment_desk::api::{router, AppState};
use review_sentiment_desk::knowledge::KnowledgeBase;
use review_sentiment_desk::responder::{CannedResponder, Responder, SafeResponder};
use review_sentiment_desk::sentiment::{Classifier, LexiconClassifier};

pub const BODY_LIMIT: usize = 1024 * 1024;

/// Router over fresh state with the given collaborators.
pub fn router_with(classifier: Arc<dyn Classifier>, responder: Arc<dyn Responder>) -> Router {
    let state = AppState::new(
        classifier,
        SafeResponder::new(responder),
        Arc::new(KnowledgeBase::default()),
    );
    router(state)
}

/// Lexicon classifier + canned replies: fully offline and deterministic.
pub fn offline_router() -> Router {
    router_with(Arc::new(LexiconClassifier::new()), Arc::new(CannedResponder))
}

/// `application/x-www-form-urlencoded` body.
pub fn form_body(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn urlencode(s: &str) -> String {
    s.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect()
}

pub fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form_body(pairs)))
        .expect("build form request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET request")
}

pub async fn body_string(resp: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
