//! Review Sentiment Desk: Binary Entrypoint
//! Loads `.env`, initialises tracing, builds the Axum app and hands it to Shuttle.
//!
//! A missing `GEMINI_API_KEY` (outside `AI_TEST_MODE`) aborts startup.

use shuttle_axum::ShuttleAxum;

use review_sentiment_desk::logging::init_tracing;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let router = review_sentiment_desk::app().await?;

    Ok(router.into())
}
