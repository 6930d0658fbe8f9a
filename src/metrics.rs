use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const PREDICTIONS_TOTAL: &str = "predictions_total";
pub const REVIEW_LOG_LEN: &str = "review_log_len";
pub const CHAT_TURNS_TOTAL: &str = "chat_turns_total";
pub const CHAT_ESCALATIONS_TOTAL: &str = "chat_escalations_total";
pub const CHAT_RESETS_TOTAL: &str = "chat_resets_total";
pub const RESPONDER_FAILURES_TOTAL: &str = "responder_failures_total";
pub const RESPONDER_DURATION_MS: &str = "responder_duration_ms";

// The recorder is process-global; tests build many routers in one process.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe our series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!(PREDICTIONS_TOTAL, "Reviews classified via /predict, by sentiment");
    describe_gauge!(REVIEW_LOG_LEN, "Entries currently held in the recent-review log");
    describe_counter!(CHAT_TURNS_TOTAL, "User chat turns processed (resets and ignored turns excluded)");
    describe_counter!(CHAT_ESCALATIONS_TOTAL, "Conversations handed to a human agent");
    describe_counter!(CHAT_RESETS_TOTAL, "Explicit clear/reset commands");
    describe_counter!(RESPONDER_FAILURES_TOTAL, "Responder calls replaced by the fallback reply");
    describe_histogram!(RESPONDER_DURATION_MS, "Responder call latency in milliseconds");
}
