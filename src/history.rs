//! history.rs: bounded in-memory log of recent review classifications.
//!
//! Newest first. Nothing is persisted; a restart starts empty.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sentiment::{Prediction, Sentiment};

/// How many reviews the home page shows.
pub const REVIEW_LOG_CAP: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub text: String,
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(text: impl Into<String>, prediction: &Prediction) -> Self {
        Self {
            text: text.into(),
            sentiment: prediction.sentiment,
            confidence: prediction.confidence,
            created_at: Utc::now(),
        }
    }

    /// Confidence as a percentage with two decimals, e.g. `97.31%`.
    pub fn confidence_pct(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

#[derive(Debug)]
pub struct ReviewLog {
    inner: Mutex<Vec<Review>>,
    cap: usize,
}

impl Default for ReviewLog {
    fn default() -> Self {
        Self::with_capacity(REVIEW_LOG_CAP)
    }
}

impl ReviewLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap + 1)),
            cap,
        }
    }

    /// Insert at the head; drop the tail once over capacity. Returns the new length.
    pub fn record(&self, review: Review) -> usize {
        let mut v = self.inner.lock().expect("review log mutex poisoned");
        v.insert(0, review);
        if v.len() > self.cap {
            v.truncate(self.cap);
        }
        v.len()
    }

    /// Most-recent-first copy.
    pub fn snapshot(&self) -> Vec<Review> {
        self.inner.lock().expect("review log mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("review log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(text: &str) -> Review {
        let p = Prediction::from_probabilities([0.1, 0.2, 0.7]);
        Review::new(text, &p)
    }

    #[test]
    fn newest_first_and_bounded() {
        let log = ReviewLog::default();
        for i in 1..=6 {
            log.record(review(&format!("r{i}")));
        }
        let texts: Vec<_> = log.snapshot().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, ["r6", "r5", "r4", "r3", "r2"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let log = ReviewLog::default();
        log.record(review("same"));
        log.record(review("same"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn confidence_formats_as_percent() {
        assert_eq!(review("x").confidence_pct(), "70.00%");
    }

    #[test]
    fn custom_capacity_bounds_length() {
        let log = ReviewLog::with_capacity(2);
        assert!(log.is_empty());
        assert_eq!(log.record(review("a")), 1);
        assert_eq!(log.record(review("b")), 2);
        assert_eq!(log.record(review("c")), 2);
    }
}
