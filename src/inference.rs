//! Hosted text-classification endpoint (Hugging Face inference response shape).
//!
//! Request: `{"inputs": "<text>"}`. Response: `[[{"label": "LABEL_0", "score": 0.91}, ...]]`
//! (some deployments drop the outer array; both are accepted).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::anon_hash;
use crate::sentiment::{Classifier, ClassifierError, Prediction, Sentiment};

pub struct HttpClassifier {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct InferenceReq<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResp {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("review-sentiment-desk/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let mut req = self.http.post(&self.url).json(&InferenceReq { inputs: text });
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }
        let body: InferenceResp = resp
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        let prediction = prediction_from_scores(body)?;
        debug!(
            id = %anon_hash(text),
            sentiment = %prediction.sentiment,
            confidence = prediction.confidence,
            "hosted classification"
        );
        Ok(prediction)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn prediction_from_scores(body: InferenceResp) -> Result<Prediction, ClassifierError> {
    let rows = match body {
        InferenceResp::Nested(mut outer) => {
            if outer.is_empty() {
                return Err(ClassifierError::Malformed("empty response".into()));
            }
            outer.swap_remove(0)
        }
        InferenceResp::Flat(rows) => rows,
    };

    let mut probs = [0.0f32; 3];
    let mut seen = 0usize;
    for row in rows {
        let s = Sentiment::from_label(&row.label)
            .ok_or_else(|| ClassifierError::Malformed(format!("unknown label '{}'", row.label)))?;
        probs[s.index()] = row.score.max(0.0);
        seen += 1;
    }
    let sum: f32 = probs.iter().sum();
    if seen == 0 || sum <= 0.0 {
        return Err(ClassifierError::Malformed("no label scores".into()));
    }
    Ok(Prediction::from_probabilities(probs.map(|p| p / sum)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_model_ids_map_to_labels() {
        let body: InferenceResp = serde_json::from_str(
            r#"[[{"label":"LABEL_2","score":0.7},{"label":"LABEL_0","score":0.1},{"label":"LABEL_1","score":0.2}]]"#,
        )
        .unwrap();
        let p = prediction_from_scores(body).unwrap();
        assert_eq!(p.sentiment, Sentiment::Positive);
        assert!((p.probabilities[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn flat_shape_is_accepted_and_renormalized() {
        let body: InferenceResp =
            serde_json::from_str(r#"[{"label":"negative","score":0.6},{"label":"neutral","score":0.2}]"#).unwrap();
        let p = prediction_from_scores(body).unwrap();
        assert_eq!(p.sentiment, Sentiment::Negative);
        assert!((p.confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn unknown_label_is_malformed() {
        let body: InferenceResp = serde_json::from_str(r#"[{"label":"sarcasm","score":1.0}]"#).unwrap();
        assert!(matches!(prediction_from_scores(body), Err(ClassifierError::Malformed(_))));
    }
}
