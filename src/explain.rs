//! Word-occlusion explanations for a classification.
//!
//! For each distinct word, re-classify the text with that word removed and
//! measure how much the predicted label's probability drops. Positive weight
//! means the word pushed the text toward the predicted label.

use serde::Serialize;

use crate::sentiment::{tokenize, Classifier, ClassifierError, Prediction};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordWeight {
    pub word: String,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub prediction: Prediction,
    /// Sorted by absolute weight, strongest first.
    pub words: Vec<WordWeight>,
}

#[derive(Debug, Clone, Copy)]
pub struct OcclusionExplainer {
    /// Words reported back.
    pub max_features: usize,
    /// Distinct words probed; bounds classifier calls per explanation.
    pub max_candidates: usize,
}

impl Default for OcclusionExplainer {
    fn default() -> Self {
        Self {
            max_features: 10,
            max_candidates: 40,
        }
    }
}

impl OcclusionExplainer {
    pub async fn explain(
        &self,
        classifier: &dyn Classifier,
        text: &str,
    ) -> Result<Explanation, ClassifierError> {
        let prediction = classifier.classify(text).await?;
        let target = prediction.sentiment;
        let base = prediction.probability_of(target);

        let tokens = tokenize(text);
        let mut candidates: Vec<&str> = Vec::new();
        for t in &tokens {
            if !candidates.contains(&t.as_str()) {
                candidates.push(t.as_str());
            }
            if candidates.len() >= self.max_candidates {
                break;
            }
        }

        let mut words = Vec::with_capacity(candidates.len());
        for word in candidates {
            let reduced = tokens
                .iter()
                .filter(|t| t.as_str() != word)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            let without = classifier.classify(&reduced).await?;
            words.push(WordWeight {
                word: word.to_string(),
                weight: base - without.probability_of(target),
            });
        }

        words.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        words.truncate(self.max_features);
        Ok(Explanation { prediction, words })
    }
}
