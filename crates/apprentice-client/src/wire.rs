//! Console request/response bodies and normalization of untrusted responses.

use apprentice_core::types::{
    Analysis, Confidence, GapResolution, QaPair, ResolutionAction, TopicId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body shared by the analyze, knowledge, and gap-resolve endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Body of the training finalize endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeRequest<'a> {
    pub original_text: &'a str,
    pub qa_pairs: &'a [QaPair],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinalizeResponse {
    #[serde(default)]
    pub crystallized_text: Option<String>,
}

/// Raw analyzer response. Every field is optional because the analyzer is
/// backed by a language model and may return anything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub confidence_score: Option<Value>,
    #[serde(default)]
    pub questions: Option<Value>,
}

impl AnalyzeResponse {
    /// Clamp the score into `0..=100` and keep only non-blank string questions.
    pub fn normalize(self) -> Analysis {
        let confidence = match self.confidence_score {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Confidence::clamped(i),
                None => Confidence::from_score(n.as_f64().unwrap_or(0.0)),
            },
            Some(Value::String(s)) => s
                .trim()
                .trim_end_matches('%')
                .parse::<f64>()
                .map(Confidence::from_score)
                .unwrap_or_default(),
            _ => Confidence::MIN,
        };

        let questions = match self.questions {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => {
                        let trimmed = s.trim();
                        (!trimmed.is_empty()).then(|| trimmed.to_string())
                    }
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        };

        Analysis {
            confidence,
            questions,
        }
    }
}

/// Raw gap-resolve response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveResponse {
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub topic_name: Option<String>,
    #[serde(default)]
    pub action: Option<ResolutionAction>,
}

impl ResolveResponse {
    /// A resolution without a topic id is treated as no resolution.
    pub fn into_resolution(self) -> Option<GapResolution> {
        let topic_id = self.topic_id.map(|s| s.trim().to_string())?;
        if topic_id.is_empty() {
            return None;
        }
        let topic_name = self
            .topic_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| topic_id.clone());
        Some(GapResolution {
            topic_id: TopicId::new(topic_id),
            topic_name,
            action: self.action.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analyze(value: Value) -> Analysis {
        serde_json::from_value::<AnalyzeResponse>(value)
            .unwrap()
            .normalize()
    }

    #[test]
    fn test_normalize_well_formed() {
        let analysis = analyze(json!({
            "confidence_score": 40,
            "questions": ["What about sale items?"]
        }));
        assert_eq!(analysis.confidence.value(), 40);
        assert_eq!(analysis.questions, vec!["What about sale items?"]);
    }

    #[test]
    fn test_normalize_clamps_out_of_range() {
        assert_eq!(analyze(json!({"confidence_score": 140})).confidence.value(), 100);
        assert_eq!(analyze(json!({"confidence_score": -3})).confidence.value(), 0);
        assert_eq!(analyze(json!({"confidence_score": 72.5})).confidence.value(), 73);
    }

    #[test]
    fn test_normalize_string_score() {
        assert_eq!(analyze(json!({"confidence_score": "85%"})).confidence.value(), 85);
        assert_eq!(analyze(json!({"confidence_score": "high"})).confidence.value(), 0);
    }

    #[test]
    fn test_normalize_missing_fields() {
        let analysis = analyze(json!({}));
        assert_eq!(analysis.confidence.value(), 0);
        assert!(analysis.questions.is_empty());
    }

    #[test]
    fn test_normalize_drops_blank_and_non_string_questions() {
        let analysis = analyze(json!({
            "confidence_score": 50,
            "questions": ["  Are there exceptions?  ", "", 7, null, "   ", "What is the scope?"]
        }));
        assert_eq!(
            analysis.questions,
            vec!["Are there exceptions?", "What is the scope?"]
        );
    }

    #[test]
    fn test_normalize_single_string_question() {
        let analysis = analyze(json!({"confidence_score": 10, "questions": "Why?"}));
        assert_eq!(analysis.questions, vec!["Why?"]);
    }

    #[test]
    fn test_finalize_request_shape() {
        let pairs = vec![QaPair {
            question: "What about sale items?".to_string(),
            answer: "Sale items are final".to_string(),
        }];
        let body = serde_json::to_value(FinalizeRequest {
            original_text: "Returns are accepted within 30 days",
            qa_pairs: &pairs,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "original_text": "Returns are accepted within 30 days",
                "qa_pairs": [{"q": "What about sale items?", "a": "Sale items are final"}]
            })
        );
    }

    #[test]
    fn test_resolution_requires_topic_id() {
        let res: ResolveResponse = serde_json::from_value(json!({"topic_name": "Shipping"})).unwrap();
        assert!(res.into_resolution().is_none());

        let res: ResolveResponse =
            serde_json::from_value(json!({"topic_id": "  ", "topic_name": "Shipping"})).unwrap();
        assert!(res.into_resolution().is_none());
    }

    #[test]
    fn test_resolution_full() {
        let res: ResolveResponse = serde_json::from_value(json!({
            "topic_id": "t1",
            "topic_name": "Shipping",
            "action": "found"
        }))
        .unwrap();
        let resolution = res.into_resolution().unwrap();
        assert_eq!(resolution.topic_id, TopicId::new("t1"));
        assert_eq!(resolution.topic_name, "Shipping");
        assert_eq!(resolution.action, ResolutionAction::Found);
    }

    #[test]
    fn test_resolution_name_falls_back_to_id() {
        let res: ResolveResponse = serde_json::from_value(json!({"topic_id": "t9"})).unwrap();
        let resolution = res.into_resolution().unwrap();
        assert_eq!(resolution.topic_name, "t9");
        assert_eq!(resolution.action, ResolutionAction::Unknown);
    }
}
