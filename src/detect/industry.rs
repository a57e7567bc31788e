//! Industry classifier (C3): keyword scoring with optional LLM refinement.

use std::collections::HashMap;

use regex::Regex;
use serde_json::json;

use crate::config::TranslationConfig;
use crate::error::{log_and_contain, EngineError};
use crate::llm::{AskRequest, LlmWidget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Industry {
    Legal,
    Medical,
    Technical,
    Financial,
    Marketing,
    Academic,
    General,
}

impl Industry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Legal => "legal",
            Industry::Medical => "medical",
            Industry::Technical => "technical",
            Industry::Financial => "financial",
            Industry::Marketing => "marketing",
            Industry::Academic => "academic",
            Industry::General => "general",
        }
    }

    pub fn all() -> [Industry; 7] {
        [
            Industry::Legal,
            Industry::Medical,
            Industry::Technical,
            Industry::Financial,
            Industry::Marketing,
            Industry::Academic,
            Industry::General,
        ]
    }

    pub fn from_str(s: &str) -> Option<Industry> {
        Self::all().into_iter().find(|i| i.as_str() == s)
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Industry::Legal => &["agreement", "plaintiff", "defendant", "clause", "jurisdiction", "statute", "liability"],
            Industry::Medical => &["patient", "diagnosis", "treatment", "symptom", "dosage", "clinical", "prescription"],
            Industry::Technical => &["api", "function", "algorithm", "server", "database", "configuration", "deployment"],
            Industry::Financial => &["revenue", "asset", "liability", "investment", "portfolio", "dividend", "equity"],
            Industry::Marketing => &["brand", "campaign", "audience", "engagement", "conversion", "marketing", "customer"],
            Industry::Academic => &["research", "hypothesis", "methodology", "citation", "abstract", "thesis", "peer-reviewed"],
            Industry::General => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndustryClassification {
    pub industry: Industry,
    /// Normalized 0.0..=1.0
    pub confidence: f64,
    pub keywords: Vec<String>,
}

/// Case-insensitive whole-word counts per industry's keyword list.
fn score_keywords(text: &str) -> HashMap<Industry, (usize, Vec<String>)> {
    let mut scores = HashMap::new();
    let lowered = text.to_lowercase();
    for industry in Industry::all() {
        let mut count = 0;
        let mut matched = Vec::new();
        for keyword in industry.keywords() {
            let pattern = format!(r"\b{}\b", regex::escape(keyword));
            if let Ok(re) = Regex::new(&pattern) {
                let hits = re.find_iter(&lowered).count();
                if hits > 0 {
                    count += hits;
                    matched.push((*keyword).to_string());
                }
            }
        }
        scores.insert(industry, (count, matched));
    }
    scores
}

fn classify_by_keywords(text: &str) -> IndustryClassification {
    let scores = score_keywords(text);
    let word_count = text.split_whitespace().count().max(1);

    let (industry, (max_score, keywords)) = scores
        .into_iter()
        .max_by_key(|(_, (score, _))| *score)
        .unwrap_or((Industry::General, (0, Vec::new())));

    let confidence = (max_score as f64 / (word_count as f64 / 100.0).max(1.0)).min(1.0);

    IndustryClassification {
        industry: if max_score == 0 { Industry::General } else { industry },
        confidence,
        keywords,
    }
}

pub async fn classify_industry(
    document_text: &str,
    config: &TranslationConfig,
    widget: &dyn LlmWidget,
) -> IndustryClassification {
    let keyword_result = classify_by_keywords(document_text);
    if keyword_result.confidence >= config.industry_confidence_threshold {
        return keyword_result;
    }

    let schema = json!({
        "type": "object",
        "properties": {
            "industry": {"type": "string", "enum": ["legal","medical","technical","financial","marketing","academic","general"]},
            "keywords": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["industry"]
    });
    let request = AskRequest::structured(
        format!(
            "Classify the domain of the following document into exactly one of: legal, medical, technical, financial, marketing, academic, general.\n\n{}",
            document_text.chars().take(2000).collect::<String>()
        ),
        schema,
    );

    let response = widget.ask(request).await;
    if !response.success {
        return log_and_contain(
            EngineError::LlmCallFailed(
                response.error.unwrap_or_else(|| "industry classification failed".to_string()),
            ),
            keyword_result,
        );
    }

    let refined = response.result.as_ref().and_then(|value| {
        let industry = Industry::from_str(value.get("industry")?.as_str()?)?;
        let keywords = value
            .get("keywords")
            .and_then(|k| k.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Some(IndustryClassification {
            industry,
            confidence: keyword_result.confidence,
            keywords,
        })
    });

    refined.unwrap_or(keyword_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::FakeLlmWidget;
    use crate::llm::AskResponse;

    #[test]
    fn strong_keyword_signal_skips_llm() {
        let text = "The patient's diagnosis and treatment plan included dosage adjustments and clinical prescription review for the patient.";
        let result = classify_by_keywords(text);
        assert_eq!(result.industry, Industry::Medical);
    }

    #[test]
    fn no_keywords_falls_back_to_general() {
        let result = classify_by_keywords("the quick brown fox jumps over the lazy dog");
        assert_eq!(result.industry, Industry::General);
    }

    #[tokio::test]
    async fn weak_signal_invokes_llm_refinement() {
        let widget = FakeLlmWidget::new(vec![AskResponse::ok(
            serde_json::json!({"industry": "marketing", "keywords": ["campaign"]}),
        )]);
        let config = TranslationConfig::default();
        let result = classify_industry("a short ambiguous sentence", &config, &widget).await;
        assert_eq!(result.industry, Industry::Marketing);
    }

    #[tokio::test]
    async fn llm_failure_keeps_keyword_result() {
        let widget = FakeLlmWidget::new(vec![AskResponse::failure("down")]);
        let config = TranslationConfig::default();
        let result = classify_industry("a short ambiguous sentence", &config, &widget).await;
        assert_eq!(result.industry, Industry::General);
    }
}
