//! Language detector (C2): sample the document, ask the LLM to identify
//! the source language. Never fails outward — on any problem it returns
//! the `Unknown`/`0` fallback, logged via [`crate::error::log_and_contain`].

use serde_json::json;

use crate::config::TranslationConfig;
use crate::error::{log_and_contain, EngineError};
use crate::llm::{AskRequest, LlmWidget};

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDetection {
    pub language: String,
    /// Normalized to 0.0..=1.0 (the LLM reports 0..100).
    pub confidence: f64,
}

impl LanguageDetection {
    fn unknown() -> Self {
        Self {
            language: "Unknown".to_string(),
            confidence: 0.0,
        }
    }
}

/// Concatenate three `slice_chars`-character slices (start, middle, end)
/// separated by `[...]` markers when `text` exceeds `threshold_chars`;
/// otherwise return the full text.
pub fn representative_sample(text: &str, threshold_chars: usize, slice_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= threshold_chars {
        return text.to_string();
    }
    let start: String = chars[..slice_chars.min(chars.len())].iter().collect();
    let mid_start = chars.len() / 2 - slice_chars / 2;
    let mid: String = chars[mid_start..(mid_start + slice_chars).min(chars.len())]
        .iter()
        .collect();
    let end_start = chars.len().saturating_sub(slice_chars);
    let end: String = chars[end_start..].iter().collect();
    format!("{start}\n[...]\n{mid}\n[...]\n{end}")
}

pub async fn detect_language(
    document_text: &str,
    config: &TranslationConfig,
    widget: &dyn LlmWidget,
) -> LanguageDetection {
    let sample = representative_sample(
        document_text,
        config.language_sample_threshold_chars,
        config.language_sample_slice_chars,
    );

    let schema = json!({
        "type": "object",
        "properties": {
            "language": {"type": "string"},
            "confidence": {"type": "number"}
        },
        "required": ["language", "confidence"]
    });
    let request = AskRequest::structured(
        format!(
            "Identify the primary language of the following text. Respond with the language name and your confidence (0-100).\n\n{sample}"
        ),
        schema,
    );

    let response = widget.ask(request).await;
    if !response.success {
        return log_and_contain(
            EngineError::LlmCallFailed(
                response.error.unwrap_or_else(|| "language detection failed".to_string()),
            ),
            LanguageDetection::unknown(),
        );
    }

    let parsed = response.result.and_then(|value| {
        let language = value.get("language")?.as_str()?.to_string();
        let confidence = value.get("confidence")?.as_f64()?;
        Some(LanguageDetection {
            language,
            confidence: (confidence / 100.0).clamp(0.0, 1.0),
        })
    });

    match parsed {
        Some(detection) => detection,
        None => log_and_contain(
            EngineError::LlmCallFailed("malformed language-detection response".to_string()),
            LanguageDetection::unknown(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::FakeLlmWidget;
    use crate::llm::AskResponse;

    #[test]
    fn short_text_is_used_whole() {
        let sample = representative_sample("hello", 2000, 600);
        assert_eq!(sample, "hello");
    }

    #[test]
    fn long_text_is_sampled_in_three_slices() {
        let text = "a".repeat(3000);
        let sample = representative_sample(&text, 2000, 600);
        assert_eq!(sample.matches("[...]").count(), 2);
    }

    #[tokio::test]
    async fn failure_falls_back_to_unknown() {
        let widget = FakeLlmWidget::new(vec![AskResponse::failure("down")]);
        let config = TranslationConfig::default();
        let detection = detect_language("hello world", &config, &widget).await;
        assert_eq!(detection.language, "Unknown");
        assert_eq!(detection.confidence, 0.0);
    }

    #[tokio::test]
    async fn success_normalizes_confidence_to_unit_interval() {
        let widget = FakeLlmWidget::new(vec![AskResponse::ok(
            json!({"language": "French", "confidence": 87.0}),
        )]);
        let config = TranslationConfig::default();
        let detection = detect_language("bonjour le monde", &config, &widget).await;
        assert_eq!(detection.language, "French");
        assert!((detection.confidence - 0.87).abs() < 1e-9);
    }
}
