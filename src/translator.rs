//! Segment translator (C8): turns one batch into a structured LLM request
//! and rebuilds the per-segment translation result.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::batching::Batch;
use crate::error::{EngineError, EngineResult};
use crate::llm::{AskRequest, LlmWidget};

/// One segment's translation result, ready for C9 to consume. `node_index`
/// and `paragraph_index` identify where in the original tree this segment
/// came from; `id` is the batch-scoped id the LLM exchange used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedSegment {
    pub id: String,
    pub node_index: usize,
    pub paragraph_index: usize,
    pub original_text: String,
    pub translated_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchTranslation {
    pub batch_index: usize,
    pub segments: Vec<TranslatedSegment>,
    pub glossary_additions: HashMap<String, String>,
}

fn render_marks(marks: &[crate::model::Mark]) -> String {
    if marks.is_empty() {
        return String::new();
    }
    let names = marks
        .iter()
        .map(|m| m.kind.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("\u{27e8}{names}\u{27e9}")
}

fn build_prompt(batch: &Batch, industry: Option<&str>, glossary_prompt: &str) -> String {
    let mut lines = Vec::new();
    if let Some(industry) = industry {
        lines.push(format!("DOCUMENT TYPE: {industry} document"));
    }
    if !glossary_prompt.is_empty() {
        lines.push(glossary_prompt.to_string());
    }
    lines.push("SEGMENTS TO TRANSLATE:".to_string());
    for paragraph in &batch.paragraphs {
        for segment in &paragraph.segments {
            let id = segment.global_id(paragraph.paragraph_index);
            let marks = render_marks(&segment.marks);
            lines.push(format!("[{id}] \"{}\"{marks}", segment.text));
        }
    }
    lines.join("\n\n")
}

const SYSTEM_INSTRUCTIONS: &str = "Return the same segment IDs, one translation each. Treat format annotations in angle brackets as read-only hints, not text to translate or echo back. Translations may re-order words internally as needed for fluency. Preserve proper nouns and any terms given in the glossary exactly as specified.";

/// Requests a structured translation of every segment in `batch`.
pub async fn translate_batch(
    batch: &Batch,
    source_language: &str,
    target_language: &str,
    industry: Option<&str>,
    glossary_prompt: &str,
    widget: &dyn LlmWidget,
) -> EngineResult<BatchTranslation> {
    if !widget.supports_structured_output() {
        return translate_batch_prose(batch, source_language, target_language, widget).await;
    }

    let schema = json!({
        "type": "object",
        "properties": {
            "translations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "text": {"type": "string"}
                    },
                    "required": ["id", "text"]
                }
            },
            "newTerms": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "original": {"type": "string"},
                        "translated": {"type": "string"}
                    }
                }
            }
        },
        "required": ["translations"]
    });

    let prompt = format!(
        "{SYSTEM_INSTRUCTIONS}\n\nTranslate from {source_language} to {target_language}.\n\n{}",
        build_prompt(batch, industry, glossary_prompt)
    );
    let word_count = batch.word_count.max(1);
    let request = AskRequest::structured(prompt, schema)
        .with_max_tokens((word_count * 3) as u32);

    let response = widget.ask(request).await;
    if !response.success {
        return Err(EngineError::BatchTranslationFailed {
            batch_index: batch.batch_index,
            message: response.error.unwrap_or_else(|| "translation failed".to_string()),
        });
    }
    let Some(result) = response.result else {
        return Err(EngineError::BatchTranslationFailed {
            batch_index: batch.batch_index,
            message: "structured response had no result".to_string(),
        });
    };

    let mut by_id: HashMap<String, String> = result
        .get("translations")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    let id = entry.get("id")?.as_str()?.to_string();
                    let text = entry.get("text")?.as_str()?.to_string();
                    Some((id, text))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut segments = Vec::new();
    for paragraph in &batch.paragraphs {
        for segment in &paragraph.segments {
            let id = segment.global_id(paragraph.paragraph_index);
            let translated_text = by_id.remove(&id).unwrap_or_else(|| segment.text.clone());
            segments.push(TranslatedSegment {
                id,
                node_index: paragraph.node_index,
                paragraph_index: paragraph.paragraph_index,
                original_text: segment.text.clone(),
                translated_text,
            });
        }
    }

    let glossary_additions: HashMap<String, String> = result
        .get("newTerms")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    let original = entry.get("original")?.as_str()?.to_string();
                    let translated = entry.get("translated")?.as_str()?.to_string();
                    Some((original, translated))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(BatchTranslation {
        batch_index: batch.batch_index,
        segments,
        glossary_additions,
    })
}

/// Fallback path used when the widget has no structured-output support:
/// one paragraph per request line, split back out on blank-line boundaries.
/// Marks are dropped (there is no segment-level id to hang them on).
async fn translate_batch_prose(
    batch: &Batch,
    source_language: &str,
    target_language: &str,
    widget: &dyn LlmWidget,
) -> EngineResult<BatchTranslation> {
    let paragraph_texts: Vec<String> = batch
        .paragraphs
        .iter()
        .map(|p| {
            p.segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let prompt = format!(
        "Translate the following text from {source_language} to {target_language}. \
         Each paragraph is separated by a blank line; return the same number of \
         paragraphs, in order, separated the same way.\n\n{}",
        paragraph_texts.join("\n\n")
    );
    let response = widget.ask(AskRequest::prose(prompt)).await;
    if !response.success {
        return Err(EngineError::BatchTranslationFailed {
            batch_index: batch.batch_index,
            message: response.error.unwrap_or_else(|| "translation failed".to_string()),
        });
    }
    let Some(text) = response.result_as_str() else {
        return Err(EngineError::BatchTranslationFailed {
            batch_index: batch.batch_index,
            message: "prose response had no text result".to_string(),
        });
    };
    let translated_paragraphs: Vec<&str> = text.split("\n\n").collect();

    let mut segments = Vec::new();
    for (i, paragraph) in batch.paragraphs.iter().enumerate() {
        let original_text = paragraph_texts[i].clone();
        let translated_text = translated_paragraphs
            .get(i)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| original_text.clone());
        let id = format!("p{}_s_0", paragraph.paragraph_index);
        segments.push(TranslatedSegment {
            id,
            node_index: paragraph.node_index,
            paragraph_index: paragraph.paragraph_index,
            original_text,
            translated_text,
        });
    }

    Ok(BatchTranslation {
        batch_index: batch.batch_index,
        segments,
        glossary_additions: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::{create_batches, Segment};
    use crate::config::TranslationConfig;
    use crate::llm::test_support::FakeLlmWidget;
    use crate::llm::AskResponse;
    use crate::model::{Document, Node, HEADING, PARAGRAPH};

    fn text(s: &str) -> Node {
        Node::text_leaf(s, None)
    }

    fn sample_batch() -> Batch {
        let config = TranslationConfig::default();
        let mut heading = Node::branch(HEADING, vec![text("Intro")]);
        heading
            .attrs_mut()
            .insert("level".to_string(), serde_json::json!(1));
        let document = Document::new(vec![
            heading,
            Node::branch(PARAGRAPH, vec![text("Hello there")]),
        ]);
        create_batches(&document, &config).into_iter().next().unwrap()
    }

    #[tokio::test]
    async fn structured_translation_maps_back_onto_segments() {
        let batch = sample_batch();
        let first_paragraph_batch = Batch {
            paragraphs: vec![batch.paragraphs[0].clone()],
            ..batch
        };
        let widget = FakeLlmWidget::new(vec![AskResponse::ok(json!({
            "translations": [{"id": "p0_s_0", "text": "Introducción"}],
            "newTerms": [{"original": "Intro", "translated": "Introducción"}]
        }))]);
        let result = translate_batch(&first_paragraph_batch, "en", "es", None, "", &widget)
            .await
            .unwrap();
        assert_eq!(result.segments[0].translated_text, "Introducción");
        assert_eq!(
            result.glossary_additions.get("Intro"),
            Some(&"Introducción".to_string())
        );
    }

    #[tokio::test]
    async fn missing_translation_falls_back_to_original_text() {
        let batch = sample_batch();
        let widget = FakeLlmWidget::new(vec![AskResponse::ok(json!({"translations": []}))]);
        let result = translate_batch(&batch, "en", "es", None, "", &widget)
            .await
            .unwrap();
        for segment in &result.segments {
            assert_eq!(segment.translated_text, segment.original_text);
        }
    }

    #[tokio::test]
    async fn llm_failure_is_a_fatal_batch_error() {
        let batch = sample_batch();
        let widget = FakeLlmWidget::new(vec![AskResponse::failure("timeout")]);
        let result = translate_batch(&batch, "en", "es", None, "", &widget).await;
        assert!(matches!(
            result,
            Err(EngineError::BatchTranslationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn prose_fallback_used_when_structured_output_unsupported() {
        let batch = sample_batch();
        let widget =
            FakeLlmWidget::new(vec![AskResponse::ok(json!("Introducción\n\nHola"))])
                .without_structured_output();
        let result = translate_batch(&batch, "en", "es", None, "", &widget)
            .await
            .unwrap();
        assert_eq!(result.segments.len(), batch.paragraphs.len());
        assert_eq!(result.segments[0].translated_text, "Introducción");
    }

    #[test]
    fn prompt_includes_marks_suffix_only_when_present() {
        let segment_with_marks = Segment {
            id: "s_0".to_string(),
            text: "Foo".to_string(),
            marks: vec![crate::model::Mark {
                kind: "bold".to_string(),
                attrs: None,
            }],
        };
        let rendered = render_marks(&segment_with_marks.marks);
        assert!(rendered.contains("bold"));
        assert_eq!(render_marks(&[]), "");
    }
}
