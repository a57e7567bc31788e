//! Knowledge-base terminology lookup (C5): best-effort RAG queries that
//! populate the terminology cache (C4).

use serde_json::json;

use crate::error::{log_and_contain, EngineError};
use crate::llm::{AskRequest, LlmWidget};
use crate::terminology::cache::{cache_key, CachedTerm, TerminologyCache};

#[derive(Debug, Clone, Default)]
pub struct RagLookupResult {
    pub terms: Vec<CachedTerm>,
    pub source_count: usize,
    pub from_cache: bool,
}

const KNOWLEDGE_BASE_SEARCH_LIMIT: u32 = 5;

pub async fn lookup_terminology(
    industry: &str,
    source_language: &str,
    target_language: &str,
    cache: &TerminologyCache,
    widget: &dyn LlmWidget,
) -> RagLookupResult {
    let key = cache_key(industry, source_language, target_language);
    if let Some(terms) = cache.get(&key) {
        return RagLookupResult {
            terms,
            source_count: 0,
            from_cache: true,
        };
    }

    let schema = json!({
        "type": "object",
        "properties": {
            "terms": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "original": {"type": "string"},
                        "translation": {"type": "string"},
                        "context": {"type": "string"}
                    }
                }
            },
            "foundGlossary": {"type": "boolean"}
        }
    });
    let query = format!("glossary terminology {industry} translation {source_language} {target_language}");
    let request = AskRequest::structured(
        format!("Find preferred terminology translations for a {industry} document."),
        schema,
    )
    .with_knowledge_base_search(query, None, KNOWLEDGE_BASE_SEARCH_LIMIT);

    let response = widget.ask(request).await;
    if !response.success {
        return log_and_contain(
            EngineError::LlmCallFailed(
                response.error.unwrap_or_else(|| "RAG lookup failed".to_string()),
            ),
            RagLookupResult::default(),
        );
    }

    let terms: Vec<CachedTerm> = response
        .result
        .as_ref()
        .and_then(|value| value.get("terms"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    let original = entry.get("original")?.as_str()?.to_string();
                    let translation = entry.get("translation")?.as_str()?.to_string();
                    let context = entry
                        .get("context")
                        .and_then(|c| c.as_str())
                        .map(str::to_string);
                    Some(CachedTerm {
                        original,
                        translation,
                        context,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if !terms.is_empty() {
        cache.set(&key, terms.clone());
    }

    RagLookupResult {
        source_count: terms.len(),
        terms,
        from_cache: false,
    }
}
