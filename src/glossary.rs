//! Glossary manager (C6): merges domain baselines, RAG terms, and
//! LLM-extracted terms into one consistency-enforcing map, keyed
//! case-insensitively by the original term.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::detect::Industry;
use crate::error::{log_and_contain, EngineError};
use crate::llm::{AskRequest, LlmWidget};
use crate::terminology::CachedTerm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermType {
    ProperNoun,
    TechnicalTerm,
    CompanyName,
    ProductName,
    RagTerm,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermSource {
    Extracted,
    Rag,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub original: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
    pub term_type: TermType,
    pub source: TermSource,
    pub occurrences: usize,
}

/// Plain key -> term map, the shape persisted state stores the glossary as.
pub type GlossaryMap = HashMap<String, GlossaryTerm>;

const MAX_EXTRACTION_CANDIDATES: usize = 50;

#[derive(Debug, Default)]
pub struct GlossaryManager {
    terms: GlossaryMap,
}

impl GlossaryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the glossary from a built-in per-industry terminology table.
    /// Never overwrites an already-present entry (a fresh manager is
    /// expected, but this keeps `set_context` idempotent if called twice).
    pub fn set_context(&mut self, industry: Industry, target_language: &str) {
        for (original, translated) in seed::terms_for(industry, target_language) {
            self.terms.entry(key_of(original)).or_insert(GlossaryTerm {
                original: original.to_string(),
                translated: Some(translated.to_string()),
                term_type: TermType::Other,
                source: TermSource::User,
                occurrences: 0,
            });
        }
    }

    /// Writes every RAG entry, unconditionally overwriting any baseline
    /// entry under the same key: RAG always wins.
    pub fn merge_rag_terms(&mut self, rag_terms: &[CachedTerm]) {
        for term in rag_terms {
            self.terms.insert(
                key_of(&term.original),
                GlossaryTerm {
                    original: term.original.clone(),
                    translated: Some(term.translation.clone()),
                    term_type: TermType::RagTerm,
                    source: TermSource::Rag,
                    occurrences: 0,
                },
            );
        }
    }

    /// Asks the LLM to classify candidate terms in `document_text` and
    /// merges the result. Extraction never overwrites an entry whose
    /// source is `Rag`.
    pub async fn extract_terms(
        &mut self,
        document_text: &str,
        source_language: &str,
        widget: &dyn LlmWidget,
    ) {
        let schema = json!({
            "type": "object",
            "properties": {
                "terms": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "original": {"type": "string"},
                            "category": {"type": "string", "enum": ["proper_noun","technical_term","company_name","product_name","other"]},
                            "action": {"type": "string", "enum": ["TRANSLATE","KEEP","SPECIFIC"]},
                            "translation": {"type": "string"}
                        },
                        "required": ["original", "category", "action"]
                    }
                }
            }
        });
        let request = AskRequest::structured(
            format!(
                "Identify up to {MAX_EXTRACTION_CANDIDATES} proper nouns, technical terms, company names, and product names in this {source_language} document that a translator should handle consistently. For each, say whether it should be TRANSLATE (translate normally), KEEP (keep as-is), or SPECIFIC (use a specific translation).\n\n{document_text}"
            ),
            schema,
        );

        let response = widget.ask(request).await;
        if !response.success {
            log_and_contain(
                EngineError::LlmCallFailed(
                    response.error.unwrap_or_else(|| "term extraction failed".to_string()),
                ),
                (),
            );
            return;
        }

        let Some(candidates) = response
            .result
            .as_ref()
            .and_then(|v| v.get("terms"))
            .and_then(|v| v.as_array())
        else {
            return;
        };

        for candidate in candidates.iter().take(MAX_EXTRACTION_CANDIDATES) {
            let Some(original) = candidate.get("original").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(category) = candidate.get("category").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(action) = candidate.get("action").and_then(|v| v.as_str()) else {
                continue;
            };
            let key = key_of(original);
            if matches!(self.terms.get(&key), Some(existing) if existing.source == TermSource::Rag)
            {
                continue;
            }

            let translated = match action {
                "KEEP" => Some(original.to_string()),
                "SPECIFIC" => candidate
                    .get("translation")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                _ => None,
            };

            self.terms.insert(
                key,
                GlossaryTerm {
                    original: original.to_string(),
                    translated,
                    term_type: term_type_of(category),
                    source: TermSource::Extracted,
                    occurrences: 1,
                },
            );
        }
    }

    /// Top `cap` terms (RAG first, then by occurrence count descending),
    /// rendered as `- "original" -> "translated"`, RAG entries annotated.
    /// Empty glossary renders as the empty string.
    pub fn build_glossary_prompt(&self, cap: usize) -> String {
        if self.terms.is_empty() {
            return String::new();
        }
        let mut terms: Vec<&GlossaryTerm> = self.terms.values().collect();
        terms.sort_by(|a, b| {
            let rag_rank = |t: &GlossaryTerm| if t.source == TermSource::Rag { 0 } else { 1 };
            rag_rank(a)
                .cmp(&rag_rank(b))
                .then(b.occurrences.cmp(&a.occurrences))
        });
        terms
            .into_iter()
            .take(cap)
            .map(|term| {
                let translated = term.translated.as_deref().unwrap_or(&term.original);
                let suffix = if term.source == TermSource::Rag {
                    " [company preferred]"
                } else {
                    ""
                };
                format!("- \"{}\" \u{2192} \"{translated}\"{suffix}", term.original)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Adds a new term (if unknown) or fills in the translation of an
    /// existing untranslated term. Never overwrites an already-translated
    /// term, RAG or otherwise.
    pub fn update_from_batch(&mut self, additions: &HashMap<String, String>) {
        for (original, translated) in additions {
            let key = key_of(original);
            match self.terms.get_mut(&key) {
                Some(existing) if existing.translated.is_none() => {
                    existing.translated = Some(translated.clone());
                }
                Some(_) => {}
                None => {
                    self.terms.insert(
                        key,
                        GlossaryTerm {
                            original: original.clone(),
                            translated: Some(translated.clone()),
                            term_type: TermType::Other,
                            source: TermSource::Extracted,
                            occurrences: 1,
                        },
                    );
                }
            }
        }
    }

    pub fn get_glossary(&self) -> GlossaryMap {
        self.terms.clone()
    }

    pub fn restore_glossary(&mut self, glossary: GlossaryMap) {
        self.terms = glossary;
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn key_of(original: &str) -> String {
    original.to_lowercase()
}

fn term_type_of(category: &str) -> TermType {
    match category {
        "proper_noun" => TermType::ProperNoun,
        "technical_term" => TermType::TechnicalTerm,
        "company_name" => TermType::CompanyName,
        "product_name" => TermType::ProductName,
        _ => TermType::Other,
    }
}

mod seed {
    use crate::detect::Industry;

    /// A deliberately small built-in baseline: enough common domain terms
    /// per industry/language pair to seed consistent handling before RAG
    /// or extraction run. Source language is always English.
    pub fn terms_for(industry: Industry, target_language: &str) -> Vec<(&'static str, &'static str)> {
        let lang = target_language.to_lowercase();
        let lang = lang.get(0..2).unwrap_or(&lang).to_string();
        match (industry, lang.as_str()) {
            (Industry::Legal, "es") => vec![("plaintiff", "demandante"), ("defendant", "demandado")],
            (Industry::Legal, "fr") => vec![("plaintiff", "demandeur"), ("defendant", "défendeur")],
            (Industry::Medical, "es") => vec![("patient", "paciente"), ("diagnosis", "diagnóstico")],
            (Industry::Medical, "fr") => vec![("patient", "patient"), ("diagnosis", "diagnostic")],
            (Industry::Technical, "es") => vec![("server", "servidor"), ("database", "base de datos")],
            (Industry::Technical, "fr") => vec![("server", "serveur"), ("database", "base de données")],
            _ => Vec::new(),
        }
    }
}
