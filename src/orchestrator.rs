//! Orchestrator (C11): the phased state machine tying every other
//! component together into `translate()`/`resume()`, plus the two-way
//! cancellation handshake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;

use crate::accumulator::{DocumentAccumulator, DocumentUpdateSink};
use crate::batching::{create_batches, Batch};
use crate::config::TranslationConfig;
use crate::detect::{classify_industry, detect_language, Industry};
use crate::glossary::GlossaryManager;
use crate::llm::{CancelChoice, CancelRequestHandler, LlmWidget};
use crate::model::{extract_document_text, Document};
use crate::storage::{IncompleteSummary, PersistedState, PersistenceStore};
use crate::terminology::{lookup_terminology, TerminologyCache};
use crate::translator::{translate_batch, BatchTranslation};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap()
}

/// A stable id for a document: blake3 of the first 10 000 characters of its
/// concatenated text (not its JSON structure), reduced to a `u32` and
/// rendered in base36.
fn document_id(document: &Document) -> String {
    let sample: String = extract_document_text(document).chars().take(10_000).collect();
    let digest = blake3::hash(sample.as_bytes());
    let n = u32::from_be_bytes(digest.as_bytes()[0..4].try_into().unwrap());
    format!("doc_{}", to_base36(n))
}

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub source_language: Option<String>,
    pub target_language: String,
    pub use_rag: bool,
    pub skip_industry_detection: bool,
    pub skip_language_detection: bool,
}

impl TranslateOptions {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            source_language: None,
            target_language: target_language.into(),
            use_rag: true,
            skip_industry_detection: false,
            skip_language_detection: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    DetectingLanguage,
    ClassifyingIndustry,
    LookingUpTerminology,
    ExtractingGlossary,
    Batching,
    Translating,
    Paused,
    Completed,
    Error,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub status: Status,
    pub percentage: u8,
    pub current_section: Option<String>,
    pub completed_batches: usize,
    pub total_batches: usize,
    pub estimated_time_remaining: Duration,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone)]
pub enum TranslationOutcome {
    Completed {
        document: Document,
        glossary: crate::glossary::GlossaryMap,
    },
    Error {
        message: String,
        batch_index: Option<usize>,
    },
    Cancelled {
        percentage: u8,
        user_choice: CancelChoice,
    },
}

/// Grouped callback sinks. Rust has no optional-callback-object literal, so
/// each sink is an explicit boxed closure or trait object; `on_cancel_request`
/// is the only one that's genuinely optional (no handshake without it).
pub struct Callbacks {
    pub on_progress: Box<dyn Fn(&ProgressEvent) + Send + Sync>,
    pub on_complete: Box<dyn Fn(&Document) + Send + Sync>,
    pub on_error: Box<dyn Fn(&str, Option<usize>) + Send + Sync>,
    pub on_cancel_request: Option<Arc<dyn CancelRequestHandler>>,
}

impl Callbacks {
    pub fn silent() -> Self {
        Self {
            on_progress: Box::new(|_| {}),
            on_complete: Box::new(|_| {}),
            on_error: Box::new(|_, _| {}),
            on_cancel_request: None,
        }
    }
}

struct ActiveSession {
    cancel_flag: Arc<AtomicBool>,
    cancel_handler: Option<Arc<dyn CancelRequestHandler>>,
    cancel_tx: Arc<Mutex<Option<oneshot::Sender<CancelChoice>>>>,
    status: Arc<Mutex<Status>>,
    completed_batches: Arc<Mutex<usize>>,
    total_batches: usize,
}

struct ActiveGuard<'a> {
    active: &'a Mutex<Option<ActiveSession>>,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self.active.lock().unwrap() = None;
    }
}

pub struct Orchestrator {
    config: TranslationConfig,
    terminology_cache: TerminologyCache,
    persistence: PersistenceStore,
    active: Mutex<Option<ActiveSession>>,
}

impl Orchestrator {
    pub fn new(config: TranslationConfig, db: Option<Arc<redb::Database>>) -> Self {
        let terminology_cache = TerminologyCache::new(
            db.clone(),
            config.terminology_cache_ttl(),
            config.terminology_cache_max_entries,
        );
        let persistence = PersistenceStore::new(db);
        Self {
            config,
            terminology_cache,
            persistence,
            active: Mutex::new(None),
        }
    }

    pub fn check_for_incomplete_translation(&self) -> Option<PersistedState> {
        self.persistence.load().filter(PersistedState::is_incomplete)
    }

    pub fn get_incomplete_summary(&self) -> Option<IncompleteSummary> {
        self.persistence.get_incomplete_summary()
    }

    pub fn discard_incomplete(&self) {
        self.persistence.clear();
    }

    pub fn get_state(&self) -> Status {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| *s.status.lock().unwrap())
            .unwrap_or(Status::Idle)
    }

    pub fn get_progress(&self) -> u8 {
        let guard = self.active.lock().unwrap();
        let Some(session) = guard.as_ref() else {
            return 0;
        };
        if session.total_batches == 0 {
            return 100;
        }
        let completed = *session.completed_batches.lock().unwrap();
        ((completed as f64 / session.total_batches as f64) * 100.0).round() as u8
    }

    /// Signals cancellation of the in-flight `translate()`/`resume()` call.
    /// A no-op if nothing is running. Awaits the host's resolution of the
    /// cancel prompt, which unblocks the translate loop at its next
    /// between-batch checkpoint.
    pub async fn cancel(&self) {
        let (handler, tx_holder) = {
            let guard = self.active.lock().unwrap();
            match guard.as_ref() {
                Some(session) => {
                    session.cancel_flag.store(true, Ordering::SeqCst);
                    *session.status.lock().unwrap() = Status::Paused;
                    (session.cancel_handler.clone(), Arc::clone(&session.cancel_tx))
                }
                None => return,
            }
        };
        let choice = match handler {
            Some(handler) => handler.request().await,
            None => CancelChoice::Keep,
        };
        if let Some(tx) = tx_holder.lock().unwrap().take() {
            let _ = tx.send(choice);
        }
    }

    pub async fn translate(
        &self,
        document: Document,
        options: TranslateOptions,
        widget: &dyn LlmWidget,
        callbacks: Callbacks,
        on_document_update: Option<Box<dyn DocumentUpdateSink>>,
    ) -> TranslationOutcome {
        let document_text = extract_document_text(&document);

        let source_language = match &options.source_language {
            Some(lang) => lang.clone(),
            None if !options.skip_language_detection => {
                detect_language(&document_text, &self.config, widget).await.language
            }
            None => "Unknown".to_string(),
        };

        let industry = if options.skip_industry_detection {
            None
        } else {
            Some(classify_industry(&document_text, &self.config, widget).await.industry)
        };

        let mut glossary = GlossaryManager::new();
        if options.use_rag {
            if let Some(industry) = industry {
                let result = lookup_terminology(
                    industry.as_str(),
                    &source_language,
                    &options.target_language,
                    &self.terminology_cache,
                    widget,
                )
                .await;
                if !result.terms.is_empty() {
                    glossary.merge_rag_terms(&result.terms);
                }
            }
        }

        glossary.set_context(industry.unwrap_or(Industry::General), &options.target_language);
        glossary.extract_terms(&document_text, &source_language, widget).await;

        let batches = create_batches(&document, &self.config);
        if batches.is_empty() {
            let message = "No translatable content found in the document".to_string();
            (callbacks.on_error)(&message, None);
            return TranslationOutcome::Error {
                message,
                batch_index: None,
            };
        }

        let document_id = document_id(&document);
        let started_at = now_secs();
        let accumulator = DocumentAccumulator::new(
            document.clone(),
            batches.len(),
            self.config.milestones.clone(),
            on_document_update,
        );

        self.run_translation_loop(
            document_id,
            document,
            source_language,
            options.target_language,
            industry,
            glossary,
            batches,
            accumulator,
            Vec::new(),
            0,
            started_at,
            widget,
            callbacks,
        )
        .await
    }

    pub async fn resume(
        &self,
        persisted: PersistedState,
        widget: &dyn LlmWidget,
        callbacks: Callbacks,
        on_document_update: Option<Box<dyn DocumentUpdateSink>>,
    ) -> TranslationOutcome {
        let batches = create_batches(&persisted.original_document, &self.config);
        let mut glossary = GlossaryManager::new();
        glossary.restore_glossary(persisted.glossary.clone());

        let mut accumulator = DocumentAccumulator::new(
            persisted.original_document.clone(),
            batches.len(),
            self.config.milestones.clone(),
            on_document_update,
        );
        accumulator.seed_completed(persisted.completed_batches.clone());
        let current_index = persisted.completed_batches.len();

        self.run_translation_loop(
            persisted.document_id.clone(),
            persisted.original_document.clone(),
            persisted.source_language.clone(),
            persisted.target_language.clone(),
            persisted
                .industry
                .as_deref()
                .and_then(Industry::from_str),
            glossary,
            batches,
            accumulator,
            persisted.completed_batches.clone(),
            current_index,
            persisted.started_at,
            widget,
            callbacks,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_translation_loop(
        &self,
        document_id: String,
        original_document: Document,
        source_language: String,
        target_language: String,
        industry: Option<Industry>,
        mut glossary: GlossaryManager,
        batches: Vec<Batch>,
        mut accumulator: DocumentAccumulator,
        mut completed_batches: Vec<BatchTranslation>,
        start_index: usize,
        started_at: u64,
        widget: &dyn LlmWidget,
        callbacks: Callbacks,
    ) -> TranslationOutcome {
        let total_batches = batches.len();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let cancel_tx = Arc::new(Mutex::new(Some(cancel_tx)));
        let status = Arc::new(Mutex::new(Status::Translating));
        let completed_counter = Arc::new(Mutex::new(start_index));

        *self.active.lock().unwrap() = Some(ActiveSession {
            cancel_flag: Arc::clone(&cancel_flag),
            cancel_handler: callbacks.on_cancel_request.clone(),
            cancel_tx,
            status: Arc::clone(&status),
            completed_batches: Arc::clone(&completed_counter),
            total_batches,
        });
        let _guard = ActiveGuard { active: &self.active };

        let persist_state = |completed: &[BatchTranslation], glossary: &GlossaryManager| {
            let state = PersistedState {
                document_id: document_id.clone(),
                source_language: source_language.clone(),
                target_language: target_language.clone(),
                industry: industry.map(|i| i.as_str().to_string()),
                original_document: original_document.clone(),
                total_batches,
                completed_batches: completed.to_vec(),
                glossary: glossary.get_glossary(),
                started_at,
                last_updated: now_secs(),
            };
            self.persistence.save(&state);
        };
        persist_state(&completed_batches, &glossary);

        for batch in batches.iter().skip(start_index) {
            if cancel_flag.load(Ordering::SeqCst) {
                let choice = cancel_rx.await.unwrap_or(CancelChoice::Keep);
                self.persistence.clear();
                let percentage = accumulator.progress_percent();
                *status.lock().unwrap() = Status::Cancelled;
                return TranslationOutcome::Cancelled {
                    percentage,
                    user_choice: choice,
                };
            }

            let glossary_prompt = glossary.build_glossary_prompt(self.config.glossary_prompt_cap);
            let industry_str = industry.map(|i| i.as_str());
            let result = translate_batch(
                batch,
                &source_language,
                &target_language,
                industry_str,
                &glossary_prompt,
                widget,
            )
            .await;

            match result {
                Ok(translation) => {
                    glossary.update_from_batch(&translation.glossary_additions);
                    completed_batches.push(translation.clone());
                    let _ = accumulator.add_batch(translation);
                    *completed_counter.lock().unwrap() = completed_batches.len();
                    persist_state(&completed_batches, &glossary);

                    let percentage = accumulator.progress_percent();
                    (callbacks.on_progress)(&ProgressEvent {
                        status: Status::Translating,
                        percentage,
                        current_section: Some(batch.section_title.clone()),
                        completed_batches: completed_batches.len(),
                        total_batches,
                        estimated_time_remaining: self
                            .config
                            .estimated_time_remaining(total_batches - completed_batches.len()),
                        source_language: source_language.clone(),
                        target_language: target_language.clone(),
                    });
                }
                Err(err) => {
                    *status.lock().unwrap() = Status::Error;
                    let message = err.to_string();
                    (callbacks.on_error)(&message, Some(batch.batch_index));
                    return TranslationOutcome::Error {
                        message,
                        batch_index: Some(batch.batch_index),
                    };
                }
            }
        }

        *status.lock().unwrap() = Status::Completed;
        self.persistence.clear();
        let final_document = accumulator.rebuild_document();
        (callbacks.on_complete)(&final_document);
        (callbacks.on_progress)(&ProgressEvent {
            status: Status::Completed,
            percentage: 100,
            current_section: None,
            completed_batches: total_batches,
            total_batches,
            estimated_time_remaining: Duration::from_secs(0),
            source_language: source_language.clone(),
            target_language: target_language.clone(),
        });

        TranslationOutcome::Completed {
            document: final_document,
            glossary: glossary.get_glossary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::FakeLlmWidget;
    use crate::llm::AskResponse;
    use crate::model::{Node, PARAGRAPH};
    use serde_json::json;
    use std::collections::HashMap;

    fn text(s: &str) -> Node {
        Node::text_leaf(s, None)
    }

    fn options() -> TranslateOptions {
        TranslateOptions {
            source_language: Some("en".to_string()),
            target_language: "es".to_string(),
            use_rag: false,
            skip_industry_detection: true,
            skip_language_detection: true,
        }
    }

    #[test]
    fn cancel_before_any_translate_is_a_no_op() {
        let orchestrator = Orchestrator::new(TranslationConfig::default(), None);
        assert_eq!(orchestrator.get_state(), Status::Idle);
        assert_eq!(orchestrator.get_progress(), 0);
    }

    #[tokio::test]
    async fn empty_document_returns_error_outcome() {
        let orchestrator = Orchestrator::new(TranslationConfig::default(), None);
        let widget = FakeLlmWidget::new(vec![AskResponse::ok(json!({"terms": []}))]);
        let document = Document::new(vec![]);
        let outcome = orchestrator
            .translate(document, options(), &widget, Callbacks::silent(), None)
            .await;
        assert!(matches!(outcome, TranslationOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn happy_path_translates_single_batch_to_completion() {
        let orchestrator = Orchestrator::new(TranslationConfig::default(), None);
        let widget = FakeLlmWidget::new(vec![
            AskResponse::ok(json!({"terms": []})),
            AskResponse::ok(json!({
                "translations": [{"id": "p0_s_0", "text": "Hola mundo"}],
                "newTerms": []
            })),
        ]);
        let document = Document::new(vec![Node::branch(PARAGRAPH, vec![text("Hello world")])]);
        let outcome = orchestrator
            .translate(document, options(), &widget, Callbacks::silent(), None)
            .await;
        match outcome {
            TranslationOutcome::Completed { document, .. } => {
                assert_eq!(crate::model::extract_text(&document.content[0]), "Hola mundo");
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(orchestrator.get_state(), Status::Idle);
    }

    #[tokio::test]
    async fn resume_with_all_batches_already_complete_finishes_immediately() {
        let orchestrator = Orchestrator::new(TranslationConfig::default(), None);
        let document = Document::new(vec![Node::branch(PARAGRAPH, vec![text("Hello")])]);
        let batches = create_batches(&document, &TranslationConfig::default());
        let completed = vec![BatchTranslation {
            batch_index: 0,
            segments: vec![crate::translator::TranslatedSegment {
                id: "p0_s_0".to_string(),
                node_index: 0,
                paragraph_index: 0,
                original_text: "Hello".to_string(),
                translated_text: "Hola".to_string(),
            }],
            glossary_additions: HashMap::new(),
        }];
        let persisted = PersistedState {
            document_id: "doc-1".to_string(),
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            industry: None,
            original_document: document,
            total_batches: batches.len(),
            completed_batches: completed,
            glossary: crate::glossary::GlossaryMap::new(),
            started_at: 0,
            last_updated: 0,
        };
        let widget = FakeLlmWidget::new(vec![]);
        let outcome = orchestrator
            .resume(persisted, &widget, Callbacks::silent(), None)
            .await;
        match outcome {
            TranslationOutcome::Completed { document, .. } => {
                assert_eq!(crate::model::extract_text(&document.content[0]), "Hola");
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }
}
