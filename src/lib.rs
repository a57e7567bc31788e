//! # okidoki-translate
//!
//! A resumable, structure-preserving document translation engine.
//!
//! The crate takes a hierarchical rich-text document (paragraphs,
//! headings, lists, and tables made of marked text segments), splits it
//! into section-aware batches, classifies its industry, resolves
//! terminology against a company knowledge base, drives an external LLM
//! through each batch, and incrementally rebuilds the document as
//! translated batches complete. Progress is persisted after every batch
//! so a crash or restart can resume exactly where it left off.
//!
//! ## Module organization
//!
//! - [`model`] - the document node tree (paragraphs, headings, lists, tables)
//! - [`error`] - the classified error type shared by every other module
//! - [`config`] - layered configuration (defaults, TOML, `.env`, env vars)
//! - [`llm`] - the LLM and cancellation-handler collaborator traits
//! - [`detect`] - language and industry detection
//! - [`terminology`] - the terminology cache and knowledge-base lookup
//! - [`glossary`] - glossary accumulation and prompt rendering
//! - [`batching`] - section-aware paragraph batching
//! - [`translator`] - per-batch LLM translation requests
//! - [`accumulator`] - incremental, milestone-driven document rebuilds
//! - [`storage`] - crash-recoverable persistence
//! - [`orchestrator`] - ties every module together into `translate`/`resume`/`cancel`

pub mod accumulator;
pub mod batching;
pub mod config;
pub mod detect;
pub mod error;
pub mod glossary;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod storage;
pub mod terminology;
pub mod translator;

pub use accumulator::{DocumentAccumulator, DocumentUpdateSink};
pub use batching::{create_batches, Batch, Paragraph, Section, Segment};
pub use config::{ConfigManager, TranslationConfig};
pub use detect::{classify_industry, detect_language, Industry, IndustryClassification, LanguageDetection};
pub use error::{EngineError, EngineResult, ErrorCategory, ErrorSeverity};
pub use glossary::{GlossaryManager, GlossaryMap, GlossaryTerm, TermSource, TermType};
pub use llm::{AskRequest, AskResponse, CancelChoice, CancelRequestHandler, LlmWidget};
pub use model::{Document, Mark, Node};
pub use orchestrator::{
    Callbacks, Orchestrator, ProgressEvent, Status, TranslateOptions, TranslationOutcome,
};
pub use storage::{IncompleteSummary, PersistedState, PersistenceStore};
pub use terminology::{CachedTerm, RagLookupResult, TerminologyCache};
pub use translator::{translate_batch, BatchTranslation, TranslatedSegment};
