//! Terminology cache (C4) and knowledge-base terminology lookup (C5).

pub mod cache;
pub mod rag;

pub use cache::{cache_key, CachedTerm, TerminologyCache};
pub use rag::{lookup_terminology, RagLookupResult};
