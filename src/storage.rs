//! Persistence store (C10): a single durable key holding the latest
//! serialized orchestrator state, so a crash or restart can resume an
//! in-progress translation.
//!
//! Shares its `redb::Database` with the terminology cache (C4): one
//! database, two tables, following the host's convention of one store per
//! concern rather than one store per object.

use redb::{ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::config::constants::PERSISTED_STATE_KEY;
use crate::error::{log_and_contain, EngineError, EngineResult};
use crate::glossary::GlossaryMap;
use crate::model::Document;
use crate::translator::BatchTranslation;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("translation_state");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub document_id: String,
    pub source_language: String,
    pub target_language: String,
    pub industry: Option<String>,
    pub original_document: Document,
    pub total_batches: usize,
    pub completed_batches: Vec<BatchTranslation>,
    pub glossary: GlossaryMap,
    pub started_at: u64,
    pub last_updated: u64,
}

impl PersistedState {
    pub fn is_incomplete(&self) -> bool {
        self.completed_batches.len() < self.total_batches
    }

    pub fn progress_percent(&self) -> u8 {
        if self.total_batches == 0 {
            return 100;
        }
        ((self.completed_batches.len() as f64 / self.total_batches as f64) * 100.0).round() as u8
    }
}

/// Redacted view suitable for a "resume this translation?" prompt: no
/// document content, just enough to recognize the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncompleteSummary {
    pub source_language: String,
    pub target_language: String,
    pub progress_percent: u8,
    pub started_at: u64,
    pub last_updated: u64,
}

impl From<&PersistedState> for IncompleteSummary {
    fn from(state: &PersistedState) -> Self {
        Self {
            source_language: state.source_language.clone(),
            target_language: state.target_language.clone(),
            progress_percent: state.progress_percent(),
            started_at: state.started_at,
            last_updated: state.last_updated,
        }
    }
}

pub struct PersistenceStore {
    db: Option<std::sync::Arc<redb::Database>>,
}

impl PersistenceStore {
    pub fn new(db: Option<std::sync::Arc<redb::Database>>) -> Self {
        Self { db }
    }

    /// Overwrites the single persisted-state key in full. `last_updated`
    /// is stamped by the caller (the orchestrator), not computed here.
    pub fn save(&self, state: &PersistedState) {
        if let Err(err) = self.try_save(state) {
            log_and_contain(err, ());
        }
    }

    fn try_save(&self, state: &PersistedState) -> EngineResult<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let bytes = serde_json::to_vec(state)?;
        let write_txn = db
            .begin_write()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| EngineError::StorageError(e.to_string()))?;
            table
                .insert(PERSISTED_STATE_KEY, bytes.as_slice())
                .map_err(|e| EngineError::StorageError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        Ok(())
    }

    pub fn load(&self) -> Option<PersistedState> {
        match self.try_load() {
            Ok(state) => state,
            Err(err) => log_and_contain(err, None),
        }
    }

    fn try_load(&self) -> EngineResult<Option<PersistedState>> {
        let Some(db) = &self.db else { return Ok(None) };
        let read_txn = db
            .begin_read()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        let table = match read_txn.open_table(TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(EngineError::StorageError(e.to_string())),
        };
        let Some(bytes) = table
            .get(PERSISTED_STATE_KEY)
            .map_err(|e| EngineError::StorageError(e.to_string()))?
        else {
            return Ok(None);
        };
        let state: PersistedState = serde_json::from_slice(bytes.value())?;
        Ok(Some(state))
    }

    pub fn has_incomplete_translation(&self, document_id: &str) -> bool {
        match self.load() {
            Some(state) => state.document_id == document_id && state.is_incomplete(),
            None => false,
        }
    }

    pub fn get_incomplete_summary(&self) -> Option<IncompleteSummary> {
        self.load()
            .filter(PersistedState::is_incomplete)
            .as_ref()
            .map(IncompleteSummary::from)
    }

    /// Clears the persisted state entirely (translation completed or
    /// discarded).
    pub fn clear(&self) {
        if let Err(err) = self.try_clear() {
            log_and_contain(err, ());
        }
    }

    fn try_clear(&self) -> EngineResult<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let write_txn = db
            .begin_write()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| EngineError::StorageError(e.to_string()))?;
            table
                .remove(PERSISTED_STATE_KEY)
                .map_err(|e| EngineError::StorageError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn sample_state(document_id: &str, completed: usize, total: usize) -> PersistedState {
        PersistedState {
            document_id: document_id.to_string(),
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            industry: Some("legal".to_string()),
            original_document: Document::new(vec![]),
            total_batches: total,
            completed_batches: (0..completed)
                .map(|i| BatchTranslation {
                    batch_index: i,
                    segments: vec![],
                    glossary_additions: HashMap::new(),
                })
                .collect(),
            glossary: GlossaryMap::new(),
            started_at: 1000,
            last_updated: 1000 + completed as u64,
        }
    }

    #[test]
    fn load_returns_none_when_store_is_memory_only() {
        let store = PersistenceStore::new(None);
        assert!(store.load().is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(redb::Database::create(dir.path().join("state.redb")).unwrap());
        let store = PersistenceStore::new(Some(db));
        let state = sample_state("doc-1", 2, 5);
        store.save(&state);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.document_id, "doc-1");
        assert_eq!(loaded.completed_batches.len(), 2);
    }

    #[test]
    fn has_incomplete_translation_checks_document_id_and_progress() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(redb::Database::create(dir.path().join("state.redb")).unwrap());
        let store = PersistenceStore::new(Some(db));
        store.save(&sample_state("doc-1", 2, 5));
        assert!(store.has_incomplete_translation("doc-1"));
        assert!(!store.has_incomplete_translation("doc-2"));
    }

    #[test]
    fn complete_state_is_not_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(redb::Database::create(dir.path().join("state.redb")).unwrap());
        let store = PersistenceStore::new(Some(db));
        store.save(&sample_state("doc-1", 5, 5));
        assert!(!store.has_incomplete_translation("doc-1"));
        assert!(store.get_incomplete_summary().is_none());
    }

    #[test]
    fn clear_removes_the_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(redb::Database::create(dir.path().join("state.redb")).unwrap());
        let store = PersistenceStore::new(Some(db));
        store.save(&sample_state("doc-1", 2, 5));
        store.clear();
        assert!(store.load().is_none());
    }
}
