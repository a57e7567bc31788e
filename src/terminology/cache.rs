//! Terminology cache (C4): a two-tier (in-memory + durable key/value)
//! cache of domain glossaries, keyed by `"<industry>:<source>:<target>"`,
//! with a 7-day TTL and a bounded durable tier.
//!
//! Grounded in the host's two-level `CacheManager` (`translation/cache.rs`):
//! memory first, durable tier as a best-effort backstop whose failures are
//! always logged and swallowed rather than propagated to the caller.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{log_and_contain, EngineError, EngineResult};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("terminology_cache");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTerm {
    pub original: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TerminologyCacheEntry {
    terms: Vec<CachedTerm>,
    cached_at: u64,
    expires_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn cache_key(industry: &str, source_language: &str, target_language: &str) -> String {
    format!("{industry}:{source_language}:{target_language}")
}

pub struct TerminologyCache {
    memory: DashMap<String, TerminologyCacheEntry>,
    db: Option<Arc<Database>>,
    ttl: Duration,
    max_entries: usize,
}

impl TerminologyCache {
    /// Builds the cache and, if `db` is given, preloads every non-expired
    /// durable entry into memory.
    pub fn new(db: Option<Arc<Database>>, ttl: Duration, max_entries: usize) -> Self {
        let cache = Self {
            memory: DashMap::new(),
            db,
            ttl,
            max_entries,
        };
        if let Err(err) = cache.load_from_durable() {
            log_and_contain(err, ());
        }
        cache
    }

    fn load_from_durable(&self) -> EngineResult<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let read_txn = db
            .begin_read()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        let table = match read_txn.open_table(TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(EngineError::StorageError(e.to_string())),
        };
        let now = now_secs();
        let rows = table
            .iter()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        for row in rows {
            let (key, value) = row.map_err(|e| EngineError::StorageError(e.to_string()))?;
            let key = key.value().to_string();
            if let Ok(entry) = serde_json::from_slice::<TerminologyCacheEntry>(value.value()) {
                if entry.expires_at > now {
                    self.memory.insert(key, entry);
                }
            }
        }
        Ok(())
    }

    /// `None` on miss or expiry. An expired hit is evicted from memory and
    /// the durable snapshot is rewritten without it.
    pub fn get(&self, key: &str) -> Option<Vec<CachedTerm>> {
        let now = now_secs();
        let hit = self.memory.get(key).map(|entry| entry.clone());
        match hit {
            Some(entry) if entry.expires_at > now => Some(entry.terms),
            Some(_) => {
                self.memory.remove(key);
                if let Err(err) = self.persist_snapshot() {
                    log_and_contain(err, ());
                }
                None
            }
            None => None,
        }
    }

    /// Inserts `terms` under `key` and persists the top `max_entries`
    /// entries (by `cached_at` descending) to the durable tier. Durable
    /// failures are logged and swallowed: the memory insert always stands.
    pub fn set(&self, key: &str, terms: Vec<CachedTerm>) {
        let now = now_secs();
        self.memory.insert(
            key.to_string(),
            TerminologyCacheEntry {
                terms,
                cached_at: now,
                expires_at: now + self.ttl.as_secs(),
            },
        );
        if let Err(err) = self.persist_snapshot() {
            log_and_contain(err, ());
        }
    }

    fn persist_snapshot(&self) -> EngineResult<()> {
        let Some(db) = &self.db else { return Ok(()) };

        let mut entries: Vec<(String, TerminologyCacheEntry)> = self
            .memory
            .iter()
            .map(|kv| (kv.key().clone(), kv.value().clone()))
            .collect();
        entries.sort_by(|a, b| b.1.cached_at.cmp(&a.1.cached_at));
        entries.truncate(self.max_entries);

        let write_txn = db
            .begin_write()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| EngineError::StorageError(e.to_string()))?;
            rewrite_table(&mut table, &entries)?;
        }
        write_txn
            .commit()
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
        Ok(())
    }

    pub fn clear_all(&self) {
        self.memory.clear();
        if let Some(db) = &self.db {
            let result: EngineResult<()> = (|| {
                let write_txn = db
                    .begin_write()
                    .map_err(|e| EngineError::StorageError(e.to_string()))?;
                {
                    let mut table = write_txn
                        .open_table(TABLE)
                        .map_err(|e| EngineError::StorageError(e.to_string()))?;
                    rewrite_table(&mut table, &[])?;
                }
                write_txn
                    .commit()
                    .map_err(|e| EngineError::StorageError(e.to_string()))?;
                Ok(())
            })();
            if let Err(err) = result {
                log_and_contain(err, ());
            }
        }
    }
}

/// Replace the full contents of `table` with `entries`: clears every
/// existing key first so a durable rewrite never leaves stale entries
/// behind (used by both the bounded-snapshot write and a full clear).
fn rewrite_table(
    table: &mut redb::Table<'_, &'static str, &'static [u8]>,
    entries: &[(String, TerminologyCacheEntry)],
) -> EngineResult<()> {
    let existing_keys: Vec<String> = table
        .iter()
        .map_err(|e| EngineError::StorageError(e.to_string()))?
        .filter_map(|row| row.ok().map(|(k, _)| k.value().to_string()))
        .collect();
    for key in existing_keys {
        table
            .remove(key.as_str())
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
    }
    for (key, entry) in entries {
        let bytes = serde_json::to_vec(entry)?;
        table
            .insert(key.as_str(), bytes.as_slice())
            .map_err(|e| EngineError::StorageError(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(original: &str, translation: &str) -> CachedTerm {
        CachedTerm {
            original: original.to_string(),
            translation: translation.to_string(),
            context: None,
        }
    }

    #[test]
    fn memory_only_cache_roundtrips() {
        let cache = TerminologyCache::new(None, Duration::from_secs(60), 20);
        let key = cache_key("legal", "en", "es");
        assert!(cache.get(&key).is_none());
        cache.set(&key, vec![term("plaintiff", "demandante")]);
        assert_eq!(cache.get(&key), Some(vec![term("plaintiff", "demandante")]));
    }

    #[test]
    fn expired_entry_is_evicted_on_get() {
        let cache = TerminologyCache::new(None, Duration::from_secs(0), 20);
        let key = cache_key("legal", "en", "es");
        cache.set(&key, vec![term("plaintiff", "demandante")]);
        // TTL of zero: already expired by the time we read it back.
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn durable_tier_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("terms.redb");
        let db = Arc::new(Database::create(&db_path).unwrap());

        let cache = TerminologyCache::new(Some(Arc::clone(&db)), Duration::from_secs(3600), 20);
        let key = cache_key("medical", "en", "fr");
        cache.set(&key, vec![term("patient", "patient")]);
        drop(cache);

        let reloaded = TerminologyCache::new(Some(db), Duration::from_secs(3600), 20);
        assert_eq!(reloaded.get(&key), Some(vec![term("patient", "patient")]));
    }

    #[test]
    fn clear_all_empties_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("terms.redb");
        let db = Arc::new(Database::create(&db_path).unwrap());
        let cache = TerminologyCache::new(Some(Arc::clone(&db)), Duration::from_secs(3600), 20);
        let key = cache_key("medical", "en", "fr");
        cache.set(&key, vec![term("patient", "patient")]);
        cache.clear_all();
        assert!(cache.get(&key).is_none());
    }
}
