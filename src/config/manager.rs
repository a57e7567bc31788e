//! Layered configuration: compiled defaults, overridden by an optional TOML
//! file, overridden by `.env` files, overridden by typed environment
//! variables. Follows the host crate's `ConfigManager::load_config` →
//! `apply_env_overrides` → `validate` pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub min_batch_words: usize,
    pub target_batch_words: usize,
    pub max_batch_words: usize,

    pub terminology_cache_ttl_secs: u64,
    pub terminology_cache_max_entries: usize,

    pub glossary_prompt_cap: usize,

    pub milestones: Vec<u8>,

    pub language_sample_threshold_chars: usize,
    pub language_sample_slice_chars: usize,

    pub max_tokens_multiplier: usize,
    pub estimated_seconds_per_batch: u64,

    pub industry_confidence_threshold: f64,

    pub use_rag: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            min_batch_words: constants::MIN_BATCH_WORDS,
            target_batch_words: constants::TARGET_BATCH_WORDS,
            max_batch_words: constants::MAX_BATCH_WORDS,
            terminology_cache_ttl_secs: constants::TERMINOLOGY_CACHE_TTL_SECS,
            terminology_cache_max_entries: constants::TERMINOLOGY_CACHE_MAX_ENTRIES,
            glossary_prompt_cap: constants::GLOSSARY_PROMPT_CAP,
            milestones: constants::MILESTONES.to_vec(),
            language_sample_threshold_chars: constants::LANGUAGE_SAMPLE_THRESHOLD_CHARS,
            language_sample_slice_chars: constants::LANGUAGE_SAMPLE_SLICE_CHARS,
            max_tokens_multiplier: constants::MAX_TOKENS_MULTIPLIER,
            estimated_seconds_per_batch: constants::ESTIMATED_SECONDS_PER_BATCH,
            industry_confidence_threshold: constants::INDUSTRY_CONFIDENCE_THRESHOLD,
            use_rag: true,
        }
    }
}

impl TranslationConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.min_batch_words == 0 || self.target_batch_words == 0 || self.max_batch_words == 0
        {
            return Err(EngineError::ConfigError(
                "batch word bounds must be non-zero".to_string(),
            ));
        }
        if !(self.min_batch_words < self.target_batch_words
            && self.target_batch_words <= self.max_batch_words)
        {
            return Err(EngineError::ConfigError(
                "batch word bounds must satisfy min < target <= max".to_string(),
            ));
        }
        if self.terminology_cache_max_entries == 0 {
            return Err(EngineError::ConfigError(
                "terminology_cache_max_entries must be non-zero".to_string(),
            ));
        }
        if self.milestones.is_empty() || self.milestones.last() != Some(&100) {
            return Err(EngineError::ConfigError(
                "milestones must be non-empty and end at 100".to_string(),
            ));
        }
        if !self.milestones.windows(2).all(|w| w[0] < w[1]) {
            return Err(EngineError::ConfigError(
                "milestones must be strictly ascending".to_string(),
            ));
        }
        Ok(())
    }

    pub fn terminology_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.terminology_cache_ttl_secs)
    }

    pub fn estimated_time_remaining(&self, remaining_batches: usize) -> Duration {
        Duration::from_secs(remaining_batches as u64 * self.estimated_seconds_per_batch)
    }
}

/// Owns a validated `TranslationConfig`, built through the layered
/// defaults -> file -> `.env` -> environment pipeline.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// Config ready to use without touching the filesystem or environment;
    /// for library consumers and tests that want §6's defaults verbatim.
    pub fn create_default() -> Self {
        Self {
            config: TranslationConfig::default(),
        }
    }

    /// Full layered load: defaults -> TOML file (first match of
    /// `constants::CONFIG_PATHS`) -> `.env` files -> typed env vars ->
    /// validation.
    pub fn new() -> EngineResult<Self> {
        let mut config = TranslationConfig::default();
        Self::load_dotenv();
        if let Some(from_file) = Self::load_from_file()? {
            config = from_file;
        }
        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(Self { config })
    }

    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    fn load_dotenv() {
        for candidate in [".env.local", ".env.development", ".env.production", ".env"] {
            if dotenv::from_filename(candidate).is_ok() {
                break;
            }
        }
    }

    fn load_from_file() -> EngineResult<Option<TranslationConfig>> {
        for raw_path in constants::CONFIG_PATHS {
            let expanded = shellexpand::tilde(raw_path);
            let path = std::path::Path::new(expanded.as_ref());
            if !path.exists() {
                continue;
            }
            let contents = std::fs::read_to_string(path)
                .map_err(|e| EngineError::ConfigError(e.to_string()))?;
            let parsed: TranslationConfig = toml::from_str(&contents)?;
            return Ok(Some(parsed));
        }
        Ok(None)
    }

    fn apply_env_overrides(config: &mut TranslationConfig) -> EngineResult<()> {
        use crate::config::env::*;
        if let Some(v) = MinBatchWords::get_opt()? {
            config.min_batch_words = v;
        }
        if let Some(v) = TargetBatchWords::get_opt()? {
            config.target_batch_words = v;
        }
        if let Some(v) = MaxBatchWords::get_opt()? {
            config.max_batch_words = v;
        }
        if let Some(v) = TerminologyCacheTtlSecs::get_opt()? {
            config.terminology_cache_ttl_secs = v;
        }
        if let Some(v) = TerminologyCacheMaxEntries::get_opt()? {
            config.terminology_cache_max_entries = v;
        }
        if let Some(v) = GlossaryPromptCap::get_opt()? {
            config.glossary_prompt_cap = v;
        }
        if let Some(v) = Milestones::get_opt()? {
            config.milestones = v;
        }
        if let Some(v) = UseRag::get_opt()? {
            config.use_rag = v;
        }
        Ok(())
    }

    /// Write the current config as a ready-to-edit TOML example file.
    pub fn generate_example_config(&self) -> EngineResult<String> {
        toml::to_string_pretty(&self.config).map_err(|e| EngineError::ConfigError(e.to_string()))
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::create_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let config = TranslationConfig::default();
        assert_eq!(config.min_batch_words, 300);
        assert_eq!(config.target_batch_words, 800);
        assert_eq!(config.max_batch_words, 1500);
        assert_eq!(config.milestones, vec![10, 25, 40, 55, 70, 85, 100]);
        config.validate().expect("default config must validate");
    }

    #[test]
    fn validate_rejects_out_of_order_bounds() {
        let mut config = TranslationConfig::default();
        config.min_batch_words = 900;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_milestones_not_ending_at_100() {
        let mut config = TranslationConfig::default();
        config.milestones = vec![10, 50];
        assert!(config.validate().is_err());
    }

    #[test]
    fn create_default_does_not_touch_filesystem_and_validates() {
        let manager = ConfigManager::create_default();
        manager.get_config().validate().unwrap();
    }
}
