//! Compiled-in defaults for every tunable named in spec §6.

/// A section at or below this many words becomes exactly one batch.
pub const MIN_BATCH_WORDS: usize = 300;
/// Soft target the batch splitter aims for when a section overflows MAX.
pub const TARGET_BATCH_WORDS: usize = 800;
/// A section above this many words is split into parts.
pub const MAX_BATCH_WORDS: usize = 1500;

/// Terminology cache entry lifetime, in seconds (7 days).
pub const TERMINOLOGY_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Maximum number of terminology-cache entries retained in the durable tier.
pub const TERMINOLOGY_CACHE_MAX_ENTRIES: usize = 20;

/// Maximum number of glossary terms rendered into a translation prompt.
pub const GLOSSARY_PROMPT_CAP: usize = 50;

/// Progress percentages at which an in-progress rebuild is pushed to the caller.
pub const MILESTONES: [u8; 7] = [10, 25, 40, 55, 70, 85, 100];

/// Above this character count, the language detector samples three slices
/// instead of using the full text.
pub const LANGUAGE_SAMPLE_THRESHOLD_CHARS: usize = 2_000;
/// Length of each of the three representative-sample slices.
pub const LANGUAGE_SAMPLE_SLICE_CHARS: usize = 600;

/// `maxTokens` for a batch's LLM call = wordCount * this multiplier.
pub const MAX_TOKENS_MULTIPLIER: usize = 3;

/// Estimated seconds of wall-clock time per remaining batch, used for
/// `estimatedTimeRemaining` in progress events.
pub const ESTIMATED_SECONDS_PER_BATCH: u64 = 4;

/// Industry-classifier confidence above which the LLM refinement step is
/// skipped entirely.
pub const INDUSTRY_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Durable storage key for the latest persisted orchestrator state.
pub const PERSISTED_STATE_KEY: &str = "okidoki_translation_state";
/// Durable storage key (table name) for the terminology cache.
pub const TERMINOLOGY_CACHE_KEY: &str = "okidoki_terminology_cache";

/// Candidate paths (before shell expansion) searched for an optional TOML
/// configuration file, in order, first match wins.
pub const CONFIG_PATHS: &[&str] = &[
    "./okidoki-translate.toml",
    "~/.config/okidoki-translate/config.toml",
    "/etc/okidoki-translate/config.toml",
];
