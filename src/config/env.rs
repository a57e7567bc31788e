//! Typed environment-variable overrides, one type per tunable, following
//! the host crate's `EnvVar<T>` pattern (`src/env.rs`): each variable knows
//! its own name and how to parse itself, so `ConfigManager` never scatters
//! raw `std::env::var` calls through the override pipeline.

use crate::error::{EngineError, EngineResult};

pub trait EnvVar {
    const NAME: &'static str;
    type Value;

    fn parse(raw: &str) -> EngineResult<Self::Value>;

    /// `Ok(None)` when the variable is unset; `Err` only on a malformed value.
    fn get_opt() -> EngineResult<Option<Self::Value>> {
        match std::env::var(Self::NAME) {
            Ok(raw) => Self::parse(&raw).map(Some),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(EngineError::ConfigError(format!(
                "{}: {e}",
                Self::NAME
            ))),
        }
    }
}

macro_rules! usize_env_var {
    ($name:ident, $var:literal) => {
        pub struct $name;
        impl EnvVar for $name {
            const NAME: &'static str = $var;
            type Value = usize;
            fn parse(raw: &str) -> EngineResult<usize> {
                raw.parse()
                    .map_err(|_| EngineError::ConfigError(format!("{} must be a positive integer", $var)))
            }
        }
    };
}

usize_env_var!(MinBatchWords, "OKIDOKI_MIN_BATCH_WORDS");
usize_env_var!(TargetBatchWords, "OKIDOKI_TARGET_BATCH_WORDS");
usize_env_var!(MaxBatchWords, "OKIDOKI_MAX_BATCH_WORDS");
usize_env_var!(TerminologyCacheMaxEntries, "OKIDOKI_TERMINOLOGY_CACHE_MAX_ENTRIES");
usize_env_var!(GlossaryPromptCap, "OKIDOKI_GLOSSARY_PROMPT_CAP");

pub struct TerminologyCacheTtlSecs;
impl EnvVar for TerminologyCacheTtlSecs {
    const NAME: &'static str = "OKIDOKI_TERMINOLOGY_CACHE_TTL_SECS";
    type Value = u64;
    fn parse(raw: &str) -> EngineResult<u64> {
        raw.parse()
            .map_err(|_| EngineError::ConfigError(format!("{} must be seconds", Self::NAME)))
    }
}

pub struct UseRag;
impl EnvVar for UseRag {
    const NAME: &'static str = "OKIDOKI_USE_RAG";
    type Value = bool;
    fn parse(raw: &str) -> EngineResult<bool> {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(EngineError::ConfigError(format!(
                "{} must be a boolean",
                Self::NAME
            ))),
        }
    }
}

/// Comma-separated ascending list of `u8` percentages, e.g.
/// `"10,25,40,55,70,85,100"`.
pub struct Milestones;
impl EnvVar for Milestones {
    const NAME: &'static str = "OKIDOKI_MILESTONES";
    type Value = Vec<u8>;
    fn parse(raw: &str) -> EngineResult<Vec<u8>> {
        raw.split(',')
            .map(|part| {
                part.trim().parse::<u8>().map_err(|_| {
                    EngineError::ConfigError(format!(
                        "{} must be a comma-separated list of integers",
                        Self::NAME
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_var_returns_none() {
        std::env::remove_var("OKIDOKI_MIN_BATCH_WORDS");
        assert_eq!(MinBatchWords::get_opt().unwrap(), None);
    }

    #[test]
    fn malformed_var_is_an_error() {
        std::env::set_var("OKIDOKI_USE_RAG", "maybe");
        assert!(UseRag::get_opt().is_err());
        std::env::remove_var("OKIDOKI_USE_RAG");
    }

    #[test]
    fn milestones_parses_comma_separated_list() {
        std::env::set_var("OKIDOKI_MILESTONES", "10, 50, 100");
        assert_eq!(Milestones::get_opt().unwrap(), Some(vec![10, 50, 100]));
        std::env::remove_var("OKIDOKI_MILESTONES");
    }
}
