//! Layered configuration for every tunable named in spec §6.

pub mod constants;
pub mod env;
mod manager;

pub use manager::{ConfigManager, TranslationConfig};
