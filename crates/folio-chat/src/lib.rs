//! LLM client for grounded answers about one person.
//!
//! One provider is selected at startup. Any provider failure is absorbed by
//! the deterministic mock responder, so a caller always gets text back.

pub mod config;
pub mod prompt;
pub mod providers;
pub mod types;

pub use config::LLMConfig;
pub use providers::{LlmClient, ProviderError};
pub use types::*;
