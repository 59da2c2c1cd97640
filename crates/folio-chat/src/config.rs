//! Provider configuration, resolved once from the environment.

use std::time::Duration;

use folio_core::{Error, Result};

use crate::types::LLMProvider;

pub const DEFAULT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_PROFILE_NAME: &str = "Satvik";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Immutable provider settings.
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: Option<String>,
    /// Full chat-completions URL for hosted providers, base URL for Ollama.
    pub endpoint: String,
    pub timeout: Duration,
    /// Name of the person the assistant talks about.
    pub profile_name: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self::for_provider(LLMProvider::Mock)
    }
}

impl LLMConfig {
    /// Defaults for `provider` with no API key.
    pub fn for_provider(provider: LLMProvider) -> Self {
        Self {
            provider,
            model: DEFAULT_MODEL.into(),
            api_key: None,
            endpoint: default_endpoint(provider).into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            profile_name: DEFAULT_PROFILE_NAME.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("LLM_PROVIDER") {
            Some(tag) => tag.parse()?,
            None => LLMProvider::Mock,
        };

        let api_key = match provider {
            LLMProvider::OpenRouter => get("OPENROUTER_API_KEY"),
            LLMProvider::Groq => get("GROQ_API_KEY"),
            LLMProvider::Mock | LLMProvider::Ollama => None,
        };

        let timeout = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    Error::InvalidConfig(format!("LLM_TIMEOUT_SECS must be an integer, got {:?}", raw))
                })?;
                if secs == 0 {
                    return Err(Error::InvalidConfig("LLM_TIMEOUT_SECS must be positive".into()));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            provider,
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_key,
            endpoint: get("LLM_ENDPOINT")
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default_endpoint(provider).into()),
            timeout,
            profile_name: get("PROFILE_NAME").unwrap_or_else(|| DEFAULT_PROFILE_NAME.into()),
        })
    }
}

fn default_endpoint(provider: LLMProvider) -> &'static str {
    match provider {
        LLMProvider::OpenRouter => OPENROUTER_URL,
        LLMProvider::Groq => GROQ_URL,
        LLMProvider::Ollama => OLLAMA_URL,
        LLMProvider::Mock => "",
    }
}
