//! Chat types shared by the client and the HTTP surface.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use folio_core::Error;

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    /// Templated responder, no network.
    Mock,
    OpenRouter,
    Groq,
    /// Local model server.
    Ollama,
}

impl LLMProvider {
    /// Hosted providers speak the OpenAI chat-completions protocol.
    pub fn is_hosted(self) -> bool {
        matches!(self, LLMProvider::OpenRouter | LLMProvider::Groq)
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::Mock => write!(f, "mock"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Groq => write!(f, "groq"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for LLMProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(LLMProvider::Mock),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "groq" => Ok(LLMProvider::Groq),
            "ollama" => Ok(LLMProvider::Ollama),
            other => Err(Error::InvalidConfig(format!(
                "unknown LLM provider {:?} (expected mock, openrouter, groq or ollama)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior turn of the conversation, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(alias = "content")]
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Everything a provider needs to answer one question.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub question: String,
    /// Retrieved context; empty when nothing cleared the threshold.
    pub context: String,
    pub history: Vec<ConversationTurn>,
}

/// Text produced for a request and who produced it.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    pub provider: LLMProvider,
    /// True when the configured provider failed and the mock answered.
    pub fell_back: bool,
}
