//! LLM Provider Capability
//!
//! The engine consumes summarization/generation as a narrow capability;
//! concrete provider implementations (API clients, CLI wrappers) live
//! outside the engine and are injected at composition time.

use crate::error::{EngramError, Result};

// ============================================================================
// PROVIDER KINDS
// ============================================================================

/// Configured provider backends. `None` disables LLM-dependent features
/// (session capture drops jobs instead of writing placeholder summaries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Anthropic,
    #[default]
    ClaudeCli,
    Ollama,
    Openrouter,
    None,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::ClaudeCli => "claude-cli",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Openrouter => "openrouter",
            ProviderKind::None => "none",
        }
    }

    /// Parse a configured provider name; invalid strings are rejected
    pub fn parse_name(s: &str) -> Result<Self> {
        match s {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "claude-cli" => Ok(ProviderKind::ClaudeCli),
            "ollama" => Ok(ProviderKind::Ollama),
            "openrouter" => Ok(ProviderKind::Openrouter),
            "none" => Ok(ProviderKind::None),
            other => Err(EngramError::InvalidArgument(format!(
                "unknown llm provider: {} (valid: anthropic, claude-cli, ollama, openrouter, none)",
                other
            ))),
        }
    }
}

// ============================================================================
// PROVIDER CAPABILITY
// ============================================================================

/// Summarization/generation capability consumed by the engine
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and status output
    fn name(&self) -> &str;

    /// Free-form generation from a prompt
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Summarize a session transcript into a narrative suitable for a
    /// `session_summary` document
    fn summarize_session(&self, transcript: &str) -> Result<String> {
        self.generate(&format!(
            "Summarize this coding session: what changed and why, key decisions, \
             problems solved, and remaining work.\n\n{}",
            transcript
        ))
    }
}

/// Provider used when no backend is configured. Every call fails with
/// `Unavailable`, which callers treat as "drop the job".
pub struct NoProvider;

impl LlmProvider for NoProvider {
    fn name(&self) -> &str {
        "none"
    }

    fn generate(&self, _prompt: &str) -> Result<String> {
        Err(EngramError::Unavailable("no llm provider configured".to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_roundtrip() {
        for kind in [
            ProviderKind::Anthropic,
            ProviderKind::ClaudeCli,
            ProviderKind::Ollama,
            ProviderKind::Openrouter,
            ProviderKind::None,
        ] {
            assert_eq!(ProviderKind::parse_name(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let err = ProviderKind::parse_name("gpt-sideload").unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[test]
    fn test_no_provider_is_unavailable() {
        let provider = NoProvider;
        let err = provider.summarize_session("transcript").unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }
}
