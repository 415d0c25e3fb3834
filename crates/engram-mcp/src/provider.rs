//! LLM Provider Wiring
//!
//! The engine consumes [`LlmProvider`] as a capability; this module
//! supplies the daemon's concrete backends. Subprocess-backed providers
//! (claude CLI, ollama) are wired here; API-backed providers are left
//! to embedding applications, and unknown wiring degrades to
//! [`NoProvider`] so session capture drops jobs instead of inventing
//! summaries.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use engram_core::{EngramError, LlmProvider, NoProvider, ProviderKind, Result};

/// Subprocess timeout for provider invocations
const PROVIDER_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// COMMAND PROVIDER
// ============================================================================

/// Provider that pipes the prompt to a local command's stdin and reads
/// the completion from stdout
pub struct CommandProvider {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(PROVIDER_TIMEOUT_SECS),
        }
    }
}

impl LlmProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngramError::Unavailable(format!("{} unavailable: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .map_err(|e| EngramError::Unavailable(format!("provider stdin: {}", e)))?;
        }

        // wait_with_output blocks indefinitely; watch it from a side
        // thread so the timeout is enforceable.
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = sender.send(child.wait_with_output());
        });

        let output = match receiver.recv_timeout(self.timeout) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(EngramError::Unavailable(format!("provider failed: {}", e)))
            }
            Err(_) => {
                return Err(EngramError::Unavailable(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            return Err(EngramError::Unavailable(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// ============================================================================
// WIRING
// ============================================================================

/// Build the provider for a configured kind
pub fn provider_for(kind: ProviderKind) -> Arc<dyn LlmProvider> {
    match kind {
        ProviderKind::ClaudeCli => Arc::new(CommandProvider::new(
            "claude-cli",
            "claude",
            &["-p", "--output-format", "text"],
        )),
        ProviderKind::Ollama => Arc::new(CommandProvider::new(
            "ollama",
            "ollama",
            &["run", "llama3.2"],
        )),
        ProviderKind::Anthropic | ProviderKind::Openrouter => {
            tracing::warn!(
                "{} provider requires an embedding application to supply an API client; \
                 session capture will drop jobs",
                kind.as_str()
            );
            Arc::new(NoProvider)
        }
        ProviderKind::None => Arc::new(NoProvider),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_unavailable() {
        let provider = CommandProvider::new("test", "definitely-not-a-real-binary", &[]);
        let err = provider.generate("hello").unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[test]
    fn test_command_provider_reads_stdout() {
        // `cat` echoes the prompt back; portable enough for CI on unix
        let provider = CommandProvider::new("echo", "cat", &[]);
        let result = provider.generate("round trip").unwrap();
        assert_eq!(result, "round trip");
    }

    #[test]
    fn test_none_kind_wires_no_provider() {
        let provider = provider_for(ProviderKind::None);
        assert_eq!(provider.name(), "none");
        assert!(provider.generate("x").is_err());
    }
}
