//! Runtime Configuration
//!
//! A small set of process-wide knobs, mutable at runtime through the
//! `configure` operation. Out-of-range numeric inputs clamp to their
//! documented ranges; invalid provider names are rejected upstream by
//! [`crate::llm::ProviderKind::parse_name`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::ProviderKind;

// ============================================================================
// AUTOCAPTURE CONFIG
// ============================================================================

/// Session-capture thresholds and worker mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AutocaptureConfig {
    /// Master switch for transcript capture
    pub enabled: bool,
    /// true: hook returns after enqueue, daemon processes later.
    /// false: hook blocks until processing completes or times out.
    pub async_mode: bool,
    /// Sync-mode timeout in seconds, clamped to [10, 300]
    pub sync_timeout: u64,
    /// Minimum approximate token count for a significant session
    pub min_tokens: usize,
    /// Minimum tool-call count for a significant session
    pub min_tool_calls: usize,
    /// Minimum distinct file-edit count for a significant session
    pub min_file_edits: usize,
}

impl Default for AutocaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            async_mode: true,
            sync_timeout: 60,
            min_tokens: 5000,
            min_tool_calls: 3,
            min_file_edits: 1,
        }
    }
}

// ============================================================================
// RUNTIME CONFIG
// ============================================================================

/// Process-wide runtime knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Master switch for the whole engine
    pub enabled: bool,
    /// Minimum final score for search results, clamped to [0, 1]
    pub min_score: f32,
    /// Include per-stage diagnostics in search responses
    pub verbose: bool,
    /// Candidates fetched per retrieval path, clamped to [10, 200]
    pub top_k_retrieve: usize,
    /// Results kept after reranking, clamped to [1, 50]
    pub top_k_rerank: usize,
    /// Configured LLM backend for session summarization
    pub llm_provider: ProviderKind,
    /// Recency boost for notes and session summaries
    pub recency_boost: bool,
    /// Half-life of the recency boost in days, clamped to [1, 365]
    pub recency_half_life_days: f64,
    pub autocapture: AutocaptureConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: 0.5,
            verbose: false,
            top_k_retrieve: 50,
            top_k_rerank: 10,
            llm_provider: ProviderKind::default(),
            recency_boost: true,
            recency_half_life_days: 30.0,
            autocapture: AutocaptureConfig::default(),
        }
    }
}

/// Partial update for [`RuntimeConfig`]; absent fields are untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub min_score: Option<f32>,
    pub verbose: Option<bool>,
    pub top_k_retrieve: Option<usize>,
    pub top_k_rerank: Option<usize>,
    pub llm_provider: Option<String>,
    pub recency_boost: Option<bool>,
    pub recency_half_life_days: Option<f64>,
    pub autocapture_enabled: Option<bool>,
    pub autocapture_async: Option<bool>,
    pub autocapture_sync_timeout: Option<u64>,
    pub autocapture_min_tokens: Option<usize>,
    pub autocapture_min_tool_calls: Option<usize>,
    pub autocapture_min_file_edits: Option<usize>,
}

impl RuntimeConfig {
    /// Apply a patch, clamping numeric fields. Returns the list of
    /// (field, effective value) pairs that changed, for echoing back to
    /// the caller.
    pub fn apply(&mut self, patch: ConfigPatch) -> crate::error::Result<Vec<(String, Value)>> {
        let mut changed = Vec::new();

        if let Some(v) = patch.enabled {
            self.enabled = v;
            changed.push(("enabled".to_string(), json!(v)));
        }
        if let Some(v) = patch.min_score {
            self.min_score = v.clamp(0.0, 1.0);
            changed.push(("min_score".to_string(), json!(self.min_score)));
        }
        if let Some(v) = patch.verbose {
            self.verbose = v;
            changed.push(("verbose".to_string(), json!(v)));
        }
        if let Some(v) = patch.top_k_retrieve {
            self.top_k_retrieve = v.clamp(10, 200);
            changed.push(("top_k_retrieve".to_string(), json!(self.top_k_retrieve)));
        }
        if let Some(v) = patch.top_k_rerank {
            self.top_k_rerank = v.clamp(1, 50);
            changed.push(("top_k_rerank".to_string(), json!(self.top_k_rerank)));
        }
        if let Some(name) = patch.llm_provider {
            self.llm_provider = ProviderKind::parse_name(&name)?;
            changed.push(("llm_provider".to_string(), json!(self.llm_provider.as_str())));
        }
        if let Some(v) = patch.recency_boost {
            self.recency_boost = v;
            changed.push(("recency_boost".to_string(), json!(v)));
        }
        if let Some(v) = patch.recency_half_life_days {
            self.recency_half_life_days = v.clamp(1.0, 365.0);
            changed.push((
                "recency_half_life_days".to_string(),
                json!(self.recency_half_life_days),
            ));
        }
        if let Some(v) = patch.autocapture_enabled {
            self.autocapture.enabled = v;
            changed.push(("autocapture.enabled".to_string(), json!(v)));
        }
        if let Some(v) = patch.autocapture_async {
            self.autocapture.async_mode = v;
            changed.push(("autocapture.async".to_string(), json!(v)));
        }
        if let Some(v) = patch.autocapture_sync_timeout {
            self.autocapture.sync_timeout = v.clamp(10, 300);
            changed.push((
                "autocapture.sync_timeout".to_string(),
                json!(self.autocapture.sync_timeout),
            ));
        }
        if let Some(v) = patch.autocapture_min_tokens {
            self.autocapture.min_tokens = v;
            changed.push(("autocapture.min_tokens".to_string(), json!(v)));
        }
        if let Some(v) = patch.autocapture_min_tool_calls {
            self.autocapture.min_tool_calls = v;
            changed.push(("autocapture.min_tool_calls".to_string(), json!(v)));
        }
        if let Some(v) = patch.autocapture_min_file_edits {
            self.autocapture.min_file_edits = v;
            changed.push(("autocapture.min_file_edits".to_string(), json!(v)));
        }

        Ok(changed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
