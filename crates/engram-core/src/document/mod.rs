//! Document Model and Taxonomy
//!
//! Every document in the store carries a typed metadata record keyed by a
//! closed, eleven-type taxonomy in three categories:
//!
//! - **Navigation (the map)**: file_metadata, dependency, skeleton
//! - **Usage (the manual)**: entry_point, data_contract, idiom
//! - **Memory (the brain)**: note, session_summary, insight, tech_stack,
//!   initiative
//!
//! Branch filtering, recency boosting, and score multipliers are all
//! table-driven off the type tag; nothing else in the engine branches on
//! type strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{EngramError, Result};

// ============================================================================
// DOCUMENT TYPES
// ============================================================================

/// Branch label for documents whose branch could not be detected.
/// A search under this sentinel disables branch filtering entirely.
pub const UNKNOWN_BRANCH: &str = "unknown";

/// The closed document taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Per-file search anchor with description, exports, and flags
    FileMetadata,
    /// Per-file import/imported-by graph with impact tier
    Dependency,
    /// Per-(repo, branch) directory tree
    Skeleton,
    /// Trigger surface: main, api_route, cli, event_handler
    EntryPoint,
    /// Named type/schema with fields and validation rules
    DataContract,
    /// Gold-standard pattern with related files
    Idiom,
    /// Free-form decision or documentation
    Note,
    /// End-of-session narrative with changed files
    SessionSummary,
    /// Analysis anchored to files, tracked for staleness
    Insight,
    /// Singleton per repo: repository context
    TechStack,
    /// Multi-session workstream
    Initiative,
}

/// All known document types, in taxonomy order
pub const ALL_DOCUMENT_TYPES: &[DocumentType] = &[
    DocumentType::FileMetadata,
    DocumentType::Dependency,
    DocumentType::Skeleton,
    DocumentType::EntryPoint,
    DocumentType::DataContract,
    DocumentType::Idiom,
    DocumentType::Note,
    DocumentType::SessionSummary,
    DocumentType::Insight,
    DocumentType::TechStack,
    DocumentType::Initiative,
];

impl DocumentType {
    /// Wire name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::FileMetadata => "file_metadata",
            DocumentType::Dependency => "dependency",
            DocumentType::Skeleton => "skeleton",
            DocumentType::EntryPoint => "entry_point",
            DocumentType::DataContract => "data_contract",
            DocumentType::Idiom => "idiom",
            DocumentType::Note => "note",
            DocumentType::SessionSummary => "session_summary",
            DocumentType::Insight => "insight",
            DocumentType::TechStack => "tech_stack",
            DocumentType::Initiative => "initiative",
        }
    }

    /// Parse from a wire name; unknown names are rejected, not defaulted
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "file_metadata" => Some(DocumentType::FileMetadata),
            "dependency" => Some(DocumentType::Dependency),
            "skeleton" => Some(DocumentType::Skeleton),
            "entry_point" => Some(DocumentType::EntryPoint),
            "data_contract" => Some(DocumentType::DataContract),
            "idiom" => Some(DocumentType::Idiom),
            "note" => Some(DocumentType::Note),
            "session_summary" => Some(DocumentType::SessionSummary),
            "insight" => Some(DocumentType::Insight),
            "tech_stack" => Some(DocumentType::TechStack),
            "initiative" => Some(DocumentType::Initiative),
            _ => None,
        }
    }

    /// Taxonomy category of this type
    pub fn category(&self) -> TypeCategory {
        match self {
            DocumentType::FileMetadata | DocumentType::Dependency | DocumentType::Skeleton => {
                TypeCategory::Navigation
            }
            DocumentType::EntryPoint | DocumentType::DataContract | DocumentType::Idiom => {
                TypeCategory::Usage
            }
            DocumentType::Note
            | DocumentType::SessionSummary
            | DocumentType::Insight
            | DocumentType::TechStack
            | DocumentType::Initiative => TypeCategory::Memory,
        }
    }

    /// Relevance multiplier applied after reranking.
    ///
    /// Code can be grepped; understanding cannot. Memory types outrank
    /// navigation for equal rerank scores.
    pub fn multiplier(&self) -> f32 {
        match self {
            DocumentType::Insight => 2.0,
            DocumentType::Note => 1.5,
            DocumentType::SessionSummary => 1.5,
            DocumentType::EntryPoint => 1.4,
            DocumentType::FileMetadata => 1.3,
            DocumentType::DataContract => 1.3,
            DocumentType::Idiom => 1.3,
            DocumentType::TechStack => 1.2,
            DocumentType::Dependency => 1.0,
            DocumentType::Skeleton => 1.0,
            DocumentType::Initiative => 1.0,
        }
    }

    /// Whether search restricts this type to the current branch (+ main).
    /// Memory types are visible across branches.
    pub fn is_branch_filtered(&self) -> bool {
        matches!(
            self,
            DocumentType::Skeleton
                | DocumentType::FileMetadata
                | DocumentType::DataContract
                | DocumentType::EntryPoint
                | DocumentType::Dependency
        )
    }

    /// Whether this type receives the recency half-life boost
    pub fn is_recency_boosted(&self) -> bool {
        matches!(self, DocumentType::Note | DocumentType::SessionSummary)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Branch-filtered subset of the taxonomy
pub fn branch_filtered_types() -> Vec<DocumentType> {
    ALL_DOCUMENT_TYPES
        .iter()
        .copied()
        .filter(|t| t.is_branch_filtered())
        .collect()
}

/// Cross-branch subset of the taxonomy
pub fn cross_branch_types() -> Vec<DocumentType> {
    ALL_DOCUMENT_TYPES
        .iter()
        .copied()
        .filter(|t| !t.is_branch_filtered())
        .collect()
}

// ============================================================================
// CATEGORIES AND STATUS
// ============================================================================

/// The three taxonomy categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    /// Where to look (the map)
    Navigation,
    /// How to use it (the manual)
    Usage,
    /// What we learned (the brain)
    Memory,
}

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Active,
    Deprecated,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Deprecated => "deprecated",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Status::Active),
            "deprecated" => Some(Status::Deprecated),
            _ => None,
        }
    }
}

// ============================================================================
// SEARCH PRESETS
// ============================================================================

/// Named type sets for search. A preset overrides an explicit `types`
/// filter when both are supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPreset {
    /// Prior analysis and decisions
    Understanding,
    /// Where to start reading
    Navigation,
    /// Shape of the tree and the import graph
    Structure,
    /// Follow a request through the system
    Trace,
    /// Everything the brain category holds
    Memory,
}

impl SearchPreset {
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "understanding" => Some(SearchPreset::Understanding),
            "navigation" => Some(SearchPreset::Navigation),
            "structure" => Some(SearchPreset::Structure),
            "trace" => Some(SearchPreset::Trace),
            "memory" => Some(SearchPreset::Memory),
            _ => None,
        }
    }

    /// The document types this preset selects
    pub fn types(&self) -> Vec<DocumentType> {
        match self {
            SearchPreset::Understanding => vec![
                DocumentType::Insight,
                DocumentType::Note,
                DocumentType::SessionSummary,
            ],
            SearchPreset::Navigation => {
                vec![DocumentType::FileMetadata, DocumentType::EntryPoint]
            }
            SearchPreset::Structure => vec![
                DocumentType::FileMetadata,
                DocumentType::Dependency,
                DocumentType::Skeleton,
            ],
            SearchPreset::Trace => vec![
                DocumentType::EntryPoint,
                DocumentType::Dependency,
                DocumentType::DataContract,
            ],
            SearchPreset::Memory => vec![
                DocumentType::Note,
                DocumentType::SessionSummary,
                DocumentType::Insight,
                DocumentType::TechStack,
                DocumentType::Initiative,
            ],
        }
    }
}

// ============================================================================
// INSIGHT VALIDATION RESULTS
// ============================================================================

/// Outcome of re-checking an insight against current code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationResult {
    StillValid,
    PartiallyValid,
    NoLongerValid,
}

impl ValidationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationResult::StillValid => "still_valid",
            ValidationResult::PartiallyValid => "partially_valid",
            ValidationResult::NoLongerValid => "no_longer_valid",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "still_valid" => Some(ValidationResult::StillValid),
            "partially_valid" => Some(ValidationResult::PartiallyValid),
            "no_longer_valid" => Some(ValidationResult::NoLongerValid),
            _ => None,
        }
    }
}

// ============================================================================
// DOCUMENT IDS
// ============================================================================

/// Short content hash used in deterministic document IDs
pub fn short_hash(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..12].to_string()
}

/// Deterministic ID for a per-file document (`file_metadata:<hash12>`)
pub fn file_doc_id(doc_type: DocumentType, repository: &str, file_path: &str) -> String {
    format!(
        "{}:{}",
        doc_type.as_str(),
        short_hash(&format!("{}:{}", repository, file_path))
    )
}

/// ID for a code chunk document (`<repo>:<path>:<chunk-index>`)
pub fn chunk_doc_id(repository: &str, file_path: &str, index: usize) -> String {
    format!("{}:{}:{}", repository, file_path, index)
}

/// Random ID for a memory document (`note:ab12cd34`)
pub fn memory_doc_id(doc_type: DocumentType) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}:{}", doc_type.as_str(), &hex[..8])
}

/// Well-known singleton ID for a repository's tech stack
pub fn tech_stack_id(repository: &str) -> String {
    format!("{}:tech_stack", repository)
}

/// Well-known singleton ID for a (repo, branch) skeleton
pub fn skeleton_id(repository: &str, branch: &str) -> String {
    format!("{}:skeleton:{}", repository, branch)
}

// ============================================================================
// METADATA ACCESS AND VALIDATION
// ============================================================================

/// Current time as an ISO-8601 UTC string, the format every timestamp
/// field in the store uses
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// String field accessor for a metadata object
pub fn meta_str<'a>(meta: &'a Value, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(Value::as_str)
}

/// String field with empty-string default
pub fn meta_str_or<'a>(meta: &'a Value, key: &str, default: &'a str) -> &'a str {
    meta_str(meta, key).unwrap_or(default)
}

/// The parsed document type of a metadata record
pub fn meta_type(meta: &Value) -> Option<DocumentType> {
    meta_str(meta, "type").and_then(DocumentType::parse_name)
}

/// JSON-array-encoded string field (`"[\"a\",\"b\"]"`) decoded to strings
pub fn meta_string_list(meta: &Value, key: &str) -> Vec<String> {
    meta_str(meta, key)
        .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
        .unwrap_or_default()
}

/// Validate a metadata record before it is written.
///
/// Enforces the taxonomy invariants: known type, known status, required
/// repository/branch labels, and a non-empty `files` list for insights.
pub fn validate_metadata(meta: &Value) -> Result<DocumentType> {
    let type_name = meta_str(meta, "type")
        .ok_or_else(|| EngramError::InvalidArgument("metadata missing 'type'".to_string()))?;
    let doc_type = DocumentType::parse_name(type_name).ok_or_else(|| {
        EngramError::InvalidArgument(format!("unknown document type: {}", type_name))
    })?;

    if let Some(status) = meta_str(meta, "status") {
        if Status::parse_name(status).is_none() {
            return Err(EngramError::InvalidArgument(format!(
                "unknown status: {}",
                status
            )));
        }
    }

    if meta_str(meta, "repository").is_none() {
        return Err(EngramError::InvalidArgument(
            "metadata missing 'repository'".to_string(),
        ));
    }
    if meta_str(meta, "branch").is_none() {
        return Err(EngramError::InvalidArgument(
            "metadata missing 'branch'".to_string(),
        ));
    }

    if doc_type == DocumentType::Insight && meta_string_list(meta, "files").is_empty() {
        return Err(EngramError::InvalidArgument(
            "insight requires a non-empty files list".to_string(),
        ));
    }

    Ok(doc_type)
}

// ============================================================================
// TESTS
// ============================================================================
