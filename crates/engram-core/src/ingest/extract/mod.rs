//! Language Extractor Registry
//!
//! Per-language structural extraction behind one capability: exports,
//! imports, entry points, and data contracts. Extractors are registered
//! explicitly at startup; files in languages without an extractor
//! degrade to navigation-only documents.

pub mod python;
pub mod rust;
pub mod typescript;

use std::collections::HashMap;

use serde_json::Value;

/// Cap on exports and contract fields carried in metadata
pub const MAX_EXPORTS: usize = 20;

// ============================================================================
// EXTRACTION TYPES
// ============================================================================

/// A detected entry point
#[derive(Debug, Clone)]
pub struct EntryPointInfo {
    /// One of: main, api_route, cli, event_handler
    pub entry_type: String,
    /// Structured trigger descriptions, e.g. `{"method": "POST", "route": "/v1/ingest"}`
    pub triggers: Vec<Value>,
    /// Short behavioral description
    pub summary: String,
}

/// A detected named type/schema
#[derive(Debug, Clone)]
pub struct DataContractInfo {
    pub name: String,
    /// e.g. interface, class, dataclass, type_alias, pydantic_model, struct
    pub contract_type: String,
    /// (name, type) pairs, capped at [`MAX_EXPORTS`]
    pub fields: Vec<(String, String)>,
    pub validation_rules: Vec<String>,
}

/// Everything an extractor pulls from one file
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub exports: Vec<String>,
    pub imports: Vec<String>,
    pub entry_points: Vec<EntryPointInfo>,
    pub data_contracts: Vec<DataContractInfo>,
}

// ============================================================================
// CAPABILITY AND REGISTRY
// ============================================================================

/// Per-language structural extraction capability
pub trait LanguageExtractor: Send + Sync {
    /// Language identifier matching [`crate::ingest::chunker::detect_language`]
    fn language(&self) -> &'static str;

    /// Extract structure from one file's source
    fn extract(&self, source: &str) -> Extraction;
}

/// Explicit extractor registration, consulted per file by language
pub struct ExtractorRegistry {
    extractors: HashMap<&'static str, Box<dyn LanguageExtractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ExtractorRegistry {
    /// An empty registry (navigation-only for every language)
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// The standard registry: python, typescript/javascript, rust
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(python::PythonExtractor));
        registry.register(Box::new(typescript::TypeScriptExtractor::typescript()));
        registry.register(Box::new(typescript::TypeScriptExtractor::javascript()));
        registry.register(Box::new(rust::RustExtractor));
        registry
    }

    pub fn register(&mut self, extractor: Box<dyn LanguageExtractor>) {
        self.extractors.insert(extractor.language(), extractor);
    }

    /// The extractor for a language, if one is registered
    pub fn get(&self, language: &str) -> Option<&dyn LanguageExtractor> {
        self.extractors.get(language).map(|b| b.as_ref())
    }

    pub fn languages(&self) -> Vec<&'static str> {
        let mut languages: Vec<&'static str> = self.extractors.keys().copied().collect();
        languages.sort();
        languages
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_languages() {
        let registry = ExtractorRegistry::with_defaults();
        let languages = registry.languages();
        assert!(languages.contains(&"python"));
        assert!(languages.contains(&"typescript"));
        assert!(languages.contains(&"javascript"));
        assert!(languages.contains(&"rust"));
    }

    #[test]
    fn test_unknown_language_degrades() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.get("cobol").is_none());
    }
}
