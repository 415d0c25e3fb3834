//! TypeScript / JavaScript Extractor
//!
//! Shared regex extractor for both languages; interface and type-alias
//! contracts only apply to TypeScript sources in practice.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use super::{DataContractInfo, EntryPointInfo, Extraction, LanguageExtractor, MAX_EXPORTS};

static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let|interface|type|enum)\s+(\w+)",
    )
    .expect("valid regex")
});
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(?:import[^'"]*from\s*|require\(\s*)["']([^"']+)["']"#).expect("valid regex")
});
static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:app|router)\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#)
        .expect("valid regex")
});
static EVENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:addEventListener|\.on)\(\s*["'](\w+)["']"#).expect("valid regex")
});
static MAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:async )?function main\(").expect("valid regex"));
static INTERFACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?interface\s+(\w+)").expect("valid regex")
});
static TYPE_ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?type\s+(\w+)\s*=").expect("valid regex")
});
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(?:readonly\s+)?(\w+)\??\s*:\s*([^;,]+)[;,]?\s*$").expect("valid regex")
});

pub struct TypeScriptExtractor {
    language: &'static str,
}

impl TypeScriptExtractor {
    pub fn typescript() -> Self {
        Self {
            language: "typescript",
        }
    }

    pub fn javascript() -> Self {
        Self {
            language: "javascript",
        }
    }
}

impl LanguageExtractor for TypeScriptExtractor {
    fn language(&self) -> &'static str {
        self.language
    }

    fn extract(&self, source: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for capture in EXPORT_RE.captures_iter(source) {
            extraction.exports.push(capture[1].to_string());
        }
        extraction.exports.truncate(MAX_EXPORTS);

        for capture in IMPORT_RE.captures_iter(source) {
            extraction.imports.push(capture[1].to_string());
        }

        let routes: Vec<_> = ROUTE_RE.captures_iter(source).collect();
        if !routes.is_empty() {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "api_route".to_string(),
                triggers: routes
                    .iter()
                    .map(|c| json!({"method": c[1].to_uppercase(), "route": &c[2]}))
                    .collect(),
                summary: format!("{} HTTP route(s)", routes.len()),
            });
        }
        let events: Vec<_> = EVENT_RE.captures_iter(source).collect();
        if !events.is_empty() {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "event_handler".to_string(),
                triggers: events.iter().map(|c| json!({"event": &c[1]})).collect(),
                summary: format!("{} event handler(s)", events.len()),
            });
        }
        if MAIN_RE.is_match(source) {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "main".to_string(),
                triggers: vec![json!({"kind": "script"})],
                summary: "Script entry point".to_string(),
            });
        }

        extraction.data_contracts = extract_contracts(source);
        extraction
    }
}

fn extract_contracts(source: &str) -> Vec<DataContractInfo> {
    let lines: Vec<&str> = source.lines().collect();
    let mut contracts = Vec::new();

    for (line_no, line) in lines.iter().enumerate() {
        if let Some(capture) = INTERFACE_RE.captures(line) {
            let mut fields = Vec::new();
            for body_line in lines.iter().skip(line_no + 1) {
                if body_line.trim_start().starts_with('}') {
                    break;
                }
                if let Some(field) = FIELD_RE.captures(body_line) {
                    if fields.len() < MAX_EXPORTS {
                        fields.push((field[1].to_string(), field[2].trim().to_string()));
                    }
                }
            }
            contracts.push(DataContractInfo {
                name: capture[1].to_string(),
                contract_type: "interface".to_string(),
                fields,
                validation_rules: vec![],
            });
        } else if let Some(capture) = TYPE_ALIAS_RE.captures(line) {
            contracts.push(DataContractInfo {
                name: capture[1].to_string(),
                contract_type: "type_alias".to_string(),
                fields: vec![],
                validation_rules: vec![],
            });
        }
    }
    contracts
}

// ============================================================================
// TESTS
// ============================================================================
