//! Rust Extractor

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use super::{DataContractInfo, EntryPointInfo, Extraction, LanguageExtractor, MAX_EXPORTS};

static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*pub (?:async )?(?:fn|struct|enum|trait|type|const)\s+(\w+)")
        .expect("valid regex")
});
static USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*use\s+([\w:]+)").expect("valid regex"));
static MAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:async )?fn main\(").expect("valid regex"));
static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.route\(\s*"([^"]+)"\s*,\s*(get|post|put|delete|patch)"#).expect("valid regex")
});
static CLI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\[derive\([^)]*Parser[^)]*\)\]").expect("valid regex"));
static STRUCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub\s+)?struct\s+(\w+)").expect("valid regex")
});
static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(?:pub\s+)?(\w+)\s*:\s*([^,]+),?\s*$").expect("valid regex")
});

pub struct RustExtractor;

impl LanguageExtractor for RustExtractor {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extract(&self, source: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for capture in EXPORT_RE.captures_iter(source) {
            extraction.exports.push(capture[1].to_string());
        }
        extraction.exports.truncate(MAX_EXPORTS);

        for capture in USE_RE.captures_iter(source) {
            let root = capture[1].split("::").next().unwrap_or("").to_string();
            if !root.is_empty() && root != "crate" && root != "super" && root != "std" {
                extraction.imports.push(root);
            }
        }
        extraction.imports.dedup();

        if MAIN_RE.is_match(source) {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "main".to_string(),
                triggers: vec![json!({"kind": "binary"})],
                summary: "Binary entry point".to_string(),
            });
        }
        let routes: Vec<_> = ROUTE_RE.captures_iter(source).collect();
        if !routes.is_empty() {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "api_route".to_string(),
                triggers: routes
                    .iter()
                    .map(|c| json!({"method": c[2].to_uppercase(), "route": &c[1]}))
                    .collect(),
                summary: format!("{} HTTP route(s)", routes.len()),
            });
        }
        if CLI_RE.is_match(source) {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "cli".to_string(),
                triggers: vec![json!({"kind": "cli"})],
                summary: "Command-line interface".to_string(),
            });
        }

        extraction.data_contracts = extract_contracts(source);
        extraction
    }
}

/// Serde-derived structs are treated as data contracts
fn extract_contracts(source: &str) -> Vec<DataContractInfo> {
    let lines: Vec<&str> = source.lines().collect();
    let mut contracts = Vec::new();

    for (line_no, line) in lines.iter().enumerate() {
        let Some(capture) = STRUCT_RE.captures(line) else {
            continue;
        };
        let derives_serde = lines[..line_no]
            .iter()
            .rev()
            .take(3)
            .any(|l| l.contains("derive") && (l.contains("Serialize") || l.contains("Deserialize")));
        if !derives_serde {
            continue;
        }

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
            contract_type: "struct".to_string(),
            fields,
            validation_rules: vec![],
        });
    }
    contracts
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
use serde::{Deserialize, Serialize};
use axum::routing::post;

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub path: String,
    pub force_full: bool,
}

pub fn run_ingestion(request: IngestRequest) {}

fn main() {
    let app = Router::new().route("/v1/ingest", post(handler));
}
"#;

    #[test]
    fn test_exports_and_imports() {
        let extraction = RustExtractor.extract(SAMPLE);
        assert!(extraction.exports.contains(&"IngestRequest".to_string()));
        assert!(extraction.exports.contains(&"run_ingestion".to_string()));
        assert!(extraction.imports.contains(&"serde".to_string()));
        assert!(extraction.imports.contains(&"axum".to_string()));
    }

    #[test]
    fn test_entry_points() {
        let extraction = RustExtractor.extract(SAMPLE);
        let types: Vec<&str> = extraction
            .entry_points
            .iter()
            .map(|e| e.entry_type.as_str())
            .collect();
        assert!(types.contains(&"main"));
        assert!(types.contains(&"api_route"));
    }

    #[test]
    fn test_serde_struct_contract() {
        let extraction = RustExtractor.extract(SAMPLE);
        assert_eq!(extraction.data_contracts.len(), 1);
        let contract = &extraction.data_contracts[0];
        assert_eq!(contract.name, "IngestRequest");
        assert_eq!(contract.fields[0].0, "path");
    }

    #[test]
    fn test_plain_struct_is_not_a_contract() {
        let extraction = RustExtractor.extract("struct Internal { x: u32 }");
        assert!(extraction.data_contracts.is_empty());
    }
}
