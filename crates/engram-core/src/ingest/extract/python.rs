//! Python Extractor
//!
//! Regex-driven extraction of top-level defs/classes, imports, web/CLI
//! entry points, and pydantic/dataclass shapes.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use super::{DataContractInfo, EntryPointInfo, Extraction, LanguageExtractor, MAX_EXPORTS};

static DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:async )?def (\w+)").expect("valid regex"));
static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^class (\w+)(?:\(([^)]*)\))?:").expect("valid regex"));
static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:from (\S+) import|import (\S+))").expect("valid regex"));
static MAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"if __name__ == ["']__main__["']"#).expect("valid regex"));
static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@(?:\w+)\.(get|post|put|delete|patch|route)\(\s*["']([^"']+)["']"#)
        .expect("valid regex")
});
static CLI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@click\.(?:command|group)|argparse\.ArgumentParser").expect("valid regex")
});
static EVENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@\w+\.on(?:_event)?\(\s*["'](\w+)["']"#).expect("valid regex")
});
static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{4}(\w+)\s*:\s*(.+?)(?:\s*=.*)?$").expect("valid regex"));

pub struct PythonExtractor;

impl LanguageExtractor for PythonExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extract(&self, source: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for capture in DEF_RE.captures_iter(source) {
            let name = capture[1].to_string();
            if !name.starts_with('_') {
                extraction.exports.push(name);
            }
        }
        for capture in CLASS_RE.captures_iter(source) {
            extraction.exports.push(capture[1].to_string());
        }
        extraction.exports.truncate(MAX_EXPORTS);

        for capture in IMPORT_RE.captures_iter(source) {
            let module = capture
                .get(1)
                .or_else(|| capture.get(2))
                .map(|m| m.as_str().to_string());
            if let Some(module) = module {
                extraction.imports.push(module);
            }
        }

        if MAIN_RE.is_match(source) {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "main".to_string(),
                triggers: vec![json!({"kind": "script"})],
                summary: "Script entry point".to_string(),
            });
        }
        let routes: Vec<_> = ROUTE_RE.captures_iter(source).collect();
        if !routes.is_empty() {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "api_route".to_string(),
                triggers: routes
                    .iter()
                    .map(|c| {
                        json!({
                            "method": c[1].to_uppercase(),
                            "route": &c[2],
                        })
                    })
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
        let events: Vec<_> = EVENT_RE.captures_iter(source).collect();
        if !events.is_empty() {
            extraction.entry_points.push(EntryPointInfo {
                entry_type: "event_handler".to_string(),
                triggers: events.iter().map(|c| json!({"event": &c[1]})).collect(),
                summary: format!("{} event handler(s)", events.len()),
            });
        }

        extraction.data_contracts = extract_contracts(source);
        extraction
    }
}

/// Pydantic models, TypedDicts, and dataclasses with their field lists
fn extract_contracts(source: &str) -> Vec<DataContractInfo> {
    let lines: Vec<&str> = source.lines().collect();
    let mut contracts = Vec::new();

    for (line_no, line) in lines.iter().enumerate() {
        let Some(capture) = CLASS_RE.captures(line) else {
            continue;
        };
        let name = capture[1].to_string();
        let bases = capture.get(2).map(|m| m.as_str()).unwrap_or("");
        let preceded_by_dataclass = line_no > 0 && lines[line_no - 1].trim().starts_with("@dataclass");

        let contract_type = if bases.contains("BaseModel") {
            "pydantic_model"
        } else if bases.contains("TypedDict") {
            "typed_dict"
        } else if preceded_by_dataclass {
            "dataclass"
        } else {
            continue;
        };

        let mut fields = Vec::new();
        let mut validation_rules = Vec::new();
        for body_line in lines.iter().skip(line_no + 1) {
            if !body_line.starts_with("    ") && !body_line.trim().is_empty() {
                break;
            }
            if let Some(field) = FIELD_RE.captures(body_line) {
                if fields.len() < MAX_EXPORTS {
                    fields.push((field[1].to_string(), field[2].trim().to_string()));
                }
            }
            if body_line.contains("Field(") || body_line.contains("validator") {
                validation_rules.push(body_line.trim().to_string());
            }
        }

        contracts.push(DataContractInfo {
            name,
            contract_type: contract_type.to_string(),
            fields,
            validation_rules,
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
import json
from pathlib import Path

class IngestRequest(BaseModel):
    path: str
    force_full: bool = False

@app.post("/v1/ingest")
def ingest(request: IngestRequest):
    return run(request)

def _private_helper():
    pass

if __name__ == "__main__":
    main()
"#;

    #[test]
    fn test_exports_skip_private_defs() {
        let extraction = PythonExtractor.extract(SAMPLE);
        assert!(extraction.exports.contains(&"ingest".to_string()));
        assert!(extraction.exports.contains(&"IngestRequest".to_string()));
        assert!(!extraction.exports.contains(&"_private_helper".to_string()));
    }

    #[test]
    fn test_imports() {
        let extraction = PythonExtractor.extract(SAMPLE);
        assert!(extraction.imports.contains(&"json".to_string()));
        assert!(extraction.imports.contains(&"pathlib".to_string()));
    }

    #[test]
    fn test_entry_points() {
        let extraction = PythonExtractor.extract(SAMPLE);
        let types: Vec<&str> = extraction
            .entry_points
            .iter()
            .map(|e| e.entry_type.as_str())
            .collect();
        assert!(types.contains(&"main"));
        assert!(types.contains(&"api_route"));

        let route = extraction
            .entry_points
            .iter()
            .find(|e| e.entry_type == "api_route")
            .unwrap();
        assert_eq!(route.triggers[0]["method"], "POST");
        assert_eq!(route.triggers[0]["route"], "/v1/ingest");
    }

    #[test]
    fn test_pydantic_contract_fields() {
        let extraction = PythonExtractor.extract(SAMPLE);
        assert_eq!(extraction.data_contracts.len(), 1);
        let contract = &extraction.data_contracts[0];
        assert_eq!(contract.name, "IngestRequest");
        assert_eq!(contract.contract_type, "pydantic_model");
        assert_eq!(contract.fields[0], ("path".to_string(), "str".to_string()));
    }

    #[test]
    fn test_dataclass_contract() {
        let source = "@dataclass\nclass Point:\n    x: int\n    y: int\n";
        let extraction = PythonExtractor.extract(source);
        assert_eq!(extraction.data_contracts[0].contract_type, "dataclass");
        assert_eq!(extraction.data_contracts[0].fields.len(), 2);
    }
}
