//! Source Chunker
//!
//! Splits file contents into embedding-sized chunks. Known languages
//! split at declaration boundaries where possible; unknown languages
//! fall back to line accumulation. A small overlap carries context
//! across adjacent chunks. Empty files produce no chunks.

// ============================================================================
// CONSTANTS
// ============================================================================

/// Target chunk size in characters
pub const CHUNK_TARGET_CHARS: usize = 1500;

/// Overlap carried from the tail of one chunk into the next
pub const CHUNK_OVERLAP_CHARS: usize = 100;

// ============================================================================
// LANGUAGE DETECTION
// ============================================================================

/// Language by file extension; `None` means navigation-only handling
pub fn detect_language(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit('.').next()?;
    match extension {
        "py" => Some("python"),
        "ts" | "tsx" => Some("typescript"),
        "js" | "jsx" | "mjs" => Some("javascript"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        "kt" | "kts" => Some("kotlin"),
        "java" => Some("java"),
        "rb" => Some("ruby"),
        "c" | "h" => Some("c"),
        "cc" | "cpp" | "hpp" => Some("cpp"),
        "cs" => Some("csharp"),
        "swift" => Some("swift"),
        "sh" | "bash" => Some("shell"),
        "sql" => Some("sql"),
        "md" => Some("markdown"),
        "json" => Some("json"),
        "yaml" | "yml" => Some("yaml"),
        "toml" => Some("toml"),
        "html" => Some("html"),
        "css" | "scss" => Some("css"),
        _ => None,
    }
}

/// Whether a line starts a new top-level declaration for the language.
/// Used to prefer chunk boundaries that keep declarations whole.
fn is_declaration_boundary(language: Option<&str>, line: &str) -> bool {
    let trimmed = line.trim_start();
    match language {
        Some("python") => trimmed.starts_with("def ") || trimmed.starts_with("class "),
        Some("rust") => {
            trimmed.starts_with("fn ")
                || trimmed.starts_with("pub fn ")
                || trimmed.starts_with("struct ")
                || trimmed.starts_with("pub struct ")
                || trimmed.starts_with("impl ")
                || trimmed.starts_with("enum ")
                || trimmed.starts_with("pub enum ")
        }
        Some("typescript") | Some("javascript") => {
            trimmed.starts_with("function ")
                || trimmed.starts_with("export ")
                || trimmed.starts_with("class ")
                || trimmed.starts_with("const ")
        }
        Some("go") => trimmed.starts_with("func ") || trimmed.starts_with("type "),
        Some("java") | Some("kotlin") | Some("csharp") => {
            trimmed.starts_with("public ")
                || trimmed.starts_with("private ")
                || trimmed.starts_with("class ")
                || trimmed.starts_with("fun ")
        }
        _ => false,
    }
}

// ============================================================================
// CHUNKING
// ============================================================================

/// A chunk of source text with its position in the file
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Split source text into chunks around [`CHUNK_TARGET_CHARS`], breaking
/// at declaration boundaries or blank lines when one is near, with
/// [`CHUNK_OVERLAP_CHARS`] of trailing context repeated at the head of
/// the next chunk.
pub fn chunk_source(text: &str, language: Option<&str>) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return vec![];
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = String::new();

    let flush = |chunks: &mut Vec<Chunk>, current: &mut String| {
        let trimmed = current.trim_end();
        if !trimmed.trim().is_empty() {
            let index = chunks.len();
            chunks.push(Chunk {
                index,
                text: trimmed.to_string(),
            });
        }
        let overlap = tail_chars(current, CHUNK_OVERLAP_CHARS);
        current.clear();
        current.push_str(&overlap);
    };

    for line in text.lines() {
        let over_target = current.len() + line.len() + 1 > CHUNK_TARGET_CHARS;
        let at_boundary = line.trim().is_empty() || is_declaration_boundary(language, line);

        // Past the target: cut at the next friendly boundary, or hard-cut
        // once the chunk runs well past target.
        if over_target
            && !current.trim().is_empty()
            && (at_boundary || current.len() > CHUNK_TARGET_CHARS * 2)
        {
            flush(&mut chunks, &mut current);
        }

        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() {
        let index = chunks.len();
        chunks.push(Chunk {
            index,
            text: current.trim_end().to_string(),
        });
    }

    chunks
}

/// Last `count` characters of `text`, cut at a char boundary
fn tail_chars(text: &str, count: usize) -> String {
    let total = text.chars().count();
    if total <= count {
        return text.to_string();
    }
    text.chars().skip(total - count).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("app.py"), Some("python"));
        assert_eq!(detect_language("index.tsx"), Some("typescript"));
        assert_eq!(detect_language("lib.rs"), Some("rust"));
        assert_eq!(detect_language("Makefile"), None);
        assert_eq!(detect_language("data.xyz"), None);
    }

    #[test]
    fn test_empty_file_produces_no_chunks() {
        assert!(chunk_source("", Some("python")).is_empty());
        assert!(chunk_source("   \n\n  ", None).is_empty());
    }

    #[test]
    fn test_small_file_is_one_chunk() {
        let chunks = chunk_source("def add(a, b):\n    return a + b\n", Some("python"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert!(chunks[0].text.contains("add"));
    }

    #[test]
    fn test_large_file_splits_near_target() {
        let function = "def handler():\n    value = compute_something_interesting()\n    return value\n\n";
        let source = function.repeat(40); // ~3.3k chars
        let chunks = chunk_source(&source, Some("python"));

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.text.len() <= CHUNK_TARGET_CHARS * 2 + CHUNK_OVERLAP_CHARS);
        }
        // Indices are contiguous from zero
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_chunks_overlap() {
        let line = "x = 1  # padding line to fill the chunk with content\n";
        let source = line.repeat(80);
        let chunks = chunk_source(&source, Some("python"));
        assert!(chunks.len() >= 2);

        // Overlap duplicates content across boundaries, so the chunks
        // together are longer than the source
        let total: usize = chunks.iter().map(|c| c.text.len()).sum();
        assert!(total > source.trim_end().len());
    }

    #[test]
    fn test_unknown_language_still_chunks_by_lines() {
        let source = "some line of configuration\n".repeat(100);
        let chunks = chunk_source(&source, None);
        assert!(chunks.len() >= 2);
    }
}
