//! Lexical Search (BM25)
//!
//! Process-lifetime keyword index derived from the current contents of
//! the collection. The tokenizer is code-aware: identifiers split on
//! snake_case and camelCase boundaries so `getUserName` matches a query
//! for "user name". No stemming.
//!
//! The shared index carries a dirty flag; any write path marks it dirty
//! and the next search rebuilds. All transitions happen under one mutex,
//! so concurrent searchers either see a fully built index or wait for
//! one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{lock_poisoned, Result};
use crate::store::Collection;

// ============================================================================
// TOKENIZER
// ============================================================================

/// Split an identifier at camelCase boundaries (`getUserName` →
/// `get`, `User`, `Name`; `HTTPServer` → `HTTP`, `Server`)
fn split_camel(word: &str) -> Vec<&str> {
    let chars: Vec<char> = word.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];
        let next_lower = chars.get(i + 1).map(|c| c.is_lowercase()).unwrap_or(false);

        let boundary = (prev.is_lowercase() && cur.is_uppercase())
            || (prev.is_uppercase() && cur.is_uppercase() && next_lower)
            || (prev.is_alphabetic() && cur.is_numeric())
            || (prev.is_numeric() && cur.is_alphabetic());

        if boundary {
            parts.push(&word[byte_index(word, start)..byte_index(word, i)]);
            start = i;
        }
    }
    parts.push(&word[byte_index(word, start)..]);
    parts
}

fn byte_index(word: &str, char_index: usize) -> usize {
    word.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(word.len())
}

/// Code-aware tokenization: split on whitespace, punctuation, and
/// snake/camel boundaries; lowercase; no stemming. Single-character
/// fragments are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        for part in split_camel(raw) {
            if part.chars().count() >= 2 {
                tokens.push(part.to_lowercase());
            }
        }
    }
    tokens
}

// ============================================================================
// BM25 INDEX
// ============================================================================

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// A document as fed to the lexical index
#[derive(Debug, Clone)]
pub struct LexicalDoc {
    pub id: String,
    pub text: String,
    pub metadata: Value,
}

/// A lexical search hit
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub id: String,
    pub text: String,
    pub metadata: Value,
    pub bm25_score: f32,
}

struct IndexedDoc {
    doc: LexicalDoc,
    term_freq: HashMap<String, f32>,
    length: f32,
}

/// Immutable BM25 index over a snapshot of the collection
pub struct Bm25Index {
    docs: Vec<IndexedDoc>,
    doc_freq: HashMap<String, usize>,
    avg_length: f32,
}

impl Bm25Index {
    /// Build an index from document snapshots
    pub fn build(docs: Vec<LexicalDoc>) -> Self {
        let mut indexed = Vec::with_capacity(docs.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0.0f32;

        for doc in docs {
            let tokens = tokenize(&doc.text);
            let mut term_freq: HashMap<String, f32> = HashMap::new();
            for token in &tokens {
                *term_freq.entry(token.clone()).or_default() += 1.0;
            }
            for term in term_freq.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            total_length += tokens.len() as f32;
            indexed.push(IndexedDoc {
                doc,
                term_freq,
                length: tokens.len() as f32,
            });
        }

        let avg_length = if indexed.is_empty() {
            0.0
        } else {
            total_length / indexed.len() as f32
        };

        Self {
            docs: indexed,
            doc_freq,
            avg_length,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Score all documents against the query and return the top-k.
    /// An empty collection yields an empty result, never an error.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<LexicalHit> {
        if self.docs.is_empty() {
            return vec![];
        }

        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return vec![];
        }

        let n = self.docs.len() as f32;
        let mut hits: Vec<LexicalHit> = Vec::new();

        for indexed in &self.docs {
            let mut score = 0.0f32;
            for term in &query_terms {
                let Some(tf) = indexed.term_freq.get(term) else {
                    continue;
                };
                let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let denom = tf
                    + BM25_K1
                        * (1.0 - BM25_B + BM25_B * indexed.length / self.avg_length.max(1.0));
                score += idf * tf * (BM25_K1 + 1.0) / denom;
            }
            if score > 0.0 {
                hits.push(LexicalHit {
                    id: indexed.doc.id.clone(),
                    text: indexed.doc.text.clone(),
                    metadata: indexed.doc.metadata.clone(),
                    bm25_score: score,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.bm25_score
                .partial_cmp(&a.bm25_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        hits
    }
}

// ============================================================================
// SHARED INDEX WITH INVALIDATION
// ============================================================================

struct LexicalState {
    index: Option<Arc<Bm25Index>>,
    dirty: bool,
}

/// Process-wide lexical index with dirty-flag invalidation
pub struct LexicalIndex {
    state: Mutex<LexicalState>,
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LexicalState {
                index: None,
                dirty: true,
            }),
        }
    }

    /// Mark the index stale. Called by every write path.
    pub fn mark_dirty(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.dirty = true;
        }
    }

    /// Return a current index, rebuilding from the collection if the
    /// index is stale, absent, or `rebuild` is forced.
    pub fn ensure_current(&self, collection: &Collection, rebuild: bool) -> Result<Arc<Bm25Index>> {
        let mut state = self.state.lock().map_err(|_| lock_poisoned("lexical index"))?;

        if rebuild || state.dirty || state.index.is_none() {
            let docs = collection
                .get_where(None)?
                .into_iter()
                .map(|d| LexicalDoc {
                    id: d.id,
                    text: d.text,
                    metadata: d.metadata,
                })
                .collect();
            let index = Arc::new(Bm25Index::build(docs));
            tracing::debug!(documents = index.len(), "lexical index rebuilt");
            state.index = Some(index);
            state.dirty = false;
        }

        Ok(state.index.as_ref().map(Arc::clone).expect("index just built"))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, text: &str) -> LexicalDoc {
        LexicalDoc {
            id: id.to_string(),
            text: text.to_string(),
            metadata: json!({}),
        }
    }

    #[test]
    fn test_tokenize_snake_and_camel() {
        assert_eq!(tokenize("get_user_name"), vec!["get", "user", "name"]);
        assert_eq!(tokenize("getUserName"), vec!["get", "user", "name"]);
        assert_eq!(tokenize("HTTPServer"), vec!["http", "server"]);
        assert_eq!(
            tokenize("fn validate_input(data):"),
            vec!["fn", "validate", "input", "data"]
        );
    }

    #[test]
    fn test_tokenize_drops_single_chars() {
        assert_eq!(tokenize("add(a, b)"), vec!["add"]);
    }

    #[test]
    fn test_bm25_ranks_matching_doc_first() {
        let index = Bm25Index::build(vec![
            doc("doc:1", "def add(a, b): return a + b"),
            doc("doc:2", "def validate_input(data): check types"),
            doc("doc:3", "configuration loading and defaults"),
        ]);

        let hits = index.search("add two numbers", 10);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].id, "doc:1");
    }

    #[test]
    fn test_bm25_empty_index_returns_empty() {
        let index = Bm25Index::build(vec![]);
        assert!(index.search("anything", 10).is_empty());
    }

    #[test]
    fn test_bm25_camel_matches_spaced_query() {
        let index = Bm25Index::build(vec![
            doc("doc:1", "fn getUserName() -> String"),
            doc("doc:2", "fn renderTemplate() -> Html"),
        ]);
        let hits = index.search("user name", 10);
        assert_eq!(hits[0].id, "doc:1");
    }

    #[test]
    fn test_bm25_deterministic_tie_break() {
        let index = Bm25Index::build(vec![
            doc("doc:b", "token token"),
            doc("doc:a", "token token"),
        ]);
        let hits = index.search("token", 10);
        assert_eq!(hits[0].id, "doc:a");
        assert_eq!(hits[1].id, "doc:b");
    }

    #[test]
    fn test_shared_index_rebuilds_when_dirty() {
        use crate::embedding::Embedder;
        use crate::store::{Collection, DocumentEntry};

        let dir = tempfile::TempDir::new().unwrap();
        let collection =
            Collection::open(dir.path().join("engram.db"), Arc::new(Embedder::new())).unwrap();
        let lexical = LexicalIndex::new();

        let first = lexical.ensure_current(&collection, false).unwrap();
        assert_eq!(first.len(), 0);

        collection
            .upsert(vec![DocumentEntry::new(
                "note:1",
                "retry with backoff",
                json!({"type": "note", "repository": "r", "branch": "main"}),
            )])
            .unwrap();

        // Not yet marked dirty: cached index still served
        let stale = lexical.ensure_current(&collection, false).unwrap();
        assert_eq!(stale.len(), 0);

        lexical.mark_dirty();
        let fresh = lexical.ensure_current(&collection, false).unwrap();
        assert_eq!(fresh.len(), 1);

        // Forced rebuild works without the dirty flag
        let forced = lexical.ensure_current(&collection, true).unwrap();
        assert_eq!(forced.len(), 1);
    }
}
