//! BM25 (Okapi) lexical index over whole documents.
//!
//! # Scoring
//!
//! ```text
//! idf(t)    = ln(N - n(t) + 0.5) - ln(n(t) + 0.5)
//! score(d)  = Σ_{t ∈ q} idf(t) · tf(t,d)·(k1 + 1) / (tf(t,d) + k1·(1 - b + b·|d|/avgdl))
//! ```
//!
//! Terms whose idf comes out negative (present in more than half the
//! corpus) are floored to `epsilon × mean idf`. Repeated query terms count
//! once per occurrence; terms absent from the corpus contribute nothing.
//!
//! Queries return at most `k` documents and drop any document that does not
//! score strictly above zero, so a query with no overlapping term returns
//! nothing. Note that in a corpus where every term is common (a single
//! document, for example) all idfs are floored to a negative value and the
//! lexical side returns nothing; semantic retrieval carries such corpora.

use std::collections::HashMap;

use crate::models::{Document, SearchResult};
use crate::tokenize::tokenize;

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;
pub const DEFAULT_EPSILON: f64 = 0.25;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

struct IndexedDoc {
    document: Document,
    term_freqs: HashMap<String, u32>,
    len: usize,
}

/// Immutable BM25 index. Rebuild to change the corpus.
pub struct LexicalIndex {
    docs: Vec<IndexedDoc>,
    idf: HashMap<String, f64>,
    avgdl: f64,
    params: Bm25Params,
}

impl LexicalIndex {
    pub fn build(documents: &[Document]) -> Self {
        Self::build_with(documents, Bm25Params::default())
    }

    pub fn build_with(documents: &[Document], params: Bm25Params) -> Self {
        let mut docs = Vec::with_capacity(documents.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total_len = 0usize;

        for document in documents {
            let tokens = tokenize(&document.content);
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            total_len += tokens.len();
            docs.push(IndexedDoc {
                document: document.clone(),
                term_freqs,
                len: tokens.len(),
            });
        }

        let avgdl = if docs.is_empty() {
            0.0
        } else {
            total_len as f64 / docs.len() as f64
        };

        let idf = compute_idf(&doc_freqs, docs.len(), params.epsilon);

        Self {
            docs,
            idf,
            avgdl,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// BM25 score of every document for `query`, in document order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let terms = tokenize(query);
        let Bm25Params { k1, b, .. } = self.params;

        self.docs
            .iter()
            .map(|doc| {
                let norm = if self.avgdl > 0.0 {
                    doc.len as f64 / self.avgdl
                } else {
                    0.0
                };
                terms
                    .iter()
                    .map(|term| {
                        let tf = f64::from(doc.term_freqs.get(term).copied().unwrap_or(0));
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm))
                    })
                    .sum()
            })
            .collect()
    }

    /// Top `k` documents by descending score, excluding non-positive scores.
    ///
    /// Ties keep document order.
    pub fn query(&self, query: &str, k: usize) -> Vec<SearchResult> {
        let mut ranked: Vec<(usize, f64)> = self.scores(query).into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        ranked
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(i, score)| {
                let doc = &self.docs[i].document;
                SearchResult {
                    content: doc.content.clone(),
                    score,
                    source: doc.source.clone(),
                    metadata: doc.metadata.clone(),
                }
            })
            .collect()
    }
}

fn compute_idf(doc_freqs: &HashMap<String, u32>, n_docs: usize, epsilon: f64) -> HashMap<String, f64> {
    let n = n_docs as f64;
    let mut idf = HashMap::with_capacity(doc_freqs.len());
    let mut idf_sum = 0.0;
    let mut negative = Vec::new();

    for (term, freq) in doc_freqs {
        let freq = f64::from(*freq);
        let value = (n - freq + 0.5).ln() - (freq + 0.5).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.clone());
        }
        idf.insert(term.clone(), value);
    }

    if !idf.is_empty() {
        let floor = epsilon * (idf_sum / idf.len() as f64);
        for term in negative {
            idf.insert(term, floor);
        }
    }

    idf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn corpus(texts: &[&str]) -> Vec<Document> {
        Document::corpus(
            texts
                .iter()
                .map(|t| (t.to_string(), Metadata::new()))
                .collect(),
        )
    }

    fn sample() -> LexicalIndex {
        LexicalIndex::build(&corpus(&[
            "Vacation policy: employees get 30 days of vacation after 12 months.",
            "Home office policy: at most 3 days per week.",
            "System errors: NF-404 invoice not found, AUTH-401 invalid credentials.",
            "Client code CLI-2024-0892 is active with contract CNT-2024-1234.",
        ]))
    }

    #[test]
    fn test_matching_document_ranks_first() {
        let index = sample();
        let results = index.query("NF-404 error", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "doc_2");
        assert!(results[0].content.starts_with("System errors"));
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_no_match_returns_empty() {
        let index = sample();
        assert!(index.query("kubernetes", 5).is_empty());
        assert!(index.query("", 5).is_empty());
    }

    #[test]
    fn test_results_sorted_and_truncated() {
        let index = sample();
        let results = index.query("vacation home office contract", 2);
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_repeated_query_terms_accumulate() {
        let index = sample();
        let once = index.scores("vacation")[0];
        let twice = index.scores("vacation vacation")[0];
        assert!((twice - 2.0 * once).abs() < 1e-9);
    }

    #[test]
    fn test_common_terms_floored_by_epsilon() {
        let index = sample();
        // "policy" appears in 2 of 4 docs: ln(2.5) - ln(2.5) = 0, not negative.
        assert_eq!(index.idf("policy"), Some(0.0));
        // rare terms keep a positive idf
        assert!(index.idf("nf-404").unwrap() > 0.0);
    }

    #[test]
    fn test_single_document_corpus_scores_non_positive() {
        let index = LexicalIndex::build(&corpus(&["Policy: 30 days of leave after 12 months."]));
        assert!(index.idf("leave").unwrap() < 0.0);
        assert!(index.query("How many days of leave?", 5).is_empty());
    }

    #[test]
    fn test_ties_keep_document_order() {
        let index = LexicalIndex::build(&corpus(&[
            "alpha beta",
            "alpha beta",
            "gamma delta",
            "epsilon zeta",
            "eta theta",
        ]));
        let results = index.query("alpha", 5);
        let sources: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["doc_0", "doc_1"]);
    }

    #[test]
    fn test_empty_index() {
        let index = LexicalIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.query("anything", 3).is_empty());
    }
}
