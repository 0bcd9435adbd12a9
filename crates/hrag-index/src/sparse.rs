//! BM25 (Okapi) keyword index.

use std::collections::HashMap;

use crate::types::{IndexedChunk, RankedResult, RetrievalMethod};

pub const K1: f64 = 1.5;
pub const B: f64 = 0.75;
/// Fraction of the mean IDF used as a floor for terms present in most chunks.
pub const EPSILON: f64 = 0.25;

/// Lowercase, treat anything outside `[a-z0-9]` as a separator.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Immutable BM25 index over a chunk set. Rebuilt wholesale on ingestion.
#[derive(Debug, Default)]
pub struct Bm25Index {
    chunks: Vec<IndexedChunk>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Index {
    #[must_use]
    pub fn new(chunks: Vec<IndexedChunk>) -> Self {
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_lens = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();

        for chunk in &chunks {
            let tokens = tokenize(&chunk.content);
            doc_lens.push(tokens.len());
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_default() += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            term_freqs.push(tf);
        }

        #[allow(clippy::cast_precision_loss)]
        let n = chunks.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let avg_doc_len = if chunks.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f64 / n
        };

        let mut idf: HashMap<String, f64> = doc_freq
            .into_iter()
            .map(|(term, df)| {
                let df = f64::from(df);
                (term, ((n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        if !idf.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let mean = idf.values().sum::<f64>() / idf.len() as f64;
            let floor = EPSILON * mean;
            for value in idf.values_mut() {
                if *value < 0.0 {
                    *value = floor;
                }
            }
        }

        Self {
            chunks,
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }

    /// BM25 score of every chunk for `query`, in chunk order.
    #[must_use]
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let terms = tokenize(query);
        self.term_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(tf, &len)| {
                #[allow(clippy::cast_precision_loss)]
                let norm = if self.avg_doc_len > 0.0 {
                    1.0 - B + B * len as f64 / self.avg_doc_len
                } else {
                    1.0
                };
                terms
                    .iter()
                    .map(|term| {
                        let freq = f64::from(tf.get(term).copied().unwrap_or(0));
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        idf * freq * (K1 + 1.0) / (freq + K1 * norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Top `top_k` chunks by BM25 score. Chunks scoring zero or below are
    /// omitted; equal scores keep chunk order.
    #[must_use]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<RankedResult> {
        let mut scored: Vec<(usize, f64)> = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (idx, score))| RankedResult {
                chunk: self.chunks[idx].clone(),
                method: RetrievalMethod::Sparse,
                rank: i + 1,
                #[allow(clippy::cast_possible_truncation)]
                score: Some(score as f32),
            })
            .collect()
    }
}
