use std::collections::VecDeque;

use super::types::{Chunk, Document};

/// Separators tried in order: paragraphs, lines, sentences, words, characters.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// Recursive character splitter.
///
/// Text is cut on the coarsest separator present, pieces are merged greedily
/// up to `chunk_size`, and pieces still too long are cut again with the next
/// finer separator. Chunks are whitespace-trimmed and never empty.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(position, content)| Chunk {
                content,
                source: document.metadata.source.clone(),
                position,
            })
            .collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size.max(1);
        split_recursive(text, &DEFAULT_SEPARATORS, chunk_size, self.config.chunk_overlap)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split keeping each separator at the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let sep_idx = separators
        .iter()
        .position(|s| s.is_empty() || text.contains(s))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(sep_idx).copied().unwrap_or("");
    let finer = separators.get(sep_idx + 1..).unwrap_or(&[]);

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < chunk_size {
            pending.push(piece);
            continue;
        }
        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, chunk_size, chunk_overlap));
            pending.clear();
        }
        if finer.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_owned());
            }
        } else {
            chunks.extend(split_recursive(piece, finer, chunk_size, chunk_overlap));
        }
    }
    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, chunk_size, chunk_overlap));
    }
    chunks
}

fn emit(window: &VecDeque<(&str, usize)>, chunks: &mut Vec<String>) {
    let joined: String = window.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_owned());
    }
}

/// Greedily join pieces into chunks of at most `chunk_size` characters,
/// starting each new chunk with up to `chunk_overlap` characters of the
/// previous one's trailing pieces.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0;

    for piece in pieces {
        let len = char_len(piece);
        if total + len > chunk_size && !window.is_empty() {
            emit(&window, &mut chunks);
            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                let Some((_, front)) = window.pop_front() else {
                    break;
                };
                total -= front;
            }
        }
        window.push_back((piece, len));
        total += len;
    }
    emit(&window, &mut chunks);
    chunks
}
