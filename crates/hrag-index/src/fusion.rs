//! Reciprocal Rank Fusion.
//!
//! Each list contributes `1 / (k + rank)` per chunk, rank being the 1-indexed
//! position in that list. Only ranks matter, so cosine similarities and BM25
//! scores combine without normalization.

use std::collections::{HashMap, HashSet};

use crate::types::{FusedResult, RankedResult};

pub const DEFAULT_RRF_K: f64 = 60.0;

/// Merge rank-ordered lists into one list keyed by chunk id, sorted by
/// descending fused score.
///
/// Equal scores keep first-seen order: lists are scanned in the order given,
/// each from rank 1 down. A chunk repeated within one list counts once, at its
/// best rank.
#[must_use]
pub fn reciprocal_rank_fusion(lists: &[&[RankedResult]], k: f64) -> Vec<FusedResult> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<FusedResult> = Vec::new();

    for list in lists {
        let mut seen_in_list: HashSet<&str> = HashSet::new();
        for (i, result) in list.iter().enumerate() {
            let id = result.chunk.id.as_str();
            if !seen_in_list.insert(id) {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let contribution = 1.0 / (k + (i + 1) as f64);
            match slots.get(id) {
                Some(&slot) => fused[slot].score += contribution,
                None => {
                    slots.insert(id, fused.len());
                    fused.push(FusedResult {
                        chunk: result.chunk.clone(),
                        score: contribution,
                    });
                }
            }
        }
    }

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}
