// ============================================================
// Layer 3 — Record Domain Type
// ============================================================
// A document after truncation to the configured bounds.
//
// Invariants (established by the normalizer):
//   - src_ids.len()            <= max_para_num
//   - every paragraph length   <= max_para_len
//   - graph is src_ids.len() × src_ids.len()
//   - tgt_ids.len() == label_ids.len()
//   - label_ids ends with EOS (when non-empty)
//
// Example, max_tgt_len = 5, target [3, 8, 2, 9, 4, 1]:
//   target     → [3, 8, 2, 9, EOS]
//   tgt_ids    → [3, 8, 2, 9]        (decoder input)
//   label_ids  → [8, 2, 9, EOS]      (next-token labels)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Truncated paragraphs of token ids
    pub src_ids: Vec<Vec<u32>>,

    /// Decoder input: target without its final token
    pub tgt_ids: Vec<u32>,

    /// Labels: target without its first token
    pub label_ids: Vec<u32>,

    /// Untokenised reference text
    pub tgt_str: String,

    /// Truncated similarity matrix, index-aligned with src_ids
    pub graph: Vec<Vec<f32>>,

    /// Position of the example in load order across the phase
    pub data_id: usize,
}

impl Record {
    /// Total real source tokens across all paragraphs
    pub fn src_token_count(&self) -> usize {
        self.src_ids.iter().map(Vec::len).sum()
    }

    pub fn tgt_len(&self) -> usize {
        self.tgt_ids.len()
    }
}
