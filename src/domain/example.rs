// ============================================================
// Layer 3 — RawExample Domain Type
// ============================================================
// One document exactly as it appears in a shard file:
//
//   {
//     "src":       [[12, 7, 99], [4, 5], ...],   paragraphs of token ids
//     "tgt":       [4, 310, 22, ..., 5],         target summary ids
//     "tgt_str":   "the reference summary",      untokenised target
//     "sim_graph": [[1.0, 0.3], [0.3, 1.0]]      paragraph similarity
//   }
//
// RawExample is immutable once loaded; the normalizer consumes
// it by value and produces a Record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExample {
    /// Ordered paragraphs, each an ordered list of token ids
    pub src: Vec<Vec<u32>>,

    /// Target token ids (BOS ... EOS in a well-formed corpus)
    pub tgt: Vec<u32>,

    /// The reference text, kept only for evaluation
    pub tgt_str: String,

    /// Square matrix of paragraph similarities in [0, 1]
    pub sim_graph: Vec<Vec<f32>>,
}

impl RawExample {
    pub fn new(
        src:       Vec<Vec<u32>>,
        tgt:       Vec<u32>,
        tgt_str:   impl Into<String>,
        sim_graph: Vec<Vec<f32>>,
    ) -> Self {
        Self { src, tgt, tgt_str: tgt_str.into(), sim_graph }
    }

    /// Checks that the similarity graph is `n × n` for `n` paragraphs.
    /// Returns a human-readable reason on failure.
    pub fn check_graph(&self) -> Result<(), String> {
        let n = self.src.len();
        if self.sim_graph.len() != n {
            return Err(format!(
                "sim_graph has {} rows but the example has {} paragraphs",
                self.sim_graph.len(), n
            ));
        }
        if let Some((i, row)) = self.sim_graph.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(format!(
                "sim_graph row {} has {} columns, expected {}",
                i, row.len(), n
            ));
        }
        Ok(())
    }
}
