// ============================================================
// Layer 4 — Example Normalizer
// ============================================================
// Truncates a RawExample to the configured bounds and reshapes
// it into a Record.
//
// Truncation policy (applied in order):
//   1. Keep the first max_para_num paragraphs
//   2. Keep the first max_para_len tokens of each kept paragraph
//   3. Keep the first max_para_num rows of the similarity graph
//      and the first (kept paragraph count) columns of each row,
//      so the graph stays square and aligned with the paragraphs
//   4. Keep the first max_tgt_len target tokens, then overwrite
//      the last kept position with EOS (an empty target becomes
//      just [EOS])
//   5. decoder input = target[..n-1], labels = target[1..]
//
// Example, max_tgt_len = 5:
//   target   [3, 8, 2, 9, 4, 1]
//   kept     [3, 8, 2, 9, 4]
//   EOS      [3, 8, 2, 9, EOS]
//   tgt_ids  [3, 8, 2, 9]
//   labels   [8, 2, 9, EOS]
//
// The normalizer is pure: the graph shape check happens when
// the example is pulled from its shard (see loader.rs), where
// the file and index are known for the error message.

use serde::{Deserialize, Serialize};

use crate::domain::{example::RawExample, record::Record};

/// The fixed bounds every Record and padded batch must respect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// P — paragraphs per document
    pub max_para_num: usize,
    /// T — tokens per paragraph
    pub max_para_len: usize,
    /// L — target positions
    pub max_tgt_len:  usize,
}

impl Bounds {
    pub fn new(max_para_num: usize, max_para_len: usize, max_tgt_len: usize) -> Self {
        Self { max_para_num, max_para_len, max_tgt_len }
    }
}

/// Truncate `raw` to `bounds` and split its target into
/// decoder input and labels.
pub fn normalize(raw: RawExample, bounds: &Bounds, eos_id: u32, data_id: usize) -> Record {
    let RawExample { mut src, mut tgt, tgt_str, sim_graph: mut graph } = raw;

    src.truncate(bounds.max_para_num);
    for para in &mut src {
        para.truncate(bounds.max_para_len);
    }

    let kept = src.len();
    graph.truncate(kept);
    for row in &mut graph {
        row.truncate(kept);
    }

    tgt.truncate(bounds.max_tgt_len);
    match tgt.last_mut() {
        Some(last) => *last = eos_id,
        None       => tgt.push(eos_id),
    }

    let n = tgt.len();
    Record {
        src_ids:   src,
        tgt_ids:   tgt[..n - 1].to_vec(),
        label_ids: tgt[1..].to_vec(),
        tgt_str,
        graph,
        data_id,
    }
}

/// Bounds and EOS id bundled so the pipeline can pass one value around
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    bounds: Bounds,
    eos_id: u32,
}

impl Normalizer {
    pub fn new(bounds: Bounds, eos_id: u32) -> Self {
        Self { bounds, eos_id }
    }

    pub fn normalize(&self, raw: RawExample, data_id: usize) -> Record {
        normalize(raw, &self.bounds, self.eos_id, data_id)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const EOS: u32 = 5;

    fn raw(src: Vec<Vec<u32>>, tgt: Vec<u32>) -> RawExample {
        let n = src.len();
        let graph = (0..n)
            .map(|i| (0..n).map(|j| (i * 10 + j) as f32 / 100.0).collect())
            .collect();
        RawExample::new(src, tgt, "ref", graph)
    }

    #[test]
    fn test_target_truncated_and_eos_forced() {
        let bounds = Bounds::new(3, 4, 5);
        let rec = normalize(raw(vec![vec![1]], vec![3, 8, 2, 9, 4, 1]), &bounds, EOS, 0);
        assert_eq!(rec.tgt_ids,   vec![3, 8, 2, 9]);
        assert_eq!(rec.label_ids, vec![8, 2, 9, EOS]);
    }

    #[test]
    fn test_short_target_keeps_length() {
        // The last token is overwritten even without truncation
        let bounds = Bounds::new(3, 4, 10);
        let rec = normalize(raw(vec![vec![1]], vec![4, 11, 12]), &bounds, EOS, 0);
        assert_eq!(rec.tgt_ids,   vec![4, 11]);
        assert_eq!(rec.label_ids, vec![11, EOS]);
        assert_eq!(rec.tgt_ids.len(), rec.label_ids.len());
    }

    #[test]
    fn test_empty_target_becomes_eos() {
        let bounds = Bounds::new(3, 4, 10);
        let rec = normalize(raw(vec![vec![1]], vec![]), &bounds, EOS, 0);
        assert!(rec.tgt_ids.is_empty());
        assert!(rec.label_ids.is_empty());
    }

    #[test]
    fn test_paragraphs_and_graph_truncated_together() {
        let bounds = Bounds::new(3, 2, 10);
        let src = vec![vec![1, 2, 3], vec![4], vec![5, 6], vec![7], vec![8, 9, 10]];
        let rec = normalize(raw(src, vec![4, 5]), &bounds, EOS, 7);

        assert_eq!(rec.src_ids, vec![vec![1, 2], vec![4], vec![5, 6]]);
        assert_eq!(rec.graph.len(), 3);
        assert!(rec.graph.iter().all(|row| row.len() == 3));
        // Kept block is the top-left corner of the original matrix
        assert_eq!(rec.graph[2][1], 0.21);
        assert_eq!(rec.data_id, 7);
        assert_eq!(rec.tgt_str, "ref");
    }

    #[test]
    fn test_within_bounds_is_untouched() {
        let bounds = Bounds::new(4, 4, 10);
        let src = vec![vec![1, 2], vec![3]];
        let rec = Normalizer::new(bounds, EOS).normalize(raw(src.clone(), vec![4, 6, 5]), 0);
        assert_eq!(rec.src_ids, src);
        assert_eq!(rec.src_token_count(), 3);
        assert_eq!(rec.graph.len(), 2);
    }
}
