// ============================================================
// Layer 4 — Padding & Bias Synthesizer
// ============================================================
// Turns a batch of Records into dense, fixed-shape host arrays.
// Everything here is plain Vec arithmetic in row-major order;
// batcher.rs lifts the result into Burn tensors and does the
// attention-head broadcast.
//
// With B = records, P = max_para_num, T = max_para_len,
// L = max_tgt_len:
//
//   src_words       [B,P,T]  token ids, PAD right and bottom
//   src_words_pos   [B,P,T]  0..len-1 per paragraph, 0 in padding
//   src_sents_pos   [B,P]    0..n_paras-1, 0 in padding
//   src_words_bias  [B,P,T]  0.0 real token, MASK elsewhere
//   src_sents_bias  [B,P]    0.0 real paragraph, MASK elsewhere
//   graph_bias      [B,P,P]  1 - similarity for real pairs,
//                            GRAPH_PAD_DISTANCE elsewhere
//   tgt_words       [B,L]    decoder input ids, PAD right
//   tgt_pos         [B,L]    0..len-1, 0 in padding
//   tgt_causal_bias [L,L]    MASK strictly above the diagonal
//   label           [B,L]    label ids, PAD right
//   label_weight    [B,L]    1.0 real label, 0.0 padding
//
// Position values inside padding are inert: every padded slot
// is masked by the matching bias.

use crate::data::normalizer::Bounds;
use crate::domain::record::Record;

/// Additive bias that drives a post-softmax weight to zero.
/// Shared by every bias tensor so summed biases stay finite.
pub const ATTN_MASK_VALUE: f32 = -1e18;

/// Distance used for graph rows/columns of absent paragraphs.
/// Always paired with the sentence mask, which removes them.
pub const GRAPH_PAD_DISTANCE: f32 = 1.0;

/// Host-side arrays for one batch, flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub batch_size:      usize,
    pub bounds:          Bounds,
    pub src_words:       Vec<i64>,
    pub src_words_pos:   Vec<i64>,
    pub src_sents_pos:   Vec<i64>,
    pub src_words_bias:  Vec<f32>,
    pub src_sents_bias:  Vec<f32>,
    pub graph_bias:      Vec<f32>,
    pub tgt_words:       Vec<i64>,
    pub tgt_pos:         Vec<i64>,
    pub tgt_causal_bias: Vec<f32>,
    pub label:           Vec<i64>,
    pub label_weight:    Vec<f32>,
    /// Real (unpadded) source tokens across the batch
    pub num_src_tokens:  usize,
    /// Real (unpadded) label positions across the batch
    pub num_tgt_tokens:  usize,
}

impl PaddedBatch {
    /// [B, P, T]
    pub fn word_shape(&self) -> [usize; 3] {
        [self.batch_size, self.bounds.max_para_num, self.bounds.max_para_len]
    }

    /// [B, P]
    pub fn sent_shape(&self) -> [usize; 2] {
        [self.batch_size, self.bounds.max_para_num]
    }

    /// [B, P, P]
    pub fn graph_shape(&self) -> [usize; 3] {
        [self.batch_size, self.bounds.max_para_num, self.bounds.max_para_num]
    }

    /// [B, L]
    pub fn tgt_shape(&self) -> [usize; 2] {
        [self.batch_size, self.bounds.max_tgt_len]
    }

    /// [L, L]
    pub fn causal_shape(&self) -> [usize; 2] {
        [self.bounds.max_tgt_len, self.bounds.max_tgt_len]
    }
}

/// Strictly-upper-triangular mask of size `len × len`:
/// MASK where the key is after the query, 0.0 elsewhere.
pub fn causal_bias(len: usize) -> Vec<f32> {
    (0..len)
        .flat_map(|i| (0..len).map(move |j| if j > i { ATTN_MASK_VALUE } else { 0.0 }))
        .collect()
}

/// Right-pad `ids` to `width` with `pad` and widen to i64
fn pad_ids(ids: &[u32], width: usize, pad: u32, out: &mut Vec<i64>) {
    out.extend(ids.iter().take(width).map(|&id| id as i64));
    out.extend(std::iter::repeat(pad as i64).take(width.saturating_sub(ids.len())));
}

/// `0..len` followed by zeros up to `width`
fn positions(len: usize, width: usize, out: &mut Vec<i64>) {
    let len = len.min(width);
    out.extend(0..len as i64);
    out.extend(std::iter::repeat(0).take(width - len));
}

/// `real` for the first `len` slots, `fill` for the rest
fn mask_row(len: usize, width: usize, real: f32, fill: f32, out: &mut Vec<f32>) {
    let len = len.min(width);
    out.extend(std::iter::repeat(real).take(len));
    out.extend(std::iter::repeat(fill).take(width - len));
}

/// Converts batches of Records into PaddedBatch arrays
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    bounds: Bounds,
    pad_id: u32,
}

impl Synthesizer {
    pub fn new(bounds: Bounds, pad_id: u32) -> Self {
        Self { bounds, pad_id }
    }

    pub fn synthesize(&self, records: &[Record]) -> PaddedBatch {
        let Bounds { max_para_num: p, max_para_len: t, max_tgt_len: l } = self.bounds;
        let b = records.len();

        let mut batch = PaddedBatch {
            batch_size:      b,
            bounds:          self.bounds,
            src_words:       Vec::with_capacity(b * p * t),
            src_words_pos:   Vec::with_capacity(b * p * t),
            src_sents_pos:   Vec::with_capacity(b * p),
            src_words_bias:  Vec::with_capacity(b * p * t),
            src_sents_bias:  Vec::with_capacity(b * p),
            graph_bias:      Vec::with_capacity(b * p * p),
            tgt_words:       Vec::with_capacity(b * l),
            tgt_pos:         Vec::with_capacity(b * l),
            tgt_causal_bias: causal_bias(l),
            label:           Vec::with_capacity(b * l),
            label_weight:    Vec::with_capacity(b * l),
            num_src_tokens:  0,
            num_tgt_tokens:  0,
        };

        for record in records {
            self.pad_source(record, &mut batch);
            self.pad_target(record, &mut batch);
        }

        batch
    }

    fn pad_source(&self, record: &Record, batch: &mut PaddedBatch) {
        let Bounds { max_para_num: p, max_para_len: t, .. } = self.bounds;
        let n_paras = record.src_ids.len().min(p);

        // ── Word level ────────────────────────────────────────────────────────
        for para in record.src_ids.iter().take(p) {
            pad_ids(para, t, self.pad_id, &mut batch.src_words);
            positions(para.len(), t, &mut batch.src_words_pos);
            mask_row(para.len(), t, 0.0, ATTN_MASK_VALUE, &mut batch.src_words_bias);
            batch.num_src_tokens += para.len().min(t);
        }
        // Fully padded paragraphs
        let missing = (p - n_paras) * t;
        batch.src_words.extend(std::iter::repeat(self.pad_id as i64).take(missing));
        batch.src_words_pos.extend(std::iter::repeat(0).take(missing));
        batch.src_words_bias.extend(std::iter::repeat(ATTN_MASK_VALUE).take(missing));

        // ── Paragraph level ───────────────────────────────────────────────────
        positions(n_paras, p, &mut batch.src_sents_pos);
        mask_row(n_paras, p, 0.0, ATTN_MASK_VALUE, &mut batch.src_sents_bias);

        // ── Graph: distance = 1 - similarity ─────────────────────────────────
        for row in record.graph.iter().take(n_paras) {
            let kept = row.len().min(n_paras);
            batch.graph_bias.extend(row.iter().take(kept).map(|&sim| 1.0 - sim));
            batch.graph_bias.extend(std::iter::repeat(GRAPH_PAD_DISTANCE).take(p - kept));
        }
        let graph_rows = record.graph.len().min(n_paras);
        batch.graph_bias.extend(std::iter::repeat(GRAPH_PAD_DISTANCE).take((p - graph_rows) * p));
    }

    fn pad_target(&self, record: &Record, batch: &mut PaddedBatch) {
        let l = self.bounds.max_tgt_len;

        pad_ids(&record.tgt_ids, l, self.pad_id, &mut batch.tgt_words);
        positions(record.tgt_ids.len(), l, &mut batch.tgt_pos);

        pad_ids(&record.label_ids, l, self.pad_id, &mut batch.label);
        mask_row(record.label_ids.len(), l, 1.0, 0.0, &mut batch.label_weight);
        batch.num_tgt_tokens += record.label_ids.len().min(l);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const PAD: u32 = 6;

    fn record(src: Vec<Vec<u32>>, tgt: Vec<u32>, graph: Vec<Vec<f32>>) -> Record {
        let n = tgt.len();
        Record {
            src_ids:   src,
            tgt_ids:   tgt[..n - 1].to_vec(),
            label_ids: tgt[1..].to_vec(),
            tgt_str:   String::new(),
            graph,
            data_id:   0,
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record(
                vec![vec![11, 12, 13], vec![14]],
                vec![4, 20, 21, 5],
                vec![vec![1.0, 0.25], vec![0.25, 1.0]],
            ),
            record(vec![vec![15, 16]], vec![4, 5], vec![vec![1.0]]),
        ]
    }

    fn synth() -> Synthesizer {
        Synthesizer::new(Bounds::new(3, 4, 5), PAD)
    }

    /// Index into a flattened [B, X, Y] array
    fn at3(dims: [usize; 3], b: usize, i: usize, j: usize) -> usize {
        (b * dims[1] + i) * dims[2] + j
    }

    #[test]
    fn test_shapes() {
        let batch = synth().synthesize(&sample());
        assert_eq!(batch.word_shape(), [2, 3, 4]);
        assert_eq!(batch.src_words.len(), 2 * 3 * 4);
        assert_eq!(batch.src_words_pos.len(), 2 * 3 * 4);
        assert_eq!(batch.src_words_bias.len(), 2 * 3 * 4);
        assert_eq!(batch.src_sents_pos.len(), 2 * 3);
        assert_eq!(batch.src_sents_bias.len(), 2 * 3);
        assert_eq!(batch.graph_bias.len(), 2 * 3 * 3);
        assert_eq!(batch.tgt_words.len(), 2 * 5);
        assert_eq!(batch.label.len(), 2 * 5);
        assert_eq!(batch.label_weight.len(), 2 * 5);
        assert_eq!(batch.tgt_causal_bias.len(), 5 * 5);
    }

    #[test]
    fn test_source_tokens_padded_right_and_bottom() {
        let batch = synth().synthesize(&sample());
        let first: Vec<i64> = batch.src_words[..12].to_vec();
        assert_eq!(first, vec![11, 12, 13, 6, 14, 6, 6, 6, 6, 6, 6, 6]);
        assert_eq!(batch.num_src_tokens, 6);
    }

    #[test]
    fn test_word_bias_matches_lengths() {
        let records = sample();
        let batch   = synth().synthesize(&records);
        let dims    = batch.word_shape();

        for (b, rec) in records.iter().enumerate() {
            for i in 0..dims[1] {
                for j in 0..dims[2] {
                    let real = i < rec.src_ids.len() && j < rec.src_ids[i].len();
                    let want = if real { 0.0 } else { ATTN_MASK_VALUE };
                    assert_eq!(batch.src_words_bias[at3(dims, b, i, j)], want, "b={b} i={i} j={j}");
                }
            }
        }
    }

    #[test]
    fn test_positions() {
        let batch = synth().synthesize(&sample());
        assert_eq!(&batch.src_words_pos[..8], &[0, 1, 2, 0, 0, 0, 0, 0]);
        assert_eq!(batch.src_sents_pos, vec![0, 1, 0, 0, 0, 0]);
        assert_eq!(batch.src_sents_bias[..3], [0.0, 0.0, ATTN_MASK_VALUE]);
        assert_eq!(batch.tgt_pos[..5], [0, 1, 2, 0, 0]);
    }

    #[test]
    fn test_graph_bias_distance_and_padding() {
        let batch = synth().synthesize(&sample());
        let dims  = batch.graph_shape();

        assert_eq!(batch.graph_bias[at3(dims, 0, 0, 0)], 0.0);
        assert_eq!(batch.graph_bias[at3(dims, 0, 0, 1)], 0.75);
        assert_eq!(batch.graph_bias[at3(dims, 0, 0, 2)], GRAPH_PAD_DISTANCE);
        assert_eq!(batch.graph_bias[at3(dims, 0, 2, 0)], GRAPH_PAD_DISTANCE);
        assert_eq!(batch.graph_bias[at3(dims, 1, 1, 1)], GRAPH_PAD_DISTANCE);
    }

    #[test]
    fn test_graph_wider_than_paragraphs_is_clamped() {
        // Two paragraphs but a 3-wide graph: column 2 belongs to no
        // paragraph and must read as padding.
        let graph = vec![
            vec![1.0, 0.5, 0.1],
            vec![0.5, 1.0, 0.2],
            vec![0.1, 0.2, 1.0],
        ];
        let rec   = record(vec![vec![1], vec![2]], vec![4, 5], graph);
        let batch = synth().synthesize(&[rec]);
        let dims  = batch.graph_shape();

        assert_eq!(batch.graph_bias.len(), 3 * 3);
        assert_eq!(batch.graph_bias[at3(dims, 0, 0, 1)], 0.5);
        for i in 0..3 {
            assert_eq!(batch.graph_bias[at3(dims, 0, i, 2)], GRAPH_PAD_DISTANCE, "row {i}");
            assert_eq!(batch.graph_bias[at3(dims, 0, 2, i)], GRAPH_PAD_DISTANCE, "col {i}");
        }
    }

    #[test]
    fn test_graph_bias_symmetric_for_symmetric_input() {
        let graph = vec![
            vec![1.0, 0.2, 0.7],
            vec![0.2, 1.0, 0.4],
            vec![0.7, 0.4, 1.0],
        ];
        let rec   = record(vec![vec![1], vec![2], vec![3]], vec![4, 5], graph);
        let batch = synth().synthesize(&[rec]);
        let dims  = batch.graph_shape();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(batch.graph_bias[at3(dims, 0, i, j)], batch.graph_bias[at3(dims, 0, j, i)]);
            }
        }
    }

    #[test]
    fn test_target_and_labels() {
        let batch = synth().synthesize(&sample());
        assert_eq!(batch.tgt_words[..5], [4, 20, 21, 6, 6]);
        assert_eq!(batch.label[..5], [20, 21, 5, 6, 6]);
        assert_eq!(batch.label_weight[..5], [1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(batch.tgt_words[5..], [4, 6, 6, 6, 6]);
        assert_eq!(batch.label[5..], [5, 6, 6, 6, 6]);
        assert_eq!(batch.num_tgt_tokens, 4);
    }

    #[test]
    fn test_causal_bias() {
        let mask = causal_bias(4);
        for i in 0..4 {
            for j in 0..4 {
                let want = if j > i { ATTN_MASK_VALUE } else { 0.0 };
                assert_eq!(mask[i * 4 + j], want);
            }
        }
        // Independent of batch content
        assert_eq!(synth().synthesize(&sample()).tgt_causal_bias, causal_bias(5));
    }

    #[test]
    fn test_bias_values_are_in_family() {
        let batch = synth().synthesize(&sample());
        assert!(batch.src_words_bias.iter().all(|&v| v == 0.0 || v == ATTN_MASK_VALUE));
        assert!(batch.src_sents_bias.iter().all(|&v| v == 0.0 || v == ATTN_MASK_VALUE));
        assert!(batch.graph_bias.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
