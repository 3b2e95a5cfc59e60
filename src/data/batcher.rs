// ============================================================
// Layer 4 — GraphSum Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<Record>
// into the tensors the graph encoder-decoder consumes.
//
// Steps:
//   1. Synthesizer pads the records into host arrays
//   2. Each array becomes a Burn tensor of its padded shape
//   3. Word/sentence/graph/causal biases are broadcast along a
//      new attention-head axis of size H (replication only)
//   4. Encoder-decoder biases are sliced out of the broadcast
//      word/sentence biases at query index 0 and re-expanded
//      along the target axis, so step 3 must come first
//
// Resulting bias shapes (B batch, P paras, T tokens, L target,
// H heads):
//   src_words_self_attn_bias  [B,P,H,T,T]
//   src_sents_self_attn_bias  [B,H,P,P]
//   graph_attn_bias           [B,H,P,P]
//   tgt_self_attn_bias        [B,H,L,L]
//   tgt_src_words_attn_bias   [B,P,H,L,T]
//   tgt_src_sents_attn_bias   [B,H,L,P]
//
// The batcher is called only with non-empty record lists; the
// bucketer never emits an empty batch.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::{Shape, TensorData},
};

use crate::data::{
    normalizer::Bounds,
    synthesizer::{PaddedBatch, Synthesizer},
};
use crate::domain::record::Record;

// ─── EncoderInput ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct EncoderInput<B: Backend> {
    /// [B, P, T]
    pub src_words:                Tensor<B, 3, Int>,
    /// [B, P, T]
    pub src_words_pos:            Tensor<B, 3, Int>,
    /// [B, P]
    pub src_sents_pos:            Tensor<B, 2, Int>,
    /// [B, P, H, T, T]
    pub src_words_self_attn_bias: Tensor<B, 5>,
    /// [B, H, P, P]
    pub src_sents_self_attn_bias: Tensor<B, 4>,
    /// [B, H, P, P]
    pub graph_attn_bias:          Tensor<B, 4>,
}

// ─── DecoderInput ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct DecoderInput<B: Backend> {
    /// [B, L]
    pub tgt_words:               Tensor<B, 2, Int>,
    /// [B, L]
    pub tgt_pos:                 Tensor<B, 2, Int>,
    /// [B, H, L, L]
    pub tgt_self_attn_bias:      Tensor<B, 4>,
    /// [B, P, H, L, T]
    pub tgt_src_words_attn_bias: Tensor<B, 5>,
    /// [B, H, L, P]
    pub tgt_src_sents_attn_bias: Tensor<B, 4>,
    /// [B, H, P, P], the same tensor as the encoder's
    pub graph_attn_bias:         Tensor<B, 4>,
}

// ─── GraphSumBatch ────────────────────────────────────────────────────────────
/// Immutable bundle of everything one training or evaluation
/// step needs. A new batch is built for every call to `batch`.
#[derive(Debug, Clone)]
pub struct GraphSumBatch<B: Backend> {
    size:            usize,
    enc_input:       EncoderInput<B>,
    dec_input:       DecoderInput<B>,
    tgt_causal_bias: Tensor<B, 2>,
    tgt_label:       Tensor<B, 2, Int>,
    label_weight:    Tensor<B, 2>,
    data_ids:        Vec<usize>,
    tgt_str:         Option<Vec<String>>,
    num_src_tokens:  usize,
    num_tgt_tokens:  usize,
}

impl<B: Backend> GraphSumBatch<B> {
    /// Number of records in the batch
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn enc_input(&self) -> &EncoderInput<B> {
        &self.enc_input
    }

    pub fn dec_input(&self) -> &DecoderInput<B> {
        &self.dec_input
    }

    /// [L, L], shared by every record
    pub fn tgt_causal_bias(&self) -> &Tensor<B, 2> {
        &self.tgt_causal_bias
    }

    /// [B, L]
    pub fn tgt_label(&self) -> &Tensor<B, 2, Int> {
        &self.tgt_label
    }

    /// [B, L]; 1.0 on real labels, 0.0 on padding
    pub fn label_weight(&self) -> &Tensor<B, 2> {
        &self.label_weight
    }

    /// Load-order ids of the records, index-aligned with the batch
    pub fn data_ids(&self) -> &[usize] {
        &self.data_ids
    }

    /// Reference strings; only retained when batching for test
    pub fn tgt_str(&self) -> Option<&[String]> {
        self.tgt_str.as_deref()
    }

    pub fn num_src_tokens(&self) -> usize {
        self.num_src_tokens
    }

    pub fn num_tgt_tokens(&self) -> usize {
        self.num_tgt_tokens
    }
}

// ─── GraphSumBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct GraphSumBatcher<B: Backend> {
    device:      B::Device,
    synthesizer: Synthesizer,
    n_heads:     usize,
    is_test:     bool,
}

impl<B: Backend> GraphSumBatcher<B> {
    pub fn new(device: B::Device, bounds: Bounds, pad_id: u32, n_heads: usize, is_test: bool) -> Self {
        Self {
            device,
            synthesizer: Synthesizer::new(bounds, pad_id),
            n_heads,
            is_test,
        }
    }

    fn int_tensor<const D: usize>(&self, values: Vec<i64>, shape: [usize; D]) -> Tensor<B, D, Int> {
        Tensor::from_data(TensorData::new(values, shape), &self.device)
    }

    fn float_tensor<const D: usize>(&self, values: Vec<f32>, shape: [usize; D]) -> Tensor<B, D> {
        Tensor::from_data(TensorData::new(values, shape), &self.device)
    }

    fn build(&self, padded: PaddedBatch, data_ids: Vec<usize>, tgt_str: Option<Vec<String>>) -> GraphSumBatch<B> {
        let [b, p, t] = padded.word_shape();
        let l = padded.bounds.max_tgt_len;
        let h = self.n_heads;

        let word_shape   = padded.word_shape();
        let sent_shape   = padded.sent_shape();
        let graph_shape  = padded.graph_shape();
        let tgt_shape    = padded.tgt_shape();
        let causal_shape = padded.causal_shape();

        let src_words      = self.int_tensor(padded.src_words, word_shape);
        let src_words_pos  = self.int_tensor(padded.src_words_pos, word_shape);
        let src_sents_pos  = self.int_tensor(padded.src_sents_pos, sent_shape);
        let src_words_bias = self.float_tensor(padded.src_words_bias, word_shape);
        let src_sents_bias = self.float_tensor(padded.src_sents_bias, sent_shape);
        let graph_bias     = self.float_tensor(padded.graph_bias, graph_shape);
        let tgt_words      = self.int_tensor(padded.tgt_words, tgt_shape);
        let tgt_pos        = self.int_tensor(padded.tgt_pos, tgt_shape);
        let causal         = self.float_tensor(padded.tgt_causal_bias, causal_shape);
        let tgt_label      = self.int_tensor(padded.label, tgt_shape);
        let label_weight   = self.float_tensor(padded.label_weight, tgt_shape);

        // ── Head broadcast ────────────────────────────────────────────────────
        // [B,P,T] → [B,P,1,1,T] → [B,P,H,T,T]
        let src_words_self_attn_bias = src_words_bias
            .unsqueeze_dim::<4>(2)
            .unsqueeze_dim::<5>(3)
            .expand(Shape::new([b, p, h, t, t]));

        // [B,P] → [B,1,1,P] → [B,H,P,P]
        let src_sents_self_attn_bias = src_sents_bias
            .unsqueeze_dim::<3>(1)
            .unsqueeze_dim::<4>(2)
            .expand(Shape::new([b, h, p, p]));

        // [B,P,P] → [B,1,P,P] → [B,H,P,P]
        let graph_attn_bias = graph_bias
            .unsqueeze_dim::<4>(1)
            .expand(Shape::new([b, h, p, p]));

        // [L,L] → [1,1,L,L] → [B,H,L,L]
        let tgt_self_attn_bias = causal
            .clone()
            .unsqueeze_dim::<3>(0)
            .unsqueeze_dim::<4>(0)
            .expand(Shape::new([b, h, l, l]));

        // ── Cross biases, derived from the broadcast ones ─────────────────────
        // [B,P,H,T,T] → query 0 → [B,P,H,1,T] → [B,P,H,L,T]
        let tgt_src_words_attn_bias = src_words_self_attn_bias
            .clone()
            .slice([0..b, 0..p, 0..h, 0..1])
            .expand(Shape::new([b, p, h, l, t]));

        // [B,H,P,P] → query 0 → [B,H,1,P] → [B,H,L,P]
        let tgt_src_sents_attn_bias = src_sents_self_attn_bias
            .clone()
            .slice([0..b, 0..h, 0..1])
            .expand(Shape::new([b, h, l, p]));

        GraphSumBatch {
            size: b,
            enc_input: EncoderInput {
                src_words,
                src_words_pos,
                src_sents_pos,
                src_words_self_attn_bias,
                src_sents_self_attn_bias,
                graph_attn_bias: graph_attn_bias.clone(),
            },
            dec_input: DecoderInput {
                tgt_words,
                tgt_pos,
                tgt_self_attn_bias,
                tgt_src_words_attn_bias,
                tgt_src_sents_attn_bias,
                graph_attn_bias,
            },
            tgt_causal_bias: causal,
            tgt_label,
            label_weight,
            data_ids,
            tgt_str,
            num_src_tokens: padded.num_src_tokens,
            num_tgt_tokens: padded.num_tgt_tokens,
        }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<Record, GraphSumBatch<B>> for GraphSumBatcher<B> {
    fn batch(&self, items: Vec<Record>) -> GraphSumBatch<B> {
        let padded   = self.synthesizer.synthesize(&items);
        let data_ids = items.iter().map(|r| r.data_id).collect();
        let tgt_str  = self
            .is_test
            .then(|| items.into_iter().map(|r| r.tgt_str).collect());

        self.build(padded, data_ids, tgt_str)
    }
}
