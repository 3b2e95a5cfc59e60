// ============================================================
// Layer 4 — Batch Bucketer
// ============================================================
// Groups a stream of Records into batches of similar length
// without materialising the whole dataset.
//
// Two buffering stages:
//
//   upstream Records
//       │
//       ▼
//   Outer buffer   → pull until the buffer is "full":
//                      example mode: batch_size * 100 records
//                      token mode:   (n + 1) * max_tgt_len
//                                    <= batch_size * 100
//       │
//       ▼
//   Sort           → stable sort on a composite key
//                      train mode: (total src tokens, tgt len)
//                      test mode:  (tgt len, total src tokens)
//       │
//       ▼
//   Inner slicing  → walk the sorted buffer, cutting a batch
//                    whenever the next record would break the
//                    size limit
//       │
//       ▼
//   Batch shuffle  → optionally shuffle batch ORDER (never the
//                    records inside a batch)
//
// Both stages share one fold accumulator (SliceAccumulator)
// which tracks the running max target length of the slice
// being built. A record that alone exceeds the token budget
// still becomes a singleton batch and is never dropped.
//
// The bucketer ends when its upstream ends. Epoch restarts are
// driven from dataloader.rs, which builds a fresh bucketer (with
// a freshly seeded RNG) per shard and per epoch.

use rand::{rngs::StdRng, seq::SliceRandom};
use std::collections::VecDeque;

use crate::domain::{error::PipelineResult, phase::Mode, record::Record};

/// Outer buffer size as a multiple of the batch size
pub const BUFFER_FACTOR: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    /// Examples per batch, or tokens per batch when `in_tokens`
    pub batch_size: usize,
    pub in_tokens:  bool,
    pub mode:       Mode,
    pub shuffle:    bool,
}

// ─── SliceAccumulator ─────────────────────────────────────────────────────────
/// Records of the slice being built plus its running max target length.
#[derive(Debug, Default)]
struct SliceAccumulator {
    records: Vec<Record>,
    max_len: usize,
}

impl SliceAccumulator {
    /// Whether a record with target length `len` fits under `limit`.
    /// An empty slice admits anything. In token mode every record
    /// costs at least one token, so empty targets still fill a slice.
    fn admits(&self, len: usize, limit: usize, in_tokens: bool) -> bool {
        if self.records.is_empty() {
            return true;
        }
        if in_tokens {
            (self.records.len() + 1) * self.max_len.max(len).max(1) <= limit
        } else {
            self.records.len() < limit
        }
    }

    fn push(&mut self, record: Record) {
        self.max_len = self.max_len.max(record.tgt_len());
        self.records.push(record);
    }

    fn take(&mut self) -> Vec<Record> {
        self.max_len = 0;
        std::mem::take(&mut self.records)
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ─── Sort and slice ───────────────────────────────────────────────────────────

/// Stable sort of one outer buffer; the leading key dominates.
pub fn sort_buffer(buffer: &mut [Record], mode: Mode) {
    if mode.is_train() {
        buffer.sort_by_key(|r| (r.src_token_count(), r.tgt_len()));
    } else {
        buffer.sort_by_key(|r| (r.tgt_len(), r.src_token_count()));
    }
}

/// Cut a sorted buffer into batches no larger than `limit`.
pub fn slice_buffer(sorted: Vec<Record>, limit: usize, in_tokens: bool) -> Vec<Vec<Record>> {
    let mut batches = Vec::new();
    let mut acc     = SliceAccumulator::default();

    for record in sorted {
        if !acc.admits(record.tgt_len(), limit, in_tokens) {
            batches.push(acc.take());
        }
        acc.push(record);
    }
    if !acc.is_empty() {
        batches.push(acc.take());
    }

    batches.retain(|b| !b.is_empty());
    batches
}

// ─── Bucketer ─────────────────────────────────────────────────────────────────

/// Pull-based bucketing stage over any stream of Records.
///
/// Upstream errors are passed through and end the stream.
pub struct Bucketer<I> {
    source:    I,
    config:    BucketConfig,
    rng:       StdRng,
    /// First record of the next outer buffer
    carry:     Option<Record>,
    ready:     VecDeque<Vec<Record>>,
    exhausted: bool,
}

impl<I> Bucketer<I>
where
    I: Iterator<Item = PipelineResult<Record>>,
{
    pub fn new(source: I, config: BucketConfig, rng: StdRng) -> Self {
        Self {
            source,
            config,
            rng,
            carry:     None,
            ready:     VecDeque::new(),
            exhausted: false,
        }
    }

    /// Fill one outer buffer from upstream.
    fn fill_buffer(&mut self) -> PipelineResult<Vec<Record>> {
        let limit   = self.config.batch_size * BUFFER_FACTOR;
        let mut acc = SliceAccumulator::default();

        if let Some(record) = self.carry.take() {
            acc.push(record);
        }

        loop {
            let record = match self.source.next() {
                Some(item) => item?,
                None => {
                    self.exhausted = true;
                    break;
                }
            };
            if acc.admits(record.tgt_len(), limit, self.config.in_tokens) {
                acc.push(record);
            } else {
                self.carry = Some(record);
                break;
            }
        }

        Ok(acc.take())
    }

    /// Sort, slice and optionally shuffle one outer buffer
    fn bucket(&mut self, mut buffer: Vec<Record>) -> Vec<Vec<Record>> {
        let buffered = buffer.len();
        sort_buffer(&mut buffer, self.config.mode);

        let mut batches = slice_buffer(buffer, self.config.batch_size, self.config.in_tokens);
        if self.config.shuffle {
            batches.shuffle(&mut self.rng);
        }

        tracing::debug!("Bucketed {} records into {} batches", buffered, batches.len());
        batches
    }
}

impl<I> Iterator for Bucketer<I>
where
    I: Iterator<Item = PipelineResult<Record>>,
{
    type Item = PipelineResult<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = self.ready.pop_front() {
                return Some(Ok(batch));
            }
            if self.exhausted && self.carry.is_none() {
                return None;
            }

            match self.fill_buffer() {
                Ok(buffer) => {
                    let batches = self.bucket(buffer);
                    self.ready.extend(batches);
                }
                Err(e) => {
                    self.exhausted = true;
                    self.carry     = None;
                    return Some(Err(e));
                }
            }
        }
    }
}
