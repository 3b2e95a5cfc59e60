// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Runs the batching pipeline end to end without a model:
//
//   Step 1: Validate the config       (Layer 2)
//   Step 2: Resolve PAD/BOS/EOS        (Layer 3 / Layer 6)
//   Step 3: Build the DataLoader       (Layer 4 - data)
//   Step 4: Pull every batch of every epoch
//   Step 5: Record per-batch stats     (Layer 6 - infra)
//
// A training loop would sit exactly where Step 4 pulls
// batches; everything upstream of it is shared.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §4 (Datasets and Dataloaders)

use anyhow::{Context, Result};
use burn::backend::{ndarray::NdArrayDevice, NdArray};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    bucketer::BucketConfig,
    dataloader::DataLoader,
    normalizer::Bounds,
};
use crate::domain::{
    error::{PipelineError, PipelineResult},
    phase::{Mode, Phase},
    symbols::SymbolTable,
    traits::SymbolProvider,
};
use crate::infra::metrics::{BatchStats, BatchStatsLogger};

// ─── Pipeline Configuration ──────────────────────────────────────────────────
// Everything the pipeline needs for one phase.
// Serialisable so a run can be saved to disk and replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_path:    String,
    pub phase:        Phase,
    pub mode:         Mode,
    pub max_para_num: usize,
    pub max_para_len: usize,
    pub max_tgt_len:  usize,
    pub n_heads:      usize,
    /// Examples per batch, or tokens per batch when `in_tokens`
    pub batch_size:   usize,
    pub in_tokens:    bool,
    pub shuffle:      bool,
    /// Seed for every shuffle; 0 when unset
    pub random_seed:  Option<u64>,
    /// Keep reference strings on each batch
    pub is_test:      bool,
    pub epochs:       usize,
    pub dev_count:    usize,
    pub trainer_id:   usize,
    pub symbols:      SymbolTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path:    "data".to_string(),
            phase:        Phase::Train,
            mode:         Mode::Train,
            max_para_num: 30,
            max_para_len: 60,
            max_tgt_len:  300,
            n_heads:      8,
            batch_size:   4,
            in_tokens:    false,
            shuffle:      true,
            random_seed:  None,
            is_test:      false,
            epochs:       1,
            dev_count:    1,
            trainer_id:   0,
            symbols:      SymbolTable::new(6, 4, 5),
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would make batching meaningless
    pub fn validate(&self) -> PipelineResult<()> {
        let fail = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return fail("batch_size must be positive".into());
        }
        if self.n_heads == 0 {
            return fail("n_heads must be positive".into());
        }
        if self.max_para_num == 0 || self.max_para_len == 0 {
            return fail(format!(
                "max_para_num and max_para_len must be positive (got {} and {})",
                self.max_para_num, self.max_para_len
            ));
        }
        if self.max_tgt_len < 2 {
            return fail(format!("max_tgt_len must be at least 2 (got {})", self.max_tgt_len));
        }
        if self.dev_count == 0 || self.trainer_id >= self.dev_count {
            return fail(format!(
                "trainer_id {} out of range for dev_count {}",
                self.trainer_id, self.dev_count
            ));
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.max_para_num, self.max_para_len, self.max_tgt_len)
    }

    pub fn bucket_config(&self) -> BucketConfig {
        BucketConfig {
            batch_size: self.batch_size,
            in_tokens:  self.in_tokens,
            mode:       self.mode,
            shuffle:    self.shuffle,
        }
    }

    pub fn seed(&self) -> u64 {
        self.random_seed.unwrap_or(0)
    }
}

// ─── Run summary ──────────────────────────────────────────────────────────────
/// Totals over every epoch of one inspection run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectSummary {
    pub epochs:         usize,
    pub batches:        usize,
    pub examples:       usize,
    pub src_tokens:     usize,
    pub src_slots:      usize,
    pub tgt_tokens:     usize,
    pub tgt_slots:      usize,
}

impl InspectSummary {
    /// Share of source and target slots that are padding
    pub fn padding_ratio(&self) -> f64 {
        let slots = self.src_slots + self.tgt_slots;
        if slots == 0 {
            return 0.0;
        }
        1.0 - (self.src_tokens + self.tgt_tokens) as f64 / slots as f64
    }

    fn add(&mut self, stats: &BatchStats) {
        self.batches    += 1;
        self.examples   += stats.size;
        self.src_tokens += stats.src_tokens;
        self.src_slots  += stats.src_slots;
        self.tgt_tokens += stats.tgt_tokens;
        self.tgt_slots  += stats.tgt_slots;
    }
}

// ─── InspectUseCase ───────────────────────────────────────────────────────────
pub struct InspectUseCase {
    config:    PipelineConfig,
    symbols:   SymbolTable,
    stats_dir: Option<PathBuf>,
    skip:      usize,
}

impl InspectUseCase {
    /// Use the symbol ids carried by the config
    pub fn new(config: PipelineConfig) -> Self {
        let symbols = config.symbols;
        Self { config, symbols, stats_dir: None, skip: 0 }
    }

    /// Override the config's symbol ids, e.g. with ones
    /// resolved from a tokenizer file.
    pub fn with_symbols<S: SymbolProvider>(mut self, symbols: &S) -> Self {
        self.symbols        = symbols.symbol_table();
        self.config.symbols = self.symbols;
        self
    }

    /// Append one CSV row per batch under `dir`
    pub fn with_stats_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stats_dir = Some(dir.into());
        self
    }

    /// Skip the first `n` batches of the first epoch
    pub fn with_skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pull every batch of every configured epoch
    pub fn execute(&self) -> Result<InspectSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        let stats_logger = self
            .stats_dir
            .as_ref()
            .map(BatchStatsLogger::new)
            .transpose()?;

        let device = NdArrayDevice::default();
        let mut loader = DataLoader::<NdArray>::new(cfg.clone(), &self.symbols, device)?;
        loader.skip_batches(self.skip);

        let mut summary = InspectSummary::default();
        let bounds = cfg.bounds();

        for epoch in 0..cfg.epochs {
            let batches = loader
                .epoch()
                .with_context(|| format!("Cannot start epoch {epoch} of '{}'", cfg.data_path))?;

            for (index, batch) in batches.enumerate() {
                let batch = batch.with_context(|| format!("Batch {index} of epoch {epoch} failed"))?;
                let stats = BatchStats::from_batch(epoch, index, &batch, &bounds);

                if let Some(logger) = &stats_logger {
                    logger.log(&stats)?;
                }
                summary.add(&stats);
            }
            summary.epochs += 1;

            let (examples, current) = loader.progress();
            tracing::debug!(
                "Epoch {} done: {} examples, {} batches so far",
                current,
                examples,
                loader.iterations()
            );
        }

        tracing::info!(
            "Inspected {} batches / {} examples over {} epoch(s), padding ratio {:.3}",
            summary.batches,
            summary.examples,
            summary.epochs,
            summary.padding_ratio()
        );
        Ok(summary)
    }
}
