// ============================================================
// Layer 6 — Batch Statistics Logger
// ============================================================
// Records one CSV row per emitted batch so bucketing quality
// can be checked after a run.
//
// Columns:
//   - epoch, index:   where the batch came from
//   - size:           number of examples
//   - src_tokens:     real source tokens
//   - src_slots:      B * max_para_num * max_para_len
//   - tgt_tokens:     real label positions
//   - tgt_slots:      B * max_tgt_len
//   - padding_ratio:  padded slots / all slots
//
// Output file: <stats_dir>/batch_stats.csv
//
// Example CSV output:
//   epoch,index,size,src_tokens,src_slots,tgt_tokens,tgt_slots,padding_ratio
//   0,0,4,812,7200,120,1200,0.890000
//
// Well-bucketed batches keep tgt_tokens close to tgt_slots.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::data::{batcher::GraphSumBatch, normalizer::Bounds};

const CSV_HEADER: &str = "epoch,index,size,src_tokens,src_slots,tgt_tokens,tgt_slots,padding_ratio";

/// Token and slot counts for a single batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub epoch:      usize,
    pub index:      usize,
    pub size:       usize,
    pub src_tokens: usize,
    pub src_slots:  usize,
    pub tgt_tokens: usize,
    pub tgt_slots:  usize,
}

impl BatchStats {
    pub fn from_batch<B: Backend>(epoch: usize, index: usize, batch: &GraphSumBatch<B>, bounds: &Bounds) -> Self {
        let size = batch.size();
        Self {
            epoch,
            index,
            size,
            src_tokens: batch.num_src_tokens(),
            src_slots:  size * bounds.max_para_num * bounds.max_para_len,
            tgt_tokens: batch.num_tgt_tokens(),
            tgt_slots:  size * bounds.max_tgt_len,
        }
    }

    /// Fraction of all slots that hold padding. 0.0 for an empty batch.
    pub fn padding_ratio(&self) -> f64 {
        let slots = self.src_slots + self.tgt_slots;
        if slots == 0 {
            return 0.0;
        }
        1.0 - (self.src_tokens + self.tgt_tokens) as f64 / slots as f64
    }
}

/// Appends batch statistics to a CSV file.
pub struct BatchStatsLogger {
    csv_path: PathBuf,
}

impl BatchStatsLogger {
    /// Create the directory and write the header if the file is new.
    /// An existing file is appended to across runs.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create stats directory '{}'", dir.display()))?;

        let csv_path = dir.join("batch_stats.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created batch stats CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, s: &BatchStats) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{},{},{},{},{},{:.6}",
            s.epoch,
            s.index,
            s.size,
            s.src_tokens,
            s.src_slots,
            s.tgt_tokens,
            s.tgt_slots,
            s.padding_ratio(),
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
