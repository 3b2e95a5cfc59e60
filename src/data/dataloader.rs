// ============================================================
// Layer 4 — DataLoader (pipeline driver)
// ============================================================
// Wires the stages together for one phase:
//
//   ShardReader ─► Shard ─► ShardRecords ─► Bucketer ─► GraphSumBatcher
//   (one file)    (owned)   (normalise)     (sort/slice)  (tensors)
//
// Every stage is a pull-based iterator; nothing runs until the
// caller asks for the next batch.
//
// Ownership and memory:
//   The current shard is moved into its ShardRecords, which is
//   moved into the current Bucketer. When that bucketer runs
//   dry it is dropped (freeing the shard) before the next file
//   is read, so at most one shard and one outer buffer are
//   alive at a time.
//
// Randomness:
//   One StdRng, seeded from the config, is threaded explicitly
//   through the shard-order shuffle, the within-shard example
//   shuffle and (via a child seed per shard) the bucketer's
//   batch-order shuffle. Same seed + same corpus = same batches.
//
// Epochs:
//   `epoch()` starts a fresh pass. Calling it again continues
//   the RNG stream, so every epoch gets a new but reproducible
//   shuffle.

use burn::{data::dataloader::batcher::Batcher, prelude::*};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;

use crate::application::inspect_use_case::PipelineConfig;
use crate::data::{
    batcher::{GraphSumBatch, GraphSumBatcher},
    bucketer::Bucketer,
    loader::{ShardExamples, ShardReader},
    normalizer::Normalizer,
};
use crate::domain::{
    error::PipelineResult,
    phase::Phase,
    record::Record,
    traits::SymbolProvider,
};

// ─── ShardRecords ─────────────────────────────────────────────────────────────
/// Normalises one shard's examples as they are pulled.
/// `base` is the data_id of the shard's first example.
struct ShardRecords {
    examples:   ShardExamples,
    normalizer: Normalizer,
    base:       usize,
    offset:     usize,
}

impl Iterator for ShardRecords {
    type Item = PipelineResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw     = self.examples.next()?;
        let data_id = self.base + self.offset;
        self.offset += 1;
        Some(raw.map(|ex| self.normalizer.normalize(ex, data_id)))
    }
}

// ─── DataLoader ───────────────────────────────────────────────────────────────
pub struct DataLoader<B: Backend> {
    config:          PipelineConfig,
    batcher:         GraphSumBatcher<B>,
    normalizer:      Normalizer,
    rng:             StdRng,
    /// Batches emitted over the loader's lifetime
    iterations:      usize,
    /// Examples emitted in the current epoch
    current_example: usize,
    current_epoch:   usize,
    epochs_started:  usize,
    /// Batches to discard at the start of the next epoch
    skip:            usize,
}

impl<B: Backend> DataLoader<B> {
    /// Build a loader for `config.phase`. The config is validated
    /// here; missing data is reported by the first `epoch()` call.
    pub fn new<S: SymbolProvider>(config: PipelineConfig, symbols: &S, device: B::Device) -> PipelineResult<Self> {
        config.validate()?;

        let bounds  = config.bounds();
        let batcher = GraphSumBatcher::new(
            device,
            bounds,
            symbols.pad_id(),
            config.n_heads,
            config.is_test,
        );
        let normalizer = Normalizer::new(bounds, symbols.eos_id());
        let rng        = StdRng::seed_from_u64(config.seed());

        Ok(Self {
            config,
            batcher,
            normalizer,
            rng,
            iterations:      0,
            current_example: 0,
            current_epoch:   0,
            epochs_started:  0,
            skip:            0,
        })
    }

    /// Total batches emitted so far, across epochs
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// (examples emitted in the current epoch, current epoch index)
    pub fn progress(&self) -> (usize, usize) {
        (self.current_example, self.current_epoch)
    }

    /// Discard the first `n` batches of the next epoch, to resume
    /// a partially completed epoch under the same seed.
    pub fn skip_batches(&mut self, n: usize) {
        self.skip = n;
    }

    /// Start a new pass over the phase's data.
    ///
    /// Fails with `DatasetNotFound` before any batch is produced
    /// when the phase directory holds no usable files.
    pub fn epoch(&mut self) -> PipelineResult<EpochIter<'_, B>> {
        let data_path = PathBuf::from(&self.config.data_path);
        let shards    = ShardReader::open(&data_path, self.config.phase, self.config.shuffle, &mut self.rng)?;

        self.current_epoch   = self.epochs_started;
        self.epochs_started += 1;
        self.current_example = 0;
        let skip = std::mem::take(&mut self.skip);

        tracing::info!(
            "Epoch {} of {}: {} file(s), skipping {} batch(es)",
            self.current_epoch,
            self.config.phase,
            shards.num_shards(),
            skip
        );

        Ok(EpochIter {
            loader:    self,
            shards,
            current:   None,
            loaded:    0,
            position:  0,
            skip,
            run_pos:   0,
            held:      None,
            emitted:   0,
            finished:  false,
        })
    }
}

// ─── EpochIter ────────────────────────────────────────────────────────────────
/// One pass over the data. Stopping early is always safe:
/// nothing spans more than one batch.
pub struct EpochIter<'a, B: Backend> {
    loader:   &'a mut DataLoader<B>,
    shards:   ShardReader,
    current:  Option<Bucketer<ShardRecords>>,
    /// Examples loaded so far; the next shard's data_id base
    loaded:   usize,
    /// Batches produced by the bucketers this epoch
    position: usize,
    skip:     usize,
    /// Position inside the current multi-device run
    run_pos:  usize,
    held:     Option<Vec<Record>>,
    emitted:  usize,
    finished: bool,
}

impl<B: Backend> EpochIter<'_, B> {
    /// Open the next shard and build its bucketer.
    /// Returns Ok(false) when no shards are left.
    fn advance_shard(&mut self) -> PipelineResult<bool> {
        // Release the previous shard before reading the next file
        self.current = None;

        let mut shard = match self.shards.next() {
            Some(shard) => shard?,
            None        => return Ok(false),
        };

        let loader = &mut *self.loader;
        if loader.config.shuffle {
            shard.shuffle(&mut loader.rng);
        }

        let base = self.loaded;
        self.loaded += shard.len();

        let records = ShardRecords {
            examples:   shard.into_examples(),
            normalizer: loader.normalizer,
            base,
            offset:     0,
        };
        let child_rng = StdRng::seed_from_u64(loader.rng.gen());
        self.current  = Some(Bucketer::new(records, loader.config.bucket_config(), child_rng));
        Ok(true)
    }

    /// Next bucketed batch across shard boundaries
    fn next_records(&mut self) -> Option<PipelineResult<Vec<Record>>> {
        loop {
            if self.current.is_none() {
                match self.advance_shard() {
                    Ok(true)  => {}
                    Ok(false) => return None,
                    Err(e)    => return Some(Err(e)),
                }
            }

            match self.current.as_mut().and_then(Iterator::next) {
                Some(item) => return Some(item),
                None       => self.current = None,
            }
        }
    }

    /// Apply the multi-device split; returns the records this
    /// trainer should see, if the current run is complete.
    /// Only the train phase is split.
    fn select_for_device(&mut self, records: Vec<Record>) -> Option<Vec<Record>> {
        let dev_count = self.loader.config.dev_count;
        if dev_count <= 1 || self.loader.config.phase != Phase::Train {
            return Some(records);
        }

        if self.run_pos == self.loader.config.trainer_id {
            self.held = Some(records);
        }
        self.run_pos += 1;
        if self.run_pos == dev_count {
            self.run_pos = 0;
            return self.held.take();
        }
        None
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            tracing::info!(
                "Epoch {} finished: {} batches, {} examples",
                self.loader.current_epoch,
                self.emitted,
                self.loader.current_example
            );
        }
    }
}

impl<B: Backend> Iterator for EpochIter<'_, B> {
    type Item = PipelineResult<GraphSumBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let records = match self.next_records() {
                Some(Ok(records)) => records,
                Some(Err(e)) => {
                    self.finished = true;
                    self.current  = None;
                    return Some(Err(e));
                }
                None => {
                    self.finish();
                    return None;
                }
            };

            let index = self.position;
            self.position += 1;
            if index < self.skip {
                continue;
            }

            let Some(records) = self.select_for_device(records) else {
                continue;
            };

            let batch = self.loader.batcher.batch(records);
            self.loader.iterations      += 1;
            self.loader.current_example += batch.size();
            self.emitted += 1;
            return Some(Ok(batch));
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{error::PipelineError, phase::Mode, symbols::SymbolTable};
    use burn::backend::NdArray;
    use serde_json::Value;
    use std::{fs, path::Path};

    type TestBackend = NdArray;

    const SYMBOLS: SymbolTable = SymbolTable { pad: 6, bos: 4, eos: 5 };

    fn example(n_paras: usize, tgt_len: usize, tag: &str) -> Value {
        let src: Vec<Vec<u32>> = (0..n_paras).map(|i| vec![10 + i as u32; 3]).collect();
        let graph: Vec<Vec<f32>> = (0..n_paras)
            .map(|i| (0..n_paras).map(|j| if i == j { 1.0 } else { 0.3 }).collect())
            .collect();
        let tgt: Vec<u32> = std::iter::once(4).chain((0..tgt_len).map(|i| 20 + i as u32)).collect();
        serde_json::json!({ "src": src, "tgt": tgt, "tgt_str": tag, "sim_graph": graph })
    }

    fn write_shard(root: &Path, phase: Phase, name: &str, examples: &[Value]) {
        let dir = root.join(phase.as_str());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), serde_json::to_string(examples).unwrap()).unwrap();
    }

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            data_path:    root.to_string_lossy().into_owned(),
            phase:        Phase::Train,
            mode:         Mode::Test,
            max_para_num: 3,
            max_para_len: 4,
            max_tgt_len:  6,
            n_heads:      2,
            batch_size:   3,
            in_tokens:    false,
            shuffle:      false,
            random_seed:  None,
            is_test:      false,
            ..PipelineConfig::default()
        }
    }

    fn loader(cfg: PipelineConfig) -> DataLoader<TestBackend> {
        DataLoader::new(cfg, &SYMBOLS, Default::default()).unwrap()
    }

    fn collect_ids(loader: &mut DataLoader<TestBackend>) -> Vec<Vec<usize>> {
        loader
            .epoch()
            .unwrap()
            .map(|b| b.unwrap().data_ids().to_vec())
            .collect()
    }

    #[test]
    fn test_three_documents_one_batch() {
        let tmp = tempfile::tempdir().unwrap();
        write_shard(tmp.path(), Phase::Train, "d.train.0.json",
                    &[example(2, 2, "a"), example(5, 3, "b"), example(1, 1, "c")]);

        let mut loader = loader(config(tmp.path()));
        let batches: Vec<_> = loader.epoch().unwrap().map(Result::unwrap).collect();

        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.size(), 3);
        assert_eq!(batch.enc_input().src_words.dims(), [3, 3, 4]);
        assert_eq!(batch.enc_input().graph_attn_bias.dims(), [3, 2, 3, 3]);
    }

    #[test]
    fn test_labels_end_with_eos() {
        let tmp = tempfile::tempdir().unwrap();
        // [4, 20..=28] is cut to 6 tokens and closed with EOS
        write_shard(tmp.path(), Phase::Train, "d.train.0.json", &[example(1, 9, "long")]);

        let mut loader = loader(config(tmp.path()));
        let batch  = loader.epoch().unwrap().next().unwrap().unwrap();
        let labels = batch.tgt_label().clone().into_data().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![20, 21, 22, 23, 5, 6]);
    }

    #[test]
    fn test_data_ids_span_shards() {
        let tmp = tempfile::tempdir().unwrap();
        write_shard(tmp.path(), Phase::Train, "d.train.0.json", &[example(1, 1, "a"), example(1, 1, "b")]);
        write_shard(tmp.path(), Phase::Train, "d.train.1.json", &[example(1, 1, "c")]);

        let mut cfg = config(tmp.path());
        cfg.batch_size = 2;
        let mut loader = loader(cfg);
        assert_eq!(collect_ids(&mut loader), vec![vec![0, 1], vec![2]]);
        assert_eq!(loader.iterations(), 2);
        assert_eq!(loader.progress(), (3, 0));
    }

    #[test]
    fn test_same_seed_same_batches() {
        let tmp = tempfile::tempdir().unwrap();
        for s in 0..4 {
            let shard: Vec<Value> = (0..10).map(|i| example(1 + i % 3, 1 + (i * 7 + s) % 5, "x")).collect();
            write_shard(tmp.path(), Phase::Train, &format!("d.train.{s}.json"), &shard);
        }

        let mut cfg = config(tmp.path());
        cfg.shuffle     = true;
        cfg.random_seed = Some(13);
        cfg.mode        = Mode::Train;

        let first  = collect_ids(&mut loader(cfg.clone()));
        let second = collect_ids(&mut loader(cfg));
        assert_eq!(first, second);
        assert_eq!(first.iter().map(Vec::len).sum::<usize>(), 40);
    }

    #[test]
    fn test_epochs_reshuffle() {
        let tmp = tempfile::tempdir().unwrap();
        let shard: Vec<Value> = (0..30).map(|i| example(1, 1 + i % 4, "x")).collect();
        write_shard(tmp.path(), Phase::Train, "d.train.0.json", &shard);

        let mut cfg = config(tmp.path());
        cfg.shuffle = true;
        let mut loader = loader(cfg);

        let first  = collect_ids(&mut loader);
        let second = collect_ids(&mut loader);
        assert_eq!(loader.progress().1, 1);
        assert_ne!(first, second);
    }

    #[test]
    fn test_skip_batches_resumes() {
        let tmp = tempfile::tempdir().unwrap();
        let shard: Vec<Value> = (0..9).map(|_| example(1, 2, "x")).collect();
        write_shard(tmp.path(), Phase::Train, "d.train.0.json", &shard);

        let full = collect_ids(&mut loader(config(tmp.path())));
        assert_eq!(full.len(), 3);

        let mut resumed = loader(config(tmp.path()));
        resumed.skip_batches(2);
        assert_eq!(collect_ids(&mut resumed), full[2..].to_vec());
        // Skip only applies to one epoch
        assert_eq!(collect_ids(&mut resumed).len(), 3);
    }

    #[test]
    fn test_token_budget_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let shard: Vec<Value> = (0..20).map(|i| example(1 + i % 3, 1 + i % 5, "x")).collect();
        write_shard(tmp.path(), Phase::Train, "d.train.0.json", &shard);

        let budget = 12;
        let mut cfg = config(tmp.path());
        cfg.mode       = Mode::Train;
        cfg.in_tokens  = true;
        cfg.batch_size = budget;
        cfg.shuffle    = true;
        let mut loader = loader(cfg);

        let mut seen = 0;
        for batch in loader.epoch().unwrap() {
            let batch   = batch.unwrap();
            let weights = batch.label_weight().clone().into_data().to_vec::<f32>().unwrap();
            // Real label positions per row = decoder input length
            let max_len = weights
                .chunks(6)
                .map(|row| row.iter().filter(|&&w| w == 1.0).count())
                .max()
                .unwrap();

            assert!(batch.size() * max_len <= budget || batch.size() == 1);
            seen += batch.size();
        }
        assert_eq!(seen, 20);
        assert_eq!(loader.progress(), (20, 0));
    }

    #[test]
    fn test_device_split() {
        let tmp = tempfile::tempdir().unwrap();
        let shard: Vec<Value> = (0..15).map(|_| example(1, 2, "x")).collect();
        write_shard(tmp.path(), Phase::Train, "d.train.0.json", &shard);

        // 5 batches of 3; runs of 2 → 2 complete runs, trailing batch dropped
        let mut cfg = config(tmp.path());
        cfg.dev_count  = 2;
        cfg.trainer_id = 1;
        let ids = collect_ids(&mut loader(cfg));
        assert_eq!(ids, vec![vec![3, 4, 5], vec![9, 10, 11]]);
    }

    #[test]
    fn test_device_split_ignored_outside_train() {
        let tmp = tempfile::tempdir().unwrap();
        let shard: Vec<Value> = (0..6).map(|_| example(1, 2, "x")).collect();
        write_shard(tmp.path(), Phase::Valid, "d.valid.0.json", &shard);

        let mut cfg = config(tmp.path());
        cfg.phase      = Phase::Valid;
        cfg.dev_count  = 2;
        cfg.trainer_id = 1;
        assert_eq!(collect_ids(&mut loader(cfg)).len(), 2);
    }

    #[test]
    fn test_test_mode_keeps_strings() {
        let tmp = tempfile::tempdir().unwrap();
        write_shard(tmp.path(), Phase::Test, "test.json", &[example(1, 1, "ref one")]);

        let mut cfg = config(tmp.path());
        cfg.phase   = Phase::Test;
        cfg.is_test = true;
        let mut loader = loader(cfg);
        let batch = loader.epoch().unwrap().next().unwrap().unwrap();
        assert_eq!(batch.tgt_str().unwrap(), &["ref one".to_string()]);
    }

    #[test]
    fn test_missing_phase_fails_before_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let mut loader = loader(config(tmp.path()));
        assert!(matches!(loader.epoch(), Err(PipelineError::DatasetNotFound { .. })));
    }

    #[test]
    fn test_malformed_example_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = serde_json::json!({ "src": [[1], [2]], "tgt": [4, 5], "tgt_str": "", "sim_graph": [[1.0]] });
        write_shard(tmp.path(), Phase::Train, "d.train.0.json", &[example(1, 1, "ok"), bad]);

        let mut loader = loader(config(tmp.path()));
        let results: Vec<_> = loader.epoch().unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(PipelineError::MalformedExample { index: 1, .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.batch_size = 0;
        let result = DataLoader::<TestBackend>::new(cfg, &SYMBOLS, Default::default());
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }
}
