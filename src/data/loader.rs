// ============================================================
// Layer 4 — Shard Reader
// ============================================================
// Finds the dataset files for one phase and loads them one
// shard at a time.
//
// Directory layout:
//   <data_path>/<phase>/
//       MultiNews.30.train.0.json    ← shard files
//       MultiNews.30.train.1.json
//       ...
//   or
//   <data_path>/<phase>/
//       MultiNews.train.json         ← single non-sharded file
//
// A shard file is any `*.json` whose name contains a dot
// immediately followed by a digit (the `*.[0-9]*.json` glob).
// Shards are sorted by name before any shuffle so the shuffled
// order depends only on the seed.
//
// Memory discipline:
//   ShardReader is lazy. Each call to next() reads exactly one
//   file. The caller owns the returned Shard and drops it
//   before pulling the next one, so at most one shard's worth
//   of examples is ever alive.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §13 (Iterators)

use rand::{seq::SliceRandom, Rng};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{
    error::{PipelineError, PipelineResult},
    example::RawExample,
    phase::Phase,
};

// ─── Shard discovery ──────────────────────────────────────────────────────────

/// True if `name` matches `*.[0-9]*.json`
pub fn is_shard_file(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".json") else {
        return false;
    };
    stem.char_indices().any(|(i, c)| {
        c == '.'
            && stem[i + 1..]
                .chars()
                .next()
                .is_some_and(|d| d.is_ascii_digit())
    })
}

/// List the files to read for `phase`, sorted by name.
///
/// Returns every shard file if any exist, otherwise the first
/// plain `*.json` file, otherwise `DatasetNotFound`.
pub fn discover_shards(data_path: &Path, phase: Phase) -> PipelineResult<Vec<PathBuf>> {
    let dir = data_path.join(phase.as_str());
    let not_found = || PipelineError::DatasetNotFound {
        dir:   dir.clone(),
        phase: phase.to_string(),
    };

    if !dir.is_dir() {
        return Err(not_found());
    }

    let entries = fs::read_dir(&dir).map_err(|source| PipelineError::Io {
        path: dir.clone(),
        source,
    })?;

    let mut json_files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::Io { path: dir.clone(), source })?;
        let path  = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            json_files.push(path);
        }
    }
    json_files.sort();

    let shards: Vec<PathBuf> = json_files
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_shard_file)
        })
        .cloned()
        .collect();

    if !shards.is_empty() {
        tracing::debug!("Found {} {} shards under '{}'", shards.len(), phase, dir.display());
        return Ok(shards);
    }

    match json_files.into_iter().next() {
        Some(single) => {
            tracing::debug!("No shards for {}, falling back to '{}'", phase, single.display());
            Ok(vec![single])
        }
        None => Err(not_found()),
    }
}

// ─── Shard ────────────────────────────────────────────────────────────────────

/// The examples of one dataset file, still as untyped JSON.
///
/// Each entry is only converted to a RawExample when pulled,
/// so one bad example is reported with its own index instead
/// of failing the whole file.
#[derive(Debug)]
pub struct Shard {
    path:     PathBuf,
    examples: Vec<Value>,
}

impl Shard {
    pub fn new(path: impl Into<PathBuf>, examples: Vec<Value>) -> Self {
        Self { path: path.into(), examples }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Shuffle the example order in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.examples.shuffle(rng);
    }

    /// Consume the shard into a lazy stream of validated examples
    pub fn into_examples(self) -> ShardExamples {
        ShardExamples {
            path:  self.path,
            inner: self.examples.into_iter().enumerate(),
        }
    }
}

/// Read and parse one dataset file
pub fn load_shard(path: &Path, phase: Phase) -> PipelineResult<Shard> {
    let bytes = fs::read(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let examples: Vec<Value> = serde_json::from_slice(&bytes).map_err(|source| {
        PipelineError::Json { path: path.to_path_buf(), source }
    })?;

    tracing::info!(
        "Loading {} dataset from {}, number of examples: {}",
        phase,
        path.display(),
        examples.len()
    );

    Ok(Shard::new(path, examples))
}

// ─── ShardExamples ────────────────────────────────────────────────────────────

/// Converts a shard's JSON entries into RawExamples one at a time.
/// The index in each error is the entry's position in the shard.
pub struct ShardExamples {
    path:  PathBuf,
    inner: std::iter::Enumerate<std::vec::IntoIter<Value>>,
}

impl Iterator for ShardExamples {
    type Item = PipelineResult<RawExample>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, value) = self.inner.next()?;
        let malformed = |reason: String| PipelineError::MalformedExample {
            file: self.path.clone(),
            index,
            reason,
        };

        let example = match serde_json::from_value::<RawExample>(value) {
            Ok(ex) => ex,
            Err(e) => return Some(Err(malformed(e.to_string()))),
        };

        Some(example.check_graph().map(|_| example).map_err(malformed))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

// ─── ShardReader ──────────────────────────────────────────────────────────────

/// Lazily loads the files of one phase, one shard per `next()`.
pub struct ShardReader {
    phase: Phase,
    paths: std::vec::IntoIter<PathBuf>,
    total: usize,
}

impl ShardReader {
    /// Discover the phase's files and optionally shuffle their order.
    /// Fails with `DatasetNotFound` before any file is read.
    pub fn open<R: Rng + ?Sized>(
        data_path: &Path,
        phase:     Phase,
        shuffle:   bool,
        rng:       &mut R,
    ) -> PipelineResult<Self> {
        let mut paths = discover_shards(data_path, phase)?;
        if shuffle {
            paths.shuffle(rng);
        }
        Ok(Self::from_paths(paths, phase))
    }

    pub fn from_paths(paths: Vec<PathBuf>, phase: Phase) -> Self {
        let total = paths.len();
        Self { phase, paths: paths.into_iter(), total }
    }

    /// Number of files this reader was opened with
    pub fn num_shards(&self) -> usize {
        self.total
    }
}

impl Iterator for ShardReader {
    type Item = PipelineResult<Shard>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(load_shard(&path, self.phase))
    }
}

/// Count every example of a phase, loading one shard at a time
pub fn count_examples(data_path: &Path, phase: Phase) -> PipelineResult<usize> {
    let paths = discover_shards(data_path, phase)?;
    let mut total = 0usize;
    for shard in ShardReader::from_paths(paths, phase) {
        total += shard?.len();
    }
    Ok(total)
}
