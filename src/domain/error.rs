// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Every failure the data pipeline can surface to its caller.
//
// Truncation is NOT an error: dropping paragraphs, tokens or
// target positions beyond the configured bounds is corpus
// policy and happens silently in the normalizer.
//
// Upper layers (application, cli) wrap these in anyhow with
// extra context; the data layer returns them as-is so callers
// can match on the variant.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Neither `*.<n>.json` shards nor a plain `*.json` file exist
    #[error("no dataset files for phase '{phase}' under '{}'", dir.display())]
    DatasetNotFound { dir: PathBuf, phase: String },

    /// One example inside a shard is unusable. Never skipped.
    #[error("malformed example #{index} in '{}': {reason}", file.display())]
    MalformedExample {
        file:   PathBuf,
        index:  usize,
        reason: String,
    },

    #[error("cannot read '{}'", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse '{}' as a JSON array of examples", path.display())]
    Json {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error("vocabulary error: {0}")]
    Vocab(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
