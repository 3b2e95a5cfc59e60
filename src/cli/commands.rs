// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `batches` and `count`, and all
// their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, enums via ValueEnum)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::inspect_use_case::PipelineConfig;
use crate::domain::{
    phase::{Mode, Phase},
    symbols::SymbolTable,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the batching pipeline and report batch statistics
    Batches(BatchesArgs),

    /// Count the examples of one phase
    Count(CountArgs),
}

/// All arguments for the `batches` command.
#[derive(Args, Debug)]
pub struct BatchesArgs {
    /// Root directory holding train/ valid/ test/ sub-directories
    #[arg(long, default_value = "data")]
    pub data_path: String,

    #[arg(long, value_enum, default_value_t = Phase::Train)]
    pub phase: Phase,

    /// Sort priority: train = source tokens first, test = target length first
    #[arg(long, value_enum, default_value_t = Mode::Train)]
    pub mode: Mode,

    /// Paragraphs kept per document
    #[arg(long, default_value_t = 30)]
    pub max_para_num: usize,

    /// Tokens kept per paragraph
    #[arg(long, default_value_t = 60)]
    pub max_para_len: usize,

    /// Target tokens kept, including BOS and the forced EOS
    #[arg(long, default_value_t = 300)]
    pub max_tgt_len: usize,

    /// Attention heads the biases are broadcast to
    #[arg(long, default_value_t = 8)]
    pub n_heads: usize,

    /// Examples per batch, or a token budget with --in-tokens
    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    /// Treat --batch-size as a token budget
    #[arg(long)]
    pub in_tokens: bool,

    /// Keep file, example and batch order as read
    #[arg(long)]
    pub no_shuffle: bool,

    #[arg(long)]
    pub random_seed: Option<u64>,

    /// Keep reference summaries on each batch
    #[arg(long)]
    pub is_test: bool,

    #[arg(long, default_value_t = 1)]
    pub epochs: usize,

    /// Number of devices batches are split across
    #[arg(long, default_value_t = 1)]
    pub dev_count: usize,

    /// Which device this process feeds
    #[arg(long, default_value_t = 0)]
    pub trainer_id: usize,

    #[arg(long, default_value_t = 6)]
    pub pad_id: u32,

    #[arg(long, default_value_t = 4)]
    pub bos_id: u32,

    #[arg(long, default_value_t = 5)]
    pub eos_id: u32,

    /// Tokenizer JSON to resolve PAD/BOS/EOS from (overrides the ids above)
    #[arg(long)]
    pub vocab_path: Option<String>,

    #[arg(long, default_value = "<PAD>")]
    pub pad_token: String,

    #[arg(long, default_value = "<S>")]
    pub bos_token: String,

    #[arg(long, default_value = "</S>")]
    pub eos_token: String,

    /// Discard this many batches at the start of the first epoch
    #[arg(long, default_value_t = 0)]
    pub skip_batches: usize,

    /// Load the pipeline config from this directory instead of the flags
    #[arg(long)]
    pub config: Option<String>,

    /// Save the effective pipeline config to this directory
    #[arg(long)]
    pub save_config: Option<String>,

    /// Append per-batch statistics to <dir>/batch_stats.csv
    #[arg(long)]
    pub stats_dir: Option<String>,
}

/// Convert CLI BatchesArgs into the application-layer PipelineConfig.
/// The application layer never sees clap types.
impl From<&BatchesArgs> for PipelineConfig {
    fn from(a: &BatchesArgs) -> Self {
        PipelineConfig {
            data_path:    a.data_path.clone(),
            phase:        a.phase,
            mode:         a.mode,
            max_para_num: a.max_para_num,
            max_para_len: a.max_para_len,
            max_tgt_len:  a.max_tgt_len,
            n_heads:      a.n_heads,
            batch_size:   a.batch_size,
            in_tokens:    a.in_tokens,
            shuffle:      !a.no_shuffle,
            random_seed:  a.random_seed,
            is_test:      a.is_test,
            epochs:       a.epochs,
            dev_count:    a.dev_count,
            trainer_id:   a.trainer_id,
            symbols:      SymbolTable::new(a.pad_id, a.bos_id, a.eos_id),
        }
    }
}

/// All arguments for the `count` command
#[derive(Args, Debug)]
pub struct CountArgs {
    #[arg(long, default_value = "data")]
    pub data_path: String,

    #[arg(long, value_enum, default_value_t = Phase::Train)]
    pub phase: Phase,
}
