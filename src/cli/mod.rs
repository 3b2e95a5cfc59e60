// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All pipeline logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `batches` — runs the pipeline and reports batch stats
//   2. `count`   — counts the examples of one phase
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{BatchesArgs, Commands, CountArgs};
use std::path::Path;

use crate::application::inspect_use_case::{InspectUseCase, PipelineConfig};
use crate::data::loader::count_examples;
use crate::domain::traits::Persistable;
use crate::infra::vocab_store::VocabStore;

#[derive(Parser, Debug)]
#[command(
    name = "graphsum_data",
    version,
    about = "Batch multi-paragraph summarization corpora into padded, model-ready tensors."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Batches(args) => run_batches(args),
            Commands::Count(args)   => run_count(args),
        }
    }
}

/// Handles the `batches` subcommand.
fn run_batches(args: BatchesArgs) -> Result<()> {
    let config = match &args.config {
        Some(dir) => {
            tracing::info!("Loading pipeline config from '{}'", dir);
            PipelineConfig::load(Path::new(dir))?
        }
        None => PipelineConfig::from(&args),
    };

    let mut use_case = InspectUseCase::new(config).with_skip(args.skip_batches);
    if let Some(path) = &args.vocab_path {
        let vocab = VocabStore::new(path)
            .with_tokens(&args.pad_token, &args.bos_token, &args.eos_token)
            .load()?;
        use_case = use_case.with_symbols(&vocab);
    }
    if let Some(dir) = &args.stats_dir {
        use_case = use_case.with_stats_dir(dir);
    }

    if let Some(dir) = &args.save_config {
        use_case
            .config()
            .save(Path::new(dir))
            .with_context(|| format!("Cannot save pipeline config to '{dir}'"))?;
    }

    let summary = use_case.execute()?;

    println!(
        "{} batches, {} examples over {} epoch(s)",
        summary.batches, summary.examples, summary.epochs
    );
    println!(
        "source tokens {}/{}, target tokens {}/{}, padding ratio {:.3}",
        summary.src_tokens,
        summary.src_slots,
        summary.tgt_tokens,
        summary.tgt_slots,
        summary.padding_ratio()
    );
    Ok(())
}

/// Handles the `count` subcommand.
fn run_count(args: CountArgs) -> Result<()> {
    let total = count_examples(Path::new(&args.data_path), args.phase)
        .with_context(|| format!("Cannot count '{}' examples", args.phase))?;

    println!("{total}");
    Ok(())
}
