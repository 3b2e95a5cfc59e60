// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the cross-cutting concerns that don't belong in
// any specific pipeline stage:
//
//   config_store.rs — PipelineConfig persistence
//                     Saves/loads the config as JSON so a
//                     run can be replayed with the same
//                     bounds, seed and symbol ids.
//
//   vocab_store.rs  — Symbol lookup
//                     Reads a HuggingFace tokenizer file and
//                     resolves the PAD/BOS/EOS ids from it.
//
//   metrics.rs      — Batch statistics logging
//                     Writes per-batch token and padding
//                     counts to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Pipeline config saving and loading
pub mod config_store;

/// PAD/BOS/EOS lookup from a tokenizer file
pub mod vocab_store;

/// Per-batch statistics CSV logger
pub mod metrics;
