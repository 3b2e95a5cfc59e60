// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer turns a directory of JSON shards into padded,
// model-ready tensor batches.
//
// The pipeline flows in this order:
//
//   <data_path>/<phase>/*.N.json
//       │
//       ▼
//   ShardReader       → finds shard files, loads one at a time
//       │
//       ▼
//   Normalizer        → truncates to bounds, splits target into
//       │               decoder input and labels
//       ▼
//   Bucketer          → buffers, sorts by length, slices into
//       │               batches, shuffles batch order
//       ▼
//   Synthesizer       → pads a batch into flat arrays + masks
//       │
//       ▼
//   GraphSumBatcher   → implements Burn's Batcher trait, builds
//       │               tensors and per-head attention biases
//       ▼
//   DataLoader        → drives the stages epoch by epoch
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Discovers and reads JSON shard files
pub mod loader;

/// Truncates raw examples into Records
pub mod normalizer;

/// Length-aware batching with bounded memory
pub mod bucketer;

/// Pads a batch of Records into flat arrays and masks
pub mod synthesizer;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Per-epoch driver over every stage
pub mod dataloader;
