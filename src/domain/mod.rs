// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what the
// pipeline moves around:
//
//   RawExample  → one document as it sits in a shard file
//   Record      → the same document after truncation
//   SymbolTable → the PAD / BOS / EOS ids the pipeline needs
//   PipelineError → every failure the pipeline can surface
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// A raw document as stored in a shard
pub mod example;

/// A truncated, model-ready document
pub mod record;

/// Special token ids consumed by the pipeline
pub mod symbols;

/// Typed pipeline errors
pub mod error;

/// Core abstractions (traits) that other layers implement
pub mod traits;

/// Dataset phase and run mode selectors
pub mod phase;
