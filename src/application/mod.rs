// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish a
// specific goal: running the batching pipeline over a corpus.
//
// Rules for this layer:
//   - No padding or tensor code here (that's Layer 4)
//   - No argument parsing or printing (that's Layer 1)
//   - No direct file formats (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Pipeline configuration and the batch inspection workflow
pub mod inspect_use_case;
