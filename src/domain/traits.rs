// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between this pipeline and its collaborators.
//
//   SymbolProvider → anything that can hand out PAD/BOS/EOS ids
//                    (a fixed SymbolTable, or a tokenizer file
//                    resolved by infra::vocab_store)
//   Persistable    → anything whose state round-trips to disk
//                    (PipelineConfig via infra::config_store)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::domain::symbols::SymbolTable;

// ─── SymbolProvider ───────────────────────────────────────────────────────────
/// Source of the three special token ids the pipeline uses.
pub trait SymbolProvider {
    fn pad_id(&self) -> u32;
    fn bos_id(&self) -> u32;
    fn eos_id(&self) -> u32;

    /// Snapshot the ids into a plain, copyable table
    fn symbol_table(&self) -> SymbolTable {
        SymbolTable::new(self.pad_id(), self.bos_id(), self.eos_id())
    }
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved and restored from disk.
pub trait Persistable: Sized {
    /// Save this component's state under the given directory
    fn save(&self, dir: &Path) -> Result<()>;

    /// Load a component's state from the given directory
    fn load(dir: &Path) -> Result<Self>;
}
