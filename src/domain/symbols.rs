// ============================================================
// Layer 3 — Symbol Table
// ============================================================
// The pipeline treats the vocabulary as opaque. The only ids
// it ever needs are PAD (padding), BOS and EOS (forced onto
// the last retained target position).

use serde::{Deserialize, Serialize};

use crate::domain::traits::SymbolProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub pad: u32,
    pub bos: u32,
    pub eos: u32,
}

impl SymbolTable {
    pub fn new(pad: u32, bos: u32, eos: u32) -> Self {
        Self { pad, bos, eos }
    }
}

impl SymbolProvider for SymbolTable {
    fn pad_id(&self) -> u32 { self.pad }
    fn bos_id(&self) -> u32 { self.bos }
    fn eos_id(&self) -> u32 { self.eos }
}
