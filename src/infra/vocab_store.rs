// ============================================================
// Layer 6 — Vocab Store
// ============================================================
// Resolves the PAD/BOS/EOS ids from a HuggingFace tokenizer
// JSON file, so the pipeline's symbol table always matches
// the vocabulary the corpus was encoded with.
//
// The pipeline never tokenizes text; it only needs these
// three ids. Token strings are configurable because corpora
// differ (`<PAD>`/`<S>`/`</S>`, `[PAD]`/`[CLS]`/`[SEP]`, ...).

use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::domain::{
    error::{PipelineError, PipelineResult},
    symbols::SymbolTable,
    traits::SymbolProvider,
};

pub const DEFAULT_PAD_TOKEN: &str = "<PAD>";
pub const DEFAULT_BOS_TOKEN: &str = "<S>";
pub const DEFAULT_EOS_TOKEN: &str = "</S>";

pub struct VocabStore {
    path:      PathBuf,
    pad_token: String,
    bos_token: String,
    eos_token: String,
}

impl VocabStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:      path.into(),
            pad_token: DEFAULT_PAD_TOKEN.to_string(),
            bos_token: DEFAULT_BOS_TOKEN.to_string(),
            eos_token: DEFAULT_EOS_TOKEN.to_string(),
        }
    }

    /// Use different token strings for PAD, BOS and EOS
    pub fn with_tokens(mut self, pad: impl Into<String>, bos: impl Into<String>, eos: impl Into<String>) -> Self {
        self.pad_token = pad.into();
        self.bos_token = bos.into();
        self.eos_token = eos.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tokenizer file and look up the three special ids.
    pub fn load(&self) -> PipelineResult<Vocab> {
        let tokenizer = Tokenizer::from_file(&self.path).map_err(|e| {
            PipelineError::Vocab(format!("cannot load tokenizer from '{}': {e}", self.path.display()))
        })?;

        let lookup = |token: &str| {
            tokenizer.token_to_id(token).ok_or_else(|| {
                PipelineError::Vocab(format!("token '{token}' not in '{}'", self.path.display()))
            })
        };
        let symbols = SymbolTable::new(
            lookup(&self.pad_token)?,
            lookup(&self.bos_token)?,
            lookup(&self.eos_token)?,
        );
        let size = tokenizer.get_vocab_size(true);

        tracing::info!(
            "Resolved symbols from '{}': pad={} bos={} eos={} (vocab size {})",
            self.path.display(),
            symbols.pad,
            symbols.bos,
            symbols.eos,
            size
        );
        Ok(Vocab { symbols, size })
    }
}

/// Special ids resolved from a tokenizer file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocab {
    symbols: SymbolTable,
    size:    usize,
}

impl Vocab {
    pub fn size(&self) -> usize {
        self.size
    }
}

impl SymbolProvider for Vocab {
    fn pad_id(&self) -> u32 { self.symbols.pad }
    fn bos_id(&self) -> u32 { self.symbols.bos }
    fn eos_id(&self) -> u32 { self.symbols.eos }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal word-level tokenizer in HuggingFace format
    fn write_tokenizer(dir: &Path, vocab: serde_json::Value) -> PathBuf {
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "<UNK>"
            }
        });
        let path = dir.join("tokenizer.json");
        std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_resolves_default_tokens() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = write_tokenizer(tmp.path(), serde_json::json!({
            "<UNK>": 0, "the": 1, "<S>": 4, "</S>": 5, "<PAD>": 6
        }));

        let vocab = VocabStore::new(path).load().unwrap();
        assert_eq!(vocab.symbol_table(), SymbolTable::new(6, 4, 5));
        assert_eq!(vocab.size(), 5);
    }

    #[test]
    fn test_custom_tokens() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = write_tokenizer(tmp.path(), serde_json::json!({
            "<UNK>": 0, "[PAD]": 1, "[CLS]": 2, "[SEP]": 3
        }));

        let vocab = VocabStore::new(path)
            .with_tokens("[PAD]", "[CLS]", "[SEP]")
            .load()
            .unwrap();
        assert_eq!(vocab.pad_id(), 1);
        assert_eq!(vocab.bos_id(), 2);
        assert_eq!(vocab.eos_id(), 3);
    }

    #[test]
    fn test_missing_token_is_vocab_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = write_tokenizer(tmp.path(), serde_json::json!({ "<UNK>": 0, "<PAD>": 1 }));

        let err = VocabStore::new(path).load().unwrap_err();
        assert!(matches!(err, PipelineError::Vocab(ref msg) if msg.contains("<S>")));
    }

    #[test]
    fn test_missing_file_is_vocab_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VocabStore::new(tmp.path().join("nope.json")).load().unwrap_err();
        assert!(matches!(err, PipelineError::Vocab(_)));
    }
}
