// ============================================================
// Layer 6 — Config Store
// ============================================================
// Saves and restores a PipelineConfig as pretty JSON so a run
// (bounds, seed, symbol ids) can be replayed exactly.
//
// File layout:
//   <dir>/
//     pipeline_config.json
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::inspect_use_case::PipelineConfig;
use crate::domain::traits::Persistable;

pub const CONFIG_FILE: &str = "pipeline_config.json";

pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn save(&self, cfg: &PipelineConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create config directory '{}'", self.dir.display()))?;

        let path = self.path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved pipeline config to '{}'", path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<PipelineConfig> {
        let path = self.path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Cannot parse config in '{}'", path.display()))
    }
}

impl Persistable for PipelineConfig {
    fn save(&self, dir: &Path) -> Result<()> {
        ConfigStore::new(dir).save(self)
    }

    fn load(dir: &Path) -> Result<Self> {
        ConfigStore::new(dir).load()
    }
}
