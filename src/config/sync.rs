use super::document::ExperimentConfig;
use super::hash::ConfigHash;
use super::layout::{decode, ConfigLayout};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Keeps an in-memory experiment config consistent with the file on disk.
///
/// Every reload or save replaces the whole snapshot and bumps `generation`,
/// which dependent caches use as their invalidation token. Holders of an older
/// `Arc` keep seeing the old snapshot; re-fetch `document()` before use.
#[derive(Debug)]
pub struct ConfigSynchronizer {
    path: PathBuf,
    hash: ConfigHash,
    document: Arc<ExperimentConfig>,
    layout: ConfigLayout,
    generation: u64,
    reloads: u64,
}

impl ConfigSynchronizer {
    /// Load the document and record its hash
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path)?;
        let (document, layout) = parse(&bytes, &path)?;

        info!("Loaded experiment config from {}", path.display());

        Ok(Self {
            path,
            hash: ConfigHash::of_bytes(&bytes),
            document: Arc::new(document),
            layout,
            generation: 0,
            reloads: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash recorded at the last load or save
    pub fn hash(&self) -> &ConfigHash {
        &self.hash
    }

    /// Current snapshot
    pub fn document(&self) -> Arc<ExperimentConfig> {
        Arc::clone(&self.document)
    }

    /// Bumped on every reload and save
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of reloads triggered by external edits
    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    /// Whether the file on disk differs from the loaded snapshot
    pub fn is_stale(&self) -> Result<bool> {
        Ok(ConfigHash::of_file(&self.path)? != self.hash)
    }

    /// Reload when stale; returns whether a reload happened
    pub fn sync(&mut self) -> Result<bool> {
        let bytes = std::fs::read(&self.path)?;
        let hash = ConfigHash::of_bytes(&bytes);

        if hash == self.hash {
            debug!("Experiment config unchanged ({})", hash);
            return Ok(false);
        }

        info!("Loading new experiment config from {}", self.path.display());
        let (document, layout) = parse(&bytes, &self.path)?;

        self.document = Arc::new(document);
        self.layout = layout;
        self.hash = hash;
        self.generation += 1;
        self.reloads += 1;

        Ok(true)
    }

    /// Persist a new document; the recorded hash follows the written bytes.
    ///
    /// Only changed values are rewritten; comments, layout and keys the
    /// document does not know about are kept as they were on disk.
    pub fn save(&mut self, document: ExperimentConfig) -> Result<()> {
        document.validate()?;
        let layout = self.layout.merged(&document)?;
        let bytes = layout.to_bytes();
        std::fs::write(&self.path, &bytes)?;

        self.hash = ConfigHash::of_bytes(&bytes);
        self.document = Arc::new(document);
        self.layout = layout;
        self.generation += 1;

        info!("Saved experiment config to {}", self.path.display());
        Ok(())
    }
}

fn parse(bytes: &[u8], path: &Path) -> Result<(ExperimentConfig, ConfigLayout)> {
    let document = ExperimentConfig::from_toml_str(decode(bytes, path)?, path)?;
    document.validate()?;
    let layout = ConfigLayout::parse(bytes, path)?;
    Ok((document, layout))
}
