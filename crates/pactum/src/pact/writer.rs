//! Contract file output and input.

use super::{Pact, PactError, WriteMode};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes `<dir>/<consumer>-<provider>.json`.
#[derive(Debug, Clone)]
pub struct PactWriter {
    dir: PathBuf,
    mode: WriteMode,
}

impl PactWriter {
    pub fn new(dir: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            dir: dir.into(),
            mode,
        }
    }

    pub fn path_for(&self, pact: &Pact) -> PathBuf {
        self.dir.join(pact.file_name())
    }

    /// Write the pact, merging with an existing file in [`WriteMode::Merge`].
    /// Returns the written path.
    pub fn write(&self, pact: &Pact) -> Result<PathBuf, PactError> {
        fs::create_dir_all(&self.dir).map_err(|source| PactError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(pact);

        let output = match self.mode {
            WriteMode::Merge if path.exists() => {
                let mut existing = PactReader::read(&path)?;
                debug!(
                    "Merging {} interactions into existing pact file {} ({} interactions)",
                    pact.interactions.len(),
                    path.display(),
                    existing.interactions.len()
                );
                existing.merge(pact.clone())?;
                existing
            }
            _ => pact.clone(),
        };

        let json = output.to_json()?;
        fs::write(&path, json).map_err(|source| PactError::Io {
            path: path.clone(),
            source,
        })?;
        info!(
            "Wrote pact file {} with {} interactions",
            path.display(),
            output.interactions.len()
        );
        Ok(path)
    }
}

/// Reads a contract file back into the interaction model.
pub struct PactReader;

impl PactReader {
    pub fn read(path: impl AsRef<Path>) -> Result<Pact, PactError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| PactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Pact::from_json(&json)
    }
}
