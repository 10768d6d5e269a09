use crate::error::{Result, StatsError};
use crate::model::ProcessedProjectSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// JSON-array file of project identifiers that have already been processed.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty set. Content that is not a JSON array of
    /// strings is an error, never an empty set.
    pub fn load(&self) -> Result<ProcessedProjectSet> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ProcessedProjectSet::new()),
            Err(e) => return Err(e.into()),
        };

        let ids: Vec<String> =
            serde_json::from_str(&text).map_err(|source| StatsError::CheckpointCorrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(ids.into_iter().collect())
    }

    /// Rewrites the whole file. The new content goes to a sibling temp file
    /// first and is renamed over the old one.
    pub fn save(&self, processed: &ProcessedProjectSet) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let ids: Vec<&String> = processed.iter().collect();
        let text = serde_json::to_string(&ids)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
