use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use pageflow_core::error::Result;
use pageflow_core::types::{Document, Documents, RunId, RunMeta};

pub const LATEST_RUN_FILE: &str = "latest_run.json";

/// Pointer to the most recent persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRun {
    pub run_id: RunId,
    pub timestamp: String,
}

/// Run documents on disk: `<variant>_<run_id>.json` per document plus a
/// `latest_run.json` pointer.
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, variant: &str, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{}_{}.json", variant, run_id))
    }

    /// Persist every document of a run, then move the latest pointer.
    pub fn write_run(&self, meta: &RunMeta, documents: &Documents) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)?;

        let mut written = Vec::new();
        for (variant, doc) in documents.variants() {
            let path = self.document_path(variant, &meta.run_id);
            write_json(&path, doc)?;
            written.push(path);
        }

        let latest = LatestRun {
            run_id: meta.run_id.clone(),
            timestamp: meta.timestamp_rfc3339(),
        };
        write_json(&self.dir.join(LATEST_RUN_FILE), &latest)?;

        info!(dir = %self.dir.display(), run_id = %meta.run_id, "Wrote run outputs");
        Ok(written)
    }

    /// The latest pointer, or `None` if no run has been persisted.
    pub fn latest(&self) -> Result<Option<LatestRun>> {
        let path = self.dir.join(LATEST_RUN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn load_document(&self, variant: &str, run_id: &RunId) -> Result<Document> {
        let content = std::fs::read_to_string(self.document_path(variant, run_id))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Pretty-printed UTF-8 JSON, written to a sibling temp file and renamed
/// into place so readers never see a partial file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
