//! JSON file store.
//!
//! One file per record: `<root>/analyses/<id>.json`, `<root>/suites/<id>.json`
//! and `<root>/reports/<id>.json`. The default root is
//! `~/.cache/testsynth/store/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use super::Store;
use crate::coverage::CoverageReport;
use crate::error::StoreError;
use crate::orchestrator::AnalysisResult;
use crate::synthesis::TestSuite;

const ANALYSES: &str = "analyses";
const SUITES: &str = "suites";
const REPORTS: &str = "reports";

pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the user cache directory.
    pub fn in_cache_dir() -> Result<Self, StoreError> {
        ProjectDirs::from("", "", "testsynth")
            .map(|dirs| Self::new(dirs.cache_dir().join("store")))
            .ok_or_else(|| StoreError::Unavailable("no cache directory for this user".to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record ids become file names, so only a conservative alphabet is
    /// accepted.
    fn record_path(&self, kind: &str, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.root.join(kind).join(format!("{}.json", id)))
    }

    async fn write<T: Serialize>(&self, kind: &str, id: &str, value: &T) -> Result<(), StoreError> {
        let path = self.record_path(kind, id)?;
        fs::create_dir_all(self.root.join(kind)).await?;
        let content = serde_json::to_vec_pretty(value)?;
        // write-then-rename so readers never see a partial record
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<Option<T>, StoreError> {
        let path = match self.record_path(kind, id) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn create_analysis(&self, record: &AnalysisResult) -> Result<(), StoreError> {
        self.write(ANALYSES, &record.id, record).await
    }

    async fn find_analysis(&self, id: &str) -> Result<Option<AnalysisResult>, StoreError> {
        self.read(ANALYSES, id).await
    }

    async fn find_analysis_by_hash(
        &self,
        content_hash: &str,
        caller: &str,
    ) -> Result<Option<AnalysisResult>, StoreError> {
        let dir = self.root.join(ANALYSES);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut best: Option<AnalysisResult> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            // Skip records that do not parse rather than failing the lookup.
            let Ok(record) = serde_json::from_slice::<AnalysisResult>(&bytes) else {
                continue;
            };
            let matches = record.content_hash == content_hash && record.caller == caller;
            if !matches || !record.is_completed() {
                continue;
            }
            if best.as_ref().map_or(true, |b| record.updated_at > b.updated_at) {
                best = Some(record);
            }
        }
        Ok(best)
    }

    async fn update_analysis(&self, record: &AnalysisResult) -> Result<(), StoreError> {
        let path = self.record_path(ANALYSES, &record.id)?;
        if fs::metadata(&path).await.is_err() {
            return Err(StoreError::NotFound(record.id.clone()));
        }
        self.write(ANALYSES, &record.id, record).await
    }

    async fn create_suite(&self, suite: &TestSuite) -> Result<(), StoreError> {
        self.write(SUITES, &suite.id, suite).await
    }

    async fn find_suite(&self, id: &str) -> Result<Option<TestSuite>, StoreError> {
        self.read(SUITES, id).await
    }

    async fn create_report(&self, report: &CoverageReport) -> Result<(), StoreError> {
        self.write(REPORTS, &report.id, report).await
    }

    async fn find_report(&self, id: &str) -> Result<Option<CoverageReport>, StoreError> {
        self.read(REPORTS, id).await
    }
}
