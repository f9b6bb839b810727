//! Persistence port for pipeline records.
//!
//! The pipeline only needs create / find-by-id / find-by-hash /
//! update-status semantics, so every backing store sits behind [`Store`].

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::coverage::CoverageReport;
use crate::error::StoreError;
use crate::orchestrator::AnalysisResult;
use crate::synthesis::TestSuite;

/// Storage for analyses, test suites and coverage reports.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_analysis(&self, record: &AnalysisResult) -> Result<(), StoreError>;

    async fn find_analysis(&self, id: &str) -> Result<Option<AnalysisResult>, StoreError>;

    /// Most recently updated *completed* analysis for `(content_hash,
    /// caller)`. Failed and in-progress records are never returned.
    async fn find_analysis_by_hash(
        &self,
        content_hash: &str,
        caller: &str,
    ) -> Result<Option<AnalysisResult>, StoreError>;

    /// Replace an existing analysis. Fails with `NotFound` for unknown ids.
    async fn update_analysis(&self, record: &AnalysisResult) -> Result<(), StoreError>;

    async fn create_suite(&self, suite: &TestSuite) -> Result<(), StoreError>;

    async fn find_suite(&self, id: &str) -> Result<Option<TestSuite>, StoreError>;

    async fn create_report(&self, report: &CoverageReport) -> Result<(), StoreError>;

    async fn find_report(&self, id: &str) -> Result<Option<CoverageReport>, StoreError>;
}

/// Backing store selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}
