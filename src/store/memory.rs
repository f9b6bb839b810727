//! In-process store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::Store;
use crate::coverage::CoverageReport;
use crate::error::StoreError;
use crate::orchestrator::AnalysisResult;
use crate::synthesis::TestSuite;

/// Store backed by `RwLock`-guarded maps. Contents live as long as the
/// value.
#[derive(Default)]
pub struct MemoryStore {
    analyses: RwLock<HashMap<String, AnalysisResult>>,
    suites: RwLock<HashMap<String, TestSuite>>,
    reports: RwLock<HashMap<String, CoverageReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_analysis(&self, record: &AnalysisResult) -> Result<(), StoreError> {
        let mut analyses = self.analyses.write().map_err(poisoned)?;
        analyses.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_analysis(&self, id: &str) -> Result<Option<AnalysisResult>, StoreError> {
        let analyses = self.analyses.read().map_err(poisoned)?;
        Ok(analyses.get(id).cloned())
    }

    async fn find_analysis_by_hash(
        &self,
        content_hash: &str,
        caller: &str,
    ) -> Result<Option<AnalysisResult>, StoreError> {
        let analyses = self.analyses.read().map_err(poisoned)?;
        Ok(analyses
            .values()
            .filter(|a| a.content_hash == content_hash && a.caller == caller && a.is_completed())
            .max_by_key(|a| a.updated_at)
            .cloned())
    }

    async fn update_analysis(&self, record: &AnalysisResult) -> Result<(), StoreError> {
        let mut analyses = self.analyses.write().map_err(poisoned)?;
        match analyses.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(record.id.clone())),
        }
    }

    async fn create_suite(&self, suite: &TestSuite) -> Result<(), StoreError> {
        let mut suites = self.suites.write().map_err(poisoned)?;
        suites.insert(suite.id.clone(), suite.clone());
        Ok(())
    }

    async fn find_suite(&self, id: &str) -> Result<Option<TestSuite>, StoreError> {
        let suites = self.suites.read().map_err(poisoned)?;
        Ok(suites.get(id).cloned())
    }

    async fn create_report(&self, report: &CoverageReport) -> Result<(), StoreError> {
        let mut reports = self.reports.write().map_err(poisoned)?;
        reports.insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn find_report(&self, id: &str) -> Result<Option<CoverageReport>, StoreError> {
        let reports = self.reports.read().map_err(poisoned)?;
        Ok(reports.get(id).cloned())
    }
}
