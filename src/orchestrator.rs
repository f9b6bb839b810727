//! Analysis orchestration.
//!
//! Validates a request, deduplicates it by content hash and runs the
//! structural extractor and the metrics engine. Records move through
//! `pending → processing → completed | failed` and are never left in
//! `processing`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{compute_metrics, extract, CodeMetrics, Diagnostic, ExtractOptions, ModuleStructure};
use crate::error::{PipelineError, StoreError, ValidationError, MAX_FILENAME_CHARS, MAX_SOURCE_CHARS};
use crate::language::Language;
use crate::store::Store;

/// Lifecycle of an analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Completed and failed records are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

/// The outcome of analyzing one source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    pub caller: String,
    pub language: Language,
    pub filename: Option<String>,
    pub content_hash: String,
    pub status: AnalysisStatus,
    pub structure: ModuleStructure,
    pub metrics: CodeMetrics,
    /// Extraction diagnostics plus any failure reason.
    pub diagnostics: Vec<Diagnostic>,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisResult {
    fn new(request: &AnalyzeRequest, language: Language, content_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            caller: request.caller.clone(),
            language,
            filename: request.filename.clone(),
            content_hash,
            status: AnalysisStatus::Pending,
            structure: ModuleStructure::default(),
            metrics: CodeMetrics::default(),
            diagnostics: Vec::new(),
            duration_ms: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }
}

/// Input to [`AnalysisOrchestrator::analyze`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeRequest {
    pub source: String,
    /// Language tag; detected from `filename` when absent.
    pub language: Option<String>,
    pub filename: Option<String>,
    pub caller: String,
    /// Re-analyze even when a completed result is cached.
    pub force: bool,
}

/// Deterministic fingerprint of `(source, language)`.
///
/// Line endings are normalized to `\n` and trailing whitespace at the end of
/// the text is ignored.
pub fn content_hash(source: &str, language: Language) -> String {
    let normalized = source.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(language.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.trim_end().as_bytes());
    hex::encode(hasher.finalize())
}

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

type Slots = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Runs analyses against a [`Store`], at most one per `(hash, caller)` at a
/// time.
pub struct AnalysisOrchestrator {
    store: Arc<dyn Store>,
    options: ExtractOptions,
    max_source_chars: usize,
    supported: Vec<Language>,
    store_timeout: Duration,
    inflight: Slots,
}

impl AnalysisOrchestrator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            options: ExtractOptions::default(),
            max_source_chars: MAX_SOURCE_CHARS,
            supported: Language::ALL.to_vec(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Lower the accepted source size. Values above the global limit are
    /// capped.
    pub fn with_max_source_chars(mut self, max: usize) -> Self {
        self.max_source_chars = max.min(MAX_SOURCE_CHARS);
        self
    }

    /// Restrict the accepted languages.
    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.supported = languages;
        self
    }

    /// Bound every store call; an expired call fails as `Unavailable`.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Number of `(hash, caller)` keys with an analysis queued or running.
    pub fn inflight_keys(&self) -> usize {
        self.inflight.lock().map_or(0, |m| m.len())
    }

    /// Check a request and resolve its language. No work is done.
    pub fn validate(&self, request: &AnalyzeRequest) -> Result<Language, ValidationError> {
        if request.caller.trim().is_empty() {
            return Err(ValidationError::MissingCaller);
        }
        if request.source.trim().is_empty() {
            return Err(ValidationError::EmptySource);
        }
        let len = request.source.chars().count();
        if len > self.max_source_chars {
            return Err(ValidationError::SourceTooLarge {
                len,
                max: self.max_source_chars,
            });
        }
        if let Some(filename) = &request.filename {
            let len = filename.chars().count();
            if len > MAX_FILENAME_CHARS {
                return Err(ValidationError::FilenameTooLong {
                    len,
                    max: MAX_FILENAME_CHARS,
                });
            }
        }
        let language = Language::detect(request.language.as_deref(), request.filename.as_deref())?;
        if !self.supported.contains(&language) {
            return Err(ValidationError::UnsupportedLanguage(language.to_string()));
        }
        Ok(language)
    }

    /// Analyze a source text, reusing a completed result for the same
    /// content and caller unless `force` is set.
    ///
    /// The work runs on its own task, which owns the single-flight slot, so
    /// a caller that stops waiting never leaves a record in `processing`.
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResult, PipelineError> {
        let language = self.validate(&request)?;
        let hash = content_hash(&request.source, language);
        let key = format!("{}:{}", request.caller, hash);

        let slot = acquire_slot(&self.inflight, &key);
        let id = hash.clone();
        let inflight = self.inflight.clone();
        let job = AnalysisJob {
            store: self.store.clone(),
            options: self.options.clone(),
            store_timeout: self.store_timeout,
        };
        let task = tokio::spawn(async move {
            let guard = slot.clone().lock_owned().await;
            let result = job.run(request, language, hash).await;
            drop(guard);
            release_slot(&inflight, &key, slot);
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::AnalysisNotCompleted {
                id,
                reason: format!("analysis task ended early: {}", e),
            }),
        }
    }
}

/// One analysis run, detached from the orchestrator's lifetime.
struct AnalysisJob {
    store: Arc<dyn Store>,
    options: ExtractOptions,
    store_timeout: Duration,
}

impl AnalysisJob {
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation = %operation, timeout = ?self.store_timeout, "store call timed out");
                Err(StoreError::Unavailable(format!(
                    "{} timed out after {:?}",
                    operation, self.store_timeout
                )))
            }
        }
    }

    async fn run(
        self,
        request: AnalyzeRequest,
        language: Language,
        hash: String,
    ) -> Result<AnalysisResult, PipelineError> {
        if !request.force {
            let cached = self
                .bounded("find_analysis_by_hash", self.store.find_analysis_by_hash(&hash, &request.caller))
                .await?;
            if let Some(cached) = cached.filter(AnalysisResult::is_completed) {
                info!(id = %cached.id, hash = %&hash[..12], "analysis cache hit");
                return Ok(cached);
            }
        }
        debug!(hash = %&hash[..12], language = %language, "analysis cache miss");

        let mut record = AnalysisResult::new(&request, language, hash);
        self.bounded("create_analysis", self.store.create_analysis(&record)).await?;

        record.status = AnalysisStatus::Processing;
        record.updated_at = Utc::now();
        self.bounded("update_analysis", self.store.update_analysis(&record)).await?;

        let started = Instant::now();
        let options = self.options.clone();
        let source = request.source;
        let outcome = tokio::task::spawn_blocking(move || {
            let structure = extract(language, &source, &options);
            let metrics = compute_metrics(language, &source, &structure);
            (structure, metrics)
        })
        .await;

        record.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        record.updated_at = Utc::now();
        match outcome {
            Ok((structure, metrics)) => {
                record.diagnostics = structure.diagnostics.clone();
                record.structure = structure;
                record.metrics = metrics;
                record.status = AnalysisStatus::Completed;
                info!(
                    id = %record.id,
                    functions = record.structure.callable_count(),
                    duration_ms = record.duration_ms,
                    "analysis completed"
                );
            }
            Err(e) => {
                let reason = if e.is_panic() {
                    "extraction panicked".to_string()
                } else {
                    format!("extraction task failed: {}", e)
                };
                warn!(id = %record.id, %reason, "analysis failed");
                record.diagnostics.push(Diagnostic::error(1, 1, reason));
                record.status = AnalysisStatus::Failed;
            }
        }

        if let Err(e) = self.bounded("update_analysis", self.store.update_analysis(&record)).await {
            warn!(id = %record.id, error = %e, "could not persist final analysis status");
            return Err(e.into());
        }
        Ok(record)
    }
}

fn acquire_slot(inflight: &Slots, key: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut inflight = inflight.lock().unwrap_or_else(|e| e.into_inner());
    inflight.entry(key.to_string()).or_default().clone()
}

fn release_slot(inflight: &Slots, key: &str, slot: Arc<tokio::sync::Mutex<()>>) {
    let mut inflight = inflight.lock().unwrap_or_else(|e| e.into_inner());
    // the map holds one reference and `slot` another
    if Arc::strong_count(&slot) <= 2 {
        inflight.remove(key);
    }
}
