//! The analysis → synthesis → coverage pipeline.
//!
//! Stages hand their typed outputs to the next stage directly. Records
//! are persisted along the way but never re-read between stages.
//!
//! Per-run mutable state (the generator rate limiter, cancellation, a
//! requested framework) lives in a [`PipelineContext`] owned by the
//! caller, so concurrent runs share nothing implicitly.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analysis::ExtractOptions;
use crate::config::{Config, RateLimitConfig};
use crate::coverage::{CoverageReport, CoverageSimulator};
use crate::error::PipelineError;
use crate::orchestrator::{AnalysisOrchestrator, AnalysisResult, AnalyzeRequest};
use crate::store::{JsonFileStore, MemoryStore, Store, StoreKind};
use crate::synthesis::{
    DisabledGenerator, Framework, GenerateOptions, HttpTestGenerator, RateLimiter, SynthesisOptions,
    TestBodyGenerator, TestSuite, TestSynthesizer,
};

/// State for one pipeline invocation.
#[derive(Debug)]
pub struct PipelineContext {
    /// Limits generator calls made during this run.
    pub limiter: RateLimiter,
    /// Cancelling abandons in-flight generator calls.
    pub cancel: CancellationToken,
    /// Framework requested for this run.
    pub framework: Option<Framework>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            limiter: RateLimiter::unlimited(),
            cancel: CancellationToken::new(),
            framework: None,
        }
    }
}

impl PipelineContext {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter,
            ..Default::default()
        }
    }

    pub fn with_framework(mut self, framework: Option<Framework>) -> Self {
        self.framework = framework;
        self
    }
}

/// Everything a full run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub analysis: AnalysisResult,
    /// `None` when the analysis failed.
    pub suite: Option<TestSuite>,
    pub report: Option<CoverageReport>,
}

/// The three stages wired to one store.
pub struct Pipeline {
    orchestrator: AnalysisOrchestrator,
    synthesizer: TestSynthesizer,
    simulator: CoverageSimulator,
    rate_limit: RateLimitConfig,
}

impl Pipeline {
    pub fn new(
        orchestrator: AnalysisOrchestrator,
        synthesizer: TestSynthesizer,
        simulator: CoverageSimulator,
    ) -> Self {
        Self {
            orchestrator,
            synthesizer,
            simulator,
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// In-memory, template-only pipeline with default settings.
    pub fn in_memory() -> Self {
        Self::new(
            AnalysisOrchestrator::new(Arc::new(MemoryStore::new())),
            TestSynthesizer::templates_only(),
            CoverageSimulator::default(),
        )
    }

    /// Build every stage from a validated config.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let store: Arc<dyn Store> = match config.store.kind {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::File => match &config.store.directory {
                Some(dir) => Arc::new(JsonFileStore::new(dir.clone())),
                None => Arc::new(JsonFileStore::in_cache_dir()?),
            },
        };

        let orchestrator = AnalysisOrchestrator::new(store)
            .with_options(ExtractOptions {
                heuristic_only: config.analysis.heuristic_only,
                ..Default::default()
            })
            .with_max_source_chars(config.analysis.max_source_chars)
            .with_languages(config.analysis.languages.clone())
            .with_store_timeout(config.store.timeout());

        let synthesis = &config.synthesis;
        let options = SynthesisOptions {
            concurrency: synthesis.concurrency,
            target_timeout: synthesis.target_timeout(),
            fan_out: synthesis.fan_out(),
            throw_threshold: synthesis.throw_threshold,
            generate: GenerateOptions {
                max_tests: synthesis.max_tests_per_target,
                model: config.generator.model.clone(),
                ..Default::default()
            },
            frameworks: synthesis.frameworks.iter().map(|(l, f)| (*l, *f)).collect(),
        };
        let synthesizer = TestSynthesizer::new(build_generator(config), options);

        let simulator = CoverageSimulator::new(config.coverage.error_path_line_rate, config.coverage.seed);

        Ok(Self {
            orchestrator,
            synthesizer,
            simulator,
            rate_limit: config.rate_limit.clone(),
        })
    }

    /// A fresh context with this pipeline's rate limit.
    pub fn context(&self) -> PipelineContext {
        PipelineContext::new(RateLimiter::new(self.rate_limit.max_calls, self.rate_limit.window()))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.orchestrator.store()
    }

    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResult, PipelineError> {
        self.orchestrator.analyze(request).await
    }

    /// Synthesize and persist a suite for a completed analysis.
    pub async fn generate(
        &self,
        analysis: &AnalysisResult,
        source: &str,
        ctx: &PipelineContext,
    ) -> Result<TestSuite, PipelineError> {
        let suite = self.synthesizer.synthesize(analysis, source, ctx).await?;
        self.store().create_suite(&suite).await?;
        info!(
            suite = %suite.id,
            tests = suite.total(),
            failures = suite.summary.generator_failures,
            "test suite stored"
        );
        Ok(suite)
    }

    /// Simulate and persist coverage of `suite`.
    pub async fn coverage(
        &self,
        analysis: &AnalysisResult,
        suite: &TestSuite,
        source: &str,
    ) -> Result<CoverageReport, PipelineError> {
        let report = self.simulator.simulate(analysis, suite, source)?;
        self.store().create_report(&report).await?;
        info!(report = %report.id, score = report.overall_score, grade = %report.grade, "coverage stored");
        Ok(report)
    }

    /// Run all three stages. A failed analysis stops the run without a
    /// suite or report.
    pub async fn run(&self, request: AnalyzeRequest, ctx: &PipelineContext) -> Result<PipelineOutput, PipelineError> {
        let source = request.source.clone();
        let analysis = self.analyze(request).await?;
        if !analysis.is_completed() {
            warn!(id = %analysis.id, "analysis failed, skipping synthesis");
            return Ok(PipelineOutput {
                analysis,
                suite: None,
                report: None,
            });
        }

        let suite = self.generate(&analysis, &source, ctx).await?;
        let report = self.coverage(&analysis, &suite, &source).await?;
        Ok(PipelineOutput {
            analysis,
            suite: Some(suite),
            report: Some(report),
        })
    }
}

fn build_generator(config: &Config) -> Arc<dyn TestBodyGenerator> {
    let generator = &config.generator;
    if !generator.enabled {
        return Arc::new(DisabledGenerator);
    }
    let Some(endpoint) = generator.endpoint.as_deref() else {
        return Arc::new(DisabledGenerator);
    };
    match HttpTestGenerator::new(endpoint, Some(&generator.api_key_env), generator.timeout()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "generator unavailable, using templates only");
            Arc::new(DisabledGenerator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "def area(w, h):\n    if w < 0 or h < 0:\n        raise ValueError(\"negative\")\n    return w * h\n";

    fn request() -> AnalyzeRequest {
        AnalyzeRequest {
            source: SOURCE.to_string(),
            language: Some("python".to_string()),
            filename: Some("geometry.py".to_string()),
            caller: "ci".to_string(),
            force: false,
        }
    }

    #[tokio::test]
    async fn test_run_produces_all_records() {
        let pipeline = Pipeline::in_memory();
        let output = pipeline.run(request(), &pipeline.context()).await.unwrap();

        let suite = output.suite.unwrap();
        let report = output.report.unwrap();
        assert_eq!(suite.analysis_id, output.analysis.id);
        assert_eq!(report.suite_id, suite.id);
        assert!(report.simulated);
        assert_eq!(suite.files[0].name, "test_area.py");

        let store = pipeline.store();
        assert!(store.find_suite(&suite.id).await.unwrap().is_some());
        assert!(store.find_report(&report.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_same_inputs_same_report() {
        let pipeline = Pipeline::in_memory();
        let first = pipeline.run(request(), &pipeline.context()).await.unwrap();
        let second = pipeline.run(request(), &pipeline.context()).await.unwrap();
        assert_eq!(first.analysis.id, second.analysis.id);

        let (a, b) = (first.report.unwrap(), second.report.unwrap());
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.statement, b.statement);
        assert_eq!(a.line, b.line);
        assert_eq!(a.overall_score, b.overall_score);
    }

    #[tokio::test]
    async fn test_from_config_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.kind = StoreKind::File;
        config.store.directory = Some(dir.path().to_path_buf());

        let pipeline = Pipeline::from_config(&config).unwrap();
        let output = pipeline.run(request(), &pipeline.context()).await.unwrap();
        assert!(dir.path().join("analyses").join(format!("{}.json", output.analysis.id)).exists());
    }
}
