//! Integration tests for the analysis, synthesis and coverage pipeline.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use testsynth::coverage::CoverageSimulator;
use testsynth::synthesis::{
    GenerateOptions, RateLimiter, SynthesisOptions, TargetMetadata, TestSource,
};
use testsynth::{
    AnalysisOrchestrator, AnalysisResult, AnalysisStatus, AnalyzeRequest, CoverageReport, Framework,
    Language, MemoryStore, Pipeline, PipelineContext, PipelineError, Store, StoreError,
    SynthesisError, TestBodyGenerator, TestCase, TestSuite, TestSynthesizer, TestType,
};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(testdata_path().join(name)).expect("should read fixture")
}

fn request(source: &str, filename: &str) -> AnalyzeRequest {
    AnalyzeRequest {
        source: source.to_string(),
        filename: Some(filename.to_string()),
        caller: "integration".to_string(),
        ..Default::default()
    }
}

/// Fails every call, the way an unreachable endpoint does.
struct UnreachableGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TestBodyGenerator for UnreachableGenerator {
    async fn generate(
        &self,
        _snippet: &str,
        _language: Language,
        _framework: Framework,
        _target: &TargetMetadata,
        _options: &GenerateOptions,
    ) -> Result<Vec<TestCase>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SynthesisError::Unavailable("connection refused".to_string()))
    }
}

/// Never answers; only a timeout or cancellation ends the call.
struct HangingGenerator;

#[async_trait]
impl TestBodyGenerator for HangingGenerator {
    async fn generate(
        &self,
        _snippet: &str,
        _language: Language,
        _framework: Framework,
        _target: &TargetMetadata,
        _options: &GenerateOptions,
    ) -> Result<Vec<TestCase>, SynthesisError> {
        futures::future::pending::<()>().await;
        Ok(Vec::new())
    }
}

/// A store whose every call hangs.
struct HangingStore;

#[async_trait]
impl Store for HangingStore {
    async fn create_analysis(&self, _record: &AnalysisResult) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn find_analysis(&self, _id: &str) -> Result<Option<AnalysisResult>, StoreError> {
        std::future::pending().await
    }

    async fn find_analysis_by_hash(
        &self,
        _content_hash: &str,
        _caller: &str,
    ) -> Result<Option<AnalysisResult>, StoreError> {
        std::future::pending().await
    }

    async fn update_analysis(&self, _record: &AnalysisResult) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn create_suite(&self, _suite: &TestSuite) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn find_suite(&self, _id: &str) -> Result<Option<TestSuite>, StoreError> {
        std::future::pending().await
    }

    async fn create_report(&self, _report: &CoverageReport) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn find_report(&self, _id: &str) -> Result<Option<CoverageReport>, StoreError> {
        std::future::pending().await
    }
}

fn pipeline_with(generator: Arc<dyn TestBodyGenerator>, options: SynthesisOptions) -> Pipeline {
    Pipeline::new(
        AnalysisOrchestrator::new(Arc::new(MemoryStore::new())),
        TestSynthesizer::new(generator, options),
        CoverageSimulator::default(),
    )
}

#[tokio::test]
async fn test_full_run_for_every_fixture() {
    testsynth::init();
    let pipeline = Pipeline::in_memory();

    for name in ["sample.js", "sample.ts", "sample.py", "Sample.java", "sample.cpp", "Sample.cs"] {
        let source = fixture(name);
        let output = pipeline
            .run(request(&source, name), &pipeline.context())
            .await
            .unwrap_or_else(|e| panic!("{}: {}", name, e));

        assert_eq!(output.analysis.status, AnalysisStatus::Completed, "{}", name);
        let suite = output.suite.expect("suite for a completed analysis");
        let report = output.report.expect("report for a completed analysis");

        assert!(suite.total() > 0, "{}: empty suite", name);
        assert_eq!(suite.summary.total_tests, suite.total());
        assert!(suite.tests.iter().all(|t| t.source == TestSource::Template));
        let in_files: usize = suite.files.iter().map(|f| f.test_count).sum();
        assert_eq!(in_files, suite.total(), "{}: every test lands in a file", name);

        assert!(report.simulated);
        assert_eq!(report.suite_id, suite.id);
        assert_eq!(report.analysis_id, output.analysis.id);

        let stored = pipeline.store().find_suite(&suite.id).await.unwrap();
        assert_eq!(stored.map(|s| s.id), Some(suite.id.clone()));
        assert!(pipeline.store().find_report(&report.id).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_hanging_store_fails_retryably() {
    let orchestrator =
        AnalysisOrchestrator::new(Arc::new(HangingStore)).with_store_timeout(Duration::from_millis(30));
    let source = fixture("sample.js");

    let first = tokio::time::timeout(Duration::from_secs(5), orchestrator.analyze(request(&source, "sample.js")))
        .await
        .expect("store calls are bounded");
    let err = first.unwrap_err();
    assert!(matches!(err, PipelineError::Store(StoreError::Unavailable(_))));
    assert!(err.is_retryable());

    // the single-flight slot was released, so the same key is not stuck
    let second = tokio::time::timeout(Duration::from_secs(5), orchestrator.analyze(request(&source, "sample.js")))
        .await
        .expect("a later request for the same key is not blocked");
    assert!(second.is_err());
    assert_eq!(orchestrator.inflight_keys(), 0);
}

#[tokio::test]
async fn test_reanalysis_is_idempotent() {
    let pipeline = Pipeline::in_memory();
    let source = fixture("sample.py");

    let first = pipeline.analyze(request(&source, "sample.py")).await.unwrap();
    let second = pipeline.analyze(request(&source, "sample.py")).await.unwrap();
    assert_eq!(first.id, second.id);

    let forced = pipeline
        .analyze(AnalyzeRequest {
            force: true,
            ..request(&source, "sample.py")
        })
        .await
        .unwrap();
    assert_ne!(forced.id, first.id);
    assert_eq!(forced.content_hash, first.content_hash);

    let other_caller = pipeline
        .analyze(AnalyzeRequest {
            caller: "someone-else".to_string(),
            ..request(&source, "sample.py")
        })
        .await
        .unwrap();
    assert_ne!(other_caller.id, forced.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_analysis() {
    let pipeline = Arc::new(Pipeline::in_memory());
    let source = fixture("Sample.java");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = pipeline.clone();
            let source = source.clone();
            tokio::spawn(async move { pipeline.analyze(request(&source, "Sample.java")).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every request should see the same analysis");
}

#[tokio::test]
async fn test_validation_rejects_bad_requests() {
    let pipeline = Pipeline::in_memory();

    let empty = pipeline.analyze(request("", "a.js")).await;
    assert!(matches!(empty, Err(PipelineError::Validation(_))));

    let unknown = pipeline
        .analyze(AnalyzeRequest {
            source: "x = 1".to_string(),
            language: Some("cobol".to_string()),
            caller: "integration".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(unknown, Err(PipelineError::Validation(_))));

    let anonymous = pipeline
        .analyze(AnalyzeRequest {
            source: "x = 1".to_string(),
            language: Some("python".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(anonymous, Err(PipelineError::Validation(_))));
}

#[tokio::test]
async fn test_unreachable_generator_degrades_to_templates() {
    let generator = Arc::new(UnreachableGenerator {
        calls: AtomicUsize::new(0),
    });
    let pipeline = pipeline_with(generator.clone(), SynthesisOptions::default());
    let source = fixture("sample.js");

    let output = pipeline
        .run(request(&source, "sample.js"), &PipelineContext::default())
        .await
        .unwrap();
    let suite = output.suite.unwrap();

    let calls = generator.calls.load(Ordering::SeqCst);
    assert!(calls > 0);
    assert_eq!(suite.summary.generator_failures, calls);
    assert_eq!(suite.summary.ai_generated, 0);
    assert_eq!(suite.summary.template_generated, suite.total());
    // every function and method still gets its happy-path test
    assert!(suite.count(TestType::Unit) >= output.analysis.structure.callable_count());
}

#[tokio::test]
async fn test_hanging_generator_times_out_per_target() {
    let pipeline = pipeline_with(
        Arc::new(HangingGenerator),
        SynthesisOptions {
            target_timeout: Duration::from_millis(20),
            ..Default::default()
        },
    );
    let source = fixture("sample.ts");

    let output = pipeline
        .run(request(&source, "sample.ts"), &PipelineContext::default())
        .await
        .unwrap();
    let suite = output.suite.unwrap();
    assert!(suite.summary.generator_failures > 0);
    assert!(!suite.summary.cancelled);
    assert!(suite.total() > 0);
}

#[tokio::test]
async fn test_cancellation_abandons_in_flight_calls() {
    let pipeline = pipeline_with(Arc::new(HangingGenerator), SynthesisOptions::default());
    let source = fixture("sample.cpp");
    let analysis = pipeline.analyze(request(&source, "sample.cpp")).await.unwrap();

    let ctx = PipelineContext::default();
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let suite = tokio::time::timeout(Duration::from_secs(5), pipeline.generate(&analysis, &source, &ctx))
        .await
        .expect("cancellation should end synthesis")
        .unwrap();
    assert!(suite.summary.cancelled);
    assert_eq!(suite.total(), 0);
}

#[tokio::test]
async fn test_rate_limit_is_scoped_to_the_context() {
    let generator = Arc::new(UnreachableGenerator {
        calls: AtomicUsize::new(0),
    });
    let pipeline = pipeline_with(
        generator.clone(),
        SynthesisOptions {
            concurrency: 1,
            ..Default::default()
        },
    );
    let source = fixture("sample.js");
    let analysis = pipeline.analyze(request(&source, "sample.js")).await.unwrap();

    let limited = PipelineContext::new(RateLimiter::new(2, Duration::from_secs(3600)));
    pipeline.generate(&analysis, &source, &limited).await.unwrap();
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

    // a fresh context starts with a fresh window
    let fresh = PipelineContext::new(RateLimiter::new(2, Duration::from_secs(3600)));
    pipeline.generate(&analysis, &source, &fresh).await.unwrap();
    assert_eq!(generator.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_same_inputs_give_same_coverage() {
    let source = fixture("sample.py");
    let mut scores = Vec::new();
    for _ in 0..2 {
        let pipeline = Pipeline::in_memory();
        let output = pipeline
            .run(request(&source, "sample.py"), &pipeline.context())
            .await
            .unwrap();
        let report = output.report.unwrap();
        scores.push((
            report.seed,
            report.overall_score,
            report.line.covered,
            report.statement.covered,
        ));
    }
    assert_eq!(scores[0], scores[1]);
}

#[tokio::test]
async fn test_requested_framework_is_used() {
    let pipeline = Pipeline::in_memory();
    let source = fixture("sample.py");
    let ctx = pipeline.context().with_framework(Some(Framework::Unittest));

    let output = pipeline.run(request(&source, "sample.py"), &ctx).await.unwrap();
    let suite = output.suite.unwrap();
    assert_eq!(suite.framework, Framework::Unittest);
    assert!(suite.files.iter().all(|f| f.content.contains("import unittest")));
}
