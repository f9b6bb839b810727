//! Test synthesis.
//!
//! Turns an analysis into a test suite: designate targets, ask the
//! generator for candidate tests per target (bounded concurrency, one
//! timeout per call, rate limited), always add template tests, merge and
//! deduplicate, then render one file per target.
//!
//! A generator failure only affects its own target, which falls back to
//! templates. Cancelling the run keeps the targets merged so far.

mod frameworks;
mod generator;
mod rate_limit;
mod targets;
mod templates;

pub use frameworks::Framework;
pub use generator::{DisabledGenerator, GenerateOptions, HttpTestGenerator, TestBodyGenerator};
pub use rate_limit::RateLimiter;
pub use targets::{designate_targets, FanOut, Target, TargetKind, TargetMetadata};
pub use templates::{placeholder, template_tests, DEFAULT_THROW_THRESHOLD};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, SynthesisError};
use crate::language::Language;
use crate::orchestrator::AnalysisResult;
use crate::pipeline::PipelineContext;

/// Category of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestType {
    Unit,
    Integration,
    ErrorHandling,
    EdgeCase,
    Performance,
}

impl TestType {
    pub const ALL: [TestType; 5] = [
        TestType::Unit,
        TestType::Integration,
        TestType::ErrorHandling,
        TestType::EdgeCase,
        TestType::Performance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Unit => "unit",
            TestType::Integration => "integration",
            TestType::ErrorHandling => "error-handling",
            TestType::EdgeCase => "edge-case",
            TestType::Performance => "performance",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "unit" => Ok(TestType::Unit),
            "integration" => Ok(TestType::Integration),
            "error-handling" | "error" | "errors" => Ok(TestType::ErrorHandling),
            "edge-case" | "edge" | "boundary" => Ok(TestType::EdgeCase),
            "performance" | "perf" | "benchmark" => Ok(TestType::Performance),
            other => Err(format!("unknown test type: {}", other)),
        }
    }
}

/// Where a test case came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestSource {
    Ai,
    Template,
}

/// One synthesized test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique within its suite (`tc-0001`, ...).
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    /// Name of the function, method or class under test.
    pub target: String,
    pub framework: String,
    pub body: String,
    pub source: TestSource,
}

/// A rendered test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
    pub test_count: usize,
}

/// Test cases grouped by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestGroups {
    pub unit: Vec<TestCase>,
    pub integration: Vec<TestCase>,
    pub error_handling: Vec<TestCase>,
    pub edge_case: Vec<TestCase>,
    pub performance: Vec<TestCase>,
}

impl TestGroups {
    pub fn get(&self, test_type: TestType) -> &[TestCase] {
        match test_type {
            TestType::Unit => &self.unit,
            TestType::Integration => &self.integration,
            TestType::ErrorHandling => &self.error_handling,
            TestType::EdgeCase => &self.edge_case,
            TestType::Performance => &self.performance,
        }
    }

    pub fn push(&mut self, case: TestCase) {
        let group = match case.test_type {
            TestType::Unit => &mut self.unit,
            TestType::Integration => &mut self.integration,
            TestType::ErrorHandling => &mut self.error_handling,
            TestType::EdgeCase => &mut self.edge_case,
            TestType::Performance => &mut self.performance,
        };
        group.push(case);
    }

    /// All tests, grouped in [`TestType::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> + Clone {
        TestType::ALL.into_iter().flat_map(move |t| self.get(t).iter())
    }

    pub fn len(&self) -> usize {
        TestType::ALL.iter().map(|t| self.get(*t).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Suite-level counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total_tests: usize,
    pub by_type: Vec<(TestType, usize)>,
    pub ai_generated: usize,
    pub template_generated: usize,
    pub targets: usize,
    pub files: usize,
    /// Targets whose generator call failed and fell back to templates.
    pub generator_failures: usize,
    /// The run was cancelled before every target finished.
    pub cancelled: bool,
}

/// A synthesized test suite for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: String,
    pub analysis_id: String,
    pub language: Language,
    pub framework: Framework,
    pub tests: TestGroups,
    pub files: Vec<GeneratedFile>,
    pub summary: SuiteSummary,
    pub created_at: DateTime<Utc>,
}

impl TestSuite {
    pub fn total(&self) -> usize {
        self.tests.len()
    }

    pub fn count(&self, test_type: TestType) -> usize {
        self.tests.get(test_type).len()
    }
}

/// Synthesis tuning.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Generator calls in flight at once.
    pub concurrency: usize,
    pub target_timeout: Duration,
    pub fan_out: FanOut,
    pub throw_threshold: u32,
    pub generate: GenerateOptions,
    /// Per-language framework overrides.
    pub frameworks: HashMap<Language, Framework>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            target_timeout: Duration::from_secs(30),
            fan_out: FanOut::default(),
            throw_threshold: DEFAULT_THROW_THRESHOLD,
            generate: GenerateOptions::default(),
            frameworks: HashMap::new(),
        }
    }
}

/// Builds test suites from completed analyses.
pub struct TestSynthesizer {
    generator: Arc<dyn TestBodyGenerator>,
    options: SynthesisOptions,
}

impl TestSynthesizer {
    pub fn new(generator: Arc<dyn TestBodyGenerator>, options: SynthesisOptions) -> Self {
        Self { generator, options }
    }

    /// Template-only synthesizer.
    pub fn templates_only() -> Self {
        Self::new(Arc::new(DisabledGenerator), SynthesisOptions::default())
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Framework for a run: explicit request, then configured override,
    /// then the language default.
    pub fn framework_for(
        &self,
        requested: Option<Framework>,
        language: Language,
    ) -> Result<Framework, PipelineError> {
        let requested = requested.or_else(|| self.options.frameworks.get(&language).copied());
        Ok(Framework::resolve(requested, language)?)
    }

    /// Synthesize a suite for `analysis`, whose source text is `source`.
    pub async fn synthesize(
        &self,
        analysis: &AnalysisResult,
        source: &str,
        ctx: &PipelineContext,
    ) -> Result<TestSuite, PipelineError> {
        if !analysis.is_completed() {
            return Err(PipelineError::AnalysisNotCompleted {
                id: analysis.id.clone(),
                reason: format!("status is {}", analysis.status.as_str()),
            });
        }
        let language = analysis.language;
        let framework = self.framework_for(ctx.framework, language)?;
        let module = module_name(analysis.filename.as_deref());
        let targets = designate_targets(&analysis.structure, &self.options.fan_out);
        info!(
            analysis = %analysis.id,
            targets = targets.len(),
            framework = %framework,
            "synthesizing tests"
        );

        let mut outcomes = stream::iter(targets.iter())
            .map(|target| {
                let snippet = target.snippet(source);
                async move {
                    let result = self.request_generated(target, &snippet, language, framework, ctx).await;
                    (target, result)
                }
            })
            .buffered(self.options.concurrency.max(1));

        let mut seen: HashSet<(String, TestType)> = HashSet::new();
        let mut per_target: Vec<(&Target, Vec<TestCase>)> = Vec::new();
        let mut summary = SuiteSummary::default();
        let mut next_id = 1usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    warn!(analysis = %analysis.id, done = per_target.len(), "synthesis cancelled");
                    summary.cancelled = true;
                    break;
                }
                next = outcomes.next() => next,
            };
            let Some((target, generated)) = next else {
                break;
            };

            let generated = match generated {
                Ok(tests) => tests,
                Err(SynthesisError::Disabled) => Vec::new(),
                Err(e) => {
                    warn!(label = %target.label(), error = %e, "generator failed, using templates");
                    summary.generator_failures += 1;
                    Vec::new()
                }
            };
            let templates = template_tests(target, language, framework, self.options.throw_threshold);

            let mut merged = Vec::new();
            for mut case in generated.into_iter().chain(templates) {
                if !seen.insert((case.name.clone(), case.test_type)) {
                    continue;
                }
                case.id = format!("tc-{:04}", next_id);
                next_id += 1;
                merged.push(case);
            }
            per_target.push((target, merged));
        }

        let mut tests = TestGroups::default();
        let mut files = Vec::new();
        for (target, cases) in per_target.iter().filter(|(_, cases)| !cases.is_empty()) {
            files.push(framework.render_file(
                language,
                &module,
                &target.label(),
                &target.file_stem(),
                &[target.import_symbol().to_string()],
                cases,
            ));
        }
        for (_, cases) in per_target {
            for case in cases {
                match case.source {
                    TestSource::Ai => summary.ai_generated += 1,
                    TestSource::Template => summary.template_generated += 1,
                }
                tests.push(case);
            }
        }

        summary.total_tests = tests.len();
        summary.by_type = TestType::ALL.iter().map(|t| (*t, tests.get(*t).len())).collect();
        summary.targets = targets.len();
        summary.files = files.len();
        debug!(tests = summary.total_tests, files = summary.files, "suite assembled");

        Ok(TestSuite {
            id: Uuid::new_v4().to_string(),
            analysis_id: analysis.id.clone(),
            language,
            framework,
            tests,
            files,
            summary,
            created_at: Utc::now(),
        })
    }

    async fn request_generated(
        &self,
        target: &Target,
        snippet: &str,
        language: Language,
        framework: Framework,
        ctx: &PipelineContext,
    ) -> Result<Vec<TestCase>, SynthesisError> {
        if !self.generator.is_enabled() {
            return Err(SynthesisError::Disabled);
        }
        ctx.limiter.try_acquire()?;

        let metadata = target.metadata();
        let call = self
            .generator
            .generate(snippet, language, framework, &metadata, &self.options.generate);
        match tokio::time::timeout(self.options.target_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SynthesisError::Timeout(self.options.target_timeout)),
        }
    }
}

/// Module name used in import blocks.
fn module_name(filename: Option<&str>) -> String {
    filename
        .and_then(|f| Path::new(f).file_stem())
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("module")
        .to_string()
}
