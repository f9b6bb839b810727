//! Coverage simulation.
//!
//! Estimates how much of a source file a test suite would exercise without
//! running anything. Every number in a [`CoverageReport`] is a heuristic
//! estimate and the report says so (`simulated: true`).
//!
//! Randomized parts (error-path lines, statements) draw from a seeded
//! generator. The seed is either configured or derived from the analysis
//! content hash and the suite's test names, so identical inputs always
//! give identical reports.

mod gaps;
mod score;

pub use gaps::{
    classify_gaps, recommend, CoverageGap, GapSeverity, Level, Priority, Recommendation,
    CRITICAL_COMPLEXITY, MAJOR_BRANCH_PERCENT, MINOR_COMPLEXITY,
};
pub use score::{calculate as calculate_score, calculate_grade, grades, weights, CoverageScore};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::analysis::{classify_lines, find_branch_points, is_declaration_only, mask_non_code, BranchPoint, LineKind};
use crate::error::PipelineError;
use crate::language::Language;
use crate::orchestrator::AnalysisResult;
use crate::synthesis::{TestCase, TestGroups, TestSuite, TestType};

/// Share of branches each test category is assumed to reach.
pub mod branch_rates {
    pub const UNIT: f64 = 0.6;
    pub const ERROR_HANDLING: f64 = 0.8;
    pub const INTEGRATION: f64 = 0.7;
    pub const EDGE_CASE: f64 = 0.9;
}

/// Statement coverage probability parameters.
pub mod statement_rates {
    pub const BASE: f64 = 0.4;
    pub const PER_TEST: f64 = 0.05;
    pub const MAX: f64 = 0.9;

    pub const CONDITIONAL: f64 = 0.8;
    pub const LOOP: f64 = 0.7;
    pub const THROW: f64 = 0.6;
    pub const CATCH: f64 = 0.5;
}

/// Default share of a target's lines an error-handling test reaches.
pub const DEFAULT_ERROR_PATH_LINE_RATE: f64 = 0.5;

/// Covered out of total. An empty total counts as fully covered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetric {
    pub total: usize,
    pub covered: usize,
    pub percentage: f64,
}

impl CoverageMetric {
    pub fn new(total: usize, covered: usize) -> Self {
        let covered = covered.min(total);
        let percentage = if total == 0 {
            100.0
        } else {
            covered as f64 / total as f64 * 100.0
        };
        Self {
            total,
            covered,
            percentage,
        }
    }
}

/// Simulated coverage for one suite against one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub id: String,
    pub suite_id: String,
    pub analysis_id: String,
    /// Always true: nothing was executed.
    pub simulated: bool,
    pub line: CoverageMetric,
    pub branch: CoverageMetric,
    pub function: CoverageMetric,
    pub statement: CoverageMetric,
    pub overall_score: f64,
    pub grade: String,
    pub gaps: Vec<CoverageGap>,
    pub recommendations: Vec<Recommendation>,
    pub uncovered_functions: Vec<String>,
    /// Seed used for the randomized parts.
    pub seed: u64,
    pub created_at: DateTime<Utc>,
}

impl CoverageReport {
    pub fn critical_gaps(&self) -> usize {
        self.gaps
            .iter()
            .filter(|g| g.severity == GapSeverity::Critical)
            .count()
    }

    pub fn is_failing(&self) -> bool {
        self.grade == "F"
    }
}

/// Whether a test is associated with a function: its declared target
/// matches exactly, or its name mentions the function (case-insensitive).
pub fn exercises(test: &TestCase, function: &str) -> bool {
    test.target == function || test.name.to_lowercase().contains(&function.to_lowercase())
}

/// Branch ids covered by the suite's test categories.
///
/// Each category present covers the first `floor(n * rate)` branches; the
/// result is the union over categories.
pub fn covered_branches<'a>(branches: &'a [BranchPoint], tests: &TestGroups) -> BTreeSet<&'a str> {
    let categories = [
        (TestType::Unit, branch_rates::UNIT),
        (TestType::ErrorHandling, branch_rates::ERROR_HANDLING),
        (TestType::Integration, branch_rates::INTEGRATION),
        (TestType::EdgeCase, branch_rates::EDGE_CASE),
    ];
    let mut covered = BTreeSet::new();
    for (test_type, rate) in categories {
        if tests.get(test_type).is_empty() {
            continue;
        }
        let take = (branches.len() as f64 * rate).floor() as usize;
        covered.extend(branches.iter().take(take).map(|b| b.id.as_str()));
    }
    covered
}

/// Probability that a statement is covered, for `test_count` tests.
pub fn statement_probability(test_count: usize, line: &str) -> f64 {
    if test_count == 0 {
        return 0.0;
    }
    let base = (statement_rates::BASE + statement_rates::PER_TEST * test_count as f64).min(statement_rates::MAX);
    base * statement_multiplier(line)
}

lazy_static! {
    static ref CATCH_STATEMENT: Regex =
        Regex::new(r"\b(?:catch|except|finally)\b").expect("catch pattern is valid");
    static ref THROW_STATEMENT: Regex = Regex::new(r"\b(?:throw|raise)\b").expect("throw pattern is valid");
    static ref LOOP_STATEMENT: Regex =
        Regex::new(r"\b(?:for|foreach|while|do)\b").expect("loop pattern is valid");
    static ref CONDITIONAL_STATEMENT: Regex =
        Regex::new(r"\b(?:if|elif|else|switch|case)\b|\s\?\s").expect("conditional pattern is valid");
}

fn statement_multiplier(line: &str) -> f64 {
    if CATCH_STATEMENT.is_match(line) {
        statement_rates::CATCH
    } else if THROW_STATEMENT.is_match(line) {
        statement_rates::THROW
    } else if LOOP_STATEMENT.is_match(line) {
        statement_rates::LOOP
    } else if CONDITIONAL_STATEMENT.is_match(line) {
        statement_rates::CONDITIONAL
    } else {
        1.0
    }
}

/// 1-based line numbers of statements: code lines ending in the language's
/// terminator. Python has none, so its statements are code lines that do
/// not open a block.
pub fn statement_lines(source: &str, language: Language) -> Vec<usize> {
    let masked = mask_non_code(source, language);
    masked
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim_end();
            if line.trim().is_empty() || is_declaration_only(line) {
                return None;
            }
            let is_statement = match language.statement_terminator() {
                Some(terminator) => line.ends_with(terminator),
                None => !line.ends_with(':'),
            };
            is_statement.then_some(i + 1)
        })
        .collect()
}

/// 1-based line numbers that count toward line coverage.
pub fn executable_lines(source: &str, language: Language) -> Vec<usize> {
    classify_lines(source, language)
        .into_iter()
        .zip(source.lines())
        .enumerate()
        .filter(|(_, (kind, text))| *kind == LineKind::Code && !is_declaration_only(text))
        .map(|(i, _)| i + 1)
        .collect()
}

/// Seed derived from the content hash and the test names.
pub fn derive_seed(content_hash: &str, tests: &TestGroups) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(content_hash.as_bytes());
    for test in tests.iter() {
        hasher.update([b'\n']);
        hasher.update(test.name.as_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Produces [`CoverageReport`]s.
#[derive(Debug, Clone)]
pub struct CoverageSimulator {
    error_path_line_rate: f64,
    seed: Option<u64>,
}

impl Default for CoverageSimulator {
    fn default() -> Self {
        Self {
            error_path_line_rate: DEFAULT_ERROR_PATH_LINE_RATE,
            seed: None,
        }
    }
}

impl CoverageSimulator {
    pub fn new(error_path_line_rate: f64, seed: Option<u64>) -> Self {
        Self {
            error_path_line_rate: error_path_line_rate.clamp(0.0, 1.0),
            seed,
        }
    }

    /// Same simulator with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Simulate coverage of `source` (the analyzed text) by `suite`.
    pub fn simulate(
        &self,
        analysis: &AnalysisResult,
        suite: &TestSuite,
        source: &str,
    ) -> Result<CoverageReport, PipelineError> {
        if !analysis.is_completed() {
            return Err(PipelineError::AnalysisNotCompleted {
                id: analysis.id.clone(),
                reason: format!("status is {}", analysis.status.as_str()),
            });
        }
        if suite.analysis_id != analysis.id {
            return Err(PipelineError::SuiteMismatch(suite.id.clone(), analysis.id.clone()));
        }

        let language = analysis.language;
        let structure = &analysis.structure;
        let test_count = suite.total();
        let seed = self
            .seed
            .unwrap_or_else(|| derive_seed(&analysis.content_hash, &suite.tests));
        let mut rng = StdRng::seed_from_u64(seed);

        // Lines: unit-tested targets cover their whole range, error-handling
        // tests cover a sampled share of it.
        let executable = executable_lines(source, language);
        let mut covered_lines = BTreeSet::new();
        let mut uncovered_functions = Vec::new();
        let mut covered_functions = 0usize;
        for func in structure.callables() {
            let related: Vec<&TestCase> = suite.tests.iter().filter(|t| exercises(t, &func.name)).collect();
            if related.is_empty() {
                uncovered_functions.push(func.name.clone());
                continue;
            }
            covered_functions += 1;

            let in_range = executable.iter().copied().filter(|l| func.contains_line(*l));
            if related.iter().any(|t| t.test_type == TestType::Unit) {
                covered_lines.extend(in_range);
            } else if related.iter().any(|t| t.test_type == TestType::ErrorHandling) {
                for line in in_range {
                    if rng.gen::<f64>() < self.error_path_line_rate {
                        covered_lines.insert(line);
                    }
                }
            }
        }
        let line = CoverageMetric::new(executable.len(), covered_lines.len());

        let branches = find_branch_points(source, language);
        let branch = CoverageMetric::new(branches.len(), covered_branches(&branches, &suite.tests).len());

        let function = CoverageMetric::new(structure.callable_count(), covered_functions);

        let source_lines: Vec<&str> = source.lines().collect();
        let statements = statement_lines(source, language);
        let mut covered_statements = 0usize;
        for number in &statements {
            let text = source_lines.get(number - 1).copied().unwrap_or("");
            let probability = statement_probability(test_count, text);
            if probability > 0.0 && rng.gen::<f64>() < probability {
                covered_statements += 1;
            }
        }
        let statement = CoverageMetric::new(statements.len(), covered_statements);

        let score = calculate_score(&line, &branch, &function, &statement);
        let gaps = classify_gaps(structure, suite.tests.iter(), branch.percentage);
        let recommendations = recommend(&gaps);

        debug!(
            analysis = %analysis.id,
            suite = %suite.id,
            seed,
            score = score.score,
            gaps = gaps.len(),
            "coverage simulated"
        );

        Ok(CoverageReport {
            id: Uuid::new_v4().to_string(),
            suite_id: suite.id.clone(),
            analysis_id: analysis.id.clone(),
            simulated: true,
            line,
            branch,
            function,
            statement,
            overall_score: score.score,
            grade: score.grade,
            gaps,
            recommendations,
            uncovered_functions,
            seed,
            created_at: Utc::now(),
        })
    }
}
