//! Integration tests for simulated coverage, gaps and grading.

use testsynth::analysis::find_branch_points;
use testsynth::coverage::{
    calculate_grade, covered_branches, weights, CoverageMetric, CoverageReport, CoverageSimulator,
    GapSeverity, Priority,
};
use testsynth::synthesis::{TestGroups, TestSource};
use testsynth::{AnalysisResult, AnalyzeRequest, Language, Pipeline, PipelineError, TestCase, TestSuite, TestType};

/// `risky` has complexity 6 (five `if`s), `simple` has complexity 1.
const RISKY_JS: &str = r#"export function risky(a, b) {
  if (a > 1) { a -= 1; }
  if (a > 2) { a -= 2; }
  if (b > 1) { b -= 1; }
  if (b > 2) { b -= 2; }
  if (a === b) { return 0; }
  return a + b;
}

export function simple(x) {
  return x * 2;
}
"#;

fn case(name: &str, target: &str, test_type: TestType) -> TestCase {
    TestCase {
        id: String::new(),
        name: name.to_string(),
        test_type,
        target: target.to_string(),
        framework: "jest".to_string(),
        body: String::new(),
        source: TestSource::Template,
    }
}

async fn analyzed_suite(source: &str) -> (AnalysisResult, TestSuite) {
    let pipeline = Pipeline::in_memory();
    let ctx = pipeline.context();
    let analysis = pipeline
        .analyze(AnalyzeRequest {
            source: source.to_string(),
            language: Some("javascript".to_string()),
            filename: Some("risky.js".to_string()),
            caller: "integration".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let suite = pipeline.generate(&analysis, source, &ctx).await.unwrap();
    (analysis, suite)
}

fn with_tests(mut suite: TestSuite, tests: Vec<TestCase>) -> TestSuite {
    let mut groups = TestGroups::default();
    for test in tests {
        groups.push(test);
    }
    suite.tests = groups;
    suite
}

fn assert_well_formed(report: &CoverageReport) {
    for metric in [&report.line, &report.branch, &report.function, &report.statement] {
        assert!((0.0..=100.0).contains(&metric.percentage), "{:?}", metric);
        assert!(metric.covered <= metric.total);
    }
    let expected = weights::LINE * report.line.percentage
        + weights::BRANCH * report.branch.percentage
        + weights::FUNCTION * report.function.percentage
        + weights::STATEMENT * report.statement.percentage;
    assert!(
        (report.overall_score - expected).abs() < 0.01,
        "score {} != weighted sum {}",
        report.overall_score,
        expected
    );
    assert_eq!(report.grade, calculate_grade(report.overall_score));
}

#[tokio::test]
async fn test_untested_complex_function_is_critical() {
    let (analysis, suite) = analyzed_suite(RISKY_JS).await;
    let risky = analysis.structure.functions.iter().find(|f| f.name == "risky").unwrap();
    assert_eq!(risky.complexity, 6);

    let suite = with_tests(
        suite,
        vec![case("simple returns a result for valid input", "simple", TestType::Unit)],
    );
    let report = CoverageSimulator::default().simulate(&analysis, &suite, RISKY_JS).unwrap();
    assert_well_formed(&report);

    let critical: Vec<_> = report
        .gaps
        .iter()
        .filter(|g| g.severity == GapSeverity::Critical)
        .collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].function.as_deref(), Some("risky"));
    assert_eq!(critical[0].complexity, Some(6));
    // reported once, not again as a minor gap
    assert!(report
        .gaps
        .iter()
        .filter(|g| g.function.as_deref() == Some("risky"))
        .all(|g| g.severity == GapSeverity::Critical));

    assert_eq!(report.uncovered_functions, vec!["risky".to_string()]);
    assert_eq!(report.function.covered, 1);
    assert_eq!(report.recommendations[0].priority, Priority::High);
    assert_eq!(report.critical_gaps(), 1);
}

#[tokio::test]
async fn test_error_handling_test_clears_minor_gap() {
    let (analysis, suite) = analyzed_suite(RISKY_JS).await;
    let suite = with_tests(
        suite,
        vec![
            case("risky returns a result for valid input", "risky", TestType::Unit),
            case("risky throws on error path", "risky", TestType::ErrorHandling),
            case("simple returns a result for valid input", "simple", TestType::Unit),
        ],
    );
    let report = CoverageSimulator::default().simulate(&analysis, &suite, RISKY_JS).unwrap();
    assert_well_formed(&report);

    assert!(report
        .gaps
        .iter()
        .all(|g| g.severity != GapSeverity::Critical && g.severity != GapSeverity::Minor));
    assert_eq!(report.function.percentage, 100.0);
    assert!(report.uncovered_functions.is_empty());
}

#[tokio::test]
async fn test_low_branch_coverage_is_a_major_gap() {
    let (analysis, suite) = analyzed_suite(RISKY_JS).await;
    // unit tests alone reach 60% of branches
    let suite = with_tests(
        suite,
        vec![
            case("risky returns a result for valid input", "risky", TestType::Unit),
            case("simple returns a result for valid input", "simple", TestType::Unit),
        ],
    );
    let report = CoverageSimulator::default().simulate(&analysis, &suite, RISKY_JS).unwrap();
    assert!(report.branch.percentage < 70.0);
    let major: Vec<_> = report
        .gaps
        .iter()
        .filter(|g| g.severity == GapSeverity::Major)
        .collect();
    assert_eq!(major.len(), 1);
    assert!(major[0].function.is_none());
}

#[test]
fn test_branch_union_over_ten_branches() {
    let source = (0..10)
        .map(|i| format!("if (x === {}) {{ y(); }}", i))
        .collect::<Vec<_>>()
        .join("\n");
    let branches = find_branch_points(&source, Language::JavaScript);
    assert_eq!(branches.len(), 10);

    let mut tests = TestGroups::default();
    for i in 0..3 {
        tests.push(case(&format!("case {}", i), "f", TestType::Unit));
    }
    tests.push(case("boundary", "f", TestType::EdgeCase));
    assert_eq!(covered_branches(&branches, &tests).len(), 9);

    // ids are stable across calls
    let again = find_branch_points(&source, Language::JavaScript);
    let ids: Vec<_> = branches.iter().map(|b| b.id.clone()).collect();
    let ids_again: Vec<_> = again.iter().map(|b| b.id.clone()).collect();
    assert_eq!(ids, ids_again);
}

#[tokio::test]
async fn test_seeded_simulation_is_reproducible() {
    let (analysis, suite) = analyzed_suite(RISKY_JS).await;

    let a = CoverageSimulator::default().with_seed(7).simulate(&analysis, &suite, RISKY_JS).unwrap();
    let b = CoverageSimulator::default().with_seed(7).simulate(&analysis, &suite, RISKY_JS).unwrap();
    assert_eq!(a.seed, 7);
    assert_eq!(a.statement, b.statement);
    assert_eq!(a.line, b.line);
    assert_eq!(a.overall_score, b.overall_score);

    let derived = CoverageSimulator::default().simulate(&analysis, &suite, RISKY_JS).unwrap();
    let derived_again = CoverageSimulator::default().simulate(&analysis, &suite, RISKY_JS).unwrap();
    assert_eq!(derived.seed, derived_again.seed);
    assert_well_formed(&derived);
}

#[tokio::test]
async fn test_empty_suite_scores_statements_zero() {
    let (analysis, suite) = analyzed_suite(RISKY_JS).await;
    let suite = with_tests(suite, Vec::new());
    let report = CoverageSimulator::default().simulate(&analysis, &suite, RISKY_JS).unwrap();

    assert_well_formed(&report);
    assert_eq!(report.statement.covered, 0);
    assert_eq!(report.line.covered, 0);
    assert_eq!(report.function.covered, 0);
    assert_eq!(report.grade, "F");
    assert!(report.is_failing());
}

#[tokio::test]
async fn test_suite_must_belong_to_the_analysis() {
    let (analysis, suite) = analyzed_suite(RISKY_JS).await;
    let (other, _) = analyzed_suite("function other(x) { return x; }\n").await;

    let result = CoverageSimulator::default().simulate(&other, &suite, RISKY_JS);
    assert!(matches!(result, Err(PipelineError::SuiteMismatch(_, _))));
    assert!(CoverageSimulator::default().simulate(&analysis, &suite, RISKY_JS).is_ok());
}

#[test]
fn test_metric_and_grade_boundaries() {
    assert_eq!(CoverageMetric::new(0, 0).percentage, 100.0);
    assert_eq!(CoverageMetric::new(8, 2).percentage, 25.0);
    assert_eq!(calculate_grade(95.0), "A+");
    assert_eq!(calculate_grade(94.99), "A");
    assert_eq!(calculate_grade(60.0), "D");
    assert_eq!(calculate_grade(59.9), "F");
}
