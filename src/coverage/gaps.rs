//! Gap classification and recommendations.

use serde::{Deserialize, Serialize};

use super::exercises;
use crate::analysis::{FunctionInfo, ModuleStructure};
use crate::synthesis::{TestCase, TestType};

/// Complexity above which an untested function is a critical gap.
pub const CRITICAL_COMPLEXITY: u32 = 5;

/// Branch coverage percentage below which the module has a major gap.
pub const MAJOR_BRANCH_PERCENT: f64 = 70.0;

/// Complexity above which a function needs an error-handling test.
pub const MINOR_COMPLEXITY: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSeverity {
    Critical,
    Major,
    Minor,
}

impl GapSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapSeverity::Critical => "critical",
            GapSeverity::Major => "major",
            GapSeverity::Minor => "minor",
        }
    }
}

/// A classified coverage deficiency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub severity: GapSeverity,
    /// Function name; `None` for module-wide gaps.
    pub function: Option<String>,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub complexity: Option<u32>,
    pub message: String,
}

impl CoverageGap {
    fn for_function(severity: GapSeverity, func: &FunctionInfo, message: String) -> Self {
        Self {
            severity,
            function: Some(func.name.clone()),
            start_line: Some(func.start_line),
            end_line: Some(func.end_line),
            complexity: Some(func.complexity),
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

/// Suggested remediation for one gap category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: GapSeverity,
    pub priority: Priority,
    pub effort: Level,
    pub impact: Level,
    pub action: String,
    pub functions: Vec<String>,
}

/// Classify gaps for a module given its tests and branch coverage.
///
/// A function already reported as critical is not reported again as minor.
pub fn classify_gaps<'a>(
    structure: &ModuleStructure,
    tests: impl Iterator<Item = &'a TestCase> + Clone,
    branch_percent: f64,
) -> Vec<CoverageGap> {
    let mut gaps = Vec::new();

    for func in structure.callables() {
        let mut related = tests.clone().filter(|t| exercises(t, &func.name)).peekable();
        if related.peek().is_none() && func.complexity > CRITICAL_COMPLEXITY {
            gaps.push(CoverageGap::for_function(
                GapSeverity::Critical,
                func,
                format!("{} has complexity {} and no tests", func.name, func.complexity),
            ));
            continue;
        }
        if func.complexity > MINOR_COMPLEXITY && !related.any(|t| t.test_type == TestType::ErrorHandling) {
            gaps.push(CoverageGap::for_function(
                GapSeverity::Minor,
                func,
                format!(
                    "{} has complexity {} but no error-handling test",
                    func.name, func.complexity
                ),
            ));
        }
    }

    if branch_percent < MAJOR_BRANCH_PERCENT {
        gaps.push(CoverageGap {
            severity: GapSeverity::Major,
            function: None,
            start_line: None,
            end_line: None,
            complexity: None,
            message: format!(
                "branch coverage is {:.1}%, below {:.0}%",
                branch_percent, MAJOR_BRANCH_PERCENT
            ),
        });
    }

    gaps.sort_by_key(|g| g.severity);
    gaps
}

/// One recommendation per gap category present, most urgent first.
pub fn recommend(gaps: &[CoverageGap]) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    for severity in [GapSeverity::Critical, GapSeverity::Major, GapSeverity::Minor] {
        let matching: Vec<&CoverageGap> = gaps.iter().filter(|g| g.severity == severity).collect();
        if matching.is_empty() {
            continue;
        }
        let functions: Vec<String> = matching.iter().filter_map(|g| g.function.clone()).collect();
        let recommendation = match severity {
            GapSeverity::Critical => Recommendation {
                severity,
                priority: Priority::High,
                effort: Level::Medium,
                impact: Level::High,
                action: format!(
                    "Add unit tests for complex untested functions: {}",
                    functions.join(", ")
                ),
                functions,
            },
            GapSeverity::Major => Recommendation {
                severity,
                priority: Priority::Medium,
                effort: Level::Medium,
                impact: Level::High,
                action: "Add edge-case tests that drive each conditional both ways".to_string(),
                functions,
            },
            GapSeverity::Minor => Recommendation {
                severity,
                priority: Priority::Low,
                effort: Level::Low,
                impact: Level::Medium,
                action: format!(
                    "Add error-handling tests for: {}",
                    functions.join(", ")
                ),
                functions,
            },
        };
        recommendations.push(recommendation);
    }
    recommendations.sort_by_key(|r| r.priority);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::TestSource;

    fn func(name: &str, complexity: u32) -> FunctionInfo {
        let mut f = FunctionInfo::new(name, 1, 10);
        f.complexity = complexity;
        f
    }

    fn case(target: &str, test_type: TestType) -> TestCase {
        TestCase {
            id: "tc-0001".to_string(),
            name: format!("{} works", target),
            test_type,
            target: target.to_string(),
            framework: "jest".to_string(),
            body: String::new(),
            source: TestSource::Template,
        }
    }

    #[test]
    fn test_untested_complex_function_is_critical() {
        let mut structure = ModuleStructure::default();
        structure.functions.push(func("route", 6));
        let tests: Vec<TestCase> = Vec::new();

        let gaps = classify_gaps(&structure, tests.iter(), 100.0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].severity, GapSeverity::Critical);
        assert_eq!(gaps[0].function.as_deref(), Some("route"));
    }

    #[test]
    fn test_minor_needs_error_handling_test() {
        let mut structure = ModuleStructure::default();
        structure.functions.push(func("parse", 3));
        structure.functions.push(func("load", 3));
        let tests = vec![case("parse", TestType::Unit), case("load", TestType::ErrorHandling)];

        let gaps = classify_gaps(&structure, tests.iter(), 100.0);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].severity, GapSeverity::Minor);
        assert_eq!(gaps[0].function.as_deref(), Some("parse"));
    }

    #[test]
    fn test_low_branch_coverage_is_major() {
        let structure = ModuleStructure::default();
        let tests: Vec<TestCase> = Vec::new();
        let gaps = classify_gaps(&structure, tests.iter(), 69.9);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].severity, GapSeverity::Major);
        assert!(classify_gaps(&structure, tests.iter(), 70.0).is_empty());
    }

    #[test]
    fn test_recommendations_are_ranked() {
        let mut structure = ModuleStructure::default();
        structure.functions.push(func("route", 8));
        structure.functions.push(func("parse", 3));
        let tests = vec![case("parse", TestType::Unit)];
        let gaps = classify_gaps(&structure, tests.iter(), 50.0);
        let recs = recommend(&gaps);

        let order: Vec<_> = recs.iter().map(|r| r.severity).collect();
        assert_eq!(order, vec![GapSeverity::Critical, GapSeverity::Major, GapSeverity::Minor]);
        assert_eq!(recs[0].functions, vec!["route".to_string()]);
        assert_eq!(recs[0].priority, Priority::High);
    }
}
