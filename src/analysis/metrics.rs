//! Size, complexity and maintainability metrics.
//!
//! Line counts come from the masked-source line classifier, so comment
//! detection follows the same per-language comment table the extractors
//! use. Complexity figures are derived from the extracted structure.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::facts::ModuleStructure;
use super::patterns::{classify_lines, count_decision_points, count_lines, mask_non_code, LineKind};
use crate::language::Language;

/// Upper bound of the maintainability index.
pub const MAX_MAINTAINABILITY: f64 = 171.0;

/// Maintainability index band boundaries (exclusive upper bounds).
pub mod bands {
    pub const E_BELOW: f64 = 10.0;
    pub const D_BELOW: f64 = 20.0;
    pub const C_BELOW: f64 = 50.0;
    pub const B_BELOW: f64 = 85.0;
}

/// Technical debt rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DebtGrade {
    A,
    B,
    C,
    D,
    E,
}

impl DebtGrade {
    /// Band for a maintainability index.
    pub fn from_index(index: f64) -> Self {
        match index {
            i if i < bands::E_BELOW => DebtGrade::E,
            i if i < bands::D_BELOW => DebtGrade::D,
            i if i < bands::C_BELOW => DebtGrade::C,
            i if i < bands::B_BELOW => DebtGrade::B,
            _ => DebtGrade::A,
        }
    }

    /// Estimated remediation hours per cyclomatic complexity point.
    pub fn hours_per_point(&self) -> f64 {
        match self {
            DebtGrade::E => 2.0,
            DebtGrade::D => 1.5,
            DebtGrade::C => 1.0,
            DebtGrade::B => 0.5,
            DebtGrade::A => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DebtGrade::A => "A",
            DebtGrade::B => "B",
            DebtGrade::C => "C",
            DebtGrade::D => "D",
            DebtGrade::E => "E",
        }
    }
}

impl fmt::Display for DebtGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technical debt estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalDebt {
    pub rating: DebtGrade,
    pub hours: f64,
}

/// Metrics for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub lines_of_code: usize,
    pub logical_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    /// Module-level cyclomatic complexity: 1 + every decision point.
    pub cyclomatic_complexity: u32,
    /// Sum of per-function complexities, at least 1.
    pub cognitive_complexity: u32,
    /// In `[0, 171]`.
    pub maintainability_index: f64,
    pub technical_debt: TechnicalDebt,
}

impl Default for CodeMetrics {
    fn default() -> Self {
        Self {
            lines_of_code: 0,
            logical_lines: 0,
            comment_lines: 0,
            blank_lines: 0,
            cyclomatic_complexity: 1,
            cognitive_complexity: 1,
            maintainability_index: MAX_MAINTAINABILITY,
            technical_debt: TechnicalDebt {
                rating: DebtGrade::A,
                hours: 0.0,
            },
        }
    }
}

/// Compute metrics for `source` given its extracted structure.
pub fn compute_metrics(language: Language, source: &str, structure: &ModuleStructure) -> CodeMetrics {
    let kinds = classify_lines(source, language);
    let count = |kind: LineKind| kinds.iter().filter(|k| **k == kind).count();

    let lines_of_code = count_lines(source);
    let masked = mask_non_code(source, language);
    let cyclomatic_complexity = count_decision_points(&masked, language).saturating_add(1);

    let cognitive_complexity = structure
        .callables()
        .map(|f| f.complexity)
        .fold(0u32, u32::saturating_add)
        .max(1);

    let maintainability_index =
        maintainability_index(source.chars().count(), cyclomatic_complexity, lines_of_code);
    let rating = DebtGrade::from_index(maintainability_index);

    CodeMetrics {
        lines_of_code,
        logical_lines: count(LineKind::Code),
        comment_lines: count(LineKind::Comment),
        blank_lines: count(LineKind::Blank),
        cyclomatic_complexity,
        cognitive_complexity,
        maintainability_index,
        technical_debt: TechnicalDebt {
            rating,
            hours: (rating.hours_per_point() * f64::from(cyclomatic_complexity)).round(),
        },
    }
}

/// `171 - 5.2 ln(len + 1) - 0.23 cc - 16.2 ln(loc + 1)`, clamped to `[0, 171]`.
pub fn maintainability_index(source_len: usize, cyclomatic: u32, lines_of_code: usize) -> f64 {
    let raw = MAX_MAINTAINABILITY
        - 5.2 * ((source_len as f64) + 1.0).ln()
        - 0.23 * f64::from(cyclomatic)
        - 16.2 * ((lines_of_code as f64) + 1.0).ln();
    raw.clamp(0.0, MAX_MAINTAINABILITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FunctionInfo;

    #[test]
    fn test_line_counts() {
        let src = "// add two numbers\nfunction add(a, b) {\n\n  return a + b;\n}\n";
        let metrics = compute_metrics(Language::JavaScript, src, &ModuleStructure::default());
        assert_eq!(metrics.lines_of_code, 5);
        assert_eq!(metrics.comment_lines, 1);
        assert_eq!(metrics.blank_lines, 1);
        assert_eq!(metrics.logical_lines, 3);
    }

    #[test]
    fn test_cognitive_is_sum_of_functions() {
        let mut structure = ModuleStructure::default();
        let mut a = FunctionInfo::new("a", 1, 2);
        a.complexity = 3;
        structure.functions.push(a);
        structure.functions.push(FunctionInfo::new("b", 3, 4));
        let metrics = compute_metrics(Language::Python, "x = 1\n", &structure);
        assert_eq!(metrics.cognitive_complexity, 4);

        let empty = compute_metrics(Language::Python, "x = 1\n", &ModuleStructure::default());
        assert_eq!(empty.cognitive_complexity, 1, "floored at 1");
    }

    #[test]
    fn test_cyclomatic_counts_decisions() {
        let src = "if a and b:\n    pass\nelif c:\n    pass\n";
        let metrics = compute_metrics(Language::Python, src, &ModuleStructure::default());
        assert_eq!(metrics.cyclomatic_complexity, 4);
    }

    #[test]
    fn test_maintainability_is_clamped() {
        assert_eq!(maintainability_index(0, 1, 0), 171.0 - 0.23);
        assert_eq!(maintainability_index(10_000_000, 5_000, 1_000_000), 0.0);
        let mid = maintainability_index(400, 5, 20);
        assert!(mid > 0.0 && mid < MAX_MAINTAINABILITY);
    }

    #[test]
    fn test_debt_bands() {
        assert_eq!(DebtGrade::from_index(0.0), DebtGrade::E);
        assert_eq!(DebtGrade::from_index(9.99), DebtGrade::E);
        assert_eq!(DebtGrade::from_index(10.0), DebtGrade::D);
        assert_eq!(DebtGrade::from_index(49.9), DebtGrade::C);
        assert_eq!(DebtGrade::from_index(50.0), DebtGrade::B);
        assert_eq!(DebtGrade::from_index(85.0), DebtGrade::A);
    }

    #[test]
    fn test_debt_hours_scale_with_complexity() {
        // Long, branchy source lands in a low band.
        let body = "if (a) { b(); }\n".repeat(400);
        let metrics = compute_metrics(Language::Java, &body, &ModuleStructure::default());
        let debt = metrics.technical_debt;
        assert_ne!(debt.rating, DebtGrade::A);
        let expected = (debt.rating.hours_per_point() * f64::from(metrics.cyclomatic_complexity)).round();
        assert_eq!(debt.hours, expected);
    }
}
