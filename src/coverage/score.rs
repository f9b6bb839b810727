//! Overall coverage score and letter grade.
//!
//! The overall score (0-100) is a weighted sum of the four simulated
//! percentages; the grade bands it.

use serde::{Deserialize, Serialize};

use super::CoverageMetric;

/// Weight of each metric in the overall score.
pub mod weights {
    pub const LINE: f64 = 0.4;
    pub const BRANCH: f64 = 0.25;
    pub const FUNCTION: f64 = 0.2;
    pub const STATEMENT: f64 = 0.15;
}

/// Minimum score for each grade.
pub mod grades {
    pub const A_PLUS_MIN: f64 = 95.0;
    pub const A_MIN: f64 = 90.0;
    pub const B_PLUS_MIN: f64 = 85.0;
    pub const B_MIN: f64 = 80.0;
    pub const C_PLUS_MIN: f64 = 75.0;
    pub const C_MIN: f64 = 70.0;
    pub const D_PLUS_MIN: f64 = 65.0;
    pub const D_MIN: f64 = 60.0;
}

/// Weighted score with its per-metric contributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageScore {
    /// 0-100, higher is better
    pub score: f64,
    /// "A+" (>= 95) down to "F" (< 60)
    pub grade: String,
    pub line: f64,
    pub branch: f64,
    pub function: f64,
    pub statement: f64,
}

impl CoverageScore {
    pub fn is_failing(&self) -> bool {
        self.grade == "F"
    }
}

/// Determine the letter grade from a score.
pub fn calculate_grade(score: f64) -> String {
    match score {
        s if s >= grades::A_PLUS_MIN => "A+",
        s if s >= grades::A_MIN => "A",
        s if s >= grades::B_PLUS_MIN => "B+",
        s if s >= grades::B_MIN => "B",
        s if s >= grades::C_PLUS_MIN => "C+",
        s if s >= grades::C_MIN => "C",
        s if s >= grades::D_PLUS_MIN => "D+",
        s if s >= grades::D_MIN => "D",
        _ => "F",
    }
    .to_string()
}

/// Weighted sum of the four percentages.
pub fn calculate(
    line: &CoverageMetric,
    branch: &CoverageMetric,
    function: &CoverageMetric,
    statement: &CoverageMetric,
) -> CoverageScore {
    let line = weights::LINE * line.percentage;
    let branch = weights::BRANCH * branch.percentage;
    let function = weights::FUNCTION * function.percentage;
    let statement = weights::STATEMENT * statement.percentage;
    let score = (line + branch + function + statement).clamp(0.0, 100.0);

    CoverageScore {
        score,
        grade: calculate_grade(score),
        line,
        branch,
        function,
        statement,
    }
}
