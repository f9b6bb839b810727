//! Output formatting for testsynth results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the records themselves, for programmatic consumption

use colored::*;
use serde::Serialize;
use std::path::Path;

use crate::analysis::{DebtGrade, Severity};
use crate::coverage::{CoverageMetric, CoverageReport, GapSeverity};
use crate::orchestrator::{AnalysisResult, AnalysisStatus};
use crate::synthesis::{TestSuite, TestType};

/// Heading printed above every coverage report.
pub const SIMULATED_HEADING: &str = "Simulated coverage (heuristic estimate, not measured)";

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Json,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Format::Pretty),
            "json" => Ok(Format::Json),
            other => Err(format!("invalid format {:?}, must be 'pretty' or 'json'", other)),
        }
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// JSON envelope for one processed file.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub path: &'a str,
    pub analysis: &'a AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<&'a TestSuite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<&'a CoverageReport>,
}

impl<'a> JsonReport<'a> {
    pub fn new(path: &'a str, analysis: &'a AnalysisResult) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            path,
            analysis,
            suite: None,
            coverage: None,
        }
    }
}

/// Render reports as pretty JSON: one object, or an array for several.
pub fn render_json(reports: &[JsonReport<'_>]) -> anyhow::Result<String> {
    let json = match reports {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    Ok(json)
}

pub fn write_json(reports: &[JsonReport<'_>]) -> anyhow::Result<()> {
    println!("{}", render_json(reports)?);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

pub fn write_header() {
    println!();
    print!("  ");
    print!("{}", "testsynth".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

/// Analysis summary for one file.
pub fn write_analysis(path: &str, analysis: &AnalysisResult) {
    print!("  {}", "File:     ".dimmed());
    println!("{}", path.blue());
    print!("  {}", "Language: ".dimmed());
    println!("{}", analysis.language.display_name());
    print!("  {}", "Status:   ".dimmed());
    match analysis.status {
        AnalysisStatus::Completed => println!("{}", "completed".green()),
        AnalysisStatus::Failed => println!("{}", "failed".red()),
        other => println!("{}", other.as_str().yellow()),
    }
    println!();

    let m = &analysis.metrics;
    println!(
        "  {} {} total, {} code, {} comment, {} blank",
        "Lines".bold(),
        m.lines_of_code,
        m.logical_lines,
        m.comment_lines,
        m.blank_lines
    );
    println!(
        "  {} cyclomatic {}, cognitive {}",
        "Complexity".bold(),
        m.cyclomatic_complexity,
        m.cognitive_complexity
    );
    print!("  {} {:.1}  Debt: ", "Maintainability".bold(), m.maintainability_index);
    write_debt_grade(m.technical_debt.rating);
    println!(" ({}h)", m.technical_debt.hours);
    println!();

    let structure = &analysis.structure;
    if structure.callable_count() > 0 {
        println!("  {} ({}):", "Functions".bold(), structure.callable_count());
        for func in &structure.functions {
            write_function_line("", &func.name, func.complexity, func.start_line, func.end_line);
        }
        for class in &structure.classes {
            println!(
                "    {} {}",
                class.name.bold(),
                format!(":{}-{}", class.start_line, class.end_line).dimmed()
            );
            for method in &class.methods {
                write_function_line("  ", &method.name, method.complexity, method.start_line, method.end_line);
            }
        }
        println!();
    }

    if !analysis.diagnostics.is_empty() {
        println!("  {} ({}):", "Diagnostics".bold(), analysis.diagnostics.len());
        for d in &analysis.diagnostics {
            let tag = match d.severity {
                Severity::Error => "ERROR".red(),
                Severity::Warning => "WARN ".yellow(),
                Severity::Info => "INFO ".blue(),
            };
            println!("    {} {} {}", tag, format!("{}:{}", d.line, d.column).dimmed(), d.message);
        }
        println!();
    }
}

fn write_function_line(indent: &str, name: &str, complexity: u32, start: usize, end: usize) {
    let cc = complexity.to_string();
    let cc = match complexity {
        c if c <= 3 => cc.green(),
        c if c <= 5 => cc.yellow(),
        _ => cc.red(),
    };
    println!(
        "    {}{:<28} cc {}  {}",
        indent,
        name,
        cc,
        format!(":{}-{}", start, end).dimmed()
    );
}

fn write_debt_grade(grade: DebtGrade) {
    let s = grade.as_str();
    match grade {
        DebtGrade::A => print!("{}", s.green().bold()),
        DebtGrade::B => print!("{}", s.green()),
        DebtGrade::C => print!("{}", s.yellow()),
        DebtGrade::D => print!("{}", s.yellow().bold()),
        DebtGrade::E => print!("{}", s.red()),
    }
}

/// Suite summary, and where files were written if they were.
pub fn write_suite(suite: &TestSuite, out_dir: Option<&Path>) {
    println!(
        "  {} {} tests for {} targets ({})",
        "Tests".bold(),
        suite.total(),
        suite.summary.targets,
        suite.framework
    );
    let counts: Vec<String> = TestType::ALL
        .iter()
        .filter(|t| suite.count(**t) > 0)
        .map(|t| format!("{} {}", suite.count(*t), t))
        .collect();
    if !counts.is_empty() {
        println!("        {}", counts.join(", ").dimmed());
    }
    println!(
        "        {}",
        format!(
            "{} generated, {} from templates",
            suite.summary.ai_generated, suite.summary.template_generated
        )
        .dimmed()
    );
    if suite.summary.generator_failures > 0 {
        println!(
            "        {}",
            format!(
                "{} targets fell back to templates after generator failures",
                suite.summary.generator_failures
            )
            .yellow()
        );
    }
    if suite.summary.cancelled {
        println!("        {}", "cancelled before all targets finished".yellow());
    }
    println!();

    for file in &suite.files {
        let name = match out_dir {
            Some(dir) => dir.join(&file.name).display().to_string(),
            None => file.name.clone(),
        };
        println!("    {} {}", name.blue(), format!("({} tests)", file.test_count).dimmed());
    }
    println!();
}

/// Coverage report, always labelled as simulated.
pub fn write_coverage(report: &CoverageReport) {
    println!("  {}", SIMULATED_HEADING.bold());
    println!();
    write_metric("Line", &report.line);
    write_metric("Branch", &report.branch);
    write_metric("Function", &report.function);
    write_metric("Statement", &report.statement);
    println!();

    print!("  Score: {:.1}  Grade: ", report.overall_score);
    write_colored_grade(&report.grade);
    println!("  {}", format!("(seed {})", report.seed).dimmed());
    println!();

    if !report.gaps.is_empty() {
        println!("  {} ({}):", "Gaps".bold(), report.gaps.len());
        for gap in &report.gaps {
            let tag = match gap.severity {
                GapSeverity::Critical => "CRIT ".red().bold(),
                GapSeverity::Major => "MAJOR".red(),
                GapSeverity::Minor => "MINOR".yellow(),
            };
            match (gap.start_line, gap.end_line) {
                (Some(start), Some(end)) => println!(
                    "    {} {} {}",
                    tag,
                    gap.message,
                    format!(":{}-{}", start, end).dimmed()
                ),
                _ => println!("    {} {}", tag, gap.message),
            }
        }
        println!();
    }

    if !report.recommendations.is_empty() {
        println!("  {}:", "Recommendations".bold());
        for rec in &report.recommendations {
            println!(
                "    {} {}",
                format!("[{:?}]", rec.priority).to_lowercase().cyan(),
                rec.action
            );
            println!(
                "          {}",
                format!("effort {:?}, impact {:?}", rec.effort, rec.impact)
                    .to_lowercase()
                    .dimmed()
            );
        }
        println!();
    }
}

fn write_metric(label: &str, metric: &CoverageMetric) {
    let pct = format!("{:>5.1}%", metric.percentage);
    let pct = match metric.percentage {
        p if p >= 80.0 => pct.green(),
        p if p >= 60.0 => pct.yellow(),
        _ => pct.red(),
    };
    println!(
        "    {:<10} {}  {}",
        label,
        pct,
        format!("{}/{}", metric.covered, metric.total).dimmed()
    );
}

fn write_colored_grade(grade: &str) {
    match grade {
        "A+" | "A" => print!("{}", grade.green().bold()),
        "B+" | "B" => print!("{}", grade.green()),
        "C+" | "C" => print!("{}", grade.yellow()),
        "D+" | "D" => print!("{}", grade.yellow().bold()),
        _ => print!("{}", grade.red()),
    }
}
