//! Command-line interface for testsynth.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, DEFAULT_CONFIG_YAML};
use crate::coverage::CoverageReport;
use crate::error::PipelineError;
use crate::language::Language;
use crate::orchestrator::{AnalysisResult, AnalyzeRequest};
use crate::pipeline::{Pipeline, PipelineContext};
use crate::report::{self, Format, JsonReport};
use crate::synthesis::{Framework, TestSuite};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Caller identity used for cache scoping on the command line.
const CLI_CALLER: &str = "cli";

/// Analyze source files, synthesize tests and simulate their coverage.
///
/// testsynth extracts functions, classes and metrics from JavaScript,
/// TypeScript, Python, Java, C++ and C# sources, builds a test suite from
/// generated and template tests, and estimates how much of the source that
/// suite would exercise. Coverage is simulated, never measured.
#[derive(Parser)]
#[command(name = "testsynth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract structure and metrics from a file or directory
    Analyze(AnalyzeArgs),
    /// Synthesize a test suite for a file
    #[command(visible_alias = "gen")]
    Generate(GenerateArgs),
    /// Simulate coverage of a synthesized suite for a file
    Coverage(FileArgs),
    /// Analyze, generate and simulate coverage in one go
    Run(GenerateArgs),
    /// Write a default testsynth.yaml
    Init(InitArgs),
}

/// Options shared by every per-file command.
#[derive(Args, Clone)]
pub struct FileArgs {
    /// Source file
    pub path: PathBuf,

    /// Language tag (default: detect from the file name)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Re-analyze even if a cached result exists
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// File or directory to analyze
    pub path: PathBuf,

    /// Language tag (default: detect from each file name)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Re-analyze even if a cached result exists
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the generate and run commands.
#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub file: FileArgs,

    /// Test framework (default: per language)
    #[arg(long)]
    pub framework: Option<String>,

    /// Directory to write generated test files into
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "testsynth.yaml")]
    pub output: PathBuf,
}

fn parse_format(format: &str) -> Option<Format> {
    match format.parse() {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

/// Load config and build the pipeline, or report why not.
fn load_pipeline(config_path: Option<&Path>) -> Option<(Config, Pipeline)> {
    let config = match Config::load(config_path) {
        Ok((config, _)) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'testsynth init' to create a config file");
            return None;
        }
    };
    match Pipeline::from_config(&config) {
        Ok(pipeline) => Some((config, pipeline)),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn request_for(path: &Path, source: String, language: Option<&str>, force: bool) -> AnalyzeRequest {
    AnalyzeRequest {
        source,
        language: language.map(str::to_string),
        filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        caller: CLI_CALLER.to_string(),
        force,
    }
}

/// Collect supported source files under `root`.
fn collect_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories (but not the root itself)
            if e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.') {
                return false;
            }
            !(e.file_type().is_dir()
                && (name == "vendor" || name == "node_modules" || name == "target" || name == "dist"))
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let name = entry.file_name().to_string_lossy();
            if Language::from_filename(&name).is_some() {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let Some(format) = parse_format(&args.format) else {
        return Ok(EXIT_ERROR);
    };
    let Some((config, pipeline)) = load_pipeline(config_path) else {
        return Ok(EXIT_ERROR);
    };

    let metadata = match std::fs::metadata(&args.path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    let files = if metadata.is_dir() {
        collect_files(&args.path)?
    } else {
        vec![args.path.clone()]
    };
    if files.is_empty() {
        eprintln!("Warning: no supported source files found");
        return Ok(EXIT_SUCCESS);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let mut results: Vec<(String, AnalysisResult)> = Vec::new();
    let mut rejected = 0usize;
    for path in &files {
        let source = read_source(path)?;
        let request = request_for(path, source, args.language.as_deref(), args.force || config.analysis.force);
        match runtime.block_on(pipeline.analyze(request)) {
            Ok(result) => results.push((path.display().to_string(), result)),
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                rejected += 1;
            }
        }
    }

    match format {
        Format::Json => {
            let reports: Vec<JsonReport<'_>> =
                results.iter().map(|(path, result)| JsonReport::new(path, result)).collect();
            report::write_json(&reports)?;
        }
        Format::Pretty => {
            report::write_header();
            for (path, result) in &results {
                report::write_analysis(path, result);
            }
        }
    }

    if results.is_empty() && rejected > 0 {
        return Ok(EXIT_ERROR);
    }
    if rejected > 0 || results.iter().any(|(_, r)| !r.is_completed()) {
        return Ok(EXIT_FAILED);
    }
    Ok(EXIT_SUCCESS)
}

enum Stage {
    Generate,
    Coverage,
    Run,
}

/// Run the generate command.
pub fn run_generate(args: &GenerateArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    run_stages(&args.file, args.framework.as_deref(), args.out_dir.as_deref(), config_path, Stage::Generate)
}

/// Run the coverage command.
pub fn run_coverage(args: &FileArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    run_stages(args, None, None, config_path, Stage::Coverage)
}

/// Run the run command.
pub fn run_run(args: &GenerateArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    run_stages(&args.file, args.framework.as_deref(), args.out_dir.as_deref(), config_path, Stage::Run)
}

fn run_stages(
    args: &FileArgs,
    framework: Option<&str>,
    out_dir: Option<&Path>,
    config_path: Option<&Path>,
    stage: Stage,
) -> anyhow::Result<i32> {
    let Some(format) = parse_format(&args.format) else {
        return Ok(EXIT_ERROR);
    };
    let framework = match framework.map(str::parse::<Framework>).transpose() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let Some((config, pipeline)) = load_pipeline(config_path) else {
        return Ok(EXIT_ERROR);
    };
    if !args.path.is_file() {
        eprintln!("Error: {} is not a file", args.path.display());
        return Ok(EXIT_ERROR);
    }

    let source = read_source(&args.path)?;
    let request = request_for(
        &args.path,
        source.clone(),
        args.language.as_deref(),
        args.force || config.analysis.force,
    );
    let ctx = pipeline.context().with_framework(framework);

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(execute(&pipeline, request, &source, &ctx, &stage));

    let (analysis, suite, coverage) = match outcome {
        Ok(o) => o,
        Err(e) if e.is_retryable() => {
            eprintln!("Error: {} (retry may succeed)", e);
            return Ok(EXIT_FAILED);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if let (Some(dir), Some(suite)) = (out_dir, suite.as_ref()) {
        write_suite_files(dir, suite)?;
    }

    let path = args.path.display().to_string();
    match format {
        Format::Json => {
            let mut report = JsonReport::new(&path, &analysis);
            report.suite = suite.as_ref();
            report.coverage = coverage.as_ref();
            report::write_json(&[report])?;
        }
        Format::Pretty => {
            report::write_header();
            if matches!(stage, Stage::Run) || suite.is_none() {
                report::write_analysis(&path, &analysis);
            }
            if let Some(suite) = &suite {
                if !matches!(stage, Stage::Coverage) {
                    report::write_suite(suite, out_dir);
                }
            }
            if let Some(coverage) = &coverage {
                report::write_coverage(coverage);
            }
        }
    }

    if !analysis.is_completed() || coverage.as_ref().is_some_and(|c| c.is_failing()) {
        return Ok(EXIT_FAILED);
    }
    Ok(EXIT_SUCCESS)
}

type StageOutput = (AnalysisResult, Option<TestSuite>, Option<CoverageReport>);

async fn execute(
    pipeline: &Pipeline,
    request: AnalyzeRequest,
    source: &str,
    ctx: &PipelineContext,
    stage: &Stage,
) -> Result<StageOutput, PipelineError> {
    let analysis = pipeline.analyze(request).await?;
    if !analysis.is_completed() {
        return Ok((analysis, None, None));
    }
    let suite = pipeline.generate(&analysis, source, ctx).await?;
    let coverage = match stage {
        Stage::Generate => None,
        Stage::Coverage | Stage::Run => Some(pipeline.coverage(&analysis, &suite, source).await?),
    };
    Ok((analysis, Some(suite), coverage))
}

fn write_suite_files(dir: &Path, suite: &TestSuite) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for file in &suite.files {
        let path = dir.join(&file.name);
        std::fs::write(&path, &file.content).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_CONFIG_YAML) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to enable the generator or pick frameworks", args.output.display());
    println!("  2. Run: testsynth run <file> --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files_skips_vendored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/app.ts"), "export const a = 1;\n").unwrap();
        std::fs::write(root.join("src/notes.txt"), "hello\n").unwrap();
        std::fs::write(root.join("node_modules/lib/index.js"), "x();\n").unwrap();
        std::fs::write(root.join(".git/hook.py"), "pass\n").unwrap();

        let files = collect_files(root).unwrap();
        assert_eq!(files, vec![root.join("src/app.ts")]);
    }

    #[test]
    fn test_init_writes_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            output: dir.path().join("conf/testsynth.yaml"),
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        let written = std::fs::read_to_string(&args.output).unwrap();
        assert_eq!(written, DEFAULT_CONFIG_YAML);
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);
    }

    #[test]
    fn test_generate_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cart.py");
        std::fs::write(&source, "def total(items):\n    return sum(items)\n").unwrap();
        let out = dir.path().join("out");
        let config = dir.path().join("testsynth.yaml");
        std::fs::write(&config, "").unwrap();

        let args = GenerateArgs {
            file: FileArgs {
                path: source,
                language: None,
                format: "json".to_string(),
                force: false,
            },
            framework: Some("unittest".to_string()),
            out_dir: Some(out.clone()),
        };
        assert_eq!(run_generate(&args, Some(&config)).unwrap(), EXIT_SUCCESS);
        let written = std::fs::read_to_string(out.join("test_total.py")).unwrap();
        assert!(written.contains("import unittest"));
    }

    #[test]
    fn test_bad_framework_is_usage_error() {
        let args = FileArgs {
            path: PathBuf::from("missing.py"),
            language: None,
            format: "pretty".to_string(),
            force: false,
        };
        assert_eq!(run_stages(&args, Some("rspec"), None, None, Stage::Generate).unwrap(), EXIT_ERROR);
    }
}
