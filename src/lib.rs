//! testsynth - structural extraction, test synthesis and simulated coverage.
//!
//! testsynth reduces a source file to a canonical structural model,
//! synthesizes a test suite for it and estimates how well that suite would
//! cover the source.
//!
//! # Architecture
//!
//! Data flows through three stages:
//!
//! ```text
//! source ─▶ analysis ─▶ AnalysisResult ─▶ synthesis ─▶ TestSuite ─▶ coverage ─▶ CoverageReport
//! ```
//!
//! - `analysis`: per-language structural extractors (tree-sitter with a
//!   heuristic fallback) and the metrics engine
//! - `orchestrator`: validation, content-hash caching and status tracking
//! - `synthesis`: target designation, generated and template tests, file
//!   rendering per framework
//! - `coverage`: heuristic coverage simulation, gaps and recommendations
//! - `pipeline`: the three stages wired together with a per-run context
//! - `store`: persistence port with memory and JSON file backends
//! - `config`: YAML configuration
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement the
//! `StructuralExtractor` trait and register it in `languages/mod.rs`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod language;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod synthesis;

pub use analysis::{
    extract, register_extractors, ClassInfo, CodeMetrics, ExtractOptions, FunctionInfo,
    ModuleStructure, StructuralExtractor,
};
pub use config::Config;
pub use coverage::{CoverageReport, CoverageSimulator};
pub use error::{ConfigError, PipelineError, StoreError, SynthesisError, ValidationError};
pub use language::Language;
pub use orchestrator::{content_hash, AnalysisOrchestrator, AnalysisResult, AnalysisStatus, AnalyzeRequest};
pub use pipeline::{Pipeline, PipelineContext, PipelineOutput};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use synthesis::{Framework, TestBodyGenerator, TestCase, TestSuite, TestSynthesizer, TestType};

/// Initialize all subsystems.
///
/// Call this once at startup. Extraction also initializes lazily.
pub fn init() {
    register_extractors();
}
