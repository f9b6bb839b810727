//! Structural analysis of source files.
//!
//! Extraction turns one source file into a [`ModuleStructure`]: functions,
//! classes, imports, exports and diagnostics. Two paths produce the same
//! facts:
//!
//! ```text
//! ┌─────────────┐   grammar    ┌──────────────────┐
//! │ Source text │─────────────▶│ tree-sitter walk │──┐
//! └─────────────┘              └──────────────────┘  │   ┌─────────────────┐
//!        │          fallback   ┌──────────────────┐  ├──▶│ ModuleStructure │
//!        └────────────────────▶│ heuristic scan   │──┘   └─────────────────┘
//!                              └──────────────────┘
//! ```
//!
//! Grammar-aware extraction is used when a grammar is compiled in (the
//! `tree-sitter` feature) and the language has one. When it fails, panics,
//! or leaves syntax errors, the heuristic scan fills in. Imports, exports
//! and metrics are computed on the text for every language.
//!
//! # Adding a New Language
//!
//! 1. Add the variant to [`Language`] with its extensions and comment syntax
//! 2. Create a module in `src/analysis/languages/` implementing
//!    [`StructuralExtractor`]
//! 3. Register it in `languages/mod.rs`

mod facts;
mod heuristic;
mod languages;
mod metrics;
mod modules;
mod patterns;
mod signature;
mod traits;
#[cfg(feature = "tree-sitter")]
mod treesitter;

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

pub use facts::{
    ClassInfo, Diagnostic, ExportInfo, FunctionInfo, ImportInfo, ImportedItem, ModuleKind,
    ModuleStructure, Parameter, Property, Severity, Span, Visibility,
};
pub use languages::{extractor_for_extension, get_extractor, register_extractors};
pub use metrics::{compute_metrics, CodeMetrics, DebtGrade};
pub use patterns::{
    classify_lines, count_lines, find_branch_points, is_declaration_only, mask_non_code,
    BranchKind, BranchPoint, LineIndex, LineKind,
};
#[cfg(feature = "tree-sitter")]
pub use traits::ParsedFile;
pub use traits::{ExtractOptions, StructuralExtractor};

use crate::language::Language;

/// Grammar-aware extraction pass handed to [`run_extraction`].
pub type GrammarPass<'g> = &'g dyn Fn(&str) -> anyhow::Result<ModuleStructure>;

/// Extract the structure of `source` with the registered extractor.
pub fn extract(language: Language, source: &str, options: &ExtractOptions) -> ModuleStructure {
    get_extractor(language).extract(source, options)
}

/// Shared extraction driver.
///
/// Runs the grammar pass when one is given (and not disabled), falls back
/// to the heuristic scan, then attaches imports and exports and normalizes
/// the result. Never fails: problems become diagnostics.
pub fn run_extraction(
    language: Language,
    source: &str,
    options: &ExtractOptions,
    grammar: Option<GrammarPass>,
) -> ModuleStructure {
    if source.trim().is_empty() {
        let mut out = ModuleStructure::default();
        out.diagnostics.push(Diagnostic::info(1, 1, "source is empty"));
        return out;
    }

    let total_lines = count_lines(source);
    let mut notes = Vec::new();
    let source: Cow<str> = match source.find('\0') {
        Some(offset) => {
            let index = LineIndex::new(source);
            notes.push(Diagnostic::warning(
                index.line_of(offset),
                index.column_of(offset),
                "NUL bytes replaced with spaces",
            ));
            Cow::Owned(source.replace('\0', " "))
        }
        None => Cow::Borrowed(source),
    };
    let source = source.as_ref();

    let mut structure = match grammar.filter(|_| !options.heuristic_only) {
        Some(pass) => match panic::catch_unwind(AssertUnwindSafe(|| pass(source))) {
            Ok(Ok(mut structure)) => {
                if structure.has_errors() {
                    debug!(language = %language, "syntax errors present, merging heuristic results");
                    merge_missing(&mut structure, heuristic_pass(language, source, &mut notes));
                }
                structure
            }
            Ok(Err(e)) => {
                warn!(language = %language, error = %e, "grammar extraction failed");
                notes.push(Diagnostic::warning(
                    1,
                    1,
                    format!("grammar extraction failed ({}); used heuristic extraction", e),
                ));
                heuristic_pass(language, source, &mut notes)
            }
            Err(_) => {
                warn!(language = %language, "grammar extraction panicked");
                notes.push(Diagnostic::warning(
                    1,
                    1,
                    "grammar extraction panicked; used heuristic extraction",
                ));
                heuristic_pass(language, source, &mut notes)
            }
        },
        None => heuristic_pass(language, source, &mut notes),
    };

    structure.diagnostics.extend(notes);
    attach_module_facts(language, source, &mut structure);
    structure.normalize(total_lines);
    if let Some(max) = options.max_diagnostics {
        structure.diagnostics.truncate(max);
    }
    structure
}

/// Heuristic scan under `catch_unwind`. A panic yields an empty structure
/// and an error diagnostic.
fn heuristic_pass(language: Language, source: &str, notes: &mut Vec<Diagnostic>) -> ModuleStructure {
    match panic::catch_unwind(AssertUnwindSafe(|| heuristic::extract(language, source))) {
        Ok(structure) => structure,
        Err(_) => {
            warn!(language = %language, "heuristic extraction panicked");
            notes.push(Diagnostic::error(1, 1, "heuristic extraction panicked; no structure extracted"));
            ModuleStructure::default()
        }
    }
}

/// Add functions, classes and methods the heuristic scan found but the
/// grammar walk missed (typically inside error-recovery regions).
fn merge_missing(structure: &mut ModuleStructure, fallback: ModuleStructure) {
    let known: BTreeSet<String> = structure.functions.iter().map(|f| f.name.clone()).collect();
    structure
        .functions
        .extend(fallback.functions.into_iter().filter(|f| !known.contains(&f.name)));

    for class in fallback.classes {
        match structure.classes.iter_mut().find(|c| c.name == class.name) {
            Some(existing) => {
                let methods: BTreeSet<String> =
                    existing.methods.iter().map(|m| m.name.clone()).collect();
                existing
                    .methods
                    .extend(class.methods.into_iter().filter(|m| !methods.contains(&m.name)));
            }
            None => structure.classes.push(class),
        }
    }
}

/// Fill imports and exports and settle export flags.
fn attach_module_facts(language: Language, source: &str, structure: &mut ModuleStructure) {
    let masked = mask_non_code(source, language);
    structure.imports = modules::scan_imports(source, &masked, language);

    let scanned = modules::scan_exports(source, &masked, language);
    structure.exports = match language {
        Language::JavaScript | Language::TypeScript => scanned,
        Language::Python if modules::has_python_export_list(source) => {
            // `__all__` is authoritative
            let listed: BTreeSet<&str> = scanned
                .iter()
                .flat_map(|e| e.items.iter().map(|i| i.name.as_str()))
                .collect();
            for func in &mut structure.functions {
                func.is_exported = listed.contains(func.name.as_str());
            }
            for class in &mut structure.classes {
                class.is_exported = listed.contains(class.name.as_str());
            }
            scanned
        }
        _ => modules::derive_exports(structure),
    };
    structure.apply_exports();

    for class in &mut structure.classes {
        if !class.is_exported {
            for method in &mut class.methods {
                method.is_exported = false;
            }
        }
    }
}
