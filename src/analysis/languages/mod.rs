//! Language-specific extractor implementations.

#[cfg(feature = "tree-sitter")]
mod cpp;
mod csharp;
#[cfg(feature = "tree-sitter")]
mod java;
#[cfg(feature = "tree-sitter")]
mod javascript;
#[cfg(feature = "tree-sitter")]
mod python;
#[cfg(feature = "tree-sitter")]
mod typescript;

#[cfg(feature = "tree-sitter")]
pub use cpp::CppExtractor;
pub use csharp::CSharpExtractor;
#[cfg(feature = "tree-sitter")]
pub use java::JavaExtractor;
#[cfg(feature = "tree-sitter")]
pub use javascript::JavaScriptExtractor;
#[cfg(feature = "tree-sitter")]
pub use python::PythonExtractor;
#[cfg(feature = "tree-sitter")]
pub use typescript::TypeScriptExtractor;

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

use super::StructuralExtractor;
#[cfg(not(feature = "tree-sitter"))]
use super::{run_extraction, ExtractOptions, ModuleStructure};
use crate::language::Language;

/// Extractor without a grammar, used for every language when the
/// `tree-sitter` feature is off.
#[cfg(not(feature = "tree-sitter"))]
pub struct HeuristicExtractor {
    language: Language,
}

#[cfg(not(feature = "tree-sitter"))]
impl HeuristicExtractor {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

#[cfg(not(feature = "tree-sitter"))]
impl StructuralExtractor for HeuristicExtractor {
    fn language(&self) -> Language {
        self.language
    }

    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure {
        run_extraction(self.language, source, options, None)
    }
}

/// Static storage for the C# extractor.
static CSHARP_EXTRACTOR: OnceCell<CSharpExtractor> = OnceCell::new();

#[cfg(feature = "tree-sitter")]
static CPP_EXTRACTOR: OnceCell<CppExtractor> = OnceCell::new();
#[cfg(feature = "tree-sitter")]
static JAVA_EXTRACTOR: OnceCell<JavaExtractor> = OnceCell::new();
#[cfg(feature = "tree-sitter")]
static JAVASCRIPT_EXTRACTOR: OnceCell<JavaScriptExtractor> = OnceCell::new();
#[cfg(feature = "tree-sitter")]
static PYTHON_EXTRACTOR: OnceCell<PythonExtractor> = OnceCell::new();
#[cfg(feature = "tree-sitter")]
static TYPESCRIPT_EXTRACTOR: OnceCell<TypeScriptExtractor> = OnceCell::new();

/// One heuristic extractor per language, for builds without grammars.
#[cfg(not(feature = "tree-sitter"))]
static HEURISTIC_EXTRACTORS: OnceCell<Vec<HeuristicExtractor>> = OnceCell::new();

/// Whether extractors have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register all available language extractors.
///
/// Idempotent; [`get_extractor`] calls it on demand.
pub fn register_extractors() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return; // Already registered
    }

    CSHARP_EXTRACTOR.get_or_init(CSharpExtractor::new);
    #[cfg(feature = "tree-sitter")]
    {
        CPP_EXTRACTOR.get_or_init(CppExtractor::new);
        JAVA_EXTRACTOR.get_or_init(JavaExtractor::new);
        JAVASCRIPT_EXTRACTOR.get_or_init(JavaScriptExtractor::new);
        PYTHON_EXTRACTOR.get_or_init(PythonExtractor::new);
        TYPESCRIPT_EXTRACTOR.get_or_init(TypeScriptExtractor::new);
    }
    #[cfg(not(feature = "tree-sitter"))]
    HEURISTIC_EXTRACTORS.get_or_init(|| {
        Language::ALL
            .iter()
            .map(|&l| HeuristicExtractor::new(l))
            .collect()
    });
}

/// Get the extractor for a language.
#[cfg(feature = "tree-sitter")]
pub fn get_extractor(language: Language) -> &'static dyn StructuralExtractor {
    register_extractors();

    match language {
        Language::CSharp => CSHARP_EXTRACTOR.get_or_init(CSharpExtractor::new),
        Language::Cpp => CPP_EXTRACTOR.get_or_init(CppExtractor::new),
        Language::Java => JAVA_EXTRACTOR.get_or_init(JavaExtractor::new),
        Language::JavaScript => JAVASCRIPT_EXTRACTOR.get_or_init(JavaScriptExtractor::new),
        Language::Python => PYTHON_EXTRACTOR.get_or_init(PythonExtractor::new),
        Language::TypeScript => TYPESCRIPT_EXTRACTOR.get_or_init(TypeScriptExtractor::new),
    }
}

/// Get the extractor for a language.
#[cfg(not(feature = "tree-sitter"))]
pub fn get_extractor(language: Language) -> &'static dyn StructuralExtractor {
    register_extractors();

    if language == Language::CSharp {
        return CSHARP_EXTRACTOR.get_or_init(CSharpExtractor::new);
    }
    let all = HEURISTIC_EXTRACTORS.get_or_init(|| {
        Language::ALL
            .iter()
            .map(|&l| HeuristicExtractor::new(l))
            .collect()
    });
    match all.iter().find(|e| e.language == language) {
        Some(extractor) => extractor,
        None => CSHARP_EXTRACTOR.get_or_init(CSharpExtractor::new),
    }
}

/// Get an extractor for a file extension (without dot).
pub fn extractor_for_extension(ext: &str) -> Option<&'static dyn StructuralExtractor> {
    Language::ALL
        .iter()
        .find(|l| l.extensions().contains(&ext))
        .map(|&l| get_extractor(l))
}
