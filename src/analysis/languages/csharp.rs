//! C# extractor.
//!
//! No C# grammar is compiled in, so extraction is the heuristic scan:
//! brace matching that skips verbatim (`@"..."`) and regular strings,
//! access modifiers for the exported surface.

use crate::analysis::{run_extraction, ExtractOptions, ModuleStructure, StructuralExtractor};
use crate::language::Language;

#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpExtractor;

impl CSharpExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl StructuralExtractor for CSharpExtractor {
    fn language(&self) -> Language {
        Language::CSharp
    }

    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure {
        run_extraction(Language::CSharp, source, options, None)
    }
}
