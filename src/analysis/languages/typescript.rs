//! TypeScript extractor using tree-sitter.

use crate::analysis::{run_extraction, ExtractOptions, GrammarPass, ModuleStructure, StructuralExtractor};
use crate::language::Language;

use super::javascript::extract_script;

pub struct TypeScriptExtractor {
    grammar: tree_sitter::Language,
}

impl TypeScriptExtractor {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }
}

impl Default for TypeScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralExtractor for TypeScriptExtractor {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure {
        let grammar: GrammarPass =
            &|src| extract_script(Language::TypeScript, &self.grammar, src, options);
        run_extraction(Language::TypeScript, source, options, Some(grammar))
    }
}
