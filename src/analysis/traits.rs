//! Core traits for structural extraction.

use crate::language::Language;

use super::ModuleStructure;

/// Holds a parsed tree-sitter tree and the source it was parsed from.
#[cfg(feature = "tree-sitter")]
pub struct ParsedFile<'a> {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: &'a str,
}

#[cfg(feature = "tree-sitter")]
impl<'a> ParsedFile<'a> {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}

/// Per-call extraction options.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Skip the grammar-aware path and use the heuristic extractor.
    pub heuristic_only: bool,
    /// Upper bound on parse diagnostics recorded per file.
    pub max_diagnostics: Option<usize>,
}

/// Language-specific structural extractor.
///
/// Each supported language implements this trait. Extraction never fails:
/// unparseable regions become diagnostics and whatever could be recovered
/// is still returned.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create parsers
/// per call.
pub trait StructuralExtractor: Send + Sync {
    /// The language this extractor handles.
    fn language(&self) -> Language;

    /// Extract functions, classes, imports, exports and diagnostics.
    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure;

    /// Returns file extensions this extractor handles (without dot).
    fn supported_extensions(&self) -> &'static [&'static str] {
        self.language().extensions()
    }

    /// Check if this extractor handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.supported_extensions().contains(&ext)
    }
}
