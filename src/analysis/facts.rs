//! Fact structures extracted from source code.
//!
//! A [`ModuleStructure`] is the language-neutral result of structural
//! extraction: functions, classes, imports, exports and diagnostics.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Source location span with line/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// End line (1-indexed).
    pub end_line: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    #[cfg(feature = "tree-sitter")]
    pub fn from_node(node: tree_sitter::Node) -> Self {
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1, // tree-sitter is 0-indexed
            end_line: node.end_position().row + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// Severity of an extraction diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// A non-fatal problem found while extracting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(severity: Severity, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: line.max(1),
            column: column.max(1),
            severity,
        }
    }

    pub fn error(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, line, column, message)
    }

    pub fn warning(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, line, column, message)
    }

    pub fn info(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, line, column, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.line, self.column, self.severity, self.message
        )
    }
}

/// A function or method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Declared or inferred type; `"any"` when unknown.
    pub type_name: String,
    pub optional: bool,
    pub default_value: Option<String>,
}

/// Member visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
        }
    }
}

/// A class field or property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub type_name: String,
    pub visibility: Visibility,
    pub is_static: bool,
}

/// A function or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// Declared return type; `"void"` when nothing is declared in a typed
    /// language, `"any"` in a dynamic one.
    pub return_type: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Cyclomatic complexity, always at least 1.
    pub complexity: u32,
    /// Distinct call targets referenced from the body.
    pub dependencies: BTreeSet<String>,
    pub is_async: bool,
    pub is_exported: bool,
    pub docstring: Option<String>,
    pub test_candidates: Vec<String>,
}

impl FunctionInfo {
    /// A function with the given name and span and no other facts yet.
    pub fn new(name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: "any".to_string(),
            start_line,
            end_line,
            complexity: 1,
            dependencies: BTreeSet::new(),
            is_async: false,
            is_exported: false,
            docstring: None,
            test_candidates: Vec::new(),
        }
    }

    /// Whether a line falls inside this function.
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Whether the declared return type means "returns nothing".
    pub fn returns_nothing(&self) -> bool {
        matches!(
            self.return_type.trim(),
            "void" | "None" | "Promise<void>" | "Task" | "-> None"
        )
    }

    /// Suggested test case names for this function.
    pub fn suggest_test_candidates(&self) -> Vec<String> {
        let mut names = vec![format!("{} handles valid input", self.name)];
        if !self.parameters.is_empty() {
            names.push(format!("{} rejects invalid arguments", self.name));
        }
        if self.parameters.iter().any(|p| p.optional) {
            names.push(format!("{} uses defaults for omitted arguments", self.name));
        }
        if self.complexity > 3 {
            names.push(format!("{} propagates errors", self.name));
        }
        if self.complexity > 1 {
            names.push(format!("{} covers each branch", self.name));
        }
        if self.is_async {
            names.push(format!("{} resolves asynchronously", self.name));
        }
        names
    }
}

/// A class, struct or record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub methods: Vec<FunctionInfo>,
    pub properties: Vec<Property>,
    pub start_line: usize,
    pub end_line: usize,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub is_exported: bool,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            properties: Vec::new(),
            start_line,
            end_line,
            superclass: None,
            interfaces: Vec::new(),
            is_exported: false,
        }
    }

    /// Distinct call targets referenced across all methods.
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.methods
            .iter()
            .flat_map(|m| m.dependencies.iter().cloned())
            .collect()
    }
}

/// Whether a module reference points outside or inside the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    External,
    Relative,
}

impl ModuleKind {
    /// Classify a module specifier.
    pub fn classify(source: &str) -> Self {
        if source.starts_with('.') || source.starts_with('/') {
            ModuleKind::Relative
        } else {
            ModuleKind::External
        }
    }
}

/// One imported or exported name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedItem {
    pub name: String,
    pub alias: Option<String>,
    pub is_default: bool,
}

impl ImportedItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            is_default: false,
        }
    }
}

/// An import statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub source: String,
    pub items: Vec<ImportedItem>,
    pub kind: ModuleKind,
    pub line: usize,
}

/// An export. Local declarations carry `source: None` and count as relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: String,
    pub source: Option<String>,
    pub items: Vec<ImportedItem>,
    pub kind: ModuleKind,
    pub line: usize,
}

impl ExportInfo {
    pub fn local(name: impl Into<String>, line: usize) -> Self {
        let name = name.into();
        Self {
            items: vec![ImportedItem::named(name.clone())],
            name,
            source: None,
            kind: ModuleKind::Relative,
            line,
        }
    }
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStructure {
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ModuleStructure {
    /// Top-level functions followed by class methods, in source order.
    pub fn callables(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions
            .iter()
            .chain(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    pub fn callable_count(&self) -> usize {
        self.functions.len() + self.classes.iter().map(|c| c.methods.len()).sum::<usize>()
    }

    /// Find a top-level function or method by name.
    pub fn find_callable(&self, name: &str) -> Option<&FunctionInfo> {
        self.callables().find(|f| f.name == name)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Mark every function and class named in a local export as exported.
    pub fn apply_exports(&mut self) {
        let exported: BTreeSet<String> = self
            .exports
            .iter()
            .filter(|e| e.source.is_none())
            .flat_map(|e| e.items.iter().map(|i| i.name.clone()))
            .collect();
        for func in &mut self.functions {
            if exported.contains(&func.name) {
                func.is_exported = true;
            }
        }
        for class in &mut self.classes {
            if exported.contains(&class.name) {
                class.is_exported = true;
            }
        }
    }

    /// Enforce structural invariants and fill derived fields.
    ///
    /// Spans are clamped to `1..=total_lines` with `start <= end`, complexity
    /// is at least 1, entries are sorted by position and test candidates
    /// are (re)computed.
    pub fn normalize(&mut self, total_lines: usize) {
        let total = total_lines.max(1);
        let fix = |start: &mut usize, end: &mut usize| {
            *start = (*start).clamp(1, total);
            *end = (*end).clamp(*start, total);
        };

        for func in &mut self.functions {
            fix(&mut func.start_line, &mut func.end_line);
            finish_function(func);
        }
        for class in &mut self.classes {
            fix(&mut class.start_line, &mut class.end_line);
            for method in &mut class.methods {
                fix(&mut method.start_line, &mut method.end_line);
                finish_function(method);
            }
            class.methods.sort_by_key(|m| (m.start_line, m.name.clone()));
        }
        for diag in &mut self.diagnostics {
            diag.line = diag.line.clamp(1, total);
        }

        self.functions.sort_by_key(|f| (f.start_line, f.name.clone()));
        self.classes.sort_by_key(|c| (c.start_line, c.name.clone()));
        self.imports.sort_by_key(|i| i.line);
        self.exports.sort_by_key(|e| e.line);
        self.diagnostics.sort_by_key(|d| (d.line, d.column, d.severity));
        self.diagnostics.dedup();
    }
}

fn finish_function(func: &mut FunctionInfo) {
    func.complexity = func.complexity.max(1);
    func.dependencies.remove(&func.name);
    func.test_candidates = func.suggest_test_candidates();
}
