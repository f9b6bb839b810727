//! Supported source languages and language detection.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A source language the pipeline can analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    Cpp,
    CSharp,
}

/// How blocks are delimited in a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Braces,
    Indentation,
}

/// Comment delimiters for line classification.
#[derive(Debug, Clone, Copy)]
pub struct CommentSyntax {
    pub line: &'static [&'static str],
    pub block: &'static [(&'static str, &'static str)],
}

const C_STYLE_COMMENTS: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: &[("/*", "*/")],
};

const PYTHON_COMMENTS: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: &[("\"\"\"", "\"\"\""), ("'''", "'''")],
};

impl Language {
    pub const ALL: [Language; 6] = [
        Language::JavaScript,
        Language::TypeScript,
        Language::Python,
        Language::Java,
        Language::Cpp,
        Language::CSharp,
    ];

    /// Canonical language tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
        }
    }

    /// File extensions (without dot).
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::TypeScript => &["ts", "tsx", "mts", "cts"],
            Language::Python => &["py", "pyi"],
            Language::Java => &["java"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hh", "hxx", "h"],
            Language::CSharp => &["cs"],
        }
    }

    pub fn block_style(&self) -> BlockStyle {
        match self {
            Language::Python => BlockStyle::Indentation,
            _ => BlockStyle::Braces,
        }
    }

    pub fn comment_syntax(&self) -> CommentSyntax {
        match self {
            Language::Python => PYTHON_COMMENTS,
            _ => C_STYLE_COMMENTS,
        }
    }

    /// Token that ends a simple statement, if the language has one.
    pub fn statement_terminator(&self) -> Option<char> {
        match self {
            Language::Python => None,
            _ => Some(';'),
        }
    }

    /// Literal used for "no value" in generated code.
    pub fn null_literal(&self) -> &'static str {
        match self {
            Language::Python => "None",
            Language::Cpp => "nullptr",
            _ => "null",
        }
    }

    /// Resolve a language from an explicit tag and/or a filename.
    ///
    /// An explicit tag wins. Otherwise the filename is matched against
    /// each language's extension globs.
    pub fn detect(tag: Option<&str>, filename: Option<&str>) -> Result<Language, ValidationError> {
        if let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) {
            return tag.parse();
        }
        filename
            .and_then(Language::from_filename)
            .ok_or_else(|| ValidationError::UndeterminedLanguage(filename.map(str::to_string)))
    }

    /// Match a filename (or path) against the known extension globs.
    pub fn from_filename(filename: &str) -> Option<Language> {
        let name = Path::new(filename).file_name()?.to_str()?.to_ascii_lowercase();
        FILENAME_GLOBS
            .matches(&name)
            .first()
            .map(|&idx| GLOB_LANGUAGES[idx])
    }
}

/// Glob index → language, parallel to `FILENAME_GLOBS`.
static GLOB_LANGUAGES: Lazy<Vec<Language>> = Lazy::new(|| {
    Language::ALL
        .iter()
        .flat_map(|lang| lang.extensions().iter().map(move |_| *lang))
        .collect()
});

static FILENAME_GLOBS: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    for lang in Language::ALL {
        for ext in lang.extensions() {
            if let Ok(glob) = Glob::new(&format!("*.{}", ext)) {
                builder.add(glob);
            }
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
});

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "jsx" | "node" => Ok(Language::JavaScript),
            "typescript" | "ts" | "tsx" => Ok(Language::TypeScript),
            "python" | "py" | "python3" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "cpp" | "c++" | "cxx" | "cc" => Ok(Language::Cpp),
            "csharp" | "c#" | "cs" => Ok(Language::CSharp),
            other => Err(ValidationError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
