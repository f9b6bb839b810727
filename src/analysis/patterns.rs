//! Lexical helpers shared by the extractors, the metrics engine and the
//! coverage simulator.
//!
//! Everything here works on a *masked* copy of the source in which comment
//! and string-literal bytes are replaced by spaces. Newlines and byte
//! offsets are preserved, so positions found in the masked text index the
//! original text directly.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::language::{BlockStyle, Language};

#[derive(Clone, Copy, PartialEq, Eq)]
enum MaskState {
    Code,
    LineComment,
    BlockComment(&'static str),
    Quoted { quote: u8, multiline: bool },
    TripleQuoted(u8),
    Verbatim,
}

/// Replace comment and string bytes with spaces, keeping newlines.
pub fn mask_non_code(source: &str, language: Language) -> String {
    let syntax = language.comment_syntax();
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = MaskState::Code;
    let mut i = 0;

    let blank = |out: &mut Vec<u8>, b: u8| out.push(if b == b'\n' { b'\n' } else { b' ' });

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            MaskState::Code => {
                let rest = &bytes[i..];
                if let Some(prefix) = syntax.line.iter().find(|p| rest.starts_with(p.as_bytes())) {
                    state = MaskState::LineComment;
                    for _ in 0..prefix.len() {
                        out.push(b' ');
                    }
                    i += prefix.len();
                    continue;
                }
                if let Some((open, close)) = syntax.block.iter().find(|(o, _)| rest.starts_with(o.as_bytes())) {
                    state = MaskState::BlockComment(close);
                    for _ in 0..open.len() {
                        out.push(b' ');
                    }
                    i += open.len();
                    continue;
                }
                match b {
                    b'"' if language == Language::CSharp && i > 0 && bytes[i - 1] == b'@' => {
                        state = MaskState::Verbatim;
                        out.push(b' ');
                    }
                    b'"' if matches!(language, Language::Java | Language::CSharp)
                        && rest.starts_with(b"\"\"\"") =>
                    {
                        state = MaskState::TripleQuoted(b'"');
                        out.extend_from_slice(b"   ");
                        i += 3;
                        continue;
                    }
                    b'"' => {
                        state = MaskState::Quoted {
                            quote: b'"',
                            multiline: false,
                        };
                        out.push(b' ');
                    }
                    b'\'' => {
                        // C++14 digit separators: 1'000'000
                        let digit_before = i > 0 && bytes[i - 1].is_ascii_alphanumeric();
                        if language == Language::Cpp && digit_before {
                            out.push(b);
                        } else {
                            state = MaskState::Quoted {
                                quote: b'\'',
                                multiline: false,
                            };
                            out.push(b' ');
                        }
                    }
                    b'`' if matches!(language, Language::JavaScript | Language::TypeScript) => {
                        state = MaskState::Quoted {
                            quote: b'`',
                            multiline: true,
                        };
                        out.push(b' ');
                    }
                    _ => out.push(b),
                }
                i += 1;
            }
            MaskState::LineComment => {
                if b == b'\n' {
                    state = MaskState::Code;
                }
                blank(&mut out, b);
                i += 1;
            }
            MaskState::BlockComment(close) => {
                if bytes[i..].starts_with(close.as_bytes()) {
                    for _ in 0..close.len() {
                        out.push(b' ');
                    }
                    i += close.len();
                    state = MaskState::Code;
                    continue;
                }
                blank(&mut out, b);
                i += 1;
            }
            MaskState::Quoted { quote, multiline } => {
                if b == b'\\' && i + 1 < bytes.len() && bytes[i + 1] != b'\n' {
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                if b == quote || (b == b'\n' && !multiline) {
                    state = MaskState::Code;
                }
                blank(&mut out, b);
                i += 1;
            }
            MaskState::TripleQuoted(q) => {
                if b == q && bytes.get(i + 1) == Some(&q) && bytes.get(i + 2) == Some(&q) {
                    out.extend_from_slice(b"   ");
                    i += 3;
                    state = MaskState::Code;
                    continue;
                }
                blank(&mut out, b);
                i += 1;
            }
            MaskState::Verbatim => {
                if b == b'"' {
                    if bytes.get(i + 1) == Some(&b'"') {
                        out.extend_from_slice(b"  ");
                        i += 2;
                        continue;
                    }
                    state = MaskState::Code;
                }
                blank(&mut out, b);
                i += 1;
            }
        }
    }

    // Only ASCII delimiters change state, so multi-byte characters are
    // either copied whole or blanked whole.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Byte offsets of line starts, for offset → line lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// 1-indexed line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// 1-indexed column of `offset` within its line.
    pub fn column_of(&self, offset: usize) -> usize {
        let line = self.line_of(offset);
        offset - self.starts[line - 1] + 1
    }

    /// Byte offset where a 1-indexed line starts.
    pub fn line_start(&self, line: usize) -> usize {
        self.starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or_else(|| self.starts.last().copied().unwrap_or(0))
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

/// Number of lines in a source text. A trailing newline does not start a
/// new line.
pub fn count_lines(source: &str) -> usize {
    if source.is_empty() {
        return 0;
    }
    let newlines = source.matches('\n').count();
    if source.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// How a physical line is classified for metrics and coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Blank,
    Comment,
    Code,
}

/// Classify each physical line of `source`.
///
/// A line is a comment line when it has text but nothing survives masking.
/// Lines that are entirely string literal (Python docstrings) count as
/// comments too.
pub fn classify_lines(source: &str, language: Language) -> Vec<LineKind> {
    let masked = mask_non_code(source, language);
    source
        .lines()
        .zip(masked.lines())
        .map(|(original, masked)| {
            if original.trim().is_empty() {
                LineKind::Blank
            } else if masked.trim().is_empty() {
                LineKind::Comment
            } else {
                LineKind::Code
            }
        })
        .collect()
}

lazy_static! {
    static ref DECLARATION_ONLY: Regex = Regex::new(
        r"(?x)^\s*(?:
            import\b
          | from\s+\S+\s+import\b
          | \#\s*(?:include|pragma|define|ifndef|ifdef|endif|undef)\b
          | using\s+[\w.:=\s]+;\s*$
          | package\s+[\w.]+\s*;?\s*$
          | namespace\s+[\w.:]+\s*[{;]?\s*$
          | (?:public|private|protected)\s*:\s*$
          | @[\w.]+(?:\(.*\))?\s*$
          | \[[\w.]+(?:\(.*\))?\]\s*$
        )"
    )
    .expect("declaration-only pattern is valid");
    static ref PUNCTUATION_ONLY: Regex =
        Regex::new(r"^[\s{}()\[\];,]*$").expect("punctuation pattern is valid");
}

/// Lines that carry no executable behavior: imports, includes, package and
/// namespace declarations, annotations and lone braces.
pub fn is_declaration_only(line: &str) -> bool {
    PUNCTUATION_ONLY.is_match(line) || DECLARATION_ONLY.is_match(line)
}

lazy_static! {
    static ref BRACE_DECISIONS: Regex =
        Regex::new(r"\b(?:if|while|for|foreach|case|catch)\b|&&|\|\|")
            .expect("brace decision pattern is valid");
    static ref PYTHON_DECISIONS: Regex =
        Regex::new(r"\b(?:if|elif|while|for|except|case|and|or)\b")
            .expect("python decision pattern is valid");
    static ref BRACE_BRANCHES: Regex =
        Regex::new(r"\belse\s+if\b|\b(?:if|else|switch|case)\b|&&|\|\|")
            .expect("brace branch pattern is valid");
    static ref PYTHON_BRANCHES: Regex =
        Regex::new(r"\b(?:elif|if|else|case|and|or)\b").expect("python branch pattern is valid");
}

/// Byte offsets of `?` characters that start a ternary expression.
///
/// Requires whitespace or a closing bracket before the `?`, whitespace
/// after it and a `:` later on the same line. This rules out optional
/// chaining, nullable types and optional members.
fn ternary_offsets(masked: &str) -> Vec<usize> {
    let bytes = masked.as_bytes();
    let mut found = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'?' || i == 0 || i + 1 >= bytes.len() {
            continue;
        }
        let before = bytes[i - 1];
        let after = bytes[i + 1];
        let spaced_before = before == b' ' || before == b')' || before == b']';
        if !spaced_before || after != b' ' {
            continue;
        }
        let line_rest = masked[i + 1..].split('\n').next().unwrap_or("");
        if line_rest.contains(':') {
            found.push(i);
        }
    }
    found
}

/// Whether a keyword match at `start` is actually a preprocessor directive
/// such as `#if`.
fn is_preprocessor(masked: &str, start: usize) -> bool {
    start > 0 && masked.as_bytes()[start - 1] == b'#'
}

/// Count decision points in masked source: `if` (including `else if`),
/// loops, `case`, `catch`, ternaries and short-circuit operators.
pub fn count_decision_points(masked: &str, language: Language) -> u32 {
    let count = match language.block_style() {
        BlockStyle::Indentation => PYTHON_DECISIONS.find_iter(masked).count(),
        BlockStyle::Braces => {
            BRACE_DECISIONS
                .find_iter(masked)
                .filter(|m| !is_preprocessor(masked, m.start()))
                .count()
                + ternary_offsets(masked).len()
        }
    };
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Kind of a branch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchKind {
    If,
    ElseIf,
    Else,
    Switch,
    Case,
    Ternary,
    And,
    Or,
}

impl BranchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchKind::If => "if",
            BranchKind::ElseIf => "else-if",
            BranchKind::Else => "else",
            BranchKind::Switch => "switch",
            BranchKind::Case => "case",
            BranchKind::Ternary => "ternary",
            BranchKind::And => "and",
            BranchKind::Or => "or",
        }
    }

    fn from_token(token: &str) -> Self {
        match token {
            "if" => BranchKind::If,
            "elif" => BranchKind::ElseIf,
            "else" => BranchKind::Else,
            "switch" => BranchKind::Switch,
            "case" => BranchKind::Case,
            "&&" | "and" => BranchKind::And,
            "||" | "or" => BranchKind::Or,
            _ if token.starts_with("else") => BranchKind::ElseIf,
            _ => BranchKind::If,
        }
    }
}

/// A branch point with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPoint {
    pub id: String,
    pub line: usize,
    pub column: usize,
    pub kind: BranchKind,
}

/// Find branch points in source order. `else if` counts once.
pub fn find_branch_points(source: &str, language: Language) -> Vec<BranchPoint> {
    let masked = mask_non_code(source, language);
    let index = LineIndex::new(&masked);

    let mut hits: Vec<(usize, BranchKind)> = match language.block_style() {
        BlockStyle::Indentation => PYTHON_BRANCHES
            .find_iter(&masked)
            .map(|m| (m.start(), BranchKind::from_token(m.as_str())))
            .collect(),
        BlockStyle::Braces => BRACE_BRANCHES
            .find_iter(&masked)
            .filter(|m| !is_preprocessor(&masked, m.start()))
            .map(|m| (m.start(), BranchKind::from_token(m.as_str())))
            .chain(ternary_offsets(&masked).into_iter().map(|o| (o, BranchKind::Ternary)))
            .collect(),
    };
    hits.sort_by_key(|(offset, _)| *offset);

    hits.into_iter()
        .map(|(offset, kind)| {
            let line = index.line_of(offset);
            let column = index.column_of(offset);
            BranchPoint {
                id: format!("{}:{}:{}", kind.as_str(), line, column),
                line,
                column,
                kind,
            }
        })
        .collect()
}
