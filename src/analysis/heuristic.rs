//! Heuristic structural extraction.
//!
//! Used for languages without a bundled grammar (C#), when the
//! `tree-sitter` feature is disabled, and as a fallback when grammar-aware
//! extraction fails. It works on the masked source from
//! [`mask_non_code`](super::patterns::mask_non_code):
//!
//! - brace languages are split into a tree of `{ ... }` blocks; each block's
//!   header (the text since the previous `;`, `{` or `}`) is classified as a
//!   class, a function or something else;
//! - Python is tracked by indentation, with continuation lines inside open
//!   brackets ignored.

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use super::patterns::{count_decision_points, mask_non_code, LineIndex};
use super::signature::{
    assignment_position, clean_type, collect_dependencies, infer_type, leading_doc_comment,
    matching_close, parse_parameters, python_docstring, split_top_level,
};
use super::{ClassInfo, Diagnostic, FunctionInfo, ModuleStructure, Property, Visibility};
use crate::language::{BlockStyle, Language};

/// Extract functions and classes without a grammar.
///
/// Imports and exports are attached by the caller.
pub fn extract(language: Language, source: &str) -> ModuleStructure {
    match language.block_style() {
        BlockStyle::Braces => BraceExtractor::new(language, source).run(),
        BlockStyle::Indentation => IndentExtractor::new(source).run(),
    }
}

// ---------------------------------------------------------------------------
// Brace languages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Item {
    Statement { start: usize, end: usize },
    Block(usize),
}

#[derive(Debug)]
struct Block {
    header_start: usize,
    open: usize,
    /// Offset of the closing brace, or the text length when unclosed.
    close: usize,
    items: Vec<Item>,
}

#[derive(Debug, Default)]
struct BlockTree {
    blocks: Vec<Block>,
    top: Vec<Item>,
    unclosed: Vec<usize>,
    stray_closers: Vec<usize>,
}

fn build_block_tree(masked: &str) -> BlockTree {
    struct Level {
        block: Option<usize>,
        segment_start: usize,
        paren: i32,
    }

    let mut tree = BlockTree::default();
    let mut levels = vec![Level {
        block: None,
        segment_start: 0,
        paren: 0,
    }];

    fn items_of<'t>(tree: &'t mut BlockTree, block: Option<usize>) -> &'t mut Vec<Item> {
        match block {
            Some(idx) => &mut tree.blocks[idx].items,
            None => &mut tree.top,
        }
    }

    for (i, &b) in masked.as_bytes().iter().enumerate() {
        let Some(level) = levels.last_mut() else { break };
        match b {
            b'(' | b'[' => level.paren += 1,
            b')' | b']' => level.paren = (level.paren - 1).max(0),
            b';' if level.paren == 0 => {
                let (start, block) = (level.segment_start, level.block);
                level.segment_start = i + 1;
                items_of(&mut tree, block).push(Item::Statement { start, end: i });
            }
            b'{' => {
                let idx = tree.blocks.len();
                let (header_start, parent) = (level.segment_start, level.block);
                tree.blocks.push(Block {
                    header_start,
                    open: i,
                    close: masked.len(),
                    items: Vec::new(),
                });
                items_of(&mut tree, parent).push(Item::Block(idx));
                levels.push(Level {
                    block: Some(idx),
                    segment_start: i + 1,
                    paren: 0,
                });
            }
            b'}' => {
                if levels.len() == 1 {
                    tree.stray_closers.push(i);
                    levels[0].segment_start = i + 1;
                    continue;
                }
                if let Some(done) = levels.pop() {
                    if let Some(idx) = done.block {
                        if !masked[done.segment_start..i].trim().is_empty() {
                            tree.blocks[idx].items.push(Item::Statement {
                                start: done.segment_start,
                                end: i,
                            });
                        }
                        tree.blocks[idx].close = i;
                    }
                }
                if let Some(parent) = levels.last_mut() {
                    parent.segment_start = i + 1;
                }
            }
            _ => {}
        }
    }

    while levels.len() > 1 {
        if let Some(Level {
            block: Some(idx), ..
        }) = levels.pop()
        {
            tree.unclosed.push(tree.blocks[idx].open);
        }
    }
    if let Some(level) = levels.first() {
        if !masked[level.segment_start..].trim().is_empty() {
            tree.top.push(Item::Statement {
                start: level.segment_start,
                end: masked.len(),
            });
        }
    }
    tree
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Module,
    ObjectLiteral,
    Class {
        class: usize,
        default_visibility: Visibility,
    },
}

/// A parsed function signature. Offsets are relative to the header text.
#[derive(Debug, Clone)]
struct Signature {
    name: String,
    name_offset: usize,
    params: (usize, usize),
    return_type: Option<String>,
    modifiers: Vec<String>,
    qualifier: Option<String>,
}

impl Signature {
    fn shift(mut self, by: usize) -> Self {
        self.name_offset += by;
        self.params = (self.params.0 + by, self.params.1 + by);
        self
    }

    fn has(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    Class,
    Struct,
    Opaque,
}

#[derive(Debug, Clone)]
struct ClassHeader {
    kind: ClassKind,
    name: String,
    name_offset: usize,
    modifiers: Vec<String>,
    superclass: Option<String>,
    interfaces: Vec<String>,
}

struct HeaderContext<'c> {
    language: Language,
    class_name: Option<&'c str>,
    /// Whether `name(...) {` without a keyword or type is a method here.
    allow_bare: bool,
}

static MODIFIERS: phf::Set<&'static str> = phf_set! {
    "public", "private", "protected", "internal", "static", "final",
    "abstract", "synchronized", "native", "strictfp", "default", "virtual",
    "override", "sealed", "async", "extern", "new", "unsafe", "partial",
    "readonly", "inline", "explicit", "constexpr", "consteval", "friend",
    "export", "declare", "get", "set", "transient", "volatile", "const",
    "let", "var", "*", "mutable", "open",
};

static CONTROL_WORDS: phf::Set<&'static str> = phf_set! {
    "if", "for", "while", "switch", "catch", "foreach", "using", "lock",
    "fixed", "checked", "unchecked", "synchronized", "try", "return",
    "function", "typeof", "sizeof", "new", "throw", "else", "do", "with",
    "base", "this", "super", "await", "yield", "case", "goto", "delete",
    "decltype", "alignof", "static_assert", "nameof", "when", "match",
    "namespace", "typename", "template", "co_return", "co_await", "and", "or",
    "not", "in", "of", "is", "as", "default",
};

static FIELD_SKIP: phf::Set<&'static str> = phf_set! {
    "using", "typedef", "friend", "return", "template", "static_assert",
    "namespace", "enum", "class", "struct", "event", "delegate", "import",
    "type", "interface", "package",
};

lazy_static! {
    static ref CLASS_RE: Regex = Regex::new(
        r"(?:^|[\s;])((?:(?:export|default|public|private|protected|internal|abstract|static|sealed|final|partial|declare|readonly|data|open)\s+)*)(class|struct|record|interface|enum)\s+([A-Za-z_$][\w$]*)"
    ).unwrap();
    static ref FUNCTION_KW_RE: Regex =
        Regex::new(r"\bfunction\b\s*\*?\s*([A-Za-z_$][\w$]*)?\s*(?:<[^>]*>)?\s*\(").unwrap();
    static ref TYPE_TOKEN_RE: Regex = Regex::new(r"^[\w:<>\[\],.?*&~\s]+$").unwrap();
    static ref CPP_TAIL_RE: Regex = Regex::new(
        r"^(?:const|override|final|noexcept|volatile|&|&&|\s|\(\s*\w*\s*\))*(?:->\s*([^:]+?))?\s*(?::.*)?$"
    ).unwrap();
    static ref JAVA_TAIL_RE: Regex = Regex::new(r"^throws\s+[\w.,\s<>]+$").unwrap();
    static ref ACCESS_LABEL_RE: Regex =
        Regex::new(r"\b(public|private|protected)\s*:(?:[^:]|$)").unwrap();
    static ref ANNOTATION_RE: Regex = Regex::new(r"@[\w.]+(?:\s*\([^()]*\))?").unwrap();
    static ref ATTRIBUTE_RE: Regex =
        Regex::new(r"(?m)^\s*\[[\w.]+(?:\([^()]*\))?(?:\s*,\s*[\w.]+(?:\([^()]*\))?)*\]").unwrap();
    static ref TEMPLATE_RE: Regex = Regex::new(r"\btemplate\s*<").unwrap();
    static ref IDENT_RE: Regex = Regex::new(r"^#?[A-Za-z_$][\w$]*$").unwrap();
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Replace each byte in `range` with a space, keeping newlines.
fn blank(text: &mut [u8], range: std::ops::Range<usize>) {
    for b in &mut text[range] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

/// Blank annotations, attributes, access labels and template prefixes,
/// keeping byte offsets.
fn clean_header(text: &str, language: Language) -> String {
    let mut bytes = text.as_bytes().to_vec();
    for m in ANNOTATION_RE.find_iter(text) {
        blank(&mut bytes, m.range());
    }
    if language == Language::CSharp {
        for m in ATTRIBUTE_RE.find_iter(text) {
            blank(&mut bytes, m.range());
        }
    }
    if language == Language::Cpp {
        for caps in ACCESS_LABEL_RE.captures_iter(text) {
            if let Some(word) = caps.get(1) {
                // label and its colon
                let end = text[word.end()..].find(':').map_or(word.end(), |p| word.end() + p + 1);
                blank(&mut bytes, word.start()..end);
            }
        }
        for m in TEMPLATE_RE.find_iter(text) {
            let open = m.end() - 1;
            if let Some(close) = matching_close(text, open) {
                blank(&mut bytes, m.start()..close + 1);
            }
        }
    }
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Offsets where a header line starts at bracket depth zero. Trying the
/// latest one first skips statements and annotations that precede the
/// declaration.
fn candidate_starts(header: &str) -> Vec<usize> {
    let mut starts = vec![0];
    let mut depth: i32 = 0;
    for (i, b) in header.bytes().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = (depth - 1).max(0),
            b'\n' if depth == 0 && !header[i + 1..].trim().is_empty() => starts.push(i + 1),
            _ => {}
        }
    }
    starts
}

fn matching_open(text: &str, close: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn first_top_level_paren(text: &str) -> Option<usize> {
    let mut depth: i32 = 0;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'[' | b'{' => depth += 1,
            b']' | b'}' => depth -= 1,
            b'(' if depth <= 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Offset of the first `=>` at bracket depth zero.
fn top_level_arrow(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_modifiers(prefix: &str) -> (Vec<String>, Vec<String>) {
    let mut modifiers = Vec::new();
    let mut rest = Vec::new();
    for token in split_top_level(prefix, ' ')
        .into_iter()
        .flat_map(|t| t.split('\n'))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        if rest.is_empty() && MODIFIERS.contains(token) {
            modifiers.push(token.to_string());
        } else if token.starts_with('*') && token.len() > 1 {
            modifiers.push("*".to_string());
        } else {
            rest.push(token.to_string());
        }
    }
    (modifiers, rest)
}

/// Byte offset just past the last char matching `pred`, or 0.
fn end_of_last(text: &str, pred: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .rev()
        .find(|&(_, c)| pred(c))
        .map_or(0, |(i, c)| i + c.len_utf8())
}

/// Identifier ending at `end` (exclusive).
fn ident_before(text: &str, end: usize) -> Option<(usize, &str)> {
    let slice = text[..end].trim_end();
    let start = end_of_last(slice, |c| !(is_ident_char(c) || c == '#'));
    let name = &slice[start..];
    (!name.is_empty() && !name.starts_with(|c: char| c.is_ascii_digit())).then_some((start, name))
}

/// `name = (params) =>`, `name: (params) =>` or `name = param =>`.
fn parse_arrow(left: &str, ctx: &HeaderContext) -> Option<Signature> {
    if !matches!(ctx.language, Language::JavaScript | Language::TypeScript) {
        return None;
    }
    let l = left.trim_end();

    // Last parenthesized group closing at depth zero.
    let mut group = None;
    let mut depth = 0i32;
    let mut open = 0;
    for (i, b) in l.bytes().enumerate() {
        match b {
            b'(' => {
                if depth == 0 {
                    open = i;
                }
                depth += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    group = Some((open, i));
                }
            }
            _ => {}
        }
    }

    let mut return_type = None;
    let (params, before_end) = match group {
        Some((o, c)) if l[c + 1..].trim().is_empty() => ((o + 1, c), o),
        Some((o, c)) if l[c + 1..].trim_start().starts_with(':') => {
            return_type = Some(clean_type(&l[c + 1..]));
            ((o + 1, c), o)
        }
        _ => {
            let (start, _) = ident_before(l, l.len())?;
            ((start, l.len()), start)
        }
    };

    let mut before = l[..before_end].trim_end();
    let mut modifiers = Vec::new();
    if let Some(stripped) = before.strip_suffix("async") {
        if stripped.is_empty() || stripped.ends_with(|c: char| !is_ident_char(c)) {
            modifiers.push("async".to_string());
            before = stripped.trim_end();
        }
    }

    let lhs_end = if let Some(lhs) = before.strip_suffix(':') {
        lhs.len()
    } else if let Some(lhs) = before.strip_suffix('=') {
        if lhs.ends_with(['=', '!', '<', '>']) {
            return None;
        }
        // drop a type annotation: `const handler: Handler = ...`
        let parts = split_top_level(lhs, ':');
        parts[0].len()
    } else {
        return None;
    };

    let (name_offset, name) = ident_before(before, lhs_end)?;
    if name == "exports" || CONTROL_WORDS.contains(name) {
        return None;
    }
    let (declared, _) = split_modifiers(&before[..name_offset]);
    modifiers.extend(declared);

    Some(Signature {
        name: name.trim_start_matches('#').to_string(),
        name_offset,
        params,
        return_type,
        modifiers,
        qualifier: None,
    })
}

/// `function name(...)` and anonymous `name = function (...)`.
fn parse_function_keyword(h: &str, ctx: &HeaderContext) -> Option<Option<Signature>> {
    let caps = FUNCTION_KW_RE.captures(h)?;
    let whole = caps.get(0)?;
    let open = whole.end() - 1;
    let Some(close) = matching_close(h, open) else {
        return Some(None);
    };
    let tail = h[close + 1..].trim();
    let return_type = match ctx.language {
        Language::TypeScript if tail.starts_with(':') => Some(clean_type(tail)),
        _ if tail.is_empty() => None,
        _ => return Some(None),
    };

    let prefix = &h[..whole.start()];
    let (mut modifiers, rest) = split_modifiers(prefix);
    if whole.as_str().contains('*') {
        modifiers.push("*".to_string());
    }

    let named = caps.get(1).map(|m| (m.start(), m.as_str()));
    let trimmed_prefix = prefix.trim_end();
    let assigned = trimmed_prefix
        .strip_suffix('=')
        .or_else(|| trimmed_prefix.strip_suffix(':'))
        .and_then(|lhs| ident_before(prefix, lhs.len()));

    let (name_offset, name) = match (assigned, named) {
        (Some(found), _) => found,
        (None, Some(found)) if rest.is_empty() => found,
        _ => return Some(None),
    };
    if name == "exports" {
        return Some(None);
    }
    Some(Some(Signature {
        name: name.to_string(),
        name_offset,
        params: (open + 1, close),
        return_type,
        modifiers,
        qualifier: None,
    }))
}

/// `[modifiers] [type] [Qualifier::]name(params) [tail]`
fn parse_named(h: &str, ctx: &HeaderContext) -> Option<Signature> {
    let script = matches!(ctx.language, Language::JavaScript | Language::TypeScript);
    if script {
        if let Some(result) = parse_function_keyword(h, ctx) {
            return result;
        }
    }

    let open = first_top_level_paren(h)?;
    let (name_start, name) = ident_before(h, open)?;
    let name_start = if name_start > 0 && h.as_bytes()[name_start - 1] == b'~' {
        name_start - 1
    } else {
        name_start
    };
    let name = &h[name_start..h[..open].trim_end().len()];
    if CONTROL_WORDS.contains(name.trim_start_matches('~')) {
        return None;
    }
    let close = matching_close(h, open)?;
    let tail = h[close + 1..].trim();

    let mut prefix = h[..name_start].trim_end();
    let mut qualifier = None;
    if let Some(p) = prefix.strip_suffix("::") {
        let q_start = end_of_last(p, |c| !is_ident_char(c));
        qualifier = Some(p[q_start..].to_string());
        prefix = p[..q_start].trim_end();
    }
    if prefix.contains(['=', '(', ')', ';', '"', '\'', '{', '}']) {
        return None;
    }

    let (modifiers, type_tokens) = split_modifiers(prefix);
    let mut return_type = None;

    match ctx.language {
        Language::JavaScript | Language::TypeScript => {
            if !type_tokens.is_empty() || !ctx.allow_bare {
                return None;
            }
            if !tail.is_empty() {
                if ctx.language == Language::TypeScript && tail.starts_with(':') {
                    return_type = Some(clean_type(tail));
                } else {
                    return None;
                }
            }
        }
        Language::Java | Language::CSharp | Language::Cpp => {
            if type_tokens
                .iter()
                .any(|t| !TYPE_TOKEN_RE.is_match(t) || CONTROL_WORDS.contains(t.as_str()))
            {
                return None;
            }
            let bare = name.trim_start_matches('~');
            let is_ctor = ctx.class_name == Some(bare) || qualifier.as_deref() == Some(bare);
            if type_tokens.is_empty() && !is_ctor {
                return None;
            }
            return_type = Some(if type_tokens.is_empty() {
                "void".to_string()
            } else {
                type_tokens.join(" ")
            });

            let tail_ok = match ctx.language {
                Language::Java => tail.is_empty() || JAVA_TAIL_RE.is_match(tail),
                Language::CSharp => tail.is_empty() || tail.starts_with(':') || tail.starts_with("where"),
                _ => match CPP_TAIL_RE.captures(tail) {
                    Some(caps) => {
                        if let Some(ret) = caps.get(1) {
                            return_type = Some(ret.as_str().trim().to_string());
                        }
                        true
                    }
                    None => false,
                },
            };
            if !tail_ok {
                return None;
            }
        }
        Language::Python => return None,
    }

    Some(Signature {
        name: name.to_string(),
        name_offset: name_start,
        params: (open + 1, close),
        return_type,
        modifiers,
        qualifier,
    })
}

/// Parse a block header as a function signature.
fn parse_function_header(header: &str, ctx: &HeaderContext) -> Option<(Signature, usize)> {
    for start in candidate_starts(header).into_iter().rev() {
        let h = &header[start..];
        let parsed = match h.trim_end().strip_suffix("=>") {
            Some(left) => parse_arrow(left, ctx),
            None => parse_named(h, ctx),
        };
        if let Some(sig) = parsed {
            return Some((sig.shift(start), start));
        }
    }
    None
}

fn parse_class_header(header: &str) -> Option<ClassHeader> {
    let caps = CLASS_RE.captures(header)?;
    let keyword = caps.get(2)?;
    let name = caps.get(3)?;
    if header[..keyword.start()].contains('(') {
        return None;
    }
    let kind = match keyword.as_str() {
        "class" | "record" => ClassKind::Class,
        "struct" => ClassKind::Struct,
        _ => ClassKind::Opaque,
    };
    let modifiers: Vec<String> = caps
        .get(1)
        .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let mut rest = header[name.end()..].trim_start();
    if rest.starts_with('<') {
        if let Some(close) = matching_close(rest, 0) {
            rest = rest[close + 1..].trim_start();
        }
    }
    if let Some(p) = rest.find('(') {
        // record primary constructor parameters
        if let Some(close) = matching_close(rest, p) {
            rest = rest[close + 1..].trim_start();
        }
    }
    let rest = rest.split(" where ").next().unwrap_or("");

    let strip_generics = |t: &str| -> String {
        let t = t.trim();
        t.find('<').map_or(t, |p| &t[..p]).trim().to_string()
    };
    let mut superclass = None;
    let mut interfaces = Vec::new();

    if let Some(after) = rest.strip_prefix(':') {
        for (i, part) in split_top_level(after, ',').into_iter().enumerate() {
            let cleaned: Vec<&str> = part
                .split_whitespace()
                .filter(|w| !matches!(*w, "public" | "private" | "protected" | "virtual"))
                .collect();
            let base = strip_generics(&cleaned.join(" "));
            if base.is_empty() {
                continue;
            }
            let looks_like_interface = base.len() > 1
                && base.starts_with('I')
                && base[1..].starts_with(|c: char| c.is_ascii_uppercase());
            if i == 0 && !looks_like_interface {
                superclass = Some(base);
            } else {
                interfaces.push(base);
            }
        }
    } else {
        let words = split_top_level(rest, ' ');
        let mut mode = "";
        for word in words.into_iter().map(str::trim).filter(|w| !w.is_empty()) {
            match word {
                "extends" | "implements" => mode = word,
                _ => {
                    for item in word.split(',').map(strip_generics).filter(|s| !s.is_empty()) {
                        if mode == "extends" && superclass.is_none() {
                            superclass = Some(item);
                        } else if !mode.is_empty() {
                            interfaces.push(item);
                        }
                    }
                }
            }
        }
    }

    Some(ClassHeader {
        kind,
        name: name.as_str().to_string(),
        name_offset: name.start(),
        modifiers,
        superclass,
        interfaces,
    })
}

fn looks_like_object_literal(header: &str) -> bool {
    let t = header.trim_end();
    t.ends_with(['=', ':', '(', ',', '[']) || t.ends_with("return") || t.ends_with("default")
}

struct BraceExtractor<'a> {
    language: Language,
    source: &'a str,
    masked: String,
    index: LineIndex,
    lines: Vec<&'a str>,
    out: ModuleStructure,
    qualified: Vec<(String, FunctionInfo)>,
}

impl<'a> BraceExtractor<'a> {
    fn new(language: Language, source: &'a str) -> Self {
        Self {
            language,
            source,
            masked: mask_non_code(source, language),
            index: LineIndex::new(source),
            lines: source.lines().collect(),
            out: ModuleStructure::default(),
            qualified: Vec::new(),
        }
    }

    fn run(mut self) -> ModuleStructure {
        let tree = build_block_tree(&self.masked);

        for &open in &tree.unclosed {
            self.out.diagnostics.push(Diagnostic::error(
                self.index.line_of(open),
                self.index.column_of(open),
                "unclosed '{'",
            ));
        }
        for &close in &tree.stray_closers {
            self.out.diagnostics.push(Diagnostic::error(
                self.index.line_of(close),
                self.index.column_of(close),
                "unmatched '}'",
            ));
        }

        self.walk(&tree, &tree.top, Scope::Module);
        self.attach_qualified();
        self.out
    }

    fn context(&self, scope: Scope) -> HeaderContext<'_> {
        match scope {
            Scope::Class { class, .. } => HeaderContext {
                language: self.language,
                class_name: self.out.classes.get(class).map(|c| c.name.as_str()),
                allow_bare: true,
            },
            Scope::ObjectLiteral => HeaderContext {
                language: self.language,
                class_name: None,
                allow_bare: true,
            },
            Scope::Module => HeaderContext {
                language: self.language,
                class_name: None,
                allow_bare: false,
            },
        }
    }

    fn walk(&mut self, tree: &BlockTree, items: &[Item], scope: Scope) {
        let mut access = match scope {
            Scope::Class {
                default_visibility, ..
            } => default_visibility,
            _ => Visibility::Public,
        };
        for item in items {
            match *item {
                Item::Statement { start, end } => {
                    if matches!(scope, Scope::Class { .. }) {
                        access = self.update_access(start, end, access);
                    }
                    self.visit_statement(start, end, scope, access);
                }
                Item::Block(idx) => {
                    let block = &tree.blocks[idx];
                    if matches!(scope, Scope::Class { .. }) {
                        access = self.update_access(block.header_start, block.open, access);
                    }
                    self.visit_block(tree, idx, scope, access);
                }
            }
        }
    }

    /// Follow C++ `public:` / `private:` labels.
    fn update_access(&self, start: usize, end: usize, current: Visibility) -> Visibility {
        if self.language != Language::Cpp {
            return current;
        }
        ACCESS_LABEL_RE
            .captures_iter(&self.masked[start..end])
            .last()
            .and_then(|caps| caps.get(1))
            .map_or(current, |m| match m.as_str() {
                "public" => Visibility::Public,
                "protected" => Visibility::Protected,
                _ => Visibility::Private,
            })
    }

    fn visit_block(&mut self, tree: &BlockTree, idx: usize, scope: Scope, access: Visibility) {
        let block = &tree.blocks[idx];
        let base = block.header_start;
        let header = clean_header(&self.masked[base..block.open], self.language);
        let body_end = (block.close + 1).min(self.masked.len());

        if let Some(class) = parse_class_header(&header) {
            if class.kind != ClassKind::Opaque {
                let class_idx = self.push_class(&class, base, block.close);
                let default_visibility = match (self.language, class.kind) {
                    (Language::Java, _) => Visibility::Internal,
                    (Language::CSharp, _) => Visibility::Private,
                    (Language::Cpp, ClassKind::Class) => Visibility::Private,
                    _ => Visibility::Public,
                };
                self.walk(
                    tree,
                    &block.items,
                    Scope::Class {
                        class: class_idx,
                        default_visibility,
                    },
                );
            }
            return;
        }

        let parsed = parse_function_header(&header, &self.context(scope));
        if let Some((sig, suffix_start)) = parsed {
            if let Scope::Class { class, .. } = scope {
                // JavaScript fields without semicolons end up in the header
                if suffix_start > 0 && matches!(self.language, Language::JavaScript | Language::TypeScript) {
                    for (offset, line) in line_offsets(&header[..suffix_start]) {
                        let props = self.parse_fields(line, base + offset, access);
                        self.out.classes[class].properties.extend(props);
                    }
                }
            }
            let func = self.build_function(&sig, base, block.open + 1, body_end, scope, access);
            self.place_function(func, sig.qualifier, scope);
            return;
        }

        match scope {
            Scope::Class { class, .. } => {
                // `public string Name { get; set; }`, `handler = {`
                let props = self.parse_fields(&header, base, access);
                self.out.classes[class].properties.extend(props);
            }
            _ => {
                let next = if looks_like_object_literal(&header) {
                    Scope::ObjectLiteral
                } else {
                    Scope::Module
                };
                self.walk(tree, &block.items, next);
            }
        }
    }

    fn visit_statement(&mut self, start: usize, end: usize, scope: Scope, access: Visibility) {
        let text = clean_header(&self.masked[start..end], self.language);
        if let Some(arrow) = top_level_arrow(&text) {
            let ctx = self.context(scope);
            let left = &text[..arrow];
            let parsed = match self.language {
                Language::JavaScript | Language::TypeScript => parse_arrow(left, &ctx),
                _ => parse_named(left, &ctx),
            };
            if let Some(sig) = parsed {
                let func = self.build_function(&sig, start, start + arrow + 2, end, scope, access);
                self.place_function(func, sig.qualifier, scope);
                return;
            }
        }
        if let Scope::Class { class, .. } = scope {
            let props = self.parse_fields(&text, start, access);
            self.out.classes[class].properties.extend(props);
        }
    }

    fn push_class(&mut self, header: &ClassHeader, base: usize, close: usize) -> usize {
        let start_line = self.index.line_of(base + header.name_offset);
        let end_line = self.index.line_of(close.min(self.source.len().saturating_sub(1)));
        let mut class = ClassInfo::new(&header.name, start_line, end_line);
        class.superclass = header.superclass.clone();
        class.interfaces = header.interfaces.clone();
        class.is_exported = match self.language {
            Language::JavaScript | Language::TypeScript => {
                header.modifiers.iter().any(|m| m == "export")
            }
            Language::Java | Language::CSharp => header.modifiers.iter().any(|m| m == "public"),
            _ => true,
        };
        self.out.classes.push(class);
        self.out.classes.len() - 1
    }

    fn build_function(
        &self,
        sig: &Signature,
        base: usize,
        body_start: usize,
        body_end: usize,
        scope: Scope,
        access: Visibility,
    ) -> FunctionInfo {
        let lang = self.language;
        let name_abs = base + sig.name_offset;
        let end_offset = body_end.saturating_sub(1).max(name_abs);
        let mut func = FunctionInfo::new(
            &sig.name,
            self.index.line_of(name_abs),
            self.index.line_of(end_offset.min(self.source.len().saturating_sub(1))),
        );

        let params_text = self
            .source
            .get(base + sig.params.0..base + sig.params.1)
            .unwrap_or("");
        func.parameters = parse_parameters(params_text, lang, false);
        func.return_type = sig.return_type.clone().unwrap_or_else(|| "any".to_string());
        let span_text = self.masked.get(name_abs..body_end).unwrap_or("");
        func.complexity = 1 + count_decision_points(span_text, lang);
        func.dependencies =
            collect_dependencies(self.masked.get(body_start..body_end).unwrap_or(""));
        func.is_async = sig.has("async");
        func.docstring = leading_doc_comment(&self.lines, func.start_line);

        let explicit_private = sig.has("private") || sig.name.starts_with('#');
        func.is_exported = match (scope, lang) {
            (Scope::Class { .. }, Language::JavaScript | Language::TypeScript) => !explicit_private,
            (Scope::Class { .. }, Language::Java | Language::CSharp) => sig.has("public"),
            (Scope::Class { .. }, _) => access == Visibility::Public,
            (_, Language::JavaScript | Language::TypeScript) => sig.has("export"),
            (_, Language::Cpp) => !sig.has("static"),
            _ => sig.has("public"),
        };
        func
    }

    fn place_function(&mut self, func: FunctionInfo, qualifier: Option<String>, scope: Scope) {
        match (scope, qualifier) {
            (Scope::Class { class, .. }, _) => self.out.classes[class].methods.push(func),
            (_, Some(owner)) => self.qualified.push((owner, func)),
            (_, None) => self.out.functions.push(func),
        }
    }

    /// Attach out-of-line `Owner::method` definitions to their class,
    /// creating the class when only its methods are in this file.
    fn attach_qualified(&mut self) {
        for (owner, func) in std::mem::take(&mut self.qualified) {
            match self.out.classes.iter_mut().find(|c| c.name == owner) {
                Some(class) => class.methods.push(func),
                None => {
                    let mut class = ClassInfo::new(&owner, func.start_line, func.end_line);
                    class.is_exported = true;
                    class.methods.push(func);
                    self.out.classes.push(class);
                }
            }
        }
        for class in &mut self.out.classes {
            if let Some(last) = class.methods.iter().map(|m| m.end_line).max() {
                if class.methods.iter().all(|m| m.start_line >= class.start_line) {
                    class.end_line = class.end_line.max(last);
                }
            }
        }
    }

    /// Parse field declarations from a class-level statement.
    fn parse_fields(&self, text: &str, base: usize, access: Visibility) -> Vec<Property> {
        let lead = text.len() - text.trim_start().len();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let cut = [top_level_arrow(trimmed), assignment_position(trimmed)]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(trimmed.len());
        let decl = trimmed[..cut].trim();
        if decl.is_empty() || decl.contains(['(', '{', '}']) {
            return Vec::new();
        }
        let value = assignment_position(trimmed)
            .filter(|&p| p == cut)
            .and_then(|p| self.source.get(base + lead + p + 1..base + lead + trimmed.len()))
            .map(str::trim);

        let (modifiers, rest) = split_modifiers(decl);
        if rest.first().is_some_and(|w| FIELD_SKIP.contains(w.as_str())) {
            return Vec::new();
        }
        let has = |m: &str| modifiers.iter().any(|x| x == m);
        let visibility = if has("public") {
            Visibility::Public
        } else if has("private") {
            Visibility::Private
        } else if has("protected") {
            Visibility::Protected
        } else if has("internal") {
            Visibility::Internal
        } else {
            access
        };
        let is_static = has("static") || (self.language == Language::CSharp && has("const"));

        match self.language {
            Language::JavaScript | Language::TypeScript => {
                let joined = rest.join(" ");
                let parts = split_top_level(&joined, ':');
                let name = parts[0].trim().trim_end_matches(['?', '!']);
                if !IDENT_RE.is_match(name) {
                    return Vec::new();
                }
                let type_name = parts
                    .get(1)
                    .map(|t| t.trim().to_string())
                    .or_else(|| value.map(|v| infer_type(v, self.language).to_string()))
                    .unwrap_or_else(|| "any".to_string());
                vec![Property {
                    name: name.trim_start_matches('#').to_string(),
                    type_name,
                    visibility: if name.starts_with('#') {
                        Visibility::Private
                    } else {
                        visibility
                    },
                    is_static,
                }]
            }
            _ => {
                let joined = rest.join(" ");
                let mut declarators = split_top_level(&joined, ',').into_iter();
                let Some(first) = declarators.next() else {
                    return Vec::new();
                };
                let tokens = split_top_level(first.trim(), ' ');
                let [type_tokens @ .., last] = tokens.as_slice() else {
                    return Vec::new();
                };
                if type_tokens.is_empty() {
                    return Vec::new();
                }
                let mut type_name = type_tokens.join(" ");
                let mut name = last.trim().to_string();
                while name.starts_with(['*', '&']) {
                    type_name.push(name.remove(0));
                }
                let mut names = vec![name];
                names.extend(declarators.map(|d| d.trim().trim_start_matches(['*', '&']).to_string()));
                names
                    .into_iter()
                    .filter(|n| IDENT_RE.is_match(n))
                    .map(|name| Property {
                        name,
                        type_name: type_name.clone(),
                        visibility,
                        is_static,
                    })
                    .collect()
            }
        }
    }
}

/// Non-blank lines of `text` with their byte offsets.
fn line_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    let mut lines = Vec::new();
    for line in text.split('\n') {
        if !line.trim().is_empty() {
            lines.push((offset, line));
        }
        offset += line.len() + 1;
    }
    lines
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

lazy_static! {
    static ref PY_DEF_RE: Regex =
        Regex::new(r"^([ \t]*)(async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap();
    static ref PY_CLASS_RE: Regex = Regex::new(r"^([ \t]*)class\s+([A-Za-z_]\w*)").unwrap();
    static ref PY_CLASS_ATTR_RE: Regex =
        Regex::new(r"^[ \t]*([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*(?:=([^=].*))?$").unwrap();
    static ref PY_SELF_ATTR_RE: Regex =
        Regex::new(r"^[ \t]*self\.([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=([^=].*)$").unwrap();
}

#[derive(Debug, Clone, Copy)]
enum PyEntry {
    Class(usize),
    Function { class: Option<usize> },
    Opaque,
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn python_visibility(name: &str) -> Visibility {
    if name.starts_with("__") && !name.ends_with("__") {
        Visibility::Private
    } else if name.starts_with('_') && !name.starts_with("__") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn is_public_python_name(name: &str) -> bool {
    !name.starts_with('_') || (name.starts_with("__") && name.ends_with("__"))
}

struct IndentExtractor<'a> {
    source: &'a str,
    masked: String,
    index: LineIndex,
    lines: Vec<&'a str>,
    out: ModuleStructure,
}

impl<'a> IndentExtractor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            masked: mask_non_code(source, Language::Python),
            index: LineIndex::new(source),
            lines: source.lines().collect(),
            out: ModuleStructure::default(),
        }
    }

    /// Bracket depth at the start of each line.
    fn line_depths(&self, masked_lines: &[&str]) -> (Vec<i32>, i32) {
        let mut depths = Vec::with_capacity(masked_lines.len());
        let mut depth = 0i32;
        for line in masked_lines {
            depths.push(depth);
            for b in line.bytes() {
                match b {
                    b'(' | b'[' | b'{' => depth += 1,
                    b')' | b']' | b'}' => depth = (depth - 1).max(0),
                    _ => {}
                }
            }
        }
        (depths, depth)
    }

    fn run(mut self) -> ModuleStructure {
        let masked = self.masked.clone();
        let mlines: Vec<&str> = masked.split('\n').collect();
        let (depths, final_depth) = self.line_depths(&mlines);
        if final_depth > 0 {
            let last = self.lines.len().max(1);
            self.out
                .diagnostics
                .push(Diagnostic::error(last, 1, "unclosed bracket at end of file"));
        }

        let mut stack: Vec<(usize, PyEntry)> = Vec::new();
        for i in 0..mlines.len() {
            let mline = mlines[i];
            if depths[i] > 0 || mline.trim().is_empty() {
                continue;
            }
            let indent = indent_width(mline);
            while stack.last().is_some_and(|(ind, _)| *ind >= indent) {
                stack.pop();
            }
            let parent = stack.last().map(|(_, e)| *e);

            if let Some(caps) = PY_DEF_RE.captures(mline) {
                let entry = self.visit_def(i, &caps, parent, &mlines, &depths);
                stack.push((indent, entry));
                continue;
            }
            if let Some(caps) = PY_CLASS_RE.captures(mline) {
                let entry = self.visit_class(i, &caps, parent, &mlines, &depths);
                stack.push((indent, entry));
                continue;
            }

            match parent {
                Some(PyEntry::Class(class)) => self.class_attribute(class, i, mline),
                Some(PyEntry::Function { class: Some(class) }) => self.self_attribute(class, i, mline),
                _ => {}
            }
        }
        self.out
    }

    /// Line index (0-based) where a header starting at `line` ends, i.e.
    /// where its top-level `:` is.
    fn header_end(&self, line: usize, open_offset: usize) -> (usize, usize) {
        let close = matching_close(&self.masked, open_offset).unwrap_or(open_offset);
        let colon = self.masked[close..]
            .find(':')
            .map_or(close, |p| close + p);
        (self.index.line_of(colon).saturating_sub(1).max(line), colon)
    }

    /// Last line (0-based) of a block whose header ends on `header_end`.
    fn block_end(&self, header_end: usize, colon: usize, indent: usize, mlines: &[&str], depths: &[i32]) -> usize {
        let inline_body = self
            .masked
            .get(colon + 1..)
            .and_then(|rest| rest.split('\n').next())
            .is_some_and(|rest| !rest.trim().is_empty());
        let mut last = header_end;
        for j in header_end + 1..mlines.len() {
            if mlines[j].trim().is_empty() {
                let original = self.lines.get(j).copied().unwrap_or("");
                if !original.trim().is_empty() && indent_width(original) > indent {
                    last = j;
                }
                continue;
            }
            if depths[j] > 0 {
                last = j;
                continue;
            }
            if indent_width(mlines[j]) <= indent {
                break;
            }
            last = j;
        }
        if inline_body && last == header_end {
            return header_end;
        }
        last
    }

    /// Byte offset just past the 0-based line `last`.
    fn line_end_offset(&self, last: usize) -> usize {
        if last + 2 > self.index.line_count() {
            self.masked.len()
        } else {
            self.index.line_start(last + 2)
        }
    }

    fn line_range_text(&self, first: usize, last: usize) -> &str {
        let start = self.index.line_start(first + 1);
        self.masked.get(start..self.line_end_offset(last)).unwrap_or("")
    }

    fn visit_def(
        &mut self,
        line: usize,
        caps: &regex::Captures,
        parent: Option<PyEntry>,
        mlines: &[&str],
        depths: &[i32],
    ) -> PyEntry {
        let class = match parent {
            None => None,
            Some(PyEntry::Class(idx)) => Some(idx),
            Some(_) => return PyEntry::Opaque,
        };
        let indent = caps.get(1).map_or(0, |m| indent_width(m.as_str()));
        let name = caps.get(3).map_or("", |m| m.as_str()).to_string();
        let line_start = self.index.line_start(line + 1);
        let open = line_start + caps.get(0).map_or(0, |m| m.end()) - 1;
        let close = matching_close(&self.masked, open);
        let (header_end, colon) = self.header_end(line, open);
        if !self.masked[close.unwrap_or(open)..].contains(':') {
            self.out.diagnostics.push(Diagnostic::error(
                line + 1,
                1,
                format!("definition of '{}' is missing ':'", name),
            ));
        }
        let end = self.block_end(header_end, colon, indent, mlines, depths);

        let mut func = FunctionInfo::new(&name, line + 1, end + 1);
        if let Some(close) = close {
            func.parameters =
                parse_parameters(self.source.get(open + 1..close).unwrap_or(""), Language::Python, class.is_some());
            let annotation = self.masked.get(close + 1..colon).unwrap_or("").trim();
            func.return_type = if annotation.starts_with("->") {
                clean_type(annotation)
            } else {
                "any".to_string()
            };
        }
        func.is_async = caps.get(2).is_some();
        func.complexity = 1 + count_decision_points(self.line_range_text(line, end), Language::Python);
        let body_end = self.line_end_offset(end);
        func.dependencies =
            collect_dependencies(self.masked.get(colon + 1..body_end).unwrap_or(""));
        if end > header_end {
            func.docstring = python_docstring(&self.lines, header_end + 2);
        }

        match class {
            Some(idx) => {
                let class_public = self.out.classes[idx].is_exported;
                func.is_exported = class_public && is_public_python_name(&name);
                self.out.classes[idx].methods.push(func);
            }
            None => {
                func.is_exported = !name.starts_with('_');
                self.out.functions.push(func);
            }
        }
        PyEntry::Function { class }
    }

    fn visit_class(
        &mut self,
        line: usize,
        caps: &regex::Captures,
        parent: Option<PyEntry>,
        mlines: &[&str],
        depths: &[i32],
    ) -> PyEntry {
        if !matches!(parent, None | Some(PyEntry::Class(_))) {
            return PyEntry::Opaque;
        }
        let indent = caps.get(1).map_or(0, |m| indent_width(m.as_str()));
        let name = caps.get(2).map_or("", |m| m.as_str()).to_string();
        let line_start = self.index.line_start(line + 1);
        let name_end = line_start + caps.get(0).map_or(0, |m| m.end());

        let after = self.masked.get(name_end..).unwrap_or("");
        let bases_open = after
            .find(|c: char| !c.is_whitespace())
            .filter(|&p| after.as_bytes()[p] == b'(')
            .map(|p| name_end + p);

        let (header_end, colon) = match bases_open {
            Some(open) => self.header_end(line, open),
            None => {
                let colon = after.find(':').map_or(name_end, |p| name_end + p);
                (line, colon)
            }
        };
        let end = self.block_end(header_end, colon, indent, mlines, depths);

        let mut class = ClassInfo::new(&name, line + 1, end + 1);
        class.is_exported = !name.starts_with('_');
        if let Some(open) = bases_open {
            if let Some(close) = matching_close(&self.masked, open) {
                let bases: Vec<String> = split_top_level(&self.masked[open + 1..close], ',')
                    .into_iter()
                    .map(str::trim)
                    .filter(|b| !b.is_empty() && !b.contains('=') && *b != "object")
                    .map(str::to_string)
                    .collect();
                let mut bases = bases.into_iter();
                class.superclass = bases.next();
                class.interfaces = bases.collect();
            }
        }
        self.out.classes.push(class);
        PyEntry::Class(self.out.classes.len() - 1)
    }

    fn class_attribute(&mut self, class: usize, line: usize, mline: &str) {
        let Some(caps) = PY_CLASS_ATTR_RE.captures(mline) else { return };
        let annotation = caps.get(2).map(|m| m.as_str().trim().to_string());
        let value = caps.get(3).and_then(|m| self.original_span(line, m.range()));
        if annotation.is_none() && value.is_none() {
            return;
        }
        let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let type_name = annotation
            .clone()
            .or_else(|| value.map(|v| infer_type(v, Language::Python).to_string()))
            .unwrap_or_else(|| "any".to_string());
        let properties = &mut self.out.classes[class].properties;
        if properties.iter().any(|p| p.name == name) {
            return;
        }
        properties.push(Property {
            visibility: python_visibility(&name),
            name,
            type_name,
            // annotated-only names are instance fields (dataclass style)
            is_static: value.is_some(),
        });
    }

    fn self_attribute(&mut self, class: usize, line: usize, mline: &str) {
        let Some(caps) = PY_SELF_ATTR_RE.captures(mline) else { return };
        let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let annotation = caps.get(2).map(|m| m.as_str().trim().to_string());
        let value = caps.get(3).and_then(|m| self.original_span(line, m.range()));
        let type_name = annotation
            .or_else(|| value.map(|v| infer_type(v, Language::Python).to_string()))
            .unwrap_or_else(|| "any".to_string());
        let properties = &mut self.out.classes[class].properties;
        if properties.iter().any(|p| p.name == name) {
            return;
        }
        properties.push(Property {
            visibility: python_visibility(&name),
            name,
            type_name,
            is_static: false,
        });
    }

    /// Original text for a byte range of a masked line.
    fn original_span(&self, line: usize, range: std::ops::Range<usize>) -> Option<&'a str> {
        let original: &'a str = *self.lines.get(line)?;
        original.get(range).map(str::trim).filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(funcs: &[FunctionInfo]) -> Vec<&str> {
        funcs.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_js_single_line_function() {
        let src = "function add(a,b){ if(a<0){throw new Error('x');} return a+b; }";
        let out = extract(Language::JavaScript, src);
        assert_eq!(out.functions.len(), 1);
        let add = &out.functions[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.complexity, 2);
        assert_eq!(add.parameters.len(), 2);
        assert_eq!((add.start_line, add.end_line), (1, 1));
    }

    #[test]
    fn test_js_arrow_and_expression_functions() {
        let src = r#"
export const fetchUser = async (id) => {
  const res = await http.get(`/users/${id}`);
  return parse(res);
};
const double = x => x * 2;
const api = {
  list(page = 1) { return http.get('/items'); },
  remove: function (id) { return http.del(id); },
};
items.forEach((item) => { render(item); });
"#;
        let out = extract(Language::JavaScript, src);
        assert_eq!(names(&out.functions), vec!["fetchUser", "double", "list", "remove"]);
        let fetch = &out.functions[0];
        assert!(fetch.is_async);
        assert!(fetch.is_exported);
        assert_eq!((fetch.start_line, fetch.end_line), (2, 5));
        assert!(fetch.dependencies.contains("http.get"));
        assert!(fetch.dependencies.contains("parse"));
        assert_eq!(out.functions[2].parameters[0].default_value.as_deref(), Some("1"));
    }

    #[test]
    fn test_ts_class_members() {
        let src = r#"
export class UserService extends BaseService implements Disposable {
  private cache: Map<string, User> = new Map();
  static instances = 0;

  constructor(private readonly repo: Repo) {
    super();
  }

  async find(id: number): Promise<User | undefined> {
    if (this.cache.has(String(id))) {
      return this.cache.get(String(id));
    }
    return this.repo.load(id);
  }

  private reset(): void {
    this.cache.clear();
  }
}
"#;
        let out = extract(Language::TypeScript, src);
        assert_eq!(out.classes.len(), 1);
        let class = &out.classes[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.superclass.as_deref(), Some("BaseService"));
        assert_eq!(class.interfaces, vec!["Disposable"]);
        assert!(class.is_exported);
        assert_eq!(names(&class.methods), vec!["constructor", "find", "reset"]);

        let find = &class.methods[1];
        assert_eq!(find.return_type, "Promise<User | undefined>");
        assert!(find.is_async);
        assert_eq!(find.complexity, 2);
        assert!(!class.methods[2].is_exported, "private methods are not exported");

        let props: Vec<_> = class.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(props, vec!["cache", "instances"]);
        assert_eq!(class.properties[0].visibility, Visibility::Private);
        assert!(class.properties[1].is_static);
        assert_eq!(class.properties[1].type_name, "number");
    }

    #[test]
    fn test_java_class() {
        let src = r#"
package com.example;

import java.util.List;

public class OrderService extends Base implements Service, Auditable {
    private final List<Order> orders;
    int retries = 3;

    /** Creates the service. */
    public OrderService(List<Order> orders) {
        this.orders = orders;
    }

    @Override
    public double total(String customer) throws IllegalStateException {
        double sum = 0;
        for (Order o : orders) {
            if (o.customer().equals(customer) && o.isPaid()) {
                sum += o.amount();
            }
        }
        return sum;
    }

    private void log(String msg) {
        System.out.println(msg);
    }
}
"#;
        let out = extract(Language::Java, src);
        let class = &out.classes[0];
        assert_eq!(class.name, "OrderService");
        assert_eq!(class.superclass.as_deref(), Some("Base"));
        assert_eq!(class.interfaces, vec!["Service", "Auditable"]);
        assert_eq!(names(&class.methods), vec!["OrderService", "total", "log"]);

        let ctor = &class.methods[0];
        assert_eq!(ctor.docstring.as_deref(), Some("Creates the service."));
        assert_eq!(ctor.return_type, "void");

        let total = &class.methods[1];
        assert_eq!(total.return_type, "double");
        assert_eq!(total.complexity, 4, "for + if + &&");
        assert!(total.is_exported);
        assert!(!class.methods[2].is_exported);

        assert_eq!(class.properties.len(), 2);
        assert_eq!(class.properties[0].type_name, "List<Order>");
        assert_eq!(class.properties[1].visibility, Visibility::Internal);
    }

    #[test]
    fn test_cpp_access_and_out_of_line_methods() {
        let src = r#"
#include <vector>

class Stack {
public:
    Stack();
    int size() const { return n_; }
private:
    std::vector<int> data_;
    int n_ = 0;
};

void Stack::push(int v) {
    if (n_ > 100) {
        throw std::runtime_error("full");
    }
    data_.push_back(v);
}

static int helper(int x) { return x * 2; }

TEST(StackTest, Push) {
    Stack s;
}
"#;
        let out = extract(Language::Cpp, src);
        assert_eq!(names(&out.functions), vec!["helper"]);
        assert!(!out.functions[0].is_exported, "static functions are file-local");

        let class = &out.classes[0];
        assert_eq!(names(&class.methods), vec!["size", "push"]);
        assert!(class.methods[0].is_exported);
        assert_eq!(class.methods[1].complexity, 2);
        let props: Vec<_> = class.properties.iter().map(|p| (p.name.as_str(), p.visibility)).collect();
        assert_eq!(props, vec![("data_", Visibility::Private), ("n_", Visibility::Private)]);
    }

    #[test]
    fn test_csharp_class() {
        let src = r#"
using System;

namespace Shop
{
    /// <summary>
    /// Computes prices.
    /// </summary>
    public class PriceCalculator : BaseCalculator, IPricing
    {
        public string Currency { get; set; } = "USD";
        private readonly decimal _rate;

        public PriceCalculator(decimal rate) : base()
        {
            _rate = rate;
        }

        [Obsolete]
        public async Task<decimal> ComputeAsync(decimal amount, bool vip = false)
        {
            var total = amount > 100 ? amount * _rate : amount;
            if (vip || amount < 0)
            {
                total = await discounts.ApplyAsync(total);
            }
            return total;
        }

        public decimal Double(decimal x) => x * 2;
    }
}
"#;
        let out = extract(Language::CSharp, src);
        let class = &out.classes[0];
        assert_eq!(class.name, "PriceCalculator");
        assert_eq!(class.superclass.as_deref(), Some("BaseCalculator"));
        assert_eq!(class.interfaces, vec!["IPricing"]);
        assert_eq!(names(&class.methods), vec!["PriceCalculator", "ComputeAsync", "Double"]);

        let compute = &class.methods[1];
        assert!(compute.is_async);
        assert_eq!(compute.return_type, "Task<decimal>");
        assert_eq!(compute.complexity, 4, "ternary + if + ||");
        assert_eq!(compute.parameters[1].default_value.as_deref(), Some("false"));
        assert!(compute.dependencies.contains("discounts.ApplyAsync"));

        let props: Vec<_> = class.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(props, vec!["Currency", "_rate"]);
        assert_eq!(class.properties[1].visibility, Visibility::Private);
    }

    #[test]
    fn test_unbalanced_braces_are_diagnosed() {
        let src = "function ok() { return 1; }\nfunction broken() {\n  if (x) {\n";
        let out = extract(Language::JavaScript, src);
        assert!(out.diagnostics.iter().any(|d| d.message.contains("unclosed")));
        assert!(out.functions.iter().any(|f| f.name == "ok"));
    }

    #[test]
    fn test_python_structure() {
        let src = r#"
import os


def load(path: str, retries=3) -> dict:
    """Load a file."""
    for attempt in range(retries):
        if os.path.exists(path) and attempt:
            return read_json(path)
    return {}


class Repo(Base, Mixin):
    table = "repos"
    name: str

    def __init__(self, client):
        self.client = client
        self._cache = {}

    async def fetch(self, key):
        def inner():
            return 1
        try:
            return await self.client.get(key)
        except KeyError:
            return None

    def _private(self):
        pass


def _helper(): return 1
"#;
        let out = extract(Language::Python, src);
        assert_eq!(names(&out.functions), vec!["load", "_helper"]);
        let load = &out.functions[0];
        assert_eq!((load.start_line, load.end_line), (5, 10));
        assert_eq!(load.return_type, "dict");
        assert_eq!(load.complexity, 4, "for + if + and");
        assert_eq!(load.docstring.as_deref(), Some("Load a file."));
        assert!(load.dependencies.contains("read_json"));
        assert!(load.is_exported);
        assert!(!out.functions[1].is_exported);
        assert_eq!((out.functions[1].start_line, out.functions[1].end_line), (33, 33));

        let repo = &out.classes[0];
        assert_eq!(repo.superclass.as_deref(), Some("Base"));
        assert_eq!(repo.interfaces, vec!["Mixin"]);
        assert_eq!(names(&repo.methods), vec!["__init__", "fetch", "_private"]);
        assert_eq!(repo.methods[0].parameters.len(), 1, "self is dropped");
        let fetch = &repo.methods[1];
        assert!(fetch.is_async);
        assert_eq!(fetch.complexity, 2, "except");
        assert!(fetch.dependencies.contains("client.get"));
        assert!(!repo.methods[2].is_exported);

        let props: Vec<_> = repo.properties.iter().map(|p| (p.name.as_str(), p.is_static)).collect();
        assert_eq!(
            props,
            vec![("table", true), ("name", false), ("client", false), ("_cache", false)]
        );
    }

    #[test]
    fn test_python_missing_colon() {
        let src = "def broken(x)\n    return x\n";
        let out = extract(Language::Python, src);
        assert!(out.diagnostics.iter().any(|d| d.message.contains("missing ':'")));
    }
}
