//! Text-level parsing of signatures, doc comments and call targets.
//!
//! Both the grammar-aware and the heuristic extractors locate declarations
//! their own way and then hand the parameter list, body and surrounding
//! lines to these helpers, so the two paths agree on the details.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use super::Parameter;
use crate::language::Language;

/// Split `text` on `sep` at bracket depth zero.
///
/// `=>` and `->` do not close angle brackets.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' => depth = (depth - 1).max(0),
            '>' => {
                let arrow = i > 0 && matches!(bytes[i - 1], b'=' | b'-');
                if !arrow {
                    depth = (depth - 1).max(0);
                }
            }
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Byte offset of the bracket matching the opening one at `open`.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let (opener, closer) = match bytes.get(open)? {
        b'(' => (b'(', b')'),
        b'[' => (b'[', b']'),
        b'{' => (b'{', b'}'),
        b'<' => (b'<', b'>'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == opener {
            depth += 1;
        } else if b == closer {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Position of the first top-level `=` that is an assignment, not part of
/// `==`, `=>`, `<=`, `>=` or `!=`.
pub(crate) fn assignment_position(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' | b'>' => depth = (depth - 1).max(0),
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next != b'=' && next != b'>' && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

static PARAM_MODIFIERS: phf::Set<&'static str> = phf_set! {
    "final", "const", "ref", "out", "in", "params", "this", "readonly",
    "public", "private", "protected", "override", "volatile", "register",
    "mutable", "scoped",
};

lazy_static! {
    static ref ANNOTATION_RE: Regex = Regex::new(r"@[\w.]+(\([^)]*\))?\s*").unwrap();
    static ref ATTRIBUTE_RE: Regex = Regex::new(r"^\s*\[[^\]]*\]\s*").unwrap();
}

/// Parse the text between a parameter list's parentheses.
///
/// `drop_receiver` removes a leading `self`/`cls` (Python methods).
pub fn parse_parameters(text: &str, language: Language, drop_receiver: bool) -> Vec<Parameter> {
    let trimmed = text.trim();
    if trimmed.is_empty() || (language == Language::Cpp && trimmed == "void") {
        return Vec::new();
    }

    let mut params = Vec::new();
    for (idx, raw) in split_top_level(trimmed, ',').into_iter().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let param = match language {
            Language::Python => parse_python_param(raw),
            Language::JavaScript | Language::TypeScript => parse_script_param(raw, language),
            Language::Java | Language::CSharp | Language::Cpp => {
                parse_typed_param(raw, language, idx)
            }
        };
        if let Some(param) = param {
            params.push(param);
        }
    }

    if drop_receiver {
        if let Some(first) = params.first() {
            if first.name == "self" || first.name == "cls" {
                params.remove(0);
            }
        }
    }
    params
}

fn parse_python_param(raw: &str) -> Option<Parameter> {
    if raw == "*" || raw == "/" {
        return None;
    }
    let (decl, default) = split_default(raw);
    let (name_part, annotation) = match decl.split_once(':') {
        Some((n, t)) => (n.trim(), Some(t.trim().to_string())),
        None => (decl.trim(), None),
    };
    let (name, star_type) = if let Some(n) = name_part.strip_prefix("**") {
        (n, Some("dict"))
    } else if let Some(n) = name_part.strip_prefix('*') {
        (n, Some("tuple"))
    } else {
        (name_part, None)
    };
    let type_name = annotation
        .or_else(|| star_type.map(str::to_string))
        .or_else(|| default.as_deref().map(|d| infer_type(d, Language::Python).to_string()))
        .unwrap_or_else(|| "any".to_string());
    Some(Parameter {
        name: name.to_string(),
        type_name,
        optional: default.is_some() || star_type.is_some(),
        default_value: default,
    })
}

fn parse_script_param(raw: &str, language: Language) -> Option<Parameter> {
    let raw = ANNOTATION_RE.replace_all(raw, "");
    let (decl, default) = split_default(&raw);
    let mut decl = decl.trim();
    while let Some((first, rest)) = decl.split_once(char::is_whitespace) {
        if PARAM_MODIFIERS.contains(first) {
            decl = rest.trim_start();
        } else {
            break;
        }
    }

    let rest_param = decl.starts_with("...");
    let decl = decl.trim_start_matches("...");
    let (name_part, annotation) = match split_top_level(decl, ':').as_slice() {
        [name, ty, ..] => (name.trim(), Some(ty.trim().to_string())),
        _ => (decl.trim(), None),
    };
    let optional_marker = name_part.ends_with('?');
    let name = name_part.trim_end_matches('?').trim();
    if name.is_empty() {
        return None;
    }
    let type_name = annotation
        .or_else(|| rest_param.then(|| "array".to_string()))
        .or_else(|| default.as_deref().map(|d| infer_type(d, language).to_string()))
        .unwrap_or_else(|| "any".to_string());
    Some(Parameter {
        name: name.to_string(),
        type_name,
        optional: optional_marker || default.is_some() || rest_param,
        default_value: default,
    })
}

fn parse_typed_param(raw: &str, language: Language, idx: usize) -> Option<Parameter> {
    let raw = ANNOTATION_RE.replace_all(raw, "");
    let raw = ATTRIBUTE_RE.replace(&raw, "");
    let (decl, default) = split_default(&raw);
    let decl = decl.trim();
    if decl == "..." {
        return Some(Parameter {
            name: "args".to_string(),
            type_name: "...".to_string(),
            optional: true,
            default_value: None,
        });
    }

    let tokens: Vec<&str> = split_top_level(decl, ' ')
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !PARAM_MODIFIERS.contains(t))
        .collect();
    let variadic = decl.contains("...");

    let (mut type_name, mut name) = match tokens.as_slice() {
        [] => return None,
        [only] => (only.to_string(), format!("arg{}", idx)),
        [init @ .., last] => (init.join(" "), last.to_string()),
    };

    // `int *p`, `const Foo &f`, `int values[]`
    while name.starts_with('*') || name.starts_with('&') {
        type_name.push(name.remove(0));
    }
    if let Some(pos) = name.find('[') {
        type_name.push_str(&name[pos..]);
        name.truncate(pos);
    }
    let name = name.trim_start_matches("...").to_string();
    if language == Language::Java && variadic {
        type_name = type_name.trim_end_matches("...").to_string() + "...";
    }

    Some(Parameter {
        name,
        type_name: type_name.trim().to_string(),
        optional: default.is_some() || variadic,
        default_value: default,
    })
}

fn split_default(raw: &str) -> (String, Option<String>) {
    match assignment_position(raw) {
        Some(pos) => (
            raw[..pos].trim().to_string(),
            Some(raw[pos + 1..].trim().to_string()),
        ),
        None => (raw.trim().to_string(), None),
    }
}

/// Infer a type name from a default-value literal.
pub fn infer_type(value: &str, language: Language) -> &'static str {
    let v = value.trim();
    let python = language == Language::Python;
    if v.parse::<i64>().is_ok() {
        return if python { "int" } else { "number" };
    }
    if v.parse::<f64>().is_ok() {
        return if python { "float" } else { "number" };
    }
    if v.starts_with('"') || v.starts_with('\'') || v.starts_with('`') {
        return if python { "str" } else { "string" };
    }
    match v {
        "true" | "false" => "boolean",
        "True" | "False" => "bool",
        _ if v.starts_with('[') => {
            if python {
                "list"
            } else {
                "array"
            }
        }
        _ if v.starts_with('{') => {
            if python {
                "dict"
            } else {
                "object"
            }
        }
        _ => "any",
    }
}

/// Normalize a return-type annotation: strips `:` and `->` prefixes.
pub fn clean_type(raw: &str) -> String {
    let t = raw.trim();
    let t = t.strip_prefix(':').unwrap_or(t);
    let t = t.trim().strip_prefix("->").unwrap_or(t);
    t.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Doc comment written directly above a declaration.
///
/// Recognizes `/** ... */` blocks and runs of `///` or `//` lines.
/// Annotation and attribute lines between the comment and the declaration
/// are skipped. `decl_line` is 1-indexed.
pub fn leading_doc_comment(lines: &[&str], decl_line: usize) -> Option<String> {
    let mut idx = decl_line.checked_sub(1)?;
    while idx > 0 {
        let above = lines.get(idx - 1)?.trim();
        if above.starts_with('@') || (above.starts_with('[') && above.ends_with(']')) {
            idx -= 1;
        } else {
            break;
        }
    }
    if idx == 0 {
        return None;
    }

    let last = lines[idx - 1].trim();
    let mut collected: Vec<String> = Vec::new();

    if last.ends_with("*/") {
        let mut i = idx;
        while i > 0 {
            i -= 1;
            let line = lines[i].trim();
            let started = line.starts_with("/*");
            let text = line
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim()
                .trim_start_matches('*')
                .trim();
            if !text.is_empty() {
                collected.push(text.to_string());
            }
            if started {
                break;
            }
        }
    } else if last.starts_with("//") {
        let mut i = idx;
        while i > 0 && lines[i - 1].trim().starts_with("//") {
            i -= 1;
            let text = lines[i].trim().trim_start_matches('/').trim();
            if !text.is_empty() && !text.starts_with('<') {
                collected.push(text.to_string());
            } else if let Some(inner) = strip_xml_tags(text) {
                collected.push(inner);
            }
        }
    } else {
        return None;
    }

    collected.reverse();
    let doc = collected.join("\n");
    (!doc.is_empty()).then_some(doc)
}

fn strip_xml_tags(text: &str) -> Option<String> {
    lazy_static! {
        static ref TAG_RE: Regex = Regex::new(r"</?\w+[^>]*>").unwrap();
    }
    let stripped = TAG_RE.replace_all(text, "").trim().to_string();
    (!stripped.is_empty()).then_some(stripped)
}

/// Python docstring: the first statement of a body when it is a string.
/// `body_line` is the 1-indexed line where the body starts.
pub fn python_docstring(lines: &[&str], body_line: usize) -> Option<String> {
    let first = (body_line.saturating_sub(1)..lines.len()).find(|&i| !lines[i].trim().is_empty())?;
    let line = lines[first].trim();
    let line = line.trim_start_matches(|c: char| matches!(c, 'r' | 'u' | 'R' | 'U'));
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| line.starts_with(q))?;

    let after_open = &line[quote.len()..];
    if let Some(end) = after_open.find(quote) {
        return Some(after_open[..end].trim().to_string());
    }
    if quote.len() == 1 {
        return None;
    }

    let mut parts = vec![after_open.trim().to_string()];
    for raw in lines.iter().skip(first + 1) {
        let t = raw.trim();
        if let Some(end) = t.find(quote) {
            parts.push(t[..end].trim().to_string());
            break;
        }
        parts.push(t.to_string());
    }
    let doc = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Some(doc)
}

static CALL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "for", "while", "switch", "catch", "return", "function", "typeof",
    "sizeof", "alignof", "decltype", "delete", "super", "this", "self",
    "await", "throw", "else", "do", "try", "with", "elif", "except", "lambda",
    "not", "and", "or", "in", "is", "foreach", "using", "lock", "fixed",
    "nameof", "default", "static_assert", "assert", "yield", "void", "base",
    "synchronized", "def", "class", "new", "raise", "import", "from",
    "instanceof", "checked", "unchecked", "when", "match", "case",
};

lazy_static! {
    static ref CALL_RE: Regex = Regex::new(
        r"(?:\b(new|def|function|class|fun)\s+)?([A-Za-z_$][\w$]*(?:\s*(?:\?\.|\.|::|->)\s*[A-Za-z_$][\w$]*)*)\s*\("
    )
    .unwrap();
    static ref SEPARATOR_RE: Regex = Regex::new(r"\s*(?:\?\.|\.|::|->)\s*").unwrap();
}

const RECEIVERS: &[&str] = &["this", "self", "cls", "super", "base"];

/// Distinct call targets referenced in a masked function body.
///
/// Keywords, constructor calls and raised exception types are not counted;
/// builtins such as `len` or `JSON.parse` are. Receiver prefixes (`this.`,
/// `self.`) are dropped.
pub fn collect_dependencies(masked_body: &str) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for caps in CALL_RE.captures_iter(masked_body) {
        if caps.get(1).is_some() {
            continue;
        }
        let Some(chain) = caps.get(2) else { continue };
        let preceded_by_member = chain.start() > 0
            && matches!(masked_body.as_bytes()[chain.start() - 1], b'.' | b'>' | b':');
        if preceded_by_member {
            continue;
        }

        let normalized = SEPARATOR_RE.replace_all(chain.as_str(), ".");
        let mut segments: Vec<&str> = normalized.split('.').collect();
        while segments.len() > 1 && RECEIVERS.contains(&segments[0]) {
            segments.remove(0);
        }
        let root = segments[0];
        if CALL_KEYWORDS.contains(root) {
            continue;
        }
        if segments.len() == 1 && (root.ends_with("Error") || root.ends_with("Exception")) {
            continue;
        }
        deps.insert(segments.join("."));
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level_respects_generics() {
        let parts = split_top_level("Map<String, Integer> m, int x", ',');
        assert_eq!(parts, vec!["Map<String, Integer> m", " int x"]);
    }

    #[test]
    fn test_python_params() {
        let params = parse_parameters("self, a: int, b=2, *args, **kwargs", Language::Python, true);
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "args", "kwargs"]);
        assert_eq!(params[0].type_name, "int");
        assert_eq!(params[1].type_name, "int", "inferred from default");
        assert!(params[1].optional);
        assert_eq!(params[1].default_value.as_deref(), Some("2"));
    }

    #[test]
    fn test_typescript_params() {
        let params = parse_parameters(
            "id: number, name?: string, opts: Record<string, number> = {}, ...rest: string[]",
            Language::TypeScript,
            false,
        );
        assert_eq!(params.len(), 4);
        assert_eq!(params[0].type_name, "number");
        assert!(params[1].optional);
        assert_eq!(params[2].type_name, "Record<string, number>");
        assert!(params[3].optional);
        assert_eq!(params[3].name, "rest");
    }

    #[test]
    fn test_java_params() {
        let params = parse_parameters(
            "@NotNull final String name, List<Integer> values, int... more",
            Language::Java,
            false,
        );
        assert_eq!(params[0].name, "name");
        assert_eq!(params[0].type_name, "String");
        assert_eq!(params[1].type_name, "List<Integer>");
        assert_eq!(params[2].name, "more");
        assert!(params[2].optional);
    }

    #[test]
    fn test_cpp_params() {
        let params = parse_parameters(
            "const std::string &name, int *out, double scale = 1.0",
            Language::Cpp,
            false,
        );
        assert_eq!(params[0].name, "name");
        assert_eq!(params[0].type_name, "std::string&");
        assert_eq!(params[1].type_name, "int*");
        assert_eq!(params[2].default_value.as_deref(), Some("1.0"));
        assert!(parse_parameters("void", Language::Cpp, false).is_empty());
    }

    #[test]
    fn test_csharp_params() {
        let params = parse_parameters("int id, params string[] tags, ref int count", Language::CSharp, false);
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "tags", "count"]);
        assert_eq!(params[1].type_name, "string[]");
    }

    #[test]
    fn test_clean_type() {
        assert_eq!(clean_type(": Promise<User>"), "Promise<User>");
        assert_eq!(clean_type("-> Optional[str]"), "Optional[str]");
    }

    #[test]
    fn test_leading_jsdoc() {
        let lines = vec!["/**", " * Adds two numbers.", " */", "function add(a, b) {"];
        assert_eq!(leading_doc_comment(&lines, 4).as_deref(), Some("Adds two numbers."));
    }

    #[test]
    fn test_leading_doc_skips_annotations() {
        let lines = vec!["/** Runs it. */", "@Override", "public void run() {"];
        assert_eq!(leading_doc_comment(&lines, 3).as_deref(), Some("Runs it."));
    }

    #[test]
    fn test_csharp_xml_doc() {
        let lines = vec!["/// <summary>", "/// Gets a user.", "/// </summary>", "public User Get(int id)"];
        assert_eq!(leading_doc_comment(&lines, 4).as_deref(), Some("Gets a user."));
    }

    #[test]
    fn test_python_docstring() {
        let lines = vec!["def f():", "    \"\"\"Compute it.", "", "    More.\"\"\"", "    return 1"];
        assert_eq!(python_docstring(&lines, 2).as_deref(), Some("Compute it.\nMore."));
        let lines = vec!["def g():", "    return 1"];
        assert_eq!(python_docstring(&lines, 2), None);
    }

    #[test]
    fn test_collect_dependencies() {
        let body = "{ const user = this.repo.find(id); validate(user); if (x) {} \
                    logger.info('x'); console.log(1); throw new Error('bad'); return format(user); }";
        let deps = collect_dependencies(body);
        let deps: Vec<_> = deps.iter().map(String::as_str).collect();
        assert_eq!(
            deps,
            vec!["console.log", "format", "logger.info", "repo.find", "validate"]
        );
    }

    #[test]
    fn test_builtin_names_are_dependencies_in_every_language() {
        // a user function named like a Python builtin still counts in JS
        let deps = collect_dependencies("{ return filter(items).map(format); }");
        assert!(deps.contains("filter"));
        let deps = collect_dependencies("{ var xs = List.of(1); return Math.min(a, b); }");
        assert!(deps.contains("List.of"));
        assert!(deps.contains("Math.min"));
        let deps = collect_dependencies("{ throw new IllegalStateException(); }");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_collect_dependencies_python() {
        let body = "    data = self.client.fetch(url)\n    if not data:\n        raise ValueError('x')\n    return len(parse(data))\n";
        let deps = collect_dependencies(body);
        let deps: Vec<_> = deps.iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["client.fetch", "len", "parse"]);
    }
}
