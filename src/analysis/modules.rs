//! Import and export scanning.
//!
//! Regex-based and shared by the grammar-aware and heuristic extractors.
//! Matches are run against the original text and discarded when they start
//! inside a comment or string (detected through the masked copy).

use lazy_static::lazy_static;
use regex::Regex;

use super::signature::split_top_level;
use super::{ExportInfo, ImportInfo, ImportedItem, LineIndex, ModuleKind, ModuleStructure};
use crate::language::Language;

lazy_static! {
    // import X from 'm' / import {a, b as c} from 'm' / import * as ns from 'm'
    static ref ES_IMPORT_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import\s+(?:type\s+)?([^'";]*?)\s*from\s*['"]([^'"]+)['"]"#
    ).unwrap();
    // import 'side-effect'
    static ref ES_BARE_IMPORT_RE: Regex =
        Regex::new(r#"(?m)^[ \t]*import\s*['"]([^'"]+)['"]"#).unwrap();
    // const x = require('m') / const {a, b} = require('m')
    static ref REQUIRE_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*(?:const|let|var)\s+([^=;]+?)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#
    ).unwrap();

    static ref ES_EXPORT_DECL_RE: Regex = Regex::new(
        r"(?m)^[ \t]*export\s+(default\s+)?(?:declare\s+)?(?:async\s+)?(?:abstract\s+)?(?:function\s*\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)"
    ).unwrap();
    static ref ES_EXPORT_DEFAULT_RE: Regex =
        Regex::new(r"(?m)^[ \t]*export\s+default\s+([A-Za-z_$][\w$]*)\s*;?[ \t]*$").unwrap();
    static ref ES_EXPORT_LIST_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*export\s*(?:type\s+)?\{([^}]*)\}(?:\s*from\s*['"]([^'"]+)['"])?"#
    ).unwrap();
    static ref ES_EXPORT_ALL_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*export\s*\*\s*(?:as\s+([A-Za-z_$][\w$]*)\s*)?from\s*['"]([^'"]+)['"]"#
    ).unwrap();
    static ref CJS_EXPORT_OBJECT_RE: Regex =
        Regex::new(r"(?m)^[ \t]*module\.exports\s*=\s*\{([^}]*)\}").unwrap();
    static ref CJS_EXPORT_SINGLE_RE: Regex =
        Regex::new(r"(?m)^[ \t]*module\.exports\s*=\s*([A-Za-z_$][\w$]*)\s*;?[ \t]*$").unwrap();
    static ref CJS_EXPORT_NAMED_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:module\.)?exports\.([A-Za-z_$][\w$]*)\s*=\s*([A-Za-z_$][\w$]*)?"
    ).unwrap();

    static ref PY_IMPORT_RE: Regex = Regex::new(r"(?m)^[ \t]*import\s+([^\n#]+)").unwrap();
    static ref PY_FROM_RE: Regex =
        Regex::new(r"(?m)^[ \t]*from\s+(\.*[\w.]*)\s+import\s+(\([^)]*\)|[^\n#]+)").unwrap();
    static ref PY_ALL_RE: Regex =
        Regex::new(r"(?m)^__all__\s*(?::[^=\n]*)?=\s*[\[(]([^\])]*)[\])]").unwrap();
    static ref QUOTED_RE: Regex = Regex::new(r#"['"]([^'"]+)['"]"#).unwrap();

    static ref JAVA_IMPORT_RE: Regex =
        Regex::new(r"(?m)^[ \t]*import\s+(static\s+)?([\w.]+?)(\.\*)?\s*;").unwrap();
    static ref CPP_INCLUDE_RE: Regex =
        Regex::new(r#"(?m)^[ \t]*#\s*include\s*([<"])([^>"\n]+)[>"]"#).unwrap();
    static ref CSHARP_USING_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:global\s+)?using\s+(static\s+)?(?:([A-Za-z_]\w*)\s*=\s*)?([\w.]+)\s*;"
    ).unwrap();
}

/// Whether the byte at `offset` survived masking, i.e. is real code.
fn in_code(source: &str, masked: &str, offset: usize) -> bool {
    // Matches may begin with indentation; find the first significant byte.
    let bytes = source.as_bytes();
    let mut i = offset;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i < bytes.len() && masked.as_bytes().get(i) == Some(&bytes[i])
}

/// Parse a `name as alias` (or `name: alias` for CommonJS) item.
fn parse_item(raw: &str, separator: &str) -> Option<ImportedItem> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("type ").unwrap_or(raw).trim();
    if raw.is_empty() {
        return None;
    }
    let (name, alias) = match raw.split_once(separator) {
        Some((n, a)) => (n.trim(), Some(a.trim().to_string())),
        None => (raw, None),
    };
    Some(ImportedItem {
        name: name.to_string(),
        alias: alias.filter(|a| !a.is_empty()),
        is_default: false,
    })
}

fn parse_es_clause(clause: &str) -> Vec<ImportedItem> {
    let mut items = Vec::new();
    for part in split_top_level(clause.trim(), ',') {
        let part = part.trim();
        if let Some(inner) = part.strip_prefix('{') {
            let inner = inner.trim_end_matches('}');
            items.extend(inner.split(',').filter_map(|i| parse_item(i, " as ")));
        } else if let Some(ns) = part.strip_prefix('*') {
            let alias = ns.trim().strip_prefix("as").map(|a| a.trim().to_string());
            items.push(ImportedItem {
                name: "*".to_string(),
                alias,
                is_default: false,
            });
        } else if !part.is_empty() {
            items.push(ImportedItem {
                name: part.to_string(),
                alias: None,
                is_default: true,
            });
        }
    }
    items
}

/// Scan import statements.
pub fn scan_imports(source: &str, masked: &str, language: Language) -> Vec<ImportInfo> {
    let index = LineIndex::new(source);
    let mut imports = Vec::new();
    let mut push = |offset: usize, src: &str, items: Vec<ImportedItem>, kind: ModuleKind| {
        imports.push(ImportInfo {
            source: src.to_string(),
            items,
            kind,
            line: index.line_of(offset),
        });
    };

    match language {
        Language::JavaScript | Language::TypeScript => {
            for caps in ES_IMPORT_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if !in_code(source, masked, whole) {
                    continue;
                }
                let module = &caps[2];
                push(whole, module, parse_es_clause(&caps[1]), ModuleKind::classify(module));
            }
            for caps in ES_BARE_IMPORT_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if in_code(source, masked, whole) {
                    let module = &caps[1];
                    push(whole, module, Vec::new(), ModuleKind::classify(module));
                }
            }
            for caps in REQUIRE_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if !in_code(source, masked, whole) {
                    continue;
                }
                let binding = caps[1].trim();
                let items = match binding.strip_prefix('{') {
                    Some(inner) => inner
                        .trim_end_matches('}')
                        .split(',')
                        .filter_map(|i| parse_item(i, ":"))
                        .collect(),
                    None => vec![ImportedItem {
                        name: binding.to_string(),
                        alias: None,
                        is_default: true,
                    }],
                };
                let module = &caps[2];
                push(whole, module, items, ModuleKind::classify(module));
            }
        }
        Language::Python => {
            for caps in PY_IMPORT_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if !in_code(source, masked, whole) {
                    continue;
                }
                for module in caps[1].split(',') {
                    if let Some(item) = parse_item(module, " as ") {
                        let src = item.name.clone();
                        push(whole, &src, vec![item], ModuleKind::External);
                    }
                }
            }
            for caps in PY_FROM_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if !in_code(source, masked, whole) {
                    continue;
                }
                let names = caps[2].trim().trim_start_matches('(').trim_end_matches(')');
                let items = names
                    .split(',')
                    .filter_map(|i| parse_item(i.trim().trim_end_matches('\\'), " as "))
                    .collect();
                let module = &caps[1];
                push(whole, module, items, ModuleKind::classify(module));
            }
        }
        Language::Java => {
            for caps in JAVA_IMPORT_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if !in_code(source, masked, whole) {
                    continue;
                }
                let path = &caps[2];
                let (module, item) = if caps.get(3).is_some() {
                    (path, "*")
                } else {
                    path.rsplit_once('.').unwrap_or(("", path))
                };
                push(whole, module, vec![ImportedItem::named(item)], ModuleKind::External);
            }
        }
        Language::Cpp => {
            for caps in CPP_INCLUDE_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if !in_code(source, masked, whole) {
                    continue;
                }
                let kind = if &caps[1] == "<" {
                    ModuleKind::External
                } else {
                    ModuleKind::Relative
                };
                push(whole, caps[2].trim(), Vec::new(), kind);
            }
        }
        Language::CSharp => {
            for caps in CSHARP_USING_RE.captures_iter(source) {
                let whole = caps.get(0).map_or(0, |m| m.start());
                if !in_code(source, masked, whole) {
                    continue;
                }
                let target = &caps[3];
                let items = match caps.get(2) {
                    Some(alias) => vec![ImportedItem {
                        name: target.to_string(),
                        alias: Some(alias.as_str().to_string()),
                        is_default: false,
                    }],
                    None => Vec::new(),
                };
                push(whole, target, items, ModuleKind::External);
            }
        }
    }

    imports.sort_by_key(|i| i.line);
    imports
}

/// Scan explicit export statements (JavaScript/TypeScript, Python `__all__`).
///
/// Languages without export syntax get their exports from
/// [`derive_exports`] once declarations are known.
pub fn scan_exports(source: &str, masked: &str, language: Language) -> Vec<ExportInfo> {
    let index = LineIndex::new(source);
    let mut exports = Vec::new();
    let line_of = |caps: &regex::Captures| index.line_of(caps.get(0).map_or(0, |m| m.start()));
    let code = |caps: &regex::Captures| in_code(source, masked, caps.get(0).map_or(0, |m| m.start()));

    match language {
        Language::JavaScript | Language::TypeScript => {
            for caps in ES_EXPORT_DECL_RE.captures_iter(source).filter(|c| code(c)) {
                let mut export = ExportInfo::local(&caps[2], line_of(&caps));
                if caps.get(1).is_some() {
                    export.items[0].is_default = true;
                }
                exports.push(export);
            }
            for caps in ES_EXPORT_DEFAULT_RE.captures_iter(source).filter(|c| code(c)) {
                let mut export = ExportInfo::local(&caps[1], line_of(&caps));
                export.items[0].is_default = true;
                exports.push(export);
            }
            for caps in ES_EXPORT_LIST_RE.captures_iter(source).filter(|c| code(c)) {
                let items: Vec<ImportedItem> =
                    caps[1].split(',').filter_map(|i| parse_item(i, " as ")).collect();
                let source_module = caps.get(2).map(|m| m.as_str().to_string());
                let kind = source_module
                    .as_deref()
                    .map_or(ModuleKind::Relative, ModuleKind::classify);
                for item in &items {
                    exports.push(ExportInfo {
                        name: item.alias.clone().unwrap_or_else(|| item.name.clone()),
                        source: source_module.clone(),
                        items: vec![item.clone()],
                        kind,
                        line: line_of(&caps),
                    });
                }
            }
            for caps in ES_EXPORT_ALL_RE.captures_iter(source).filter(|c| code(c)) {
                let module = caps[2].to_string();
                exports.push(ExportInfo {
                    name: caps.get(1).map_or("*", |m| m.as_str()).to_string(),
                    kind: ModuleKind::classify(&module),
                    source: Some(module),
                    items: vec![ImportedItem::named("*")],
                    line: line_of(&caps),
                });
            }
            for caps in CJS_EXPORT_OBJECT_RE.captures_iter(source).filter(|c| code(c)) {
                for raw in caps[1].split(',') {
                    // `{ add, sub: subtract }` exports `subtract` under the name `sub`
                    let Some(item) = parse_item(raw, ":") else { continue };
                    let (exported, local) = match item.alias {
                        Some(local) => (item.name, local),
                        None => (item.name.clone(), item.name),
                    };
                    let mut export = ExportInfo::local(local, line_of(&caps));
                    export.name = exported;
                    exports.push(export);
                }
            }
            for caps in CJS_EXPORT_SINGLE_RE.captures_iter(source).filter(|c| code(c)) {
                let mut export = ExportInfo::local(&caps[1], line_of(&caps));
                export.items[0].is_default = true;
                exports.push(export);
            }
            for caps in CJS_EXPORT_NAMED_RE.captures_iter(source).filter(|c| code(c)) {
                let exported = caps[1].to_string();
                let local = caps.get(2).map_or(exported.as_str(), |m| m.as_str()).to_string();
                let mut export = ExportInfo::local(local, line_of(&caps));
                export.name = exported;
                exports.push(export);
            }
        }
        Language::Python => {
            if let Some(caps) = PY_ALL_RE.captures(source).filter(|c| code(c)) {
                for name in QUOTED_RE.captures_iter(&caps[1]) {
                    exports.push(ExportInfo::local(&name[1], line_of(&caps)));
                }
            }
        }
        Language::Java | Language::Cpp | Language::CSharp => {}
    }

    exports.sort_by_key(|e| e.line);
    exports
}

/// Whether the module declares an explicit Python export list.
pub fn has_python_export_list(source: &str) -> bool {
    PY_ALL_RE.is_match(source)
}

/// Exports implied by declarations: public top-level functions and classes.
pub fn derive_exports(structure: &ModuleStructure) -> Vec<ExportInfo> {
    let functions = structure
        .functions
        .iter()
        .filter(|f| f.is_exported)
        .map(|f| ExportInfo::local(&f.name, f.start_line));
    let classes = structure
        .classes
        .iter()
        .filter(|c| c.is_exported)
        .map(|c| ExportInfo::local(&c.name, c.start_line));
    let mut exports: Vec<_> = functions.chain(classes).collect();
    exports.sort_by_key(|e| e.line);
    exports
}
