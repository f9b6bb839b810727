//! Shared plumbing for grammar-aware extractors.
//!
//! Each language module walks its own tree shape to find declarations and
//! then uses [`SourceContext`] to turn the nodes into facts, so parameter,
//! doc comment and dependency details match the heuristic path.

use std::collections::BTreeSet;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Query, QueryCursor, Tree};

use super::patterns::mask_non_code;
use super::signature::{
    clean_type, collect_dependencies, leading_doc_comment, parse_parameters, python_docstring,
};
use super::{Diagnostic, FunctionInfo, ParsedFile};
use crate::language::Language;

/// Parse `source` with `grammar`.
pub fn parse<'a>(grammar: &tree_sitter::Language, source: &'a str) -> anyhow::Result<ParsedFile<'a>> {
    let mut parser = Parser::new();
    parser.set_language(grammar)?;
    let tree: Tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("parser returned no tree"))?;
    Ok(ParsedFile { tree, source })
}

/// Per-file state shared by the declaration walkers.
pub struct SourceContext<'a> {
    pub language: Language,
    pub parsed: ParsedFile<'a>,
    masked: String,
    lines: Vec<&'a str>,
    control_flow: Query,
}

impl<'a> SourceContext<'a> {
    pub fn new(
        language: Language,
        grammar: &tree_sitter::Language,
        control_flow_query: &str,
        source: &'a str,
    ) -> anyhow::Result<Self> {
        let parsed = parse(grammar, source)?;
        let control_flow = Query::new(grammar, control_flow_query)?;
        Ok(Self {
            language,
            parsed,
            masked: mask_non_code(source, language),
            lines: source.lines().collect(),
            control_flow,
        })
    }

    pub fn root(&self) -> Node<'_> {
        self.parsed.tree.root_node()
    }

    pub fn text(&self, node: Node) -> &'a str {
        self.parsed.node_text(node)
    }

    /// 1 + number of control-flow captures under `node`.
    pub fn complexity(&self, node: Node) -> u32 {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.control_flow, node, self.parsed.source.as_bytes());
        let mut decisions = 0u32;
        while let Some(m) = matches.next() {
            decisions += m.captures.len() as u32;
        }
        1 + decisions
    }

    pub fn dependencies(&self, body: Node) -> BTreeSet<String> {
        collect_dependencies(self.masked.get(body.start_byte()..body.end_byte()).unwrap_or(""))
    }

    /// Build a function from its declaration node and parts.
    ///
    /// `params` may be a parenthesized list or a bare identifier.
    /// `drop_receiver` removes a leading `self`/`cls`.
    pub fn function(
        &self,
        name: &str,
        decl: Node,
        name_node: Node,
        params: Option<Node>,
        body: Option<Node>,
        drop_receiver: bool,
    ) -> FunctionInfo {
        let start_line = name_node.start_position().row + 1;
        let end_line = decl.end_position().row + 1;
        let mut func = FunctionInfo::new(name, start_line, end_line);

        if let Some(params) = params {
            let text = self.text(params).trim();
            let inner = text
                .strip_prefix('(')
                .and_then(|t| t.strip_suffix(')'))
                .unwrap_or(text);
            func.parameters = parse_parameters(inner, self.language, drop_receiver);
        }
        func.complexity = self.complexity(decl);
        if let Some(body) = body {
            func.dependencies = self.dependencies(body);
        }
        func.docstring = match (self.language, body) {
            (Language::Python, Some(body)) if body.start_position().row > name_node.start_position().row => {
                python_docstring(&self.lines, body.start_position().row + 1)
            }
            (Language::Python, _) => None,
            _ => leading_doc_comment(&self.lines, start_line),
        };
        func
    }

    /// Return type text of a `return_type`-style node, cleaned.
    pub fn return_type(&self, node: Option<Node>) -> Option<String> {
        node.map(|n| clean_type(self.text(n))).filter(|t| !t.is_empty())
    }
}

/// Whether `node` has a direct anonymous child token with this text
/// (`async`, `static`, ...).
pub fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

/// First direct child of the given kind.
pub fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Direct named children.
pub fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Syntax errors and missing nodes as diagnostics.
pub fn syntax_diagnostics(ctx: &SourceContext, max: Option<usize>) -> Vec<Diagnostic> {
    let limit = max.unwrap_or(usize::MAX);
    let mut out = Vec::new();
    let mut stack = vec![ctx.root()];
    while let Some(node) = stack.pop() {
        if out.len() >= limit {
            break;
        }
        let pos = node.start_position();
        if node.is_error() {
            let snippet: String = ctx.text(node).chars().take(24).collect();
            out.push(Diagnostic::error(
                pos.row + 1,
                pos.column + 1,
                format!("syntax error near `{}`", snippet.trim()),
            ));
            continue;
        }
        if node.is_missing() {
            out.push(Diagnostic::error(
                pos.row + 1,
                pos.column + 1,
                format!("missing `{}`", node.kind()),
            ));
            continue;
        }
        if node.has_error() {
            let mut children = all_children(node);
            children.reverse();
            stack.extend(children);
        }
    }
    out
}

fn all_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}
