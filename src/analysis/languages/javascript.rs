//! JavaScript extractor using tree-sitter.
//!
//! The declaration walker here is shared with TypeScript; the two grammars
//! use the same node kinds for everything extraction looks at.

use tree_sitter::Node;

use crate::analysis::signature::infer_type;
use crate::analysis::treesitter::{
    child_of_kind, has_token, named_children, syntax_diagnostics, SourceContext,
};
use crate::analysis::{
    run_extraction, ClassInfo, ExtractOptions, FunctionInfo, GrammarPass, ModuleStructure,
    Property, StructuralExtractor, Visibility,
};
use crate::language::Language;

pub(super) const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(for_in_statement) @for_in
(while_statement) @while
(do_statement) @do
(switch_case) @case
(catch_clause) @catch
(ternary_expression) @ternary
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
"#;

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

pub struct JavaScriptExtractor {
    grammar: tree_sitter::Language,
}

impl JavaScriptExtractor {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

impl Default for JavaScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralExtractor for JavaScriptExtractor {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure {
        let grammar: GrammarPass =
            &|src| extract_script(Language::JavaScript, &self.grammar, src, options);
        run_extraction(Language::JavaScript, source, options, Some(grammar))
    }
}

/// Grammar-aware extraction for JavaScript and TypeScript.
pub(super) fn extract_script(
    language: Language,
    grammar: &tree_sitter::Language,
    source: &str,
    options: &ExtractOptions,
) -> anyhow::Result<ModuleStructure> {
    let ctx = SourceContext::new(language, grammar, CONTROL_FLOW_QUERY, source)?;
    let mut out = ModuleStructure {
        diagnostics: syntax_diagnostics(&ctx, options.max_diagnostics),
        ..Default::default()
    };
    let mut walker = ScriptWalker {
        ctx: &ctx,
        out: &mut out,
    };
    walker.visit_children(ctx.root());
    Ok(out)
}

struct ScriptWalker<'c, 'a> {
    ctx: &'c SourceContext<'a>,
    out: &'c mut ModuleStructure,
}

fn is_export(node: Option<Node>) -> bool {
    node.is_some_and(|n| n.kind() == "export_statement")
}

impl ScriptWalker<'_, '_> {
    fn visit_children(&mut self, node: Node) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let mut func = self.function(self.ctx.text(name), node, name);
                    func.is_exported = is_export(node.parent());
                    self.out.functions.push(func);
                }
            }
            "class_declaration" | "abstract_class_declaration" | "class" => self.visit_class(node),
            "variable_declarator" => {
                let name = node.child_by_field_name("name");
                let value = node.child_by_field_name("value");
                match (name, value) {
                    (Some(name), Some(value))
                        if name.kind() == "identifier" && FUNCTION_VALUES.contains(&value.kind()) =>
                    {
                        let mut func = self.function(self.ctx.text(name), value, name);
                        func.is_exported = is_export(node.parent().and_then(|p| p.parent()));
                        self.out.functions.push(func);
                    }
                    (_, Some(value)) => self.visit(value),
                    _ => {}
                }
            }
            "pair" => {
                let key = node.child_by_field_name("key");
                let value = node.child_by_field_name("value");
                match (key, value) {
                    (Some(key), Some(value)) if FUNCTION_VALUES.contains(&value.kind()) => {
                        let name = self.ctx.text(key).trim_matches(['"', '\'']);
                        let func = self.function(name, value, key);
                        self.out.functions.push(func);
                    }
                    (_, Some(value)) => self.visit(value),
                    _ => {}
                }
            }
            // shorthand methods in object literals
            "method_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let func = self.function(self.ctx.text(name), node, name);
                    self.out.functions.push(func);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn function(&self, name: &str, decl: Node, name_node: Node) -> FunctionInfo {
        let params = decl
            .child_by_field_name("parameters")
            .or_else(|| decl.child_by_field_name("parameter"));
        let body = decl.child_by_field_name("body");
        let mut func = self.ctx.function(name, decl, name_node, params, body, false);
        func.return_type = self
            .ctx
            .return_type(decl.child_by_field_name("return_type"))
            .unwrap_or_else(|| "any".to_string());
        func.is_async = has_token(decl, "async");
        func
    }

    fn visit_class(&mut self, node: Node) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let mut class = ClassInfo::new(
            self.ctx.text(name),
            name.start_position().row + 1,
            node.end_position().row + 1,
        );
        class.is_exported = is_export(node.parent());

        if let Some(heritage) = child_of_kind(node, "class_heritage") {
            for clause in named_children(heritage) {
                match clause.kind() {
                    "extends_clause" => {
                        class.superclass = clause
                            .child_by_field_name("value")
                            .map(|v| self.ctx.text(v).to_string());
                    }
                    "implements_clause" => {
                        class.interfaces.extend(
                            named_children(clause)
                                .into_iter()
                                .map(|t| base_name(self.ctx.text(t))),
                        );
                    }
                    // JavaScript: `extends <expression>`
                    _ if class.superclass.is_none() => {
                        class.superclass = Some(self.ctx.text(clause).to_string());
                    }
                    _ => {}
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(body) {
                match member.kind() {
                    "method_definition" => {
                        if let Some(name) = member.child_by_field_name("name") {
                            let mut method = self.function(self.ctx.text(name), member, name);
                            method.name = method.name.trim_start_matches('#').to_string();
                            method.is_exported = member_visibility(self.ctx, member, name) != Visibility::Private;
                            class.methods.push(method);
                        }
                    }
                    "field_definition" | "public_field_definition" => {
                        self.visit_field(member, &mut class);
                    }
                    _ => {}
                }
            }
        }
        self.out.classes.push(class);
    }

    fn visit_field(&self, member: Node, class: &mut ClassInfo) {
        let Some(name) = member
            .child_by_field_name("name")
            .or_else(|| member.child_by_field_name("property"))
        else {
            return;
        };
        let value = member.child_by_field_name("value");
        let visibility = member_visibility(self.ctx, member, name);

        if let Some(value) = value.filter(|v| FUNCTION_VALUES.contains(&v.kind())) {
            let mut method = self.function(self.ctx.text(name), value, name);
            method.name = method.name.trim_start_matches('#').to_string();
            method.is_exported = visibility != Visibility::Private;
            class.methods.push(method);
            return;
        }

        let type_name = self
            .ctx
            .return_type(member.child_by_field_name("type"))
            .or_else(|| value.map(|v| infer_type(self.ctx.text(v), self.ctx.language).to_string()))
            .unwrap_or_else(|| "any".to_string());
        class.properties.push(Property {
            name: self.ctx.text(name).trim_start_matches('#').to_string(),
            type_name,
            visibility,
            is_static: has_token(member, "static"),
        });
    }
}

fn member_visibility(ctx: &SourceContext, member: Node, name: Node) -> Visibility {
    if name.kind() == "private_property_identifier" {
        return Visibility::Private;
    }
    match child_of_kind(member, "accessibility_modifier").map(|m| ctx.text(m)) {
        Some("private") => Visibility::Private,
        Some("protected") => Visibility::Protected,
        _ => Visibility::Public,
    }
}

/// `Foo<T>` -> `Foo`
pub(super) fn base_name(text: &str) -> String {
    let t = text.trim();
    t.find('<').map_or(t, |p| &t[..p]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> ModuleStructure {
        JavaScriptExtractor::new().extract(source, &ExtractOptions::default())
    }

    #[test]
    fn test_functions_and_arrows() {
        let src = r#"
import { readFile } from 'fs';

export function add(a, b) {
  if (a < 0 || b < 0) {
    throw new Error('negative');
  }
  return a + b;
}

const double = (x) => x * 2;

export const load = async (path) => {
  const data = await readFile(path);
  return JSON.parse(data);
};
"#;
        let out = extract(src);
        let names: Vec<_> = out.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add", "double", "load"]);

        let add = &out.functions[0];
        assert_eq!(add.complexity, 3);
        assert_eq!(add.parameters.len(), 2);
        assert!(add.is_exported);
        assert!(!out.functions[1].is_exported);

        let load = &out.functions[2];
        assert!(load.is_async);
        assert!(load.is_exported);
        assert!(load.dependencies.contains("readFile"));
        assert!(load.dependencies.contains("JSON.parse"));

        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].source, "fs");
    }

    #[test]
    fn test_class_members() {
        let src = r#"
class Cart extends Base {
  #items = [];
  static count = 0;

  add(item) {
    this.#items.push(item);
  }

  #recalculate() {
    return this.#items.length;
  }
}
module.exports = Cart;
"#;
        let out = extract(src);
        let cart = &out.classes[0];
        assert_eq!(cart.name, "Cart");
        assert_eq!(cart.superclass.as_deref(), Some("Base"));
        assert!(cart.is_exported);

        let methods: Vec<_> = cart.methods.iter().map(|m| (m.name.as_str(), m.is_exported)).collect();
        assert_eq!(methods, vec![("add", true), ("recalculate", false)]);

        assert_eq!(cart.properties.len(), 2);
        assert_eq!(cart.properties[0].name, "items");
        assert_eq!(cart.properties[0].visibility, Visibility::Private);
        assert!(cart.properties[1].is_static);
    }
}
