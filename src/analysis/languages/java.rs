//! Java extractor using tree-sitter.

use tree_sitter::Node;

use crate::analysis::treesitter::{child_of_kind, named_children, syntax_diagnostics, SourceContext};
use crate::analysis::{
    run_extraction, ClassInfo, ExtractOptions, GrammarPass, ModuleStructure, Property,
    StructuralExtractor, Visibility,
};
use crate::language::Language;

use super::javascript::base_name;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(enhanced_for_statement) @for_each
(while_statement) @while
(do_statement) @do
((switch_label) @case (#match? @case "^case"))
(catch_clause) @catch
(ternary_expression) @ternary
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
"#;

pub struct JavaExtractor {
    grammar: tree_sitter::Language,
}

impl JavaExtractor {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn extract_tree(&self, source: &str, options: &ExtractOptions) -> anyhow::Result<ModuleStructure> {
        let ctx = SourceContext::new(Language::Java, &self.grammar, CONTROL_FLOW_QUERY, source)?;
        let mut out = ModuleStructure {
            diagnostics: syntax_diagnostics(&ctx, options.max_diagnostics),
            ..Default::default()
        };
        visit(&ctx, &mut out, ctx.root());
        Ok(out)
    }
}

impl Default for JavaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralExtractor for JavaExtractor {
    fn language(&self) -> Language {
        Language::Java
    }

    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure {
        let grammar: GrammarPass = &|src| self.extract_tree(src, options);
        run_extraction(Language::Java, source, options, Some(grammar))
    }
}

/// Modifier keywords of a declaration, annotations excluded.
fn modifiers<'a>(ctx: &SourceContext<'a>, node: Node) -> Vec<&'a str> {
    child_of_kind(node, "modifiers")
        .map(|m| {
            ctx.text(m)
                .split_whitespace()
                .filter(|w| !w.starts_with('@') && !w.starts_with('('))
                .collect()
        })
        .unwrap_or_default()
}

fn visibility(mods: &[&str]) -> Visibility {
    if mods.contains(&"public") {
        Visibility::Public
    } else if mods.contains(&"private") {
        Visibility::Private
    } else if mods.contains(&"protected") {
        Visibility::Protected
    } else {
        Visibility::Internal
    }
}

fn visit(ctx: &SourceContext, out: &mut ModuleStructure, node: Node) {
    for child in named_children(node) {
        match child.kind() {
            "class_declaration" | "record_declaration" => visit_class(ctx, out, child),
            "interface_declaration" | "enum_declaration" | "annotation_type_declaration" => {}
            _ => visit(ctx, out, child),
        }
    }
}

fn visit_class(ctx: &SourceContext, out: &mut ModuleStructure, node: Node) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    let mut class = ClassInfo::new(
        ctx.text(name),
        name.start_position().row + 1,
        node.end_position().row + 1,
    );
    class.is_exported = modifiers(ctx, node).contains(&"public");
    class.superclass = node
        .child_by_field_name("superclass")
        .and_then(|s| named_children(s).into_iter().next())
        .map(|t| base_name(ctx.text(t)));
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        for list in named_children(interfaces) {
            class
                .interfaces
                .extend(named_children(list).into_iter().map(|t| base_name(ctx.text(t))));
        }
    }

    let mut nested = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for member in named_children(body) {
            match member.kind() {
                "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                    let Some(name) = member.child_by_field_name("name") else {
                        continue;
                    };
                    let mods = modifiers(ctx, member);
                    let mut method = ctx.function(
                        ctx.text(name),
                        member,
                        name,
                        member.child_by_field_name("parameters"),
                        member.child_by_field_name("body"),
                        false,
                    );
                    method.return_type = member
                        .child_by_field_name("type")
                        .map(|t| ctx.text(t).to_string())
                        .unwrap_or_else(|| "void".to_string());
                    method.is_exported = mods.contains(&"public");
                    class.methods.push(method);
                }
                "field_declaration" => {
                    let mods = modifiers(ctx, member);
                    let type_name = member
                        .child_by_field_name("type")
                        .map(|t| ctx.text(t).to_string())
                        .unwrap_or_else(|| "any".to_string());
                    let mut cursor = member.walk();
                    for declarator in member.children_by_field_name("declarator", &mut cursor) {
                        if let Some(field) = declarator.child_by_field_name("name") {
                            class.properties.push(Property {
                                name: ctx.text(field).to_string(),
                                type_name: type_name.clone(),
                                visibility: visibility(&mods),
                                is_static: mods.contains(&"static"),
                            });
                        }
                    }
                }
                "class_declaration" | "record_declaration" => nested.push(member),
                _ => {}
            }
        }
    }
    out.classes.push(class);
    for inner in nested {
        visit_class(ctx, out, inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_with_members() {
        let src = r#"
package com.shop;

import java.util.List;

/**
 * Order lookups.
 */
public class OrderService extends BaseService implements Service, Auditable {
    private final List<Order> orders;
    static int instances = 0;

    public OrderService(List<Order> orders) {
        this.orders = orders;
    }

    /** Total for a customer. */
    public double total(String customer) {
        double sum = 0;
        for (Order o : orders) {
            if (o.customer().equals(customer) && o.isPaid()) {
                sum += o.amount();
            }
        }
        return sum;
    }

    private int bucket(int n) {
        switch (n) {
            case 1: return 10;
            case 2: return 20;
            default: return 0;
        }
    }
}
"#;
        let out = JavaExtractor::new().extract(src, &ExtractOptions::default());
        let class = &out.classes[0];
        assert_eq!(class.name, "OrderService");
        assert_eq!(class.superclass.as_deref(), Some("BaseService"));
        assert_eq!(class.interfaces, vec!["Service", "Auditable"]);
        assert!(class.is_exported);

        let names: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["OrderService", "total", "bucket"]);

        let total = &class.methods[1];
        assert_eq!(total.complexity, 4);
        assert_eq!(total.return_type, "double");
        assert_eq!(total.docstring.as_deref(), Some("Total for a customer."));
        assert!(total.is_exported);

        let bucket = &class.methods[2];
        assert_eq!(bucket.complexity, 3, "default is not a decision");
        assert!(!bucket.is_exported);

        assert_eq!(class.properties[0].visibility, Visibility::Private);
        assert_eq!(class.properties[1].visibility, Visibility::Internal);
        assert!(class.properties[1].is_static);

        assert_eq!(out.imports[0].source, "java.util");
    }
}
