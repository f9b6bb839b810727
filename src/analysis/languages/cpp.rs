//! C++ extractor using tree-sitter.

use tree_sitter::Node;

use crate::analysis::treesitter::{child_of_kind, named_children, syntax_diagnostics, SourceContext};
use crate::analysis::{
    run_extraction, ClassInfo, ExtractOptions, FunctionInfo, GrammarPass, ModuleStructure,
    Property, StructuralExtractor, Visibility,
};
use crate::language::Language;

use super::javascript::base_name;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(for_statement) @for
(for_range_loop) @for_range
(while_statement) @while
(do_statement) @do
((case_statement) @case (#match? @case "^case"))
(catch_clause) @catch
(conditional_expression) @ternary
(binary_expression operator: "&&") @and
(binary_expression operator: "||") @or
"#;

pub struct CppExtractor {
    grammar: tree_sitter::Language,
}

impl CppExtractor {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    fn extract_tree(&self, source: &str, options: &ExtractOptions) -> anyhow::Result<ModuleStructure> {
        let ctx = SourceContext::new(Language::Cpp, &self.grammar, CONTROL_FLOW_QUERY, source)?;
        let mut walker = CppWalker {
            ctx: &ctx,
            out: ModuleStructure {
                diagnostics: syntax_diagnostics(&ctx, options.max_diagnostics),
                ..Default::default()
            },
            qualified: Vec::new(),
        };
        walker.visit(ctx.root());
        Ok(walker.finish())
    }
}

impl Default for CppExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralExtractor for CppExtractor {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure {
        let grammar: GrammarPass = &|src| self.extract_tree(src, options);
        run_extraction(Language::Cpp, source, options, Some(grammar))
    }
}

/// Name parts of a function declarator.
struct Declarator<'t> {
    name: Node<'t>,
    scope: Option<String>,
    params: Option<Node<'t>>,
}

/// Unwrap pointer/reference declarators down to the function declarator.
fn function_declarator<'t>(ctx: &SourceContext, node: Node<'t>) -> Option<Declarator<'t>> {
    let mut current = node.child_by_field_name("declarator")?;
    while current.kind() != "function_declarator" {
        current = current.child_by_field_name("declarator").or_else(|| {
            named_children(current)
                .into_iter()
                .find(|c| c.kind() == "function_declarator")
        })?;
    }
    let params = current.child_by_field_name("parameters");
    let mut target = current.child_by_field_name("declarator")?;
    let mut scope = None;
    while target.kind() == "qualified_identifier" {
        scope = target
            .child_by_field_name("scope")
            .map(|s| base_name(ctx.text(s)));
        target = target.child_by_field_name("name")?;
    }
    Some(Declarator {
        name: target,
        scope,
        params,
    })
}

fn is_static(ctx: &SourceContext, node: Node) -> bool {
    named_children(node)
        .into_iter()
        .any(|c| c.kind() == "storage_class_specifier" && ctx.text(c) == "static")
}

struct CppWalker<'c, 'a> {
    ctx: &'c SourceContext<'a>,
    out: ModuleStructure,
    qualified: Vec<(String, FunctionInfo)>,
}

impl CppWalker<'_, '_> {
    fn visit(&mut self, node: Node) {
        for child in named_children(node) {
            match child.kind() {
                "class_specifier" | "struct_specifier" => self.visit_class(child),
                "function_definition" => self.visit_function(child),
                _ => self.visit(child),
            }
        }
    }

    fn build(&self, node: Node, decl: &Declarator) -> FunctionInfo {
        let ctx = self.ctx;
        let mut func = ctx.function(
            ctx.text(decl.name),
            node,
            decl.name,
            decl.params,
            node.child_by_field_name("body"),
            false,
        );
        func.return_type = node
            .child_by_field_name("type")
            .map(|t| ctx.text(t).to_string())
            .unwrap_or_else(|| "void".to_string());
        func
    }

    fn visit_function(&mut self, node: Node) {
        let Some(decl) = function_declarator(self.ctx, node) else {
            return;
        };
        let name = self.ctx.text(decl.name);
        let is_ctor = decl.scope.as_deref() == Some(name.trim_start_matches('~'));
        // macro invocations such as TEST(Suite, Case) { ... }
        if node.child_by_field_name("type").is_none() && !is_ctor {
            return;
        }
        let mut func = self.build(node, &decl);
        func.is_exported = !is_static(self.ctx, node);
        match decl.scope {
            Some(owner) => self.qualified.push((owner, func)),
            None => self.out.functions.push(func),
        }
    }

    fn visit_class(&mut self, node: Node) {
        let (Some(name), Some(body)) = (
            node.child_by_field_name("name"),
            node.child_by_field_name("body"),
        ) else {
            return;
        };
        let class_name = self.ctx.text(name);
        let mut class = ClassInfo::new(
            class_name,
            name.start_position().row + 1,
            node.end_position().row + 1,
        );
        class.is_exported = true;

        if let Some(bases) = child_of_kind(node, "base_class_clause") {
            let mut names = named_children(bases)
                .into_iter()
                .filter(|b| b.kind() != "access_specifier")
                .map(|b| base_name(self.ctx.text(b)));
            class.superclass = names.next();
            class.interfaces = names.collect();
        }

        let mut access = if node.kind() == "class_specifier" {
            Visibility::Private
        } else {
            Visibility::Public
        };
        let mut nested = Vec::new();
        for member in named_children(body) {
            let member = if member.kind() == "template_declaration" {
                named_children(member)
                    .into_iter()
                    .find(|c| c.kind() == "function_definition")
                    .unwrap_or(member)
            } else {
                member
            };
            match member.kind() {
                "access_specifier" => {
                    access = match self.ctx.text(member).trim_end_matches(':').trim() {
                        "public" => Visibility::Public,
                        "protected" => Visibility::Protected,
                        _ => Visibility::Private,
                    };
                }
                "function_definition" => {
                    if let Some(decl) = function_declarator(self.ctx, member) {
                        let mut method = self.build(member, &decl);
                        method.is_exported = access == Visibility::Public;
                        class.methods.push(method);
                    }
                }
                "field_declaration" => {
                    let type_name = member
                        .child_by_field_name("type")
                        .map(|t| self.ctx.text(t).to_string())
                        .unwrap_or_default();
                    if let Some(specifier) = member
                        .child_by_field_name("type")
                        .filter(|t| matches!(t.kind(), "class_specifier" | "struct_specifier"))
                    {
                        nested.push(specifier);
                        continue;
                    }
                    let mut cursor = member.walk();
                    for declarator in member.children_by_field_name("declarator", &mut cursor) {
                        let mut target = declarator;
                        let mut suffix = String::new();
                        while matches!(target.kind(), "pointer_declarator" | "reference_declarator") {
                            suffix.push(if target.kind() == "pointer_declarator" { '*' } else { '&' });
                            match target.child_by_field_name("declarator").or_else(|| {
                                named_children(target).into_iter().next()
                            }) {
                                Some(inner) => target = inner,
                                None => break,
                            }
                        }
                        if target.kind() != "field_identifier" {
                            continue;
                        }
                        class.properties.push(Property {
                            name: self.ctx.text(target).to_string(),
                            type_name: format!("{}{}", type_name, suffix),
                            visibility: access,
                            is_static: is_static(self.ctx, member),
                        });
                    }
                }
                _ => {}
            }
        }
        self.out.classes.push(class);
        for inner in nested {
            self.visit_class(inner);
        }
    }

    /// Attach out-of-line `Owner::method` definitions to their class.
    fn finish(mut self) -> ModuleStructure {
        for (owner, method) in std::mem::take(&mut self.qualified) {
            match self.out.classes.iter_mut().find(|c| c.name == owner) {
                Some(class) => class.methods.push(method),
                None => {
                    let mut class = ClassInfo::new(&owner, method.start_line, method.end_line);
                    class.is_exported = true;
                    class.methods.push(method);
                    self.out.classes.push(class);
                }
            }
        }
        for class in &mut self.out.classes {
            if let Some(last) = class.methods.iter().map(|m| m.end_line).max() {
                class.end_line = class.end_line.max(last);
            }
            if let Some(first) = class.methods.iter().map(|m| m.start_line).min() {
                class.start_line = class.start_line.min(first);
            }
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_and_out_of_line_methods() {
        let src = r#"
#include <vector>
#include "stack.h"

class Stack : public Container {
public:
    int size() const { return n_; }
private:
    std::vector<int> data_;
    int n_ = 0;
};

void Stack::push(int v) {
    if (v < 0 || n_ > 100) {
        throw std::runtime_error("bad");
    }
    data_.push_back(v);
}

static int clamp(int x, int lo, int hi) {
    return x < lo ? lo : (x > hi ? hi : x);
}
"#;
        let out = CppExtractor::new().extract(src, &ExtractOptions::default());
        assert_eq!(out.functions.len(), 1);
        let clamp = &out.functions[0];
        assert_eq!(clamp.complexity, 3);
        assert_eq!(clamp.parameters.len(), 3);
        assert!(!clamp.is_exported);

        let stack = &out.classes[0];
        assert_eq!(stack.superclass.as_deref(), Some("Container"));
        let names: Vec<_> = stack.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["size", "push"]);
        assert_eq!(stack.methods[1].complexity, 3);
        let props: Vec<_> = stack
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.visibility))
            .collect();
        assert_eq!(
            props,
            vec![("data_", Visibility::Private), ("n_", Visibility::Private)]
        );

        let includes: Vec<_> = out.imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(includes, vec!["vector", "stack.h"]);
    }
}
