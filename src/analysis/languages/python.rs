//! Python extractor using tree-sitter.

use tree_sitter::Node;

use crate::analysis::signature::infer_type;
use crate::analysis::treesitter::{has_token, named_children, syntax_diagnostics, SourceContext};
use crate::analysis::{
    run_extraction, ClassInfo, ExtractOptions, GrammarPass, ModuleStructure, Property,
    StructuralExtractor, Visibility,
};
use crate::language::Language;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(elif_clause) @elif
(for_statement) @for
(while_statement) @while
(except_clause) @except
(case_clause) @case
(conditional_expression) @ternary
(boolean_operator) @bool
(for_in_clause) @comprehension_for
(if_clause) @comprehension_if
"#;

pub struct PythonExtractor {
    grammar: tree_sitter::Language,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            grammar: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn extract_tree(&self, source: &str, options: &ExtractOptions) -> anyhow::Result<ModuleStructure> {
        let ctx = SourceContext::new(Language::Python, &self.grammar, CONTROL_FLOW_QUERY, source)?;
        let mut out = ModuleStructure {
            diagnostics: syntax_diagnostics(&ctx, options.max_diagnostics),
            ..Default::default()
        };
        let mut walker = PythonWalker {
            ctx: &ctx,
            out: &mut out,
        };
        walker.visit_children(ctx.root(), Scope::Module);
        Ok(out)
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, source: &str, options: &ExtractOptions) -> ModuleStructure {
        let grammar: GrammarPass = &|src| self.extract_tree(src, options);
        run_extraction(Language::Python, source, options, Some(grammar))
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Module,
    Class(usize),
    Function,
}

struct PythonWalker<'c, 'a> {
    ctx: &'c SourceContext<'a>,
    out: &'c mut ModuleStructure,
}

pub(crate) fn python_visibility(name: &str) -> Visibility {
    if name.starts_with("__") && !name.ends_with("__") {
        Visibility::Private
    } else if name.starts_with('_') && !name.starts_with("__") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

impl PythonWalker<'_, '_> {
    fn visit_children(&mut self, node: Node, scope: Scope) {
        for child in named_children(node) {
            self.visit(child, scope);
        }
    }

    fn visit(&mut self, node: Node, scope: Scope) {
        match node.kind() {
            "function_definition" => self.visit_function(node, scope),
            "class_definition" => self.visit_class(node, scope),
            "decorated_definition" => {
                if let Some(def) = node.child_by_field_name("definition") {
                    self.visit(def, scope);
                }
            }
            _ => self.visit_children(node, scope),
        }
    }

    fn visit_function(&mut self, node: Node, scope: Scope) {
        let class = match scope {
            Scope::Module => None,
            Scope::Class(idx) => Some(idx),
            Scope::Function => return,
        };
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.text(name_node);
        let body = node.child_by_field_name("body");
        let mut func = self.ctx.function(
            name,
            node,
            name_node,
            node.child_by_field_name("parameters"),
            body,
            class.is_some(),
        );
        func.return_type = self
            .ctx
            .return_type(node.child_by_field_name("return_type"))
            .unwrap_or_else(|| "any".to_string());
        func.is_async = has_token(node, "async");

        match class {
            Some(idx) => {
                let public = !name.starts_with('_') || (name.starts_with("__") && name.ends_with("__"));
                func.is_exported = self.out.classes[idx].is_exported && public;
                if let Some(body) = body {
                    self.collect_self_attributes(body, idx);
                }
                self.out.classes[idx].methods.push(func);
            }
            None => {
                func.is_exported = !name.starts_with('_');
                self.out.functions.push(func);
            }
        }
    }

    fn visit_class(&mut self, node: Node, scope: Scope) {
        if matches!(scope, Scope::Function) {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.ctx.text(name_node);
        let mut class = ClassInfo::new(
            name,
            name_node.start_position().row + 1,
            node.end_position().row + 1,
        );
        class.is_exported = !name.starts_with('_');

        if let Some(bases) = node.child_by_field_name("superclasses") {
            let mut bases = named_children(bases)
                .into_iter()
                .filter(|b| b.kind() != "keyword_argument")
                .map(|b| self.ctx.text(b).to_string())
                .filter(|b| b != "object");
            class.superclass = bases.next();
            class.interfaces = bases.collect();
        }

        self.out.classes.push(class);
        let idx = self.out.classes.len() - 1;

        if let Some(body) = node.child_by_field_name("body") {
            for stmt in named_children(body) {
                if stmt.kind() == "expression_statement" {
                    if let Some(assign) = named_children(stmt).into_iter().find(|c| c.kind() == "assignment") {
                        self.class_attribute(assign, idx);
                    }
                } else {
                    self.visit(stmt, Scope::Class(idx));
                }
            }
        }
    }

    /// `name = value` or `name: Type` directly in a class body.
    fn class_attribute(&mut self, assign: Node, class: usize) {
        let Some(left) = assign.child_by_field_name("left").filter(|l| l.kind() == "identifier") else {
            return;
        };
        let value = assign.child_by_field_name("right");
        let name = self.ctx.text(left).to_string();
        let type_name = self
            .ctx
            .return_type(assign.child_by_field_name("type"))
            .or_else(|| value.map(|v| infer_type(self.ctx.text(v), Language::Python).to_string()))
            .unwrap_or_else(|| "any".to_string());
        self.push_property(
            class,
            Property {
                visibility: python_visibility(&name),
                name,
                type_name,
                is_static: value.is_some(),
            },
        );
    }

    /// `self.x = ...` anywhere in a method body.
    fn collect_self_attributes(&mut self, body: Node, class: usize) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "function_definition" | "class_definition" | "lambda" => continue,
                "assignment" => {
                    let target = node.child_by_field_name("left").filter(|l| l.kind() == "attribute");
                    if let Some(target) = target {
                        let object = target.child_by_field_name("object").map(|o| self.ctx.text(o));
                        let attr = target.child_by_field_name("attribute");
                        if let (Some("self"), Some(attr)) = (object, attr) {
                            let name = self.ctx.text(attr).to_string();
                            let value = node.child_by_field_name("right");
                            let type_name = self
                                .ctx
                                .return_type(node.child_by_field_name("type"))
                                .or_else(|| {
                                    value.map(|v| infer_type(self.ctx.text(v), Language::Python).to_string())
                                })
                                .unwrap_or_else(|| "any".to_string());
                            self.push_property(
                                class,
                                Property {
                                    visibility: python_visibility(&name),
                                    name,
                                    type_name,
                                    is_static: false,
                                },
                            );
                        }
                    }
                }
                _ => {}
            }
            let mut children = named_children(node);
            children.reverse();
            stack.extend(children);
        }
    }

    fn push_property(&mut self, class: usize, property: Property) {
        let properties = &mut self.out.classes[class].properties;
        if !properties.iter().any(|p| p.name == property.name) {
            properties.push(property);
        }
    }
}
