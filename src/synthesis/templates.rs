//! Deterministic template tests.
//!
//! Every target gets a happy-path test. Targets with parameters also get
//! an invalid-argument test, targets above the complexity threshold a
//! thrown-error test, and integration targets an integration test.

use super::frameworks::Framework;
use super::targets::{Target, TargetKind};
use super::{TestCase, TestSource, TestType};
use crate::analysis::Parameter;
use crate::language::Language;

/// Complexity above which a thrown-error test is added.
pub const DEFAULT_THROW_THRESHOLD: u32 = 3;

/// Template tests for one target. Ids are assigned by the caller.
pub fn template_tests(
    target: &Target,
    language: Language,
    framework: Framework,
    throw_threshold: u32,
) -> Vec<TestCase> {
    let label = target.label();
    let make = |name: String, test_type: TestType, lines: Vec<String>| TestCase {
        id: String::new(),
        name,
        test_type,
        target: target.name.clone(),
        framework: framework.to_string(),
        body: lines.join("\n"),
        source: TestSource::Template,
    };

    if target.kind == TargetKind::Class {
        let instance = construct(&target.name, &[], language);
        return vec![make(
            format!("{} wires its collaborators", label),
            TestType::Integration,
            framework.expect_success(&instance, true, false),
        )];
    }

    let is_async = target.is_async();
    let params = target.parameters();
    let returns_value = target
        .function
        .as_ref()
        .map_or(true, |f| !f.returns_nothing() || is_constructor(target, language));

    let valid_args: Vec<String> = params.iter().map(|p| placeholder(p, language)).collect();
    let happy_call = call_expression(target, &valid_args, language);

    let mut tests = vec![make(
        if returns_value {
            format!("{} returns a result for valid input", label)
        } else {
            format!("{} completes for valid input", label)
        },
        TestType::Unit,
        framework.expect_success(&happy_call, returns_value, is_async),
    )];

    if !params.is_empty() {
        let invalid_args: Vec<String> = params.iter().map(|p| invalid_value(p, language)).collect();
        let call = call_expression(target, &invalid_args, language);
        tests.push(make(
            format!("{} rejects invalid arguments", label),
            TestType::EdgeCase,
            framework.expect_throws(&call, is_async),
        ));
    }

    if target.complexity() > throw_threshold {
        tests.push(make(
            format!("{} throws on error path", label),
            TestType::ErrorHandling,
            framework.expect_throws(&happy_call, is_async),
        ));
    }

    if target.integration {
        let deps: Vec<&str> = target.dependencies.iter().map(String::as_str).take(3).collect();
        let mut lines = vec![format!(
            "{} collaborators: {}",
            comment_prefix(language),
            deps.join(", ")
        )];
        lines.extend(framework.expect_success(&happy_call, returns_value, is_async));
        tests.push(make(
            format!("{} integrates with its collaborators", label),
            TestType::Integration,
            lines,
        ));
    }

    tests
}

fn comment_prefix(language: Language) -> &'static str {
    match language {
        Language::Python => "#",
        _ => "//",
    }
}

fn is_constructor(target: &Target, language: Language) -> bool {
    match (&target.owner, language) {
        (Some(_), Language::Python) => target.name == "__init__",
        (Some(_), Language::JavaScript | Language::TypeScript) => target.name == "constructor",
        (Some(owner), _) => &target.name == owner,
        (None, _) => false,
    }
}

fn construct(class: &str, args: &[String], language: Language) -> String {
    let args = args.join(", ");
    match language {
        Language::Python | Language::Cpp => format!("{}({})", class, args),
        _ => format!("new {}({})", class, args),
    }
}

/// Expression invoking the target with `args`.
fn call_expression(target: &Target, args: &[String], language: Language) -> String {
    let joined = args.join(", ");
    match &target.owner {
        None => format!("{}({})", target.name, joined),
        Some(owner) if is_constructor(target, language) => construct(owner, args, language),
        Some(owner) => format!("{}.{}({})", construct(owner, &[], language), target.name, joined),
    }
}

const SEQUENCE_TYPES: &[&str] = &[
    "array", "list", "arraylist", "linkedlist", "ilist", "vector", "set", "hashset", "deque",
    "ienumerable", "icollection", "iterable", "sequence", "tuple",
];

const MAPPING_TYPES: &[&str] = &[
    "dict", "dictionary", "idictionary", "map", "hashmap", "mapping", "record", "object",
];

const NUMERIC_TYPES: &[&str] = &[
    "int", "integer", "uint", "int32", "int64", "long", "short", "float", "double", "decimal",
    "number", "size_t", "byte", "bigint", "unsigned",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    Sequence,
    Mapping,
    Bool,
    Number,
    Text,
}

/// Kind of the outermost recognized type: `Dict[str, List[int]]` is a
/// mapping, `Optional[int]` a number. Unknown names give `None`.
fn type_kind(type_name: &str) -> Option<TypeKind> {
    if type_name.trim_end().ends_with("[]") {
        return Some(TypeKind::Sequence);
    }
    type_tokens(type_name).iter().find_map(|t| match t.as_str() {
        t if SEQUENCE_TYPES.contains(&t) => Some(TypeKind::Sequence),
        t if MAPPING_TYPES.contains(&t) => Some(TypeKind::Mapping),
        "bool" | "boolean" => Some(TypeKind::Bool),
        t if NUMERIC_TYPES.contains(&t) => Some(TypeKind::Number),
        "str" | "string" | "char" | "wchar_t" | "charsequence" => Some(TypeKind::Text),
        _ => None,
    })
}

/// Lowercased identifier tokens of a type annotation: `Map<String, Point>`
/// gives `map`, `string` and `point`.
fn type_tokens(type_name: &str) -> Vec<String> {
    type_name
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// A type-appropriate valid argument.
pub fn placeholder(param: &Parameter, language: Language) -> String {
    if let Some(default) = &param.default_value {
        return default.clone();
    }
    match type_kind(&param.type_name) {
        Some(TypeKind::Sequence) => match language {
            Language::JavaScript | Language::TypeScript | Language::Python => "[]".to_string(),
            Language::Java => "java.util.List.of()".to_string(),
            Language::Cpp => "{}".to_string(),
            Language::CSharp => "Array.Empty<object>()".to_string(),
        },
        Some(TypeKind::Mapping) => match language {
            Language::Python | Language::JavaScript | Language::TypeScript => "{}".to_string(),
            Language::Java => "java.util.Map.of()".to_string(),
            Language::Cpp => "{}".to_string(),
            Language::CSharp => "new object()".to_string(),
        },
        Some(TypeKind::Bool) => match language {
            Language::Python => "True".to_string(),
            _ => "true".to_string(),
        },
        Some(TypeKind::Number) => "1".to_string(),
        Some(TypeKind::Text) => "\"test\"".to_string(),
        None => match language {
            Language::JavaScript | Language::TypeScript => "{}".to_string(),
            Language::Python => "object()".to_string(),
            Language::Cpp => "{}".to_string(),
            Language::Java | Language::CSharp => "null".to_string(),
        },
    }
}

/// A null or otherwise invalid argument.
fn invalid_value(param: &Parameter, language: Language) -> String {
    let numeric = type_kind(&param.type_name) == Some(TypeKind::Number)
        && !type_tokens(&param.type_name).iter().any(|t| t == "number");
    match language {
        // primitives cannot hold null in these languages
        Language::Java | Language::CSharp | Language::Cpp if numeric => "-1".to_string(),
        _ => language.null_literal().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FunctionInfo;
    use std::collections::BTreeSet;

    fn param(name: &str, ty: &str) -> Parameter {
        Parameter {
            name: name.to_string(),
            type_name: ty.to_string(),
            optional: false,
            default_value: None,
        }
    }

    fn target(func: FunctionInfo, owner: Option<&str>) -> Target {
        Target {
            name: func.name.clone(),
            owner: owner.map(str::to_string),
            kind: if owner.is_some() { TargetKind::Method } else { TargetKind::Function },
            start_line: func.start_line,
            end_line: func.end_line,
            dependencies: func.dependencies.clone(),
            integration: false,
            function: Some(func),
        }
    }

    #[test]
    fn test_simple_function_gets_happy_and_invalid() {
        let mut f = FunctionInfo::new("add", 1, 3);
        f.parameters = vec![param("a", "any"), param("b", "any")];
        f.complexity = 2;
        let tests = template_tests(&target(f, None), Language::JavaScript, Framework::Jest, 3);

        let kinds: Vec<_> = tests.iter().map(|t| t.test_type).collect();
        assert_eq!(kinds, vec![TestType::Unit, TestType::EdgeCase]);
        assert_eq!(tests[0].name, "add returns a result for valid input");
        assert_eq!(tests[0].body, "const result = add({}, {});\nexpect(result).toBeDefined();");
        assert_eq!(tests[1].body, "expect(() => add(null, null)).toThrow();");
        assert!(tests.iter().all(|t| t.source == TestSource::Template && t.target == "add"));
    }

    #[test]
    fn test_complex_function_gets_error_test() {
        let mut f = FunctionInfo::new("parse", 1, 30);
        f.complexity = 4;
        let tests = template_tests(&target(f, None), Language::Python, Framework::Pytest, 3);
        let kinds: Vec<_> = tests.iter().map(|t| t.test_type).collect();
        assert_eq!(kinds, vec![TestType::Unit, TestType::ErrorHandling]);
        assert_eq!(tests[1].body, "with pytest.raises(Exception):\n    parse()");
    }

    #[test]
    fn test_method_calls_through_instance() {
        let mut m = FunctionInfo::new("total", 5, 9);
        m.parameters = vec![param("customer", "String")];
        m.return_type = "double".to_string();
        let tests = template_tests(&target(m, Some("OrderService")), Language::Java, Framework::Junit, 3);
        assert_eq!(tests[0].name, "OrderService.total returns a result for valid input");
        assert_eq!(
            tests[0].body,
            "var result = new OrderService().total(\"test\");\nassertNotNull(result);"
        );
        assert_eq!(tests[0].target, "total");
    }

    #[test]
    fn test_void_and_async() {
        let mut f = FunctionInfo::new("save", 1, 4);
        f.return_type = "Promise<void>".to_string();
        f.is_async = true;
        let tests = template_tests(&target(f, None), Language::TypeScript, Framework::Jest, 3);
        assert_eq!(tests[0].name, "save completes for valid input");
        assert_eq!(tests[0].body, "await expect(save()).resolves.toBeUndefined();");
    }

    #[test]
    fn test_integration_target_lists_collaborators() {
        let mut f = FunctionInfo::new("checkout", 1, 9);
        f.dependencies = ["charge", "notify", "reserve"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        let mut t = target(f, None);
        t.integration = true;
        let tests = template_tests(&t, Language::Python, Framework::Pytest, 3);
        let integration = tests.iter().find(|t| t.test_type == TestType::Integration).unwrap();
        assert!(integration.body.starts_with("# collaborators: charge, notify, reserve\n"));
    }

    #[test]
    fn test_placeholders_follow_types() {
        assert_eq!(placeholder(&param("n", "int"), Language::Java), "1");
        assert_eq!(placeholder(&param("s", "str"), Language::Python), "\"test\"");
        assert_eq!(placeholder(&param("xs", "number[]"), Language::TypeScript), "[]");
        assert_eq!(placeholder(&param("ok", "bool"), Language::Python), "True");
        assert_eq!(placeholder(&param("v", "std::vector<int>"), Language::Cpp), "{}");
        let mut with_default = param("tax", "number");
        with_default.default_value = Some("0.2".to_string());
        assert_eq!(placeholder(&with_default, Language::Python), "0.2");
    }

    #[test]
    fn test_placeholders_match_whole_type_names() {
        assert_eq!(placeholder(&param("p", "Point"), Language::TypeScript), "{}");
        assert_eq!(placeholder(&param("i", "Interface"), Language::Java), "null");
        assert_eq!(placeholder(&param("p", "Printer"), Language::CSharp), "null");
        assert_eq!(placeholder(&param("s", "Asset"), Language::Python), "object()");
        assert_eq!(placeholder(&param("n", "Optional[int]"), Language::Python), "1");
        assert_eq!(placeholder(&param("s", "const std::string&"), Language::Cpp), "\"test\"");
        assert_eq!(placeholder(&param("m", "Map<String, Point>"), Language::Java), "java.util.Map.of()");
        assert_eq!(placeholder(&param("d", "Dict[str, List[int]]"), Language::Python), "{}");
        assert_eq!(invalid_value(&param("p", "Point"), Language::Java), "null");
        assert_eq!(invalid_value(&param("n", "int"), Language::Java), "-1");
    }
}
