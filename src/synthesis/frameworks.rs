//! Test framework catalog and file rendering.
//!
//! Each framework knows its import block, optional suite wrapper, per-test
//! block, closing block, file naming rule and the assertion idioms used by
//! template tests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{GeneratedFile, TestCase};
use crate::error::ValidationError;
use crate::language::Language;

/// A supported test framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Jest,
    Mocha,
    Vitest,
    Pytest,
    Unittest,
    Junit,
    Gtest,
    Xunit,
    Nunit,
}

impl Framework {
    pub const ALL: [Framework; 9] = [
        Framework::Jest,
        Framework::Mocha,
        Framework::Vitest,
        Framework::Pytest,
        Framework::Unittest,
        Framework::Junit,
        Framework::Gtest,
        Framework::Xunit,
        Framework::Nunit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Jest => "jest",
            Framework::Mocha => "mocha",
            Framework::Vitest => "vitest",
            Framework::Pytest => "pytest",
            Framework::Unittest => "unittest",
            Framework::Junit => "junit",
            Framework::Gtest => "gtest",
            Framework::Xunit => "xunit",
            Framework::Nunit => "nunit",
        }
    }

    /// Framework used when none is requested.
    pub fn default_for(language: Language) -> Self {
        match language {
            Language::JavaScript | Language::TypeScript => Framework::Jest,
            Language::Python => Framework::Pytest,
            Language::Java => Framework::Junit,
            Language::Cpp => Framework::Gtest,
            Language::CSharp => Framework::Xunit,
        }
    }

    pub fn supports(&self, language: Language) -> bool {
        match self {
            Framework::Jest | Framework::Mocha | Framework::Vitest => {
                matches!(language, Language::JavaScript | Language::TypeScript)
            }
            Framework::Pytest | Framework::Unittest => language == Language::Python,
            Framework::Junit => language == Language::Java,
            Framework::Gtest => language == Language::Cpp,
            Framework::Xunit | Framework::Nunit => language == Language::CSharp,
        }
    }

    /// Resolve `requested` (or the default) for `language`.
    pub fn resolve(requested: Option<Framework>, language: Language) -> Result<Self, ValidationError> {
        let framework = requested.unwrap_or_else(|| Framework::default_for(language));
        if framework.supports(language) {
            Ok(framework)
        } else {
            Err(ValidationError::IncompatibleFramework {
                framework: framework.to_string(),
                language: language.to_string(),
            })
        }
    }

    /// Whether tests are grouped under a named suite block.
    pub fn has_wrapper(&self) -> bool {
        !matches!(self, Framework::Pytest | Framework::Gtest)
    }

    /// Test file name for a target.
    pub fn file_name(&self, stem: &str, language: Language) -> String {
        match self {
            Framework::Jest | Framework::Vitest => format!("{}.test.{}", stem, script_ext(language)),
            Framework::Mocha => format!("{}.spec.{}", stem, script_ext(language)),
            Framework::Pytest | Framework::Unittest => format!("test_{}.py", snake_case(stem)),
            Framework::Junit => format!("{}Test.java", pascal_case(stem)),
            Framework::Gtest => format!("{}_test.cpp", snake_case(stem)),
            Framework::Xunit | Framework::Nunit => format!("{}Tests.cs", pascal_case(stem)),
        }
    }

    /// Import block. `module` is the source module name, `symbols` the
    /// names the tests reference.
    pub fn imports(&self, module: &str, symbols: &[String], tests: &[TestCase]) -> String {
        let names = symbols.join(", ");
        match self {
            Framework::Jest => format!("import {{ {} }} from './{}';\n", names, module),
            Framework::Vitest => format!(
                "import {{ describe, it, expect }} from 'vitest';\nimport {{ {} }} from './{}';\n",
                names, module
            ),
            Framework::Mocha => format!(
                "const {{ expect }} = require('chai');\nconst {{ {} }} = require('./{}');\n",
                names, module
            ),
            Framework::Pytest => {
                let mut block = String::new();
                if tests.iter().any(|t| t.body.contains("asyncio.")) {
                    block.push_str("import asyncio\n\n");
                }
                block.push_str("import pytest\n\n");
                block.push_str(&format!("from {} import {}\n", module, names));
                block
            }
            Framework::Unittest => {
                let mut block = String::new();
                if tests.iter().any(|t| t.body.contains("asyncio.")) {
                    block.push_str("import asyncio\n");
                }
                block.push_str("import unittest\n\n");
                block.push_str(&format!("from {} import {}\n", module, names));
                block
            }
            Framework::Junit => "import org.junit.jupiter.api.Test;\n\nimport static org.junit.jupiter.api.Assertions.*;\n"
                .to_string(),
            Framework::Gtest => format!("#include <gtest/gtest.h>\n\n#include \"{}.h\"\n", module),
            Framework::Xunit => "using System;\nusing System.Threading.Tasks;\nusing Xunit;\n".to_string(),
            Framework::Nunit => "using System;\nusing System.Threading.Tasks;\nusing NUnit.Framework;\n".to_string(),
        }
    }

    /// Opening suite block, if the framework has one.
    pub fn open_wrapper(&self, suite: &str) -> Option<String> {
        match self {
            Framework::Jest | Framework::Mocha | Framework::Vitest => {
                Some(format!("describe('{}', () => {{\n", escape_single(suite)))
            }
            Framework::Unittest => Some(format!("class Test{}(unittest.TestCase):\n", pascal_case(suite))),
            Framework::Junit => Some(format!("class {}Test {{\n", pascal_case(suite))),
            Framework::Xunit => Some(format!("public class {}Tests\n{{\n", pascal_case(suite))),
            Framework::Nunit => Some(format!("[TestFixture]\npublic class {}Tests\n{{\n", pascal_case(suite))),
            Framework::Pytest | Framework::Gtest => None,
        }
    }

    /// Closing block, matching [`Framework::open_wrapper`].
    pub fn close_wrapper(&self) -> String {
        match self {
            Framework::Jest | Framework::Mocha | Framework::Vitest => "});\n".to_string(),
            Framework::Unittest => "\n\nif __name__ == \"__main__\":\n    unittest.main()\n".to_string(),
            Framework::Junit | Framework::Xunit | Framework::Nunit => "}\n".to_string(),
            Framework::Pytest | Framework::Gtest => String::new(),
        }
    }

    /// One rendered test block.
    pub fn render_test(&self, suite: &str, case: &TestCase) -> String {
        let is_async = case.body.contains("await ");
        match self {
            Framework::Jest | Framework::Mocha | Framework::Vitest => format!(
                "  it('{}', {}() => {{\n{}  }});\n",
                escape_single(&case.name),
                if is_async { "async " } else { "" },
                indent(&case.body, 4)
            ),
            Framework::Pytest => format!("def test_{}():\n{}", snake_case(&case.name), indent(&case.body, 4)),
            Framework::Unittest => format!(
                "    def test_{}(self):\n{}",
                snake_case(&case.name),
                indent(&case.body, 8)
            ),
            Framework::Junit => format!(
                "    @Test\n    void {}() throws Exception {{\n{}    }}\n",
                camel_case(&case.name),
                indent(&case.body, 8)
            ),
            Framework::Gtest => format!(
                "TEST({}Test, {}) {{\n{}}}\n",
                pascal_case(suite),
                pascal_case(&case.name),
                indent(&case.body, 4)
            ),
            Framework::Xunit | Framework::Nunit => format!(
                "    [{}]\n    public {} {}()\n    {{\n{}    }}\n",
                if *self == Framework::Xunit { "Fact" } else { "Test" },
                if is_async { "async Task" } else { "void" },
                pascal_case(&case.name),
                indent(&case.body, 8)
            ),
        }
    }

    /// Render a whole test file for one target.
    pub fn render_file(
        &self,
        language: Language,
        module: &str,
        suite: &str,
        stem: &str,
        symbols: &[String],
        tests: &[TestCase],
    ) -> GeneratedFile {
        let mut content = self.imports(module, symbols, tests);
        content.push('\n');
        if let Some(open) = self.open_wrapper(suite) {
            content.push_str(&open);
        }
        let separator = match self {
            Framework::Pytest | Framework::Gtest => "\n\n",
            _ => "\n",
        };
        let blocks: Vec<String> = tests.iter().map(|t| self.render_test(suite, t)).collect();
        content.push_str(&blocks.join(separator));
        content.push_str(&self.close_wrapper());

        GeneratedFile {
            name: self.file_name(stem, language),
            content,
            test_count: tests.len(),
        }
    }

    /// Statements asserting that `call` succeeds.
    pub fn expect_success(&self, call: &str, returns_value: bool, is_async: bool) -> Vec<String> {
        let awaited = |call: &str| if is_async { format!("await {}", call) } else { call.to_string() };
        match self {
            Framework::Jest | Framework::Vitest => match (returns_value, is_async) {
                (true, _) => vec![
                    format!("const result = {};", awaited(call)),
                    "expect(result).toBeDefined();".to_string(),
                ],
                (false, false) => vec![format!("expect(() => {}).not.toThrow();", call)],
                (false, true) => vec![format!("await expect({}).resolves.toBeUndefined();", call)],
            },
            Framework::Mocha => match (returns_value, is_async) {
                (true, _) => vec![
                    format!("const result = {};", awaited(call)),
                    "expect(result).to.not.be.undefined;".to_string(),
                ],
                (false, false) => vec![format!("expect(() => {}).to.not.throw();", call)],
                (false, true) => vec![format!("await {};", call)],
            },
            Framework::Pytest | Framework::Unittest => {
                let call = if is_async { format!("asyncio.run({})", call) } else { call.to_string() };
                match (returns_value, self) {
                    (true, Framework::Pytest) => {
                        vec![format!("result = {}", call), "assert result is not None".to_string()]
                    }
                    (true, _) => vec![
                        format!("result = {}", call),
                        "self.assertIsNotNone(result)".to_string(),
                    ],
                    (false, _) => vec![call],
                }
            }
            Framework::Junit => {
                if returns_value {
                    vec![format!("var result = {};", call), "assertNotNull(result);".to_string()]
                } else {
                    vec![format!("assertDoesNotThrow(() -> {});", call)]
                }
            }
            Framework::Gtest => vec![format!("EXPECT_NO_THROW({});", call)],
            Framework::Xunit => match (returns_value, is_async) {
                (true, _) => vec![
                    format!("var result = {};", awaited(call)),
                    "Assert.NotNull(result);".to_string(),
                ],
                (false, false) => vec![
                    format!("var exception = Record.Exception(() => {});", call),
                    "Assert.Null(exception);".to_string(),
                ],
                (false, true) => vec![format!("await {};", call)],
            },
            Framework::Nunit => match (returns_value, is_async) {
                (true, _) => vec![
                    format!("var result = {};", awaited(call)),
                    "Assert.That(result, Is.Not.Null);".to_string(),
                ],
                (false, false) => vec![format!("Assert.DoesNotThrow(() => {});", call)],
                (false, true) => vec![format!("await {};", call)],
            },
        }
    }

    /// Statements asserting that `call` throws.
    pub fn expect_throws(&self, call: &str, is_async: bool) -> Vec<String> {
        match self {
            Framework::Jest | Framework::Vitest => {
                if is_async {
                    vec![format!("await expect({}).rejects.toThrow();", call)]
                } else {
                    vec![format!("expect(() => {}).toThrow();", call)]
                }
            }
            Framework::Mocha => {
                if is_async {
                    vec![
                        "let error;".to_string(),
                        format!("try {{ await {}; }} catch (e) {{ error = e; }}", call),
                        "expect(error).to.be.an('error');".to_string(),
                    ]
                } else {
                    vec![format!("expect(() => {}).to.throw();", call)]
                }
            }
            Framework::Pytest | Framework::Unittest => {
                let call = if is_async { format!("asyncio.run({})", call) } else { call.to_string() };
                let guard = if *self == Framework::Pytest {
                    "with pytest.raises(Exception):"
                } else {
                    "with self.assertRaises(Exception):"
                };
                vec![guard.to_string(), format!("    {}", call)]
            }
            Framework::Junit => vec![format!("assertThrows(Exception.class, () -> {});", call)],
            Framework::Gtest => vec![format!("EXPECT_ANY_THROW({});", call)],
            Framework::Xunit => {
                if is_async {
                    vec![format!("await Assert.ThrowsAnyAsync<Exception>(() => {});", call)]
                } else {
                    vec![format!("Assert.ThrowsAny<Exception>(() => {});", call)]
                }
            }
            Framework::Nunit => {
                if is_async {
                    vec![format!("Assert.CatchAsync(async () => await {});", call)]
                } else {
                    vec![format!("Assert.Catch(() => {});", call)]
                }
            }
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        Framework::ALL
            .into_iter()
            .find(|f| f.as_str() == tag)
            .ok_or_else(|| ValidationError::UnknownFramework(s.to_string()))
    }
}

fn script_ext(language: Language) -> &'static str {
    match language {
        Language::TypeScript => "ts",
        _ => "js",
    }
}

fn escape_single(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

fn indent(body: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    body.lines()
        .map(|line| {
            if line.trim().is_empty() {
                "\n".to_string()
            } else {
                format!("{}{}\n", pad, line)
            }
        })
        .collect()
}

/// Split free text or identifiers into words: `Cart.addItem x` →
/// `[Cart, add, Item, x]`.
fn words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in text.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub(crate) fn snake_case(text: &str) -> String {
    words(text)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub(crate) fn pascal_case(text: &str) -> String {
    words(text)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

pub(crate) fn camel_case(text: &str) -> String {
    let pascal = pascal_case(text);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{TestSource, TestType};

    fn case(name: &str, body: &str) -> TestCase {
        TestCase {
            id: "tc-0001".to_string(),
            name: name.to_string(),
            test_type: TestType::Unit,
            target: "add".to_string(),
            framework: "jest".to_string(),
            body: body.to_string(),
            source: TestSource::Template,
        }
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(snake_case("add returns a result"), "add_returns_a_result");
        assert_eq!(snake_case("Cart.addItem"), "cart_add_item");
        assert_eq!(pascal_case("cart add item"), "CartAddItem");
        assert_eq!(camel_case("Cart.add rejects invalid"), "cartAddRejectsInvalid");
    }

    #[test]
    fn test_defaults_and_compatibility() {
        for language in Language::ALL {
            assert!(Framework::default_for(language).supports(language));
        }
        assert!(Framework::Vitest.supports(Language::TypeScript));
        assert!(!Framework::Pytest.supports(Language::Java));
        assert!(matches!(
            Framework::resolve(Some(Framework::Junit), Language::Python),
            Err(ValidationError::IncompatibleFramework { .. })
        ));
        assert!(matches!(
            "rspec".parse::<Framework>(),
            Err(ValidationError::UnknownFramework(_))
        ));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(Framework::Jest.file_name("add", Language::TypeScript), "add.test.ts");
        assert_eq!(Framework::Mocha.file_name("add", Language::JavaScript), "add.spec.js");
        assert_eq!(Framework::Pytest.file_name("Cart_add", Language::Python), "test_cart_add.py");
        assert_eq!(Framework::Junit.file_name("Cart_add", Language::Java), "CartAddTest.java");
        assert_eq!(Framework::Xunit.file_name("compute", Language::CSharp), "ComputeTests.cs");
    }

    #[test]
    fn test_render_jest_file() {
        let tests = vec![case(
            "add returns a result",
            "const result = add(1, 1);\nexpect(result).toBeDefined();",
        )];
        let file = Framework::Jest.render_file(
            Language::JavaScript,
            "math",
            "add",
            "add",
            &["add".to_string()],
            &tests,
        );
        assert_eq!(file.name, "add.test.js");
        assert_eq!(file.test_count, 1);
        assert_eq!(
            file.content,
            "import { add } from './math';\n\n\
             describe('add', () => {\n  \
             it('add returns a result', () => {\n    \
             const result = add(1, 1);\n    \
             expect(result).toBeDefined();\n  \
             });\n\
             });\n"
        );
    }

    #[test]
    fn test_render_pytest_async_imports() {
        let tests = vec![case("fetch works", "result = asyncio.run(fetch(1))\nassert result is not None")];
        let file = Framework::Pytest.render_file(
            Language::Python,
            "client",
            "fetch",
            "fetch",
            &["fetch".to_string()],
            &tests,
        );
        assert!(file.content.starts_with("import asyncio\n\nimport pytest\n\nfrom client import fetch\n"));
        assert!(file.content.contains("def test_fetch_works():\n    result = asyncio.run(fetch(1))\n"));
    }

    #[test]
    fn test_async_body_makes_async_test() {
        let rendered = Framework::Xunit.render_test("Svc", &case("load", "var result = await new Svc().Load();"));
        assert!(rendered.contains("public async Task Load()"));
        let rendered = Framework::Jest.render_test("load", &case("load", "await load();"));
        assert!(rendered.contains("async () =>"));
    }

    #[test]
    fn test_assertion_idioms() {
        assert_eq!(
            Framework::Junit.expect_throws("new Svc().run(null)", false),
            vec!["assertThrows(Exception.class, () -> new Svc().run(null));"]
        );
        assert_eq!(
            Framework::Pytest.expect_throws("run(None)", false),
            vec!["with pytest.raises(Exception):", "    run(None)"]
        );
        assert_eq!(
            Framework::Gtest.expect_success("clamp(1, 0, 2)", true, false),
            vec!["EXPECT_NO_THROW(clamp(1, 0, 2));"]
        );
    }
}
