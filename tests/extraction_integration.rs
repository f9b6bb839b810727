//! Integration tests for structural extraction and metrics.
//!
//! These run every extractor against the testdata fixtures and check the
//! properties every extraction must hold, whatever the language.

use std::path::PathBuf;

use testsynth::analysis::{compute_metrics, extract, ExtractOptions, ModuleStructure, Severity};
use testsynth::{content_hash, Language};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn setup() {
    testsynth::init();
}

/// Every fixture with its language, detected from the file name.
fn fixtures() -> Vec<(String, Language, String)> {
    let mut out: Vec<_> = std::fs::read_dir(testdata_path())
        .expect("should read testdata dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            let language = Language::from_filename(&name)?;
            let source = std::fs::read_to_string(&p).ok()?;
            Some((name, language, source))
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn assert_line_bounds(name: &str, source: &str, structure: &ModuleStructure) {
    let total = source.lines().count().max(1);
    for func in structure.callables() {
        assert!(
            1 <= func.start_line && func.start_line <= func.end_line && func.end_line <= total,
            "{}: {} has bad range {}-{} (file has {} lines)",
            name,
            func.name,
            func.start_line,
            func.end_line,
            total
        );
        assert!(func.complexity >= 1, "{}: {} has complexity 0", name, func.name);
    }
    for class in &structure.classes {
        assert!(
            1 <= class.start_line && class.start_line <= class.end_line && class.end_line <= total,
            "{}: class {} has bad range {}-{}",
            name,
            class.name,
            class.start_line,
            class.end_line
        );
    }
}

#[test]
fn test_every_language_has_a_fixture() {
    let languages: Vec<Language> = fixtures().iter().map(|(_, l, _)| *l).collect();
    for language in Language::ALL {
        assert!(languages.contains(&language), "no fixture for {}", language);
    }
}

#[test]
fn test_fixtures_extract_within_bounds() {
    setup();

    for (name, language, source) in fixtures() {
        let structure = extract(language, &source, &ExtractOptions::default());
        assert!(structure.callable_count() > 0, "{}: nothing extracted", name);
        assert_line_bounds(&name, &source, &structure);

        let metrics = compute_metrics(language, &source, &structure);
        assert!(
            (0.0..=171.0).contains(&metrics.maintainability_index),
            "{}: maintainability {} out of range",
            name,
            metrics.maintainability_index
        );
        assert!(metrics.cognitive_complexity >= 1);
        assert_eq!(
            metrics.lines_of_code,
            metrics.logical_lines + metrics.comment_lines + metrics.blank_lines,
            "{}: line kinds should partition the file",
            name
        );
    }
}

#[test]
fn test_heuristic_only_stays_within_bounds() {
    setup();

    let options = ExtractOptions {
        heuristic_only: true,
        ..Default::default()
    };
    for (name, language, source) in fixtures() {
        let structure = extract(language, &source, &options);
        assert!(structure.callable_count() > 0, "{}: nothing extracted", name);
        assert_line_bounds(&name, &source, &structure);
    }
}

#[test]
fn test_every_fixture_finds_add() {
    setup();

    for (name, language, source) in fixtures() {
        let structure = extract(language, &source, &ExtractOptions::default());
        let add = structure
            .callables()
            .find(|f| f.name.eq_ignore_ascii_case("add"))
            .unwrap_or_else(|| panic!("{}: add not found", name));
        assert_eq!(add.parameters.len(), 2, "{}: add parameters", name);
        assert_eq!(add.complexity, 2, "{}: add complexity", name);
    }
}

#[test]
fn test_javascript_example() {
    setup();

    let src = "function add(a,b){ if(a<0){throw new Error('x');} return a+b; }";
    let structure = extract(Language::JavaScript, src, &ExtractOptions::default());
    assert_eq!(structure.functions.len(), 1);
    let add = &structure.functions[0];
    assert_eq!(add.name, "add");
    assert_eq!(add.complexity, 2);
    assert_eq!(add.parameters.len(), 2);
    assert_eq!((add.start_line, add.end_line), (1, 1));
}

#[test]
fn test_strings_do_not_break_block_matching() {
    setup();

    let (_, _, source) = fixtures()
        .into_iter()
        .find(|(name, _, _)| name == "sample.js")
        .expect("sample.js fixture");
    let structure = extract(Language::JavaScript, &source, &ExtractOptions::default());

    let classify = structure.functions.iter().find(|f| f.name == "classify").unwrap();
    assert!(classify.complexity > 5, "classify complexity {}", classify.complexity);
    let cart = structure.classes.iter().find(|c| c.name == "Cart").unwrap();
    assert!(cart.start_line > classify.end_line);
    assert!(structure.imports.len() >= 2);
}

#[test]
fn test_python_string_does_not_define_functions() {
    setup();

    let (_, _, source) = fixtures()
        .into_iter()
        .find(|(name, _, _)| name == "sample.py")
        .expect("sample.py fixture");
    let structure = extract(Language::Python, &source, &ExtractOptions::default());

    assert!(structure.callables().all(|f| f.name != "not_a_function"));
    let private = structure.functions.iter().find(|f| f.name == "_private_helper").unwrap();
    assert!(!private.is_exported);
    let restock = structure.functions.iter().find(|f| f.name == "restock").unwrap();
    assert!(restock.complexity > 5);
    assert!(restock.parameters.iter().any(|p| p.name == "threshold" && p.optional));
}

#[test]
fn test_empty_input_for_every_language() {
    setup();

    for language in Language::ALL {
        for src in ["", "   \n\t\n"] {
            let structure = extract(language, src, &ExtractOptions::default());
            assert!(structure.functions.is_empty(), "{}", language);
            assert!(structure.classes.is_empty(), "{}", language);
            assert!(!structure.diagnostics.is_empty(), "{}", language);
        }
    }
}

#[test]
fn test_garbage_input_never_panics() {
    setup();

    let garbage = [
        "\u{0}\u{1}\u{2}}}}{{{(((",
        "function (",
        "class { def : ; } } } }",
        "\"unterminated string { if (x) {",
        "/* unterminated comment",
        "def f(:\n  if\n\tclass\n",
        "\u{feff}ünïcödé { return 1; }",
    ];
    for language in Language::ALL {
        for src in garbage {
            let structure = extract(language, src, &ExtractOptions::default());
            assert_line_bounds(language.as_str(), src, &structure);
            for d in &structure.diagnostics {
                assert!(d.line >= 1);
                assert!(matches!(d.severity, Severity::Error | Severity::Warning | Severity::Info));
            }
        }
    }
}

#[test]
fn test_unicode_identifiers_for_every_language() {
    setup();

    let cases = [
        (Language::JavaScript, "const café = 1;\nfunction add(a, b) { return a + b; }\n"),
        (
            Language::TypeScript,
            "const π: number = 3.14;\nexport function add(a: number, b: number): number { return a + b; }\n",
        ),
        (Language::Python, "π = 3.14\n\ndef add(a, b):\n    return a + b\n"),
        (Language::Java, "class Größe {\n    int add(int a, int b) { return a + b; }\n}\n"),
        (Language::Cpp, "// größe\nint add(int a, int b) { return a + b; }\nint größe = 1;\n"),
        (Language::CSharp, "class Größe {\n    public int Add(int a, int b) { return a + b; }\n}\n"),
    ];
    for (language, src) in cases {
        for heuristic_only in [false, true] {
            let options = ExtractOptions {
                heuristic_only,
                ..Default::default()
            };
            let structure = extract(language, src, &options);
            assert_line_bounds(language.as_str(), src, &structure);
            let add = structure
                .callables()
                .find(|f| f.name.eq_ignore_ascii_case("add"))
                .unwrap_or_else(|| panic!("{}: add not found", language));
            assert_eq!(add.parameters.len(), 2, "{}", language);

            let metrics = compute_metrics(language, src, &structure);
            assert!(metrics.lines_of_code > 0);
        }
        assert!(!testsynth::analysis::find_branch_points(src, language).iter().any(|b| b.line == 0));
    }
}

#[test]
fn test_lossy_binary_input_never_panics() {
    setup();

    // deterministic byte soup, decoded the way a caller reading binary would
    let mut state: u32 = 0x2545_f491;
    let bytes: Vec<u8> = (0..4000)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();
    let src = String::from_utf8_lossy(&bytes).into_owned();

    for language in Language::ALL {
        let structure = extract(language, &src, &ExtractOptions::default());
        assert_line_bounds(language.as_str(), &src, &structure);
        let metrics = compute_metrics(language, &src, &structure);
        assert!((0.0..=171.0).contains(&metrics.maintainability_index));
        testsynth::analysis::find_branch_points(&src, language);
    }
}

#[test]
fn test_content_hash_is_deterministic() {
    let a = content_hash("let x = 1;\n", Language::JavaScript);
    assert_eq!(a, content_hash("let x = 1;\n", Language::JavaScript));
    assert_ne!(a, content_hash("let x = 2;\n", Language::JavaScript));
    assert_ne!(a, content_hash("let x = 1;\n", Language::TypeScript));
}
