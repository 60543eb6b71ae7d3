//! End-to-end tests for symbol extraction and statement classification.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use rstest::rstest;

use krait_runtime::{analyze_source, extract_source, AnalysisError, FragmentKind};

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// === Symbol extraction ===

#[test]
fn extract_collects_read_and_written_names() {
    // the extractor is a coarse index: bound and free names both land
    // in `variables`
    let symbols = extract_source("x = y + 1\nz = x");
    assert_eq!(symbols.variables, set(&["x", "y", "z"]));
    assert!(symbols.functions.is_empty());
    assert!(symbols.modules.is_empty());
}

#[test]
fn extract_records_bare_call_names() {
    let symbols = extract_source("total = sum(values)");
    assert_eq!(symbols.functions, set(&["sum"]));
    // call targets are names too, so `sum` shows up in both roles
    assert_eq!(symbols.variables, set(&["sum", "total", "values"]));
}

#[test]
fn extract_records_full_dotted_call_paths() {
    let symbols = extract_source("pkg.sub.fn(arg)");
    assert_eq!(symbols.functions, set(&["pkg.sub.fn"]));
    assert!(symbols.variables.contains("arg"));
}

#[test]
fn extract_records_import_module_paths() {
    let symbols = extract_source("import math\nfrom os.path import join");
    assert_eq!(symbols.modules, set(&["math", "os.path"]));
}

#[test]
fn extract_of_unparseable_source_is_empty() {
    let symbols = extract_source("def broken(:");
    assert!(symbols.is_empty());
}

#[rstest]
#[case("value", &["value"])]
#[case("a = b = c", &["a", "b", "c"])]
#[case("for i in items:\n    total += i\n", &["i", "items", "total"])]
fn extract_variables(#[case] source: &str, #[case] expected: &[&str]) {
    assert_eq!(extract_source(source).variables, set(expected));
}

// === Statement classification ===

#[test]
fn empty_source_yields_empty_statement() {
    let analysis = analyze_source("");
    assert_eq!(analysis.diagnostic(), Some(&AnalysisError::EmptyStatement));
    assert!(analysis.produced_symbols().is_empty());
    assert!(analysis.dependencies().is_empty());
}

#[test]
fn comment_only_source_yields_empty_statement() {
    let analysis = analyze_source("# nothing here\n");
    assert_eq!(analysis.diagnostic(), Some(&AnalysisError::EmptyStatement));
}

#[test]
fn multiple_statements_are_a_hard_boundary() {
    let analysis = analyze_source("import os; import sys");
    assert_eq!(
        analysis.diagnostic(),
        Some(&AnalysisError::MultipleStatements(2))
    );

    let analysis = analyze_source("x = 1\ny = 2\nz = 3");
    assert_eq!(
        analysis.diagnostic(),
        Some(&AnalysisError::MultipleStatements(3))
    );
}

#[test]
fn expression_dependencies_are_all_names_read() {
    let analysis = analyze_source("x + y * z");
    assert_eq!(analysis.kind(), Some(FragmentKind::Expression));
    assert!(analysis.produced_symbols().is_empty());
    assert_eq!(*analysis.dependencies(), set(&["x", "y", "z"]));
}

#[test]
fn expression_dependency_of_attribute_chain_is_the_root() {
    let analysis = analyze_source("obj.method(arg)");
    assert_eq!(*analysis.dependencies(), set(&["arg", "obj"]));

    // deeper attribute links are not separately recorded
    let analysis = analyze_source("a.b.c.d");
    assert_eq!(*analysis.dependencies(), set(&["a"]));
}

#[test]
fn function_dependencies_exclude_parameters_and_self() {
    let analysis = analyze_source("def f(x):\n    return x * factor\n");
    assert_eq!(analysis.kind(), Some(FragmentKind::FunctionDefinition));
    assert_eq!(*analysis.produced_symbols(), set(&["f"]));
    assert_eq!(*analysis.dependencies(), set(&["factor"]));
}

#[test]
fn recursive_function_is_not_its_own_dependency() {
    let analysis =
        analyze_source("def fact(n):\n    if n < 2:\n        return 1\n    return n * fact(n - 1)\n");
    assert_eq!(*analysis.produced_symbols(), set(&["fact"]));
    assert!(analysis.dependencies().is_empty());
}

#[test]
fn function_varargs_are_excluded_from_dependencies() {
    let analysis = analyze_source("def f(a, *rest, **named):\n    return a + len(rest) + len(named) + other\n");
    assert_eq!(*analysis.dependencies(), set(&["len", "other"]));
}

#[test]
fn import_produces_first_segment_or_alias() {
    let analysis = analyze_source("import a.b.c");
    assert_eq!(analysis.kind(), Some(FragmentKind::Import));
    assert_eq!(*analysis.produced_symbols(), set(&["a"]));
    assert!(analysis.dependencies().is_empty());

    let analysis = analyze_source("import matplotlib.pyplot as plt");
    assert_eq!(*analysis.produced_symbols(), set(&["plt"]));
}

#[test]
fn import_from_produces_member_names_or_aliases() {
    let analysis = analyze_source("from math import sqrt, sin");
    assert_eq!(analysis.kind(), Some(FragmentKind::ImportFrom));
    assert_eq!(*analysis.produced_symbols(), set(&["sin", "sqrt"]));
    assert!(analysis.dependencies().is_empty());

    let analysis = analyze_source("from math import sqrt as root");
    assert_eq!(*analysis.produced_symbols(), set(&["root"]));
}

#[rstest]
#[case("x = 1", "assignment")]
#[case("x += 1", "augmented assignment")]
#[case("if x:\n    pass\n", "if")]
#[case("while x:\n    pass\n", "while")]
#[case("for i in xs:\n    pass\n", "for")]
#[case("pass", "pass")]
fn unsupported_statement_names_its_kind(#[case] source: &str, #[case] kind: &'static str) {
    let analysis = analyze_source(source);
    assert!(!analysis.is_ok());
    assert_eq!(
        analysis.diagnostic(),
        Some(&AnalysisError::UnsupportedStatement { kind })
    );
}

#[test]
fn syntax_error_carries_the_line() {
    let analysis = analyze_source("def broken(:");
    match analysis.diagnostic() {
        Some(AnalysisError::Syntax { line, .. }) => assert_eq!(*line, 1),
        other => panic!("expected syntax diagnostic, got {:?}", other),
    }
    assert!(analysis.kind().is_none());
}

#[test]
fn accessors_are_total_on_failed_analyses() {
    // a diagnostic never panics the query surface
    let analysis = analyze_source("x = 1\ny = 2");
    assert!(analysis.kind().is_none());
    assert!(analysis.produced_symbols().is_empty());
    assert!(analysis.dependencies().is_empty());
    assert!(analysis.classification().is_none());
}
