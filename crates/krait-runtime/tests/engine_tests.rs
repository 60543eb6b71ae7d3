//! Notebook-style scenarios for the reactive fragment engine.

use pretty_assertions::assert_eq;

use krait_runtime::sandbox::{SandboxError, SandboxPolicy, Value};
use krait_runtime::{EngineError, FaultKind, FragmentEngine, FragmentState};

fn engine() -> FragmentEngine {
    FragmentEngine::new(SandboxPolicy::baseline())
}

#[test]
fn fragments_evaluate_in_dependency_order() {
    let mut engine = engine();
    // inserted out of order on purpose
    engine.insert("report", "total * factor").unwrap();
    engine.insert("total", "sum(values)").unwrap();
    engine
        .insert("values", "sorted([4, 1, 5])")
        .unwrap();
    engine.insert("factor", "10").unwrap();

    let evaluated = engine.evaluate();
    assert_eq!(evaluated.len(), 4);
    assert_eq!(engine.value("total"), Some(&Value::Int(10)));
    assert_eq!(engine.value("report"), Some(&Value::Int(100)));
    assert_eq!(engine.state("report"), Some(FragmentState::Ready));
}

#[test]
fn editing_a_fragment_reevaluates_only_downstream() {
    let mut engine = engine();
    engine.insert("base", "2").unwrap();
    engine.insert("squared", "base * base").unwrap();
    engine.insert("other", "1000").unwrap();
    engine.evaluate();

    engine.insert("base", "5").unwrap();
    let evaluated = engine.evaluate();

    // `other` is untouched by the edit
    assert!(evaluated.contains(&"base".to_string()));
    assert!(evaluated.contains(&"squared".to_string()));
    assert!(!evaluated.contains(&"other".to_string()));
    assert_eq!(engine.value("squared"), Some(&Value::Int(25)));
}

#[test]
fn resubmitting_equivalent_source_is_a_no_op() {
    let mut engine = engine();
    engine.insert("x", "1 + 2").unwrap();
    engine.insert("y", "x * 10").unwrap();
    engine.evaluate();

    // same structure, different formatting and comments
    engine.insert("x", "1   +   2  # reformatted").unwrap();
    assert_eq!(engine.state("x"), Some(FragmentState::Ready));
    assert!(engine.evaluate().is_empty());
    assert_eq!(engine.value("y"), Some(&Value::Int(30)));
}

#[test]
fn function_fragments_feed_expression_fragments() {
    let mut engine = engine();
    engine
        .insert(
            "double",
            "def double(n):\n    return n * 2\n",
        )
        .unwrap();
    engine.insert("answer", "double(21)").unwrap();
    engine.evaluate();

    assert_eq!(engine.value("answer"), Some(&Value::Int(42)));
}

#[test]
fn import_fragments_provide_modules() {
    let mut engine = engine();
    engine.insert("setup", "import math").unwrap();
    engine.insert("tau", "2 * math.pi").unwrap();
    engine.evaluate();

    assert_eq!(
        engine.value("tau"),
        Some(&Value::Float(2.0 * std::f64::consts::PI))
    );
}

#[test]
fn unsupported_fragments_are_refused_with_the_diagnostic() {
    let mut engine = engine();
    let err = engine.insert("bad", "x = 1").unwrap_err();
    match err {
        EngineError::Unsupported { name, diagnostic } => {
            assert_eq!(name, "bad");
            assert!(diagnostic.contains("assignment"), "{diagnostic}");
        }
        other => panic!("expected Unsupported, got {other:?}"),
    }
    assert!(!engine.contains("bad"));
}

#[test]
fn two_fragments_cannot_produce_the_same_symbol() {
    let mut engine = engine();
    engine
        .insert("first", "def helper():\n    return 1\n")
        .unwrap();
    let err = engine
        .insert("second", "def helper():\n    return 2\n")
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::DuplicateSymbol {
            symbol: "helper".to_string(),
            holder: "first".to_string(),
        }
    );
    assert!(!engine.contains("second"));
}

#[test]
fn cyclic_edits_are_rejected_and_rolled_back() {
    let mut engine = engine();
    engine.insert("a", "b + 1").unwrap();
    let err = engine.insert("b", "a + 1").unwrap_err();
    assert!(matches!(err, EngineError::Cycle(_)));
    assert!(!engine.contains("b"));

    // the engine still works after the refused edit
    engine.insert("b", "10").unwrap();
    engine.evaluate();
    assert_eq!(engine.value("a"), Some(&Value::Int(11)));
}

#[test]
fn missing_dependency_fails_only_the_dependents() {
    let mut engine = engine();
    engine.insert("standalone", "7").unwrap();
    engine.insert("needy", "ghost + 1").unwrap();
    engine.evaluate();

    assert_eq!(engine.state("standalone"), Some(FragmentState::Ready));
    assert_eq!(engine.state("needy"), Some(FragmentState::Failed));
    assert!(matches!(
        engine.failure("needy"),
        Some(SandboxError::Fault(fault)) if fault.kind == FaultKind::NameError
    ));

    // supplying the missing producer repairs it on the next pass
    engine.insert("ghost", "41").unwrap();
    engine.evaluate();
    assert_eq!(engine.state("needy"), Some(FragmentState::Ready));
    assert_eq!(engine.value("needy"), Some(&Value::Int(42)));
}

#[test]
fn removing_a_producer_degrades_its_dependents() {
    let mut engine = engine();
    engine.insert("source", "3").unwrap();
    engine.insert("derived", "source * source").unwrap();
    engine.evaluate();
    assert_eq!(engine.value("derived"), Some(&Value::Int(9)));

    engine.remove("source").unwrap();
    engine.evaluate();
    assert_eq!(engine.value("source"), None);
    assert_eq!(engine.state("derived"), Some(FragmentState::Failed));
}

#[test]
fn removing_an_unknown_fragment_is_an_error() {
    let mut engine = engine();
    assert_eq!(
        engine.remove("nope").unwrap_err(),
        EngineError::UnknownFragment("nope".to_string())
    );
}

#[test]
fn replacing_a_fragment_rewires_its_symbols() {
    let mut engine = engine();
    engine
        .insert("defs", "def f(n):\n    return n + 1\n")
        .unwrap();
    engine.insert("use", "f(1)").unwrap();
    engine.evaluate();
    assert_eq!(engine.value("use"), Some(&Value::Int(2)));

    // replace the producer with a different definition of the same name
    engine
        .insert("defs", "def f(n):\n    return n * 100\n")
        .unwrap();
    engine.evaluate();
    assert_eq!(engine.value("use"), Some(&Value::Int(100)));

    // replace it with an unrelated symbol: the old one disappears
    engine
        .insert("defs", "def g(n):\n    return n\n")
        .unwrap();
    engine.evaluate();
    assert_eq!(engine.value("f"), None);
    assert_eq!(engine.state("use"), Some(FragmentState::Failed));
}

#[test]
fn long_chain_recomputes_end_to_end() {
    let mut engine = engine();
    engine.insert("n0", "1").unwrap();
    for i in 1..=8 {
        engine
            .insert(&format!("n{i}"), &format!("n{} * 2", i - 1))
            .unwrap();
    }
    engine.evaluate();
    assert_eq!(engine.value("n8"), Some(&Value::Int(256)));

    engine.insert("n0", "3").unwrap();
    let evaluated = engine.evaluate();
    assert_eq!(evaluated.len(), 9);
    assert_eq!(engine.value("n8"), Some(&Value::Int(768)));
}
