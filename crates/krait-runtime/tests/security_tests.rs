//! Security-focused tests: static rejection, guard mediation, and the
//! allow-list-by-construction property.

use rstest::rstest;

use krait_runtime::sandbox::{
    AttributeGuard, ImportGuard, ItemAccess, ItemGuard, Sandbox, SandboxError, SandboxPolicy,
    StaticViolation, Value,
};
use krait_runtime::FaultKind;

fn baseline() -> Sandbox {
    Sandbox::new(SandboxPolicy::baseline())
}

fn static_violations(source: &str) -> Vec<StaticViolation> {
    match baseline().execute(source).into_bindings() {
        Err(SandboxError::StaticRejection(violations)) => violations,
        other => panic!("expected static rejection, got {:?}", other),
    }
}

// === Static rejection ===

#[rstest]
#[case("_private = 1")]
#[case("x = _hidden")]
#[case("def _f():\n    return 1\n")]
#[case("import math as _m")]
fn underscore_names_are_rejected(#[case] source: &str) {
    let violations = static_violations(source);
    assert!(violations
        .iter()
        .any(|v| matches!(v, StaticViolation::UnderscoreName { .. })));
}

#[rstest]
#[case("obj.__class__")]
#[case("x = obj.__dict__")]
#[case("obj._internal")]
fn underscore_attributes_are_rejected(#[case] source: &str) {
    let violations = static_violations(source);
    assert!(violations
        .iter()
        .any(|v| matches!(v, StaticViolation::UnderscoreAttribute { .. })));
}

#[rstest]
#[case("eval('1 + 1')", "eval")]
#[case("exec(code)", "exec")]
#[case("compile(src, 'f', 'eval')", "compile")]
#[case("__import__('os')", "__import__")]
fn dynamic_evaluation_is_rejected(#[case] source: &str, #[case] expected: &str) {
    let violations = static_violations(source);
    assert!(violations.iter().any(
        |v| matches!(v, StaticViolation::ForbiddenName { name, .. } if name == expected)
    ));
}

#[test]
fn star_imports_are_rejected() {
    let violations = static_violations("from math import *");
    assert_eq!(
        violations,
        vec![StaticViolation::StarImport {
            module: "math".to_string(),
            line: 1,
        }]
    );
}

#[test]
fn static_rejection_has_no_partial_side_effects() {
    // the clean prefix must not leave bindings behind
    let result = baseline().execute("x = 1\ny = 2\n_z = 3");
    assert!(result.bindings().is_none());
    assert!(matches!(
        result.failure(),
        Some(SandboxError::StaticRejection(_))
    ));
}

#[test]
fn all_violations_are_collected() {
    let violations = static_violations("_a = 1\n_b = eval(src)\nfrom math import *");
    assert!(violations.len() >= 4);
}

#[test]
fn forbidden_names_trump_policy_builtins() {
    // listing eval as a builtin does not bypass the static check
    let policy = SandboxPolicy::baseline().allow_builtin("eval");
    let result = Sandbox::new(policy).execute("eval('1')");
    assert!(matches!(
        result.failure(),
        Some(SandboxError::StaticRejection(_))
    ));
}

// === Guard mediation ===

#[test]
fn attribute_guard_predicate_denies_with_guard_denial() {
    let policy = SandboxPolicy::baseline().with_attribute_guard(AttributeGuard::predicate(
        |target, attr| target == "math" && attr == "sqrt",
    ));
    let sandbox = Sandbox::new(policy);

    let bindings = sandbox
        .execute("import math\nroot = math.sqrt(4)")
        .into_bindings()
        .unwrap();
    assert_eq!(bindings["root"], Value::Float(2.0));

    // same module, different attribute: denied, not merely absent
    let result = sandbox.execute("import math\npi = math.pi");
    match result.failure() {
        Some(SandboxError::GuardDenial { capability, detail }) => {
            assert_eq!(capability, "attribute get");
            assert_eq!(detail, "math.pi");
        }
        other => panic!("expected guard denial, got {:?}", other),
    }
}

#[test]
fn item_guard_mediates_subscript_iteration_and_unpack() {
    let policy = SandboxPolicy::baseline().with_item_guard(ItemGuard::predicate(
        |container, access| container != "list" || access == ItemAccess::Get,
    ));
    let sandbox = Sandbox::new(policy);

    // reads pass
    let bindings = sandbox
        .execute("xs = [1, 2]\nfirst = xs[0]")
        .into_bindings()
        .unwrap();
    assert_eq!(bindings["first"], Value::Int(1));

    // writes, iteration, and unpack are denied
    for source in [
        "xs = [1, 2]\nxs[0] = 9",
        "xs = [1, 2]\nfor x in xs:\n    pass\n",
        "a, b = [1, 2]",
    ] {
        let result = sandbox.execute(source);
        assert!(
            matches!(result.failure(), Some(SandboxError::GuardDenial { .. })),
            "{source}"
        );
    }
}

#[test]
fn import_guard_denies_after_the_allow_list() {
    let policy = SandboxPolicy::baseline()
        .with_import_guard(ImportGuard::predicate(|module| module != "string"));
    let sandbox = Sandbox::new(policy);

    assert!(sandbox.execute("import math").success());
    let result = sandbox.execute("import string");
    assert_eq!(
        result.failure(),
        Some(&SandboxError::ImportDenied {
            module: "string".to_string()
        })
    );
}

#[test]
fn guarded_but_unknown_module_is_still_denied() {
    // the allow-list can name anything; the registry has the last word
    let policy = SandboxPolicy::baseline().allow_module("os");
    let result = Sandbox::new(policy).execute("import os");
    assert!(matches!(
        result.failure(),
        Some(SandboxError::ImportDenied { module }) if module == "os"
    ));
}

// === No capability escape ===

#[test]
fn indirect_reach_through_allowed_object_is_guard_checked() {
    // everything reachable from a module handle goes through the
    // attribute guard; DenyAll closes the indirect route entirely
    let policy = SandboxPolicy::baseline().with_attribute_guard(AttributeGuard::DenyAll);
    let result = Sandbox::new(policy).execute("import math\nx = math.sqrt(4)");
    assert!(matches!(
        result.failure(),
        Some(SandboxError::GuardDenial { capability, .. }) if capability == "attribute get"
    ));
}

#[test]
fn module_members_never_include_other_modules() {
    // no registry module exposes another module as an attribute, so an
    // allowed module cannot hand out a disallowed one
    let result = baseline().execute("import math\nos = math.os");
    assert!(matches!(
        result.failure(),
        Some(SandboxError::Fault(fault)) if fault.kind == FaultKind::AttributeError
    ));
}

#[test]
fn locked_policy_resolves_nothing() {
    let sandbox = Sandbox::new(SandboxPolicy::locked());
    for source in ["len('x')", "abs(-1)", "sum([1])"] {
        match sandbox.eval(source) {
            Err(SandboxError::Fault(fault)) => {
                assert_eq!(fault.kind, FaultKind::NameError, "{source}")
            }
            other => panic!("{source}: expected NameError, got {other:?}"),
        }
    }
}

#[test]
fn executions_are_namespace_isolated() {
    let sandbox = baseline();
    let bindings = sandbox
        .execute("secret = 'hunter2'")
        .into_bindings()
        .unwrap();
    assert_eq!(bindings["secret"], Value::string("hunter2"));

    // a later run never observes an earlier run's bindings
    let result = sandbox.execute("leak = secret");
    assert!(matches!(
        result.failure(),
        Some(SandboxError::Fault(fault)) if fault.kind == FaultKind::NameError
    ));
}

#[test]
fn builtin_values_stay_within_the_policy() {
    // a builtin obtained under one policy is just a name; dispatch still
    // goes through the registry, which knows nothing beyond the table
    let bindings = baseline()
        .execute("f = len\nn = f('abc')")
        .into_bindings()
        .unwrap();
    assert_eq!(bindings["n"], Value::Int(3));
}
