//! Static guard check
//!
//! A compile-time pass over the parsed fragment that rejects syntax the
//! runtime guards cannot safely mediate: underscore-prefixed names and
//! attributes (the dunder escape hatches live there), references to the
//! dynamic-evaluation builtins, and star imports. Rejection happens before
//! anything runs, so a rejected fragment has no partial side effects. All
//! violations are collected; the caller reports them together.

use thiserror::Error;

use crate::ast::{Expr, ExprKind, Module, Stmt, StmtKind};
use crate::span::{line_col, Span};

/// Names that reach dynamic evaluation or raw import machinery. These are
/// refused even when some policy lists them as builtins.
const FORBIDDEN_NAMES: &[&str] = &["eval", "exec", "compile", "__import__"];

/// A single statically disallowed construct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaticViolation {
    #[error("line {line}: name '{name}' is not allowed (underscore prefix)")]
    UnderscoreName { name: String, line: u32 },

    #[error("line {line}: attribute '{attr}' is not allowed (underscore prefix)")]
    UnderscoreAttribute { attr: String, line: u32 },

    #[error("line {line}: '{name}' is not available in the sandbox")]
    ForbiddenName { name: String, line: u32 },

    #[error("line {line}: 'from {module} import *' is not allowed")]
    StarImport { module: String, line: u32 },
}

/// Scan `module` for statically disallowed syntax.
///
/// `source` is the text the module was parsed from, used only to resolve
/// violation line numbers. An empty result means the fragment may proceed
/// to execution.
pub fn check(module: &Module, source: &str) -> Vec<StaticViolation> {
    let mut checker = Checker {
        source,
        violations: Vec::new(),
    };
    for stmt in &module.body {
        checker.check_stmt(stmt);
    }
    checker.violations
}

struct Checker<'a> {
    source: &'a str,
    violations: Vec<StaticViolation>,
}

impl Checker<'_> {
    fn line(&self, span: Span) -> u32 {
        line_col(self.source, span.start).0
    }

    fn check_name(&mut self, name: &str, span: Span) {
        if FORBIDDEN_NAMES.contains(&name) {
            self.violations.push(StaticViolation::ForbiddenName {
                name: name.to_string(),
                line: self.line(span),
            });
        } else if name.starts_with('_') {
            self.violations.push(StaticViolation::UnderscoreName {
                name: name.to_string(),
                line: self.line(span),
            });
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr { value } => self.check_expr(value),
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    self.check_expr(target);
                }
                self.check_expr(value);
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.check_expr(target);
                self.check_expr(value);
            }
            StmtKind::FunctionDef { name, params, body } => {
                self.check_name(name, stmt.span);
                for param in &params.args {
                    self.check_name(&param.name, param.span);
                    if let Some(default) = &param.default {
                        self.check_expr(default);
                    }
                }
                if let Some(vararg) = &params.vararg {
                    self.check_name(vararg, stmt.span);
                }
                if let Some(kwarg) = &params.kwarg {
                    self.check_name(kwarg, stmt.span);
                }
                for stmt in body {
                    self.check_stmt(stmt);
                }
            }
            StmtKind::Return { value } => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            StmtKind::If { test, body, orelse } => {
                self.check_expr(test);
                for stmt in body {
                    self.check_stmt(stmt);
                }
                for stmt in orelse {
                    self.check_stmt(stmt);
                }
            }
            StmtKind::While { test, body } => {
                self.check_expr(test);
                for stmt in body {
                    self.check_stmt(stmt);
                }
            }
            StmtKind::For { target, iter, body } => {
                self.check_expr(target);
                self.check_expr(iter);
                for stmt in body {
                    self.check_stmt(stmt);
                }
            }
            StmtKind::Import { names } => {
                for alias in names {
                    self.check_name(&alias.name, alias.span);
                    if let Some(asname) = &alias.asname {
                        self.check_name(asname, alias.span);
                    }
                }
            }
            StmtKind::ImportFrom { module, names } => {
                self.check_name(module, stmt.span);
                for alias in names {
                    if alias.name == "*" {
                        self.violations.push(StaticViolation::StarImport {
                            module: module.clone(),
                            line: self.line(alias.span),
                        });
                        continue;
                    }
                    self.check_name(&alias.name, alias.span);
                    if let Some(asname) = &alias.asname {
                        self.check_name(asname, alias.span);
                    }
                }
            }
            StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name { id, .. } => self.check_name(id, expr.span),
            ExprKind::Attribute { value, attr, .. } => {
                if attr.starts_with('_') {
                    self.violations.push(StaticViolation::UnderscoreAttribute {
                        attr: attr.clone(),
                        line: self.line(expr.span),
                    });
                }
                self.check_expr(value);
            }
            ExprKind::Subscript { value, index, .. } => {
                self.check_expr(value);
                self.check_expr(index);
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.check_expr(func);
                for arg in args {
                    self.check_expr(arg);
                }
                for keyword in keywords {
                    self.check_expr(&keyword.value);
                }
            }
            ExprKind::BinOp { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
            ExprKind::UnaryOp { operand, .. } => self.check_expr(operand),
            ExprKind::BoolOp { values, .. } => {
                for value in values {
                    self.check_expr(value);
                }
            }
            ExprKind::Compare {
                left, comparators, ..
            } => {
                self.check_expr(left);
                for comparator in comparators {
                    self.check_expr(comparator);
                }
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.check_expr(test);
                self.check_expr(body);
                self.check_expr(orelse);
            }
            ExprKind::Tuple { elts, .. } | ExprKind::List { elts } => {
                for elt in elts {
                    self.check_expr(elt);
                }
            }
            ExprKind::Dict { keys, values } => {
                for key in keys {
                    self.check_expr(key);
                }
                for value in values {
                    self.check_expr(value);
                }
            }
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::NoneLit => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn violations(source: &str) -> Vec<StaticViolation> {
        let module = parser::parse(source).expect("source should parse");
        check(&module, source)
    }

    #[test]
    fn test_clean_source_passes() {
        assert!(violations("x = len(values) + 1").is_empty());
        assert!(violations("def f(a, b=1):\n    return a + b\n").is_empty());
        assert!(violations("import math").is_empty());
    }

    #[test]
    fn test_underscore_name_rejected() {
        let found = violations("_secret + 1");
        assert_eq!(
            found,
            vec![StaticViolation::UnderscoreName {
                name: "_secret".to_string(),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_underscore_attribute_rejected() {
        let found = violations("obj.__class__");
        assert!(matches!(
            &found[0],
            StaticViolation::UnderscoreAttribute { attr, .. } if attr == "__class__"
        ));
        // the base name itself is fine
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_dynamic_evaluation_names_rejected() {
        for name in ["eval", "exec", "compile"] {
            let source = format!("{}(code)", name);
            let found = violations(&source);
            assert!(matches!(
                &found[0],
                StaticViolation::ForbiddenName { name: n, .. } if n == name
            ));
        }
    }

    #[test]
    fn test_dunder_import_is_forbidden_not_underscore() {
        let found = violations("__import__('os')");
        assert_eq!(
            found,
            vec![StaticViolation::ForbiddenName {
                name: "__import__".to_string(),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_star_import_rejected() {
        let found = violations("from math import *");
        assert_eq!(
            found,
            vec![StaticViolation::StarImport {
                module: "math".to_string(),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_underscore_function_and_params_rejected() {
        let found = violations("def _hidden(_x):\n    return _x\n");
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_all_violations_collected_with_lines() {
        let found = violations("x = _a\ny = eval(src)\n");
        assert_eq!(found.len(), 2);
        assert!(matches!(
            &found[0],
            StaticViolation::UnderscoreName { line: 1, .. }
        ));
        assert!(matches!(
            &found[1],
            StaticViolation::ForbiddenName { line: 2, .. }
        ));
    }

    #[test]
    fn test_violation_display() {
        let violation = StaticViolation::StarImport {
            module: "math".to_string(),
            line: 3,
        };
        assert_eq!(
            violation.to_string(),
            "line 3: 'from math import *' is not allowed"
        );
    }

    #[test]
    fn test_forbidden_name_as_store_target() {
        // rebinding 'eval' is as suspect as reading it
        let found = violations("eval = 1");
        assert_eq!(found.len(), 1);
    }
}
