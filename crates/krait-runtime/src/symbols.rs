//! Symbol extraction
//!
//! A coarse whole-tree index: every name referenced, every call target,
//! every imported module path. This is deliberately not a scope analysis;
//! reads and writes both count, and nothing is subtracted for bindings.

use std::collections::BTreeSet;

use crate::ast::{Expr, ExprKind, Module, Stmt, StmtKind};
use crate::parser;

/// The symbols referenced by a syntax tree, grouped by role.
///
/// All three sets iterate in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSet {
    /// Every name that appears in the tree, whether read or written.
    pub variables: BTreeSet<String>,
    /// Call targets. Dotted chains are kept whole (`a.b.c`); a chain that
    /// does not bottom out at a name contributes nothing.
    pub functions: BTreeSet<String>,
    /// Imported module paths. `import a.b.c` records `a.b.c`; a from-import
    /// records the source module, not the imported members.
    pub modules: BTreeSet<String>,
}

impl SymbolSet {
    /// True when no symbols of any role were found.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.functions.is_empty() && self.modules.is_empty()
    }
}

/// Collect every symbol referenced anywhere in `module`.
///
/// Total over well-formed trees; there is no error path. Recursion depth is
/// bounded by the parser's nesting limit.
pub fn extract(module: &Module) -> SymbolSet {
    let mut set = SymbolSet::default();
    for stmt in &module.body {
        walk_stmt(stmt, &mut set);
    }
    set
}

/// Parse `source` and extract its symbols.
///
/// A source that fails to parse yields empty sets; malformed input is
/// rejected upstream and indexes nothing.
pub fn extract_source(source: &str) -> SymbolSet {
    match parser::parse(source) {
        Ok(module) => extract(&module),
        Err(_) => SymbolSet::default(),
    }
}

fn walk_stmt(stmt: &Stmt, out: &mut SymbolSet) {
    match &stmt.kind {
        StmtKind::Expr { value } => walk_expr(value, out),
        StmtKind::Assign { targets, value } => {
            for target in targets {
                walk_expr(target, out);
            }
            walk_expr(value, out);
        }
        StmtKind::AugAssign { target, value, .. } => {
            walk_expr(target, out);
            walk_expr(value, out);
        }
        StmtKind::FunctionDef { params, body, .. } => {
            // the function and parameter names are identifier fields, not
            // Name nodes, so they do not land in `variables`
            for param in &params.args {
                if let Some(default) = &param.default {
                    walk_expr(default, out);
                }
            }
            for stmt in body {
                walk_stmt(stmt, out);
            }
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                walk_expr(value, out);
            }
        }
        StmtKind::If { test, body, orelse } => {
            walk_expr(test, out);
            for stmt in body {
                walk_stmt(stmt, out);
            }
            for stmt in orelse {
                walk_stmt(stmt, out);
            }
        }
        StmtKind::While { test, body } => {
            walk_expr(test, out);
            for stmt in body {
                walk_stmt(stmt, out);
            }
        }
        StmtKind::For { target, iter, body } => {
            walk_expr(target, out);
            walk_expr(iter, out);
            for stmt in body {
                walk_stmt(stmt, out);
            }
        }
        StmtKind::Import { names } => {
            for alias in names {
                out.modules.insert(alias.name.clone());
            }
        }
        StmtKind::ImportFrom { module, .. } => {
            out.modules.insert(module.clone());
        }
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
    }
}

fn walk_expr(expr: &Expr, out: &mut SymbolSet) {
    match &expr.kind {
        ExprKind::Name { id, .. } => {
            out.variables.insert(id.clone());
        }
        ExprKind::Attribute { value, .. } => walk_expr(value, out),
        ExprKind::Subscript { value, index, .. } => {
            walk_expr(value, out);
            walk_expr(index, out);
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            if let Some(path) = func.dotted_path() {
                out.functions.insert(path);
            }
            walk_expr(func, out);
            for arg in args {
                walk_expr(arg, out);
            }
            for keyword in keywords {
                walk_expr(&keyword.value, out);
            }
        }
        ExprKind::BinOp { left, right, .. } => {
            walk_expr(left, out);
            walk_expr(right, out);
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr(operand, out),
        ExprKind::BoolOp { values, .. } => {
            for value in values {
                walk_expr(value, out);
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            walk_expr(left, out);
            for comparator in comparators {
                walk_expr(comparator, out);
            }
        }
        ExprKind::IfExp { test, body, orelse } => {
            walk_expr(test, out);
            walk_expr(body, out);
            walk_expr(orelse, out);
        }
        ExprKind::Tuple { elts, .. } | ExprKind::List { elts } => {
            for elt in elts {
                walk_expr(elt, out);
            }
        }
        ExprKind::Dict { keys, values } => {
            for key in keys {
                walk_expr(key, out);
            }
            for value in values {
                walk_expr(value, out);
            }
        }
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::NoneLit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_variables_include_reads_and_writes() {
        let set = extract_source("x = y + 1");
        assert_eq!(names(&set.variables), ["x", "y"]);
        assert!(set.functions.is_empty());
        assert!(set.modules.is_empty());
    }

    #[test]
    fn test_bare_call_target() {
        let set = extract_source("f(x)");
        assert_eq!(names(&set.functions), ["f"]);
        assert_eq!(names(&set.variables), ["f", "x"]);
    }

    #[test]
    fn test_dotted_call_keeps_full_path() {
        let set = extract_source("pkg.sub.fn(arg)");
        assert_eq!(names(&set.functions), ["pkg.sub.fn"]);
        assert_eq!(names(&set.variables), ["arg", "pkg"]);
    }

    #[test]
    fn test_chain_rooted_in_call_contributes_no_target() {
        let set = extract_source("f().g()");
        assert_eq!(names(&set.functions), ["f"]);
    }

    #[test]
    fn test_import_records_full_path() {
        let set = extract_source("import a.b.c");
        assert_eq!(names(&set.modules), ["a.b.c"]);
        assert!(set.variables.is_empty());
    }

    #[test]
    fn test_import_alias_is_ignored() {
        let set = extract_source("import numpy as np");
        assert_eq!(names(&set.modules), ["numpy"]);
    }

    #[test]
    fn test_from_import_records_source_module() {
        let set = extract_source("from p.q import x, y");
        assert_eq!(names(&set.modules), ["p.q"]);
        assert!(set.variables.is_empty());
    }

    #[test]
    fn test_function_def_walks_defaults_and_body() {
        let set = extract_source("def f(a, b=c):\n    return d");
        assert_eq!(names(&set.variables), ["c", "d"]);
    }

    #[test]
    fn test_compound_statements_walked_exhaustively() {
        let set = extract_source("for i in items:\n    if i > limit:\n        total = total + i");
        assert_eq!(names(&set.variables), ["i", "items", "limit", "total"]);
    }

    #[test]
    fn test_unparseable_source_yields_empty_sets() {
        let set = extract_source("def def def");
        assert!(set.is_empty());
    }

    #[test]
    fn test_keyword_arguments_walked() {
        let set = extract_source("plot(data, color=style)");
        assert_eq!(names(&set.variables), ["data", "plot", "style"]);
        assert_eq!(names(&set.functions), ["plot"]);
    }
}
