//! Statement classification and dependency analysis
//!
//! Classifies exactly one top-level statement and computes the symbols it
//! produces and the free names it depends on. Each accepted fragment's
//! produced/dependency pair is an edge set for the dependency graph, which
//! is why multi-statement sources are rejected outright instead of guessed
//! at.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::ast::{Expr, ExprContext, ExprKind, Module, Params, Stmt, StmtKind};
use crate::parser;

/// Why a fragment could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The source parsed to a module with no statements.
    #[error("empty statement")]
    EmptyStatement,

    /// The source holds more than one top-level statement.
    #[error("expected a single statement, found {0}")]
    MultipleStatements(usize),

    /// The statement kind is outside the fragment model.
    #[error("unsupported statement kind: {kind}")]
    UnsupportedStatement { kind: &'static str },

    /// The source did not parse.
    #[error("syntax error at line {line}: {message}")]
    Syntax { message: String, line: u32 },
}

/// The accepted fragment variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Expression,
    FunctionDefinition,
    Import,
    ImportFrom,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Expression => "expression",
            FragmentKind::FunctionDefinition => "function definition",
            FragmentKind::Import => "import",
            FragmentKind::ImportFrom => "from-import",
        }
    }
}

/// A classified fragment with its symbol edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: FragmentKind,
    /// Bindings visible after the fragment runs.
    pub produced_symbols: BTreeSet<String>,
    /// Free names the fragment reads from the enclosing scope.
    pub dependencies: BTreeSet<String>,
}

/// The outcome of analyzing one fragment.
///
/// Carries either a classification or a diagnostic, never both and never
/// neither. Symbol accessors return empty sets on the diagnostic side so
/// callers can iterate without branching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementAnalysis {
    result: Result<Classification, AnalysisError>,
}

impl StatementAnalysis {
    fn classified(classification: Classification) -> Self {
        Self {
            result: Ok(classification),
        }
    }

    fn failed(error: AnalysisError) -> Self {
        Self { result: Err(error) }
    }

    /// True when the fragment was classified.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The fragment variant, if classification succeeded.
    pub fn kind(&self) -> Option<FragmentKind> {
        self.result.as_ref().ok().map(|c| c.kind)
    }

    /// Bindings the fragment makes visible; empty on a diagnostic.
    pub fn produced_symbols(&self) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        match &self.result {
            Ok(classification) => &classification.produced_symbols,
            Err(_) => &EMPTY,
        }
    }

    /// Free names the fragment reads; empty on a diagnostic.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        match &self.result {
            Ok(classification) => &classification.dependencies,
            Err(_) => &EMPTY,
        }
    }

    /// The diagnostic, if classification failed.
    pub fn diagnostic(&self) -> Option<&AnalysisError> {
        self.result.as_ref().err()
    }

    /// The full classification, if analysis succeeded.
    pub fn classification(&self) -> Option<&Classification> {
        self.result.as_ref().ok()
    }

    /// Unwrap into the underlying result.
    pub fn into_result(self) -> Result<Classification, AnalysisError> {
        self.result
    }
}

/// Classify the single statement in `module`.
///
/// Always returns a value; failures are carried as the diagnostic side of
/// [`StatementAnalysis`].
pub fn analyze(module: &Module) -> StatementAnalysis {
    let stmt = match module.body.as_slice() {
        [] => return StatementAnalysis::failed(AnalysisError::EmptyStatement),
        [stmt] => stmt,
        body => {
            return StatementAnalysis::failed(AnalysisError::MultipleStatements(body.len()));
        }
    };

    match &stmt.kind {
        StmtKind::Expr { value } => StatementAnalysis::classified(Classification {
            kind: FragmentKind::Expression,
            produced_symbols: BTreeSet::new(),
            dependencies: expression_dependencies(value),
        }),
        StmtKind::FunctionDef { name, params, body } => {
            StatementAnalysis::classified(classify_function(name, params, body))
        }
        StmtKind::Import { names } => StatementAnalysis::classified(Classification {
            kind: FragmentKind::Import,
            produced_symbols: names
                .iter()
                .map(|alias| alias.bound_name(true).to_string())
                .collect(),
            dependencies: BTreeSet::new(),
        }),
        StmtKind::ImportFrom { names, .. } => StatementAnalysis::classified(Classification {
            kind: FragmentKind::ImportFrom,
            produced_symbols: names
                .iter()
                .map(|alias| alias.bound_name(false).to_string())
                .collect(),
            dependencies: BTreeSet::new(),
        }),
        _ => StatementAnalysis::failed(AnalysisError::UnsupportedStatement {
            kind: stmt.kind_name(),
        }),
    }
}

/// Parse `source` and classify it.
///
/// Parse failures become the `Syntax` diagnostic; an empty or comment-only
/// source becomes `EmptyStatement`.
pub fn analyze_source(source: &str) -> StatementAnalysis {
    match parser::parse(source) {
        Ok(module) => analyze(&module),
        Err(err) => StatementAnalysis::failed(AnalysisError::Syntax {
            message: err.message,
            line: err.line,
        }),
    }
}

/// Names an expression statement reads from the enclosing scope.
fn expression_dependencies(expr: &Expr) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    collect_expr(expr, &mut deps);
    deps
}

/// Classify a function definition.
///
/// Dependencies are collected over the body only; the signature of the
/// function itself is not visited, so outer parameter defaults never count.
/// The function's own name and parameters are subtracted afterwards, which
/// keeps direct recursion from flagging a self-dependency.
fn classify_function(name: &str, params: &Params, body: &[Stmt]) -> Classification {
    let mut deps = BTreeSet::new();
    for stmt in body {
        collect_stmt(stmt, &mut deps);
    }
    for param in params.names() {
        deps.remove(param);
    }
    deps.remove(name);

    Classification {
        kind: FragmentKind::FunctionDefinition,
        produced_symbols: BTreeSet::from([name.to_string()]),
        dependencies: deps,
    }
}

fn collect_stmt(stmt: &Stmt, deps: &mut BTreeSet<String>) {
    match &stmt.kind {
        StmtKind::Expr { value } => collect_expr(value, deps),
        StmtKind::Assign { targets, value } => {
            for target in targets {
                collect_expr(target, deps);
            }
            collect_expr(value, deps);
        }
        StmtKind::AugAssign { target, value, .. } => {
            collect_expr(target, deps);
            collect_expr(value, deps);
        }
        StmtKind::FunctionDef { params, body, .. } => {
            // nested definitions are visited in full; only the outermost
            // function's bindings are subtracted
            for param in &params.args {
                if let Some(default) = &param.default {
                    collect_expr(default, deps);
                }
            }
            for stmt in body {
                collect_stmt(stmt, deps);
            }
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                collect_expr(value, deps);
            }
        }
        StmtKind::If { test, body, orelse } => {
            collect_expr(test, deps);
            for stmt in body {
                collect_stmt(stmt, deps);
            }
            for stmt in orelse {
                collect_stmt(stmt, deps);
            }
        }
        StmtKind::While { test, body } => {
            collect_expr(test, deps);
            for stmt in body {
                collect_stmt(stmt, deps);
            }
        }
        StmtKind::For { target, iter, body } => {
            collect_expr(target, deps);
            collect_expr(iter, deps);
            for stmt in body {
                collect_stmt(stmt, deps);
            }
        }
        StmtKind::Import { .. }
        | StmtKind::ImportFrom { .. }
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

/// Record every name read (load context) in the subtree.
///
/// Store-context names are bindings, not reads: `x = 1` depends on nothing,
/// while `a.b = 1` still depends on `a` because the chain base stays a read.
fn collect_expr(expr: &Expr, deps: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Name { id, ctx } => {
            if *ctx == ExprContext::Load {
                deps.insert(id.clone());
            }
        }
        ExprKind::Attribute { value, .. } => collect_expr(value, deps),
        ExprKind::Subscript { value, index, .. } => {
            collect_expr(value, deps);
            collect_expr(index, deps);
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            collect_expr(func, deps);
            for arg in args {
                collect_expr(arg, deps);
            }
            for keyword in keywords {
                collect_expr(&keyword.value, deps);
            }
        }
        ExprKind::BinOp { left, right, .. } => {
            collect_expr(left, deps);
            collect_expr(right, deps);
        }
        ExprKind::UnaryOp { operand, .. } => collect_expr(operand, deps),
        ExprKind::BoolOp { values, .. } => {
            for value in values {
                collect_expr(value, deps);
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            collect_expr(left, deps);
            for comparator in comparators {
                collect_expr(comparator, deps);
            }
        }
        ExprKind::IfExp { test, body, orelse } => {
            collect_expr(test, deps);
            collect_expr(body, deps);
            collect_expr(orelse, deps);
        }
        ExprKind::Tuple { elts, .. } | ExprKind::List { elts } => {
            for elt in elts {
                collect_expr(elt, deps);
            }
        }
        ExprKind::Dict { keys, values } => {
            for key in keys {
                collect_expr(key, deps);
            }
            for value in values {
                collect_expr(value, deps);
            }
        }
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::NoneLit => {}
    }
}
