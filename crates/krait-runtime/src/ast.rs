//! Abstract syntax tree for the Python fragment subset
//!
//! Nodes mirror CPython's AST shape (statement/expression kind enums, Name
//! nodes carrying a load/store context, Attribute chains, aliased imports) so
//! the analysis rules can be stated in the same vocabulary. Trees are plain
//! data: immutable once parsed, cheap to clone, no interior references.

use crate::span::Span;

/// A parsed source fragment: zero or more top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// A statement with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// Statement kinds in the fragment subset.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for its value (`x + y`)
    Expr { value: Expr },
    /// Assignment (`x = e`, `a, b = e`, `a.b = e`, `a[i] = e`)
    Assign { targets: Vec<Expr>, value: Expr },
    /// Augmented assignment (`x += e`)
    AugAssign {
        target: Expr,
        op: BinOpKind,
        value: Expr,
    },
    /// Function definition
    FunctionDef {
        name: String,
        params: Params,
        body: Vec<Stmt>,
    },
    /// `return` (function bodies only)
    Return { value: Option<Expr> },
    /// `if`/`elif`/`else` chain (`elif` nests inside `orelse`)
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// `while` loop
    While { test: Expr, body: Vec<Stmt> },
    /// `for` loop over an iterable
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `import a.b.c as x, d`
    Import { names: Vec<Alias> },
    /// `from a.b import x as y, z` (a `*` entry is the alias name `*`)
    ImportFrom { module: String, names: Vec<Alias> },
    /// `pass`
    Pass,
    /// `break` (loop bodies only)
    Break,
    /// `continue` (loop bodies only)
    Continue,
}

impl Stmt {
    /// Human-readable kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            StmtKind::Expr { .. } => "expression",
            StmtKind::Assign { .. } => "assignment",
            StmtKind::AugAssign { .. } => "augmented assignment",
            StmtKind::FunctionDef { .. } => "function definition",
            StmtKind::Return { .. } => "return",
            StmtKind::If { .. } => "if",
            StmtKind::While { .. } => "while",
            StmtKind::For { .. } => "for",
            StmtKind::Import { .. } => "import",
            StmtKind::ImportFrom { .. } => "from-import",
            StmtKind::Pass => "pass",
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
        }
    }
}

/// Formal parameter list of a function definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    /// Positional parameters, possibly with defaults
    pub args: Vec<Param>,
    /// `*args` name, if present
    pub vararg: Option<String>,
    /// `**kwargs` name, if present
    pub kwarg: Option<String>,
}

impl Params {
    /// All parameter names, including vararg and kwarg.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.vararg.as_deref())
            .chain(self.kwarg.as_deref())
    }
}

/// A single positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Default value expression, evaluated at definition time
    pub default: Option<Expr>,
    pub span: Span,
}

/// One imported entry: `name` or `name as asname`.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    /// Possibly dotted module path, or bare member name in a from-import
    pub name: String,
    pub asname: Option<String>,
    pub span: Span,
}

impl Alias {
    /// The name this entry binds: the alias if given, else the first dotted
    /// segment for module imports / the bare name for member imports.
    pub fn bound_name(&self, split_dotted: bool) -> &str {
        match &self.asname {
            Some(asname) => asname,
            None if split_dotted => self.name.split('.').next().unwrap_or(&self.name),
            None => &self.name,
        }
    }
}

/// An expression with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression kinds in the fragment subset.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal (unescaped)
    Str(String),
    /// `True` / `False`
    Bool(bool),
    /// `None`
    NoneLit,
    /// Identifier reference with load/store context
    Name { id: String, ctx: ExprContext },
    /// Attribute access (`value.attr`)
    Attribute {
        value: Box<Expr>,
        attr: String,
        ctx: ExprContext,
    },
    /// Subscript (`value[index]`)
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
        ctx: ExprContext,
    },
    /// Call with positional and keyword arguments
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    /// Binary arithmetic (`a + b`)
    BinOp {
        left: Box<Expr>,
        op: BinOpKind,
        right: Box<Expr>,
    },
    /// Unary operation (`-a`, `not a`)
    UnaryOp { op: UnaryOpKind, operand: Box<Expr> },
    /// Short-circuit boolean chain (`a and b and c`)
    BoolOp { op: BoolOpKind, values: Vec<Expr> },
    /// Comparison chain (`a < b <= c`): one left operand, n ops, n comparators
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOpKind>,
        comparators: Vec<Expr>,
    },
    /// Conditional expression (`a if test else b`)
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    /// Tuple display (`(a, b)` or bare `a, b`)
    Tuple { elts: Vec<Expr>, ctx: ExprContext },
    /// List display (`[a, b]`)
    List { elts: Vec<Expr> },
    /// Dict display (`{k: v}`); keys and values are parallel
    Dict { keys: Vec<Expr>, values: Vec<Expr> },
}

/// Whether a name/attribute/subscript is being read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    Load,
    Store,
}

/// A keyword argument in a call (`f(x=1)`).
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
    pub span: Span,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mult => "*",
            BinOpKind::Div => "/",
            BinOpKind::FloorDiv => "//",
            BinOpKind::Mod => "%",
            BinOpKind::Pow => "**",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Not,
    USub,
    UAdd,
}

/// Boolean chain operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOpKind {
    And,
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOpKind {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOpKind::Eq => "==",
            CmpOpKind::NotEq => "!=",
            CmpOpKind::Lt => "<",
            CmpOpKind::LtE => "<=",
            CmpOpKind::Gt => ">",
            CmpOpKind::GtE => ">=",
            CmpOpKind::In => "in",
            CmpOpKind::NotIn => "not in",
            CmpOpKind::Is => "is",
            CmpOpKind::IsNot => "is not",
        }
    }
}

impl Expr {
    /// Full dotted path of an attribute chain (`a.b.c`), or `None` when the
    /// chain does not bottom out at a bare Name (`f().attr`).
    pub fn dotted_path(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name { id, .. } => Some(id.clone()),
            ExprKind::Attribute { value, attr, .. } => {
                let mut path = value.dotted_path()?;
                path.push('.');
                path.push_str(attr);
                Some(path)
            }
            _ => None,
        }
    }

    /// Root Name of an attribute chain: `a` for `a.b.c`, `None` for `f().x`.
    pub fn chain_root(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name { id, .. } => Some(id),
            ExprKind::Attribute { value, .. } => value.chain_root(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(id: &str) -> Expr {
        Expr {
            kind: ExprKind::Name {
                id: id.to_string(),
                ctx: ExprContext::Load,
            },
            span: Span::dummy(),
        }
    }

    fn attr(value: Expr, name: &str) -> Expr {
        Expr {
            kind: ExprKind::Attribute {
                value: Box::new(value),
                attr: name.to_string(),
                ctx: ExprContext::Load,
            },
            span: Span::dummy(),
        }
    }

    #[test]
    fn test_dotted_path_single_name() {
        assert_eq!(name("math").dotted_path(), Some("math".to_string()));
    }

    #[test]
    fn test_dotted_path_chain() {
        let chain = attr(attr(name("pkg"), "sub"), "func");
        assert_eq!(chain.dotted_path(), Some("pkg.sub.func".to_string()));
        assert_eq!(chain.chain_root(), Some("pkg"));
    }

    #[test]
    fn test_dotted_path_broken_chain() {
        let call = Expr {
            kind: ExprKind::Call {
                func: Box::new(name("f")),
                args: vec![],
                keywords: vec![],
            },
            span: Span::dummy(),
        };
        let chain = attr(call, "method");
        assert_eq!(chain.dotted_path(), None);
        assert_eq!(chain.chain_root(), None);
    }

    #[test]
    fn test_alias_bound_name() {
        let plain = Alias {
            name: "matplotlib.pyplot".to_string(),
            asname: None,
            span: Span::dummy(),
        };
        assert_eq!(plain.bound_name(true), "matplotlib");
        assert_eq!(plain.bound_name(false), "matplotlib.pyplot");

        let aliased = Alias {
            name: "matplotlib.pyplot".to_string(),
            asname: Some("plt".to_string()),
            span: Span::dummy(),
        };
        assert_eq!(aliased.bound_name(true), "plt");
    }

    #[test]
    fn test_params_names() {
        let params = Params {
            args: vec![
                Param {
                    name: "x".to_string(),
                    default: None,
                    span: Span::dummy(),
                },
                Param {
                    name: "y".to_string(),
                    default: None,
                    span: Span::dummy(),
                },
            ],
            vararg: Some("rest".to_string()),
            kwarg: Some("kw".to_string()),
        };
        let names: Vec<&str> = params.names().collect();
        assert_eq!(names, vec!["x", "y", "rest", "kw"]);
    }

    #[test]
    fn test_stmt_kind_name() {
        let stmt = Stmt {
            kind: StmtKind::Pass,
            span: Span::dummy(),
        };
        assert_eq!(stmt.kind_name(), "pass");
    }
}
