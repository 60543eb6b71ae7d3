//! Structural signature hashing
//!
//! Canonicalizes a parsed tree into a position-independent byte form and
//! hashes it, so two sources that differ only in formatting or comments get
//! the same signature. Sources that fail to parse are hashed from their raw
//! bytes instead; every input yields a signature.
//!
//! Canonical form: per-node tag byte, then fields in declaration order.
//! Spans are dropped. Lists carry a u32 count, strings a u32 byte length,
//! integers their decimal text, floats their IEEE-754 bit pattern.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::ast::*;
use crate::parser;

/// Version label of the canonical form and hash framing. Bump on any
/// change to the encoding; old digests are not comparable across versions.
pub const SIGNATURE_VERSION: &str = "krait/sig/v1";

const DOMAIN: &[u8] = b"krait/sig/v1\0";
const ORIGIN_STRUCTURAL: &[u8] = b"ast\0";
const ORIGIN_RAW: &[u8] = b"raw\0";

/// What a signature was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureOrigin {
    /// Hashed from the canonical tree; stable under formatting changes.
    Structural,
    /// The source failed to parse; hashed from the raw source bytes.
    RawSource,
}

/// A content-addressed identity for one fragment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    digest: [u8; 32],
    origin: SignatureOrigin,
}

impl Signature {
    /// The 32-byte SHA-256 digest.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn origin(&self) -> SignatureOrigin {
        self.origin
    }

    /// True when the signature came from a parsed tree rather than raw
    /// bytes.
    pub fn is_structural(&self) -> bool {
        self.origin == SignatureOrigin::Structural
    }

    /// Digest rendered as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:?}, {})", self.origin, self.to_hex())
    }
}

/// Sign `source`.
///
/// Parses and hashes the canonical tree form; on parse failure, falls back
/// to hashing the raw bytes (malformed input is deduplicated byte-for-byte,
/// not structurally). Deterministic across runs and hosts for the lifetime
/// of [`SIGNATURE_VERSION`].
pub fn sign(source: &str) -> Signature {
    match parser::parse(source) {
        Ok(module) => Signature {
            digest: digest_with(ORIGIN_STRUCTURAL, &canonical_bytes(&module)),
            origin: SignatureOrigin::Structural,
        },
        Err(_) => Signature {
            digest: digest_with(ORIGIN_RAW, source.as_bytes()),
            origin: SignatureOrigin::RawSource,
        },
    }
}

fn digest_with(origin_tag: &[u8], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    hasher.update(origin_tag);
    hasher.update(payload);
    hasher.finalize().into()
}

fn canonical_bytes(module: &Module) -> Vec<u8> {
    let mut bytes = Vec::new();
    write_len(module.body.len(), &mut bytes);
    for stmt in &module.body {
        write_stmt(stmt, &mut bytes);
    }
    bytes
}

fn write_len(len: usize, bytes: &mut Vec<u8>) {
    bytes.extend_from_slice(&(len as u32).to_be_bytes());
}

fn write_str(s: &str, bytes: &mut Vec<u8>) {
    write_len(s.len(), bytes);
    bytes.extend_from_slice(s.as_bytes());
}

fn write_opt_str(s: Option<&str>, bytes: &mut Vec<u8>) {
    match s {
        Some(s) => {
            bytes.push(1);
            write_str(s, bytes);
        }
        None => bytes.push(0),
    }
}

fn write_body(body: &[Stmt], bytes: &mut Vec<u8>) {
    write_len(body.len(), bytes);
    for stmt in body {
        write_stmt(stmt, bytes);
    }
}

fn write_exprs(exprs: &[Expr], bytes: &mut Vec<u8>) {
    write_len(exprs.len(), bytes);
    for expr in exprs {
        write_expr(expr, bytes);
    }
}

fn write_stmt(stmt: &Stmt, bytes: &mut Vec<u8>) {
    match &stmt.kind {
        StmtKind::Expr { value } => {
            bytes.push(0x01);
            write_expr(value, bytes);
        }
        StmtKind::Assign { targets, value } => {
            bytes.push(0x02);
            write_exprs(targets, bytes);
            write_expr(value, bytes);
        }
        StmtKind::AugAssign { target, op, value } => {
            bytes.push(0x03);
            write_expr(target, bytes);
            bytes.push(bin_op_tag(*op));
            write_expr(value, bytes);
        }
        StmtKind::FunctionDef { name, params, body } => {
            bytes.push(0x04);
            write_str(name, bytes);
            write_params(params, bytes);
            write_body(body, bytes);
        }
        StmtKind::Return { value } => {
            bytes.push(0x05);
            match value {
                Some(value) => {
                    bytes.push(1);
                    write_expr(value, bytes);
                }
                None => bytes.push(0),
            }
        }
        StmtKind::If { test, body, orelse } => {
            bytes.push(0x06);
            write_expr(test, bytes);
            write_body(body, bytes);
            write_body(orelse, bytes);
        }
        StmtKind::While { test, body } => {
            bytes.push(0x07);
            write_expr(test, bytes);
            write_body(body, bytes);
        }
        StmtKind::For { target, iter, body } => {
            bytes.push(0x08);
            write_expr(target, bytes);
            write_expr(iter, bytes);
            write_body(body, bytes);
        }
        StmtKind::Import { names } => {
            bytes.push(0x09);
            write_aliases(names, bytes);
        }
        StmtKind::ImportFrom { module, names } => {
            bytes.push(0x0A);
            write_str(module, bytes);
            write_aliases(names, bytes);
        }
        StmtKind::Pass => bytes.push(0x0B),
        StmtKind::Break => bytes.push(0x0C),
        StmtKind::Continue => bytes.push(0x0D),
    }
}

fn write_params(params: &Params, bytes: &mut Vec<u8>) {
    write_len(params.args.len(), bytes);
    for param in &params.args {
        write_str(&param.name, bytes);
        match &param.default {
            Some(default) => {
                bytes.push(1);
                write_expr(default, bytes);
            }
            None => bytes.push(0),
        }
    }
    write_opt_str(params.vararg.as_deref(), bytes);
    write_opt_str(params.kwarg.as_deref(), bytes);
}

fn write_aliases(names: &[Alias], bytes: &mut Vec<u8>) {
    write_len(names.len(), bytes);
    for alias in names {
        write_str(&alias.name, bytes);
        write_opt_str(alias.asname.as_deref(), bytes);
    }
}

fn write_expr(expr: &Expr, bytes: &mut Vec<u8>) {
    match &expr.kind {
        ExprKind::Int(n) => {
            bytes.push(0x20);
            write_str(&n.to_string(), bytes);
        }
        ExprKind::Float(f) => {
            bytes.push(0x21);
            bytes.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        ExprKind::Str(s) => {
            bytes.push(0x22);
            write_str(s, bytes);
        }
        ExprKind::Bool(b) => {
            bytes.push(0x23);
            bytes.push(u8::from(*b));
        }
        ExprKind::NoneLit => bytes.push(0x24),
        ExprKind::Name { id, ctx } => {
            bytes.push(0x25);
            write_str(id, bytes);
            bytes.push(ctx_tag(*ctx));
        }
        ExprKind::Attribute { value, attr, ctx } => {
            bytes.push(0x26);
            write_expr(value, bytes);
            write_str(attr, bytes);
            bytes.push(ctx_tag(*ctx));
        }
        ExprKind::Subscript { value, index, ctx } => {
            bytes.push(0x27);
            write_expr(value, bytes);
            write_expr(index, bytes);
            bytes.push(ctx_tag(*ctx));
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            bytes.push(0x28);
            write_expr(func, bytes);
            write_exprs(args, bytes);
            write_len(keywords.len(), bytes);
            for keyword in keywords {
                write_str(&keyword.arg, bytes);
                write_expr(&keyword.value, bytes);
            }
        }
        ExprKind::BinOp { left, op, right } => {
            bytes.push(0x29);
            write_expr(left, bytes);
            bytes.push(bin_op_tag(*op));
            write_expr(right, bytes);
        }
        ExprKind::UnaryOp { op, operand } => {
            bytes.push(0x2A);
            bytes.push(unary_op_tag(*op));
            write_expr(operand, bytes);
        }
        ExprKind::BoolOp { op, values } => {
            bytes.push(0x2B);
            bytes.push(bool_op_tag(*op));
            write_exprs(values, bytes);
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            bytes.push(0x2C);
            write_expr(left, bytes);
            write_len(ops.len(), bytes);
            for op in ops {
                bytes.push(cmp_op_tag(*op));
            }
            write_exprs(comparators, bytes);
        }
        ExprKind::IfExp { test, body, orelse } => {
            bytes.push(0x2D);
            write_expr(test, bytes);
            write_expr(body, bytes);
            write_expr(orelse, bytes);
        }
        ExprKind::Tuple { elts, ctx } => {
            bytes.push(0x2E);
            write_exprs(elts, bytes);
            bytes.push(ctx_tag(*ctx));
        }
        ExprKind::List { elts } => {
            bytes.push(0x2F);
            write_exprs(elts, bytes);
        }
        ExprKind::Dict { keys, values } => {
            bytes.push(0x30);
            write_exprs(keys, bytes);
            write_exprs(values, bytes);
        }
    }
}

fn ctx_tag(ctx: ExprContext) -> u8 {
    match ctx {
        ExprContext::Load => 0,
        ExprContext::Store => 1,
    }
}

fn bin_op_tag(op: BinOpKind) -> u8 {
    match op {
        BinOpKind::Add => 0,
        BinOpKind::Sub => 1,
        BinOpKind::Mult => 2,
        BinOpKind::Div => 3,
        BinOpKind::FloorDiv => 4,
        BinOpKind::Mod => 5,
        BinOpKind::Pow => 6,
    }
}

fn unary_op_tag(op: UnaryOpKind) -> u8 {
    match op {
        UnaryOpKind::Not => 0,
        UnaryOpKind::USub => 1,
        UnaryOpKind::UAdd => 2,
    }
}

fn bool_op_tag(op: BoolOpKind) -> u8 {
    match op {
        BoolOpKind::And => 0,
        BoolOpKind::Or => 1,
    }
}

fn cmp_op_tag(op: CmpOpKind) -> u8 {
    match op {
        CmpOpKind::Eq => 0,
        CmpOpKind::NotEq => 1,
        CmpOpKind::Lt => 2,
        CmpOpKind::LtE => 3,
        CmpOpKind::Gt => 4,
        CmpOpKind::GtE => 5,
        CmpOpKind::In => 6,
        CmpOpKind::NotIn => 7,
        CmpOpKind::Is => 8,
        CmpOpKind::IsNot => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_calls_agree() {
        let first = sign("x = 1 + 2");
        let second = sign("x = 1 + 2");
        assert_eq!(first, second);
    }

    #[test]
    fn test_whitespace_invariance() {
        assert_eq!(sign("x = 1+2"), sign("x = 1 + 2"));
        assert_eq!(sign("def f(): return 42"), sign("def f():return 42"));
    }

    #[test]
    fn test_comment_invariance() {
        assert_eq!(sign("a + b"), sign("a + b  # trailing comment"));
    }

    #[test]
    fn test_indentation_width_invariance() {
        let two = "def f(x):\n  return x\n";
        let four = "def f(x):\n    return x\n";
        assert_eq!(sign(two), sign(four));
    }

    #[test]
    fn test_distinct_values_differ() {
        assert_ne!(sign("x = 1"), sign("x = 2"));
        assert_ne!(sign("x = 1"), sign("y = 1"));
    }

    #[test]
    fn test_int_and_float_literals_differ() {
        assert_ne!(sign("2"), sign("2.0"));
    }

    #[test]
    fn test_tuple_and_list_displays_differ() {
        assert_ne!(sign("(1, 2)"), sign("[1, 2]"));
    }

    #[test]
    fn test_keyword_order_is_significant() {
        assert_ne!(sign("f(a=1, b=2)"), sign("f(b=2, a=1)"));
    }

    #[test]
    fn test_parse_failure_falls_back_to_raw() {
        let sig = sign("def (broken");
        assert_eq!(sig.origin(), SignatureOrigin::RawSource);
        assert!(!sig.is_structural());
    }

    #[test]
    fn test_raw_fallback_is_byte_sensitive() {
        // malformed input is deduplicated by bytes, not structure
        assert_ne!(sign("def (broken"), sign("def  (broken"));
    }

    #[test]
    fn test_valid_source_is_structural() {
        assert!(sign("value * 2").is_structural());
    }

    #[test]
    fn test_hex_rendering() {
        let sig = sign("x");
        let hex = sig.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, format!("{}", sig));
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_width() {
        assert_eq!(sign("x = 1").digest().len(), 32);
    }
}
