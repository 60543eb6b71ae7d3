//! Expression parsing (precedence climbing)

use crate::ast::*;
use crate::parser::{describe, Parser, Precedence, SyntaxError};
use crate::token::TokenKind;

impl Parser {
    /// Parse a single expression (conditional tier and below)
    pub(super) fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        let body = self.parse_precedence(Precedence::Lowest)?;
        if !self.check(TokenKind::If) {
            return Ok(body);
        }
        self.advance();
        let test = self.parse_precedence(Precedence::Lowest)?;
        self.consume(TokenKind::Else, "expected 'else' in conditional expression")?;
        let orelse = self.parse_expression()?;
        let span = body.span.merge(orelse.span);
        Ok(Expr {
            kind: ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            span,
        })
    }

    /// Parse a comma-separated expression list; two or more elements, or a
    /// trailing comma, form a tuple
    pub(super) fn parse_expression_list(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.parse_expression()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.match_token(TokenKind::Comma) {
            if !self.starts_expression() {
                break;
            }
            elts.push(self.parse_expression()?);
        }
        let span = elts[0].span.merge(elts[elts.len() - 1].span);
        Ok(Expr {
            kind: ExprKind::Tuple {
                elts,
                ctx: ExprContext::Load,
            },
            span,
        })
    }

    /// Whether the current token can begin an expression
    pub(super) fn starts_expression(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::Str
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::Identifier
                | TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
        )
    }

    /// Parse expression with given minimum precedence
    fn parse_precedence(&mut self, min: Precedence) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_prefix()?;
        while min < self.current_precedence() {
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    /// Precedence of the upcoming infix operator, or `Lowest` when the
    /// current token is not one
    fn current_precedence(&self) -> Precedence {
        match self.peek().kind {
            TokenKind::Or => Precedence::Or,
            TokenKind::And => Precedence::And,
            TokenKind::EqualEqual
            | TokenKind::BangEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::In
            | TokenKind::Is => Precedence::Comparison,
            // `not` is infix only as the start of `not in`
            TokenKind::Not if self.next_is(TokenKind::In) => Precedence::Comparison,
            TokenKind::Plus | TokenKind::Minus => Precedence::Term,
            TokenKind::Star | TokenKind::Slash | TokenKind::SlashSlash | TokenKind::Percent => {
                Precedence::Factor
            }
            _ => Precedence::Lowest,
        }
    }

    fn next_is(&self, kind: TokenKind) -> bool {
        self.peek_next().map(|t| t.kind) == Some(kind)
    }

    /// Parse prefix expression
    fn parse_prefix(&mut self) -> Result<Expr, SyntaxError> {
        self.enter_nesting()?;
        let expr = if self.check(TokenKind::Not) {
            let start = self.peek().span;
            self.advance();
            let operand = self.parse_precedence(Precedence::Not)?;
            let span = start.merge(operand.span);
            Expr {
                kind: ExprKind::UnaryOp {
                    op: UnaryOpKind::Not,
                    operand: Box::new(operand),
                },
                span,
            }
        } else {
            self.parse_unary()?
        };
        self.exit_nesting();
        Ok(expr)
    }

    /// Parse infix expression
    fn parse_infix(&mut self, left: Expr) -> Result<Expr, SyntaxError> {
        match self.peek().kind {
            TokenKind::Or => self.parse_bool_chain(left, TokenKind::Or, BoolOpKind::Or),
            TokenKind::And => self.parse_bool_chain(left, TokenKind::And, BoolOpKind::And),
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::SlashSlash
            | TokenKind::Percent => self.parse_binary(left),
            _ => self.parse_comparison_chain(left),
        }
    }

    /// Parse an `and`/`or` chain into a single boolean node
    fn parse_bool_chain(
        &mut self,
        first: Expr,
        token: TokenKind,
        op: BoolOpKind,
    ) -> Result<Expr, SyntaxError> {
        let prec = if op == BoolOpKind::Or {
            Precedence::Or
        } else {
            Precedence::And
        };
        let mut values = vec![first];
        while self.match_token(token) {
            values.push(self.parse_precedence(prec)?);
        }
        let span = values[0].span.merge(values[values.len() - 1].span);
        Ok(Expr {
            kind: ExprKind::BoolOp { op, values },
            span,
        })
    }

    /// Parse a comparison chain (`a < b <= c`) into one node
    fn parse_comparison_chain(&mut self, left: Expr) -> Result<Expr, SyntaxError> {
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.match_comparison_op() {
            ops.push(op);
            comparators.push(self.parse_precedence(Precedence::Comparison)?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        let span = left.span.merge(comparators[comparators.len() - 1].span);
        Ok(Expr {
            kind: ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            span,
        })
    }

    /// Consume a comparison operator if one is next; `not in` and `is not`
    /// are two-token forms
    fn match_comparison_op(&mut self) -> Option<CmpOpKind> {
        let op = match self.peek().kind {
            TokenKind::EqualEqual => CmpOpKind::Eq,
            TokenKind::BangEqual => CmpOpKind::NotEq,
            TokenKind::Less => CmpOpKind::Lt,
            TokenKind::LessEqual => CmpOpKind::LtE,
            TokenKind::Greater => CmpOpKind::Gt,
            TokenKind::GreaterEqual => CmpOpKind::GtE,
            TokenKind::In => CmpOpKind::In,
            TokenKind::Is => {
                self.advance();
                return Some(if self.match_token(TokenKind::Not) {
                    CmpOpKind::IsNot
                } else {
                    CmpOpKind::Is
                });
            }
            TokenKind::Not => {
                if self.next_is(TokenKind::In) {
                    self.advance();
                    self.advance();
                    return Some(CmpOpKind::NotIn);
                }
                return None;
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// Parse arithmetic binary expression
    fn parse_binary(&mut self, left: Expr) -> Result<Expr, SyntaxError> {
        let (op, prec) = match self.peek().kind {
            TokenKind::Plus => (BinOpKind::Add, Precedence::Term),
            TokenKind::Minus => (BinOpKind::Sub, Precedence::Term),
            TokenKind::Star => (BinOpKind::Mult, Precedence::Factor),
            TokenKind::Slash => (BinOpKind::Div, Precedence::Factor),
            TokenKind::SlashSlash => (BinOpKind::FloorDiv, Precedence::Factor),
            TokenKind::Percent => (BinOpKind::Mod, Precedence::Factor),
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_precedence(prec)?;
        let span = left.span.merge(right.span);
        Ok(Expr {
            kind: ExprKind::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        })
    }

    /// Parse unary sign expression
    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOpKind::USub),
            TokenKind::Plus => Some(UnaryOpKind::UAdd),
            _ => None,
        };
        if let Some(op) = op {
            self.enter_nesting()?;
            let start = self.advance().span;
            let operand = self.parse_unary()?;
            self.exit_nesting();
            let span = start.merge(operand.span);
            return Ok(Expr {
                kind: ExprKind::UnaryOp {
                    op,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.parse_power()
    }

    /// Parse power expression; `**` is right-associative and its right
    /// operand may carry a sign
    fn parse_power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.parse_postfix()?;
        if !self.match_token(TokenKind::StarStar) {
            return Ok(base);
        }
        let right = self.parse_unary()?;
        let span = base.span.merge(right.span);
        Ok(Expr {
            kind: ExprKind::BinOp {
                left: Box::new(base),
                op: BinOpKind::Pow,
                right: Box::new(right),
            },
            span,
        })
    }

    /// Parse postfix chain: calls, subscripts, and attribute access
    pub(super) fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LeftParen => {
                    self.advance();
                    let (args, keywords) = self.parse_call_args()?;
                    let end = self
                        .consume(TokenKind::RightParen, "expected ')' after arguments")?
                        .span;
                    let span = expr.span.merge(end);
                    expr = Expr {
                        kind: ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            keywords,
                        },
                        span,
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression_list()?;
                    let end = self
                        .consume(TokenKind::RightBracket, "expected ']' after subscript")?
                        .span;
                    let span = expr.span.merge(end);
                    expr = Expr {
                        kind: ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                            ctx: ExprContext::Load,
                        },
                        span,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let token = self.consume_identifier("an attribute name")?;
                    let attr = token.lexeme.clone();
                    let end = token.span;
                    let span = expr.span.merge(end);
                    expr = Expr {
                        kind: ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                            ctx: ExprContext::Load,
                        },
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parse call arguments: positional first, then `name=value` keywords
    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), SyntaxError> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while !self.check(TokenKind::RightParen) {
            if self.check(TokenKind::Star) || self.check(TokenKind::StarStar) {
                return Err(self.error_here("argument unpacking is not supported"));
            }
            if self.check(TokenKind::Identifier) && self.next_is(TokenKind::Equal) {
                let token = self.advance();
                let arg = token.lexeme.clone();
                let start = token.span;
                if keywords.iter().any(|k| k.arg == arg) {
                    return Err(SyntaxError::new(
                        format!("keyword argument repeated: '{}'", arg),
                        start,
                    ));
                }
                self.advance(); // '='
                let value = self.parse_expression()?;
                let span = start.merge(value.span);
                keywords.push(Keyword { arg, value, span });
            } else {
                if !keywords.is_empty() {
                    return Err(self.error_here("positional argument follows keyword argument"));
                }
                args.push(self.parse_expression()?);
            }
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok((args, keywords))
    }

    /// Parse primary expression
    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek().kind {
            TokenKind::Int => self.parse_int(),
            TokenKind::Float => self.parse_float(),
            TokenKind::Str => self.parse_str(),
            TokenKind::True | TokenKind::False => self.parse_bool(),
            TokenKind::None => self.parse_none(),
            TokenKind::Identifier => self.parse_name(),
            TokenKind::LeftParen => self.parse_group(),
            TokenKind::LeftBracket => self.parse_list_literal(),
            TokenKind::LeftBrace => self.parse_dict_literal(),
            TokenKind::Reserved => {
                let word = self.peek().lexeme.clone();
                Err(self.error_here(format!("'{}' is not supported", word)))
            }
            _ => Err(self.error_here(format!(
                "expected an expression, found {}",
                describe(self.peek())
            ))),
        }
    }

    /// Parse integer literal
    fn parse_int(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        let span = token.span;
        match token.lexeme.parse::<i64>() {
            Ok(value) => Ok(Expr {
                kind: ExprKind::Int(value),
                span,
            }),
            Err(_) => Err(SyntaxError::new("integer literal out of range", span)),
        }
    }

    /// Parse float literal
    fn parse_float(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        let span = token.span;
        match token.lexeme.parse::<f64>() {
            Ok(value) => Ok(Expr {
                kind: ExprKind::Float(value),
                span,
            }),
            Err(_) => Err(SyntaxError::new("invalid float literal", span)),
        }
    }

    /// Parse string literal; adjacent literals concatenate
    fn parse_str(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        let mut span = token.span;
        let mut value = token.lexeme.clone();
        while self.check(TokenKind::Str) {
            let next = self.advance();
            value.push_str(&next.lexeme);
            span = span.merge(next.span);
        }
        Ok(Expr {
            kind: ExprKind::Str(value),
            span,
        })
    }

    /// Parse boolean literal
    fn parse_bool(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        let value = token.kind == TokenKind::True;
        Ok(Expr {
            kind: ExprKind::Bool(value),
            span: token.span,
        })
    }

    /// Parse `None`
    fn parse_none(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.advance().span;
        Ok(Expr {
            kind: ExprKind::NoneLit,
            span,
        })
    }

    /// Parse identifier reference
    fn parse_name(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        Ok(Expr {
            kind: ExprKind::Name {
                id: token.lexeme.clone(),
                ctx: ExprContext::Load,
            },
            span: token.span,
        })
    }

    /// Parse parenthesized expression or tuple
    fn parse_group(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.consume(TokenKind::LeftParen, "expected '('")?.span;
        if self.check(TokenKind::RightParen) {
            let end = self.advance().span;
            return Ok(Expr {
                kind: ExprKind::Tuple {
                    elts: Vec::new(),
                    ctx: ExprContext::Load,
                },
                span: start.merge(end),
            });
        }
        let mut inner = self.parse_expression_list()?;
        let end = self.consume(TokenKind::RightParen, "expected ')'")?.span;
        inner.span = start.merge(end);
        Ok(inner)
    }

    /// Parse list literal
    fn parse_list_literal(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.consume(TokenKind::LeftBracket, "expected '['")?.span;
        let mut elts = Vec::new();
        while !self.check(TokenKind::RightBracket) {
            elts.push(self.parse_expression()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        let end = self
            .consume(TokenKind::RightBracket, "expected ']' after list items")?
            .span;
        Ok(Expr {
            kind: ExprKind::List { elts },
            span: start.merge(end),
        })
    }

    /// Parse dict literal
    fn parse_dict_literal(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.consume(TokenKind::LeftBrace, "expected '{'")?.span;
        let mut keys = Vec::new();
        let mut values = Vec::new();
        while !self.check(TokenKind::RightBrace) {
            keys.push(self.parse_expression()?);
            self.consume(TokenKind::Colon, "expected ':' after dict key")?;
            values.push(self.parse_expression()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        let end = self
            .consume(TokenKind::RightBrace, "expected '}' after dict items")?
            .span;
        Ok(Expr {
            kind: ExprKind::Dict { keys, values },
            span: start.merge(end),
        })
    }
}
