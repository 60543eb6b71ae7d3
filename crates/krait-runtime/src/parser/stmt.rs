//! Statement parsing

use crate::ast::*;
use crate::parser::{Parser, SyntaxError};
use crate::span::Span;
use crate::token::TokenKind;

impl Parser {
    /// Parse one logical line: a compound statement, or one or more
    /// semicolon-separated simple statements ending in NEWLINE
    pub(super) fn parse_statement_line(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        match self.peek().kind {
            TokenKind::Def => out.push(self.parse_def_stmt()?),
            TokenKind::If => out.push(self.parse_if_stmt()?),
            TokenKind::While => out.push(self.parse_while_stmt()?),
            TokenKind::For => out.push(self.parse_for_stmt()?),
            _ => {
                loop {
                    out.push(self.parse_simple_stmt()?);
                    if !self.match_token(TokenKind::Semicolon) {
                        break;
                    }
                    if self.check(TokenKind::Newline) {
                        break;
                    }
                }
                self.consume_newline()?;
            }
        }
        Ok(())
    }

    /// Parse a simple (single-line) statement
    fn parse_simple_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        match self.peek().kind {
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Pass => {
                let span = self.advance().span;
                Ok(Stmt {
                    kind: StmtKind::Pass,
                    span,
                })
            }
            TokenKind::Break => {
                let span = self.peek().span;
                if self.loop_depth == 0 {
                    return Err(SyntaxError::new("'break' outside loop", span));
                }
                self.advance();
                Ok(Stmt {
                    kind: StmtKind::Break,
                    span,
                })
            }
            TokenKind::Continue => {
                let span = self.peek().span;
                if self.loop_depth == 0 {
                    return Err(SyntaxError::new("'continue' outside loop", span));
                }
                self.advance();
                Ok(Stmt {
                    kind: StmtKind::Continue,
                    span,
                })
            }
            TokenKind::Import => self.parse_import_stmt(),
            TokenKind::From => self.parse_from_import_stmt(),
            TokenKind::Def | TokenKind::If | TokenKind::While | TokenKind::For => {
                Err(self.error_here(format!(
                    "'{}' is not allowed on the same line as another statement",
                    self.peek().kind.as_str()
                )))
            }
            TokenKind::Reserved => Err(self.error_here(format!(
                "'{}' is not supported",
                self.peek().lexeme
            ))),
            _ => self.parse_assign_or_expr_stmt(),
        }
    }

    /// Parse an assignment, augmented assignment, or expression statement
    fn parse_assign_or_expr_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let first = self.parse_expression_list()?;
        let start = first.span;

        if let Some(op) = self.peek_augmented_op() {
            if !matches!(
                first.kind,
                ExprKind::Name { .. } | ExprKind::Attribute { .. } | ExprKind::Subscript { .. }
            ) {
                return Err(SyntaxError::new(
                    "invalid target for augmented assignment",
                    first.span,
                ));
            }
            self.advance();
            let mut target = first;
            mark_assign_target(&mut target)?;
            let value = self.parse_expression_list()?;
            let span = start.merge(value.span);
            return Ok(Stmt {
                kind: StmtKind::AugAssign { target, op, value },
                span,
            });
        }

        if self.match_token(TokenKind::Equal) {
            let mut targets = vec![first];
            let mut value = self.parse_expression_list()?;
            while self.match_token(TokenKind::Equal) {
                targets.push(value);
                value = self.parse_expression_list()?;
            }
            for target in &mut targets {
                mark_assign_target(target)?;
            }
            let span = start.merge(value.span);
            return Ok(Stmt {
                kind: StmtKind::Assign { targets, value },
                span,
            });
        }

        Ok(Stmt {
            kind: StmtKind::Expr { value: first },
            span: start,
        })
    }

    /// Map an augmented-assignment token to its operator
    fn peek_augmented_op(&self) -> Option<BinOpKind> {
        match self.peek().kind {
            TokenKind::PlusEqual => Some(BinOpKind::Add),
            TokenKind::MinusEqual => Some(BinOpKind::Sub),
            TokenKind::StarEqual => Some(BinOpKind::Mult),
            TokenKind::StarStarEqual => Some(BinOpKind::Pow),
            TokenKind::SlashEqual => Some(BinOpKind::Div),
            TokenKind::SlashSlashEqual => Some(BinOpKind::FloorDiv),
            TokenKind::PercentEqual => Some(BinOpKind::Mod),
            _ => None,
        }
    }

    /// Parse a return statement
    fn parse_return_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.peek().span;
        if self.function_depth == 0 {
            return Err(SyntaxError::new("'return' outside function", start));
        }
        self.advance();
        let value = if self.starts_expression() {
            Some(self.parse_expression_list()?)
        } else {
            None
        };
        let end = value.as_ref().map(|v| v.span).unwrap_or(start);
        Ok(Stmt {
            kind: StmtKind::Return { value },
            span: start.merge(end),
        })
    }

    /// Parse a function definition
    fn parse_def_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.consume(TokenKind::Def, "expected 'def'")?.span;
        let name = {
            let token = self.consume_identifier("a function name")?;
            token.lexeme.clone()
        };
        self.consume(TokenKind::LeftParen, "expected '(' after function name")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RightParen, "expected ')' after parameters")?;
        self.consume(TokenKind::Colon, "expected ':' after function signature")?;

        // break/continue may not escape into an enclosing loop
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.parse_block()?;
        self.function_depth -= 1;
        self.loop_depth = saved_loops;

        let end = body.last().map(|s| s.span).unwrap_or(start);
        Ok(Stmt {
            kind: StmtKind::FunctionDef { name, params, body },
            span: start.merge(end),
        })
    }

    /// Parse the parameter list of a function definition
    fn parse_params(&mut self) -> Result<Params, SyntaxError> {
        let mut params = Params::default();
        let mut seen_default = false;
        while !self.check(TokenKind::RightParen) {
            if params.kwarg.is_some() {
                return Err(self.error_here("no parameters may follow a '**' parameter"));
            }
            if self.match_token(TokenKind::Star) {
                if params.vararg.is_some() {
                    return Err(self.error_here("multiple '*' parameters"));
                }
                let (name, _) = self.parse_param_name(&params, "a parameter name after '*'")?;
                params.vararg = Some(name);
            } else if self.match_token(TokenKind::StarStar) {
                let (name, _) = self.parse_param_name(&params, "a parameter name after '**'")?;
                params.kwarg = Some(name);
            } else {
                if params.vararg.is_some() {
                    return Err(self.error_here(
                        "plain parameters must come before '*' and '**' parameters",
                    ));
                }
                let (name, name_span) = self.parse_param_name(&params, "a parameter name")?;
                let default = if self.match_token(TokenKind::Equal) {
                    seen_default = true;
                    Some(self.parse_expression()?)
                } else if seen_default {
                    return Err(SyntaxError::new(
                        "parameter without a default follows one with a default",
                        name_span,
                    ));
                } else {
                    None
                };
                let span = name_span.merge(default.as_ref().map(|d| d.span).unwrap_or(name_span));
                params.args.push(Param {
                    name,
                    default,
                    span,
                });
            }
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    /// Consume a parameter name, rejecting duplicates
    fn parse_param_name(
        &mut self,
        params: &Params,
        context: &str,
    ) -> Result<(String, Span), SyntaxError> {
        let (name, span) = {
            let token = self.consume_identifier(context)?;
            (token.lexeme.clone(), token.span)
        };
        if params.names().any(|n| n == name) {
            return Err(SyntaxError::new(
                format!("duplicate parameter '{}'", name),
                span,
            ));
        }
        Ok((name, span))
    }

    /// Parse an if statement; `elif` chains nest in `orelse`
    fn parse_if_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.consume(TokenKind::If, "expected 'if'")?.span;
        let test = self.parse_expression()?;
        self.consume(TokenKind::Colon, "expected ':' after condition")?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_clauses()?;

        let end = orelse
            .last()
            .or_else(|| body.last())
            .map(|s| s.span)
            .unwrap_or(start);
        Ok(Stmt {
            kind: StmtKind::If { test, body, orelse },
            span: start.merge(end),
        })
    }

    /// Parse trailing `elif`/`else` clauses
    fn parse_else_clauses(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if self.check(TokenKind::Elif) {
            let start = self.advance().span;
            let test = self.parse_expression()?;
            self.consume(TokenKind::Colon, "expected ':' after condition")?;
            let body = self.parse_block()?;
            let orelse = self.parse_else_clauses()?;
            let end = orelse
                .last()
                .or_else(|| body.last())
                .map(|s| s.span)
                .unwrap_or(start);
            Ok(vec![Stmt {
                kind: StmtKind::If { test, body, orelse },
                span: start.merge(end),
            }])
        } else if self.match_token(TokenKind::Else) {
            self.consume(TokenKind::Colon, "expected ':' after 'else'")?;
            self.parse_block()
        } else {
            Ok(Vec::new())
        }
    }

    /// Parse a while loop
    fn parse_while_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.consume(TokenKind::While, "expected 'while'")?.span;
        let test = self.parse_expression()?;
        self.consume(TokenKind::Colon, "expected ':' after condition")?;

        self.loop_depth += 1;
        let body = self.parse_block()?;
        self.loop_depth -= 1;

        let end = body.last().map(|s| s.span).unwrap_or(start);
        Ok(Stmt {
            kind: StmtKind::While { test, body },
            span: start.merge(end),
        })
    }

    /// Parse a for loop
    fn parse_for_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.consume(TokenKind::For, "expected 'for'")?.span;
        // targets stop at the postfix tier so `in` stays the loop keyword
        let first = self.parse_postfix()?;
        let mut target = if self.check(TokenKind::Comma) {
            let mut elts = vec![first];
            while self.match_token(TokenKind::Comma) {
                if self.check(TokenKind::In) {
                    break;
                }
                elts.push(self.parse_postfix()?);
            }
            let span = elts[0].span.merge(elts[elts.len() - 1].span);
            Expr {
                kind: ExprKind::Tuple {
                    elts,
                    ctx: ExprContext::Load,
                },
                span,
            }
        } else {
            first
        };
        mark_assign_target(&mut target)?;
        self.consume(TokenKind::In, "expected 'in' after loop target")?;
        let iter = self.parse_expression_list()?;
        self.consume(TokenKind::Colon, "expected ':' after iterable")?;

        self.loop_depth += 1;
        let body = self.parse_block()?;
        self.loop_depth -= 1;

        let end = body.last().map(|s| s.span).unwrap_or(start);
        Ok(Stmt {
            kind: StmtKind::For { target, iter, body },
            span: start.merge(end),
        })
    }

    /// Parse an import statement
    fn parse_import_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.consume(TokenKind::Import, "expected 'import'")?.span;
        let mut names = Vec::new();
        loop {
            names.push(self.parse_dotted_alias()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        let end = names.last().map(|a| a.span).unwrap_or(start);
        Ok(Stmt {
            kind: StmtKind::Import { names },
            span: start.merge(end),
        })
    }

    /// Parse a from-import statement
    fn parse_from_import_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.consume(TokenKind::From, "expected 'from'")?.span;
        let (module, _) = self.parse_dotted_name()?;
        self.consume(TokenKind::Import, "expected 'import' in from-import")?;

        let mut names = Vec::new();
        let end = if self.check(TokenKind::Star) {
            let span = self.advance().span;
            names.push(Alias {
                name: "*".to_string(),
                asname: None,
                span,
            });
            span
        } else if self.match_token(TokenKind::LeftParen) {
            while !self.check(TokenKind::RightParen) {
                names.push(self.parse_member_alias()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            if names.is_empty() {
                return Err(self.error_here("expected at least one import name"));
            }
            self.consume(TokenKind::RightParen, "expected ')' after import names")?
                .span
        } else {
            loop {
                names.push(self.parse_member_alias()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            names.last().map(|a| a.span).unwrap_or(start)
        };
        Ok(Stmt {
            kind: StmtKind::ImportFrom { module, names },
            span: start.merge(end),
        })
    }

    /// Parse a dotted module path (`a.b.c`)
    fn parse_dotted_name(&mut self) -> Result<(String, Span), SyntaxError> {
        let (mut name, mut span) = {
            let token = self.consume_identifier("a module name")?;
            (token.lexeme.clone(), token.span)
        };
        while self.match_token(TokenKind::Dot) {
            let token = self.consume_identifier("a module name")?;
            name.push('.');
            name.push_str(&token.lexeme);
            span = span.merge(token.span);
        }
        Ok((name, span))
    }

    /// Parse `dotted.name [as alias]`
    fn parse_dotted_alias(&mut self) -> Result<Alias, SyntaxError> {
        let (name, mut span) = self.parse_dotted_name()?;
        let asname = if self.match_token(TokenKind::As) {
            let token = self.consume_identifier("an import alias")?;
            span = span.merge(token.span);
            Some(token.lexeme.clone())
        } else {
            None
        };
        Ok(Alias { name, asname, span })
    }

    /// Parse `name [as alias]` in a from-import list
    fn parse_member_alias(&mut self) -> Result<Alias, SyntaxError> {
        let (name, mut span) = {
            let token = self.consume_identifier("an import name")?;
            (token.lexeme.clone(), token.span)
        };
        let asname = if self.match_token(TokenKind::As) {
            let token = self.consume_identifier("an import alias")?;
            span = span.merge(token.span);
            Some(token.lexeme.clone())
        } else {
            None
        };
        Ok(Alias { name, asname, span })
    }

    /// Parse a statement block after ':': inline simple statements on the
    /// same line, or NEWLINE INDENT statements DEDENT
    fn parse_block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.enter_nesting()?;
        let mut body = Vec::new();
        if self.match_token(TokenKind::Newline) {
            self.consume(TokenKind::Indent, "expected an indented block")?;
            while !self.check(TokenKind::Dedent) && !self.is_at_end() {
                self.parse_statement_line(&mut body)?;
            }
            self.consume(TokenKind::Dedent, "expected end of block")?;
        } else {
            loop {
                body.push(self.parse_simple_stmt()?);
                if !self.match_token(TokenKind::Semicolon) {
                    break;
                }
                if self.check(TokenKind::Newline) {
                    break;
                }
            }
            self.consume_newline()?;
        }
        self.exit_nesting();
        Ok(body)
    }
}

/// Rewrite an expression parsed in load context into an assignment target,
/// validating that it can be assigned to
fn mark_assign_target(expr: &mut Expr) -> Result<(), SyntaxError> {
    match &mut expr.kind {
        ExprKind::Name { ctx, .. }
        | ExprKind::Attribute { ctx, .. }
        | ExprKind::Subscript { ctx, .. } => {
            *ctx = ExprContext::Store;
            Ok(())
        }
        ExprKind::Tuple { elts, ctx } => {
            *ctx = ExprContext::Store;
            for elt in elts {
                mark_assign_target(elt)?;
            }
            Ok(())
        }
        ExprKind::List { elts } => {
            for elt in elts {
                mark_assign_target(elt)?;
            }
            Ok(())
        }
        _ => Err(SyntaxError::new(
            "cannot assign to this expression",
            expr.span,
        )),
    }
}
