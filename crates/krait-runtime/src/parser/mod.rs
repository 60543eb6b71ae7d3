//! Parsing (tokens to AST)
//!
//! Statements use recursive descent over the layout tokens the lexer
//! produces; expressions use precedence climbing with dedicated handling
//! for the irregular tiers (`not`, comparison chains, right-associative
//! `**`). Parsing stops at the first syntax error.

mod expr;
mod stmt;

use thiserror::Error;

use crate::ast::Module;
use crate::lexer::Lexer;
use crate::span::{line_col, Span};
use crate::token::{Token, TokenKind};

/// A syntax error with the 1-indexed source line and column where it was
/// detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Parse fragment source into a module AST.
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse_module().map_err(|err| {
        let (line, column) = line_col(source, err.span.start);
        ParseError::new(err.message, line, column)
    })
}

/// Syntax error carrying the offending span; resolved to a line and
/// column at the [`parse`] boundary where the source text is available.
#[derive(Debug, Clone)]
pub(super) struct SyntaxError {
    pub(super) message: String,
    pub(super) span: Span,
}

impl SyntaxError {
    pub(super) fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Binary operator precedence levels for the climbing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    Lowest,
    Or,         // or
    And,        // and
    Not,        // not x
    Comparison, // == != < <= > >= in is
    Term,       // + -
    Factor,     // * / // %
}

/// Hard bound on combined block and expression nesting, so malformed or
/// adversarial input cannot overflow the host stack during parsing or any
/// later tree walk.
const MAX_NESTING: usize = 200;

/// Parser state for building an AST from tokens
pub struct Parser {
    pub(super) tokens: Vec<Token>,
    pub(super) current: usize,
    /// Number of enclosing function bodies
    pub(super) function_depth: usize,
    /// Number of enclosing loop bodies in the innermost function
    pub(super) loop_depth: usize,
    /// Current block and expression nesting depth
    pub(super) nesting: usize,
}

impl Parser {
    /// Create a new parser for the given tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            function_depth: 0,
            loop_depth: 0,
            nesting: 0,
        }
    }

    /// Parse every statement up to end of input
    fn parse_module(&mut self) -> Result<Module, SyntaxError> {
        let mut body = Vec::new();
        while !self.is_at_end() {
            if self.check(TokenKind::Indent) {
                return Err(self.error_here("unexpected indent"));
            }
            self.parse_statement_line(&mut body)?;
        }
        Ok(Module { body })
    }

    // === Helper methods ===

    /// Advance to next token and return reference to previous
    pub(super) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    /// Peek at current token
    pub(super) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Peek one token past the current one
    pub(super) fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    /// Check if current token matches kind
    pub(super) fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    /// Match and consume token if it matches
    pub(super) fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume token of given kind or error; `message` names what was
    /// expected
    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("{}, found {}", message, describe(self.peek()))))
        }
    }

    /// Consume an identifier token, with a clearer message when a keyword
    /// sits where a name is required
    pub(super) fn consume_identifier(&mut self, context: &str) -> Result<&Token, SyntaxError> {
        let current = self.peek();
        if current.kind == TokenKind::Identifier {
            Ok(self.advance())
        } else if TokenKind::is_keyword(&current.lexeme).is_some() {
            Err(self.error_here(format!(
                "cannot use keyword '{}' as {}",
                current.lexeme, context
            )))
        } else {
            Err(self.error_here(format!(
                "expected {}, found {}",
                context,
                describe(current)
            )))
        }
    }

    /// Consume the NEWLINE ending a logical line
    pub(super) fn consume_newline(&mut self) -> Result<(), SyntaxError> {
        if self.match_token(TokenKind::Newline) {
            Ok(())
        } else {
            Err(self.error_here(format!(
                "expected end of line, found {}",
                describe(self.peek())
            )))
        }
    }

    /// Check if at end of token stream
    pub(super) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || self.tokens[self.current].kind == TokenKind::Eof
    }

    /// Build a syntax error at the current token
    pub(super) fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.peek().span)
    }

    /// Enter one nesting level, rejecting input past [`MAX_NESTING`]
    pub(super) fn enter_nesting(&mut self) -> Result<(), SyntaxError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            Err(self.error_here("nesting is too deep"))
        } else {
            Ok(())
        }
    }

    /// Leave one nesting level
    pub(super) fn exit_nesting(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }
}

/// Human-readable description of a token for error messages
fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Indent => "an indented block".to_string(),
        TokenKind::Dedent => "end of block".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Int
        | TokenKind::Float
        | TokenKind::Str
        | TokenKind::Identifier
        | TokenKind::Reserved => format!("'{}'", token.lexeme),
        _ => format!("'{}'", token.kind.as_str()),
    }
}
