//! Lexical analysis (tokenization)
//!
//! Converts fragment source into a token stream with layout tokens: each
//! logical line ends in NEWLINE, and block structure is carried by
//! INDENT/DEDENT pairs. Newlines inside brackets are implicit continuations.

mod indent;

use crate::parser::ParseError;
use crate::span::Span;
use crate::token::{Token, TokenKind};
use indent::{IndentChange, IndentStack};

/// Lexer state for tokenizing fragment source
pub struct Lexer {
    /// Characters of source code
    chars: Vec<char>,
    /// Current position in chars
    current: usize,
    /// Current line number (1-indexed)
    line: u32,
    /// Current column number (1-indexed)
    column: u32,
    /// Start position of current token
    start_pos: usize,
    /// Start line/column of current token
    start_line: u32,
    start_column: u32,
    /// Open indentation levels
    indents: IndentStack,
    /// DEDENT tokens still owed from the last indentation step
    pending_dedents: usize,
    /// Bracket nesting depth; newlines and indentation are ignored inside
    bracket_depth: usize,
    /// Whether the next token begins a logical line
    at_line_start: bool,
    /// Whether the current logical line produced any real token
    line_has_content: bool,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            indents: IndentStack::new(),
            pending_dedents: 0,
            bracket_depth: 0,
            at_line_start: true,
            line_has_content: false,
        }
    }

    /// Tokenize the source code. Stops at the first lexical error.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Scan the next token
    fn next_token(&mut self) -> Result<Token, ParseError> {
        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            return Ok(self.layout_token(TokenKind::Dedent));
        }

        if self.at_line_start && self.bracket_depth == 0 {
            if let Some(token) = self.handle_line_start()? {
                return Ok(token);
            }
        }

        self.skip_inline_trivia();
        self.start_pos = self.current;
        self.start_line = self.line;
        self.start_column = self.column;

        if self.is_at_end() {
            // Close the final logical line, then every open block.
            if self.line_has_content {
                self.line_has_content = false;
                return Ok(self.layout_token(TokenKind::Newline));
            }
            let closed = self.indents.close();
            if closed > 0 {
                self.pending_dedents = closed - 1;
                return Ok(self.layout_token(TokenKind::Dedent));
            }
            return Ok(self.layout_token(TokenKind::Eof));
        }

        let c = self.advance();
        match c {
            '\n' => {
                self.at_line_start = true;
                self.line_has_content = false;
                Ok(Token::new(
                    TokenKind::Newline,
                    "",
                    Span::new(self.start_pos, self.current),
                ))
            }
            '(' => {
                self.bracket_depth += 1;
                Ok(self.make_token(TokenKind::LeftParen, "("))
            }
            ')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Ok(self.make_token(TokenKind::RightParen, ")"))
            }
            '[' => {
                self.bracket_depth += 1;
                Ok(self.make_token(TokenKind::LeftBracket, "["))
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Ok(self.make_token(TokenKind::RightBracket, "]"))
            }
            '{' => {
                self.bracket_depth += 1;
                Ok(self.make_token(TokenKind::LeftBrace, "{"))
            }
            '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                Ok(self.make_token(TokenKind::RightBrace, "}"))
            }
            ',' => Ok(self.make_token(TokenKind::Comma, ",")),
            ':' => Ok(self.make_token(TokenKind::Colon, ":")),
            ';' => Ok(self.make_token(TokenKind::Semicolon, ";")),
            '.' => {
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_number(c)
                } else {
                    Ok(self.make_token(TokenKind::Dot, "."))
                }
            }
            '+' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::PlusEqual, "+="))
                } else {
                    Ok(self.make_token(TokenKind::Plus, "+"))
                }
            }
            '-' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::MinusEqual, "-="))
                } else {
                    Ok(self.make_token(TokenKind::Minus, "-"))
                }
            }
            '*' => {
                if self.match_char('*') {
                    if self.match_char('=') {
                        Ok(self.make_token(TokenKind::StarStarEqual, "**="))
                    } else {
                        Ok(self.make_token(TokenKind::StarStar, "**"))
                    }
                } else if self.match_char('=') {
                    Ok(self.make_token(TokenKind::StarEqual, "*="))
                } else {
                    Ok(self.make_token(TokenKind::Star, "*"))
                }
            }
            '/' => {
                if self.match_char('/') {
                    if self.match_char('=') {
                        Ok(self.make_token(TokenKind::SlashSlashEqual, "//="))
                    } else {
                        Ok(self.make_token(TokenKind::SlashSlash, "//"))
                    }
                } else if self.match_char('=') {
                    Ok(self.make_token(TokenKind::SlashEqual, "/="))
                } else {
                    Ok(self.make_token(TokenKind::Slash, "/"))
                }
            }
            '%' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::PercentEqual, "%="))
                } else {
                    Ok(self.make_token(TokenKind::Percent, "%"))
                }
            }
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual, "=="))
                } else {
                    Ok(self.make_token(TokenKind::Equal, "="))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual, "!="))
                } else {
                    Err(self.error_at_start("unexpected character '!'"))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::LessEqual, "<="))
                } else {
                    Ok(self.make_token(TokenKind::Less, "<"))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::GreaterEqual, ">="))
                } else {
                    Ok(self.make_token(TokenKind::Greater, ">"))
                }
            }
            '\'' | '"' => self.scan_string(c),
            c if c.is_ascii_digit() => self.scan_number(c),
            c if c.is_alphabetic() || c == '_' => Ok(self.scan_identifier(c)),
            c => Err(self.error_at_start(&format!("unexpected character '{}'", c))),
        }
    }

    /// Consume blank and comment-only lines, then account for the
    /// indentation of the first content line. Returns the INDENT/DEDENT
    /// token that indentation change produces, if any.
    fn handle_line_start(&mut self) -> Result<Option<Token>, ParseError> {
        loop {
            let mut width = 0usize;
            loop {
                match self.peek() {
                    Some(' ') => {
                        width += 1;
                        self.advance();
                    }
                    Some('\t') => {
                        return Err(self.error_here("tab characters are not allowed in indentation"))
                    }
                    _ => break,
                }
            }

            match self.peek() {
                None => return Ok(None),
                Some('\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                }
                Some('#') => {
                    self.skip_comment();
                    if self.peek() == Some('\n') {
                        self.advance();
                    }
                }
                Some(_) => {
                    self.at_line_start = false;
                    self.start_pos = self.current;
                    self.start_line = self.line;
                    self.start_column = self.column;
                    return match self.indents.step(width) {
                        Ok(IndentChange::Indent) => Ok(Some(self.layout_token(TokenKind::Indent))),
                        Ok(IndentChange::Dedent(n)) => {
                            self.pending_dedents = n - 1;
                            Ok(Some(self.layout_token(TokenKind::Dedent)))
                        }
                        Ok(IndentChange::None) => Ok(None),
                        Err(message) => Err(self.error_here(message)),
                    };
                }
            }
        }
    }

    /// Skip spaces, tabs, carriage returns, and comments. Newlines are
    /// skipped only inside brackets (implicit line continuation).
    fn skip_inline_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => self.skip_comment(),
                '\n' if self.bracket_depth > 0 => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// Skip a comment up to (not including) the line end
    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::is_keyword(&text).unwrap_or(TokenKind::Identifier);
        self.make_token(kind, text)
    }

    fn scan_number(&mut self, first: char) -> Result<Token, ParseError> {
        let mut text = String::new();
        let mut is_float = first == '.';
        text.push(first);

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if !is_float && self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let exponent_ok = match self.peek_next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if exponent_ok {
                is_float = true;
                text.push(self.advance());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.advance());
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_float {
            if text.parse::<f64>().is_err() {
                return Err(self.error_at_start("invalid float literal"));
            }
            Ok(self.make_token(TokenKind::Float, text))
        } else {
            if text.parse::<i64>().is_err() {
                return Err(self.error_at_start("integer literal out of range"));
            }
            Ok(self.make_token(TokenKind::Int, text))
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, ParseError> {
        if self.peek() == Some(quote) && self.peek_next() == Some(quote) {
            return Err(self.error_at_start("triple-quoted strings are not supported"));
        }

        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.error_at_start("unterminated string literal"))
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some('0') => '\0',
                        _ => return Err(self.error_here("unrecognized escape sequence")),
                    };
                    value.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Ok(self.make_token(TokenKind::Str, value))
    }

    // === Character access ===

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.current + ahead).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    // === Token construction ===

    fn make_token(&mut self, kind: TokenKind, lexeme: impl Into<String>) -> Token {
        self.line_has_content = true;
        Token::new(kind, lexeme, Span::new(self.start_pos, self.current))
    }

    /// Zero-width token carrying layout structure
    fn layout_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, "", Span::new(self.current, self.current))
    }

    fn error_at_start(&self, message: &str) -> ParseError {
        ParseError::new(message, self.start_line, self.start_column)
    }

    fn error_here(&self, message: &str) -> ParseError {
        ParseError::new(message, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_expression() {
        assert_eq!(
            kinds("x + y"),
            vec![
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("import math"),
            vec![
                TokenKind::Import,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_indent_dedent_pairs() {
        let source = "def f():\n    return 1\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Def,
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Return,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_blocks_close_at_eof() {
        let source = "if a:\n    if b:\n        pass";
        let toks = kinds(source);
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(*toks.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn test_blank_and_comment_lines_are_invisible() {
        let source = "x = 1\n\n# note\n   \ny = 2\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_trailing_comment() {
        assert_eq!(
            kinds("x = 1  #話"),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_inside_brackets_is_continuation() {
        let source = "xs = [1,\n      2,\n      3]";
        let toks = kinds(source);
        let newlines = toks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1); // only the final synthesized one
        assert!(!toks.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_number_literals() {
        let tokens = Lexer::new("42 3.14 1e-3 .5 2.").tokenize().unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[0].lexeme, "42");
        assert_eq!(tokens[2].lexeme, "1e-3");
    }

    #[test]
    fn test_string_literals_unescaped() {
        let tokens = Lexer::new(r#"'a\nb' "c""#).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "a\nb");
        assert_eq!(tokens[1].lexeme, "c");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("'oops").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("a //= b ** c"),
            vec![
                TokenKind::Identifier,
                TokenKind::SlashSlashEqual,
                TokenKind::Identifier,
                TokenKind::StarStar,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_semicolon_separated_statements() {
        assert_eq!(
            kinds("import os; import sys"),
            vec![
                TokenKind::Import,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Import,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bang_alone_is_error() {
        let err = Lexer::new("x!!!").tokenize().unwrap_err();
        assert!(err.message.contains("unexpected character"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_inconsistent_dedent_is_error() {
        let source = "if a:\n    pass\n  pass\n";
        let err = Lexer::new(source).tokenize().unwrap_err();
        assert!(err.message.contains("unindent"));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("\n\n# only comments\n"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_reserved_word_token() {
        let tokens = Lexer::new("lambda x: x").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Reserved);
        assert_eq!(tokens[0].lexeme, "lambda");
    }
}
