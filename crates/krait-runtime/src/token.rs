//! Token types for lexical analysis
//!
//! Defines all token types recognized by the fragment lexer, including the
//! layout tokens (NEWLINE/INDENT/DEDENT) that carry block structure.

use crate::span::Span;

/// Token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source text of this token (string literals are unescaped)
    pub lexeme: String,
    /// Source location
    pub span: Span,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}

/// Classification of token types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    /// Integer literal (42)
    Int,
    /// Float literal (3.14, 1e-3)
    Float,
    /// String literal ('hello', "hello")
    Str,
    /// Identifier
    Identifier,

    // Keywords
    /// `True` keyword
    True,
    /// `False` keyword
    False,
    /// `None` keyword
    None,
    /// `and` keyword
    And,
    /// `or` keyword
    Or,
    /// `not` keyword
    Not,
    /// `if` keyword
    If,
    /// `elif` keyword
    Elif,
    /// `else` keyword
    Else,
    /// `while` keyword
    While,
    /// `for` keyword
    For,
    /// `in` keyword
    In,
    /// `is` keyword
    Is,
    /// `def` keyword
    Def,
    /// `return` keyword
    Return,
    /// `pass` keyword
    Pass,
    /// `break` keyword
    Break,
    /// `continue` keyword
    Continue,
    /// `import` keyword
    Import,
    /// `from` keyword
    From,
    /// `as` keyword
    As,
    /// Reserved word with no fragment semantics (`class`, `lambda`, `try`, ...)
    Reserved,

    // Operators
    /// `+` (addition)
    Plus,
    /// `-` (subtraction or negation)
    Minus,
    /// `*` (multiplication, star-args)
    Star,
    /// `**` (power, kwargs)
    StarStar,
    /// `/` (true division)
    Slash,
    /// `//` (floor division)
    SlashSlash,
    /// `%` (modulo)
    Percent,
    /// `==` (equality)
    EqualEqual,
    /// `!=` (inequality)
    BangEqual,
    /// `<` (less than)
    Less,
    /// `<=` (less than or equal)
    LessEqual,
    /// `>` (greater than)
    Greater,
    /// `>=` (greater than or equal)
    GreaterEqual,

    // Compound assignment operators
    /// `+=` (add and assign)
    PlusEqual,
    /// `-=` (subtract and assign)
    MinusEqual,
    /// `*=` (multiply and assign)
    StarEqual,
    /// `**=` (power and assign)
    StarStarEqual,
    /// `/=` (divide and assign)
    SlashEqual,
    /// `//=` (floor-divide and assign)
    SlashSlashEqual,
    /// `%=` (modulo and assign)
    PercentEqual,

    // Punctuation
    /// `=` (assignment)
    Equal,
    /// `(` (left parenthesis)
    LeftParen,
    /// `)` (right parenthesis)
    RightParen,
    /// `[` (left bracket)
    LeftBracket,
    /// `]` (right bracket)
    RightBracket,
    /// `{` (left brace)
    LeftBrace,
    /// `}` (right brace)
    RightBrace,
    /// `,` (comma)
    Comma,
    /// `:` (colon)
    Colon,
    /// `.` (attribute access)
    Dot,
    /// `;` (statement separator)
    Semicolon,

    // Layout
    /// End of a logical line
    Newline,
    /// Indentation increase
    Indent,
    /// Indentation decrease
    Dedent,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Check if a string is a keyword and return its token kind
    pub fn is_keyword(s: &str) -> Option<TokenKind> {
        match s {
            "True" => Some(TokenKind::True),
            "False" => Some(TokenKind::False),
            "None" => Some(TokenKind::None),
            "and" => Some(TokenKind::And),
            "or" => Some(TokenKind::Or),
            "not" => Some(TokenKind::Not),
            "if" => Some(TokenKind::If),
            "elif" => Some(TokenKind::Elif),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            "for" => Some(TokenKind::For),
            "in" => Some(TokenKind::In),
            "is" => Some(TokenKind::Is),
            "def" => Some(TokenKind::Def),
            "return" => Some(TokenKind::Return),
            "pass" => Some(TokenKind::Pass),
            "break" => Some(TokenKind::Break),
            "continue" => Some(TokenKind::Continue),
            "import" => Some(TokenKind::Import),
            "from" => Some(TokenKind::From),
            "as" => Some(TokenKind::As),
            // Python reserved words outside the fragment subset; lexed so the
            // parser can report them instead of treating them as identifiers.
            "lambda" | "class" | "try" | "except" | "finally" | "raise" | "with" | "del"
            | "global" | "nonlocal" | "yield" | "assert" | "async" | "await" => {
                Some(TokenKind::Reserved)
            }
            _ => None,
        }
    }

    /// Get the string representation of this token kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::Str => "string",
            TokenKind::Identifier => "identifier",
            TokenKind::True => "True",
            TokenKind::False => "False",
            TokenKind::None => "None",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Is => "is",
            TokenKind::Def => "def",
            TokenKind::Return => "return",
            TokenKind::Pass => "pass",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Import => "import",
            TokenKind::From => "from",
            TokenKind::As => "as",
            TokenKind::Reserved => "reserved keyword",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::SlashSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::StarStarEqual => "**=",
            TokenKind::SlashEqual => "/=",
            TokenKind::SlashSlashEqual => "//=",
            TokenKind::PercentEqual => "%=",
            TokenKind::Equal => "=",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::Semicolon => ";",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Indent => "INDENT",
            TokenKind::Dedent => "DEDENT",
            TokenKind::Eof => "EOF",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new(TokenKind::Int, "42", Span::new(0, 2));
        assert_eq!(token.kind, TokenKind::Int);
        assert_eq!(token.lexeme, "42");
        assert_eq!(token.span, Span::new(0, 2));
    }

    #[test]
    fn test_keyword_detection() {
        assert_eq!(TokenKind::is_keyword("def"), Some(TokenKind::Def));
        assert_eq!(TokenKind::is_keyword("import"), Some(TokenKind::Import));
        assert_eq!(TokenKind::is_keyword("from"), Some(TokenKind::From));
        assert_eq!(TokenKind::is_keyword("as"), Some(TokenKind::As));
        assert_eq!(TokenKind::is_keyword("and"), Some(TokenKind::And));
        assert_eq!(TokenKind::is_keyword("not"), Some(TokenKind::Not));
        assert_eq!(TokenKind::is_keyword("True"), Some(TokenKind::True));
        assert_eq!(TokenKind::is_keyword("None"), Some(TokenKind::None));
    }

    #[test]
    fn test_reserved_keywords() {
        assert_eq!(TokenKind::is_keyword("lambda"), Some(TokenKind::Reserved));
        assert_eq!(TokenKind::is_keyword("class"), Some(TokenKind::Reserved));
        assert_eq!(TokenKind::is_keyword("yield"), Some(TokenKind::Reserved));
        assert_eq!(TokenKind::is_keyword("global"), Some(TokenKind::Reserved));
    }

    #[test]
    fn test_non_keyword() {
        assert_eq!(TokenKind::is_keyword("foo"), None);
        assert_eq!(TokenKind::is_keyword("x"), None);
        assert_eq!(TokenKind::is_keyword("true"), None); // Python capitalizes
        assert_eq!(TokenKind::is_keyword("Def"), None); // Case-sensitive
    }

    #[test]
    fn test_token_kind_as_str() {
        assert_eq!(TokenKind::Def.as_str(), "def");
        assert_eq!(TokenKind::StarStar.as_str(), "**");
        assert_eq!(TokenKind::SlashSlash.as_str(), "//");
        assert_eq!(TokenKind::BangEqual.as_str(), "!=");
        assert_eq!(TokenKind::Newline.as_str(), "NEWLINE");
    }

    #[test]
    fn test_all_operators() {
        let operators = vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::StarStar,
            TokenKind::Slash,
            TokenKind::SlashSlash,
            TokenKind::Percent,
            TokenKind::EqualEqual,
            TokenKind::BangEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
            TokenKind::Greater,
            TokenKind::GreaterEqual,
        ];

        for op in operators {
            assert!(!op.as_str().is_empty());
        }
    }
}
