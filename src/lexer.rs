//! Lexer for mathematical expressions using logos
//!
//! Supports tokens like:
//! - Numbers: 1, 2.5, .5, 6.02e23
//! - Constants: pi, e
//! - Functions: sin, cos, tan, sqrt, log
//! - Identifiers: x, y (anything else alphabetic is rejected by the parser)
//! - Operators: +, -, *, /, ^
//! - Punctuation: (, ), ,
//!
//! Minus is always lexed as `Minus`; whether it is unary or binary is decided
//! by the parser from its grammatical position.

use std::ops::Range;

use logos::Logos;

use crate::ast::{Constant, Function};
use crate::error::{MathError, MathResult};

/// Token types for the expression language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Literals
    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[token("pi", |_| Constant::Pi, priority = 10)]
    #[token("e", |_| Constant::E, priority = 10)]
    Constant(Constant),

    #[token("sin", |_| Function::Sin, priority = 10)]
    #[token("cos", |_| Function::Cos, priority = 10)]
    #[token("tan", |_| Function::Tan, priority = 10)]
    #[token("sqrt", |_| Function::Sqrt, priority = 10)]
    #[token("log", |_| Function::Log, priority = 10)]
    Function(Function),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("^")]
    Caret,

    // Punctuation
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Constant(c) => write!(f, "'{}'", c),
            Token::Function(func) => write!(f, "'{}'", func),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Caret => write!(f, "'^'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
        }
    }
}

/// A token together with its byte range in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Lexer wrapper that turns logos errors into positioned `MathError`s
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    source: &'source str,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            source,
        }
    }

    /// Byte length of the source, used as the position of end of input
    pub fn end(&self) -> usize {
        self.source.len()
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = MathResult<Spanned>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.inner.next()?;
        let span = self.inner.span();
        Some(match result {
            Ok(token) => Ok(Spanned { token, span }),
            Err(()) => Err(MathError::Lexer {
                position: span.start,
                character: self.source[span.start..].chars().next().unwrap_or('\0'),
            }),
        })
    }
}

/// Tokenize a whole source string, stopping at the first lexical error
pub fn tokenize(source: &str) -> MathResult<Vec<Spanned>> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            tokens("2 * x ^ 2"),
            vec![
                Token::Number(2.0),
                Token::Star,
                Token::Ident("x".to_string()),
                Token::Caret,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_minus_is_never_part_of_a_number() {
        assert_eq!(
            tokens("-3-1"),
            vec![
                Token::Minus,
                Token::Number(3.0),
                Token::Minus,
                Token::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_decimal_and_exponent_literals() {
        assert_eq!(
            tokens("2.5 .5 6e2 1.5E-3"),
            vec![
                Token::Number(2.5),
                Token::Number(0.5),
                Token::Number(600.0),
                Token::Number(0.0015),
            ]
        );
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(
            tokens("sin(pi/2) + log(e)"),
            vec![
                Token::Function(Function::Sin),
                Token::LParen,
                Token::Constant(Constant::Pi),
                Token::Slash,
                Token::Number(2.0),
                Token::RParen,
                Token::Plus,
                Token::Function(Function::Log),
                Token::LParen,
                Token::Constant(Constant::E),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_longer_identifiers_are_not_split() {
        assert_eq!(tokens("sinh"), vec![Token::Ident("sinh".to_string())]);
        assert_eq!(tokens("ex"), vec![Token::Ident("ex".to_string())]);
    }

    #[test]
    fn test_keywords_win_over_identifiers() {
        assert_eq!(tokens("e"), vec![Token::Constant(Constant::E)]);
        assert_eq!(tokens("pi"), vec![Token::Constant(Constant::Pi)]);
        assert_eq!(tokens("log"), vec![Token::Function(Function::Log)]);
        assert_ne!(tokens("e"), tokens("ex"));
    }

    #[test]
    fn test_spans() {
        let spanned = tokenize("x  +  10").unwrap();
        assert_eq!(spanned[1].span, 3..4);
        assert_eq!(spanned[2].span, 6..8);
    }

    #[test]
    fn test_unknown_character() {
        let err = tokenize("2 # 3").unwrap_err();
        assert_eq!(
            err,
            MathError::Lexer {
                position: 2,
                character: '#'
            }
        );
    }
}
