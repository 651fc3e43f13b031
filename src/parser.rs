//! Parser for mathematical expressions
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! additive       := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/') unary)*
//! unary          := '-' unary | power
//! power          := primary ('^' unary)?
//! primary        := number | constant | variable | function '(' additive ')' | '(' additive ')'
//! ```
//!
//! So `-x^2` is `-(x^2)`, `2^3^2` is `2^(3^2)` and `2^-1` is accepted.
//! The parser only builds structure, it never folds constants.

use log::debug;

use crate::ast::{Expr, Function};
use crate::config::EngineConfig;
use crate::error::{MathError, MathResult};
use crate::lexer::{Lexer, Spanned, Token};

const OPERAND: &str = "a number, constant, variable, function call or '('";

/// Variables are single lowercase letters
pub fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_lowercase())
}

/// Recursive-descent expression parser
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    current: Option<Spanned>,
    depth: usize,
    max_depth: usize,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> MathResult<Self> {
        Self::with_max_depth(source, EngineConfig::DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(source: &'source str, max_depth: usize) -> MathResult<Self> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next().transpose()?;
        Ok(Self {
            lexer,
            current,
            depth: 0,
            max_depth,
        })
    }

    /// Advance to the next token, returning the previous one
    fn advance(&mut self) -> MathResult<Option<Spanned>> {
        let next = self.lexer.next().transpose()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    /// Check if current token matches expected
    fn check(&self, expected: &Token) -> bool {
        match &self.current {
            Some(spanned) => {
                std::mem::discriminant(&spanned.token) == std::mem::discriminant(expected)
            }
            None => false,
        }
    }

    fn position(&self) -> usize {
        self.current
            .as_ref()
            .map_or(self.lexer.end(), |spanned| spanned.span.start)
    }

    fn error(&self, expected: &str) -> MathError {
        let found = match &self.current {
            Some(spanned) => spanned.token.to_string(),
            None => "end of input".to_string(),
        };
        MathError::syntax(self.position(), found, expected)
    }

    /// Consume token if it matches, otherwise error
    fn expect(&mut self, expected: Token, description: &str) -> MathResult<()> {
        if self.check(&expected) {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error(description))
        }
    }

    fn enter(&mut self) -> MathResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(MathError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    /// Parse a complete expression; trailing tokens are an error
    pub fn parse_expression(&mut self) -> MathResult<Expr> {
        let expr = self.parse_additive()?;

        if self.current.is_some() {
            return Err(self.error("an operator or end of input"));
        }

        // Long operator chains build deep trees without deep parser recursion
        expr.check_depth(self.max_depth)?;
        debug!("parsed expression: {}", expr);
        Ok(expr)
    }

    /// Parse additive expressions: a + b, a - b
    fn parse_additive(&mut self) -> MathResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            if self.check(&Token::Plus) {
                self.advance()?;
                let right = self.parse_multiplicative()?;
                left = Expr::add(left, right);
            } else if self.check(&Token::Minus) {
                self.advance()?;
                let right = self.parse_multiplicative()?;
                left = Expr::sub(left, right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    /// Parse multiplicative expressions: a * b, a / b
    fn parse_multiplicative(&mut self) -> MathResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            if self.check(&Token::Star) {
                self.advance()?;
                let right = self.parse_unary()?;
                left = Expr::mul(left, right);
            } else if self.check(&Token::Slash) {
                self.advance()?;
                let right = self.parse_unary()?;
                left = Expr::div(left, right);
            } else {
                break;
            }
        }

        Ok(left)
    }

    /// Parse unary expressions: -a
    fn parse_unary(&mut self) -> MathResult<Expr> {
        self.enter()?;
        let result = if self.check(&Token::Minus) {
            self.advance()?;
            self.parse_unary().map(Expr::neg)
        } else {
            self.parse_power()
        };
        self.depth -= 1;
        result
    }

    /// Parse exponentiation: a ^ b (right-associative)
    fn parse_power(&mut self) -> MathResult<Expr> {
        let base = self.parse_primary()?;

        if self.check(&Token::Caret) {
            self.advance()?;
            let exponent = self.parse_unary()?;
            return Ok(Expr::pow(base, exponent));
        }

        Ok(base)
    }

    /// Parse primary expressions: literals, names, parenthesized, function calls
    fn parse_primary(&mut self) -> MathResult<Expr> {
        let Some(spanned) = &self.current else {
            return Err(self.error(OPERAND));
        };

        match &spanned.token {
            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(Expr::Number(n))
            }

            Token::Constant(c) => {
                let c = *c;
                self.advance()?;
                Ok(Expr::Constant(c))
            }

            Token::Ident(name) => {
                if !is_variable_name(name) {
                    return Err(MathError::syntax(
                        spanned.span.start,
                        spanned.token.to_string(),
                        "a variable (a-z), constant (pi, e) or function (sin, cos, tan, sqrt, log)",
                    ));
                }
                let name = name.clone();
                self.advance()?;
                Ok(Expr::Variable(name))
            }

            Token::Function(function) => {
                let function = *function;
                self.advance()?;
                self.parse_call(function)
            }

            Token::LParen => {
                self.advance()?;
                let inner = self.parse_additive()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }

            _ => Err(self.error(OPERAND)),
        }
    }

    /// Parse the single parenthesized argument of a function call
    fn parse_call(&mut self, function: Function) -> MathResult<Expr> {
        self.expect(Token::LParen, &format!("'(' after '{}'", function))?;
        let arg = self.parse_additive()?;

        if self.check(&Token::Comma) {
            return Err(self.error(&format!("')' ('{}' takes exactly one argument)", function)));
        }

        self.expect(Token::RParen, "')'")?;
        Ok(Expr::call(function, arg))
    }
}

/// Parse with the default depth limit
pub fn parse(source: &str) -> MathResult<Expr> {
    Parser::new(source)?.parse_expression()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Constant};

    #[test]
    fn test_parse_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        if let Expr::Binary { op: BinaryOp::Add, left, right } = &expr {
            assert!(left.is_number(1.0));
            assert!(matches!(right.as_ref(), Expr::Binary { op: BinaryOp::Mul, .. }));
        } else {
            panic!("Expected Add expression");
        }
    }

    #[test]
    fn test_parse_left_associative_subtraction() {
        let expr = parse("5 - 2 - 1").unwrap();
        if let Expr::Binary { op: BinaryOp::Sub, left, right } = &expr {
            assert!(matches!(left.as_ref(), Expr::Binary { op: BinaryOp::Sub, .. }));
            assert!(right.is_number(1.0));
        } else {
            panic!("Expected Sub expression");
        }
    }

    #[test]
    fn test_parse_power_is_right_associative() {
        let expr = parse("2 ^ 3 ^ 2").unwrap();
        if let Expr::Binary { op: BinaryOp::Pow, left, right } = &expr {
            assert!(left.is_number(2.0));
            assert!(matches!(right.as_ref(), Expr::Binary { op: BinaryOp::Pow, .. }));
        } else {
            panic!("Expected Pow expression");
        }
    }

    #[test]
    fn test_parse_power_binds_tighter_than_negation() {
        let expr = parse("-x ^ 2").unwrap();
        if let Expr::Unary { operand, .. } = &expr {
            assert!(matches!(operand.as_ref(), Expr::Binary { op: BinaryOp::Pow, .. }));
        } else {
            panic!("Expected negation");
        }
        assert!(parse("2 ^ -1").is_ok());
        assert!(parse("3 * -x").is_ok());
    }

    #[test]
    fn test_parse_call_and_constants() {
        let expr = parse("sin(pi / 2)").unwrap();
        if let Expr::Call { function, args } = &expr {
            assert_eq!(*function, Function::Sin);
            assert_eq!(args.len(), 1);
            assert!(matches!(
                args[0].as_ref(),
                Expr::Binary { op: BinaryOp::Div, left, .. } if **left == Expr::Constant(Constant::Pi)
            ));
        } else {
            panic!("Expected Call expression");
        }
    }

    #[test]
    fn test_round_trip_rendering() {
        assert_eq!(parse("2*x^2 + 3*x + 1").unwrap().to_string(), "2 * x ^ 2 + 3 * x + 1");
        assert_eq!(parse("sin(x) + cos(y)").unwrap().to_string(), "sin(x) + cos(y)");
        assert_eq!(parse("(x+1)/(x-1)").unwrap().to_string(), "(x + 1) / (x - 1)");
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse("(2 + 3").unwrap_err();
        assert_eq!(err, MathError::syntax(6, "end of input", "')'"));

        let err = parse("2 + 3)").unwrap_err();
        assert_eq!(err, MathError::syntax(5, "')'", "an operator or end of input"));
    }

    #[test]
    fn test_missing_operand() {
        let err = parse("2 +").unwrap_err();
        assert_eq!(err, MathError::syntax(3, "end of input", OPERAND));
        assert!(matches!(parse("* 2"), Err(MathError::Syntax { position: 0, .. })));
    }

    #[test]
    fn test_unknown_identifier() {
        let err = parse("foo + 1").unwrap_err();
        assert!(matches!(err, MathError::Syntax { position: 0, ref found, .. } if found == "identifier 'foo'"));
        assert!(parse("X").is_err());
    }

    #[test]
    fn test_function_requires_one_parenthesized_argument() {
        assert!(matches!(parse("sin x"), Err(MathError::Syntax { position: 4, .. })));
        assert!(matches!(parse("sqrt(1, 2)"), Err(MathError::Syntax { position: 6, .. })));
        assert!(parse("log()").is_err());
    }

    #[test]
    fn test_lexer_errors_surface() {
        assert!(matches!(parse("1 + $"), Err(MathError::Lexer { position: 4, character: '$' })));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        assert_eq!(parse(&deep), Err(MathError::DepthExceeded { limit: 200 }));

        let long_chain = vec!["1"; 300].join(" + ");
        assert_eq!(parse(&long_chain), Err(MathError::DepthExceeded { limit: 200 }));

        let mut parser = Parser::with_max_depth("-(-(-x))", 2).unwrap();
        assert!(parser.parse_expression().is_err());
    }
}
