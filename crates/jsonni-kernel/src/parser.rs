//! Parser for query expressions.
//!
//! Transforms the token stream from the lexer into an [`Expr`] tree using a
//! hand-written recursive descent parser, one function per precedence level
//! (lowest first):
//!
//! 1. arrow functions
//! 2. conditional `?:`
//! 3. `??`
//! 4. `||`
//! 5. `&&`
//! 6. equality `==` `!=` `===` `!==`
//! 7. relational `<` `<=` `>` `>=` `in`
//! 8. additive `+` `-`
//! 9. multiplicative `*` `/` `%`
//! 10. exponent `**` (right associative)
//! 11. unary `!` `-` `+` `typeof`
//! 12. postfix member access, indexing and calls
//! 13. primary literals, identifiers and groupings

use std::ops::Range;
use std::rc::Rc;

use crate::ast::{
    BinaryOp, Body, Element, Expr, Lambda, Literal, LogicalOp, Property, PropertyKey, Stmt,
    UnaryOp,
};
use crate::lexer::{self, Spanned, Token};
use crate::value::format_number;

/// Maximum nesting depth of sub-expressions.
/// Bounds parser recursion for pathological inputs like `((((((...`.
pub const MAX_NESTING: usize = 128;

/// A parse failure with the byte range it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub span: Range<usize>,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.span.start)
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = Result<T, ParseError>;

/// Parse a complete query expression.
///
/// Trailing semicolons are accepted; anything else after the expression is
/// an error.
pub fn parse(source: &str) -> ParseResult<Expr> {
    let tokens = lexer::tokenize(source).map_err(|errs| {
        let first = errs
            .into_iter()
            .next()
            .map(|e| ParseError {
                span: e.span,
                message: e.token.to_string(),
            });
        first.unwrap_or_else(|| ParseError {
            span: 0..source.len(),
            message: "invalid input".to_string(),
        })
    })?;

    let mut parser = Parser::new(source, tokens);
    if parser.at_end() {
        return Err(parser.error_here("unexpected end of input"));
    }
    let expr = parser.parse_expr()?;
    while parser.eat(&Token::Semi) {}
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Spanned<Token>>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Token cursor
    // ═══════════════════════════════════════════════════════════════════

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Spanned<Token>> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            match self.peek() {
                Some(found) => Err(self.error_here(&format!("expected '{expected}', found '{found}'"))),
                None => Err(self.error_here(&format!("expected '{expected}', found end of input"))),
            }
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        let span = match self.tokens.get(self.pos) {
            Some(t) => t.span.clone(),
            None => self.source.len()..self.source.len(),
        };
        ParseError {
            span,
            message: message.to_string(),
        }
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(tok) => self.error_here(&format!("unexpected token '{tok}'")),
            None => self.error_here("unexpected end of input"),
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here(&format!(
                "expression nested too deeply (max {MAX_NESTING})"
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    /// Parse a full expression, including arrow functions.
    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let result = match self.try_arrow_params()? {
            Some(params) => self.parse_arrow_body(params),
            None => self.parse_conditional(),
        };
        self.leave();
        result
    }

    /// Detect `x =>` or `(a, b) =>` and consume the parameter list.
    fn try_arrow_params(&mut self) -> ParseResult<Option<Vec<String>>> {
        match self.peek() {
            Some(Token::Ident(name)) if self.peek_at(1) == Some(&Token::Arrow) => {
                let name = name.clone();
                self.pos += 2;
                Ok(Some(vec![name]))
            }
            Some(Token::LParen) => {
                let Some(close) = self.matching_close(self.pos) else {
                    return Ok(None);
                };
                if self.tokens.get(close + 1).map(|t| &t.token) != Some(&Token::Arrow) {
                    return Ok(None);
                }
                self.pos += 1; // consume '('
                let mut params = Vec::new();
                while !self.eat(&Token::RParen) {
                    match self.advance() {
                        Some(Spanned {
                            token: Token::Ident(name),
                            ..
                        }) => params.push(name),
                        _ => {
                            self.pos -= 1;
                            return Err(self.error_here("expected parameter name"));
                        }
                    }
                    if !self.eat(&Token::Comma) && self.peek() != Some(&Token::RParen) {
                        return Err(self.unexpected());
                    }
                }
                self.expect(Token::Arrow)?;
                Ok(Some(params))
            }
            _ => Ok(None),
        }
    }

    /// Index of the bracket closing the one at `open`, if balanced.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, t) in self.tokens.iter().enumerate().skip(open) {
            match t.token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn parse_arrow_body(&mut self, params: Vec<String>) -> ParseResult<Expr> {
        let body = if self.eat(&Token::LBrace) {
            Body::Block(self.parse_block()?)
        } else {
            Body::Expr(self.parse_expr()?)
        };
        Ok(Expr::Arrow(Rc::new(Lambda { params, body })))
    }

    /// Parse statements up to and including the closing `}`.
    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            if self.at_end() {
                return Err(self.error_here("expected '}', found end of input"));
            }
            if self.eat(&Token::Semi) {
                continue;
            }
            let stmt = match self.peek() {
                Some(Token::Const | Token::Let) => {
                    self.pos += 1;
                    let name = match self.advance() {
                        Some(Spanned {
                            token: Token::Ident(name),
                            ..
                        }) => name,
                        _ => {
                            self.pos -= 1;
                            return Err(self.error_here("expected variable name"));
                        }
                    };
                    self.expect(Token::Eq)?;
                    let value = self.parse_expr()?;
                    Stmt::Let { name, value }
                }
                Some(Token::Return) => {
                    self.pos += 1;
                    if matches!(self.peek(), Some(Token::Semi | Token::RBrace)) {
                        Stmt::Return(None)
                    } else {
                        Stmt::Return(Some(self.parse_expr()?))
                    }
                }
                _ => Stmt::Expr(self.parse_expr()?),
            };
            stmts.push(stmt);
            if !self.eat(&Token::Semi) && self.peek() != Some(&Token::RBrace) {
                return Err(self.unexpected());
            }
        }
        Ok(stmts)
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let test = self.parse_nullish()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.parse_expr()?;
        self.expect(Token::Colon)?;
        let alternate = self.parse_expr()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_nullish(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_or()?;
        while self.eat(&Token::Nullish) {
            let right = self.parse_or()?;
            left = logical(left, LogicalOp::Nullish, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = logical(left, LogicalOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = logical(left, LogicalOp::And, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNotEq) => BinaryOp::StrictNotEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                Some(Token::In) => BinaryOp::In,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_exponent()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_exponent(&mut self) -> ParseResult<Expr> {
        let base = self.parse_unary()?;
        if !self.eat(&Token::StarStar) {
            return Ok(base);
        }
        self.enter()?;
        let exponent = self.parse_exponent();
        self.leave();
        Ok(binary(base, BinaryOp::Pow, exponent?))
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Typeof) => UnaryOp::Typeof,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        // Each postfix operation nests the tree one level deeper.
        let mut chain = 0;
        loop {
            if matches!(
                self.peek(),
                Some(Token::Dot | Token::QuestionDot | Token::LBracket | Token::LParen)
            ) {
                self.enter()?;
                chain += 1;
            }
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    expr = self.parse_member_name(expr, false)?;
                }
                Some(Token::QuestionDot) => {
                    self.pos += 1;
                    expr = match self.peek() {
                        Some(Token::LParen) => {
                            self.pos += 1;
                            let args = self.parse_elements(Token::RParen)?;
                            Expr::Call {
                                callee: Box::new(expr),
                                args,
                                optional: true,
                            }
                        }
                        Some(Token::LBracket) => {
                            self.pos += 1;
                            let index = self.parse_expr()?;
                            self.expect(Token::RBracket)?;
                            Expr::Index {
                                object: Box::new(expr),
                                index: Box::new(index),
                                optional: true,
                            }
                        }
                        _ => self.parse_member_name(expr, true)?,
                    };
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    };
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let args = self.parse_elements(Token::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: false,
                    };
                }
                _ => break,
            }
        }
        self.depth -= chain;
        Ok(expr)
    }

    /// Parse the name after `.` or `?.`.
    ///
    /// Numeric names (`$input.0`) become string properties; a lexed decimal
    /// such as `0.1` in `$input.0.1` is split back into two accesses.
    fn parse_member_name(&mut self, object: Expr, optional: bool) -> ParseResult<Expr> {
        let Some(tok) = self.advance() else {
            return Err(self.error_here("expected property name, found end of input"));
        };
        if let Token::Number(_) = tok.token {
            let text = &self.source[tok.span.clone()];
            let mut expr = object;
            let mut first = true;
            for part in text.split('.') {
                if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                    self.pos -= 1;
                    return Err(self.error_here(&format!("invalid property name '{text}'")));
                }
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: part.to_string(),
                    optional: optional && first,
                };
                first = false;
            }
            return Ok(expr);
        }
        match token_as_name(&tok.token) {
            Some(property) => Ok(Expr::Member {
                object: Box::new(object),
                property,
                optional,
            }),
            None => {
                self.pos -= 1;
                Err(self.error_here(&format!("expected property name, found '{}'", tok.token)))
            }
        }
    }

    /// Parse comma-separated elements (array items or call arguments) up to
    /// and including `close`. Trailing commas are allowed.
    fn parse_elements(&mut self, close: Token) -> ParseResult<Vec<Element>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                break;
            }
            let item = if self.eat(&Token::Ellipsis) {
                Element::Spread(self.parse_expr()?)
            } else {
                Element::Item(self.parse_expr()?)
            };
            items.push(item);
            if !self.eat(&Token::Comma) && self.peek() != Some(&close) {
                return Err(match self.peek() {
                    Some(found) => self.error_here(&format!("expected ',' or '{close}', found '{found}'")),
                    None => self.error_here(&format!("expected '{close}', found end of input")),
                });
            }
        }
        Ok(items)
    }

    fn parse_object(&mut self) -> ParseResult<Expr> {
        let mut props = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            if self.eat(&Token::Ellipsis) {
                props.push(Property::Spread(self.parse_expr()?));
            } else {
                let Some(tok) = self.advance() else {
                    return Err(self.error_here("expected '}', found end of input"));
                };
                let (key, shorthand) = match tok.token {
                    Token::String(s) => (PropertyKey::Static(s), None),
                    Token::Number(n) => (PropertyKey::Static(format_number(n)), None),
                    Token::LBracket => {
                        let key = self.parse_expr()?;
                        self.expect(Token::RBracket)?;
                        (PropertyKey::Computed(key), None)
                    }
                    Token::Ident(name) => (PropertyKey::Static(name.clone()), Some(name)),
                    ref other => match token_as_name(other) {
                        Some(name) => (PropertyKey::Static(name), None),
                        None => {
                            self.pos -= 1;
                            return Err(self.unexpected());
                        }
                    },
                };
                let value = if self.eat(&Token::Colon) {
                    self.parse_expr()?
                } else if let Some(name) = shorthand {
                    Expr::Ident(name)
                } else {
                    return Err(self.error_here("expected ':' after property key"));
                };
                props.push(Property::KeyValue(key, value));
            }
            if !self.eat(&Token::Comma) && self.peek() != Some(&Token::RBrace) {
                return Err(self.unexpected());
            }
        }
        Ok(Expr::Object(props))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let Some(tok) = self.advance() else {
            return Err(self.error_here("unexpected end of input"));
        };
        match tok.token {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::String(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::True => Ok(Expr::Literal(Literal::Bool(true))),
            Token::False => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Null => Ok(Expr::Literal(Literal::Null)),
            Token::Undefined => Ok(Expr::Literal(Literal::Undefined)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.enter()?;
                let items = self.parse_elements(Token::RBracket);
                self.leave();
                Ok(Expr::Array(items?))
            }
            Token::LBrace => {
                self.enter()?;
                let object = self.parse_object();
                self.leave();
                object
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    Expr::Logical {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Identifiers and keywords are both valid property names after `.`.
fn token_as_name(token: &Token) -> Option<String> {
    match token {
        Token::Ident(name) => Some(name.clone()),
        Token::Const
        | Token::Let
        | Token::Return
        | Token::Typeof
        | Token::In
        | Token::True
        | Token::False
        | Token::Null
        | Token::Undefined => Some(token.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::sexpr::format_expr;

    fn sexpr(source: &str) -> String {
        format_expr(&parse(source).expect("parse should succeed"))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(sexpr("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(sexpr("(1 + 2) * 3"), "(* (+ 1 2) 3)");
        assert_eq!(sexpr("2 ** 3 ** 2"), "(** 2 (** 3 2))");
    }

    #[test]
    fn test_arrow_single_param() {
        assert_eq!(sexpr("i => i * 2"), "(=> (i) (* i 2))");
    }

    #[test]
    fn test_arrow_paren_params() {
        assert_eq!(sexpr("(a, b) => a + b"), "(=> (a b) (+ a b))");
        assert_eq!(sexpr("() => 1"), "(=> () 1)");
    }

    #[test]
    fn test_parenthesized_is_not_arrow() {
        assert_eq!(sexpr("(a)"), "a");
    }

    #[test]
    fn test_numeric_member_split() {
        assert_eq!(sexpr("$input.0.1"), "(. (. $input 0) 1)");
    }

    #[test]
    fn test_trailing_semicolon() {
        assert_eq!(sexpr("$input;;"), "$input");
    }

    #[test]
    fn test_unbalanced() {
        assert!(parse("$input.map(i => i").is_err());
        assert!(parse("(").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_NESTING + 10), ")".repeat(MAX_NESTING + 10));
        let err = parse(&deep).expect_err("should hit nesting limit");
        assert!(err.message.contains("nested too deeply"));
    }
}
