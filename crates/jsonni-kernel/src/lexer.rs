//! Lexer for jsonni query expressions.
//!
//! Converts query text into a stream of tokens using the logos lexer
//! generator. The token set covers the small JavaScript-like expression
//! language accepted by every dialect: literals, identifiers (including
//! `$input` and `_`), member access, calls, arrow functions and the usual
//! arithmetic, comparison and logical operators.
//!
//! # Token Categories
//!
//! - **Keywords**: `const`, `let`, `return`, `typeof`, `in`
//! - **Literals**: strings (single or double quoted), numbers, `true`,
//!   `false`, `null`, `undefined`
//! - **Operators**: `=>`, `...`, `?.`, `??`, `===`, `!==`, `==`, `!=`, `<=`,
//!   `>=`, `&&`, `||`, `**`, and the single-character operators
//! - **Punctuation**: `(`, `)`, `[`, `]`, `{`, `}`, `,`, `:`, `;`, `.`
//! - **Identifiers**: `[A-Za-z_$][A-Za-z0-9_$]*`

use logos::{Logos, Span};
use std::fmt;

/// A token with its span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    InvalidEscape(String),
    InvalidNumber,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexerError::UnterminatedString => write!(f, "unterminated string"),
            LexerError::InvalidEscape(seq) => write!(f, "invalid escape sequence: \\{seq}"),
            LexerError::InvalidNumber => write!(f, "invalid number"),
        }
    }
}

impl std::error::Error for LexerError {}

/// Tokens produced by the query lexer.
///
/// Keywords are declared with `#[token]` so they win over the identifier
/// regex on equal-length matches; longer identifiers such as `constant` still
/// lex as identifiers.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // ═══════════════════════════════════════════════════════════════════
    // Keywords
    // ═══════════════════════════════════════════════════════════════════
    #[token("const")]
    Const,

    #[token("let")]
    Let,

    #[token("return")]
    Return,

    #[token("typeof")]
    Typeof,

    #[token("in")]
    In,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    #[token("undefined")]
    Undefined,

    // ═══════════════════════════════════════════════════════════════════
    // Multi-character operators
    // ═══════════════════════════════════════════════════════════════════
    #[token("=>")]
    Arrow,

    #[token("...")]
    Ellipsis,

    #[token("?.")]
    QuestionDot,

    #[token("??")]
    Nullish,

    #[token("===")]
    StrictEq,

    #[token("!==")]
    StrictNotEq,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LtEq,

    #[token(">=")]
    GtEq,

    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("**")]
    StarStar,

    // ═══════════════════════════════════════════════════════════════════
    // Single-character operators
    // ═══════════════════════════════════════════════════════════════════
    #[token("=")]
    Eq,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("!")]
    Bang,

    #[token("?")]
    Question,

    // ═══════════════════════════════════════════════════════════════════
    // Punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token(":")]
    Colon,

    #[token(";")]
    Semi,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    // ═══════════════════════════════════════════════════════════════════
    // Literals (with values)
    // ═══════════════════════════════════════════════════════════════════
    /// Quoted string - value is the content with quotes removed and escapes processed
    #[regex(r#""([^"\\\n]|\\.)*""#, lex_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", lex_string)]
    String(String),

    /// Numeric literal - integers, decimals and exponents all become f64
    #[regex(r"[0-9]+", lex_number)]
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", lex_number)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", lex_number)]
    #[regex(r"0[xX][0-9a-fA-F]+", lex_hex)]
    Number(f64),

    /// Unterminated string literal, reported as an error
    #[regex(r#""([^"\\\n]|\\.)*"#, lex_unterminated, priority = 1)]
    #[regex(r"'([^'\\\n]|\\.)*", lex_unterminated, priority = 1)]
    Unterminated,

    // ═══════════════════════════════════════════════════════════════════
    // Identifiers
    // ═══════════════════════════════════════════════════════════════════
    /// Identifier - includes `$input` and `_`
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", lex_ident)]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Const => "const",
            Token::Let => "let",
            Token::Return => "return",
            Token::Typeof => "typeof",
            Token::In => "in",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Undefined => "undefined",
            Token::Arrow => "=>",
            Token::Ellipsis => "...",
            Token::QuestionDot => "?.",
            Token::Nullish => "??",
            Token::StrictEq => "===",
            Token::StrictNotEq => "!==",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::StarStar => "**",
            Token::Eq => "=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Semi => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Unterminated => "<unterminated string>",
            Token::String(s) => return write!(f, "{s:?}"),
            Token::Number(n) => return write!(f, "{n}"),
            Token::Ident(name) => return write!(f, "{name}"),
        };
        f.write_str(text)
    }
}

/// Lex a quoted string literal, processing escape sequences.
fn lex_string(lex: &mut logos::Lexer<Token>) -> Result<String, LexerError> {
    let s = lex.slice();
    unescape(&s[1..s.len() - 1])
}

fn lex_number(lex: &mut logos::Lexer<Token>) -> Result<f64, LexerError> {
    lex.slice().parse().map_err(|_| LexerError::InvalidNumber)
}

fn lex_hex(lex: &mut logos::Lexer<Token>) -> Result<f64, LexerError> {
    u64::from_str_radix(&lex.slice()[2..], 16)
        .map(|n| n as f64)
        .map_err(|_| LexerError::InvalidNumber)
}

fn lex_ident(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice().to_string()
}

/// Always fails: a quote that never closes on the same line.
fn lex_unterminated(_lex: &mut logos::Lexer<Token>) -> Result<(), LexerError> {
    Err(LexerError::UnterminatedString)
}

/// Process JavaScript-style escape sequences.
///
/// Handles `\n`, `\t`, `\r`, `\b`, `\f`, `\v`, `\0`, `\xHH`, `\uHHHH` and
/// `\u{H..}`. Any other escaped character stands for itself (`\'` → `'`),
/// which is also how the `--indent` and delimiter options are decoded.
pub fn unescape(s: &str) -> Result<String, LexerError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(esc) = chars.next() else {
            // Trailing lone backslash is kept literally
            out.push('\\');
            break;
        };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'v' => out.push('\u{000B}'),
            '0' => out.push('\0'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                out.push(hex_char(&hex, "x")?);
            }
            'u' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut hex = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        hex.push(c);
                    }
                    out.push(hex_char(&hex, "u{")?);
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    out.push(hex_char(&hex, "u")?);
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn hex_char(hex: &str, prefix: &str) -> Result<char, LexerError> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| LexerError::InvalidEscape(format!("{prefix}{hex}")))
}

/// Tokenize a query string.
///
/// Whitespace is skipped. All lexer errors are collected with their
/// positions so the caller can report the first one.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, Vec<Spanned<LexerError>>> {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, span) in lexer.spanned() {
        match result {
            // `c ?.5 : 1` is a conditional with a fraction, not optional chaining
            Ok(Token::Number(_)) if follows_question_dot(&tokens, &span) => {
                let dot = span.start - 1;
                if let Some(last) = tokens.last_mut() {
                    *last = Spanned::new(Token::Question, last.span.start..dot);
                }
                match format!("0{}", &source[dot..span.end]).parse() {
                    Ok(n) => tokens.push(Spanned::new(Token::Number(n), dot..span.end)),
                    Err(_) => errors.push(Spanned::new(LexerError::InvalidNumber, dot..span.end)),
                }
            }
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(err) => errors.push(Spanned::new(err, span)),
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

fn follows_question_dot(tokens: &[Spanned<Token>], number: &Span) -> bool {
    tokens
        .last()
        .is_some_and(|prev| prev.token == Token::QuestionDot && prev.span.end == number.start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn keywords_beat_identifiers() {
        assert_eq!(lex("const"), vec![Token::Const]);
        assert_eq!(lex("constant"), vec![Token::Ident("constant".into())]);
    }

    #[test]
    fn dollar_identifiers() {
        assert_eq!(lex("$input"), vec![Token::Ident("$input".into())]);
        assert_eq!(lex("_"), vec![Token::Ident("_".into())]);
    }

    #[test]
    fn numeric_member_access_splits() {
        assert_eq!(
            lex("$input.0._id"),
            vec![
                Token::Ident("$input".into()),
                Token::Dot,
                Token::Number(0.0),
                Token::Dot,
                Token::Ident("_id".into()),
            ]
        );
    }

    #[test]
    fn question_dot_before_digit_is_conditional() {
        assert_eq!(
            lex("a?.5:1"),
            vec![
                Token::Ident("a".into()),
                Token::Question,
                Token::Number(0.5),
                Token::Colon,
                Token::Number(1.0),
            ]
        );
        assert_eq!(
            lex("a?.b"),
            vec![Token::Ident("a".into()), Token::QuestionDot, Token::Ident("b".into())]
        );
        assert_eq!(lex("x?.5e1")[2], Token::Number(5.0));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(lex(r#""a\nb""#), vec![Token::String("a\nb".into())]);
        assert_eq!(lex(r"'it\'s'"), vec![Token::String("it's".into())]);
        assert_eq!(lex(r#""A\x42""#), vec![Token::String("AB".into())]);
    }

    #[test]
    fn unterminated_string_is_error() {
        assert!(tokenize("'abc").is_err());
    }

    #[test]
    fn unescape_indent() {
        assert_eq!(unescape(r"\t\t").expect("valid"), "\t\t");
        assert_eq!(unescape("  ").expect("valid"), "  ");
        assert!(unescape(r"\uZZZZ").is_err());
    }
}
