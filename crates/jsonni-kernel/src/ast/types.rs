//! AST type definitions.

use std::fmt;
use std::rc::Rc;

/// A literal scalar written in the query text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// An expression in the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Scalar literal: `1`, `"a"`, `true`, `null`
    Literal(Literal),
    /// Name lookup: `$input`, `_`, `from`, lambda parameters
    Ident(String),
    /// Array literal: `[a, ...rest]`
    Array(Vec<Element>),
    /// Object literal: `{a: 1, "b": 2, [k]: v, c, ...rest}`
    Object(Vec<Property>),
    /// Static member access: `a.b`, `a.0`, `a?.b`
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    /// Computed member access: `a[expr]`, `a?.[expr]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    /// Call: `f(a, ...b)`, `a.b(c)`, `f?.(x)`
    Call {
        callee: Box<Expr>,
        args: Vec<Element>,
        optional: bool,
    },
    /// Prefix operator: `!a`, `-a`, `+a`, `typeof a`
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Arithmetic, comparison and equality operators
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Short-circuit operators: `&&`, `||`, `??`
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    /// Ternary: `test ? a : b`
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Arrow function: `x => x * 2`, `(a, b) => { return a + b; }`
    Arrow(Rc<Lambda>),
}

/// An array element or call argument, possibly spread.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Item(Expr),
    Spread(Expr),
}

/// An object literal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// `key: value` (shorthand `key` is desugared to `key: key`)
    KeyValue(PropertyKey, Expr),
    /// `...expr`
    Spread(Expr),
}

/// Object literal key.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Static(String),
    Computed(Expr),
}

/// Arrow function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Body,
}

/// Arrow function body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Concise body: `x => expr`
    Expr(Expr),
    /// Block body: `x => { const y = x; return y; }`
    Block(Vec<Stmt>),
}

/// A statement inside an arrow function block body.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `const name = value;` or `let name = value;`
    Let { name: String, value: Expr },
    /// `return;` or `return expr;`
    Return(Option<Expr>),
    /// Expression evaluated for its value and discarded
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Typeof => "typeof",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::In => "in",
        })
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Nullish => "??",
        })
    }
}

impl Expr {
    /// Short source-like description used in error messages,
    /// e.g. `$input.foo` in "$input.foo is not a function".
    pub fn describe(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::Member {
                object, property, ..
            } => format!("{}.{}", object.describe(), property),
            Expr::Index { object, .. } => format!("{}[...]", object.describe()),
            Expr::Call { callee, .. } => format!("{}(...)", callee.describe()),
            Expr::Literal(Literal::String(s)) => format!("{s:?}"),
            Expr::Literal(_) => "literal".to_string(),
            Expr::Arrow(_) => "(anonymous)".to_string(),
            _ => "expression".to_string(),
        }
    }

    /// True if the expression is built only from literals, array and object
    /// literals and negated numbers. Used to accept relaxed data literals
    /// as input without evaluating arbitrary code.
    pub fn is_data_literal(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Unary {
                op: UnaryOp::Neg | UnaryOp::Plus,
                operand,
            } => matches!(operand.as_ref(), Expr::Literal(Literal::Number(_))),
            Expr::Array(items) => items
                .iter()
                .all(|e| matches!(e, Element::Item(inner) if inner.is_data_literal())),
            Expr::Object(props) => props.iter().all(|p| {
                matches!(p, Property::KeyValue(PropertyKey::Static(_), value) if value.is_data_literal())
            }),
            _ => false,
        }
    }
}
