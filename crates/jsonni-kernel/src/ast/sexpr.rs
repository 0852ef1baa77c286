//! S-expression formatter for the query AST.
//!
//! Gives parser tests a compact, stable rendering to compare against.

use super::types::*;

/// Format an expression as an S-expression.
pub fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => format_literal(lit),
        Expr::Ident(name) => name.clone(),
        Expr::Array(items) => {
            let parts: Vec<String> = items.iter().map(format_element).collect();
            if parts.is_empty() {
                "(array)".to_string()
            } else {
                format!("(array {})", parts.join(" "))
            }
        }
        Expr::Object(props) => {
            let parts: Vec<String> = props.iter().map(format_property).collect();
            if parts.is_empty() {
                "(object)".to_string()
            } else {
                format!("(object {})", parts.join(" "))
            }
        }
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let head = if *optional { "?." } else { "." };
            format!("({head} {} {property})", format_expr(object))
        }
        Expr::Index {
            object,
            index,
            optional,
        } => {
            let head = if *optional { "?[]" } else { "[]" };
            format!("({head} {} {})", format_expr(object), format_expr(index))
        }
        Expr::Call {
            callee,
            args,
            optional,
        } => {
            let head = if *optional { "call?" } else { "call" };
            let mut parts = vec![format_expr(callee)];
            parts.extend(args.iter().map(format_element));
            format!("({head} {})", parts.join(" "))
        }
        Expr::Unary { op, operand } => format!("({op} {})", format_expr(operand)),
        Expr::Binary { left, op, right } => {
            format!("({op} {} {})", format_expr(left), format_expr(right))
        }
        Expr::Logical { left, op, right } => {
            format!("({op} {} {})", format_expr(left), format_expr(right))
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => format!(
            "(if {} {} {})",
            format_expr(test),
            format_expr(consequent),
            format_expr(alternate)
        ),
        Expr::Arrow(lambda) => {
            let params = lambda.params.join(" ");
            let body = match &lambda.body {
                Body::Expr(e) => format_expr(e),
                Body::Block(stmts) => {
                    let parts: Vec<String> = stmts.iter().map(format_stmt).collect();
                    format!("(block {})", parts.join(" "))
                }
            };
            format!("(=> ({params}) {body})")
        }
    }
}

fn format_literal(lit: &Literal) -> String {
    match lit {
        Literal::Undefined => "undefined".to_string(),
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Number(n) => n.to_string(),
        Literal::String(s) => format!("{s:?}"),
    }
}

fn format_element(el: &Element) -> String {
    match el {
        Element::Item(e) => format_expr(e),
        Element::Spread(e) => format!("(... {})", format_expr(e)),
    }
}

fn format_property(prop: &Property) -> String {
    match prop {
        Property::KeyValue(PropertyKey::Static(k), v) => format!("({k} {})", format_expr(v)),
        Property::KeyValue(PropertyKey::Computed(k), v) => {
            format!("([{}] {})", format_expr(k), format_expr(v))
        }
        Property::Spread(e) => format!("(... {})", format_expr(e)),
    }
}

fn format_stmt(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Let { name, value } => format!("(let {name} {})", format_expr(value)),
        Stmt::Return(Some(e)) => format!("(return {})", format_expr(e)),
        Stmt::Return(None) => "(return)".to_string(),
        Stmt::Expr(e) => format_expr(e),
    }
}
