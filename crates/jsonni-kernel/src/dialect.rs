//! Query classification.
//!
//! A query belongs to exactly one dialect, decided by ordered prefix
//! matching on the trimmed text:
//!
//! 1. empty or exactly `$input` → [`Dialect::Identity`]
//! 2. starts with `$input` → [`Dialect::Native`]
//! 3. starts with `_.` → [`Dialect::Utility`]
//! 4. starts with `from` → [`Dialect::Sequence`]
//!
//! Anything else is not a query. The dialect decides which capability is
//! bound next to `$input`: nothing, `_` or `from`.

use std::fmt;

use crate::ast::Expr;
use crate::capabilities::{self, FROM, UTILITY};
use crate::interpreter::{EvalResult, Evaluator, INPUT, Limits, Scope};
use crate::parser;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Return the input unchanged.
    Identity,
    /// Plain expression over `$input`.
    Native,
    /// `_.` utility namespace.
    Utility,
    /// `from(...)` sequence builder.
    Sequence,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Identity => "identity",
            Dialect::Native => "native",
            Dialect::Utility => "utility",
            Dialect::Sequence => "sequence",
        })
    }
}

/// Trim surrounding whitespace, then any trailing semicolons.
pub fn normalize(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

impl Dialect {
    /// Classify a query, or `None` if no dialect accepts it.
    pub fn classify(query: &str) -> Option<Dialect> {
        let query = normalize(query);
        if query.is_empty() || query == INPUT {
            Some(Dialect::Identity)
        } else if query.starts_with(INPUT) {
            Some(Dialect::Native)
        } else if query.starts_with("_.") {
            Some(Dialect::Utility)
        } else if query.starts_with(FROM) {
            Some(Dialect::Sequence)
        } else {
            None
        }
    }
}

/// A classified and parsed query, ready to evaluate.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub dialect: Dialect,
    pub expr: Expr,
    /// Unwrap a `_.chain(...)` result, as if `.value()` had been appended.
    pub unwrap_chain: bool,
}

impl QueryPlan {
    /// Classify and parse `query`.
    ///
    /// Returns `Ok(None)` for an unsupported query and a `SyntaxError` if
    /// the query classifies but does not parse.
    pub fn build(query: &str) -> EvalResult<Option<QueryPlan>> {
        let Some(dialect) = Dialect::classify(query) else {
            return Ok(None);
        };
        let text = normalize(query);
        let expr = match dialect {
            Dialect::Identity => Expr::Ident(INPUT.to_string()),
            _ => parser::parse(text)?,
        };
        Ok(Some(QueryPlan {
            dialect,
            expr,
            unwrap_chain: dialect == Dialect::Utility && text.starts_with("_.chain("),
        }))
    }

    /// Evaluate the plan against `input`.
    #[tracing::instrument(level = "debug", skip_all, fields(dialect = %self.dialect))]
    pub fn evaluate(&self, input: Value, limits: &Limits) -> EvalResult<Value> {
        let mut scope = Scope::with_input(input);
        match self.dialect {
            Dialect::Utility => scope = scope.bind(UTILITY, capabilities::utility_namespace()),
            Dialect::Sequence => scope = scope.bind(FROM, capabilities::from_function()),
            Dialect::Identity | Dialect::Native => {}
        }

        let mut ev = Evaluator::new(*limits);
        let value = ev.eval(&self.expr, &scope)?;
        tracing::debug!(steps = ev.steps(), "query evaluated");

        let value = match value {
            Value::Chain(inner) if self.unwrap_chain => inner.as_ref().clone(),
            other => other,
        };
        // Output expands shared subtrees; pay for them before formatting
        ev.charge_repeats(&value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_order() {
        assert_eq!(Dialect::classify(""), Some(Dialect::Identity));
        assert_eq!(Dialect::classify("  $input ;"), Some(Dialect::Identity));
        assert_eq!(Dialect::classify("$input.map(i => i)"), Some(Dialect::Native));
        assert_eq!(Dialect::classify("_.map($input, 'a')"), Some(Dialect::Utility));
        assert_eq!(Dialect::classify("from($input)"), Some(Dialect::Sequence));
        assert_eq!(Dialect::classify("foo"), None);
        assert_eq!(Dialect::classify("Math.max(1, 2)"), None);
    }

    #[test]
    fn test_chain_unwrap_flag() {
        let plan = QueryPlan::build("_.chain($input).map('a');").unwrap().unwrap();
        assert!(plan.unwrap_chain);
        let plan = QueryPlan::build("_.map($input, 'a')").unwrap().unwrap();
        assert!(!plan.unwrap_chain);
    }

    #[test]
    fn test_syntax_error_after_classification() {
        let err = QueryPlan::build("$input.map(").unwrap_err();
        assert!(err.to_string().starts_with("SyntaxError:"));
    }
}
