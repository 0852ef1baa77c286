//! Expression evaluation.
//!
//! The evaluator reduces AST expressions to [`Value`]s. Names resolve
//! through the [`Scope`] and then the intrinsic globals; method calls are
//! dispatched by receiver: namespaces and chains go to the capability
//! modules, everything else to the native JavaScript-like methods.
//!
//! Every evaluation step is charged against a step budget and nesting is
//! bounded, so hostile queries end with an error instead of hanging or
//! overflowing the stack.

use std::rc::Rc;

use serde::Deserialize;
use thiserror::Error;

use crate::ast::{BinaryOp, Body, Element, Expr, Literal, LogicalOp, Property, PropertyKey, Stmt, UnaryOp};
use crate::capabilities::{self, intrinsics, sequence, utility};
use crate::parser::ParseError;
use crate::value::{Closure, Footprint, Function, Namespace, Object, Value};

use super::natives;
use super::scope::Scope;

/// Errors raised while evaluating a query.
///
/// Messages follow the `Kind: detail` form of JavaScript errors so they read
/// the same whichever dialect produced them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),
    #[error("TypeError: {0} is not a function")]
    NotFunction(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("RangeError: {0}")]
    Range(String),
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,
    #[error("RangeError: query exceeded the limit of {0} evaluation steps")]
    StepLimit(u64),
}

impl From<ParseError> for EvalError {
    fn from(err: ParseError) -> Self {
        EvalError::Syntax(err.to_string())
    }
}

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Deepest array/object nesting that may be converted to text or JSON.
pub const MAX_VALUE_DEPTH: usize = 512;

/// Resource limits for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Evaluation steps before the query is aborted.
    pub max_steps: u64,
    /// Nested evaluation frames before `RangeError`.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 10_000_000,
            max_depth: 256,
        }
    }
}

/// Expression evaluator.
pub struct Evaluator {
    limits: Limits,
    steps: u64,
    depth: usize,
}

impl Evaluator {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            steps: 0,
            depth: 0,
        }
    }

    /// Steps consumed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Evaluate `expr` with `$input` bound to `input`.
    pub fn evaluate(&mut self, expr: &Expr, input: Value) -> EvalResult<Value> {
        let scope = Scope::with_input(input);
        self.eval(expr, &scope)
    }

    /// Charge `n` steps against the budget.
    ///
    /// Capabilities call this before work proportional to their output,
    /// e.g. `_.range(n)` or `"x".repeat(n)`.
    pub fn charge(&mut self, n: u64) -> EvalResult<()> {
        self.steps = self.steps.saturating_add(n);
        if self.steps > self.limits.max_steps {
            tracing::debug!(steps = self.steps, "step limit exceeded");
            return Err(EvalError::StepLimit(self.limits.max_steps));
        }
        Ok(())
    }

    /// Charge for writing `value` out in full as text, before doing it.
    ///
    /// Fails without expanding the value when its footprint exceeds the
    /// remaining budget or it is nested deeper than output can follow.
    pub fn charge_footprint(&mut self, value: &Value) -> EvalResult<()> {
        let footprint = value.footprint(self.remaining());
        self.charge_measured(footprint, 1)
    }

    /// Like [`charge_footprint`](Self::charge_footprint), scaled for output
    /// that repeats `per_level` bytes of indentation at every nesting level.
    pub fn charge_indented(&mut self, value: &Value, per_level: usize) -> EvalResult<()> {
        let footprint = value.footprint(self.remaining());
        let scale = 1 + (per_level as u64).saturating_mul(footprint.depth as u64);
        self.charge_measured(footprint, scale)
    }

    /// Charge only for subtrees that occur more than once in `value`.
    ///
    /// Serializing a result costs this much beyond the memory it already
    /// holds.
    pub fn charge_repeats(&mut self, value: &Value) -> EvalResult<()> {
        let footprint = value.repeated_footprint(self.remaining());
        self.charge_measured(footprint, 1)
    }

    fn remaining(&self) -> u64 {
        self.limits.max_steps.saturating_sub(self.steps).saturating_add(1)
    }

    fn charge_measured(&mut self, footprint: Footprint, scale: u64) -> EvalResult<()> {
        if footprint.depth > MAX_VALUE_DEPTH {
            return Err(EvalError::Range(format!(
                "value nested deeper than {MAX_VALUE_DEPTH} levels"
            )));
        }
        self.charge(footprint.units.saturating_mul(scale))
    }

    fn enter(&mut self) -> EvalResult<()> {
        if self.depth >= self.limits.max_depth {
            return Err(EvalError::StackOverflow);
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Evaluate an expression to a value.
    pub fn eval(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        self.charge(1)?;
        self.enter()?;
        let result = self.eval_inner(expr, scope);
        self.leave();
        result
    }

    fn eval_inner(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Ident(name) => lookup(name, scope),
            Expr::Array(items) => Ok(Value::from(self.eval_elements(items, scope)?)),
            Expr::Object(props) => self.eval_object(props, scope),
            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or_default())
            }
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { left, op, right } => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                if converts_to_text(*op, &l, &r) {
                    self.charge_footprint(&l)?;
                    self.charge_footprint(&r)?;
                }
                binary(*op, &l, &r)
            }
            Expr::Logical { left, op, right } => {
                let l = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Arrow(lambda) => Ok(Value::Function(Function::Closure(Rc::new(Closure {
                lambda: Rc::clone(lambda),
                scope: scope.clone(),
            })))),
        }
    }

    /// Evaluate a member/index/call chain.
    ///
    /// `None` means an optional link (`?.`) short-circuited the rest of the
    /// chain, which then evaluates to `undefined`.
    fn eval_chain(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Option<Value>> {
        self.charge(1)?;
        self.enter()?;
        let result = self.eval_chain_inner(expr, scope);
        self.leave();
        result
    }

    fn eval_chain_inner(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Option<Value>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if target.is_nullish() {
                    return if *optional {
                        Ok(None)
                    } else {
                        Err(cannot_read(&target, property))
                    };
                }
                Ok(Some(target.get_property(property)))
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let Some(target) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if target.is_nullish() && *optional {
                    return Ok(None);
                }
                let key = self.property_key(index, scope)?;
                if target.is_nullish() {
                    return Err(cannot_read(&target, &key));
                }
                Ok(Some(target.get_property(&key)))
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, scope),
            other => self.eval(other, scope).map(Some),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Element],
        optional: bool,
        scope: &Scope,
    ) -> EvalResult<Option<Value>> {
        let method = match callee {
            Expr::Member {
                object,
                property,
                optional: member_optional,
            } => Some((object, None, property.as_str(), *member_optional)),
            Expr::Index {
                object,
                index,
                optional: member_optional,
            } => Some((object, Some(index), "", *member_optional)),
            _ => None,
        };

        let Some((object, index, property, member_optional)) = method else {
            let Some(function) = self.eval_chain(callee, scope)? else {
                return Ok(None);
            };
            if optional && function.is_nullish() {
                return Ok(None);
            }
            let args = self.eval_elements(args, scope)?;
            return self.call(&function, args, &callee.describe()).map(Some);
        };

        let Some(target) = self.eval_chain(object, scope)? else {
            return Ok(None);
        };
        if target.is_nullish() && member_optional {
            return Ok(None);
        }
        let name = match index {
            Some(index) => self.property_key(index, scope)?,
            None => property.to_string(),
        };
        if target.is_nullish() {
            return Err(cannot_read(&target, &name));
        }
        let args = self.eval_elements(args, scope)?;
        match self.call_method(&target, &name, args, &callee.describe()) {
            Err(EvalError::NotFunction(_)) if optional => Ok(None),
            other => other.map(Some),
        }
    }

    /// Call a method on a receiver: `target.name(args)`.
    pub fn call_method(
        &mut self,
        target: &Value,
        name: &str,
        args: Vec<Value>,
        describe: &str,
    ) -> EvalResult<Value> {
        let not_function = || EvalError::NotFunction(describe.to_string());
        match target {
            Value::Namespace(ns) => {
                capabilities::call_namespace(self, *ns, name, args)?.ok_or_else(not_function)
            }
            Value::Chain(inner) => {
                utility::call_chain(self, inner, name, args)?.ok_or_else(not_function)
            }
            Value::Sequence(seq) => {
                sequence::call_method(self, seq, name, args)?.ok_or_else(not_function)
            }
            Value::Object(map) if map.contains_key(name) => {
                let function = map.get(name).cloned().unwrap_or_default();
                if function.is_callable() {
                    self.call(&function, args, describe)
                } else {
                    Err(not_function())
                }
            }
            _ => natives::call_method(self, target, name, args)?.ok_or_else(not_function),
        }
    }

    /// Call a function value.
    pub fn call(&mut self, function: &Value, args: Vec<Value>, describe: &str) -> EvalResult<Value> {
        match function {
            Value::Function(Function::Closure(closure)) => self.call_closure(closure, args),
            Value::Function(Function::Builtin(builtin)) => {
                capabilities::call_namespace(self, builtin.namespace, builtin.name, args)?
                    .ok_or_else(|| EvalError::NotFunction(describe.to_string()))
            }
            // `_(value)` starts an implicit chain
            Value::Namespace(Namespace::Utility) => Ok(Value::Chain(Rc::new(
                args.into_iter().next().unwrap_or_default(),
            ))),
            _ => Err(EvalError::NotFunction(describe.to_string())),
        }
    }

    /// Call a callback passed to a builtin.
    pub fn invoke(&mut self, function: &Value, args: Vec<Value>) -> EvalResult<Value> {
        self.call(function, args, &function.to_display_string())
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> EvalResult<Value> {
        self.enter()?;
        let mut scope = closure.scope.clone();
        let mut args = args.into_iter();
        for param in &closure.lambda.params {
            scope = scope.bind(param.clone(), args.next().unwrap_or_default());
        }
        let result = match &closure.lambda.body {
            Body::Expr(expr) => self.eval(expr, &scope),
            Body::Block(stmts) => self.exec_block(stmts, scope),
        };
        self.leave();
        result
    }

    fn exec_block(&mut self, stmts: &[Stmt], mut scope: Scope) -> EvalResult<Value> {
        for stmt in stmts {
            self.charge(1)?;
            match stmt {
                Stmt::Let { name, value } => {
                    let inner = scope.bind(name.clone(), Value::Undefined);
                    let value = self.eval(value, &inner)?;
                    inner.assign_head(value);
                    scope = inner;
                }
                Stmt::Return(Some(expr)) => return self.eval(expr, &scope),
                Stmt::Return(None) => return Ok(Value::Undefined),
                Stmt::Expr(expr) => {
                    self.eval(expr, &scope)?;
                }
            }
        }
        Ok(Value::Undefined)
    }

    /// Collect the values of an iterable: arrays, strings, sequences and
    /// chains.
    pub fn iterate(&mut self, value: &Value, describe: &str) -> EvalResult<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.as_ref().clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Sequence(seq) => sequence::materialize(self, seq),
            Value::Chain(inner) => self.iterate(inner, describe),
            _ => Err(EvalError::Type(format!("{describe} is not iterable"))),
        }
    }

    fn eval_elements(&mut self, items: &[Element], scope: &Scope) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Element::Item(expr) => out.push(self.eval(expr, scope)?),
                Element::Spread(expr) => {
                    let value = self.eval(expr, scope)?;
                    let values = self.iterate(&value, &expr.describe())?;
                    self.charge(values.len() as u64)?;
                    out.extend(values);
                }
            }
        }
        Ok(out)
    }

    fn eval_object(&mut self, props: &[Property], scope: &Scope) -> EvalResult<Value> {
        let mut map = Object::new();
        for prop in props {
            match prop {
                Property::KeyValue(key, expr) => {
                    let key = match key {
                        PropertyKey::Static(name) => name.clone(),
                        PropertyKey::Computed(expr) => self.property_key(expr, scope)?,
                    };
                    let value = self.eval(expr, scope)?;
                    map.insert(key, value);
                }
                Property::Spread(expr) => match self.eval(expr, scope)? {
                    Value::Object(source) => {
                        self.charge(source.len() as u64)?;
                        for (k, v) in source.iter() {
                            map.insert(k.clone(), v.clone());
                        }
                    }
                    Value::Array(items) => {
                        self.charge(items.len() as u64)?;
                        for (i, v) in items.iter().enumerate() {
                            map.insert(i.to_string(), v.clone());
                        }
                    }
                    Value::String(s) => {
                        for (i, c) in s.chars().enumerate() {
                            map.insert(i.to_string(), Value::from(c.to_string()));
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::from(map))
    }

    fn property_key(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<String> {
        let key = self.eval(expr, scope)?;
        if matches!(key, Value::Array(_) | Value::Object(_)) {
            self.charge_footprint(&key)?;
        }
        Ok(key.to_property_key())
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &Scope) -> EvalResult<Value> {
        // `typeof missing` is "undefined" rather than a ReferenceError
        if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, operand)
            && !scope.contains(name)
            && intrinsics::global(name).is_none()
        {
            return Ok(Value::from("undefined"));
        }
        let value = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::Typeof => Value::from(value.type_of()),
        })
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::from(s.as_str()),
    }
}

fn lookup(name: &str, scope: &Scope) -> EvalResult<Value> {
    scope
        .get(name)
        .or_else(|| intrinsics::global(name))
        .ok_or_else(|| EvalError::Reference(name.to_string()))
}

fn cannot_read(target: &Value, key: &str) -> EvalError {
    EvalError::Type(format!(
        "Cannot read properties of {} (reading '{key}')",
        target.to_display_string()
    ))
}

fn is_stringy(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_))
}

/// True when `l op r` builds the string form of an operand: concatenation,
/// loose equality between an array/object and a primitive, or an
/// array/object used as an `in` key.
fn converts_to_text(op: BinaryOp, l: &Value, r: &Value) -> bool {
    let compound = |v: &Value| matches!(v, Value::Array(_) | Value::Object(_));
    let primitive = |v: &Value| matches!(v, Value::Bool(_) | Value::Number(_) | Value::String(_));
    match op {
        BinaryOp::Add => is_stringy(l) || is_stringy(r),
        BinaryOp::Eq | BinaryOp::NotEq => {
            (compound(l) && primitive(r)) || (primitive(l) && compound(r))
        }
        BinaryOp::In => compound(l),
        _ => false,
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> EvalResult<Value> {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(l.to_number(), r.to_number()));
    Ok(match op {
        BinaryOp::Add => {
            if is_stringy(l) || is_stringy(r) {
                Value::from(l.to_display_string() + &r.to_display_string())
            } else {
                num(|a, b| a + b)
            }
        }
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Pow => num(f64::powf),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Value::Bool(compare(op, l, r))
        }
        BinaryOp::Eq => Value::Bool(l.loose_equals(r)),
        BinaryOp::NotEq => Value::Bool(!l.loose_equals(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNotEq => Value::Bool(!l.strict_equals(r)),
        BinaryOp::In => {
            if !matches!(r, Value::Object(_) | Value::Array(_)) {
                return Err(EvalError::Type(format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    l.to_display_string(),
                    r.to_display_string()
                )));
            }
            Value::Bool(r.has_own(&l.to_property_key()))
        }
    })
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (l.to_number(), r.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    fn run(source: &str, input: serde_json::Value) -> EvalResult<serde_json::Value> {
        let expr = parse(source)?;
        let mut ev = Evaluator::new(Limits {
            max_steps: 100_000,
            max_depth: 64,
        });
        let value = ev.evaluate(&expr, Value::from_json(input))?;
        Ok(value.to_json().unwrap_or(serde_json::Value::Null))
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(run("1 + 2 * 3", json!(null)).unwrap(), json!(7));
        assert_eq!(run("'a' + 1", json!(null)).unwrap(), json!("a1"));
        assert_eq!(run("7 % 3", json!(null)).unwrap(), json!(1));
        assert_eq!(run("2 ** 10", json!(null)).unwrap(), json!(1024));
    }

    #[test]
    fn test_member_access() {
        let input = json!([{"_id": 1, "tags": ["a", "b"]}]);
        assert_eq!(run("$input.0._id", input.clone()).unwrap(), json!(1));
        assert_eq!(run("$input[0].tags[1]", input.clone()).unwrap(), json!("b"));
        assert_eq!(run("$input.length", input).unwrap(), json!(1));
    }

    #[test]
    fn test_optional_chaining() {
        let input = json!({"a": null});
        assert_eq!(run("$input.a?.b.c", input.clone()).unwrap(), json!(null));
        assert_eq!(run("$input.a ?? 'dflt'", input.clone()).unwrap(), json!("dflt"));
        let err = run("$input.a.b", input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of null (reading 'b')"
        );
    }

    #[test]
    fn test_unknown_identifier() {
        let err = run("foo + 1", json!(null)).unwrap_err();
        assert_eq!(err.to_string(), "ReferenceError: foo is not defined");
        assert_eq!(run("typeof foo", json!(null)).unwrap(), json!("undefined"));
    }

    #[test]
    fn test_not_a_function() {
        let err = run("$input.foo()", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: $input.foo is not a function");
    }

    #[test]
    fn test_block_body_and_closure() {
        let source = "(x => { const y = x * 2; return y + 1; })(4)";
        assert_eq!(run(source, json!(null)).unwrap(), json!(9));
        let source = "(a => b => a + b)(1)(2)";
        assert_eq!(run(source, json!(null)).unwrap(), json!(3));
    }

    #[test]
    fn test_object_literal() {
        let source = "({...$input, b: 3, ['c' + 1]: true})";
        assert_eq!(
            run(source, json!({"a": 1, "b": 2})).unwrap(),
            json!({"a": 1, "b": 3, "c1": true})
        );
    }

    #[test]
    fn test_recursion_is_bounded() {
        let source = "(() => { const f = n => f(n + 1); return f(0); })()";
        let err = run(source, json!(null)).unwrap_err();
        assert_eq!(err, EvalError::StackOverflow);
    }

    #[test]
    fn test_step_budget() {
        let mut ev = Evaluator::new(Limits {
            max_steps: 10,
            max_depth: 64,
        });
        let expr = parse("[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]").unwrap();
        let err = ev.evaluate(&expr, Value::Undefined).unwrap_err();
        assert!(matches!(err, EvalError::StepLimit(10)));
    }

    #[test]
    fn test_in_operator() {
        assert_eq!(run("'a' in $input", json!({"a": 1})).unwrap(), json!(true));
        assert!(run("'a' in 5", json!(null)).is_err());
    }
}
