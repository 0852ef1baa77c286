//! Runtime values for query evaluation.
//!
//! Values follow JavaScript semantics closely enough for query expressions:
//! numbers are `f64`, objects keep insertion order, and arrays and objects
//! are shared through `Rc` so passing them to callbacks is cheap.
//!
//! Non-data values (functions, namespaces, lodash chains, lazy sequences)
//! exist only while a query runs. [`Value::to_json`] drops them the way
//! `JSON.stringify` does.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::Lambda;
use crate::capabilities::sequence::Sequence;
use crate::interpreter::Scope;

/// Ordered string-keyed map backing object values.
pub type Object = IndexMap<String, Value>;

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Object(Rc<Object>),
    Function(Function),
    /// Global namespace objects such as `_`, `Math` and `JSON`
    Namespace(Namespace),
    /// A lodash-style chain wrapper, unwrapped by `.value()`
    Chain(Rc<Value>),
    /// A deferred `from(...)` pipeline
    Sequence(Rc<Sequence>),
}

/// A callable value.
#[derive(Debug, Clone)]
pub enum Function {
    /// Arrow function with its captured scope
    Closure(Rc<Closure>),
    /// Function provided by a namespace or the global scope
    Builtin(Builtin),
}

#[derive(Debug)]
pub struct Closure {
    pub lambda: Rc<Lambda>,
    pub scope: Scope,
}

/// Reference to a builtin function, e.g. `Math.max` or `_.map`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub namespace: Namespace,
    pub name: &'static str,
}

/// Global objects whose members are builtin functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `_`
    Utility,
    Math,
    Json,
    /// `Object`
    Object,
    /// `Array`
    Array,
    /// Free functions: `from`, `parseInt`, `Number`, ...
    Global,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Namespace::Utility => "_",
            Namespace::Math => "Math",
            Namespace::Json => "JSON",
            Namespace::Object => "Object",
            Namespace::Array => "Array",
            Namespace::Global => "globalThis",
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(Rc::new(map))
    }
}

impl Value {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Namespace(Namespace::Utility))
    }

    /// JavaScript truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Namespace(Namespace::Utility) => "function",
            _ => "object",
        }
    }

    /// Short type name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Array(_) => "array",
            Value::Chain(_) => "chain",
            Value::Sequence(_) => "sequence",
            other => other.type_of(),
        }
    }

    /// Numeric conversion, as `Number(value)`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => parse_number(&single.to_display_string()),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// String conversion, as `String(value)`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Chain(_) | Value::Sequence(_) => "[object Object]".to_string(),
            Value::Function(Function::Closure(_)) => "(anonymous) => { ... }".to_string(),
            Value::Function(Function::Builtin(b)) => {
                format!("function {}() {{ [native code] }}", b.name)
            }
            Value::Namespace(ns) => format!("[object {ns}]"),
        }
    }

    /// Convert to a property key (`obj[key]`).
    pub fn to_property_key(&self) -> String {
        self.to_display_string()
    }

    /// Number of elements for arrays, characters for strings, keys for objects.
    pub fn size(&self) -> usize {
        match self {
            Value::Array(items) => items.len(),
            Value::String(s) => s.chars().count(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    /// Read a property without method dispatch.
    ///
    /// Nullish receivers yield `undefined`; callers report the TypeError.
    pub fn get_property(&self, key: &str) -> Value {
        match self {
            Value::Array(items) => match key {
                "length" => Value::from(items.len()),
                _ => array_index(key)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default(),
            },
            Value::String(s) => match key {
                "length" => Value::from(s.chars().count()),
                _ => array_index(key)
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default(),
            },
            Value::Object(map) => map.get(key).cloned().unwrap_or_default(),
            Value::Namespace(ns) => crate::capabilities::namespace_member(*ns, key),
            _ => Value::Undefined,
        }
    }

    /// True if `key` names an own property (`hasOwnProperty`, `in`).
    pub fn has_own(&self, key: &str) -> bool {
        match self {
            Value::Array(items) => key == "length" || array_index(key).is_some_and(|i| i < items.len()),
            Value::String(s) => key == "length" || array_index(key).is_some_and(|i| i < s.chars().count()),
            Value::Object(map) => map.contains_key(key),
            _ => false,
        }
    }

    /// Strict equality (`===`). Arrays and objects compare by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Chain(a), Value::Chain(b)) => Rc::ptr_eq(a, b),
            (Value::Sequence(a), Value::Sequence(b)) => Rc::ptr_eq(a, b),
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            (Value::Function(Function::Builtin(a)), Value::Function(Function::Builtin(b))) => {
                a == b
            }
            (Value::Function(Function::Closure(a)), Value::Function(Function::Closure(b))) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    /// SameValueZero, used by `includes`: like `===` but NaN equals NaN.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// Loose equality (`==`).
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Array(_) | Value::Object(_), Value::String(_) | Value::Number(_))
            | (Value::String(_) | Value::Number(_), Value::Array(_) | Value::Object(_)) => {
                let (a, b) = (self.to_primitive(), other.to_primitive());
                a.loose_equals(&b)
            }
            _ => self.strict_equals(other),
        }
    }

    fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) => Value::from(self.to_display_string()),
            other => other.clone(),
        }
    }

    /// Convert to JSON the way `JSON.stringify` does.
    ///
    /// Returns `None` for values JSON cannot represent at the top level.
    /// Inside arrays they become `null`; inside objects they are omitted.
    /// Non-finite numbers become `null` and integral numbers print without
    /// a fraction.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Function(_) | Value::Namespace(_) | Value::Sequence(_) => {
                None
            }
            Value::Null => Some(Json::Null),
            Value::Bool(b) => Some(Json::Bool(*b)),
            Value::Number(n) => Some(number_to_json(*n)),
            Value::String(s) => Some(Json::String(s.to_string())),
            Value::Array(items) => Some(Json::Array(
                items
                    .iter()
                    .map(|v| v.to_json().unwrap_or(Json::Null))
                    .collect(),
            )),
            Value::Object(map) => Some(Json::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                    .collect(),
            )),
            // A chain serializes as its wrapped value
            Value::Chain(inner) => inner.to_json(),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::from(items.into_iter().map(Value::from_json).collect::<Vec<_>>()),
            Json::Object(map) => Value::from(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect::<Object>(),
            ),
        }
    }
}

/// Size of a value once written out in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footprint {
    /// One unit per node plus one per string byte.
    pub units: u64,
    /// Deepest array/object nesting seen.
    pub depth: usize,
}

impl Value {
    /// Footprint of the fully expanded value, as text or JSON output sees it.
    ///
    /// A shared array or object counts once per occurrence, so a value built
    /// by reusing one array at every level measures exponentially large.
    /// Counting stops once `limit` units are exceeded.
    pub fn footprint(&self, limit: u64) -> Footprint {
        self.measure(limit, false)
    }

    /// Units reached through a reference already seen elsewhere in the value.
    ///
    /// This is what serializing costs beyond the memory the value already
    /// holds: plain input data measures zero, repeated subtrees do not.
    pub fn repeated_footprint(&self, limit: u64) -> Footprint {
        self.measure(limit, true)
    }

    fn measure(&self, limit: u64, repeats_only: bool) -> Footprint {
        let mut seen = HashSet::new();
        let mut out = Footprint::default();
        let mut stack: Vec<(&Value, usize, bool)> = vec![(self, 0, false)];
        while let Some((value, depth, repeated)) = stack.pop() {
            let (own, repeated) = match value {
                Value::String(s) => {
                    let shared = repeated || !seen.insert(s.as_ptr() as usize);
                    (1 + s.len() as u64, shared)
                }
                Value::Array(items) => {
                    let shared = repeated || !seen.insert(Rc::as_ptr(items) as *const () as usize);
                    stack.extend(items.iter().map(|v| (v, depth + 1, shared)));
                    (1, shared)
                }
                Value::Object(map) => {
                    let shared = repeated || !seen.insert(Rc::as_ptr(map) as *const () as usize);
                    let keys: usize = map.keys().map(String::len).sum();
                    stack.extend(map.values().map(|v| (v, depth + 1, shared)));
                    (1 + keys as u64, shared)
                }
                Value::Chain(inner) => {
                    stack.push((inner.as_ref(), depth, repeated));
                    (0, repeated)
                }
                _ => (1, repeated),
            };
            if repeated || !repeats_only {
                out.units = out.units.saturating_add(own);
            }
            out.depth = out.depth.max(depth);
            if out.units > limit {
                break;
            }
        }
        out
    }
}

/// Hashable identity of a value under SameValueZero.
///
/// Two values have equal keys exactly when `same_value_zero` holds, so
/// `uniq`, `distinct` and set operations can use a `HashSet`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(Rc<str>),
    Ref(usize),
    Builtin(Namespace, &'static str),
}

impl Value {
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Undefined => ValueKey::Undefined,
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Number(n) if n.is_nan() => ValueKey::Number(f64::NAN.to_bits()),
            Value::Number(n) if *n == 0.0 => ValueKey::Number(0),
            Value::Number(n) => ValueKey::Number(n.to_bits()),
            Value::String(s) => ValueKey::String(Rc::clone(s)),
            Value::Array(a) => ValueKey::Ref(Rc::as_ptr(a) as *const () as usize),
            Value::Object(o) => ValueKey::Ref(Rc::as_ptr(o) as *const () as usize),
            Value::Chain(c) => ValueKey::Ref(Rc::as_ptr(c) as *const () as usize),
            Value::Sequence(s) => ValueKey::Ref(Rc::as_ptr(s) as *const () as usize),
            Value::Function(Function::Closure(c)) => {
                ValueKey::Ref(Rc::as_ptr(c) as *const () as usize)
            }
            Value::Function(Function::Builtin(b)) => ValueKey::Builtin(b.namespace, b.name),
            Value::Namespace(ns) => ValueKey::Builtin(*ns, ""),
        }
    }
}

/// Parse a canonical array index (`"0"`, `"12"`, not `"01"`).
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Reorder keys the way JavaScript enumerates object properties:
/// integer-like keys ascending, then the rest in insertion order.
pub fn enumeration_order(map: Object) -> Object {
    let integer = |k: &str| array_index(k).filter(|&i| i < u32::MAX as usize);
    if !map.keys().any(|k| integer(k).is_some()) {
        return map;
    }
    let (mut indexed, named): (Vec<_>, Vec<_>) =
        map.into_iter().partition(|(k, _)| integer(k).is_some());
    indexed.sort_by_key(|(k, _)| integer(k));
    indexed.into_iter().chain(named).collect()
}

/// String to number conversion following `Number("...")`.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf" and "nan" spellings that JavaScript rejects
    if !t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

/// Format a number the way JavaScript prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let s = format!("{n:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        };
    }
    format!("{n}")
}

fn number_to_json(n: f64) -> serde_json::Value {
    use serde_json::Value as Json;
    const MAX_SAFE: f64 = 9_007_199_254_740_992.0;
    if !n.is_finite() {
        return Json::Null;
    }
    if n.fract() == 0.0 && n.abs() < MAX_SAFE {
        return Json::from(n as i64);
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        // Beyond 2^53 JavaScript prints the shortest digits padded with zeros
        let digits = format_number(n);
        if let Ok(i) = digits.parse::<i64>() {
            return Json::from(i);
        }
        if let Ok(u) = digits.parse::<u64>() {
            return Json::from(u);
        }
    }
    serde_json::Number::from_f64(n)
        .map(Json::Number)
        .unwrap_or(Json::Null)
}

/// Ordering used by sorting helpers.
///
/// Numbers compare numerically and strings lexically; `undefined` and
/// `null` sort last; anything else compares by its string form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_display_string().cmp(&b.to_display_string()),
    }
}
