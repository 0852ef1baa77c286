//! Intrinsic globals available to every dialect.
//!
//! `Math`, `JSON`, `Object`, `Array` and a handful of free conversion
//! functions. All of them are pure.

use std::sync::LazyLock;

use regex::Regex;

use crate::format::json_text;
use crate::interpreter::natives::arg;
use crate::interpreter::{EvalError, EvalResult, Evaluator};
use crate::value::{Builtin, Function, Namespace, Object, Value, parse_number};

pub const MATH: &[&str] = &[
    "abs", "floor", "ceil", "round", "trunc", "sign", "min", "max", "pow", "sqrt", "cbrt", "log",
    "log2", "log10", "exp",
];
pub const JSON: &[&str] = &["stringify", "parse"];
pub const OBJECT: &[&str] = &["keys", "values", "entries", "fromEntries", "assign"];
pub const ARRAY: &[&str] = &["isArray", "of", "from"];
pub const GLOBAL: &[&str] = &[
    "Number", "String", "Boolean", "parseInt", "parseFloat", "isNaN", "isFinite",
];

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(Infinity|[0-9]+\.?[0-9]*([eE][+-]?[0-9]+)?|\.[0-9]+([eE][+-]?[0-9]+)?)")
        .expect("valid float regex")
});

/// Resolve a global name that is not bound in scope.
pub fn global(name: &str) -> Option<Value> {
    let ns = match name {
        "Math" => Namespace::Math,
        "JSON" => Namespace::Json,
        "Object" => Namespace::Object,
        "Array" => Namespace::Array,
        "NaN" => return Some(Value::Number(f64::NAN)),
        "Infinity" => return Some(Value::Number(f64::INFINITY)),
        _ => {
            return GLOBAL.iter().find(|g| **g == name).map(|g| {
                Value::Function(Function::Builtin(Builtin {
                    namespace: Namespace::Global,
                    name: g,
                }))
            });
        }
    };
    Some(Value::Namespace(ns))
}

/// Constant members such as `Math.PI`.
pub fn math_constant(name: &str) -> Option<f64> {
    use std::f64::consts;
    match name {
        "PI" => Some(consts::PI),
        "E" => Some(consts::E),
        "LN2" => Some(consts::LN_2),
        "LN10" => Some(consts::LN_10),
        "SQRT2" => Some(consts::SQRT_2),
        _ => None,
    }
}

/// Call a member of `Math`, `JSON`, `Object`, `Array` or a free global.
pub fn call(ev: &mut Evaluator, ns: Namespace, name: &str, args: Vec<Value>) -> EvalResult<Option<Value>> {
    let first = arg(&args, 0);
    let value = match (ns, name) {
        (Namespace::Math, "min" | "max") => {
            let mut acc = if name == "min" { f64::INFINITY } else { f64::NEG_INFINITY };
            for a in &args {
                let n = a.to_number();
                if n.is_nan() {
                    acc = f64::NAN;
                    break;
                }
                acc = if name == "min" { acc.min(n) } else { acc.max(n) };
            }
            Value::Number(acc)
        }
        (Namespace::Math, "pow") => Value::Number(first.to_number().powf(arg(&args, 1).to_number())),
        (Namespace::Math, _) => {
            let n = first.to_number();
            Value::Number(match name {
                "abs" => n.abs(),
                "floor" => n.floor(),
                "ceil" => n.ceil(),
                // Halves round toward +Infinity
                "round" => (n + 0.5).floor(),
                "trunc" => n.trunc(),
                "sign" => {
                    if n.is_nan() || n == 0.0 {
                        n
                    } else {
                        n.signum()
                    }
                }
                "sqrt" => n.sqrt(),
                "cbrt" => n.cbrt(),
                "log" => n.ln(),
                "log2" => n.log2(),
                "log10" => n.log10(),
                "exp" => n.exp(),
                _ => return Ok(None),
            })
        }
        (Namespace::Json, "stringify") => {
            let indent = match arg(&args, 2) {
                Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
                Value::String(s) => s.chars().take(10).collect(),
                _ => String::new(),
            };
            ev.charge_indented(&first, indent.len())?;
            match first.to_json() {
                Some(json) => Value::from(json_text(&json, &indent)),
                None => Value::Undefined,
            }
        }
        (Namespace::Json, "parse") => {
            ev.charge_footprint(&first)?;
            let text = first.to_display_string();
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| EvalError::Syntax(format!("JSON.parse: {e}")))?;
            Value::from_json(json)
        }
        (Namespace::Object, "keys" | "values" | "entries") => {
            let pairs: Vec<(String, Value)> = match &first {
                Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v.clone()))
                    .collect(),
                Value::String(s) => s
                    .chars()
                    .enumerate()
                    .map(|(i, c)| (i.to_string(), Value::from(c.to_string())))
                    .collect(),
                Value::Undefined | Value::Null => {
                    return Err(EvalError::Type(
                        "Cannot convert undefined or null to object".to_string(),
                    ));
                }
                _ => Vec::new(),
            };
            Value::from(
                pairs
                    .into_iter()
                    .map(|(k, v)| match name {
                        "keys" => Value::from(k),
                        "values" => v,
                        _ => Value::from(vec![Value::from(k), v]),
                    })
                    .collect::<Vec<_>>(),
            )
        }
        (Namespace::Object, "fromEntries") => {
            let mut out = Object::new();
            for entry in ev.iterate(&first, "Object.fromEntries argument")? {
                out.insert(
                    entry.get_property("0").to_property_key(),
                    entry.get_property("1"),
                );
            }
            Value::from(out)
        }
        (Namespace::Object, "assign") => {
            let mut out = Object::new();
            for a in &args {
                if let Value::Object(map) = a {
                    for (k, v) in map.iter() {
                        out.insert(k.clone(), v.clone());
                    }
                }
            }
            Value::from(out)
        }
        (Namespace::Array, "isArray") => Value::Bool(matches!(first, Value::Array(_))),
        (Namespace::Array, "of") => Value::from(args),
        (Namespace::Array, "from") => {
            let items = match &first {
                Value::Object(map) => {
                    // Array-likes: {length: n}
                    let len = map.get("length").map_or(0.0, Value::to_number);
                    let len = if len.is_nan() { 0 } else { len.max(0.0) as usize };
                    ev.charge(len as u64)?;
                    (0..len).map(|i| first.get_property(&i.to_string())).collect()
                }
                other => ev.iterate(other, "Array.from argument")?,
            };
            let mapper = arg(&args, 1);
            if mapper.is_callable() {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(ev.invoke(&mapper, vec![item, Value::from(i)])?);
                }
                Value::from(out)
            } else {
                Value::from(items)
            }
        }
        (Namespace::Global, "Number") => Value::Number(if args.is_empty() { 0.0 } else { first.to_number() }),
        (Namespace::Global, "String") => {
            ev.charge_footprint(&first)?;
            Value::from(if args.is_empty() {
                String::new()
            } else {
                first.to_display_string()
            })
        }
        (Namespace::Global, "Boolean") => Value::Bool(first.truthy()),
        (Namespace::Global, "parseInt") => {
            ev.charge_footprint(&first)?;
            Value::Number(parse_int(&first.to_display_string(), &arg(&args, 1)))
        }
        (Namespace::Global, "parseFloat") => {
            ev.charge_footprint(&first)?;
            Value::Number(parse_float(&first.to_display_string()))
        }
        (Namespace::Global, "isNaN") => Value::Bool(first.to_number().is_nan()),
        (Namespace::Global, "isFinite") => Value::Bool(first.to_number().is_finite()),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// `parseInt`: the longest valid digit prefix in the given radix.
fn parse_int(text: &str, radix: &Value) -> f64 {
    let mut s = text.trim_start();
    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }
    let mut radix = match radix {
        Value::Undefined => 0,
        other => {
            let r = other.to_number();
            if r.is_nan() { 0 } else { r.trunc() as i64 }
        }
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let radix = radix as u32;
    let digits: Vec<u32> = s.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(*d));
    if negative { -value } else { value }
}

/// `parseFloat`: the longest numeric prefix.
fn parse_float(text: &str) -> f64 {
    match FLOAT_PREFIX.find(text.trim_start()) {
        Some(m) => parse_number(m.as_str()),
        None => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", &Value::Undefined), 42.0);
        assert_eq!(parse_int("  -17", &Value::Undefined), -17.0);
        assert_eq!(parse_int("0x1F", &Value::Undefined), 31.0);
        assert_eq!(parse_int("101", &Value::Number(2.0)), 5.0);
        assert!(parse_int("abc", &Value::Undefined).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert!(parse_float("x1").is_nan());
    }

    #[test]
    fn test_globals() {
        assert!(matches!(global("Math"), Some(Value::Namespace(Namespace::Math))));
        assert!(matches!(global("parseInt"), Some(Value::Function(_))));
        assert!(global("_").is_none());
        assert!(global("from").is_none());
        assert!(global("process").is_none());
    }
}
