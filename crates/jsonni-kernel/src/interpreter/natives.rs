//! Native methods of arrays, strings, numbers and objects.
//!
//! These mirror the JavaScript built-ins a query is likely to reach for:
//! `$input.map(...)`, `name.toUpperCase()`, `price.toFixed(2)`. Methods
//! never mutate their receiver; `reverse` and `sort` return new arrays.
//!
//! Each function returns `Ok(None)` when the receiver has no method of that
//! name, and the evaluator turns that into "is not a function".

use std::cmp::Ordering;
use std::rc::Rc;

use crate::value::{Value, format_number};

use super::eval::{EvalError, EvalResult, Evaluator};

type MethodResult = EvalResult<Option<Value>>;

/// Argument `i`, or `undefined` when absent.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

/// Argument `i` as a function, or a TypeError naming the method.
pub(crate) fn callback(args: &[Value], i: usize, method: &str) -> EvalResult<Value> {
    let f = arg(args, i);
    if f.is_callable() {
        Ok(f)
    } else {
        Err(EvalError::Type(format!(
            "{} is not a function (in {method})",
            f.to_display_string()
        )))
    }
}

/// Resolve a relative index the way `slice` and `at` do: negative counts
/// from the end, the result is clamped to `0..=len`.
pub(crate) fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

/// Stable merge sort with a fallible comparator.
///
/// User comparators may be inconsistent or fail, so the standard library
/// sort is not used here.
pub(crate) fn merge_sort<T, F>(ev: &mut Evaluator, items: Vec<T>, cmp: &mut F) -> EvalResult<Vec<T>>
where
    F: FnMut(&mut Evaluator, &T, &T) -> EvalResult<Ordering>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut right = items;
    let left: Vec<T> = right.drain(..right.len() / 2).collect();
    let left = merge_sort(ev, left, cmp)?;
    let right = merge_sort(ev, right, cmp)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    loop {
        let take_right = match (l.peek(), r.peek()) {
            (Some(a), Some(b)) => {
                ev.charge(1)?;
                cmp(ev, b, a)? == Ordering::Less
            }
            _ => break,
        };
        let next = if take_right { r.next() } else { l.next() };
        out.extend(next);
    }
    out.extend(l);
    out.extend(r);
    Ok(out)
}

/// Dispatch `target.name(args)` to the native method table.
pub fn call_method(ev: &mut Evaluator, target: &Value, name: &str, args: Vec<Value>) -> MethodResult {
    if matches!(name, "toString" | "join") {
        ev.charge_footprint(target)?;
    }
    if let Value::String(s) = target {
        // String methods read their arguments as text
        for a in &args {
            if name == "concat" || matches!(a, Value::Array(_) | Value::Object(_)) {
                ev.charge_footprint(a)?;
            }
        }
        if name == "concat" {
            ev.charge(s.len() as u64)?;
        }
    }
    let result = match target {
        Value::Array(items) => array_method(ev, target, items, name, &args)?,
        Value::String(s) => string_method(ev, s, name, &args)?,
        Value::Number(n) => number_method(*n, name, &args)?,
        _ => None,
    };
    Ok(result.or_else(|| common_method(target, name, &args)))
}

fn common_method(target: &Value, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "toString" => Some(Value::from(target.to_display_string())),
        "valueOf" => Some(target.clone()),
        "hasOwnProperty" => Some(Value::Bool(
            target.has_own(&arg(args, 0).to_property_key()),
        )),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Arrays
// ═══════════════════════════════════════════════════════════════════════

fn array_method(
    ev: &mut Evaluator,
    target: &Value,
    items: &Rc<Vec<Value>>,
    name: &str,
    args: &[Value],
) -> MethodResult {
    let value = match name {
        "map" => {
            let f = callback(args, 0, "map")?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(ev.invoke(&f, vec![item.clone(), Value::from(i), target.clone()])?);
            }
            Value::from(out)
        }
        "filter" => {
            let f = callback(args, 0, "filter")?;
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if ev.invoke(&f, vec![item.clone(), Value::from(i), target.clone()])?.truthy() {
                    out.push(item.clone());
                }
            }
            Value::from(out)
        }
        "find" | "findIndex" | "findLast" | "findLastIndex" => {
            let f = callback(args, 0, name)?;
            let reverse = name.starts_with("findLast");
            let mut indices: Box<dyn Iterator<Item = usize>> = if reverse {
                Box::new((0..items.len()).rev())
            } else {
                Box::new(0..items.len())
            };
            let found = loop {
                let Some(i) = indices.next() else { break None };
                let item = items[i].clone();
                if ev.invoke(&f, vec![item, Value::from(i), target.clone()])?.truthy() {
                    break Some(i);
                }
            };
            if name.ends_with("Index") {
                Value::Number(found.map_or(-1.0, |i| i as f64))
            } else {
                found.map(|i| items[i].clone()).unwrap_or_default()
            }
        }
        "some" | "every" => {
            let f = callback(args, 0, name)?;
            let want = name == "some";
            let mut result = !want;
            for (i, item) in items.iter().enumerate() {
                if ev.invoke(&f, vec![item.clone(), Value::from(i), target.clone()])?.truthy() == want {
                    result = want;
                    break;
                }
            }
            Value::Bool(result)
        }
        "forEach" => {
            let f = callback(args, 0, "forEach")?;
            for (i, item) in items.iter().enumerate() {
                ev.invoke(&f, vec![item.clone(), Value::from(i), target.clone()])?;
            }
            Value::Undefined
        }
        "reduce" | "reduceRight" => {
            let f = callback(args, 0, name)?;
            let order: Vec<usize> = if name == "reduce" {
                (0..items.len()).collect()
            } else {
                (0..items.len()).rev().collect()
            };
            let mut order = order.into_iter();
            let mut acc = if args.len() > 1 {
                arg(args, 1)
            } else {
                match order.next() {
                    Some(i) => items[i].clone(),
                    None => {
                        return Err(EvalError::Type(
                            "Reduce of empty array with no initial value".to_string(),
                        ));
                    }
                }
            };
            for i in order {
                acc = ev.invoke(&f, vec![acc, items[i].clone(), Value::from(i), target.clone()])?;
            }
            acc
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.iter().any(|v| v.same_value_zero(&needle)))
        }
        "indexOf" | "lastIndexOf" => {
            let needle = arg(args, 0);
            let pos = if name == "indexOf" {
                items.iter().position(|v| v.strict_equals(&needle))
            } else {
                items.iter().rposition(|v| v.strict_equals(&needle))
            };
            Value::Number(pos.map_or(-1.0, |i| i as f64))
        }
        "join" => {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_display_string(),
            };
            ev.charge((items.len() as u64).saturating_mul(sep.len() as u64))?;
            let parts: Vec<String> = items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                .collect();
            Value::from(parts.join(&sep))
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            Value::from(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "concat" => {
            let mut out = items.as_ref().clone();
            for a in args {
                match a {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            ev.charge(out.len() as u64)?;
            Value::from(out)
        }
        "reverse" | "toReversed" => Value::from(items.iter().rev().cloned().collect::<Vec<_>>()),
        "sort" | "toSorted" => {
            let comparator = arg(args, 0);
            let sorted = if comparator.is_callable() {
                merge_sort(ev, items.as_ref().clone(), &mut |ev, a, b| {
                    let n = ev.invoke(&comparator, vec![a.clone(), b.clone()])?.to_number();
                    Ok(if n < 0.0 {
                        Ordering::Less
                    } else if n > 0.0 {
                        Ordering::Greater
                    } else {
                        Ordering::Equal
                    })
                })?
            } else {
                // Default order compares string forms, undefined last
                ev.charge_footprint(target)?;
                merge_sort(ev, items.as_ref().clone(), &mut |_, a, b| {
                    Ok(match (a, b) {
                        (Value::Undefined, Value::Undefined) => Ordering::Equal,
                        (Value::Undefined, _) => Ordering::Greater,
                        (_, Value::Undefined) => Ordering::Less,
                        _ => a.to_display_string().cmp(&b.to_display_string()),
                    })
                })?
            };
            Value::from(sorted)
        }
        "flat" => {
            let depth = match arg(args, 0) {
                Value::Undefined => 1.0,
                other => other.to_number(),
            };
            let mut out = Vec::new();
            flatten_into(ev, items, depth, &mut out)?;
            Value::from(out)
        }
        "flatMap" => {
            let f = callback(args, 0, "flatMap")?;
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                match ev.invoke(&f, vec![item.clone(), Value::from(i), target.clone()])? {
                    Value::Array(inner) => out.extend(inner.iter().cloned()),
                    other => out.push(other),
                }
            }
            Value::from(out)
        }
        "at" => at(items.len(), &arg(args, 0))
            .map(|i| items[i].clone())
            .unwrap_or_default(),
        "keys" => Value::from((0..items.len()).map(Value::from).collect::<Vec<_>>()),
        "entries" => Value::from(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| Value::from(vec![Value::from(i), v.clone()]))
                .collect::<Vec<_>>(),
        ),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(crate) fn flatten_into(
    ev: &mut Evaluator,
    items: &[Value],
    depth: f64,
    out: &mut Vec<Value>,
) -> EvalResult<()> {
    ev.charge(items.len() as u64)?;
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => flatten_into(ev, inner, depth - 1.0, out)?,
            other => out.push(other.clone()),
        }
    }
    Ok(())
}

/// Index for `at(i)`: negative counts from the end.
fn at(len: usize, index: &Value) -> Option<usize> {
    let n = index.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let i = if n < 0.0 { len as f64 + n } else { n };
    (i >= 0.0 && i < len as f64).then_some(i as usize)
}

// ═══════════════════════════════════════════════════════════════════════
// Strings
// ═══════════════════════════════════════════════════════════════════════

fn string_method(ev: &mut Evaluator, s: &Rc<str>, name: &str, args: &[Value]) -> MethodResult {
    let text = || arg(args, 0).to_display_string();
    let value = match name {
        "toUpperCase" | "toLocaleUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" | "toLocaleLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "trimStart" => Value::from(s.trim_start()),
        "trimEnd" => Value::from(s.trim_end()),
        "split" => {
            let limit = match arg(args, 1) {
                Value::Undefined => usize::MAX,
                other => other.to_number().max(0.0) as usize,
            };
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::String(Rc::clone(s))],
                sep => {
                    let sep = sep.to_display_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    }
                }
            };
            ev.charge(parts.len() as u64)?;
            Value::from(parts.into_iter().take(limit).collect::<Vec<_>>())
        }
        "includes" => Value::Bool(s.contains(text().as_str())),
        "startsWith" => Value::Bool(s.starts_with(text().as_str())),
        "endsWith" => Value::Bool(s.ends_with(text().as_str())),
        "indexOf" | "lastIndexOf" => {
            let needle = text();
            let pos = if name == "indexOf" {
                s.find(needle.as_str())
            } else {
                s.rfind(needle.as_str())
            };
            Value::Number(pos.map_or(-1.0, |byte| s[..byte].chars().count() as f64))
        }
        "slice" | "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len();
            let (start, end) = if name == "slice" {
                (
                    relative_index(&arg(args, 0), len, 0),
                    relative_index(&arg(args, 1), len, len),
                )
            } else {
                let clamp = |v: Value, default: usize| match v {
                    Value::Undefined => default,
                    v => {
                        let n = v.to_number();
                        if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize }
                    }
                };
                let (a, b) = (clamp(arg(args, 0), 0), clamp(arg(args, 1), len));
                (a.min(b), a.max(b))
            };
            Value::from(chars[start..end.max(start)].iter().collect::<String>())
        }
        "replace" | "replaceAll" => Value::from(replace_text(
            ev,
            s,
            &text(),
            &arg(args, 1),
            name == "replaceAll",
        )?),
        "padStart" | "padEnd" => {
            let target_len = arg(args, 0).to_number();
            let target_len = if target_len.is_nan() { 0 } else { target_len.max(0.0) as usize };
            let fill = match arg(args, 1) {
                Value::Undefined => " ".to_string(),
                other => other.to_display_string(),
            };
            let len = s.chars().count();
            if target_len <= len || fill.is_empty() {
                Value::String(Rc::clone(s))
            } else {
                ev.charge((target_len - len) as u64)?;
                let pad: String = fill.chars().cycle().take(target_len - len).collect();
                if name == "padStart" {
                    Value::from(pad + &**s)
                } else {
                    Value::from(s.to_string() + &pad)
                }
            }
        }
        "repeat" => {
            let count = arg(args, 0).to_number();
            let count = if count.is_nan() { 0.0 } else { count.trunc() };
            if count < 0.0 || count.is_infinite() {
                return Err(EvalError::Range(format!(
                    "Invalid count value: {}",
                    format_number(count)
                )));
            }
            let count = count as usize;
            ev.charge((count.saturating_mul(s.len())) as u64)?;
            Value::from(s.repeat(count))
        }
        "charAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0.0 } else { i.trunc() };
            let c = if i < 0.0 { None } else { s.chars().nth(i as usize) };
            Value::from(c.map(String::from).unwrap_or_default())
        }
        "charCodeAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0.0 } else { i.trunc() };
            let c = if i < 0.0 { None } else { s.chars().nth(i as usize) };
            Value::Number(c.map_or(f64::NAN, |c| f64::from(u32::from(c))))
        }
        "at" => {
            let chars: Vec<char> = s.chars().collect();
            at(chars.len(), &arg(args, 0))
                .map(|i| Value::from(chars[i].to_string()))
                .unwrap_or_default()
        }
        "concat" => {
            let mut out = s.to_string();
            for a in args {
                out.push_str(&a.to_display_string());
            }
            Value::from(out)
        }
        "localeCompare" => Value::Number(match (**s).cmp(text().as_str()) {
            Ordering::Less => -1.0,
            Ordering::Equal => 0.0,
            Ordering::Greater => 1.0,
        }),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn replace_text(
    ev: &mut Evaluator,
    s: &str,
    pattern: &str,
    replacement: &Value,
    all: bool,
) -> EvalResult<String> {
    let piece = |ev: &mut Evaluator| -> EvalResult<String> {
        let value = if replacement.is_callable() {
            ev.invoke(replacement, vec![Value::from(pattern)])?
        } else {
            replacement.clone()
        };
        ev.charge_footprint(&value)?;
        Ok(value.to_display_string())
    };

    let mut out = String::with_capacity(s.len());
    if pattern.is_empty() {
        // An empty pattern matches before every character
        out.push_str(&piece(ev)?);
        if !all {
            out.push_str(s);
            return Ok(out);
        }
        for c in s.chars() {
            out.push(c);
            out.push_str(&piece(ev)?);
        }
        return Ok(out);
    }

    let mut rest = s;
    while let Some(pos) = rest.find(pattern) {
        out.push_str(&rest[..pos]);
        out.push_str(&piece(ev)?);
        rest = &rest[pos + pattern.len()..];
        if !all {
            break;
        }
    }
    out.push_str(rest);
    Ok(out)
}

// ═══════════════════════════════════════════════════════════════════════
// Numbers
// ═══════════════════════════════════════════════════════════════════════

fn number_method(n: f64, name: &str, args: &[Value]) -> MethodResult {
    let value = match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            if !(0.0..=100.0).contains(&digits) {
                return Err(EvalError::Range(
                    "toFixed() digits argument must be between 0 and 100".to_string(),
                ));
            }
            Value::from(to_fixed(n, digits as usize))
        }
        "toString" => {
            let radix = match arg(args, 0) {
                Value::Undefined => 10.0,
                other => other.to_number(),
            };
            if !(2.0..=36.0).contains(&radix) {
                return Err(EvalError::Range(
                    "toString() radix must be between 2 and 36".to_string(),
                ));
            }
            Value::from(to_radix(n, radix as u32))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return format_number(n);
    }
    // Ties round away from zero, as in JavaScript
    let factor = 10f64.powi(digits as i32);
    let scaled = n * factor;
    if (scaled - scaled.trunc()).abs() == 0.5 {
        format!("{:.*}", digits, scaled.round() / factor)
    } else {
        format!("{n:.digits$}")
    }
}

fn to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() > u64::MAX as f64 {
        return format_number(n);
    }
    let mut magnitude = n.abs() as u64;
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let d = (magnitude % u64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        magnitude /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}
