//! The `_` utility namespace.
//!
//! A lodash-flavored collection toolkit. Collections may be arrays or
//! objects; objects iterate their values and pass the key as the second
//! callback argument. Wherever a callback is expected an iteratee
//! shorthand may be given instead:
//!
//! | argument        | behaves like                        |
//! |-----------------|-------------------------------------|
//! | function        | called with `(value, key, collection)` |
//! | `"a.b[0]"`      | property path lookup                |
//! | `{k: v}`        | partial deep match                  |
//! | `["k", v]`      | match on a single property          |
//! | omitted         | identity                            |
//!
//! `_.chain(x)` wraps a value so namespace functions can be called as
//! methods; `.value()` unwraps it.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::interpreter::natives::{arg, flatten_into, merge_sort};
use crate::interpreter::{EvalError, EvalResult, Evaluator};
use crate::value::{Object, Value, ValueKey, compare_values, enumeration_order, format_number};

/// Functions reachable as `_.name`.
pub const FUNCTIONS: &[&str] = &[
    "map", "filter", "reject", "find", "findIndex", "some", "every", "includes", "forEach",
    "each", "groupBy", "keyBy", "countBy", "partition", "sortBy", "orderBy", "uniq", "uniqBy",
    "flatten", "flattenDeep", "compact", "chunk", "take", "takeRight", "drop", "dropRight",
    "first", "head", "last", "reverse", "size", "isEmpty", "sum", "sumBy", "min", "minBy", "max",
    "maxBy", "mean", "meanBy", "pick", "omit", "get", "has", "keys", "values", "toPairs",
    "entries", "fromPairs", "mapValues", "mapKeys", "range", "identity", "reduce", "chain",
    "join", "concat", "difference", "intersection", "union", "isEqual", "isNil", "isArray",
    "isObject", "isString", "isNumber",
];

type FnResult = EvalResult<Option<Value>>;

// ═══════════════════════════════════════════════════════════════════════
// Iteratees
// ═══════════════════════════════════════════════════════════════════════

enum Iteratee {
    Function(Value),
    Property(Vec<String>),
    Matches(Value),
    MatchesProperty(Vec<String>, Value),
    Identity,
}

impl Iteratee {
    fn from_arg(value: Value) -> Self {
        match value {
            v if v.is_callable() => Iteratee::Function(v),
            Value::Undefined | Value::Null => Iteratee::Identity,
            Value::String(path) => Iteratee::Property(parse_path(&path)),
            Value::Number(n) => Iteratee::Property(vec![format_number(n)]),
            Value::Array(pair) if pair.len() == 2 => Iteratee::MatchesProperty(
                parse_path(&pair[0].to_property_key()),
                pair[1].clone(),
            ),
            Value::Array(pair) => Iteratee::Property(
                pair.iter().map(Value::to_property_key).collect(),
            ),
            other => Iteratee::Matches(other),
        }
    }

    fn apply(
        &self,
        ev: &mut Evaluator,
        item: &Value,
        key: &Value,
        collection: &Value,
    ) -> EvalResult<Value> {
        match self {
            Iteratee::Function(f) => {
                ev.invoke(f, vec![item.clone(), key.clone(), collection.clone()])
            }
            Iteratee::Property(path) => Ok(get_path(item, path)),
            Iteratee::Matches(source) => Ok(Value::Bool(is_match(item, source))),
            Iteratee::MatchesProperty(path, expected) => {
                Ok(Value::Bool(is_match(&get_path(item, path), expected)))
            }
            Iteratee::Identity => Ok(item.clone()),
        }
    }
}

/// Split a property path such as `a.b[0]["c"]` into segments.
pub fn parse_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => segments.push(std::mem::take(&mut current)),
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let quote = match chars.peek() {
                    Some(&q @ ('"' | '\'')) => {
                        chars.next();
                        Some(q)
                    }
                    _ => None,
                };
                for c in chars.by_ref() {
                    if Some(c) == quote {
                        continue;
                    }
                    if c == ']' {
                        break;
                    }
                    current.push(c);
                }
                segments.push(std::mem::take(&mut current));
                if chars.peek() == Some(&'.') {
                    chars.next();
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() || segments.is_empty() {
        segments.push(current);
    }
    segments
}

/// Follow a property path; missing links yield `undefined`.
pub fn get_path(value: &Value, path: &[String]) -> Value {
    let mut current = value.clone();
    for segment in path {
        if current.is_nullish() {
            return Value::Undefined;
        }
        current = current.get_property(segment);
    }
    current
}

fn set_path(map: &mut Object, path: &[String], value: Value) {
    match path {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let mut child = match map.get(head) {
                Some(Value::Object(existing)) => existing.as_ref().clone(),
                _ => Object::new(),
            };
            set_path(&mut child, rest, value);
            map.insert(head.clone(), Value::from(child));
        }
    }
}

/// Partial deep comparison: every property of `source` matches `value`.
fn is_match(value: &Value, source: &Value) -> bool {
    match (value, source) {
        (Value::Object(obj), Value::Object(src)) => src.iter().all(|(k, expected)| {
            obj.get(k).is_some_and(|actual| is_match(actual, expected))
        }),
        (Value::Array(items), Value::Array(expected)) => expected
            .iter()
            .all(|e| items.iter().any(|item| is_match(item, e))),
        (a, b) => a.same_value_zero(b),
    }
}

/// Structural equality.
fn is_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| is_equal(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| is_equal(v, w)))
        }
        _ => a.same_value_zero(b),
    }
}

/// `(key, value)` pairs of a collection.
fn entries(collection: &Value) -> Vec<(Value, Value)> {
    match collection {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i), v.clone()))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (Value::from(i), Value::from(c.to_string())))
            .collect(),
        Value::Chain(inner) => entries(inner),
        _ => Vec::new(),
    }
}

fn items(collection: &Value) -> Vec<Value> {
    entries(collection).into_iter().map(|(_, v)| v).collect()
}

fn count(value: &Value, default: f64) -> usize {
    let n = match value {
        Value::Undefined => default,
        other => other.to_number(),
    };
    if n.is_nan() || n < 0.0 { 0 } else { n as usize }
}

// ═══════════════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════════════

/// Call `_.name(args)`. `Ok(None)` if there is no such function.
pub fn call(ev: &mut Evaluator, name: &str, args: Vec<Value>) -> FnResult {
    let collection = arg(&args, 0);
    let value = match name {
        "identity" => collection,
        "chain" => Value::Chain(Rc::new(collection)),
        "map" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let mut out = Vec::new();
            for (key, item) in entries(&collection) {
                out.push(it.apply(ev, &item, &key, &collection)?);
            }
            Value::from(out)
        }
        "filter" | "reject" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let keep = name == "filter";
            let mut out = Vec::new();
            for (key, item) in entries(&collection) {
                if it.apply(ev, &item, &key, &collection)?.truthy() == keep {
                    out.push(item);
                }
            }
            Value::from(out)
        }
        "find" | "findIndex" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let mut found = None;
            for (i, (key, item)) in entries(&collection).into_iter().enumerate() {
                if it.apply(ev, &item, &key, &collection)?.truthy() {
                    found = Some((i, item));
                    break;
                }
            }
            match (name, found) {
                ("find", Some((_, item))) => item,
                ("find", None) => Value::Undefined,
                (_, Some((i, _))) => Value::from(i),
                (_, None) => Value::Number(-1.0),
            }
        }
        "some" | "every" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let want = name == "some";
            let mut result = !want;
            for (key, item) in entries(&collection) {
                if it.apply(ev, &item, &key, &collection)?.truthy() == want {
                    result = want;
                    break;
                }
            }
            Value::Bool(result)
        }
        "includes" => {
            let needle = arg(&args, 1);
            match &collection {
                Value::String(s) => Value::Bool(s.contains(needle.to_display_string().as_str())),
                _ => Value::Bool(items(&collection).iter().any(|v| v.same_value_zero(&needle))),
            }
        }
        "forEach" | "each" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            for (key, item) in entries(&collection) {
                if matches!(it.apply(ev, &item, &key, &collection)?, Value::Bool(false)) {
                    break;
                }
            }
            collection
        }
        "reduce" => {
            let f = arg(&args, 1);
            let mut pairs = entries(&collection).into_iter();
            let mut acc = if args.len() > 2 {
                arg(&args, 2)
            } else {
                pairs.next().map(|(_, v)| v).unwrap_or_default()
            };
            for (key, item) in pairs {
                acc = ev.invoke(&f, vec![acc, item, key, collection.clone()])?;
            }
            acc
        }
        "groupBy" | "keyBy" | "countBy" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let mut groups: Object = Object::new();
            for (key, item) in entries(&collection) {
                let group = it.apply(ev, &item, &key, &collection)?.to_property_key();
                match name {
                    "groupBy" => {
                        let slot = groups
                            .entry(group)
                            .or_insert_with(|| Value::from(Vec::new()));
                        if let Value::Array(list) = slot {
                            Rc::make_mut(list).push(item);
                        }
                    }
                    "keyBy" => {
                        groups.insert(group, item);
                    }
                    _ => {
                        let slot = groups.entry(group).or_insert(Value::Number(0.0));
                        *slot = Value::Number(slot.to_number() + 1.0);
                    }
                }
            }
            Value::from(enumeration_order(groups))
        }
        "partition" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let (mut pass, mut fail) = (Vec::new(), Vec::new());
            for (key, item) in entries(&collection) {
                if it.apply(ev, &item, &key, &collection)?.truthy() {
                    pass.push(item);
                } else {
                    fail.push(item);
                }
            }
            Value::from(vec![Value::from(pass), Value::from(fail)])
        }
        "sortBy" | "orderBy" => {
            let iteratees: Vec<Iteratee> = match arg(&args, 1) {
                Value::Array(list) => list.iter().cloned().map(Iteratee::from_arg).collect(),
                other => vec![Iteratee::from_arg(other)],
            };
            let descending: Vec<bool> = match arg(&args, 2) {
                Value::Array(orders) if name == "orderBy" => orders
                    .iter()
                    .map(|o| o.to_display_string().eq_ignore_ascii_case("desc"))
                    .collect(),
                Value::String(order) if name == "orderBy" => {
                    vec![order.eq_ignore_ascii_case("desc")]
                }
                _ => Vec::new(),
            };
            sort_by_keys(ev, &collection, &iteratees, &descending)?
        }
        "uniq" => Value::from(unique_by_key(items(&collection), |v| Ok(v.key()))?),
        "uniqBy" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for (key, item) in entries(&collection) {
                if seen.insert(it.apply(ev, &item, &key, &collection)?.key()) {
                    out.push(item);
                }
            }
            Value::from(out)
        }
        "flatten" | "flattenDeep" => {
            let depth = if name == "flatten" { 1.0 } else { f64::INFINITY };
            let mut out = Vec::new();
            flatten_into(ev, &items(&collection), depth, &mut out)?;
            Value::from(out)
        }
        "compact" => Value::from(
            items(&collection)
                .into_iter()
                .filter(Value::truthy)
                .collect::<Vec<_>>(),
        ),
        "chunk" => {
            let size = count(&arg(&args, 1), 1.0);
            let all = items(&collection);
            if size == 0 {
                Value::from(Vec::new())
            } else {
                Value::from(
                    all.chunks(size)
                        .map(|c| Value::from(c.to_vec()))
                        .collect::<Vec<_>>(),
                )
            }
        }
        "take" | "takeRight" | "drop" | "dropRight" => {
            let n = count(&arg(&args, 1), 1.0);
            let all = items(&collection);
            let len = all.len();
            let n = n.min(len);
            let range = match name {
                "take" => 0..n,
                "takeRight" => len - n..len,
                "drop" => n..len,
                _ => 0..len - n,
            };
            Value::from(all[range].to_vec())
        }
        "first" | "head" => items(&collection).into_iter().next().unwrap_or_default(),
        "last" => items(&collection).pop().unwrap_or_default(),
        "reverse" => {
            let mut all = items(&collection);
            all.reverse();
            Value::from(all)
        }
        "size" => Value::from(collection.size()),
        "isEmpty" => Value::Bool(match &collection {
            Value::Array(_) | Value::Object(_) | Value::String(_) => collection.size() == 0,
            _ => true,
        }),
        "sum" | "sumBy" | "mean" | "meanBy" => {
            let it = Iteratee::from_arg(if name.ends_with("By") {
                arg(&args, 1)
            } else {
                Value::Undefined
            });
            let mut total = 0.0;
            let mut n = 0usize;
            for (key, item) in entries(&collection) {
                let v = it.apply(ev, &item, &key, &collection)?;
                if !matches!(v, Value::Undefined) {
                    total += v.to_number();
                }
                n += 1;
            }
            if name.starts_with("mean") {
                Value::Number(if n == 0 { f64::NAN } else { total / n as f64 })
            } else {
                Value::Number(total)
            }
        }
        "min" | "max" | "minBy" | "maxBy" => {
            let it = Iteratee::from_arg(if name.ends_with("By") {
                arg(&args, 1)
            } else {
                Value::Undefined
            });
            let want = if name.starts_with("min") {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            };
            let mut best: Option<(Value, Value)> = None;
            for (key, item) in entries(&collection) {
                let score = it.apply(ev, &item, &key, &collection)?;
                if score.is_nullish() || matches!(score, Value::Number(n) if n.is_nan()) {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some((current, _)) => compare_values(&score, current) == want,
                };
                if better {
                    best = Some((score, item));
                }
            }
            best.map(|(_, item)| item).unwrap_or_default()
        }
        "pick" | "omit" => {
            let Value::Object(source) = &collection else {
                return Ok(Some(Value::from(Object::new())));
            };
            let mut paths = Vec::new();
            for a in args.iter().skip(1) {
                match a {
                    Value::Array(list) => paths.extend(list.iter().map(Value::to_property_key)),
                    other => paths.push(other.to_property_key()),
                }
            }
            if name == "pick" {
                let mut out = Object::new();
                for path in &paths {
                    if let Some(value) = source.get(path) {
                        out.insert(path.clone(), value.clone());
                        continue;
                    }
                    let segments = parse_path(path);
                    let value = get_path(&collection, &segments);
                    if !matches!(value, Value::Undefined) {
                        set_path(&mut out, &segments, value);
                    }
                }
                Value::from(out)
            } else {
                let omitted: HashSet<&str> = paths.iter().map(String::as_str).collect();
                Value::from(
                    source
                        .iter()
                        .filter(|(k, _)| !omitted.contains(k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<Object>(),
                )
            }
        }
        "get" => {
            let path = match arg(&args, 1) {
                Value::Array(list) => list.iter().map(Value::to_property_key).collect(),
                other => parse_path(&other.to_property_key()),
            };
            match get_path(&collection, &path) {
                Value::Undefined => arg(&args, 2),
                found => found,
            }
        }
        "has" => {
            let path = match arg(&args, 1) {
                Value::Array(list) => list.iter().map(Value::to_property_key).collect(),
                other => parse_path(&other.to_property_key()),
            };
            let mut current = collection.clone();
            let mut present = !path.is_empty();
            for segment in &path {
                if !current.has_own(segment) {
                    present = false;
                    break;
                }
                current = current.get_property(segment);
            }
            Value::Bool(present)
        }
        "keys" => Value::from(
            entries(&collection)
                .into_iter()
                .map(|(k, _)| Value::from(k.to_property_key()))
                .collect::<Vec<_>>(),
        ),
        "values" => Value::from(items(&collection)),
        "toPairs" | "entries" => Value::from(
            entries(&collection)
                .into_iter()
                .map(|(k, v)| Value::from(vec![Value::from(k.to_property_key()), v]))
                .collect::<Vec<_>>(),
        ),
        "fromPairs" => {
            let mut out = Object::new();
            for pair in items(&collection) {
                if let Value::Array(pair) = pair {
                    let key = pair.first().cloned().unwrap_or_default().to_property_key();
                    out.insert(key, pair.get(1).cloned().unwrap_or_default());
                }
            }
            Value::from(enumeration_order(out))
        }
        "mapValues" | "mapKeys" => {
            let it = Iteratee::from_arg(arg(&args, 1));
            let mut out = Object::new();
            for (key, item) in entries(&collection) {
                if name == "mapValues" {
                    let mapped = it.apply(ev, &item, &key, &collection)?;
                    out.insert(key.to_property_key(), mapped);
                } else {
                    let mapped = it.apply(ev, &item, &key, &collection)?;
                    out.insert(mapped.to_property_key(), item);
                }
            }
            Value::from(enumeration_order(out))
        }
        "range" => range(ev, &args)?,
        "join" => {
            let sep = match arg(&args, 1) {
                Value::Undefined => ",".to_string(),
                other => other.to_display_string(),
            };
            ev.charge_footprint(&collection)?;
            ev.charge((collection.size() as u64).saturating_mul(sep.len() as u64))?;
            let parts: Vec<String> = items(&collection)
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                .collect();
            Value::from(parts.join(&sep))
        }
        "concat" => {
            let mut out = match &collection {
                Value::Array(list) => list.as_ref().clone(),
                other => vec![other.clone()],
            };
            for a in args.iter().skip(1) {
                match a {
                    Value::Array(list) => out.extend(list.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::from(out)
        }
        "difference" | "intersection" => {
            let others: Vec<HashSet<ValueKey>> = args
                .iter()
                .skip(1)
                .map(|a| items(a).iter().map(Value::key).collect())
                .collect();
            let keep = |v: &Value| {
                let key = v.key();
                if name == "difference" {
                    others.iter().all(|set| !set.contains(&key))
                } else {
                    others.iter().all(|set| set.contains(&key))
                }
            };
            let filtered: Vec<Value> = items(&collection).into_iter().filter(keep).collect();
            Value::from(unique_by_key(filtered, |v| Ok(v.key()))?)
        }
        "union" => {
            let all: Vec<Value> = args.iter().flat_map(items).collect();
            Value::from(unique_by_key(all, |v| Ok(v.key()))?)
        }
        "isEqual" => {
            let other = arg(&args, 1);
            ev.charge_footprint(&collection)?;
            ev.charge_footprint(&other)?;
            Value::Bool(is_equal(&collection, &other))
        }
        "isNil" => Value::Bool(collection.is_nullish()),
        "isArray" => Value::Bool(matches!(collection, Value::Array(_))),
        "isObject" => Value::Bool(matches!(
            collection,
            Value::Array(_) | Value::Object(_) | Value::Function(_)
        )),
        "isString" => Value::Bool(matches!(collection, Value::String(_))),
        "isNumber" => Value::Bool(matches!(collection, Value::Number(_))),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Call a namespace function as a method on a chain wrapper.
pub fn call_chain(ev: &mut Evaluator, inner: &Rc<Value>, name: &str, args: Vec<Value>) -> FnResult {
    match name {
        "value" | "valueOf" | "toJSON" => return Ok(Some(inner.as_ref().clone())),
        "chain" => return Ok(Some(Value::Chain(Rc::clone(inner)))),
        _ => {}
    }
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(inner.as_ref().clone());
    full.extend(args);
    Ok(call(ev, name, full)?.map(|v| match v {
        chained @ Value::Chain(_) => chained,
        plain => Value::Chain(Rc::new(plain)),
    }))
}

fn unique_by_key<F>(values: Vec<Value>, mut key: F) -> EvalResult<Vec<Value>>
where
    F: FnMut(&Value) -> EvalResult<ValueKey>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for v in values {
        if seen.insert(key(&v)?) {
            out.push(v);
        }
    }
    Ok(out)
}

fn sort_by_keys(
    ev: &mut Evaluator,
    collection: &Value,
    iteratees: &[Iteratee],
    descending: &[bool],
) -> EvalResult<Value> {
    let mut keyed = Vec::new();
    for (key, item) in entries(collection) {
        let mut keys = Vec::with_capacity(iteratees.len());
        for it in iteratees {
            keys.push(it.apply(ev, &item, &key, collection)?);
        }
        keyed.push((keys, item));
    }
    let sorted = merge_sort(ev, keyed, &mut |_, (a, _), (b, _)| {
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            let mut ord = compare_values(x, y);
            if descending.get(i).copied().unwrap_or(false) {
                ord = ord.reverse();
            }
            if ord.is_ne() {
                return Ok(ord);
            }
        }
        Ok(std::cmp::Ordering::Equal)
    })?;
    Ok(Value::from(
        sorted.into_iter().map(|(_, item)| item).collect::<Vec<_>>(),
    ))
}

fn range(ev: &mut Evaluator, args: &[Value]) -> EvalResult<Value> {
    let num = |v: Value| {
        let n = v.to_number();
        if n.is_nan() { 0.0 } else { n }
    };
    let (start, end) = match args.len() {
        0 => (0.0, 0.0),
        1 => (0.0, num(arg(args, 0))),
        _ => (num(arg(args, 0)), num(arg(args, 1))),
    };
    let step = match arg(args, 2) {
        Value::Undefined => {
            if end < start {
                -1.0
            } else {
                1.0
            }
        }
        other => num(other),
    };
    if !start.is_finite() || !end.is_finite() {
        return Err(EvalError::Range("Invalid range bounds".to_string()));
    }
    let len = if step == 0.0 {
        (end - start).abs().ceil()
    } else {
        ((end - start) / step).ceil().max(0.0)
    };
    ev.charge(len as u64)?;
    let mut out = Vec::with_capacity(len as usize);
    let mut current = start;
    for _ in 0..len as usize {
        out.push(Value::Number(current));
        current += step;
    }
    Ok(Value::from(out))
}

/// Groups values by the result of an iteratee, preserving first-seen order.
/// Shared with the sequence builder's `groupBy`.
pub(crate) fn group_values(
    ev: &mut Evaluator,
    values: Vec<Value>,
    key_fn: &Value,
) -> EvalResult<Vec<(Value, Vec<Value>)>> {
    let it = Iteratee::from_arg(key_fn.clone());
    let mut index: HashMap<ValueKey, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    let collection = Value::Undefined;
    for (i, item) in values.into_iter().enumerate() {
        let key = it.apply(ev, &item, &Value::from(i), &collection)?;
        match index.get(&key.key()) {
            Some(&slot) => groups[slot].1.push(item),
            None => {
                index.insert(key.key(), groups.len());
                groups.push((key, vec![item]));
            }
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("a.b[0].c"), vec!["a", "b", "0", "c"]);
        assert_eq!(parse_path("a[\"x.y\"]"), vec!["a", "x.y"]);
        assert_eq!(parse_path("name"), vec!["name"]);
    }

    #[test]
    fn test_is_match() {
        let value = Value::from_json(serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}}));
        let source = Value::from_json(serde_json::json!({"b": {"c": 2}}));
        assert!(is_match(&value, &source));
        let source = Value::from_json(serde_json::json!({"b": {"c": 3}}));
        assert!(!is_match(&value, &source));
    }
}
