//! The `from` sequence builder.
//!
//! `from(x)` starts a deferred pipeline over an array's items or an object's
//! `[key, value]` pairs. Transformations such as `map` and `filter` only
//! record an operation; nothing is evaluated until a terminal method like
//! `toArray()` or `first()` pulls the values through.
//!
//! ```text
//! from($input).filter(u => u.isActive).map(u => u.name).toArray()
//! ```

use std::collections::HashSet;
use std::rc::Rc;

use crate::interpreter::natives::{arg, callback, merge_sort};
use crate::interpreter::{EvalError, EvalResult, Evaluator};
use crate::value::{Object, Value, compare_values};

use super::utility::group_values;

/// A deferred pipeline: source values plus the operations to apply.
#[derive(Debug, Clone)]
pub struct Sequence {
    source: Rc<Vec<Value>>,
    ops: Vec<Op>,
}

#[derive(Debug, Clone)]
enum Op {
    Map(Value),
    Filter(Value),
    FlatMap(Value),
    Take(usize),
    Skip(usize),
    TakeWhile(Value),
    SkipWhile(Value),
    Distinct,
    DistinctBy(Value),
    Reverse,
    SortBy { key: Value, compare: Value, descending: bool },
    GroupBy { key: Value, value: Value },
    Concat(Vec<Value>),
    Prepend(Vec<Value>),
}

impl Sequence {
    fn new(source: Vec<Value>) -> Self {
        Self {
            source: Rc::new(source),
            ops: Vec::new(),
        }
    }

    fn then(&self, op: Op) -> Value {
        let mut next = self.clone();
        next.ops.push(op);
        Value::Sequence(Rc::new(next))
    }
}

/// `from(x)`: start a sequence.
pub fn from(ev: &mut Evaluator, args: Vec<Value>) -> EvalResult<Value> {
    let source = arg(&args, 0);
    let items = match &source {
        Value::Sequence(_) => return Ok(source),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Value::from(vec![Value::from(k.as_str()), v.clone()]))
            .collect(),
        other => ev.iterate(other, "from() argument").map_err(|_| {
            EvalError::Type(format!(
                "from() expects an array or object, got {}",
                other.kind_name()
            ))
        })?,
    };
    tracing::trace!(len = items.len(), "sequence created");
    Ok(Value::Sequence(Rc::new(Sequence::new(items))))
}

/// Run every recorded operation and collect the results.
pub fn materialize(ev: &mut Evaluator, seq: &Sequence) -> EvalResult<Vec<Value>> {
    let mut items = seq.source.as_ref().clone();
    ev.charge(items.len() as u64)?;
    for op in &seq.ops {
        items = apply(ev, op, items)?;
    }
    Ok(items)
}

fn apply(ev: &mut Evaluator, op: &Op, items: Vec<Value>) -> EvalResult<Vec<Value>> {
    Ok(match op {
        Op::Map(f) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                out.push(ev.invoke(f, vec![item, Value::from(i)])?);
            }
            out
        }
        Op::Filter(f) => {
            let mut out = Vec::new();
            for (i, item) in items.into_iter().enumerate() {
                if ev.invoke(f, vec![item.clone(), Value::from(i)])?.truthy() {
                    out.push(item);
                }
            }
            out
        }
        Op::FlatMap(f) => {
            let mut out = Vec::new();
            for (i, item) in items.into_iter().enumerate() {
                let produced = ev.invoke(f, vec![item, Value::from(i)])?;
                match produced {
                    Value::Array(_) | Value::Sequence(_) => {
                        out.extend(ev.iterate(&produced, "flatMap result")?)
                    }
                    other => out.push(other),
                }
            }
            out
        }
        Op::Take(n) => items.into_iter().take(*n).collect(),
        Op::Skip(n) => items.into_iter().skip(*n).collect(),
        Op::TakeWhile(f) => {
            let mut out = Vec::new();
            for (i, item) in items.into_iter().enumerate() {
                if !ev.invoke(f, vec![item.clone(), Value::from(i)])?.truthy() {
                    break;
                }
                out.push(item);
            }
            out
        }
        Op::SkipWhile(f) => {
            let mut out = Vec::new();
            let mut skipping = true;
            for (i, item) in items.into_iter().enumerate() {
                if skipping && ev.invoke(f, vec![item.clone(), Value::from(i)])?.truthy() {
                    continue;
                }
                skipping = false;
                out.push(item);
            }
            out
        }
        Op::Distinct => {
            let mut seen = HashSet::new();
            items.into_iter().filter(|v| seen.insert(v.key())).collect()
        }
        Op::DistinctBy(f) => {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for item in items {
                if seen.insert(ev.invoke(f, vec![item.clone()])?.key()) {
                    out.push(item);
                }
            }
            out
        }
        Op::Reverse => items.into_iter().rev().collect(),
        Op::SortBy {
            key,
            compare,
            descending,
        } => {
            let mut keyed = Vec::with_capacity(items.len());
            for item in items {
                let k = if key.is_callable() {
                    ev.invoke(key, vec![item.clone()])?
                } else {
                    item.clone()
                };
                keyed.push((k, item));
            }
            let descending = *descending;
            let sorted = merge_sort(ev, keyed, &mut |ev, (a, _), (b, _)| {
                let ord = if compare.is_callable() {
                    let n = ev.invoke(compare, vec![a.clone(), b.clone()])?.to_number();
                    n.partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal)
                } else {
                    compare_values(a, b)
                };
                Ok(if descending { ord.reverse() } else { ord })
            })?;
            sorted.into_iter().map(|(_, item)| item).collect()
        }
        Op::GroupBy { key, value } => {
            let mut out = Vec::new();
            for (k, members) in group_values(ev, items, key)? {
                let members = if value.is_callable() {
                    let mut mapped = Vec::with_capacity(members.len());
                    for m in members {
                        mapped.push(ev.invoke(value, vec![m])?);
                    }
                    mapped
                } else {
                    members
                };
                let mut group = Object::new();
                group.insert("key".to_string(), k);
                group.insert("items".to_string(), Value::from(members));
                out.push(Value::from(group));
            }
            out
        }
        Op::Concat(others) => {
            let mut out = items;
            for other in others {
                out.extend(spread(ev, other)?);
            }
            out
        }
        Op::Prepend(others) => {
            let mut out = Vec::new();
            for other in others {
                out.extend(spread(ev, other)?);
            }
            out.extend(items);
            out
        }
    })
}

/// Arrays and sequences contribute their items; anything else is one item.
fn spread(ev: &mut Evaluator, value: &Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::Array(_) | Value::Sequence(_) => ev.iterate(value, "sequence argument"),
        other => Ok(vec![other.clone()]),
    }
}

fn count_arg(args: &[Value]) -> usize {
    let n = arg(args, 0).to_number();
    if n.is_nan() || n < 0.0 { 0 } else { n as usize }
}

/// Call a lazy or terminal method on a sequence.
pub fn call_method(
    ev: &mut Evaluator,
    seq: &Rc<Sequence>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Option<Value>> {
    let value = match name {
        // Lazy
        "map" => seq.then(Op::Map(callback(&args, 0, name)?)),
        "filter" | "where" => seq.then(Op::Filter(callback(&args, 0, name)?)),
        "flatMap" => seq.then(Op::FlatMap(callback(&args, 0, name)?)),
        "take" => seq.then(Op::Take(count_arg(&args))),
        "skip" => seq.then(Op::Skip(count_arg(&args))),
        "takeWhile" => seq.then(Op::TakeWhile(callback(&args, 0, name)?)),
        "skipWhile" => seq.then(Op::SkipWhile(callback(&args, 0, name)?)),
        "distinct" => seq.then(Op::Distinct),
        "distinctBy" => seq.then(Op::DistinctBy(callback(&args, 0, name)?)),
        "reverse" => seq.then(Op::Reverse),
        "sortBy" | "sortByDescending" => seq.then(Op::SortBy {
            key: arg(&args, 0),
            compare: arg(&args, 1),
            descending: name == "sortByDescending",
        }),
        "groupBy" => seq.then(Op::GroupBy {
            key: arg(&args, 0),
            value: arg(&args, 1),
        }),
        "concat" | "append" => seq.then(Op::Concat(args)),
        "prepend" => seq.then(Op::Prepend(args)),

        // Terminal
        "toArray" => Value::from(materialize(ev, seq)?),
        "toObject" => {
            let key_fn = callback(&args, 0, name)?;
            let value_fn = arg(&args, 1);
            let mut out = Object::new();
            for item in materialize(ev, seq)? {
                let key = ev.invoke(&key_fn, vec![item.clone()])?.to_property_key();
                let value = if value_fn.is_callable() {
                    ev.invoke(&value_fn, vec![item])?
                } else {
                    item
                };
                out.insert(key, value);
            }
            Value::from(out)
        }
        "first" | "find" | "last" => {
            let predicate = arg(&args, 0);
            let mut items = materialize(ev, seq)?;
            if name == "last" {
                items.reverse();
            }
            let mut found = Value::Undefined;
            for item in items {
                if !predicate.is_callable() || ev.invoke(&predicate, vec![item.clone()])?.truthy() {
                    found = item;
                    break;
                }
            }
            found
        }
        "some" | "every" => {
            let predicate = arg(&args, 0);
            let items = materialize(ev, seq)?;
            if !predicate.is_callable() {
                Value::Bool(name == "every" || !items.is_empty())
            } else {
                let want = name == "some";
                let mut result = !want;
                for item in items {
                    if ev.invoke(&predicate, vec![item])?.truthy() == want {
                        result = want;
                        break;
                    }
                }
                Value::Bool(result)
            }
        }
        "includes" => {
            let needle = arg(&args, 0);
            Value::Bool(materialize(ev, seq)?.iter().any(|v| v.same_value_zero(&needle)))
        }
        "reduce" => {
            let f = callback(&args, 0, name)?;
            let mut items = materialize(ev, seq)?.into_iter().enumerate();
            let mut acc = if args.len() > 1 {
                arg(&args, 1)
            } else {
                match items.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(EvalError::Type(
                            "Reduce of empty sequence with no initial value".to_string(),
                        ));
                    }
                }
            };
            for (i, item) in items {
                acc = ev.invoke(&f, vec![acc, item, Value::from(i)])?;
            }
            acc
        }
        "sum" => {
            let selector = arg(&args, 0);
            let mut total = 0.0;
            for item in materialize(ev, seq)? {
                let v = if selector.is_callable() {
                    ev.invoke(&selector, vec![item])?
                } else {
                    item
                };
                total += v.to_number();
            }
            Value::Number(total)
        }
        "count" => {
            let predicate = arg(&args, 0);
            let items = materialize(ev, seq)?;
            if predicate.is_callable() {
                let mut n = 0usize;
                for item in items {
                    if ev.invoke(&predicate, vec![item])?.truthy() {
                        n += 1;
                    }
                }
                Value::from(n)
            } else {
                Value::from(items.len())
            }
        }
        "isEmpty" => Value::Bool(materialize(ev, seq)?.is_empty()),
        "forEach" => {
            let f = callback(&args, 0, name)?;
            for (i, item) in materialize(ev, seq)?.into_iter().enumerate() {
                ev.invoke(&f, vec![item, Value::from(i)])?;
            }
            Value::Undefined
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Limits;

    fn numbers(ns: &[f64]) -> Value {
        Value::from(ns.iter().map(|n| Value::Number(*n)).collect::<Vec<_>>())
    }

    #[test]
    fn nothing_runs_before_a_terminal() {
        let mut ev = Evaluator::new(Limits::default());
        let seq = from(&mut ev, vec![numbers(&[1.0, 2.0, 3.0])]).unwrap();
        let Value::Sequence(seq) = seq else { panic!("expected a sequence") };
        let before = ev.steps();
        let reversed = call_method(&mut ev, &seq, "reverse", vec![]).unwrap().unwrap();
        assert_eq!(ev.steps(), before);
        assert!(reversed.to_json().is_none());
    }

    #[test]
    fn object_source_yields_pairs() {
        let mut ev = Evaluator::new(Limits::default());
        let obj = Value::from_json(serde_json::json!({"a": 1, "b": 2}));
        let Value::Sequence(seq) = from(&mut ev, vec![obj]).unwrap() else {
            panic!("expected a sequence")
        };
        let out = call_method(&mut ev, &seq, "toArray", vec![]).unwrap().unwrap();
        assert_eq!(out.to_json(), Some(serde_json::json!([["a", 1], ["b", 2]])));
    }

    #[test]
    fn from_rejects_scalars() {
        let mut ev = Evaluator::new(Limits::default());
        let err = from(&mut ev, vec![Value::Number(3.0)]).unwrap_err();
        assert!(err.to_string().starts_with("TypeError: from() expects"));
    }
}
