//! Query evaluation across the four dialects.

use jsonni_kernel::{Dialect, EvalError, Limits, QueryPlan, Value};
use rstest::rstest;
use serde_json::json;

fn people() -> serde_json::Value {
    json!([
        {"_id": 1, "isActive": false, "age": 30, "name": "Meadows Parker", "tags": ["a", "b"]},
        {"_id": 2, "isActive": true, "age": 24, "name": "Alvarado Byers", "tags": ["b"]},
        {"_id": 3, "isActive": true, "age": 38, "name": "Hopper Wolfe", "tags": []},
        {"_id": 4, "isActive": true, "age": 21, "name": "Dalton Cherry", "tags": ["c"]},
        {"_id": 5, "isActive": false, "age": 33, "name": "Lina Mcgee", "tags": ["a"]}
    ])
}

fn run_with(query: &str, input: serde_json::Value, limits: Limits) -> Result<Option<serde_json::Value>, EvalError> {
    let plan = QueryPlan::build(query)?.unwrap_or_else(|| panic!("unsupported query {query:?}"));
    let value = plan.evaluate(Value::from_json(input), &limits)?;
    Ok(value.to_json())
}

fn run(query: &str, input: serde_json::Value) -> serde_json::Value {
    run_with(query, input, Limits::default())
        .unwrap_or_else(|e| panic!("{query}: {e}"))
        .unwrap_or_else(|| panic!("{query}: undefined result"))
}

fn run_err(query: &str, input: serde_json::Value) -> String {
    run_with(query, input, Limits::default())
        .expect_err("query should fail")
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════
// Dialect agreement
// ═══════════════════════════════════════════════════════════════════════════

#[rstest]
#[case::native("$input.map(i => i * 2)", Dialect::Native)]
#[case::utility("_.map($input, i => i * 2)", Dialect::Utility)]
#[case::utility_chain("_.chain($input).map(i => i * 2)", Dialect::Utility)]
#[case::sequence("from($input).map(i => i * 2).toArray()", Dialect::Sequence)]
fn test_doubling_agrees(#[case] query: &str, #[case] dialect: Dialect) {
    assert_eq!(Dialect::classify(query), Some(dialect));
    assert_eq!(run(query, json!([1, 2, 3, 4, 5])), json!([2, 4, 6, 8, 10]));
}

#[rstest]
#[case::native("$input.map(i => i * 2).filter(i => i > 4)")]
#[case::utility("_.filter(_.map($input, i => i * 2), i => i > 4)")]
#[case::utility_chain("_.chain($input).map(i => i * 2).filter(i => i > 4)")]
#[case::sequence("from($input).map(i => i * 2).filter(i => i > 4).toArray()")]
fn test_doubling_filter_agrees(#[case] query: &str) {
    assert_eq!(run(query, json!([1, 2, 3, 4, 5])), json!([6, 8, 10]));
}

#[rstest]
#[case::empty("")]
#[case::input("$input")]
#[case::input_semicolon("$input;")]
fn test_identity(#[case] query: &str) {
    assert_eq!(run(query, json!({"a": 1, "b": 2})), json!({"a": 1, "b": 2}));
}

// ═══════════════════════════════════════════════════════════════════════════
// Native
// ═══════════════════════════════════════════════════════════════════════════

#[rstest]
#[case::active_ids("$input.filter(i => i.isActive).map(i => i._id)", json!([2, 3, 4]))]
#[case::sort_copy("$input.map(i => i.age).sort((a, b) => a - b)", json!([21, 24, 30, 33, 38]))]
#[case::reduce("$input.reduce((acc, i) => acc + i.age, 0)", json!(146))]
#[case::find_name("$input.find(i => i.age > 35).name", json!("Hopper Wolfe"))]
#[case::flat_map("$input.flatMap(i => i.tags)", json!(["a", "b", "b", "c", "a"]))]
#[case::template_like("$input[0].name.split(\" \")[1].toUpperCase()", json!("PARKER"))]
#[case::object_build(
    "$input.slice(0, 2).map(i => ({id: i._id, name: i.name}))",
    json!([{"id": 1, "name": "Meadows Parker"}, {"id": 2, "name": "Alvarado Byers"}])
)]
#[case::object_spread("$input.map(i => ({...i, age: 25}))[1].age", json!(25))]
#[case::ternary("$input.map(i => i.age >= 30 ? \"senior\" : \"junior\")", json!(["senior", "junior", "senior", "junior", "senior"]))]
#[case::optional_chain("$input[7]?.name ?? \"none\"", json!("none"))]
#[case::conditional_fraction("$input.length>1?.5:1", json!(0.5))]
#[case::math("Math.max(...$input.map(i => i.age))", json!(38))]
#[case::object_keys("Object.keys($input[0])", json!(["_id", "isActive", "age", "name", "tags"]))]
#[case::json_roundtrip("JSON.parse(JSON.stringify($input[3])).name", json!("Dalton Cherry"))]
#[case::block_body(
    "$input.map(i => { const decade = Math.floor(i.age / 10); return decade * 10; })",
    json!([30, 20, 30, 20, 30])
)]
#[case::recursion(
    "$input.map(i => { const fact = n => n <= 1 ? 1 : n * fact(n - 1); return fact(i._id); })",
    json!([1, 2, 6, 24, 120])
)]
fn test_native(#[case] query: &str, #[case] expected: serde_json::Value) {
    assert_eq!(run(query, people()), expected);
}

#[test]
fn test_methods_do_not_mutate_input() {
    assert_eq!(run("[$input.reverse()[0]._id, $input[0]._id]", people()), json!([5, 1]));
    assert_eq!(
        run("[$input.sort((a, b) => b.age - a.age)[0]._id, $input[0]._id]", people()),
        json!([3, 1])
    );
}

#[test]
fn test_destructuring_is_a_syntax_error() {
    let err = run_err("$input.map(({name}) => name)", people());
    assert!(err.starts_with("SyntaxError:"), "{err}");
}

// ═══════════════════════════════════════════════════════════════════════════
// Utility
// ═══════════════════════════════════════════════════════════════════════════

#[rstest]
#[case::chain_filter_map("_.chain($input).filter(\"isActive\").map(\"_id\")", json!([2, 3, 4]))]
#[case::matches_shorthand("_.map(_.filter($input, {isActive: false}), \"name\")", json!(["Meadows Parker", "Lina Mcgee"]))]
#[case::property_pair("_.find($input, [\"age\", 21]).name", json!("Dalton Cherry"))]
#[case::sort_by("_.map(_.sortBy($input, \"age\"), \"_id\")", json!([4, 2, 1, 5, 3]))]
#[case::order_by_desc("_.map(_.orderBy($input, [\"age\"], [\"desc\"]), \"_id\")", json!([3, 5, 1, 2, 4]))]
#[case::count_by("_.countBy($input, \"isActive\")", json!({"false": 2, "true": 3}))]
#[case::group_by_keys("_.keys(_.groupBy($input, i => i.age >= 30 ? \"old\" : \"young\"))", json!(["old", "young"]))]
#[case::key_by_names("_.mapValues(_.keyBy($input, \"_id\"), \"age\")", json!({"1": 30, "2": 24, "3": 38, "4": 21, "5": 33}))]
#[case::partition("_.partition(_.map($input, \"_id\"), n => n % 2)", json!([[1, 3, 5], [2, 4]]))]
#[case::uniq_flatten("_.uniq(_.flatten(_.map($input, \"tags\")))", json!(["a", "b", "c"]))]
#[case::sum_by("_.sumBy($input, \"age\")", json!(146))]
#[case::mean("_.mean(_.map($input, \"_id\"))", json!(3))]
#[case::max_by("_.maxBy($input, \"age\").name", json!("Hopper Wolfe"))]
#[case::pick("_.pick($input[0], [\"name\", \"age\"])", json!({"name": "Meadows Parker", "age": 30}))]
#[case::omit("_.omit($input[0], [\"tags\", \"isActive\", \"_id\"])", json!({"age": 30, "name": "Meadows Parker"}))]
#[case::get_path("_.get($input, \"[0].tags[1]\")", json!("b"))]
#[case::get_default("_.get($input, \"9.name\", \"n/a\")", json!("n/a"))]
#[case::chunk("_.chunk(_.range(5), 2)", json!([[0, 1], [2, 3], [4]]))]
#[case::take_right("_.takeRight(_.map($input, \"_id\"), 2)", json!([4, 5]))]
#[case::chain_value_explicit("_.chain($input).map(\"age\").sum().value()", json!(146))]
#[case::to_pairs("_.toPairs({a: 1})", json!([["a", 1]]))]
#[case::group_by_integer_keys_first(
    "_.keys(_.groupBy([3, \"b\", 1, \"a\", 2], i => i))",
    json!(["1", "2", "3", "b", "a"])
)]
#[case::count_by_integer_keys_ascending(
    "Object.keys(_.countBy([10, 9, 10], i => i))",
    json!(["9", "10"])
)]
fn test_utility(#[case] query: &str, #[case] expected: serde_json::Value) {
    assert_eq!(run(query, people()), expected);
}

// ═══════════════════════════════════════════════════════════════════════════
// Sequence
// ═══════════════════════════════════════════════════════════════════════════

#[rstest]
#[case::filter_map("from($input).filter(i => i.isActive).map(i => i._id).toArray()", json!([2, 3, 4]))]
#[case::sort_desc("from($input).sortByDescending(i => i.age).map(i => i._id).toArray()", json!([3, 5, 1, 2, 4]))]
#[case::take_skip("from($input).skip(1).take(2).map(i => i._id).toArray()", json!([2, 3]))]
#[case::take_while("from($input).takeWhile(i => i._id < 3).map(i => i._id).toArray()", json!([1, 2]))]
#[case::distinct("from($input).flatMap(i => i.tags).distinct().toArray()", json!(["a", "b", "c"]))]
#[case::group_by(
    "from($input).groupBy(i => i.isActive, i => i._id).toArray()",
    json!([{"key": false, "items": [1, 5]}, {"key": true, "items": [2, 3, 4]}])
)]
#[case::to_object("from($input).take(2).toObject(i => i.name, i => i.age)", json!({"Meadows Parker": 30, "Alvarado Byers": 24}))]
#[case::object_pairs("from({a: 1, b: 2}).map(p => p[0]).toArray()", json!(["a", "b"]))]
#[case::first("from($input).first(i => i.age < 25).name", json!("Alvarado Byers"))]
#[case::sum("from($input).sum(i => i.age)", json!(146))]
#[case::count("from($input).count(i => i.isActive)", json!(3))]
#[case::concat_prepend("from([2]).concat([3]).prepend([1]).toArray()", json!([1, 2, 3]))]
fn test_sequence(#[case] query: &str, #[case] expected: serde_json::Value) {
    assert_eq!(run(query, people()), expected);
}

#[test]
fn test_unmaterialized_sequence_is_undefined() {
    let out = run_with("from($input).map(i => i)", json!([1]), Limits::default()).expect("evaluates");
    assert_eq!(out, None);
}

#[test]
fn test_from_rejects_scalars() {
    assert_eq!(
        run_err("from(1).toArray()", json!(null)),
        "TypeError: from() expects an array or object, got number"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Sandbox
// ═══════════════════════════════════════════════════════════════════════════

#[rstest]
#[case::no_utility_in_native("$input.map(i => _.identity(i))", "ReferenceError: _ is not defined")]
#[case::no_from_in_native("$input.map(i => from(i))", "ReferenceError: from is not defined")]
#[case::no_utility_in_sequence("from($input).map(i => _.identity(i)).toArray()", "ReferenceError: _ is not defined")]
#[case::no_from_in_utility("_.map($input, i => from(i))", "ReferenceError: from is not defined")]
#[case::no_process("$input.map(i => process.exit(1))", "ReferenceError: process is not defined")]
#[case::no_require("$input.map(i => require(\"fs\"))", "ReferenceError: require is not defined")]
fn test_capabilities_are_scoped(#[case] query: &str, #[case] message: &str) {
    assert_eq!(run_err(query, json!([1])), message);
}

#[test]
fn test_step_limit() {
    let limits = Limits {
        max_steps: 10_000,
        max_depth: 64,
    };
    let err = run_with("_.range(1000000)", json!(null), limits).expect_err("too many steps");
    assert!(matches!(err, EvalError::StepLimit(10_000)));
    assert!(err.to_string().starts_with("RangeError:"));
}

#[test]
fn test_depth_limit() {
    let limits = Limits {
        max_steps: 1_000_000,
        max_depth: 64,
    };
    let err = run_with(
        "$input.map(i => { const f = n => f(n + 1); return f(i); })",
        json!([1]),
        limits,
    )
    .expect_err("runaway recursion");
    assert_eq!(err, EvalError::StackOverflow);
}

fn small_budget() -> Limits {
    Limits {
        max_steps: 100_000,
        max_depth: 256,
    }
}

#[rstest]
#[case::string_doubling(
    "$input.length + (() => { const f = (s, n) => n ? f(s + s, n - 1) : s.length; return f(\"x\", 40); })()"
)]
#[case::string_concat_method(
    "$input.length + (() => { const f = (s, n) => n ? f(s.concat(s), n - 1) : s.length; return f(\"x\", 40); })()"
)]
#[case::stringify_shared_arrays(
    "$input.length + (() => { const f = (a, n) => n ? f([a, a], n - 1) : a; return JSON.stringify(f(1, 40)).length; })()"
)]
#[case::concat_shared_arrays(
    "$input.length + (() => { const f = (a, n) => n ? f([a, a], n - 1) : a; return (f(1, 40) + \"\").length; })()"
)]
#[case::join_shared_arrays(
    "$input.length + (() => { const f = (a, n) => n ? f([a, a], n - 1) : a; return f(1, 40).join(\"-\").length; })()"
)]
#[case::result_shared_arrays("$input.map(x => { const f = (a, n) => n ? f([a, a], n - 1) : a; return f(x, 40); })")]
#[case::utility_join("_.join(_.map(_.range(40), (n) => \"x\".repeat(2000)), \"y\".repeat(2000))")]
fn test_output_growth_is_budgeted(#[case] query: &str) {
    let err = run_with(query, json!([1]), small_budget()).expect_err("budget exhausted");
    assert!(matches!(err, EvalError::StepLimit(100_000)), "{err}");
}

#[test]
fn test_deeply_nested_result() {
    let err = run_with("_.reduce(_.range(600), a => [a], 1)", json!(null), Limits::default())
        .expect_err("too deep to print");
    assert_eq!(err.to_string(), "RangeError: value nested deeper than 512 levels");
}

#[test]
fn test_repeated_input_within_budget() {
    assert_eq!(
        run("$input.map(i => [i._id, i._id]).slice(0, 2)", people()),
        json!([[1, 1], [2, 2]])
    );
    let out = run_with("$input.map(i => [i, i])", people(), small_budget()).expect("fits budget");
    assert_eq!(out.map(|v| v.as_array().map(Vec::len)), Some(Some(5)));
}

#[test]
fn test_unsupported_queries() {
    for query in ["foo", "Math.max(1, 2)", "[1, 2]", "input.map(i => i)"] {
        assert!(QueryPlan::build(query).expect("no syntax check").is_none(), "{query}");
    }
}
