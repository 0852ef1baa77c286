//! Parser tests using rstest for parameterization and insta for snapshots.

use insta::assert_snapshot;
use jsonni_kernel::ast::sexpr::format_expr;
use jsonni_kernel::parser::parse;
use rstest::rstest;

fn sexpr(input: &str) -> String {
    let expr = parse(input).unwrap_or_else(|e| panic!("Parse error for {input:?}: {e}"));
    format_expr(&expr)
}

// =============================================================================
// QUERY SHAPES
// =============================================================================

#[rstest]
#[case::identity("$input", "$input")]
#[case::numeric_members("$input.0._id", "(. (. $input 0) _id)")]
#[case::index_then_member("$input[0].name", "(. ([] $input 0) name)")]
#[case::native_map("$input.map(i => i * 2)", "(call (. $input map) (=> (i) (* i 2)))")]
#[case::utility_call("_.map($input, \"age\")", "(call (. _ map) $input \"age\")")]
#[case::utility_chain(
    "_.chain($input).filter(\"isActive\")",
    "(call (. (call (. _ chain) $input) filter) \"isActive\")"
)]
#[case::sequence("from($input).toArray()", "(call (. (call from $input) toArray))")]
#[case::keyword_property("$input.filter(i => i.default)", "(call (. $input filter) (=> (i) (. i default)))")]
fn test_query_shapes(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(sexpr(input), expected);
}

// =============================================================================
// OPERATORS
// =============================================================================

#[rstest]
#[case::additive_vs_multiplicative("a + b * c", "(+ a (* b c))")]
#[case::left_assoc("a - b - c", "(- (- a b) c)")]
#[case::exponent_right_assoc("a ** b ** c", "(** a (** b c))")]
#[case::and_binds_tighter("a && b || c", "(|| (&& a b) c)")]
#[case::nullish_lowest("a ?? b || c", "(?? a (|| b c))")]
#[case::strict_equality("a === b", "(=== a b)")]
#[case::loose_inequality("a != b", "(!= a b)")]
#[case::relational_in("\"k\" in o", "(in \"k\" o)")]
#[case::comparison_over_equality("a < b == c", "(== (< a b) c)")]
#[case::unary_not("!a", "(! a)")]
#[case::unary_minus("-1", "(- 1)")]
#[case::typeof_member("typeof a.b", "(typeof (. a b))")]
#[case::conditional("a ? b : c ? d : e", "(if a b (if c d e))")]
#[case::optional_member("a?.b", "(?. a b)")]
#[case::optional_index("a?.[0]", "(?[] a 0)")]
#[case::optional_call("f?.(x)", "(call? f x)")]
fn test_operators(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(sexpr(input), expected);
}

// =============================================================================
// LITERALS
// =============================================================================

#[test]
fn parser_array_literal_with_spread() {
    assert_snapshot!(sexpr("[1, 'two', ...rest]"), @r#"(array 1 "two" (... rest))"#);
}

#[test]
fn parser_object_literal_forms() {
    assert_snapshot!(
        sexpr("{a: 1, 'b c': true, [k]: null, d, ...e}"),
        @"(object (a 1) (b c true) ([k] null) (d d) (... e))"
    );
}

#[test]
fn parser_empty_collections() {
    assert_snapshot!(sexpr("[[], {}]"), @"(array (array) (object))");
}

#[test]
fn parser_number_keys_normalize() {
    assert_snapshot!(sexpr("{1.50: x}"), @"(object (1.5 x))");
}

// =============================================================================
// ARROW FUNCTIONS
// =============================================================================

#[test]
fn parser_arrow_params() {
    assert_snapshot!(sexpr("(a, b) => a + b"), @"(=> (a b) (+ a b))");
    assert_snapshot!(sexpr("() => 1"), @"(=> () 1)");
}

#[test]
fn parser_arrow_block_body() {
    assert_snapshot!(
        sexpr("(a, b) => { const c = a + b; return c; }"),
        @"(=> (a b) (block (let c (+ a b)) (return c)))"
    );
}

#[test]
fn parser_arrow_returning_object() {
    assert_snapshot!(
        sexpr("$input.map(i => ({id: i._id}))"),
        @"(call (. $input map) (=> (i) (object (id (. i _id)))))"
    );
}

#[test]
fn parser_nested_arrows() {
    assert_snapshot!(
        sexpr("a => b => a + b"),
        @"(=> (a) (=> (b) (+ a b)))"
    );
}

// =============================================================================
// ERRORS
// =============================================================================

#[rstest]
#[case::empty("")]
#[case::unclosed_call("$input.map(i => i")]
#[case::unclosed_array("[1, 2")]
#[case::dangling_operator("1 +")]
#[case::missing_arrow_body("i =>")]
#[case::trailing_garbage("$input )")]
#[case::unterminated_string("'abc")]
#[case::assignment("a = 1")]
fn test_parse_errors(#[case] input: &str) {
    assert!(parse(input).is_err(), "Expected error for input: {input:?}");
}

#[test]
fn parser_error_reports_offset() {
    let err = parse("$input.map(i => i))").expect_err("unbalanced");
    assert_eq!(err.to_string(), "unexpected token ')' at 18");
}
