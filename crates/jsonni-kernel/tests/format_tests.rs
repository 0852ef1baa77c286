//! Output rendering from normalized input through `format_result`.

use insta::assert_snapshot;
use jsonni_kernel::{
    DataFormat, InputKind, InputSpec, OutputSpec, Value, format_result, read_input,
};
use rstest::rstest;
use serde_json::json;

fn render(value: serde_json::Value, spec: &OutputSpec) -> String {
    format_result(&Value::from_json(value), spec, InputKind::Json).expect("formats")
}

fn delimited(format: DataFormat, fields: Option<&[&str]>) -> OutputSpec {
    OutputSpec {
        format,
        delimiter: format.default_delimiter(),
        fields: fields.map(|f| f.iter().map(|s| s.to_string()).collect()),
        ..OutputSpec::default()
    }
}

// =============================================================================
// JSON
// =============================================================================

#[test]
fn json_pretty_default_indent() {
    assert_snapshot!(
        render(json!([{"a": 1, "b": [1, 2]}]), &OutputSpec::default()),
        @r#"
    [
      {
        "a": 1,
        "b": [
          1,
          2
        ]
      }
    ]
    "#
    );
}

#[test]
fn json_minified() {
    let spec = OutputSpec {
        minify: true,
        ..OutputSpec::default()
    };
    assert_snapshot!(
        render(json!([{"a": 1, "b": "x y"}]), &spec),
        @r#"[{"a":1,"b":"x y"}]"#
    );
}

#[test]
fn json_empty_indent_is_compact() {
    let spec = OutputSpec {
        indent: String::new(),
        ..OutputSpec::default()
    };
    assert_eq!(render(json!({"a": [1, 2]}), &spec), r#"{"a":[1,2]}"#);
}

#[test]
fn json_custom_indent() {
    let spec = OutputSpec {
        indent: "\t".to_string(),
        ..OutputSpec::default()
    };
    assert_eq!(render(json!({"a": 1}), &spec), "{\n\t\"a\": 1\n}");
}

#[rstest]
#[case::string(json!("Meadows Parker"), "\"Meadows Parker\"")]
#[case::number(json!(146), "146")]
#[case::boolean(json!(false), "false")]
#[case::null(json!(null), "null")]
#[case::empty_array(json!([]), "[]")]
fn json_scalars(#[case] value: serde_json::Value, #[case] expected: &str) {
    assert_eq!(render(value, &OutputSpec::default()), expected);
}

#[test]
fn undefined_prints_as_word() {
    for spec in [OutputSpec::default(), delimited(DataFormat::Csv, None)] {
        let out = format_result(&Value::Undefined, &spec, InputKind::Json).expect("formats");
        assert_eq!(out, "undefined");
    }
}

// =============================================================================
// LITERAL DUMP
// =============================================================================

#[test]
fn relaxed_input_dumps_as_literal() {
    let input = read_input(
        "{name: 'Meadows Parker', 'first-seen': 2017, tags: ['a']}",
        &InputSpec::default(),
    );
    assert_eq!(input.kind, InputKind::Literal);
    let out = format_result(&input.value, &OutputSpec::default(), input.kind).expect("formats");
    assert_snapshot!(out, @r#"
    {
      name: "Meadows Parker",
      "first-seen": 2017,
      tags: [
        "a"
      ]
    }
    "#);
}

#[test]
fn literal_dump_minified() {
    let spec = OutputSpec {
        minify: true,
        ..OutputSpec::default()
    };
    let input = read_input("{a: 'x y', b: [1, 2]}", &InputSpec::default());
    let out = format_result(&input.value, &spec, input.kind).expect("formats");
    assert_eq!(out, r#"{a:"x y",b:[1,2]}"#);
}

// =============================================================================
// CSV / TSV
// =============================================================================

#[test]
fn csv_records() {
    let out = render(
        json!([
            {"_id": 1, "isActive": false, "name": "Meadows Parker"},
            {"_id": 2, "isActive": true, "name": "Alvarado \"Al\" Byers"}
        ]),
        &delimited(DataFormat::Csv, None),
    );
    assert_snapshot!(out, @r#"
    "_id","isActive","name"
    1,false,"Meadows Parker"
    2,true,"Alvarado ""Al"" Byers"
    "#);
}

#[test]
fn tsv_uses_tab() {
    let out = render(json!([{"a": 1, "b": "x"}]), &delimited(DataFormat::Tsv, None));
    assert_eq!(out, "\"a\"\t\"b\"\n1\t\"x\"");
}

#[test]
fn custom_delimiter() {
    let spec = OutputSpec {
        delimiter: b';',
        ..delimited(DataFormat::Csv, None)
    };
    assert_eq!(render(json!([{"a": 1, "b": 2}]), &spec), "\"a\";\"b\"\n1;2");
}

#[test]
fn header_is_union_of_keys() {
    let out = render(json!([{"a": 1}, {"b": 2}]), &delimited(DataFormat::Csv, None));
    assert_eq!(out, "\"a\",\"b\"\n1,\n,2");
}

#[test]
fn scalars_fill_value_column() {
    let out = render(json!([1, "a", true, null]), &delimited(DataFormat::Csv, None));
    assert_eq!(out, "\"value\"\n1\n\"a\"\ntrue\n");
}

#[test]
fn single_object_is_one_record() {
    let out = render(json!({"name": "x", "age": 3}), &delimited(DataFormat::Csv, None));
    assert_eq!(out, "\"name\",\"age\"\n\"x\",3");
}

#[test]
fn nested_values_become_json_cells() {
    let out = render(
        json!([{"a": {"b": 1}, "c": [1, "x"]}]),
        &delimited(DataFormat::Csv, None),
    );
    assert_snapshot!(out, @r#"
    "a","c"
    "{""b"":1}","[1,""x""]"
    "#);
}

#[test]
fn fields_select_and_reach_into_nested_values() {
    let out = render(
        json!([{"a": {"b": 1}, "c": [7, 8], "d": "skip"}]),
        &delimited(DataFormat::Csv, Some(&["c[1]", "a.b", "missing"])),
    );
    assert_eq!(out, "\"c[1]\",\"a.b\",\"missing\"\n8,1,");
}

#[test]
fn empty_array_has_no_output() {
    assert_eq!(render(json!([]), &delimited(DataFormat::Csv, None)), "");
}

#[test]
fn csv_input_round_trips() {
    let text = "\"_id\",\"name\"\n1,\"Meadows Parker\"\n2,\"Alvarado Byers\"";
    let input = read_input(
        text,
        &InputSpec {
            format: DataFormat::Csv,
            ..InputSpec::default()
        },
    );
    let out = format_result(&input.value, &delimited(DataFormat::Csv, None), input.kind)
        .expect("formats");
    assert_eq!(out, text);
}
