//! Input normalization.
//!
//! Raw stdin text plus a declared format becomes a single [`Value`]. JSON
//! that does not parse is retried as a relaxed object/array literal and
//! finally kept as an opaque string; delimited text becomes an array of
//! row objects.

use std::sync::LazyLock;

use regex::Regex;

use crate::format::DataFormat;
use crate::interpreter::{Evaluator, Limits};
use crate::parser;
use crate::value::{Object, Value, parse_number};

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?$").expect("valid numeric regex")
});

/// How the input text was understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// JSON text, or delimited text converted to rows.
    Json,
    /// A relaxed literal such as `{a: 1, b: 'x'}`.
    Literal,
    /// Neither; the value is the raw text.
    Text,
}

#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub value: Value,
    pub kind: InputKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub format: DataFormat,
    pub delimiter: u8,
    /// Column names for header-less delimited input.
    pub header: Option<Vec<String>>,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            format: DataFormat::Json,
            delimiter: b',',
            header: None,
        }
    }
}

/// Normalize raw input text. Never fails; unparseable text is kept as a string.
#[tracing::instrument(level = "debug", skip(text, spec), fields(format = %spec.format, len = text.len()))]
pub fn read_input(text: &str, spec: &InputSpec) -> NormalizedInput {
    match spec.format {
        DataFormat::Json => read_structured(text),
        DataFormat::Csv | DataFormat::Tsv => NormalizedInput {
            value: read_delimited(text, spec.delimiter, spec.header.as_deref()),
            kind: InputKind::Json,
        },
    }
}

fn read_structured(text: &str) -> NormalizedInput {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => NormalizedInput {
            value: Value::from_json(json),
            kind: InputKind::Json,
        },
        Err(e) => {
            tracing::debug!(error = %e, "input is not JSON");
            match read_literal(text) {
                Some(value) => NormalizedInput {
                    value,
                    kind: InputKind::Literal,
                },
                None => NormalizedInput {
                    value: Value::from(text),
                    kind: InputKind::Text,
                },
            }
        }
    }
}

/// Accept literal data only: no identifiers, calls or operators beyond
/// a numeric sign.
fn read_literal(text: &str) -> Option<Value> {
    let source = text.trim().trim_end_matches(';');
    let expr = parser::parse(source).ok()?;
    if !expr.is_data_literal() {
        return None;
    }
    Evaluator::new(Limits::default())
        .evaluate(&expr, Value::Undefined)
        .ok()
}

fn read_delimited(text: &str, delimiter: u8, header: Option<&[String]>) -> Value {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let mut names: Option<Vec<String>> = header.map(<[String]>::to_vec);
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line + 1, error = %e, "skipping malformed record");
                continue;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if names.is_none() {
            names = Some(record.iter().map(str::to_string).collect());
            continue;
        }
        let columns = names.as_deref().unwrap_or_default();
        let row: Object = record
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let key = columns
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("field{}", i + 1));
                (key, infer(cell))
            })
            .collect();
        rows.push(Value::from(row));
    }
    tracing::debug!(rows = rows.len(), "read delimited input");
    Value::from(rows)
}

/// Numeric text becomes a number, `true`/`false` a boolean.
fn infer(cell: &str) -> Value {
    match cell {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ if NUMERIC.is_match(cell) => Value::Number(parse_number(cell)),
        _ => Value::from(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(text: &str, header: Option<Vec<String>>) -> Value {
        read_input(
            text,
            &InputSpec {
                format: DataFormat::Csv,
                delimiter: b',',
                header,
            },
        )
        .value
    }

    #[test]
    fn test_infer() {
        assert!(matches!(infer("42"), Value::Number(n) if n == 42.0));
        assert!(matches!(infer("-1.5e3"), Value::Number(n) if n == -1500.0));
        assert!(matches!(infer("true"), Value::Bool(true)));
        assert!(matches!(infer("TRUE"), Value::String(_)));
        assert!(matches!(infer(""), Value::String(_)));
        assert!(matches!(infer("12abc"), Value::String(_)));
    }

    #[test]
    fn test_json_then_literal_then_text() {
        let spec = InputSpec::default();
        assert_eq!(read_input("[1, 2]", &spec).kind, InputKind::Json);

        let relaxed = read_input("{a: 1, b: 'x'}", &spec);
        assert_eq!(relaxed.kind, InputKind::Literal);
        assert_eq!(relaxed.value.get_property("b").to_display_string(), "x");

        let text = read_input("hello world", &spec);
        assert_eq!(text.kind, InputKind::Text);
        assert_eq!(text.value.to_display_string(), "hello world");
    }

    #[test]
    fn test_literal_rejects_code() {
        let spec = InputSpec::default();
        assert_eq!(read_input("[1, foo()]", &spec).kind, InputKind::Text);
        assert_eq!(read_input("{a: 1 + 2}", &spec).kind, InputKind::Text);
    }

    #[test]
    fn test_short_and_long_rows() {
        let rows = csv("a,b\n1\n1,2,3\n\n", None);
        assert_eq!(rows.size(), 2);
        let first = rows.get_property("0");
        assert!(!first.has_own("b"));
        let second = rows.get_property("1");
        assert!(matches!(second.get_property("field3"), Value::Number(n) if n == 3.0));
    }

    #[test]
    fn test_explicit_header_keeps_first_line() {
        let rows = csv("1,x\n2,y", Some(vec!["id".into(), "name".into()]));
        assert_eq!(rows.size(), 2);
        assert_eq!(rows.get_property("1").get_property("name").to_display_string(), "y");
    }
}
