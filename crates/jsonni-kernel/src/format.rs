//! Result formatting: JSON, source-literal dump and delimited text.

use std::fmt::Write as _;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::capabilities::utility::{get_path, parse_path};
use crate::lexer::unescape;
use crate::reader::InputKind;
use crate::value::{Object, Value, format_number};

/// Data formats understood on input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Json,
    Csv,
    Tsv,
}

impl DataFormat {
    /// Delimiter used when none is configured.
    pub fn default_delimiter(self) -> u8 {
        match self {
            DataFormat::Tsv => b'\t',
            DataFormat::Json | DataFormat::Csv => b',',
        }
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(DataFormat::Json),
            "csv" => Ok(DataFormat::Csv),
            "tsv" => Ok(DataFormat::Tsv),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DataFormat::Json => "json",
            DataFormat::Csv => "csv",
            DataFormat::Tsv => "tsv",
        })
    }
}

/// Parse a delimiter argument: one ASCII character, escapes allowed (`\t`).
///
/// Quotes, newlines and carriage returns are rejected.
pub fn parse_delimiter(text: &str) -> Option<u8> {
    let decoded = unescape(text).ok()?;
    match decoded.as_bytes() {
        &[b] if b.is_ascii() && !matches!(b, b'"' | b'\n' | b'\r') => Some(b),
        _ => None,
    }
}

/// Decode escape sequences in an indent argument, keeping the raw text if
/// it does not decode.
pub fn decode_indent(text: &str) -> String {
    unescape(text).unwrap_or_else(|_| text.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub format: DataFormat,
    pub delimiter: u8,
    pub indent: String,
    pub minify: bool,
    /// Explicit column list for delimited output; dotted names are paths.
    pub fields: Option<Vec<String>>,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            format: DataFormat::Json,
            delimiter: b',',
            indent: "  ".to_string(),
            minify: false,
            fields: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render an evaluation result for stdout.
///
/// Top-level values JSON cannot represent print as `undefined`.
#[tracing::instrument(level = "debug", skip(value, spec), fields(format = %spec.format))]
pub fn format_result(value: &Value, spec: &OutputSpec, kind: InputKind) -> Result<String, FormatError> {
    match spec.format {
        DataFormat::Json => {
            let text = match value.to_json() {
                None => "undefined".to_string(),
                Some(json) if kind == InputKind::Json => pretty(&json, &spec.indent)?,
                Some(json) => literal(&json, &spec.indent),
            };
            Ok(if spec.minify { minify(&text) } else { text })
        }
        DataFormat::Csv | DataFormat::Tsv => Ok(delimited(value, spec)),
    }
}

fn pretty(json: &serde_json::Value, indent: &str) -> Result<String, FormatError> {
    if indent.is_empty() {
        return Ok(serde_json::to_string(json)?);
    }
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// JSON text with the given indent; an empty indent means compact output.
pub fn json_text(json: &serde_json::Value, indent: &str) -> String {
    pretty(json, indent).unwrap_or_else(|_| json.to_string())
}

/// Source-literal dump: identifier keys bare, strings double-quoted.
pub fn literal(json: &serde_json::Value, indent: &str) -> String {
    let mut out = String::new();
    write_literal(&mut out, json, indent, 0);
    out
}

fn write_literal(out: &mut String, json: &serde_json::Value, indent: &str, level: usize) {
    use serde_json::Value as Json;

    let newline = |out: &mut String, level: usize| {
        if !indent.is_empty() {
            out.push('\n');
            out.push_str(&indent.repeat(level));
        }
    };

    match json {
        Json::Array(items) if !items.is_empty() => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                newline(out, level + 1);
                write_literal(out, item, indent, level + 1);
            }
            newline(out, level);
            out.push(']');
        }
        Json::Object(map) if !map.is_empty() => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                newline(out, level + 1);
                if is_identifier(key) {
                    out.push_str(key);
                } else {
                    let _ = write!(out, "{}", Json::String(key.clone()));
                }
                out.push(':');
                if !indent.is_empty() {
                    out.push(' ');
                }
                write_literal(out, item, indent, level + 1);
            }
            newline(out, level);
            out.push('}');
        }
        other => {
            let _ = write!(out, "{other}");
        }
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Remove whitespace outside string literals.
pub fn minify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

/// One record per object; scalars land in a `value` column.
fn records(value: &Value) -> Vec<Object> {
    let record = |v: &Value| match v {
        Value::Object(map) => (**map).clone(),
        other => Object::from_iter([("value".to_string(), other.clone())]),
    };
    match value {
        Value::Array(items) => items.iter().map(record).collect(),
        Value::Chain(inner) => records(inner),
        other => vec![record(other)],
    }
}

fn delimited(value: &Value, spec: &OutputSpec) -> String {
    if matches!(value, Value::Undefined) {
        return "undefined".to_string();
    }
    let rows = records(value);
    let header: Vec<String> = match &spec.fields {
        Some(fields) => fields.clone(),
        None => rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect(),
    };
    if header.is_empty() {
        return String::new();
    }

    let delimiter = char::from(spec.delimiter).to_string();
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header.iter().map(|h| quote(h)).collect::<Vec<_>>().join(&delimiter));
    for row in &rows {
        let cells: Vec<String> = header.iter().map(|name| cell(&field(row, name))).collect();
        lines.push(cells.join(&delimiter));
    }
    lines.join("\n")
}

fn field(row: &Object, name: &str) -> Value {
    match row.get(name) {
        Some(v) => v.clone(),
        None if name.contains('.') || name.contains('[') => {
            get_path(&Value::from(row.clone()), &parse_path(name))
        }
        None => Value::Undefined,
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => quote(s),
        Value::Array(_) | Value::Object(_) | Value::Chain(_) => value
            .to_json()
            .map(|json| quote(&json.to_string()))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter("|"), Some(b'|'));
        assert_eq!(parse_delimiter("\\t"), Some(b'\t'));
        assert_eq!(parse_delimiter(";;"), None);
        assert_eq!(parse_delimiter("\""), None);
        assert_eq!(parse_delimiter("é"), None);
    }

    #[test]
    fn test_minify_keeps_strings() {
        assert_eq!(minify("{\n  \"a b\": [1, 2]\n}"), r#"{"a b":[1,2]}"#);
        assert_eq!(minify(r#""say \"hi there\"""#), r#""say \"hi there\"""#);
    }

    #[test]
    fn test_identifier_keys() {
        assert!(is_identifier("_id"));
        assert!(is_identifier("$x1"));
        assert!(!is_identifier("1a"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_cells() {
        assert_eq!(cell(&Value::Null), "");
        assert_eq!(cell(&Value::Number(1.5)), "1.5");
        assert_eq!(cell(&Value::from("say \"hi\"")), r#""say ""hi""""#);
        assert_eq!(cell(&Value::from(vec![Value::Number(1.0)])), r#""[1]""#);
    }
}
