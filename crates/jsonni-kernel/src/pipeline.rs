//! The read → classify → evaluate → format pipeline.

use thiserror::Error;

use crate::dialect::QueryPlan;
use crate::format::{self, DataFormat, FormatError, OutputSpec};
use crate::interpreter::{EvalError, Limits};
use crate::reader::{self, InputSpec};

/// Everything one invocation needs, before validation.
///
/// Format and delimiter tokens are kept as text so that bad values are
/// reported by the pipeline itself.
#[derive(Debug, Clone)]
pub struct Options {
    pub query: Option<String>,
    pub input_format: String,
    pub input_delimiter: Option<String>,
    pub input_header: Option<Vec<String>>,
    pub output_format: String,
    pub output_delimiter: Option<String>,
    pub output_fields: Option<Vec<String>>,
    /// Raw indent text; escape sequences are decoded.
    pub indent: String,
    pub minify: bool,
    pub limits: Limits,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            query: None,
            input_format: "json".to_string(),
            input_delimiter: None,
            input_header: None,
            output_format: "json".to_string(),
            output_delimiter: None,
            output_fields: None,
            indent: "  ".to_string(),
            minify: false,
            limits: Limits::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input format: {0}")]
    InvalidInputFormat(String),

    #[error("Invalid output format: {0}")]
    InvalidOutputFormat(String),

    #[error("Invalid delimiter: {0:?}")]
    InvalidDelimiter(String),

    /// Empty stdin and no query: nothing to report beyond usage.
    #[error("No input")]
    NoInput,

    #[error("Input missing")]
    InputMissing,

    #[error("Query missing")]
    QueryMissing,

    #[error("Invalid query")]
    InvalidQuery,

    #[error(transparent)]
    Evaluation(#[from] EvalError),

    #[error("Output failed: {0}")]
    Output(#[from] FormatError),
}

impl PipelineError {
    /// Process exit code: 1 for evaluation and output failures, 2 for usage.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Evaluation(_) | PipelineError::Output(_) => 1,
            _ => 2,
        }
    }

    /// Whether usage text should follow the diagnostic.
    pub fn shows_usage(&self) -> bool {
        self.exit_code() == 2
    }

    /// Whether the error has a diagnostic line of its own.
    pub fn has_message(&self) -> bool {
        !matches!(self, PipelineError::NoInput)
    }
}

/// Validated pipeline configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    input: InputSpec,
    output: OutputSpec,
    query: Option<String>,
    limits: Limits,
}

impl Pipeline {
    /// Validate `options` and run the whole pipeline over `text`.
    pub fn run(options: &Options, text: &str) -> Result<String, PipelineError> {
        Self::configure(options)?.execute(text)
    }

    /// Check format and delimiter tokens without touching any input.
    pub fn configure(options: &Options) -> Result<Self, PipelineError> {
        let input_format: DataFormat = options
            .input_format
            .parse()
            .map_err(PipelineError::InvalidInputFormat)?;
        let output_format: DataFormat = options
            .output_format
            .parse()
            .map_err(PipelineError::InvalidOutputFormat)?;

        let input_delimiter = delimiter(options.input_delimiter.as_deref(), input_format)?;
        let output_delimiter = delimiter(options.output_delimiter.as_deref(), output_format)?;

        Ok(Self {
            input: InputSpec {
                format: input_format,
                delimiter: input_delimiter,
                header: options.input_header.clone(),
            },
            output: OutputSpec {
                format: output_format,
                delimiter: output_delimiter,
                indent: format::decode_indent(&options.indent),
                minify: options.minify,
                // An input header override also fixes the output columns
                fields: options
                    .output_fields
                    .clone()
                    .or_else(|| options.input_header.clone()),
            },
            query: options.query.clone(),
            limits: options.limits,
        })
    }

    /// Read, evaluate and format. Returns the text for stdout.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn execute(&self, text: &str) -> Result<String, PipelineError> {
        if text.trim().is_empty() {
            return Err(match self.query {
                Some(_) => PipelineError::InputMissing,
                None => PipelineError::NoInput,
            });
        }
        let query = self.query.as_deref().ok_or(PipelineError::QueryMissing)?;

        let input = reader::read_input(text, &self.input);
        let plan = QueryPlan::build(query)?.ok_or(PipelineError::InvalidQuery)?;
        tracing::debug!(dialect = %plan.dialect, kind = ?input.kind, "running query");

        let result = plan.evaluate(input.value, &self.limits)?;
        Ok(format::format_result(&result, &self.output, input.kind)?)
    }
}

fn delimiter(token: Option<&str>, format: DataFormat) -> Result<u8, PipelineError> {
    match token {
        None => Ok(format.default_delimiter()),
        Some(text) => {
            format::parse_delimiter(text).ok_or_else(|| PipelineError::InvalidDelimiter(text.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(query: &str) -> Options {
        Options {
            query: Some(query.to_string()),
            ..Options::default()
        }
    }

    #[test]
    fn test_format_tokens_checked_first() {
        let opts = Options {
            input_format: "foo".to_string(),
            ..options("$input")
        };
        let err = Pipeline::run(&opts, "").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input format: foo");
        assert_eq!(err.exit_code(), 2);

        let opts = Options {
            output_format: "xml".to_string(),
            ..options("$input")
        };
        let err = Pipeline::run(&opts, "[]").unwrap_err();
        assert_eq!(err.to_string(), "Invalid output format: xml");
    }

    #[test]
    fn test_missing_input_and_query() {
        let err = Pipeline::run(&options(""), "").unwrap_err();
        assert!(matches!(err, PipelineError::InputMissing));
        assert!(err.shows_usage());

        let err = Pipeline::run(&Options::default(), "").unwrap_err();
        assert!(matches!(err, PipelineError::NoInput));
        assert!(!err.has_message());

        let err = Pipeline::run(&Options::default(), "[1]").unwrap_err();
        assert!(matches!(err, PipelineError::QueryMissing));
    }

    #[test]
    fn test_invalid_query() {
        let err = Pipeline::run(&options("foo"), "[1]").unwrap_err();
        assert_eq!(err.to_string(), "Invalid query");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_evaluation_error_exit_code() {
        let err = Pipeline::run(&options("$input.nope.deeper"), "{}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of undefined (reading 'deeper')"
        );
        assert_eq!(err.exit_code(), 1);
        assert!(!err.shows_usage());
    }

    #[test]
    fn test_bad_delimiter() {
        let opts = Options {
            input_format: "csv".to_string(),
            input_delimiter: Some("ab".to_string()),
            ..options("$input")
        };
        assert!(matches!(
            Pipeline::run(&opts, "a\n1").unwrap_err(),
            PipelineError::InvalidDelimiter(_)
        ));
    }

    #[test]
    fn test_input_header_selects_output_columns() {
        let opts = Options {
            input_format: "csv".to_string(),
            input_header: Some(vec!["b".to_string(), "a".to_string()]),
            output_format: "csv".to_string(),
            ..options("$input.map(r => ({...r, c: 3}))")
        };
        assert_eq!(Pipeline::run(&opts, "1,2").unwrap(), "\"b\",\"a\"\n1,2");
    }

    #[test]
    fn test_compact_indent() {
        let opts = Options {
            indent: String::new(),
            ..options("$input")
        };
        assert_eq!(Pipeline::run(&opts, r#"{"a": [1, 2]}"#).unwrap(), r#"{"a":[1,2]}"#);
    }
}
