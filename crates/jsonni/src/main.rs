//! jsonni CLI entry point.
//!
//! Usage:
//!   cat data.json | jsonni -q '$input.map(i => i.name)'
//!   cat data.csv | jsonni --input=csv -q '_.map($input, "age")'
//!   cat data.json | jsonni -q '$input' --output=tsv

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use jsonni_kernel::{Config, Options, Pipeline};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("JSONNI_BUILD_INFO"), ")");

const EXAMPLES: &str = r#"Examples:
  $ cat data.json | jsonni -q '$input'
  $ cat data.json | jsonni -q '$input.map(i => i.name)'
  $ cat data.json | jsonni -q '_.chain($input).filter("isActive").map("_id")'
  $ cat data.json | jsonni -q 'from($input).filter(i => i.age > 30).toArray()'

  $ cat data.csv | jsonni --input=csv -q '$input'
  $ cat data.csv | jsonni --input=csv --input-delimiter='|' -q '$input'
  $ cat dataWithoutHeaders.csv | jsonni --input=csv --input-header=_id,isActive,age,name,registered -q '$input'

  $ cat data.tsv | jsonni --input=tsv -q '$input' --output=csv --output-delimiter=';'"#;

/// Transform JSON, CSV and TSV from stdin with short expressions.
#[derive(Debug, Parser)]
#[command(
    name = "jsonni",
    version = VERSION,
    disable_version_flag = true,
    after_help = EXAMPLES
)]
struct Cli {
    /// Query to transform data with
    #[arg(short, long)]
    query: Option<String>,

    /// Minify output
    #[arg(short, long)]
    minify: bool,

    /// Output indentation, defaults to "  " (escapes such as \t are decoded)
    #[arg(short, long)]
    indent: Option<String>,

    /// Input format: json, csv or tsv
    #[arg(long, value_name = "FORMAT")]
    input: Option<String>,

    /// Column names for CSV/TSV input without a header line; also the CSV/TSV output columns
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    input_header: Option<Vec<String>>,

    /// CSV/TSV input delimiter
    #[arg(long, value_name = "CHAR")]
    input_delimiter: Option<String>,

    /// Output format: json, csv or tsv
    #[arg(long, value_name = "FORMAT")]
    output: Option<String>,

    /// CSV/TSV output delimiter
    #[arg(long, value_name = "CHAR")]
    output_delimiter: Option<String>,

    /// Columns for CSV/TSV output, overriding --input-header; dotted names select nested values
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    output_fields: Option<Vec<String>>,

    /// Configuration file (default: ~/.config/jsonni/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,
}

impl Cli {
    /// Merge flags over file configuration.
    fn into_options(self, config: Config) -> Options {
        Options {
            query: self.query,
            input_format: self.input.unwrap_or_else(|| config.input.format.to_string()),
            input_delimiter: self.input_delimiter.or(config.input.delimiter),
            input_header: self.input_header.or(config.input.header),
            output_format: self.output.unwrap_or_else(|| config.output.format.to_string()),
            output_delimiter: self.output_delimiter.or(config.output.delimiter),
            output_fields: self.output_fields.or(config.output.fields),
            indent: self.indent.unwrap_or(config.indent),
            minify: self.minify || config.minify,
            limits: config.limits,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var); stdout carries results
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let options = cli.into_options(config);

    let text = read_stdin()?;
    tracing::debug!(bytes = text.len(), "read stdin");

    match Pipeline::run(&options, &text) {
        Ok(output) => {
            println!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if err.has_message() {
                eprintln!("{err}");
            }
            if err.shows_usage() {
                eprintln!();
                eprintln!("{}", Cli::command().render_help());
            }
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}

/// Read all of stdin. A terminal counts as empty input.
fn read_stdin() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }
    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        use jsonni_kernel::DataFormat;
        use jsonni_kernel::config::OutputConfig;

        let cli = Cli::parse_from(["jsonni", "-q", "$input", "--output=csv", "--input-header=a,b"]);
        let config = Config {
            indent: "\t".to_string(),
            minify: true,
            output: OutputConfig {
                format: DataFormat::Tsv,
                delimiter: Some(";".to_string()),
                fields: None,
            },
            ..Config::default()
        };
        let options = cli.into_options(config);
        assert_eq!(options.output_format, "csv");
        assert_eq!(options.output_delimiter.as_deref(), Some(";"));
        assert_eq!(options.indent, "\t");
        assert!(options.minify);
        assert_eq!(options.input_header, Some(vec!["a".to_string(), "b".to_string()]));
    }
}
