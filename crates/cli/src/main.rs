// ensemble CLI - reconcile label predictions from several models
// Config format: see crates/recon/src/config.rs

mod compare;
mod ensemble;
mod exit_codes;
mod group;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ensemble_recon::ReconError;
use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "ensemble")]
#[command(about = "Reconcile label predictions from several models into one label per item")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an ensemble from a TOML config file
    #[command(after_help = "\
Examples:
  ensemble run vote.ensemble.toml
  ensemble run vote.ensemble.toml --json
  ensemble run vote.ensemble.toml --csv final.csv --output result.json")]
    Run {
        /// Path to the .ensemble.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of only the human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the reconciled CSV here (overrides [output].file)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Exit 0 even when some keys could not be resolved
        #[arg(long)]
        allow_partial: bool,
    },

    /// Validate an ensemble config without running
    #[command(after_help = "\
Examples:
  ensemble validate vote.ensemble.toml")]
    Validate {
        /// Path to the .ensemble.toml config file
        config: PathBuf,
    },

    /// Report agreement between two prediction files
    #[command(after_help = "\
Examples:
  ensemble compare model_a.csv model_b.csv
  ensemble compare model_a.csv model_b.csv --show-diffs
  ensemble compare a.tsv b.tsv --delimiter '\\t' --json")]
    Compare {
        left: PathBuf,
        right: PathBuf,

        /// Field delimiter for both files
        #[arg(long, default_value = ",")]
        delimiter: String,

        /// Value column, by zero-based index or header name
        #[arg(long, default_value = "1")]
        column: String,

        /// List every disagreeing key
        #[arg(long)]
        show_diffs: bool,

        /// Output the report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Exit 1 when any key disagrees
        #[arg(long)]
        fail_on_diff: bool,
    },

    /// Collapse item-level labels into groups by key prefix
    #[command(after_help = "\
Examples:
  ensemble group sentences.csv --prefix 7
  ensemble group sentences.csv --prefix 7 --reduce mean -o documents.csv")]
    Group {
        input: PathBuf,

        /// Number of leading key characters that form the group key
        #[arg(long)]
        prefix: usize,

        /// max, min or mean
        #[arg(long, default_value = "max")]
        reduce: String,

        /// Rounding for --reduce mean
        #[arg(long, default_value = "half_away_from_zero")]
        rounding: String,

        #[arg(long, default_value = ",")]
        delimiter: String,

        /// Value column, by zero-based index or header name
        #[arg(long, default_value = "1")]
        column: String,

        /// Output CSV (stdout when omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long, default_value = "ID")]
        key_header: String,

        #[arg(long, default_value = "Prediction")]
        value_header: String,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  ensemble-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config, json, output, csv, allow_partial } => {
            ensemble::cmd_run(config, json, output, csv, allow_partial)
        }
        Commands::Validate { config } => ensemble::cmd_validate(config),
        Commands::Compare { left, right, delimiter, column, show_diffs, json, fail_on_diff } => {
            compare::cmd_compare(left, right, &delimiter, &column, show_diffs, json, fail_on_diff)
        }
        Commands::Group {
            input,
            prefix,
            reduce,
            rounding,
            delimiter,
            column,
            output,
            key_header,
            value_header,
        } => group::cmd_group(group::GroupArgs {
            input,
            prefix,
            reduce,
            rounding,
            delimiter,
            column,
            output,
            key_header,
            value_header,
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::KeySetMismatch { .. } => {
                Some("set [voting] missing = \"exclude\" or \"use_present\" to tolerate gaps".to_string())
            }
            ReconError::MissingColumn { .. } => {
                Some("check value_column / confidence_column and the file's delimiter".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

// ============================================================================
// shared helpers
// ============================================================================

pub(crate) fn read_input(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))
}

/// Single-byte delimiter from a flag value. Accepts `\t` and `tab`.
pub(crate) fn parse_delimiter(raw: &str) -> Result<u8, CliError> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        other => Err(CliError::args(format!("delimiter must be one ASCII character, got {other:?}"))),
    }
}

/// Column flag: all digits means an index, anything else a header name.
pub(crate) fn parse_column(raw: &str) -> ensemble_recon::records::ColumnRef {
    use ensemble_recon::records::ColumnRef;
    match raw.parse::<usize>() {
        Ok(idx) => ColumnRef::Index(idx),
        Err(_) => ColumnRef::Name(raw.to_string()),
    }
}
