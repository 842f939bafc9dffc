//! `ensemble compare`: agreement report between two prediction files.

use std::path::PathBuf;

use ensemble_recon::compare::{Agreement, ComparisonReport};
use ensemble_recon::compare_sources;
use ensemble_recon::records::{load_raw, LoadOptions};

use crate::exit_codes::EXIT_COMPARE_DIFFS;
use crate::{parse_column, parse_delimiter, read_input, CliError};

pub fn cmd_compare(
    left: PathBuf,
    right: PathBuf,
    delimiter: &str,
    column: &str,
    show_diffs: bool,
    json_output: bool,
    fail_on_diff: bool,
) -> Result<(), CliError> {
    let delimiter = parse_delimiter(delimiter)?;
    let column = parse_column(column);

    let mut sources = Vec::with_capacity(2);
    for (idx, path) in [&left, &right].into_iter().enumerate() {
        let opts = LoadOptions {
            delimiter,
            value_column: column.clone(),
            ..LoadOptions::for_source(idx)
        };
        let data = read_input(path)?;
        sources.push(load_raw(&data, &opts)?);
    }

    let report = compare_sources(&sources[0], &sources[1])?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    print_report(&report, show_diffs);

    if fail_on_diff && !report.disagreements.is_empty() {
        return Err(CliError::new(EXIT_COMPARE_DIFFS, String::new()));
    }
    Ok(())
}

fn print_report(report: &ComparisonReport, show_diffs: bool) {
    eprintln!("compared {} key(s)", report.total);
    eprintln!("  exact:       {:>6}  ({:.2}%)", report.exact, report.agreement_rate() * 100.0);
    eprintln!(
        "  within one:  {:>6}  ({:.2}% including exact)",
        report.within_one,
        report.within_one_rate() * 100.0
    );
    eprintln!("  large:       {:>6}  ({:.2}%)", report.large, report.large_rate() * 100.0);
    if report.string_fallback > 0 {
        eprintln!("  {} key(s) compared as text", report.string_fallback);
    }

    if show_diffs {
        for d in &report.disagreements {
            let marker = match d.kind {
                Agreement::WithinOne => "~",
                Agreement::Large => "!",
                Agreement::StringDiff => "?",
                Agreement::Exact => "=",
            };
            eprintln!("  {marker} {}: {} vs {}", d.key, d.left, d.right);
        }
    }
}
