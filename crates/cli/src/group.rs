//! `ensemble group`: collapse item-level labels by key prefix.

use std::io::{self, BufWriter};
use std::path::PathBuf;

use ensemble_recon::aggregate::{group_by_prefix, GroupConfig, Reduction};
use ensemble_recon::records::{load_labels, write_values, LoadOptions, WriteOptions};
use ensemble_recon::RoundingPolicy;

use crate::exit_codes::EXIT_OUTPUT;
use crate::{parse_column, parse_delimiter, read_input, CliError};

pub struct GroupArgs {
    pub input: PathBuf,
    pub prefix: usize,
    pub reduce: String,
    pub rounding: String,
    pub delimiter: String,
    pub column: String,
    pub output: Option<PathBuf>,
    pub key_header: String,
    pub value_header: String,
}

pub fn cmd_group(args: GroupArgs) -> Result<(), CliError> {
    if args.prefix == 0 {
        return Err(CliError::args("--prefix must be greater than 0"));
    }
    let reduce = args.reduce.parse::<Reduction>().map_err(|e| CliError::args(e.to_string()))?;
    let rounding = args.rounding.parse::<RoundingPolicy>().map_err(|e| CliError::args(e.to_string()))?;

    let opts = LoadOptions {
        delimiter: parse_delimiter(&args.delimiter)?,
        value_column: parse_column(&args.column),
        ..LoadOptions::default()
    };
    let data = read_input(&args.input)?;
    let labels = load_labels(&data, &opts)?;

    let config = GroupConfig { prefix_len: args.prefix, reduce, rounding };
    let groups = group_by_prefix(&labels, &config);

    let format = WriteOptions {
        key_header: args.key_header,
        value_header: args.value_header,
        include_decision: false,
    };

    let written = match args.output {
        Some(ref path) => {
            let file = std::fs::File::create(path)
                .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display())))?;
            write_values(BufWriter::new(file), &format, &groups)
        }
        None => write_values(io::stdout().lock(), &format, &groups),
    };
    written.map_err(|e| CliError::new(EXIT_OUTPUT, e.to_string()))?;

    eprintln!(
        "{} row(s) -> {} group(s) ({} over {}-char prefix)",
        labels.len(),
        groups.len(),
        args.reduce.trim(),
        args.prefix
    );
    Ok(())
}
