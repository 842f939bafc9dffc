//! `ensemble run` / `ensemble validate`: config-driven reconciliation.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ensemble_recon::engine::{run, EnsembleInput, EnsembleResult};
use ensemble_recon::records::{load_records, write_resolutions, write_values};
use ensemble_recon::{DecisionKind, EnsembleConfig, ItemKey, Record};

use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_OUTPUT, EXIT_PARTIAL};
use crate::{read_input, CliError};

fn load_config(config_path: &Path) -> Result<EnsembleConfig, CliError> {
    let config_str = read_input(config_path)?;
    EnsembleConfig::from_toml(&config_str).map_err(|e| CliError::new(EXIT_INVALID_CONFIG, e.to_string()))
}

/// Config-relative paths resolve against the config file's directory.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn load_sources(config: &EnsembleConfig, base: &Path) -> Result<Vec<BTreeMap<ItemKey, Record>>, CliError> {
    let mut sources = Vec::with_capacity(config.sources.len());
    for (idx, source) in config.sources.iter().enumerate() {
        let csv_path = base.join(&source.file);
        let csv_data = read_input(&csv_path)?;
        let records = load_records(&csv_data, &source.load_options(idx)).map_err(|e| {
            let err = CliError::from(e);
            CliError { message: format!("{}: {}", csv_path.display(), err.message), ..err }
        })?;
        tracing::debug!(source = idx, file = %csv_path.display(), rows = records.len(), "loaded source");
        sources.push(records);
    }
    Ok(sources)
}

fn write_csv(path: &Path, config: &EnsembleConfig, result: &EnsembleResult) -> Result<(), CliError> {
    let file = File::create(path)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display())))?;
    let writer = BufWriter::new(file);
    let written = match result.groups {
        Some(ref groups) => write_values(writer, &config.output.format, groups),
        None => write_resolutions(writer, &config.output.format, &result.resolutions),
    };
    written.map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display())))
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    csv_file: Option<PathBuf>,
    allow_partial: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let base = base_dir(&config_path);

    let sources = load_sources(&config, base)?;
    let result = run(&config, &EnsembleInput { sources })?;

    // Output
    let csv_path = csv_file.or_else(|| config.output.file.as_ref().map(|f| base.join(f)));
    if let Some(ref path) = csv_path {
        write_csv(path, &config, &result)?;
        eprintln!("wrote {}", path.display());
    }

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);

    let failed = result.summary.failure_count();
    if failed > 0 && !allow_partial {
        return Err(CliError::new(EXIT_PARTIAL, format!("{failed} key(s) could not be resolved"))
            .with_hint("pass --allow-partial to accept a partial result"));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &EnsembleResult) {
    let s = &result.summary;
    eprintln!(
        "{} ensemble '{}': {} key(s) from {} source(s), {} resolved",
        result.meta.policy,
        result.meta.config_name,
        s.total_keys,
        result.meta.sources.len(),
        s.resolved,
    );

    for kind in DecisionKind::ALL {
        let n = s.count(kind);
        if n > 0 {
            eprintln!("  {:<24} {:>6}  ({:.2}%)", kind.to_string(), n, s.percent(kind));
        }
    }

    for (idx, name) in result.meta.sources.iter().enumerate() {
        let picks = s.source_picks.get(&idx).copied().unwrap_or(0);
        let ties = s.source_tie_averages.get(&idx).copied().unwrap_or(0);
        if picks + ties > 0 {
            eprintln!("  source {name}: {picks} pick(s), {ties} tie-average(s)");
        }
    }

    if let Some(ref stats) = result.confidence {
        eprintln!(
            "confidence: mean {:.4}, min {:.4}, max {:.4}",
            stats.mean, stats.min, stats.max
        );
    }
    for source in &result.source_confidence {
        eprintln!(
            "  source {}: mean {:.4}, min {:.4}, max {:.4} over {} row(s)",
            source.name, source.stats.mean, source.stats.min, source.stats.max, source.scored
        );
    }

    if !s.excluded.is_empty() {
        eprintln!("excluded: {} key(s) missing from some source", s.excluded.len());
    }
    for failure in &s.failures {
        eprintln!("  failed: {}", failure.message);
    }

    if let Some(ref groups) = result.groups {
        eprintln!("grouped into {} group(s)", groups.len());
    }
    let shares: Vec<String> = result
        .distribution
        .iter()
        .map(|d| format!("{}={} ({:.1}%)", d.label, d.count, d.percent))
        .collect();
    if !shares.is_empty() {
        eprintln!("distribution: {}", shares.join(", "));
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "valid: {} ensemble '{}' with {} source(s){}",
        config.policy,
        config.name,
        config.sources.len(),
        match config.group {
            Some(ref g) => format!(", grouped by {}-char prefix", g.prefix_len),
            None => String::new(),
        },
    );
    Ok(())
}
