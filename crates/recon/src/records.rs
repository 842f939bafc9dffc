//! Delimited prediction files in and out.
//!
//! Works on in-memory text and `io::Write` sinks only; opening files is the
//! caller's job. Layout: first column is the item key, then a value column
//! and optionally a confidence column, selected by index or header name.

use std::collections::BTreeMap;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{ItemKey, Label, Record, Resolution};

/// First-column values that mark a header row (case-insensitive).
pub const DEFAULT_HEADER_NAMES: [&str; 5] = ["id", "sentence id", "sentence_id", "document id", "document_id"];

/// A column by zero-based position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Position of this source among the inputs, used in errors.
    pub source_index: usize,
    pub delimiter: u8,
    pub value_column: ColumnRef,
    pub confidence_column: Option<ColumnRef>,
    pub header_names: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            source_index: 0,
            delimiter: b',',
            value_column: ColumnRef::Index(1),
            confidence_column: None,
            header_names: DEFAULT_HEADER_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LoadOptions {
    pub fn for_source(source_index: usize) -> Self {
        Self {
            source_index,
            ..Self::default()
        }
    }

    fn is_header(&self, first_field: &str) -> bool {
        self.header_names.iter().any(|h| h.eq_ignore_ascii_case(first_field))
    }

    fn resolve(&self, column: &ColumnRef, headers: Option<&[String]>) -> Result<usize, ReconError> {
        let found = match column {
            ColumnRef::Index(i) => Some(*i),
            ColumnRef::Name(name) => headers.and_then(|hs| hs.iter().position(|h| h.eq_ignore_ascii_case(name))),
        };
        found.ok_or_else(|| ReconError::MissingColumn {
            source_index: self.source_index,
            column: column.to_string(),
        })
    }
}

struct RawRow {
    key: ItemKey,
    value: String,
    confidence: Option<String>,
}

fn read_rows(csv_data: &str, opts: &LoadOptions) -> Result<Vec<RawRow>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(opts.delimiter)
        .from_reader(csv_data.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut columns: Option<(usize, Option<usize>)> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let first = record.get(0).unwrap_or("");
        if opts.is_header(first) {
            if headers.is_none() {
                headers = Some(record.iter().map(str::to_string).collect());
            }
            continue;
        }

        let (value_idx, conf_idx) = match columns {
            Some(cols) => cols,
            None => {
                let value_idx = opts.resolve(&opts.value_column, headers.as_deref())?;
                let conf_idx = opts
                    .confidence_column
                    .as_ref()
                    .map(|c| opts.resolve(c, headers.as_deref()))
                    .transpose()?;
                columns = Some((value_idx, conf_idx));
                (value_idx, conf_idx)
            }
        };

        let missing = |column: &ColumnRef| ReconError::MissingColumn {
            source_index: opts.source_index,
            column: column.to_string(),
        };
        let value = record.get(value_idx).ok_or_else(|| missing(&opts.value_column))?;
        let confidence = match (conf_idx, &opts.confidence_column) {
            (Some(idx), Some(col)) => Some(record.get(idx).ok_or_else(|| missing(col))?.to_string()),
            _ => None,
        };

        rows.push(RawRow {
            key: ItemKey::new(first),
            value: value.to_string(),
            confidence,
        });
    }

    Ok(rows)
}

fn insert_unique<V>(
    map: &mut BTreeMap<ItemKey, V>,
    key: ItemKey,
    value: V,
    source_index: usize,
) -> Result<(), ReconError> {
    if map.contains_key(&key) {
        return Err(ReconError::DuplicateKey { source_index, key });
    }
    map.insert(key, value);
    Ok(())
}

/// Integral label; `"3.0"` is accepted, `"2.5"` is not.
pub fn parse_label(raw: &str, key: &ItemKey, source_index: usize) -> Result<Label, ReconError> {
    if let Ok(v) = raw.parse::<Label>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < Label::MAX as f64 => Ok(v as Label),
        _ => Err(ReconError::InvalidValue {
            source_index,
            key: key.clone(),
            value: raw.to_string(),
        }),
    }
}

fn parse_confidence(raw: &str, key: &ItemKey, source_index: usize) -> Result<f64, ReconError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ReconError::InvalidValue {
            source_index,
            key: key.clone(),
            value: raw.to_string(),
        }),
    }
}

/// Values as written, for the comparison report.
pub fn load_raw(csv_data: &str, opts: &LoadOptions) -> Result<BTreeMap<ItemKey, String>, ReconError> {
    let mut out = BTreeMap::new();
    for row in read_rows(csv_data, opts)? {
        insert_unique(&mut out, row.key, row.value, opts.source_index)?;
    }
    Ok(out)
}

/// Labels plus confidence when a confidence column is configured.
pub fn load_records(csv_data: &str, opts: &LoadOptions) -> Result<BTreeMap<ItemKey, Record>, ReconError> {
    let mut out = BTreeMap::new();
    for row in read_rows(csv_data, opts)? {
        let value = parse_label(&row.value, &row.key, opts.source_index)?;
        // blank confidence cell reads as absent
        let confidence = row
            .confidence
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| parse_confidence(c, &row.key, opts.source_index))
            .transpose()?;
        insert_unique(&mut out, row.key, Record { value, confidence }, opts.source_index)?;
    }
    Ok(out)
}

pub fn load_labels(csv_data: &str, opts: &LoadOptions) -> Result<BTreeMap<ItemKey, Label>, ReconError> {
    Ok(load_records(csv_data, opts)?
        .into_iter()
        .map(|(key, record)| (key, record.value))
        .collect())
}

pub fn load_scored(csv_data: &str, opts: &LoadOptions) -> Result<BTreeMap<ItemKey, (Label, f64)>, ReconError> {
    if opts.confidence_column.is_none() {
        return Err(ReconError::Configuration(format!(
            "source {}: no confidence column configured",
            opts.source_index
        )));
    }
    let mut out = BTreeMap::new();
    for (key, record) in load_records(csv_data, opts)? {
        let confidence = record.confidence.ok_or_else(|| ReconError::InvalidValue {
            source_index: opts.source_index,
            key: key.clone(),
            value: String::new(),
        })?;
        out.insert(key, (record.value, confidence));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WriteOptions {
    #[serde(default = "default_key_header")]
    pub key_header: String,
    #[serde(default = "default_value_header")]
    pub value_header: String,
    /// Add a third `decision` column.
    #[serde(default)]
    pub include_decision: bool,
}

fn default_key_header() -> String {
    "ID".into()
}

fn default_value_header() -> String {
    "Prediction".into()
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            key_header: default_key_header(),
            value_header: default_value_header(),
            include_decision: false,
        }
    }
}

/// Header first, then one row per key in key order.
pub fn write_resolutions<W: io::Write>(
    writer: W,
    opts: &WriteOptions,
    resolutions: &BTreeMap<ItemKey, Resolution>,
) -> Result<(), ReconError> {
    let mut out = csv::Writer::from_writer(writer);
    if opts.include_decision {
        out.write_record([opts.key_header.as_str(), opts.value_header.as_str(), "decision"])?;
    } else {
        out.write_record([opts.key_header.as_str(), opts.value_header.as_str()])?;
    }

    for (key, res) in resolutions {
        let value = res.value.to_string();
        if opts.include_decision {
            let decision = res.decision.to_string();
            out.write_record([key.as_str(), value.as_str(), decision.as_str()])?;
        } else {
            out.write_record([key.as_str(), value.as_str()])?;
        }
    }
    out.flush().map_err(|e| ReconError::Csv(e.to_string()))
}

pub fn write_values<W: io::Write>(
    writer: W,
    opts: &WriteOptions,
    values: &BTreeMap<ItemKey, Label>,
) -> Result<(), ReconError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([opts.key_header.as_str(), opts.value_header.as_str()])?;
    for (key, value) in values {
        out.write_record([key.as_str(), value.to_string().as_str()])?;
    }
    out.flush().map_err(|e| ReconError::Csv(e.to_string()))
}
