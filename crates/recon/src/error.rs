use thiserror::Error;

use crate::model::ItemKey;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconError {
    /// A source does not cover the same keys as the reference key set.
    #[error("source {source_index}: key set mismatch ({} missing, {} unexpected){}", .missing.len(), .unexpected.len(), sample_keys(.missing, .unexpected))]
    KeySetMismatch {
        source_index: usize,
        missing: Vec<ItemKey>,
        unexpected: Vec<ItemKey>,
    },
    /// Nothing left to resolve for a key.
    #[error("key '{key}': no candidates")]
    NoCandidates { key: ItemKey },
    /// Value cannot be read as a numeric label (or confidence).
    #[error("source {source_index}, key '{key}': invalid value '{value}'")]
    InvalidValue {
        source_index: usize,
        key: ItemKey,
        value: String,
    },
    /// Unknown rounding policy, strategy, or otherwise unusable settings.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("source {source_index}: missing column '{column}'")]
    MissingColumn { source_index: usize, column: String },
    #[error("source {source_index}: duplicate key '{key}'")]
    DuplicateKey { source_index: usize, key: ItemKey },
    #[error("CSV error: {0}")]
    Csv(String),
}

impl From<csv::Error> for ReconError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

/// Up to three offending keys, for the mismatch message.
fn sample_keys(missing: &[ItemKey], unexpected: &[ItemKey]) -> String {
    let sample: Vec<&str> = missing
        .iter()
        .chain(unexpected)
        .take(3)
        .map(ItemKey::as_str)
        .collect();
    if sample.is_empty() {
        String::new()
    } else {
        format!(", e.g. {}", sample.join(", "))
    }
}
