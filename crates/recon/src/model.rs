use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::summary::RunSummary;

/// Ordinal label produced by a classifier.
pub type Label = i64;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Record identifier shared across all sources.
///
/// Equality is exact text equality. Keys made only of ASCII digits order
/// numerically (`"9" < "10"`) and sort before any other key; everything else
/// orders lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` characters. Keys shorter than `len` come back whole.
    pub fn prefix(&self, len: usize) -> ItemKey {
        match self.0.char_indices().nth(len) {
            Some((idx, _)) => ItemKey(self.0[..idx].to_string()),
            None => self.clone(),
        }
    }

    fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Ord for ItemKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => {
                let a = self.0.trim_start_matches('0');
                let b = other.0.trim_start_matches('0');
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a.cmp(b))
                    .then_with(|| self.0.cmp(&other.0))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ItemKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<u64> for ItemKey {
    fn from(raw: u64) -> Self {
        Self(raw.to_string())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One source's opinion for a key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub source_index: usize,
    pub value: Label,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Candidate {
    pub fn new(source_index: usize, value: Label) -> Self {
        Self {
            source_index,
            value,
            confidence: None,
        }
    }

    pub fn scored(source_index: usize, value: Label, confidence: f64) -> Self {
        Self {
            source_index,
            value,
            confidence: Some(confidence),
        }
    }
}

/// A loaded row: label plus optional confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Record {
    pub value: Label,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Record {
    pub fn label(value: Label) -> Self {
        Self {
            value,
            confidence: None,
        }
    }

    pub fn scored(value: Label, confidence: f64) -> Self {
        Self {
            value,
            confidence: Some(confidence),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    ExactMatch,
    SmallDisagreement,
    LargeDisagreement,
    ConfidencePick,
    ConfidenceTieAverage,
    MajorityVote,
    AverageVote,
    Tie,
}

impl DecisionKind {
    pub const ALL: [DecisionKind; 8] = [
        Self::ExactMatch,
        Self::SmallDisagreement,
        Self::LargeDisagreement,
        Self::ConfidencePick,
        Self::ConfidenceTieAverage,
        Self::MajorityVote,
        Self::AverageVote,
        Self::Tie,
    ];
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactMatch => write!(f, "exact_match"),
            Self::SmallDisagreement => write!(f, "small_disagreement"),
            Self::LargeDisagreement => write!(f, "large_disagreement"),
            Self::ConfidencePick => write!(f, "confidence_pick"),
            Self::ConfidenceTieAverage => write!(f, "confidence_tie_average"),
            Self::MajorityVote => write!(f, "majority_vote"),
            Self::AverageVote => write!(f, "average_vote"),
            Self::Tie => write!(f, "tie"),
        }
    }
}

/// Resolved value for one key and how it was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub value: Label,
    pub decision: DecisionKind,
    /// Winning confidence, for confidence-driven decisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Sources whose candidates produced `value`.
    pub sources: Vec<usize>,
}

impl Resolution {
    pub fn new(value: Label, decision: DecisionKind, sources: Vec<usize>) -> Self {
        Self {
            value,
            decision,
            confidence: None,
            sources,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Output of one reconciler run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciled {
    pub resolutions: BTreeMap<ItemKey, Resolution>,
    pub summary: RunSummary,
}

impl Reconciled {
    /// Resolved values only, as a single-source mapping.
    pub fn values(&self) -> BTreeMap<ItemKey, Label> {
        self.resolutions
            .iter()
            .map(|(key, res)| (key.clone(), res.value))
            .collect()
    }

    /// Combine results over disjoint key partitions.
    pub fn merge(mut self, other: Reconciled) -> Reconciled {
        self.resolutions.extend(other.resolutions);
        self.summary = self.summary.merge(other.summary);
        self
    }
}
