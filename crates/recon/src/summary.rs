use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ReconError;
use crate::model::{DecisionKind, ItemKey, Label, Record, Resolution};

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoCandidates,
    InvalidValue,
    Other,
}

/// A key the run could not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyFailure {
    pub key: ItemKey,
    pub kind: FailureKind,
    pub message: String,
}

/// Decision counters for one run. Reporting only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Keys seen, whether resolved, failed or excluded.
    pub total_keys: usize,
    pub resolved: usize,
    pub decisions: BTreeMap<DecisionKind, usize>,
    pub failures: Vec<KeyFailure>,
    /// Keys dropped by the missing-source policy.
    pub excluded: Vec<ItemKey>,
    /// Confidence policy: single-candidate picks per source.
    pub source_picks: BTreeMap<usize, usize>,
    /// Confidence policy: tie-averages each source took part in.
    pub source_tie_averages: BTreeMap<usize, usize>,
}

impl RunSummary {
    pub fn record(&mut self, resolution: &Resolution) {
        self.resolved += 1;
        *self.decisions.entry(resolution.decision).or_insert(0) += 1;

        match resolution.decision {
            DecisionKind::ConfidencePick => {
                for &source in &resolution.sources {
                    *self.source_picks.entry(source).or_insert(0) += 1;
                }
            }
            DecisionKind::ConfidenceTieAverage => {
                for &source in &resolution.sources {
                    *self.source_tie_averages.entry(source).or_insert(0) += 1;
                }
            }
            _ => {}
        }
    }

    pub fn record_failure(&mut self, key: ItemKey, err: &ReconError) {
        let kind = match err {
            ReconError::NoCandidates { .. } => FailureKind::NoCandidates,
            ReconError::InvalidValue { .. } => FailureKind::InvalidValue,
            _ => FailureKind::Other,
        };
        self.failures.push(KeyFailure {
            key,
            kind,
            message: err.to_string(),
        });
    }

    pub fn record_excluded(&mut self, key: ItemKey) {
        self.excluded.push(key);
    }

    pub fn count(&self, kind: DecisionKind) -> usize {
        self.decisions.get(&kind).copied().unwrap_or(0)
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Share of seen keys that ended in `kind`, as a percentage.
    pub fn percent(&self, kind: DecisionKind) -> f64 {
        percent(self.count(kind), self.total_keys)
    }

    /// Merge summaries computed over disjoint key sets.
    pub fn merge(mut self, other: RunSummary) -> RunSummary {
        self.total_keys += other.total_keys;
        self.resolved += other.resolved;
        for (kind, n) in other.decisions {
            *self.decisions.entry(kind).or_insert(0) += n;
        }
        for (source, n) in other.source_picks {
            *self.source_picks.entry(source).or_insert(0) += n;
        }
        for (source, n) in other.source_tie_averages {
            *self.source_tie_averages.entry(source).or_insert(0) += n;
        }
        self.failures.extend(other.failures);
        self.failures.sort_by(|a, b| a.key.cmp(&b.key));
        self.excluded.extend(other.excluded);
        self.excluded.sort();
        self
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Reporting statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelShare {
    pub label: Label,
    pub count: usize,
    pub percent: f64,
}

/// Count of each label, ascending by label.
pub fn label_distribution<'a, I>(values: I) -> Vec<LabelShare>
where
    I: IntoIterator<Item = &'a Label>,
{
    let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
    let mut total = 0;
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| LabelShare {
            label,
            count,
            percent: percent(count, total),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl ConfidenceStats {
    /// Stats over resolutions that carry a confidence; `None` if none do.
    pub fn from_resolutions<'a, I>(resolutions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Resolution>,
    {
        Self::from_values(resolutions.into_iter().filter_map(|r| r.confidence))
    }

    /// Non-finite values are skipped.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let confidences: Vec<f64> = values.into_iter().filter(|c| c.is_finite()).collect();
        if confidences.is_empty() {
            return None;
        }
        let sum: f64 = confidences.iter().sum();
        Some(Self {
            mean: sum / confidences.len() as f64,
            min: confidences.iter().copied().fold(f64::INFINITY, f64::min),
            max: confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Input confidence of one source, for comparison with the ensemble's.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceConfidence {
    pub source_index: usize,
    pub name: String,
    /// Rows that carried a confidence.
    pub scored: usize,
    #[serde(flatten)]
    pub stats: ConfidenceStats,
}

/// One entry per source that carries confidences, in source order.
pub fn source_confidence(sources: &[BTreeMap<ItemKey, Record>], names: &[String]) -> Vec<SourceConfidence> {
    sources
        .iter()
        .enumerate()
        .filter_map(|(idx, records)| {
            let values: Vec<f64> = records.values().filter_map(|r| r.confidence).collect();
            let stats = ConfidenceStats::from_values(values.iter().copied())?;
            Some(SourceConfidence {
                source_index: idx,
                name: names.get(idx).cloned().unwrap_or_else(|| format!("source {idx}")),
                scored: values.iter().filter(|c| c.is_finite()).count(),
                stats,
            })
        })
        .collect()
}
