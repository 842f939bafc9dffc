//! Agreement report between two prediction sources.
//!
//! Classification only: values that do not parse as numbers fall back to
//! string equality, and nothing is averaged.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::candidates::check_same_keys;
use crate::error::ReconError;
use crate::model::ItemKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    Exact,
    /// Numeric gap of at most one.
    WithinOne,
    /// Numeric gap above one.
    Large,
    /// Non-numeric values that differ as strings.
    StringDiff,
}

/// Classify one pair of raw values.
pub fn classify_values(left: &str, right: &str) -> Agreement {
    match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => {
            let diff = (a - b).abs();
            if diff == 0.0 {
                Agreement::Exact
            } else if diff <= 1.0 {
                Agreement::WithinOne
            } else {
                Agreement::Large
            }
        }
        _ if left == right => Agreement::Exact,
        _ => Agreement::StringDiff,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disagreement {
    pub key: ItemKey,
    pub left: String,
    pub right: String,
    pub kind: Agreement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub total: usize,
    pub exact: usize,
    pub within_one: usize,
    /// Numeric gaps above one plus string differences.
    pub large: usize,
    /// Keys compared as strings because a value was not numeric.
    pub string_fallback: usize,
    pub disagreements: Vec<Disagreement>,
}

impl ComparisonReport {
    pub fn agreement_rate(&self) -> f64 {
        rate(self.exact, self.total)
    }

    pub fn within_one_rate(&self) -> f64 {
        rate(self.exact + self.within_one, self.total)
    }

    pub fn large_rate(&self) -> f64 {
        rate(self.large, self.total)
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn is_numeric(raw: &str) -> bool {
    raw.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Compare two raw sources key by key. Both must cover the same keys.
pub fn compare_sources(
    left: &BTreeMap<ItemKey, String>,
    right: &BTreeMap<ItemKey, String>,
) -> Result<ComparisonReport, ReconError> {
    check_same_keys(left, right)?;

    let mut report = ComparisonReport::default();
    for (key, l) in left {
        let Some(r) = right.get(key) else { continue };
        report.total += 1;
        if !is_numeric(l) || !is_numeric(r) {
            report.string_fallback += 1;
        }

        let kind = classify_values(l, r);
        match kind {
            Agreement::Exact => {
                report.exact += 1;
                continue;
            }
            Agreement::WithinOne => report.within_one += 1,
            Agreement::Large | Agreement::StringDiff => report.large += 1,
        }
        report.disagreements.push(Disagreement {
            key: key.clone(),
            left: l.clone(),
            right: r.clone(),
            kind,
        });
    }

    info!(
        total = report.total,
        exact = report.exact,
        within_one = report.within_one,
        large = report.large,
        "compared sources"
    );
    Ok(report)
}
