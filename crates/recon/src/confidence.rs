//! Highest-confidence reconciliation across two or more scored sources.
//!
//! Ties at the top confidence are detected with exact float equality unless
//! `tie_epsilon` is raised. Scores from identical computations compare equal;
//! near-ties such as `0.9` vs `0.9000001` stay separate by default.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::candidates::{resolve_each, CandidateSets};
use crate::error::ReconError;
use crate::model::{Candidate, DecisionKind, ItemKey, Reconciled, Resolution};
use crate::rounding::{mean, RoundingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTieBreak {
    /// Mean of the tied values, rounded half away from zero.
    #[default]
    Average,
    /// Tied candidate with the lowest source index.
    FirstSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ConfidenceConfig {
    /// Candidates within this distance of the best score count as tied.
    /// Anything above `0.0` merges near-ties.
    #[serde(default)]
    pub tie_epsilon: f64,
    #[serde(default)]
    pub tie_break: ConfidenceTieBreak,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: 0.0,
            tie_break: ConfidenceTieBreak::Average,
        }
    }
}

/// Resolve one key. Every candidate must carry a finite confidence.
pub fn resolve_by_confidence(
    key: &ItemKey,
    candidates: &[Candidate],
    config: &ConfidenceConfig,
) -> Result<Resolution, ReconError> {
    if candidates.is_empty() {
        return Err(ReconError::NoCandidates { key: key.clone() });
    }

    let mut scored: Vec<(&Candidate, f64)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match candidate.confidence {
            Some(conf) if conf.is_finite() => scored.push((candidate, conf)),
            other => {
                return Err(ReconError::InvalidValue {
                    source_index: candidate.source_index,
                    key: key.clone(),
                    value: other.map_or_else(|| "<no confidence>".to_string(), |c| c.to_string()),
                })
            }
        }
    }

    let best = scored
        .iter()
        .map(|(_, conf)| *conf)
        .fold(f64::NEG_INFINITY, f64::max);
    let top: Vec<(&Candidate, f64)> = scored
        .into_iter()
        .filter(|(_, conf)| best - conf <= config.tie_epsilon)
        .collect();

    if top.len() == 1 || config.tie_break == ConfidenceTieBreak::FirstSource {
        let (pick, conf) = top[0];
        return Ok(
            Resolution::new(pick.value, DecisionKind::ConfidencePick, vec![pick.source_index])
                .with_confidence(conf),
        );
    }

    let avg = mean(top.iter().map(|(c, _)| c.value)).unwrap_or_default();
    let value = RoundingPolicy::HalfAwayFromZero.to_label(avg);
    let sources: Vec<usize> = top.iter().map(|(c, _)| c.source_index).collect();
    debug!(
        key = %key,
        tied = top.len(),
        confidence = best,
        value,
        "averaged tied top-confidence predictions"
    );
    Ok(Resolution::new(value, DecisionKind::ConfidenceTieAverage, sources).with_confidence(best))
}

/// Resolve every key by confidence. Failures are per key.
pub fn reconcile_by_confidence(sets: &CandidateSets, config: &ConfidenceConfig) -> Reconciled {
    let out = resolve_each(sets, |key, candidates| {
        resolve_by_confidence(key, candidates, config).map(Some)
    });

    info!(
        keys = out.summary.total_keys,
        picks = out.summary.count(DecisionKind::ConfidencePick),
        tie_averages = out.summary.count(DecisionKind::ConfidenceTieAverage),
        failures = out.summary.failure_count(),
        "confidence reconciliation done"
    );
    out
}
