//! N-source voting: majority or rounded mean.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::candidates::{resolve_each, CandidateSets};
use crate::error::ReconError;
use crate::model::{Candidate, DecisionKind, ItemKey, Label, Reconciled, Resolution};
use crate::rounding::{mean, RoundingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum VotingStrategy {
    #[default]
    Majority,
    Average,
}

impl FromStr for VotingStrategy {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "majority" => Ok(Self::Majority),
            "average" | "mean" => Ok(Self::Average),
            other => Err(ReconError::Configuration(format!(
                "unknown voting strategy '{other}' (expected majority or average)"
            ))),
        }
    }
}

impl TryFrom<String> for VotingStrategy {
    type Error = ReconError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Majority => write!(f, "majority"),
            Self::Average => write!(f, "average"),
        }
    }
}

/// What to do with a key that some sources lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSourcePolicy {
    /// Fail the whole run with `KeySetMismatch`.
    #[default]
    RequireAll,
    /// Leave the key out of the output; it is listed in `RunSummary::excluded`.
    Exclude,
    /// Vote with whatever sources are present.
    UsePresent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VotingConfig {
    #[serde(default)]
    pub strategy: VotingStrategy,
    #[serde(default)]
    pub missing: MissingSourcePolicy,
}

impl VotingConfig {
    pub fn new(strategy: VotingStrategy, require_all_sources: bool) -> Self {
        Self {
            strategy,
            missing: if require_all_sources {
                MissingSourcePolicy::RequireAll
            } else {
                MissingSourcePolicy::UsePresent
            },
        }
    }
}

/// Most frequent value. On a tie for the top count the value seen first in
/// source order wins and the second element is `true`.
pub fn majority_vote(candidates: &[Candidate]) -> Option<(Label, bool)> {
    let mut tallies: Vec<(Label, usize)> = Vec::new();
    for candidate in candidates {
        match tallies.iter_mut().find(|(value, _)| *value == candidate.value) {
            Some((_, count)) => *count += 1,
            None => tallies.push((candidate.value, 1)),
        }
    }

    let top = tallies.iter().map(|(_, count)| *count).max()?;
    let mut leaders = tallies.iter().filter(|(_, count)| *count == top);
    let (winner, _) = leaders.next()?;
    Some((*winner, leaders.next().is_some()))
}

/// Resolve one key from the candidates present for it.
pub fn resolve_vote(
    key: &ItemKey,
    candidates: &[Candidate],
    strategy: VotingStrategy,
) -> Result<Resolution, ReconError> {
    match strategy {
        VotingStrategy::Majority => {
            let (value, tied) = majority_vote(candidates)
                .ok_or_else(|| ReconError::NoCandidates { key: key.clone() })?;
            let sources = candidates
                .iter()
                .filter(|c| c.value == value)
                .map(|c| c.source_index)
                .collect();
            let decision = if tied { DecisionKind::Tie } else { DecisionKind::MajorityVote };
            Ok(Resolution::new(value, decision, sources))
        }
        VotingStrategy::Average => {
            let avg = mean(candidates.iter().map(|c| c.value))
                .ok_or_else(|| ReconError::NoCandidates { key: key.clone() })?;
            let sources = candidates.iter().map(|c| c.source_index).collect();
            Ok(Resolution::new(
                RoundingPolicy::HalfAwayFromZero.to_label(avg),
                DecisionKind::AverageVote,
                sources,
            ))
        }
    }
}

/// Vote on every key.
///
/// Under `RequireAll` a key missing from any source fails the whole run
/// before anything is resolved. `NoCandidates` is reported per key.
pub fn reconcile_by_voting(sets: &CandidateSets, config: &VotingConfig) -> Result<Reconciled, ReconError> {
    if config.missing == MissingSourcePolicy::RequireAll {
        sets.check_complete()?;
    }

    let out = resolve_each(sets, |key, candidates| {
        if config.missing == MissingSourcePolicy::Exclude && !sets.missing_sources(key).is_empty() {
            return Ok(None);
        }
        resolve_vote(key, candidates, config.strategy).map(Some)
    });

    info!(
        keys = out.summary.total_keys,
        strategy = %config.strategy,
        majority = out.summary.count(DecisionKind::MajorityVote),
        ties = out.summary.count(DecisionKind::Tie),
        averaged = out.summary.count(DecisionKind::AverageVote),
        excluded = out.summary.excluded.len(),
        failures = out.summary.failure_count(),
        "voting reconciliation done"
    );
    Ok(out)
}
