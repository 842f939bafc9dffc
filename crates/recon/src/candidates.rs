use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::error::ReconError;
use crate::model::{Candidate, ItemKey, Label, Reconciled, Record, Resolution};

/// Candidates per key across `source_count` sources, each list in
/// ascending source order. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct CandidateSets {
    source_count: usize,
    sets: BTreeMap<ItemKey, Vec<Candidate>>,
}

impl CandidateSets {
    pub fn from_candidates(source_count: usize, mut sets: BTreeMap<ItemKey, Vec<Candidate>>) -> Self {
        for candidates in sets.values_mut() {
            candidates.sort_by_key(|c| c.source_index);
        }
        Self { source_count, sets }
    }

    pub fn from_labels(sources: &[BTreeMap<ItemKey, Label>]) -> Self {
        let mut sets: BTreeMap<ItemKey, Vec<Candidate>> = BTreeMap::new();
        for (idx, source) in sources.iter().enumerate() {
            for (key, value) in source {
                sets.entry(key.clone()).or_default().push(Candidate::new(idx, *value));
            }
        }
        Self { source_count: sources.len(), sets }
    }

    pub fn from_scored(sources: &[BTreeMap<ItemKey, (Label, f64)>]) -> Self {
        let mut sets: BTreeMap<ItemKey, Vec<Candidate>> = BTreeMap::new();
        for (idx, source) in sources.iter().enumerate() {
            for (key, (value, confidence)) in source {
                sets.entry(key.clone())
                    .or_default()
                    .push(Candidate::scored(idx, *value, *confidence));
            }
        }
        Self { source_count: sources.len(), sets }
    }

    pub fn from_records(sources: &[BTreeMap<ItemKey, Record>]) -> Self {
        let mut sets: BTreeMap<ItemKey, Vec<Candidate>> = BTreeMap::new();
        for (idx, source) in sources.iter().enumerate() {
            for (key, record) in source {
                sets.entry(key.clone()).or_default().push(Candidate {
                    source_index: idx,
                    value: record.value,
                    confidence: record.confidence,
                });
            }
        }
        Self { source_count: sources.len(), sets }
    }

    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&[Candidate]> {
        self.sets.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemKey, &[Candidate])> {
        self.sets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Source indices with no candidate for `key`.
    pub fn missing_sources(&self, key: &ItemKey) -> Vec<usize> {
        let present: BTreeSet<usize> = self
            .sets
            .get(key)
            .map(|cs| cs.iter().map(|c| c.source_index).collect())
            .unwrap_or_default();
        (0..self.source_count).filter(|i| !present.contains(i)).collect()
    }

    /// Every source must cover every key. Reports the first source that doesn't.
    pub fn check_complete(&self) -> Result<(), ReconError> {
        for source_index in 0..self.source_count {
            let missing: Vec<ItemKey> = self
                .sets
                .iter()
                .filter(|(_, cs)| !cs.iter().any(|c| c.source_index == source_index))
                .map(|(k, _)| k.clone())
                .collect();
            if !missing.is_empty() {
                return Err(ReconError::KeySetMismatch {
                    source_index,
                    missing,
                    unexpected: Vec::new(),
                });
            }
        }
        Ok(())
    }
}

/// Require `right` to cover exactly the keys of `left`.
///
/// Full set equality, checked before anything is resolved. `right` is
/// reported as source 1.
pub fn check_same_keys<V, W>(
    left: &BTreeMap<ItemKey, V>,
    right: &BTreeMap<ItemKey, W>,
) -> Result<(), ReconError> {
    let missing: Vec<ItemKey> = left.keys().filter(|k| !right.contains_key(*k)).cloned().collect();
    let unexpected: Vec<ItemKey> = right.keys().filter(|k| !left.contains_key(*k)).cloned().collect();
    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(ReconError::KeySetMismatch {
            source_index: 1,
            missing,
            unexpected,
        })
    }
}

/// Resolve every key with `resolve`. `Ok(None)` marks the key as excluded;
/// errors are recorded per key and the run carries on.
///
/// With the `parallel` feature keys are split across rayon workers, each
/// building a partial result that is merged at the end.
pub(crate) fn resolve_each<F>(sets: &CandidateSets, resolve: F) -> Reconciled
where
    F: Fn(&ItemKey, &[Candidate]) -> Result<Option<Resolution>, ReconError> + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let entries: Vec<(&ItemKey, &[Candidate])> = sets.iter().collect();
        entries
            .par_iter()
            .fold(Reconciled::default, |mut acc, (key, candidates)| {
                step(&mut acc, key, candidates, &resolve);
                acc
            })
            .reduce(Reconciled::default, Reconciled::merge)
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut acc = Reconciled::default();
        for (key, candidates) in sets.iter() {
            step(&mut acc, key, candidates, &resolve);
        }
        acc
    }
}

fn step<F>(acc: &mut Reconciled, key: &ItemKey, candidates: &[Candidate], resolve: &F)
where
    F: Fn(&ItemKey, &[Candidate]) -> Result<Option<Resolution>, ReconError>,
{
    acc.summary.total_keys += 1;
    match resolve(key, candidates) {
        Ok(Some(resolution)) => {
            acc.summary.record(&resolution);
            acc.resolutions.insert(key.clone(), resolution);
        }
        Ok(None) => acc.summary.record_excluded(key.clone()),
        Err(err) => {
            warn!(key = %key, error = %err, "key left unresolved");
            acc.summary.record_failure(key.clone(), &err);
        }
    }
}
