//! Two-source reconciliation by size of disagreement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::candidates::check_same_keys;
use crate::error::ReconError;
use crate::model::{DecisionKind, ItemKey, Label, Reconciled, Resolution};
use crate::rounding::{midpoint, RoundingPolicy};

/// Which value wins when the two sources are one unit apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallGapPick {
    #[default]
    Higher,
    Lower,
    /// Always the first source's value.
    First,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PairwiseConfig {
    /// Applied to the midpoint when the gap is larger than one.
    #[serde(default)]
    pub rounding: RoundingPolicy,
    #[serde(default)]
    pub small_gap: SmallGapPick,
}

/// Resolve one key from the two sources' labels.
pub fn resolve_pair(a: Label, b: Label, config: &PairwiseConfig) -> Resolution {
    match a.abs_diff(b) {
        0 => Resolution::new(a, DecisionKind::ExactMatch, vec![0, 1]),
        1 => {
            let take_first = match config.small_gap {
                SmallGapPick::Higher => a > b,
                SmallGapPick::Lower => a < b,
                SmallGapPick::First => true,
            };
            if take_first {
                Resolution::new(a, DecisionKind::SmallDisagreement, vec![0])
            } else {
                Resolution::new(b, DecisionKind::SmallDisagreement, vec![1])
            }
        }
        _ => Resolution::new(
            config.rounding.to_label(midpoint(a, b)),
            DecisionKind::LargeDisagreement,
            vec![0, 1],
        ),
    }
}

/// Zip two sources into per-key pairs. Fails unless both cover exactly the
/// same keys.
pub fn join_pairs(
    left: &BTreeMap<ItemKey, Label>,
    right: &BTreeMap<ItemKey, Label>,
) -> Result<BTreeMap<ItemKey, (Label, Label)>, ReconError> {
    check_same_keys(left, right)?;
    Ok(left
        .iter()
        .filter_map(|(key, a)| right.get(key).map(|b| (key.clone(), (*a, *b))))
        .collect())
}

/// Resolve already-joined pairs.
pub fn reconcile_pairs(
    pairs: &BTreeMap<ItemKey, (Label, Label)>,
    config: &PairwiseConfig,
) -> Reconciled {
    let mut out = Reconciled::default();
    for (key, &(a, b)) in pairs {
        let resolution = resolve_pair(a, b, config);
        if resolution.decision == DecisionKind::LargeDisagreement {
            debug!(key = %key, a, b, value = resolution.value, rounding = %config.rounding, "averaged large disagreement");
        }
        out.summary.total_keys += 1;
        out.summary.record(&resolution);
        out.resolutions.insert(key.clone(), resolution);
    }

    info!(
        keys = out.summary.total_keys,
        exact = out.summary.count(DecisionKind::ExactMatch),
        small = out.summary.count(DecisionKind::SmallDisagreement),
        large = out.summary.count(DecisionKind::LargeDisagreement),
        "pairwise reconciliation done"
    );
    out
}

/// Reconcile two label sources. No partial result on a key-set mismatch.
pub fn reconcile_pair(
    left: &BTreeMap<ItemKey, Label>,
    right: &BTreeMap<ItemKey, Label>,
    config: &PairwiseConfig,
) -> Result<Reconciled, ReconError> {
    let pairs = join_pairs(left, right)?;
    Ok(reconcile_pairs(&pairs, config))
}
