use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReconError;
use crate::model::{ItemKey, Label};
use crate::rounding::{mean, RoundingPolicy};

/// Collapse rows into one value per group, ascending by group key.
///
/// Every group present in `rows` appears in the output. Members are sorted
/// before `reduce` sees them, so the result does not depend on row order as
/// long as `reduce` is commutative and associative. That property is the
/// caller's responsibility; other reductions give unspecified results.
pub fn aggregate_by_group<'a, I, G, P, R>(rows: I, group_key_of: P, reduce: R) -> BTreeMap<G, Label>
where
    I: IntoIterator<Item = (&'a ItemKey, &'a Label)>,
    G: Ord,
    P: Fn(&ItemKey) -> G,
    R: Fn(&[Label]) -> Label,
{
    let mut groups: BTreeMap<G, Vec<Label>> = BTreeMap::new();
    for (key, value) in rows {
        groups.entry(group_key_of(key)).or_default().push(*value);
    }

    groups
        .into_iter()
        .map(|(group, mut members)| {
            members.sort_unstable();
            let value = reduce(&members);
            (group, value)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Reduction {
    #[default]
    Max,
    Min,
    /// Mean, rounded with the group's rounding policy.
    Mean,
}

impl Reduction {
    pub fn apply(self, members: &[Label], rounding: RoundingPolicy) -> Label {
        match self {
            Self::Max => members.iter().copied().max().unwrap_or_default(),
            Self::Min => members.iter().copied().min().unwrap_or_default(),
            Self::Mean => mean(members.iter().copied())
                .map(|avg| rounding.to_label(avg))
                .unwrap_or_default(),
        }
    }
}

impl std::str::FromStr for Reduction {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "mean" | "average" => Ok(Self::Mean),
            other => Err(ReconError::Configuration(format!(
                "unknown reduction '{other}' (expected max, min or mean)"
            ))),
        }
    }
}

impl TryFrom<String> for Reduction {
    type Error = ReconError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Group by a fixed-length key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct GroupConfig {
    pub prefix_len: usize,
    #[serde(default)]
    pub reduce: Reduction,
    #[serde(default)]
    pub rounding: RoundingPolicy,
}

pub fn group_by_prefix(values: &BTreeMap<ItemKey, Label>, config: &GroupConfig) -> BTreeMap<ItemKey, Label> {
    let groups = aggregate_by_group(
        values,
        |key| key.prefix(config.prefix_len),
        |members| config.reduce.apply(members, config.rounding),
    );
    debug!(rows = values.len(), groups = groups.len(), prefix_len = config.prefix_len, "grouped by key prefix");
    groups
}
