use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::aggregate::group_by_prefix;
use crate::candidates::CandidateSets;
use crate::config::{EnsembleConfig, Policy};
use crate::confidence::reconcile_by_confidence;
use crate::error::ReconError;
use crate::model::{ItemKey, Label, Record, Resolution};
use crate::pairwise::reconcile_pair;
use crate::summary::{
    label_distribution, source_confidence, ConfidenceStats, LabelShare, RunSummary, SourceConfidence,
};
use crate::voting::reconcile_by_voting;

/// Pre-loaded records, one map per configured source, in config order.
pub struct EnsembleInput {
    pub sources: Vec<BTreeMap<ItemKey, Record>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleMeta {
    pub config_name: String,
    pub policy: Policy,
    pub sources: Vec<String>,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleResult {
    pub meta: EnsembleMeta,
    pub summary: RunSummary,
    pub resolutions: BTreeMap<ItemKey, Resolution>,
    /// Present when the config has a `[group]` section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<ItemKey, Label>>,
    /// Distribution of the final output (groups when grouped).
    pub distribution: Vec<LabelShare>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceStats>,
    /// Input confidence per source, for sources that carry one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_confidence: Vec<SourceConfidence>,
}

/// Run the configured policy over pre-loaded sources.
pub fn run(config: &EnsembleConfig, input: &EnsembleInput) -> Result<EnsembleResult, ReconError> {
    config.validate()?;
    if input.sources.len() != config.sources.len() {
        return Err(ReconError::Configuration(format!(
            "config '{}' declares {} source(s), got {}",
            config.name,
            config.sources.len(),
            input.sources.len()
        )));
    }

    info!(
        config = %config.name,
        policy = %config.policy,
        sources = input.sources.len(),
        "running ensemble"
    );

    let reconciled = match config.policy {
        Policy::Pairwise => {
            let left = labels_of(&input.sources[0]);
            let right = labels_of(&input.sources[1]);
            reconcile_pair(&left, &right, &config.pairwise)?
        }
        Policy::Confidence => {
            let sets = CandidateSets::from_records(&input.sources);
            reconcile_by_confidence(&sets, &config.confidence)
        }
        Policy::Voting => {
            let sets = CandidateSets::from_records(&input.sources);
            reconcile_by_voting(&sets, &config.voting)?
        }
    };

    let groups = config
        .group
        .as_ref()
        .map(|group| group_by_prefix(&reconciled.values(), group));

    let distribution = match groups {
        Some(ref g) => label_distribution(g.values()),
        None => label_distribution(reconciled.resolutions.values().map(|r| &r.value)),
    };
    let confidence = ConfidenceStats::from_resolutions(reconciled.resolutions.values());
    let names: Vec<String> = config.sources.iter().map(|s| s.display_name().to_string()).collect();
    let source_confidence = source_confidence(&input.sources, &names);

    Ok(EnsembleResult {
        meta: EnsembleMeta {
            config_name: config.name.clone(),
            policy: config.policy,
            sources: names,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary: reconciled.summary,
        resolutions: reconciled.resolutions,
        groups,
        distribution,
        confidence,
        source_confidence,
    })
}

fn labels_of(records: &BTreeMap<ItemKey, Record>) -> BTreeMap<ItemKey, Label> {
    records.iter().map(|(k, r)| (k.clone(), r.value)).collect()
}
