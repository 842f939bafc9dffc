use std::collections::BTreeMap;
use std::path::PathBuf;

use ensemble_recon::config::EnsembleConfig;
use ensemble_recon::engine::{run, EnsembleInput};
use ensemble_recon::model::{DecisionKind, ItemKey, Label};
use ensemble_recon::records::{load_labels, load_raw, load_records, LoadOptions};
use ensemble_recon::{
    compare_sources, reconcile_pair, CandidateSets, MissingSourcePolicy, PairwiseConfig, RoundingPolicy,
    VotingConfig, VotingStrategy,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn load_and_run(config_toml: &str) -> ensemble_recon::EnsembleResult {
    let config = EnsembleConfig::from_toml(config_toml).unwrap();

    let mut sources = Vec::new();
    for (idx, source) in config.sources.iter().enumerate() {
        let data = read_fixture(&source.file);
        sources.push(load_records(&data, &source.load_options(idx)).unwrap());
    }

    run(&config, &EnsembleInput { sources }).unwrap()
}

fn labels(name: &str, source_index: usize) -> BTreeMap<ItemKey, Label> {
    load_labels(&read_fixture(name), &LoadOptions::for_source(source_index)).unwrap()
}

fn key(raw: &str) -> ItemKey {
    ItemKey::from(raw)
}

// -------------------------------------------------------------------------
// Voting
// -------------------------------------------------------------------------

#[test]
fn three_model_majority_vote() {
    let result = load_and_run(&read_fixture("voting.ensemble.toml"));

    assert_eq!(result.meta.sources, vec!["model-a", "model-b", "model-c"]);
    assert_eq!(result.summary.total_keys, 5);
    assert_eq!(result.summary.count(DecisionKind::MajorityVote), 4);
    assert_eq!(result.summary.count(DecisionKind::Tie), 1);
    assert_eq!(result.summary.failure_count(), 0);

    let values: Vec<Label> = result.resolutions.values().map(|r| r.value).collect();
    assert_eq!(values, vec![3, 3, 4, 5, 4]);
    assert_eq!(result.resolutions[&key("1000005")].decision, DecisionKind::Tie);
}

#[test]
fn three_model_average_vote() {
    let toml = read_fixture("voting.ensemble.toml").replace("\"majority\"", "\"average\"");
    let result = load_and_run(&toml);

    assert_eq!(result.summary.count(DecisionKind::AverageVote), 5);
    let values: Vec<Label> = result.resolutions.values().map(|r| r.value).collect();
    assert_eq!(values, vec![3, 3, 3, 4, 3]);
}

#[test]
fn voting_with_missing_rows() {
    let a = labels("model_a.csv", 0);
    let mut b = labels("model_b.csv", 1);
    b.remove(&key("1000003"));
    let c = labels("model_c.csv", 2);
    let sets = CandidateSets::from_labels(&[a, b, c]);

    let strict = VotingConfig::default();
    assert!(ensemble_recon::reconcile_by_voting(&sets, &strict).is_err());

    let exclude = VotingConfig { missing: MissingSourcePolicy::Exclude, ..VotingConfig::default() };
    let out = ensemble_recon::reconcile_by_voting(&sets, &exclude).unwrap();
    assert_eq!(out.resolutions.len(), 4);
    assert_eq!(out.summary.excluded, vec![key("1000003")]);

    let present = VotingConfig::new(VotingStrategy::Majority, false);
    let out = ensemble_recon::reconcile_by_voting(&sets, &present).unwrap();
    // 1 vs 4: a tie, first source wins
    assert_eq!(out.resolutions[&key("1000003")].value, 1);
    assert_eq!(out.resolutions[&key("1000003")].decision, DecisionKind::Tie);
}

// -------------------------------------------------------------------------
// Pairwise
// -------------------------------------------------------------------------

#[test]
fn pairwise_two_models() {
    let a = labels("model_a.csv", 0);
    let b = labels("model_b.csv", 1);

    let out = reconcile_pair(&a, &b, &PairwiseConfig::default()).unwrap();
    assert_eq!(out.summary.count(DecisionKind::ExactMatch), 2);
    assert_eq!(out.summary.count(DecisionKind::SmallDisagreement), 1);
    assert_eq!(out.summary.count(DecisionKind::LargeDisagreement), 2);
    assert_eq!(out.resolutions[&key("1000003")].value, 3);

    let even = PairwiseConfig { rounding: RoundingPolicy::HalfEven, ..PairwiseConfig::default() };
    let out = reconcile_pair(&a, &b, &even).unwrap();
    assert_eq!(out.resolutions[&key("1000003")].value, 2);
}

#[test]
fn pairwise_rejects_different_key_sets() {
    let a = labels("model_a.csv", 0);
    let mut b = labels("model_b.csv", 1);
    b.remove(&key("1000004"));
    b.insert(key("9999999"), 1);
    assert!(reconcile_pair(&a, &b, &PairwiseConfig::default()).is_err());
}

#[test]
fn comparison_report() {
    let a = load_raw(&read_fixture("model_a.csv"), &LoadOptions::for_source(0)).unwrap();
    let c = load_raw(&read_fixture("model_c.csv"), &LoadOptions::for_source(1)).unwrap();
    let report = compare_sources(&a, &c).unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.exact, 0);
    // 3/2 and 4/3 are one apart; 2/3 too
    assert_eq!(report.within_one, 3);
    assert_eq!(report.large, 2);
    assert_eq!(report.disagreements.len(), 5);
}

// -------------------------------------------------------------------------
// Confidence + grouping
// -------------------------------------------------------------------------

#[test]
fn confidence_with_prefix_groups() {
    let result = load_and_run(&read_fixture("confidence.ensemble.toml"));

    assert_eq!(result.summary.count(DecisionKind::ConfidencePick), 2);
    assert_eq!(result.summary.count(DecisionKind::ConfidenceTieAverage), 2);
    assert_eq!(result.summary.source_picks.get(&0), Some(&1));
    assert_eq!(result.summary.source_picks.get(&1), Some(&1));
    assert_eq!(result.summary.source_tie_averages.get(&0), Some(&2));

    assert_eq!(result.resolutions[&key("1000001A")].value, 6);
    assert_eq!(result.resolutions[&key("1000001B")].value, 2);
    assert_eq!(result.resolutions[&key("1000002A")].value, 2);
    assert_eq!(result.resolutions[&key("1000002B")].value, 3);

    let groups = result.groups.expect("group section configured");
    let rows: Vec<(&str, Label)> = groups.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    assert_eq!(rows, vec![("1000001", 6), ("1000002", 3)]);
}

#[test]
fn confidence_reports_each_source_mean() {
    let result = load_and_run(&read_fixture("confidence.ensemble.toml"));

    let per_source: Vec<(&str, usize, f64)> = result
        .source_confidence
        .iter()
        .map(|s| (s.name.as_str(), s.scored, s.stats.mean))
        .collect();
    assert_eq!(per_source.len(), 2);
    assert_eq!(per_source[0].0, "scored_a.csv");
    assert_eq!(per_source[0].1, 4);
    assert!((per_source[0].2 - 0.6875).abs() < 1e-12);
    assert_eq!(per_source[1].0, "scored_b.csv");
    assert!((per_source[1].2 - 0.75).abs() < 1e-12);
    assert_eq!(result.source_confidence[0].stats.min, 0.5);
}

#[test]
fn result_serializes_to_json() {
    let result = load_and_run(&read_fixture("confidence.ensemble.toml"));
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["meta"]["policy"], "confidence");
    assert_eq!(json["resolutions"]["1000001A"]["decision"], "confidence_tie_average");
    assert_eq!(json["summary"]["decisions"]["confidence_pick"], 2);
    assert_eq!(json["groups"]["1000002"], 3);
    assert_eq!(json["source_confidence"][1]["name"], "scored_b.csv");
    assert_eq!(json["source_confidence"][1]["max"], 0.9);
}
