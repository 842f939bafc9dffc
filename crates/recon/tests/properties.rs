// Property-based tests for the reconcilers.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;

use proptest::prelude::*;
use ensemble_recon::aggregate::{aggregate_by_group, group_by_prefix, GroupConfig, Reduction};
use ensemble_recon::pairwise::resolve_pair;
use ensemble_recon::voting::majority_vote;
use ensemble_recon::{
    reconcile_by_confidence, reconcile_by_voting, reconcile_pair, Candidate, CandidateSets, ConfidenceConfig,
    DecisionKind, ItemKey, Label, PairwiseConfig, RoundingPolicy, VotingConfig, VotingStrategy,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_label() -> impl Strategy<Value = Label> {
    prop_oneof![
        4 => 0i64..6,
        1 => -1000i64..1000,
    ]
}

fn arb_rounding() -> impl Strategy<Value = RoundingPolicy> {
    prop_oneof![
        Just(RoundingPolicy::HalfAwayFromZero),
        Just(RoundingPolicy::HalfEven),
        Just(RoundingPolicy::Floor),
        Just(RoundingPolicy::Ceil),
    ]
}

/// Two sources over the same key set.
fn arb_pair() -> impl Strategy<Value = (BTreeMap<ItemKey, Label>, BTreeMap<ItemKey, Label>)> {
    prop::collection::btree_map(1u64..10_000, (arb_label(), arb_label()), 0..40).prop_map(|rows| {
        let left = rows.iter().map(|(k, (a, _))| (ItemKey::from(*k), *a)).collect();
        let right = rows.iter().map(|(k, (_, b))| (ItemKey::from(*k), *b)).collect();
        (left, right)
    })
}

/// `n` complete sources over the same keys.
fn arb_sources(n: usize) -> impl Strategy<Value = Vec<BTreeMap<ItemKey, Label>>> {
    prop::collection::btree_map(1u64..10_000, prop::collection::vec(arb_label(), n), 1..30).prop_map(
        move |rows| {
            (0..n)
                .map(|src| rows.iter().map(|(k, vals)| (ItemKey::from(*k), vals[src])).collect())
                .collect()
        },
    )
}

// ---------------------------------------------------------------------------
// Pairwise
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn pairwise_small_gaps_pick_an_input(a in arb_label(), b in arb_label(), rounding in arb_rounding()) {
        let config = PairwiseConfig { rounding, ..PairwiseConfig::default() };
        let res = resolve_pair(a, b, &config);
        match a.abs_diff(b) {
            0 => {
                prop_assert_eq!(res.value, a);
                prop_assert_eq!(res.decision, DecisionKind::ExactMatch);
            }
            1 => {
                prop_assert_eq!(res.value, a.max(b));
                prop_assert_eq!(res.decision, DecisionKind::SmallDisagreement);
            }
            _ => {
                prop_assert_eq!(res.decision, DecisionKind::LargeDisagreement);
                prop_assert!(res.value >= a.min(b) && res.value <= a.max(b));
            }
        }
    }

    #[test]
    fn pairwise_is_symmetric(a in arb_label(), b in arb_label(), rounding in arb_rounding()) {
        let config = PairwiseConfig { rounding, ..PairwiseConfig::default() };
        prop_assert_eq!(resolve_pair(a, b, &config).value, resolve_pair(b, a, &config).value);
    }

    #[test]
    fn pairwise_covers_every_key((left, right) in arb_pair()) {
        let out = reconcile_pair(&left, &right, &PairwiseConfig::default()).unwrap();
        prop_assert_eq!(out.resolutions.len(), left.len());
        prop_assert_eq!(out.summary.total_keys, left.len());

        let counted: usize = out.summary.decisions.values().sum();
        prop_assert_eq!(counted, left.len());
    }

    #[test]
    fn pairwise_is_idempotent((left, _) in arb_pair()) {
        let out = reconcile_pair(&left, &left, &PairwiseConfig::default()).unwrap();
        prop_assert_eq!(out.values(), left);
    }
}

// ---------------------------------------------------------------------------
// Voting + confidence
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn majority_winner_has_top_count(values in prop::collection::vec(arb_label(), 1..8)) {
        let candidates: Vec<Candidate> =
            values.iter().enumerate().map(|(i, v)| Candidate::new(i, *v)).collect();
        let (winner, tied) = majority_vote(&candidates).unwrap();

        let count_of = |x: Label| values.iter().filter(|v| **v == x).count();
        let top = values.iter().map(|v| count_of(*v)).max().unwrap();
        prop_assert_eq!(count_of(winner), top);

        // earliest value holding the top count
        let first = values.iter().find(|v| count_of(**v) == top).copied().unwrap();
        prop_assert_eq!(winner, first);

        let leaders: std::collections::BTreeSet<Label> =
            values.iter().copied().filter(|v| count_of(*v) == top).collect();
        prop_assert_eq!(tied, leaders.len() > 1);
    }

    #[test]
    fn unanimous_sources_vote_through(sources in arb_sources(1)) {
        let copies = vec![sources[0].clone(), sources[0].clone(), sources[0].clone()];
        let sets = CandidateSets::from_labels(&copies);
        for strategy in [VotingStrategy::Majority, VotingStrategy::Average] {
            let out = reconcile_by_voting(&sets, &VotingConfig::new(strategy, true)).unwrap();
            prop_assert_eq!(out.values(), sources[0].clone());
        }
    }

    #[test]
    fn average_vote_stays_in_range(sources in arb_sources(3)) {
        let sets = CandidateSets::from_labels(&sources);
        let out = reconcile_by_voting(&sets, &VotingConfig::new(VotingStrategy::Average, true)).unwrap();
        for (key, res) in &out.resolutions {
            let vals: Vec<Label> = sources.iter().map(|s| s[key]).collect();
            let lo = *vals.iter().min().unwrap();
            let hi = *vals.iter().max().unwrap();
            prop_assert!(res.value >= lo && res.value <= hi);
        }
    }

    #[test]
    fn confidence_pick_is_the_most_confident(
        rows in prop::collection::btree_map(
            1u64..1000,
            ((arb_label(), 0.0f64..1.0), (arb_label(), 0.0f64..1.0)),
            1..30,
        )
    ) {
        let left: BTreeMap<ItemKey, (Label, f64)> =
            rows.iter().map(|(k, (a, _))| (ItemKey::from(*k), *a)).collect();
        let right: BTreeMap<ItemKey, (Label, f64)> =
            rows.iter().map(|(k, (_, b))| (ItemKey::from(*k), *b)).collect();
        let sets = CandidateSets::from_scored(&[left, right]);
        let out = reconcile_by_confidence(&sets, &ConfidenceConfig::default());

        prop_assert_eq!(out.summary.failure_count(), 0);
        for (k, ((va, ca), (vb, cb))) in &rows {
            let res = &out.resolutions[&ItemKey::from(*k)];
            if ca > cb {
                prop_assert_eq!(res.value, *va);
                prop_assert_eq!(res.decision, DecisionKind::ConfidencePick);
            } else if cb > ca {
                prop_assert_eq!(res.value, *vb);
                prop_assert_eq!(res.decision, DecisionKind::ConfidencePick);
            } else {
                prop_assert_eq!(res.decision, DecisionKind::ConfidenceTieAverage);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn grouping_ignores_row_order(
        rows in prop::collection::btree_map("[0-9]{3}[A-C]", arb_label(), 1..30),
        reduce in prop_oneof![Just(Reduction::Max), Just(Reduction::Min), Just(Reduction::Mean)],
    ) {
        let config = GroupConfig { prefix_len: 3, reduce, rounding: RoundingPolicy::HalfAwayFromZero };
        let values: BTreeMap<ItemKey, Label> =
            rows.iter().map(|(k, v)| (ItemKey::from(k.as_str()), *v)).collect();
        let grouped = group_by_prefix(&values, &config);

        let reduce_fn = |members: &[Label]| reduce.apply(members, config.rounding);
        let backwards = aggregate_by_group(values.iter().rev(), |key| key.prefix(3), reduce_fn);
        prop_assert_eq!(&grouped, &backwards);

        if reduce == Reduction::Max {
            for (group, value) in &grouped {
                let best = rows
                    .iter()
                    .filter(|(k, _)| k.starts_with(group.as_str()))
                    .map(|(_, v)| *v)
                    .max()
                    .unwrap();
                prop_assert_eq!(*value, best);
            }
        }
    }
}
