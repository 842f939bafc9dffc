//! `ensemble-recon`: consensus labels from several prediction sources.
//!
//! Pure engine crate: receives pre-loaded key→label mappings, returns one
//! resolved label per key plus decision counters. The `records` module reads
//! and writes delimited text but never touches the filesystem.

pub mod aggregate;
pub mod candidates;
pub mod compare;
pub mod confidence;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod pairwise;
pub mod records;
pub mod rounding;
pub mod summary;
pub mod voting;

pub use aggregate::{aggregate_by_group, group_by_prefix, GroupConfig, Reduction};
pub use candidates::CandidateSets;
pub use compare::{compare_sources, ComparisonReport};
pub use confidence::{reconcile_by_confidence, ConfidenceConfig, ConfidenceTieBreak};
pub use config::{EnsembleConfig, Policy};
pub use engine::{run, EnsembleInput, EnsembleResult};
pub use error::ReconError;
pub use model::{Candidate, DecisionKind, ItemKey, Label, Reconciled, Record, Resolution};
pub use pairwise::{reconcile_pair, reconcile_pairs, PairwiseConfig, SmallGapPick};
pub use rounding::RoundingPolicy;
pub use summary::RunSummary;
pub use voting::{reconcile_by_voting, MissingSourcePolicy, VotingConfig, VotingStrategy};
