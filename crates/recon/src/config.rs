use serde::{Deserialize, Serialize};

use crate::aggregate::{GroupConfig, Reduction};
use crate::confidence::ConfidenceConfig;
use crate::error::ReconError;
use crate::pairwise::PairwiseConfig;
use crate::records::{ColumnRef, LoadOptions, WriteOptions};
use crate::rounding::RoundingPolicy;
use crate::voting::{VotingConfig, VotingStrategy};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    pub name: String,
    pub policy: Policy,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub pairwise: PairwiseConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub voting: VotingConfig,
    #[serde(default)]
    pub group: Option<GroupConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Pairwise,
    Confidence,
    Voting,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pairwise => write!(f, "pairwise"),
            Self::Confidence => write!(f, "confidence"),
            Self::Voting => write!(f, "voting"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Path, relative to the config file.
    pub file: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_value_column")]
    pub value_column: ColumnRef,
    #[serde(default)]
    pub confidence_column: Option<ColumnRef>,
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Replaces the default header markers when set.
    #[serde(default)]
    pub header_names: Option<Vec<String>>,
}

fn default_value_column() -> ColumnRef {
    ColumnRef::Index(1)
}

impl SourceConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.file)
    }

    pub fn load_options(&self, source_index: usize) -> LoadOptions {
        let mut opts = LoadOptions::for_source(source_index);
        opts.value_column = self.value_column.clone();
        opts.confidence_column = self.confidence_column.clone();
        if let Some(delim) = self.delimiter {
            // validate() guarantees ASCII
            opts.delimiter = delim as u8;
        }
        if let Some(ref names) = self.header_names {
            opts.header_names = names.clone();
        }
        opts
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// CSV destination, relative to the config file.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(flatten)]
    pub format: WriteOptions,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EnsembleConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let table: toml::Table = input
            .parse()
            .map_err(|e: toml::de::Error| ReconError::ConfigParse(e.to_string()))?;
        check_policy_names(&table)?;
        let config: EnsembleConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let n = self.sources.len();
        match self.policy {
            Policy::Pairwise if n != 2 => {
                return Err(ReconError::Configuration(format!(
                    "pairwise policy needs exactly 2 sources, found {n}"
                )));
            }
            Policy::Confidence | Policy::Voting if n < 2 => {
                return Err(ReconError::Configuration(format!(
                    "{} policy needs at least 2 sources, found {n}",
                    self.policy
                )));
            }
            _ => {}
        }

        for (idx, source) in self.sources.iter().enumerate() {
            if source.file.trim().is_empty() {
                return Err(ReconError::Configuration(format!("source {idx}: empty file path")));
            }
            if self.policy == Policy::Confidence && source.confidence_column.is_none() {
                return Err(ReconError::Configuration(format!(
                    "source {idx} ('{}'): confidence policy requires confidence_column",
                    source.display_name()
                )));
            }
            if let Some(delim) = source.delimiter {
                if !delim.is_ascii() {
                    return Err(ReconError::Configuration(format!(
                        "source {idx}: delimiter must be a single ASCII character"
                    )));
                }
            }
        }

        let eps = self.confidence.tie_epsilon;
        if !eps.is_finite() || eps < 0.0 {
            return Err(ReconError::Configuration(format!(
                "tie_epsilon must be finite and >= 0, got {eps}"
            )));
        }

        if let Some(ref group) = self.group {
            if group.prefix_len == 0 {
                return Err(ReconError::Configuration("group.prefix_len must be > 0".into()));
            }
        }

        Ok(())
    }
}

/// Named policy settings go through the same `FromStr` as the CLI flags, so an
/// unknown name is a configuration error rather than a parse error.
fn check_policy_names(table: &toml::Table) -> Result<(), ReconError> {
    if let Some(s) = setting(table, "pairwise", "rounding") {
        s.parse::<RoundingPolicy>()?;
    }
    if let Some(s) = setting(table, "voting", "strategy") {
        s.parse::<VotingStrategy>()?;
    }
    if let Some(s) = setting(table, "group", "reduce") {
        s.parse::<Reduction>()?;
    }
    if let Some(s) = setting(table, "group", "rounding") {
        s.parse::<RoundingPolicy>()?;
    }
    Ok(())
}

fn setting<'a>(table: &'a toml::Table, section: &str, key: &str) -> Option<&'a str> {
    table.get(section)?.get(key)?.as_str()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConfidenceTieBreak;
    use crate::pairwise::SmallGapPick;
    use crate::voting::MissingSourcePolicy;

    const VOTING: &str = r#"
name = "doc ensemble"
policy = "voting"

[[sources]]
file = "a.csv"

[[sources]]
file = "b.csv"
value_column = "Prediction"

[[sources]]
file = "c.tsv"
value_column = 2
delimiter = "\t"

[voting]
strategy = "average"
missing = "exclude"

[group]
prefix_len = 7
reduce = "max"

[output]
file = "final.csv"
key_header = "Document ID"
"#;

    #[test]
    fn parse_voting() {
        let config = EnsembleConfig::from_toml(VOTING).unwrap();
        assert_eq!(config.name, "doc ensemble");
        assert_eq!(config.policy, Policy::Voting);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[1].value_column, ColumnRef::Name("Prediction".into()));
        assert_eq!(config.sources[2].value_column, ColumnRef::Index(2));
        assert_eq!(config.sources[2].load_options(2).delimiter, b'\t');
        assert_eq!(config.voting.strategy, VotingStrategy::Average);
        assert_eq!(config.voting.missing, MissingSourcePolicy::Exclude);
        let group = config.group.unwrap();
        assert_eq!(group.prefix_len, 7);
        assert_eq!(group.reduce, Reduction::Max);
        assert_eq!(config.output.file.as_deref(), Some("final.csv"));
        assert_eq!(config.output.format.key_header, "Document ID");
        assert_eq!(config.output.format.value_header, "Prediction");
    }

    #[test]
    fn defaults_apply() {
        let config = EnsembleConfig::from_toml(
            r#"
name = "pair"
policy = "pairwise"
[[sources]]
file = "p1.csv"
[[sources]]
file = "p2.csv"
"#,
        )
        .unwrap();
        assert_eq!(config.pairwise.rounding, RoundingPolicy::HalfAwayFromZero);
        assert_eq!(config.pairwise.small_gap, SmallGapPick::Higher);
        assert_eq!(config.voting.missing, MissingSourcePolicy::RequireAll);
        assert_eq!(config.confidence.tie_break, ConfidenceTieBreak::Average);
        assert!(config.group.is_none());
        assert!(config.output.file.is_none());
        assert_eq!(config.sources[0].display_name(), "p1.csv");
    }

    #[test]
    fn rounding_alias_round() {
        let config = EnsembleConfig::from_toml(
            r#"
name = "pair"
policy = "pairwise"
[[sources]]
file = "p1.csv"
[[sources]]
file = "p2.csv"
[pairwise]
rounding = "round"
small_gap = "first"
"#,
        )
        .unwrap();
        assert_eq!(config.pairwise.rounding, RoundingPolicy::HalfAwayFromZero);
        assert_eq!(config.pairwise.small_gap, SmallGapPick::First);
    }

    #[test]
    fn unknown_rounding_is_rejected() {
        let err = EnsembleConfig::from_toml(
            r#"
name = "pair"
policy = "pairwise"
[[sources]]
file = "p1.csv"
[[sources]]
file = "p2.csv"
[pairwise]
rounding = "stochastic"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::Configuration(_)), "{err:?}");
        assert!(err.to_string().contains("stochastic"));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let input = VOTING.replace("strategy = \"average\"", "strategy = \"plurality\"");
        let err = EnsembleConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, ReconError::Configuration(_)), "{err:?}");
        assert!(err.to_string().contains("plurality"));
    }

    #[test]
    fn unknown_reduction_is_rejected() {
        let input = VOTING.replace("reduce = \"max\"", "reduce = \"median\"");
        let err = EnsembleConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, ReconError::Configuration(_)), "{err:?}");
    }

    #[test]
    fn config_accepts_flag_aliases() {
        let input = VOTING
            .replace("strategy = \"average\"", "strategy = \"mean\"")
            .replace("reduce = \"max\"", "reduce = \"average\"\nrounding = \"nearest\"");
        let config = EnsembleConfig::from_toml(&input).unwrap();
        assert_eq!(config.voting.strategy, VotingStrategy::Average);
        let group = config.group.unwrap();
        assert_eq!(group.reduce, Reduction::Mean);
        assert_eq!(group.rounding, RoundingPolicy::HalfAwayFromZero);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = EnsembleConfig::from_toml("name = \"x\"\npolicy = ").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn pairwise_needs_two_sources() {
        let err = EnsembleConfig::from_toml(
            r#"
name = "pair"
policy = "pairwise"
[[sources]]
file = "p1.csv"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::Configuration(_)));
    }

    #[test]
    fn confidence_needs_columns() {
        let err = EnsembleConfig::from_toml(
            r#"
name = "conf"
policy = "confidence"
[[sources]]
file = "m1.csv"
confidence_column = "Confidence"
[[sources]]
file = "m2.csv"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence_column"));
    }

    #[test]
    fn negative_epsilon_is_rejected() {
        let err = EnsembleConfig::from_toml(
            r#"
name = "conf"
policy = "confidence"
[[sources]]
file = "m1.csv"
confidence_column = 2
[[sources]]
file = "m2.csv"
confidence_column = 2
[confidence]
tie_epsilon = -0.1
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::Configuration(_)));
    }

    #[test]
    fn zero_prefix_is_rejected() {
        let input = VOTING.replace("prefix_len = 7", "prefix_len = 0");
        assert!(EnsembleConfig::from_toml(&input).is_err());
    }
}
