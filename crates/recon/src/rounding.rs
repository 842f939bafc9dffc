//! Value-comparison primitives shared by every policy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::Label;

/// How a fractional average becomes a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum RoundingPolicy {
    /// Nearest integer, halves away from zero (2.5 → 3, -2.5 → -3).
    #[default]
    HalfAwayFromZero,
    /// Nearest integer, halves to the even neighbour (2.5 → 2, 3.5 → 4).
    HalfEven,
    Floor,
    Ceil,
}

impl RoundingPolicy {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::HalfAwayFromZero => x.round(),
            Self::HalfEven => x.round_ties_even(),
            Self::Floor => x.floor(),
            Self::Ceil => x.ceil(),
        }
    }

    pub fn to_label(self, x: f64) -> Label {
        self.apply(x) as Label
    }
}

impl FromStr for RoundingPolicy {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round" | "nearest" | "half_away_from_zero" => Ok(Self::HalfAwayFromZero),
            "half_even" => Ok(Self::HalfEven),
            "floor" => Ok(Self::Floor),
            "ceil" => Ok(Self::Ceil),
            other => Err(ReconError::Configuration(format!(
                "unknown rounding policy '{other}' (expected round, half_even, floor or ceil)"
            ))),
        }
    }
}

impl TryFrom<String> for RoundingPolicy {
    type Error = ReconError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HalfAwayFromZero => write!(f, "half_away_from_zero"),
            Self::HalfEven => write!(f, "half_even"),
            Self::Floor => write!(f, "floor"),
            Self::Ceil => write!(f, "ceil"),
        }
    }
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Label>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v as f64, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Midpoint of two labels without integer overflow.
pub fn midpoint(a: Label, b: Label) -> f64 {
    (a as f64 + b as f64) / 2.0
}
