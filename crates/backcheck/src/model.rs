use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::dataset::Dataset;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The two datasets to compare, as loaded.
#[derive(Debug, Clone)]
pub struct BackcheckInput {
    pub survey: Dataset,
    pub backcheck: Dataset,
}

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// A single cell. Serializes as a JSON number, string, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Numeric view of the value. Text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Missing => None,
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_number(s),
        }
    }

    /// Canonical string form used for ids and group keys.
    /// Integral numbers render without a fractional part; missing renders empty.
    pub fn render(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
        }
    }

    /// Equality used for comparisons and rule matching. Two texts compare
    /// as strings, so "007" and "7" differ. Numeric equality applies when at
    /// least one side is a number. Missing only equals missing.
    pub fn loosely_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Missing, Self::Missing) => true,
            (Self::Missing, _) | (_, Self::Missing) => false,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => self.render() == other.render(),
            },
        }
    }
}

/// Parse a finite number. "NaN", "inf" and friends are not numbers here.
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tiers + identity dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Tier {
    #[serde(rename = "type 1")]
    Type1,
    #[serde(rename = "type 2")]
    Type2,
    #[serde(rename = "type 3")]
    Type3,
}

impl Tier {
    /// Tiers that take part in error-rate math. Type 3 is report-only.
    pub const AGGREGATED: [Tier; 2] = [Tier::Type1, Tier::Type2];

    pub fn digit(self) -> u8 {
        match self {
            Self::Type1 => 1,
            Self::Type2 => 2,
            Self::Type3 => 3,
        }
    }

    pub fn is_aggregated(self) -> bool {
        !matches!(self, Self::Type3)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type {}", self.digit())
    }
}

/// Which dataset a column or value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Survey,
    Backcheck,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Survey => write!(f, "survey"),
            Self::Backcheck => write!(f, "backcheck"),
        }
    }
}

/// A data-collector identity column that error rates can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityDim {
    Enumerator,
    EnumTeam,
    Backchecker,
    BcTeam,
}

impl IdentityDim {
    pub const ALL: [IdentityDim; 4] = [
        IdentityDim::Enumerator,
        IdentityDim::EnumTeam,
        IdentityDim::Backchecker,
        IdentityDim::BcTeam,
    ];

    /// Prefix of the result-bundle key (`enum1`, `bcteam2`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Enumerator => "enum",
            Self::EnumTeam => "enumteam",
            Self::Backchecker => "backchecker",
            Self::BcTeam => "bcteam",
        }
    }

    /// Dataset the identity column is read from.
    pub fn side(self) -> Side {
        match self {
            Self::Enumerator | Self::EnumTeam => Side::Survey,
            Self::Backchecker | Self::BcTeam => Side::Backcheck,
        }
    }

    pub fn group_key(self, tier: Tier) -> String {
        format!("{}{}", self.prefix(), tier.digit())
    }
}

/// Identity attributes of one subject, gathered from both datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Identity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumerator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumteam: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backchecker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcteam: Option<String>,
}

impl Identity {
    pub fn get(&self, dim: IdentityDim) -> Option<&str> {
        match dim {
            IdentityDim::Enumerator => self.enumerator.as_deref(),
            IdentityDim::EnumTeam => self.enumteam.as_deref(),
            IdentityDim::Backchecker => self.backchecker.as_deref(),
            IdentityDim::BcTeam => self.bcteam.as_deref(),
        }
    }

    pub fn set(&mut self, dim: IdentityDim, value: String) {
        let slot = match dim {
            IdentityDim::Enumerator => &mut self.enumerator,
            IdentityDim::EnumTeam => &mut self.enumteam,
            IdentityDim::Backchecker => &mut self.backchecker,
            IdentityDim::BcTeam => &mut self.bcteam,
        };
        *slot = Some(value);
    }
}

// ---------------------------------------------------------------------------
// Subjects + compared fields
// ---------------------------------------------------------------------------

/// Per-subject context shared by every field of that subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectInfo {
    pub id: String,
    pub identity: Identity,
    pub survey_keep: BTreeMap<String, Value>,
    pub backcheck_keep: BTreeMap<String, Value>,
}

/// One (subject, variable) pair present in both datasets, before classification.
#[derive(Debug, Clone)]
pub struct PairedValue {
    pub subject: Arc<SubjectInfo>,
    pub variable: String,
    pub survey: Value,
    pub backcheck: Value,
}

/// A classified comparison. `error` is final: okrange, nodiff, and the
/// both-missing rule have already been applied.
#[derive(Debug, Clone)]
pub struct ComparedField {
    pub subject: Arc<SubjectInfo>,
    pub variable: String,
    pub survey: Value,
    pub backcheck: Value,
    pub tier: Tier,
    pub error: bool,
}

impl ComparedField {
    pub fn id(&self) -> &str {
        &self.subject.id
    }

    pub fn identity(&self, dim: IdentityDim) -> Option<&str> {
        self.subject.identity.get(dim)
    }
}
