use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::BackcheckError;
use crate::model::{IdentityDim, Value};
use crate::normalize::NormalizeOptions;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BackcheckConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Unique subject-identifier column, present in both datasets.
    pub id: String,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub variables: VariablesConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub tests: TestsConfig,
    #[serde(default)]
    pub okrange: BTreeMap<String, OkRange>,
    #[serde(default)]
    pub nodiff: BTreeMap<String, Vec<RuleValue>>,
    #[serde(default)]
    pub exclude: BTreeMap<String, Vec<RuleValue>>,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_name() -> String {
    "backcheck".into()
}

impl BackcheckConfig {
    /// Minimal config: only the id column set, everything else defaulted.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            id: id.into(),
            files: FilesConfig::default(),
            identity: IdentityConfig::default(),
            variables: VariablesConfig::default(),
            normalize: NormalizeConfig::default(),
            tests: TestsConfig::default(),
            okrange: BTreeMap::new(),
            nodiff: BTreeMap::new(),
            exclude: BTreeMap::new(),
            report: ReportConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Input file locations. Only the CLI reads these.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesConfig {
    #[serde(default)]
    pub survey: Option<String>,
    #[serde(default)]
    pub backcheck: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub enumerator: Option<String>,
    #[serde(default)]
    pub enumteam: Option<String>,
    #[serde(default)]
    pub backchecker: Option<String>,
    #[serde(default)]
    pub bcteam: Option<String>,
}

impl IdentityConfig {
    pub fn column(&self, dim: IdentityDim) -> Option<&str> {
        match dim {
            IdentityDim::Enumerator => self.enumerator.as_deref(),
            IdentityDim::EnumTeam => self.enumteam.as_deref(),
            IdentityDim::Backchecker => self.backchecker.as_deref(),
            IdentityDim::BcTeam => self.bcteam.as_deref(),
        }
    }

    /// Configured dimensions with their column names.
    pub fn active(&self) -> Vec<(IdentityDim, &str)> {
        IdentityDim::ALL
            .iter()
            .filter_map(|&dim| self.column(dim).map(|col| (dim, col)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariablesConfig {
    #[serde(default)]
    pub t1vars: Vec<String>,
    #[serde(default)]
    pub t2vars: Vec<String>,
    #[serde(default)]
    pub t3vars: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub lower: bool,
    #[serde(default)]
    pub upper: bool,
    #[serde(default)]
    pub trim: bool,
    #[serde(default)]
    pub nosymbol: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestsConfig {
    #[serde(default)]
    pub ttest: Vec<String>,
    #[serde(default)]
    pub signrank: Vec<String>,
    /// Confidence level for t-test intervals.
    #[serde(default = "default_level")]
    pub level: f64,
}

fn default_level() -> f64 {
    0.95
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            ttest: Vec::new(),
            signrank: Vec::new(),
            level: default_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// List every compared field, not only the differing ones.
    #[serde(default)]
    pub full: bool,
    /// Percent threshold for listing subjects by Type 1+2 error rate.
    #[serde(default)]
    pub showid: Option<f64>,
    /// Survey columns copied into each report row.
    #[serde(default)]
    pub keepsurvey: Vec<String>,
    /// Back-check columns copied into each report row.
    #[serde(default)]
    pub keepbc: Vec<String>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Acceptance band `[survey - lower, survey + upper]` for the back-check value.
/// Written in TOML as a two-element array: `itemssold = [0, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(f64, f64)")]
pub struct OkRange {
    pub lower: f64,
    pub upper: f64,
}

impl From<(f64, f64)> for OkRange {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self { lower, upper }
    }
}

/// A literal in a `nodiff` / `exclude` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Text(String),
}

impl From<&RuleValue> for Value {
    fn from(v: &RuleValue) -> Self {
        match v {
            RuleValue::Number(n) => Value::Number(*n),
            RuleValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl BackcheckConfig {
    pub fn from_toml(input: &str) -> Result<Self, BackcheckError> {
        let config: BackcheckConfig =
            toml::from_str(input).map_err(|e| BackcheckError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BackcheckError> {
        if self.id.trim().is_empty() {
            return Err(BackcheckError::Configuration("id column name is empty".into()));
        }

        // lower + upper is rejected here
        self.normalize_options()?;

        let level = self.tests.level;
        if !(level > 0.0 && level < 1.0) {
            return Err(BackcheckError::Configuration(format!(
                "level must be between 0 and 1, got {level}"
            )));
        }

        for (var, range) in &self.okrange {
            if !range.lower.is_finite() || !range.upper.is_finite() {
                return Err(BackcheckError::Configuration(format!(
                    "okrange for '{var}' must be finite"
                )));
            }
        }

        if let Some(threshold) = self.report.showid {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(BackcheckError::Configuration(format!(
                    "showid must be a percentage between 0 and 100, got {threshold}"
                )));
            }
        }

        for var in self.overlapping_tier_vars() {
            tracing::warn!(variable = %var, "variable listed in more than one tier; last tier wins");
        }

        Ok(())
    }

    pub fn normalize_options(&self) -> Result<NormalizeOptions, BackcheckError> {
        let n = &self.normalize;
        NormalizeOptions::from_flags(n.lower, n.upper, n.trim, n.nosymbol)
    }

    /// Variables named in more than one tier list.
    pub fn overlapping_tier_vars(&self) -> BTreeSet<&str> {
        let v = &self.variables;
        let mut seen = BTreeSet::new();
        let mut overlap = BTreeSet::new();
        for list in [&v.t1vars, &v.t2vars, &v.t3vars] {
            let unique: BTreeSet<&str> = list.iter().map(String::as_str).collect();
            for var in unique {
                if !seen.insert(var) {
                    overlap.insert(var);
                }
            }
        }
        overlap
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Round 2"
id = "hhid"

[files]
survey = "survey.csv"
backcheck = "bc.csv"

[identity]
enumerator = "enum"
backchecker = "bcer"

[variables]
t1vars = ["gender", "age"]
t2vars = ["itemssold"]
t3vars = ["comment"]

[normalize]
trim = true
lower = true

[tests]
ttest = ["itemssold"]
level = 0.9

[okrange]
itemssold = [0, 5]

[nodiff]
itemssold = [0]
comment = ["n/a", 99]

[exclude]
age = [-999]

[report]
showid = 30
keepsurvey = ["village"]
"#;

    #[test]
    fn parse_full_config() {
        let config = BackcheckConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Round 2");
        assert_eq!(config.id, "hhid");
        assert_eq!(config.files.survey.as_deref(), Some("survey.csv"));
        assert_eq!(config.identity.enumerator.as_deref(), Some("enum"));
        assert!(config.identity.enumteam.is_none());
        assert_eq!(config.variables.t1vars, vec!["gender", "age"]);
        assert_eq!(config.tests.level, 0.9);
        assert_eq!(config.okrange["itemssold"], OkRange { lower: 0.0, upper: 5.0 });
        assert_eq!(config.nodiff["itemssold"], vec![RuleValue::Number(0.0)]);
        assert_eq!(
            config.nodiff["comment"],
            vec![RuleValue::Text("n/a".into()), RuleValue::Number(99.0)]
        );
        assert_eq!(config.exclude["age"], vec![RuleValue::Number(-999.0)]);
        assert_eq!(config.report.showid, Some(30.0));
        assert_eq!(config.report.keepsurvey, vec!["village"]);
    }

    #[test]
    fn defaults() {
        let config = BackcheckConfig::from_toml(r#"id = "id""#).unwrap();
        assert_eq!(config.name, "backcheck");
        assert_eq!(config.tests.level, 0.95);
        assert!(config.identity.active().is_empty());
        assert!(config.okrange.is_empty());
        assert!(!config.report.full);
    }

    #[test]
    fn active_identity_in_fixed_order() {
        let config = BackcheckConfig::from_toml(FULL).unwrap();
        let active = config.identity.active();
        assert_eq!(
            active,
            vec![(IdentityDim::Enumerator, "enum"), (IdentityDim::Backchecker, "bcer")]
        );
    }

    #[test]
    fn reject_lower_and_upper() {
        let input = r#"
id = "id"
[normalize]
lower = true
upper = true
"#;
        let err = BackcheckConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, BackcheckError::Configuration(_)));
        assert!(err.is_config());
    }

    #[test]
    fn reject_level_out_of_range() {
        let input = r#"
id = "id"
[tests]
level = 95
"#;
        let err = BackcheckConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("level must be between 0 and 1"));
    }

    #[test]
    fn reject_missing_id() {
        let err = BackcheckConfig::from_toml("name = \"x\"").unwrap_err();
        assert!(matches!(err, BackcheckError::ConfigParse(_)));
    }

    #[test]
    fn reject_malformed_okrange() {
        let input = r#"
id = "id"
[okrange]
x = [1]
"#;
        assert!(BackcheckConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_showid_above_hundred() {
        let input = r#"
id = "id"
[report]
showid = 150
"#;
        assert!(BackcheckConfig::from_toml(input).is_err());
    }

    #[test]
    fn overlapping_tiers_are_reported_not_rejected() {
        let input = r#"
id = "id"
[variables]
t1vars = ["a", "b"]
t2vars = ["b"]
t3vars = ["a", "c"]
"#;
        let config = BackcheckConfig::from_toml(input).unwrap();
        let overlap: Vec<&str> = config.overlapping_tier_vars().into_iter().collect();
        assert_eq!(overlap, vec!["a", "b"]);
    }
}
