use std::collections::{BTreeMap, HashMap};

use crate::config::{BackcheckConfig, OkRange, RuleValue};
use crate::model::{ComparedField, PairedValue, Tier, Value};
use crate::normalize::{normalize_text, NormalizeOptions};

// ---------------------------------------------------------------------------
// Tier classification
// ---------------------------------------------------------------------------

/// Variable → tier lookup. Variables not listed are not compared.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    tiers: HashMap<String, Tier>,
}

impl Classification {
    /// Later lists overwrite earlier ones: a variable in both `t1` and `t3`
    /// is classified Type 3.
    pub fn from_lists(t1: &[String], t2: &[String], t3: &[String]) -> Self {
        let mut tiers = HashMap::new();
        for (tier, list) in [(Tier::Type1, t1), (Tier::Type2, t2), (Tier::Type3, t3)] {
            for var in list {
                tiers.insert(var.clone(), tier);
            }
        }
        Self { tiers }
    }

    pub fn from_config(config: &BackcheckConfig) -> Self {
        let v = &config.variables;
        Self::from_lists(&v.t1vars, &v.t2vars, &v.t3vars)
    }

    pub fn tier_of(&self, variable: &str) -> Option<Tier> {
        self.tiers.get(variable).copied()
    }

    pub fn has_tier(&self, tier: Tier) -> bool {
        self.tiers.values().any(|t| *t == tier)
    }

    /// Sorted variable names classified under `tier`.
    pub fn variables(&self, tier: Tier) -> Vec<&str> {
        let mut vars: Vec<&str> = self
            .tiers
            .iter()
            .filter(|(_, t)| **t == tier)
            .map(|(v, _)| v.as_str())
            .collect();
        vars.sort_unstable();
        vars
    }
}

// ---------------------------------------------------------------------------
// Tolerance / exemption / exclusion rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ComparisonRules {
    pub okrange: BTreeMap<String, OkRange>,
    pub nodiff: BTreeMap<String, Vec<Value>>,
    pub exclude: BTreeMap<String, Vec<Value>>,
}

impl ComparisonRules {
    /// Text literals go through the same normalizer as the data, so
    /// `"N/A"` still matches a survey value folded to `"n/a"`.
    pub fn from_config(config: &BackcheckConfig, opts: &NormalizeOptions) -> Self {
        let literal = |v: &RuleValue| match v {
            RuleValue::Number(_) => Value::from(v),
            RuleValue::Text(s) => {
                let normalized = normalize_text(s, opts);
                if normalized.trim().is_empty() {
                    Value::Missing
                } else {
                    Value::Text(normalized)
                }
            }
        };
        let values = |map: &BTreeMap<String, Vec<RuleValue>>| -> BTreeMap<String, Vec<Value>> {
            map.iter()
                .map(|(var, list)| (var.clone(), list.iter().map(literal).collect()))
                .collect()
        };
        Self {
            okrange: config.okrange.clone(),
            nodiff: values(&config.nodiff),
            exclude: values(&config.exclude),
        }
    }

    /// Log rules that name variables outside every tier. Such rules are no-ops.
    pub fn warn_unclassified(&self, classification: &Classification) {
        let named = [
            ("okrange", self.okrange.keys().collect::<Vec<_>>()),
            ("nodiff", self.nodiff.keys().collect()),
            ("exclude", self.exclude.keys().collect()),
        ];
        for (rule, vars) in named {
            for var in vars {
                if classification.tier_of(var).is_none() {
                    tracing::warn!(rule, variable = %var, "rule names an unclassified variable; ignored");
                }
            }
        }
    }

    pub fn is_excluded(&self, variable: &str, survey: &Value) -> bool {
        listed(&self.exclude, variable, survey)
    }

    pub fn is_exempt(&self, variable: &str, survey: &Value) -> bool {
        listed(&self.nodiff, variable, survey)
    }
}

fn listed(map: &BTreeMap<String, Vec<Value>>, variable: &str, survey: &Value) -> bool {
    map.get(variable)
        .is_some_and(|values| values.iter().any(|v| v.loosely_eq(survey)))
}

// ---------------------------------------------------------------------------
// Error flag
// ---------------------------------------------------------------------------

/// Plain inequality. Two missing values are never an error.
pub fn raw_error(survey: &Value, backcheck: &Value) -> bool {
    if survey.is_missing() && backcheck.is_missing() {
        return false;
    }
    !survey.loosely_eq(backcheck)
}

/// `Some(true)` when the back-check value lies in
/// `[survey - lower, survey + upper]`; `None` when either side is not numeric.
pub fn within_okrange(survey: &Value, backcheck: &Value, range: &OkRange) -> Option<bool> {
    let s = survey.as_number()?;
    let b = backcheck.as_number()?;
    Some(b >= s - range.lower && s + range.upper >= b)
}

/// Final error flag for one field, before exclusion.
pub fn error_flag(variable: &str, survey: &Value, backcheck: &Value, rules: &ComparisonRules) -> bool {
    let mut error = raw_error(survey, backcheck);

    if let Some(range) = rules.okrange.get(variable) {
        if let Some(within) = within_okrange(survey, backcheck, range) {
            error = !within;
        }
    }

    if rules.is_exempt(variable, survey) {
        error = false;
    }

    error
}

// ---------------------------------------------------------------------------
// Classification pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClassifyOutput {
    pub fields: Vec<ComparedField>,
    /// Joined rows dropped because their variable has no tier.
    pub unclassified: usize,
    /// Rows removed by `exclude` rules.
    pub excluded: usize,
}

/// Tag tiers, compute error flags, then prune excluded rows.
pub fn classify(
    paired: Vec<PairedValue>,
    classification: &Classification,
    rules: &ComparisonRules,
) -> ClassifyOutput {
    let mut fields = Vec::with_capacity(paired.len());
    let mut unclassified = 0;
    let mut excluded = 0;

    for p in paired {
        let Some(tier) = classification.tier_of(&p.variable) else {
            unclassified += 1;
            continue;
        };

        let error = error_flag(&p.variable, &p.survey, &p.backcheck, rules);

        if rules.is_excluded(&p.variable, &p.survey) {
            excluded += 1;
            continue;
        }

        fields.push(ComparedField {
            subject: p.subject,
            variable: p.variable,
            survey: p.survey,
            backcheck: p.backcheck,
            tier,
            error,
        });
    }

    tracing::debug!(
        compared = fields.len(),
        unclassified,
        excluded,
        "classified joined fields"
    );

    ClassifyOutput {
        fields,
        unclassified,
        excluded,
    }
}
