use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ComparedField, IdentityDim, Tier};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRate {
    pub key: String,
    pub error_rate: f64,
    pub differences: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableGroupRate {
    pub key: String,
    pub variable: String,
    pub error_rate: f64,
    pub differences: usize,
    pub total: usize,
}

/// Error rates for one (identity dimension, tier) combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub summary: Vec<GroupRate>,
    pub each: Vec<VariableGroupRate>,
}

/// Dataset-wide error rate of one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableRate {
    pub variable: String,
    pub error_rate: f64,
    pub differences: usize,
    pub total: usize,
}

/// Error rate of one subject across Type 1 and Type 2 fields, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRate {
    pub id: String,
    pub differences: usize,
    pub total: usize,
    pub error_rate: f64,
}

/// `differences / total`, defined as 0 for an empty group.
pub fn error_rate(differences: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        differences as f64 / total as f64
    }
}

#[derive(Default)]
struct Tally {
    differences: usize,
    total: usize,
}

impl Tally {
    fn add(&mut self, error: bool) {
        self.total += 1;
        if error {
            self.differences += 1;
        }
    }
}

/// Group one tier's fields by an identity dimension, overall and per variable.
/// A subject with no value for the dimension groups under the empty key.
pub fn aggregate_groups(fields: &[ComparedField], dim: IdentityDim, tier: Tier) -> GroupSummary {
    let mut by_key: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut by_key_var: BTreeMap<(&str, &str), Tally> = BTreeMap::new();

    for field in fields.iter().filter(|f| f.tier == tier) {
        let key = field.identity(dim).unwrap_or("");
        by_key.entry(key).or_default().add(field.error);
        by_key_var
            .entry((key, field.variable.as_str()))
            .or_default()
            .add(field.error);
    }

    let summary = by_key
        .into_iter()
        .map(|(key, t)| GroupRate {
            key: key.to_string(),
            error_rate: error_rate(t.differences, t.total),
            differences: t.differences,
            total: t.total,
        })
        .collect();

    let each = by_key_var
        .into_iter()
        .map(|((key, variable), t)| VariableGroupRate {
            key: key.to_string(),
            variable: variable.to_string(),
            error_rate: error_rate(t.differences, t.total),
            differences: t.differences,
            total: t.total,
        })
        .collect();

    GroupSummary { summary, each }
}

/// Per-variable error rates over the whole dataset for one tier.
pub fn variable_rates(fields: &[ComparedField], tier: Tier) -> Vec<VariableRate> {
    let mut by_var: BTreeMap<&str, Tally> = BTreeMap::new();
    for field in fields.iter().filter(|f| f.tier == tier) {
        by_var.entry(field.variable.as_str()).or_default().add(field.error);
    }

    by_var
        .into_iter()
        .map(|(variable, t)| VariableRate {
            variable: variable.to_string(),
            error_rate: error_rate(t.differences, t.total),
            differences: t.differences,
            total: t.total,
        })
        .collect()
}

/// Subjects whose Type 1+2 error rate is at least `threshold_pct` percent,
/// highest rate first.
pub fn subject_rates(fields: &[ComparedField], threshold_pct: f64) -> Vec<SubjectRate> {
    let mut by_id: BTreeMap<&str, Tally> = BTreeMap::new();
    for field in fields.iter().filter(|f| f.tier.is_aggregated()) {
        by_id.entry(field.id()).or_default().add(field.error);
    }

    let mut rates: Vec<SubjectRate> = by_id
        .into_iter()
        .map(|(id, t)| SubjectRate {
            id: id.to_string(),
            differences: t.differences,
            total: t.total,
            error_rate: error_rate(t.differences, t.total) * 100.0,
        })
        .filter(|r| r.differences > 0 && r.error_rate >= threshold_pct)
        .collect();

    rates.sort_by(|a, b| b.error_rate.total_cmp(&a.error_rate).then_with(|| a.id.cmp(&b.id)));
    rates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::model::{Identity, SubjectInfo, Value};

    fn field(id: &str, enumerator: &str, variable: &str, tier: Tier, error: bool) -> ComparedField {
        ComparedField {
            subject: Arc::new(SubjectInfo {
                id: id.into(),
                identity: Identity {
                    enumerator: Some(enumerator.into()),
                    ..Identity::default()
                },
                ..SubjectInfo::default()
            }),
            variable: variable.into(),
            survey: Value::Number(1.0),
            backcheck: Value::Number(if error { 2.0 } else { 1.0 }),
            tier,
            error,
        }
    }

    fn fields() -> Vec<ComparedField> {
        vec![
            field("S1", "ann", "gender", Tier::Type1, true),
            field("S1", "ann", "age", Tier::Type1, false),
            field("S2", "ann", "gender", Tier::Type1, false),
            field("S3", "bob", "gender", Tier::Type1, false),
            field("S3", "bob", "itemssold", Tier::Type2, true),
            field("S3", "bob", "comment", Tier::Type3, true),
        ]
    }

    #[test]
    fn zero_total_rate_is_zero() {
        assert_eq!(error_rate(0, 0), 0.0);
        assert_eq!(error_rate(1, 4), 0.25);
    }

    #[test]
    fn summary_by_enumerator() {
        let g = aggregate_groups(&fields(), IdentityDim::Enumerator, Tier::Type1);
        assert_eq!(g.summary.len(), 2);
        assert_eq!(g.summary[0].key, "ann");
        assert_eq!(g.summary[0].differences, 1);
        assert_eq!(g.summary[0].total, 3);
        assert!((g.summary[0].error_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(g.summary[1].key, "bob");
        assert_eq!(g.summary[1].error_rate, 0.0);
    }

    #[test]
    fn each_breaks_out_variables() {
        let g = aggregate_groups(&fields(), IdentityDim::Enumerator, Tier::Type1);
        let keys: Vec<(&str, &str)> = g
            .each
            .iter()
            .map(|e| (e.key.as_str(), e.variable.as_str()))
            .collect();
        assert_eq!(keys, vec![("ann", "age"), ("ann", "gender"), ("bob", "gender")]);
        assert_eq!(g.each[1].differences, 1);
        assert_eq!(g.each[1].total, 2);
    }

    #[test]
    fn tier_filter_applies() {
        let g = aggregate_groups(&fields(), IdentityDim::Enumerator, Tier::Type2);
        assert_eq!(g.summary.len(), 1);
        assert_eq!(g.summary[0].key, "bob");
        assert_eq!(g.summary[0].total, 1);
    }

    #[test]
    fn missing_dimension_groups_under_empty_key() {
        let g = aggregate_groups(&fields(), IdentityDim::Backchecker, Tier::Type1);
        assert_eq!(g.summary.len(), 1);
        assert_eq!(g.summary[0].key, "");
        assert_eq!(g.summary[0].total, 4);
    }

    #[test]
    fn variable_rates_per_tier() {
        let rates = variable_rates(&fields(), Tier::Type1);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[1].variable, "gender");
        assert_eq!(rates[1].differences, 1);
        assert_eq!(rates[1].total, 3);
    }

    #[test]
    fn subject_rates_ignore_type3_and_sort_desc() {
        let rates = subject_rates(&fields(), 30.0);
        // S1: 1/2 = 50%, S3: 1/2 = 50% (comment is type 3), S2: 0%
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].id, "S1");
        assert_eq!(rates[0].error_rate, 50.0);
        assert_eq!(rates[1].id, "S3");
        assert_eq!(rates[1].total, 2);
    }

    #[test]
    fn subject_rates_threshold() {
        assert!(subject_rates(&fields(), 60.0).is_empty());
    }
}
