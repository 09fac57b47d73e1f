use std::collections::BTreeMap;

use crate::error::BackcheckError;
use crate::model::{ComparedField, Value};
use crate::stats::{PairedTests, SignRankResult, TTestResult};

/// Paired numeric series for one variable, across every tier.
///
/// Pairs with a missing side are skipped. Any present value that is not
/// numeric fails the whole variable.
pub fn paired_series(
    fields: &[ComparedField],
    variable: &str,
    test: &str,
) -> Result<(Vec<f64>, Vec<f64>), BackcheckError> {
    let invalid = |reason: String| BackcheckError::InvalidTestInput {
        test: test.to_string(),
        variable: variable.to_string(),
        reason,
    };
    let numeric = |field: &ComparedField, v: &Value| -> Result<Option<f64>, BackcheckError> {
        match v {
            Value::Missing => Ok(None),
            other => other.as_number().map(Some).ok_or_else(|| {
                invalid(format!("subject '{}' has non-numeric value '{}'", field.id(), other.render()))
            }),
        }
    };

    let mut survey = Vec::new();
    let mut backcheck = Vec::new();
    for field in fields.iter().filter(|f| f.variable == variable) {
        let s = numeric(field, &field.survey)?;
        let b = numeric(field, &field.backcheck)?;
        if let (Some(s), Some(b)) = (s, b) {
            survey.push(s);
            backcheck.push(b);
        }
    }

    if survey.len() < 2 {
        return Err(invalid(format!(
            "needs at least 2 paired numeric observations, found {}",
            survey.len()
        )));
    }
    Ok((survey, backcheck))
}

/// Paired t-test per requested variable, keyed by variable name.
pub fn run_ttests(
    fields: &[ComparedField],
    variables: &[String],
    level: f64,
    tests: &dyn PairedTests,
) -> Result<BTreeMap<String, TTestResult>, BackcheckError> {
    let mut results = BTreeMap::new();
    for var in variables {
        let (survey, backcheck) = paired_series(fields, var, "ttest")?;
        let result = tests
            .ttest(&survey, &backcheck, level)
            .map_err(|reason| BackcheckError::InvalidTestInput {
                test: "ttest".into(),
                variable: var.clone(),
                reason,
            })?;
        tracing::debug!(variable = %var, n = result.n, "ttest");
        results.insert(var.clone(), result);
    }
    Ok(results)
}

/// Signed-rank test per requested variable, keyed by variable name.
pub fn run_signranks(
    fields: &[ComparedField],
    variables: &[String],
    tests: &dyn PairedTests,
) -> Result<BTreeMap<String, SignRankResult>, BackcheckError> {
    let mut results = BTreeMap::new();
    for var in variables {
        let (survey, backcheck) = paired_series(fields, var, "signrank")?;
        let result = tests
            .signrank(&survey, &backcheck)
            .map_err(|reason| BackcheckError::InvalidTestInput {
                test: "signrank".into(),
                variable: var.clone(),
                reason,
            })?;
        tracing::debug!(variable = %var, n = result.n, "signrank");
        results.insert(var.clone(), result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::model::{SubjectInfo, Tier};
    use crate::stats::StatrsTests;

    fn field(id: &str, variable: &str, tier: Tier, survey: Value, backcheck: Value) -> ComparedField {
        ComparedField {
            subject: Arc::new(SubjectInfo {
                id: id.into(),
                ..SubjectInfo::default()
            }),
            variable: variable.into(),
            error: !survey.loosely_eq(&backcheck),
            survey,
            backcheck,
            tier,
        }
    }

    fn fields() -> Vec<ComparedField> {
        vec![
            field("S1", "income", Tier::Type2, Value::Number(100.0), Value::Number(90.0)),
            field("S2", "income", Tier::Type3, Value::Number(200.0), Value::Number(210.0)),
            field("S3", "income", Tier::Type2, Value::Number(50.0), Value::Missing),
            field("S4", "income", Tier::Type1, Value::Number(80.0), Value::Number(70.0)),
            field("S1", "gender", Tier::Type1, Value::text("M"), Value::text("F")),
            field("S2", "gender", Tier::Type1, Value::text("M"), Value::text("M")),
        ]
    }

    #[test]
    fn series_span_all_tiers_and_skip_missing() {
        let (s, b) = paired_series(&fields(), "income", "ttest").unwrap();
        assert_eq!(s, vec![100.0, 200.0, 80.0]);
        assert_eq!(b, vec![90.0, 210.0, 70.0]);
    }

    #[test]
    fn non_numeric_variable_fails() {
        let err = paired_series(&fields(), "gender", "ttest").unwrap_err();
        assert!(matches!(err, BackcheckError::InvalidTestInput { .. }));
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn unknown_variable_fails() {
        let err = run_ttests(&fields(), &["ghost".into()], 0.95, &StatrsTests).unwrap_err();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn results_keyed_by_variable() {
        let t = run_ttests(&fields(), &["income".into()], 0.95, &StatrsTests).unwrap();
        assert_eq!(t["income"].n, 3);
        let w = run_signranks(&fields(), &["income".into()], &StatrsTests).unwrap();
        assert_eq!(w["income"].n, 3);
    }

    #[test]
    fn numeric_text_is_accepted() {
        let rows = vec![
            field("S1", "x", Tier::Type2, Value::text("1"), Value::Number(2.0)),
            field("S2", "x", Tier::Type2, Value::text(" 3"), Value::Number(3.0)),
        ];
        let (s, _) = paired_series(&rows, "x", "signrank").unwrap();
        assert_eq!(s, vec![1.0, 3.0]);
    }
}
