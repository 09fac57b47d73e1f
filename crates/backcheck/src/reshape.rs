//! Wide → long reshape and the (id, variable) inner join.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::config::BackcheckConfig;
use crate::dataset::Dataset;
use crate::error::BackcheckError;
use crate::model::{PairedValue, Side, SubjectInfo, Value};

/// One (subject, variable) cell of a dataset in long form.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub id: String,
    pub variable: String,
    pub value: Value,
}

/// Rendered subject ids in row order. Fails on missing or repeated ids.
pub fn subject_ids(dataset: &Dataset, id_col: &str) -> Result<Vec<String>, BackcheckError> {
    let column = dataset.require_column(id_col)?;
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(column.len());

    for (row, value) in column.values.iter().enumerate() {
        if value.is_missing() {
            return Err(BackcheckError::MissingId {
                dataset: dataset.name.clone(),
                row: row + 1,
            });
        }
        let id = value.render();
        if !seen.insert(id.clone()) {
            return Err(BackcheckError::DuplicateId {
                dataset: dataset.name.clone(),
                id,
            });
        }
        ids.push(id);
    }

    Ok(ids)
}

/// One row per subject × non-id column, in row-major order.
pub fn to_long(dataset: &Dataset, id_col: &str) -> Result<Vec<LongRow>, BackcheckError> {
    let ids = subject_ids(dataset, id_col)?;
    let variables: Vec<_> = dataset.columns.iter().filter(|c| c.name != id_col).collect();

    let mut rows = Vec::with_capacity(ids.len() * variables.len());
    for (row, id) in ids.iter().enumerate() {
        for column in &variables {
            rows.push(LongRow {
                id: id.clone(),
                variable: column.name.clone(),
                value: column.values.get(row).cloned().unwrap_or(Value::Missing),
            });
        }
    }
    Ok(rows)
}

/// Inner join on (id, variable). Output follows the survey's order.
/// Subjects without an entry in `subjects` are dropped.
pub fn merge(
    survey: Vec<LongRow>,
    backcheck: Vec<LongRow>,
    subjects: &HashMap<String, Arc<SubjectInfo>>,
) -> Vec<PairedValue> {
    let mut bc_index: HashMap<String, HashMap<String, Value>> = HashMap::new();
    for row in backcheck {
        bc_index.entry(row.id).or_default().insert(row.variable, row.value);
    }

    let mut paired = Vec::new();
    for row in survey {
        let Some(subject) = subjects.get(&row.id) else {
            continue;
        };
        let Some(bc_value) = bc_index
            .get_mut(&row.id)
            .and_then(|vars| vars.remove(&row.variable))
        else {
            continue;
        };
        paired.push(PairedValue {
            subject: Arc::clone(subject),
            variable: row.variable,
            survey: row.value,
            backcheck: bc_value,
        });
    }
    paired
}

/// Identity and keep attributes for every subject present in both datasets.
pub fn subject_index(
    survey: &Dataset,
    backcheck: &Dataset,
    config: &BackcheckConfig,
) -> Result<HashMap<String, Arc<SubjectInfo>>, BackcheckError> {
    let survey_ids = subject_ids(survey, &config.id)?;
    let bc_ids = subject_ids(backcheck, &config.id)?;
    let bc_rows: HashMap<&str, usize> = bc_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let identity_cols = config
        .identity
        .active()
        .into_iter()
        .map(|(dim, col)| {
            let dataset = match dim.side() {
                Side::Survey => survey,
                Side::Backcheck => backcheck,
            };
            dataset.require_column(col).map(|c| (dim, c))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let survey_keep = config
        .report
        .keepsurvey
        .iter()
        .map(|col| survey.require_column(col))
        .collect::<Result<Vec<_>, _>>()?;
    let bc_keep = config
        .report
        .keepbc
        .iter()
        .map(|col| backcheck.require_column(col))
        .collect::<Result<Vec<_>, _>>()?;

    let cell = |values: &[Value], row: usize| values.get(row).cloned().unwrap_or(Value::Missing);

    let mut subjects = HashMap::new();
    for (s_row, id) in survey_ids.into_iter().enumerate() {
        let Some(&b_row) = bc_rows.get(id.as_str()) else {
            continue;
        };

        let mut info = SubjectInfo {
            id: id.clone(),
            ..SubjectInfo::default()
        };
        for (dim, column) in &identity_cols {
            let row = match dim.side() {
                Side::Survey => s_row,
                Side::Backcheck => b_row,
            };
            info.identity.set(*dim, cell(&column.values, row).render());
        }
        info.survey_keep = survey_keep
            .iter()
            .map(|c| (c.name.clone(), cell(&c.values, s_row)))
            .collect::<BTreeMap<_, _>>();
        info.backcheck_keep = bc_keep
            .iter()
            .map(|c| (c.name.clone(), cell(&c.values, b_row)))
            .collect::<BTreeMap<_, _>>();

        subjects.insert(id, Arc::new(info));
    }

    Ok(subjects)
}
