use std::collections::BTreeMap;

use serde::Serialize;

use crate::aggregate::{GroupSummary, SubjectRate, VariableRate};
use crate::model::{ComparedField, Identity, IdentityDim, Tier, Value};
use crate::stats::{SignRankResult, TTestResult};

// ---------------------------------------------------------------------------
// Difference report
// ---------------------------------------------------------------------------

/// One row of the `backcheck` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferenceRow {
    pub id: String,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "type")]
    pub tier: Tier,
    pub variable: String,
    pub survey: Value,
    pub backcheck: Value,
    /// Only set in full reports, where matching fields are listed too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub differs: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub survey_keep: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub backcheck_keep: BTreeMap<String, Value>,
}

/// Build the difference table. With `full`, every field is listed.
pub fn difference_report(fields: &[ComparedField], full: bool) -> Vec<DifferenceRow> {
    fields
        .iter()
        .filter(|f| full || f.error)
        .map(|f| DifferenceRow {
            id: f.subject.id.clone(),
            identity: f.subject.identity.clone(),
            tier: f.tier,
            variable: f.variable.clone(),
            survey: f.survey.clone(),
            backcheck: f.backcheck.clone(),
            differs: full.then_some(f.error),
            survey_keep: f.subject.survey_keep.clone(),
            backcheck_keep: f.subject.backcheck_keep.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Result bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ResultMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub survey_rows: usize,
    pub backcheck_rows: usize,
    pub compared: usize,
    pub excluded: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackcheckResult {
    pub meta: ResultMeta,
    pub backcheck: Vec<DifferenceRow>,
    /// Keyed `enum1`, `bcteam2`, ...; only active combinations are present.
    pub groups: BTreeMap<String, GroupSummary>,
    /// Keyed `type 1` / `type 2`.
    pub variables: BTreeMap<Tier, Vec<VariableRate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showid: Option<Vec<SubjectRate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttest: Option<BTreeMap<String, TTestResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signrank: Option<BTreeMap<String, SignRankResult>>,
}

impl BackcheckResult {
    pub fn group(&self, dim: IdentityDim, tier: Tier) -> Option<&GroupSummary> {
        self.groups.get(&dim.group_key(tier))
    }

    /// Differences among Type 1 and Type 2 fields.
    pub fn aggregated_differences(&self) -> usize {
        self.backcheck
            .iter()
            .filter(|r| r.tier.is_aggregated() && r.differs.unwrap_or(true))
            .count()
    }
}

/// Collects each stage's sub-result; `build` produces the final bundle.
#[derive(Debug)]
pub struct ResultBuilder {
    meta: ResultMeta,
    backcheck: Vec<DifferenceRow>,
    groups: BTreeMap<String, GroupSummary>,
    variables: BTreeMap<Tier, Vec<VariableRate>>,
    showid: Option<Vec<SubjectRate>>,
    ttest: Option<BTreeMap<String, TTestResult>>,
    signrank: Option<BTreeMap<String, SignRankResult>>,
}

impl ResultBuilder {
    pub fn new(meta: ResultMeta) -> Self {
        Self {
            meta,
            backcheck: Vec::new(),
            groups: BTreeMap::new(),
            variables: BTreeMap::new(),
            showid: None,
            ttest: None,
            signrank: None,
        }
    }

    pub fn differences(mut self, rows: Vec<DifferenceRow>) -> Self {
        self.backcheck = rows;
        self
    }

    pub fn group(mut self, dim: IdentityDim, tier: Tier, summary: GroupSummary) -> Self {
        self.groups.insert(dim.group_key(tier), summary);
        self
    }

    pub fn variable_rates(mut self, tier: Tier, rates: Vec<VariableRate>) -> Self {
        self.variables.insert(tier, rates);
        self
    }

    pub fn showid(mut self, subjects: Vec<SubjectRate>) -> Self {
        self.showid = Some(subjects);
        self
    }

    pub fn ttest(mut self, results: BTreeMap<String, TTestResult>) -> Self {
        self.ttest = Some(results);
        self
    }

    pub fn signrank(mut self, results: BTreeMap<String, SignRankResult>) -> Self {
        self.signrank = Some(results);
        self
    }

    pub fn build(self) -> BackcheckResult {
        BackcheckResult {
            meta: self.meta,
            backcheck: self.backcheck,
            groups: self.groups,
            variables: self.variables,
            showid: self.showid,
            ttest: self.ttest,
            signrank: self.signrank,
        }
    }
}
