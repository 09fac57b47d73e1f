use crate::aggregate::{aggregate_groups, subject_rates, variable_rates};
use crate::classify::{classify, Classification, ComparisonRules};
use crate::config::BackcheckConfig;
use crate::dataset::Dataset;
use crate::error::BackcheckError;
use crate::hypothesis::{run_signranks, run_ttests};
use crate::model::{BackcheckInput, Tier};
use crate::preprocess::preprocess;
use crate::reshape::{merge, subject_index, to_long};
use crate::result::{difference_report, BackcheckResult, ResultBuilder, ResultMeta};
use crate::stats::{PairedTests, StatrsTests};

/// Run the comparison with the default test routines.
pub fn run(config: &BackcheckConfig, input: &BackcheckInput) -> Result<BackcheckResult, BackcheckError> {
    run_with(config, input, &StatrsTests)
}

/// Run the comparison with caller-supplied test routines.
pub fn run_with(
    config: &BackcheckConfig,
    input: &BackcheckInput,
    tests: &dyn PairedTests,
) -> Result<BackcheckResult, BackcheckError> {
    // Fail fast on config and dataset shape before any comparison work
    config.validate()?;
    let opts = config.normalize_options()?;
    check_id_columns(config, &input.survey, &input.backcheck)?;

    let survey = preprocess(&input.survey, &opts);
    let backcheck = preprocess(&input.backcheck, &opts);

    let subjects = subject_index(&survey, &backcheck, config)?;
    let paired = merge(
        to_long(&survey, &config.id)?,
        to_long(&backcheck, &config.id)?,
        &subjects,
    );
    tracing::debug!(subjects = subjects.len(), paired = paired.len(), "joined datasets");

    let classification = Classification::from_config(config);
    let rules = ComparisonRules::from_config(config, &opts);
    rules.warn_unclassified(&classification);
    let classified = classify(paired, &classification, &rules);
    let fields = &classified.fields;

    let mut builder = ResultBuilder::new(ResultMeta {
        config_name: config.name.clone(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
        survey_rows: input.survey.row_count(),
        backcheck_rows: input.backcheck.row_count(),
        compared: fields.len(),
        excluded: classified.excluded,
    })
    .differences(difference_report(fields, config.report.full));

    if config.identity.active().is_empty() {
        tracing::warn!("no identity columns configured; group summaries omitted");
    }
    for tier in Tier::AGGREGATED {
        if !classification.has_tier(tier) {
            tracing::debug!(%tier, "no variables classified; tier omitted from rates");
            continue;
        }
        builder = builder.variable_rates(tier, variable_rates(fields, tier));
        for (dim, _) in config.identity.active() {
            builder = builder.group(dim, tier, aggregate_groups(fields, dim, tier));
        }
    }

    if let Some(threshold) = config.report.showid {
        builder = builder.showid(subject_rates(fields, threshold));
    }

    if !config.tests.ttest.is_empty() {
        builder = builder.ttest(run_ttests(fields, &config.tests.ttest, config.tests.level, tests)?);
    }
    if !config.tests.signrank.is_empty() {
        builder = builder.signrank(run_signranks(fields, &config.tests.signrank, tests)?);
    }

    let result = builder.build();
    tracing::info!(
        compared = result.meta.compared,
        differences = result.backcheck.iter().filter(|r| r.differs.unwrap_or(true)).count(),
        groups = result.groups.len(),
        "back check complete"
    );
    Ok(result)
}

/// The id column must exist on both sides with the same kind.
fn check_id_columns(
    config: &BackcheckConfig,
    survey: &Dataset,
    backcheck: &Dataset,
) -> Result<(), BackcheckError> {
    let s = survey.require_column(&config.id)?;
    let b = backcheck.require_column(&config.id)?;
    if s.kind != b.kind {
        return Err(BackcheckError::IdTypeMismatch {
            survey: s.kind.to_string(),
            backcheck: b.kind.to_string(),
        });
    }
    Ok(())
}
