// Property-based tests for normalization and error-flag logic.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use bcstats_backcheck::aggregate::{aggregate_groups, subject_rates, variable_rates};
use bcstats_backcheck::classify::{error_flag, raw_error, ComparisonRules};
use bcstats_backcheck::config::OkRange;
use bcstats_backcheck::dataset::{Column, Dataset};
use bcstats_backcheck::model::{ComparedField, Identity, IdentityDim, SubjectInfo, Tier, Value};
use bcstats_backcheck::normalize::{normalize_text, NormalizeOptions};
use bcstats_backcheck::preprocess::preprocess;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Printable ASCII with runs of spaces and punctuation.
fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"[ a-zA-Z0-9.,;:!?'()-]{0,20}",
        1 => r"  +[a-z]{1,5}  +",
        1 => Just(String::new()),
    ]
}

/// Mostly numbers, sometimes text, sometimes missing.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => (-1000i32..1000).prop_map(|n| Value::Number(n as f64)),
        1 => (-1000.0f64..1000.0).prop_map(Value::Number),
        1 => r"[a-z]{1,6}".prop_map(Value::Text),
        1 => Just(Value::Missing),
    ]
}

fn arb_options() -> impl Strategy<Value = NormalizeOptions> {
    (0u8..3, any::<bool>(), any::<bool>()).prop_map(|(case, trim, nosymbol)| {
        NormalizeOptions::from_flags(case == 1, case == 2, trim, nosymbol).unwrap()
    })
}

fn arb_field() -> impl Strategy<Value = ComparedField> {
    (
        "[a-c]",
        "[x-z]",
        prop_oneof![Just(Tier::Type1), Just(Tier::Type2), Just(Tier::Type3)],
        any::<bool>(),
    )
        .prop_map(|(enumerator, variable, tier, error)| ComparedField {
            subject: Arc::new(SubjectInfo {
                id: format!("S{enumerator}"),
                identity: Identity {
                    enumerator: Some(enumerator),
                    ..Identity::default()
                },
                ..SubjectInfo::default()
            }),
            variable: format!("{variable}{}", tier.digit()),
            survey: Value::Number(1.0),
            backcheck: Value::Number(if error { 2.0 } else { 1.0 }),
            tier,
            error,
        })
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn normalize_text_is_idempotent(s in arb_text(), opts in arb_options()) {
        let once = normalize_text(&s, &opts);
        let twice = normalize_text(&once, &opts);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn preprocess_is_idempotent(
        cells in prop::collection::vec(prop::option::of(arb_text()), 1..12),
        opts in arb_options(),
    ) {
        let refs: Vec<Option<&str>> = cells.iter().map(|c| c.as_deref()).collect();
        let dataset = Dataset::new("survey").with_column(Column::text("comment", refs));
        let once = preprocess(&dataset, &opts);
        let twice = preprocess(&once, &opts);
        prop_assert_eq!(&once.columns[0].values, &twice.columns[0].values);
    }

    #[test]
    fn preprocess_preserves_row_count(
        cells in prop::collection::vec(prop::option::of(arb_text()), 0..12),
        opts in arb_options(),
    ) {
        let refs: Vec<Option<&str>> = cells.iter().map(|c| c.as_deref()).collect();
        let dataset = Dataset::new("survey").with_column(Column::text("comment", refs));
        prop_assert_eq!(preprocess(&dataset, &opts).row_count(), cells.len());
    }
}

// ---------------------------------------------------------------------------
// Error flag
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn zero_okrange_matches_plain_inequality(survey in arb_value(), backcheck in arb_value()) {
        let mut rules = ComparisonRules::default();
        rules.okrange.insert("v".into(), OkRange { lower: 0.0, upper: 0.0 });
        prop_assert_eq!(
            error_flag("v", &survey, &backcheck, &rules),
            raw_error(&survey, &backcheck)
        );
    }

    #[test]
    fn both_missing_is_never_flagged(
        lower in 0.0f64..10.0,
        upper in 0.0f64..10.0,
        exempt in prop::collection::vec(arb_value(), 0..3),
    ) {
        let mut rules = ComparisonRules::default();
        rules.okrange.insert("v".into(), OkRange { lower, upper });
        rules.nodiff.insert("v".into(), exempt);
        prop_assert!(!error_flag("v", &Value::Missing, &Value::Missing, &rules));
    }

    #[test]
    fn nodiff_listed_value_is_never_flagged(survey in arb_value(), backcheck in arb_value()) {
        prop_assume!(!survey.is_missing());
        let mut rules = ComparisonRules::default();
        rules.nodiff.insert("v".into(), vec![survey.clone()]);
        prop_assert!(!error_flag("v", &survey, &backcheck, &rules));
    }

    #[test]
    fn wider_okrange_never_adds_errors(
        s in -100i32..100,
        b in -100i32..100,
        lower in 0.0f64..20.0,
        upper in 0.0f64..20.0,
    ) {
        let survey = Value::Number(s as f64);
        let backcheck = Value::Number(b as f64);
        let mut narrow = ComparisonRules::default();
        narrow.okrange.insert("v".into(), OkRange { lower, upper });
        let mut wide = ComparisonRules::default();
        wide.okrange.insert("v".into(), OkRange { lower: lower + 1.0, upper: upper + 1.0 });
        if !error_flag("v", &survey, &backcheck, &narrow) {
            prop_assert!(!error_flag("v", &survey, &backcheck, &wide));
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn type3_never_reaches_rates(fields in prop::collection::vec(arb_field(), 0..40)) {
        for tier in Tier::AGGREGATED {
            let groups = aggregate_groups(&fields, IdentityDim::Enumerator, tier);
            prop_assert!(groups.each.iter().all(|e| !e.variable.ends_with('3')));
            let rates = variable_rates(&fields, tier);
            prop_assert!(rates.iter().all(|r| !r.variable.ends_with('3')));
        }
        for subject in subject_rates(&fields, 0.0) {
            let aggregated = fields
                .iter()
                .filter(|f| f.id() == subject.id && f.tier != Tier::Type3)
                .count();
            prop_assert_eq!(subject.total, aggregated);
        }
    }

    #[test]
    fn group_totals_sum_to_tier_size(fields in prop::collection::vec(arb_field(), 0..40)) {
        for tier in Tier::AGGREGATED {
            let in_tier: Vec<&ComparedField> = fields.iter().filter(|f| f.tier == tier).collect();
            let groups = aggregate_groups(&fields, IdentityDim::Enumerator, tier);
            let total: usize = groups.summary.iter().map(|g| g.total).sum();
            let differences: usize = groups.summary.iter().map(|g| g.differences).sum();
            prop_assert_eq!(total, in_tier.len());
            prop_assert_eq!(differences, in_tier.iter().filter(|f| f.error).count());
            for g in &groups.summary {
                prop_assert!((0.0..=1.0).contains(&g.error_rate));
            }
        }
    }

    #[test]
    fn per_variable_totals_match_summary(fields in prop::collection::vec(arb_field(), 0..40)) {
        let groups = aggregate_groups(&fields, IdentityDim::Enumerator, Tier::Type1);
        let mut by_key: BTreeMap<&str, usize> = BTreeMap::new();
        for e in &groups.each {
            *by_key.entry(e.key.as_str()).or_default() += e.total;
        }
        for g in &groups.summary {
            prop_assert_eq!(by_key.get(g.key.as_str()).copied().unwrap_or(0), g.total);
        }
    }
}
