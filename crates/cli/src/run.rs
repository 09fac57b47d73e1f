//! `bcstats run` and `bcstats validate`: config-driven back-check comparison.

use std::path::{Path, PathBuf};

use bcstats_backcheck::{load_csv_file, BackcheckConfig, BackcheckError, BackcheckInput, BackcheckResult};

use crate::exit_codes::{EXIT_DIFFERENCES, EXIT_INVALID_CONFIG, EXIT_RUNTIME};
use crate::CliError;

fn engine_err(e: BackcheckError) -> CliError {
    let code = if e.is_config() { EXIT_INVALID_CONFIG } else { EXIT_RUNTIME };
    CliError::new(code, e.to_string())
}

fn load_config(config_path: &Path) -> Result<BackcheckConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| CliError::runtime(format!("cannot read config: {e}")))?;
    BackcheckConfig::from_toml(&config_str).map_err(engine_err)
}

/// Flag value wins; otherwise the config entry, relative to the config's directory.
fn resolve_input(
    flag: Option<PathBuf>,
    configured: Option<&str>,
    base_dir: &Path,
    which: &str,
) -> Result<PathBuf, CliError> {
    match (flag, configured) {
        (Some(path), _) => Ok(path),
        (None, Some(file)) => Ok(base_dir.join(file)),
        (None, None) => Err(CliError::usage(format!("no {which} file given"))
            .with_hint(format!("pass --{which} PATH or set [files] {which} in the config"))),
    }
}

pub fn cmd_run(
    config_path: PathBuf,
    survey: Option<PathBuf>,
    backcheck: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let survey_path = resolve_input(survey, config.files.survey.as_deref(), base_dir, "survey")?;
    let backcheck_path =
        resolve_input(backcheck, config.files.backcheck.as_deref(), base_dir, "backcheck")?;

    let input = BackcheckInput {
        survey: load_csv_file("survey", &survey_path).map_err(engine_err)?,
        backcheck: load_csv_file("backcheck", &backcheck_path).map_err(engine_err)?,
    };
    tracing::debug!(
        survey = %survey_path.display(),
        backcheck = %backcheck_path.display(),
        "loaded datasets"
    );

    let result = bcstats_backcheck::run(&config, &input).map_err(engine_err)?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);

    let differences = result.aggregated_differences();
    if differences > 0 {
        return Err(CliError::new(
            EXIT_DIFFERENCES,
            format!("{differences} type 1/2 difference(s) found"),
        ));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &BackcheckResult) {
    let m = &result.meta;
    eprintln!(
        "back check '{}': {} fields compared, {} listed, {} excluded",
        m.config_name,
        m.compared,
        result.backcheck.len(),
        m.excluded,
    );

    for (key, group) in &result.groups {
        let worst = group
            .summary
            .iter()
            .max_by(|a, b| a.error_rate.total_cmp(&b.error_rate));
        if let Some(w) = worst {
            let label = if w.key.is_empty() { "(none)" } else { w.key.as_str() };
            eprintln!(
                "  {key}: highest {label} {:.1}% ({}/{})",
                w.error_rate * 100.0,
                w.differences,
                w.total,
            );
        }
    }

    if let Some(ref subjects) = result.showid {
        eprintln!("  showid: {} subject(s) over threshold", subjects.len());
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let v = &config.variables;
    eprintln!(
        "valid: back check '{}' on '{}' with {}/{}/{} type 1/2/3 variable(s), {} identity column(s)",
        config.name,
        config.id,
        v.t1vars.len(),
        v.t2vars.len(),
        v.t3vars.len(),
        config.identity.active().len(),
    );
    Ok(())
}
