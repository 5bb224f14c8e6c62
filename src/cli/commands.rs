use std::path::Path;
use std::time::Instant;

use crate::cli::config::RunSettings;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::model::storefront::storefront_model;
use crate::page::driver::DriverSession;
use crate::page::storefront::StorefrontSim;
use crate::report::console::{failing_steps, format_console_report, format_json_report};
use crate::scenario::source::load_scenarios;
use crate::scenario::suite::{SuiteOptions, run_suite};
use crate::trace::logger::TraceLogger;

// ============================================================================
// run subcommand
// ============================================================================

/// Run every scenario found at `scenarios_path`. Returns whether all passed.
pub fn cmd_run(
    scenarios_path: &str,
    settings: &RunSettings,
) -> Result<bool, Box<dyn std::error::Error>> {
    settings.harness.validate()?;
    let model = storefront_model()?;
    let scenarios = load_scenarios(Path::new(scenarios_path), &model, &settings.harness)?;

    if scenarios.is_empty() {
        eprintln!("No scenarios found at: {}", scenarios_path);
        return Ok(true);
    }

    let tracer = settings.trace.as_deref().map(TraceLogger::new);
    let options = SuiteOptions {
        tracer: tracer.as_ref(),
        cancel: None,
    };
    let suite_name = suite_name(scenarios_path);
    let workers = settings
        .harness
        .max_parallel_scenarios
        .min(scenarios.len())
        .max(1);

    tracing::info!(
        scenarios = scenarios.len(),
        target = %settings.target,
        workers,
        "running scenarios"
    );
    let start = Instant::now();

    let report = match settings.target.as_str() {
        "simulated" => {
            let contexts: Vec<StorefrontSim> = (0..workers)
                .map(|_| StorefrontSim::new(&settings.harness.base_url))
                .collect();
            run_suite(&suite_name, &scenarios, contexts, &model, &settings.harness, options)?
        }
        "driver" => {
            let contexts = (0..workers)
                .map(|_| DriverSession::launch(&settings.driver))
                .collect::<Result<Vec<_>, _>>()?;
            run_suite(&suite_name, &scenarios, contexts, &model, &settings.harness, options)?
        }
        other => {
            return Err(HarnessError::config(format!(
                "unknown target '{}' (expected simulated or driver)",
                other
            ))
            .into());
        }
    };

    let report = report.with_duration(start.elapsed());
    if let Some(tracer) = &tracer {
        tracing::info!(events = tracer.events_written(), path = ?tracer.path(), "step trace written");
    }
    let all_passed = report.all_passed();
    if !all_passed {
        tracing::warn!(failing_steps = failing_steps(&report), "suite did not pass");
    }

    let output_content = match settings.format.as_str() {
        "json" => format_json_report(&report)?,
        _ => format_console_report(&report),
    };

    match &settings.output {
        Some(path) => std::fs::write(path, &output_content)?,
        None => print!("{}", output_content),
    }

    Ok(all_passed)
}

// ============================================================================
// validate subcommand
// ============================================================================

/// Compile scenarios against the model. Returns the number compiled.
pub fn cmd_validate(
    scenarios_path: &str,
    harness: &HarnessConfig,
) -> Result<usize, Box<dyn std::error::Error>> {
    let model = storefront_model()?;
    let scenarios = load_scenarios(Path::new(scenarios_path), &model, harness)?;

    for scenario in &scenarios {
        println!("  ok  {} ({} steps)", scenario.name, scenario.steps.len());
    }
    println!("{} scenarios valid", scenarios.len());

    Ok(scenarios.len())
}

/// Suite name from the scenario path: file stem or directory name.
pub fn suite_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(suite_slug)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "scenarios".to_string())
}

/// Lowercase slug: runs of characters other than letters, digits, `-` and
/// `_` collapse into a single `_`.
pub fn suite_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}
