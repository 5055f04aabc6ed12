pub mod import;
pub mod plan;
pub mod state;

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{ApplyResult, Classification, ExecuteReport, ExecutionPlan, PlannedAction};
use poolkit::HttpTransport;

use crate::Context;
use crate::config::Settings;
use crate::paths;
use crate::state::StateFile;
use crate::ui;

/// Settings from `--config` or the config directory
pub fn load_settings(ctx: &Context) -> Result<Settings> {
    let path = match &ctx.config {
        Some(path) => path.clone(),
        None => paths::config_file()?,
    };
    Settings::load(&path)
}

/// State from `--state` or the state directory
pub fn load_state(ctx: &Context) -> Result<StateFile> {
    let path = match &ctx.state {
        Some(path) => path.clone(),
        None => paths::state_file()?,
    };
    StateFile::load(&path)
}

/// HTTP transport for `--endpoint`, `IDPCTL_ENDPOINT` or the settings file
pub fn transport(ctx: &Context, settings: &Settings) -> Result<HttpTransport> {
    let Some(endpoint) = ctx.endpoint.as_ref().or(settings.endpoint.as_ref()) else {
        bail!(
            "No endpoint configured. Pass --endpoint, set IDPCTL_ENDPOINT or add `endpoint` to {}",
            paths::CONFIG_FILE
        );
    };
    log::debug!("Using endpoint {endpoint}");
    Ok(HttpTransport::new(endpoint.clone()))
}

/// Split `type.name` and resolve the type
pub fn parse_address(address: &str) -> Result<(&'static declarative::ResourceSchema, String)> {
    let (type_name, name) = address
        .split_once('.')
        .filter(|(t, n)| !t.is_empty() && !n.is_empty() && !n.contains('.'))
        .with_context(|| format!("Invalid address '{address}', expected <type>.<name>"))?;
    let schema = poolkit::schema_for(type_name).with_context(|| {
        format!(
            "Unknown resource type '{type_name}' (known: {})",
            crate::resources::known_types().join(", ")
        )
    })?;
    Ok((schema, name.to_string()))
}

// ============================================================================
// Display
// ============================================================================

/// Print every change of a plan with its field-level diff
pub fn print_plan(plan: &ExecutionPlan, ctx: &Context) {
    for entity in plan.changes() {
        println!(
            "  {} {} {}",
            ui::action_symbol(&entity.action),
            entity.address().bold(),
            format!("({})", entity.action).dimmed()
        );

        if let Some(record) = &entity.record {
            ui::dim(&format!("    id: {}", record.identity));
        }

        if ctx.quiet {
            continue;
        }

        match &entity.action {
            PlannedAction::Create(diff) | PlannedAction::Update(diff) | PlannedAction::Replace(diff) => {
                // Ignored differences (computed or unknown fields) only with -v
                let shown = diff
                    .changes
                    .values()
                    .filter(|c| ctx.verbose > 0 || c.classification != Classification::Ignore);
                for change in shown {
                    let line = match (&change.old, &change.new) {
                        (None, Some(new)) => format!("{} = {new}", change.field),
                        (Some(old), None) => format!("{} = {old} → (removed)", change.field),
                        (Some(old), Some(new)) => format!("{} = {old} → {new}", change.field),
                        (None, None) => continue,
                    };
                    let note = match change.classification {
                        Classification::Replace if !diff.creating => " (forces replacement)".red().to_string(),
                        Classification::Ignore => " (ignored)".dimmed().to_string(),
                        _ => String::new(),
                    };
                    println!("      {line}{note}");
                }
            }
            PlannedAction::Delete | PlannedAction::NoOp => {}
        }
    }
}

/// Print per-entity outcomes, warnings and the totals
pub fn print_report(report: &ExecuteReport) {
    for entity in &report.entities {
        let detail = match &entity.result {
            ApplyResult::Failed { error } => error.clone(),
            ApplyResult::Skipped { reason } => format!("skipped: {reason}"),
            ApplyResult::NoChange => "no change".to_string(),
            ApplyResult::Created => "created".to_string(),
            ApplyResult::Updated => "updated".to_string(),
            ApplyResult::Replaced => "replaced".to_string(),
            ApplyResult::Deleted => "deleted".to_string(),
        };
        println!(
            "  {} {} {}",
            ui::result_symbol(&entity.result),
            entity.address,
            detail.dimmed()
        );
    }

    for warning in report.warnings() {
        ui::warn(warning);
    }

    let s = &report.summary;
    println!();
    println!(
        "  {} created, {} updated, {} replaced, {} deleted, {} failed, {} skipped",
        s.created, s.updated, s.replaced, s.deleted, s.failed, s.skipped
    );
}
