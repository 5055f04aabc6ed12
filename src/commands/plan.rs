//! `plan`, `apply`, `destroy` and `validate`

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{Controller, ExecuteSummary, ExecutionPlan, ResourceSchema, execute, validate};

use super::{load_settings, load_state, print_plan, print_report, transport};
use crate::Context;
use crate::cli::{ApplyArgs, TargetArgs};
use crate::resources::Resources;
use crate::state::StateFile;
use crate::ui;

/// One plan per resource type, filtered by target
fn build_plans(
    resources: &Resources,
    state: &StateFile,
    target: Option<&str>,
) -> Vec<(&'static ResourceSchema, ExecutionPlan)> {
    poolkit::SCHEMAS
        .iter()
        .map(|schema| {
            let plan = ExecutionPlan::build(
                schema,
                &resources.of_type(schema),
                &state.records(schema.type_name),
            )
            .filter_by_target(target);
            (*schema, plan)
        })
        .collect()
}

fn destroy_plans(state: &StateFile, target: Option<&str>) -> Vec<(&'static ResourceSchema, ExecutionPlan)> {
    poolkit::SCHEMAS
        .iter()
        .map(|schema| {
            let plan = ExecutionPlan::destroy(schema, &state.records(schema.type_name)).filter_by_target(target);
            (*schema, plan)
        })
        .collect()
}

/// Report violations of every desired document; true when all are valid
fn check_resources(resources: &Resources) -> bool {
    let mut valid = true;
    for (type_name, name, doc) in resources.iter() {
        let Some(schema) = poolkit::schema_for(type_name) else {
            continue;
        };
        let violations = validate(schema, doc);
        if !violations.is_empty() {
            valid = false;
            ui::error(&format!("{type_name}.{name}:"));
            for violation in violations.iter() {
                eprintln!("    {violation}");
            }
        }
    }
    valid
}

/// Print plans and their summary; returns the number of changes
fn show_plans(ctx: &Context, plans: &[(&'static ResourceSchema, ExecutionPlan)]) -> usize {
    let mut changes = 0;
    let mut summary = String::new();
    for (schema, plan) in plans {
        let s = plan.summary();
        if s.changes() == 0 {
            continue;
        }
        ui::section(schema.type_name);
        print_plan(plan, ctx);
        changes += s.changes();
        summary = s.to_string();
    }

    println!();
    if changes == 0 {
        println!("  {} No changes needed", "✓".green());
    } else if plans.iter().filter(|(_, p)| p.summary().changes() > 0).count() == 1 {
        println!("  Plan: {summary}");
    } else {
        println!("  Plan: {changes} change(s)");
    }
    changes
}

pub fn plan(ctx: &Context, args: &TargetArgs) -> Result<()> {
    ui::header("Plan");

    let resources = Resources::load(&ctx.resources)?;
    if !check_resources(&resources) {
        bail!("Desired configuration is invalid");
    }
    if resources.is_empty() {
        ui::warn(&format!("No resources declared in {}", ctx.resources.display()));
    }
    let state = load_state(ctx)?;

    show_plans(ctx, &build_plans(&resources, &state, args.target.as_deref()));
    Ok(())
}

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Applying Configuration");

    let resources = Resources::load(&ctx.resources)?;
    if !check_resources(&resources) {
        bail!("Desired configuration is invalid");
    }
    let state = load_state(ctx)?;
    let plans = build_plans(&resources, &state, args.target.target.as_deref());

    run(ctx, args, state, plans)
}

pub fn destroy(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Destroying Tracked Resources");

    let state = load_state(ctx)?;
    let plans = destroy_plans(&state, args.target.target.as_deref());

    run(ctx, args, state, plans)
}

/// Show, confirm and execute plans, saving state after each type
fn run(
    ctx: &Context,
    args: &ApplyArgs,
    mut state: StateFile,
    plans: Vec<(&'static ResourceSchema, ExecutionPlan)>,
) -> Result<()> {
    if show_plans(ctx, &plans) == 0 {
        return Ok(());
    }
    if args.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    let settings = load_settings(ctx)?;
    let transport = transport(ctx, &settings)?;
    let opts = settings.execute_options(false, args.jobs);
    let mut confirm = ui::Prompt { yes: args.yes };
    let mut total = ExecuteSummary::default();

    for (schema, plan) in plans {
        if plan.summary().changes() == 0 {
            continue;
        }

        let controller = Controller::with_options(schema, &transport, settings.controller_options());
        let mut progress = ui::BarProgress::new(ctx.quiet);
        println!();
        let report = execute(&controller, plan, &opts, &mut progress, &mut confirm)?;

        state.apply_report(schema.type_name, &report);
        state.save()?;

        print_report(&report);
        total.merge(&report.summary);
    }

    if total.failed > 0 {
        bail!("{} resource(s) failed", total.failed);
    }
    ui::success(&format!("State saved to {}", state.path().display()));
    Ok(())
}

pub fn validate_config(ctx: &Context) -> Result<()> {
    let resources = Resources::load(&ctx.resources)?;
    if !check_resources(&resources) {
        bail!("Desired configuration is invalid");
    }
    ui::success(&format!(
        "{} resource(s) in {} are valid",
        resources.len(),
        ctx.resources.display()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Document, EntityRecord, PlannedAction, ResourceIdentity};
    use tempfile::TempDir;

    fn state_with(dir: &TempDir, names: &[&str]) -> StateFile {
        let mut state = StateFile::load(&dir.path().join("state.toml")).unwrap();
        for (i, name) in names.iter().enumerate() {
            state.insert(
                "user_pool_client",
                name,
                EntityRecord::new(
                    ResourceIdentity::new("pool1", format!("c-{i}")),
                    Document::new().with("name", *name).with("user_pool_id", "pool1"),
                ),
            );
        }
        state
    }

    #[test]
    fn test_build_plans_creates_and_deletes() {
        let dir = TempDir::new().unwrap();
        let state = state_with(&dir, &["gone"]);
        let resources = Resources::parse(
            "[user_pool_client.web]\nname = \"web\"\nuser_pool_id = \"pool1\"\n",
        )
        .unwrap();

        let plans = build_plans(&resources, &state, None);
        assert_eq!(plans.len(), 1);
        let summary = plans[0].1.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.delete, 1);
    }

    #[test]
    fn test_target_filter() {
        let dir = TempDir::new().unwrap();
        let state = state_with(&dir, &["a", "b"]);

        let plans = destroy_plans(&state, Some("user_pool_client.b"));
        let entities = &plans[0].1.entities;
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "b");
        assert!(matches!(entities[0].action, PlannedAction::Delete));
    }

    #[test]
    fn test_check_resources() {
        let valid = Resources::parse("[user_pool_client.web]\nname = \"web\"\nuser_pool_id = \"pool1\"\n").unwrap();
        assert!(check_resources(&valid));

        let invalid = Resources::parse(
            "[user_pool_client.web]\nname = \"web\"\nuser_pool_id = \"pool1\"\nrefresh_token_validity = 9999\n",
        )
        .unwrap();
        assert!(!check_resources(&invalid));
    }
}
