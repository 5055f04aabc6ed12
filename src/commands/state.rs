//! `refresh` and `show`

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{ApplyResult, Controller, ExecuteSummary, refresh_all};

use super::{load_settings, load_state, parse_address, print_report, transport};
use crate::Context;
use crate::cli::{RefreshArgs, ShowArgs};
use crate::ui;

pub fn refresh(ctx: &Context, args: &RefreshArgs) -> Result<()> {
    ui::header("Refreshing State");

    let mut state = load_state(ctx)?;
    if state.iter().next().is_none() {
        ui::info("Nothing tracked yet");
        return Ok(());
    }

    let settings = load_settings(ctx)?;
    let transport = transport(ctx, &settings)?;
    let opts = settings.execute_options(false, args.jobs);
    let mut total = ExecuteSummary::default();

    for schema in poolkit::SCHEMAS {
        let records = state.records(schema.type_name);
        if records.is_empty() {
            continue;
        }

        let controller = Controller::with_options(schema, &transport, settings.controller_options());
        let report = refresh_all(&controller, &records, &opts)?;

        for entity in &report.entities {
            match entity.result {
                ApplyResult::Updated => ui::warn(&format!("{}: drifted, record updated", entity.address)),
                ApplyResult::Deleted => {
                    ui::warn(&format!("{}: deleted outside idpctl, record removed", entity.address));
                }
                _ => {}
            }
        }

        state.apply_report(schema.type_name, &report);
        state.save()?;

        print_report(&report);
        total.merge(&report.summary);
    }

    if total.failed > 0 {
        bail!("{} resource(s) could not be refreshed", total.failed);
    }
    Ok(())
}

pub fn show(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let state = load_state(ctx)?;

    let selected: Vec<_> = match &args.address {
        Some(address) => {
            let (schema, name) = parse_address(address)?;
            let record = state
                .record(schema.type_name, &name)
                .with_context(|| format!("{address} is not tracked"))?;
            vec![(schema.type_name, name, record)]
        }
        None => state
            .iter()
            .map(|(type_name, name, record)| (type_name, name.to_string(), record))
            .collect(),
    };

    let redacted: Vec<_> = selected
        .into_iter()
        .map(|(type_name, name, record)| {
            let mut shown = record.clone();
            if let Some(schema) = poolkit::schema_for(type_name) {
                shown.observed = schema.redact(&record.observed);
            }
            (format!("{type_name}.{name}"), shown)
        })
        .collect();

    if args.json {
        let map: std::collections::BTreeMap<_, _> = redacted.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if redacted.is_empty() {
        ui::info("Nothing tracked yet");
        return Ok(());
    }

    for (address, record) in redacted {
        ui::section(&address);
        ui::kv("id", &record.identity.to_string());
        ui::kv("status", &record.status.to_string());
        if !ctx.quiet {
            for (field, value) in record.observed.iter() {
                println!("    {} = {}", field.dimmed(), value);
            }
        }
    }
    Ok(())
}
