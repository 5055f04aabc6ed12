//! `import` - adopt a client created outside idpctl

use anyhow::{Result, bail};
use declarative::{Controller, Deadline};
use std::time::Duration;

use super::{load_settings, load_state, parse_address, transport};
use crate::Context;
use crate::cli::ImportArgs;
use crate::resources;
use crate::ui;

pub fn run(ctx: &Context, args: &ImportArgs) -> Result<()> {
    let (schema, name) = parse_address(&args.address)?;

    let mut state = load_state(ctx)?;
    if let Some(existing) = state.record(schema.type_name, &name) {
        bail!(
            "{} is already managed as {}; remove it from state first",
            args.address,
            existing.identity
        );
    }

    let settings = load_settings(ctx)?;
    let transport = transport(ctx, &settings)?;
    let controller = Controller::with_options(schema, &transport, settings.controller_options());
    let deadline = Deadline::after(Duration::from_secs(settings.timeout_secs));

    let imported = match controller.import(&args.id, deadline) {
        Ok(imported) => imported,
        Err(e) => {
            ui::dim(e.category().advice());
            return Err(e.into());
        }
    };
    let identity = imported.record.identity.clone();
    state.insert(schema.type_name, &name, imported.record);
    state.save()?;

    ui::success(&format!("Imported {} as {}", identity, args.address));

    if !ctx.quiet {
        ui::section(&format!("Add this to {}", ctx.resources.display()));
        println!();
        print!("{}", resources::to_snippet(schema.type_name, &name, &imported.seed)?);
    }
    Ok(())
}
