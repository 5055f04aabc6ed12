//! Execution engine - reconciles planned entities in parallel
//!
//! Distinct entities run concurrently on a bounded worker pool; the verbs
//! of a single entity always run one after another. Each entity gets its
//! own deadline, started when its pipeline starts.

use crate::context::{ConfirmCallback, Deadline, ProgressCallback};
use crate::controller::{Controller, DeleteOutcome};
use crate::error::{Error, Result, Verb};
use crate::lifecycle::LifecycleState;
use crate::planner::{ExecutionPlan, PlannedAction, PlannedEntity};
use crate::resource::EntityRecord;
use crate::transport::Transport;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// What the caller must do to its persisted record of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Keep,
    Store(EntityRecord),
    Remove,
}

/// Outcome of one entity
#[derive(Debug, Clone)]
pub struct EntityReport {
    pub address: String,
    pub name: String,
    pub result: ApplyResult,
    pub record: RecordChange,
    pub warnings: Vec<String>,
}

/// Outcome of a whole plan
#[derive(Debug, Clone, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub entities: Vec<EntityReport>,
}

impl ExecuteReport {
    /// Address and message of every failed entity
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.entities
            .iter()
            .filter_map(|e| match &e.result {
                ApplyResult::Failed { error } => Some((e.address.as_str(), error.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .flat_map(|e| e.warnings.iter().map(String::as_str))
    }

    /// Apply the record changes to a name-keyed record map
    pub fn apply_to(&self, records: &mut BTreeMap<String, EntityRecord>) {
        for entity in &self.entities {
            match &entity.record {
                RecordChange::Keep => {}
                RecordChange::Store(record) => {
                    records.insert(entity.name.clone(), record.clone());
                }
                RecordChange::Remove => {
                    records.remove(&entity.name);
                }
            }
        }
    }
}

/// Execute a plan with the given options and callbacks
///
/// Destructive plans (replace or delete) need confirmation; declining
/// skips every change. Failures do not stop other entities: each one is
/// reported in the returned [`ExecuteReport`].
pub fn execute<T, P, C>(
    controller: &Controller<'_, T>,
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    T: Transport + ?Sized,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let changes: Vec<PlannedEntity> = plan.entities.into_iter().filter(|e| e.action.is_change()).collect();

    if changes.is_empty() || opts.dry_run {
        return Ok(ExecuteReport::default());
    }

    let destructive = changes.iter().filter(|e| e.action.is_destructive()).count();
    if destructive > 0 {
        let prompt = format!("Apply changes? {destructive} resource(s) will be destroyed");
        if !confirm.confirm(&prompt)? {
            let entities: Vec<EntityReport> = changes
                .iter()
                .map(|e| report(e, skipped("declined"), RecordChange::Keep))
                .collect();
            let mut summary = ExecuteSummary::default();
            for entity in &entities {
                summary.add_result(&entity.result);
            }
            return Ok(ExecuteReport { summary, entities });
        }
    }

    progress.on_batch_start(changes.len());
    for entity in &changes {
        progress.on_entity_start(&entity.address(), &entity.action);
    }

    let entities = run_parallel(opts.jobs, &changes, |entity| reconcile(controller, entity, opts))?;

    let mut summary = ExecuteSummary::default();
    for entity in &entities {
        progress.on_entity_complete(&entity.address, &entity.result);
        summary.add_result(&entity.result);
    }
    progress.on_batch_complete();

    Ok(ExecuteReport { summary, entities })
}

/// Resync every record with the remote
///
/// Records of entities deleted out of band are removed. Failures are
/// collected per entity and leave that record untouched.
pub fn refresh_all<T>(
    controller: &Controller<'_, T>,
    records: &BTreeMap<String, EntityRecord>,
    opts: &ExecuteOptions,
) -> Result<ExecuteReport>
where
    T: Transport + ?Sized,
{
    let items: Vec<(&String, &EntityRecord)> = records.iter().collect();
    let type_name = controller.schema().type_name;

    let entities = run_parallel(opts.jobs, &items, |(name, record)| {
        let deadline = Deadline::after(opts.timeout);
        let (result, change) = match controller.refresh(record, deadline) {
            Ok(Some(fresh)) if fresh == **record => (ApplyResult::NoChange, RecordChange::Keep),
            Ok(Some(fresh)) => (ApplyResult::Updated, RecordChange::Store(fresh)),
            Ok(None) => (ApplyResult::Deleted, RecordChange::Remove),
            Err(e) => (failed(&e), RecordChange::Keep),
        };
        EntityReport {
            address: format!("{type_name}.{name}"),
            name: (*name).clone(),
            result,
            record: change,
            warnings: Vec::new(),
        }
    })?;

    let mut summary = ExecuteSummary::default();
    for entity in &entities {
        summary.add_result(&entity.result);
    }
    Ok(ExecuteReport { summary, entities })
}

fn run_parallel<I, F>(jobs: usize, items: &[I], f: F) -> Result<Vec<EntityReport>>
where
    I: Sync,
    F: Fn(&I) -> EntityReport + Sync + Send,
{
    if jobs <= 1 || items.len() <= 1 {
        return Ok(items.iter().map(f).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;

    Ok(pool.install(|| items.par_iter().map(f).collect()))
}

/// Run the verb pipeline of one entity
fn reconcile<T: Transport + ?Sized>(
    controller: &Controller<'_, T>,
    entity: &PlannedEntity,
    opts: &ExecuteOptions,
) -> EntityReport {
    let deadline = Deadline::after(opts.timeout);

    match (&entity.action, entity.desired.as_ref(), entity.record.as_ref()) {
        (PlannedAction::Create(_), Some(desired), _) => match controller.create(desired, deadline) {
            Ok(created) => EntityReport {
                warnings: created.warnings,
                ..report(entity, ApplyResult::Created, RecordChange::Store(created.record))
            },
            Err(e) => unsettled(entity, &e).unwrap_or_else(|| report(entity, failed(&e), RecordChange::Keep)),
        },
        (PlannedAction::Update(_), Some(desired), Some(record)) => {
            match controller.update(record, desired, deadline) {
                Ok(updated) => report(entity, ApplyResult::Updated, RecordChange::Store(updated)),
                Err(e) => report(entity, failed(&e), mark_failed(record, &e)),
            }
        }
        (PlannedAction::Replace(_), Some(desired), Some(record)) => {
            match controller.replace(record, desired, deadline) {
                Ok(created) => EntityReport {
                    warnings: created.warnings,
                    ..report(entity, ApplyResult::Replaced, RecordChange::Store(created.record))
                },
                Err(e) => unsettled(entity, &e).unwrap_or_else(|| {
                    let change = match (&e, e.verb()) {
                        // Rejected before anything was deleted
                        (Error::Validation { .. }, _) => RecordChange::Keep,
                        (_, Some(Verb::Delete)) => mark_failed(record, &e),
                        // Deleted, but the new entity was not created
                        _ => RecordChange::Remove,
                    };
                    report(entity, failed(&e), change)
                }),
            }
        }
        (PlannedAction::Delete, _, Some(record)) => match controller.delete(&record.identity, deadline) {
            Ok(DeleteOutcome::Deleted | DeleteOutcome::AlreadyAbsent) => {
                report(entity, ApplyResult::Deleted, RecordChange::Remove)
            }
            Err(e) => report(entity, failed(&e), mark_failed(record, &e)),
        },
        (PlannedAction::NoOp, _, _) => report(entity, ApplyResult::NoChange, RecordChange::Keep),
        _ => report(entity, skipped("inconsistent plan entry"), RecordChange::Keep),
    }
}

fn report(entity: &PlannedEntity, result: ApplyResult, record: RecordChange) -> EntityReport {
    EntityReport {
        address: entity.address(),
        name: entity.name.clone(),
        result,
        record,
        warnings: Vec::new(),
    }
}

/// Report of a Create the remote applied but that could not be read back
fn unsettled(entity: &PlannedEntity, error: &Error) -> Option<EntityReport> {
    let record = error.tracked_record()?;
    Some(EntityReport {
        warnings: vec![format!(
            "{}: created as {} but not read back; it is tracked as failed until the next apply or refresh",
            entity.address(),
            record.identity
        )],
        ..report(entity, failed(error), RecordChange::Store(record.clone()))
    })
}

fn failed(error: &Error) -> ApplyResult {
    ApplyResult::Failed {
        error: error.to_string(),
    }
}

fn skipped(reason: &str) -> ApplyResult {
    ApplyResult::Skipped {
        reason: reason.to_string(),
    }
}

/// Persist the failed status unless the verb left the entity untouched
fn mark_failed(record: &EntityRecord, error: &Error) -> RecordChange {
    if error.leaves_state_unchanged() {
        return RecordChange::Keep;
    }
    RecordChange::Store(EntityRecord {
        status: LifecycleState::Failed,
        ..record.clone()
    })
}
