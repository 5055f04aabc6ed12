//! Lifecycle controller
//!
//! Drives one entity through Create, Read, Update, Delete and Import. Each
//! call is a strictly sequential pipeline: validate, encode, call the
//! transport (with bounded retries), read back, decode. The controller
//! holds no per-entity state, so one instance can serve many entities
//! from different threads.

use crate::codec::{self, EncodeMode, WireDocument};
use crate::context::{ControllerOptions, Deadline};
use crate::diff::{self, Classification};
use crate::document::Document;
use crate::error::{Error, Result, Verb};
use crate::import;
use crate::lifecycle::{Lifecycle, LifecycleState, validate_transition};
use crate::resource::{EntityRecord, ResourceIdentity, entity_label};
use crate::retry::{LogCallback, RetryError, with_retry, with_retry_if};
use crate::schema::ResourceSchema;
use crate::transport::Transport;
use crate::validate::validate;

/// Outcome of a successful Create
#[derive(Debug)]
pub struct Created {
    pub record: EntityRecord,
    /// Risks the caller should see, e.g. a possibly orphaned resource
    pub warnings: Vec<String>,
}

/// Outcome of a Read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Present(Document),
    /// The remote no longer has the entity
    Absent,
}

/// Outcome of a Delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing to delete; not an error
    AlreadyAbsent,
}

/// Outcome of an Import
#[derive(Debug)]
pub struct Imported {
    pub record: EntityRecord,
    /// Desired document seeded from the observed state
    pub seed: Document,
}

/// Lifecycle controller for one resource type
pub struct Controller<'a, T: Transport + ?Sized> {
    schema: &'a ResourceSchema,
    transport: &'a T,
    options: ControllerOptions,
}

impl<'a, T: Transport + ?Sized> Controller<'a, T> {
    pub fn new(schema: &'a ResourceSchema, transport: &'a T) -> Self {
        Self::with_options(schema, transport, ControllerOptions::default())
    }

    pub fn with_options(schema: &'a ResourceSchema, transport: &'a T, options: ControllerOptions) -> Self {
        Self {
            schema,
            transport,
            options,
        }
    }

    pub fn schema(&self) -> &'a ResourceSchema {
        self.schema
    }

    /// Create the entity described by `desired`
    ///
    /// If the Create call fails nothing is persisted: the entity stays
    /// absent. Once the remote has assigned an id the entity is tracked
    /// even when the read-back fails, see [`Error::Unsettled`]. A retry
    /// after an ambiguous failure (the first request may have been applied)
    /// is reported as a warning since the remote does not deduplicate.
    pub fn create(&self, desired: &Document, deadline: Deadline) -> Result<Created> {
        let desired = self.schema.apply_defaults(desired);
        let parent = self.schema.parent_of(&desired).map(str::to_string);
        let entity = entity_label(self.schema.type_name, parent.as_deref(), None);
        self.check(&entity, Verb::Create, &desired)?;

        let mut lifecycle = Lifecycle::new(LifecycleState::Absent);
        lifecycle.transition(LifecycleState::Creating)?;

        let request = codec::encode(self.schema, &desired, EncodeMode::Create);
        log::debug!("{entity}: create with {}", field_list(&request));

        let mut ambiguous = Vec::new();
        let response = with_retry_if(
            &self.options.retry,
            deadline,
            Some(&LogCallback),
            // NotFound may be a parent that is not visible yet
            |e| e.is_transient() || e.is_not_found(),
            || {
                self.transport.create(&request, deadline).inspect_err(|e| {
                    if e.kind.is_ambiguous() {
                        ambiguous.push(e.kind);
                    }
                })
            },
        );

        let mut warnings = Vec::new();
        if let Some(kind) = ambiguous.first() {
            let warning = format!(
                "{entity}: create was retried after an ambiguous failure ({kind}); \
                 an orphaned remote resource may exist under parent {}",
                parent.as_deref().unwrap_or("?")
            );
            log::warn!("{warning}");
            warnings.push(warning);
        }

        let response = match response {
            Ok(response) => response,
            Err(e) => return Err(self.abort(&mut lifecycle, LifecycleState::Absent, &entity, Verb::Create, e)),
        };

        let Some(resource_id) = response
            .get(self.schema.identity.id_wire)
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
        else {
            lifecycle.transition(LifecycleState::Failed)?;
            return Err(Error::InvalidResponse {
                entity,
                verb: Verb::Create,
                message: format!("missing {}", self.schema.identity.id_wire),
            });
        };

        let identity = ResourceIdentity::new(parent.unwrap_or_default(), resource_id);
        let entity = self.label(&identity);

        // The new resource may take a moment to become readable.
        let wire = with_retry_if(
            &self.options.settle,
            deadline,
            Some(&LogCallback),
            |e| e.is_not_found() || e.is_transient(),
            || self.transport.read(&identity, deadline),
        );
        let observed = match wire {
            Ok(wire) => self.observe(&identity, &entity, Verb::Create, &wire),
            Err(e) => Err(surface(entity.clone(), Verb::Create, e)),
        };
        let mut observed = match observed {
            Ok(observed) => observed,
            Err(e) => return Err(self.unsettled(&mut lifecycle, identity, &entity, &desired, e)),
        };
        self.schema.carry_unreported(&desired, &mut observed);

        lifecycle.transition(LifecycleState::Stable)?;
        log::info!("{entity}: created");

        Ok(Created {
            record: EntityRecord::new(identity, observed),
            warnings,
        })
    }

    /// Destroy the entity behind `record` and create `desired` in its place
    ///
    /// `desired` is validated before anything is deleted, so a rejected
    /// document leaves the old entity in place.
    pub fn replace(&self, record: &EntityRecord, desired: &Document, deadline: Deadline) -> Result<Created> {
        let entity = self.label(&record.identity);
        self.check(&entity, Verb::Create, &self.schema.apply_defaults(desired))?;

        self.delete(&record.identity, deadline)?;
        self.create(desired, deadline)
    }

    /// Read the current remote state
    ///
    /// A missing entity is [`ReadOutcome::Absent`], not an error.
    pub fn read(&self, identity: &ResourceIdentity, deadline: Deadline) -> Result<ReadOutcome> {
        let entity = self.label(identity);
        log::debug!("{entity}: read");

        let result = with_retry(&self.options.retry, deadline, Some(&LogCallback), || {
            self.transport.read(identity, deadline)
        });

        match result {
            Ok(wire) => Ok(ReadOutcome::Present(self.observe(identity, &entity, Verb::Read, &wire)?)),
            Err(RetryError::Fatal(e)) if e.is_not_found() => {
                log::warn!("{entity}: not found remotely, treating as absent");
                Ok(ReadOutcome::Absent)
            }
            Err(e) => Err(surface(entity, Verb::Read, e)),
        }
    }

    /// Resync a persisted record with the remote
    ///
    /// Returns `None` when the entity was deleted out of band. Values of
    /// inputs Read never reports are carried over from the record.
    pub fn refresh(&self, record: &EntityRecord, deadline: Deadline) -> Result<Option<EntityRecord>> {
        match self.read(&record.identity, deadline)? {
            ReadOutcome::Present(mut observed) => {
                validate_transition(record.status, LifecycleState::Stable)?;
                self.schema.carry_unreported(&record.observed, &mut observed);
                Ok(Some(EntityRecord::new(record.identity.clone(), observed)))
            }
            ReadOutcome::Absent => Ok(None),
        }
    }

    /// Bring an existing entity in line with `desired`
    ///
    /// Refuses with [`Error::ReplaceRequired`] when any Replace-class field
    /// changed; the caller then deletes and recreates instead. Only
    /// Update-class changes are sent, followed by a read-back.
    pub fn update(&self, record: &EntityRecord, desired: &Document, deadline: Deadline) -> Result<EntityRecord> {
        let identity = &record.identity;
        let entity = self.label(identity);
        let desired = self.schema.apply_defaults(desired);
        self.check(&entity, Verb::Update, &desired)?;

        let diff = diff::classify(self.schema, Some(&record.observed), &desired);
        if diff.requires_replace() {
            return Err(Error::ReplaceRequired {
                entity,
                fields: diff
                    .fields_with(Classification::Replace)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }
        if !diff.has_updates() {
            log::debug!("{entity}: already up to date");
            validate_transition(record.status, LifecycleState::Stable)?;
            return Ok(EntityRecord {
                status: LifecycleState::Stable,
                ..record.clone()
            });
        }

        let pre = match record.status {
            LifecycleState::Failed => LifecycleState::Failed,
            _ => LifecycleState::Stable,
        };
        let mut lifecycle = Lifecycle::new(pre);
        lifecycle.transition(LifecycleState::Updating)?;

        let request = codec::encode_update(self.schema, &desired, &diff);
        log::debug!(
            "{entity}: update {} with {}",
            diff.fields_with(Classification::Update).join(", "),
            field_list(&request)
        );

        let result = with_retry(&self.options.retry, deadline, Some(&LogCallback), || {
            self.transport.update(identity, &request, deadline)
        })
        .and_then(|_| {
            with_retry(&self.options.retry, deadline, Some(&LogCallback), || {
                self.transport.read(identity, deadline)
            })
        });

        let wire = match result {
            Ok(wire) => wire,
            Err(e) => return Err(self.abort(&mut lifecycle, LifecycleState::Stable, &entity, Verb::Update, e)),
        };

        let mut observed = self.observe(identity, &entity, Verb::Update, &wire)?;
        self.schema.carry_unreported(&desired, &mut observed);

        lifecycle.transition(LifecycleState::Stable)?;
        log::info!("{entity}: updated");

        Ok(EntityRecord::new(identity.clone(), observed))
    }

    /// Delete the entity; deleting an absent entity succeeds
    pub fn delete(&self, identity: &ResourceIdentity, deadline: Deadline) -> Result<DeleteOutcome> {
        let entity = self.label(identity);
        let mut lifecycle = Lifecycle::new(LifecycleState::Stable);
        lifecycle.transition(LifecycleState::Deleting)?;
        log::debug!("{entity}: delete");

        let result = with_retry(&self.options.retry, deadline, Some(&LogCallback), || {
            self.transport.delete(identity, deadline)
        });

        let outcome = match result {
            Ok(()) => DeleteOutcome::Deleted,
            Err(RetryError::Fatal(e)) if e.is_not_found() => DeleteOutcome::AlreadyAbsent,
            Err(e) => return Err(self.abort(&mut lifecycle, LifecycleState::Stable, &entity, Verb::Delete, e)),
        };

        lifecycle.transition(LifecycleState::Absent)?;
        match outcome {
            DeleteOutcome::Deleted => log::info!("{entity}: deleted"),
            DeleteOutcome::AlreadyAbsent => log::info!("{entity}: already gone"),
        }
        Ok(outcome)
    }

    /// Adopt an existing remote entity by its external identifier
    pub fn import(&self, identifier: &str, deadline: Deadline) -> Result<Imported> {
        let identity = import::parse(identifier)?;
        let entity = self.label(&identity);

        let observed = match self.read(&identity, deadline) {
            Ok(ReadOutcome::Present(observed)) => observed,
            Ok(ReadOutcome::Absent) => {
                return Err(Error::NotFound {
                    entity,
                    verb: Verb::Import,
                });
            }
            Err(e) => return Err(e),
        };

        log::info!("{entity}: imported");
        Ok(Imported {
            seed: self.schema.seed_desired(&observed),
            record: EntityRecord::new(identity, observed),
        })
    }

    fn label(&self, identity: &ResourceIdentity) -> String {
        entity_label(
            self.schema.type_name,
            Some(&identity.parent_id),
            Some(&identity.resource_id),
        )
    }

    fn check(&self, entity: &str, verb: Verb, desired: &Document) -> Result<()> {
        let violations = validate(self.schema, desired);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                entity: entity.to_string(),
                verb,
                violations,
            })
        }
    }

    /// Decode a read response, making sure the parent id is present
    fn observe(
        &self,
        identity: &ResourceIdentity,
        entity: &str,
        verb: Verb,
        wire: &WireDocument,
    ) -> Result<Document> {
        let mut observed = codec::decode(self.schema, wire).map_err(|e| Error::InvalidResponse {
            entity: entity.to_string(),
            verb,
            message: e.to_string(),
        })?;
        let parent_field = self.schema.identity.parent_field;
        if !observed.contains(parent_field) {
            observed.insert(parent_field, identity.parent_id.as_str());
        }
        Ok(observed)
    }

    /// Keep a created entity that could not be read back tracked as failed
    ///
    /// The observed document only holds what the Create fixed for good, so
    /// the next plan updates every settable field instead of replacing.
    fn unsettled(
        &self,
        lifecycle: &mut Lifecycle,
        identity: ResourceIdentity,
        entity: &str,
        desired: &Document,
        error: Error,
    ) -> Error {
        if let Err(e) = lifecycle.transition(LifecycleState::Failed) {
            return e;
        }
        log::warn!("{entity}: created but not read back, tracking it as failed");

        let mut observed = Document::new();
        for field in self.schema.force_new_fields() {
            if let Some(value) = desired.get(field.name) {
                observed.insert(field.name, value.clone());
            }
        }
        observed.insert(self.schema.identity.parent_field, identity.parent_id.as_str());
        self.schema.carry_unreported(desired, &mut observed);

        Error::Unsettled {
            record: Box::new(EntityRecord {
                status: LifecycleState::Failed,
                ..EntityRecord::new(identity, observed)
            }),
            source: Box::new(error),
        }
    }

    /// Record the failure on the lifecycle and turn it into an error
    ///
    /// A timeout returns the entity to `pre`; anything else marks it failed.
    fn abort(
        &self,
        lifecycle: &mut Lifecycle,
        pre: LifecycleState,
        entity: &str,
        verb: Verb,
        err: RetryError,
    ) -> Error {
        let error = surface(entity.to_string(), verb, err);
        let to = if error.leaves_state_unchanged() {
            pre
        } else {
            LifecycleState::Failed
        };
        if let Err(e) = lifecycle.transition(to) {
            return e;
        }
        log::debug!("{entity}: {verb} left entity {}", lifecycle.state());
        error
    }
}

fn surface(entity: String, verb: Verb, err: RetryError) -> Error {
    match err {
        RetryError::Fatal(e) if e.is_not_found() => Error::NotFound { entity, verb },
        RetryError::Exhausted { last, .. } if last.is_not_found() => Error::NotFound { entity, verb },
        RetryError::Fatal(source) => Error::Remote { entity, verb, source },
        RetryError::Exhausted { attempts, last } => Error::RetriesExhausted {
            entity,
            verb,
            attempts,
            last,
        },
        RetryError::DeadlineExceeded { .. } => Error::Timeout { entity, verb },
    }
}

/// Member names of a request, never values
fn field_list(request: &WireDocument) -> String {
    request.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}
