//! # Declarative
//!
//! A reconciliation core for remote resources managed from desired state.
//!
//! Given a desired document for an entity and the last state observed for
//! it, this crate decides what to do (create, update in place, replace,
//! delete or nothing), issues the calls through a transport collaborator
//! and reads the result back so drift can be detected on the next pass.
//!
//! ## Core Concepts
//!
//! - **ResourceSchema**: a declarative field-mapping table. The codec, the
//!   validator and the diff engine all consult the same table.
//! - **Document**: typed attribute values; set-valued fields keep the
//!   three-way state absent, empty, populated.
//! - **ResourceDiff**: every differing field classified Update, Replace or
//!   Ignore. One Replace makes the whole entity a Replace.
//! - **Controller**: Create/Read/Update/Delete/Import for one entity,
//!   with bounded retries and a caller-supplied deadline.
//! - **ExecutionPlan**: one planned action per entity of a configuration,
//!   run by the executor across entities in parallel.
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Controller, Deadline, Document, ReadOutcome};
//! use std::time::Duration;
//!
//! let controller = Controller::new(&SCHEMA, &transport);
//! let desired = Document::new().with("name", "app1").with("parent_id", "p1");
//!
//! let created = controller.create(&desired, Deadline::after(Duration::from_secs(60)))?;
//! for warning in &created.warnings {
//!     log::warn!("{warning}");
//! }
//!
//! match controller.read(&created.record.identity, Deadline::after(Duration::from_secs(30)))? {
//!     ReadOutcome::Present(observed) => println!("{observed}"),
//!     ReadOutcome::Absent => println!("deleted out of band"),
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`Transport`]: the four remote verbs, with classified errors
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles confirmation of destructive plans
//!
//! This allows the crate to be used without hard dependencies on a
//! particular HTTP client or terminal UI.

pub mod codec;
pub mod context;
pub mod controller;
pub mod diff;
pub mod document;
pub mod error;
pub mod executor;
pub mod import;
pub mod lifecycle;
pub mod planner;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod transport;
pub mod types;
pub mod validate;

// Re-export main types at crate root
pub use codec::{DecodeError, EncodeMode, WireDocument, decode, encode, encode_update};
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, ControllerOptions, Deadline, NoProgress,
    ProgressCallback,
};
pub use controller::{Controller, Created, DeleteOutcome, Imported, ReadOutcome};
pub use diff::{Classification, DiffAction, FieldChange, ResourceDiff, classify};
pub use document::{Document, SetState, Value};
pub use error::{Error, ErrorCategory, Result, Verb};
pub use executor::{EntityReport, ExecuteReport, RecordChange, execute, refresh_all};
pub use import::IMPORT_FORMAT;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use planner::{ExecutionPlan, PlanSummary, PlannedAction, PlannedEntity};
pub use resource::{EntityRecord, ResourceIdentity};
pub use retry::RetryConfig;
pub use schema::{
    BlockSpec, ElemCheck, FieldDefault, FieldKind, FieldSpec, IdentitySpec, Presence,
    ResourceSchema, UpdateMode,
};
pub use transport::{RemoteError, RemoteErrorKind, Transport};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary};
pub use validate::{ConstraintViolation, ViolationKind, Violations, validate};
