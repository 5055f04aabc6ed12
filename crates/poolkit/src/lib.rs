//! # Poolkit
//!
//! The user-pool client resource on top of the `declarative` core.
//!
//! - [`client`]: the field table mapping configuration attributes to the
//!   directory service's wire members
//! - [`http`]: a [`declarative::Transport`] speaking the service's JSON
//!   protocol over HTTP
//! - [`memory`]: an in-process emulator of the same service, for tests
//! - [`error`]: classification of service failures

pub mod client;
pub mod error;
pub mod http;
pub mod memory;

pub use client::{SCHEMAS, TYPE_NAME, USER_POOL_CLIENT, schema_for};
pub use error::{classify_response, classify_transport, kind_for_exception};
pub use http::HttpTransport;
pub use memory::{MemoryDirectory, Operation};
