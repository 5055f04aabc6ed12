//! In-memory directory service
//!
//! Behaves like the remote API closely enough to drive the controller in
//! tests, here and in crates built on poolkit: assigns client ids and
//! secrets, fills in computed
//! members, drops unreported and empty members, and overwrites the whole
//! client on update. Failures can be scripted per operation, and newly
//! created clients can be made invisible to the first few reads.

use declarative::{Deadline, RemoteError, RemoteErrorKind, ResourceIdentity, Transport, WireDocument};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Operation of the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    Create,
    Describe,
    Update,
    Delete,
}

/// Members the service never reports back
const UNREPORTED: &[&str] = &["GenerateSecret"];

/// Members an update cannot change
const IMMUTABLE: &[&str] = &["ClientId", "UserPoolId", "ClientSecret"];

#[derive(Debug, Default)]
struct Inner {
    pools: BTreeSet<String>,
    /// Keyed by (pool id, client id)
    clients: BTreeMap<(String, String), WireDocument>,
    /// Remaining reads that report a new client as missing
    hidden: BTreeMap<String, u32>,
    faults: BTreeMap<Operation, VecDeque<RemoteError>>,
    calls: Vec<Operation>,
    next_id: u64,
    read_lag: u32,
}

/// Emulated directory holding user pools and their clients
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    inner: Mutex<Inner>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory with the given pools already present
    pub fn with_pools<I, S>(pools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let directory = Self::new();
        for pool in pools {
            directory.add_pool(pool);
        }
        directory
    }

    pub fn add_pool(&self, pool: impl Into<String>) {
        self.lock().pools.insert(pool.into());
    }

    /// Make each new client report missing for its first `reads` reads
    pub fn set_read_lag(&self, reads: u32) {
        self.lock().read_lag = reads;
    }

    /// Fail the next call of `operation` with `error`
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.lock().faults.entry(operation).or_default().push_back(error);
    }

    /// Operations received so far, in order
    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.lock().calls.iter().filter(|c| **c == operation).count()
    }

    /// Stored client, as the service would describe it
    pub fn client(&self, pool: &str, client_id: &str) -> Option<WireDocument> {
        self.lock()
            .clients
            .get(&(pool.to_string(), client_id.to_string()))
            .cloned()
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.lock().clients.keys().map(|(_, id)| id.clone()).collect()
    }

    /// Change a stored client behind the controller's back
    pub fn tamper(&self, pool: &str, client_id: &str, member: &str, value: Json) {
        if let Some(client) = self
            .lock()
            .clients
            .get_mut(&(pool.to_string(), client_id.to_string()))
        {
            client.insert(member.to_string(), value);
        }
    }

    /// Remove a client behind the controller's back
    pub fn remove(&self, pool: &str, client_id: &str) {
        self.lock()
            .clients
            .remove(&(pool.to_string(), client_id.to_string()));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and pop a scripted failure, if any
    fn enter(inner: &mut Inner, operation: Operation) -> Result<(), RemoteError> {
        inner.calls.push(operation);
        match inner.faults.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

fn not_found(what: &str) -> RemoteError {
    RemoteError::not_found(format!("ResourceNotFoundException: {what} does not exist"))
}

fn invalid(message: &str) -> RemoteError {
    RemoteError::new(
        RemoteErrorKind::InvalidInput,
        format!("InvalidParameterException: {message}"),
    )
}

fn string_member<'a>(doc: &'a WireDocument, member: &str) -> Option<&'a str> {
    doc.get(member).and_then(Json::as_str)
}

/// Apply the service's normalization to a stored configuration
fn normalize(config: &mut WireDocument) {
    for member in UNREPORTED {
        config.remove(*member);
    }
    config.retain(|_, value| match value {
        Json::Null => false,
        Json::Array(items) => !items.is_empty(),
        _ => true,
    });
    config
        .entry("RefreshTokenValidity")
        .or_insert_with(|| Json::from(30));
    config
        .entry("PreventUserExistenceErrors")
        .or_insert_with(|| Json::String("LEGACY".into()));
    config
        .entry("AllowedOAuthFlowsUserPoolClient")
        .or_insert(Json::Bool(false));

    let pool = string_member(config, "UserPoolId").unwrap_or_default().to_string();
    if let Some(Json::Object(analytics)) = config.get_mut("AnalyticsConfiguration") {
        analytics.entry("UserDataShared").or_insert(Json::Bool(false));
        if analytics.contains_key("ApplicationId") && !analytics.contains_key("RoleArn") {
            analytics.insert(
                "RoleArn".into(),
                Json::String(format!("arn:aws:iam::123456789012:role/{pool}-analytics")),
            );
        }
    }
}

impl Transport for MemoryDirectory {
    fn create(&self, request: &WireDocument, _deadline: Deadline) -> Result<WireDocument, RemoteError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, Operation::Create)?;

        let pool = string_member(request, "UserPoolId")
            .ok_or_else(|| invalid("UserPoolId is required"))?
            .to_string();
        if string_member(request, "ClientName").is_none_or(str::is_empty) {
            return Err(invalid("ClientName is required"));
        }
        if !inner.pools.contains(&pool) {
            return Err(not_found(&format!("user pool {pool}")));
        }

        inner.next_id += 1;
        let id = format!("c-{}", inner.next_id);

        let mut client = request.clone();
        if request.get("GenerateSecret").and_then(Json::as_bool) == Some(true) {
            client.insert(
                "ClientSecret".into(),
                Json::String(format!("sek-{}", inner.next_id)),
            );
        }
        client.insert("ClientId".into(), Json::String(id.clone()));
        normalize(&mut client);

        let lag = inner.read_lag;
        if lag > 0 {
            inner.hidden.insert(id.clone(), lag);
        }
        inner.clients.insert((pool, id), client.clone());
        Ok(client)
    }

    fn read(&self, identity: &ResourceIdentity, _deadline: Deadline) -> Result<WireDocument, RemoteError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, Operation::Describe)?;

        if let Some(left) = inner.hidden.get_mut(&identity.resource_id) {
            *left -= 1;
            if *left == 0 {
                inner.hidden.remove(&identity.resource_id);
            }
            return Err(not_found(&format!("client {}", identity.resource_id)));
        }

        inner
            .clients
            .get(&(identity.parent_id.clone(), identity.resource_id.clone()))
            .cloned()
            .ok_or_else(|| not_found(&format!("client {}", identity.resource_id)))
    }

    fn update(
        &self,
        identity: &ResourceIdentity,
        request: &WireDocument,
        _deadline: Deadline,
    ) -> Result<WireDocument, RemoteError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, Operation::Update)?;

        let key = (identity.parent_id.clone(), identity.resource_id.clone());
        let current = inner
            .clients
            .get(&key)
            .ok_or_else(|| not_found(&format!("client {}", identity.resource_id)))?;

        // The update replaces the whole configuration.
        let mut client = request.clone();
        for member in IMMUTABLE {
            match current.get(*member) {
                Some(value) => client.insert((*member).to_string(), value.clone()),
                None => client.remove(*member),
            };
        }
        normalize(&mut client);

        inner.clients.insert(key, client.clone());
        Ok(client)
    }

    fn delete(&self, identity: &ResourceIdentity, _deadline: Deadline) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        Self::enter(&mut inner, Operation::Delete)?;

        inner
            .clients
            .remove(&(identity.parent_id.clone(), identity.resource_id.clone()))
            .map(|_| ())
            .ok_or_else(|| not_found(&format!("client {}", identity.resource_id)))
    }
}
