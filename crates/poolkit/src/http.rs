//! JSON-over-HTTP transport for the directory service
//!
//! Every verb is a `POST` to the service endpoint carrying the operation
//! name in `X-Amz-Target` and a JSON body. Responses wrap the client in a
//! `UserPoolClient` member.
//!
//! Requests are not signed. Point the endpoint at a local emulator or at a
//! signing proxy.

use crate::error::{classify_response, classify_transport};
use declarative::{Deadline, RemoteError, RemoteErrorKind, ResourceIdentity, Transport, WireDocument};
use serde_json::Value as Json;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const ENVELOPE: &str = "UserPoolClient";

/// HTTP transport bound to one endpoint
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one operation, bounded by what is left of the deadline
    fn call(&self, operation: &str, body: &WireDocument, deadline: Deadline) -> Result<WireDocument, RemoteError> {
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(RemoteError::new(
                RemoteErrorKind::Timeout,
                format!("{operation} not sent, deadline passed"),
            ));
        }

        let payload = serde_json::to_string(body)
            .map_err(|e| RemoteError::new(RemoteErrorKind::InvalidInput, e.to_string()))?;
        log::trace!("POST {} {operation}", self.endpoint);

        let mut response = self
            .agent
            .post(&self.endpoint)
            .config()
            .timeout_global(Some(remaining))
            .http_status_as_error(false)
            .build()
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header("Content-Type", CONTENT_TYPE)
            .send(payload.as_str())
            .map_err(|e| classify_transport(&e))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| classify_transport(&e))?;

        if status >= 400 {
            return Err(classify_response(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(WireDocument::new());
        }

        serde_json::from_str(&text).map_err(|e| {
            RemoteError::new(
                RemoteErrorKind::Unknown,
                format!("{operation} returned malformed JSON: {e}"),
            )
        })
    }

    /// Call and unwrap the `UserPoolClient` envelope
    fn call_client(&self, operation: &str, body: &WireDocument, deadline: Deadline) -> Result<WireDocument, RemoteError> {
        let mut response = self.call(operation, body, deadline)?;
        match response.remove(ENVELOPE) {
            Some(Json::Object(client)) => Ok(client),
            _ => Err(RemoteError::new(
                RemoteErrorKind::Unknown,
                format!("{operation} response has no {ENVELOPE}"),
            )),
        }
    }
}

fn address(identity: &ResourceIdentity) -> WireDocument {
    let mut body = WireDocument::new();
    body.insert("UserPoolId".into(), Json::String(identity.parent_id.clone()));
    body.insert("ClientId".into(), Json::String(identity.resource_id.clone()));
    body
}

impl Transport for HttpTransport {
    fn create(&self, request: &WireDocument, deadline: Deadline) -> Result<WireDocument, RemoteError> {
        self.call_client("CreateUserPoolClient", request, deadline)
    }

    fn read(&self, identity: &ResourceIdentity, deadline: Deadline) -> Result<WireDocument, RemoteError> {
        self.call_client("DescribeUserPoolClient", &address(identity), deadline)
    }

    fn update(
        &self,
        identity: &ResourceIdentity,
        request: &WireDocument,
        deadline: Deadline,
    ) -> Result<WireDocument, RemoteError> {
        let mut body = request.clone();
        body.extend(address(identity));
        self.call_client("UpdateUserPoolClient", &body, deadline)
    }

    fn delete(&self, identity: &ResourceIdentity, deadline: Deadline) -> Result<(), RemoteError> {
        self.call("DeleteUserPoolClient", &address(identity), deadline)
            .map(|_| ())
    }
}
