//! Classification of directory service failures
//!
//! The service answers failures with a JSON body whose `__type` member
//! names the exception, optionally prefixed with a namespace and `#`.
//! Each exception maps to one [`RemoteErrorKind`]; the message is kept for
//! display only.

use declarative::{RemoteError, RemoteErrorKind};
use serde_json::Value as Json;

/// Map an exception name to an error kind
pub fn kind_for_exception(name: &str) -> RemoteErrorKind {
    let name = name.rsplit('#').next().unwrap_or(name);
    match name {
        "ResourceNotFoundException" => RemoteErrorKind::NotFound,
        "TooManyRequestsException" | "ThrottlingException" => RemoteErrorKind::Throttled,
        "InvalidParameterException"
        | "InvalidOAuthFlowException"
        | "ScopeDoesNotExistException"
        | "LimitExceededException"
        | "ValidationException"
        | "SerializationException" => RemoteErrorKind::InvalidInput,
        "NotAuthorizedException"
        | "AccessDeniedException"
        | "UnrecognizedClientException"
        | "InvalidSignatureException"
        | "ExpiredTokenException" => RemoteErrorKind::Unauthorized,
        "InternalErrorException" | "InternalFailure" | "ServiceUnavailable" => {
            RemoteErrorKind::Unavailable
        }
        _ => RemoteErrorKind::Unknown,
    }
}

/// Fallback when the body names no exception
fn kind_for_status(status: u16) -> RemoteErrorKind {
    match status {
        404 => RemoteErrorKind::NotFound,
        429 => RemoteErrorKind::Throttled,
        400 => RemoteErrorKind::InvalidInput,
        401 | 403 => RemoteErrorKind::Unauthorized,
        408 => RemoteErrorKind::Timeout,
        500..=599 => RemoteErrorKind::Unavailable,
        _ => RemoteErrorKind::Unknown,
    }
}

/// Classify an error response from its status and body
pub fn classify_response(status: u16, body: &str) -> RemoteError {
    let parsed: Option<Json> = serde_json::from_str(body).ok();
    let member = |names: &[&str]| {
        parsed.as_ref().and_then(|json| {
            names
                .iter()
                .find_map(|name| json.get(*name).and_then(Json::as_str))
                .map(str::to_string)
        })
    };

    let exception = member(&["__type", "code"]);
    let message = member(&["message", "Message"]).unwrap_or_else(|| format!("HTTP {status}"));

    match exception {
        Some(exception) => {
            let kind = match kind_for_exception(&exception) {
                RemoteErrorKind::Unknown => kind_for_status(status),
                kind => kind,
            };
            let short = exception.rsplit('#').next().unwrap_or(&exception).to_string();
            RemoteError::new(kind, format!("{short}: {message}"))
        }
        None => RemoteError::new(kind_for_status(status), message),
    }
}

/// Classify a failure of the HTTP client itself
pub fn classify_transport(err: &ureq::Error) -> RemoteError {
    let kind = match err {
        ureq::Error::Timeout(_) => RemoteErrorKind::Timeout,
        ureq::Error::StatusCode(code) => kind_for_status(*code),
        ureq::Error::Io(_) | ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            RemoteErrorKind::Unavailable
        }
        _ => RemoteErrorKind::Unknown,
    };
    RemoteError::new(kind, err.to_string())
}
