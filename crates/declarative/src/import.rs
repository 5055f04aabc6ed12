//! Import resolver: external identifier to internal identity

use crate::error::{Error, Result};
use crate::resource::ResourceIdentity;

/// Shape of an import identifier, shown in format errors
pub const IMPORT_FORMAT: &str = "<parent-id>/<resource-id>";

const SEPARATOR: char = '/';

/// Shortest identifier that can hold two non-empty parts and a separator
const MIN_LENGTH: usize = 3;

/// Parse `"<parent-id>/<resource-id>"` into an identity
///
/// Exactly one separator, both parts non-empty. Nothing is trimmed.
pub fn parse(identifier: &str) -> Result<ResourceIdentity> {
    let malformed = || Error::Format {
        identifier: identifier.to_string(),
        expected: IMPORT_FORMAT,
    };

    if identifier.len() < MIN_LENGTH {
        return Err(malformed());
    }

    let (parent, rest) = identifier.split_once(SEPARATOR).ok_or_else(malformed)?;
    if parent.is_empty() || rest.is_empty() || rest.contains(SEPARATOR) {
        return Err(malformed());
    }

    Ok(ResourceIdentity::new(parent, rest))
}
