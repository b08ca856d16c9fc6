//! JSON codec helpers.
//!
//! Thin wrappers around `serde_json` for the form fields carried by the
//! remote endpoints. Both `cmds` and `on` hold a JSON array encoded as a
//! string; the literal `null` decodes to an empty list.

use serde::de::DeserializeOwned;

use crate::error::RemoteError;

/// Decode a JSON array field, treating `null` and blank input as empty.
///
/// # Errors
///
/// Returns [`RemoteError::Json`] if the field is not a JSON array of `T`.
pub fn decode_list<T: DeserializeOwned>(field: &str) -> Result<Vec<T>, RemoteError> {
    if field.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: Option<Vec<T>> = serde_json::from_str(field)?;
    Ok(list.unwrap_or_default())
}
