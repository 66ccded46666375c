mod adaptors;
mod config_store;


pub use adaptors::*;
pub use config_store::*;
use serde::Deserialize;
use serde::Serialize;

use crate::BackendKey;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::Ownership;
use crate::StorageError;

/// Persisted form of one instance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub backend_key: BackendKey,
    pub ownership: Ownership,
    pub fields: FieldValues,
}

/// The object's own part of a backend key: its backend-key parameter
/// values, or the local index when it declares none.
pub(crate) fn own_backend_parts(
    object: &ObjectDescriptor,
    key: &InstanceKey,
    fields: &FieldValues,
) -> Vec<String> {
    if object.backend_key_params.is_empty() {
        return key.components().last().map(|i| vec![i.to_string()]).unwrap_or_default();
    }
    object
        .backend_key_params
        .iter()
        .map(|p| {
            if let Some(v) = fields.get(p) {
                return v.clone();
            }
            object
                .index_position(p)
                .and_then(|pos| key.components().get(pos))
                .map(|i| i.to_string())
                .unwrap_or_default()
        })
        .collect()
}

/// Picks the index following the largest one already used under `parent_key`.
pub(crate) fn next_index<'a>(
    object: &ObjectDescriptor,
    parent_key: &InstanceKey,
    existing: impl Iterator<Item = &'a InstanceKey>,
) -> Result<u32, StorageError> {
    let largest = existing
        .filter(|k| k.len() == parent_key.len() + 1 && k.starts_with(parent_key))
        .filter_map(|k| k.components().last().copied())
        .max();
    match largest {
        None => Ok(1),
        Some(m) => m.checked_add(1).ok_or_else(|| StorageError::IndexExhausted {
            object: object.name.clone(),
            parent: parent_key.to_string(),
        }),
    }
}

/// Rejects explicit keys that do not address one instance of `object`.
pub(crate) fn check_key_shape(
    object: &ObjectDescriptor,
    key: &InstanceKey,
) -> Result<(), StorageError> {
    if key.len() != object.key_shape() {
        return Err(StorageError::KeyShape {
            object: object.name.clone(),
            expected: object.key_shape(),
            key: key.to_string(),
        });
    }
    Ok(())
}
