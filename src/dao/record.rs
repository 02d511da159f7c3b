//! Untyped records as stored in the tables, and the helpers shared by every engine.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::dao::storage::{StorageError, StorageResult};

/// Member of every record holding its key.
pub const KEY_FIELD: &str = "id";
/// Member holding the raw partial when `update` targets a missing record.
pub const ORPHAN_PATCH_FIELD: &str = "newItem";
/// Largest key any engine accepts.
pub const MAX_KEY: u64 = i64::MAX as u64;

/// A stored record: a JSON object whose `id` member is its key.
pub type Record = Map<String, Value>;

/// Numeric key assigned by the store when a record is first inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Wrap a raw key.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw key value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Read the key of a record, `None` when the record has not been stored yet.
pub fn record_key(table: &str, record: &Record) -> StorageResult<Option<RecordId>> {
    let Some(value) = record.get(KEY_FIELD) else {
        return Ok(None);
    };

    let invalid = |reason: String| StorageError::InvalidKey {
        table: table.to_owned(),
        reason,
    };

    match value.as_u64() {
        Some(key) if key <= MAX_KEY => Ok(Some(RecordId(key))),
        Some(key) => Err(invalid(format!("key {key} exceeds {MAX_KEY}"))),
        None => Err(invalid(format!(
            "expected a non-negative integer, got `{value}`"
        ))),
    }
}

/// Set the `id` member of a record.
pub fn with_key(mut record: Record, id: RecordId) -> Record {
    record.insert(KEY_FIELD.to_owned(), Value::from(id.get()));
    record
}

/// Shallow-merge `patch` over `existing`.
///
/// A missing record becomes `{id, newItem: patch}` with the patch kept as is.
/// The key of an existing record always stays `id`, whatever the patch
/// carries under [`KEY_FIELD`].
pub fn merge_patch(existing: Option<Record>, id: RecordId, patch: Record) -> Record {
    let Some(mut merged) = existing else {
        let mut orphan = Record::new();
        orphan.insert(ORPHAN_PATCH_FIELD.to_owned(), Value::Object(patch));
        return with_key(orphan, id);
    };

    for (field, value) in patch {
        if field != KEY_FIELD {
            merged.insert(field, value);
        }
    }
    with_key(merged, id)
}

/// Serialize a typed value into a record.
pub fn encode_record<T>(table: &str, value: &T) -> StorageResult<Record>
where
    T: ?Sized + Serialize,
{
    let encoded = serde_json::to_value(value).map_err(|source| StorageError::Encode {
        table: table.to_owned(),
        source,
    })?;

    match encoded {
        Value::Object(record) => Ok(record),
        other => Err(StorageError::Encode {
            table: table.to_owned(),
            source: serde::ser::Error::custom(format!(
                "expected a JSON object, got `{other}`"
            )),
        }),
    }
}

/// Deserialize a record into a typed value.
pub fn decode_record<T>(table: &str, record: Record) -> StorageResult<T>
where
    T: DeserializeOwned,
{
    let id = record_key(table, &record).ok().flatten();
    serde_json::from_value(Value::Object(record)).map_err(|source| StorageError::Decode {
        table: table.to_owned(),
        id,
        source,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn record_without_id_has_no_key() {
        let record = object(json!({"name": "Heist"}));
        assert_eq!(record_key("games", &record).unwrap(), None);
    }

    #[test]
    fn numeric_id_is_the_key() {
        let record = object(json!({"id": 7, "name": "Heist"}));
        assert_eq!(
            record_key("games", &record).unwrap(),
            Some(RecordId::new(7))
        );
    }

    #[test]
    fn non_integer_ids_are_rejected() {
        for id in [json!("7"), json!(-1), json!(1.5), json!(null)] {
            let record = object(json!({ "id": id }));
            let err = record_key("games", &record).unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey { .. }), "{err}");
        }
    }

    #[test]
    fn merge_overrides_only_supplied_fields() {
        let existing = object(json!({"id": 3, "name": "Heist", "description": "old"}));
        let patch = object(json!({"description": "new"}));

        let merged = merge_patch(Some(existing), RecordId::new(3), patch);

        assert_eq!(
            Value::Object(merged),
            json!({"id": 3, "name": "Heist", "description": "new"})
        );
    }

    #[test]
    fn merge_never_changes_the_key() {
        let existing = object(json!({"id": 3, "name": "Heist"}));
        let patch = object(json!({"id": 99, "name": "Caper"}));

        let merged = merge_patch(Some(existing), RecordId::new(3), patch);

        assert_eq!(Value::Object(merged), json!({"id": 3, "name": "Caper"}));
    }

    #[test]
    fn merge_on_missing_record_nests_the_raw_patch() {
        let patch = object(json!({"id": 99, "description": "orphan"}));
        let merged = merge_patch(None, RecordId::new(12), patch);
        assert_eq!(
            Value::Object(merged),
            json!({"id": 12, "newItem": {"id": 99, "description": "orphan"}})
        );
    }

    #[test]
    fn encoding_a_scalar_fails() {
        let err = encode_record("games", &42).unwrap_err();
        assert!(matches!(err, StorageError::Encode { .. }));
    }
}
