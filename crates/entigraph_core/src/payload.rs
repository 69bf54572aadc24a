//! Wire payload helpers.
//!
//! A [`RawPayload`] is a flat JSON object keyed in wire naming
//! (`snake_case`). Entity keys use `camelCase`; [`to_wire_key`] is the
//! default translation between the two.

use crate::entity::EntityId;
use crate::error::{MappingError, MappingResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// An untyped wire record.
pub type RawPayload = Map<String, Value>;

/// Converts an entity key to its default wire key (`targetGrade` → `target_grade`).
pub fn to_wire_key(entity_key: &str) -> String {
    let mut wire = String::with_capacity(entity_key.len() + 4);
    for (i, ch) in entity_key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                wire.push('_');
            }
            wire.push(ch.to_ascii_lowercase());
        } else {
            wire.push(ch);
        }
    }
    wire
}

/// Builds the id-only payload used to construct a stub.
pub fn stub_payload(id: &EntityId) -> RawPayload {
    let mut payload = Map::new();
    payload.insert("id".into(), id.to_value());
    payload
}

/// Interprets a JSON value as a payload object.
pub fn payload_from_value(value: Value) -> MappingResult<RawPayload> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MappingError::invalid(
            "<payload>",
            format!("expected an object, found {}", kind_of(&other)),
        )),
    }
}

/// Deserializes a wire value into a typed field value.
pub fn decode_value<F: DeserializeOwned>(key: &str, value: &Value) -> MappingResult<F> {
    F::deserialize(value).map_err(|e| MappingError::invalid(key, e.to_string()))
}

/// Convenience accessors on [`RawPayload`].
pub trait PayloadExt {
    /// Returns the value under `key`, failing if it is absent.
    fn require(&self, key: &str) -> MappingResult<&Value>;

    /// Parses the id stored under `key`.
    fn id_at(&self, key: &str) -> MappingResult<EntityId>;

    /// Returns the object stored under `key`.
    fn object_at(&self, key: &str) -> MappingResult<&RawPayload>;

    /// Returns the array stored under `key`.
    fn array_at(&self, key: &str) -> MappingResult<&Vec<Value>>;

    /// Returns true if at least one of `keys` is present.
    fn has_any<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> bool;
}

impl PayloadExt for RawPayload {
    fn require(&self, key: &str) -> MappingResult<&Value> {
        self.get(key).ok_or_else(|| MappingError::missing(key))
    }

    fn id_at(&self, key: &str) -> MappingResult<EntityId> {
        let value = self.require(key)?;
        EntityId::from_value(value).ok_or_else(|| {
            MappingError::invalid(key, format!("expected an id, found {}", kind_of(value)))
        })
    }

    fn object_at(&self, key: &str) -> MappingResult<&RawPayload> {
        match self.require(key)? {
            Value::Object(map) => Ok(map),
            other => Err(MappingError::invalid(
                key,
                format!("expected an object, found {}", kind_of(other)),
            )),
        }
    }

    fn array_at(&self, key: &str) -> MappingResult<&Vec<Value>> {
        match self.require(key)? {
            Value::Array(items) => Ok(items),
            other => Err(MappingError::invalid(
                key,
                format!("expected an array, found {}", kind_of(other)),
            )),
        }
    }

    fn has_any<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        keys.into_iter().any(|key| self.contains_key(key))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
