//! Outbound payload encoding: the inverse of a rule table.

use crate::entity::{Entity, EntityRef};
use crate::error::{MappingError, MappingResult};
use crate::mapping::table::MappingTable;
use crate::payload::RawPayload;

/// Produces the outbound payload for `entity`.
///
/// Only round-trippable keys are emitted, each under its rule's wire key.
/// A field that encodes to `null` is omitted, so an absent wire key and an
/// unset field round-trip to each other.
pub fn encode<T: Entity>(entity: &T, table: &MappingTable<T>) -> MappingResult<RawPayload> {
    let mut payload = RawPayload::new();
    for key in table.round_trip_keys() {
        let rule = table
            .rule(key)
            .ok_or_else(|| MappingError::Table(format!("round-trip key `{key}` has no rule")))?;
        let encoder = rule
            .encoder()
            .ok_or_else(|| MappingError::Table(format!("round-trip key `{key}` has no encoder")))?;

        let value = encoder(entity)?;
        if !value.is_null() {
            payload.insert(rule.wire_key_name().to_string(), value);
        }
    }
    Ok(payload)
}

/// Encodes a shared entity under a read lock.
pub fn encode_ref<T: Entity>(
    entity: &EntityRef<T>,
    table: &MappingTable<T>,
) -> MappingResult<RawPayload> {
    encode(&*entity.read(), table)
}
