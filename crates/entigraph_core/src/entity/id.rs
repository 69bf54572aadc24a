//! Entity identifier.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of an entity within its type.
///
/// Upstream services hand out either numeric or string ids. The two are
/// never considered equal: `7` and `"7"` are different ids.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id.
    Num(i64),
    /// String id.
    Str(String),
}

impl EntityId {
    /// Parses an id from a wire value.
    ///
    /// Returns `None` for anything that is not an integer or a string.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntityId::Num),
            Value::String(s) => Some(EntityId::Str(s.clone())),
            _ => None,
        }
    }

    /// Converts the id back to its wire value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Num(n) => Value::from(*n),
            EntityId::Str(s) => Value::from(s.as_str()),
        }
    }

    /// Returns the numeric id, if this is one.
    #[inline]
    #[must_use]
    pub fn as_num(&self) -> Option<i64> {
        match self {
            EntityId::Num(n) => Some(*n),
            EntityId::Str(_) => None,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "EntityId({n})"),
            EntityId::Str(s) => write!(f, "EntityId({s:?})"),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "{n}"),
            EntityId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Num(id)
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        EntityId::Num(i64::from(id))
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Str(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Str(id)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        id.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_from_wire_values() {
        assert_eq!(EntityId::from_value(&json!(42)), Some(EntityId::Num(42)));
        assert_eq!(
            EntityId::from_value(&json!("abc")),
            Some(EntityId::Str("abc".into()))
        );
        assert_eq!(EntityId::from_value(&json!(1.5)), None);
        assert_eq!(EntityId::from_value(&json!(null)), None);
        assert_eq!(EntityId::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn numeric_and_string_ids_differ() {
        assert_ne!(EntityId::from(7), EntityId::from("7"));
    }

    #[test]
    fn display_renders_bare_value() {
        assert_eq!(EntityId::from(7).to_string(), "7");
        assert_eq!(EntityId::from("u-1").to_string(), "u-1");
        assert_eq!(format!("{:?}", EntityId::from(7)), "EntityId(7)");
    }

    #[test]
    fn value_round_trip() {
        for id in [EntityId::from(3), EntityId::from("x")] {
            assert_eq!(EntityId::from_value(&id.to_value()), Some(id));
        }
    }
}
