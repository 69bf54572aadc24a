//! Ordered rule tables.

use crate::entity::Entity;
use crate::error::{MappingError, MappingResult};
use crate::mapping::rule::MappingRule;
use std::collections::HashSet;
use std::fmt;

/// The ordered set of rules for one entity type.
///
/// Built once per type at configuration time. Rule order is significant:
/// a rule may read fields populated by rules declared before it.
pub struct MappingTable<T: Entity> {
    rules: Vec<MappingRule<T>>,
    round_trip: Vec<&'static str>,
}

impl<T: Entity> MappingTable<T> {
    /// Starts building a table.
    pub fn builder() -> MappingTableBuilder<T> {
        MappingTableBuilder {
            rules: Vec::new(),
            round_trip: Vec::new(),
        }
    }

    /// Returns the rules in declared order.
    pub fn rules(&self) -> &[MappingRule<T>] {
        &self.rules
    }

    /// Looks up a rule by entity key.
    pub fn rule(&self, entity_key: &str) -> Option<&MappingRule<T>> {
        self.rules.iter().find(|r| r.entity_key() == entity_key)
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the round-trippable entity keys, in declared order.
    pub fn round_trip_keys(&self) -> &[&'static str] {
        &self.round_trip
    }

    /// Returns true if `entity_key` participates in outbound payloads.
    pub fn is_round_trip(&self, entity_key: &str) -> bool {
        self.round_trip.iter().any(|k| *k == entity_key)
    }
}

impl<T: Entity> fmt::Debug for MappingTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingTable")
            .field("rules", &self.rules)
            .field("round_trip", &self.round_trip)
            .finish()
    }
}

/// Builder for [`MappingTable`].
pub struct MappingTableBuilder<T: Entity> {
    rules: Vec<MappingRule<T>>,
    round_trip: Vec<&'static str>,
}

impl<T: Entity> MappingTableBuilder<T> {
    /// Appends a rule.
    pub fn rule(mut self, rule: MappingRule<T>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Marks entity keys as round-trippable.
    pub fn round_trip(mut self, keys: &[&'static str]) -> Self {
        self.round_trip.extend_from_slice(keys);
        self
    }

    /// Validates and builds the table.
    ///
    /// Fails if an entity key is declared twice, or if a round-trippable
    /// key has no rule or no encoder.
    pub fn build(self) -> MappingResult<MappingTable<T>> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.entity_key()) {
                return Err(MappingError::Table(format!(
                    "entity key `{}` is declared twice",
                    rule.entity_key()
                )));
            }
        }

        let mut marked = HashSet::new();
        for key in &self.round_trip {
            if !marked.insert(*key) {
                return Err(MappingError::Table(format!(
                    "round-trip key `{key}` is listed twice"
                )));
            }
            let rule = self
                .rules
                .iter()
                .find(|r| r.entity_key() == *key)
                .ok_or_else(|| {
                    MappingError::Table(format!("round-trip key `{key}` has no rule"))
                })?;
            if rule.encoder().is_none() {
                return Err(MappingError::Table(format!(
                    "round-trip key `{key}` has no encoder"
                )));
            }
        }

        Ok(MappingTable {
            rules: self.rules,
            round_trip: self.round_trip,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::field;

    #[derive(Default)]
    struct Unit {
        id: i64,
        code: String,
        name: String,
    }

    impl Entity for Unit {
        type Params = ();

        fn entity_id(&self) -> EntityId {
            EntityId::from(self.id)
        }
    }

    #[test]
    fn rules_keep_declared_order() {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("id", field!(Unit, id)))
            .rule(MappingRule::rename("code", field!(Unit, code)))
            .rule(MappingRule::rename("name", field!(Unit, name)))
            .round_trip(&["code", "name"])
            .build()
            .unwrap();

        let keys: Vec<_> = table.rules().iter().map(|r| r.entity_key()).collect();
        assert_eq!(keys, ["id", "code", "name"]);
        assert_eq!(table.len(), 3);
        assert!(table.is_round_trip("code"));
        assert!(!table.is_round_trip("id"));
        assert!(table.rule("name").is_some());
        assert!(table.rule("missing").is_none());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let result = MappingTable::builder()
            .rule(MappingRule::rename("code", field!(Unit, code)))
            .rule(MappingRule::rename("code", field!(Unit, name)))
            .build();
        assert!(matches!(result, Err(MappingError::Table(_))));
    }

    #[test]
    fn round_trip_requires_a_rule() {
        let result = MappingTable::<Unit>::builder()
            .rule(MappingRule::rename("id", field!(Unit, id)))
            .round_trip(&["name"])
            .build();
        assert!(matches!(result, Err(MappingError::Table(msg)) if msg.contains("no rule")));
    }

    #[test]
    fn round_trip_requires_an_encoder() {
        let result = MappingTable::builder()
            .rule(MappingRule::decode("name", field!(Unit, name), |_, _| {
                Ok(String::from("derived"))
            }))
            .round_trip(&["name"])
            .build();
        assert!(matches!(result, Err(MappingError::Table(msg)) if msg.contains("no encoder")));
    }

    #[test]
    fn empty_table() {
        let table = MappingTable::<Unit>::builder().build().unwrap();
        assert!(table.is_empty());
        assert!(table.round_trip_keys().is_empty());
    }
}
