//! Integration tests for identity caches and graph decoding.

use entigraph_core::{
    encode_ref, field, payload_from_value, Entity, EntityFactory, EntityId, EntityMapper,
    EntityRef, IdentityCache, MappingError, MappingRule, MappingTable, PayloadExt, RawPayload,
    WeakEntityRef,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

#[derive(Default)]
struct Person {
    id: i64,
    name: String,
    friend: Option<WeakEntityRef<Person>>,
}

impl Entity for Person {
    type Params = ();

    fn entity_id(&self) -> EntityId {
        EntityId::from(self.id)
    }
}

/// A global scope plus the mapper that fills it.
struct People {
    cache: IdentityCache<Person>,
    mapper: EntityMapper<Person>,
}

fn people() -> Arc<People> {
    Arc::new_cyclic(|registry: &Weak<People>| {
        let registry = registry.clone();
        let table = MappingTable::builder()
            .rule(MappingRule::rename("id", field!(Person, id)).required())
            .rule(MappingRule::rename("name", field!(Person, name)))
            .rule(MappingRule::side_effect("friend", move |raw, person: &EntityRef<Person>| {
                let people = registry
                    .upgrade()
                    .ok_or_else(|| MappingError::rule("friend", "registry dropped"))?;
                let nested = raw.object_at("friend")?;
                let friend = people
                    .cache
                    .get_or_create(nested.id_at("id")?, &people.mapper, nested, None)?;
                person.write().friend = Some(friend.downgrade());
                Ok(())
            }))
            .round_trip(&["name"])
            .build()
            .expect("valid table");

        People {
            cache: IdentityCache::new("people"),
            mapper: EntityMapper::new(table, |id, _, _| {
                Ok(Person {
                    id: id.as_num().unwrap_or_default(),
                    ..Person::default()
                })
            }),
        }
    })
}

fn raw(value: Value) -> RawPayload {
    payload_from_value(value).unwrap()
}

fn friend_of(person: &EntityRef<Person>) -> Option<EntityRef<Person>> {
    person.read().friend.as_ref().and_then(WeakEntityRef::upgrade)
}

#[test]
fn cyclic_graph_closes_on_itself() {
    let people = people();
    let payload = raw(json!({
        "id": 1,
        "name": "Ada",
        "friend": {"id": 2, "name": "Bo", "friend": {"id": 1}}
    }));

    let ada = people
        .cache
        .get_or_create(1, &people.mapper, &payload, None)
        .unwrap();
    let bo = friend_of(&ada).expect("friend resolved");

    assert_eq!(bo.read().name, "Bo");
    assert!(friend_of(&bo).unwrap().ptr_eq(&ada));
    // The nested stub for Ada did not wipe her name.
    assert_eq!(ada.read().name, "Ada");
    assert_eq!(people.cache.len(), 2);
}

#[test]
fn shared_references_resolve_to_one_instance() {
    let people = people();
    let ada = people
        .cache
        .get_or_create(
            1,
            &people.mapper,
            &raw(json!({"id": 1, "friend": {"id": 3, "name": "Cy"}})),
            None,
        )
        .unwrap();
    let bo = people
        .cache
        .get_or_create(
            2,
            &people.mapper,
            &raw(json!({"id": 2, "friend": {"id": 3}})),
            None,
        )
        .unwrap();

    let cy_a = friend_of(&ada).unwrap();
    let cy_b = friend_of(&bo).unwrap();
    assert!(cy_a.ptr_eq(&cy_b));
    assert_eq!(cy_b.read().name, "Cy");
}

#[test]
fn encode_after_decode_round_trips() {
    let people = people();
    let ada = people
        .cache
        .get_or_create(1, &people.mapper, &raw(json!({"id": 1, "name": "Ada"})), None)
        .unwrap();

    let encoded = encode_ref(&ada, people.mapper.mapping()).unwrap();
    assert_eq!(Value::Object(encoded), json!({"name": "Ada"}));
}

#[test]
fn nested_failure_propagates() {
    let people = people();
    let result = people.cache.get_or_create(
        1,
        &people.mapper,
        &raw(json!({"id": 1, "friend": {"name": "nobody"}})),
        None,
    );
    assert!(matches!(result, Err(MappingError::MissingKey { key }) if key == "id"));
}

proptest! {
    #[test]
    fn one_instance_per_id(
        updates in prop::collection::vec((0i64..5, "[a-z]{1,8}"), 1..40)
    ) {
        let people = people();
        let mut first_seen: HashMap<i64, EntityRef<Person>> = HashMap::new();
        let mut last_name: HashMap<i64, String> = HashMap::new();

        for (id, name) in &updates {
            let person = people
                .cache
                .get_or_create(*id, &people.mapper, &raw(json!({"id": id, "name": name})), None)
                .unwrap();
            let first = first_seen.entry(*id).or_insert_with(|| person.clone());
            prop_assert!(first.ptr_eq(&person));
            last_name.insert(*id, name.clone());
        }

        prop_assert_eq!(people.cache.len(), first_seen.len());
        for (id, name) in last_name {
            let cached = people.cache.get(&EntityId::from(id)).unwrap();
            prop_assert_eq!(&cached.read().name, &name);
        }
    }
}
