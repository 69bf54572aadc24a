//! Identity caches (cache scopes).

use crate::entity::{Entity, EntityId, EntityRef};
use crate::error::{MappingError, MappingResult};
use crate::factory::EntityFactory;
use crate::mapping::{AsyncTracker, Decoded, MappingProcess};
use crate::payload::RawPayload;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// A named store holding at most one live instance per id.
///
/// A type's global cache is one scope; a parent entity may own further
/// scopes (a unit's student roster, a project's tasks). Cloning the cache
/// shares the scope.
///
/// # Re-entrancy
///
/// No lock is held while a factory or a rule runs, and a new instance is
/// inserted before any rule is applied. A rule may therefore call back into
/// this or any other cache, and a cyclic reference to an entity that is
/// still being decoded resolves to the same (partially populated) instance.
pub struct IdentityCache<T: Entity> {
    inner: Arc<ScopeInner<T>>,
}

struct ScopeInner<T> {
    scope_id: u64,
    name: String,
    entries: RwLock<HashMap<EntityId, EntityRef<T>>>,
}

impl<T: Entity> IdentityCache<T> {
    /// Creates an empty scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                scope_id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Returns the scope name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the process-unique id of this scope.
    pub fn scope_id(&self) -> u64 {
        self.inner.scope_id
    }

    /// Returns the cached instance for `id`.
    pub fn get(&self, id: &EntityId) -> Option<EntityRef<T>> {
        self.inner.entries.read().get(id).cloned()
    }

    /// Returns true if an instance is cached for `id`.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.entries.read().contains_key(id)
    }

    /// Registers an existing instance.
    ///
    /// Adding the instance already cached under its id is a no-op; adding
    /// a different instance under that id is a [`MappingError::CacheConflict`].
    pub fn add(&self, entity: EntityRef<T>) -> MappingResult<()> {
        let id = entity.id();
        let mut entries = self.inner.entries.write();
        match entries.entry(id) {
            Entry::Occupied(existing) if existing.get().ptr_eq(&entity) => Ok(()),
            Entry::Occupied(existing) => {
                warn!(scope = %self.inner.name, id = %existing.key(), "rejected conflicting instance");
                Err(MappingError::CacheConflict {
                    scope: self.inner.name.clone(),
                    id: existing.key().clone(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(entity);
                Ok(())
            }
        }
    }

    /// Evicts the instance cached for `id`.
    pub fn remove(&self, id: &EntityId) -> Option<EntityRef<T>> {
        let removed = self.inner.entries.write().remove(id);
        if removed.is_some() {
            debug!(scope = %self.inner.name, %id, "evicted entity");
        }
        removed
    }

    /// Evicts every instance, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.inner.entries.write();
        let count = entries.len();
        entries.clear();
        debug!(scope = %self.inner.name, count, "cleared scope");
        count
    }

    /// Returns the number of cached instances.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns true if the scope is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Returns the cached ids, sorted.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.inner.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the cached instances, sorted by id.
    pub fn entities(&self) -> Vec<EntityRef<T>> {
        let entries = self.inner.entries.read();
        let mut pairs: Vec<_> = entries.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs.into_iter().map(|(_, e)| e.clone()).collect()
    }

    /// Returns the instance for `id`, creating it with `factory` if absent,
    /// and applies `raw` to it.
    ///
    /// An existing instance is updated in place: repeated calls for one id
    /// always return the same reference.
    pub fn get_or_create<F>(
        &self,
        id: impl Into<EntityId>,
        factory: &F,
        raw: &RawPayload,
        params: Option<&T::Params>,
    ) -> MappingResult<EntityRef<T>>
    where
        F: EntityFactory<T> + ?Sized,
    {
        self.resolve(id, factory, raw, params, &AsyncTracker::new())
            .map(Decoded::into_entity)
    }

    /// Like [`get_or_create`](Self::get_or_create), but returns the decode
    /// result so callers can follow its continuations. Those are counted
    /// on a child of `tracker`.
    pub fn resolve<F>(
        &self,
        id: impl Into<EntityId>,
        factory: &F,
        raw: &RawPayload,
        params: Option<&T::Params>,
        tracker: &AsyncTracker,
    ) -> MappingResult<Decoded<T>>
    where
        F: EntityFactory<T> + ?Sized,
    {
        let id = id.into();
        let (entity, created) = self.claim(&id, factory, raw, params)?;
        debug!(
            scope = %self.inner.name,
            %id,
            created,
            "{} entity",
            if created { "decoding new" } else { "merging into" }
        );
        MappingProcess::with_tracker(entity, raw, tracker.child()).run(factory.mapping())
    }

    /// Returns the cached instance or inserts a freshly constructed one.
    fn claim<F>(
        &self,
        id: &EntityId,
        factory: &F,
        raw: &RawPayload,
        params: Option<&T::Params>,
    ) -> MappingResult<(EntityRef<T>, bool)>
    where
        F: EntityFactory<T> + ?Sized,
    {
        if let Some(existing) = self.get(id) {
            return Ok((existing, false));
        }

        // Constructed without holding the lock: factories may re-enter.
        let instance = EntityRef::new(factory.create_instance(id, raw, params)?);

        let mut entries = self.inner.entries.write();
        match entries.entry(id.clone()) {
            // Lost a race with a re-entrant or concurrent claim.
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                slot.insert(instance.clone());
                Ok((instance, true))
            }
        }
    }
}

impl<T: Entity> Clone for IdentityCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> fmt::Debug for IdentityCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("name", &self.inner.name)
            .field("scope_id", &self.inner.scope_id)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::EntityMapper;
    use crate::field;
    use crate::mapping::{MappingRule, MappingTable};
    use crate::payload::payload_from_value;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct User {
        id: i64,
        name: String,
        email: Option<String>,
    }

    impl Entity for User {
        type Params = ();

        fn entity_id(&self) -> EntityId {
            EntityId::from(self.id)
        }
    }

    fn mapper() -> EntityMapper<User> {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("id", field!(User, id)).required())
            .rule(MappingRule::rename("name", field!(User, name)))
            .rule(MappingRule::rename("email", field!(User, email)))
            .build()
            .unwrap();
        EntityMapper::new(table, |id, _, _| {
            Ok(User {
                id: id.as_num().unwrap_or_default(),
                ..User::default()
            })
        })
    }

    fn raw(value: Value) -> RawPayload {
        payload_from_value(value).unwrap()
    }

    #[test]
    fn get_or_create_merges_into_one_instance() {
        let cache = IdentityCache::new("users");
        let mapper = mapper();

        let first = cache
            .get_or_create(1, &mapper, &raw(json!({"id": 1, "name": "Ada"})), None)
            .unwrap();
        let second = cache
            .get_or_create(1, &mapper, &raw(json!({"id": 1, "email": "ada@example.com"})), None)
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.read().name, "Ada");
        assert_eq!(first.read().email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn scopes_are_independent() {
        let global = IdentityCache::new("users");
        let roster = IdentityCache::new("unit-7/students");
        let mapper = mapper();
        let payload = raw(json!({"id": 1}));

        let a = global.get_or_create(1, &mapper, &payload, None).unwrap();
        let b = roster.get_or_create(1, &mapper, &payload, None).unwrap();

        assert!(!a.ptr_eq(&b));
        assert_ne!(global.scope_id(), roster.scope_id());
    }

    #[test]
    fn clones_share_the_scope() {
        let cache = IdentityCache::new("users");
        let view = cache.clone();
        cache
            .get_or_create(5, &mapper(), &raw(json!({"id": 5})), None)
            .unwrap();
        assert!(view.contains(&EntityId::from(5)));
    }

    #[test]
    fn add_detects_conflicts() {
        let cache = IdentityCache::new("users");
        let original = EntityRef::new(User {
            id: 3,
            ..User::default()
        });
        let impostor = EntityRef::new(User {
            id: 3,
            ..User::default()
        });

        cache.add(original.clone()).unwrap();
        cache.add(original.clone()).unwrap();
        let err = cache.add(impostor).unwrap_err();

        assert!(matches!(err, MappingError::CacheConflict { scope, .. } if scope == "users"));
        assert!(cache.get(&EntityId::from(3)).unwrap().ptr_eq(&original));
    }

    #[test]
    fn eviction_is_explicit() {
        let cache = IdentityCache::new("users");
        let mapper = mapper();
        let user = cache
            .get_or_create(2, &mapper, &raw(json!({"id": 2, "name": "Bo"})), None)
            .unwrap();

        let evicted = cache.remove(&EntityId::from(2)).unwrap();
        assert!(evicted.ptr_eq(&user));
        assert!(cache.is_empty());
        assert!(cache.remove(&EntityId::from(2)).is_none());

        // A later reference builds a fresh instance.
        let again = cache
            .get_or_create(2, &mapper, &raw(json!({"id": 2})), None)
            .unwrap();
        assert!(!again.ptr_eq(&user));
        assert_eq!(cache.clear(), 1);
    }

    #[test]
    fn decode_failure_leaves_instance_cached() {
        let cache = IdentityCache::new("users");
        let result = cache.get_or_create(4, &mapper(), &raw(json!({"name": "no id"})), None);

        assert!(matches!(result, Err(MappingError::MissingKey { .. })));
        let cached = cache.get(&EntityId::from(4)).expect("inserted before rules ran");
        assert_eq!(cached.read().name, "");
    }

    #[test]
    fn listing_is_sorted() {
        let cache = IdentityCache::new("users");
        let mapper = mapper();
        for id in [3, 1, 2] {
            cache
                .get_or_create(id, &mapper, &raw(json!({"id": id})), None)
                .unwrap();
        }
        assert_eq!(
            cache.ids(),
            vec![EntityId::from(1), EntityId::from(2), EntityId::from(3)]
        );
        let ids: Vec<_> = cache.entities().iter().map(|e| e.id()).collect();
        assert_eq!(ids, cache.ids());
    }
}
