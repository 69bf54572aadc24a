//! Construction of new entity instances.

use crate::entity::{Entity, EntityId, EntityRef};
use crate::error::MappingResult;
use crate::mapping::{encode_ref, AsyncTracker, Decoded, MappingProcess, MappingTable};
use crate::payload::RawPayload;
use std::fmt;
use std::sync::Arc;

/// Builds instances of one entity type and knows how to populate them.
///
/// Passed to [`IdentityCache::get_or_create`](crate::IdentityCache::get_or_create).
pub trait EntityFactory<T: Entity>: Send + Sync {
    /// Constructs a blank instance for `id`. Rules are applied afterwards.
    fn create_instance(
        &self,
        id: &EntityId,
        raw: &RawPayload,
        params: Option<&T::Params>,
    ) -> MappingResult<T>;

    /// Returns the rule table used to populate instances.
    fn mapping(&self) -> &MappingTable<T>;
}

/// Constructor callback used by [`EntityMapper`].
pub type ConstructorFn<T> = Arc<
    dyn Fn(&EntityId, &RawPayload, Option<&<T as Entity>::Params>) -> MappingResult<T>
        + Send
        + Sync,
>;

/// A rule table paired with a constructor: the standard [`EntityFactory`].
pub struct EntityMapper<T: Entity> {
    table: MappingTable<T>,
    constructor: ConstructorFn<T>,
}

impl<T: Entity> EntityMapper<T> {
    /// Creates a mapper.
    pub fn new<C>(table: MappingTable<T>, constructor: C) -> Self
    where
        C: Fn(&EntityId, &RawPayload, Option<&T::Params>) -> MappingResult<T> + Send + Sync + 'static,
    {
        Self {
            table,
            constructor: Arc::new(constructor),
        }
    }

    /// Applies the table to an existing instance.
    pub fn decode_into(
        &self,
        entity: &EntityRef<T>,
        raw: &RawPayload,
        tracker: AsyncTracker,
    ) -> MappingResult<Decoded<T>> {
        MappingProcess::with_tracker(entity.clone(), raw, tracker).run(&self.table)
    }

    /// Produces the outbound payload for `entity`.
    pub fn encode(&self, entity: &EntityRef<T>) -> MappingResult<RawPayload> {
        encode_ref(entity, &self.table)
    }
}

impl<T: Entity> EntityFactory<T> for EntityMapper<T> {
    fn create_instance(
        &self,
        id: &EntityId,
        raw: &RawPayload,
        params: Option<&T::Params>,
    ) -> MappingResult<T> {
        (self.constructor)(id, raw, params)
    }

    fn mapping(&self) -> &MappingTable<T> {
        &self.table
    }
}

impl<T: Entity> fmt::Debug for EntityMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapper")
            .field("rules", &self.table.len())
            .finish()
    }
}
