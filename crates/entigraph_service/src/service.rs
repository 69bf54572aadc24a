//! The entity service façade.
//!
//! An [`EntityService`] owns one resource: it issues transport reads,
//! decodes the results into its cache scopes and hands back shared
//! [`EntityRef`] handles.
//!
//! ```text
//! get ──(cached?)──▶ handle
//!  │
//!  ╰──▶ fetch ──▶ Transport::read ──▶ IdentityCache::resolve ──▶ handle
//!                        ▲                      │
//!           (shared while in flight)            ╰── continuations ──▶ service tracker
//! ```
//!
//! Returned futures resolve once the synchronous rules have run. Async
//! rules keep refining the entity afterwards; [`EntityService::settle`]
//! waits for them.

use crate::config::{RequestOptions, ServiceConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::filter::Filter;
use crate::transport::Transport;
use entigraph_core::{
    AsyncTracker, Entity, EntityFactory, EntityId, EntityMapper, EntityRef, IdentityCache,
    MappingError, MappingResult, MappingTable, PayloadExt, RawPayload,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The id or instance a service call is about.
pub enum Target<T: Entity> {
    /// An id to look up.
    Id(EntityId),
    /// An instance the caller already holds.
    Entity(EntityRef<T>),
}

impl<T: Entity> Target<T> {
    /// Returns the targeted id.
    pub fn id(&self) -> EntityId {
        match self {
            Target::Id(id) => id.clone(),
            Target::Entity(entity) => entity.id(),
        }
    }
}

impl<T: Entity> From<EntityId> for Target<T> {
    fn from(id: EntityId) -> Self {
        Target::Id(id)
    }
}

impl<T: Entity> From<&EntityId> for Target<T> {
    fn from(id: &EntityId) -> Self {
        Target::Id(id.clone())
    }
}

impl<T: Entity> From<i64> for Target<T> {
    fn from(id: i64) -> Self {
        Target::Id(id.into())
    }
}

impl<T: Entity> From<i32> for Target<T> {
    fn from(id: i32) -> Self {
        Target::Id(id.into())
    }
}

impl<T: Entity> From<&str> for Target<T> {
    fn from(id: &str) -> Self {
        Target::Id(id.into())
    }
}

impl<T: Entity> From<EntityRef<T>> for Target<T> {
    fn from(entity: EntityRef<T>) -> Self {
        Target::Entity(entity)
    }
}

impl<T: Entity> From<&EntityRef<T>> for Target<T> {
    fn from(entity: &EntityRef<T>) -> Self {
        Target::Entity(entity.clone())
    }
}

type SharedRead<T> = Shared<BoxFuture<'static, ServiceResult<EntityRef<T>>>>;

/// (scope id, resource, id) of one in-flight read.
type ReadKey = (u64, String, EntityId);

/// (scope id, resource, filter) of one collection snapshot.
type SnapshotKey = (u64, String, String);

/// Read/decode/write façade for one entity type.
///
/// Cloning is cheap and shares caches, snapshots and in-flight reads.
pub struct EntityService<T: Entity> {
    inner: Arc<ServiceInner<T>>,
}

struct ServiceInner<T: Entity> {
    config: ServiceConfig,
    transport: Arc<dyn Transport>,
    mapper: EntityMapper<T>,
    cache: IdentityCache<T>,
    tracker: AsyncTracker,
    in_flight: Mutex<HashMap<ReadKey, SharedRead<T>>>,
    snapshots: Mutex<HashMap<SnapshotKey, Vec<EntityRef<T>>>>,
}

impl<T: Entity> EntityService<T> {
    /// Creates a service over `transport`, decoding with `mapper`.
    pub fn new(config: ServiceConfig, transport: Arc<dyn Transport>, mapper: EntityMapper<T>) -> Self {
        let cache = IdentityCache::new(config.scope_name.clone());
        Self {
            inner: Arc::new(ServiceInner {
                config,
                transport,
                mapper,
                cache,
                tracker: AsyncTracker::new(),
                in_flight: Mutex::new(HashMap::new()),
                snapshots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Returns the global cache scope.
    pub fn cache(&self) -> &IdentityCache<T> {
        &self.inner.cache
    }

    /// Returns the mapper.
    pub fn mapper(&self) -> &EntityMapper<T> {
        &self.inner.mapper
    }

    /// Returns the tracker counting this service's continuations.
    pub fn tracker(&self) -> &AsyncTracker {
        &self.inner.tracker
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Returns the cached instance without a network read.
    pub fn cached(&self, id: &EntityId, options: &RequestOptions<T>) -> Option<EntityRef<T>> {
        self.inner.scope(options).get(id)
    }

    /// Returns the id-only stub for `id` in the target scope, creating it
    /// if absent. Never reads the network.
    pub fn stub(&self, id: impl Into<EntityId>, options: &RequestOptions<T>) -> MappingResult<EntityRef<T>> {
        let id = id.into();
        self.inner.scope(options).get_or_create(
            id.clone(),
            &self.inner.mapper,
            &entigraph_core::stub_payload(&id),
            options.params.as_ref(),
        )
    }

    /// Decodes an already-fetched payload into the target scope.
    pub fn decode(&self, raw: &RawPayload, options: &RequestOptions<T>) -> ServiceResult<EntityRef<T>> {
        self.inner.decode(&self.inner.scope(options), raw, options)
    }

    /// Returns the cached instance if present in the target scope,
    /// otherwise behaves like [`fetch`](Self::fetch).
    pub async fn get(
        &self,
        target: impl Into<Target<T>>,
        options: RequestOptions<T>,
    ) -> ServiceResult<EntityRef<T>> {
        let target = target.into();
        if let Some(cached) = self.cached(&target.id(), &options) {
            debug!(resource = %self.inner.resource(&options), id = %target.id(), "cache hit");
            return Ok(cached);
        }
        self.fetch(target, options).await
    }

    /// Reads the record and merges it into the cached instance, creating
    /// one if needed. Never substitutes a new instance for a cached one.
    pub async fn fetch(
        &self,
        target: impl Into<Target<T>>,
        options: RequestOptions<T>,
    ) -> ServiceResult<EntityRef<T>> {
        let target = target.into();
        let id = target.id();
        let scope = self.inner.scope(&options);

        if let Target::Entity(entity) = &target {
            if !scope.contains(&id) {
                scope.add(entity.clone())?;
            }
        }

        if !self.inner.config.dedupe_in_flight {
            return ServiceInner::read_and_decode(self.inner.clone(), scope, id, options).await;
        }

        let key: ReadKey = (scope.scope_id(), self.inner.resource(&options).to_string(), id.clone());
        let read = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&key) {
                Some(read) => {
                    debug!(resource = %key.1, %id, "joining in-flight read");
                    read.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let release = key.clone();
                    let read = async move {
                        let result =
                            ServiceInner::read_and_decode(inner.clone(), scope, id, options).await;
                        inner.in_flight.lock().remove(&release);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, read.clone());
                    read
                }
            }
        };
        read.await
    }

    /// Returns the last collection read with this filter, if snapshots are
    /// enabled; otherwise behaves like [`fetch_all`](Self::fetch_all).
    pub async fn query(
        &self,
        filter: &Filter,
        options: RequestOptions<T>,
    ) -> ServiceResult<Vec<EntityRef<T>>> {
        if self.inner.config.reuse_query_snapshots {
            let key = self.inner.snapshot_key(filter, &options);
            if let Some(snapshot) = self.inner.snapshots.lock().get(&key) {
                debug!(resource = %key.1, filter = %key.2, "reusing query snapshot");
                return Ok(snapshot.clone());
            }
        }
        self.fetch_all(filter, options).await
    }

    /// Reads a collection and decodes every element into the target scope.
    pub async fn fetch_all(
        &self,
        filter: &Filter,
        options: RequestOptions<T>,
    ) -> ServiceResult<Vec<EntityRef<T>>> {
        let resource = self.inner.resource(&options).to_string();
        debug!(%resource, %filter, "transport list");
        let records = self.inner.transport.list(&resource, filter).await?;

        let scope = self.inner.scope(&options);
        let entities = records
            .iter()
            .map(|raw| self.inner.decode(&scope, raw, &options))
            .collect::<ServiceResult<Vec<_>>>()?;

        self.inner
            .snapshots
            .lock()
            .insert(self.inner.snapshot_key(filter, &options), entities.clone());
        Ok(entities)
    }

    /// Writes the round-trippable fields of `entity` and merges the
    /// upstream's response into the same instance.
    pub async fn update(
        &self,
        entity: &EntityRef<T>,
        options: RequestOptions<T>,
    ) -> ServiceResult<EntityRef<T>> {
        let id = entity.id();
        let resource = self.inner.resource(&options).to_string();
        let payload = self.inner.mapper.encode(entity)?;

        debug!(%resource, %id, keys = payload.len(), "transport write");
        let response = self.inner.transport.write(&resource, &id, &payload).await?;

        self.inner
            .mapper
            .decode_into(entity, &response, self.inner.tracker.child())?;
        Ok(entity.clone())
    }

    /// Removes the instance for `id` from the target scope.
    pub fn evict(&self, id: &EntityId, options: &RequestOptions<T>) -> Option<EntityRef<T>> {
        self.inner.scope(options).remove(id)
    }

    /// Forgets every query snapshot.
    pub fn clear_snapshots(&self) {
        self.inner.snapshots.lock().clear();
    }

    /// Waits until every continuation spawned by this service's decodes
    /// has finished, then drains their failures.
    pub async fn settle(&self) -> Vec<MappingError> {
        self.inner.tracker.settled().await;
        self.inner.tracker.take_failures()
    }
}

impl<T: Entity> ServiceInner<T> {
    fn scope(&self, options: &RequestOptions<T>) -> IdentityCache<T> {
        options.cache.clone().unwrap_or_else(|| self.cache.clone())
    }

    fn resource<'a>(&'a self, options: &'a RequestOptions<T>) -> &'a str {
        options.endpoint.as_deref().unwrap_or(&self.config.resource)
    }

    fn snapshot_key(&self, filter: &Filter, options: &RequestOptions<T>) -> SnapshotKey {
        (
            self.scope(options).scope_id(),
            self.resource(options).to_string(),
            filter.to_query_string(),
        )
    }

    fn decode(
        &self,
        scope: &IdentityCache<T>,
        raw: &RawPayload,
        options: &RequestOptions<T>,
    ) -> ServiceResult<EntityRef<T>> {
        let id = raw.id_at("id")?;
        let decoded = scope.resolve(id, &self.mapper, raw, options.params.as_ref(), &self.tracker)?;
        Ok(decoded.into_entity())
    }

    async fn read_and_decode(
        inner: Arc<Self>,
        scope: IdentityCache<T>,
        id: EntityId,
        options: RequestOptions<T>,
    ) -> ServiceResult<EntityRef<T>> {
        let resource = inner.resource(&options).to_string();
        debug!(%resource, %id, scope = scope.name(), "transport read");
        let raw = inner.transport.read(&resource, &id).await?;

        let decoded = scope.resolve(id, &inner.mapper, &raw, options.params.as_ref(), &inner.tracker)?;
        Ok(decoded.into_entity())
    }
}

impl<T: Entity> EntityFactory<T> for EntityService<T> {
    fn create_instance(
        &self,
        id: &EntityId,
        raw: &RawPayload,
        params: Option<&T::Params>,
    ) -> MappingResult<T> {
        self.inner.mapper.create_instance(id, raw, params)
    }

    fn mapping(&self) -> &MappingTable<T> {
        self.inner.mapper.mapping()
    }
}

impl<T: Entity> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> fmt::Debug for EntityService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityService")
            .field("resource", &self.inner.config.resource)
            .field("cache", &self.inner.cache)
            .field("outstanding", &self.inner.tracker.outstanding())
            .finish()
    }
}

impl From<ServiceError> for MappingError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Mapping(inner) => inner,
            other => MappingError::rule("<service>", other.to_string()),
        }
    }
}
