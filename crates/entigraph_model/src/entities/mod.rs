//! Entity types and their mapping tables.
//!
//! Relations between entities follow one ownership rule: parents hold
//! strong handles to their children (through cache scopes), children hold
//! weak back-pointers to their parents. A project's `unit` is the one
//! strong upward edge, since a project is meaningless without it.

mod alignment;
mod campus;
mod project;
mod task;
mod tutorial;
mod unit;
mod user;

pub use alignment::{alignment_mapper, TaskOutcomeAlignment};
pub use campus::{campus_mapper, Campus};
pub use project::{project_mapper, Project, ProjectRelations};
pub use task::{task_mapper, Task, TaskStatus};
pub use tutorial::{tutorial_mapper, Tutorial};
pub use unit::{unit_mapper, TaskDefinition, Unit};
pub use user::{user_mapper, User};

use entigraph_core::{
    Entity, EntityId, EntityRef, MappingError, MappingResult, PayloadExt, Pending, RawPayload,
};
use entigraph_service::{EntityService, RequestOptions};
use serde_json::Value;

/// JSON summary of an entity for display.
pub trait Describe {
    /// Returns a JSON view of the entity's main fields.
    fn describe(&self) -> Value;
}

/// Returns the objects of the array under `key`.
pub(crate) fn objects_at<'a>(raw: &'a RawPayload, key: &str) -> MappingResult<Vec<&'a RawPayload>> {
    raw.array_at(key)?
        .iter()
        .map(|item| match item {
            Value::Object(data) => Ok(data),
            _ => Err(MappingError::invalid(key, "expected an array of objects")),
        })
        .collect()
}

/// Resolves a related entity by id through its global scope.
///
/// The stub is the instance already cached for `id`, or a fresh id-only
/// instance. A known instance is returned as is once the continuation
/// runs; a fresh stub is refined by a full read.
pub(crate) fn shared_relation<R: Entity>(
    service: &EntityService<R>,
    id: EntityId,
) -> MappingResult<Pending<Option<EntityRef<R>>>> {
    let options = RequestOptions::new();
    let known = service.cached(&id, &options).is_some();
    let stub = service.stub(id.clone(), &options)?;

    let service = service.clone();
    Ok(Pending::new(Some(stub), async move {
        let entity = if known {
            service.get(id, RequestOptions::new()).await?
        } else {
            service.fetch(id, RequestOptions::new()).await?
        };
        Ok::<_, entigraph_service::ServiceError>(Some(entity))
    }))
}
