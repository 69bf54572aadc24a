//! Task outcome alignments of a project.

use super::{Describe, Project};
use entigraph_core::{
    field, Entity, EntityId, EntityMapper, EntityRef, MappingResult, MappingRule, MappingTable,
    WeakEntityRef,
};
use serde_json::{json, Value};

/// How strongly a student rates one task against one learning outcome.
#[derive(Debug)]
pub struct TaskOutcomeAlignment {
    /// Id.
    pub id: EntityId,
    /// Task definition being aligned.
    pub task_definition_id: Option<i64>,
    /// Learning outcome it is aligned with.
    pub learning_outcome_id: Option<i64>,
    /// Strength of the alignment (0–5).
    pub rating: Option<i64>,
    /// Student's justification.
    pub description: Option<String>,
    /// Owning project.
    pub project: Option<WeakEntityRef<Project>>,
}

impl TaskOutcomeAlignment {
    /// Creates an unpopulated alignment.
    pub fn new(id: EntityId, project: Option<&EntityRef<Project>>) -> Self {
        Self {
            id,
            task_definition_id: None,
            learning_outcome_id: None,
            rating: None,
            description: None,
            project: project.map(EntityRef::downgrade),
        }
    }
}

impl Entity for TaskOutcomeAlignment {
    type Params = EntityRef<Project>;

    fn entity_id(&self) -> EntityId {
        self.id.clone()
    }
}

impl Describe for TaskOutcomeAlignment {
    fn describe(&self) -> Value {
        json!({
            "id": self.id,
            "task_definition_id": self.task_definition_id,
            "learning_outcome_id": self.learning_outcome_id,
            "rating": self.rating,
        })
    }
}

/// Builds the alignment mapper.
pub fn alignment_mapper() -> MappingResult<EntityMapper<TaskOutcomeAlignment>> {
    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(TaskOutcomeAlignment, id)).required())
        .rule(MappingRule::rename(
            "taskDefinitionId",
            field!(TaskOutcomeAlignment, task_definition_id),
        ))
        .rule(MappingRule::rename(
            "learningOutcomeId",
            field!(TaskOutcomeAlignment, learning_outcome_id),
        ))
        .rule(MappingRule::rename("rating", field!(TaskOutcomeAlignment, rating)))
        .rule(MappingRule::rename("description", field!(TaskOutcomeAlignment, description)))
        .round_trip(&["rating", "description"])
        .build()?;
    Ok(EntityMapper::new(table, |id, _, project| {
        Ok(TaskOutcomeAlignment::new(id.clone(), project))
    }))
}
