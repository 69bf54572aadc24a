//! Tasks of a project.

use super::{Describe, Project};
use entigraph_core::{
    field, Entity, EntityId, EntityMapper, EntityRef, MappingResult, MappingRule, MappingTable,
    WeakEntityRef,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Assessment status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Nothing submitted yet.
    #[default]
    NotStarted,
    /// The student is working on it.
    WorkingOnIt,
    /// The student asked for help.
    NeedHelp,
    /// Submitted for assessment.
    ReadyForFeedback,
    /// Needs a discussion with the tutor.
    Discuss,
    /// Needs a demonstration to the tutor.
    Demonstrate,
    /// Signed off.
    Complete,
    /// Must be fixed and resubmitted.
    FixAndResubmit,
    /// Must be redone from scratch.
    Redo,
    /// No further feedback will be given.
    FeedbackExceeded,
    /// Assessed as failed.
    Fail,
    /// Deadline passed.
    TimeExceeded,
}

/// A student's attempt at one task definition.
#[derive(Debug)]
pub struct Task {
    /// Id.
    pub id: EntityId,
    /// Task definition in the project's unit.
    pub definition_id: Option<i64>,
    /// Current status.
    pub status: TaskStatus,
    /// Due date as sent by the upstream.
    pub due_date: Option<String>,
    /// Number of unread comments.
    pub num_new_comments: i64,
    /// Created locally for a definition the upstream sent no task for.
    pub placeholder: bool,
    /// Owning project.
    pub project: Option<WeakEntityRef<Project>>,
}

impl Task {
    /// Creates an unpopulated task.
    pub fn new(id: EntityId, project: Option<&EntityRef<Project>>) -> Self {
        Self {
            id,
            definition_id: None,
            status: TaskStatus::default(),
            due_date: None,
            num_new_comments: 0,
            placeholder: false,
            project: project.map(EntityRef::downgrade),
        }
    }

    /// Id under which the placeholder for `definition_id` is cached.
    pub fn placeholder_id(definition_id: i64) -> EntityId {
        EntityId::from(format!("definition-{definition_id}"))
    }

    /// Creates the not-started placeholder for a task definition.
    pub fn placeholder(definition_id: i64, project: &EntityRef<Project>) -> Self {
        Self {
            definition_id: Some(definition_id),
            placeholder: true,
            ..Self::new(Self::placeholder_id(definition_id), Some(project))
        }
    }

    /// Returns the owning project while it is alive.
    pub fn project(&self) -> Option<EntityRef<Project>> {
        self.project.as_ref().and_then(WeakEntityRef::upgrade)
    }
}

impl Entity for Task {
    type Params = EntityRef<Project>;

    fn entity_id(&self) -> EntityId {
        self.id.clone()
    }
}

impl Describe for Task {
    fn describe(&self) -> Value {
        json!({
            "id": self.id,
            "definition_id": self.definition_id,
            "status": self.status,
            "due_date": self.due_date,
            "placeholder": self.placeholder,
        })
    }
}

/// Builds the task mapper.
pub fn task_mapper() -> MappingResult<EntityMapper<Task>> {
    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(Task, id)).required())
        .rule(
            MappingRule::rename("taskDefinitionId", field!(Task, definition_id))
                .wire_key("task_definition_id"),
        )
        .rule(MappingRule::rename("status", field!(Task, status)))
        .rule(MappingRule::rename("dueDate", field!(Task, due_date)))
        .rule(MappingRule::rename("numNewComments", field!(Task, num_new_comments)))
        .round_trip(&["status"])
        .build()?;
    Ok(EntityMapper::new(table, |id, _, project| {
        Ok(Task::new(id.clone(), project))
    }))
}
