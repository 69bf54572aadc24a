//! Units of study.

use super::{objects_at, Describe, Project, Task, Tutorial};
use entigraph_core::{
    field, Entity, EntityId, EntityMapper, EntityRef, IdentityCache, MappingResult, MappingRule,
    MappingTable, PayloadExt,
};
use entigraph_service::EntityService;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::debug;

/// A task students of a unit are expected to complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Id.
    pub id: i64,
    /// Short code ("1.1P").
    #[serde(default)]
    pub abbreviation: String,
    /// Title.
    #[serde(default)]
    pub name: String,
    /// Grade the task counts towards.
    #[serde(default)]
    pub target_grade: Option<i64>,
}

/// A unit of study with its tutorials and student roster.
#[derive(Debug)]
pub struct Unit {
    /// Id.
    pub id: EntityId,
    /// Unit code ("COS10001").
    pub code: String,
    /// Title.
    pub name: String,
    /// Whether the unit is running.
    pub active: bool,
    /// Tasks set in this unit.
    pub task_definitions: Vec<TaskDefinition>,
    /// Tutorials of this unit.
    pub tutorials: IdentityCache<Tutorial>,
    /// Enrolled students' projects.
    pub student_cache: IdentityCache<Project>,
}

impl Unit {
    /// Creates an unpopulated unit with empty scopes.
    pub fn new(id: EntityId) -> Self {
        Self {
            tutorials: IdentityCache::new(format!("unit-{id}/tutorials")),
            student_cache: IdentityCache::new(format!("unit-{id}/students")),
            id,
            code: String::new(),
            name: String::new(),
            active: true,
            task_definitions: Vec::new(),
        }
    }

    /// Returns the task definition with `id`.
    pub fn task_definition(&self, id: i64) -> Option<&TaskDefinition> {
        self.task_definitions.iter().find(|d| d.id == id)
    }

    /// Ensures `project` holds one task per task definition of `unit`.
    ///
    /// Definitions without a task get a not-started placeholder; a
    /// placeholder is dropped once a real task for its definition arrives.
    /// Returns the number of placeholders created.
    pub fn setup_tasks_for_student(
        unit: &EntityRef<Unit>,
        project: &EntityRef<Project>,
    ) -> MappingResult<usize> {
        let definitions: Vec<i64> = unit.read().task_definitions.iter().map(|d| d.id).collect();
        let tasks = project.read().task_cache.clone();

        let mut covered = HashSet::new();
        let mut placeholders = Vec::new();
        for task in tasks.entities() {
            let task = task.read();
            match (task.placeholder, task.definition_id) {
                (false, Some(definition)) => {
                    covered.insert(definition);
                }
                (true, Some(definition)) => placeholders.push((task.id.clone(), definition)),
                _ => {}
            }
        }

        for (id, definition) in placeholders {
            if covered.contains(&definition) {
                tasks.remove(&id);
            }
        }

        let mut created = 0;
        for definition in definitions {
            if covered.contains(&definition) || tasks.contains(&Task::placeholder_id(definition)) {
                continue;
            }
            tasks.add(EntityRef::new(Task::placeholder(definition, project)))?;
            created += 1;
        }

        if created > 0 {
            debug!(unit = %unit.id(), project = %project.id(), created, "created placeholder tasks");
        }
        Ok(created)
    }
}

impl Entity for Unit {
    type Params = ();

    fn entity_id(&self) -> EntityId {
        self.id.clone()
    }
}

impl Describe for Unit {
    fn describe(&self) -> Value {
        json!({
            "id": self.id,
            "code": self.code,
            "name": self.name,
            "active": self.active,
            "task_definitions": self.task_definitions.len(),
            "tutorials": self.tutorials.len(),
            "students": self.student_cache.len(),
        })
    }
}

/// Builds the unit mapper. Tutorials are decoded through `tutorials` into
/// the unit's own tutorial scope.
pub fn unit_mapper(tutorials: EntityService<Tutorial>) -> MappingResult<EntityMapper<Unit>> {
    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(Unit, id)).required())
        .rule(MappingRule::rename("code", field!(Unit, code)))
        .rule(MappingRule::rename("name", field!(Unit, name)))
        .rule(MappingRule::rename("active", field!(Unit, active)))
        .rule(MappingRule::rename("taskDefinitions", field!(Unit, task_definitions)))
        .rule(MappingRule::side_effect("tutorials", move |raw, unit: &EntityRef<Unit>| {
            let scope = unit.read().tutorials.clone();
            for data in objects_at(raw, "tutorials")? {
                scope.get_or_create(data.id_at("id")?, &tutorials, data, Some(unit))?;
            }
            Ok(())
        }))
        .round_trip(&["code", "name", "active"])
        .build()?;
    Ok(EntityMapper::new(table, |id, _, _| Ok(Unit::new(id.clone()))))
}
