//! Projects: one student's enrolment in one unit.

use super::{objects_at, shared_relation, Campus, Describe, Task, TaskOutcomeAlignment, Tutorial, Unit, User};
use crate::stats::{task_stats, TaskStat};
use entigraph_core::{
    field, Entity, EntityId, EntityMapper, EntityRef, IdentityCache, MappingError, MappingResult,
    MappingRule, MappingTable, PayloadExt, Pending,
};
use entigraph_service::{EntityService, ServiceError};
use serde_json::{json, Value};
use tracing::debug;

/// A student's enrolment in a unit, with its tasks and portfolio state.
#[derive(Debug)]
pub struct Project {
    /// Id.
    pub id: EntityId,
    /// Campus the student studies at.
    pub campus: Option<EntityRef<Campus>>,
    /// The enrolled student.
    pub student: Option<EntityRef<User>>,
    /// Whether the enrolment is current, once the upstream has said so.
    pub enrolled: Option<bool>,
    /// Grade the student is aiming for.
    pub target_grade: Option<i64>,
    /// Grade the student's portfolio was submitted for.
    pub submitted_grade: Option<i64>,
    /// Files included in the portfolio.
    pub portfolio_files: Vec<Value>,
    /// Whether the portfolio should be compiled.
    pub compile_portfolio: Option<bool>,
    /// Whether a compiled portfolio exists.
    pub has_portfolio: bool,
    /// 1 when a portfolio exists, 0.5 while one is being compiled, else 0.
    pub portfolio_status: f64,
    /// Whether the portfolio can be downloaded.
    pub portfolio_available: bool,
    /// Whether the draft learning summary report is in use.
    pub uses_draft_learning_summary: bool,
    /// Task status buckets.
    pub task_stats: Vec<TaskStat>,
    /// Sort key derived from the task stats.
    pub order_scale: i64,
    /// Final grade.
    pub grade: Option<i64>,
    /// Why the final grade was given.
    pub grade_rationale: Option<String>,
    /// Unit the project belongs to.
    pub unit: Option<EntityRef<Unit>>,
    /// Task outcome alignments of this project.
    pub task_outcome_alignments: IdentityCache<TaskOutcomeAlignment>,
    /// Tutorials the student is enrolled in.
    pub tutorial_enrolments: IdentityCache<Tutorial>,
    /// The student's tasks.
    pub task_cache: IdentityCache<Task>,
}

impl Project {
    /// Creates an unpopulated project, optionally inside `unit`.
    pub fn new(id: EntityId, unit: Option<&EntityRef<Unit>>) -> Self {
        Self {
            task_outcome_alignments: IdentityCache::new(format!("project-{id}/alignments")),
            tutorial_enrolments: IdentityCache::new(format!("project-{id}/tutorials")),
            task_cache: IdentityCache::new(format!("project-{id}/tasks")),
            id,
            campus: None,
            student: None,
            enrolled: None,
            target_grade: None,
            submitted_grade: None,
            portfolio_files: Vec::new(),
            compile_portfolio: None,
            has_portfolio: false,
            portfolio_status: 0.0,
            portfolio_available: false,
            uses_draft_learning_summary: false,
            task_stats: Vec::new(),
            order_scale: 0,
            grade: None,
            grade_rationale: None,
            unit: unit.cloned(),
        }
    }

    /// Returns the task for a task definition, if the project has one.
    pub fn task_for_definition(&self, definition_id: i64) -> Option<EntityRef<Task>> {
        self.task_cache
            .entities()
            .into_iter()
            .find(|task| task.read().definition_id == Some(definition_id))
    }
}

impl Entity for Project {
    type Params = EntityRef<Unit>;

    fn entity_id(&self) -> EntityId {
        self.id.clone()
    }
}

impl Describe for Project {
    fn describe(&self) -> Value {
        json!({
            "id": self.id,
            "student": self.student.as_ref().map(|s| s.read().describe()),
            "unit": self.unit.as_ref().map(|u| u.id()),
            "campus": self.campus.as_ref().map(|c| c.id()),
            "enrolled": self.enrolled,
            "target_grade": self.target_grade,
            "submitted_grade": self.submitted_grade,
            "grade": self.grade,
            "portfolio_status": self.portfolio_status,
            "task_stats": self.task_stats,
            "order_scale": self.order_scale,
            "tasks": self.task_cache.len(),
            "task_outcome_alignments": self.task_outcome_alignments.len(),
            "tutorials": self.tutorial_enrolments.ids(),
        })
    }
}

/// Services the project table resolves relations through.
#[derive(Debug, Clone)]
pub struct ProjectRelations {
    /// Campus lookups.
    pub campuses: EntityService<Campus>,
    /// Student lookups.
    pub users: EntityService<User>,
    /// Unit lookups.
    pub units: EntityService<Unit>,
    /// Factory for the project's tasks.
    pub tasks: EntityService<Task>,
    /// Factory for the project's outcome alignments.
    pub alignments: EntityService<TaskOutcomeAlignment>,
}

/// Builds the project mapper.
pub fn project_mapper(relations: ProjectRelations) -> MappingResult<EntityMapper<Project>> {
    let ProjectRelations {
        campuses,
        users,
        units,
        tasks,
        alignments,
    } = relations;
    let nested_users = users.clone();
    let nested_units = units.clone();

    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(Project, id)).required())
        .rule(
            MappingRule::async_decode("campus", field!(Project, campus), move |raw, _| {
                if raw.get("campus_id").map_or(true, Value::is_null) {
                    return Ok(Pending::new(None, async { Ok::<_, ServiceError>(None) }));
                }
                shared_relation(&campuses, raw.id_at("campus_id")?)
            })
            .wire_key("campus_id")
            .to_json(|project: &Project| {
                project
                    .campus
                    .as_ref()
                    .map_or(Value::Null, |campus| campus.id().to_value())
            }),
        )
        .rule(MappingRule::decode("student", field!(Project, student), move |raw, _| {
            let data = raw.object_at("student")?;
            nested_users
                .cache()
                .get_or_create(data.id_at("id")?, &nested_users, data, None)
                .map(Some)
        }))
        .rule(MappingRule::async_decode("userId", field!(Project, student), move |raw, _| {
            shared_relation(&users, raw.id_at("user_id")?)
        }))
        .rule(MappingRule::rename("enrolled", field!(Project, enrolled)))
        .rule(MappingRule::rename("targetGrade", field!(Project, target_grade)))
        .rule(MappingRule::rename("submittedGrade", field!(Project, submitted_grade)))
        .rule(MappingRule::rename("portfolioFiles", field!(Project, portfolio_files)))
        .rule(MappingRule::rename("compilePortfolio", field!(Project, compile_portfolio)))
        .rule(MappingRule::side_effect_mut("hasPortfolio", |raw, project: &mut Project| {
            let has_portfolio = raw.get("has_portfolio") == Some(&Value::Bool(true));
            project.has_portfolio = has_portfolio;
            project.portfolio_status = if has_portfolio {
                1.0
            } else if project.compile_portfolio == Some(true) {
                0.5
            } else {
                0.0
            };
            Ok(())
        }))
        .rule(MappingRule::rename("portfolioAvailable", field!(Project, portfolio_available)))
        .rule(MappingRule::rename(
            "usesDraftLearningSummary",
            field!(Project, uses_draft_learning_summary),
        ))
        .rule(
            MappingRule::side_effect_mut("taskStats", |raw, project: &mut Project| match raw.get("stats") {
                Some(Value::Object(values)) => {
                    let (stats, order_scale) = task_stats(values);
                    project.task_stats = stats;
                    project.order_scale = order_scale;
                    Ok(())
                }
                Some(Value::Null) | None => Ok(()),
                Some(_) => Err(MappingError::invalid("stats", "expected an object")),
            })
            .wire_key("stats"),
        )
        .rule(MappingRule::rename("grade", field!(Project, grade)))
        .rule(MappingRule::rename("gradeRationale", field!(Project, grade_rationale)))
        .rule(
            MappingRule::decode("unit", field!(Project, unit), move |raw, _| {
                let data = raw.object_at("unit")?;
                nested_units
                    .cache()
                    .get_or_create(data.id_at("id")?, &nested_units, data, None)
                    .map(Some)
            })
            .to_json(|project: &Project| {
                project
                    .unit
                    .as_ref()
                    .map_or(Value::Null, |unit| unit.id().to_value())
            }),
        )
        .rule(MappingRule::async_decode("unitId", field!(Project, unit), move |raw, _| {
            shared_relation(&units, raw.id_at("unit_id")?)
        }))
        .rule(MappingRule::side_effect("taskOutcomeAlignments", move |raw, project: &EntityRef<Project>| {
            let scope = project.read().task_outcome_alignments.clone();
            for data in objects_at(raw, "task_outcome_alignments")? {
                scope.get_or_create(data.id_at("id")?, &alignments, data, Some(project))?;
            }
            Ok(())
        }))
        .rule(MappingRule::side_effect("tutorialEnrolments", |raw, project: &EntityRef<Project>| {
            let (unit, enrolments) = {
                let project = project.read();
                (project.unit.clone(), project.tutorial_enrolments.clone())
            };
            let unit = unit.ok_or_else(|| {
                MappingError::rule("tutorialEnrolments", "project has no unit to look tutorials up in")
            })?;
            let tutorials = unit.read().tutorials.clone();

            for data in objects_at(raw, "tutorial_enrolments")? {
                let Some(tutorial_id) = data.get("tutorial_id").and_then(EntityId::from_value) else {
                    continue;
                };
                match tutorials.get(&tutorial_id) {
                    Some(tutorial) => enrolments.add(tutorial)?,
                    None => debug!(
                        project = %project.id(),
                        tutorial = %tutorial_id,
                        "enrolment refers to a tutorial the unit has not loaded"
                    ),
                }
            }
            Ok(())
        }))
        .rule(MappingRule::side_effect("tasks", move |raw, project: &EntityRef<Project>| {
            let (scope, unit) = {
                let project = project.read();
                (project.task_cache.clone(), project.unit.clone())
            };
            for data in objects_at(raw, "tasks")? {
                scope.get_or_create(data.id_at("id")?, &tasks, data, Some(project))?;
            }
            if let Some(unit) = unit {
                Unit::setup_tasks_for_student(&unit, project)?;
            }
            Ok(())
        }))
        .round_trip(&[
            "enrolled",
            "targetGrade",
            "submittedGrade",
            "compilePortfolio",
            "grade",
            "gradeRationale",
            "campus",
        ])
        .build()?;

    Ok(EntityMapper::new(table, |id, _, unit| Ok(Project::new(id.clone(), unit))))
}
