//! Service wiring for the model's entity types.

use crate::entities::{
    alignment_mapper, campus_mapper, project_mapper, task_mapper, tutorial_mapper, unit_mapper,
    user_mapper, Campus, Project, ProjectRelations, Task, TaskOutcomeAlignment, Tutorial, Unit,
    User,
};
use entigraph_core::{EntityRef, MappingError, MappingResult};
use entigraph_service::{
    EntityService, Filter, RequestOptions, ServiceConfig, ServiceResult, Target, Transport,
};
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// Resource the unit student rosters are listed from.
pub const STUDENT_ENDPOINT: &str = "students";

/// Project lookups, plus roster loading within a unit.
#[derive(Debug, Clone)]
pub struct ProjectService {
    service: EntityService<Project>,
}

impl ProjectService {
    /// Wraps a project service.
    pub fn new(service: EntityService<Project>) -> Self {
        Self { service }
    }

    /// Loads the student projects of `unit` into the unit's student scope.
    ///
    /// `include_withdrawn` is forwarded as the `all` parameter. With
    /// `use_fetch` the roster is always re-read; otherwise a snapshot of an
    /// earlier identical read is reused.
    pub async fn load_students(
        &self,
        unit: &EntityRef<Unit>,
        include_withdrawn: bool,
        use_fetch: bool,
    ) -> ServiceResult<Vec<EntityRef<Project>>> {
        let filter = Filter::new()
            .eq("unit_id", unit.id().to_value())
            .param("all", include_withdrawn);
        let options = Self::unit_options(unit).with_endpoint(STUDENT_ENDPOINT);

        debug!(unit = %unit.id(), include_withdrawn, use_fetch, "loading students");
        if use_fetch {
            self.service.fetch_all(&filter, options).await
        } else {
            self.service.query(&filter, options).await
        }
    }

    /// Loads one project into the unit's student scope.
    pub async fn load_project(
        &self,
        target: impl Into<Target<Project>>,
        unit: &EntityRef<Unit>,
        use_fetch: bool,
    ) -> ServiceResult<EntityRef<Project>> {
        let options = Self::unit_options(unit);
        if use_fetch {
            self.service.fetch(target, options).await
        } else {
            self.service.get(target, options).await
        }
    }

    fn unit_options(unit: &EntityRef<Unit>) -> RequestOptions<Project> {
        RequestOptions::new()
            .with_cache(unit.read().student_cache.clone())
            .with_params(unit.clone())
    }
}

impl Deref for ProjectService {
    type Target = EntityService<Project>;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

/// Every model service, wired to one transport.
#[derive(Debug, Clone)]
pub struct ModelServices {
    /// Campuses.
    pub campuses: EntityService<Campus>,
    /// Users.
    pub users: EntityService<User>,
    /// Tutorials; instances live in their unit's tutorial scope.
    pub tutorials: EntityService<Tutorial>,
    /// Units.
    pub units: EntityService<Unit>,
    /// Tasks; instances live in their project's task scope.
    pub tasks: EntityService<Task>,
    /// Task outcome alignments.
    pub alignments: EntityService<TaskOutcomeAlignment>,
    /// Projects.
    pub projects: ProjectService,
}

impl ModelServices {
    /// Builds every service over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> MappingResult<Self> {
        let campuses = EntityService::new(
            ServiceConfig::new("campuses"),
            transport.clone(),
            campus_mapper()?,
        );
        let users = EntityService::new(ServiceConfig::new("users"), transport.clone(), user_mapper()?);
        let tutorials = EntityService::new(
            ServiceConfig::new("tutorials"),
            transport.clone(),
            tutorial_mapper()?,
        );
        let units = EntityService::new(
            ServiceConfig::new("units"),
            transport.clone(),
            unit_mapper(tutorials.clone())?,
        );
        let tasks = EntityService::new(ServiceConfig::new("tasks"), transport.clone(), task_mapper()?);
        let alignments = EntityService::new(
            ServiceConfig::new("task_outcome_alignments"),
            transport.clone(),
            alignment_mapper()?,
        );
        let projects = EntityService::new(
            ServiceConfig::new("projects"),
            transport,
            project_mapper(ProjectRelations {
                campuses: campuses.clone(),
                users: users.clone(),
                units: units.clone(),
                tasks: tasks.clone(),
                alignments: alignments.clone(),
            })?,
        );

        Ok(Self {
            campuses,
            users,
            tutorials,
            units,
            tasks,
            alignments,
            projects: ProjectService::new(projects),
        })
    }

    /// Total continuations in flight across every service.
    pub fn outstanding(&self) -> usize {
        self.campuses.tracker().outstanding()
            + self.users.tracker().outstanding()
            + self.tutorials.tracker().outstanding()
            + self.units.tracker().outstanding()
            + self.tasks.tracker().outstanding()
            + self.alignments.tracker().outstanding()
            + self.projects.tracker().outstanding()
    }

    /// Waits until no service has continuations in flight and returns
    /// every failure they reported.
    ///
    /// Continuations may start reads that spawn further continuations on
    /// other services, so the services are drained until all are idle.
    pub async fn settle(&self) -> Vec<MappingError> {
        let mut failures = Vec::new();
        loop {
            failures.extend(self.projects.settle().await);
            failures.extend(self.units.settle().await);
            failures.extend(self.users.settle().await);
            failures.extend(self.campuses.settle().await);
            failures.extend(self.tutorials.settle().await);
            failures.extend(self.tasks.settle().await);
            failures.extend(self.alignments.settle().await);
            if self.outstanding() == 0 {
                return failures;
            }
        }
    }

    /// Names and sizes of the global scopes, plus every unit's tutorial
    /// and student scope and every cached project's nested scopes.
    pub fn scope_report(&self) -> Vec<(String, usize)> {
        let mut report = vec![
            (self.campuses.cache().name().to_string(), self.campuses.cache().len()),
            (self.users.cache().name().to_string(), self.users.cache().len()),
            (self.units.cache().name().to_string(), self.units.cache().len()),
            (self.projects.cache().name().to_string(), self.projects.cache().len()),
        ];

        let mut projects = self.projects.cache().entities();
        for unit in self.units.cache().entities() {
            let unit = unit.read();
            report.push((unit.tutorials.name().to_string(), unit.tutorials.len()));
            report.push((unit.student_cache.name().to_string(), unit.student_cache.len()));
            for project in unit.student_cache.entities() {
                if !projects.iter().any(|known| known.ptr_eq(&project)) {
                    projects.push(project);
                }
            }
        }
        for project in projects {
            let project = project.read();
            for scope in [
                (project.task_cache.name(), project.task_cache.len()),
                (
                    project.task_outcome_alignments.name(),
                    project.task_outcome_alignments.len(),
                ),
                (project.tutorial_enrolments.name(), project.tutorial_enrolments.len()),
            ] {
                report.push((scope.0.to_string(), scope.1));
            }
        }
        report
    }

    /// Empties the global scopes and forgets every query snapshot.
    pub fn clear(&self) {
        let evicted = self.campuses.cache().clear()
            + self.users.cache().clear()
            + self.units.cache().clear()
            + self.tutorials.cache().clear()
            + self.tasks.cache().clear()
            + self.alignments.cache().clear()
            + self.projects.cache().clear();
        self.projects.clear_snapshots();
        self.units.clear_snapshots();
        debug!(evicted, "cleared model scopes");
    }
}
