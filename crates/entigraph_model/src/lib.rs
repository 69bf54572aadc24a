//! # Entigraph Model
//!
//! A teaching-platform entity graph configured on top of entigraph.
//!
//! Projects are the root of the graph: decoding one pulls in its student,
//! campus and unit (resolved asynchronously through shared scopes), its
//! tasks and outcome alignments (decoded into project-owned scopes) and
//! its tutorial enrolments (looked up in the unit's tutorial scope).
//!
//! ```text
//! Unit ──tutorials──▶ Tutorial
//!  │ └─student_cache─▶ Project ──task_cache──▶ Task
//!  │                     │  └──alignments──▶ TaskOutcomeAlignment
//!  ◀──────unit───────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod entities;
mod services;
mod stats;

pub use entities::{
    Campus, Describe, Project, ProjectRelations, Task, TaskDefinition, TaskOutcomeAlignment,
    TaskStatus, Tutorial, Unit, User,
};
pub use services::{ModelServices, ProjectService, STUDENT_ENDPOINT};
pub use stats::{task_stats, TaskStat};
