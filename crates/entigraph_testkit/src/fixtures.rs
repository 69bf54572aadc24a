//! Canned datasets and seeded transports.
//!
//! The dataset models a small teaching platform: two campuses, two
//! students, two units with tutorials and task definitions, and three
//! projects. Projects are served both from `projects` and from the
//! `students` roster resource.

use entigraph_service::MemoryTransport;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Unit with tutorials 11 and 12 and task definitions 1, 2 and 3.
pub const UNIT_ID: i64 = 7;

/// Project of student 42 in [`UNIT_ID`], with task 9 for definition 1.
pub const PROJECT_ID: i64 = 1;

/// Student of [`PROJECT_ID`].
pub const STUDENT_ID: i64 = 42;

/// Project records, shared by the `projects` and `students` resources.
pub fn project_records() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "campus_id": 1,
            "user_id": 42,
            "unit_id": 7,
            "enrolled": true,
            "target_grade": 2,
            "submitted_grade": null,
            "compile_portfolio": false,
            "has_portfolio": false,
            "portfolio_available": false,
            "uses_draft_learning_summary": false,
            "stats": {"red_pct": 0.2, "green_pct": 0.5, "order_scale": 0.3},
            "grade": null,
            "grade_rationale": null,
            "task_outcome_alignments": [
                {"id": 21, "task_definition_id": 1, "learning_outcome_id": 3, "rating": 4,
                 "description": "Applied loops"}
            ],
            "tutorial_enrolments": [{"tutorial_id": 11}],
            "tasks": [
                {"id": 9, "task_definition_id": 1, "status": "ready_for_feedback",
                 "due_date": "2026-03-14", "num_new_comments": 2}
            ]
        }),
        json!({
            "id": 2,
            "campus_id": 2,
            "user_id": 43,
            "unit_id": 7,
            "enrolled": true,
            "target_grade": 0,
            "compile_portfolio": true,
            "has_portfolio": false,
            "stats": {"grey_pct": 1.0},
            "tasks": []
        }),
        json!({
            "id": 3,
            "campus_id": 1,
            "user_id": 42,
            "unit_id": 8,
            "enrolled": false,
            "target_grade": 3,
            "has_portfolio": true,
            "stats": {"green_pct": 1.0, "order_scale": 1.0},
            "tasks": [
                {"id": 30, "task_definition_id": 4, "status": "complete"}
            ]
        }),
    ]
}

/// The full dataset as a `{ resource: [records] }` document.
pub fn dataset() -> Value {
    let projects = project_records();
    json!({
        "campuses": [
            {"id": 1, "name": "Burwood", "abbreviation": "B", "active": true},
            {"id": 2, "name": "Geelong", "abbreviation": "G", "active": true}
        ],
        "users": [
            {"id": 42, "username": "akim", "first_name": "Alex", "last_name": "Kim",
             "nickname": null, "email": "akim@example.edu"},
            {"id": 43, "username": "jrey", "first_name": "Josefina", "last_name": "Rey",
             "nickname": "Jo", "email": "jrey@example.edu"}
        ],
        "units": [
            {
                "id": 7,
                "code": "COS10001",
                "name": "Introduction to Programming",
                "active": true,
                "task_definitions": [
                    {"id": 1, "abbreviation": "1.1P", "name": "Hello World", "target_grade": 0},
                    {"id": 2, "abbreviation": "2.1P", "name": "Loops", "target_grade": 0},
                    {"id": 3, "abbreviation": "3.1C", "name": "Custom Program", "target_grade": 2}
                ],
                "tutorials": [
                    {"id": 11, "abbreviation": "LA1-01", "meeting_day": "Monday",
                     "meeting_time": "09:30", "meeting_location": "EN101", "capacity": 30},
                    {"id": 12, "abbreviation": "LA1-02", "meeting_day": "Tuesday",
                     "meeting_time": "14:30", "meeting_location": "EN102", "capacity": 30}
                ]
            },
            {
                "id": 8,
                "code": "COS20007",
                "name": "Object Oriented Programming",
                "active": true,
                "task_definitions": [
                    {"id": 4, "abbreviation": "1.1P", "name": "Shapes", "target_grade": 0}
                ],
                "tutorials": []
            }
        ],
        "projects": projects.clone(),
        "students": projects
    })
}

/// A memory transport loaded with [`dataset`].
pub fn memory_transport() -> Arc<MemoryTransport> {
    Arc::new(seeded())
}

/// A memory transport loaded with [`dataset`] whose calls sleep for
/// `latency` first.
pub fn memory_transport_with_latency(latency: Duration) -> Arc<MemoryTransport> {
    Arc::new(seeded().with_latency(latency))
}

fn seeded() -> MemoryTransport {
    MemoryTransport::from_json(&dataset()).expect("canned dataset is a valid document")
}

/// Writes `document` to a temporary JSON file, removed on drop.
pub fn fixture_file(document: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    serde_json::to_writer_pretty(&mut file, document).expect("Failed to write fixture");
    file.flush().expect("Failed to flush fixture");
    file
}
