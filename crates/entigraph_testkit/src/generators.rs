//! Property-based test generators using proptest.
//!
//! Strategies produce wire payloads as `serde_json::Value`, so they can be
//! fed to any mapper or loaded into a memory transport.

use entigraph_core::EntityId;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for numeric and string entity ids.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop_oneof![
        (1i64..10_000).prop_map(EntityId::from),
        prop::string::string_regex("[a-z][a-z0-9-]{0,11}")
            .expect("Invalid regex")
            .prop_map(EntityId::from),
    ]
}

/// Strategy for a fraction, sometimes sent as a numeric string.
fn fraction_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0u32..=100).prop_map(|pct| json!(f64::from(pct) / 100.0)),
        (0u32..=100).prop_map(|pct| json!(format!("{}", f64::from(pct) / 100.0))),
    ]
}

/// Strategy for a task stats object with any subset of its keys present.
pub fn stats_strategy() -> impl Strategy<Value = Value> {
    let keys = ["red_pct", "grey_pct", "orange_pct", "blue_pct", "green_pct", "order_scale"];
    prop::collection::vec(prop::option::of(fraction_strategy()), keys.len()).prop_map(
        move |values| {
            let mut stats = Map::new();
            for (key, value) in keys.iter().zip(values) {
                if let Some(value) = value {
                    stats.insert((*key).to_string(), value);
                }
            }
            Value::Object(stats)
        },
    )
}

/// Strategy for a task status name.
pub fn task_status_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "not_started",
        "working_on_it",
        "need_help",
        "ready_for_feedback",
        "discuss",
        "demonstrate",
        "complete",
        "fix_and_resubmit",
        "redo",
        "feedback_exceeded",
        "fail",
        "time_exceeded",
    ])
}

/// Strategy for task records with distinct ids and definitions drawn
/// from `1..=definitions`.
pub fn tasks_strategy(definitions: i64) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::btree_map(1i64..500, (1..=definitions, task_status_strategy()), 0..6)
        .prop_map(|tasks| {
            tasks
                .into_iter()
                .map(|(id, (definition, status))| {
                    json!({"id": id, "task_definition_id": definition, "status": status})
                })
                .collect()
        })
}

/// A wire value that is sometimes absent and sometimes `null`.
fn nullable<S>(values: S) -> impl Strategy<Value = Option<Value>>
where
    S: Strategy<Value = Value>,
{
    prop::option::of(prop::option::of(values).prop_map(|value| value.unwrap_or(Value::Null)))
}

/// Strategy for a flat project record: scalar fields, stats and a campus,
/// each key independently absent, `null` or set. Carries no student or
/// unit to resolve.
pub fn project_payload_strategy(id: i64) -> impl Strategy<Value = Value> {
    (
        nullable(any::<bool>().prop_map(Value::from)),
        nullable((0i64..4).prop_map(Value::from)),
        nullable((0i64..4).prop_map(Value::from)),
        nullable((0i64..4).prop_map(Value::from)),
        nullable(any::<bool>().prop_map(Value::from)),
        nullable(any::<bool>().prop_map(Value::from)),
        nullable(
            prop::string::string_regex("[A-Za-z ]{0,24}")
                .expect("Invalid regex")
                .prop_map(Value::from),
        ),
        nullable((1i64..4).prop_map(Value::from)),
        prop::option::of(stats_strategy()),
    )
        .prop_map(
            move |(enrolled, target, submitted, grade, compile, has_portfolio, rationale, campus, stats)| {
                let mut project = Map::new();
                project.insert("id".to_string(), json!(id));
                let fields = [
                    ("enrolled", enrolled),
                    ("target_grade", target),
                    ("submitted_grade", submitted),
                    ("grade", grade),
                    ("compile_portfolio", compile),
                    ("has_portfolio", has_portfolio),
                    ("grade_rationale", rationale),
                    ("campus_id", campus),
                    ("stats", stats),
                ];
                for (key, value) in fields {
                    if let Some(value) = value {
                        project.insert(key.to_string(), value);
                    }
                }
                Value::Object(project)
            },
        )
}
