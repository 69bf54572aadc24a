//! The per-decode mapping state machine.
//!
//! A [`MappingProcess`] applies one rule table to one payload/entity pair:
//!
//! ```text
//! Created → Running → Completed
//!              │          ╰─ detached continuations keep running
//!              ╰→ Failed  (fields set by earlier rules stay applied)
//! ```
//!
//! Synchronous rules run strictly in declared order. An async rule assigns
//! its stub, spawns its nested fetch on the current Tokio runtime and the
//! process moves on without waiting. Completion does not depend on those
//! continuations; they refine the entity in place later.

use crate::entity::{Entity, EntityRef};
use crate::error::{MappingError, MappingResult};
use crate::mapping::rule::{MappingRule, RuleKind};
use crate::mapping::table::MappingTable;
use crate::mapping::tracker::{AsyncTracker, Continuation};
use crate::payload::RawPayload;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

/// Lifecycle state of a [`MappingProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Bound to a payload and entity, no rule run yet.
    Created,
    /// Executing rules.
    Running,
    /// Every synchronous rule has run.
    Completed,
    /// A synchronous rule failed.
    Failed,
}

impl ProcessState {
    /// Returns true once the process can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Completed | ProcessState::Failed)
    }
}

/// Drives one decode of one payload into one entity instance.
pub struct MappingProcess<'a, T: Entity> {
    entity: EntityRef<T>,
    raw: &'a RawPayload,
    state: ProcessState,
    cursor: usize,
    tracker: AsyncTracker,
    continuations: Vec<Continuation>,
}

impl<'a, T: Entity> MappingProcess<'a, T> {
    /// Creates a process with its own root tracker.
    pub fn new(entity: EntityRef<T>, raw: &'a RawPayload) -> Self {
        Self::with_tracker(entity, raw, AsyncTracker::new())
    }

    /// Creates a process whose outstanding counter is `tracker`.
    pub fn with_tracker(entity: EntityRef<T>, raw: &'a RawPayload, tracker: AsyncTracker) -> Self {
        Self {
            entity,
            raw,
            state: ProcessState::Created,
            cursor: 0,
            tracker,
            continuations: Vec::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Returns the index of the next rule to run.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the number of this decode's continuations still in flight.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding()
    }

    /// Returns the target entity.
    pub fn entity(&self) -> &EntityRef<T> {
        &self.entity
    }

    /// Runs the next rule. Returns `Ok(false)` once the table is exhausted.
    pub fn step(&mut self, table: &MappingTable<T>) -> MappingResult<bool> {
        if self.state.is_terminal() {
            return Ok(false);
        }
        self.state = ProcessState::Running;

        let Some(rule) = table.rules().get(self.cursor) else {
            self.state = ProcessState::Completed;
            return Ok(false);
        };

        if let Err(error) = self.apply(rule) {
            self.state = ProcessState::Failed;
            debug!(
                rule = rule.entity_key(),
                cursor = self.cursor,
                error = %error,
                "mapping process failed"
            );
            return Err(error);
        }

        self.cursor += 1;
        if self.cursor == table.len() {
            self.state = ProcessState::Completed;
        }
        Ok(true)
    }

    /// Runs every remaining rule and returns the decoded entity.
    pub fn run(mut self, table: &MappingTable<T>) -> MappingResult<Decoded<T>> {
        while self.step(table)? {}
        // An empty table never enters the loop body.
        self.state = ProcessState::Completed;

        Ok(Decoded {
            entity: self.entity,
            continuations: self.continuations,
            tracker: self.tracker,
        })
    }

    fn apply(&mut self, rule: &MappingRule<T>) -> MappingResult<()> {
        let wire_key = rule.wire_key_name();
        if !self.raw.contains_key(wire_key) {
            if rule.is_required() {
                return Err(MappingError::missing(wire_key));
            }
            trace!(rule = rule.entity_key(), "skipping rule, key absent");
            return Ok(());
        }

        trace!(rule = rule.entity_key(), kind = rule.kind().label(), "applying rule");
        match rule.kind() {
            RuleKind::Rename(apply) => {
                let value = &self.raw[wire_key];
                apply(&mut self.entity.write(), value)
            }
            RuleKind::Decode(decode) => {
                // Computed under a read lock, assigned under a write lock. The
                // closure must not write-lock this entity; see MappingRule::decode.
                let assign = decode(self.raw, &self.entity.read())?;
                assign(&mut self.entity.write());
                Ok(())
            }
            RuleKind::SideEffect(effect) => effect(self.raw, &self.entity),
            RuleKind::AsyncDecode(resolve) => {
                let field = rule.entity_key();
                let runtime =
                    Handle::try_current().map_err(|_| MappingError::NoRuntime { field: field.into() })?;

                let step = resolve(self.raw, &self.entity)?;
                (step.stub)(&mut self.entity.write());

                let guard = self.tracker.register();
                let entity = self.entity.clone();
                let fetch = step.fetch;
                let handle = runtime.spawn(async move {
                    let outcome = match fetch.await {
                        Ok(assign) => {
                            assign(&mut entity.write());
                            Ok(())
                        }
                        Err(source) => {
                            warn!(field, error = %source, "async continuation failed");
                            Err(MappingError::AsyncResolution {
                                field: field.into(),
                                source,
                            })
                        }
                    };
                    guard.finish(&outcome);
                    outcome
                });
                self.continuations.push(Continuation::new(field, handle));
                Ok(())
            }
        }
    }
}

/// The result of a completed [`MappingProcess`].
#[derive(Debug)]
pub struct Decoded<T: Entity> {
    entity: EntityRef<T>,
    continuations: Vec<Continuation>,
    tracker: AsyncTracker,
}

impl<T: Entity> Decoded<T> {
    /// Returns the decoded entity.
    pub fn entity(&self) -> &EntityRef<T> {
        &self.entity
    }

    /// Consumes the result, detaching any continuations.
    pub fn into_entity(self) -> EntityRef<T> {
        self.entity
    }

    /// Returns the continuations spawned by this decode.
    pub fn continuations(&self) -> &[Continuation] {
        &self.continuations
    }

    /// Returns the number of continuations still in flight.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding()
    }

    /// Waits for this decode's continuations and returns their failures.
    pub async fn settle(self) -> (EntityRef<T>, Vec<MappingError>) {
        let mut failures = Vec::new();
        for continuation in self.continuations {
            if let Err(error) = continuation.outcome().await {
                failures.push(error);
            }
        }
        (self.entity, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::field;
    use crate::mapping::rule::Pending;
    use crate::payload::PayloadExt;
    use serde_json::{json, Value};
    use std::io;
    use tokio::sync::oneshot;

    #[derive(Debug, Default)]
    struct Project {
        id: i64,
        grade: Option<i64>,
        grade_seen_by_label: Option<i64>,
        label: String,
        unit: Option<i64>,
    }

    impl Entity for Project {
        type Params = ();

        fn entity_id(&self) -> EntityId {
            EntityId::from(self.id)
        }
    }

    fn raw(value: Value) -> RawPayload {
        crate::payload::payload_from_value(value).unwrap()
    }

    fn label_rule() -> MappingRule<Project> {
        MappingRule::decode("label", field!(Project, grade_seen_by_label), |_, project| {
            Ok(project.grade)
        })
    }

    #[test]
    fn decode_sees_fields_from_earlier_rules() {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .rule(label_rule())
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"grade": 3, "label": "x"}));

        MappingProcess::new(entity.clone(), &payload).run(&table).unwrap();
        assert_eq!(entity.read().grade_seen_by_label, Some(3));
    }

    #[test]
    fn decode_does_not_see_later_fields() {
        let table = MappingTable::builder()
            .rule(label_rule())
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"grade": 3, "label": "x"}));

        MappingProcess::new(entity.clone(), &payload).run(&table).unwrap();
        assert_eq!(entity.read().grade_seen_by_label, None);
        assert_eq!(entity.read().grade, Some(3));
    }

    #[test]
    fn failure_keeps_earlier_fields() {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("label", field!(Project, label)))
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .rule(MappingRule::rename("id", field!(Project, id)).required())
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"label": "kept", "grade": "bad"}));

        let mut process = MappingProcess::new(entity.clone(), &payload);
        assert!(process.step(&table).unwrap());
        let err = process.step(&table).unwrap_err();
        assert!(err.is_decode_error());
        assert_eq!(process.state(), ProcessState::Failed);
        assert_eq!(process.cursor(), 1);
        assert!(!process.step(&table).unwrap());
        assert_eq!(entity.read().label, "kept");
    }

    #[test]
    fn required_key_missing() {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("id", field!(Project, id)).required())
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"grade": 1}));

        let err = MappingProcess::new(entity, &payload).run(&table).unwrap_err();
        assert!(matches!(err, MappingError::MissingKey { key } if key == "id"));
    }

    #[test]
    fn absent_keys_do_not_wipe_fields() {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .rule(MappingRule::rename("label", field!(Project, label)))
            .build()
            .unwrap();
        let entity = EntityRef::new(Project {
            grade: Some(2),
            ..Project::default()
        });
        let payload = raw(json!({"label": "merged"}));

        MappingProcess::new(entity.clone(), &payload).run(&table).unwrap();
        assert_eq!(entity.read().grade, Some(2));
        assert_eq!(entity.read().label, "merged");
    }

    #[test]
    fn state_transitions() {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"grade": 1}));

        let mut process = MappingProcess::new(entity, &payload);
        assert_eq!(process.state(), ProcessState::Created);
        assert!(process.step(&table).unwrap());
        assert_eq!(process.state(), ProcessState::Completed);
        assert!(!process.step(&table).unwrap());
    }

    #[test]
    fn side_effect_can_merge_back_into_its_own_entity() {
        let inner = MappingTable::builder()
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .build()
            .unwrap();
        let table = MappingTable::builder()
            .rule(MappingRule::rename("label", field!(Project, label)))
            .rule(MappingRule::side_effect("parent", move |raw: &RawPayload, project: &EntityRef<Project>| {
                // A nested record pointing back at the entity being decoded.
                let nested = raw.object_at("parent")?;
                MappingProcess::new(project.clone(), nested).run(&inner)?;
                Ok(())
            }))
            .rule(label_rule())
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"label": "x", "parent": {"id": 1, "grade": 5}}));

        let decoded = MappingProcess::new(entity.clone(), &payload).run(&table).unwrap();
        assert!(decoded.entity().ptr_eq(&entity));
        assert_eq!(entity.read().grade, Some(5));
        assert_eq!(entity.read().grade_seen_by_label, Some(5));
    }

    #[test]
    fn null_scalar_does_not_fail_the_decode() {
        let table = MappingTable::builder()
            .rule(MappingRule::rename("label", field!(Project, label)))
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .build()
            .unwrap();
        let entity = EntityRef::new(Project {
            label: "kept".into(),
            grade: Some(1),
            ..Project::default()
        });
        let payload = raw(json!({"label": null, "grade": null}));

        MappingProcess::new(entity.clone(), &payload).run(&table).unwrap();
        assert_eq!(entity.read().label, "kept");
        assert_eq!(entity.read().grade, None);
    }

    #[test]
    fn async_rule_outside_runtime() {
        let table = MappingTable::builder()
            .rule(MappingRule::async_decode("unitId", field!(Project, unit), |_, _| {
                Ok(Pending::new(Some(0), async { Ok::<_, io::Error>(Some(1)) }))
            }))
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"unit_id": 7}));

        let err = MappingProcess::new(entity.clone(), &payload).run(&table).unwrap_err();
        assert!(matches!(err, MappingError::NoRuntime { .. }));
        assert_eq!(entity.read().unit, None);
    }

    #[tokio::test]
    async fn completes_before_continuations() {
        let (tx, rx) = oneshot::channel::<i64>();
        let rx = parking_lot::Mutex::new(Some(rx));
        let table = MappingTable::builder()
            .rule(MappingRule::async_decode("unitId", field!(Project, unit), move |raw, _| {
                let stub = raw.get("unit_id").and_then(Value::as_i64);
                let rx = rx.lock().take().expect("decoded once");
                Ok(Pending::new(stub, async move {
                    rx.await
                        .map(Some)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
                }))
            }))
            .rule(MappingRule::rename("grade", field!(Project, grade)))
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"unit_id": 7, "grade": 4}));

        let decoded = MappingProcess::new(entity.clone(), &payload).run(&table).unwrap();
        assert_eq!(entity.read().unit, Some(7));
        assert_eq!(entity.read().grade, Some(4));
        assert_eq!(decoded.outstanding(), 1);
        assert_eq!(decoded.continuations()[0].field(), "unitId");

        tx.send(70).unwrap();
        let (entity, failures) = decoded.settle().await;
        assert!(failures.is_empty());
        assert_eq!(entity.read().unit, Some(70));
    }

    #[tokio::test]
    async fn continuation_failure_is_reported_separately() {
        let table = MappingTable::builder()
            .rule(MappingRule::async_decode("unitId", field!(Project, unit), |_, _| {
                Ok(Pending::new(Some(7), async {
                    Err::<Option<i64>, _>(io::Error::new(io::ErrorKind::NotFound, "gone"))
                }))
            }))
            .build()
            .unwrap();
        let entity = EntityRef::new(Project::default());
        let payload = raw(json!({"unit_id": 7}));
        let tracker = AsyncTracker::new();

        let decoded = MappingProcess::with_tracker(entity.clone(), &payload, tracker.clone())
            .run(&table)
            .expect("decode itself succeeds");
        let (_, failures) = decoded.settle().await;

        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], MappingError::AsyncResolution { field, .. } if field == "unitId"));
        assert_eq!(tracker.take_failures().len(), 1);
        assert_eq!(entity.read().unit, Some(7));
    }
}
