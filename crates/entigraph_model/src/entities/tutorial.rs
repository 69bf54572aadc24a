//! Tutorials, owned by a unit.

use super::{Describe, Unit};
use entigraph_core::{
    field, Entity, EntityId, EntityMapper, EntityRef, MappingResult, MappingRule, MappingTable,
    WeakEntityRef,
};
use serde_json::{json, Value};

/// A class within a unit that students enrol in.
#[derive(Debug)]
pub struct Tutorial {
    /// Id.
    pub id: EntityId,
    /// Short code ("LA1-01").
    pub abbreviation: String,
    /// Day of the week it meets.
    pub meeting_day: Option<String>,
    /// Start time.
    pub meeting_time: Option<String>,
    /// Where it meets.
    pub meeting_location: Option<String>,
    /// Seats available.
    pub capacity: Option<i64>,
    /// Owning unit.
    pub unit: Option<WeakEntityRef<Unit>>,
}

impl Tutorial {
    /// Creates an unpopulated tutorial.
    pub fn new(id: EntityId, unit: Option<&EntityRef<Unit>>) -> Self {
        Self {
            id,
            abbreviation: String::new(),
            meeting_day: None,
            meeting_time: None,
            meeting_location: None,
            capacity: None,
            unit: unit.map(EntityRef::downgrade),
        }
    }

    /// Returns the owning unit while it is alive.
    pub fn unit(&self) -> Option<EntityRef<Unit>> {
        self.unit.as_ref().and_then(WeakEntityRef::upgrade)
    }
}

impl Entity for Tutorial {
    type Params = EntityRef<Unit>;

    fn entity_id(&self) -> EntityId {
        self.id.clone()
    }
}

impl Describe for Tutorial {
    fn describe(&self) -> Value {
        json!({
            "id": self.id,
            "abbreviation": self.abbreviation,
            "meeting_day": self.meeting_day,
            "meeting_time": self.meeting_time,
            "capacity": self.capacity,
        })
    }
}

/// Builds the tutorial mapper.
pub fn tutorial_mapper() -> MappingResult<EntityMapper<Tutorial>> {
    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(Tutorial, id)).required())
        .rule(MappingRule::rename("abbreviation", field!(Tutorial, abbreviation)))
        .rule(MappingRule::rename("meetingDay", field!(Tutorial, meeting_day)))
        .rule(MappingRule::rename("meetingTime", field!(Tutorial, meeting_time)))
        .rule(MappingRule::rename("meetingLocation", field!(Tutorial, meeting_location)))
        .rule(MappingRule::rename("capacity", field!(Tutorial, capacity)))
        .build()?;
    Ok(EntityMapper::new(table, |id, _, unit| {
        Ok(Tutorial::new(id.clone(), unit))
    }))
}
