//! Campuses.

use super::Describe;
use entigraph_core::{field, Entity, EntityId, EntityMapper, MappingResult, MappingRule, MappingTable};
use serde_json::{json, Value};

/// A teaching campus.
#[derive(Debug, Clone)]
pub struct Campus {
    /// Id.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Short code.
    pub abbreviation: String,
    /// Whether the campus is in use.
    pub active: bool,
}

impl Campus {
    /// Creates an unpopulated campus.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
            abbreviation: String::new(),
            active: true,
        }
    }
}

impl Entity for Campus {
    type Params = ();

    fn entity_id(&self) -> EntityId {
        self.id.clone()
    }
}

impl Describe for Campus {
    fn describe(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "abbreviation": self.abbreviation,
            "active": self.active,
        })
    }
}

/// Builds the campus mapper.
pub fn campus_mapper() -> MappingResult<EntityMapper<Campus>> {
    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(Campus, id)).required())
        .rule(MappingRule::rename("name", field!(Campus, name)))
        .rule(MappingRule::rename("abbreviation", field!(Campus, abbreviation)))
        .rule(MappingRule::rename("active", field!(Campus, active)))
        .build()?;
    Ok(EntityMapper::new(table, |id, _, _| Ok(Campus::new(id.clone()))))
}
