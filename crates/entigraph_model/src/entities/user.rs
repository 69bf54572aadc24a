//! Users (students and staff).

use super::Describe;
use entigraph_core::{field, Entity, EntityId, EntityMapper, MappingResult, MappingRule, MappingTable};
use serde_json::{json, Value};

/// A person with an account.
#[derive(Debug, Clone)]
pub struct User {
    /// Id.
    pub id: EntityId,
    /// Login name.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Preferred name, if any.
    pub nickname: Option<String>,
    /// Contact address.
    pub email: String,
}

impl User {
    /// Creates an unpopulated user.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            username: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            nickname: None,
            email: String::new(),
        }
    }

    /// Returns "First Last", or the nickname in place of the first name.
    pub fn name(&self) -> String {
        let first = self.nickname.as_deref().unwrap_or(&self.first_name);
        format!("{first} {}", self.last_name).trim().to_string()
    }
}

impl Entity for User {
    type Params = ();

    fn entity_id(&self) -> EntityId {
        self.id.clone()
    }
}

impl Describe for User {
    fn describe(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "name": self.name(),
            "email": self.email,
        })
    }
}

/// Builds the user mapper.
pub fn user_mapper() -> MappingResult<EntityMapper<User>> {
    let table = MappingTable::builder()
        .rule(MappingRule::rename("id", field!(User, id)).required())
        .rule(MappingRule::rename("username", field!(User, username)))
        .rule(MappingRule::rename("firstName", field!(User, first_name)))
        .rule(MappingRule::rename("lastName", field!(User, last_name)))
        .rule(MappingRule::rename("nickname", field!(User, nickname)))
        .rule(MappingRule::rename("email", field!(User, email)))
        .build()?;
    Ok(EntityMapper::new(table, |id, _, _| Ok(User::new(id.clone()))))
}
