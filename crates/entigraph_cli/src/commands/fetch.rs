//! Fetch command implementation.

use super::{parse_id, Resource};
use crate::error::CliResult;
use entigraph_core::EntityRef;
use entigraph_model::{Campus, Describe, ModelServices, Project, Unit, User};
use entigraph_service::RequestOptions;
use serde_json::{json, Value};
use tracing::warn;

/// An entity of any fetchable resource.
enum Fetched {
    Campus(EntityRef<Campus>),
    User(EntityRef<User>),
    Unit(EntityRef<Unit>),
    Project(EntityRef<Project>),
}

impl Fetched {
    fn describe(&self) -> Value {
        match self {
            Self::Campus(entity) => entity.read().describe(),
            Self::User(entity) => entity.read().describe(),
            Self::Unit(entity) => entity.read().describe(),
            Self::Project(entity) => entity.read().describe(),
        }
    }
}

/// Runs the fetch command: reads one entity, waits for its relations and
/// renders a JSON summary.
pub async fn run(services: &ModelServices, resource: &str, id: &str) -> CliResult<String> {
    let resource: Resource = resource.parse()?;
    let id = parse_id(id);

    let fetched = match resource {
        Resource::Campuses => Fetched::Campus(services.campuses.get(id, RequestOptions::new()).await?),
        Resource::Users => Fetched::User(services.users.get(id, RequestOptions::new()).await?),
        Resource::Units => Fetched::Unit(services.units.get(id, RequestOptions::new()).await?),
        Resource::Projects => {
            Fetched::Project(services.projects.get(id, RequestOptions::new()).await?)
        }
    };

    // Summaries are rendered after settling so resolved relations show.
    let failures = services.settle().await;
    for failure in &failures {
        warn!(error = %failure, "relation could not be resolved");
    }
    let output = json!({
        "entity": fetched.describe(),
        "unresolved": failures.iter().map(ToString::to_string).collect::<Vec<_>>(),
    });
    Ok(serde_json::to_string_pretty(&output)?)
}
