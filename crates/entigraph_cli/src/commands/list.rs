//! List command implementation.

use super::Resource;
use crate::error::{CliError, CliResult};
use entigraph_core::{Entity, EntityRef};
use entigraph_model::ModelServices;
use entigraph_service::{Filter, RequestOptions};

/// Parses `key=value` arguments into an equality filter.
pub fn parse_filter(args: &[String]) -> CliResult<Filter> {
    args.iter().try_fold(Filter::new(), |filter, arg| {
        let (key, value) = arg
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CliError::InvalidFilter(arg.clone()))?;
        Ok(filter.eq(key, value))
    })
}

/// Runs the list command: prints the ids of matching records, one per line.
pub async fn run(services: &ModelServices, resource: &str, filters: &[String]) -> CliResult<String> {
    let resource: Resource = resource.parse()?;
    let filter = parse_filter(filters)?;

    let ids = match resource {
        Resource::Campuses => ids(services.campuses.fetch_all(&filter, RequestOptions::new()).await?),
        Resource::Users => ids(services.users.fetch_all(&filter, RequestOptions::new()).await?),
        Resource::Units => ids(services.units.fetch_all(&filter, RequestOptions::new()).await?),
        Resource::Projects => {
            ids(services.projects.fetch_all(&filter, RequestOptions::new()).await?)
        }
    };
    services.settle().await;
    Ok(ids.join("\n"))
}

fn ids<T: Entity>(entities: Vec<EntityRef<T>>) -> Vec<String> {
    entities.iter().map(|entity| entity.id().to_string()).collect()
}
