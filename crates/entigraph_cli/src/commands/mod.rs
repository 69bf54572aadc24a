//! CLI command implementations.
//!
//! Commands return their output as text so `main` decides where it goes.

pub mod encode;
pub mod fetch;
pub mod list;
pub mod scopes;

use crate::error::{CliError, CliResult};
use entigraph_core::EntityId;
use entigraph_model::ModelServices;
use entigraph_service::MemoryTransport;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Resources reachable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Campuses.
    Campuses,
    /// Users.
    Users,
    /// Units.
    Units,
    /// Projects.
    Projects,
}

impl FromStr for Resource {
    type Err = CliError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "campuses" => Ok(Self::Campuses),
            "users" => Ok(Self::Users),
            "units" => Ok(Self::Units),
            "projects" => Ok(Self::Projects),
            other => Err(CliError::UnknownResource(other.to_string())),
        }
    }
}

/// Loads a fixture document and wires the model services over it.
pub fn open(path: &Path) -> CliResult<ModelServices> {
    let document = std::fs::read_to_string(path).map_err(|source| CliError::Fixtures {
        path: path.to_path_buf(),
        source,
    })?;
    let transport = MemoryTransport::from_json_str(&document)?;
    info!(path = %path.display(), resources = ?transport.resources(), "loaded fixtures");
    Ok(ModelServices::new(Arc::new(transport))?)
}

/// Parses a command-line id: integers are numeric ids, anything else a
/// string id.
pub fn parse_id(text: &str) -> EntityId {
    text.parse::<i64>()
        .map(EntityId::from)
        .unwrap_or_else(|_| EntityId::from(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigraph_testkit::{dataset, fixture_file};

    #[test]
    fn ids_parse_as_numbers_when_they_can() {
        assert_eq!(parse_id("42"), EntityId::from(42));
        assert_eq!(parse_id("definition-3"), EntityId::from("definition-3"));
    }

    #[test]
    fn unknown_resources_are_rejected() {
        assert_eq!("units".parse::<Resource>().unwrap(), Resource::Units);
        assert!(matches!(
            "tutorials".parse::<Resource>(),
            Err(CliError::UnknownResource(name)) if name == "tutorials"
        ));
    }

    #[test]
    fn open_reads_a_fixture_file() {
        let file = fixture_file(&dataset());
        let services = open(file.path()).unwrap();
        assert!(services.units.cache().is_empty());
    }

    #[test]
    fn open_reports_missing_files() {
        let err = open(Path::new("/nonexistent/fixtures.json")).unwrap_err();
        assert!(matches!(err, CliError::Fixtures { .. }));
    }
}
