//! Encode command implementation.

use super::parse_id;
use crate::error::CliResult;
use entigraph_model::ModelServices;
use entigraph_service::RequestOptions;
use serde_json::Value;

/// Runs `encode project`: prints the payload an update of the project
/// would send.
pub async fn project(services: &ModelServices, id: &str) -> CliResult<String> {
    let project = services
        .projects
        .get(parse_id(id), RequestOptions::new())
        .await?;
    // A project whose relations failed to resolve is not printed.
    if let Some(failure) = services.settle().await.into_iter().next() {
        return Err(failure.into());
    }
    let payload = services.projects.mapper().encode(&project)?;
    Ok(serde_json::to_string_pretty(&Value::Object(payload))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use entigraph_core::MappingError;
    use entigraph_service::ServiceError;
    use entigraph_testkit::memory_transport;
    use serde_json::json;

    #[tokio::test]
    async fn prints_round_trip_fields() {
        let services = ModelServices::new(memory_transport()).unwrap();
        let output = project(&services, "1").await.unwrap();
        let payload: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            payload,
            json!({"enrolled": true, "target_grade": 2, "compile_portfolio": false, "campus_id": 1})
        );
    }

    #[tokio::test]
    async fn unresolved_campus_fails_the_encode() {
        let transport = memory_transport();
        transport.inject_failure("campuses", None, ServiceError::transport_retryable("timeout"));
        let services = ModelServices::new(transport).unwrap();

        let err = project(&services, "1").await.unwrap_err();
        assert!(matches!(err, CliError::Mapping(MappingError::AsyncResolution { .. })));
    }
}
