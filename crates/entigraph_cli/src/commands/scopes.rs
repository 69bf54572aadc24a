//! Scopes command implementation.

use crate::error::CliResult;
use entigraph_model::ModelServices;
use entigraph_service::{Filter, RequestOptions};
use tracing::{info, warn};

/// Runs the scopes command: loads every unit with its student roster and
/// prints each cache scope with its entry count.
pub async fn run(services: &ModelServices, include_withdrawn: bool) -> CliResult<String> {
    let units = services.units.fetch_all(&Filter::new(), RequestOptions::new()).await?;
    for unit in &units {
        let students = services
            .projects
            .load_students(unit, include_withdrawn, false)
            .await?;
        info!(unit = %unit.id(), students = students.len(), "loaded roster");
    }
    for failure in services.settle().await {
        warn!(error = %failure, "relation could not be resolved");
    }

    let report = services.scope_report();
    let width = report.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    Ok(report
        .iter()
        .map(|(name, len)| format!("{name:<width$}  {len}"))
        .collect::<Vec<_>>()
        .join("\n"))
}
