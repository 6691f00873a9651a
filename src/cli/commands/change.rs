//! Change subcommands: submit, validate and retry through the coordinator.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::cli::output::{output, ReconcileOutput};
use crate::cli::types::TargetArgs;
use crate::domain::models::{ChangeKind, Config, DesiredChange};
use crate::domain::ports::StaticCredentials;
use crate::infrastructure::monapi::MonApiClient;
use crate::services::RetryCoordinator;

pub async fn execute(
    kind: ChangeKind,
    target: &TargetArgs,
    config: &Config,
    json_mode: bool,
) -> Result<()> {
    let entities = target.entities()?;
    let change = DesiredChange::new(kind, target.scope()).context("Invalid change request")?;

    let credentials = Arc::new(StaticCredentials::new(
        config.monitoring.credentials.clone(),
    ));
    let client = MonApiClient::new(&config.monitoring, &config.rate_limit, credentials)
        .context("Failed to create monitoring API client")?;
    client
        .authenticate()
        .await
        .context("Failed to authenticate with the monitoring API")?;

    let coordinator = RetryCoordinator::from_config(Arc::new(client), config);
    let result = coordinator
        .run(&change, &entities)
        .await
        .with_context(|| format!("{} change did not complete", change.kind().name()))?;

    info!(
        outcome = %result.outcome,
        rounds = result.rounds,
        clean = result.is_clean(),
        "Change finished"
    );
    output(&ReconcileOutput::from(&result), json_mode);
    Ok(())
}
