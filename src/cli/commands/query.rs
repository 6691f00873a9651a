//! Inventory query subcommand.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::cli::output::{output, InventoryOutput};
use crate::cli::types::QueryArgs;
use crate::domain::models::{Config, InventoryQuery};
use crate::infrastructure::inventory::InventoryClient;
use crate::services::InventoryService;

pub async fn execute(args: QueryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let entities = args.entities()?;
    let mut template = InventoryQuery::new(&args.object_type, args.fields.clone())
        .with_key_field(&args.key_field);
    for (field, values) in args.parsed_filters()? {
        template = template.with_filter(field, values);
    }

    let client = InventoryClient::new(&config.inventory, &config.rate_limit)
        .context("Failed to create inventory client")?;
    let service = InventoryService::from_config(Arc::new(client), config);

    let results = service
        .query(&entities, &template)
        .await
        .with_context(|| format!("Inventory query for '{}' failed", args.object_type))?;

    output(&InventoryOutput::new(args.fields, results), json_mode);
    Ok(())
}
