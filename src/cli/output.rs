//! Output formatting for CLI commands: comfy-table for people, JSON for
//! scripts.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::domain::models::{
    AggregatedResults, Classification, InventoryRow, ReconciliationResult, ReviewItem,
};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}

fn base_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
    table
}

fn join(services: &BTreeSet<String>) -> String {
    services.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// One entity's line in a change report.
#[derive(Debug, Serialize)]
pub struct EntityLine {
    pub entity: String,
    pub marker: String,
    pub services: Vec<String>,
    pub detail: Option<String>,
}

/// A reconciled change, as shown to the operator.
#[derive(Debug, Serialize)]
pub struct ReconcileOutput {
    pub change: String,
    pub outcome: String,
    pub rounds: u32,
    pub entities: Vec<EntityLine>,
    pub review: Vec<ReviewItem>,
}

impl From<&ReconciliationResult> for ReconcileOutput {
    fn from(result: &ReconciliationResult) -> Self {
        let entities = result
            .classifications
            .iter()
            .map(|(entity, class)| EntityLine {
                entity: entity.to_string(),
                marker: class.marker(),
                services: class
                    .services()
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default(),
                detail: match class {
                    Classification::Review { reason, .. } => Some(reason.to_string()),
                    _ => None,
                },
            })
            .collect();

        Self {
            change: result.change_kind.to_string(),
            outcome: result.outcome.to_string(),
            rounds: result.rounds,
            entities,
            review: result.review_queue(),
        }
    }
}

impl CommandOutput for ReconcileOutput {
    fn to_human(&self) -> String {
        let mut table = base_table(&["Entity", "Result", "Services", "Detail"]);
        for line in &self.entities {
            table.add_row(vec![
                Cell::new(&line.entity),
                Cell::new(&line.marker),
                Cell::new(line.services.join(", ")),
                Cell::new(line.detail.as_deref().unwrap_or("")),
            ]);
        }

        let mut lines = vec![
            format!(
                "{}: {} after {} validation round(s)",
                self.change, self.outcome, self.rounds
            ),
            table.to_string(),
        ];

        if !self.review.is_empty() {
            lines.push(format!("\n{} entity(ies) need review:", self.review.len()));
            for item in &self.review {
                lines.push(format!(
                    "  - {}: {} [{}]",
                    item.entity,
                    item.reason,
                    join(&item.services)
                ));
            }
        }

        lines.join("\n")
    }
}

/// Inventory rows keyed by entity.
#[derive(Debug, Serialize)]
pub struct InventoryOutput {
    pub fields: Vec<String>,
    pub rows: Vec<InventoryRow>,
}

impl InventoryOutput {
    pub fn new(fields: Vec<String>, results: AggregatedResults<InventoryRow>) -> Self {
        Self {
            fields,
            rows: results.into_rows().into_values().collect(),
        }
    }
}

impl CommandOutput for InventoryOutput {
    fn to_human(&self) -> String {
        if self.rows.is_empty() {
            return "No inventory rows found.".to_string();
        }

        let headers: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        let mut table = base_table(&headers);
        for row in &self.rows {
            table.add_row(self.fields.iter().map(|field| {
                Cell::new(match row.get(field) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
            }));
        }
        format!("{table}\n\n{} row(s)", self.rows.len())
    }

    fn to_json(&self) -> Value {
        Value::Array(self.rows.iter().cloned().map(Value::Object).collect())
    }
}
