use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::entity::Entity;

/// A search against the inventory API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryQuery {
    pub object_type: String,
    pub fields: Vec<String>,
    /// Field name to the values it may take.
    pub filters: BTreeMap<String, Vec<String>>,
    /// Row field used as the entity key when aggregating.
    pub key_field: String,
}

impl InventoryQuery {
    pub fn new(object_type: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            object_type: object_type.into(),
            fields,
            filters: BTreeMap::new(),
            key_field: "name".to_string(),
        }
    }

    #[must_use]
    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.filters.insert(field.into(), values);
        self
    }

    /// The same query restricted to one batch of entities.
    #[must_use]
    pub fn for_entities(&self, entities: &[Entity]) -> Self {
        let mut query = self.clone();
        query.filters.insert(
            self.key_field.clone(),
            entities.iter().map(|e| e.name().to_string()).collect(),
        );
        query
    }

    /// The `predicate` expression sent on the wire.
    pub fn predicate(&self) -> String {
        self.filters
            .iter()
            .map(|(field, values)| {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
                format!("{field} IN ({})", quoted.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Pagination metadata returned with every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    pub current_page: u32,
    pub last_page: u32,
    #[serde(default)]
    pub items_per_page: u32,
}

/// One page of inventory rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryPage {
    pub rows: Vec<Value>,
    pub paging: PagingInfo,
}

/// A single inventory row, field name to value.
pub type InventoryRow = serde_json::Map<String, Value>;
